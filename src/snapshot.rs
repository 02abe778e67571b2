//! Binary dumps for external grid viewers.
//!
//! Both layouts are flat sequences of little-endian `i32`:
//! - full grid: `n, unstable_count, n*n cells (row-major), unstable_count * (row, col)`
//! - active sites: `count, count * (row, col, value)`

use crate::error::{Result, SandpileError};
use crate::grid::{Grid, Site};
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;

/// One entry of an active-site dump
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveSite {
    pub row: usize,
    pub col: usize,
    pub value: u64,
}

/// Decoded full-grid dump
#[derive(Debug, Clone, PartialEq)]
pub struct GridSnapshot {
    pub side: usize,
    /// Row-major cell values
    pub cells: Vec<u32>,
    pub unstable: Vec<Site>,
}

fn to_i32<T: TryInto<i32>>(value: T, what: &'static str) -> Result<i32> {
    value.try_into().map_err(|_| SandpileError::Overflow(what))
}

fn write_i32<W: Write>(w: &mut W, value: i32) -> Result<()> {
    w.write_all(&value.to_le_bytes())?;
    Ok(())
}

fn read_i32<R: Read>(r: &mut R) -> Result<i32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => SandpileError::Snapshot("truncated file".to_string()),
        _ => SandpileError::Io(e),
    })?;
    Ok(i32::from_le_bytes(buf))
}

fn read_count<R: Read>(r: &mut R, what: &str) -> Result<usize> {
    let v = read_i32(r)?;
    usize::try_from(v).map_err(|_| SandpileError::Snapshot(format!("negative {}: {}", what, v)))
}

/// Write the whole grid followed by a list of highlighted sites.
pub fn write_grid<W: Write>(w: &mut W, grid: &Grid, unstable: &[Site]) -> Result<()> {
    write_i32(w, to_i32(grid.side(), "grid side")?)?;
    write_i32(w, to_i32(unstable.len(), "unstable count")?)?;
    for &cell in grid.cells() {
        write_i32(w, to_i32(cell, "grain count")?)?;
    }
    for site in unstable {
        write_i32(w, to_i32(site.row, "row")?)?;
        write_i32(w, to_i32(site.col, "column")?)?;
    }
    Ok(())
}

pub fn read_grid<R: Read>(r: &mut R) -> Result<GridSnapshot> {
    let side = read_count(r, "side")?;
    let unstable_count = read_count(r, "unstable count")?;
    let len = side
        .checked_mul(side)
        .ok_or_else(|| SandpileError::Snapshot(format!("side {} too large", side)))?;
    let mut cells = Vec::with_capacity(len.min(1 << 24));
    for _ in 0..len {
        let v = read_i32(r)?;
        let v = u32::try_from(v)
            .map_err(|_| SandpileError::Snapshot(format!("negative grain count {}", v)))?;
        cells.push(v);
    }
    let mut unstable = Vec::with_capacity(unstable_count.min(1 << 20));
    for _ in 0..unstable_count {
        let row = read_count(r, "row")?;
        let col = read_count(r, "column")?;
        unstable.push(Site::new(row, col));
    }
    Ok(GridSnapshot {
        side,
        cells,
        unstable,
    })
}

pub fn write_active<W: Write>(w: &mut W, sites: &[ActiveSite]) -> Result<()> {
    write_i32(w, to_i32(sites.len(), "active count")?)?;
    for s in sites {
        write_i32(w, to_i32(s.row, "row")?)?;
        write_i32(w, to_i32(s.col, "column")?)?;
        write_i32(w, to_i32(s.value, "active value")?)?;
    }
    Ok(())
}

pub fn read_active<R: Read>(r: &mut R) -> Result<Vec<ActiveSite>> {
    let count = read_count(r, "active count")?;
    let mut sites = Vec::with_capacity(count.min(1 << 20));
    for _ in 0..count {
        let row = read_count(r, "row")?;
        let col = read_count(r, "column")?;
        let value = read_count(r, "value")? as u64;
        sites.push(ActiveSite { row, col, value });
    }
    Ok(sites)
}

pub fn save_grid(path: &Path, grid: &Grid, unstable: &[Site]) -> Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    write_grid(&mut w, grid, unstable)?;
    w.flush()?;
    Ok(())
}

pub fn load_grid(path: &Path) -> Result<GridSnapshot> {
    read_grid(&mut BufReader::new(File::open(path)?))
}

pub fn save_active(path: &Path, sites: &[ActiveSite]) -> Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    write_active(&mut w, sites)?;
    w.flush()?;
    Ok(())
}

pub fn load_active(path: &Path) -> Result<Vec<ActiveSite>> {
    read_active(&mut BufReader::new(File::open(path)?))
}

impl GridSnapshot {
    /// Rebuild the grid; the unstable list is not needed since
    /// `Sandpile::with_grid` schedules any cell at or above the threshold.
    pub fn into_grid(self) -> Result<Grid> {
        let rows: Vec<Vec<u32>> = self
            .cells
            .chunks(self.side.max(1))
            .map(|row| row.to_vec())
            .collect();
        Grid::from_rows(&rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_grid_layout() {
        let grid = Grid::from_rows(&[vec![0, 1, 2], vec![3, 0, 1], vec![2, 3, 0]]).unwrap();
        let mut buf = Vec::new();
        write_grid(&mut buf, &grid, &[Site::new(1, 2)]).unwrap();

        // header + 9 cells + one coordinate pair
        assert_eq!(buf.len(), 4 * (2 + 9 + 2));
        assert_eq!(&buf[0..4], &3i32.to_le_bytes());
        assert_eq!(&buf[4..8], &1i32.to_le_bytes());
        assert_eq!(&buf[8 + 4 * 5..8 + 4 * 6], &1i32.to_le_bytes());
        assert_eq!(&buf[buf.len() - 8..buf.len() - 4], &1i32.to_le_bytes());
        assert_eq!(&buf[buf.len() - 4..], &2i32.to_le_bytes());

        let snap = read_grid(&mut buf.as_slice()).unwrap();
        assert_eq!(snap.side, 3);
        assert_eq!(snap.cells, grid.cells());
        assert_eq!(snap.unstable, vec![Site::new(1, 2)]);
    }

    #[test]
    fn test_active_layout() {
        let sites = [
            ActiveSite {
                row: 2,
                col: 3,
                value: 1,
            },
            ActiveSite {
                row: 4,
                col: 1,
                value: 7,
            },
        ];
        let mut buf = Vec::new();
        write_active(&mut buf, &sites).unwrap();
        assert_eq!(buf.len(), 4 * (1 + 6));
        assert_eq!(&buf[0..4], &2i32.to_le_bytes());
        assert_eq!(&buf[24..28], &7i32.to_le_bytes());
        assert_eq!(read_active(&mut buf.as_slice()).unwrap(), sites);
    }

    #[test]
    fn test_truncated_grid() {
        let grid = Grid::new(4, 3).unwrap();
        let mut buf = Vec::new();
        write_grid(&mut buf, &grid, &[]).unwrap();
        buf.truncate(buf.len() - 2);
        assert!(matches!(
            read_grid(&mut buf.as_slice()),
            Err(SandpileError::Snapshot(_))
        ));
    }

    #[test]
    fn test_negative_header_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(-1i32).to_le_bytes());
        assert!(matches!(
            read_active(&mut buf.as_slice()),
            Err(SandpileError::Snapshot(_))
        ));
    }

    #[test]
    fn test_value_overflow_reported() {
        let sites = [ActiveSite {
            row: 1,
            col: 1,
            value: u64::MAX,
        }];
        let mut buf = Vec::new();
        assert!(matches!(
            write_active(&mut buf, &sites),
            Err(SandpileError::Overflow(_))
        ));
    }

    #[test]
    fn test_file_save_and_load() {
        let grid = Grid::new(5, 2).unwrap();
        let file = NamedTempFile::new().unwrap();
        save_grid(file.path(), &grid, &[Site::new(3, 3)]).unwrap();
        let snap = load_grid(file.path()).unwrap();
        assert_eq!(snap.side, 5);
        assert!(snap.cells.iter().all(|&c| c == 2));

        assert_eq!(snap.into_grid().unwrap(), grid);

        let active = NamedTempFile::new().unwrap();
        save_active(active.path(), &[]).unwrap();
        assert!(load_active(active.path()).unwrap().is_empty());
    }
}
