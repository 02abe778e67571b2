use crate::avalanche::Avalanche;
use crate::error::Result;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Downstream consumer of the ordered avalanche record stream
pub trait AvalancheSink {
    fn record(&mut self, avalanche: &Avalanche) -> Result<()>;

    /// Flush anything buffered once the run is over
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

impl AvalancheSink for Vec<Avalanche> {
    fn record(&mut self, avalanche: &Avalanche) -> Result<()> {
        self.push(*avalanche);
        Ok(())
    }
}

/// `area,volume` lines under a header
pub struct CsvSink<W: Write> {
    out: W,
    wrote_header: bool,
}

impl<W: Write> CsvSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            wrote_header: false,
        }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl CsvSink<BufWriter<File>> {
    pub fn create(path: &Path) -> Result<Self> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write> AvalancheSink for CsvSink<W> {
    fn record(&mut self, avalanche: &Avalanche) -> Result<()> {
        if !self.wrote_header {
            writeln!(self.out, "area,volume")?;
            self.wrote_header = true;
        }
        writeln!(self.out, "{},{}", avalanche.area, avalanche.volume)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if !self.wrote_header {
            writeln!(self.out, "area,volume")?;
            self.wrote_header = true;
        }
        self.out.flush()?;
        Ok(())
    }
}

/// Paired area and volume files, each a single comma-terminated list
/// after a one-line description of the run.
pub struct LegacySink<W: Write> {
    areas: W,
    volumes: W,
}

impl<W: Write> LegacySink<W> {
    pub fn new(mut areas: W, mut volumes: W, side: usize, injections: u64) -> Result<Self> {
        write!(
            areas,
            "side={} number of points ={}sizes of avalanches: ",
            side, injections
        )?;
        write!(
            volumes,
            "side={} number of points ={}volumes of avalanches: ",
            side, injections
        )?;
        Ok(Self { areas, volumes })
    }

    #[cfg(test)]
    pub fn into_inner(self) -> (W, W) {
        (self.areas, self.volumes)
    }
}

impl LegacySink<BufWriter<File>> {
    /// Create `<stem>_area.txt` and `<stem>_volume.txt`.
    pub fn create(stem: &Path, side: usize, injections: u64) -> Result<Self> {
        let (area_path, volume_path) = legacy_paths(stem);
        Self::new(
            BufWriter::new(File::create(area_path)?),
            BufWriter::new(File::create(volume_path)?),
            side,
            injections,
        )
    }
}

impl<W: Write> AvalancheSink for LegacySink<W> {
    fn record(&mut self, avalanche: &Avalanche) -> Result<()> {
        write!(self.areas, "{},", avalanche.area)?;
        write!(self.volumes, "{},", avalanche.volume)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.areas.flush()?;
        self.volumes.flush()?;
        Ok(())
    }
}

/// Forwards every record and keeps the areas of non-trivial avalanches
/// for a distribution written after the run.
pub struct AreaTail<'a, S: AvalancheSink + ?Sized> {
    inner: &'a mut S,
    areas: Vec<u64>,
}

impl<'a, S: AvalancheSink + ?Sized> AreaTail<'a, S> {
    pub fn new(inner: &'a mut S) -> Self {
        Self {
            inner,
            areas: Vec::new(),
        }
    }

    pub fn areas(&self) -> &[u64] {
        &self.areas
    }
}

impl<S: AvalancheSink + ?Sized> AvalancheSink for AreaTail<'_, S> {
    fn record(&mut self, avalanche: &Avalanche) -> Result<()> {
        if !avalanche.is_trivial() {
            self.areas.push(avalanche.area);
        }
        self.inner.record(avalanche)
    }

    fn finish(&mut self) -> Result<()> {
        self.inner.finish()
    }
}

/// `area,ccdf` lines, one per distinct area
pub fn write_ccdf<W: Write>(w: &mut W, points: &[(u64, f64)]) -> Result<()> {
    writeln!(w, "area,ccdf")?;
    for (area, fraction) in points {
        writeln!(w, "{},{}", area, fraction)?;
    }
    Ok(())
}

pub fn save_ccdf(path: &Path, points: &[(u64, f64)]) -> Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    write_ccdf(&mut w, points)?;
    w.flush()?;
    Ok(())
}

/// File names used by `LegacySink::create`
pub fn legacy_paths(stem: &Path) -> (PathBuf, PathBuf) {
    let base = stem.with_extension("");
    let name = base
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "avalanches".to_string());
    (
        base.with_file_name(format!("{}_area.txt", name)),
        base.with_file_name(format!("{}_volume.txt", name)),
    )
}
