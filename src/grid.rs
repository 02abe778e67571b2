use crate::error::{Result, SandpileError};
use serde::{Deserialize, Serialize};

/// Grain count at which a site becomes unstable and topples
pub const CRITICAL: u32 = 4;

/// Largest grain count a relaxed interior site may hold
pub const MAX_STABLE: u32 = CRITICAL - 1;

/// A lattice coordinate. Neighbours of interior sites may sit one step
/// past the stored array (row or column equal to the side length).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Site {
    pub row: usize,
    pub col: usize,
}

impl Site {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// The four axis-aligned neighbours, in topple order.
    /// Only valid for interior sites, whose row and column are at least 1.
    pub fn neighbors(&self) -> [Site; 4] {
        [
            Site::new(self.row - 1, self.col),
            Site::new(self.row, self.col - 1),
            Site::new(self.row + 1, self.col),
            Site::new(self.row, self.col + 1),
        ]
    }
}

/// Whether a coordinate can hold and shed grains
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteClass {
    /// Both coordinates in [1, side-1]: accumulates grains and may topple
    Interior,
    /// Row or column is 0 or side: absorbs flux, never topples, never read
    Sink,
}

/// Classify a lattice coordinate against a grid of the given side length.
/// Coordinates beyond storage are sinks as well, so callers never index
/// past the array.
pub fn classify(side: usize, row: usize, col: usize) -> SiteClass {
    let interior = |x: usize| x >= 1 && x < side;
    if interior(row) && interior(col) {
        SiteClass::Interior
    } else {
        SiteClass::Sink
    }
}

/// Square grid of grain counts, stored row-major
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    side: usize,
    cells: Vec<u32>,
}

impl Grid {
    /// Create a `side` x `side` grid with every cell holding `backphone` grains.
    pub fn new(side: usize, backphone: u32) -> Result<Self> {
        if side < 3 {
            return Err(SandpileError::Config(format!(
                "grid side must be at least 3 to have an interior, got {}",
                side
            )));
        }
        if backphone > MAX_STABLE {
            return Err(SandpileError::Config(format!(
                "initial grain count must be below {}, got {}",
                CRITICAL, backphone
            )));
        }
        Ok(Self {
            side,
            cells: vec![backphone; side * side],
        })
    }

    /// Build a grid from explicit rows. Interior cells may start unstable;
    /// the caller is responsible for scheduling them.
    pub fn from_rows(rows: &[Vec<u32>]) -> Result<Self> {
        let side = rows.len();
        if side < 3 {
            return Err(SandpileError::Config(format!(
                "grid side must be at least 3 to have an interior, got {}",
                side
            )));
        }
        if let Some(bad) = rows.iter().position(|r| r.len() != side) {
            return Err(SandpileError::Config(format!(
                "row {} has {} cells, expected {}",
                bad,
                rows[bad].len(),
                side
            )));
        }
        Ok(Self {
            side,
            cells: rows.iter().flatten().copied().collect(),
        })
    }

    pub fn side(&self) -> usize {
        self.side
    }

    pub fn classify(&self, site: Site) -> SiteClass {
        classify(self.side, site.row, site.col)
    }

    pub fn is_interior(&self, site: Site) -> bool {
        self.classify(site) == SiteClass::Interior
    }

    /// Row-major index of a stored site
    pub fn index(&self, site: Site) -> usize {
        site.row * self.side + site.col
    }

    /// Grain count at a stored site, `None` past the array
    pub fn get(&self, site: Site) -> Option<u32> {
        if site.row < self.side && site.col < self.side {
            Some(self.cells[self.index(site)])
        } else {
            None
        }
    }

    /// Add one grain to an interior site and return its new count.
    pub fn add_grain(&mut self, site: Site) -> Result<u32> {
        debug_assert!(self.is_interior(site), "grain added to sink {:?}", site);
        let idx = self.index(site);
        let count = self.cells[idx]
            .checked_add(1)
            .ok_or(SandpileError::Overflow("grain count"))?;
        self.cells[idx] = count;
        Ok(count)
    }

    /// Overwrite the count at an interior site.
    pub fn set(&mut self, site: Site, value: u32) {
        debug_assert!(self.is_interior(site), "write to sink {:?}", site);
        let idx = self.index(site);
        self.cells[idx] = value;
    }

    /// Remove `CRITICAL` grains if the site is unstable.
    /// Returns whether the site toppled.
    pub fn shed(&mut self, site: Site) -> bool {
        let idx = self.index(site);
        if self.cells[idx] > MAX_STABLE {
            self.cells[idx] -= CRITICAL;
            true
        } else {
            false
        }
    }

    /// All interior sites in row-major order
    pub fn interior_sites(&self) -> impl Iterator<Item = Site> + '_ {
        (1..self.side).flat_map(|row| (1..self.side).map(move |col| Site::new(row, col)))
    }

    /// Total grains held by interior sites
    pub fn interior_mass(&self) -> u64 {
        self.interior_sites()
            .map(|s| self.cells[self.index(s)] as u64)
            .sum()
    }

    /// True when no interior site exceeds `MAX_STABLE`
    pub fn is_stable(&self) -> bool {
        self.interior_sites()
            .all(|s| self.cells[self.index(s)] <= MAX_STABLE)
    }

    /// Raw row-major storage, sinks included
    pub fn cells(&self) -> &[u32] {
        &self.cells
    }

    #[cfg(test)]
    pub fn row(&self, row: usize) -> &[u32] {
        &self.cells[row * self.side..(row + 1) * self.side]
    }
}
