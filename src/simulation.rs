use crate::avalanche::{Avalanche, AvalancheSummary};
use crate::error::{Result, SandpileError};
use crate::grid::{Grid, Site, CRITICAL};
use crate::output::AvalancheSink;
use crate::relax::Relaxer;
use crate::settings::SimulationSettings;
use crate::snapshot::ActiveSite;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Avalanches at least this many topples are traced individually
const LARGE_AVALANCHE: u64 = 10_000;

/// Sandpile simulation state
///
/// Owns the grid, the toppling engine and the random source. Grain counts
/// are `u32` and every increment is checked, so a run that would wrap a
/// cell stops with `SandpileError::Overflow`; in a driven run relaxed
/// cells never exceed 3 and transient counts stay below 8, far from the
/// limit. Injections and topple counts are `u64`.
pub struct Sandpile {
    pub settings: SimulationSettings,
    grid: Grid,
    relaxer: Relaxer,
    rng: StdRng,
    injected: u64,
    burst_sites: Vec<Site>,
}

impl Sandpile {
    pub fn new(settings: SimulationSettings) -> Result<Self> {
        settings.validate()?;
        let grid = Grid::new(settings.side, settings.backphone)?;
        Ok(Self::assemble(settings, grid))
    }

    /// Start from an explicit grid; its side overrides `settings.side`.
    /// Unstable cells are scheduled for the first relaxation.
    pub fn with_grid(mut settings: SimulationSettings, grid: Grid) -> Result<Self> {
        settings.side = grid.side();
        settings.validate()?;
        let unstable: Vec<Site> = grid
            .interior_sites()
            .filter(|&s| grid.get(s).is_some_and(|c| c >= CRITICAL))
            .collect();
        let mut sim = Self::assemble(settings, grid);
        for site in unstable {
            sim.relaxer.enqueue(site);
        }
        Ok(sim)
    }

    fn assemble(settings: SimulationSettings, grid: Grid) -> Self {
        let relaxer = Relaxer::new(
            grid.side(),
            settings.discipline,
            settings.dedup_pending,
            settings.seed ^ 0x5eed_cafe,
        );
        Self {
            rng: StdRng::seed_from_u64(settings.seed),
            relaxer,
            grid,
            settings,
            injected: 0,
            burst_sites: Vec::new(),
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Grains injected so far
    pub fn injected(&self) -> u64 {
        self.injected
    }

    /// Sites set critical by the last `seed_burst`
    pub fn burst_sites(&self) -> &[Site] {
        &self.burst_sites
    }

    /// Drop one grain on an interior site and schedule it for relaxation.
    pub fn add(&mut self, row: usize, col: usize) -> Result<()> {
        let site = Site::new(row, col);
        if !self.grid.is_interior(site) {
            return Err(SandpileError::NotInterior {
                row,
                col,
                side: self.grid.side(),
            });
        }
        self.injected = self
            .injected
            .checked_add(1)
            .ok_or(SandpileError::Overflow("injection count"))?;
        self.grid.add_grain(site)?;
        self.relaxer.enqueue(site);
        Ok(())
    }

    /// Topple everything scheduled since the last relaxation.
    pub fn relax(&mut self) -> Result<Avalanche> {
        self.relaxer.relax(&mut self.grid)
    }

    /// Uniformly random interior site
    pub fn random_interior_site(&mut self) -> Site {
        let side = self.grid.side();
        let row = self.rng.gen_range(1..side);
        let col = self.rng.gen_range(1..side);
        Site::new(row, col)
    }

    /// Inject one grain at a random interior site and relax.
    pub fn step(&mut self) -> Result<Avalanche> {
        let site = self.random_interior_site();
        self.add(site.row, site.col)?;
        let avalanche = self.relax()?;
        if avalanche.volume >= LARGE_AVALANCHE {
            log::trace!(
                "injection {} at ({}, {}): area {}, volume {}",
                self.injected,
                site.row,
                site.col,
                avalanche.area,
                avalanche.volume
            );
        }
        Ok(avalanche)
    }

    /// Run the configured number of injections, streaming every record.
    pub fn run<S: AvalancheSink + ?Sized>(&mut self, sink: &mut S) -> Result<AvalancheSummary> {
        let total = self.settings.injections;
        let tick = (total / 10).max(1);
        let mut summary = AvalancheSummary::default();

        for i in 1..=total {
            let avalanche = self.step()?;
            sink.record(&avalanche)?;
            summary.record(&avalanche);
            if i % tick == 0 {
                log::debug!(
                    "{}/{} injections, largest avalanche so far: area {}, volume {}",
                    i,
                    total,
                    summary.max_area,
                    summary.max_volume
                );
            }
        }
        sink.finish()?;
        Ok(summary)
    }

    /// Set `count` random interior sites to the critical value and relax
    /// them together. The chosen sites are kept for snapshot output.
    pub fn seed_burst(&mut self, count: usize) -> Result<Avalanche> {
        self.burst_sites.clear();
        for _ in 0..count {
            let site = self.random_interior_site();
            self.grid.set(site, CRITICAL);
            self.relaxer.enqueue(site);
            self.burst_sites.push(site);
        }
        let avalanche = self.relax()?;
        log::debug!(
            "burst of {} sites: area {}, volume {}",
            count,
            avalanche.area,
            avalanche.volume
        );
        Ok(avalanche)
    }

    /// Sites that toppled in the last relaxation, with their topple counts
    pub fn last_active_sites(&self) -> Vec<ActiveSite> {
        let side = self.grid.side();
        self.relaxer
            .topple_counts()
            .iter()
            .enumerate()
            .filter(|(_, &count)| count > 0)
            .map(|(idx, &count)| ActiveSite {
                row: idx / side,
                col: idx % side,
                value: count,
            })
            .collect()
    }
}
