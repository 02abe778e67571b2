use crate::error::{Result, SandpileError};
use serde::{Deserialize, Serialize};

/// Statistics of one relaxation episode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Avalanche {
    /// Distinct sites that toppled at least once
    pub area: u64,
    /// Total topple events
    pub volume: u64,
    /// Grains discarded into sinks
    pub dissipated: u64,
}

impl Avalanche {
    /// Tally the per-site topple counts of a finished episode.
    /// Zero entries are ignored, so a whole table may be passed.
    pub fn tally<I: IntoIterator<Item = u64>>(counts: I, dissipated: u64) -> Result<Self> {
        let mut area = 0u64;
        let mut volume = 0u64;
        for count in counts.into_iter().filter(|&c| c > 0) {
            area += 1;
            volume = volume
                .checked_add(count)
                .ok_or(SandpileError::Overflow("avalanche volume"))?;
        }
        Ok(Self {
            area,
            volume,
            dissipated,
        })
    }

    /// No site toppled
    pub fn is_trivial(&self) -> bool {
        self.volume == 0
    }
}

/// Running totals over a record stream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AvalancheSummary {
    pub records: u64,
    /// Records with at least one topple
    pub nontrivial: u64,
    pub max_area: u64,
    pub max_volume: u64,
    pub total_volume: u64,
    pub total_dissipated: u64,
}

impl AvalancheSummary {
    pub fn record(&mut self, avalanche: &Avalanche) {
        self.records += 1;
        if !avalanche.is_trivial() {
            self.nontrivial += 1;
        }
        self.max_area = self.max_area.max(avalanche.area);
        self.max_volume = self.max_volume.max(avalanche.volume);
        self.total_volume = self.total_volume.saturating_add(avalanche.volume);
        self.total_dissipated = self.total_dissipated.saturating_add(avalanche.dissipated);
    }

    /// Mean volume per record, 0 for an empty stream
    pub fn mean_volume(&self) -> f64 {
        if self.records == 0 {
            0.0
        } else {
            self.total_volume as f64 / self.records as f64
        }
    }
}

/// Empirical complementary cumulative distribution: for each distinct
/// value `v` (ascending), the fraction of samples that are `>= v`.
pub fn ccdf(values: &[u64]) -> Vec<(u64, f64)> {
    if values.is_empty() {
        return Vec::new();
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let total = sorted.len() as f64;

    let mut out = Vec::new();
    let mut i = 0;
    while i < sorted.len() {
        let v = sorted[i];
        out.push((v, (sorted.len() - i) as f64 / total));
        while i < sorted.len() && sorted[i] == v {
            i += 1;
        }
    }
    out
}
