use crate::error::{Result, SandpileError};
use crate::grid::{CRITICAL, MAX_STABLE};
use serde::{Deserialize, Serialize};

/// Order in which pending unstable sites are drained.
/// The final configuration and topple counts do not depend on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WorklistDiscipline {
    /// Last in, first out
    #[default]
    Stack,
    /// First in, first out
    Queue,
    /// Uniformly random pending entry
    Shuffled,
}

impl WorklistDiscipline {
    pub fn name(&self) -> &str {
        match self {
            WorklistDiscipline::Stack => "Stack",
            WorklistDiscipline::Queue => "Queue",
            WorklistDiscipline::Shuffled => "Shuffled",
        }
    }

    pub fn all() -> [WorklistDiscipline; 3] {
        [
            WorklistDiscipline::Stack,
            WorklistDiscipline::Queue,
            WorklistDiscipline::Shuffled,
        ]
    }
}

/// How the avalanche record stream is written to disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    /// `area,volume` header then one record per line
    #[default]
    Csv,
    /// Two comma-separated list files, one for areas and one for volumes
    Legacy,
}

impl OutputFormat {
    pub fn name(&self) -> &str {
        match self {
            OutputFormat::Csv => "CSV",
            OutputFormat::Legacy => "Legacy",
        }
    }
}

/// All simulation settings consolidated into one struct
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSettings {
    /// Side length of the stored grid (interior is side-1 per axis)
    pub side: usize,
    /// Grains in every cell at creation (0-3)
    pub backphone: u32,
    /// Number of grains dropped by the driver
    pub injections: u64,
    /// Seed for the driver's random source
    pub seed: u64,
    /// Worklist pop order during relaxation
    pub discipline: WorklistDiscipline,
    /// Skip enqueueing a site that is already pending in the same wave
    pub dedup_pending: bool,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            side: 100,
            backphone: 3,
            injections: 1_000_000,
            seed: 1,
            discipline: WorklistDiscipline::default(),
            dedup_pending: false,
        }
    }
}

impl SimulationSettings {
    /// Reject settings that cannot start a run.
    pub fn validate(&self) -> Result<()> {
        if self.side < 3 {
            return Err(SandpileError::Config(format!(
                "grid side must be at least 3 to have an interior, got {}",
                self.side
            )));
        }
        // Snapshot headers store the side as i32
        if self.side > i32::MAX as usize {
            return Err(SandpileError::Config(format!(
                "grid side {} does not fit a snapshot header",
                self.side
            )));
        }
        if self.backphone > MAX_STABLE {
            return Err(SandpileError::Config(format!(
                "initial grain count must be below {}, got {}",
                CRITICAL, self.backphone
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let settings = SimulationSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.side, 100);
        assert_eq!(settings.backphone, 3);
    }

    #[test]
    fn test_validate_side() {
        for side in [0, 1, 2] {
            let settings = SimulationSettings {
                side,
                ..Default::default()
            };
            assert!(matches!(settings.validate(), Err(SandpileError::Config(_))));
        }
        let settings = SimulationSettings {
            side: 3,
            ..Default::default()
        };
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validate_backphone() {
        let settings = SimulationSettings {
            backphone: 4,
            ..Default::default()
        };
        assert!(matches!(settings.validate(), Err(SandpileError::Config(_))));
        let settings = SimulationSettings {
            backphone: 0,
            ..Default::default()
        };
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_discipline_names_are_distinct() {
        let all = WorklistDiscipline::all();
        assert_eq!(all[0], WorklistDiscipline::default());
        assert_eq!(all[1].name(), "Queue");
        assert_ne!(all[0].name(), all[2].name());
    }
}
