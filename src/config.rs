use crate::error::Result;
use crate::settings::{OutputFormat, SimulationSettings};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Complete run configuration for export/import
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Version field for future compatibility
    pub version: u32,
    /// All simulation settings
    pub settings: SimulationSettings,
    /// Sites set critical and relaxed before driving (0 = none)
    #[serde(default)]
    pub burst: usize,
    /// Record stream format
    #[serde(default)]
    pub format: OutputFormat,
}

impl RunConfig {
    /// Export config to a JSON file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Import config from a JSON file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            version: 1,
            settings: SimulationSettings::default(),
            burst: 0,
            format: OutputFormat::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SandpileError;
    use crate::settings::WorklistDiscipline;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = RunConfig {
            version: 1,
            settings: SimulationSettings {
                side: 64,
                backphone: 2,
                injections: 12_345,
                seed: 99,
                discipline: WorklistDiscipline::Shuffled,
                dedup_pending: true,
            },
            burst: 10,
            format: OutputFormat::Legacy,
        };

        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: RunConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_config_file_save_and_load() {
        let config = RunConfig::default();

        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_path_buf();

        config.save_to_file(&path).unwrap();
        let loaded = RunConfig::load_from_file(&path).unwrap();

        assert_eq!(loaded.version, config.version);
        assert_eq!(loaded.settings, config.settings);
    }

    #[test]
    fn test_optional_fields_default() {
        let json = r#"{
            "version": 1,
            "settings": {
                "side": 50,
                "backphone": 3,
                "injections": 100,
                "seed": 4,
                "discipline": "Queue",
                "dedup_pending": false
            }
        }"#;
        let parsed: RunConfig = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.burst, 0);
        assert_eq!(parsed.format, OutputFormat::Csv);
        assert_eq!(parsed.settings.discipline, WorklistDiscipline::Queue);
    }

    #[test]
    fn test_invalid_config_file() {
        let temp_file = NamedTempFile::new().unwrap();
        std::fs::write(temp_file.path(), "not valid json").unwrap();

        let result = RunConfig::load_from_file(temp_file.path());
        assert!(matches!(result, Err(SandpileError::Json(_))));
    }

    #[test]
    fn test_missing_config_file() {
        let result = RunConfig::load_from_file(Path::new("/nonexistent/path/config.json"));
        assert!(matches!(result, Err(SandpileError::Io(_))));
    }
}
