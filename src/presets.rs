use crate::config::RunConfig;
use crate::error::{Result, SandpileError};
use crate::settings::{SimulationSettings, WorklistDiscipline};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// A named preset containing simulation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub name: String,
    pub description: String,
    pub settings: SimulationSettings,
    #[serde(default)]
    pub burst: usize,
}

impl Preset {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        settings: SimulationSettings,
        burst: usize,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            settings,
            burst,
        }
    }

    /// Run configuration equivalent to this preset
    pub fn to_config(&self) -> RunConfig {
        RunConfig {
            settings: self.settings.clone(),
            burst: self.burst,
            ..Default::default()
        }
    }
}

/// Manager for loading and saving presets
pub struct PresetManager {
    /// Built-in presets that ship with the app
    pub builtin: Vec<Preset>,
    /// User-created presets loaded from disk
    pub user: Vec<Preset>,
    dir: Option<PathBuf>,
}

impl Default for PresetManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PresetManager {
    /// Built-ins plus anything saved in the user config directory
    pub fn new() -> Self {
        Self::with_dir(Self::default_dir())
    }

    /// Use `dir` for user presets instead of the config directory
    pub fn with_dir(dir: Option<PathBuf>) -> Self {
        let mut manager = Self {
            builtin: Vec::new(),
            user: Vec::new(),
            dir,
        };
        manager.load_builtin_presets();
        manager.load_user_presets();
        manager
    }

    fn load_builtin_presets(&mut self) {
        self.builtin = vec![
            Preset::new(
                "Classic",
                "Side 100, three grains everywhere, a million drops",
                SimulationSettings::default(),
                0,
            ),
            Preset::new(
                "Quick",
                "Small grid for a fast look at the statistics",
                SimulationSettings {
                    side: 50,
                    injections: 100_000,
                    ..Default::default()
                },
                0,
            ),
            // Has to build up to criticality before avalanches appear
            Preset::new(
                "Empty",
                "Start from an empty grid",
                SimulationSettings {
                    backphone: 0,
                    injections: 200_000,
                    ..Default::default()
                },
                0,
            ),
            Preset::new(
                "Burst",
                "Large grid with ten critical sites relaxed at once, no driving",
                SimulationSettings {
                    side: 1000,
                    injections: 0,
                    discipline: WorklistDiscipline::Stack,
                    ..Default::default()
                },
                10,
            ),
        ];
    }

    fn default_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("sandpile-simulation").join("presets"))
    }

    fn load_user_presets(&mut self) {
        let Some(dir) = self.dir.as_ref() else {
            return;
        };
        let Ok(entries) = fs::read_dir(dir) else {
            return;
        };
        for entry in entries.flatten() {
            if entry.path().extension().is_some_and(|e| e == "json") {
                match fs::read_to_string(entry.path())
                    .map_err(SandpileError::from)
                    .and_then(|content| Ok(serde_json::from_str::<Preset>(&content)?))
                {
                    Ok(preset) => self.user.push(preset),
                    Err(e) => log::warn!("skipping preset {}: {}", entry.path().display(), e),
                }
            }
        }
        self.user.sort_by(|a, b| a.name.cmp(&b.name));
    }

    fn preset_path(&self, name: &str) -> Result<PathBuf> {
        let dir = self
            .dir
            .as_ref()
            .ok_or_else(|| SandpileError::Config("could not determine config directory".into()))?;
        let filename = name
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect::<String>();
        Ok(dir.join(format!("{}.json", filename)))
    }

    /// Save a preset to disk, replacing a user preset of the same name
    pub fn save_preset(&mut self, preset: Preset) -> Result<PathBuf> {
        let path = self.preset_path(&preset.name)?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&path, serde_json::to_string_pretty(&preset)?)?;

        self.user.retain(|p| p.name != preset.name);
        self.user.push(preset);
        Ok(path)
    }

    /// Delete a user preset
    pub fn delete_preset(&mut self, name: &str) -> Result<()> {
        self.user.retain(|p| p.name != name);
        let path = self.preset_path(name)?;
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    /// Get all presets (builtin + user)
    pub fn all_presets(&self) -> impl Iterator<Item = &Preset> {
        self.builtin.iter().chain(self.user.iter())
    }

    /// Find a preset by name; user presets shadow built-ins
    pub fn find(&self, name: &str) -> Option<&Preset> {
        self.user
            .iter()
            .chain(self.builtin.iter())
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }
}
