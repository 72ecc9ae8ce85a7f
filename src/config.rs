// Tunables that aren't part of the project itself. Lives next to the
// project file as <project>/.groovestep/config.json; every field is optional.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::pipeline::persistence::DATA_DIR;
use crate::shared::DEFAULT_REFERENCE_NOTE;

const CONFIG_FILE: &str = "config.json";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerConfig {
    /// Seconds. A capture landing this close to a grid boundary is written
    /// to the following boundary instead.
    pub capture_epsilon: f64,
    // seconds
    pub lookahead: f64,
    /// Captured pitches are stored relative to this unless the track's
    /// pattern overrides its base note.
    pub reference_note: u8,
    pub default_bpm: f64,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            capture_epsilon: 0.001,
            lookahead: 0.1,
            reference_note: DEFAULT_REFERENCE_NOTE,
            default_bpm: 120.0,
        }
    }
}

fn config_file_path(project_dir: &Path) -> PathBuf {
    project_dir.join(DATA_DIR).join(CONFIG_FILE)
}

impl SequencerConfig {
    // missing file is fine, a malformed one is not
    pub fn load(project_dir: &Path) -> Result<Self> {
        let path = config_file_path(project_dir);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        let config = serde_json::from_str(&data)?;
        log::info!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, project_dir: &Path) -> Result<()> {
        let path = config_file_path(project_dir);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
