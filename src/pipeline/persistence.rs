// called on startup and quit; saves the project so we can reload it later
use std::path::{Path, PathBuf};

use anyhow::Context;

use super::project::ProjectSnapshot;

pub const DATA_DIR: &str = ".groovestep";
const PROJECT_FILE: &str = "project.json";

// <project_dir>/.groovestep/project.json
pub fn project_file_path(project_dir: &Path) -> PathBuf {
    project_dir.join(DATA_DIR).join(PROJECT_FILE)
}

pub fn load_project(project_dir: &Path) -> anyhow::Result<Option<ProjectSnapshot>> {
    let path = project_file_path(project_dir);
    if !path.exists() {
        return Ok(None);
    }
    let data = std::fs::read_to_string(&path)
        .with_context(|| format!("reading {}", path.display()))?;
    let snapshot = ProjectSnapshot::from_json(&data)
        .with_context(|| format!("parsing {}", path.display()))?;
    log::info!("loaded project from {}", path.display());
    Ok(Some(snapshot))
}

// makes .groovestep/ if it isn't there yet
pub fn save_project(project_dir: &Path, snapshot: &ProjectSnapshot) -> anyhow::Result<()> {
    let path = project_file_path(project_dir);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = snapshot.to_json()?;
    std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    log::info!("saved project to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("groovestep-persist-{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn missing_project_is_none() {
        assert!(load_project(&scratch_dir()).unwrap().is_none());
    }

    #[test]
    fn save_then_load() {
        let dir = scratch_dir();
        let mut snapshot = ProjectSnapshot::default();
        snapshot.bpm = 97.0;
        save_project(&dir, &snapshot).unwrap();
        let loaded = load_project(&dir).unwrap().unwrap();
        assert_eq!(loaded, snapshot);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
