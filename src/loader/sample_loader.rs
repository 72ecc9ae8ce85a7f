use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use groovestep::shared::InstrumentKey;

use crate::audio::{Kit, SampleBuffer};

// every .wav directly inside `dir`, sorted so instrument order is stable
pub fn index_wav_in_dir(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
        let path = entry?.path();
        let is_wav = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("wav"));
        if is_wav && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

// "Kick 01.wav" -> "kick 01"
pub fn instrument_key_for(path: &Path) -> Option<InstrumentKey> {
    let stem = path.file_stem()?.to_str()?.trim().to_lowercase();
    (!stem.is_empty()).then(|| InstrumentKey::new(stem))
}

/// Loads every WAV in `dir` as an instrument named after its file. Files
/// that fail to decode are skipped with a warning.
pub fn load_kit(dir: &Path, target_rate: u32) -> anyhow::Result<Kit> {
    let mut kit = Kit::new();
    for path in index_wav_in_dir(dir)? {
        let Some(key) = instrument_key_for(&path) else {
            continue;
        };
        match SampleBuffer::load_wav(&path, target_rate) {
            Ok(buffer) => {
                kit.insert(key, Arc::new(buffer));
            }
            Err(e) => log::warn!("skipping {}: {e:#}", path.display()),
        }
    }
    log::info!("loaded {} instrument(s) from {}", kit.len(), dir.display());
    Ok(kit)
}
