// The plain value a project is saved as. Everything the sequencer needs to
// rebuild itself is in here; nothing else is persisted.

use serde::{Deserialize, Serialize};

use super::pattern_store::{PatternGroup, PatternStore};
use super::song::{PerformanceTrack, SongRow, SongStore};
use super::track::Track;
use crate::clock::Subdivision;
use crate::shared::PatternGroupId;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSnapshot {
    pub bpm: f64,
    #[serde(default)]
    pub subdivision: Subdivision,
    #[serde(default)]
    pub swing: f64,
    // the open loop's working set
    #[serde(default)]
    pub tracks: Vec<Track>,
    #[serde(default)]
    pub pattern_groups: Vec<PatternGroup>,
    #[serde(default)]
    pub song_rows: Vec<SongRow>,
    #[serde(default)]
    pub performance_tracks: Vec<PerformanceTrack>,
    #[serde(default)]
    pub selected_group_id: Option<PatternGroupId>,
    #[serde(default)]
    pub section_index: usize,
    #[serde(default)]
    pub is_playing: bool,
    #[serde(default)]
    pub song_mode: bool,
}

impl Default for ProjectSnapshot {
    fn default() -> Self {
        let patterns = PatternStore::new();
        Self {
            bpm: 120.0,
            subdivision: Subdivision::Sixteenth,
            swing: 0.0,
            tracks: Vec::new(),
            pattern_groups: patterns.synced_groups(),
            song_rows: Vec::new(),
            performance_tracks: Vec::new(),
            selected_group_id: patterns.selected_group(),
            section_index: 0,
            is_playing: false,
            song_mode: false,
        }
    }
}

impl ProjectSnapshot {
    pub fn pattern_store(&self) -> PatternStore {
        PatternStore::from_parts(
            self.tracks.clone(),
            self.pattern_groups.clone(),
            self.selected_group_id,
        )
    }

    // dangling slots already nulled
    pub fn song_store(&self) -> SongStore {
        let mut song = SongStore::from_parts(
            self.song_rows.clone(),
            self.performance_tracks.clone(),
            self.section_index,
        );
        let healed = song.heal(|id| self.pattern_groups.iter().any(|g| g.id == id));
        if healed > 0 {
            log::info!("dropped {healed} song slot(s) pointing at deleted pattern groups");
        }
        song
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(data: &str) -> serde_json::Result<Self> {
        serde_json::from_str(data)
    }
}
