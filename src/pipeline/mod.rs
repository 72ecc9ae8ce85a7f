// Data layer: the stores the sequencer reads and the ui edits, plus the
// snapshot they are saved as.

pub mod pattern;
pub mod pattern_store;
pub mod persistence;
pub mod project;
pub mod shared_store;
pub mod song;
pub mod track;

pub use pattern::{Pattern, PatternOverrides};
pub use pattern_store::{PatternGroup, PatternStore};
pub use project::ProjectSnapshot;
pub use shared_store::Shared;
pub use song::{PerformanceNote, PerformanceTrack, SectionEntry, SongRow, SongStore};
pub use track::{Track, TrackSource};
