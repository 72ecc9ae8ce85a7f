// Grid and timing constants every layer agrees on, plus the id types that
// cross the store/scheduler boundary.
//
// Musical time is counted in integer ticks at a fixed resolution (192 per
// quarter note), so a sixteenth is exactly 48 ticks and a 4/4 measure 768.
// Seconds only show up at the edges: the clock maps ticks to schedule time
// and the instrument engine maps schedule time to sample frames.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const STEPS_PER_PATTERN: usize = 16;
pub const PPQ: u64 = 192;
pub const BEATS_PER_MEASURE: u64 = 4;
pub const TICKS_PER_SIXTEENTH: u64 = PPQ / 4;
pub const TICKS_PER_MEASURE: u64 = PPQ * BEATS_PER_MEASURE;

// C4, the note a step plays when nothing overrides it
pub const DEFAULT_REFERENCE_NOTE: u8 = 60;

/// Schedule time in seconds on the clock's own timeline (not wall-clock).
pub type Time = f64;

pub type Ticks = u64;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(TrackId);
uuid_id!(
    /// Identity of a stored loop; song slots point at these.
    PatternGroupId
);
uuid_id!(PerformanceTrackId);

/// Opaque instrument reference. Only the instrument engine knows what it
/// resolves to; the scheduler just hands it back with each trigger.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstrumentKey(pub String);

impl InstrumentKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for InstrumentKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for InstrumentKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl fmt::Display for InstrumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// step index a grid-aligned tick position lands on
pub fn step_at_ticks(ticks: Ticks) -> usize {
    ((ticks / TICKS_PER_SIXTEENTH) % STEPS_PER_PATTERN as u64) as usize
}

const NOTE_NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];

pub fn note_name(note: u8) -> String {
    let octave = (note / 12) as i32 - 1;
    format!("{}{}", NOTE_NAMES[(note % 12) as usize], octave)
}

pub fn midi_to_freq(note: f32) -> f32 {
    440.0 * 2.0_f32.powf((note - 69.0) / 12.0)
}
