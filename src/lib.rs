//! Playback scheduling core for a 16-step groovebox.
//!
//! Data flows one way into the scheduler (pattern and song stores → sequencer
//! → trigger sink) and one way back for live capture (gesture → capture →
//! pattern store). The clock is the only source of schedule time.

pub mod audio_api;
pub mod clock;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod sequencer;
pub mod shared;

pub use audio_api::{AudioCommand, ChannelSink, CollectingSink, TriggerParams, TriggerSink};
pub use clock::{Clock, Firing, ScheduleHandle, Subdivision, Transport};
pub use config::SequencerConfig;
pub use error::{Result, SequencerError};
pub use sequencer::{PlaybackState, SectionAdvance, Sequencer, StepAdvance};
