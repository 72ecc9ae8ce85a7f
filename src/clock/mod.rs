// Clock adapter. The only place schedule time comes from.
//
// Repeating registrations don't carry closures: `advance_to` hands back the
// firings that came due, in time order, and the owner of each handle reacts
// to its own. That keeps the scheduler's state in one place instead of
// captured by callbacks that outlive it.

mod transport;

pub use transport::Transport;

use serde::{Deserialize, Serialize};

use crate::shared::{TICKS_PER_MEASURE, TICKS_PER_SIXTEENTH, Ticks, Time};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Subdivision {
    #[serde(rename = "16n")]
    Sixteenth,
    #[serde(rename = "8n")]
    Eighth,
    #[serde(rename = "4n")]
    Quarter,
    #[serde(rename = "1m")]
    Measure,
}

impl Subdivision {
    pub fn ticks(self) -> Ticks {
        match self {
            Subdivision::Sixteenth => TICKS_PER_SIXTEENTH,
            Subdivision::Eighth => TICKS_PER_SIXTEENTH * 2,
            Subdivision::Quarter => TICKS_PER_SIXTEENTH * 4,
            Subdivision::Measure => TICKS_PER_MEASURE,
        }
    }
}

impl Default for Subdivision {
    fn default() -> Self {
        Subdivision::Sixteenth
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ScheduleHandle(pub(crate) u64);

/// One due occurrence of a repeating registration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Firing {
    pub handle: ScheduleHandle,
    pub time: Time,
    /// Exact grid position of this firing; equal to `ticks_at_time(time)`
    /// without the float round trip.
    pub ticks: Ticks,
}

pub trait Clock {
    /// Current schedulable time; everything before it has been handed out.
    fn now(&self) -> Time;

    fn bpm(&self) -> f64;
    fn set_bpm(&mut self, bpm: f64);

    fn is_running(&self) -> bool;
    fn start(&mut self);
    /// Halts firings and keeps the position.
    fn pause(&mut self);
    /// Halts firings and rewinds to tick 0.
    fn stop(&mut self);
    fn seek(&mut self, ticks: Ticks);

    /// Registers a repeating firing on every `subdivision` boundary at or
    /// after the current position, until cancelled.
    fn schedule_repeating(&mut self, subdivision: Subdivision) -> ScheduleHandle;
    fn cancel(&mut self, handle: ScheduleHandle);

    fn ticks_at_time(&self, time: Time) -> Ticks;
    fn time_at_ticks(&self, ticks: Ticks) -> Time;

    fn current_ticks(&self) -> Ticks {
        self.ticks_at_time(self.now())
    }

    fn ticks_per_measure(&self) -> Ticks {
        TICKS_PER_MEASURE
    }

    /// Moves the clock forward and returns every firing with
    /// `now <= time < until`, ordered by time then registration order.
    fn advance_to(&mut self, until: Time) -> Vec<Firing>;
}
