// Live capture. Grid capture snaps each note-on to the next sixteenth and
// writes it into the open loop; performance capture (song mode) records raw
// note-on/off pairs onto a performance track at the song position.

use std::collections::HashMap;

use crate::clock::Clock;
use crate::config::SequencerConfig;
use crate::error::Result;
use crate::pipeline::pattern_store::PatternStore;
use crate::pipeline::song::PerformanceNote;
use crate::pipeline::track::Track;
use crate::shared::{
    InstrumentKey, PerformanceTrackId, TICKS_PER_SIXTEENTH, Ticks, Time, TrackId, step_at_ticks,
};

/// A played note, as it arrives from a key press or an arpeggiator.
#[derive(Clone, Debug, PartialEq)]
pub struct NoteGesture {
    pub time: Time,
    pub note: u8,
    pub velocity: f32,
    pub instrument: InstrumentKey,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CaptureWrite {
    pub track: TrackId,
    pub step: usize,
    pub ticks: Ticks,
    pub time: Time,
    pub created_track: bool,
}

/// First sixteenth boundary at or after `time`. A boundary closer than
/// `epsilon` seconds counts as already passed, so a gesture landing right on
/// a boundary goes to the following one and never to both.
pub fn quantize(clock: &impl Clock, time: Time, epsilon: f64) -> Ticks {
    let mut boundary = clock.ticks_at_time(time).div_ceil(TICKS_PER_SIXTEENTH) * TICKS_PER_SIXTEENTH;
    if clock.time_at_ticks(boundary) - time < epsilon {
        boundary += TICKS_PER_SIXTEENTH;
    }
    boundary
}

#[derive(Debug, Default)]
pub struct LiveCapture {
    armed: bool,
    target: Option<TrackId>,
    performance: Option<PerformanceTrackId>,
    // note -> (transport tick, velocity) for notes still held
    held: HashMap<u8, (Ticks, f32)>,
}

impl LiveCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn target(&self) -> Option<TrackId> {
        self.target
    }

    pub fn performance_target(&self) -> Option<PerformanceTrackId> {
        self.performance
    }

    // `None` lets the first gesture pick or create the target
    pub fn arm(&mut self, target: Option<TrackId>) {
        self.armed = true;
        self.target = target;
        self.performance = None;
        self.held.clear();
    }

    pub fn arm_performance(&mut self, target: PerformanceTrackId) {
        self.armed = true;
        self.target = None;
        self.performance = Some(target);
        self.held.clear();
    }

    pub fn disarm(&mut self) {
        self.armed = false;
        self.target = None;
        self.performance = None;
        self.held.clear();
    }

    // armed target if it still exists, else the instrument's track, else a new one
    fn resolve_target(&mut self, store: &mut PatternStore, gesture: &NoteGesture) -> (TrackId, bool) {
        if let Some(id) = self.target.filter(|id| store.track(*id).is_some()) {
            return (id, false);
        }
        let (id, created) = match store.find_track_by_instrument(&gesture.instrument) {
            Some(id) => (id, false),
            None => {
                let name = gesture.instrument.to_string();
                (store.add_track(Track::new(name, gesture.instrument.clone())), true)
            }
        };
        self.target = Some(id);
        (id, created)
    }

    pub fn capture(
        &mut self,
        clock: &impl Clock,
        store: &mut PatternStore,
        gesture: &NoteGesture,
        config: &SequencerConfig,
    ) -> Result<Option<CaptureWrite>> {
        if !self.armed {
            return Ok(None);
        }
        let (track, created_track) = self.resolve_target(store, gesture);
        let ticks = quantize(clock, gesture.time, config.capture_epsilon);
        let step = step_at_ticks(ticks);
        let base = store
            .track(track)
            .map(|t| t.base_note(config.reference_note))
            .unwrap_or(config.reference_note);
        let pitch = i32::from(gesture.note) - i32::from(base);
        store.write_hit(track, step, gesture.velocity, pitch)?;
        log::debug!("captured note {} onto step {step} of track {track}", gesture.note);
        Ok(Some(CaptureWrite { track, step, ticks, time: clock.time_at_ticks(ticks), created_track }))
    }

    // false when not recording a performance
    pub fn note_on(&mut self, note: u8, velocity: f32, ticks: Ticks) -> bool {
        if !self.armed || self.performance.is_none() {
            return false;
        }
        self.held.insert(note, (ticks, velocity));
        true
    }

    // start is folded into the song loop, duration is taken from unwrapped
    // ticks so a note held across the loop end keeps its length
    pub fn note_off(
        &mut self,
        note: u8,
        ticks: Ticks,
        loop_ticks: Ticks,
    ) -> Option<(PerformanceTrackId, PerformanceNote)> {
        let target = self.performance?;
        let (held_at, velocity) = self.held.remove(&note)?;
        let start = if loop_ticks == 0 { held_at } else { held_at % loop_ticks };
        let duration = ticks.saturating_sub(held_at).max(1);
        Some((target, PerformanceNote { start, duration, pitch: note, velocity }))
    }
}
