// Pattern playback: a sixteenth-note registration on the clock and a step
// cursor derived from each firing's tick position. Per-step trigger
// resolution lives here too so song playback can reuse it.

use crate::audio_api::{TriggerParams, TriggerSink};
use crate::clock::{Clock, ScheduleHandle, Subdivision};
use crate::pipeline::pattern::Pattern;
use crate::pipeline::track::Track;
use crate::shared::{PatternGroupId, Ticks, Time, step_at_ticks};

#[derive(Debug, Default)]
pub struct PatternPlayer {
    handle: Option<ScheduleHandle>,
    // group this registration plays; None while the song decides
    group: Option<PatternGroupId>,
    current_step: Option<usize>,
}

impl PatternPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    pub fn handle(&self) -> Option<ScheduleHandle> {
        self.handle
    }

    pub fn group(&self) -> Option<PatternGroupId> {
        self.group
    }

    // none while stopped
    pub fn current_step(&self) -> Option<usize> {
        self.current_step
    }

    pub fn start(&mut self, clock: &mut impl Clock, group: Option<PatternGroupId>) -> ScheduleHandle {
        if let Some(handle) = self.handle.take() {
            clock.cancel(handle);
        }
        let handle = clock.schedule_repeating(Subdivision::Sixteenth);
        self.handle = Some(handle);
        self.group = group;
        handle
    }

    pub fn stop(&mut self, clock: &mut impl Clock) {
        if let Some(handle) = self.handle.take() {
            clock.cancel(handle);
        }
        self.current_step = None;
    }

    // only an actual group change re-registers
    pub fn retarget(&mut self, clock: &mut impl Clock, group: Option<PatternGroupId>) -> bool {
        if self.group == group {
            return false;
        }
        self.group = group;
        if self.handle.is_some() {
            self.start(clock, group);
            return true;
        }
        false
    }

    pub fn owns(&self, handle: ScheduleHandle) -> bool {
        self.handle == Some(handle)
    }

    // restarting from any transport position lands on the right step
    pub fn advance_step(&mut self, ticks: Ticks) -> usize {
        let step = step_at_ticks(ticks);
        self.current_step = Some(step);
        step
    }
}

pub fn resolve_trigger(
    track: &Track,
    pattern: &Pattern,
    step: usize,
    time: Time,
    velocity_scale: f32,
) -> Option<TriggerParams> {
    if !pattern.is_active(step) {
        return None;
    }
    let overrides = pattern.overrides();
    Some(TriggerParams {
        time,
        velocity: pattern.velocity(step) * velocity_scale,
        pitch_offset: pattern.pitch(step),
        note: overrides.note,
        sustain: overrides.sustain,
        overrides: overrides.clone(),
        character: track.character().map(str::to_owned),
    })
}

// returns how many triggers the sink accepted
pub fn fire_tracks<S: TriggerSink>(
    tracks: &[Track],
    step: usize,
    time: Time,
    velocity_scale: f32,
    sink: &mut S,
) -> usize {
    let mut fired = 0;
    for track in tracks {
        if track.muted {
            continue;
        }
        let Some(pattern) = track.pattern.as_ref() else {
            continue;
        };
        let Some(params) = resolve_trigger(track, pattern, step, time, velocity_scale) else {
            continue;
        };
        let Some(instrument) = track.trigger_key() else {
            log::debug!("track {} has no instrument, skipping step {step}", track.id);
            continue;
        };
        if sink.trigger(instrument, params) {
            fired += 1;
        } else {
            log::debug!("instrument {instrument} did not resolve, step {step} is silent");
        }
    }
    fired
}
