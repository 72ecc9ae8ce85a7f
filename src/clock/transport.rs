use super::{Clock, Firing, ScheduleHandle, Subdivision};
use crate::shared::{PPQ, Ticks, Time};

// ticks
const BOUNDARY_SNAP: f64 = 1e-6;

#[derive(Clone, Debug)]
struct Repeating {
    handle: ScheduleHandle,
    interval: Ticks,
    next_tick: Ticks,
}

/// Tempo-mapped tick transport. Time only moves when the owner calls
/// `advance_to`, so the same transport drives the audio loop (advanced from
/// the device's frame counter) and tests (advanced by hand).
///
/// Position is anchored: `ticks(t) = anchor_ticks + (t - anchor_time) * rate`
/// while running. Tempo changes, pauses and seeks re-anchor at `now`, which
/// keeps already-returned firings valid and only bends the future.
#[derive(Clone, Debug)]
pub struct Transport {
    bpm: f64,
    now: Time,
    running: bool,
    anchor_time: Time,
    anchor_ticks: f64,
    next_handle: u64,
    schedules: Vec<Repeating>,
}

impl Transport {
    pub fn new(bpm: f64) -> Self {
        Self {
            bpm: if bpm > 0.0 { bpm } else { 120.0 },
            now: 0.0,
            running: false,
            anchor_time: 0.0,
            anchor_ticks: 0.0,
            next_handle: 0,
            schedules: Vec::new(),
        }
    }

    fn ticks_per_second(&self) -> f64 {
        self.bpm / 60.0 * PPQ as f64
    }

    // fractional position at `time`
    fn position_at(&self, time: Time) -> f64 {
        if self.running {
            self.anchor_ticks + (time - self.anchor_time).max(0.0) * self.ticks_per_second()
        } else {
            self.anchor_ticks
        }
    }

    fn reanchor(&mut self) {
        self.anchor_ticks = self.position_at(self.now);
        self.anchor_time = self.now;
    }

    // a position within BOUNDARY_SNAP of a boundary counts as on it, so float
    // drift in the anchor never skips a step
    fn first_boundary(position: f64, interval: Ticks) -> Ticks {
        let slots = position / interval as f64;
        let nearest = slots.round();
        let slot = if (position - nearest * interval as f64).abs() < BOUNDARY_SNAP {
            nearest
        } else {
            slots.ceil()
        };
        (slot.max(0.0) as Ticks) * interval
    }

    // after a jump in position every registration restarts from the next boundary
    fn realign(&mut self) {
        let position = self.anchor_ticks;
        for schedule in &mut self.schedules {
            schedule.next_tick = Self::first_boundary(position, schedule.interval);
        }
    }

    pub fn registrations(&self) -> usize {
        self.schedules.len()
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self::new(120.0)
    }
}

impl Clock for Transport {
    fn now(&self) -> Time {
        self.now
    }

    fn bpm(&self) -> f64 {
        self.bpm
    }

    fn set_bpm(&mut self, bpm: f64) {
        if bpm <= 0.0 || !bpm.is_finite() {
            return;
        }
        self.reanchor();
        self.bpm = bpm;
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn start(&mut self) {
        if self.running {
            return;
        }
        self.anchor_time = self.now;
        self.running = true;
    }

    fn pause(&mut self) {
        if !self.running {
            return;
        }
        self.reanchor();
        self.running = false;
    }

    fn stop(&mut self) {
        self.running = false;
        self.anchor_ticks = 0.0;
        self.anchor_time = self.now;
        self.realign();
    }

    fn seek(&mut self, ticks: Ticks) {
        self.anchor_ticks = ticks as f64;
        self.anchor_time = self.now;
        self.realign();
    }

    fn schedule_repeating(&mut self, subdivision: Subdivision) -> ScheduleHandle {
        let handle = ScheduleHandle(self.next_handle);
        self.next_handle += 1;
        let interval = subdivision.ticks();
        let next_tick = Self::first_boundary(self.position_at(self.now), interval);
        self.schedules.push(Repeating { handle, interval, next_tick });
        handle
    }

    fn cancel(&mut self, handle: ScheduleHandle) {
        self.schedules.retain(|s| s.handle != handle);
    }

    fn ticks_at_time(&self, time: Time) -> Ticks {
        self.position_at(time).max(0.0).floor() as Ticks
    }

    fn time_at_ticks(&self, ticks: Ticks) -> Time {
        // while stopped, answer as if playback started right now
        let base = if self.running { self.anchor_time } else { self.now };
        base + (ticks as f64 - self.anchor_ticks) / self.ticks_per_second()
    }

    fn advance_to(&mut self, until: Time) -> Vec<Firing> {
        let mut due = Vec::new();
        if until <= self.now {
            return due;
        }
        if self.running {
            loop {
                // earliest next tick; ties go to the older registration
                let Some(idx) = self
                    .schedules
                    .iter()
                    .enumerate()
                    .min_by_key(|(i, s)| (s.next_tick, *i))
                    .map(|(i, _)| i)
                else {
                    break;
                };
                let tick = self.schedules[idx].next_tick;
                let time = self.time_at_ticks(tick);
                if time >= until {
                    break;
                }
                let schedule = &mut self.schedules[idx];
                due.push(Firing { handle: schedule.handle, time, ticks: tick });
                schedule.next_tick += schedule.interval;
            }
        }
        self.now = until;
        due
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn sixteenths_at_120_bpm_are_an_eighth_of_a_second_apart() {
        let mut t = Transport::new(120.0);
        let h = t.schedule_repeating(Subdivision::Sixteenth);
        t.start();
        let firings = t.advance_to(1.0);
        assert_eq!(firings.len(), 8);
        for (i, f) in firings.iter().enumerate() {
            assert_eq!(f.handle, h);
            assert_eq!(f.ticks, i as u64 * 48);
            assert_relative_eq!(f.time, i as f64 * 0.125);
        }
    }

    #[test]
    fn boundary_survives_float_drift() {
        assert_eq!(Transport::first_boundary(96.000_000_000_01, 48), 96);
        assert_eq!(Transport::first_boundary(95.999_999_999_99, 48), 96);
        assert_eq!(Transport::first_boundary(96.5, 48), 144);
        assert_eq!(Transport::first_boundary(0.0, 48), 0);
        assert_eq!(Transport::first_boundary(1.0, 768), 768);
    }

    #[test]
    fn window_is_half_open() {
        let mut t = Transport::new(120.0);
        t.schedule_repeating(Subdivision::Sixteenth);
        t.start();
        assert_eq!(t.advance_to(0.125).len(), 1);
        // the boundary at 0.125 belongs to the next window
        let next = t.advance_to(0.25);
        assert_eq!(next.len(), 1);
        assert_relative_eq!(next[0].time, 0.125);
    }

    #[test]
    fn nothing_fires_while_stopped() {
        let mut t = Transport::new(120.0);
        t.schedule_repeating(Subdivision::Sixteenth);
        assert!(t.advance_to(2.0).is_empty());
        assert_eq!(t.current_ticks(), 0);
    }

    #[test]
    fn cancel_is_immediate() {
        let mut t = Transport::new(120.0);
        let h = t.schedule_repeating(Subdivision::Sixteenth);
        t.start();
        t.advance_to(0.3);
        t.cancel(h);
        assert!(t.advance_to(5.0).is_empty());
    }

    #[test]
    fn late_registration_aligns_to_next_boundary() {
        let mut t = Transport::new(120.0);
        t.start();
        t.advance_to(0.2); // tick 76.8
        t.schedule_repeating(Subdivision::Sixteenth);
        let firings = t.advance_to(0.5);
        assert_eq!(firings[0].ticks, 96);
        assert_relative_eq!(firings[0].time, 0.25);
    }

    #[test]
    fn pause_keeps_position_stop_rewinds() {
        let mut t = Transport::new(120.0);
        let h = t.schedule_repeating(Subdivision::Measure);
        t.start();
        t.advance_to(3.0); // 1.5 measures
        t.pause();
        assert_eq!(t.current_ticks(), 1152);
        t.advance_to(10.0);
        assert_eq!(t.current_ticks(), 1152);
        t.start();
        let firings = t.advance_to(11.5);
        assert_eq!(firings.len(), 1);
        assert_eq!(firings[0].handle, h);
        assert_eq!(firings[0].ticks, 1536);
        assert_relative_eq!(firings[0].time, 11.0);

        t.stop();
        assert_eq!(t.current_ticks(), 0);
        t.start();
        let firings = t.advance_to(12.0);
        assert_eq!(firings[0].ticks, 0);
        assert_relative_eq!(firings[0].time, 11.5);
    }

    #[test]
    fn tempo_change_bends_only_the_future() {
        let mut t = Transport::new(120.0);
        t.schedule_repeating(Subdivision::Quarter);
        t.start();
        let before = t.advance_to(1.0);
        assert_eq!(before.len(), 2);
        t.set_bpm(60.0);
        let after = t.advance_to(3.0);
        // tick 384 is exactly at the anchor, then one beat per second
        assert_eq!(after.iter().map(|f| f.ticks).collect::<Vec<_>>(), vec![384, 576]);
        assert_relative_eq!(after[0].time, 1.0);
        assert_relative_eq!(after[1].time, 2.0);
    }

    #[test]
    fn ties_fire_in_registration_order() {
        let mut t = Transport::new(120.0);
        let measure = t.schedule_repeating(Subdivision::Measure);
        let step = t.schedule_repeating(Subdivision::Sixteenth);
        t.start();
        let firings = t.advance_to(0.1);
        assert_eq!(firings.iter().map(|f| f.handle).collect::<Vec<_>>(), vec![measure, step]);
    }

    #[test]
    fn seek_moves_position() {
        let mut t = Transport::new(120.0);
        t.seek(768 * 2);
        assert_eq!(t.current_ticks(), 1536);
        t.schedule_repeating(Subdivision::Measure);
        t.start();
        let firings = t.advance_to(0.5);
        assert_eq!(firings[0].ticks, 1536);
    }
}
