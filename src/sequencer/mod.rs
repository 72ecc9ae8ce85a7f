// The sequencer ties the clock, the two stores and the trigger sink together.
//
// Playback is a small state machine (Stopped / TrackPlayback / SongPlayback)
// and `transition` is the only place registrations are made or dropped. The
// clock never calls back into us: `advance_to` pulls due firings and each one
// is dispatched against the store snapshots loaded at that moment, so an edit
// lands whole on the next firing or not at all.

pub mod capture;
pub mod pattern_player;
pub mod section_cycler;

pub use capture::{CaptureWrite, LiveCapture, NoteGesture, quantize};
pub use pattern_player::{PatternPlayer, fire_tracks, resolve_trigger};
pub use section_cycler::{SectionCycler, section_for_ticks};

use crate::audio_api::{TriggerParams, TriggerSink};
use crate::clock::{Clock, Firing, ScheduleHandle, Subdivision};
use crate::config::SequencerConfig;
use crate::error::{Result, SequencerError};
use crate::pipeline::pattern_store::PatternStore;
use crate::pipeline::project::ProjectSnapshot;
use crate::pipeline::shared_store::Shared;
use crate::pipeline::song::SongStore;
use crate::shared::{PatternGroupId, PerformanceTrackId, TICKS_PER_SIXTEENTH, Ticks, Time, TrackId};

pub const MAX_SWING: f64 = 0.95;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    TrackPlayback,
    SongPlayback,
}

/// Sent to step listeners. `step` is `None` once playback stops.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepAdvance {
    pub step: Option<usize>,
    pub time: Time,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SectionAdvance {
    pub section: usize,
    pub time: Time,
}

type StepListener = Box<dyn FnMut(StepAdvance)>;
type SectionListener = Box<dyn FnMut(SectionAdvance)>;

pub struct Sequencer<C: Clock, S: TriggerSink> {
    clock: C,
    sink: S,
    config: SequencerConfig,
    patterns: Shared<PatternStore>,
    song: Shared<SongStore>,
    state: PlaybackState,
    song_mode: bool,
    swing: f64,
    player: PatternPlayer,
    cycler: SectionCycler,
    capture: LiveCapture,
    step_listeners: Vec<StepListener>,
    section_listeners: Vec<SectionListener>,
}

impl<C: Clock, S: TriggerSink> Sequencer<C, S> {
    pub fn new(clock: C, sink: S, config: SequencerConfig) -> Self {
        Self::with_stores(clock, sink, config, PatternStore::new(), SongStore::new())
    }

    pub fn with_stores(
        clock: C,
        sink: S,
        config: SequencerConfig,
        patterns: PatternStore,
        song: SongStore,
    ) -> Self {
        let section = song.section_index();
        Self {
            clock,
            sink,
            config,
            patterns: Shared::new(patterns),
            song: Shared::new(song),
            state: PlaybackState::Stopped,
            song_mode: false,
            swing: 0.0,
            player: PatternPlayer::new(),
            cycler: SectionCycler::with_section(section),
            capture: LiveCapture::new(),
            step_listeners: Vec::new(),
            section_listeners: Vec::new(),
        }
    }

    /// Rebuilds everything from a saved project. The transport is parked at
    /// the saved section so song playback resumes there; playback restarts
    /// if the project was saved playing (and the engine is ready).
    pub fn from_snapshot(mut clock: C, sink: S, config: SequencerConfig, snapshot: &ProjectSnapshot) -> Self {
        if snapshot.bpm > 0.0 && snapshot.bpm.is_finite() {
            clock.set_bpm(snapshot.bpm);
        } else {
            log::warn!("ignoring saved tempo {}", snapshot.bpm);
        }
        let section_ticks = snapshot.section_index as Ticks * clock.ticks_per_measure();
        if section_ticks > 0 {
            clock.seek(section_ticks);
        }
        let mut seq = Self::with_stores(clock, sink, config, snapshot.pattern_store(), snapshot.song_store());
        seq.swing = snapshot.swing.clamp(0.0, MAX_SWING);
        seq.song_mode = snapshot.song_mode;
        if snapshot.subdivision != Subdivision::Sixteenth {
            log::warn!("steps always advance on sixteenths, ignoring {:?}", snapshot.subdivision);
        }
        log::info!(
            "restored project: {} track(s), {} group(s), {} song row(s)",
            snapshot.tracks.len(),
            snapshot.pattern_groups.len(),
            snapshot.song_rows.len()
        );
        if snapshot.is_playing {
            seq.play();
        }
        seq
    }

    pub fn snapshot(&self) -> ProjectSnapshot {
        let patterns = self.patterns.load();
        let song = self.song.load();
        ProjectSnapshot {
            bpm: self.clock.bpm(),
            subdivision: Subdivision::Sixteenth,
            swing: self.swing,
            tracks: patterns.tracks().to_vec(),
            pattern_groups: patterns.synced_groups(),
            song_rows: song.rows().to_vec(),
            performance_tracks: song.performance_tracks().to_vec(),
            selected_group_id: patterns.selected_group(),
            section_index: song.section_index(),
            is_playing: self.is_playing(),
            song_mode: self.song_mode,
        }
    }

    // ── accessors ────────────────────────────────────────────────────

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state != PlaybackState::Stopped
    }

    pub fn is_song_mode(&self) -> bool {
        self.song_mode
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn config(&self) -> &SequencerConfig {
        &self.config
    }

    pub fn patterns(&self) -> Shared<PatternStore> {
        self.patterns.clone()
    }

    pub fn song(&self) -> Shared<SongStore> {
        self.song.clone()
    }

    pub fn active_pattern_group(&self) -> Option<PatternGroupId> {
        self.patterns.load().selected_group()
    }

    pub fn current_step(&self) -> Option<usize> {
        self.player.current_step()
    }

    pub fn section_index(&self) -> usize {
        self.cycler.section()
    }

    pub fn step_handle(&self) -> Option<ScheduleHandle> {
        self.player.handle()
    }

    pub fn swing(&self) -> f64 {
        self.swing
    }

    pub fn capture(&self) -> &LiveCapture {
        &self.capture
    }

    // ── listeners ────────────────────────────────────────────────────

    pub fn on_step_advance(&mut self, listener: impl FnMut(StepAdvance) + 'static) {
        self.step_listeners.push(Box::new(listener));
    }

    pub fn on_section_advance(&mut self, listener: impl FnMut(SectionAdvance) + 'static) {
        self.section_listeners.push(Box::new(listener));
    }

    fn publish_step(&mut self, step: Option<usize>, time: Time) {
        for listener in &mut self.step_listeners {
            listener(StepAdvance { step, time });
        }
    }

    fn publish_section(&mut self, section: usize, time: Time) {
        self.song.update(|song| song.set_section_index(section));
        for listener in &mut self.section_listeners {
            listener(SectionAdvance { section, time });
        }
    }

    // ── transport ────────────────────────────────────────────────────

    // refuses while the engine can't render
    pub fn play(&mut self) -> bool {
        if self.is_playing() {
            return true;
        }
        if !self.sink.is_ready() {
            log::warn!("audio engine not ready, not starting playback");
            return false;
        }
        self.clock.start();
        self.transition(self.running_state());
        true
    }

    pub fn pause(&mut self) {
        if !self.is_playing() {
            return;
        }
        self.transition(PlaybackState::Stopped);
        self.clock.pause();
    }

    // also drops hits already handed to the engine, and rewinds
    pub fn stop(&mut self) {
        self.transition(PlaybackState::Stopped);
        self.clock.stop();
        self.sink.cancel_scheduled();
        if self.cycler.disengage(&mut self.clock) {
            let now = self.clock.now();
            self.publish_section(0, now);
        }
    }

    pub fn set_bpm(&mut self, bpm: f64) -> Result<()> {
        if !(bpm > 0.0 && bpm.is_finite()) {
            return Err(SequencerError::InvalidTempo(bpm));
        }
        self.clock.set_bpm(bpm);
        log::debug!("tempo set to {bpm}");
        Ok(())
    }

    pub fn set_swing(&mut self, swing: f64) {
        self.swing = swing.clamp(0.0, MAX_SWING);
    }

    // ── modes ────────────────────────────────────────────────────────

    /// Opens `id` for editing and, in track playback, plays it. Switching
    /// groups re-registers the step callback so the old group's tracks
    /// can't fire again.
    pub fn set_active_pattern_group(&mut self, id: PatternGroupId) -> Result<()> {
        self.patterns.try_update(|store| store.select_group(id))?;
        self.sync_active_group();
        Ok(())
    }

    pub fn enter_song_mode(&mut self) {
        if self.song_mode {
            return;
        }
        self.song_mode = true;
        if self.is_playing() {
            self.transition(PlaybackState::SongPlayback);
        }
    }

    pub fn exit_song_mode(&mut self) {
        if !self.song_mode {
            return;
        }
        self.song_mode = false;
        if self.is_playing() {
            self.transition(PlaybackState::TrackPlayback);
        }
        if self.cycler.disengage(&mut self.clock) {
            let now = self.clock.now();
            self.publish_section(0, now);
        }
    }

    fn running_state(&self) -> PlaybackState {
        if self.song_mode { PlaybackState::SongPlayback } else { PlaybackState::TrackPlayback }
    }

    // every registration change goes through here
    fn transition(&mut self, next: PlaybackState) {
        let prev = self.state;
        if prev == next {
            return;
        }
        match prev {
            PlaybackState::Stopped => {}
            PlaybackState::TrackPlayback => self.player.stop(&mut self.clock),
            PlaybackState::SongPlayback => {
                self.player.stop(&mut self.clock);
                self.cycler.suspend(&mut self.clock);
            }
        }
        self.state = next;
        match next {
            PlaybackState::Stopped => {
                let now = self.clock.now();
                self.publish_step(None, now);
            }
            PlaybackState::TrackPlayback => {
                let group = self.active_pattern_group();
                self.player.start(&mut self.clock, group);
            }
            PlaybackState::SongPlayback => {
                self.player.start(&mut self.clock, None);
                let span = self.song.load().section_span(self.clock.ticks_per_measure());
                if let Some(section) = self.cycler.engage(&mut self.clock, span) {
                    let now = self.clock.now();
                    self.publish_section(section, now);
                }
            }
        }
        log::info!("playback {prev:?} -> {next:?}");
    }

    fn sync_active_group(&mut self) {
        if self.state != PlaybackState::TrackPlayback {
            return;
        }
        let group = self.active_pattern_group();
        if self.player.retarget(&mut self.clock, group) {
            log::debug!("pattern group switched, step callback re-registered");
        }
    }

    // ── edits ────────────────────────────────────────────────────────

    /// Applies an edit to the pattern store as one whole-value swap. Song
    /// slots pointing at groups that no longer exist are nulled afterwards.
    pub fn edit_patterns<R>(&mut self, edit: impl FnOnce(&mut PatternStore) -> Result<R>) -> Result<R> {
        let out = self.patterns.try_update(edit)?;
        self.heal_song();
        self.sync_active_group();
        Ok(out)
    }

    pub fn edit_song<R>(&mut self, edit: impl FnOnce(&mut SongStore) -> Result<R>) -> Result<R> {
        let out = self.song.try_update(edit)?;
        self.heal_song();
        self.refresh_section_span();
        Ok(out)
    }

    fn heal_song(&mut self) {
        let patterns = self.patterns.load();
        let dangling = self.song.load().rows().iter().any(|row| {
            row.slots.iter().flatten().any(|id| !patterns.has_group(*id))
        });
        if !dangling {
            return;
        }
        let healed = self.song.update(|song| song.heal(|id| patterns.has_group(id)));
        log::info!("nulled {healed} song slot(s) pointing at deleted pattern groups");
    }

    fn refresh_section_span(&mut self) {
        if self.state != PlaybackState::SongPlayback {
            return;
        }
        let span = self.song.load().section_span(self.clock.ticks_per_measure());
        if let Some(section) = self.cycler.set_span(&mut self.clock, span) {
            let now = self.clock.now();
            self.publish_section(section, now);
        }
    }

    // ── capture ──────────────────────────────────────────────────────

    pub fn arm_capture(&mut self, target: Option<TrackId>) -> Result<()> {
        if let Some(id) = target {
            if self.patterns.load().track(id).is_none() {
                return Err(SequencerError::UnknownTrack(id));
            }
        }
        self.capture.arm(target);
        log::debug!("capture armed");
        Ok(())
    }

    pub fn arm_performance_capture(&mut self, target: PerformanceTrackId) -> Result<()> {
        if self.song.load().performance_track(target).is_none() {
            return Err(SequencerError::UnknownPerformanceTrack(target));
        }
        self.capture.arm_performance(target);
        log::debug!("performance capture armed");
        Ok(())
    }

    pub fn disarm_capture(&mut self) {
        self.capture.disarm();
        log::debug!("capture disarmed");
    }

    // length of the song loop in ticks, 0 for an empty song
    fn loop_ticks(&self) -> Ticks {
        let tpm = self.clock.ticks_per_measure();
        self.song.load().section_span(tpm) as Ticks * tpm
    }

    fn recording_performance(&self) -> bool {
        self.song_mode && self.capture.performance_target().is_some()
    }

    /// Handles a played note. While armed this writes the note into the open
    /// loop (or, in song mode with a performance target, starts a recorded
    /// note). Returns the grid write, if one happened.
    pub fn note_on(&mut self, gesture: &NoteGesture) -> Result<Option<CaptureWrite>> {
        if !self.capture.is_armed() {
            return Ok(None);
        }
        if self.recording_performance() {
            let at = self.clock.ticks_at_time(gesture.time);
            self.capture.note_on(gesture.note, gesture.velocity, at);
            return Ok(None);
        }
        let (capture, clock, config) = (&mut self.capture, &self.clock, &self.config);
        let write = self.patterns.try_update(|store| capture.capture(clock, store, gesture, config))?;
        self.heal_song();
        Ok(write)
    }

    pub fn note_off(&mut self, note: u8, time: Time) -> Result<()> {
        if !self.recording_performance() {
            return Ok(());
        }
        let at = self.clock.ticks_at_time(time);
        let loop_ticks = self.loop_ticks();
        if let Some((target, recorded)) = self.capture.note_off(note, at, loop_ticks) {
            self.song.try_update(|song| song.record_note(target, recorded))?;
            log::debug!("recorded performance note {note} at tick {}", recorded.start);
            self.refresh_section_span();
        }
        Ok(())
    }

    pub fn audition(&mut self, gesture: &NoteGesture) -> bool {
        let params = TriggerParams {
            note: Some(gesture.note),
            velocity: gesture.velocity,
            ..TriggerParams::at(gesture.time)
        };
        self.sink.trigger(&gesture.instrument, params)
    }

    // ── scheduling ───────────────────────────────────────────────────

    /// Moves the clock to `until` and handles every firing that came due,
    /// in time order. Returns the number of firings handled.
    pub fn advance_to(&mut self, until: Time) -> usize {
        let firings = self.clock.advance_to(until);
        let count = firings.len();
        for firing in firings {
            self.dispatch(&firing);
        }
        count
    }

    fn dispatch(&mut self, firing: &Firing) {
        if self.player.owns(firing.handle) {
            self.on_step(firing);
        } else if self.cycler.owns(firing.handle) {
            let tpm = self.clock.ticks_per_measure();
            if let Some(section) = self.cycler.on_firing(firing, tpm) {
                self.publish_section(section, firing.time);
            }
        }
    }

    // odd sixteenths are pushed back by a share of half a sixteenth
    fn swung_time(&self, firing: &Firing, step: usize) -> Time {
        if self.swing <= 0.0 || step % 2 == 0 {
            return firing.time;
        }
        let sixteenth = self.clock.time_at_ticks(firing.ticks + TICKS_PER_SIXTEENTH)
            - self.clock.time_at_ticks(firing.ticks);
        firing.time + self.swing * sixteenth * 0.5
    }

    fn on_step(&mut self, firing: &Firing) {
        let step = self.player.advance_step(firing.ticks);
        let time = self.swung_time(firing, step);
        let patterns = self.patterns.load();
        match self.state {
            PlaybackState::TrackPlayback => {
                if let Some(tracks) = self.player.group().and_then(|g| patterns.group_tracks(g)) {
                    fire_tracks(tracks, step, time, 1.0, &mut self.sink);
                }
            }
            PlaybackState::SongPlayback => {
                let song = self.song.load();
                let tpm = self.clock.ticks_per_measure();
                let span = song.section_span(tpm);
                if let Some(section) = section_for_ticks(firing.ticks, tpm, span) {
                    for entry in song.entries_for_section(section) {
                        if let Some(tracks) = patterns.group_tracks(entry.group) {
                            fire_tracks(tracks, step, time, entry.velocity, &mut self.sink);
                        }
                    }
                    self.play_performances(&song, firing, span as Ticks * tpm);
                }
            }
            PlaybackState::Stopped => return,
        }
        self.publish_step(Some(step), firing.time);
    }

    // performance notes starting inside this sixteenth, placed at their exact tick
    fn play_performances(&mut self, song: &SongStore, firing: &Firing, loop_ticks: Ticks) {
        if loop_ticks == 0 {
            return;
        }
        let position = firing.ticks % loop_ticks;
        let window = position..position + TICKS_PER_SIXTEENTH;
        let tick_secs = (self.clock.time_at_ticks(firing.ticks + TICKS_PER_SIXTEENTH) - firing.time)
            / TICKS_PER_SIXTEENTH as f64;
        for (track, row_velocity) in song.active_performances() {
            for note in track.notes_in(window.clone()) {
                let params = TriggerParams {
                    velocity: note.velocity * row_velocity,
                    note: Some(note.pitch),
                    sustain: Some(note.duration as f64 * tick_secs),
                    ..TriggerParams::at(firing.time + (note.start - position) as f64 * tick_secs)
                };
                if !self.sink.trigger(&track.instrument, params) {
                    log::debug!("performance instrument {} did not resolve", track.instrument);
                }
            }
        }
    }
}
