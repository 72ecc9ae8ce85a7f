// sits between the tui and the sequencer: turns input events into sequencer
// operations, keeps the ui-only state (cursor, selected track) and builds the
// display snapshot each frame

use std::collections::VecDeque;

use crossbeam_channel::{Receiver, Sender};

use groovestep::pipeline::{Pattern, ProjectSnapshot, Track};
use groovestep::sequencer::NoteGesture;
use groovestep::shared::{InstrumentKey, STEPS_PER_PATTERN, Time, TrackId, note_name};
use groovestep::{ChannelSink, Clock, SectionAdvance, Sequencer, StepAdvance, Transport};

use crate::tui::mode::{DisplayState, InputEvent, LedState, TrackRow};

// C major from C4, one note per home-row key
const SCALE: [u8; 8] = [60, 62, 64, 65, 67, 69, 71, 72];
const NOTE_VELOCITY: f32 = 0.8;
const BPM_STEP: f64 = 5.0;
const FALLBACK_INSTRUMENT: &str = "keys";

pub type AppSequencer = Sequencer<Transport, ChannelSink>;

pub struct Middle {
    pub sequencer: AppSequencer,
    lookahead: f64,
    cursor_step: usize,
    selected_track: usize,
    current_step: Option<usize>,
    // steps handed out ahead of the audio clock, not heard yet
    upcoming: VecDeque<StepAdvance>,
    section: usize,
    step_rx: Receiver<StepAdvance>,
    section_rx: Receiver<SectionAdvance>,
    status: String,
}

impl Middle {
    pub fn new(mut sequencer: AppSequencer) -> Self {
        let (step_tx, step_rx) = crossbeam_channel::unbounded();
        let (section_tx, section_rx) = crossbeam_channel::unbounded();
        sequencer.on_step_advance(forward(step_tx));
        sequencer.on_section_advance(forward(section_tx));
        let lookahead = sequencer.config().lookahead;
        let section = sequencer.section_index();
        Self {
            sequencer,
            lookahead,
            cursor_step: 0,
            selected_track: 0,
            current_step: None,
            upcoming: VecDeque::new(),
            section,
            step_rx,
            section_rx,
            status: String::new(),
        }
    }

    pub fn snapshot(&self) -> ProjectSnapshot {
        self.sequencer.snapshot()
    }

    // schedules up to audio_time + lookahead, then shows the steps already sounding
    pub fn tick(&mut self, audio_time: Time) {
        self.sequencer.advance_to(audio_time + self.lookahead);
        self.upcoming.extend(self.step_rx.try_iter());
        while let Some(adv) = self.upcoming.front().filter(|adv| adv.time <= audio_time) {
            self.current_step = adv.step;
            self.upcoming.pop_front();
        }
        while let Ok(adv) = self.section_rx.try_recv() {
            self.section = adv.section;
        }
    }

    fn selected_track_id(&self) -> Option<TrackId> {
        self.sequencer.patterns().load().tracks().get(self.selected_track).map(|t| t.id)
    }

    fn report(&mut self, result: groovestep::Result<()>) {
        if let Err(e) = result {
            log::warn!("{e}");
            self.status = e.to_string();
        }
    }

    fn gesture(&self, idx: usize, time: Time) -> Option<NoteGesture> {
        let note = *SCALE.get(idx)?;
        let patterns = self.sequencer.patterns().load();
        let instrument = patterns
            .tracks()
            .get(self.selected_track)
            .and_then(|t| t.trigger_key().cloned())
            .unwrap_or_else(|| InstrumentKey::from(FALLBACK_INSTRUMENT));
        Some(NoteGesture { time, note, velocity: NOTE_VELOCITY, instrument })
    }

    pub fn handle_input(&mut self, event: InputEvent, audio_time: Time) {
        match event {
            InputEvent::PlayPause => {
                if self.sequencer.is_playing() {
                    self.sequencer.pause();
                    self.status = "paused".into();
                } else if !self.sequencer.play() {
                    self.status = "audio engine not ready yet".into();
                } else {
                    self.status.clear();
                }
            }
            InputEvent::Stop => {
                self.sequencer.stop();
                self.upcoming.clear();
                self.current_step = None;
            }
            InputEvent::ToggleSongMode => {
                if self.sequencer.is_song_mode() {
                    self.sequencer.exit_song_mode();
                } else {
                    let result = self.ensure_song();
                    self.report(result);
                    self.sequencer.enter_song_mode();
                }
            }
            InputEvent::ToggleCapture => {
                if self.sequencer.capture().is_armed() {
                    self.sequencer.disarm_capture();
                } else {
                    let target = self.selected_track_id();
                    let result = self.sequencer.arm_capture(target);
                    self.report(result);
                }
            }
            InputEvent::NoteOn(idx) => {
                let Some(gesture) = self.gesture(idx, audio_time) else {
                    return;
                };
                self.sequencer.audition(&gesture);
                match self.sequencer.note_on(&gesture) {
                    Ok(Some(write)) => {
                        self.status = format!("{} -> step {}", note_name(gesture.note), write.step + 1);
                        if write.created_track {
                            self.selected_track = self.sequencer.patterns().load().tracks().len().saturating_sub(1);
                        }
                    }
                    Ok(None) => {}
                    Err(e) => self.report(Err(e)),
                }
            }
            InputEvent::NoteOff(idx) => {
                if let Some(&note) = SCALE.get(idx) {
                    let result = self.sequencer.note_off(note, audio_time);
                    self.report(result);
                }
            }
            InputEvent::CursorLeft => {
                self.cursor_step = (self.cursor_step + STEPS_PER_PATTERN - 1) % STEPS_PER_PATTERN;
            }
            InputEvent::CursorRight => self.cursor_step = (self.cursor_step + 1) % STEPS_PER_PATTERN,
            InputEvent::TrackUp => self.selected_track = self.selected_track.saturating_sub(1),
            InputEvent::TrackDown => {
                let count = self.sequencer.patterns().load().tracks().len();
                if self.selected_track + 1 < count {
                    self.selected_track += 1;
                }
            }
            InputEvent::ToggleStep => {
                if let Some(id) = self.selected_track_id() {
                    let step = self.cursor_step;
                    let result = self.sequencer.edit_patterns(|s| s.toggle_step(id, step).map(|_| ()));
                    self.report(result);
                }
            }
            InputEvent::ToggleMute => {
                if let Some(id) = self.selected_track_id() {
                    let result = self.sequencer.edit_patterns(|s| s.toggle_mute(id).map(|_| ()));
                    self.report(result);
                }
            }
            InputEvent::BpmDown | InputEvent::BpmUp => {
                let delta = if event == InputEvent::BpmUp { BPM_STEP } else { -BPM_STEP };
                let bpm = (self.sequencer.clock().bpm() + delta).clamp(30.0, 300.0);
                let result = self.sequencer.set_bpm(bpm);
                self.report(result);
            }
            InputEvent::NewGroup => {
                let count = self.sequencer.patterns().load().groups().len();
                let result = self
                    .sequencer
                    .edit_patterns(|s| Ok(s.new_group(format!("Pattern {}", count + 1))))
                    .and_then(|id| self.sequencer.set_active_pattern_group(id));
                self.report(result);
            }
            InputEvent::NextGroup => {
                let result = self.cycle_group();
                self.report(result);
            }
            InputEvent::Quit => {} // main saves and exits
        }
    }

    fn cycle_group(&mut self) -> groovestep::Result<()> {
        let patterns = self.sequencer.patterns().load();
        let groups = patterns.groups();
        let Some(current) = patterns.selected_group() else {
            return Ok(());
        };
        let idx = groups.iter().position(|g| g.id == current).unwrap_or(0);
        let Some(next) = groups.get((idx + 1) % groups.len().max(1)).map(|g| g.id) else {
            return Ok(());
        };
        self.sequencer.set_active_pattern_group(next)
    }

    // an empty song gets one row playing every group once, in order
    fn ensure_song(&mut self) -> groovestep::Result<()> {
        if !self.sequencer.song().load().rows().is_empty() {
            return Ok(());
        }
        let groups: Vec<_> = self.sequencer.patterns().load().groups().iter().map(|g| g.id).collect();
        self.sequencer.edit_song(|song| {
            let row = song.add_row();
            for (section, id) in groups.into_iter().enumerate() {
                song.set_slot(row, section, Some(id))?;
            }
            Ok(())
        })
    }

    pub fn display_state(&self) -> DisplayState {
        let patterns = self.sequencer.patterns().load();
        let song = self.sequencer.song().load();
        let selected = patterns.selected_group();
        let group_index = patterns.groups().iter().position(|g| Some(g.id) == selected).unwrap_or(0);
        let group_name = patterns.groups().get(group_index).map(|g| g.name.clone()).unwrap_or_default();
        let tracks = patterns
            .tracks()
            .iter()
            .enumerate()
            .map(|(i, track)| TrackRow {
                name: track.name.clone(),
                muted: track.muted,
                leds: (0..STEPS_PER_PATTERN)
                    .map(|step| {
                        let on = track.pattern.as_ref().is_some_and(|p| p.is_active(step));
                        if self.current_step == Some(step) {
                            LedState::Playhead
                        } else if on {
                            LedState::On
                        } else if i == self.selected_track && step == self.cursor_step {
                            LedState::Cursor
                        } else {
                            LedState::Off
                        }
                    })
                    .collect(),
            })
            .collect();
        DisplayState {
            playing: self.sequencer.is_playing(),
            song_mode: self.sequencer.is_song_mode(),
            capture_armed: self.sequencer.capture().is_armed(),
            bpm: self.sequencer.clock().bpm(),
            current_step: self.current_step,
            section: self.section,
            section_span: song.section_span(self.sequencer.clock().ticks_per_measure()),
            group_name,
            group_index,
            group_count: patterns.groups().len(),
            tracks,
            selected_track: self.selected_track,
            cursor_step: self.cursor_step,
            status: self.status.clone(),
        }
    }
}

fn forward<T: 'static>(tx: Sender<T>) -> impl FnMut(T) + 'static {
    move |value| {
        let _ = tx.send(value);
    }
}

/// A new project: one track per kit instrument (or a few tone instruments
/// when there is no kit) and a basic beat to start from.
pub fn starter_project(bpm: f64, instruments: &[InstrumentKey]) -> ProjectSnapshot {
    let defaults: Vec<InstrumentKey> = ["kick", "snare", "hat", FALLBACK_INSTRUMENT]
        .into_iter()
        .map(InstrumentKey::from)
        .collect();
    let names = if instruments.is_empty() { &defaults[..] } else { instruments };
    let beats: [&[usize]; 3] = [&[0, 8], &[4, 12], &[2, 6, 10, 14]];

    let mut snapshot = ProjectSnapshot { bpm, ..ProjectSnapshot::default() };
    snapshot.tracks = names
        .iter()
        .take(STEPS_PER_PATTERN)
        .enumerate()
        .map(|(i, key)| {
            let mut pattern = Pattern::new();
            for &step in beats.get(i).copied().unwrap_or(&[]) {
                let _ = pattern.set_step(step, true);
            }
            Track::new(key.to_string(), key.clone()).with_pattern(pattern)
        })
        .collect();
    snapshot
}
