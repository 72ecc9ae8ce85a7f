// The song arrangement: lanes of one-measure slots pointing at pattern
// groups, plus free-form performance tracks recorded straight onto the
// timeline. Also remembers which section is playing.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SequencerError};
use crate::shared::{InstrumentKey, PatternGroupId, PerformanceTrackId, Ticks};

/// A recorded note, positioned in song ticks from the top of the song.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PerformanceNote {
    pub start: Ticks,
    pub duration: Ticks,
    pub pitch: u8,
    pub velocity: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PerformanceTrack {
    pub id: PerformanceTrackId,
    #[serde(default)]
    pub name: String,
    pub instrument: InstrumentKey,
    #[serde(default)]
    pub notes: Vec<PerformanceNote>, // sorted by start
}

impl PerformanceTrack {
    pub fn new(name: impl Into<String>, instrument: impl Into<InstrumentKey>) -> Self {
        Self {
            id: PerformanceTrackId::new(),
            name: name.into(),
            instrument: instrument.into(),
            notes: Vec::new(),
        }
    }

    pub fn add_note(&mut self, note: PerformanceNote) {
        let at = self.notes.partition_point(|n| n.start <= note.start);
        self.notes.insert(at, note);
    }

    pub fn last_start(&self) -> Option<Ticks> {
        self.notes.iter().map(|n| n.start).max()
    }

    // whole measures needed for every note to start inside the song; tails
    // may ring past the loop end
    pub fn span_measures(&self, ticks_per_measure: Ticks) -> usize {
        match self.last_start() {
            Some(start) if ticks_per_measure > 0 => (start / ticks_per_measure + 1) as usize,
            _ => 0,
        }
    }

    pub fn notes_in(&self, window: Range<Ticks>) -> &[PerformanceNote] {
        let lo = self.notes.partition_point(|n| n.start < window.start);
        let hi = self.notes.partition_point(|n| n.start < window.end);
        &self.notes[lo..hi.max(lo)]
    }
}

fn full_velocity() -> f32 {
    1.0
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SongRow {
    #[serde(default)]
    pub slots: Vec<Option<PatternGroupId>>,
    #[serde(default)]
    pub muted: bool,
    #[serde(default = "full_velocity")]
    pub velocity: f32,
    #[serde(default)]
    pub performance: Option<PerformanceTrackId>,
}

impl Default for SongRow {
    fn default() -> Self {
        Self { slots: Vec::new(), muted: false, velocity: 1.0, performance: None }
    }
}

impl SongRow {
    // silent past the row's last slot
    pub fn group_at(&self, section: usize) -> Option<PatternGroupId> {
        if self.muted {
            return None;
        }
        self.slots.get(section).copied().flatten()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SectionEntry {
    pub row: usize,
    pub group: PatternGroupId,
    pub velocity: f32,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SongStore {
    rows: Vec<SongRow>,
    performance_tracks: Vec<PerformanceTrack>,
    section_index: usize,
}

impl SongStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(
        rows: Vec<SongRow>,
        performance_tracks: Vec<PerformanceTrack>,
        section_index: usize,
    ) -> Self {
        Self { rows, performance_tracks, section_index }
    }

    pub fn rows(&self) -> &[SongRow] {
        &self.rows
    }

    pub fn row(&self, idx: usize) -> Option<&SongRow> {
        self.rows.get(idx)
    }

    fn row_mut(&mut self, idx: usize) -> Result<&mut SongRow> {
        self.rows.get_mut(idx).ok_or(SequencerError::RowOutOfRange(idx))
    }

    pub fn performance_tracks(&self) -> &[PerformanceTrack] {
        &self.performance_tracks
    }

    pub fn performance_track(&self, id: PerformanceTrackId) -> Option<&PerformanceTrack> {
        self.performance_tracks.iter().find(|p| p.id == id)
    }

    pub fn section_index(&self) -> usize {
        self.section_index
    }

    pub fn set_section_index(&mut self, section: usize) {
        self.section_index = section;
    }

    // ── arrangement edits ────────────────────────────────────────────

    pub fn add_row(&mut self) -> usize {
        self.rows.push(SongRow::default());
        self.rows.len() - 1
    }

    pub fn remove_row(&mut self, idx: usize) -> Result<SongRow> {
        if idx >= self.rows.len() {
            return Err(SequencerError::RowOutOfRange(idx));
        }
        Ok(self.rows.remove(idx))
    }

    // grows the row with silent slots
    pub fn set_slot(&mut self, row: usize, section: usize, group: Option<PatternGroupId>) -> Result<()> {
        let row = self.row_mut(row)?;
        if section >= row.slots.len() {
            row.slots.resize(section + 1, None);
        }
        row.slots[section] = group;
        Ok(())
    }

    pub fn set_row_muted(&mut self, row: usize, muted: bool) -> Result<()> {
        self.row_mut(row)?.muted = muted;
        Ok(())
    }

    pub fn set_row_velocity(&mut self, row: usize, velocity: f32) -> Result<()> {
        self.row_mut(row)?.velocity = velocity.clamp(0.0, 1.0);
        Ok(())
    }

    pub fn attach_performance(&mut self, row: usize, track: Option<PerformanceTrackId>) -> Result<()> {
        if let Some(id) = track {
            if self.performance_track(id).is_none() {
                return Err(SequencerError::UnknownPerformanceTrack(id));
            }
        }
        self.row_mut(row)?.performance = track;
        Ok(())
    }

    pub fn add_performance_track(&mut self, track: PerformanceTrack) -> PerformanceTrackId {
        let id = track.id;
        self.performance_tracks.push(track);
        id
    }

    // also detaches it from every row
    pub fn remove_performance_track(&mut self, id: PerformanceTrackId) -> Result<PerformanceTrack> {
        let idx = self
            .performance_tracks
            .iter()
            .position(|p| p.id == id)
            .ok_or(SequencerError::UnknownPerformanceTrack(id))?;
        for row in &mut self.rows {
            if row.performance == Some(id) {
                row.performance = None;
            }
        }
        Ok(self.performance_tracks.remove(idx))
    }

    pub fn record_note(&mut self, id: PerformanceTrackId, note: PerformanceNote) -> Result<()> {
        let track = self
            .performance_tracks
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(SequencerError::UnknownPerformanceTrack(id))?;
        track.add_note(note);
        Ok(())
    }

    // returns how many slots were nulled
    pub fn heal(&mut self, exists: impl Fn(PatternGroupId) -> bool) -> usize {
        let mut healed = 0;
        for row in &mut self.rows {
            for slot in &mut row.slots {
                if slot.is_some_and(|id| !exists(id)) {
                    *slot = None;
                    healed += 1;
                }
            }
        }
        healed
    }

    // ── playback queries ─────────────────────────────────────────────

    // longest row, or the longest performance in measures
    pub fn section_span(&self, ticks_per_measure: Ticks) -> usize {
        let longest_row = self.rows.iter().map(|r| r.slots.len()).max().unwrap_or(0);
        let longest_performance = self
            .performance_tracks
            .iter()
            .map(|p| p.span_measures(ticks_per_measure))
            .max()
            .unwrap_or(0);
        longest_row.max(longest_performance)
    }

    pub fn entries_for_section(&self, section: usize) -> Vec<SectionEntry> {
        self.rows
            .iter()
            .enumerate()
            .filter_map(|(row, r)| {
                r.group_at(section).map(|group| SectionEntry { row, group, velocity: r.velocity })
            })
            .collect()
    }

    pub fn active_performances(&self) -> impl Iterator<Item = (&PerformanceTrack, f32)> + '_ {
        self.rows.iter().filter(|r| !r.muted).filter_map(|r| {
            r.performance
                .and_then(|id| self.performance_track(id))
                .map(|track| (track, r.velocity))
        })
    }
}
