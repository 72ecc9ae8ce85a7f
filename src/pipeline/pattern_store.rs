// Owns every track and pattern group. The "open" loop is edited through the
// working set in `tracks`; its group entry is only refreshed when the editing
// surface switches away, and that refresh is a deep copy, so no two groups
// ever share step data.

use serde::{Deserialize, Serialize};

use super::pattern::{Pattern, PatternOverrides};
use super::track::Track;
use crate::error::{Result, SequencerError};
use crate::shared::{InstrumentKey, PatternGroupId, TrackId};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PatternGroup {
    pub id: PatternGroupId,
    pub name: String,
    pub tracks: Vec<Track>,
}

impl PatternGroup {
    pub fn new(name: impl Into<String>, tracks: Vec<Track>) -> Self {
        Self { id: PatternGroupId::new(), name: name.into(), tracks }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PatternStore {
    tracks: Vec<Track>,
    groups: Vec<PatternGroup>,
    selected: Option<PatternGroupId>,
}

impl Default for PatternStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternStore {
    pub fn new() -> Self {
        let group = PatternGroup::new("Pattern 1", Vec::new());
        let selected = Some(group.id);
        Self { tracks: Vec::new(), groups: vec![group], selected }
    }

    // a selection that points nowhere falls back to the first group
    pub fn from_parts(
        tracks: Vec<Track>,
        groups: Vec<PatternGroup>,
        selected: Option<PatternGroupId>,
    ) -> Self {
        let selected = match selected {
            Some(id) if groups.iter().any(|g| g.id == id) => Some(id),
            _ => groups.first().map(|g| g.id),
        };
        Self { tracks, groups, selected }
    }

    // ── tracks (working set) ─────────────────────────────────────────

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    fn track_mut(&mut self, id: TrackId) -> Result<&mut Track> {
        self.tracks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(SequencerError::UnknownTrack(id))
    }

    pub fn find_track_by_instrument(&self, instrument: &InstrumentKey) -> Option<TrackId> {
        self.tracks.iter().find(|t| &t.instrument == instrument).map(|t| t.id)
    }

    pub fn add_track(&mut self, track: Track) -> TrackId {
        let id = track.id;
        self.tracks.push(track);
        id
    }

    pub fn remove_track(&mut self, id: TrackId) -> Result<Track> {
        let idx = self
            .tracks
            .iter()
            .position(|t| t.id == id)
            .ok_or(SequencerError::UnknownTrack(id))?;
        Ok(self.tracks.remove(idx))
    }

    pub fn set_muted(&mut self, id: TrackId, muted: bool) -> Result<()> {
        self.track_mut(id)?.muted = muted;
        Ok(())
    }

    pub fn toggle_mute(&mut self, id: TrackId) -> Result<bool> {
        let track = self.track_mut(id)?;
        track.muted = !track.muted;
        Ok(track.muted)
    }

    pub fn set_pattern(&mut self, id: TrackId, pattern: Option<Pattern>) -> Result<()> {
        self.track_mut(id)?.pattern = pattern;
        Ok(())
    }

    // step edits create the pattern on first touch
    pub fn toggle_step(&mut self, id: TrackId, step: usize) -> Result<bool> {
        self.track_mut(id)?.pattern_mut().toggle_step(step)
    }

    pub fn set_step(&mut self, id: TrackId, step: usize, active: bool) -> Result<()> {
        self.track_mut(id)?.pattern_mut().set_step(step, active)
    }

    pub fn set_step_velocity(&mut self, id: TrackId, step: usize, velocity: f32) -> Result<()> {
        self.track_mut(id)?.pattern_mut().set_velocity(step, velocity)
    }

    pub fn set_step_pitch(&mut self, id: TrackId, step: usize, pitch: i32) -> Result<()> {
        self.track_mut(id)?.pattern_mut().set_pitch(step, pitch)
    }

    pub fn write_hit(&mut self, id: TrackId, step: usize, velocity: f32, pitch: i32) -> Result<()> {
        self.track_mut(id)?.pattern_mut().write_hit(step, velocity, pitch)
    }

    pub fn resize_pattern(&mut self, id: TrackId, len: usize) -> Result<()> {
        self.track_mut(id)?.pattern_mut().resize(len);
        Ok(())
    }

    pub fn clear_pattern(&mut self, id: TrackId) -> Result<()> {
        if let Some(pattern) = self.track_mut(id)?.pattern.as_mut() {
            pattern.clear();
        }
        Ok(())
    }

    pub fn set_overrides(&mut self, id: TrackId, overrides: PatternOverrides) -> Result<()> {
        *self.track_mut(id)?.pattern_mut().overrides_mut() = overrides;
        Ok(())
    }

    // ── pattern groups ───────────────────────────────────────────────

    pub fn groups(&self) -> &[PatternGroup] {
        &self.groups
    }

    pub fn group(&self, id: PatternGroupId) -> Option<&PatternGroup> {
        self.groups.iter().find(|g| g.id == id)
    }

    pub fn has_group(&self, id: PatternGroupId) -> bool {
        self.group(id).is_some()
    }

    pub fn selected_group(&self) -> Option<PatternGroupId> {
        self.selected
    }

    // live working set for the open loop, stored copy for any other
    pub fn group_tracks(&self, id: PatternGroupId) -> Option<&[Track]> {
        if self.selected == Some(id) {
            return Some(&self.tracks);
        }
        self.group(id).map(|g| g.tracks.as_slice())
    }

    // write the working set back into the open loop's group entry
    fn stash_working_set(&mut self) {
        let Some(selected) = self.selected else {
            return;
        };
        if let Some(group) = self.groups.iter_mut().find(|g| g.id == selected) {
            group.tracks = self.tracks.clone();
        }
    }

    pub fn synced_groups(&self) -> Vec<PatternGroup> {
        let mut groups = self.groups.clone();
        if let Some(selected) = self.selected {
            if let Some(group) = groups.iter_mut().find(|g| g.id == selected) {
                group.tracks = self.tracks.clone();
            }
        }
        groups
    }

    pub fn select_group(&mut self, id: PatternGroupId) -> Result<()> {
        if self.selected == Some(id) {
            return Ok(());
        }
        let tracks = self
            .group(id)
            .map(|g| g.tracks.clone())
            .ok_or(SequencerError::UnknownPatternGroup(id))?;
        self.stash_working_set();
        self.tracks = tracks;
        self.selected = Some(id);
        Ok(())
    }

    // open loop's track layout with empty patterns; selection doesn't move
    pub fn new_group(&mut self, name: impl Into<String>) -> PatternGroupId {
        let tracks = self
            .tracks
            .iter()
            .map(|t| {
                let mut track = t.clone();
                if let Some(pattern) = track.pattern.as_mut() {
                    pattern.clear();
                }
                track
            })
            .collect();
        let group = PatternGroup::new(name, tracks);
        let id = group.id;
        self.groups.push(group);
        id
    }

    pub fn duplicate_group(&mut self, id: PatternGroupId, name: impl Into<String>) -> Result<PatternGroupId> {
        let tracks = self
            .group_tracks(id)
            .map(|t| t.to_vec())
            .ok_or(SequencerError::UnknownPatternGroup(id))?;
        let group = PatternGroup::new(name, tracks);
        let new_id = group.id;
        self.groups.push(group);
        Ok(new_id)
    }

    pub fn rename_group(&mut self, id: PatternGroupId, name: impl Into<String>) -> Result<()> {
        let group = self
            .groups
            .iter_mut()
            .find(|g| g.id == id)
            .ok_or(SequencerError::UnknownPatternGroup(id))?;
        group.name = name.into();
        Ok(())
    }

    // deleting the open loop opens the first remaining one
    pub fn delete_group(&mut self, id: PatternGroupId) -> Result<PatternGroup> {
        let idx = self
            .groups
            .iter()
            .position(|g| g.id == id)
            .ok_or(SequencerError::UnknownPatternGroup(id))?;
        let removed = self.groups.remove(idx);
        if self.selected == Some(id) {
            self.selected = self.groups.first().map(|g| g.id);
            self.tracks = self.groups.first().map(|g| g.tracks.clone()).unwrap_or_default();
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_kick() -> (PatternStore, TrackId) {
        let mut store = PatternStore::new();
        let id = store.add_track(Track::new("kick", "kick"));
        (store, id)
    }

    #[test]
    fn step_edit_creates_pattern_lazily() {
        let (mut store, kick) = store_with_kick();
        assert!(store.track(kick).unwrap().pattern.is_none());
        assert!(store.toggle_step(kick, 4).unwrap());
        assert!(store.track(kick).unwrap().pattern.as_ref().unwrap().is_active(4));
    }

    #[test]
    fn unknown_track_is_an_error() {
        let mut store = PatternStore::new();
        let ghost = TrackId::new();
        assert!(matches!(store.toggle_mute(ghost), Err(SequencerError::UnknownTrack(id)) if id == ghost));
    }

    #[test]
    fn switching_groups_never_aliases_snapshots() {
        let (mut store, kick) = store_with_kick();
        let first = store.selected_group().unwrap();
        store.set_step(kick, 0, true).unwrap();

        let second = store.new_group("B");
        store.select_group(second).unwrap();
        // layout carried over, steps did not
        assert!(!store.track(kick).unwrap().pattern.as_ref().unwrap().is_active(0));
        store.set_step(kick, 8, true).unwrap();

        store.select_group(first).unwrap();
        let pattern = store.track(kick).unwrap().pattern.clone().unwrap();
        assert!(pattern.is_active(0));
        assert!(!pattern.is_active(8));

        let stored = &store.group(second).unwrap().tracks[0];
        assert!(stored.pattern.as_ref().unwrap().is_active(8));
        assert!(!stored.pattern.as_ref().unwrap().is_active(0));
    }

    #[test]
    fn group_tracks_reads_live_set_for_open_loop() {
        let (mut store, kick) = store_with_kick();
        let open = store.selected_group().unwrap();
        store.set_step(kick, 2, true).unwrap();
        // stored entry is stale until a switch, but playback sees the live edit
        assert!(store.group(open).unwrap().tracks.is_empty());
        assert_eq!(store.group_tracks(open).unwrap().len(), 1);
        assert_eq!(store.synced_groups()[0].tracks.len(), 1);
    }

    #[test]
    fn deleting_open_loop_opens_next() {
        let (mut store, _) = store_with_kick();
        let first = store.selected_group().unwrap();
        let second = store.new_group("B");
        store.delete_group(first).unwrap();
        assert_eq!(store.selected_group(), Some(second));
        assert_eq!(store.tracks().len(), 1);
        store.delete_group(second).unwrap();
        assert_eq!(store.selected_group(), None);
        assert!(store.tracks().is_empty());
    }

    #[test]
    fn duplicate_copies_steps() {
        let (mut store, kick) = store_with_kick();
        let open = store.selected_group().unwrap();
        store.set_step(kick, 5, true).unwrap();
        let copy = store.duplicate_group(open, "copy").unwrap();
        store.set_step(kick, 5, false).unwrap();
        assert!(store.group_tracks(copy).unwrap()[0].pattern.as_ref().unwrap().is_active(5));
    }

    #[test]
    fn from_parts_repairs_bad_selection() {
        let group = PatternGroup::new("A", Vec::new());
        let id = group.id;
        let store = PatternStore::from_parts(Vec::new(), vec![group], Some(PatternGroupId::new()));
        assert_eq!(store.selected_group(), Some(id));
    }
}
