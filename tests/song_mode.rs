mod common;

use approx::assert_relative_eq;
use groovestep::pipeline::{PerformanceTrack, Track};
use groovestep::shared::PatternGroupId;
use groovestep::{PlaybackState, SequencerError};

use common::*;

// "Pattern 1" with a kick on the downbeat, and "B" with a hat on the downbeat
fn two_groups(seq: &mut TestSequencer) -> (PatternGroupId, PatternGroupId) {
    add_track(seq, "kick", &[0]);
    let a = seq.active_pattern_group().unwrap();
    let b = seq.edit_patterns(|store| Ok(store.new_group("B"))).unwrap();
    seq.set_active_pattern_group(b).unwrap();
    add_track(seq, "hat", &[0]);
    (a, b)
}

fn fill_row(seq: &mut TestSequencer, slots: &[Option<PatternGroupId>]) -> usize {
    seq.edit_song(|song| {
        let row = song.add_row();
        for (section, slot) in slots.iter().enumerate() {
            song.set_slot(row, section, *slot)?;
        }
        Ok(row)
    })
    .unwrap()
}

#[test]
fn sections_cycle_once_per_measure() {
    let mut seq = sequencer();
    let (a, _) = two_groups(&mut seq);
    fill_row(&mut seq, &[Some(a); 3]);
    let seen = record_sections(&mut seq);

    seq.enter_song_mode();
    assert!(seq.play());
    assert_eq!(seq.state(), PlaybackState::SongPlayback);
    // a measure is two seconds at 120 bpm
    seq.advance_to(16.0);
    let sections: Vec<_> = seen.borrow().iter().map(|s| s.section).collect();
    assert_eq!(sections, vec![0, 1, 2, 0, 1, 2, 0, 1]);
    for pair in seen.borrow()[1..].windows(2) {
        assert_relative_eq!(pair[1].time - pair[0].time, 2.0, epsilon = 1e-9);
    }
    assert_eq!(seq.song().load().section_index(), 1);
}

#[test]
fn short_rows_go_silent_past_their_last_slot() {
    let mut seq = sequencer();
    let (a, b) = two_groups(&mut seq);
    fill_row(&mut seq, &[Some(a); 4]);
    fill_row(&mut seq, &[Some(b); 2]);

    seq.enter_song_mode();
    seq.play();
    seq.advance_to(8.0);
    assert_eq!(seq.sink().times_for("kick"), vec![0.0, 2.0, 4.0, 6.0]);
    assert_eq!(seq.sink().times_for("hat"), vec![0.0, 2.0]);
}

#[test]
fn entering_song_mode_mid_song_starts_at_the_current_section() {
    let mut seq = sequencer();
    let (a, _) = two_groups(&mut seq);
    fill_row(&mut seq, &[Some(a); 4]);
    let seen = record_sections(&mut seq);

    seq.play();
    seq.advance_to(5.0); // halfway through measure 2
    seq.enter_song_mode();
    assert_eq!(seen.borrow().last().map(|s| s.section), Some(2));
    assert_eq!(seq.section_index(), 2);
}

#[test]
fn pause_and_resume_keep_the_section() {
    let mut seq = sequencer();
    let (a, _) = two_groups(&mut seq);
    fill_row(&mut seq, &[Some(a); 4]);
    let seen = record_sections(&mut seq);

    seq.enter_song_mode();
    seq.play();
    seq.advance_to(7.0);
    seq.pause();
    assert_eq!(seq.section_index(), 3);
    seq.play();
    assert_eq!(seen.borrow().last().map(|s| s.section), Some(3));
    seq.advance_to(9.0);
    assert_eq!(seen.borrow().last().map(|s| s.section), Some(0));
}

#[test]
fn leaving_song_mode_resets_the_section() {
    let mut seq = sequencer();
    let (a, _) = two_groups(&mut seq);
    fill_row(&mut seq, &[Some(a); 4]);

    seq.enter_song_mode();
    seq.play();
    seq.advance_to(3.0);
    assert_eq!(seq.section_index(), 1);
    seq.exit_song_mode();
    assert_eq!(seq.section_index(), 0);
    assert_eq!(seq.song().load().section_index(), 0);
    assert_eq!(seq.state(), PlaybackState::TrackPlayback);
    // only the step registration is left
    assert_eq!(seq.clock().registrations(), 1);
}

#[test]
fn empty_song_plays_nothing() {
    let mut seq = sequencer();
    add_track(&mut seq, "kick", &[0]);
    seq.enter_song_mode();
    seq.play();
    seq.advance_to(4.0);
    assert!(seq.sink().triggers.is_empty());
    assert_eq!(seq.section_index(), 0);
}

#[test]
fn row_velocity_scales_and_mute_silences() {
    let mut seq = sequencer();
    let (a, b) = two_groups(&mut seq);
    let kick_row = fill_row(&mut seq, &[Some(a)]);
    let hat_row = fill_row(&mut seq, &[Some(b)]);
    seq.edit_song(|song| {
        song.set_row_velocity(kick_row, 0.5)?;
        song.set_row_muted(hat_row, true)
    })
    .unwrap();

    seq.enter_song_mode();
    seq.play();
    seq.advance_to(2.0);
    let triggers = &seq.sink().triggers;
    assert_eq!(triggers.len(), 1);
    assert_eq!(triggers[0].0.as_str(), "kick");
    assert_eq!(triggers[0].1.velocity, 0.5);
}

#[test]
fn deleting_a_group_heals_the_song() {
    let mut seq = sequencer();
    let (a, b) = two_groups(&mut seq);
    let row = fill_row(&mut seq, &[Some(a), Some(b)]);
    seq.edit_patterns(|store| store.delete_group(a).map(|_| ())).unwrap();
    let song = seq.song().load();
    assert_eq!(song.row(row).unwrap().slots, vec![None, Some(b)]);
}

#[test]
fn performance_tracks_play_at_their_exact_ticks() {
    let mut seq = sequencer();
    let (a, _) = two_groups(&mut seq);
    let row = fill_row(&mut seq, &[Some(a)]);
    seq.edit_song(|song| {
        let mut lead = PerformanceTrack::new("lead", "lead");
        lead.add_note(groovestep::pipeline::PerformanceNote {
            start: 200, // between steps 4 and 5
            duration: 96,
            pitch: 67,
            velocity: 0.5,
        });
        let id = song.add_performance_track(lead);
        song.attach_performance(row, Some(id))
    })
    .unwrap();

    seq.enter_song_mode();
    seq.play();
    seq.advance_to(4.0);
    let lead: Vec<_> = seq
        .sink()
        .triggers
        .iter()
        .filter(|(key, _)| key.as_str() == "lead")
        .map(|(_, p)| p.clone())
        .collect();
    assert_eq!(lead.len(), 2);
    assert_relative_eq!(lead[0].time, 200.0 / 384.0, epsilon = 1e-9);
    assert_relative_eq!(lead[1].time, 2.0 + 200.0 / 384.0, epsilon = 1e-9);
    assert_eq!(lead[0].note, Some(67));
    assert_relative_eq!(lead[0].sustain.unwrap(), 0.25, epsilon = 1e-9);
}

#[test]
fn recording_a_performance_in_song_mode() {
    let mut seq = sequencer();
    let (a, _) = two_groups(&mut seq);
    let row = fill_row(&mut seq, &[Some(a)]);
    let id = seq
        .edit_song(|song| {
            let id = song.add_performance_track(PerformanceTrack::new("lead", "lead"));
            song.attach_performance(row, Some(id))?;
            Ok(id)
        })
        .unwrap();

    assert!(matches!(
        seq.arm_performance_capture(groovestep::shared::PerformanceTrackId::new()),
        Err(SequencerError::UnknownPerformanceTrack(_))
    ));
    seq.enter_song_mode();
    seq.arm_performance_capture(id).unwrap();
    seq.play();

    let gesture = groovestep::sequencer::NoteGesture {
        time: 0.5,
        note: 64,
        velocity: 0.9,
        instrument: "lead".into(),
    };
    assert_eq!(seq.note_on(&gesture).unwrap(), None);
    seq.note_off(64, 0.75).unwrap();

    let song = seq.song().load();
    let notes = &song.performance_track(id).unwrap().notes;
    assert_eq!(notes.len(), 1);
    assert_eq!((notes[0].start, notes[0].duration, notes[0].pitch), (192, 96, 64));
    // nothing was written to the grid
    assert!(seq.patterns().load().tracks().iter().all(|t: &Track| t.instrument.as_str() != "lead"));
}

#[test]
fn note_held_over_the_loop_end_keeps_its_length() {
    let mut seq = sequencer();
    let (a, _) = two_groups(&mut seq);
    let row = fill_row(&mut seq, &[Some(a)]);
    let id = seq
        .edit_song(|song| {
            let id = song.add_performance_track(PerformanceTrack::new("lead", "lead"));
            song.attach_performance(row, Some(id))?;
            Ok(id)
        })
        .unwrap();
    seq.enter_song_mode();
    seq.arm_performance_capture(id).unwrap();
    seq.play();

    // a one-measure song loops every 2s; hold from 1.9s to 2.1s
    let gesture = groovestep::sequencer::NoteGesture {
        time: 1.9,
        note: 60,
        velocity: 0.8,
        instrument: "lead".into(),
    };
    seq.note_on(&gesture).unwrap();
    seq.note_off(60, 2.1).unwrap();

    let song = seq.song().load();
    let notes = &song.performance_track(id).unwrap().notes;
    assert_eq!(notes.len(), 1);
    assert_eq!((notes[0].start, notes[0].duration), (729, 77));
    // the tail doesn't lengthen the song
    assert_eq!(song.section_span(768), 1);

    seq.advance_to(4.0);
    let lead: Vec<_> = seq
        .sink()
        .triggers
        .iter()
        .filter(|(key, _)| key.as_str() == "lead")
        .map(|(_, p)| p.clone())
        .collect();
    assert_eq!(lead.len(), 2);
    assert_relative_eq!(lead[0].time, 729.0 / 384.0, epsilon = 1e-9);
    assert_relative_eq!(lead[0].sustain.unwrap(), 77.0 / 384.0, epsilon = 1e-9);
}

#[test]
fn song_growing_from_empty_starts_cycling_where_the_transport_is() {
    let mut seq = sequencer();
    let (a, _) = two_groups(&mut seq);
    let seen = record_sections(&mut seq);
    seq.enter_song_mode();
    seq.play();
    seq.advance_to(3.0);
    assert!(seen.borrow().is_empty());
    assert_eq!(seq.clock().registrations(), 1);

    // halfway through measure 1 of a two-section song
    fill_row(&mut seq, &[Some(a), Some(a)]);
    assert_eq!(seq.section_index(), 1);
    assert_eq!(seq.clock().registrations(), 2);
    seq.advance_to(7.0);
    let sections: Vec<_> = seen.borrow().iter().map(|s| s.section).collect();
    assert_eq!(sections, vec![1, 0, 1]);
    assert_eq!(seq.sink().times_for("kick"), vec![4.0, 6.0]);
}

#[test]
fn shrinking_the_song_below_the_current_section_wraps() {
    let mut seq = sequencer();
    let (a, _) = two_groups(&mut seq);
    fill_row(&mut seq, &[Some(a); 4]);
    let seen = record_sections(&mut seq);
    seq.enter_song_mode();
    seq.play();
    seq.advance_to(7.0);
    assert_eq!(seq.section_index(), 3);

    seq.edit_song(|song| {
        song.remove_row(0)?;
        let row = song.add_row();
        song.set_slot(row, 0, Some(a))?;
        song.set_slot(row, 1, Some(a))
    })
    .unwrap();
    // measure 3 of a two-section song
    assert_eq!(seq.section_index(), 1);
    seq.advance_to(9.0);
    let sections: Vec<_> = seen.borrow().iter().map(|s| s.section).collect();
    assert_eq!(sections, vec![0, 1, 2, 3, 1, 0]);
    assert_eq!(seq.sink().times_for("kick"), vec![0.0, 2.0, 4.0, 6.0, 8.0]);
}

#[test]
fn emptying_the_song_while_playing_goes_quiet() {
    let mut seq = sequencer();
    let (a, _) = two_groups(&mut seq);
    fill_row(&mut seq, &[Some(a), Some(a)]);
    let seen = record_sections(&mut seq);
    seq.enter_song_mode();
    seq.play();
    seq.advance_to(3.0);

    seq.edit_song(|song| song.remove_row(0).map(|_| ())).unwrap();
    assert_eq!(seq.state(), PlaybackState::SongPlayback);
    // the measure callback is gone, the step callback stays
    assert_eq!(seq.clock().registrations(), 1);
    seq.advance_to(8.0);
    let sections: Vec<_> = seen.borrow().iter().map(|s| s.section).collect();
    assert_eq!(sections, vec![0, 1]);
    assert_eq!(seq.sink().times_for("kick"), vec![0.0, 2.0]);
}
