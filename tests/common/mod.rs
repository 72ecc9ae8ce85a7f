#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use groovestep::pipeline::{Pattern, Track};
use groovestep::shared::TrackId;
use groovestep::{CollectingSink, SectionAdvance, Sequencer, SequencerConfig, StepAdvance, Transport};

pub type TestSequencer = Sequencer<Transport, CollectingSink>;

pub fn sequencer() -> TestSequencer {
    Sequencer::new(Transport::new(120.0), CollectingSink::default(), SequencerConfig::default())
}

pub fn pattern_on(steps: &[usize]) -> Pattern {
    let mut pattern = Pattern::new();
    for &step in steps {
        pattern.set_step(step, true).unwrap();
    }
    pattern
}

/// Adds a track to the open loop.
pub fn add_track(seq: &mut TestSequencer, instrument: &str, steps: &[usize]) -> TrackId {
    let track = Track::new(instrument, instrument).with_pattern(pattern_on(steps));
    seq.edit_patterns(|store| Ok(store.add_track(track))).unwrap()
}

pub fn record_steps(seq: &mut TestSequencer) -> Rc<RefCell<Vec<StepAdvance>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    seq.on_step_advance(move |adv| sink.borrow_mut().push(adv));
    seen
}

pub fn record_sections(seq: &mut TestSequencer) -> Rc<RefCell<Vec<SectionAdvance>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    seq.on_section_advance(move |adv| sink.borrow_mut().push(adv));
    seen
}
