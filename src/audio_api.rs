// The boundary between the scheduler and whatever makes sound. The scheduler
// only ever resolves parameters and calls `trigger`; instrument instances live
// in the engine's own registry, addressed by `InstrumentKey`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::Sender;

use crate::pipeline::pattern::PatternOverrides;
use crate::shared::{InstrumentKey, Time};

/// One resolved hit. `time` is the scheduled time from the clock, never the
/// time the scheduler happened to run, so late evaluation doesn't jitter.
#[derive(Clone, Debug, PartialEq)]
pub struct TriggerParams {
    pub time: Time,
    pub velocity: f32,
    pub pitch_offset: i32,
    pub note: Option<u8>,
    // seconds, none lets the instrument decide
    pub sustain: Option<f64>,
    pub overrides: PatternOverrides,
    pub character: Option<String>,
}

impl TriggerParams {
    pub fn at(time: Time) -> Self {
        Self {
            time,
            velocity: 1.0,
            pitch_offset: 0,
            note: None,
            sustain: None,
            overrides: PatternOverrides::default(),
            character: None,
        }
    }
}

pub trait TriggerSink {
    /// Whether the engine can render right now (audio device open and
    /// running). Playback refuses to start while this is false.
    fn is_ready(&self) -> bool {
        true
    }

    /// Returns false when `instrument` resolves to nothing; the scheduler
    /// treats that as silence for the track.
    fn trigger(&mut self, instrument: &InstrumentKey, params: TriggerParams) -> bool;

    /// Drop hits that were scheduled ahead but haven't started yet.
    fn cancel_scheduled(&mut self) {}
}

// Messages the audio thread drains at the top of each block.
#[derive(Clone, Debug)]
pub enum AudioCommand {
    Trigger { instrument: InstrumentKey, params: TriggerParams },
    CancelScheduled,
}

/// Forwards triggers to an audio thread without blocking. A full queue drops
/// the hit rather than stalling the scheduler. A cancel that doesn't fit is
/// kept and sent ahead of the next hit.
pub struct ChannelSink {
    tx: Sender<AudioCommand>,
    ready: Arc<AtomicBool>,
    cancel_pending: bool,
}

impl ChannelSink {
    pub fn new(tx: Sender<AudioCommand>, ready: Arc<AtomicBool>) -> Self {
        Self { tx, ready, cancel_pending: false }
    }

    fn flush_cancel(&mut self) -> bool {
        if self.cancel_pending && self.tx.try_send(AudioCommand::CancelScheduled).is_ok() {
            self.cancel_pending = false;
        }
        !self.cancel_pending
    }
}

impl TriggerSink for ChannelSink {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    fn trigger(&mut self, instrument: &InstrumentKey, params: TriggerParams) -> bool {
        // a hit must never overtake a cancel issued before it
        if !self.flush_cancel() {
            return false;
        }
        self.tx
            .try_send(AudioCommand::Trigger { instrument: instrument.clone(), params })
            .is_ok()
    }

    fn cancel_scheduled(&mut self) {
        self.cancel_pending = true;
        if !self.flush_cancel() {
            log::warn!("audio queue full, cancel deferred to the next trigger");
        }
    }
}

#[derive(Clone, Debug)]
pub struct CollectingSink {
    pub ready: bool,
    pub triggers: Vec<(InstrumentKey, TriggerParams)>,
    pub unknown: Vec<InstrumentKey>,
    pub cancels: usize,
}

impl Default for CollectingSink {
    fn default() -> Self {
        Self { ready: true, triggers: Vec::new(), unknown: Vec::new(), cancels: 0 }
    }
}

impl CollectingSink {
    pub fn not_ready() -> Self {
        Self { ready: false, ..Self::default() }
    }

    pub fn times(&self) -> Vec<Time> {
        self.triggers.iter().map(|(_, p)| p.time).collect()
    }

    pub fn times_for(&self, instrument: &str) -> Vec<Time> {
        self.triggers
            .iter()
            .filter(|(key, _)| key.as_str() == instrument)
            .map(|(_, p)| p.time)
            .collect()
    }

    pub fn clear(&mut self) {
        self.triggers.clear();
    }
}

impl TriggerSink for CollectingSink {
    fn is_ready(&self) -> bool {
        self.ready
    }

    fn trigger(&mut self, instrument: &InstrumentKey, params: TriggerParams) -> bool {
        if self.unknown.contains(instrument) {
            return false;
        }
        self.triggers.push((instrument.clone(), params));
        true
    }

    fn cancel_scheduled(&mut self) {
        self.cancels += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_sink_follows_ready_flag() {
        let (tx, rx) = crossbeam_channel::bounded(4);
        let ready = Arc::new(AtomicBool::new(false));
        let mut sink = ChannelSink::new(tx, ready.clone());
        assert!(!sink.is_ready());
        ready.store(true, Ordering::Release);
        assert!(sink.is_ready());

        assert!(sink.trigger(&InstrumentKey::from("kick"), TriggerParams::at(0.5)));
        match rx.try_recv().unwrap() {
            AudioCommand::Trigger { instrument, params } => {
                assert_eq!(instrument.as_str(), "kick");
                assert_eq!(params.time, 0.5);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn full_channel_drops_instead_of_blocking() {
        let (tx, _rx) = crossbeam_channel::bounded(1);
        let mut sink = ChannelSink::new(tx, Arc::new(AtomicBool::new(true)));
        let key = InstrumentKey::from("hat");
        assert!(sink.trigger(&key, TriggerParams::at(0.0)));
        assert!(!sink.trigger(&key, TriggerParams::at(0.1)));
    }

    #[test]
    fn cancel_on_full_queue_goes_out_before_the_next_hit() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let mut sink = ChannelSink::new(tx, Arc::new(AtomicBool::new(true)));
        let key = InstrumentKey::from("hat");
        assert!(sink.trigger(&key, TriggerParams::at(0.0)));
        sink.cancel_scheduled();

        // still full: the hit waits behind the cancel
        assert!(!sink.trigger(&key, TriggerParams::at(0.1)));
        assert!(matches!(rx.try_recv().unwrap(), AudioCommand::Trigger { .. }));

        // room for the cancel only
        assert!(!sink.trigger(&key, TriggerParams::at(0.2)));
        assert!(matches!(rx.try_recv().unwrap(), AudioCommand::CancelScheduled));

        assert!(sink.trigger(&key, TriggerParams::at(0.3)));
        match rx.try_recv().unwrap() {
            AudioCommand::Trigger { params, .. } => assert_eq!(params.time, 0.3),
            other => panic!("unexpected {other:?}"),
        }
        assert!(rx.try_recv().is_err());
    }
}
