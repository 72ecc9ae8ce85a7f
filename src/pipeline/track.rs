use serde::{Deserialize, Serialize};

use super::pattern::Pattern;
use crate::shared::{InstrumentKey, TrackId};

// Where a track's sound came from. Only the instrument engine reads this.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackSource {
    pub pack: String,
    pub instrument: String,
    pub character: Option<String>,
    pub preset: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    #[serde(default)]
    pub name: String,
    pub instrument: InstrumentKey,
    #[serde(default)]
    pub muted: bool,
    // a track without a pattern never fires
    #[serde(default)]
    pub pattern: Option<Pattern>,
    #[serde(default)]
    pub source: Option<TrackSource>,
}

impl Track {
    pub fn new(name: impl Into<String>, instrument: impl Into<InstrumentKey>) -> Self {
        Self {
            id: TrackId::new(),
            name: name.into(),
            instrument: instrument.into(),
            muted: false,
            pattern: None,
            source: None,
        }
    }

    pub fn with_pattern(mut self, pattern: Pattern) -> Self {
        self.pattern = Some(pattern);
        self
    }

    pub fn with_source(mut self, source: TrackSource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn trigger_key(&self) -> Option<&InstrumentKey> {
        (!self.instrument.is_empty()).then_some(&self.instrument)
    }

    pub fn character(&self) -> Option<&str> {
        self.source.as_ref().and_then(|s| s.character.as_deref())
    }

    pub fn is_audible(&self) -> bool {
        !self.muted && self.pattern.is_some()
    }

    // note captured pitches are measured against
    pub fn base_note(&self, reference: u8) -> u8 {
        self.pattern
            .as_ref()
            .and_then(|p| p.overrides().note)
            .unwrap_or(reference)
    }

    pub fn pattern_mut(&mut self) -> &mut Pattern {
        self.pattern.get_or_insert_with(Pattern::new)
    }
}
