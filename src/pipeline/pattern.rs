// Per-track step data. Steps, velocities and pitch offsets are parallel
// vectors that always have the same length; every constructor and the
// deserializer go through `normalize` so nothing downstream has to check.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SequencerError};
use crate::shared::STEPS_PER_PATTERN;

pub const NEUTRAL_VELOCITY: f32 = 1.0;
pub const NEUTRAL_PITCH: i32 = 0;

/// Sound-shaping values that, when present, replace the instrument's own
/// defaults at trigger time.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternOverrides {
    pub note: Option<u8>,
    pub sustain: Option<f64>, // seconds
    pub attack: Option<f32>,
    pub release: Option<f32>,
    pub filter: Option<f32>, // cutoff, Hz
    pub pan: Option<f32>,    // -1..1
    pub effect_wet: Option<f32>,
    // instrument-specific knobs, passed through untouched
    pub macros: BTreeMap<String, f32>,
}

impl PatternOverrides {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "PatternData")]
pub struct Pattern {
    steps: Vec<bool>,
    velocities: Vec<f32>,
    pitches: Vec<i32>,
    overrides: PatternOverrides,
}

// what comes off disk; lengths may disagree
#[derive(Deserialize)]
struct PatternData {
    #[serde(default)]
    steps: Vec<bool>,
    #[serde(default)]
    velocities: Vec<f32>,
    #[serde(default)]
    pitches: Vec<i32>,
    #[serde(default)]
    overrides: PatternOverrides,
}

impl From<PatternData> for Pattern {
    fn from(data: PatternData) -> Self {
        let mut pattern = Pattern {
            steps: data.steps,
            velocities: data.velocities,
            pitches: data.pitches,
            overrides: data.overrides,
        };
        pattern.normalize();
        pattern
    }
}

impl Default for Pattern {
    fn default() -> Self {
        Self::new()
    }
}

impl Pattern {
    pub fn new() -> Self {
        Self::with_len(STEPS_PER_PATTERN)
    }

    pub fn with_len(len: usize) -> Self {
        Self {
            steps: vec![false; len],
            velocities: vec![NEUTRAL_VELOCITY; len],
            pitches: vec![NEUTRAL_PITCH; len],
            overrides: PatternOverrides::default(),
        }
    }

    // anything past 16 is dropped, missing steps are off
    pub fn from_steps(steps: impl IntoIterator<Item = bool>) -> Self {
        let mut pattern = Self {
            steps: steps.into_iter().collect(),
            velocities: Vec::new(),
            pitches: Vec::new(),
            overrides: PatternOverrides::default(),
        };
        pattern.normalize();
        pattern
    }

    pub fn with_overrides(mut self, overrides: PatternOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn normalize(&mut self) {
        self.steps.resize(STEPS_PER_PATTERN, false);
        self.velocities.resize(STEPS_PER_PATTERN, NEUTRAL_VELOCITY);
        self.pitches.resize(STEPS_PER_PATTERN, NEUTRAL_PITCH);
    }

    // keeps values by index
    pub fn resize(&mut self, len: usize) {
        self.steps.resize(len, false);
        self.velocities.resize(len, NEUTRAL_VELOCITY);
        self.pitches.resize(len, NEUTRAL_PITCH);
    }

    pub fn is_active(&self, step: usize) -> bool {
        self.steps.get(step).copied().unwrap_or(false)
    }

    pub fn velocity(&self, step: usize) -> f32 {
        self.velocities.get(step).copied().unwrap_or(NEUTRAL_VELOCITY)
    }

    pub fn pitch(&self, step: usize) -> i32 {
        self.pitches.get(step).copied().unwrap_or(NEUTRAL_PITCH)
    }

    pub fn steps(&self) -> &[bool] {
        &self.steps
    }

    pub fn active_steps(&self) -> impl Iterator<Item = usize> + '_ {
        self.steps.iter().enumerate().filter(|(_, on)| **on).map(|(i, _)| i)
    }

    pub fn overrides(&self) -> &PatternOverrides {
        &self.overrides
    }

    pub fn overrides_mut(&mut self) -> &mut PatternOverrides {
        &mut self.overrides
    }

    fn check(&self, step: usize) -> Result<()> {
        if step < self.steps.len() {
            Ok(())
        } else {
            Err(SequencerError::StepOutOfRange { index: step, len: self.steps.len() })
        }
    }

    pub fn set_step(&mut self, step: usize, active: bool) -> Result<()> {
        self.check(step)?;
        self.steps[step] = active;
        Ok(())
    }

    pub fn toggle_step(&mut self, step: usize) -> Result<bool> {
        self.check(step)?;
        self.steps[step] = !self.steps[step];
        Ok(self.steps[step])
    }

    pub fn set_velocity(&mut self, step: usize, velocity: f32) -> Result<()> {
        self.check(step)?;
        self.velocities[step] = velocity.clamp(0.0, 1.0);
        Ok(())
    }

    pub fn set_pitch(&mut self, step: usize, pitch: i32) -> Result<()> {
        self.check(step)?;
        self.pitches[step] = pitch;
        Ok(())
    }

    // a step past the end grows the pattern to reach it
    pub fn write_hit(&mut self, step: usize, velocity: f32, pitch: i32) -> Result<()> {
        if step >= self.len() {
            self.resize(step + 1);
        }
        self.steps[step] = true;
        self.velocities[step] = velocity.clamp(0.0, 1.0);
        self.pitches[step] = pitch;
        Ok(())
    }

    pub fn clear(&mut self) {
        let len = self.len();
        self.steps = vec![false; len];
        self.velocities = vec![NEUTRAL_VELOCITY; len];
        self.pitches = vec![NEUTRAL_PITCH; len];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_arrays_on_disk_are_padded() {
        let json = r#"{ "steps": [true, false, true], "velocities": [0.5] }"#;
        let p: Pattern = serde_json::from_str(json).unwrap();
        assert_eq!(p.len(), STEPS_PER_PATTERN);
        assert!(p.is_active(0) && p.is_active(2) && !p.is_active(3));
        assert_eq!(p.velocity(0), 0.5);
        assert_eq!(p.velocity(2), NEUTRAL_VELOCITY);
        assert_eq!(p.pitch(15), NEUTRAL_PITCH);
    }

    #[test]
    fn long_arrays_on_disk_are_truncated() {
        let steps = vec![true; 20];
        let pitches = vec![3; 40];
        let json = serde_json::json!({ "steps": steps, "pitches": pitches });
        let p: Pattern = serde_json::from_value(json).unwrap();
        assert_eq!(p.len(), STEPS_PER_PATTERN);
        assert_eq!(p.pitch(15), 3);
        assert_eq!(p.pitch(16), NEUTRAL_PITCH); // past the end reads neutral
    }

    #[test]
    fn resize_keeps_values_and_fills_neutral() {
        let mut p = Pattern::new();
        p.write_hit(3, 0.25, -5).unwrap();
        p.resize(4);
        assert_eq!(p.len(), 4);
        assert!(p.is_active(3));
        p.resize(8);
        assert_eq!(p.velocity(3), 0.25);
        assert_eq!(p.pitch(3), -5);
        assert!(!p.is_active(7));
        assert_eq!(p.velocity(7), NEUTRAL_VELOCITY);
    }

    #[test]
    fn out_of_range_edit_is_an_error() {
        let mut p = Pattern::new();
        assert!(matches!(
            p.toggle_step(16),
            Err(SequencerError::StepOutOfRange { index: 16, len: 16 })
        ));
    }

    #[test]
    fn toggle_and_clear() {
        let mut p = Pattern::from_steps([true, false, true]);
        assert_eq!(p.active_steps().collect::<Vec<_>>(), vec![0, 2]);
        assert!(!p.toggle_step(0).unwrap());
        assert!(p.toggle_step(1).unwrap());
        p.clear();
        assert_eq!(p.active_steps().count(), 0);
    }

    #[test]
    fn hit_past_the_end_grows_the_pattern() {
        let mut p = Pattern::from_steps([true, false, false, false]);
        p.resize(4);
        p.write_hit(11, 0.5, 2).unwrap();
        assert_eq!(p.len(), 12);
        assert!(p.is_active(0) && p.is_active(11));
        assert!(!p.is_active(8));
        assert_eq!(p.velocity(8), NEUTRAL_VELOCITY);
        assert_eq!(p.pitch(11), 2);
    }

    #[test]
    fn velocity_is_clamped() {
        let mut p = Pattern::new();
        p.set_velocity(0, 3.0).unwrap();
        assert_eq!(p.velocity(0), 1.0);
    }
}
