// Song mode section tracking: one registration per measure, and a section
// index derived from ticks so a resume mid-song lands where the transport is.

use crate::clock::{Clock, Firing, ScheduleHandle, Subdivision};
use crate::shared::Ticks;

// none for an empty song
pub fn section_for_ticks(ticks: Ticks, ticks_per_measure: Ticks, span: usize) -> Option<usize> {
    if span == 0 || ticks_per_measure == 0 {
        return None;
    }
    Some((ticks / ticks_per_measure) as usize % span)
}

#[derive(Debug, Default)]
pub struct SectionCycler {
    handle: Option<ScheduleHandle>,
    section: usize,
    span: usize,
}

impl SectionCycler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_section(section: usize) -> Self {
        Self { section, ..Self::default() }
    }

    pub fn section(&self) -> usize {
        self.section
    }

    pub fn span(&self) -> usize {
        self.span
    }

    pub fn is_engaged(&self) -> bool {
        self.handle.is_some()
    }

    pub fn owns(&self, handle: ScheduleHandle) -> bool {
        self.handle == Some(handle)
    }

    // the caller always publishes the returned section; an empty song stays inert
    pub fn engage(&mut self, clock: &mut impl Clock, span: usize) -> Option<usize> {
        self.span = span;
        if let Some(handle) = self.handle.take() {
            clock.cancel(handle);
        }
        let section = section_for_ticks(clock.current_ticks(), clock.ticks_per_measure(), span)?;
        self.handle = Some(clock.schedule_repeating(Subdivision::Measure));
        self.section = section;
        Some(section)
    }

    // pause: drop the registration, keep the section
    pub fn suspend(&mut self, clock: &mut impl Clock) {
        if let Some(handle) = self.handle.take() {
            clock.cancel(handle);
        }
    }

    // true if the section moved back to 0
    pub fn disengage(&mut self, clock: &mut impl Clock) -> bool {
        self.suspend(clock);
        std::mem::replace(&mut self.section, 0) != 0
    }

    // song length changed while running, returns a section to publish if it moved
    pub fn set_span(&mut self, clock: &mut impl Clock, span: usize) -> Option<usize> {
        if span == self.span {
            return None;
        }
        let before = self.section;
        if span == 0 {
            self.span = 0;
            self.suspend(clock);
            return None;
        }
        if self.handle.is_none() {
            return self.engage(clock, span);
        }
        self.span = span;
        self.section = section_for_ticks(clock.current_ticks(), clock.ticks_per_measure(), span)?;
        (self.section != before).then_some(self.section)
    }

    pub fn on_firing(&mut self, firing: &Firing, ticks_per_measure: Ticks) -> Option<usize> {
        let section = section_for_ticks(firing.ticks, ticks_per_measure, self.span)?;
        if section == self.section {
            return None;
        }
        self.section = section;
        Some(section)
    }
}
