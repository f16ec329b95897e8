use std::any::Any;

use tracing::warn;

use crate::animation::{Animation, AnimationClock};

/// Pure passage of time: occupies its slot in a parent's schedule and has
/// no other effect. The classic spacer inside sequential schedules.
#[derive(Clone, Debug)]
pub struct PauseAnimation {
    clock: AnimationClock,
    duration: i64,
}

impl PauseAnimation {
    /// Spacer length used when none is given.
    pub const DEFAULT_DURATION: i64 = 250;

    pub fn new(duration: i64) -> Self {
        PauseAnimation {
            clock: AnimationClock::new(),
            duration: duration.max(0),
        }
    }

    pub fn set_duration(&mut self, duration: i64) {
        if duration < 0 {
            warn!(duration, "pause duration cannot be negative");
            return;
        }
        self.duration = duration;
    }
}

impl Default for PauseAnimation {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DURATION)
    }
}

impl Animation for PauseAnimation {
    fn clock(&self) -> &AnimationClock {
        &self.clock
    }

    fn clock_mut(&mut self) -> &mut AnimationClock {
        &mut self.clock
    }

    fn duration(&self) -> Option<i64> {
        Some(self.duration)
    }

    fn update_current_time(&mut self, _current_time: i64) {}

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::State;

    #[test]
    fn default_duration_is_a_quarter_second() {
        assert_eq!(PauseAnimation::default().duration(), Some(250));
    }

    #[test]
    fn negative_construction_clamps_and_negative_set_is_refused() {
        let mut pause = PauseAnimation::new(-10);
        assert_eq!(pause.duration(), Some(0));
        pause.set_duration(40);
        pause.set_duration(-5);
        assert_eq!(pause.duration(), Some(40));
    }

    #[test]
    fn a_running_pause_finishes_at_its_duration() {
        let mut pause = PauseAnimation::new(120);
        pause.start();
        pause.set_current_time(119);
        assert_eq!(pause.state(), State::Running);
        pause.set_current_time(120);
        assert_eq!(pause.state(), State::Stopped);
    }

    #[test]
    fn cloning_keeps_the_duration() {
        let pause = PauseAnimation::new(75);
        assert_eq!(pause.clone().duration(), Some(75));
    }
}
