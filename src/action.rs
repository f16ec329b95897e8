use std::any::Any;
use std::fmt;

use tracing::trace;

use crate::animation::{Animation, AnimationClock, State};

/// Zero-duration leaf that runs a host callback the moment it starts.
///
/// Placed inside a sequential schedule the callback fires in document
/// order, even when one coalesced tick passes over several of them.
pub struct ActionAnimation {
    clock: AnimationClock,
    action: Box<dyn FnMut()>,
}

impl ActionAnimation {
    pub fn new(action: impl FnMut() + 'static) -> Self {
        ActionAnimation {
            clock: AnimationClock::new(),
            action: Box::new(action),
        }
    }
}

impl fmt::Debug for ActionAnimation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionAnimation")
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl Animation for ActionAnimation {
    fn clock(&self) -> &AnimationClock {
        &self.clock
    }

    fn clock_mut(&mut self) -> &mut AnimationClock {
        &mut self.clock
    }

    fn duration(&self) -> Option<i64> {
        Some(0)
    }

    fn update_current_time(&mut self, _current_time: i64) {}

    fn update_state(&mut self, new_state: State, _old_state: State) {
        if new_state == State::Running {
            trace!("action fired");
            (self.action)();
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
