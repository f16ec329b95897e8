use std::any::Any;
use std::collections::HashMap;

use tracing::debug;

use crate::animation::{Animation, AnimationClock, Direction, State};
use crate::group::{AnimationList, ChildId};

/// Composite that drives every child from the same group-local time.
///
/// Children keep their own duration and looping: a shorter child stops at
/// its final boundary while its siblings play on, unless the group itself
/// loops, in which case a crossed loop seam sends everyone back to zero.
/// Children of indeterminate length are tracked separately and the group
/// ends once all of them have reported in and the longest controlled
/// child is done.
#[derive(Debug, Default)]
pub struct ParallelAnimationGroup {
    clock: AnimationClock,
    children: AnimationList,
    last_loop: u32,
    last_current_time: i64,
    // Finish times of uncontrolled children, keyed by stable child id;
    // `None` until the child is seen stopping.
    uncontrolled: HashMap<ChildId, Option<i64>>,
}

impl ParallelAnimationGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a child. A child added while the group runs is picked up
    /// on the next tick.
    pub fn push(&mut self, animation: Box<dyn Animation>) -> ChildId {
        self.children.push(animation)
    }

    pub fn insert(&mut self, index: usize, animation: Box<dyn Animation>) -> ChildId {
        self.children.insert(index, animation)
    }

    /// Removes and returns the child at `index`, dropping any recorded
    /// finish time for it.
    pub fn remove(&mut self, index: usize) -> Option<Box<dyn Animation>> {
        let (id, animation) = self.children.remove(index)?;
        self.uncontrolled.remove(&id);
        Some(animation)
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn child(&self, index: usize) -> Option<&dyn Animation> {
        self.children.get(index)
    }

    pub fn child_mut(&mut self, index: usize) -> Option<&mut dyn Animation> {
        // reborrow by hand; a `map` closure cannot shorten the boxed
        // trait object's lifetime behind `&mut`
        match self.children.get_mut(index) {
            Some(child) => Some(child.as_mut()),
            None => None,
        }
    }

    pub fn child_id(&self, index: usize) -> Option<ChildId> {
        self.children.id_at(index)
    }

    /// Records finish times of uncontrolled children that stopped during
    /// this tick, and stops the group once every uncontrolled child has
    /// reported and the longest controlled child is behind us.
    fn poll_uncontrolled(&mut self, current_time: i64) {
        let mut any = false;
        let mut unfinished = 0usize;
        for (id, child) in self.children.iter() {
            if child.total_duration().is_some() {
                continue;
            }
            any = true;
            let slot = self.uncontrolled.entry(id).or_insert(None);
            if slot.is_none() {
                if child.state() == State::Stopped {
                    *slot = Some(child.current_time());
                    debug!(finish_time = child.current_time(), "uncontrolled child finished");
                } else {
                    unfinished += 1;
                }
            }
        }
        if !any || unfinished > 0 {
            return;
        }

        let longest_controlled = self
            .children
            .iter()
            .filter_map(|(_, child)| child.total_duration())
            .max()
            .unwrap_or(0);
        if current_time >= longest_controlled {
            self.stop();
        }
    }
}

/// A child inherits Running or Paused from its group, never Stopped.
fn apply_group_state(group_state: State, child: &mut dyn Animation) {
    match group_state {
        State::Running => child.start(),
        State::Paused => child.pause(),
        State::Stopped => {}
    }
}

fn should_start(
    uncontrolled: &HashMap<ChildId, Option<i64>>,
    id: ChildId,
    child: &dyn Animation,
    group_time: i64,
    direction: Direction,
    start_if_at_end: bool,
) -> bool {
    match child.total_duration() {
        // An uncontrolled child runs until its finish has been recorded.
        None => !matches!(uncontrolled.get(&id), Some(Some(_))),
        Some(dura) => {
            if start_if_at_end {
                group_time <= dura
            } else if direction == Direction::Forward {
                group_time < dura
            } else {
                group_time != 0 && group_time <= dura
            }
        }
    }
}

impl Animation for ParallelAnimationGroup {
    fn clock(&self) -> &AnimationClock {
        &self.clock
    }

    fn clock_mut(&mut self) -> &mut AnimationClock {
        &mut self.clock
    }

    /// Longest child total, `None` while any child is indeterminate, 0
    /// when empty.
    fn duration(&self) -> Option<i64> {
        let mut longest = 0;
        for (_, child) in self.children.iter() {
            longest = longest.max(child.total_duration()?);
        }
        Some(longest)
    }

    fn update_current_time(&mut self, current_time: i64) {
        if self.children.is_empty() {
            return;
        }

        let group_state = self.clock.state();
        let direction = self.clock.direction();
        let current_loop = self.clock.current_loop();

        if current_loop > self.last_loop {
            // Crossed a seam going forward: complete the previous loop for
            // every child still going, so none of them replays the wrong
            // sub-interval after the naive modulo below.
            if let Some(dura) = self.duration() {
                if dura > 0 {
                    for (_, child) in self.children.iter_mut() {
                        if child.state() != State::Stopped {
                            child.set_current_time(dura);
                        }
                    }
                }
            }
        } else if current_loop < self.last_loop {
            // Crossed a seam going backward: rewind everyone to zero.
            for (_, child) in self.children.iter_mut() {
                apply_group_state(group_state, child.as_mut());
                child.set_current_time(0);
                child.stop();
            }
        }

        let crossed_forward = current_loop > self.last_loop;
        let last_current_time = self.last_current_time;
        for (id, child) in self.children.iter_mut() {
            let child_total = child.total_duration();
            let start_if_at_end = child_total
                .map(|dura| last_current_time > dura)
                .unwrap_or(false);
            if crossed_forward
                || should_start(
                    &self.uncontrolled,
                    id,
                    child.as_ref(),
                    current_time,
                    direction,
                    start_if_at_end,
                )
            {
                child.set_direction(direction);
                apply_group_state(group_state, child.as_mut());
            }

            if child.state() == group_state {
                child.set_current_time(current_time);
                if let Some(dura) = child_total {
                    // A child overtaken backward never reaches its own
                    // auto stop; park it at the final boundary.
                    if dura > 0 && current_time > dura {
                        child.stop();
                    }
                }
            }
        }

        self.last_loop = current_loop;
        self.last_current_time = current_time;

        self.poll_uncontrolled(current_time);
    }

    fn update_state(&mut self, new_state: State, old_state: State) {
        match new_state {
            State::Stopped => {
                for (_, child) in self.children.iter_mut() {
                    child.stop();
                }
                self.uncontrolled.clear();
            }
            State::Paused => {
                for (_, child) in self.children.iter_mut() {
                    if child.state() == State::Running {
                        child.pause();
                    }
                }
            }
            State::Running => {
                if old_state == State::Stopped {
                    // fresh run, forget finish times from the last one and
                    // line the seam bookkeeping up with the rewound clock,
                    // or the first tick replays a loop seam that never was
                    self.uncontrolled.clear();
                    self.last_loop = self.clock.current_loop();
                    self.last_current_time = self.clock.current_time();
                }
                let direction = self.clock.direction();
                let group_time = self.clock.current_time();
                for (id, child) in self.children.iter_mut() {
                    if old_state == State::Stopped {
                        child.stop();
                    }
                    child.set_direction(direction);
                    if should_start(
                        &self.uncontrolled,
                        id,
                        child.as_ref(),
                        group_time,
                        direction,
                        old_state == State::Stopped,
                    ) {
                        child.start();
                    }
                }
            }
        }
    }

    fn update_direction(&mut self, direction: Direction) {
        if self.clock.state() != State::Stopped {
            // Children already finished keep their old travel until the
            // next tick reconsiders them.
            for (_, child) in self.children.iter_mut() {
                if child.state() != State::Stopped {
                    child.set_direction(direction);
                }
            }
        } else {
            // the clock already sits at the new starting boundary
            self.last_loop = self.clock.current_loop();
            self.last_current_time = self.clock.current_time();
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
