//! A group that plays its children one after another.

use tracing::{debug, trace, warn};

use crate::animation::{Animation, AnimationClock, Direction, State};
use crate::group::{AnimationList, ChildId};

/// Plays its children in order, one at a time.
///
/// The group's local time is the concatenation of the children's total
/// durations. Seeking anywhere inside that span activates the child whose
/// slice contains the target and fast-forwards (or rewinds) every child in
/// between, so each one still observes its own start and finish.
///
/// Children without a known duration run until they stop themselves; the
/// time they report at that moment is recorded and used for the schedule
/// from then on.
#[derive(Debug, Default)]
pub struct SequentialAnimationGroup {
    clock: AnimationClock,
    children: AnimationList,
    cursor: Option<Cursor>,
    /// Observed spans of finished open-ended children, index-aligned with
    /// the child list. `None` marks a child that has not finished yet.
    actual_duration: Vec<Option<i64>>,
    last_loop: u32,
}

/// Where the active child sits in the list.
///
/// The index is only trusted while `generation` matches the child list;
/// after an insert or remove the id re-resolves the position.
#[derive(Clone, Copy, Debug)]
struct Cursor {
    index: usize,
    id: ChildId,
    generation: u64,
}

/// Result of mapping the group's local time onto the child sequence.
#[derive(Clone, Copy, Debug)]
struct AnimationIndex {
    index: usize,
    time_offset: i64,
}

impl SequentialAnimationGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a child at the end of the sequence.
    pub fn push(&mut self, animation: Box<dyn Animation>) -> ChildId {
        let index = self.children.len();
        let id = self.children.push(animation);
        self.child_inserted(index);
        id
    }

    /// Inserts a child before `index`, shifting later children down.
    pub fn insert(&mut self, index: usize, animation: Box<dyn Animation>) -> ChildId {
        let index = index.min(self.children.len());
        let id = self.children.insert(index, animation);
        self.child_inserted(index);
        id
    }

    /// Removes and returns the child at `index`.
    ///
    /// Removing the active child leaves the group without a current child
    /// until the next tick resolves a new one from the group's time.
    pub fn remove(&mut self, index: usize) -> Option<Box<dyn Animation>> {
        let (id, animation) = self.children.remove(index)?;
        self.child_removed(index, id);
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

    /// Index of the child currently being played, if any.
    pub fn current_index(&self) -> Option<usize> {
        self.current().map(|(index, _)| index)
    }

    fn current(&self) -> Option<(usize, ChildId)> {
        let cursor = self.cursor?;
        if cursor.generation == self.children.generation() {
            return Some((cursor.index, cursor.id));
        }
        let index = self.children.index_of(cursor.id)?;
        Some((index, cursor.id))
    }

    /// Re-derives the stored cursor after the child list changed shape.
    fn refresh_cursor(&mut self) {
        let Some(cursor) = self.cursor else { return };
        if cursor.generation == self.children.generation() {
            return;
        }
        self.cursor = self.children.index_of(cursor.id).map(|index| Cursor {
            index,
            id: cursor.id,
            generation: self.children.generation(),
        });
    }

    /// Total span of the child at `index`, falling back to the recorded
    /// span when the child itself reports none.
    fn child_actual_total_duration(&self, index: usize) -> Option<i64> {
        let child = self.children.get(index)?;
        match child.total_duration() {
            Some(total) => Some(total),
            None => self.actual_duration.get(index).copied().flatten(),
        }
    }

    /// Maps the group's local time to the child holding it.
    ///
    /// A child is the one at the current time when its span is unknown,
    /// when it ends after the current time, or when it ends exactly at the
    /// current time and either it is the last child or the group is
    /// playing backward (a seam instant belongs to the child being
    /// exited). Zero-duration children are passed over on the way (they
    /// still get started and stopped by the traversal in
    /// `update_current_time`).
    fn index_for_current_time(&self) -> AnimationIndex {
        debug_assert!(!self.children.is_empty());
        let current_time = self.clock.current_time();
        let count = self.children.len();
        let backward = self.clock.direction() == Direction::Backward;
        let mut offset = 0i64;
        let mut last_span = 0i64;
        for index in 0..count {
            match self.child_actual_total_duration(index) {
                None => return AnimationIndex { index, time_offset: offset },
                Some(span) => {
                    if current_time < offset + span
                        || (current_time == offset + span
                            && (backward || index + 1 == count))
                    {
                        return AnimationIndex { index, time_offset: offset };
                    }
                    last_span = span;
                    offset += span;
                }
            }
        }
        // Reachable when the time ran past every known span, which means
        // an open-ended schedule overshot or every child is zero length.
        AnimationIndex {
            index: count - 1,
            time_offset: offset - last_span,
        }
    }

    /// Makes the child at `index` current, stopping the outgoing one and
    /// starting the new one.
    ///
    /// `intermediate` marks children that are only being passed over while
    /// seeking; they are not paused even when the group is paused, so they
    /// can be driven straight to their boundary.
    fn set_current_animation(&mut self, index: usize, intermediate: bool) {
        if self.children.is_empty() {
            self.cursor = None;
            return;
        }
        let index = index.min(self.children.len() - 1);
        let Some(id) = self.children.id_at(index) else { return };

        if let Some((current_index, current_id)) = self.current() {
            if current_id == id {
                // Same child, possibly at a shifted position.
                self.cursor = Some(Cursor {
                    index,
                    id,
                    generation: self.children.generation(),
                });
                return;
            }
            if let Some(child) = self.children.get_mut(current_index) {
                child.stop();
            }
        }

        self.cursor = Some(Cursor {
            index,
            id,
            generation: self.children.generation(),
        });
        trace!(index, "sequential group current child changed");
        self.activate_current(intermediate);
    }

    /// Restarts the current child so it runs in the group's direction.
    fn activate_current(&mut self, intermediate: bool) {
        let group_state = self.clock.state();
        if group_state == State::Stopped {
            return;
        }
        let direction = self.clock.direction();
        let Some((index, _)) = self.current() else { return };
        let Some(child) = self.children.get_mut(index) else { return };
        child.stop();
        child.set_direction(direction);
        child.start();
        if !intermediate && group_state == State::Paused {
            child.pause();
        }
    }

    /// Makes the first (or, running backward, the last) child current.
    fn restart(&mut self) {
        match self.clock.direction() {
            Direction::Forward => {
                self.last_loop = 0;
                if self.current_index() == Some(0) {
                    self.activate_current(false);
                } else {
                    self.set_current_animation(0, false);
                }
            }
            Direction::Backward => {
                self.last_loop = match self.clock.loops().iterations() {
                    Some(count) => count.saturating_sub(1),
                    None => self.clock.current_loop(),
                };
                let last = self.children.len().saturating_sub(1);
                if self.current_index() == Some(last) {
                    self.activate_current(false);
                } else {
                    self.set_current_animation(last, false);
                }
            }
        }
    }

    /// Drives every child between the cursor and `new_index` to its end,
    /// wrapping through a loop boundary first when one was crossed.
    fn advance_forwards(&mut self, new_index: usize) {
        if self.last_loop < self.clock.current_loop() {
            // Finish out the previous loop before starting the new one.
            let start = self.current_index().unwrap_or(0);
            for index in start..self.children.len() {
                self.set_current_animation(index, true);
                let span = self.child_actual_total_duration(index).unwrap_or(0);
                if let Some(child) = self.children.get_mut(index) {
                    child.set_current_time(span);
                }
            }
            if self.children.len() == 1 {
                // A single child never changes index, so force the restart.
                self.activate_current(false);
            } else {
                self.set_current_animation(0, true);
            }
        }

        let start = self.current_index().unwrap_or(0);
        for index in start..new_index {
            self.set_current_animation(index, true);
            let span = self.child_actual_total_duration(index).unwrap_or(0);
            if let Some(child) = self.children.get_mut(index) {
                child.set_current_time(span);
            }
        }
    }

    /// Mirror of `advance_forwards` for seeks toward earlier children.
    fn rewind_forwards(&mut self, new_index: usize) {
        if self.last_loop > self.clock.current_loop() {
            // Unwind the loop ahead down to its first child.
            let start = self.current_index().unwrap_or(0);
            for index in (0..=start).rev() {
                self.set_current_animation(index, true);
                if let Some(child) = self.children.get_mut(index) {
                    child.set_current_time(0);
                }
            }
            if self.children.len() == 1 {
                self.activate_current(false);
            } else {
                self.set_current_animation(self.children.len() - 1, true);
            }
        }

        let start = self.current_index().unwrap_or(0);
        for index in ((new_index + 1)..=start).rev() {
            self.set_current_animation(index, true);
            if let Some(child) = self.children.get_mut(index) {
                child.set_current_time(0);
            }
        }
    }

    /// True when the whole schedule has played out in the forward
    /// direction on the final loop.
    fn at_end(&self) -> bool {
        let Some((index, _)) = self.current() else { return false };
        let Some(child) = self.children.get(index) else { return false };
        let on_last_loop = match self.clock.loops().iterations() {
            Some(count) => count > 0 && self.clock.current_loop() == count - 1,
            None => false,
        };
        on_last_loop
            && self.clock.direction() == Direction::Forward
            && index + 1 == self.children.len()
            && self.child_actual_total_duration(index) == Some(child.total_current_time())
    }

    /// Records the span an open-ended child ran for, then hands the stage
    /// to its neighbor or finishes the group at either end of the list.
    fn uncontrolled_child_finished(&mut self, index: usize) {
        let observed = self
            .children
            .get(index)
            .map(|child| child.current_time())
            .unwrap_or(0);
        if self.actual_duration.len() < index + 1 {
            self.actual_duration.resize(index + 1, None);
        }
        self.actual_duration[index] = Some(observed);
        debug!(index, observed, "open ended child finished");

        let last = self.children.len() - 1;
        match self.clock.direction() {
            Direction::Forward if index == last => self.stop(),
            Direction::Backward if index == 0 => self.stop(),
            Direction::Forward => self.set_current_animation(index + 1, false),
            Direction::Backward => self.set_current_animation(index - 1, false),
        }
    }

    fn child_inserted(&mut self, index: usize) {
        if index < self.actual_duration.len() {
            self.actual_duration.insert(index, None);
        }
        let Some(cursor) = self.cursor else {
            self.set_current_animation(0, false);
            return;
        };

        let unstarted = self
            .children
            .index_of(cursor.id)
            .and_then(|current| self.children.get(current))
            .map(|child| child.current_time() == 0 && child.current_loop() == 0)
            .unwrap_or(false);
        if cursor.index == index && unstarted {
            // Slotted in front of a child that never started; the new
            // child takes its place as current.
            self.set_current_animation(index, false);
        } else {
            self.refresh_cursor();
        }

        if self.current_index().map(|current| index < current).unwrap_or(false)
            || self.clock.current_loop() != 0
        {
            warn!(index, "inserting before the active child reshapes a schedule already played");
        }
    }

    fn child_removed(&mut self, index: usize, id: ChildId) {
        if index < self.actual_duration.len() {
            self.actual_duration.remove(index);
        }
        let Some(cursor) = self.cursor else { return };

        if cursor.id == id {
            // The active child is gone. The next tick maps the group's
            // time onto the survivors and picks a new current child.
            self.cursor = None;
            return;
        }

        self.refresh_cursor();

        // Re-anchor the group's local time to the shifted offsets so the
        // surviving current child keeps playing without a jump.
        if let Some((current_index, _)) = self.current() {
            let mut offset = 0i64;
            for earlier in 0..current_index {
                offset += self.child_actual_total_duration(earlier).unwrap_or(0);
            }
            let child_time = self
                .children
                .get(current_index)
                .map(|child| child.total_current_time())
                .unwrap_or(0);
            self.clock.current_time = offset + child_time;
            self.clock.total_time = match self.duration() {
                Some(dura) => {
                    i64::from(self.clock.current_loop()) * dura + self.clock.current_time
                }
                None => self.clock.current_time,
            };
        }
    }
}

impl Animation for SequentialAnimationGroup {
    fn clock(&self) -> &AnimationClock {
        &self.clock
    }

    fn clock_mut(&mut self) -> &mut AnimationClock {
        &mut self.clock
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }

    /// Sum of the children's total durations.
    ///
    /// `None` when any child is open ended and has no recorded span yet,
    /// or when the final child is open ended at all; a schedule whose end
    /// is unknown stays unknown no matter what was recorded before.
    fn duration(&self) -> Option<i64> {
        let count = self.children.len();
        let mut total = 0i64;
        for (index, (_, child)) in self.children.iter().enumerate() {
            match child.total_duration() {
                Some(span) => total = total.saturating_add(span),
                None => {
                    let recorded = if index + 1 < count {
                        self.actual_duration.get(index).copied().flatten()
                    } else {
                        None
                    };
                    total = total.saturating_add(recorded?);
                }
            }
        }
        Some(total)
    }

    fn update_current_time(&mut self, current_time: i64) {
        self.refresh_cursor();
        if self.children.is_empty() {
            return;
        }

        let new = self.index_for_current_time();

        // Spans recorded at or past the new position are stale; children
        // re-measure when they run again.
        self.actual_duration.truncate(new.index);

        let current_loop = self.clock.current_loop();
        if let Some(current_index) = self.current_index() {
            if self.last_loop < current_loop
                || (self.last_loop == current_loop && current_index < new.index)
            {
                self.advance_forwards(new.index);
            } else if self.last_loop > current_loop
                || (self.last_loop == current_loop && current_index > new.index)
            {
                self.rewind_forwards(new.index);
            }
        }

        self.set_current_animation(new.index, false);

        let new_local = current_time - new.time_offset;
        let Some((index, _)) = self.current() else {
            self.last_loop = self.clock.current_loop();
            return;
        };
        if let Some(child) = self.children.get_mut(index) {
            child.set_current_time(new_local);
        }

        // Children without a known span end by stopping themselves.
        let open_ended_finished = self.clock.state() == State::Running
            && self
                .children
                .get(index)
                .map(|child| child.total_duration().is_none() && child.state() == State::Stopped)
                .unwrap_or(false);
        if open_ended_finished {
            self.uncontrolled_child_finished(index);
        }

        if self.at_end() {
            // Clip the group's time to what the last child accepted.
            if let Some((last_index, _)) = self.current() {
                if let Some(child) = self.children.get(last_index) {
                    self.clock.current_time += child.total_current_time() - new_local;
                }
            }
            self.stop();
        }

        self.last_loop = self.clock.current_loop();
    }

    fn update_state(&mut self, new_state: State, old_state: State) {
        let Some((index, _)) = self.current() else { return };

        match new_state {
            State::Stopped => {
                if let Some(child) = self.children.get_mut(index) {
                    child.stop();
                }
            }
            State::Paused => {
                let coherent = old_state == State::Running
                    && self
                        .children
                        .get(index)
                        .map(|child| child.state() == old_state)
                        .unwrap_or(false);
                if coherent {
                    if let Some(child) = self.children.get_mut(index) {
                        child.pause();
                    }
                } else {
                    self.restart();
                }
            }
            State::Running => {
                let coherent = old_state == State::Paused
                    && self
                        .children
                        .get(index)
                        .map(|child| child.state() == old_state)
                        .unwrap_or(false);
                if coherent {
                    if let Some(child) = self.children.get_mut(index) {
                        child.start();
                    }
                } else {
                    self.restart();
                }
            }
        }
    }

    fn update_direction(&mut self, direction: Direction) {
        if self.clock.state() == State::Stopped {
            return;
        }
        if let Some((index, _)) = self.current() {
            if let Some(child) = self.children.get_mut(index) {
                child.set_direction(direction);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::Loops;
    use crate::pause::PauseAnimation;

    fn sequence(durations: &[i64]) -> SequentialAnimationGroup {
        let mut group = SequentialAnimationGroup::new();
        for &duration in durations {
            group.push(Box::new(PauseAnimation::new(duration)));
        }
        group
    }

    #[test]
    fn duration_is_the_sum_of_the_children() {
        let group = sequence(&[250, 100]);
        assert_eq!(group.duration(), Some(350));
        assert_eq!(group.total_duration(), Some(350));
    }

    #[test]
    fn seeking_lands_in_the_right_child() {
        let mut group = sequence(&[250, 100]);
        group.start();
        group.set_current_time(260);

        assert_eq!(group.current_index(), Some(1));
        let second = group.child(1).unwrap();
        assert_eq!(second.current_time(), 10, "260 into the schedule is 10 into the second child");
        assert_eq!(second.state(), State::Running);
        let first = group.child(0).unwrap();
        assert_eq!(first.state(), State::Stopped);
        assert_eq!(first.current_time(), 250, "skipped children are driven to their end");
    }

    #[test]
    fn the_group_stops_at_the_end_of_the_last_child() {
        let mut group = sequence(&[250, 100]);
        group.start();
        group.set_current_time(350);

        assert_eq!(group.state(), State::Stopped);
        assert_eq!(group.current_time(), 350);
        assert_eq!(group.child(1).unwrap().current_time(), 100);
    }

    #[test]
    fn seeking_backwards_rewinds_intermediate_children() {
        let mut group = sequence(&[250, 100]);
        group.start();
        group.set_current_time(300);
        assert_eq!(group.current_index(), Some(1));

        group.set_current_time(100);
        assert_eq!(group.current_index(), Some(0));
        assert_eq!(group.child(0).unwrap().current_time(), 100);
        assert_eq!(
            group.child(1).unwrap().current_time(),
            0,
            "rewound children are wound back to their start"
        );
    }

    #[test]
    fn running_backward_plays_the_children_in_reverse() {
        let mut group = sequence(&[250, 100]);
        group.set_direction(Direction::Backward);
        group.start();

        assert_eq!(group.current_index(), Some(1));
        assert_eq!(group.child(1).unwrap().state(), State::Running);

        group.set_current_time(250);
        assert_eq!(
            group.current_index(),
            Some(0),
            "a backward seam belongs to the child being entered backwards"
        );
        assert_eq!(group.child(0).unwrap().current_time(), 250);
        assert_eq!(group.child(1).unwrap().current_time(), 0);

        group.set_current_time(100);
        assert_eq!(group.current_index(), Some(0));
        assert_eq!(group.child(0).unwrap().current_time(), 100);

        group.set_current_time(0);
        assert_eq!(group.state(), State::Stopped);
    }

    #[test]
    fn looping_replays_the_schedule() {
        let mut group = sequence(&[100, 50]);
        group.set_loops(Loops::Times(2));
        group.start();

        group.set_current_time(120);
        assert_eq!(group.current_loop(), 0);
        assert_eq!(group.current_index(), Some(1));

        group.set_current_time(180);
        assert_eq!(group.current_loop(), 1);
        assert_eq!(group.current_index(), Some(0));
        assert_eq!(group.child(0).unwrap().current_time(), 30);

        group.set_current_time(300);
        assert_eq!(group.state(), State::Stopped);
    }

    #[test]
    fn pausing_pauses_the_current_child_only() {
        let mut group = sequence(&[250, 100]);
        group.start();
        group.set_current_time(260);
        group.pause();

        assert_eq!(group.state(), State::Paused);
        assert_eq!(group.child(1).unwrap().state(), State::Paused);
        assert_eq!(group.child(0).unwrap().state(), State::Stopped);

        group.resume();
        assert_eq!(group.child(1).unwrap().state(), State::Running);
    }

    #[test]
    fn removing_the_active_child_resolves_a_new_one_on_the_next_tick() {
        let mut group = sequence(&[250, 100]);
        group.start();
        group.set_current_time(100);
        assert_eq!(group.current_index(), Some(0));

        let removed = group.remove(0);
        assert!(removed.is_some());
        assert_eq!(group.current_index(), None);

        group.set_current_time(40);
        assert_eq!(group.current_index(), Some(0));
        assert_eq!(group.child(0).unwrap().current_time(), 40);
    }

    #[test]
    fn removing_an_earlier_child_keeps_the_current_one_playing() {
        let mut group = sequence(&[250, 100]);
        group.start();
        group.set_current_time(260);
        assert_eq!(group.current_index(), Some(1));

        group.remove(0);
        assert_eq!(group.current_index(), Some(0));
        assert_eq!(group.current_time(), 10, "the schedule re-anchors to the shifted offset");
        assert_eq!(group.total_current_time(), 10);

        group.set_current_time(60);
        assert_eq!(group.child(0).unwrap().current_time(), 60);
        assert_eq!(group.child(0).unwrap().state(), State::Running);
    }

    #[test]
    fn removal_re_anchors_with_a_looping_survivor() {
        let mut group = sequence(&[40]);
        let mut long = PauseAnimation::new(100);
        long.set_loops(Loops::Times(3));
        group.push(Box::new(long));

        group.start();
        group.set_current_time(250);
        assert_eq!(group.child(1).unwrap().current_loop(), 2);

        group.remove(0);
        assert_eq!(
            group.current_time(),
            210,
            "the anchor counts the survivor's whole run, not its current pass"
        );
        assert_eq!(group.total_current_time(), 210);

        group.set_current_time(260);
        assert_eq!(group.child(0).unwrap().current_loop(), 2);
        assert_eq!(group.child(0).unwrap().current_time(), 60);
        assert_eq!(group.child(0).unwrap().state(), State::Running);
    }

    #[test]
    fn inserting_before_the_start_takes_over_as_current() {
        let mut group = sequence(&[100]);
        group.insert(0, Box::new(PauseAnimation::new(50)));

        assert_eq!(group.current_index(), Some(0));
        assert_eq!(group.duration(), Some(150));

        group.start();
        group.set_current_time(20);
        assert_eq!(group.child(0).unwrap().current_time(), 20);
        assert_eq!(group.child(1).unwrap().current_time(), 0);
    }

    #[test]
    fn an_empty_group_finishes_immediately() {
        let mut group = SequentialAnimationGroup::new();
        assert_eq!(group.duration(), Some(0));
        group.start();
        group.set_current_time(0);
        assert_eq!(group.state(), State::Stopped);
    }
}
