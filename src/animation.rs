use std::any::Any;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

/// Lifecycle state of an animation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    #[default]
    Stopped,
    Paused,
    Running,
}

/// Direction of travel through an animation's own timeline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

/// Repetition policy of a single animation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Loops {
    /// Play the timeline a fixed number of times. `Times(0)` never plays.
    Times(u32),
    /// Repeat until stopped; the total duration becomes indeterminate.
    Infinite,
}

impl Default for Loops {
    fn default() -> Self {
        Loops::Times(1)
    }
}

impl Loops {
    /// Number of iterations, or `None` when infinite.
    pub fn iterations(self) -> Option<u32> {
        match self {
            Loops::Times(n) => Some(n),
            Loops::Infinite => None,
        }
    }
}

/// Per-animation bookkeeping embedded by every animation kind.
///
/// Driven exclusively through the provided methods of [`Animation`]; kinds
/// and hosts read it through the accessors.
#[derive(Clone, Debug, Default)]
pub struct AnimationClock {
    pub(crate) state: State,
    pub(crate) direction: Direction,
    pub(crate) loops: Loops,
    pub(crate) current_loop: u32,
    pub(crate) current_time: i64,
    pub(crate) total_time: i64,
}

impl AnimationClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn loops(&self) -> Loops {
        self.loops
    }

    /// Zero-based index of the loop currently playing.
    pub fn current_loop(&self) -> u32 {
        self.current_loop
    }

    /// Local time in milliseconds within the current loop.
    pub fn current_time(&self) -> i64 {
        self.current_time
    }

    /// Time in milliseconds accumulated across all loops.
    pub fn total_time(&self) -> i64 {
        self.total_time
    }
}

/// One timed unit of change: a leaf effect or a composite group.
///
/// Implementors supply the clock storage, a nominal duration and the
/// `update_*` hooks. The provided methods drive the clock uniformly for
/// every kind and are not meant to be reimplemented.
pub trait Animation: std::fmt::Debug {
    /// Shared clock bookkeeping.
    fn clock(&self) -> &AnimationClock;

    fn clock_mut(&mut self) -> &mut AnimationClock;

    /// Nominal length of one loop in milliseconds. `None` marks an
    /// uncontrolled animation whose length is only known once it stops.
    fn duration(&self) -> Option<i64>;

    /// Receives each new local time within the current loop.
    fn update_current_time(&mut self, current_time: i64);

    /// Hook invoked after every state transition.
    fn update_state(&mut self, _new_state: State, _old_state: State) {}

    /// Hook invoked after the direction changes.
    fn update_direction(&mut self, _direction: Direction) {}

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn state(&self) -> State {
        self.clock().state
    }

    fn direction(&self) -> Direction {
        self.clock().direction
    }

    fn loops(&self) -> Loops {
        self.clock().loops
    }

    fn current_loop(&self) -> u32 {
        self.clock().current_loop
    }

    /// Local time within the current loop.
    fn current_time(&self) -> i64 {
        self.clock().current_time
    }

    /// Time accumulated across all loops.
    fn total_current_time(&self) -> i64 {
        self.clock().total_time
    }

    /// Length across all loops, `None` when indeterminate.
    fn total_duration(&self) -> Option<i64> {
        let dura = self.duration()?;
        if dura <= 0 {
            return Some(0);
        }
        match self.clock().loops {
            Loops::Times(n) => Some(dura.saturating_mul(i64::from(n))),
            Loops::Infinite => None,
        }
    }

    /// Seeks to an absolute time in milliseconds, measured across loops.
    ///
    /// Values outside `[0, total_duration]` are clamped, never rejected.
    /// The boundary convention is terminal-inclusive: at exactly
    /// `duration * loops` the clock reports the last loop at its full
    /// local time rather than a fresh loop at zero, and a running
    /// animation stops there. Travelling backward, the instant at an
    /// exact loop seam belongs to the loop being exited.
    fn set_current_time(&mut self, msecs: i64) {
        let msecs = msecs.max(0);
        let dura = self.duration();
        let total_dura = self.total_duration();
        let msecs = match total_dura {
            Some(total) => msecs.min(total),
            None => msecs,
        };

        let clock = self.clock_mut();
        clock.total_time = msecs;
        let old_loop = clock.current_loop;

        let (new_loop, local) = match dura {
            Some(d) if d > 0 => {
                let loop_ix = loop_index(msecs, d);
                match clock.loops.iterations() {
                    // The terminal instant parks at the end of the last
                    // loop instead of the start of a nonexistent one.
                    Some(n) if loop_ix == n => (n.saturating_sub(1), d),
                    _ => match clock.direction {
                        Direction::Forward => (loop_ix, msecs % d),
                        Direction::Backward => {
                            let local = ((msecs - 1) % d) + 1;
                            let ix = if local == d {
                                loop_ix.saturating_sub(1)
                            } else {
                                loop_ix
                            };
                            (ix, local)
                        }
                    },
                }
            }
            // Zero or indeterminate duration stays on loop zero; an
            // uncontrolled animation accumulates raw time.
            _ => (0, msecs),
        };
        clock.current_loop = new_loop;
        clock.current_time = local;

        self.update_current_time(local);

        let clock = self.clock();
        if clock.current_loop != old_loop {
            trace!(current_loop = clock.current_loop, "animation loop changed");
        }

        // Time-driven animations stop themselves at the end of travel.
        let at_forward_end =
            clock.direction == Direction::Forward && Some(clock.total_time) == total_dura;
        let at_backward_start = clock.direction == Direction::Backward && clock.total_time == 0;
        if at_forward_end || at_backward_start {
            self.stop();
        }
    }

    /// Starts playing from the direction's starting boundary, or picks a
    /// paused animation back up where it was left.
    fn start(&mut self) {
        if self.clock().state == State::Running {
            return;
        }
        set_state(self, State::Running);
    }

    /// Stops immediately. Stopping at the natural end of travel is what
    /// marks an uncontrolled animation finished.
    fn stop(&mut self) {
        if self.clock().state == State::Stopped {
            return;
        }
        set_state(self, State::Stopped);
    }

    /// Pauses in place. Only meaningful on a non-stopped animation.
    fn pause(&mut self) {
        if self.clock().state == State::Stopped {
            warn!("cannot pause a stopped animation");
            return;
        }
        set_state(self, State::Paused);
    }

    /// Resumes a paused animation without rewinding.
    fn resume(&mut self) {
        if self.clock().state != State::Paused {
            warn!("cannot resume an animation that is not paused");
            return;
        }
        set_state(self, State::Running);
    }

    /// Reverses travel. On a stopped animation the clock jumps to the
    /// opposite boundary so the next start plays from there.
    fn set_direction(&mut self, direction: Direction) {
        if self.clock().direction == direction {
            return;
        }
        if self.clock().state == State::Stopped {
            match direction {
                Direction::Backward => {
                    let d = self.duration().unwrap_or(0).max(0);
                    let total = self.total_duration().unwrap_or(d);
                    let last = self.clock().loops.iterations().unwrap_or(1);
                    let clock = self.clock_mut();
                    clock.current_time = d;
                    clock.current_loop = last.saturating_sub(1);
                    clock.total_time = total;
                }
                Direction::Forward => {
                    let clock = self.clock_mut();
                    clock.current_time = 0;
                    clock.current_loop = 0;
                    clock.total_time = 0;
                }
            }
        }
        self.clock_mut().direction = direction;
        trace!(?direction, "animation direction changed");
        self.update_direction(direction);
    }

    /// Sets the repetition policy. A running animation whose loops drop
    /// to zero stops; everything else takes effect on the next tick.
    fn set_loops(&mut self, loops: Loops) {
        self.clock_mut().loops = loops;
        if loops == Loops::Times(0) && self.clock().state != State::Stopped {
            self.stop();
        }
    }
}

fn loop_index(msecs: i64, dura: i64) -> u32 {
    u32::try_from(msecs / dura).unwrap_or(u32::MAX)
}

fn rewound_clock(
    dura: Option<i64>,
    total_dura: Option<i64>,
    direction: Direction,
    loops: Loops,
) -> (i64, i64, u32) {
    match direction {
        Direction::Forward => (0, 0, 0),
        Direction::Backward => {
            let d = dura.unwrap_or(0).max(0);
            if d == 0 {
                return (0, 0, 0);
            }
            match loops {
                // Infinite repetition has no far end; one loop's length is
                // the only finite anchor to rewind to.
                Loops::Infinite => (d, d, 0),
                Loops::Times(n) => (total_dura.unwrap_or(d), d, n.saturating_sub(1)),
            }
        }
    }
}

/// Uniform state transition shared by start/stop/pause/resume.
pub(crate) fn set_state<A: Animation + ?Sized>(anim: &mut A, new_state: State) {
    if anim.clock().state == new_state {
        return;
    }
    if anim.clock().loops == Loops::Times(0) {
        return;
    }

    let old_state = anim.clock().state;
    let old_time = anim.clock().current_time;
    let old_loop = anim.clock().current_loop;
    let old_direction = anim.clock().direction;
    let dura = anim.duration();
    let total_dura = anim.total_duration();

    // Entering Running or Paused from Stopped rewinds to the boundary the
    // current direction starts from. Resuming from Paused keeps position.
    if old_state == State::Stopped {
        let (total, local, loop_ix) =
            rewound_clock(dura, total_dura, old_direction, anim.clock().loops);
        let clock = anim.clock_mut();
        clock.total_time = total;
        clock.current_time = local;
        clock.current_loop = loop_ix;
    }

    anim.clock_mut().state = new_state;
    debug!(?old_state, ?new_state, "animation state changed");
    anim.update_state(new_state, old_state);
    if anim.clock().state != new_state {
        // the hook transitioned again; the nested call finished the job
        return;
    }

    if new_state == State::Stopped {
        let finished = match total_dura {
            None => true,
            Some(total) => match old_direction {
                Direction::Forward => old_time.saturating_mul(i64::from(old_loop) + 1) == total,
                Direction::Backward => old_time == 0,
            },
        };
        if finished {
            debug!("animation finished");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Leaf with a fixed (or indeterminate) duration that records every
    /// local time delivered to it.
    #[derive(Debug, Default)]
    struct Clip {
        clock: AnimationClock,
        duration: Option<i64>,
        delivered: Vec<i64>,
    }

    impl Clip {
        fn new(duration: Option<i64>) -> Self {
            Clip {
                duration,
                ..Default::default()
            }
        }
    }

    impl Animation for Clip {
        fn clock(&self) -> &AnimationClock {
            &self.clock
        }

        fn clock_mut(&mut self) -> &mut AnimationClock {
            &mut self.clock
        }

        fn duration(&self) -> Option<i64> {
            self.duration
        }

        fn update_current_time(&mut self, current_time: i64) {
            self.delivered.push(current_time);
        }

        fn as_any(&self) -> &dyn std::any::Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
            self
        }
    }

    #[test]
    fn negative_times_clamp_to_zero() {
        let mut clip = Clip::new(Some(100));
        clip.set_current_time(-50);
        assert_eq!(clip.current_time(), 0);
        assert_eq!(clip.total_current_time(), 0);
    }

    #[test]
    fn times_past_the_end_clamp_to_total_duration() {
        let mut clip = Clip::new(Some(100));
        clip.set_loops(Loops::Times(3));
        clip.set_current_time(10_000);
        assert_eq!(clip.total_current_time(), 300);
        assert_eq!(clip.current_time(), 100, "terminal instant parks at the loop end");
        assert_eq!(clip.current_loop(), 2, "terminal instant stays on the last loop");
    }

    #[test]
    fn forward_loop_arithmetic() {
        let mut clip = Clip::new(Some(100));
        clip.set_loops(Loops::Times(3));
        clip.set_current_time(250);
        assert_eq!(clip.current_loop(), 2);
        assert_eq!(clip.current_time(), 50);

        clip.set_current_time(200);
        assert_eq!(clip.current_loop(), 2, "forward seams open the next loop");
        assert_eq!(clip.current_time(), 0);
    }

    #[test]
    fn backward_seam_belongs_to_the_exited_loop() {
        let mut clip = Clip::new(Some(100));
        clip.set_loops(Loops::Times(3));
        clip.set_direction(Direction::Backward);
        clip.set_current_time(200);
        assert_eq!(clip.current_loop(), 1);
        assert_eq!(clip.current_time(), 100);
    }

    #[test]
    fn running_clip_stops_at_forward_end() {
        let mut clip = Clip::new(Some(100));
        clip.start();
        assert_eq!(clip.state(), State::Running);
        clip.set_current_time(100);
        assert_eq!(clip.state(), State::Stopped);
        assert_eq!(clip.current_time(), 100);
    }

    #[test]
    fn running_clip_stops_at_backward_start() {
        let mut clip = Clip::new(Some(100));
        clip.set_direction(Direction::Backward);
        clip.start();
        assert_eq!(clip.total_current_time(), 100, "backward start rewinds to the end");
        clip.set_current_time(40);
        assert_eq!(clip.state(), State::Running);
        clip.set_current_time(0);
        assert_eq!(clip.state(), State::Stopped);
    }

    #[test]
    fn uncontrolled_clips_accumulate_raw_time() {
        let mut clip = Clip::new(None);
        clip.start();
        clip.set_current_time(5_000);
        assert_eq!(clip.current_time(), 5_000);
        assert_eq!(clip.current_loop(), 0);
        assert_eq!(clip.state(), State::Running, "no known end, no auto stop");
    }

    #[test]
    fn zero_loops_refuse_to_start() {
        let mut clip = Clip::new(Some(100));
        clip.set_loops(Loops::Times(0));
        clip.start();
        assert_eq!(clip.state(), State::Stopped);
    }

    #[test]
    fn pause_on_stopped_is_ignored() {
        let mut clip = Clip::new(Some(100));
        clip.pause();
        assert_eq!(clip.state(), State::Stopped);
    }

    #[test]
    fn resume_requires_paused() {
        let mut clip = Clip::new(Some(100));
        clip.start();
        clip.set_current_time(30);
        clip.pause();
        clip.resume();
        assert_eq!(clip.state(), State::Running);
        assert_eq!(clip.current_time(), 30, "resume keeps the paused position");
    }

    #[test]
    fn direction_flip_while_stopped_jumps_to_the_far_end() {
        let mut clip = Clip::new(Some(100));
        clip.set_loops(Loops::Times(2));
        clip.set_direction(Direction::Backward);
        assert_eq!(clip.current_time(), 100);
        assert_eq!(clip.current_loop(), 1);
        assert_eq!(clip.total_current_time(), 200);

        clip.set_direction(Direction::Forward);
        assert_eq!(clip.current_time(), 0);
        assert_eq!(clip.total_current_time(), 0);
    }

    #[test]
    fn total_duration_of_zero_length_clip_ignores_loops() {
        let mut clip = Clip::new(Some(0));
        clip.set_loops(Loops::Infinite);
        assert_eq!(clip.total_duration(), Some(0));
    }

    #[test]
    fn infinite_loops_make_total_duration_indeterminate() {
        let mut clip = Clip::new(Some(100));
        clip.set_loops(Loops::Infinite);
        assert_eq!(clip.total_duration(), None);
        clip.set_current_time(1_234);
        assert_eq!(clip.current_loop(), 12);
        assert_eq!(clip.current_time(), 34);
    }

    #[test]
    fn local_times_are_delivered_to_the_kind() {
        let mut clip = Clip::new(Some(100));
        clip.set_loops(Loops::Times(2));
        clip.set_current_time(30);
        clip.set_current_time(130);
        assert_eq!(clip.delivered, vec![30, 30]);
    }
}
