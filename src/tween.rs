use std::any::Any;
use std::fmt;

use keyframe::{AnimationSequence, CanTween, Keyframe};

use crate::animation::{Animation, AnimationClock};
use crate::easing::{bake_spring, EasingType, SpringConfig};

/// Keyframed value leaf.
///
/// The clock's local time drives a [`keyframe`] sequence whose time unit
/// is milliseconds; the interpolated value is cached so hosts can poll it
/// between ticks (reachable through `as_any` when the tween sits inside a
/// group).
pub struct TweenAnimation<T>
where
    T: Clone + CanTween + Default + 'static,
{
    clock: AnimationClock,
    // (value, absolute ms, easing into the value)
    raw_keyframes: Vec<(T, f64, EasingType)>,
    sequence: AnimationSequence<T>,
    current_value: T,
}

impl<T> TweenAnimation<T>
where
    T: Clone + CanTween + Default + 'static,
{
    /// A tween resting at `initial` with no motion yet.
    pub fn new(initial: T) -> Self {
        let raw = vec![(initial.clone(), 0.0, EasingType::Linear)];
        TweenAnimation {
            clock: AnimationClock::new(),
            sequence: sequence_from(&raw),
            raw_keyframes: raw,
            current_value: initial,
        }
    }

    /// Single-segment tween from `from` to `to` over `duration_ms`.
    pub fn from_to(from: T, to: T, duration_ms: i64, easing: EasingType) -> Self {
        let mut tween = Self::new(from);
        tween.keyframe_to(to, duration_ms, easing);
        tween
    }

    /// Appends a keyframe `duration_ms` after the current end of the
    /// sequence. A zero-length segment replaces the end value instead of
    /// stacking a second keyframe on the same instant.
    pub fn keyframe_to(&mut self, target: T, duration_ms: i64, easing: EasingType) {
        let at = self.sequence.duration() + duration_ms.max(0) as f64;
        self.push_raw(target, at, easing);
        self.sequence = sequence_from(&self.raw_keyframes);
    }

    /// Latest interpolated value.
    pub fn value(&self) -> &T {
        &self.current_value
    }

    fn push_raw(&mut self, value: T, at: f64, easing: EasingType) {
        match self.raw_keyframes.last_mut() {
            Some(last) if last.1 >= at => *last = (value, last.1, easing),
            _ => self.raw_keyframes.push((value, at, easing)),
        }
    }
}

impl TweenAnimation<f32> {
    /// Bakes a damped spring from the sequence's end value to `target`
    /// into linear keyframes appended after the current end.
    pub fn spring_to(&mut self, target: f32, config: SpringConfig) {
        let start = self
            .raw_keyframes
            .last()
            .map(|(value, _, _)| *value)
            .unwrap_or(self.current_value);
        let end = self.sequence.duration();
        for (value, at_secs) in bake_spring(start, target, config) {
            self.push_raw(value, end + at_secs * 1000.0, EasingType::Linear);
        }
        self.sequence = sequence_from(&self.raw_keyframes);
    }
}

fn sequence_from<T>(raw: &[(T, f64, EasingType)]) -> AnimationSequence<T>
where
    T: Clone + CanTween + Default,
{
    let frames: Vec<Keyframe<T>> = raw
        .iter()
        .map(|(value, at, easing)| Keyframe::new(value.clone(), *at, *easing))
        .collect();
    AnimationSequence::from(frames)
}

impl<T> fmt::Debug for TweenAnimation<T>
where
    T: Clone + CanTween + Default + fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TweenAnimation")
            .field("clock", &self.clock)
            .field("current_value", &self.current_value)
            .finish_non_exhaustive()
    }
}

impl<T> Animation for TweenAnimation<T>
where
    T: Clone + CanTween + Default + fmt::Debug + 'static,
{
    fn clock(&self) -> &AnimationClock {
        &self.clock
    }

    fn clock_mut(&mut self) -> &mut AnimationClock {
        &mut self.clock
    }

    fn duration(&self) -> Option<i64> {
        Some(self.sequence.duration().round() as i64)
    }

    fn update_current_time(&mut self, current_time: i64) {
        self.sequence.advance_to(current_time as f64);
        self.current_value = self.sequence.now();
    }

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
    use crate::animation::{Direction, Loops, State};

    #[test]
    fn linear_segment_interpolates() {
        let mut tween = TweenAnimation::from_to(0.0_f32, 100.0, 400, EasingType::Linear);
        assert_eq!(tween.duration(), Some(400));

        tween.set_current_time(200);
        assert!((tween.value() - 50.0).abs() < 1e-4, "got {}", tween.value());

        tween.set_current_time(400);
        assert!((tween.value() - 100.0).abs() < 1e-4);
    }

    #[test]
    fn chained_keyframes_extend_the_duration() {
        let mut tween = TweenAnimation::new(0.0_f32);
        tween.keyframe_to(10.0, 100, EasingType::Linear);
        tween.keyframe_to(30.0, 300, EasingType::EaseInOut);
        assert_eq!(tween.duration(), Some(400));

        tween.set_current_time(100);
        assert!((tween.value() - 10.0).abs() < 1e-4);
    }

    #[test]
    fn zero_length_segment_replaces_the_end_value() {
        let mut tween = TweenAnimation::new(0.0_f32);
        tween.keyframe_to(10.0, 0, EasingType::Linear);
        assert_eq!(tween.duration(), Some(0));
        tween.set_current_time(0);
        assert!((tween.value() - 10.0).abs() < 1e-4);
    }

    #[test]
    fn looping_tween_replays_each_loop() {
        let mut tween = TweenAnimation::from_to(0.0_f32, 100.0, 200, EasingType::Linear);
        tween.set_loops(Loops::Times(2));
        tween.set_current_time(250);
        assert_eq!(tween.current_loop(), 1);
        assert!((tween.value() - 25.0).abs() < 1e-4);
    }

    #[test]
    fn backward_travel_reads_the_curve_in_reverse() {
        let mut tween = TweenAnimation::from_to(0.0_f32, 100.0, 200, EasingType::Linear);
        tween.set_direction(Direction::Backward);
        tween.start();
        tween.set_current_time(50);
        assert!((tween.value() - 25.0).abs() < 1e-4);
        assert_eq!(tween.state(), State::Running);
    }

    #[test]
    fn springs_append_after_existing_motion() {
        let mut tween = TweenAnimation::from_to(0.0_f32, 50.0, 100, EasingType::Linear);
        tween.spring_to(100.0, SpringConfig::default());
        let total = tween.duration().unwrap();
        assert!(total > 100, "spring must add time, got {total}");

        tween.set_current_time(total);
        assert!((tween.value() - 100.0).abs() < 1e-3);
    }
}
