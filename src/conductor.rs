//! Owns top level animations and advances them from host time deltas.

use std::time::Duration;

use tracing::{debug, warn};

use crate::animation::{Animation, Direction, State};

/// Handle to an animation owned by a [`Conductor`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TrackId(usize);

/// Drives a set of top level animations from wall clock deltas.
///
/// The conductor is host agnostic: feed it the elapsed time between frames
/// and it converts that into whole millisecond ticks for the animations it
/// owns, carrying the fractional remainder over to the next call. Running
/// animations move by the tick in their own direction; paused and stopped
/// tracks are left alone.
#[derive(Debug)]
pub struct Conductor {
    tracks: Vec<Option<Box<dyn Animation>>>,
    carry: f64,
    speed: f64,
}

impl Default for Conductor {
    fn default() -> Self {
        Self::new()
    }
}

impl Conductor {
    pub fn new() -> Self {
        Self {
            tracks: Vec::new(),
            carry: 0.0,
            speed: 1.0,
        }
    }

    /// Playback rate applied to every delta handed to [`advance`].
    ///
    /// [`advance`]: Conductor::advance
    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn set_speed(&mut self, speed: f64) {
        if !speed.is_finite() || speed < 0.0 {
            warn!(speed, "ignoring invalid playback speed");
            return;
        }
        self.speed = speed;
    }

    /// Takes ownership of an animation without starting it.
    pub fn add(&mut self, animation: Box<dyn Animation>) -> TrackId {
        match self.tracks.iter().position(Option::is_none) {
            Some(slot) => {
                self.tracks[slot] = Some(animation);
                TrackId(slot)
            }
            None => {
                self.tracks.push(Some(animation));
                TrackId(self.tracks.len() - 1)
            }
        }
    }

    /// Adds an animation and starts it right away.
    pub fn play(&mut self, animation: Box<dyn Animation>) -> TrackId {
        let track = self.add(animation);
        self.start(track);
        track
    }

    /// Starts the animation on `track` and delivers its first tick, so
    /// zero length animations finish without waiting for the next frame.
    pub fn start(&mut self, track: TrackId) {
        if let Some(animation) = self.track_mut(track) {
            animation.start();
            if animation.state() == State::Running {
                let at = animation.total_current_time();
                animation.set_current_time(at);
            }
        }
    }

    /// Removes and returns the animation on `track`, freeing its slot.
    pub fn remove(&mut self, track: TrackId) -> Option<Box<dyn Animation>> {
        self.tracks.get_mut(track.0)?.take()
    }

    pub fn track(&self, track: TrackId) -> Option<&dyn Animation> {
        self.tracks.get(track.0).and_then(|slot| slot.as_deref())
    }

    pub fn track_mut(&mut self, track: TrackId) -> Option<&mut Box<dyn Animation>> {
        self.tracks.get_mut(track.0).and_then(|slot| slot.as_mut())
    }

    /// Jumps the animation on `track` to an absolute total time.
    pub fn seek(&mut self, track: TrackId, msecs: i64) {
        if let Some(animation) = self.track_mut(track) {
            animation.set_current_time(msecs);
        }
    }

    /// Advances every running track by `delta` scaled by the playback
    /// speed. Returns true while any track is still alive.
    ///
    /// Deltas are accumulated in fractional milliseconds, so driving a
    /// conductor at 60 frames per second does not quietly lose the two
    /// thirds of a millisecond each frame leaves behind.
    pub fn advance(&mut self, delta: Duration) -> bool {
        let scaled = delta.as_secs_f64() * 1000.0 * self.speed + self.carry;
        let whole = scaled.floor();
        self.carry = scaled - whole;
        let step = whole as i64;

        if step > 0 {
            for slot in &mut self.tracks {
                let Some(animation) = slot else { continue };
                if animation.state() != State::Running {
                    continue;
                }
                let target = match animation.direction() {
                    Direction::Forward => animation.total_current_time() + step,
                    Direction::Backward => animation.total_current_time() - step,
                };
                animation.set_current_time(target);
            }
        }

        self.is_animating()
    }

    /// True while any track is running or paused.
    pub fn is_animating(&self) -> bool {
        self.tracks
            .iter()
            .flatten()
            .any(|animation| animation.state() != State::Stopped)
    }

    /// Number of tracks currently running.
    pub fn active_count(&self) -> usize {
        self.tracks
            .iter()
            .flatten()
            .filter(|animation| animation.state() == State::Running)
            .count()
    }

    /// Number of occupied tracks.
    pub fn len(&self) -> usize {
        self.tracks.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stop_all(&mut self) {
        for slot in &mut self.tracks {
            if let Some(animation) = slot {
                animation.stop();
            }
        }
    }

    /// Drops every stopped track, freeing slots for reuse.
    pub fn prune(&mut self) -> usize {
        let mut pruned = 0;
        for slot in &mut self.tracks {
            if slot
                .as_ref()
                .map(|animation| animation.state() == State::Stopped)
                .unwrap_or(false)
            {
                *slot = None;
                pruned += 1;
            }
        }
        if pruned > 0 {
            debug!(pruned, "released finished tracks");
        }
        pruned
    }
}
