//! # Tempo Engine
//!
//! `tempo-engine` is a hierarchical animation timing core.
//!
//! Animations are clocks: they hold a state, a direction and a loop
//! counter, and are driven by absolute millisecond seeks from a host
//! scheduler (the [`Conductor`]). Groups are animations themselves, so
//! pauses, tweens and nested groups compose into arbitrary schedules that
//! stay deterministic under scrubbing, looping and reversal.

pub mod action;
pub mod animation;
pub mod conductor;
pub mod easing;
pub mod group;
pub mod pause;
pub mod tween;

pub use action::ActionAnimation;
pub use animation::{Animation, AnimationClock, Direction, Loops, State};
pub use conductor::{Conductor, TrackId};
pub use easing::{EasingType, SpringConfig};
pub use group::{ChildId, ParallelAnimationGroup, SequentialAnimationGroup};
pub use pause::PauseAnimation;
pub use tween::TweenAnimation;
