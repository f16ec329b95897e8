//! Declarative schedule documents.
//!
//! A schedule is a JSON tree of pauses, tweens, actions and groups that
//! builds into a runnable animation. Documents refer to host callbacks by
//! name; the host supplies them through an [`ActionRegistry`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use tempo_engine::easing::{EasingType, SpringConfig};
use tempo_engine::{
    ActionAnimation, Animation, Direction, Loops, ParallelAnimationGroup, PauseAnimation,
    SequentialAnimationGroup, TweenAnimation,
};

/// Errors raised while parsing or building a schedule.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("schedule is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("loop count {0} must be -1 or a non-negative count")]
    LoopCount(i64),
    #[error("pause duration {0}ms is negative")]
    NegativePause(i64),
    #[error("keyframe segment {0}ms is negative")]
    NegativeSegment(i64),
    #[error("tween for {0:?} has no keyframes")]
    EmptyTween(String),
    #[error("no action registered as {0:?}")]
    UnknownAction(String),
}

/// Callbacks a schedule may reference by name.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    actions: HashMap<String, Arc<dyn Fn() + Send + Sync>>,
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("actions", &self.actions.keys())
            .finish()
    }
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `action` under `name`, replacing any previous entry.
    pub fn register(&mut self, name: impl Into<String>, action: impl Fn() + Send + Sync + 'static) {
        self.actions.insert(name.into(), Arc::new(action));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    fn get(&self, name: &str) -> Option<Arc<dyn Fn() + Send + Sync>> {
        self.actions.get(name).cloned()
    }
}

/// A complete schedule document.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Schedule {
    /// Document format version.
    #[serde(default = "default_version")]
    pub version: u32,
    pub root: ScheduleNode,
}

fn default_version() -> u32 {
    1
}

impl Schedule {
    pub fn from_json(json: &str) -> Result<Self, ScheduleError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Builds the runnable animation tree this document describes.
    pub fn build(&self, registry: &ActionRegistry) -> Result<Box<dyn Animation>, ScheduleError> {
        build_node(&self.root, registry)
    }
}

/// One node of a schedule tree.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ScheduleNode {
    /// How often the node repeats; -1 repeats forever.
    #[serde(default = "default_loops")]
    pub loops: i64,
    /// Direction the node plays in when started.
    #[serde(default)]
    pub direction: Direction,
    #[serde(flatten)]
    pub kind: NodeKind,
}

fn default_loops() -> i64 {
    1
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    /// Holds the schedule still for a fixed time.
    Pause {
        #[serde(default = "default_pause_ms")]
        duration_ms: i64,
    },
    /// Interpolates a named value through a chain of keyframes.
    Tween {
        /// Host side name of the value being animated.
        target: String,
        /// Value before the first keyframe.
        #[serde(default)]
        from: f32,
        keyframes: Vec<KeyframeSpec>,
    },
    /// A named value pulled to a target by a damped spring.
    Spring {
        target: String,
        #[serde(default)]
        from: f32,
        to: f32,
        #[serde(default)]
        spring: SpringConfig,
    },
    /// Fires a host callback once.
    Action { name: String },
    /// Plays its children at the same time.
    Parallel {
        #[serde(default)]
        children: Vec<ScheduleNode>,
    },
    /// Plays its children one after another.
    Sequential {
        #[serde(default)]
        children: Vec<ScheduleNode>,
    },
}

fn default_pause_ms() -> i64 {
    PauseAnimation::DEFAULT_DURATION
}

/// One segment of a tween.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct KeyframeSpec {
    /// Value reached at the end of the segment.
    pub to: f32,
    /// Segment length in milliseconds.
    pub duration_ms: i64,
    #[serde(default)]
    pub easing: EasingType,
}

fn build_node(
    node: &ScheduleNode,
    registry: &ActionRegistry,
) -> Result<Box<dyn Animation>, ScheduleError> {
    let mut animation: Box<dyn Animation> = match &node.kind {
        NodeKind::Pause { duration_ms } => {
            if *duration_ms < 0 {
                return Err(ScheduleError::NegativePause(*duration_ms));
            }
            Box::new(PauseAnimation::new(*duration_ms))
        }
        NodeKind::Tween {
            target,
            from,
            keyframes,
        } => {
            if keyframes.is_empty() {
                return Err(ScheduleError::EmptyTween(target.clone()));
            }
            let mut tween = TweenAnimation::new(*from);
            for frame in keyframes {
                if frame.duration_ms < 0 {
                    return Err(ScheduleError::NegativeSegment(frame.duration_ms));
                }
                tween.keyframe_to(frame.to, frame.duration_ms, frame.easing);
            }
            Box::new(tween)
        }
        NodeKind::Spring {
            target: _,
            from,
            to,
            spring,
        } => {
            let mut tween = TweenAnimation::new(*from);
            tween.spring_to(*to, *spring);
            Box::new(tween)
        }
        NodeKind::Action { name } => {
            let action = registry
                .get(name)
                .ok_or_else(|| ScheduleError::UnknownAction(name.clone()))?;
            Box::new(ActionAnimation::new(move || action()))
        }
        NodeKind::Parallel { children } => {
            let mut group = ParallelAnimationGroup::new();
            for child in children {
                group.push(build_node(child, registry)?);
            }
            Box::new(group)
        }
        NodeKind::Sequential { children } => {
            let mut group = SequentialAnimationGroup::new();
            for child in children {
                group.push(build_node(child, registry)?);
            }
            Box::new(group)
        }
    };

    animation.set_loops(loops_from(node.loops)?);
    if node.direction != Direction::default() {
        animation.set_direction(node.direction);
    }
    Ok(animation)
}

fn loops_from(raw: i64) -> Result<Loops, ScheduleError> {
    match raw {
        -1 => Ok(Loops::Infinite),
        n if (0..=i64::from(u32::MAX)).contains(&n) => Ok(Loops::Times(n as u32)),
        n => Err(ScheduleError::LoopCount(n)),
    }
}
