use keyframe::EasingFunction;
use serde::{Deserialize, Serialize};

/// Easing curves available to tweens, named after the [`keyframe`]
/// functions they delegate to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EasingType {
    #[default]
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
    EaseInCubic,
    EaseOutCubic,
    EaseInOutCubic,
    /// Holds the previous value until the keyframe is reached.
    Hold,
}

impl EasingFunction for EasingType {
    fn y(&self, x: f64) -> f64 {
        use keyframe::functions;
        match self {
            EasingType::Linear => functions::Linear.y(x),
            EasingType::EaseIn => functions::EaseIn.y(x),
            EasingType::EaseOut => functions::EaseOut.y(x),
            EasingType::EaseInOut => functions::EaseInOut.y(x),
            EasingType::EaseInCubic => functions::EaseInCubic.y(x),
            EasingType::EaseOutCubic => functions::EaseOutCubic.y(x),
            EasingType::EaseInOutCubic => functions::EaseInOutCubic.y(x),
            EasingType::Hold => functions::Hold.y(x),
        }
    }
}

impl EasingType {
    /// Evaluates the curve at `x` in `[0, 1]`.
    pub fn eval(&self, x: f32) -> f32 {
        self.y(f64::from(x)) as f32
    }
}

/// Parameters of a damped spring, baked into keyframes by
/// [`TweenAnimation::spring_to`](crate::TweenAnimation::spring_to).
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SpringConfig {
    /// Pull towards the target.
    pub stiffness: f32,
    /// Oscillation decay.
    pub damping: f32,
    /// Inertia of the moving value.
    pub mass: f32,
    /// Starting velocity in units per second.
    pub velocity: f32,
}

impl Default for SpringConfig {
    fn default() -> Self {
        // visibly bouncy without overstaying
        SpringConfig {
            stiffness: 120.0,
            damping: 12.0,
            mass: 1.0,
            velocity: 0.0,
        }
    }
}

/// Bake resolution for spring simulation, in samples per second.
const SPRING_SAMPLE_RATE: f32 = 60.0;

/// Springs that have not settled by this point are cut off.
const SPRING_MAX_SECONDS: f64 = 10.0;

/// Integrates a damped spring from `start` to `end`, returning sampled
/// `(value, seconds)` pairs ending exactly on the target.
pub(crate) fn bake_spring(start: f32, end: f32, config: SpringConfig) -> Vec<(f32, f64)> {
    let dt = 1.0 / SPRING_SAMPLE_RATE;
    let mass = config.mass.max(f32::EPSILON);

    let mut samples = Vec::new();
    let mut value = start;
    let mut velocity = config.velocity;
    let mut t = 0.0_f64;

    while t < SPRING_MAX_SECONDS {
        let acceleration =
            (-config.stiffness * (value - end) - config.damping * velocity) / mass;
        velocity += acceleration * dt;
        value += velocity * dt;
        t += f64::from(dt);
        samples.push((value, t));

        let settled = (value - end).abs() < 1e-3 && velocity.abs() < 1e-3;
        if settled {
            break;
        }
    }

    // Land on the target no matter where the integration stopped.
    t += f64::from(dt);
    samples.push((end, t));
    samples
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_is_identity() {
        assert!((EasingType::Linear.eval(0.25) - 0.25).abs() < 1e-6);
    }

    #[test]
    fn curves_share_their_endpoints() {
        for easing in [
            EasingType::Linear,
            EasingType::EaseIn,
            EasingType::EaseOut,
            EasingType::EaseInOut,
            EasingType::EaseInCubic,
            EasingType::EaseOutCubic,
            EasingType::EaseInOutCubic,
        ] {
            assert!(easing.eval(0.0).abs() < 1e-4, "{easing:?} must start at 0");
            assert!((easing.eval(1.0) - 1.0).abs() < 1e-4, "{easing:?} must end at 1");
        }
    }

    #[test]
    fn springs_settle_on_the_target() {
        let samples = bake_spring(0.0, 100.0, SpringConfig::default());
        let (last_value, last_t) = samples[samples.len() - 1];
        assert_eq!(last_value, 100.0, "the final sample lands exactly on target");
        assert!(last_t < SPRING_MAX_SECONDS + 1.0);
        assert!(samples.len() > 10, "a default spring takes multiple frames");
    }

    #[test]
    fn overdamped_springs_do_not_overshoot() {
        let config = SpringConfig {
            stiffness: 80.0,
            damping: 40.0,
            mass: 1.0,
            velocity: 0.0,
        };
        let overshoot = bake_spring(0.0, 1.0, config)
            .iter()
            .any(|(value, _)| *value > 1.001);
        assert!(!overshoot);
    }

    #[test]
    fn easing_names_serialize_snake_case() {
        let json = serde_json::to_string(&EasingType::EaseInOutCubic).unwrap();
        assert_eq!(json, "\"ease_in_out_cubic\"");
    }
}
