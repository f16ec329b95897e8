//! End to end: parse a document, build it, drive it with a conductor.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tempo_engine::{
    Animation, Conductor, ParallelAnimationGroup, SequentialAnimationGroup, State, TweenAnimation,
};
use tempo_schema::{ActionRegistry, Schedule};

const SHOW: &str = r#"{
    "version": 1,
    "root": {
        "type": "sequential",
        "children": [
            {
                "type": "parallel",
                "children": [
                    {
                        "type": "tween",
                        "target": "x",
                        "from": 0.0,
                        "keyframes": [
                            { "to": 320.0, "duration_ms": 400, "easing": "ease_out_cubic" }
                        ]
                    },
                    { "type": "pause", "duration_ms": 500 }
                ]
            },
            { "type": "action", "name": "halfway" },
            { "type": "pause", "duration_ms": 100, "loops": 3 }
        ]
    }
}"#;

#[test]
fn a_document_plays_to_completion_under_the_conductor() {
    static HALFWAY: AtomicUsize = AtomicUsize::new(0);

    let schedule = Schedule::from_json(SHOW).unwrap();
    let mut registry = ActionRegistry::new();
    registry.register("halfway", || {
        HALFWAY.fetch_add(1, Ordering::SeqCst);
    });

    let animation = schedule.build(&registry).unwrap();
    assert_eq!(animation.total_duration(), Some(800), "500 + 0 + 3x100");

    let mut conductor = Conductor::new();
    let track = conductor.play(animation);

    let mut frames = 0;
    while conductor.advance(Duration::from_millis(16)) {
        frames += 1;
        assert!(frames < 1_000, "schedule must finish on its own");
    }

    assert_eq!(HALFWAY.load(Ordering::SeqCst), 1, "the action fires exactly once");
    let animation = conductor.track(track).unwrap();
    assert_eq!(animation.state(), State::Stopped);
    assert_eq!(animation.total_current_time(), 800);
}

#[test]
fn tween_values_land_on_their_targets() {
    let schedule = Schedule::from_json(SHOW).unwrap();
    let mut registry = ActionRegistry::new();
    registry.register("halfway", || {});
    let mut animation = schedule.build(&registry).unwrap();

    animation.start();
    animation.set_current_time(800);
    assert_eq!(animation.state(), State::Stopped);

    let root = animation
        .as_any()
        .downcast_ref::<SequentialAnimationGroup>()
        .unwrap();
    let stage = root
        .child(0)
        .unwrap()
        .as_any()
        .downcast_ref::<ParallelAnimationGroup>()
        .unwrap();
    let tween = stage
        .child(0)
        .unwrap()
        .as_any()
        .downcast_ref::<TweenAnimation<f32>>()
        .unwrap();

    assert!(
        (tween.value() - 320.0).abs() < 1e-3,
        "the tween rests on its final keyframe, got {}",
        tween.value()
    );
}
