// File: crates/storm-hosts/tests/scenarios.rs
// Description: End-to-end scenario and property tests that exercise real
// HostObject/AnimationFeature wiring rather than a single module in
// isolation - each module's own #[cfg(test)] suite already covers its
// unit-level behavior.

use proptest::prelude::*;

use storm_hosts::host::{HostFeature, HostObject};
use storm_hosts::layer::LayerBlendMode;
use storm_hosts::state::{BlendMode, SingleState, State};
use storm_hosts::{AnimationFeature, PointOfInterestFeature};
use storm_math::{EasingFunction, Vec3};

#[derive(Debug, Default)]
struct Noop;
impl storm_hosts::engine::AnimationPlayer for Noop {
    fn normalized_time(&self) -> f32 {
        0.0
    }
    fn set_normalized_time(&mut self, _t: f32) {}
    fn time_scale(&self) -> f32 {
        1.0
    }
    fn set_time_scale(&mut self, _s: f32) {}
    fn loop_count(&self) -> Option<u32> {
        None
    }
    fn set_weight(&mut self, _w: f32) {}
    fn advance(&mut self, _d: f32) -> bool {
        false
    }
}

fn single(name: &str) -> Box<dyn State> {
    Box::new(SingleState::new(name, Box::new(Noop), BlendMode::Override))
}

/// S2, wired through a real `AnimationFeature` rather than a bare layer:
/// ten ticks of a 1s linear crossfade from `X` to `Y` pass through
/// `feature.update`, landing at the weights the scenario specifies at
/// ticks 5 and 10.
#[test]
fn s2_transition_smoothness_through_a_real_animation_feature() {
    let mut feature = AnimationFeature::new();
    let face = feature.add_layer("face", LayerBlendMode::Override);
    feature.add_animation(&face, single("x")).unwrap();
    feature.add_animation(&face, single("y")).unwrap();

    feature.play_animation(&face, "x", Some(0.0), None).unwrap();
    feature.update(16.0);
    assert!((feature.layer("face").unwrap().get_state_mut("x").unwrap().weight() - 1.0).abs() < 1e-3);

    feature.play_animation(&face, "y", Some(1000.0), Some(EasingFunction::Linear)).unwrap();

    for tick in 1..=10 {
        feature.update(100.0);
        let layer = feature.layer_mut("face").unwrap();
        let x_weight = layer.get_state_mut("x").unwrap().weight();
        let y_weight = layer.get_state_mut("y").unwrap().weight();
        if tick == 5 {
            assert!((x_weight - 0.5).abs() < 1e-2, "x={x_weight} at tick 5");
            assert!((y_weight - 0.5).abs() < 1e-2, "y={y_weight} at tick 5");
        }
        if tick == 10 {
            assert!(x_weight.abs() < 1e-2, "x={x_weight} at tick 10");
            assert!((y_weight - 1.0).abs() < 1e-2, "y={y_weight} at tick 10");
        }
    }
}

/// S6, wired through the full `HostObject::update` dispatch path: a
/// `PointOfInterestFeature` raises a blink trigger on a large angle jump,
/// and the host's own `apply_point_of_interest_outputs` pass (not the
/// test) is what actually plays the blink animation on the animation
/// feature's layer.
#[test]
fn s6_host_update_plays_the_blink_animation_when_the_gaze_jumps() {
    let mut host = HostObject::new();

    let mut animation = AnimationFeature::new();
    animation.add_layer("Blink", LayerBlendMode::Override);
    animation.add_animation("Blink", single("blink")).unwrap();
    host.add_feature("animation", HostFeature::Animation(animation)).unwrap();

    let mut poi = PointOfInterestFeature::new();
    poi.add_look("Look", false, false);
    poi.add_blink_layer("Blink", "blink");
    poi.set_target(Some(Vec3::new(0.01, 0.0, 1.0)));
    host.add_feature("gaze", HostFeature::PointOfInterest(poi)).unwrap();

    host.update(16.0);

    {
        let gaze = host.feature_mut("gaze").unwrap().as_point_of_interest_mut().unwrap();
        gaze.set_target(Some(Vec3::new(5.0, 0.0, 0.01)));
    }
    host.update(16.0);

    // The trigger fires during this tick's point-of-interest pass and is
    // applied to the animation feature in the same `update` call, but a
    // freshly `play()`-ed state's weight tween only advances on its own
    // next `update` - one more tick is what actually steps it off zero.
    host.update(16.0);

    let blink_weight = host
        .feature_mut("animation")
        .unwrap()
        .as_animation_mut()
        .unwrap()
        .layer_mut("Blink")
        .unwrap()
        .get_state_mut("blink")
        .unwrap()
        .weight();
    assert!(blink_weight > 0.0, "blink weight={blink_weight}");
}

proptest! {
    /// Invariant 1: for a 3-layer Override stack each given an arbitrary
    /// user weight, the budget consumed above any layer never exceeds
    /// `1 - that layer's own internal_weight` - the top-down pass never
    /// hands lower layers more budget than is actually left.
    #[test]
    fn override_stack_never_overcommits_its_weight_budget(
        top_weight in 0.0f32..=1.0,
        mid_weight in 0.0f32..=1.0,
        bottom_weight in 0.0f32..=1.0,
    ) {
        let mut feature = AnimationFeature::new();
        let bottom = feature.add_layer("bottom", LayerBlendMode::Override);
        let mid = feature.add_layer("mid", LayerBlendMode::Override);
        let top = feature.add_layer("top", LayerBlendMode::Override);

        feature.add_animation(&bottom, single("bottom_pose")).unwrap();
        feature.add_animation(&mid, single("mid_pose")).unwrap();
        feature.add_animation(&top, single("top_pose")).unwrap();

        feature.play_animation(&bottom, "bottom_pose", Some(0.0), None).unwrap();
        feature.play_animation(&mid, "mid_pose", Some(0.0), None).unwrap();
        feature.play_animation(&top, "top_pose", Some(0.0), None).unwrap();

        feature.layer_mut("top").unwrap().set_user_weight(top_weight);
        feature.layer_mut("mid").unwrap().set_user_weight(mid_weight);
        feature.layer_mut("bottom").unwrap().set_user_weight(bottom_weight);

        feature.update(0.0);

        let top_internal = feature.layer("top").unwrap().internal_weight();
        let mid_internal = feature.layer("mid").unwrap().internal_weight();
        let bottom_internal = feature.layer("bottom").unwrap().internal_weight();

        prop_assert!(top_internal <= 1.0 + 1e-4);
        prop_assert!(mid_internal <= (1.0 - top_internal) + 1e-3);
        prop_assert!(bottom_internal <= (1.0 - top_internal - mid_internal) + 1e-3);
    }
}
