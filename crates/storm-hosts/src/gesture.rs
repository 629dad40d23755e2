// File: crates/storm-hosts/src/gesture.rs
// Description: Plays one-shot and held animations gated by a minimum
// replay interval, and forces a queue past a hold point (an infinite-loop
// member it can't auto-advance past) once its hold timer elapses.

use std::collections::HashMap;

use storm_math::EasingFunction;
use tracing::{debug, warn};

use crate::deferred::Deferred;
use crate::error::{CancelReason, Result};
use crate::event::AnimationEvent;
use crate::feature::AnimationFeature;
use crate::host::Feature;
use crate::state::StateOutcome;

/// Options accepted by [`GestureFeature::play_gesture`]. All fields are
/// optional - the defaults play the animation once, ungated, with the
/// layer's own default transition.
#[derive(Debug, Clone, Default)]
pub struct GestureOptions {
    /// How long to hold at a queue member that can't auto-advance (an
    /// infinite loop) before forcing the queue past it.
    pub hold_ms: Option<f32>,
    /// Minimum time since this exact (layer, animation) last played
    /// before it's allowed to play again; a call inside the window is
    /// canceled with `CancelReason::with_value("minimum_interval", ...)`
    /// rather than erroring.
    pub minimum_interval_ms: Option<f32>,
    pub transition_ms: Option<f32>,
    pub easing: Option<EasingFunction>,
    /// Bypasses the minimum-interval and already-playing gates.
    pub force: bool,
    /// Brings the layer's own weight to `1` as the gesture starts, and
    /// queues it back to `0` once the gesture stops or is interrupted -
    /// for a gesture layer that should only contribute while something is
    /// actually playing on it.
    pub auto_disable: bool,
}

#[derive(Debug, Clone)]
struct HoldConfig {
    layer_name: String,
    animation_name: String,
    hold_ms: f32,
}

#[derive(Debug)]
struct ActiveHold {
    elapsed_ms: f32,
}

/// Drives gesture playback on behalf of a host. Holds no reference to its
/// collaborator `AnimationFeature` - every call that needs one takes it
/// as an explicit `&mut AnimationFeature` parameter, matching how this
/// crate models feature-to-feature dependencies: declared by the
/// signature, not discovered through a shared registry.
#[derive(Debug)]
pub struct GestureFeature {
    type_tag: &'static str,
    clock_ms: f32,
    last_played_ms: HashMap<(String, String), f32>,
    hold_config: Option<HoldConfig>,
    active_hold: Option<ActiveHold>,
    forced_advance: Option<(String, String)>,
    /// Layers currently playing a gesture started with `auto_disable`, so
    /// the Stop/Interrupt handler knows which ones to queue back down.
    auto_disable_layers: std::collections::HashSet<String>,
    pending_disable: Vec<String>,
}

impl Default for GestureFeature {
    fn default() -> Self {
        Self::new()
    }
}

impl GestureFeature {
    pub fn new() -> Self {
        Self::with_type_tag("GestureFeature")
    }

    pub fn with_type_tag(type_tag: &'static str) -> Self {
        Self {
            type_tag,
            clock_ms: 0.0,
            last_played_ms: HashMap::new(),
            hold_config: None,
            active_hold: None,
            forced_advance: None,
            auto_disable_layers: std::collections::HashSet::new(),
            pending_disable: Vec::new(),
        }
    }

    /// Plays `animation_name` on `layer_name` of `animation`. A gated call
    /// still returns `Ok` with a deferred already settled as `Canceled` -
    /// being rate-limited, or skipped because the layer isn't ready, isn't
    /// a programming error, so none of these go through `HostError`:
    ///
    /// - layer or animation unknown on `animation` -> `"inactive"`
    /// - already the layer's current animation and `!force` -> `"playing"`
    /// - replayed inside `minimum_interval_ms` and `!force` -> `"minimum_interval"`
    pub fn play_gesture(
        &mut self,
        animation: &mut AnimationFeature,
        layer_name: &str,
        animation_name: &str,
        options: GestureOptions,
    ) -> Result<Deferred<StateOutcome>> {
        let layer_has_animation = animation.layer(layer_name).map_or(false, |l| l.has_animation(animation_name));
        if !layer_has_animation {
            warn!(layer = %layer_name, animation = %animation_name, "playGesture on an inactive layer/animation");
            let deferred = Deferred::pending();
            deferred.cancel(StateOutcome::Canceled(CancelReason::new("inactive")));
            return Ok(deferred);
        }

        if !options.force {
            let already_playing = animation.layer(layer_name).and_then(|l| l.current_animation()) == Some(animation_name);
            if already_playing {
                let deferred = Deferred::pending();
                deferred.cancel(StateOutcome::Canceled(CancelReason::new("playing")));
                return Ok(deferred);
            }
        }

        let key = (layer_name.to_string(), animation_name.to_string());
        if let (Some(min_interval), false) = (options.minimum_interval_ms, options.force) {
            if let Some(&last) = self.last_played_ms.get(&key) {
                let since = self.clock_ms - last;
                if since < min_interval {
                    warn!(layer = %layer_name, animation = %animation_name, since, min_interval, "playGesture gated by minimum interval");
                    let deferred = Deferred::pending();
                    deferred.cancel(StateOutcome::Canceled(CancelReason::with_value("minimum_interval", min_interval - since)));
                    return Ok(deferred);
                }
            }
        }

        if options.auto_disable {
            if let Some(layer) = animation.layer_mut(layer_name) {
                layer.set_user_weight(1.0);
            }
            self.auto_disable_layers.insert(layer_name.to_string());
        }

        let deferred = animation.play_animation(layer_name, animation_name, options.transition_ms, options.easing)?;
        self.last_played_ms.insert(key, self.clock_ms);
        self.hold_config = options.hold_ms.map(|hold_ms| HoldConfig {
            layer_name: layer_name.to_string(),
            animation_name: animation_name.to_string(),
            hold_ms,
        });
        self.active_hold = None;
        debug!(layer = %layer_name, animation = %animation_name, "playGesture");
        Ok(deferred)
    }

    /// Drained by `HostObject::update` after every feature has ticked;
    /// when present, the host forwards it to the collaborator
    /// `AnimationFeature` as `play_next_animation`.
    pub fn take_forced_advance(&mut self) -> Option<(String, String)> {
        self.forced_advance.take()
    }

    /// Drained by `HostObject::update`; layer names whose weight should be
    /// ramped back to `0` because an `auto_disable` gesture on them just
    /// stopped or was interrupted.
    pub fn take_pending_disable(&mut self) -> Vec<String> {
        std::mem::take(&mut self.pending_disable)
    }
}

impl Feature for GestureFeature {
    fn type_tag(&self) -> &str {
        self.type_tag
    }

    fn update(&mut self, delta_ms: f32) {
        self.clock_ms += delta_ms;
        if let (Some(cfg), Some(active)) = (&self.hold_config, &mut self.active_hold) {
            active.elapsed_ms += delta_ms;
            if active.elapsed_ms >= cfg.hold_ms {
                self.forced_advance = Some((cfg.layer_name.clone(), cfg.animation_name.clone()));
                self.active_hold = None;
            }
        }
    }

    fn on_animation_event(&mut self, event: &AnimationEvent) {
        match event {
            AnimationEvent::PlayNext { layer_name, animation_name, can_advance, is_queue_end, .. } => {
                let matches_hold = self
                    .hold_config
                    .as_ref()
                    .map_or(false, |cfg| &cfg.layer_name == layer_name && &cfg.animation_name == animation_name);
                if matches_hold && !can_advance && !is_queue_end {
                    self.active_hold = Some(ActiveHold { elapsed_ms: 0.0 });
                }
            }
            AnimationEvent::Stop { layer_name, animation_name } | AnimationEvent::Interrupt { layer_name, animation_name } => {
                let matches_hold = self
                    .hold_config
                    .as_ref()
                    .map_or(false, |cfg| &cfg.layer_name == layer_name && &cfg.animation_name == animation_name);
                if matches_hold {
                    self.hold_config = None;
                    self.active_hold = None;
                }
                if self.auto_disable_layers.remove(layer_name) {
                    self.pending_disable.push(layer_name.clone());
                }
            }
            _ => {}
        }
    }
}

/// Builds a `{name: {feature, method, args}}` map describing how to
/// trigger each of `animation_names` as a gesture, for embedding in
/// speechmark/SSML-style markup a speech service plays back alongside
/// audio.
pub fn create_gesture_map(type_tag: &str, layer_name: &str, animation_names: &[&str]) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for name in animation_names {
        map.insert(
            (*name).to_string(),
            serde_json::json!({
                "feature": type_tag,
                "method": "playGesture",
                "args": { "layer": layer_name, "animation": name },
            }),
        );
    }
    serde_json::Value::Object(map)
}

/// Same payload shape as [`create_gesture_map`], as an ordered array
/// instead of a name-keyed map - for callers that want positional gesture
/// lookup (e.g. "pick one of these N at random").
pub fn create_generic_gesture_array(type_tag: &str, layer_name: &str, animation_names: &[&str]) -> Vec<serde_json::Value> {
    animation_names
        .iter()
        .map(|name| {
            serde_json::json!({
                "feature": type_tag,
                "method": "playGesture",
                "args": { "layer": layer_name, "animation": name },
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::AnimationPlayer;
    use crate::layer::LayerBlendMode;
    use crate::state::{BlendMode, QueueState, SingleState};

    #[derive(Debug)]
    struct Noop;
    impl AnimationPlayer for Noop {
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

    fn single(name: &str) -> Box<dyn crate::state::State> {
        Box::new(SingleState::new(name, Box::new(Noop), BlendMode::Override))
    }

    #[test]
    fn second_call_within_minimum_interval_is_canceled_not_played() {
        let mut animation = AnimationFeature::new();
        let base = animation.add_layer("base", LayerBlendMode::Override);
        animation.add_animation(&base, single("wave")).unwrap();

        let mut gesture = GestureFeature::new();
        let options = GestureOptions { minimum_interval_ms: Some(1000.0), ..Default::default() };
        let first = gesture.play_gesture(&mut animation, &base, "wave", options.clone()).unwrap();
        assert!(first.is_pending());

        gesture.update(100.0);
        let second = gesture.play_gesture(&mut animation, &base, "wave", options).unwrap();
        assert!(second.is_canceled());
    }

    #[test]
    fn forcing_bypasses_the_minimum_interval_gate() {
        let mut animation = AnimationFeature::new();
        let base = animation.add_layer("base", LayerBlendMode::Override);
        animation.add_animation(&base, single("wave")).unwrap();

        let mut gesture = GestureFeature::new();
        let gated = GestureOptions { minimum_interval_ms: Some(1000.0), ..Default::default() };
        gesture.play_gesture(&mut animation, &base, "wave", gated).unwrap();

        let forced = GestureOptions { minimum_interval_ms: Some(1000.0), force: true, ..Default::default() };
        let second = gesture.play_gesture(&mut animation, &base, "wave", forced).unwrap();
        assert!(!second.is_canceled());
    }

    #[test]
    fn playing_gesture_on_an_unknown_layer_is_canceled_inactive() {
        let mut animation = AnimationFeature::new();
        let mut gesture = GestureFeature::new();
        let deferred = gesture.play_gesture(&mut animation, "face", "wave", GestureOptions::default()).unwrap();
        assert!(deferred.is_canceled());
    }

    #[test]
    fn replaying_the_already_active_animation_is_canceled_playing() {
        let mut animation = AnimationFeature::new();
        let base = animation.add_layer("base", LayerBlendMode::Override);
        animation.add_animation(&base, single("wave")).unwrap();

        let mut gesture = GestureFeature::new();
        gesture.play_gesture(&mut animation, &base, "wave", GestureOptions::default()).unwrap();
        let second = gesture.play_gesture(&mut animation, &base, "wave", GestureOptions::default()).unwrap();
        assert!(second.is_canceled());
    }

    #[test]
    fn auto_disable_ramps_layer_weight_down_once_stopped() {
        let mut animation = AnimationFeature::new();
        let base = animation.add_layer("base", LayerBlendMode::Override);
        animation.add_animation(&base, single("wave")).unwrap();
        animation.layer_mut(&base).unwrap().set_user_weight(0.0);

        let mut gesture = GestureFeature::new();
        let options = GestureOptions { auto_disable: true, ..Default::default() };
        gesture.play_gesture(&mut animation, &base, "wave", options).unwrap();
        assert_eq!(animation.layer(&base).unwrap().user_weight(), 1.0);

        animation.stop_animation(&base, "wave").unwrap();
        for event in animation.take_events() {
            gesture.on_animation_event(&event);
        }
        let disabled = gesture.take_pending_disable();
        assert_eq!(disabled, vec![base]);
    }

    #[test]
    fn hold_timer_forces_queue_past_an_infinite_member() {
        let mut animation = AnimationFeature::new();
        let base = animation.add_layer("base", LayerBlendMode::Override);
        let queue: Box<dyn crate::state::State> =
            Box::new(QueueState::new("greeting", vec![single("intro"), single("loop"), single("outro")], true));
        animation.add_animation(&base, queue).unwrap();

        let mut gesture = GestureFeature::new();
        let options = GestureOptions { hold_ms: Some(200.0), ..Default::default() };
        gesture.play_gesture(&mut animation, &base, "greeting", options).unwrap();

        // Drive the feature-level event so GestureFeature sees the
        // can_advance=false PlayNext the way HostObject would fan it out.
        animation.update(16.0);
        for event in animation.take_events() {
            gesture.on_animation_event(&event);
        }

        for _ in 0..20 {
            gesture.update(16.0);
        }
        let forced = gesture.take_forced_advance();
        assert!(forced.is_some());
    }

    #[test]
    fn speechmark_map_has_one_entry_per_animation() {
        let map = create_gesture_map("GestureFeature", "base", &["wave", "nod"]);
        assert_eq!(map.as_object().unwrap().len(), 2);
        assert_eq!(map["wave"]["method"], "playGesture");
    }
}
