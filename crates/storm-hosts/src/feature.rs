// File: crates/storm-hosts/src/feature.rs
// Description: Owns the ordered layer stack, recomputes weight budget
// top-down every tick, and is the sole producer of AnimationEvent.

use indexmap::IndexMap;
use tracing::{debug, warn};

use storm_math::EasingFunction;

use crate::deferred::Deferred;
use crate::error::{HostError, Result};
use crate::event::{AnimationEvent, AnimationEventBus};
use crate::layer::{AnimationLayer, LayerBlendMode};
use crate::messenger::Messenger;
use crate::state::{QueueState, State, StateOutcome};

/// The ordered animation layer stack for one host. The list order is the
/// stack order - index `0` is the bottom (base pose), the last entry is
/// the top, matching "top of stack = end of list" in the design.
pub struct AnimationFeature {
    type_tag: &'static str,
    layers: IndexMap<String, AnimationLayer>,
    bus: AnimationEventBus,
    pending_events: Vec<AnimationEvent>,
}

impl std::fmt::Debug for AnimationFeature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimationFeature")
            .field("type_tag", &self.type_tag)
            .field("layers", &self.layers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for AnimationFeature {
    fn default() -> Self {
        Self::new()
    }
}

impl AnimationFeature {
    pub fn new() -> Self {
        Self::with_type_tag("AnimationFeature")
    }

    /// A second (or third, ...) animation feature installed on the same
    /// host needs a distinct type tag so its events don't collide with the
    /// first on the shared bus - see the design note on prefixing events by
    /// feature class name.
    pub fn with_type_tag(type_tag: &'static str) -> Self {
        Self { type_tag, layers: IndexMap::new(), bus: Messenger::new(), pending_events: Vec::new() }
    }

    pub fn type_tag(&self) -> &'static str {
        self.type_tag
    }

    pub fn bus_mut(&mut self) -> &mut AnimationEventBus {
        &mut self.bus
    }

    /// Events emitted since the last call, for a host to fan out to
    /// dependent features without those features needing direct bus
    /// access. Draining is separate from `self.bus.emit` above - direct
    /// subscribers (tests, a speech collaborator) get callbacks
    /// synchronously at emit time regardless of whether anyone drains this.
    pub fn take_events(&mut self) -> Vec<AnimationEvent> {
        std::mem::take(&mut self.pending_events)
    }

    fn emit(&mut self, event: AnimationEvent) {
        let topic = AnimationEvent::topic(self.type_tag, event.kind());
        self.bus.emit(&topic, &event);
        self.pending_events.push(event);
    }

    fn unique_layer_name(&self, base: &str) -> String {
        if !self.layers.contains_key(base) {
            return base.to_string();
        }
        let mut suffix = 2;
        loop {
            let candidate = format!("{base}_{suffix}");
            if !self.layers.contains_key(&candidate) {
                return candidate;
            }
            suffix += 1;
        }
    }

    pub fn layer_names(&self) -> Vec<String> {
        self.layers.keys().cloned().collect()
    }

    pub fn layer(&self, name: &str) -> Option<&AnimationLayer> {
        self.layers.get(name)
    }

    pub fn layer_mut(&mut self, name: &str) -> Option<&mut AnimationLayer> {
        self.layers.get_mut(name)
    }

    pub fn has_layer(&self, name: &str) -> bool {
        self.layers.contains_key(name)
    }

    /// Appends a new layer at the top of the stack. Name collisions are
    /// resolved silently by suffix increment, never an error.
    pub fn add_layer(&mut self, name: impl Into<String>, blend_mode: LayerBlendMode) -> String {
        let name = self.unique_layer_name(&name.into());
        let index = self.layers.len();
        self.layers.insert(name.clone(), AnimationLayer::new(name.clone(), blend_mode));
        debug!(layer = %name, index, "addLayer");
        self.emit(AnimationEvent::AddLayer { name: name.clone(), index });
        name
    }

    pub fn remove_layer(&mut self, name: &str) -> Result<AnimationLayer> {
        let index = self
            .layers
            .get_index_of(name)
            .ok_or_else(|| HostError::not_found(format!("layer '{name}'")))?;
        let (_, mut layer) = self.layers.shift_remove_entry(name).expect("checked above");
        for animation_name in layer.animation_names() {
            if let Some(state) = layer.get_state_mut(&animation_name) {
                state.discard();
            }
        }
        debug!(layer = %name, "removeLayer");
        self.emit(AnimationEvent::RemoveLayer { name: name.to_string(), index });
        Ok(layer)
    }

    /// Renames a layer in place, preserving its position in the stack -
    /// `IndexMap` has no in-place key rename, so this rebuilds the map
    /// entry-by-entry rather than remove+reinsert (which would move the
    /// renamed layer to the top).
    pub fn rename_layer(&mut self, old_name: &str, new_name: &str) -> Result<()> {
        if !self.layers.contains_key(old_name) {
            return Err(HostError::not_found(format!("layer '{old_name}'")));
        }
        if old_name != new_name && self.layers.contains_key(new_name) {
            return Err(HostError::argument(format!("layer '{new_name}' already exists")));
        }
        let mut rebuilt = IndexMap::with_capacity(self.layers.len());
        for (key, mut layer) in std::mem::take(&mut self.layers) {
            if key == old_name {
                layer.set_name(new_name);
                rebuilt.insert(new_name.to_string(), layer);
            } else {
                rebuilt.insert(key, layer);
            }
        }
        self.layers = rebuilt;
        debug!(old_name, new_name, "renameLayer");
        self.emit(AnimationEvent::RenameLayer { old_name: old_name.to_string(), new_name: new_name.to_string() });
        Ok(())
    }

    /// Adds a pre-built state to `layer_name`. The state's concrete kind
    /// (single/transition/free-blend/blend1d/blend2d/queue/random) is
    /// whatever constructor the caller used before handing it over here -
    /// clip/mesh lookup to build that state is a character-assembly
    /// collaborator's job, out of this crate's scope. Name collisions on
    /// the layer are resolved silently by suffix increment.
    pub fn add_animation(&mut self, layer_name: &str, mut state: Box<dyn State>) -> Result<String> {
        let layer = self
            .layers
            .get_mut(layer_name)
            .ok_or_else(|| HostError::not_found(format!("layer '{layer_name}'")))?;
        let mut name = state.name().to_string();
        if layer.has_animation(&name) {
            let mut suffix = 2;
            loop {
                let candidate = format!("{name}_{suffix}");
                if !layer.has_animation(&candidate) {
                    name = candidate;
                    break;
                }
                suffix += 1;
            }
            state.set_name(name.clone());
        }
        layer.add_animation(state).expect("uniqueness already resolved above");
        debug!(layer = %layer_name, animation = %name, "addAnimation");
        self.emit(AnimationEvent::AddAnimation { layer_name: layer_name.to_string(), animation_name: name.clone() });
        Ok(name)
    }

    pub fn remove_animation(&mut self, layer_name: &str, animation_name: &str) -> Result<Box<dyn State>> {
        let layer = self
            .layers
            .get_mut(layer_name)
            .ok_or_else(|| HostError::not_found(format!("layer '{layer_name}'")))?;
        let state = layer.remove_animation(animation_name)?;
        self.emit(AnimationEvent::RemoveAnimation {
            layer_name: layer_name.to_string(),
            animation_name: animation_name.to_string(),
        });
        Ok(state)
    }

    pub fn rename_animation(&mut self, layer_name: &str, old_name: &str, new_name: &str) -> Result<()> {
        let layer = self
            .layers
            .get_mut(layer_name)
            .ok_or_else(|| HostError::not_found(format!("layer '{layer_name}'")))?;
        layer.rename_animation(old_name, new_name)?;
        self.emit(AnimationEvent::RenameAnimation {
            layer_name: layer_name.to_string(),
            old_name: old_name.to_string(),
            new_name: new_name.to_string(),
        });
        Ok(())
    }

    pub fn play_animation(
        &mut self,
        layer_name: &str,
        animation_name: &str,
        transition_ms: Option<f32>,
        easing: Option<EasingFunction>,
    ) -> Result<Deferred<StateOutcome>> {
        let layer = self
            .layers
            .get_mut(layer_name)
            .ok_or_else(|| HostError::not_found(format!("layer '{layer_name}'")))?;
        let deferred = layer.play_animation(animation_name, transition_ms, easing)?;
        self.emit(AnimationEvent::Play {
            layer_name: layer_name.to_string(),
            animation_name: animation_name.to_string(),
        });
        Ok(deferred)
    }

    /// Forces a `QueueState` past a member it cannot auto-advance past on
    /// its own (an infinite loop, or one held open by a gesture's hold
    /// timer). Fails with `ArgumentKind` if the named animation isn't a
    /// queue.
    pub fn play_next_animation(&mut self, layer_name: &str, animation_name: &str) -> Result<()> {
        let layer = self
            .layers
            .get_mut(layer_name)
            .ok_or_else(|| HostError::not_found(format!("layer '{layer_name}'")))?;
        let state = layer
            .get_state_mut(animation_name)
            .ok_or_else(|| HostError::not_found(format!("animation '{animation_name}' on layer '{layer_name}'")))?;
        let queue = state
            .as_any_mut()
            .downcast_mut::<QueueState>()
            .ok_or_else(|| HostError::argument(format!("'{animation_name}' on layer '{layer_name}' is not a queue")))?;
        queue.force_advance();
        if let Some(advance) = queue.take_advance() {
            self.emit(AnimationEvent::PlayNext {
                layer_name: layer_name.to_string(),
                animation_name: animation_name.to_string(),
                next_queued_animation: queue.current_name().map(|s| s.to_string()),
                can_advance: advance.can_advance,
                is_queue_end: advance.is_queue_end,
            });
        }
        Ok(())
    }

    pub fn pause_animation(
        &mut self,
        layer_name: &str,
        animation_name: &str,
        transition_ms: Option<f32>,
        easing: Option<EasingFunction>,
    ) -> Result<Deferred<StateOutcome>> {
        let layer = self
            .layers
            .get_mut(layer_name)
            .ok_or_else(|| HostError::not_found(format!("layer '{layer_name}'")))?;
        let deferred = layer.pause_animation(animation_name, transition_ms, easing)?;
        self.emit(AnimationEvent::Pause {
            layer_name: layer_name.to_string(),
            animation_name: animation_name.to_string(),
        });
        Ok(deferred)
    }

    pub fn resume_animation(
        &mut self,
        layer_name: &str,
        animation_name: &str,
        transition_ms: Option<f32>,
        easing: Option<EasingFunction>,
    ) -> Result<Deferred<StateOutcome>> {
        let layer = self
            .layers
            .get_mut(layer_name)
            .ok_or_else(|| HostError::not_found(format!("layer '{layer_name}'")))?;
        let deferred = layer.resume_animation(animation_name, transition_ms, easing)?;
        self.emit(AnimationEvent::Resume {
            layer_name: layer_name.to_string(),
            animation_name: animation_name.to_string(),
        });
        Ok(deferred)
    }

    pub fn stop_animation(&mut self, layer_name: &str, animation_name: &str) -> Result<()> {
        let layer = self
            .layers
            .get_mut(layer_name)
            .ok_or_else(|| HostError::not_found(format!("layer '{layer_name}'")))?;
        layer.stop_animation(animation_name)?;
        self.emit(AnimationEvent::Stop {
            layer_name: layer_name.to_string(),
            animation_name: animation_name.to_string(),
        });
        Ok(())
    }

    /// Pre-empts whatever is currently playing on `layer_name`, rather than
    /// letting it run to its own finish.
    pub fn interrupt_animation(&mut self, layer_name: &str) -> Result<()> {
        let layer = self
            .layers
            .get_mut(layer_name)
            .ok_or_else(|| HostError::not_found(format!("layer '{layer_name}'")))?;
        let animation_name = layer.current_animation().unwrap_or_default().to_string();
        if animation_name.is_empty() {
            return Ok(());
        }
        layer.interrupt_current(crate::error::CancelReason::new("interrupted"));
        warn!(layer = %layer_name, animation = %animation_name, "interruptAnimation");
        self.emit(AnimationEvent::Interrupt { layer_name: layer_name.to_string(), animation_name });
        Ok(())
    }

    /// Recomputes every layer's internal weight top-down: starts with a
    /// full budget at the top of the stack and works down, each Override
    /// layer handing the layers below whatever its current state didn't
    /// consume.
    fn recompute_internal_weights(&mut self) {
        let mut remaining_budget = 1.0;
        for layer in self.layers.values_mut().rev() {
            remaining_budget = layer.update_internal_weight(remaining_budget);
        }
    }

    /// Advances every layer by `delta_ms`. Internal weights are fully
    /// recomputed before any layer's state advances, so no layer ever sees
    /// a stale budget mid-tick.
    pub fn update(&mut self, delta_ms: f32) {
        self.recompute_internal_weights();

        let mut queue_advances: Vec<(String, String, crate::state::QueueAdvance)> = Vec::new();
        for (layer_name, layer) in self.layers.iter_mut() {
            layer.update(delta_ms);
            if let Some(current_name) = layer.current_animation().map(|s| s.to_string()) {
                if let Some(state) = layer.get_state_mut(&current_name) {
                    if let Some(queue) = state.as_any_mut().downcast_mut::<QueueState>() {
                        if let Some(advance) = queue.take_advance() {
                            queue_advances.push((layer_name.clone(), current_name.clone(), advance));
                        }
                    }
                }
            }
        }

        for (layer_name, animation_name, advance) in queue_advances {
            let next_queued_animation = self
                .layers
                .get_mut(&layer_name)
                .and_then(|l| l.get_state_mut(&animation_name))
                .and_then(|s| s.as_any_mut().downcast_mut::<QueueState>())
                .and_then(|q| q.current_name().map(|s| s.to_string()));
            self.emit(AnimationEvent::PlayNext {
                layer_name,
                animation_name,
                next_queued_animation,
                can_advance: advance.can_advance,
                is_queue_end: advance.is_queue_end,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::AnimationPlayer;
    use crate::state::{BlendMode, SingleState};

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

    fn single(name: &str) -> Box<dyn State> {
        Box::new(SingleState::new(name, Box::new(Noop), BlendMode::Override))
    }

    /// S1: three stacked Override layers, each with weight 1 and a
    /// fully-weighted current state. Only the top layer's state should
    /// keep any budget; everything below sees zero.
    #[test]
    fn s1_three_override_layers_only_top_keeps_budget() {
        let mut feature = AnimationFeature::new();
        let a = feature.add_layer("a", LayerBlendMode::Override);
        let b = feature.add_layer("b", LayerBlendMode::Override);
        let c = feature.add_layer("c", LayerBlendMode::Override);
        for (layer, name) in [(&a, "a_pose"), (&b, "b_pose"), (&c, "c_pose")] {
            feature.add_animation(layer, single(name)).unwrap();
            feature.play_animation(layer, name, Some(0.0), None).unwrap();
        }
        feature.update(16.0);
        assert!((feature.layer("c").unwrap().internal_weight() - 1.0).abs() < 1e-4);
        assert!(feature.layer("b").unwrap().internal_weight().abs() < 1e-4);
        assert!(feature.layer("a").unwrap().internal_weight().abs() < 1e-4);
    }

    #[test]
    fn s1_half_weighted_top_state_leaves_half_for_the_next_layer_down() {
        let mut feature = AnimationFeature::new();
        let a = feature.add_layer("a", LayerBlendMode::Override);
        let b = feature.add_layer("b", LayerBlendMode::Override);
        feature.add_animation(&a, single("a_pose")).unwrap();
        feature.add_animation(&b, single("b_pose")).unwrap();
        feature.play_animation(&a, "a_pose", Some(0.0), None).unwrap();
        feature.play_animation(&b, "b_pose", Some(100.0), None).unwrap();
        feature.update(50.0); // b_pose weight ~= 0.5 mid fade-in
        assert!((feature.layer("a").unwrap().internal_weight() - 0.5).abs() < 1e-2);
    }

    #[test]
    fn duplicate_layer_names_are_renamed_silently() {
        let mut feature = AnimationFeature::new();
        let first = feature.add_layer("face", LayerBlendMode::Override);
        let second = feature.add_layer("face", LayerBlendMode::Override);
        assert_eq!(first, "face");
        assert_eq!(second, "face_2");
    }

    #[test]
    fn rename_layer_preserves_stack_position() {
        let mut feature = AnimationFeature::new();
        feature.add_layer("base", LayerBlendMode::Override);
        feature.add_layer("face", LayerBlendMode::Override);
        feature.add_layer("gesture", LayerBlendMode::Additive);
        feature.rename_layer("face", "expression").unwrap();
        assert_eq!(feature.layer_names(), vec!["base", "expression", "gesture"]);
    }

    #[test]
    fn play_animation_on_missing_layer_is_not_found() {
        let mut feature = AnimationFeature::new();
        let err = feature.play_animation("nope", "idle", None, None).unwrap_err();
        assert!(matches!(err, HostError::NotFound(_)));
    }

    #[test]
    fn queue_advance_emits_play_next_event_during_update() {
        use crate::state::QueueState;
        let mut feature = AnimationFeature::new();
        let base = feature.add_layer("base", LayerBlendMode::Override);
        let queue: Box<dyn State> = Box::new(QueueState::new(
            "greeting",
            vec![single_finished("a"), single_finished("b")],
            true,
        ));
        feature.add_animation(&base, queue).unwrap();
        feature.play_animation(&base, "greeting", Some(0.0), None).unwrap();

        let mut saw_next = false;
        for _ in 0..5 {
            feature.update(16.0);
            if feature.take_events().iter().any(|e| matches!(e, AnimationEvent::PlayNext { .. })) {
                saw_next = true;
            }
        }
        assert!(saw_next);
    }

    fn single_finished(name: &str) -> Box<dyn State> {
        #[derive(Debug, Default)]
        struct FinishesOnce {
            t: f32,
            done: bool,
        }
        impl AnimationPlayer for FinishesOnce {
            fn normalized_time(&self) -> f32 {
                self.t
            }
            fn set_normalized_time(&mut self, t: f32) {
                self.t = t;
            }
            fn time_scale(&self) -> f32 {
                1.0
            }
            fn set_time_scale(&mut self, _s: f32) {}
            fn loop_count(&self) -> Option<u32> {
                Some(0)
            }
            fn set_weight(&mut self, _w: f32) {}
            fn advance(&mut self, _delta_ms: f32) -> bool {
                if self.done {
                    return false;
                }
                self.t = 1.0;
                self.done = true;
                true
            }
        }
        Box::new(SingleState::new(name, Box::new(FinishesOnce::default()), BlendMode::Override))
    }
}
