// File: crates/storm-hosts/src/layer.rs
// Description: A named, ordered set of states of which at most one plays
// at a time, crossfading between them on `play_animation`.

use indexmap::IndexMap;
use storm_math::EasingFunction;
use tracing::{debug, trace};

use crate::deferred::Deferred;
use crate::error::{CancelReason, HostError, Result};
use crate::state::{State, StateOutcome};

/// How a layer's output composites onto the layers beneath it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerBlendMode {
    /// Consumes its configured share of the remaining weight budget,
    /// leaving the rest for lower layers (e.g. a base locomotion layer).
    Override,
    /// Adds on top of whatever the layers below already produced (e.g. a
    /// additive gesture layer), without reducing their budget.
    Additive,
}

/// A single named layer of an [`crate::feature::AnimationFeature`] stack.
#[derive(Debug)]
pub struct AnimationLayer {
    name: String,
    states: IndexMap<String, Box<dyn State>>,
    current_name: Option<String>,
    user_weight: f32,
    internal_weight: f32,
    blend_mode: LayerBlendMode,
    default_transition_ms: f32,
    default_easing: EasingFunction,
}

impl AnimationLayer {
    pub fn new(name: impl Into<String>, blend_mode: LayerBlendMode) -> Self {
        Self {
            name: name.into(),
            states: IndexMap::new(),
            current_name: None,
            user_weight: 1.0,
            internal_weight: 0.0,
            blend_mode,
            default_transition_ms: 0.0,
            default_easing: EasingFunction::Linear,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn blend_mode(&self) -> LayerBlendMode {
        self.blend_mode
    }

    pub fn user_weight(&self) -> f32 {
        self.user_weight
    }

    pub fn set_user_weight(&mut self, weight: f32) {
        self.user_weight = weight.clamp(0.0, 1.0);
    }

    pub fn internal_weight(&self) -> f32 {
        self.internal_weight
    }

    pub fn current_animation(&self) -> Option<&str> {
        self.current_name.as_deref()
    }

    pub fn set_default_transition(&mut self, transition_ms: f32, easing: EasingFunction) {
        self.default_transition_ms = transition_ms;
        self.default_easing = easing;
    }

    pub fn animation_names(&self) -> Vec<String> {
        self.states.keys().cloned().collect()
    }

    pub fn has_animation(&self, name: &str) -> bool {
        self.states.contains_key(name)
    }

    pub fn add_animation(&mut self, state: Box<dyn State>) -> Result<()> {
        let name = state.name().to_string();
        if self.states.contains_key(&name) {
            return Err(HostError::argument(format!("animation '{name}' already exists on layer '{}'", self.name)));
        }
        self.states.insert(name, state);
        Ok(())
    }

    pub fn remove_animation(&mut self, name: &str) -> Result<Box<dyn State>> {
        let mut state = self
            .states
            .shift_remove(name)
            .ok_or_else(|| HostError::not_found(format!("animation '{name}' on layer '{}'", self.name)))?;
        state.discard();
        if self.current_name.as_deref() == Some(name) {
            self.current_name = None;
        }
        Ok(state)
    }

    pub fn rename_animation(&mut self, old_name: &str, new_name: &str) -> Result<()> {
        if self.states.contains_key(new_name) {
            return Err(HostError::argument(format!("animation '{new_name}' already exists on layer '{}'", self.name)));
        }
        let (_, mut state) = self
            .states
            .shift_remove_entry(old_name)
            .ok_or_else(|| HostError::not_found(format!("animation '{old_name}' on layer '{}'", self.name)))?;
        state.set_name(new_name.to_string());
        self.states.insert(new_name.to_string(), state);
        if self.current_name.as_deref() == Some(old_name) {
            self.current_name = Some(new_name.to_string());
        }
        Ok(())
    }

    /// Plays `name`, crossfading every other state's weight toward `0`
    /// over the same transition window. Mirrors the five-rule algorithm:
    /// re-playing the already-sole-active state with no transition is a
    /// no-op; playing a paused state resumes it in place; anything else
    /// fades the previous current state out while fading the new one in.
    pub fn play_animation(
        &mut self,
        name: &str,
        transition_ms: Option<f32>,
        easing: Option<EasingFunction>,
    ) -> Result<Deferred<StateOutcome>> {
        if !self.states.contains_key(name) {
            return Err(HostError::not_found(format!("animation '{name}' on layer '{}'", self.name)));
        }
        let transition_ms = transition_ms.unwrap_or(self.default_transition_ms);
        let easing = easing.unwrap_or(self.default_easing);

        let already_sole_active = self.current_name.as_deref() == Some(name)
            && self.states.get(name).map_or(false, |s| !s.is_paused() && s.weight() >= 1.0 - f32::EPSILON);
        if already_sole_active && transition_ms <= f32::EPSILON {
            trace!(layer = %self.name, animation = %name, "play_animation no-op, already sole active state");
            let d = Deferred::pending();
            return Ok(d);
        }

        for (other_name, state) in self.states.iter_mut() {
            if other_name != name && (state.weight() > 0.0 || !state.is_paused()) {
                state.pause(transition_ms, easing);
            }
        }

        let was_paused = self.states.get(name).map_or(true, |s| s.is_paused());
        let target = self.states.get_mut(name).expect("checked above");
        let deferred = if was_paused {
            target.resume(transition_ms, easing)
        } else {
            target.play(transition_ms, easing)
        };
        debug!(layer = %self.name, animation = %name, transition_ms, "play_animation");
        self.current_name = Some(name.to_string());
        Ok(deferred)
    }

    pub fn pause_animation(&mut self, name: &str, transition_ms: Option<f32>, easing: Option<EasingFunction>) -> Result<Deferred<StateOutcome>> {
        let transition_ms = transition_ms.unwrap_or(self.default_transition_ms);
        let easing = easing.unwrap_or(self.default_easing);
        let state = self
            .states
            .get_mut(name)
            .ok_or_else(|| HostError::not_found(format!("animation '{name}' on layer '{}'", self.name)))?;
        Ok(state.pause(transition_ms, easing))
    }

    pub fn resume_animation(&mut self, name: &str, transition_ms: Option<f32>, easing: Option<EasingFunction>) -> Result<Deferred<StateOutcome>> {
        self.play_animation(name, transition_ms, easing)
    }

    pub fn stop_animation(&mut self, name: &str) -> Result<()> {
        let state = self
            .states
            .get_mut(name)
            .ok_or_else(|| HostError::not_found(format!("animation '{name}' on layer '{}'", self.name)))?;
        state.stop();
        if self.current_name.as_deref() == Some(name) {
            self.current_name = None;
        }
        Ok(())
    }

    /// Stops whatever is currently playing, pre-empting it rather than
    /// letting it finish, with `reason` propagated to its play deferred.
    pub fn interrupt_current(&mut self, reason: CancelReason) {
        if let Some(name) = self.current_name.take() {
            if let Some(state) = self.states.get_mut(&name) {
                state.cancel(reason);
                state.stop();
            }
        }
    }

    pub fn get_state_mut(&mut self, name: &str) -> Option<&mut Box<dyn State>> {
        self.states.get_mut(name)
    }

    /// Applies the parent feature's budget and propagates it to every
    /// state. An Override layer hands back what's left for layers below
    /// after subtracting its *current state's* internal weight (not the
    /// layer's own weight) - a layer sitting on a half-weighted state only
    /// consumes half the budget it would at full weight, so the layers
    /// beneath it still see most of their share.
    pub fn update_internal_weight(&mut self, remaining_budget: f32) -> f32 {
        self.internal_weight = remaining_budget * self.user_weight;
        for state in self.states.values_mut() {
            state.update_internal_weight(self.internal_weight);
        }
        match self.blend_mode {
            LayerBlendMode::Override => {
                let consumed = self
                    .current_name
                    .as_ref()
                    .and_then(|n| self.states.get(n))
                    .map_or(0.0, |s| s.internal_weight());
                (remaining_budget - consumed).max(0.0)
            }
            LayerBlendMode::Additive => remaining_budget,
        }
    }

    pub fn update(&mut self, delta_ms: f32) {
        for state in self.states.values_mut() {
            state.update(delta_ms);
        }
        if let Some(name) = &self.current_name {
            let faded_out = self.states.get(name).map_or(false, |s| s.is_paused() && s.weight() <= f32::EPSILON);
            if faded_out {
                self.current_name = None;
            }
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
        fn normalized_time(&self) -> f32 { 0.0 }
        fn set_normalized_time(&mut self, _t: f32) {}
        fn time_scale(&self) -> f32 { 1.0 }
        fn set_time_scale(&mut self, _s: f32) {}
        fn loop_count(&self) -> Option<u32> { None }
        fn set_weight(&mut self, _w: f32) {}
        fn advance(&mut self, _d: f32) -> bool { false }
    }

    fn layer_with(names: &[&str]) -> AnimationLayer {
        let mut layer = AnimationLayer::new("base", LayerBlendMode::Override);
        for n in names {
            layer.add_animation(Box::new(SingleState::new(*n, Box::new(Noop), BlendMode::Override))).unwrap();
        }
        layer
    }

    #[test]
    fn playing_one_fades_the_other_out() {
        let mut layer = layer_with(&["idle", "wave"]);
        layer.play_animation("idle", Some(0.0), None).unwrap();
        layer.update(16.0);
        layer.play_animation("wave", Some(100.0), None).unwrap();
        layer.update(50.0);
        assert!(layer.get_state_mut("idle").unwrap().weight() < 1.0);
        assert!(layer.get_state_mut("wave").unwrap().weight() > 0.0);
    }

    #[test]
    fn override_layer_consumes_its_share_of_the_budget() {
        let mut layer = layer_with(&["idle"]);
        layer.play_animation("idle", Some(0.0), None).unwrap();
        layer.update(16.0);
        layer.set_user_weight(0.5);
        let remaining = layer.update_internal_weight(1.0);
        assert!((remaining - 0.5).abs() < 1e-5, "remaining={remaining}");
    }

    #[test]
    fn override_layer_with_no_active_state_consumes_nothing() {
        let mut layer = layer_with(&["idle"]);
        let remaining = layer.update_internal_weight(1.0);
        assert!((remaining - 1.0).abs() < 1e-5);
    }

    #[test]
    fn half_weighted_state_leaves_half_the_budget_for_layers_below() {
        // S1 from the design scenarios: a half-weighted top state only
        // consumes half of what a fully-weighted one would.
        let mut top = layer_with(&["pose"]);
        top.play_animation("pose", Some(100.0), None).unwrap();
        top.update(50.0); // halfway through the 100ms fade-in -> weight ~= 0.5
        let remaining = top.update_internal_weight(1.0);
        assert!((remaining - 0.5).abs() < 1e-2, "remaining={remaining}");
    }

    #[test]
    fn additive_layer_passes_budget_through() {
        let mut layer = AnimationLayer::new("gesture", LayerBlendMode::Additive);
        layer.add_animation(Box::new(SingleState::new("wave", Box::new(Noop), BlendMode::Additive))).unwrap();
        let remaining = layer.update_internal_weight(0.6);
        assert!((remaining - 0.6).abs() < 1e-5);
    }

    #[test]
    fn rename_animation_updates_current_pointer() {
        let mut layer = layer_with(&["idle"]);
        layer.play_animation("idle", Some(0.0), None).unwrap();
        layer.rename_animation("idle", "idle_v2").unwrap();
        assert_eq!(layer.current_animation(), Some("idle_v2"));
    }
}
