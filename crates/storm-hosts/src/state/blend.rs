// File: crates/storm-hosts/src/state/blend.rs
// Description: Shared substate bookkeeping for blend states, plus the
// free-blend kind whose substates are renormalized from caller-set weights.

use indexmap::IndexMap;
use storm_math::EasingFunction;

use crate::deferred::{self, Deferred};
use crate::error::CancelReason;

use super::{AbstractStateBase, State, StateOutcome};

/// Name-ordered set of substates shared by every blend state kind. Order
/// matters for deterministic iteration (closest to the original insertion
/// order callers configured), not for blend math.
#[derive(Debug, Default)]
pub(crate) struct Substates {
    pub(crate) states: IndexMap<String, Box<dyn State>>,
}

impl Substates {
    pub fn new(states: Vec<Box<dyn State>>) -> Self {
        let mut map = IndexMap::new();
        for s in states {
            map.insert(s.name().to_string(), s);
        }
        Self { states: map }
    }

    pub fn names(&self) -> Vec<String> {
        self.states.keys().cloned().collect()
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Box<dyn State>> {
        self.states.get_mut(name)
    }

    pub fn update(&mut self, delta_ms: f32) {
        for s in self.states.values_mut() {
            s.update(delta_ms);
        }
    }

    pub fn play_all(&mut self, transition_ms: f32, easing: EasingFunction) -> Deferred<Vec<StateOutcome>> {
        let members = self.states.values_mut().map(|s| s.play(transition_ms, easing)).collect();
        deferred::all(members)
    }

    pub fn pause_all(&mut self, transition_ms: f32, easing: EasingFunction) -> Deferred<Vec<StateOutcome>> {
        let members = self.states.values_mut().map(|s| s.pause(transition_ms, easing)).collect();
        deferred::all(members)
    }

    pub fn resume_all(&mut self, transition_ms: f32, easing: EasingFunction) -> Deferred<Vec<StateOutcome>> {
        let members = self.states.values_mut().map(|s| s.resume(transition_ms, easing)).collect();
        deferred::all(members)
    }

    pub fn cancel_all(&mut self, reason: CancelReason) {
        for s in self.states.values_mut() {
            s.cancel(reason.clone());
        }
    }

    pub fn stop_all(&mut self) {
        for s in self.states.values_mut() {
            s.stop();
        }
    }

    pub fn discard_all(&mut self) {
        for s in self.states.values_mut() {
            s.discard();
        }
    }
}

/// Blends its substates by their own weights renormalized to sum to `1`,
/// so callers can set arbitrary relative sliders (e.g. "happy" / "sad" /
/// "angry" faders) without having to keep them summed themselves.
#[derive(Debug)]
pub struct FreeBlendState {
    base: AbstractStateBase,
    substates: Substates,
    blend_weights: IndexMap<String, f32>,
}

impl FreeBlendState {
    pub fn new(name: impl Into<String>, states: Vec<Box<dyn State>>) -> Self {
        let substates = Substates::new(states);
        let blend_weights = substates.names().into_iter().map(|n| (n, 0.0)).collect();
        Self { base: AbstractStateBase::new(name), substates, blend_weights }
    }

    /// Sets a substate's relative weight before the next renormalization
    /// pass. Unknown names are ignored.
    pub fn set_blend_weight(&mut self, name: &str, weight: f32) {
        if let Some(w) = self.blend_weights.get_mut(name) {
            *w = weight.max(0.0);
        }
    }

    /// Fans `budget` out to every substate by its blend weight, normalized
    /// so the weights sum to at most `1` - dividing by `total.max(1.0)`
    /// scales weights *down* when they oversubscribe the budget, but never
    /// scales them *up* when they undersubscribe it. The normalized ratio
    /// is assigned as each substate's internal weight directly: a
    /// FreeBlend's substates are never individually played, so nothing
    /// should multiply the ratio down further.
    fn distribute(&mut self, budget: f32) {
        let total: f32 = self.blend_weights.values().sum();
        let divisor = total.max(1.0);
        for (name, w) in self.blend_weights.iter() {
            if let Some(state) = self.substates.get_mut(name) {
                state.set_internal_weight(budget * (w / divisor));
            }
        }
    }
}

impl State for FreeBlendState {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn set_name(&mut self, name: String) {
        self.base.set_name(name);
    }

    fn weight(&self) -> f32 {
        self.base.weight()
    }

    fn internal_weight(&self) -> f32 {
        self.base.internal_weight()
    }

    fn update_internal_weight(&mut self, parent_internal_weight: f32) {
        self.base.update_internal_weight(parent_internal_weight);
        // Substates are played as a group, not individually (see `play`),
        // so their own weight is never what determines how much of the
        // budget each one gets - that's the blend ratio's job. The budget
        // handed to `distribute` is the incoming factor itself, not this
        // state's own weight-multiplied `internal_weight`.
        self.distribute(parent_internal_weight);
    }

    fn set_internal_weight(&mut self, internal_weight: f32) {
        self.base.set_internal_weight(internal_weight);
        self.distribute(internal_weight);
    }

    fn is_paused(&self) -> bool {
        self.base.is_paused()
    }

    fn play(&mut self, transition_ms: f32, easing: EasingFunction) -> Deferred<StateOutcome> {
        let base_play = self.base.play(transition_ms, easing);
        let sub_play = self.substates.play_all(transition_ms, easing);
        let result = Deferred::pending();
        let result_for_resolve = result.clone();
        sub_play.on_resolve(move |_| result_for_resolve.resolve(StateOutcome::Finished));
        base_play.on_cancel(move |v| result.cancel(v.clone()));
        result
    }

    fn pause(&mut self, transition_ms: f32, easing: EasingFunction) -> Deferred<StateOutcome> {
        self.substates.pause_all(transition_ms, easing);
        self.base.pause(transition_ms, easing)
    }

    fn resume(&mut self, transition_ms: f32, easing: EasingFunction) -> Deferred<StateOutcome> {
        self.substates.resume_all(transition_ms, easing);
        self.base.resume(transition_ms, easing)
    }

    fn cancel(&mut self, reason: CancelReason) {
        self.base.cancel(reason.clone());
        self.substates.cancel_all(reason);
    }

    fn stop(&mut self) {
        self.base.stop();
        self.substates.stop_all();
    }

    fn discard(&mut self) {
        self.substates.discard_all();
    }

    fn update(&mut self, delta_ms: f32) {
        self.base.step_weight(delta_ms);
        self.substates.update(delta_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::single::{BlendMode, SingleState};
    use crate::engine::AnimationPlayer;

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

    #[test]
    fn renormalizes_relative_weights() {
        let a = Box::new(SingleState::new("happy", Box::new(Noop), BlendMode::Override));
        let b = Box::new(SingleState::new("sad", Box::new(Noop), BlendMode::Override));
        let mut blend = FreeBlendState::new("emotion", vec![a, b]);
        blend.set_blend_weight("happy", 3.0);
        blend.set_blend_weight("sad", 1.0);
        blend.update_internal_weight(1.0);
        assert!((blend.substates.get_mut("happy").unwrap().internal_weight() - 0.75).abs() < 1e-5);
        assert!((blend.substates.get_mut("sad").unwrap().internal_weight() - 0.25).abs() < 1e-5);
    }
}
