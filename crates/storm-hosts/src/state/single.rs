// File: crates/storm-hosts/src/state/single.rs
// Description: Leaf state wrapping exactly one engine-side animation clip

use storm_math::EasingFunction;

use crate::deferred::Deferred;
use crate::engine::AnimationPlayer;
use crate::error::CancelReason;

use super::{AbstractStateBase, State, StateOutcome};

/// Blend mode a state contributes its weight with when composited into a
/// layer or parent blend state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    Override,
    Additive,
}

/// A leaf state driving a single [`AnimationPlayer`].
#[derive(Debug)]
pub struct SingleState {
    base: AbstractStateBase,
    player: Box<dyn AnimationPlayer>,
    blend_mode: BlendMode,
}

impl SingleState {
    pub fn new(name: impl Into<String>, player: Box<dyn AnimationPlayer>, blend_mode: BlendMode) -> Self {
        Self { base: AbstractStateBase::new(name), player, blend_mode }
    }

    pub fn blend_mode(&self) -> BlendMode {
        self.blend_mode
    }

    pub fn time_scale(&self) -> f32 {
        self.player.time_scale()
    }

    pub fn set_time_scale(&mut self, scale: f32) {
        self.player.set_time_scale(scale);
    }

    pub fn loop_count(&self) -> Option<u32> {
        self.player.loop_count()
    }
}

impl State for SingleState {
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
        self.player.set_weight(self.base.internal_weight());
    }

    fn set_internal_weight(&mut self, internal_weight: f32) {
        self.base.set_internal_weight(internal_weight);
        self.player.set_weight(internal_weight);
    }

    fn is_paused(&self) -> bool {
        self.base.is_paused()
    }

    fn play(&mut self, transition_ms: f32, easing: EasingFunction) -> Deferred<StateOutcome> {
        self.base.play(transition_ms, easing)
    }

    fn pause(&mut self, transition_ms: f32, easing: EasingFunction) -> Deferred<StateOutcome> {
        self.base.pause(transition_ms, easing)
    }

    fn resume(&mut self, transition_ms: f32, easing: EasingFunction) -> Deferred<StateOutcome> {
        self.base.resume(transition_ms, easing)
    }

    fn cancel(&mut self, reason: CancelReason) {
        self.base.cancel(reason);
    }

    fn stop(&mut self) {
        self.base.stop();
        self.player.set_normalized_time(0.0);
    }

    fn discard(&mut self) {
        self.base.cancel(CancelReason::new("discarded"));
    }

    fn update(&mut self, delta_ms: f32) {
        if self.base.is_paused() {
            self.base.step_weight(delta_ms);
            return;
        }
        self.base.step_weight(delta_ms);
        let finished_final_loop = self.player.advance(delta_ms);
        if finished_final_loop {
            self.base.finish();
        }
    }

    fn normalized_time(&self) -> f32 {
        self.player.normalized_time()
    }

    fn set_normalized_time(&mut self, t: f32) {
        self.player.set_normalized_time(t);
    }

    fn is_infinite_loop(&self) -> bool {
        self.player.loop_count().is_none()
    }
}
