// File: crates/storm-hosts/src/state/transition.rs
// Description: Crossfades a set of outgoing states into one incoming state

use storm_math::EasingFunction;

use crate::deferred::Deferred;
use crate::error::CancelReason;

use super::{AbstractStateBase, State, StateOutcome};

/// A transient state a layer installs in place of its current state while
/// crossfading: `from` fades to `0` and `to` fades to `1` over the same
/// duration, and once both finish the layer swaps `to` in as the new
/// current state and discards `from`.
#[derive(Debug)]
pub struct TransitionState {
    base: AbstractStateBase,
    from: Vec<Box<dyn State>>,
    to: Box<dyn State>,
    settle: Option<Deferred<StateOutcome>>,
}

/// Weight within this of a tween's target counts as settled - avoids
/// waiting an extra tick for floating point noise to clear the threshold.
const SETTLE_EPSILON: f32 = 1e-3;

impl TransitionState {
    pub fn new(name: impl Into<String>, from: Vec<Box<dyn State>>, to: Box<dyn State>) -> Self {
        Self { base: AbstractStateBase::new(name), from, to, settle: None }
    }

    /// Takes ownership of the incoming state, handing it to the layer once
    /// the transition settles.
    pub fn into_target(self) -> Box<dyn State> {
        self.to
    }

    pub fn target_name(&self) -> &str {
        self.to.name()
    }
}

impl State for TransitionState {
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
        let budget = self.base.internal_weight();
        self.to.update_internal_weight(budget);
        for f in self.from.iter_mut() {
            f.update_internal_weight(budget);
        }
    }

    fn set_internal_weight(&mut self, internal_weight: f32) {
        self.base.set_internal_weight(internal_weight);
        self.to.update_internal_weight(internal_weight);
        for f in self.from.iter_mut() {
            f.update_internal_weight(internal_weight);
        }
    }

    fn is_paused(&self) -> bool {
        false
    }

    fn play(&mut self, transition_ms: f32, easing: EasingFunction) -> Deferred<StateOutcome> {
        // The crossfade settles once `to` reaches full weight and every
        // `from` member reaches zero - not when `to`'s own clip happens to
        // finish playing, which may be long after (or never, for a looping
        // idle). `update` polls for that condition every tick, so the
        // underlying play/pause deferreds are only used to drive the
        // weight tweens, not to signal completion.
        let _ = self.to.play(transition_ms, easing);
        for f in self.from.iter_mut() {
            let _ = f.pause(transition_ms, easing);
        }
        if let Some(prev) = self.settle.take() {
            prev.cancel(StateOutcome::Canceled(CancelReason::new("superseded")));
        }
        let result = Deferred::pending();
        self.settle = Some(result.clone());
        result
    }

    fn pause(&mut self, transition_ms: f32, easing: EasingFunction) -> Deferred<StateOutcome> {
        self.base.pause(transition_ms, easing)
    }

    fn resume(&mut self, transition_ms: f32, easing: EasingFunction) -> Deferred<StateOutcome> {
        self.play(transition_ms, easing)
    }

    fn cancel(&mut self, reason: CancelReason) {
        self.base.cancel(reason.clone());
        if let Some(d) = self.settle.take() {
            d.cancel(StateOutcome::Canceled(reason.clone()));
        }
        self.to.cancel(reason.clone());
        for f in self.from.iter_mut() {
            f.cancel(reason.clone());
        }
    }

    fn stop(&mut self) {
        self.base.stop();
        if let Some(d) = self.settle.take() {
            d.cancel(StateOutcome::Canceled(CancelReason::new("stopped")));
        }
        self.to.stop();
        for f in self.from.iter_mut() {
            f.stop();
        }
    }

    fn discard(&mut self) {
        self.to.discard();
        for f in self.from.iter_mut() {
            f.discard();
        }
    }

    fn update(&mut self, delta_ms: f32) {
        self.to.update(delta_ms);
        for f in self.from.iter_mut() {
            f.update(delta_ms);
        }
        if self.settle.is_some() {
            let to_settled = (self.to.weight() - 1.0).abs() < SETTLE_EPSILON;
            let from_settled = self.from.iter().all(|f| f.weight().abs() < SETTLE_EPSILON);
            if to_settled && from_settled {
                if let Some(d) = self.settle.take() {
                    d.resolve(StateOutcome::Finished);
                }
            }
        }
    }

    fn normalized_time(&self) -> f32 {
        self.to.normalized_time()
    }

    fn set_normalized_time(&mut self, t: f32) {
        self.to.set_normalized_time(t);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::AnimationPlayer;
    use crate::state::single::{BlendMode, SingleState};

    #[derive(Debug, Default)]
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

    /// S7: over a 1s linear crossfade, `to.weight + sum(from.weight)`
    /// stays at 1 at every sampled tick, and the settle deferred resolves
    /// once both sides finish their tween.
    #[test]
    fn weights_sum_to_one_through_the_whole_crossfade() {
        let mut from = single("x");
        from.play(0.0, EasingFunction::Linear);
        from.update(0.0);

        let mut transition = TransitionState::new("x->y", vec![from], single("y"));
        let finish = transition.play(1000.0, EasingFunction::Linear);

        for _ in 0..10 {
            transition.update(100.0);
            let sum = transition.to.weight() + transition.from.iter().map(|f| f.weight()).sum::<f32>();
            assert!((sum - 1.0).abs() < 1e-2, "sum={sum}");
        }
        assert_eq!(finish.value(), Some(StateOutcome::Finished));
        assert!((transition.to.weight() - 1.0).abs() < 1e-2);
    }
}
