// File: crates/storm-hosts/src/state/mod.rs
// Description: Animation state machine - shared lifecycle plus the seven
// concrete state kinds a layer can hold.

mod blend;
mod blend1d;
mod blend2d;
mod queue;
mod random;
mod single;
mod transition;

pub use blend::FreeBlendState;
pub use blend1d::{Blend1dEntry, Blend1dState};
pub use blend2d::{Blend2dEntry, Blend2dState};
pub use queue::{QueueAdvance, QueueState};
pub use random::RandomAnimationState;
pub use single::{BlendMode, SingleState};
pub use transition::TransitionState;

use std::fmt;

use storm_math::EasingFunction;

use crate::deferred::Deferred;
use crate::error::CancelReason;

/// Resolution value carried by a state's `play` deferred.
#[derive(Debug, Clone, PartialEq)]
pub enum StateOutcome {
    /// The state ran to completion on its own (a non-looping single state
    /// reached the end of its clip, a queue exhausted its members, ...).
    Finished,
    /// The state was stopped or pre-empted before it finished.
    Canceled(CancelReason),
}

/// Behavior every state kind implements, dispatched through `Box<dyn State>`
/// so a layer's state set can hold any mix of the seven kinds.
pub trait State: fmt::Debug + 'static {
    fn name(&self) -> &str;
    fn set_name(&mut self, name: String);

    /// The state's own weight, in `[0, 1]`, before any parent budget is
    /// applied.
    fn weight(&self) -> f32;

    /// The weight after the layer stack's top-down budget pass; this is
    /// what actually reaches the engine adapter.
    fn internal_weight(&self) -> f32;

    /// Applies the budget handed down from the owning layer (or parent
    /// blend state), multiplying it by this state's own weight.
    fn update_internal_weight(&mut self, parent_internal_weight: f32);

    /// Assigns `internal_weight` directly, bypassing this state's own
    /// weight/tween. Blend-space composites (free blend, 1D/2D blend) use
    /// this on their substates: the blend ratio *is* the substate's
    /// budget, not a further multiplier on top of a play-tweened weight
    /// the substate never independently carries.
    fn set_internal_weight(&mut self, internal_weight: f32);

    fn is_paused(&self) -> bool;

    /// Begins playback, tweening weight from its current value up to
    /// `1.0` over `transition_ms`. Returns a deferred that resolves with
    /// [`StateOutcome::Finished`] when the state completes on its own, or
    /// is settled with `Canceled` if pre-empted first.
    fn play(&mut self, transition_ms: f32, easing: EasingFunction) -> Deferred<StateOutcome>;

    /// Pauses in place: weight tweens to `0`, playback position holds.
    fn pause(&mut self, transition_ms: f32, easing: EasingFunction) -> Deferred<StateOutcome>;

    /// Resumes from the current (paused) position.
    fn resume(&mut self, transition_ms: f32, easing: EasingFunction) -> Deferred<StateOutcome>;

    /// Cancels any outstanding play/pause/resume deferred with a
    /// cancellation reason, without otherwise touching playback state.
    fn cancel(&mut self, reason: CancelReason);

    /// Immediately halts playback and cancels outstanding deferreds.
    fn stop(&mut self);

    /// Releases engine-side resources (clips, players). A discarded state
    /// must not be updated again.
    fn discard(&mut self);

    /// Advances internal timers/tweens by `delta_ms`. Does not advance
    /// engine playback directly - concrete states that own an
    /// [`crate::engine::AnimationPlayer`] do that themselves.
    fn update(&mut self, delta_ms: f32);

    fn normalized_time(&self) -> f32 {
        0.0
    }

    fn set_normalized_time(&mut self, _t: f32) {}

    /// Whether this state, once playing, never signals its own natural
    /// finish (an infinitely-looping clip, a random-animation state that
    /// keeps re-rolling). A [`QueueState`] can't auto-advance past one of
    /// these on its own - see `QueueState::force_advance`.
    fn is_infinite_loop(&self) -> bool {
        false
    }

    /// Downcasting escape hatch for callers that need to reach
    /// kind-specific operations (e.g. `Blend1dState::set_parameter`) through
    /// a `Box<dyn State>` held by a layer's state map.
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

/// Critically-damped weight tween shared by every state kind: plays tween
/// weight up to `1`, pause/stop tween it down to `0`.
#[derive(Debug, Clone)]
pub(crate) struct WeightTween {
    start: f32,
    target: f32,
    elapsed_ms: f32,
    duration_ms: f32,
    easing: EasingFunction,
    active: bool,
}

impl Default for WeightTween {
    fn default() -> Self {
        Self { start: 0.0, target: 0.0, elapsed_ms: 0.0, duration_ms: 0.0, easing: EasingFunction::Linear, active: false }
    }
}

impl WeightTween {
    pub fn start(&mut self, from: f32, to: f32, duration_ms: f32, easing: EasingFunction) {
        self.start = from;
        self.target = to;
        self.elapsed_ms = 0.0;
        self.duration_ms = duration_ms.max(0.0);
        self.easing = easing;
        self.active = true;
    }

    /// Advances the tween, returning the new weight and whether it just
    /// completed this call.
    pub fn step(&mut self, delta_ms: f32) -> Option<(f32, bool)> {
        if !self.active {
            return None;
        }
        if self.duration_ms <= f32::EPSILON {
            self.active = false;
            return Some((self.target, true));
        }
        self.elapsed_ms = (self.elapsed_ms + delta_ms).min(self.duration_ms);
        let t = self.elapsed_ms / self.duration_ms;
        let eased = self.easing.apply(t);
        let value = self.start + (self.target - self.start) * eased;
        let done = self.elapsed_ms >= self.duration_ms;
        if done {
            self.active = false;
        }
        Some((value, done))
    }
}

/// Fields and behavior common to every state kind. Concrete states embed
/// this rather than inherit from it - composition over the mixin-style
/// inheritance chain this is adapted from.
#[derive(Debug)]
pub(crate) struct AbstractStateBase {
    name: String,
    weight: f32,
    internal_weight: f32,
    paused: bool,
    tween: WeightTween,
    play: Option<Deferred<StateOutcome>>,
}

impl AbstractStateBase {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            weight: 0.0,
            internal_weight: 0.0,
            paused: true,
            tween: WeightTween::default(),
            play: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub fn weight(&self) -> f32 {
        self.weight
    }

    pub fn internal_weight(&self) -> f32 {
        self.internal_weight
    }

    pub fn update_internal_weight(&mut self, parent_internal_weight: f32) {
        self.internal_weight = self.weight * parent_internal_weight;
    }

    /// Assigns `internal_weight` directly, bypassing the own-weight
    /// multiply - for composites (blend spaces) that own the distribution
    /// decision themselves rather than relying on each substate having
    /// been individually played.
    pub fn set_internal_weight(&mut self, internal_weight: f32) {
        self.internal_weight = internal_weight;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    fn begin(&mut self, target: f32, transition_ms: f32, easing: EasingFunction) -> Deferred<StateOutcome> {
        if let Some(prev) = self.play.take() {
            prev.cancel(StateOutcome::Canceled(CancelReason::new("superseded")));
        }
        self.tween.start(self.weight, target, transition_ms, easing);
        let d = Deferred::pending();
        self.play = Some(d.clone());
        d
    }

    pub fn play(&mut self, transition_ms: f32, easing: EasingFunction) -> Deferred<StateOutcome> {
        self.paused = false;
        self.begin(1.0, transition_ms, easing)
    }

    pub fn pause(&mut self, transition_ms: f32, easing: EasingFunction) -> Deferred<StateOutcome> {
        self.paused = true;
        self.begin(0.0, transition_ms, easing)
    }

    pub fn resume(&mut self, transition_ms: f32, easing: EasingFunction) -> Deferred<StateOutcome> {
        self.paused = false;
        self.begin(1.0, transition_ms, easing)
    }

    pub fn cancel(&mut self, reason: CancelReason) {
        if let Some(d) = self.play.take() {
            d.cancel(StateOutcome::Canceled(reason));
        }
    }

    pub fn stop(&mut self) {
        self.tween = WeightTween::default();
        self.weight = 0.0;
        self.internal_weight = 0.0;
        self.paused = true;
        self.finish();
    }

    /// Call from the concrete state's own `update` before advancing
    /// playback. A pause/stop tween that reaches its target resolves the
    /// outstanding deferred right here, since a paused state never reaches
    /// `finish()` through its own playback advancing. A play/resume tween
    /// reaching `1.0` does *not* resolve anything - that deferred settles
    /// only once the state naturally finishes playing.
    pub fn step_weight(&mut self, delta_ms: f32) {
        if let Some((value, done)) = self.tween.step(delta_ms) {
            self.weight = value;
            if done && self.paused {
                self.finish();
            }
        }
    }

    /// Resolves the outstanding play deferred as naturally finished (a
    /// clip ran out, a queue exhausted). Idempotent once already settled.
    pub fn finish(&mut self) {
        if let Some(d) = self.play.take() {
            d.resolve(StateOutcome::Finished);
        }
    }
}
