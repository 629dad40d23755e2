// File: crates/storm-hosts/src/state/queue.rs
// Description: Plays an ordered list of substates one after another

use storm_math::EasingFunction;

use crate::deferred::Deferred;
use crate::error::CancelReason;

use super::{AbstractStateBase, State, StateOutcome};

/// Emitted whenever the queue's current member changes (at `play`, at a
/// natural advance, or at a forced `force_advance`). Mirrors the
/// `AnimationEvent::PlayNext` payload without depending on the event
/// module directly - `AnimationFeature` reads this after each `update` via
/// [`QueueState::take_advance`].
#[derive(Debug, Clone, PartialEq)]
pub struct QueueAdvance {
    pub animation_name: String,
    /// Whether the *new* current member will, on its own natural finish,
    /// let the queue advance itself - false for an infinitely-looping
    /// member or one that sits at the end of the queue.
    pub can_advance: bool,
    pub is_queue_end: bool,
}

#[derive(Debug)]
pub struct QueueState {
    base: AbstractStateBase,
    members: Vec<Box<dyn State>>,
    cursor: usize,
    auto_advance: bool,
    done: bool,
    current_play: Option<Deferred<StateOutcome>>,
    pending_advance: Option<QueueAdvance>,
}

impl QueueState {
    pub fn new(name: impl Into<String>, members: Vec<Box<dyn State>>, auto_advance: bool) -> Self {
        Self {
            base: AbstractStateBase::new(name),
            members,
            cursor: 0,
            auto_advance,
            done: false,
            current_play: None,
            pending_advance: None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn current_name(&self) -> Option<&str> {
        self.members.get(self.cursor).map(|s| s.name())
    }

    /// Drains the advance notification produced by the most recent `play`,
    /// `update`, or `force_advance`, if the queue moved (or started) this
    /// call.
    pub fn take_advance(&mut self) -> Option<QueueAdvance> {
        self.pending_advance.take()
    }

    fn is_queue_end(&self, cursor: usize) -> bool {
        cursor + 1 >= self.members.len()
    }

    fn advance_payload(&self) -> QueueAdvance {
        let is_queue_end = self.is_queue_end(self.cursor);
        let can_advance = self.auto_advance
            && !is_queue_end
            && self.members.get(self.cursor).map_or(false, |s| !s.is_infinite_loop());
        QueueAdvance {
            animation_name: self.current_name().unwrap_or_default().to_string(),
            can_advance,
            is_queue_end,
        }
    }

    /// Forces the queue to the next member regardless of whether the
    /// current one is infinite-looping - what `AnimationFeature`'s
    /// `play_next_animation` calls when a `canAdvance=false` member's hold
    /// timer (owned by `GestureFeature`) expires.
    pub fn force_advance(&mut self) {
        if self.done {
            return;
        }
        if let Some(current) = self.members.get_mut(self.cursor) {
            current.stop();
        }
        if self.is_queue_end(self.cursor) {
            self.done = true;
            self.base.finish();
            self.pending_advance = Some(self.advance_payload());
            return;
        }
        self.cursor += 1;
        self.current_play = Some(self.members[self.cursor].play(0.0, EasingFunction::Linear));
        self.pending_advance = Some(self.advance_payload());
    }
}

impl State for QueueState {
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
        for (i, s) in self.members.iter_mut().enumerate() {
            s.update_internal_weight(if i == self.cursor { budget } else { 0.0 });
        }
    }

    fn set_internal_weight(&mut self, internal_weight: f32) {
        self.base.set_internal_weight(internal_weight);
        for (i, s) in self.members.iter_mut().enumerate() {
            s.update_internal_weight(if i == self.cursor { internal_weight } else { 0.0 });
        }
    }

    fn is_paused(&self) -> bool {
        self.base.is_paused()
    }

    fn play(&mut self, transition_ms: f32, easing: EasingFunction) -> Deferred<StateOutcome> {
        self.cursor = 0;
        self.done = false;
        if let Some(m) = self.members.get_mut(0) {
            self.current_play = Some(m.play(transition_ms, easing));
        }
        self.pending_advance = Some(self.advance_payload());
        self.base.play(transition_ms, easing)
    }

    fn pause(&mut self, transition_ms: f32, easing: EasingFunction) -> Deferred<StateOutcome> {
        if let Some(m) = self.members.get_mut(self.cursor) {
            m.pause(transition_ms, easing);
        }
        self.base.pause(transition_ms, easing)
    }

    fn resume(&mut self, transition_ms: f32, easing: EasingFunction) -> Deferred<StateOutcome> {
        if let Some(m) = self.members.get_mut(self.cursor) {
            m.resume(transition_ms, easing);
        }
        self.base.resume(transition_ms, easing)
    }

    fn cancel(&mut self, reason: CancelReason) {
        self.base.cancel(reason.clone());
        for m in self.members.iter_mut() {
            m.cancel(reason.clone());
        }
    }

    fn stop(&mut self) {
        self.base.stop();
        for m in self.members.iter_mut() {
            m.stop();
        }
        self.cursor = 0;
        self.done = false;
        self.current_play = None;
    }

    fn discard(&mut self) {
        for m in self.members.iter_mut() {
            m.discard();
        }
    }

    fn update(&mut self, delta_ms: f32) {
        self.base.step_weight(delta_ms);
        if self.done || self.base.is_paused() {
            return;
        }
        if let Some(current) = self.members.get_mut(self.cursor) {
            current.update(delta_ms);
        }
        let finished = self.current_play.as_ref().map_or(false, |d| d.is_resolved());
        if !finished {
            return;
        }
        self.current_play = None;
        if self.is_queue_end(self.cursor) {
            self.done = true;
            self.base.finish();
            self.pending_advance = Some(self.advance_payload());
            return;
        }
        self.cursor += 1;
        self.current_play = Some(self.members[self.cursor].play(0.0, EasingFunction::Linear));
        self.pending_advance = Some(self.advance_payload());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::AnimationPlayer;
    use crate::state::single::{BlendMode, SingleState};

    #[derive(Debug)]
    struct FiniteOnce {
        t: f32,
        done: bool,
    }
    impl AnimationPlayer for FiniteOnce {
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

    #[derive(Debug, Default)]
    struct InfiniteLoop;
    impl AnimationPlayer for InfiniteLoop {
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
        fn advance(&mut self, _delta_ms: f32) -> bool {
            false
        }
    }

    fn finite(name: &str) -> Box<dyn State> {
        Box::new(SingleState::new(name, Box::new(FiniteOnce { t: 0.0, done: false }), BlendMode::Override))
    }

    fn infinite(name: &str) -> Box<dyn State> {
        Box::new(SingleState::new(name, Box::new(InfiniteLoop), BlendMode::Override))
    }

    #[test]
    fn auto_advances_past_finite_members() {
        let mut q = QueueState::new("queue", vec![finite("a"), finite("b")], true);
        q.play(0.0, EasingFunction::Linear);
        assert_eq!(q.current_name(), Some("a"));
        for _ in 0..5 {
            q.update(16.0);
        }
        assert_eq!(q.current_name(), Some("b"));
        for _ in 0..5 {
            q.update(16.0);
        }
        assert!(q.is_done());
    }

    #[test]
    fn infinite_member_reports_cannot_advance_until_forced() {
        let mut q = QueueState::new("queue", vec![finite("a"), infinite("b"), finite("c")], true);
        q.play(0.0, EasingFunction::Linear);
        for _ in 0..5 {
            q.update(16.0);
        }
        assert_eq!(q.current_name(), Some("b"));
        let advance = q.take_advance().unwrap();
        assert_eq!(advance.animation_name, "b");
        assert!(!advance.can_advance);
        assert!(!advance.is_queue_end);

        for _ in 0..50 {
            q.update(16.0);
        }
        assert_eq!(q.current_name(), Some("b"), "infinite member never self-advances");

        q.force_advance();
        assert_eq!(q.current_name(), Some("c"));
    }
}
