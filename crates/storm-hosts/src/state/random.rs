// File: crates/storm-hosts/src/state/random.rs
// Description: Picks a random substate on an interval, excluding whichever
// one just played so the same idle variation never repeats back-to-back.

use rand::Rng;
use storm_math::EasingFunction;

use crate::deferred::Deferred;
use crate::error::CancelReason;

use super::{AbstractStateBase, State, StateOutcome};

#[derive(Debug)]
pub struct RandomAnimationState {
    base: AbstractStateBase,
    members: Vec<Box<dyn State>>,
    current: usize,
    /// Mean interval (ms) between re-rolls; the actual wait is sampled
    /// uniformly from `[interval / 4, interval * 2]`.
    interval_ms: f32,
    next_roll_ms: f32,
    elapsed_ms: f32,
}

impl RandomAnimationState {
    pub fn new(name: impl Into<String>, members: Vec<Box<dyn State>>, interval_ms: f32) -> Self {
        let mut s = Self {
            base: AbstractStateBase::new(name),
            members,
            current: 0,
            interval_ms,
            next_roll_ms: interval_ms,
            elapsed_ms: 0.0,
        };
        s.roll_next_interval();
        s
    }

    fn roll_next_interval(&mut self) {
        let mut rng = rand::thread_rng();
        self.next_roll_ms = rng.gen_range((self.interval_ms / 4.0)..=(self.interval_ms * 2.0));
        self.elapsed_ms = 0.0;
    }

    fn reroll_member(&mut self) {
        if self.members.len() < 2 {
            return;
        }
        let mut rng = rand::thread_rng();
        loop {
            let candidate = rng.gen_range(0..self.members.len());
            if candidate != self.current {
                self.current = candidate;
                break;
            }
        }
        self.roll_next_interval();
    }

    pub fn current_name(&self) -> Option<&str> {
        self.members.get(self.current).map(|s| s.name())
    }
}

impl State for RandomAnimationState {
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
            s.update_internal_weight(if i == self.current { budget } else { 0.0 });
        }
    }

    fn set_internal_weight(&mut self, internal_weight: f32) {
        self.base.set_internal_weight(internal_weight);
        for (i, s) in self.members.iter_mut().enumerate() {
            s.update_internal_weight(if i == self.current { internal_weight } else { 0.0 });
        }
    }

    fn is_paused(&self) -> bool {
        self.base.is_paused()
    }

    fn play(&mut self, transition_ms: f32, easing: EasingFunction) -> Deferred<StateOutcome> {
        if let Some(m) = self.members.get_mut(self.current) {
            m.play(transition_ms, easing);
        }
        self.base.play(transition_ms, easing)
    }

    fn pause(&mut self, transition_ms: f32, easing: EasingFunction) -> Deferred<StateOutcome> {
        if let Some(m) = self.members.get_mut(self.current) {
            m.pause(transition_ms, easing);
        }
        self.base.pause(transition_ms, easing)
    }

    fn resume(&mut self, transition_ms: f32, easing: EasingFunction) -> Deferred<StateOutcome> {
        if let Some(m) = self.members.get_mut(self.current) {
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
    }

    fn discard(&mut self) {
        for m in self.members.iter_mut() {
            m.discard();
        }
    }

    fn update(&mut self, delta_ms: f32) {
        self.base.step_weight(delta_ms);
        if self.base.is_paused() {
            return;
        }
        self.elapsed_ms += delta_ms;
        if self.elapsed_ms >= self.next_roll_ms {
            self.reroll_member();
            if let Some(m) = self.members.get_mut(self.current) {
                m.play(0.0, EasingFunction::Linear);
            }
        }
        if let Some(current) = self.members.get_mut(self.current) {
            current.update(delta_ms);
        }
    }

    /// A random-animation state keeps re-rolling members forever and never
    /// signals its own finish - a queue that lands on one needs an
    /// external `force_advance` just like an infinitely-looping clip.
    fn is_infinite_loop(&self) -> bool {
        true
    }
}
