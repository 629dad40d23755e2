// File: crates/storm-hosts/src/state/blend1d.rs
// Description: One-dimensional blend space indexed by a scalar parameter
// (e.g. speech energy), interpolating between the two bracketing substates.

use storm_math::EasingFunction;

use crate::deferred::Deferred;
use crate::error::{HostError, Result};
use crate::error::CancelReason;

use super::blend::Substates;
use super::{AbstractStateBase, State, StateOutcome};

/// A substate placed at a threshold along the blend axis.
pub struct Blend1dEntry {
    pub threshold: f32,
    pub state: Box<dyn State>,
}

/// Blends along a single scalar parameter: substates are registered at
/// sorted, unique thresholds, and the current parameter value is bracketed
/// between the two nearest thresholds and interpolated between them.
#[derive(Debug)]
pub struct Blend1dState {
    base: AbstractStateBase,
    substates: Substates,
    thresholds: Vec<(f32, String)>,
    parameter: f32,
    /// Copies normalized playback time from the dominant bracket substate
    /// into the other so scrubbing the parameter doesn't pop playback
    /// position - "phase matching" in the design notes.
    phase_match: bool,
}

impl Blend1dState {
    pub fn new(name: impl Into<String>, entries: Vec<Blend1dEntry>, phase_match: bool) -> Result<Self> {
        let mut thresholds: Vec<(f32, String)> = Vec::new();
        let mut states = Vec::new();
        for entry in entries {
            let key = entry.state.name().to_string();
            if thresholds.iter().any(|(t, _)| (t - entry.threshold).abs() < f32::EPSILON) {
                return Err(HostError::blend_geometry(format!("duplicate threshold {} on blend1d '{}'", entry.threshold, key)));
            }
            thresholds.push((entry.threshold, key));
            states.push(entry.state);
        }
        if thresholds.len() < 2 {
            return Err(HostError::blend_geometry("blend1d requires at least two thresholds"));
        }
        thresholds.sort_by(|a, b| a.0.partial_cmp(&b.0).expect("threshold is finite"));
        Ok(Self { base: AbstractStateBase::new(name), substates: Substates::new(states), thresholds, parameter: 0.0, phase_match })
    }

    pub fn set_parameter(&mut self, value: f32) {
        self.parameter = value;
    }

    fn bracket(&self) -> (usize, usize, f32) {
        let p = self.parameter;
        if p <= self.thresholds[0].0 {
            return (0, 0, 0.0);
        }
        let last = self.thresholds.len() - 1;
        if p >= self.thresholds[last].0 {
            return (last, last, 0.0);
        }
        for i in 0..last {
            let (lo, _) = &self.thresholds[i];
            let (hi, _) = &self.thresholds[i + 1];
            if p >= *lo && p <= *hi {
                let span = hi - lo;
                let t = if span > f32::EPSILON { (p - lo) / span } else { 0.0 };
                return (i, i + 1, t);
            }
        }
        (last, last, 0.0)
    }

    /// Fans `budget` out to the two bracketing substates by the blend
    /// ratio, and phase-matches the non-dominant one if configured. The
    /// blend ratio *is* each substate's internal weight directly - these
    /// substates are played as a group (see `play`) but never carry an
    /// individually-tweened weight of their own, so nothing should
    /// multiply the ratio down further.
    fn distribute(&mut self, budget: f32) {
        let (lo, hi, t) = self.bracket();
        let lo_name = self.thresholds[lo].1.clone();
        let hi_name = self.thresholds[hi].1.clone();

        if self.phase_match && lo != hi {
            if let Some(dominant) = self.substates.get_mut(if t < 0.5 { &lo_name } else { &hi_name }) {
                let phase = dominant.normalized_time();
                let other_name = if t < 0.5 { &hi_name } else { &lo_name };
                if let Some(other) = self.substates.get_mut(other_name) {
                    other.set_normalized_time(phase);
                }
            }
        }

        for (idx, (_, name)) in self.thresholds.iter().enumerate() {
            let w = if idx == lo && idx == hi {
                1.0
            } else if idx == lo {
                1.0 - t
            } else if idx == hi {
                t
            } else {
                0.0
            };
            if let Some(state) = self.substates.get_mut(name) {
                state.set_internal_weight(budget * w);
            }
        }
    }
}

impl State for Blend1dState {
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
        // Substates are played as a group (see `play`), so the bracket
        // ratio applies to the incoming factor directly rather than to
        // this state's own weight-multiplied `internal_weight`.
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
        self.substates.play_all(transition_ms, easing);
        self.base.play(transition_ms, easing)
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
    use crate::engine::AnimationPlayer;
    use crate::state::single::{BlendMode, SingleState};

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
    fn rejects_duplicate_thresholds() {
        let entries = vec![
            Blend1dEntry { threshold: 0.0, state: Box::new(SingleState::new("a", Box::new(Noop), BlendMode::Override)) },
            Blend1dEntry { threshold: 0.0, state: Box::new(SingleState::new("b", Box::new(Noop), BlendMode::Override)) },
        ];
        assert!(Blend1dState::new("quiet_loud", entries, false).is_err());
    }

    #[test]
    fn interpolates_between_bracket() {
        let entries = vec![
            Blend1dEntry { threshold: 0.0, state: Box::new(SingleState::new("quiet", Box::new(Noop), BlendMode::Override)) },
            Blend1dEntry { threshold: 1.0, state: Box::new(SingleState::new("loud", Box::new(Noop), BlendMode::Override)) },
        ];
        let mut blend = Blend1dState::new("energy", entries, false).unwrap();
        blend.set_parameter(0.25);
        blend.update_internal_weight(1.0);
        assert!((blend.substates.get_mut("quiet").unwrap().internal_weight() - 0.75).abs() < 1e-5);
        assert!((blend.substates.get_mut("loud").unwrap().internal_weight() - 0.25).abs() < 1e-5);
    }
}
