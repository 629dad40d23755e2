// File: crates/storm-hosts/src/state/blend2d.rs
// Description: Two-dimensional blend space (e.g. gaze direction, or
// energy x pitch) triangulated with Delaunay so any parameter point inside
// the hull blends its enclosing triangle's three vertices.

use storm_math::delaunay::{barycentric, barycentric_inside, project_on_segment, triangulate};
use storm_math::{EasingFunction, Vec2};

use crate::deferred::Deferred;
use crate::error::CancelReason;
use crate::error::{HostError, Result};

use super::blend::Substates;
use super::{AbstractStateBase, State, StateOutcome};

pub struct Blend2dEntry {
    pub position: Vec2,
    pub state: Box<dyn State>,
}

/// Blends across a 2D parameter space triangulated from the registered
/// vertex positions. A parameter point inside a triangle blends its three
/// corners by barycentric weight; a point outside the hull (or with only
/// two vertices registered, which can't triangulate) projects onto the
/// nearest edge/segment instead.
#[derive(Debug)]
pub struct Blend2dState {
    base: AbstractStateBase,
    substates: Substates,
    vertices: Vec<(Vec2, String)>,
    triangles: Vec<[usize; 3]>,
    parameter: Vec2,
}

impl Blend2dState {
    pub fn new(name: impl Into<String>, entries: Vec<Blend2dEntry>) -> Result<Self> {
        if entries.len() < 2 {
            return Err(HostError::blend_geometry("blend2d requires at least two vertices"));
        }
        let mut vertices = Vec::new();
        let mut states = Vec::new();
        for entry in entries {
            vertices.push((entry.position, entry.state.name().to_string()));
            states.push(entry.state);
        }
        let points: Vec<Vec2> = vertices.iter().map(|(p, _)| *p).collect();
        let triangles = if points.len() >= 3 {
            triangulate(&points).into_iter().map(|t| t.indices).collect()
        } else {
            Vec::new()
        };
        Ok(Self { base: AbstractStateBase::new(name), substates: Substates::new(states), vertices, triangles, parameter: Vec2::ZERO })
    }

    pub fn set_parameter(&mut self, value: Vec2) {
        self.parameter = value;
    }

    /// Resolves the current parameter into `(index, weight)` pairs
    /// summing to `1`.
    fn weights(&self) -> Vec<(usize, f32)> {
        let p = self.parameter;

        if self.vertices.len() == 2 {
            let t = project_on_segment(p, self.vertices[0].0, self.vertices[1].0);
            return vec![(0, 1.0 - t), (1, t)];
        }

        for tri in &self.triangles {
            let a = self.vertices[tri[0]].0;
            let b = self.vertices[tri[1]].0;
            let c = self.vertices[tri[2]].0;
            let w = barycentric(p, a, b, c);
            if barycentric_inside(w) {
                return vec![(tri[0], w.0), (tri[1], w.1), (tri[2], w.2)];
            }
        }

        // Outside the hull: project onto every hull edge and take the
        // closest, so gaze/energy parameters that briefly overshoot the
        // configured range still produce a sane blend instead of snapping
        // to a single vertex.
        let mut best: Option<(usize, usize, f32, f32)> = None;
        for tri in &self.triangles {
            for &(i, j) in &[(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])] {
                let a = self.vertices[i].0;
                let b = self.vertices[j].0;
                let t = project_on_segment(p, a, b);
                let point = a + (b - a) * t;
                let dist = (point - p).length_squared();
                if best.map_or(true, |(_, _, _, best_dist)| dist < best_dist) {
                    best = Some((i, j, t, dist));
                }
            }
        }
        match best {
            Some((i, j, t, _)) => vec![(i, 1.0 - t), (j, t)],
            None => vec![(0, 1.0)],
        }
    }

    /// Fans `budget` out to the enclosing triangle's (or segment's)
    /// vertices by barycentric weight, assigned as each substate's
    /// internal weight directly - these substates are played as a group
    /// (see `play`) and never carry an individually-tweened weight of
    /// their own.
    fn distribute(&mut self, budget: f32) {
        let weights = self.weights();
        for (name, _) in &self.vertices {
            if let Some(state) = self.substates.get_mut(name) {
                state.set_internal_weight(0.0);
            }
        }
        for (idx, w) in weights {
            let name = self.vertices[idx].1.clone();
            if let Some(state) = self.substates.get_mut(&name) {
                state.set_internal_weight(budget * w);
            }
        }
    }
}

impl State for Blend2dState {
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
        // Substates are played as a group (see `play`), so the barycentric
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

    fn corner(name: &str, x: f32, y: f32) -> Blend2dEntry {
        Blend2dEntry { position: Vec2::new(x, y), state: Box::new(SingleState::new(name, Box::new(Noop), BlendMode::Override)) }
    }

    #[test]
    fn two_vertex_falls_back_to_segment_projection() {
        let entries = vec![corner("left", -1.0, 0.0), corner("right", 1.0, 0.0)];
        let mut blend = Blend2dState::new("gaze_x", entries).unwrap();
        blend.set_parameter(Vec2::new(0.0, 0.0));
        blend.update_internal_weight(1.0);
        assert!((blend.substates.get_mut("left").unwrap().internal_weight() - 0.5).abs() < 1e-4);
        assert!((blend.substates.get_mut("right").unwrap().internal_weight() - 0.5).abs() < 1e-4);
    }

    #[test]
    fn center_of_triangle_splits_three_ways() {
        let entries = vec![corner("a", 0.0, 1.0), corner("b", -1.0, -1.0), corner("c", 1.0, -1.0)];
        let mut blend = Blend2dState::new("gaze_plane", entries).unwrap();
        blend.set_parameter(Vec2::new(0.0, -1.0 / 3.0));
        blend.update_internal_weight(1.0);
        let wa = blend.substates.get_mut("a").unwrap().internal_weight();
        let wb = blend.substates.get_mut("b").unwrap().internal_weight();
        let wc = blend.substates.get_mut("c").unwrap().internal_weight();
        assert!((wa - 1.0 / 3.0).abs() < 1e-3);
        assert!((wb - 1.0 / 3.0).abs() < 1e-3);
        assert!((wc - 1.0 / 3.0).abs() < 1e-3);
    }
}
