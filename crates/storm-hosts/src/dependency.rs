// File: crates/storm-hosts/src/dependency.rs
// Description: Tracks whether a layer a dependent feature cares about is
// currently installed on its collaborator AnimationFeature, without that
// feature holding a reference to the AnimationFeature itself - it only
// ever sees the AnimationEvent stream fanned out by HostObject::update.

use crate::event::AnimationEvent;

/// Lifecycle of a layer a dependent feature has declared interest in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerPresence {
    /// Declared by the dependent feature but never observed on the bus -
    /// either the layer hasn't been added yet, or the feature was
    /// installed after the `AddLayer` event already fired.
    Declared,
    Present,
    Absent,
}

/// One layer a dependent feature (gesture, point-of-interest) needs to
/// exist on its collaborator `AnimationFeature` before it can act -
/// playing a gesture on a layer that was since removed should fail
/// cleanly instead of silently no-op'ing.
#[derive(Debug, Clone)]
pub struct ManagedAnimationLayer {
    layer_name: String,
    presence: LayerPresence,
}

impl ManagedAnimationLayer {
    pub fn new(layer_name: impl Into<String>) -> Self {
        Self { layer_name: layer_name.into(), presence: LayerPresence::Declared }
    }

    pub fn layer_name(&self) -> &str {
        &self.layer_name
    }

    pub fn presence(&self) -> LayerPresence {
        self.presence
    }

    pub fn is_active(&self) -> bool {
        matches!(self.presence, LayerPresence::Present)
    }

    /// Updates presence from one fanned-out `AnimationEvent`. Call for
    /// every event a dependent feature receives via `on_animation_event`.
    pub fn observe(&mut self, event: &AnimationEvent) {
        match event {
            AnimationEvent::AddLayer { name, .. } if name == &self.layer_name => {
                self.presence = LayerPresence::Present;
            }
            AnimationEvent::RemoveLayer { name, .. } if name == &self.layer_name => {
                self.presence = LayerPresence::Absent;
            }
            _ => {}
        }
    }
}

/// A dependent feature's full set of managed layers, keyed by a role name
/// (e.g. `"gaze"`, `"blink"`) distinct from the underlying layer's own
/// name so a feature can rename which layer backs a role without
/// reshuffling its own configuration keys.
#[derive(Debug, Default, Clone)]
pub struct ManagedAnimationLayers {
    layers: Vec<(String, ManagedAnimationLayer)>,
}

impl ManagedAnimationLayers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(&mut self, role: impl Into<String>, layer_name: impl Into<String>) {
        self.layers.push((role.into(), ManagedAnimationLayer::new(layer_name)));
    }

    pub fn get(&self, role: &str) -> Option<&ManagedAnimationLayer> {
        self.layers.iter().find(|(r, _)| r == role).map(|(_, l)| l)
    }

    pub fn is_active(&self, role: &str) -> bool {
        self.get(role).map_or(false, |l| l.is_active())
    }

    pub fn observe(&mut self, event: &AnimationEvent) {
        for (_, layer) in self.layers.iter_mut() {
            layer.observe(event);
        }
    }
}
