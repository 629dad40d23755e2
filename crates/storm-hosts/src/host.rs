// File: crates/storm-hosts/src/host.rs
// Description: Owns the feature set for one animated character and runs
// the per-tick update/dispatch loop that wires features together without
// hard inheritance.

use indexmap::IndexMap;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::deferred::Deferred;
use crate::error::{HostError, Result};
use crate::event::{AnimationEvent, HostEvent};
use crate::feature::AnimationFeature;
use crate::gesture::GestureFeature;
use crate::messenger::Messenger;
use crate::point_of_interest::PointOfInterestFeature;
use crate::state::{Blend1dState, Blend2dState};

/// Behavior every feature kind shares. A host never reaches into a
/// feature's concrete type directly - it only ever calls through this
/// trait (or matches on [`HostFeature`] for the one dispatch the core
/// needs: draining `AnimationEvent`s to fan out to everyone else).
pub trait Feature: std::fmt::Debug {
    fn type_tag(&self) -> &str;

    fn update(&mut self, delta_ms: f32);

    /// Reacts to an event produced by another feature on the same host
    /// this tick. Default no-op - most feature pairs don't depend on each
    /// other.
    fn on_animation_event(&mut self, _event: &AnimationEvent) {}

    /// Releases any engine-side resources before the feature is dropped.
    fn discard(&mut self) {}
}

/// A closed sum of the feature kinds this crate ships, rather than a
/// generic `Box<dyn Feature>` registry - see the design note on avoiding
/// `Rc<RefCell<dyn Any>>` mixin wiring. Each variant still goes through
/// the [`Feature`] trait via [`HostFeature`]'s own impl, so `HostObject`'s
/// loop stays generic.
#[derive(Debug)]
pub enum HostFeature {
    Animation(AnimationFeature),
    Gesture(GestureFeature),
    PointOfInterest(PointOfInterestFeature),
}

impl HostFeature {
    /// Drains events produced by the wrapped feature this tick, if it's
    /// an [`AnimationFeature`] - the only producer of [`AnimationEvent`]s.
    fn take_animation_events(&mut self) -> Vec<AnimationEvent> {
        match self {
            HostFeature::Animation(f) => f.take_events(),
            _ => Vec::new(),
        }
    }

    pub fn as_animation(&self) -> Option<&AnimationFeature> {
        match self {
            HostFeature::Animation(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_animation_mut(&mut self) -> Option<&mut AnimationFeature> {
        match self {
            HostFeature::Animation(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_gesture_mut(&mut self) -> Option<&mut GestureFeature> {
        match self {
            HostFeature::Gesture(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_point_of_interest_mut(&mut self) -> Option<&mut PointOfInterestFeature> {
        match self {
            HostFeature::PointOfInterest(f) => Some(f),
            _ => None,
        }
    }
}

impl Feature for HostFeature {
    fn type_tag(&self) -> &str {
        match self {
            HostFeature::Animation(f) => f.type_tag(),
            HostFeature::Gesture(f) => f.type_tag(),
            HostFeature::PointOfInterest(f) => f.type_tag(),
        }
    }

    fn update(&mut self, delta_ms: f32) {
        match self {
            HostFeature::Animation(f) => f.update(delta_ms),
            HostFeature::Gesture(f) => f.update(delta_ms),
            HostFeature::PointOfInterest(f) => f.update(delta_ms),
        }
    }

    fn on_animation_event(&mut self, event: &AnimationEvent) {
        match self {
            HostFeature::Animation(_) => {}
            HostFeature::Gesture(f) => f.on_animation_event(event),
            HostFeature::PointOfInterest(f) => f.on_animation_event(event),
        }
    }

    fn discard(&mut self) {
        match self {
            HostFeature::Animation(_) => {}
            HostFeature::Gesture(_) => {}
            HostFeature::PointOfInterest(_) => {}
        }
    }
}

/// One animated character: an id, an ordered feature set, and a set of
/// waits that must settle before features advance this tick.
#[derive(Debug)]
pub struct HostObject {
    id: Uuid,
    features: IndexMap<String, HostFeature>,
    waits: Vec<Deferred<()>>,
    bus: Messenger<HostEvent>,
}

impl Default for HostObject {
    fn default() -> Self {
        Self::new()
    }
}

impl HostObject {
    pub fn new() -> Self {
        Self { id: Uuid::new_v4(), features: IndexMap::new(), waits: Vec::new(), bus: Messenger::new() }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn bus_mut(&mut self) -> &mut Messenger<HostEvent> {
        &mut self.bus
    }

    pub fn feature(&self, name: &str) -> Option<&HostFeature> {
        self.features.get(name)
    }

    pub fn feature_mut(&mut self, name: &str) -> Option<&mut HostFeature> {
        self.features.get_mut(name)
    }

    pub fn has_feature(&self, name: &str) -> bool {
        self.features.contains_key(name)
    }

    pub fn feature_names(&self) -> Vec<String> {
        self.features.keys().cloned().collect()
    }

    /// Installs `feature` under `name`. Features update in insertion
    /// order every tick, so a feature that must observe another's events
    /// this tick only needs to be added after it - though since animation
    /// event fan-out happens as its own pass after every feature's
    /// `update`, install order does not otherwise affect correctness.
    pub fn add_feature(&mut self, name: impl Into<String>, feature: HostFeature) -> Result<()> {
        let name = name.into();
        if self.features.contains_key(&name) {
            return Err(HostError::argument(format!("feature '{name}' already exists on this host")));
        }
        debug!(host = %self.id, feature = %name, "addFeature");
        self.features.insert(name.clone(), feature);
        let event = HostEvent::AddFeature { name };
        self.bus.emit(event.kind_topic(), &event);
        Ok(())
    }

    pub fn remove_feature(&mut self, name: &str) -> Result<HostFeature> {
        let mut feature = self
            .features
            .shift_remove(name)
            .ok_or_else(|| HostError::not_found(format!("feature '{name}'")))?;
        feature.discard();
        let event = HostEvent::RemoveFeature { name: name.to_string() };
        self.bus.emit(event.kind_topic(), &event);
        Ok(feature)
    }

    /// Registers a deferred that must settle before features advance on
    /// the tick it resolves - e.g. a loading gate installed by character
    /// assembly before any animation should play.
    pub fn wait_for(&mut self, deferred: Deferred<()>) {
        self.waits.push(deferred);
    }

    /// Advances waits, then every feature, then fans out whatever
    /// `AnimationEvent`s surfaced this tick to every other feature.
    #[instrument(skip(self), fields(host = %self.id))]
    pub fn update(&mut self, delta_ms: f32) {
        for wait in &self.waits {
            wait.execute(delta_ms);
        }
        self.waits.retain(|w| w.is_pending());

        for feature in self.features.values_mut() {
            feature.update(delta_ms);
        }

        let mut animation_events = Vec::new();
        for feature in self.features.values_mut() {
            animation_events.extend(feature.take_animation_events());
        }
        if !animation_events.is_empty() {
            for feature in self.features.values_mut() {
                for event in &animation_events {
                    feature.on_animation_event(event);
                }
            }
        }

        self.apply_gesture_forced_advances();
        self.apply_point_of_interest_outputs();

        self.bus.emit("update", &HostEvent::Update { delta_ms });
    }

    /// Collects every `GestureFeature`'s forced queue advance (set once its
    /// hold timer elapses) and forwards it to every `AnimationFeature` on
    /// this host - a gesture doesn't know which animation feature backs its
    /// layer, so it's tried against all of them and misses are ignored.
    fn apply_gesture_forced_advances(&mut self) {
        let mut advances = Vec::new();
        let mut disables = Vec::new();
        for feature in self.features.values_mut() {
            if let HostFeature::Gesture(gesture) = feature {
                if let Some(advance) = gesture.take_forced_advance() {
                    advances.push(advance);
                }
                disables.extend(gesture.take_pending_disable());
            }
        }
        if advances.is_empty() && disables.is_empty() {
            return;
        }
        for feature in self.features.values_mut() {
            if let HostFeature::Animation(animation) = feature {
                for (layer_name, animation_name) in &advances {
                    let _ = animation.play_next_animation(layer_name, animation_name);
                }
                for layer_name in &disables {
                    if let Some(layer) = animation.layer_mut(layer_name) {
                        layer.set_user_weight(0.0);
                    }
                }
            }
        }
    }

    /// Pushes every `PointOfInterestFeature`'s current gaze angles onto the
    /// blend1d/blend2d state backing its layer, and fires any blink
    /// triggers it raised this tick - same collaborator-by-name pattern as
    /// the gesture forced-advance pass above.
    fn apply_point_of_interest_outputs(&mut self) {
        let mut angles = Vec::new();
        let mut blinks = Vec::new();
        for feature in self.features.values_mut() {
            if let HostFeature::PointOfInterest(poi) = feature {
                angles.extend(poi.current_angles());
                blinks.extend(poi.take_blink_triggers());
            }
        }
        if angles.is_empty() && blinks.is_empty() {
            return;
        }
        for feature in self.features.values_mut() {
            if let HostFeature::Animation(animation) = feature {
                for (layer_name, gaze) in &angles {
                    if let Some(layer) = animation.layer_mut(layer_name) {
                        if let Some(current_name) = layer.current_animation().map(|s| s.to_string()) {
                            if let Some(state) = layer.get_state_mut(&current_name) {
                                if let Some(blend1d) = state.as_any_mut().downcast_mut::<Blend1dState>() {
                                    blend1d.set_parameter(gaze.horizontal);
                                } else if let Some(blend2d) = state.as_any_mut().downcast_mut::<Blend2dState>() {
                                    blend2d.set_parameter(storm_math::Vec2::new(gaze.horizontal, gaze.vertical));
                                }
                            }
                        }
                    }
                }
                for (layer_name, animation_name) in &blinks {
                    if let Err(err) = animation.play_animation(layer_name, animation_name, None, None) {
                        warn!(layer = %layer_name, animation = %animation_name, %err, "blink trigger failed");
                    }
                }
            }
        }
    }
}

impl HostEvent {
    fn kind_topic(&self) -> &'static str {
        match self {
            HostEvent::Update { .. } => "update",
            HostEvent::AddFeature { .. } => "addFeature",
            HostEvent::RemoveFeature { .. } => "removeFeature",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::LayerBlendMode;

    #[test]
    fn installing_a_duplicate_feature_name_is_an_error() {
        let mut host = HostObject::new();
        host.add_feature("animation", HostFeature::Animation(AnimationFeature::new())).unwrap();
        let err = host.add_feature("animation", HostFeature::Animation(AnimationFeature::new())).unwrap_err();
        assert!(matches!(err, HostError::Argument(_)));
    }

    #[test]
    fn update_runs_every_feature_and_drains_animation_events() {
        let mut host = HostObject::new();
        host.add_feature("animation", HostFeature::Animation(AnimationFeature::new())).unwrap();
        host.add_feature("gesture", HostFeature::Gesture(GestureFeature::new())).unwrap();

        {
            let animation = host.feature_mut("animation").unwrap().as_animation_mut().unwrap();
            animation.add_layer("face", LayerBlendMode::Override);
        }
        // Should not panic: AddLayer is drained and fanned out to the
        // gesture feature, whose on_animation_event is a no-op for it.
        host.update(16.0);
    }

    #[test]
    fn removing_an_unknown_feature_is_not_found() {
        let mut host = HostObject::new();
        let err = host.remove_feature("ghost").unwrap_err();
        assert!(matches!(err, HostError::NotFound(_)));
    }
}
