// File: crates/storm-hosts/src/config.rs
// Description: Deserializable mirrors of the character-assembly config
// surface - layer/gesture/point-of-interest setup a collaborator loads
// from RON/JSON/TOML and turns into `add_layer`/`add_animation`/
// `add_look` calls. Parsing itself (picking a format, resolving clip
// names to engine handles) is character assembly's job, out of scope here.

use serde::{Deserialize, Serialize};

use crate::layer::LayerBlendMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConfigBlendMode {
    Override,
    Additive,
}

impl From<ConfigBlendMode> for LayerBlendMode {
    fn from(mode: ConfigBlendMode) -> Self {
        match mode {
            ConfigBlendMode::Override => LayerBlendMode::Override,
            ConfigBlendMode::Additive => LayerBlendMode::Additive,
        }
    }
}

/// One layer of a character's animation feature: the clip group backing
/// it and how it composites onto the stack.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerConfig {
    pub name: String,
    pub clip_group: String,
    pub blend_mode: ConfigBlendMode,
    #[serde(default)]
    pub default_transition_ms: f32,
}

/// One `{clip, from, to}` entry of a queue - `from`/`to` are loop-count
/// bounds on the member built from `clip` (`to: null` means infinite).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueMemberConfig {
    pub clip: String,
    pub from: u32,
    pub to: Option<u32>,
}

/// One gesture: the layer it plays on and the queue of clips it steps
/// through when triggered.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GestureConfig {
    pub layer_name: String,
    pub animation_name: String,
    pub queue_options: Vec<QueueMemberConfig>,
    #[serde(default)]
    pub hold_ms: Option<f32>,
    #[serde(default)]
    pub minimum_interval_ms: Option<f32>,
}

/// One blend-space vertex: the clip backing it and its threshold(s) -
/// a single value for a 1D blend, `[h, v]` for a 2D one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlendStateOptionConfig {
    pub clip: String,
    pub thresholds: Vec<f32>,
}

/// One tracked gaze layer: the animation it drives, the blend-space
/// vertices backing it, and the name of the scene-graph node to aim.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointOfInterestConfig {
    pub layer_name: String,
    pub animation: String,
    pub blend_state_options: Vec<BlendStateOptionConfig>,
    pub reference: String,
    #[serde(default)]
    pub has_saccade: bool,
    #[serde(default)]
    pub left_handed: bool,
}

/// A full character's config surface, as a collaborator would load it in
/// one pass before calling into `AnimationFeature`/`GestureFeature`/
/// `PointOfInterestFeature`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostConfig {
    #[serde(default)]
    pub layers: Vec<LayerConfig>,
    #[serde(default)]
    pub gestures: Vec<GestureConfig>,
    #[serde(default)]
    pub points_of_interest: Vec<PointOfInterestConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_minimal_host_config_from_json() {
        let json = r#"{
            "layers": [
                {"name": "base", "clipGroup": "locomotion", "blendMode": "override"}
            ],
            "gestures": [
                {
                    "layerName": "base",
                    "animationName": "wave",
                    "queueOptions": [{"clip": "wave_in", "from": 0, "to": 1}]
                }
            ],
            "pointsOfInterest": [
                {
                    "layerName": "Look",
                    "animation": "gaze",
                    "blendStateOptions": [
                        {"clip": "look_left", "thresholds": [-1.0]},
                        {"clip": "look_right", "thresholds": [1.0]}
                    ],
                    "reference": "head_bone"
                }
            ]
        }"#;
        let config: HostConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.layers.len(), 1);
        assert_eq!(config.layers[0].blend_mode, ConfigBlendMode::Override);
        assert_eq!(config.gestures[0].queue_options[0].clip, "wave_in");
        assert_eq!(config.points_of_interest[0].blend_state_options.len(), 2);
    }
}
