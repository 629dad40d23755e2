// File: crates/storm-hosts/src/engine.rs
// Description: Adapter traits decoupling the composition core from any one
// rendering/audio/clock implementation - unit tests drive these with fakes.

use storm_math::Vec3;

/// A source of wall-clock deltas. Production hosts wrap their engine's own
/// frame clock; tests supply a fixed-step fake.
pub trait ClockSource {
    /// Milliseconds elapsed since the previous call.
    fn delta_ms(&mut self) -> f32;
}

/// A single animation clip as the host core sees it: just its duration and
/// whether it's natively loopable. Clip sampling itself stays entirely in
/// the engine.
pub trait AnimationClip {
    fn duration_ms(&self) -> f32;
    fn is_loopable(&self) -> bool;
}

/// Drives one clip against one or more [`TransformNode`]s/meshes. A
/// `SingleState` owns exactly one of these.
pub trait AnimationPlayer: std::fmt::Debug {
    /// Normalized playback position in `[0, 1]`.
    fn normalized_time(&self) -> f32;
    fn set_normalized_time(&mut self, t: f32);

    fn time_scale(&self) -> f32;
    fn set_time_scale(&mut self, scale: f32);

    /// Loop count remaining; `None` means infinite.
    fn loop_count(&self) -> Option<u32>;

    /// Weight in `[0, 1]` applied to this player's contribution to the
    /// final pose, set every tick from the state's `internal_weight`.
    fn set_weight(&mut self, weight: f32);

    /// Advances playback by `delta_ms`, honoring `time_scale`. Returns
    /// `true` the tick this player completed its final loop.
    fn advance(&mut self, delta_ms: f32) -> bool;
}

/// A node in the engine's scene graph/skeleton that gaze and gesture logic
/// can read or drive directly (e.g. a head or eye bone).
pub trait TransformNode {
    fn world_position(&self) -> Vec3;
    fn forward(&self) -> Vec3;

    /// Directs this node toward `world_target`, engine-specific (bone
    /// constraint, IK target, ...).
    fn look_at(&mut self, world_target: Vec3);
}

/// Resolves names used in blend/gesture configuration to engine-side
/// clips and nodes.
pub trait MeshLookup {
    fn find_clip(&self, name: &str) -> Option<Box<dyn AnimationClip>>;
    fn find_node(&self, name: &str) -> Option<Box<dyn TransformNode>>;
}

/// The speech/audio side of the host: something that can report whether
/// audio is currently playing and at what normalized position, driving the
/// features that react to speech progress.
pub trait AudioSink {
    fn is_playing(&self) -> bool;
    fn normalized_time(&self) -> f32;
}
