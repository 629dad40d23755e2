// File: crates/storm-hosts/src/point_of_interest.rs
// Description: Drives gaze layers toward a world-space target, with
// idle/focused micro- and macro-saccade jitter layered on top and damped
// through a critically-damped spring so the blend never snaps or overshoots.

use rand::Rng;
use storm_math::{damp_value, direction_to_gaze_angles, DampState, GazeAngles, Vec3};

use crate::dependency::ManagedAnimationLayer;
use crate::event::AnimationEvent;
use crate::host::Feature;

/// Look angle change in one tick, past which an active blink layer is
/// triggered - a large saccade/retarget reads as "the character just
/// looked somewhere new", which is when a person naturally blinks.
const BLINK_THRESHOLD_DEGREES: f32 = 35.0;

/// Which social-triangle point a macro-saccade is currently biased toward
/// while the feature has a focused target. Idle (no target) macro-saccades
/// don't cycle through these - see [`PointOfInterestFeature`] docs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SaccadeTarget {
    EyeCenter,
    EyeLeft,
    EyeRight,
    Mouth,
}

/// One gaze layer this feature drives. A host installs one per layer that
/// should track the target (e.g. `"Look"` for the eyes, `"Head"` for head
/// aim) - each gets its own saccade schedule and damped spring so a shared
/// target doesn't make every layer jitter in lockstep.
#[derive(Debug)]
struct LookConfig {
    managed: ManagedAnimationLayer,
    has_saccade: bool,
    left_handed: bool,
    h_damp: DampState,
    v_damp: DampState,
    micro_saccade_timer: f32,
    macro_saccade_timer: f32,
    micro_saccade: (f32, f32),
    macro_saccade: (f32, f32),
    saccade_target: SaccadeTarget,
    max_h_speed: f32,
    max_v_speed: f32,
    h_duration: f32,
    v_duration: f32,
    current_angles: GazeAngles,
}

impl LookConfig {
    fn new(layer_name: impl Into<String>, has_saccade: bool, left_handed: bool) -> Self {
        Self {
            managed: ManagedAnimationLayer::new(layer_name),
            has_saccade,
            left_handed,
            h_damp: DampState::new(0.0),
            v_damp: DampState::new(0.0),
            // Timers start at zero so the first update immediately rolls a
            // schedule rather than waiting out a full idle interval first.
            micro_saccade_timer: 0.0,
            macro_saccade_timer: 0.0,
            micro_saccade: (0.0, 0.0),
            macro_saccade: (0.0, 0.0),
            saccade_target: SaccadeTarget::EyeCenter,
            max_h_speed: 0.0,
            max_v_speed: 0.0,
            h_duration: 0.2,
            v_duration: 0.2,
            current_angles: GazeAngles::default(),
        }
    }

    fn roll_micro_saccade(&mut self, focused: bool) {
        let mut rng = rand::thread_rng();
        let range = if focused { 0.01..=0.15 } else { 0.01..=0.30 };
        let h = rng.gen_range(range.clone()) * sign(&mut rng);
        let v = rng.gen_range(range) * sign(&mut rng);
        self.micro_saccade = (h, v);
        self.micro_saccade_timer = rng.gen_range(0.8..=1.75);
    }

    /// Picks a new macro-saccade amplitude and, if focused, cycles the
    /// social-triangle target it's biased toward (eye center -> one eye ->
    /// the other eye or the mouth -> back to an eye, the "triangle" a
    /// listener's gaze naturally traces across a speaker's face).
    fn roll_macro_saccade(&mut self, focused: bool) {
        let mut rng = rand::thread_rng();
        let h: f32 = rng.gen_range(-35.0..=35.0);
        let v: f32 = rng.gen_range(-30.0..=25.0);
        self.macro_saccade = (h, v);

        if focused {
            self.saccade_target = match self.saccade_target {
                SaccadeTarget::EyeCenter => {
                    if rng.gen_bool(0.5) {
                        SaccadeTarget::EyeLeft
                    } else {
                        SaccadeTarget::EyeRight
                    }
                }
                SaccadeTarget::EyeLeft => {
                    if rng.gen_bool(0.75) {
                        SaccadeTarget::EyeRight
                    } else {
                        SaccadeTarget::Mouth
                    }
                }
                SaccadeTarget::EyeRight => {
                    if rng.gen_bool(0.75) {
                        SaccadeTarget::EyeLeft
                    } else {
                        SaccadeTarget::Mouth
                    }
                }
                SaccadeTarget::Mouth => {
                    if rng.gen_bool(0.5) {
                        SaccadeTarget::EyeLeft
                    } else {
                        SaccadeTarget::EyeRight
                    }
                }
            };
            self.macro_saccade_timer = match self.saccade_target {
                SaccadeTarget::Mouth => rng.gen_range(0.2..=0.75),
                _ => rng.gen_range(1.5..=4.0),
            };
        } else {
            self.saccade_target = SaccadeTarget::EyeCenter;
            self.macro_saccade_timer = rng.gen_range(5.0..=8.0);
        }

        // A fresh macro-saccade forces the next micro-saccade sooner, so
        // the small jitter doesn't keep running on a stale schedule from
        // before the eyes moved to a new point in the triangle.
        self.micro_saccade_timer = self.micro_saccade_timer.min(rng.gen_range(0.6..=1.3125));

        self.max_h_speed = 473.0 * (1.0 - (-h.abs() / 7.8).exp());
        self.max_v_speed = 473.0 * (1.0 - (-v.abs() / 7.8).exp());
        self.h_duration = 0.025 + 0.00235 * h.abs();
        self.v_duration = 0.025 + 0.00235 * v.abs();
    }

    fn tick_saccade(&mut self, delta_seconds: f32, focused: bool) {
        if !self.has_saccade {
            return;
        }
        self.micro_saccade_timer -= delta_seconds;
        if self.micro_saccade_timer <= 0.0 {
            self.roll_micro_saccade(focused);
        }
        self.macro_saccade_timer -= delta_seconds;
        if self.macro_saccade_timer <= 0.0 {
            self.roll_macro_saccade(focused);
        }
    }

    /// Blends `base_angles` (the raw target-relative angles, zeroed when
    /// there's no target) with this layer's saccade jitter and damps the
    /// result toward the current angles over `delta_seconds`. A layer with
    /// saccade disabled tracks `base_angles` rigidly instead - there's no
    /// jitter offset or speed cap to damp against.
    fn step(&mut self, base_angles: GazeAngles, delta_seconds: f32) -> GazeAngles {
        if !self.has_saccade {
            self.h_damp = DampState::new(base_angles.horizontal);
            self.v_damp = DampState::new(base_angles.vertical);
            self.current_angles = base_angles;
            return self.current_angles;
        }

        // The doubled macro-saccade term mirrors a quirk in the upstream
        // gaze model's damp target computation; preserved rather than
        // "corrected" since nothing confirms it's unintentional.
        let target_h = base_angles.horizontal + self.micro_saccade.0 + self.macro_saccade.0 * 2.0;
        let target_v = base_angles.vertical + self.micro_saccade.1 + self.macro_saccade.1 * 2.0;

        let h = damp_value(&mut self.h_damp, target_h, delta_seconds, self.h_duration.max(1e-3), self.max_h_speed.max(1.0));
        let v = damp_value(&mut self.v_damp, target_v, delta_seconds, self.v_duration.max(1e-3), self.max_v_speed.max(1.0));
        self.current_angles = GazeAngles { horizontal: h, vertical: v };
        self.current_angles
    }
}

fn sign(rng: &mut impl Rng) -> f32 {
    if rng.gen_bool(0.5) {
        1.0
    } else {
        -1.0
    }
}

/// Tracks a single world-space point of interest and drives every
/// registered gaze layer's blend angles toward it, layering idle/focused
/// saccade jitter on top. Produces no `AnimationEvent`s of its own;
/// `HostObject::update` reads [`current_angles`](Self::current_angles)
/// every tick to push angles onto the layer's blend state, and drains
/// [`take_blink_triggers`](Self::take_blink_triggers) to fire blink
/// animations the same way it drains `GestureFeature`'s forced advances.
#[derive(Debug)]
pub struct PointOfInterestFeature {
    type_tag: &'static str,
    target: Option<Vec3>,
    prev_target: Option<Vec3>,
    is_target_moving: bool,
    looks: Vec<LookConfig>,
    blink_layers: Vec<(String, String)>,
    blink_triggers: Vec<(String, String)>,
}

impl Default for PointOfInterestFeature {
    fn default() -> Self {
        Self::new()
    }
}

impl PointOfInterestFeature {
    pub fn new() -> Self {
        Self::with_type_tag("PointOfInterestFeature")
    }

    pub fn with_type_tag(type_tag: &'static str) -> Self {
        Self {
            type_tag,
            target: None,
            prev_target: None,
            is_target_moving: false,
            looks: Vec::new(),
            blink_layers: Vec::new(),
            blink_triggers: Vec::new(),
        }
    }

    /// Registers a layer this feature should drive toward the current
    /// target. `has_saccade` enables the idle/focused jitter schedule;
    /// layers that should track the target rigidly (e.g. a head-aim bone)
    /// can leave it off.
    pub fn add_look(&mut self, layer_name: impl Into<String>, has_saccade: bool, left_handed: bool) {
        self.looks.push(LookConfig::new(layer_name, has_saccade, left_handed));
    }

    /// Registers a blink layer/animation pair to trigger whenever the
    /// target is moving and any look's angle jumps past
    /// [`BLINK_THRESHOLD_DEGREES`] in one tick.
    pub fn add_blink_layer(&mut self, layer_name: impl Into<String>, animation_name: impl Into<String>) {
        self.blink_layers.push((layer_name.into(), animation_name.into()));
    }

    /// Sets the world-space point of interest in character-local space, or
    /// `None` to let every look return to center. Whether the target is
    /// considered "moving" is computed per tick in `update`, not here -
    /// a caller that sets the target once and then updates many times
    /// should see the flag reflect the last tick's actual change, not
    /// latch true forever off this one call.
    pub fn set_target(&mut self, target: Option<Vec3>) {
        self.target = target;
    }

    /// Non-destructive: the current `{layer_name, angles}` for every
    /// registered look, read every tick rather than drained once.
    pub fn current_angles(&self) -> Vec<(String, GazeAngles)> {
        self.looks.iter().map(|l| (l.managed.layer_name().to_string(), l.current_angles)).collect()
    }

    /// Drains the blink layer/animation pairs to fire this tick.
    pub fn take_blink_triggers(&mut self) -> Vec<(String, String)> {
        std::mem::take(&mut self.blink_triggers)
    }

    fn base_angles(&self, look: &LookConfig) -> GazeAngles {
        match self.target {
            Some(direction) if direction.length_squared() > f32::EPSILON => direction_to_gaze_angles(direction, look.left_handed),
            _ => GazeAngles::default(),
        }
    }

    /// Whether `layer_name`'s managed layer has been observed present on
    /// the collaborator `AnimationFeature` via `AddLayer`/`RemoveLayer`
    /// events fanned out by `HostObject::update`. A host installing this
    /// feature before the layer it tracks exists will see `Declared` until
    /// the corresponding `AddLayer` event is fanned out.
    pub fn is_look_active(&self, layer_name: &str) -> bool {
        self.looks.iter().any(|l| l.managed.layer_name() == layer_name && l.managed.is_active())
    }
}

impl Feature for PointOfInterestFeature {
    fn type_tag(&self) -> &str {
        self.type_tag
    }

    fn update(&mut self, delta_ms: f32) {
        let delta_seconds = delta_ms / 1000.0;
        let focused = self.target.is_some();

        self.is_target_moving = match (self.prev_target, self.target) {
            (Some(prev), Some(next)) => (next - prev).length_squared() > 1e-6,
            (None, Some(_)) | (Some(_), None) => true,
            (None, None) => false,
        };
        self.prev_target = self.target;

        let mut max_jump = 0.0_f32;
        for look in &mut self.looks {
            look.tick_saccade(delta_seconds, focused);
            let base = self.base_angles(look);
            let before = look.current_angles;
            let after = look.step(base, delta_seconds);
            let jump = (after.horizontal - before.horizontal).abs().max((after.vertical - before.vertical).abs());
            max_jump = max_jump.max(jump);
        }

        if self.is_target_moving && max_jump >= BLINK_THRESHOLD_DEGREES {
            for (layer_name, animation_name) in &self.blink_layers {
                self.blink_triggers.push((layer_name.clone(), animation_name.clone()));
            }
        }
    }

    fn on_animation_event(&mut self, event: &AnimationEvent) {
        for look in &mut self.looks {
            look.managed.observe(event);
        }
    }
}
