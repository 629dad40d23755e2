// File: crates/storm-math/src/spring.rs
// Critically-damped spring smoothing, used to animate gaze/saccade angles
// without overshoot. Port of the standard "smooth damp" formulation.

/// 1D damper state: current value and its velocity.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DampState {
    pub value: f32,
    pub velocity: f32,
}

impl DampState {
    pub fn new(value: f32) -> Self {
        Self { value, velocity: 0.0 }
    }
}

/// Advances `state` toward `target` over `dt` seconds using a
/// critically-damped spring with characteristic time `smooth_time`
/// (approximate time to reach the target) and a hard cap `max_speed` on
/// the rate of approach. Returns the new state; also mutates in place.
///
/// `smooth_time` and `dt` must be positive; `smooth_time` is floored to a
/// small epsilon to avoid division by zero for degenerate configs.
pub fn damp_value(
    state: &mut DampState,
    target: f32,
    dt: f32,
    smooth_time: f32,
    max_speed: f32,
) -> f32 {
    let smooth_time = smooth_time.max(1e-4);
    let d1 = 2.0 / smooth_time;
    let d2 = d1 * dt;
    let d3 = 1.0 / (1.0 + d2 + 0.48 * d2 * d2 + 0.235 * d2 * d2 * d2);

    let max_delta = max_speed * smooth_time;
    let mut delta = state.value - target;
    delta = delta.clamp(-max_delta, max_delta);
    let clamped_target = state.value - delta;

    let d4 = (state.velocity + d1 * delta) * dt;
    let mut new_value = clamped_target + (delta + d4) * d3;
    let mut new_velocity = (state.velocity - d1 * d4) * d3;

    // Prevent overshoot: if we started above target we must not end below it.
    if (target - state.value > 0.0) == (new_value > target) {
        new_value = target;
        new_velocity = (new_value - target) / dt.max(1e-6);
    }

    state.value = new_value;
    state.velocity = new_velocity;
    state.value
}
