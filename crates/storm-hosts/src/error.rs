// File: crates/storm-hosts/src/error.rs
// Description: Error taxonomy for the host animation composition core
// One variant per failure kind named in the design, not per call site

use thiserror::Error;

/// Failure kinds raised by the animation composition core.
///
/// `ArgumentKind`/`NotFoundKind`/`BlendGeometryKind` are thrown from
/// synchronous APIs (`Result::Err`); the same variants also show up as the
/// resolution value of a rejected [`crate::deferred::Deferred`] when the
/// failing call is itself async (`play`/`resume`).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HostError {
    /// Invalid constructor input: wrong-shape options, an empty `all()`
    /// composite, a duplicate name where uniqueness is required at
    /// construction time.
    #[error("invalid argument: {0}")]
    Argument(String),

    /// Unknown layer, animation, or state name.
    #[error("not found: {0}")]
    NotFound(String),

    /// Operation attempted on a discarded feature/state, or on a
    /// [`crate::deferred::Deferred`] that is no longer pending.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Duplicate thresholds, or a threshold/sub-state count mismatch, on
    /// a blend-space state.
    #[error("invalid blend geometry: {0}")]
    BlendGeometry(String),

    /// A feature depends on a collaborator feature that isn't installed.
    #[error("missing dependency: {0}")]
    Dependency(String),

    /// Failure surfaced by the external 3D engine or speech service.
    #[error("engine error: {0}")]
    Engine(String),
}

pub type Result<T> = std::result::Result<T, HostError>;

impl HostError {
    pub fn not_found(what: impl Into<String>) -> Self {
        HostError::NotFound(what.into())
    }

    pub fn argument(what: impl Into<String>) -> Self {
        HostError::Argument(what.into())
    }

    pub fn invalid_state(what: impl Into<String>) -> Self {
        HostError::InvalidState(what.into())
    }

    pub fn blend_geometry(what: impl Into<String>) -> Self {
        HostError::BlendGeometry(what.into())
    }

    pub fn dependency(what: impl Into<String>) -> Self {
        HostError::Dependency(what.into())
    }
}

/// Structured reason carried by a cancelled play/resume attempt that was
/// skipped rather than failed outright (e.g. a gesture gated by its
/// minimum interval). Logged at `warn` by the caller before being handed
/// back as a cancellation value.
#[derive(Debug, Clone, PartialEq)]
pub struct CancelReason {
    pub reason: &'static str,
    pub value: Option<f32>,
}

impl CancelReason {
    pub fn new(reason: &'static str) -> Self {
        Self { reason, value: None }
    }

    pub fn with_value(reason: &'static str, value: f32) -> Self {
        Self { reason, value: Some(value) }
    }
}
