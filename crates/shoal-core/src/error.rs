// Core error types.
//
// Everything a caller can observe from the reconciliation core. Remote
// typed errors (ReferenceNotFound, Conflict, Validation, ...) pass
// through from `shoal-api` unmodified: the numeric code they carry is
// the stable contract downstream tooling matches on. Core adds the
// profile/operation/natural-key context a caller needs to act.

use thiserror::Error;

use crate::reconciler::ResourceState;

/// Unified error type for the reconciliation core.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection profiles ──────────────────────────────────────────
    #[error("connection profile '{name}' is already registered")]
    DuplicateProfile { name: String },

    #[error("connection profile '{name}' is not defined")]
    ProfileNotFound { name: String },

    #[error("a connection profile name is required when more than one profile is defined")]
    ProfileNameRequired,

    #[error("at least one connection profile is required")]
    NoProfiles,

    #[error("cannot connect to cluster for profile '{profile}': {source}")]
    Connect {
        profile: String,
        #[source]
        source: shoal_api::Error,
    },

    // ── Capability gating ────────────────────────────────────────────
    #[error(
        "field '{field}' requires cluster version {required} but connected cluster is {actual}"
    )]
    Capability {
        field: &'static str,
        required: String,
        actual: String,
    },

    // ── Import ───────────────────────────────────────────────────────
    #[error("unexpected import identifier: expected format \"{expected}\", got {got:?}")]
    ImportFormat { expected: String, got: String },

    // ── Attribute validation ─────────────────────────────────────────
    #[error("invalid value for '{field}': {reason}")]
    InvalidAttribute { field: String, reason: String },

    #[error("missing natural key field '{field}'")]
    MissingNaturalKey { field: &'static str },

    // ── Remote object state ──────────────────────────────────────────
    #[error("{resource_type} not found: {identifier}")]
    NotFound {
        resource_type: &'static str,
        identifier: String,
    },

    #[error("expected at most one {resource_type} match, found {count}")]
    Ambiguous {
        resource_type: &'static str,
        count: usize,
    },

    // ── Lifecycle ────────────────────────────────────────────────────
    #[error("cannot {operation} from state {state:?}")]
    InvalidTransition {
        operation: &'static str,
        state: ResourceState,
    },

    // ── Context wrapper ──────────────────────────────────────────────
    /// Low-level failure enriched with what was being attempted.
    #[error("{operation} {resource_type} '{key}' via profile '{profile}': {source}")]
    Operation {
        operation: &'static str,
        resource_type: &'static str,
        key: String,
        profile: String,
        #[source]
        source: Box<CoreError>,
    },

    // ── API passthrough ──────────────────────────────────────────────
    #[error(transparent)]
    Api(#[from] shoal_api::Error),
}

impl CoreError {
    /// The remote numeric code, when one is available anywhere in the chain.
    pub fn remote_code(&self) -> Option<u64> {
        match self {
            Self::Api(e) | Self::Connect { source: e, .. } => e.remote_code(),
            Self::Operation { source, .. } => source.remote_code(),
            _ => None,
        }
    }

    /// Returns `true` if this error means the remote object is absent.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Api(e) => e.is_not_found(),
            Self::Operation { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}
