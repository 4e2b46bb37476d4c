//! Reconciliation core for ONTAP-compatible storage clusters.
//!
//! Takes a desired resource description (a tri-state attribute bag) and
//! drives the cluster's management REST API to the matching state:
//! connection profiles resolve to cached authenticated clients, fields
//! are gated on the connected cluster's version, updates are minimal
//! diffs of desired vs. observed state, and composite natural keys
//! re-identify remote objects across sessions.

pub mod capability;
pub mod diff;
pub mod error;
pub mod factory;
pub mod import;
pub mod reconciler;
pub mod registry;
pub mod schema;
pub mod units;
pub mod value;

pub use error::CoreError;
pub use factory::ClientFactory;
pub use import::CompositeKey;
pub use reconciler::{Reconciler, ResourceState};
pub use registry::{ConnectionProfile, ConnectionRegistry};
pub use schema::{Capability, FieldKind, FieldSpec, ResourceSchema};
pub use value::{AttributeBag, Value};
