//! Async REST client for ONTAP-compatible cluster management APIs.
//!
//! Record envelopes, async job waiting, typed error translation, and
//! the cluster version probe. Higher-level reconciliation lives in
//! `shoal-core`.

pub mod client;
pub mod error;
pub mod transport;
pub mod version;

pub use client::{ClientOptions, Query, RestClient};
pub use error::Error;
pub use transport::{TlsMode, TransportConfig};
pub use version::ClusterVersion;
