// Cluster version probe.
//
// Management API fields are added across releases without a
// discoverable capability list, so version thresholds are the only
// gating mechanism available. The version triple is fetched once per
// client and treated as immutable for the client's lifetime: there is
// no mid-session upgrade handling.

use serde::Deserialize;
use tracing::debug;

use crate::client::{Query, RestClient};
use crate::error::Error;

/// Cluster software version triple, e.g. generation 9, major 11, minor 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ClusterVersion {
    pub generation: u32,
    pub major: u32,
    pub minor: u32,
}

impl ClusterVersion {
    /// Lexicographic comparison on (generation, major).
    ///
    /// Minor is informational only; no gate in this system keys on it.
    pub fn at_least(&self, generation: u32, major: u32) -> bool {
        (self.generation, self.major) >= (generation, major)
    }
}

impl std::fmt::Display for ClusterVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.generation, self.major, self.minor)
    }
}

#[derive(Deserialize)]
struct ClusterInfo {
    version: ClusterVersion,
}

impl RestClient {
    /// Fetch the cluster version, caching it for the client's lifetime.
    ///
    /// Safe under concurrent first access: the underlying cell admits a
    /// single initializer and failures leave it empty for a clean retry.
    pub async fn version(&self) -> Result<ClusterVersion, Error> {
        let version = self
            .version_cache
            .get_or_try_init(|| async {
                let mut query = Query::new();
                query.fields(&["version"]);
                let record = self.get_object("cluster", &query).await?;

                let info: ClusterInfo =
                    serde_json::from_value(serde_json::Value::Object(record)).map_err(|e| {
                        Error::Deserialization {
                            message: format!("cluster version: {e}"),
                            body: String::new(),
                        }
                    })?;
                debug!(version = %info.version, "probed cluster version");
                Ok::<_, Error>(info.version)
            })
            .await?;
        Ok(*version)
    }
}
