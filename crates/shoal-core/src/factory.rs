// Client factory: one cached, authenticated client per profile name.
//
// Concurrent first use of the same profile single-flights onto one
// connection construction; connect failures are not cached, so a later
// call retries cleanly. The factory never mutates the registry.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::OnceCell;
use tracing::debug;

use shoal_api::{ClientOptions, RestClient, TlsMode, TransportConfig};

use crate::error::CoreError;
use crate::registry::{ConnectionProfile, ConnectionRegistry};

/// Resolves profile names to cached authenticated clients.
pub struct ClientFactory {
    registry: ConnectionRegistry,
    options: ClientOptions,
    clients: DashMap<String, Arc<OnceCell<Arc<RestClient>>>>,
}

impl ClientFactory {
    pub fn new(registry: ConnectionRegistry) -> Self {
        Self::with_options(registry, ClientOptions::default())
    }

    pub fn with_options(registry: ConnectionRegistry, options: ClientOptions) -> Self {
        Self {
            registry,
            options,
            clients: DashMap::new(),
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Get the cached client for a profile name, connecting on first use.
    ///
    /// Cache hits return the existing client unchanged — callers must
    /// not assume a fresh connection per call.
    pub async fn get_client(&self, profile_name: &str) -> Result<Arc<RestClient>, CoreError> {
        let profile = self.registry.lookup(profile_name)?;

        // Key by the resolved name so the empty-name shorthand shares
        // the sole profile's cache entry.
        let cell = self
            .clients
            .entry(profile.name.clone())
            .or_default()
            .clone();

        let client = cell
            .get_or_try_init(|| async { Self::connect(profile, &self.options) })
            .await?;
        Ok(Arc::clone(client))
    }

    fn connect(
        profile: &ConnectionProfile,
        options: &ClientOptions,
    ) -> Result<Arc<RestClient>, CoreError> {
        debug!(profile = %profile.name, host = %profile.hostname, "building cluster client");

        let transport = TransportConfig {
            tls: TlsMode::from_validate_certs(profile.validate_certs),
            ..TransportConfig::default()
        };
        let mut options = options.clone();
        options.max_concurrent_requests = profile.max_concurrent_requests;

        let client = RestClient::new(
            &profile.hostname,
            &profile.username,
            profile.password.clone(),
            &transport,
            options,
        )
        .map_err(|source| CoreError::Connect {
            profile: profile.name.clone(),
            source,
        })?;
        Ok(Arc::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn factory_with(names: &[&str]) -> ClientFactory {
        let mut registry = ConnectionRegistry::new();
        for name in names {
            registry
                .register(ConnectionProfile::new(
                    *name,
                    format!("{name}.example.com"),
                    "admin",
                    SecretString::from("pw"),
                ))
                .unwrap();
        }
        ClientFactory::new(registry)
    }

    #[tokio::test]
    async fn same_profile_yields_same_client() {
        let factory = factory_with(&["cluster4"]);
        let a = factory.get_client("cluster4").await.unwrap();
        let b = factory.get_client("cluster4").await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn concurrent_first_use_single_flights() {
        let factory = Arc::new(factory_with(&["cluster4"]));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let factory = Arc::clone(&factory);
            handles.push(tokio::spawn(
                async move { factory.get_client("cluster4").await },
            ));
        }

        let mut clients = Vec::new();
        for handle in handles {
            clients.push(handle.await.unwrap().unwrap());
        }
        for client in &clients[1..] {
            assert!(Arc::ptr_eq(&clients[0], client));
        }
    }

    #[tokio::test]
    async fn distinct_profiles_get_distinct_clients() {
        let factory = factory_with(&["cluster4", "cluster5"]);
        let a = factory.get_client("cluster4").await.unwrap();
        let b = factory.get_client("cluster5").await.unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn connect_failure_is_not_cached() {
        let mut registry = ConnectionRegistry::new();
        // A space makes the hostname unparseable as a URL, so client
        // construction fails before any network activity.
        registry
            .register(ConnectionProfile::new(
                "broken",
                "bad host.example.com",
                "admin",
                SecretString::from("pw"),
            ))
            .unwrap();
        let factory = ClientFactory::new(registry);

        for _ in 0..2 {
            match factory.get_client("broken").await.unwrap_err() {
                CoreError::Connect { profile, .. } => assert_eq!(profile, "broken"),
                other => panic!("expected Connect, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn unknown_profile_propagates_not_found() {
        let factory = factory_with(&["cluster4"]);
        assert!(matches!(
            factory.get_client("nope").await.unwrap_err(),
            CoreError::ProfileNotFound { .. }
        ));
    }
}
