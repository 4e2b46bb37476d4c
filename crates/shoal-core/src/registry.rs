// Named connection profiles.
//
// The registry is a pure in-memory lookup table populated once at
// process configuration time and owned by the process entry point —
// there is no global singleton and no hot reload. Profiles are never
// mutated after registration.

use indexmap::IndexMap;
use secrecy::SecretString;

use crate::error::CoreError;

/// How to reach one cluster: host, credentials, TLS policy.
#[derive(Debug, Clone)]
pub struct ConnectionProfile {
    pub name: String,
    pub hostname: String,
    pub username: String,
    pub password: SecretString,
    pub validate_certs: bool,
    pub max_concurrent_requests: usize,
}

impl ConnectionProfile {
    pub fn new(
        name: impl Into<String>,
        hostname: impl Into<String>,
        username: impl Into<String>,
        password: SecretString,
    ) -> Self {
        Self {
            name: name.into(),
            hostname: hostname.into(),
            username: username.into(),
            password,
            validate_certs: true,
            max_concurrent_requests: 6,
        }
    }

    pub fn validate_certs(mut self, validate: bool) -> Self {
        self.validate_certs = validate;
        self
    }

    pub fn max_concurrent_requests(mut self, max: usize) -> Self {
        self.max_concurrent_requests = max;
        self
    }
}

/// Lookup table of named connection profiles.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    profiles: IndexMap<String, ConnectionProfile>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a profile; re-registration under the same name is
    /// rejected, not merged.
    pub fn register(&mut self, profile: ConnectionProfile) -> Result<(), CoreError> {
        if self.profiles.contains_key(&profile.name) {
            return Err(CoreError::DuplicateProfile {
                name: profile.name.clone(),
            });
        }
        self.profiles.insert(profile.name.clone(), profile);
        Ok(())
    }

    /// Look up a profile by name.
    ///
    /// An empty name resolves to the sole profile when exactly one is
    /// registered; with several registered, a name is required.
    pub fn lookup(&self, name: &str) -> Result<&ConnectionProfile, CoreError> {
        if self.profiles.is_empty() {
            return Err(CoreError::NoProfiles);
        }
        if name.is_empty() {
            if self.profiles.len() == 1 {
                return Ok(&self.profiles[0]);
            }
            return Err(CoreError::ProfileNameRequired);
        }
        self.profiles
            .get(name)
            .ok_or_else(|| CoreError::ProfileNotFound {
                name: name.to_owned(),
            })
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(name: &str) -> ConnectionProfile {
        ConnectionProfile::new(name, format!("{name}.example.com"), "admin", SecretString::from("pw"))
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = ConnectionRegistry::new();
        registry.register(profile("cluster4")).unwrap();
        let err = registry.register(profile("cluster4")).unwrap_err();
        assert!(matches!(err, CoreError::DuplicateProfile { .. }));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unknown_profile_is_not_found() {
        let mut registry = ConnectionRegistry::new();
        registry.register(profile("cluster4")).unwrap();
        assert!(matches!(
            registry.lookup("cluster5").unwrap_err(),
            CoreError::ProfileNotFound { .. }
        ));
    }

    #[test]
    fn empty_name_resolves_to_sole_profile() {
        let mut registry = ConnectionRegistry::new();
        registry.register(profile("cluster4")).unwrap();
        assert_eq!(registry.lookup("").unwrap().name, "cluster4");

        registry.register(profile("cluster5")).unwrap();
        assert!(matches!(
            registry.lookup("").unwrap_err(),
            CoreError::ProfileNameRequired
        ));
    }

    #[test]
    fn empty_registry_errors() {
        let registry = ConnectionRegistry::new();
        assert!(matches!(
            registry.lookup("any").unwrap_err(),
            CoreError::NoProfiles
        ));
    }
}
