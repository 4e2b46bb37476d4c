//! Connection profile configuration.
//!
//! TOML profiles, credential resolution (env var + plaintext), and
//! translation to `shoal_core::ConnectionRegistry`. Consumed once at
//! startup; there is no hot reload.

use std::collections::HashMap;
use std::path::PathBuf;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shoal_core::{ConnectionProfile, ConnectionRegistry, CoreError};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("invalid profile set: {0}")]
    Profiles(#[from] CoreError),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    /// Named cluster connection profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

/// A named cluster connection profile.
#[derive(Debug, Deserialize, Serialize)]
pub struct Profile {
    /// Cluster management hostname or base URL.
    pub hostname: String,

    pub username: String,

    /// Password in plaintext (prefer `password_env`).
    pub password: Option<String>,

    /// Environment variable name containing the password.
    pub password_env: Option<String>,

    /// Verify the cluster's TLS certificate.
    #[serde(default = "default_validate_certs")]
    pub validate_certs: bool,

    /// Maximum in-flight requests against this cluster.
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
}

fn default_validate_certs() -> bool {
    true
}
fn default_max_concurrent_requests() -> usize {
    6
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("rs", "shoal", "shoal").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("shoal");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from file + environment.
///
/// Environment variables override the file, e.g.
/// `SHOAL_PROFILES.CLUSTER4.HOSTNAME=...`.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load config from an explicit path, merged with the environment.
pub fn load_config_from(path: &std::path::Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("SHOAL_").split("."));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    let path = config_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(&path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve a profile's password from the credential chain.
pub fn resolve_password(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    // 1. Profile's password_env → env var lookup
    if let Some(ref env_name) = profile.password_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    // 2. Plaintext in config
    if let Some(ref pw) = profile.password {
        return Ok(SecretString::from(pw.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

// ── Registry construction ───────────────────────────────────────────

/// Build a `ConnectionProfile` from a named config entry.
pub fn to_connection_profile(
    profile: &Profile,
    profile_name: &str,
) -> Result<ConnectionProfile, ConfigError> {
    if profile.hostname.is_empty() {
        return Err(ConfigError::Validation {
            field: "hostname".into(),
            reason: format!("profile '{profile_name}' has an empty hostname"),
        });
    }
    if profile.max_concurrent_requests == 0 {
        return Err(ConfigError::Validation {
            field: "max_concurrent_requests".into(),
            reason: "must be at least 1".into(),
        });
    }

    let password = resolve_password(profile, profile_name)?;
    Ok(
        ConnectionProfile::new(profile_name, &profile.hostname, &profile.username, password)
            .validate_certs(profile.validate_certs)
            .max_concurrent_requests(profile.max_concurrent_requests),
    )
}

/// Populate a `ConnectionRegistry` from every configured profile.
pub fn build_registry(config: &Config) -> Result<ConnectionRegistry, ConfigError> {
    let mut registry = ConnectionRegistry::new();
    // Deterministic order so duplicate diagnostics are stable.
    let mut names: Vec<&String> = config.profiles.keys().collect();
    names.sort();

    for name in names {
        let profile = &config.profiles[name];
        registry.register(to_connection_profile(profile, name)?)?;
    }
    Ok(registry)
}
