//! Configuration types for the credentials manager

use crate::backend::BackendOptions;
use crate::core::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for [`CredentialsManager`](crate::CredentialsManager)
///
/// Deserializes with defaults for missing fields, so it can be embedded in a
/// host application's config file:
///
/// ```
/// use keyward_credential::manager::ManagerConfig;
/// use std::time::Duration;
///
/// let config: ManagerConfig = serde_json::from_str(r#"{"read_timeout": "30s"}"#).unwrap();
/// assert_eq!(config.read_timeout, Some(Duration::from_secs(30)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Let the backend fall back to an unencrypted store when no secure one
    /// is reachable
    pub allow_insecure_fallback: bool,

    /// Give up on a read after this long; the read then counts as failed
    /// (default: wait forever)
    #[serde(with = "humantime_serde")]
    pub read_timeout: Option<Duration>,

    /// Job events buffered per subscriber before the oldest are dropped;
    /// ready events are never dropped
    pub event_capacity: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            allow_insecure_fallback: BackendOptions::platform_default().allow_insecure_fallback,
            read_timeout: None,
            event_capacity: 64,
        }
    }
}

impl ManagerConfig {
    /// Options passed with every backend job
    pub fn backend_options(&self) -> BackendOptions {
        BackendOptions {
            allow_insecure_fallback: self.allow_insecure_fallback,
        }
    }

    /// Defaults overridden by `KEYWARD_INSECURE_FALLBACK` and
    /// `KEYWARD_READ_TIMEOUT`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_overrides(|name| std::env::var(name).ok())
    }

    fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(raw) = lookup("KEYWARD_INSECURE_FALLBACK") {
            self.allow_insecure_fallback = match raw.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                other => {
                    return Err(ConfigError::InvalidEnv {
                        var: "KEYWARD_INSECURE_FALLBACK",
                        reason: format!("expected a boolean, got '{other}'"),
                    });
                }
            };
        }

        if let Some(raw) = lookup("KEYWARD_READ_TIMEOUT") {
            self.read_timeout = match raw.trim() {
                "" | "none" | "off" => None,
                value => Some(humantime::parse_duration(value).map_err(|e| {
                    ConfigError::InvalidEnv {
                        var: "KEYWARD_READ_TIMEOUT",
                        reason: e.to_string(),
                    }
                })?),
            };
        }

        Ok(self)
    }
}
