//! Configuration presets for common scenarios

use super::{Config, DisplayConfig, Format};

impl Config {
    /// Create configuration from environment variables
    ///
    /// `KEYWARD_LOG` takes precedence over `RUST_LOG`; `KEYWARD_LOG_FORMAT`
    /// selects `pretty`, `compact` or `json`.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(level) = std::env::var("KEYWARD_LOG") {
            config.level = level;
        } else if let Ok(level) = std::env::var("RUST_LOG") {
            config.level = level;
        }

        if let Ok(format) = std::env::var("KEYWARD_LOG_FORMAT") {
            config.format = Format::parse_lossy(&format);
        }

        if std::env::var_os("NO_COLOR").is_some() {
            config.display.colors = false;
        }

        config
    }

    /// Development configuration
    ///
    /// Human-readable output with source locations. The credential manager
    /// logs at debug level so job dispatch and completions are visible; other
    /// crates stay at info.
    #[must_use]
    pub fn development() -> Self {
        Self {
            level: "info,keyward_credential=debug,keyward_log=debug".to_string(),
            format: Format::Pretty,
            display: DisplayConfig {
                colors: true,
                source: true,
                target: true,
                ..DisplayConfig::default()
            },
            service: Some("keyward-dev".to_string()),
        }
    }

    /// Production configuration
    ///
    /// Flattened JSON lines. Only warnings from dependencies; the credential
    /// manager keeps its info-level job outcomes, never the secret values.
    #[must_use]
    pub fn production() -> Self {
        Self {
            level: "warn,keyward_credential=info".to_string(),
            format: Format::Json,
            display: DisplayConfig {
                colors: false,
                source: false,
                thread_ids: true,
                flatten: true,
                ..DisplayConfig::default()
            },
            service: Some("keyward".to_string()),
        }
    }

    /// Test configuration (compact, trace level, no timestamps)
    #[must_use]
    pub fn test() -> Self {
        Self {
            level: "trace".to_string(),
            format: Format::Compact,
            display: DisplayConfig {
                colors: false,
                time: false,
                ..DisplayConfig::default()
            },
            ..Self::default()
        }
    }
}
