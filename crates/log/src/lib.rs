//! # Keyward Log
//!
//! Logger bootstrap shared by keyward binaries and test suites.
//!
//! ```no_run
//! fn main() -> Result<(), keyward_log::LogError> {
//!     let _guard = keyward_log::auto_init()?;
//!     tracing::info!(service = "email", "credentials loading");
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod builder;
mod config;
mod error;

pub use builder::{LoggerBuilder, LoggerGuard};
pub use config::{Config, DisplayConfig, Format};
pub use error::{LogError, LogResult};

// Re-export tracing macros
pub use tracing::{debug, error, info, trace, warn};

/// Auto-detect and initialize the best logging configuration.
///
/// `KEYWARD_LOG` / `RUST_LOG` win; otherwise debug builds get the development
/// preset and release builds the production preset.
pub fn auto_init() -> LogResult<LoggerGuard> {
    if std::env::var("KEYWARD_LOG").is_ok() || std::env::var("RUST_LOG").is_ok() {
        init_with(Config::from_env())
    } else if cfg!(debug_assertions) {
        init_with(Config::development())
    } else {
        init_with(Config::production())
    }
}

/// Initialize with the default configuration.
pub fn init() -> LogResult<LoggerGuard> {
    init_with(Config::default())
}

/// Initialize with a custom configuration.
pub fn init_with(config: Config) -> LogResult<LoggerGuard> {
    LoggerBuilder::from_config(config).build()
}

/// Initialize for tests.
///
/// Safe to call from every test: when a global subscriber is already
/// installed a no-op guard is returned.
pub fn init_test() -> LoggerGuard {
    if tracing::dispatcher::has_been_set() {
        return LoggerGuard::noop();
    }
    init_with(Config::test()).unwrap_or_else(|_| LoggerGuard::noop())
}
