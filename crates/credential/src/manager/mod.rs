//! Credentials Manager - cache and persistence coordinator.
//!
//! This module provides the [`crate::manager::CredentialsManager`] type and the
//! bookkeeping behind it.
//!
//! # Overview
//!
//! Services register the credential keys they need; the manager loads them
//! from the [`SecretBackend`](crate::backend::SecretBackend) in the background
//! and announces readiness once every read of the load cycle has reported back.
//! Afterwards reads are served from memory and writes go to memory first, then
//! to the backend.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │            CredentialsManager (High-Level API)          │
//! ├─────────────────────────────────────────────────────────┤
//! │  • add_service()   • credentials()   • set_credentials()│
//! │  • keys()          • services()      • subscribe()      │
//! └─────────────────────────────────────────────────────────┘
//!           │                     │                  │
//! ┌─────────▼─────────┐ ┌─────────▼────────┐ ┌───────▼───────┐
//! │  CredentialStore  │ │  ServiceRegistry │ │   JobTracker  │
//! │  (values, revs)   │ │  (key sets)      │ │  (load cycles)│
//! └───────────────────┘ └──────────────────┘ └───────────────┘
//!           │
//! ┌─────────▼────────────────────────────────────────────┐
//! │   SecretBackend jobs  ──►  completion queue  ──►     │
//! │   driver task  ──►  EventBus (ServiceReady, ...)     │
//! └──────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod events;
pub mod jobs;
#[allow(clippy::module_inception)]
mod manager;
pub mod registry;
pub mod store;

pub use config::ManagerConfig;
pub use events::{EventBus, EventSubscriber, ManagerEvent};
pub use jobs::{CycleProgress, JobId, JobTracker};
pub use manager::{CredentialsManager, CredentialsManagerBuilder, NoBackend};
pub use registry::ServiceRegistry;
pub use store::CredentialStore;
