//! Registered services and their key sets

use indexmap::{IndexMap, IndexSet};
use tracing::warn;

/// Service name → ordered, de-duplicated key identifiers.
///
/// Registration order is kept for both services and keys; read jobs are
/// issued in key order.
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    services: IndexMap<String, IndexSet<String>>,
}

impl ServiceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the key set of `service`.
    ///
    /// Empty identifiers are dropped, duplicates collapse to their first
    /// occurrence.
    pub fn register(
        &mut self,
        service: &str,
        keys: impl IntoIterator<Item = String>,
    ) -> &IndexSet<String> {
        let keys: IndexSet<String> = keys
            .into_iter()
            .filter(|key| {
                if key.is_empty() {
                    warn!(service, "Ignoring empty credential key");
                }
                !key.is_empty()
            })
            .collect();

        // `insert` on an existing key keeps its position in the map
        self.services.insert(service.to_string(), keys);
        &self.services[service]
    }

    #[cfg(test)]
    fn keys(&self, service: &str) -> Option<&IndexSet<String>> {
        self.services.get(service)
    }

    /// Check if `service` is registered
    pub fn contains(&self, service: &str) -> bool {
        self.services.contains_key(service)
    }

    /// Registered service names, in registration order
    pub fn services(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }
}
