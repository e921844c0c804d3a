//! Manager notifications
//!
//! Two delivery paths with different guarantees:
//!
//! - [`ManagerEvent::ServiceReady`] goes to every subscriber over its own
//!   unbounded queue and is never dropped. There is at most one per
//!   `add_service` call.
//! - [`ManagerEvent::JobFinished`] goes over a bounded `tokio::sync::broadcast`
//!   channel. A subscriber that falls more than `capacity` events behind loses
//!   the oldest ones; [`EventSubscriber::missed`] counts them.

use crate::backend::Operation;
use crate::core::{BackendError, StorageKey};
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tracing::warn;

/// Event emitted by [`CredentialsManager`](crate::CredentialsManager)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerEvent {
    /// Every read job of the service's load cycle has completed,
    /// successfully or not
    ServiceReady {
        /// Service that finished loading
        service: String,
        /// Load cycle that drained
        generation: u64,
    },

    /// A secret-store job reported back
    JobFinished {
        /// Job kind
        operation: Operation,
        /// Credential the job acted on
        key: StorageKey,
        /// Failure reported by the backend, if any
        error: Option<BackendError>,
    },
}

/// Fan-out of [`ManagerEvent`]s to subscribers
#[derive(Debug)]
pub struct EventBus {
    jobs: broadcast::Sender<ManagerEvent>,
    ready: Mutex<Vec<mpsc::UnboundedSender<ManagerEvent>>>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` job events per subscriber.
    ///
    /// Ready events are not subject to the limit.
    pub fn new(capacity: usize) -> Self {
        let (jobs, _) = broadcast::channel(capacity.max(1));
        Self {
            jobs,
            ready: Mutex::new(Vec::new()),
        }
    }

    /// Emit an event to all subscribers
    pub fn emit(&self, event: ManagerEvent) {
        match event {
            ManagerEvent::ServiceReady { .. } => {
                // Dropped subscribers are pruned here
                self.ready
                    .lock()
                    .retain(|subscriber| subscriber.send(event.clone()).is_ok());
            }
            ManagerEvent::JobFinished { .. } => {
                // No subscribers is fine
                let _ = self.jobs.send(event);
            }
        }
    }

    /// Subscribe to events emitted from now on
    pub fn subscribe(&self) -> EventSubscriber {
        let (sender, ready) = mpsc::unbounded_channel();
        let mut subscribers = self.ready.lock();
        subscribers.push(sender);
        EventSubscriber {
            jobs: Some(self.jobs.subscribe()),
            ready,
            missed: 0,
        }
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.ready.lock();
        subscribers.retain(|subscriber| !subscriber.is_closed());
        subscribers.len()
    }
}

/// Subscription handle for [`ManagerEvent`]s
#[derive(Debug)]
pub struct EventSubscriber {
    // `None` once the job channel reported closed
    jobs: Option<broadcast::Receiver<ManagerEvent>>,
    ready: mpsc::UnboundedReceiver<ManagerEvent>,
    missed: u64,
}

impl EventSubscriber {
    /// Receive the next event.
    ///
    /// Job events already buffered are returned before a ready event, so the
    /// reads of a cycle are seen before its `ServiceReady`. Returns `None`
    /// once the manager is gone and everything buffered has been received.
    pub async fn recv(&mut self) -> Option<ManagerEvent> {
        loop {
            let Some(jobs) = self.jobs.as_mut() else {
                return self.ready.recv().await;
            };

            let result = tokio::select! {
                biased;
                result = jobs.recv() => result,
                event = self.ready.recv() => return event,
            };
            match result {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => self.lagged(skipped),
                Err(broadcast::error::RecvError::Closed) => self.jobs = None,
            }
        }
    }

    /// Receive an event without waiting
    pub fn try_recv(&mut self) -> Option<ManagerEvent> {
        while let Some(jobs) = self.jobs.as_mut() {
            match jobs.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => self.lagged(skipped),
                Err(broadcast::error::TryRecvError::Closed) => self.jobs = None,
                Err(broadcast::error::TryRecvError::Empty) => break,
            }
        }
        self.ready.try_recv().ok()
    }

    /// Job events dropped so far because this subscriber fell behind
    pub fn missed(&self) -> u64 {
        self.missed
    }

    /// Wait for the next [`ManagerEvent::ServiceReady`] of `service` and
    /// return its generation
    pub async fn ready(&mut self, service: &str) -> Option<u64> {
        while let Some(event) = self.recv().await {
            if let ManagerEvent::ServiceReady {
                service: ready,
                generation,
            } = event
            {
                if ready == service {
                    return Some(generation);
                }
            }
        }
        None
    }

    /// Wait for the next [`ManagerEvent::JobFinished`] of `operation` on
    /// `key` and return the reported error, if any
    pub async fn job_finished(
        &mut self,
        operation: Operation,
        key: &StorageKey,
    ) -> Option<Option<BackendError>> {
        while let Some(event) = self.recv().await {
            if let ManagerEvent::JobFinished {
                operation: finished,
                key: finished_key,
                error,
            } = event
            {
                if finished == operation && &finished_key == key {
                    return Some(error);
                }
            }
        }
        None
    }

    fn lagged(&mut self, skipped: u64) {
        self.missed += skipped;
        warn!(skipped, total = self.missed, "Event subscriber lagged, job events dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ready(service: &str, generation: u64) -> ManagerEvent {
        ManagerEvent::ServiceReady {
            service: service.into(),
            generation,
        }
    }

    fn read_finished(key: &str) -> ManagerEvent {
        ManagerEvent::JobFinished {
            operation: Operation::Read,
            key: StorageKey::new("svc", key),
            error: None,
        }
    }

    #[tokio::test]
    async fn ready_skips_other_services() {
        let bus = EventBus::new(8);
        let mut sub = bus.subscribe();

        bus.emit(ready("chat", 1));
        bus.emit(ready("email", 3));

        assert_eq!(sub.ready("email").await, Some(3));
        assert_eq!(sub.try_recv(), None);
    }

    #[test]
    fn emit_without_subscribers_is_silent() {
        let bus = EventBus::new(1);
        bus.emit(ready("email", 1));
        bus.emit(read_finished("k"));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let bus = EventBus::new(4);
        let kept = bus.subscribe();
        drop(bus.subscribe());

        bus.emit(ready("email", 1));
        assert_eq!(bus.subscriber_count(), 1);
        drop(kept);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn ready_survives_job_overflow() {
        let bus = EventBus::new(4);
        let mut sub = bus.subscribe();

        bus.emit(ready("a", 1));
        for i in 0..20 {
            bus.emit(read_finished(&format!("k{i}")));
        }
        bus.emit(ready("b", 1));

        // The oldest job events are gone, both ready events are not
        let mut received = Vec::new();
        while let Some(event) = sub.try_recv() {
            received.push(event);
        }
        assert_eq!(sub.missed(), 16);
        assert_eq!(
            received.iter().filter(|e| matches!(e, ManagerEvent::JobFinished { .. })).count(),
            4
        );
        assert!(received.contains(&ready("a", 1)));
        assert!(received.contains(&ready("b", 1)));
    }

    #[tokio::test]
    async fn buffered_jobs_come_before_ready() {
        let bus = EventBus::new(8);
        let mut sub = bus.subscribe();

        bus.emit(read_finished("user"));
        bus.emit(read_finished("pass"));
        bus.emit(ready("svc", 1));

        assert_eq!(sub.recv().await, Some(read_finished("user")));
        assert_eq!(sub.recv().await, Some(read_finished("pass")));
        assert_eq!(sub.recv().await, Some(ready("svc", 1)));
    }

    #[tokio::test]
    async fn recv_ends_after_bus_is_dropped() {
        let bus = EventBus::new(8);
        let mut sub = bus.subscribe();
        bus.emit(ready("svc", 1));
        drop(bus);

        assert_eq!(sub.recv().await, Some(ready("svc", 1)));
        assert_eq!(sub.recv().await, None);
    }
}
