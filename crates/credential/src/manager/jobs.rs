//! In-flight read job bookkeeping
//!
//! Every [`add_service`](crate::CredentialsManager::add_service) call opens a
//! new load cycle for the service, numbered by a per-service generation. A
//! cycle tracks the read jobs it launched; when the last one reports back the
//! cycle has drained and the service is ready.
//!
//! Opening a cycle supersedes the previous one: its outstanding jobs are
//! handed back for cancellation and any completion still tagged with the old
//! generation is reported as [`CycleProgress::Stale`].

use std::collections::HashMap;
use std::fmt;
use tokio::task::AbortHandle;

/// Identifier of one dispatched read job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// What finishing a job did to its load cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleProgress {
    /// The job does not belong to the service's current cycle
    Stale,
    /// The cycle still waits for this many jobs
    Pending(usize),
    /// That was the last job of the cycle
    Drained,
}

#[derive(Debug, Default)]
struct LoadCycle {
    generation: u64,
    pending: HashMap<JobId, AbortHandle>,
}

/// Per-service set of outstanding read jobs
#[derive(Debug, Default)]
pub struct JobTracker {
    next_job: u64,
    cycles: HashMap<String, LoadCycle>,
}

impl JobTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh job identifier
    pub fn next_job_id(&mut self) -> JobId {
        self.next_job += 1;
        JobId(self.next_job)
    }

    /// Open a new load cycle for `service`.
    ///
    /// Returns the new generation together with the abort handles of jobs
    /// left over from the superseded cycle.
    pub fn begin_cycle(&mut self, service: &str) -> (u64, Vec<AbortHandle>) {
        let cycle = self.cycles.entry(service.to_string()).or_default();
        cycle.generation += 1;
        let superseded = cycle.pending.drain().map(|(_, handle)| handle).collect();
        (cycle.generation, superseded)
    }

    /// Record a launched read job under the given cycle
    pub fn track(&mut self, service: &str, generation: u64, job: JobId, handle: AbortHandle) {
        match self.cycles.get_mut(service) {
            Some(cycle) if cycle.generation == generation => {
                cycle.pending.insert(job, handle);
            }
            _ => handle.abort(),
        }
    }

    /// Mark `job` of `service`/`generation` as finished
    pub fn finish(&mut self, service: &str, generation: u64, job: JobId) -> CycleProgress {
        let Some(cycle) = self.cycles.get_mut(service) else {
            return CycleProgress::Stale;
        };
        if cycle.generation != generation || cycle.pending.remove(&job).is_none() {
            return CycleProgress::Stale;
        }
        if cycle.pending.is_empty() {
            CycleProgress::Drained
        } else {
            CycleProgress::Pending(cycle.pending.len())
        }
    }

    /// Check if `service` has outstanding read jobs
    pub fn is_loading(&self, service: &str) -> bool {
        self.pending(service) > 0
    }

    /// Number of outstanding read jobs for `service`
    pub fn pending(&self, service: &str) -> usize {
        self.cycles.get(service).map_or(0, |cycle| cycle.pending.len())
    }

    /// Generation of the current cycle for `service`
    pub fn generation(&self, service: &str) -> Option<u64> {
        self.cycles.get(service).map(|cycle| cycle.generation)
    }
}

impl Drop for JobTracker {
    fn drop(&mut self) {
        for cycle in self.cycles.values() {
            for handle in cycle.pending.values() {
                handle.abort();
            }
        }
    }
}
