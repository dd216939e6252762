//! Worker callbacks and the name → worker dispatch table.

use std::collections::HashMap;

use serde_json::Value;

use rewind_core::JobName;

use crate::context::JobContext;
use crate::queue::Payload;

/// A worker: the actual logic for one job kind.
///
/// Workers should reflect ordinary data/user problems inside their returned
/// mapping (`ok: false` + `errors` by convention) and reserve `Err` for truly
/// exceptional conditions, which are what the runner retries. The return
/// value must be a JSON object; the runner fails the attempt otherwise.
pub type WorkerFn =
    Box<dyn Fn(&mut JobContext, &Payload) -> anyhow::Result<Value> + Send + Sync>;

/// Static dispatch table, built once at startup.
#[derive(Default)]
pub struct WorkerRegistry {
    workers: HashMap<JobName, WorkerFn>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the worker for a job name. A later registration under the
    /// same name replaces the earlier one.
    pub fn register<F>(&mut self, name: JobName, worker: F)
    where
        F: Fn(&mut JobContext, &Payload) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.workers.insert(name, Box::new(worker));
    }

    pub fn get(&self, name: &JobName) -> Option<&WorkerFn> {
        self.workers.get(name)
    }

    pub fn contains(&self, name: &JobName) -> bool {
        self.workers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Registered job names, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &JobName> {
        self.workers.keys()
    }
}

impl std::fmt::Debug for WorkerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerRegistry")
            .field("workers", &self.workers.keys().collect::<Vec<_>>())
            .finish()
    }
}
