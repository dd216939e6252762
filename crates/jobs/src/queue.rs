//! Thread-safe FIFO in-memory job queue.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;

use rewind_core::{JobName, UserId};

/// Opaque key-value payload handed to workers.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Immutable job descriptor.
///
/// Created by [`JobQueue::enqueue`], handed to the runner on dequeue, never
/// mutated in between.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub name: JobName,
    pub payload: Payload,
    pub user_id: Option<UserId>,
    pub enqueued_at: DateTime<Utc>,
}

/// Read-only queue entry for observability endpoints.
///
/// Deliberately excludes the payload: snapshots end up in logs and health
/// responses, payloads may carry tokens.
#[derive(Debug, Clone, Serialize)]
pub struct QueuedJob {
    pub name: JobName,
    pub user_id: Option<UserId>,
    pub enqueued_at: DateTime<Utc>,
}

/// Strict-FIFO in-memory queue.
///
/// Every operation takes the internal mutex for its whole duration, so each
/// call is individually atomic. No atomicity spans two calls: size-then-dequeue
/// is not transactional.
#[derive(Debug, Default)]
pub struct JobQueue {
    inner: Mutex<VecDeque<Job>>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Append a new job to the tail, stamping its enqueue time.
    ///
    /// Returns a clone of the queued descriptor so callers can echo the
    /// name/timestamp (e.g. to derive the job id they will poll for).
    pub fn enqueue(&self, name: JobName, payload: Payload, user_id: Option<UserId>) -> Job {
        let job = Job {
            name,
            payload,
            user_id,
            enqueued_at: Utc::now(),
        };
        let mut queue = self.inner.lock().unwrap();
        queue.push_back(job.clone());
        job
    }

    /// Remove and return the head of the queue, or `None` when empty.
    pub fn dequeue(&self) -> Option<Job> {
        let mut queue = self.inner.lock().unwrap();
        queue.pop_front()
    }

    /// Current queue depth.
    pub fn size(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }

    /// Payload-free view of the queued jobs, head first.
    pub fn snapshot(&self) -> Vec<QueuedJob> {
        let queue = self.inner.lock().unwrap();
        queue
            .iter()
            .map(|job| QueuedJob {
                name: job.name.clone(),
                user_id: job.user_id.clone(),
                enqueued_at: job.enqueued_at,
            })
            .collect()
    }
}
