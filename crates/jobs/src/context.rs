//! Execution context passed to every worker.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use rewind_core::{JobId, UserId};

use crate::queue::Payload;

/// Mutable, execution-scoped state bag.
///
/// One context exists per `run_job` call and is mutated in place across retry
/// attempts: metadata accumulates, and a later attempt's result replaces an
/// earlier one. Owned exclusively by the execution in progress, never shared
/// across threads.
#[derive(Debug, Clone, Serialize)]
pub struct JobContext {
    pub job_id: JobId,
    pub user_id: Option<UserId>,
    pub started_at: DateTime<Utc>,
    result: Option<Payload>,
    metadata: Payload,
}

impl JobContext {
    pub fn new(job_id: JobId, user_id: Option<UserId>) -> Self {
        Self {
            job_id,
            user_id,
            started_at: Utc::now(),
            result: None,
            metadata: Payload::new(),
        }
    }

    /// Store the structured result. The mapping requirement is carried by the
    /// parameter type; replaces any result from an earlier attempt.
    pub fn set_result(&mut self, data: Payload) {
        self.result = Some(data);
    }

    pub fn result(&self) -> Option<&Payload> {
        self.result.as_ref()
    }

    pub fn take_result(&mut self) -> Option<Payload> {
        self.result.take()
    }

    /// Attach arbitrary metadata for debugging or downstream use.
    pub fn add_meta(&mut self, key: impl Into<String>, value: Value) {
        self.metadata.insert(key.into(), value);
    }

    pub fn metadata(&self) -> &Payload {
        &self.metadata
    }
}
