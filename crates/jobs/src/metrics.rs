//! Per-execution job metrics.
//!
//! Execution-local, no dependency on locks/retry/runner; safe to construct
//! anywhere. Finalization is exactly-once: terminal status transitions are
//! guarded, attempts only increase.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rewind_core::JobId;

/// Outcome of a job execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Success,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Failed)
    }
}

/// One failed attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetryRecord {
    pub attempt: u32,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

/// Attempt/retry/outcome recorder for one job execution.
#[derive(Debug, Clone)]
pub struct JobMetrics {
    job_id: JobId,
    attempts: u32,
    retries: Vec<RetryRecord>,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    status: JobStatus,
}

/// Immutable, serializable view for logs and debugging.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub job_id: JobId,
    pub status: JobStatus,
    pub attempts: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub retries: Vec<RetryRecord>,
}

impl JobMetrics {
    pub fn new(job_id: JobId) -> Self {
        Self {
            job_id,
            attempts: 0,
            retries: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
            status: JobStatus::Pending,
        }
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn retries(&self) -> &[RetryRecord] {
        &self.retries
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn mark_attempt(&mut self) {
        self.attempts += 1;
    }

    pub fn mark_retry(&mut self, attempt: u32, error: impl Into<String>) {
        self.retries.push(RetryRecord {
            attempt,
            error: error.into(),
            timestamp: Utc::now(),
        });
    }

    /// Finalize as successful. A no-op once the status is terminal.
    pub fn mark_success(&mut self) {
        if self.status.is_terminal() {
            return;
        }
        self.status = JobStatus::Success;
        self.finished_at = Some(Utc::now());
    }

    /// Finalize as failed, recording the terminal error alongside the retry
    /// history. A no-op once the status is terminal.
    pub fn mark_failure(&mut self, error: impl Into<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = JobStatus::Failed;
        self.finished_at = Some(Utc::now());
        self.retries.push(RetryRecord {
            attempt: self.attempts,
            error: error.into(),
            timestamp: Utc::now(),
        });
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            job_id: self.job_id.clone(),
            status: self.status,
            attempts: self.attempts,
            started_at: self.started_at,
            finished_at: self.finished_at,
            retries: self.retries.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics() -> JobMetrics {
        JobMetrics::new(JobId::new("enrich-1"))
    }

    #[test]
    fn starts_pending_with_no_attempts() {
        let m = metrics();
        assert_eq!(m.status(), JobStatus::Pending);
        assert_eq!(m.attempts(), 0);
        assert!(m.retries().is_empty());
        assert!(m.finished_at().is_none());
    }

    #[test]
    fn attempts_only_increase() {
        let mut m = metrics();
        m.mark_attempt();
        m.mark_attempt();
        assert_eq!(m.attempts(), 2);
    }

    #[test]
    fn retry_records_keep_order() {
        let mut m = metrics();
        m.mark_retry(1, "first");
        m.mark_retry(2, "second");

        let errors: Vec<&str> = m.retries().iter().map(|r| r.error.as_str()).collect();
        assert_eq!(errors, vec!["first", "second"]);
        assert_eq!(m.retries()[0].attempt, 1);
        assert_eq!(m.retries()[1].attempt, 2);
    }

    #[test]
    fn success_is_terminal_and_stamps_finish() {
        let mut m = metrics();
        m.mark_attempt();
        m.mark_success();

        assert_eq!(m.status(), JobStatus::Success);
        assert!(m.finished_at().is_some());

        // Exactly-once: a later failure cannot overwrite the outcome.
        m.mark_failure("too late");
        assert_eq!(m.status(), JobStatus::Success);
        assert!(m.retries().is_empty());
    }

    #[test]
    fn failure_appends_terminal_record() {
        let mut m = metrics();
        m.mark_attempt();
        m.mark_retry(1, "transient");
        m.mark_attempt();
        m.mark_failure("gave up");

        assert_eq!(m.status(), JobStatus::Failed);
        assert_eq!(m.retries().len(), 2);
        let last = m.retries().last().unwrap();
        assert_eq!(last.attempt, 2);
        assert_eq!(last.error, "gave up");

        m.mark_success();
        assert_eq!(m.status(), JobStatus::Failed);
    }

    #[test]
    fn snapshot_serializes() {
        let mut m = metrics();
        m.mark_attempt();
        m.mark_retry(1, "boom");
        m.mark_failure("boom");

        let json = serde_json::to_value(m.snapshot()).unwrap();
        assert_eq!(json["job_id"], "enrich-1");
        assert_eq!(json["status"], "failed");
        assert_eq!(json["attempts"], 1);
        assert_eq!(json["retries"].as_array().unwrap().len(), 2);
    }
}
