//! Job runner: one execution under lock, retry, and metrics.

use std::cell::RefCell;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use rewind_core::{JobId, UserId};

use crate::context::JobContext;
use crate::lock::JobLockRegistry;
use crate::metrics::JobMetrics;
use crate::queue::Payload;
use crate::retry::{RetryError, RetryPolicy, run_with_retry};
use crate::worker::WorkerFn;

/// Canonical job result; the sole contract surfaced to callers outside the
/// subsystem.
#[derive(Debug, Clone, Serialize)]
pub struct JobResult {
    pub ok: bool,
    pub job_id: JobId,
    pub user_id: Option<UserId>,
    pub attempts: u32,
    pub data: Payload,
    pub errors: Vec<String>,
    pub finished_at: DateTime<Utc>,
}

impl JobResult {
    pub fn success(job_id: JobId, user_id: Option<UserId>, attempts: u32, data: Payload) -> Self {
        Self {
            ok: true,
            job_id,
            user_id,
            attempts,
            data,
            errors: Vec::new(),
            finished_at: Utc::now(),
        }
    }

    pub fn failure(
        job_id: JobId,
        user_id: Option<UserId>,
        attempts: u32,
        errors: Vec<String>,
    ) -> Self {
        Self {
            ok: false,
            job_id,
            user_id,
            attempts,
            data: Payload::new(),
            errors,
            finished_at: Utc::now(),
        }
    }
}

/// Executes jobs safely and consistently.
///
/// Guarantees per [`JobRunner::run_job`] call:
/// - a fresh context and metrics exist for the execution
/// - the per-job lock is held for the whole retry loop and released exactly
///   once on every exit path (the guard's `Drop` carries this even through
///   worker panics)
/// - every failure is converted into a structured [`JobResult`]; nothing
///   escapes as an unhandled error
#[derive(Debug)]
pub struct JobRunner {
    locks: Arc<JobLockRegistry>,
    default_policy: RetryPolicy,
    lock_timeout: Option<Duration>,
}

impl JobRunner {
    pub fn new(locks: Arc<JobLockRegistry>) -> Self {
        Self {
            locks,
            default_policy: RetryPolicy::default(),
            lock_timeout: None,
        }
    }

    /// Policy used when `run_job` is called without one.
    pub fn with_default_policy(mut self, policy: RetryPolicy) -> Self {
        self.default_policy = policy;
        self
    }

    /// Bound lock acquisition instead of blocking indefinitely.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }

    /// Run one job execution: lock, retry-wrapped worker invocation, metrics,
    /// canonical result.
    pub fn run_job(
        &self,
        job_id: JobId,
        user_id: Option<UserId>,
        worker: &WorkerFn,
        payload: &Payload,
        retry_policy: Option<&RetryPolicy>,
    ) -> JobResult {
        let policy = retry_policy.unwrap_or(&self.default_policy);

        let mut ctx = JobContext::new(job_id.clone(), user_id.clone());
        // The attempt closure and the on-error hook both record into the
        // metrics; the cell is dismantled before the result is built.
        let metrics = RefCell::new(JobMetrics::new(job_id.clone()));

        let _guard = match self.locks.acquire(&job_id, self.lock_timeout) {
            Ok(guard) => guard,
            Err(err) => {
                warn!(job_id = %job_id, error = %err, "job lock unavailable");
                let message = err.to_string();
                let mut metrics = metrics.into_inner();
                metrics.mark_failure(&message);
                return JobResult::failure(job_id, user_id, metrics.attempts(), vec![message]);
            }
        };

        let outcome = run_with_retry(
            policy,
            |err: &anyhow::Error, state| {
                metrics.borrow_mut().mark_retry(state.attempt, err.to_string());
            },
            || {
                metrics.borrow_mut().mark_attempt();
                let value = worker(&mut ctx, payload)?;
                match value {
                    Value::Object(map) => {
                        ctx.set_result(map);
                        Ok(())
                    }
                    other => Err(anyhow!(
                        "worker must return a JSON object result, got {}",
                        value_kind(&other)
                    )),
                }
            },
        );

        let mut metrics = metrics.into_inner();
        match outcome {
            Ok(_state) => {
                metrics.mark_success();
                debug!(
                    job_id = %job_id,
                    attempts = metrics.attempts(),
                    "job succeeded"
                );
                let data = ctx.take_result().unwrap_or_default();
                JobResult::success(job_id, user_id, metrics.attempts(), data)
            }
            Err(err) => {
                // Surface the underlying message, not the wrapper text.
                let message = match err {
                    RetryError::Policy(policy_err) => policy_err.to_string(),
                    RetryError::Exhausted { error, .. } => error.to_string(),
                };
                metrics.mark_failure(&message);
                warn!(
                    job_id = %job_id,
                    attempts = metrics.attempts(),
                    error = %message,
                    "job failed"
                );
                JobResult::failure(job_id, user_id, metrics.attempts(), vec![message])
            }
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Instant;

    fn runner() -> JobRunner {
        JobRunner::new(JobLockRegistry::arc())
    }

    fn boxed<F>(f: F) -> WorkerFn
    where
        F: Fn(&mut JobContext, &Payload) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Box::new(f)
    }

    fn instant_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_factor: 2.0,
        }
    }

    #[test]
    fn successful_run_returns_worker_data() {
        let worker = boxed(|ctx, payload| {
            ctx.add_meta("seen", json!(true));
            Ok(json!({"count": payload.len()}))
        });

        let result = runner().run_job(
            JobId::new("enrich-1"),
            Some(UserId::new("u1")),
            &worker,
            &Payload::new(),
            None,
        );

        assert!(result.ok);
        assert_eq!(result.attempts, 1);
        assert_eq!(result.data["count"], json!(0));
        assert!(result.errors.is_empty());
        assert_eq!(result.user_id, Some(UserId::new("u1")));
    }

    #[test]
    fn fails_twice_then_succeeds_counts_attempts() {
        let calls = Mutex::new(0u32);
        let worker = boxed(move |_ctx, _payload| {
            let mut calls = calls.lock().unwrap();
            *calls += 1;
            if *calls < 3 {
                anyhow::bail!("transient {}", *calls);
            }
            Ok(json!({"done": true}))
        });

        let result = runner().run_job(
            JobId::new("enrich-1"),
            None,
            &worker,
            &Payload::new(),
            Some(&instant_policy(3)),
        );

        assert!(result.ok);
        assert_eq!(result.attempts, 3);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn exhaustion_surfaces_last_error_only() {
        let worker = boxed(|_ctx, _payload| anyhow::bail!("quota exceeded"));

        let result = runner().run_job(
            JobId::new("enrich-1"),
            None,
            &worker,
            &Payload::new(),
            Some(&instant_policy(2)),
        );

        assert!(!result.ok);
        assert_eq!(result.attempts, 2);
        assert_eq!(result.errors, vec!["quota exceeded".to_string()]);
        assert!(result.data.is_empty());
    }

    #[test]
    fn single_attempt_failure_is_terminal_and_fast() {
        let worker = boxed(|_ctx, _payload| anyhow::bail!("fatal"));
        let policy = RetryPolicy {
            max_attempts: 1,
            base_delay: Duration::from_secs(60),
            max_delay: Duration::from_secs(60),
            backoff_factor: 2.0,
        };

        let start = Instant::now();
        let result = runner().run_job(
            JobId::new("enrich-1"),
            None,
            &worker,
            &Payload::new(),
            Some(&policy),
        );

        assert!(!result.ok);
        assert_eq!(result.attempts, 1);
        assert_eq!(result.errors.len(), 1);
        assert!(start.elapsed() < Duration::from_secs(1), "no backoff sleep may occur");
    }

    #[test]
    fn non_object_result_fails_the_attempt() {
        let worker = boxed(|_ctx, _payload| Ok(json!("not a mapping")));

        let result = runner().run_job(
            JobId::new("enrich-1"),
            None,
            &worker,
            &Payload::new(),
            Some(&instant_policy(2)),
        );

        assert!(!result.ok);
        // Both budget slots were consumed by the bad return value.
        assert_eq!(result.attempts, 2);
        assert!(result.errors[0].contains("JSON object"));
        assert!(result.errors[0].contains("string"));
    }

    #[test]
    fn non_object_then_object_succeeds_on_retry() {
        let calls = Mutex::new(0u32);
        let worker = boxed(move |_ctx, _payload| {
            let mut calls = calls.lock().unwrap();
            *calls += 1;
            if *calls == 1 {
                Ok(json!([1, 2, 3]))
            } else {
                Ok(json!({"recovered": true}))
            }
        });

        let result = runner().run_job(
            JobId::new("enrich-1"),
            None,
            &worker,
            &Payload::new(),
            Some(&instant_policy(2)),
        );

        assert!(result.ok);
        assert_eq!(result.attempts, 2);
        assert_eq!(result.data["recovered"], json!(true));
    }

    #[test]
    fn invalid_policy_is_a_structured_failure() {
        let worker = boxed(|_ctx, _payload| Ok(json!({})));
        let policy = RetryPolicy {
            max_attempts: 0,
            ..Default::default()
        };

        let result = runner().run_job(
            JobId::new("enrich-1"),
            None,
            &worker,
            &Payload::new(),
            Some(&policy),
        );

        assert!(!result.ok);
        assert_eq!(result.attempts, 0);
        assert!(result.errors[0].contains("max_attempts"));
    }

    #[test]
    fn lock_timeout_is_surfaced_distinctly() {
        let locks = JobLockRegistry::arc();
        let runner = JobRunner::new(locks.clone())
            .with_lock_timeout(Duration::from_millis(20));

        let job_id = JobId::new("enrich-1");
        let _held = locks.acquire(&job_id, None).unwrap();

        let worker = boxed(|_ctx, _payload| Ok(json!({})));
        let result = runner.run_job(job_id, None, &worker, &Payload::new(), None);

        assert!(!result.ok);
        assert_eq!(result.attempts, 0);
        assert!(result.errors[0].contains("lock unavailable"));
    }
}
