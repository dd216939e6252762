//! Per-job mutual exclusion.
//!
//! A process-wide registry maps job ids to lock slots. At most one holder per
//! id at any time; slots are created lazily and live for the process lifetime.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use rewind_core::JobId;

/// Fixed backoff between acquisition attempts.
const ACQUIRE_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Lock acquisition error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LockError {
    /// The timeout elapsed before the lock became free. Only reachable when
    /// an explicit timeout was supplied; untimed acquisition blocks.
    #[error("job lock unavailable for '{job_id}' after {waited_ms} ms")]
    Timeout { job_id: JobId, waited_ms: u64 },
}

/// Process-wide registry of per-job-id lock slots.
///
/// Slot creation is race-free: two concurrent first-time acquirers for the
/// same id converge on the same slot because the registry map is itself
/// mutex-guarded. Slots are never removed.
#[derive(Debug, Default)]
pub struct JobLockRegistry {
    slots: Mutex<HashMap<JobId, Arc<Mutex<bool>>>>,
}

impl JobLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn slot(&self, job_id: &JobId) -> Arc<Mutex<bool>> {
        let mut slots = self.slots.lock().unwrap();
        slots.entry(job_id.clone()).or_default().clone()
    }

    /// Acquire the lock for `job_id`.
    ///
    /// Polls the slot at a fixed interval. With `timeout = None` this blocks
    /// until the lock is free; with a timeout it gives up once the elapsed
    /// time exceeds it (a zero timeout degenerates to a single try).
    ///
    /// The returned guard releases on drop, so release happens on every exit
    /// path (normal return, error, or panic).
    pub fn acquire(
        &self,
        job_id: &JobId,
        timeout: Option<Duration>,
    ) -> Result<JobLockGuard, LockError> {
        let slot = self.slot(job_id);
        let start = Instant::now();

        loop {
            {
                let mut held = slot.lock().unwrap();
                if !*held {
                    *held = true;
                    return Ok(JobLockGuard {
                        job_id: job_id.clone(),
                        slot: slot.clone(),
                    });
                }
            }

            if let Some(limit) = timeout {
                if start.elapsed() >= limit {
                    return Err(LockError::Timeout {
                        job_id: job_id.clone(),
                        waited_ms: limit.as_millis() as u64,
                    });
                }
            }

            thread::sleep(ACQUIRE_POLL_INTERVAL);
        }
    }

    /// Number of job ids that have ever been locked.
    pub fn len(&self) -> usize {
        self.slots.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().unwrap().is_empty()
    }
}

/// Scoped ownership of one job's lock.
#[derive(Debug)]
pub struct JobLockGuard {
    job_id: JobId,
    slot: Arc<Mutex<bool>>,
}

impl JobLockGuard {
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Release explicitly. Dropping the guard has the same effect.
    pub fn release(self) {}
}

impl Drop for JobLockGuard {
    fn drop(&mut self) {
        // The flag mutex is only ever held for the flip itself, so a poisoned
        // slot can't orphan the job id: skip rather than panic in drop.
        if let Ok(mut held) = self.slot.lock() {
            *held = false;
        }
    }
}
