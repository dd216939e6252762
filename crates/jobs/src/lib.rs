//! In-process job execution: FIFO queue, per-job locks, deterministic retry,
//! execution metrics, runner, dispatcher.
//!
//! ## Design
//!
//! - Strict-FIFO in-memory queue, each operation individually atomic
//! - At most one concurrent execution per job id (process-wide lock registry)
//! - Deterministic exponential backoff, no jitter
//! - Metrics finalized exactly once per execution
//! - Every failure surfaces as a structured `JobResult`; nothing escapes the
//!   dispatcher as an unhandled error
//!
//! ## Components
//!
//! - [`JobQueue`]: thread-safe FIFO of job descriptors
//! - [`JobLockRegistry`]: per-job-id mutual exclusion, RAII release
//! - [`RetryPolicy`]/[`run_with_retry`]: backoff decision + blocking loop
//! - [`JobMetrics`]: per-execution attempt/retry/outcome recorder
//! - [`JobContext`]: mutable state bag handed to workers
//! - [`JobRunner`]: one execution under lock + retry + metrics
//! - [`Dispatcher`]: dequeue, resolve worker by name, delegate to the runner
//!
//! Shared-memory, lock-based concurrency: callers may enqueue and dispatch
//! from any thread; blocking points are lock acquisition and inter-attempt
//! backoff sleeps. Callers needing non-blocking behavior run the dispatcher
//! on its own thread via [`Dispatcher::spawn`].

pub mod context;
pub mod dispatcher;
pub mod lock;
pub mod metrics;
pub mod queue;
pub mod retry;
pub mod runner;
pub mod worker;


pub use context::JobContext;
pub use dispatcher::{
    DispatchOutcome, Dispatcher, DispatcherConfig, DispatcherHandle, DispatcherStats,
};
pub use lock::{JobLockGuard, JobLockRegistry, LockError};
pub use metrics::{JobMetrics, JobStatus, MetricsSnapshot, RetryRecord};
pub use queue::{Job, JobQueue, Payload, QueuedJob};
pub use retry::{RetryError, RetryPolicy, RetryPolicyError, RetryState, run_with_retry};
pub use runner::{JobResult, JobRunner};
pub use worker::{WorkerFn, WorkerRegistry};
