//! Dispatcher: pulls the next queued job and routes it to its worker.
//!
//! Name resolution happens before the runner is consulted, so an unknown job
//! type is a cheap dispatch-time rejection: no lock taken, no metrics
//! recorded.

use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use rewind_core::JobId;

use crate::queue::JobQueue;
use crate::runner::{JobResult, JobRunner};
use crate::worker::WorkerRegistry;

/// Result of one [`Dispatcher::dispatch_next`] call.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// The queue was empty; nothing ran ("no jobs").
    NoJobs,
    /// A job was consumed and produced a result (including dispatch-time
    /// rejections of unknown job types).
    Finished(JobResult),
}

impl DispatchOutcome {
    pub fn is_no_jobs(&self) -> bool {
        matches!(self, DispatchOutcome::NoJobs)
    }

    pub fn as_result(&self) -> Option<&JobResult> {
        match self {
            DispatchOutcome::NoJobs => None,
            DispatchOutcome::Finished(result) => Some(result),
        }
    }

    pub fn into_result(self) -> Option<JobResult> {
        match self {
            DispatchOutcome::NoJobs => None,
            DispatchOutcome::Finished(result) => Some(result),
        }
    }
}

/// Background dispatch loop configuration.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// How long to sleep when the queue is empty.
    pub poll_interval: Duration,
    /// Thread/logging name.
    pub name: String,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            name: "job-dispatcher".to_string(),
        }
    }
}

impl DispatcherConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// Dispatch loop runtime statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatcherStats {
    pub dispatched: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub uptime_secs: u64,
}

/// Handle to control a running dispatch loop.
#[derive(Debug)]
pub struct DispatcherHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
    stats: Arc<Mutex<DispatcherStats>>,
}

impl DispatcherHandle {
    /// Request graceful shutdown and wait for the loop to stop.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }

    /// Current loop statistics.
    pub fn stats(&self) -> DispatcherStats {
        self.stats.lock().unwrap().clone()
    }
}

/// Maps queued jobs to registered workers and delegates to the runner.
#[derive(Debug)]
pub struct Dispatcher {
    queue: Arc<JobQueue>,
    workers: WorkerRegistry,
    runner: JobRunner,
}

impl Dispatcher {
    pub fn new(queue: Arc<JobQueue>, workers: WorkerRegistry, runner: JobRunner) -> Self {
        Self {
            queue,
            workers,
            runner,
        }
    }

    pub fn queue(&self) -> &Arc<JobQueue> {
        &self.queue
    }

    /// Dequeue at most one job and run it.
    ///
    /// The job id is derived deterministically from the job name and enqueue
    /// time, so a re-enqueued duplicate maps onto the same lock.
    pub fn dispatch_next(&self) -> DispatchOutcome {
        let Some(job) = self.queue.dequeue() else {
            return DispatchOutcome::NoJobs;
        };

        let job_id = JobId::new(format!("{}-{}", job.name, job.enqueued_at.timestamp()));

        let Some(worker) = self.workers.get(&job.name) else {
            warn!(job = %job.name, job_id = %job_id, "unknown job type");
            return DispatchOutcome::Finished(JobResult::failure(
                job_id,
                job.user_id,
                0,
                vec![format!("Unknown job type: {}", job.name)],
            ));
        };

        debug!(job = %job.name, job_id = %job_id, "dispatching job");
        DispatchOutcome::Finished(self.runner.run_job(
            job_id,
            job.user_id,
            worker,
            &job.payload,
            None,
        ))
    }

    /// Spawn the dispatch loop in a background thread.
    pub fn spawn(self, config: DispatcherConfig) -> DispatcherHandle {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let stats = Arc::new(Mutex::new(DispatcherStats::default()));
        let stats_clone = stats.clone();

        let name = config.name.clone();
        let join = thread::Builder::new()
            .name(name)
            .spawn(move || dispatcher_loop(self, config, shutdown_rx, stats_clone))
            .expect("failed to spawn job dispatcher thread");

        DispatcherHandle {
            shutdown: shutdown_tx,
            join: Some(join),
            stats,
        }
    }
}

fn dispatcher_loop(
    dispatcher: Dispatcher,
    config: DispatcherConfig,
    shutdown_rx: mpsc::Receiver<()>,
    stats: Arc<Mutex<DispatcherStats>>,
) {
    info!(dispatcher = %config.name, "job dispatcher started");
    let start_time = Instant::now();

    loop {
        // Shutdown check (non-blocking)
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        {
            let mut s = stats.lock().unwrap();
            s.uptime_secs = start_time.elapsed().as_secs();
        }

        match dispatcher.dispatch_next() {
            DispatchOutcome::NoJobs => thread::sleep(config.poll_interval),
            DispatchOutcome::Finished(result) => {
                {
                    let mut s = stats.lock().unwrap();
                    s.dispatched += 1;
                    if result.ok {
                        s.succeeded += 1;
                    } else {
                        s.failed += 1;
                    }
                }
                debug!(
                    dispatcher = %config.name,
                    job_id = %result.job_id,
                    ok = result.ok,
                    attempts = result.attempts,
                    "job dispatched"
                );
            }
        }
    }

    info!(dispatcher = %config.name, "job dispatcher stopped");
}
