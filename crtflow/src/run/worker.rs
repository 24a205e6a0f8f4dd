//! Asynchronous run orchestrator.

use super::RunSync;
use crate::errors::{CrtError, Result};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// A queued run request.
#[derive(Debug)]
struct RunJob {
    type_name: String,
    extra: Option<Value>,
    force: bool,
}

/// Enqueues pipeline runs on a background worker.
///
/// The worker drains a task queue and executes each job's
/// Collect -> Refine -> Transfer chain sequentially, so jobs for
/// different types interleave across queue positions but a single job is
/// never internally concurrent. Jobs cannot be cancelled once enqueued;
/// callers poll the activity by type to observe progress.
pub struct RunAsync {
    runner: RunSync,
    sender: Mutex<Option<mpsc::UnboundedSender<RunJob>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl RunAsync {
    /// Creates the orchestrator and spawns its worker task.
    #[must_use]
    pub fn new(runner: RunSync) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<RunJob>();
        let worker_runner = runner.clone();
        let worker = tokio::spawn(async move {
            while let Some(job) = receiver.recv().await {
                match worker_runner
                    .execute(&job.type_name, job.extra, job.force)
                    .await
                {
                    Ok(outcome) => {
                        info!(
                            type_name = %job.type_name,
                            activity_id = ?outcome.activity_id,
                            "Async run completed"
                        );
                    }
                    Err(CrtError::AlreadyRunning { type_name, activity_id }) => {
                        // Another run won the race between enqueue and
                        // execution; the job is dropped, not retried.
                        warn!(
                            type_name = %type_name,
                            activity_id = %activity_id,
                            "Async run skipped, type already running"
                        );
                    }
                    Err(err) => {
                        error!(type_name = %job.type_name, error = %err, "Async run failed");
                    }
                }
            }
        });
        Self {
            runner,
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Enqueues a run for `type_name` and returns immediately.
    ///
    /// The same guard pre-check as the synchronous path applies at
    /// enqueue time; the authoritative check happens again when the
    /// worker creates the activity.
    ///
    /// # Errors
    ///
    /// `AlreadyRunning` when the type is in flight and `force` is unset;
    /// `Internal` when the queue has been closed.
    pub async fn execute(&self, type_name: &str, extra: Option<Value>, force: bool) -> Result<()> {
        self.runner.config.ensure_enabled()?;
        if !force {
            if let Some(running) = self.runner.guard.running_activity(type_name).await? {
                return Err(CrtError::AlreadyRunning {
                    type_name: type_name.to_string(),
                    activity_id: running.id,
                });
            }
        }

        let job = RunJob {
            type_name: type_name.to_string(),
            extra,
            force,
        };
        let sender = self.sender.lock();
        sender
            .as_ref()
            .ok_or_else(|| CrtError::Internal("run queue is closed".to_string()))?
            .send(job)
            .map_err(|_| CrtError::Internal("run queue worker is gone".to_string()))?;
        info!(type_name = %type_name, "Run enqueued");
        Ok(())
    }

    /// Stops accepting new runs. Already-enqueued jobs still drain.
    pub fn close(&self) {
        self.sender.lock().take();
    }

    /// Closes the queue and waits for the worker to drain it.
    ///
    /// # Errors
    ///
    /// `Internal` when the worker panicked.
    pub async fn join(&self) -> Result<()> {
        self.close();
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            handle
                .await
                .map_err(|err| CrtError::Internal(format!("run worker panicked: {err}")))?;
        }
        Ok(())
    }
}
