use crate::models::TaskMessage;
use crate::services::queue::JobQueue;
use crate::services::tasks;
use std::sync::Arc;
use tokio::sync::{Semaphore, watch};
use tokio::time::{Duration, Instant, sleep};
use tokio_util::task::TaskTracker;

/// Longest gap between two sweeps of expired results.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(3600);

/// Pulls task messages off the broker and records their outcome in the result backend.
pub struct BackgroundWorker {
    queue: JobQueue,
    shutdown: watch::Receiver<bool>,
    concurrency: usize,
    poll_interval: Duration,
    result_expires: Option<Duration>,
}

impl BackgroundWorker {
    pub fn new(
        queue: JobQueue,
        shutdown: watch::Receiver<bool>,
        concurrency: usize,
        poll_interval: Duration,
    ) -> Self {
        Self {
            queue,
            shutdown,
            concurrency: concurrency.max(1),
            poll_interval,
            result_expires: None,
        }
    }

    /// Periodically drops finished results older than `ttl`.
    pub fn with_result_expiry(mut self, ttl: Option<Duration>) -> Self {
        self.result_expires = ttl;
        self
    }

    pub async fn run(mut self) {
        tracing::info!(
            "🚀 Background worker started (concurrency={}, poll={:?})",
            self.concurrency,
            self.poll_interval
        );

        let permits = Arc::new(Semaphore::new(self.concurrency));
        let tracker = TaskTracker::new();
        let mut next_cleanup = Instant::now();

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            if let Some(ttl) = self.result_expires {
                if Instant::now() >= next_cleanup {
                    self.perform_cleanup(ttl).await;
                    next_cleanup = Instant::now() + ttl.min(CLEANUP_INTERVAL);
                }
            }

            let permit = tokio::select! {
                _ = self.shutdown.changed() => break,
                permit = permits.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            // Not raced against shutdown: a claimed message must not be dropped
            match self.queue.next_task(self.poll_interval).await {
                Ok(Some(message)) => {
                    let queue = self.queue.clone();
                    tracker.spawn(async move {
                        run_task(&queue, message).await;
                        drop(permit);
                    });
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!("Failed to fetch from broker: {}", e);
                    tokio::select! {
                        _ = self.shutdown.changed() => break,
                        _ = sleep(self.poll_interval) => {}
                    }
                }
            }
        }

        tracker.close();
        if !tracker.is_empty() {
            tracing::info!("⏳ Waiting for {} in-flight task(s)", tracker.len());
        }
        tracker.wait().await;
        tracing::info!("🛑 Background worker shutting down");
    }

    async fn perform_cleanup(&self, ttl: Duration) {
        match self.queue.purge_expired(ttl).await {
            Ok(0) => {}
            Ok(n) => tracing::info!("🧹 Removed {} expired result(s)", n),
            Err(e) => tracing::error!("Failed to remove expired results: {}", e),
        }
    }
}

/// Runs one message to completion and stores `STARTED` then `SUCCESS`/`FAILURE`.
pub async fn run_task(queue: &JobQueue, message: TaskMessage) {
    let job_id = message.id.clone();
    tracing::info!("⚙️  Job {} started: {} {}", job_id, message.task, message.args);

    if let Err(e) = queue.mark_started(&job_id).await {
        tracing::error!("Failed to mark job {} as started: {}", job_id, e);
    }

    let stored = match tokio::task::spawn_blocking(move || tasks::execute(&message)).await {
        Ok(Ok(result)) => {
            tracing::info!("✅ Job {} succeeded", job_id);
            queue.mark_success(&job_id, result).await
        }
        Ok(Err(e)) => {
            tracing::warn!("Job {} failed: {}", job_id, e);
            queue.mark_failure(&job_id, e.to_string()).await
        }
        Err(e) => {
            tracing::error!("Job {} panicked: {}", job_id, e);
            queue
                .mark_failure(&job_id, format!("Task panicked: {}", e))
                .await
        }
    };

    if let Err(e) = stored {
        tracing::error!("Failed to store result of job {}: {}", job_id, e);
    }
}
