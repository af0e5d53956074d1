//! Job queue client: a broker carrying [`TaskMessage`]s to workers and a result
//! backend holding each job's [`JobRecord`].
//!
//! Backends are picked by URL scheme:
//! - `sqlite://path/to/queue.db`: shared by the server and out-of-process workers
//! - `memory://`: in-process only, needs the embedded worker

pub mod memory;
pub mod sqlite;

use crate::models::{JobRecord, JobState, TaskMessage};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub use memory::{MemoryBroker, MemoryResultBackend};
pub use sqlite::SqliteQueue;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unsupported queue URL: {0}")]
    UnsupportedUrl(String),

    #[error("Invalid job state stored for {id}: {state}")]
    InvalidState { id: String, state: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Producer/consumer side of the queue.
#[async_trait]
pub trait Broker: Send + Sync {
    async fn publish(&self, message: &TaskMessage) -> Result<(), QueueError>;

    /// Takes the oldest message off the queue, waiting up to `wait` for one to arrive.
    /// A taken message is gone: a worker dying mid-task does not redeliver it.
    async fn consume(&self, wait: Duration) -> Result<Option<TaskMessage>, QueueError>;

    async fn ping(&self) -> bool;

    /// True when messages never leave this process.
    fn in_process(&self) -> bool {
        false
    }
}

/// State store read by the status endpoint and written by workers.
#[async_trait]
pub trait ResultBackend: Send + Sync {
    /// Inserts or replaces the record for `record.id`.
    async fn store(&self, record: &JobRecord) -> Result<(), QueueError>;

    async fn get(&self, id: &str) -> Result<Option<JobRecord>, QueueError>;

    /// Drops `SUCCESS`/`FAILURE` records last updated at or before `cutoff`.
    async fn purge_expired(&self, cutoff: DateTime<Utc>) -> Result<u64, QueueError>;

    async fn ping(&self) -> bool;

    /// True when records are only visible inside this process.
    fn in_process(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scheme {
    Memory,
    Sqlite,
}

fn scheme_of(url: &str) -> Result<Scheme, QueueError> {
    if url.starts_with("memory://") {
        Ok(Scheme::Memory)
    } else if url.starts_with("sqlite:") {
        Ok(Scheme::Sqlite)
    } else {
        Err(QueueError::UnsupportedUrl(url.to_string()))
    }
}

/// Handle shared by the HTTP handlers and the worker.
#[derive(Clone)]
pub struct JobQueue {
    broker: Arc<dyn Broker>,
    results: Arc<dyn ResultBackend>,
}

impl JobQueue {
    pub fn new(broker: Arc<dyn Broker>, results: Arc<dyn ResultBackend>) -> Self {
        Self { broker, results }
    }

    /// In-process queue, used by the development config and tests.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryBroker::new()),
            Arc::new(MemoryResultBackend::new()),
        )
    }

    /// Connects broker and result backend. Identical SQLite URLs share one pool.
    pub async fn connect(broker_url: &str, result_backend_url: &str) -> Result<Self, QueueError> {
        let broker_scheme = scheme_of(broker_url)?;
        let results_scheme = scheme_of(result_backend_url)?;

        if broker_scheme == Scheme::Sqlite && broker_url == result_backend_url {
            let shared = Arc::new(SqliteQueue::connect(broker_url).await?);
            return Ok(Self::new(shared.clone(), shared));
        }

        let broker: Arc<dyn Broker> = match broker_scheme {
            Scheme::Memory => Arc::new(MemoryBroker::new()),
            Scheme::Sqlite => Arc::new(SqliteQueue::connect(broker_url).await?),
        };
        let results: Arc<dyn ResultBackend> = match results_scheme {
            Scheme::Memory => Arc::new(MemoryResultBackend::new()),
            Scheme::Sqlite => Arc::new(SqliteQueue::connect(result_backend_url).await?),
        };

        Ok(Self::new(broker, results))
    }

    /// Publishes a task and returns the id clients poll with. Fire-and-forget:
    /// nothing is recorded in the result backend until a worker picks it up.
    pub async fn submit(&self, task: &str, args: Value) -> Result<String, QueueError> {
        let message = TaskMessage::new(task, args);
        self.broker.publish(&message).await?;
        tracing::debug!("📨 Submitted {} as job {}", task, message.id);
        Ok(message.id)
    }

    /// Current record for `id`; ids the backend has never seen read as `PENDING`.
    pub async fn status(&self, id: &str) -> Result<JobRecord, QueueError> {
        Ok(self
            .results
            .get(id)
            .await?
            .unwrap_or_else(|| JobRecord::pending(id)))
    }

    pub async fn next_task(&self, wait: Duration) -> Result<Option<TaskMessage>, QueueError> {
        self.broker.consume(wait).await
    }

    pub async fn mark_started(&self, id: &str) -> Result<(), QueueError> {
        self.results.store(&JobRecord::started(id)).await
    }

    pub async fn mark_success(&self, id: &str, result: Value) -> Result<(), QueueError> {
        self.results.store(&JobRecord::success(id, result)).await
    }

    pub async fn mark_failure(&self, id: &str, error: impl Into<String>) -> Result<(), QueueError> {
        self.results.store(&JobRecord::failure(id, error)).await
    }

    /// Removes finished results older than `ttl`, returning how many went.
    pub async fn purge_expired(&self, ttl: Duration) -> Result<u64, QueueError> {
        let cutoff = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_sub_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        self.results.purge_expired(cutoff).await
    }

    pub async fn broker_healthy(&self) -> bool {
        self.broker.ping().await
    }

    pub async fn result_backend_healthy(&self) -> bool {
        self.results.ping().await
    }

    /// True when only a worker inside this process can drain the broker or
    /// report results the status endpoint can see.
    pub fn requires_embedded_worker(&self) -> bool {
        self.broker.in_process() || self.results.in_process()
    }
}

pub(crate) fn parse_state(id: &str, state: &str) -> Result<JobState, QueueError> {
    state.parse().map_err(|state| QueueError::InvalidState {
        id: id.to_string(),
        state,
    })
}
