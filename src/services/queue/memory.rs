use super::{Broker, QueueError, ResultBackend};
use crate::models::{JobRecord, TaskMessage};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};

/// FIFO broker living in this process.
pub struct MemoryBroker {
    messages: Mutex<VecDeque<TaskMessage>>,
    available: Notify,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self {
            messages: Mutex::new(VecDeque::new()),
            available: Notify::new(),
        }
    }

    pub async fn len(&self) -> usize {
        self.messages.lock().await.len()
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn publish(&self, message: &TaskMessage) -> Result<(), QueueError> {
        self.messages.lock().await.push_back(message.clone());
        self.available.notify_one();
        Ok(())
    }

    async fn consume(&self, wait: Duration) -> Result<Option<TaskMessage>, QueueError> {
        if let Some(message) = self.messages.lock().await.pop_front() {
            return Ok(Some(message));
        }

        // notify_one stores a permit when nobody is waiting, so a publish
        // between the check above and this wait is not lost
        let _ = tokio::time::timeout(wait, self.available.notified()).await;
        Ok(self.messages.lock().await.pop_front())
    }

    async fn ping(&self) -> bool {
        true
    }

    fn in_process(&self) -> bool {
        true
    }
}

#[derive(Default)]
pub struct MemoryResultBackend {
    records: DashMap<String, JobRecord>,
}

impl MemoryResultBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResultBackend for MemoryResultBackend {
    async fn store(&self, record: &JobRecord) -> Result<(), QueueError> {
        self.records.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<JobRecord>, QueueError> {
        Ok(self.records.get(id).map(|r| r.value().clone()))
    }

    async fn purge_expired(&self, cutoff: DateTime<Utc>) -> Result<u64, QueueError> {
        let before = self.records.len();
        self.records.retain(|_, record| {
            !(record.state.is_terminal() && record.updated_at.is_some_and(|at| at <= cutoff))
        });
        Ok(before.saturating_sub(self.records.len()) as u64)
    }

    async fn ping(&self) -> bool {
        true
    }

    fn in_process(&self) -> bool {
        true
    }
}
