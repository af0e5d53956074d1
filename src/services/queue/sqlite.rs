use super::{Broker, QueueError, ResultBackend, parse_state};
use crate::models::{JobRecord, TaskMessage};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Broker and result backend stored in one SQLite database, so a server and
/// any number of worker processes on the same host can share it.
pub struct SqliteQueue {
    pool: SqlitePool,
}

impl SqliteQueue {
    pub async fn connect(url: &str) -> Result<Self, QueueError> {
        let mut options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));

        let filename = options.clone().get_filename().to_path_buf();
        let in_memory = url.contains(":memory:") || filename.as_os_str() == ":memory:";

        if !in_memory {
            if let Some(parent) = filename.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        // Every connection to an in-memory database is a separate database
        let max_connections = if in_memory { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await?;

        info!("🗄️  Queue database: {}", url);

        let queue = Self { pool };
        queue.run_migrations().await?;
        Ok(queue)
    }

    pub async fn run_migrations(&self) -> Result<(), QueueError> {
        let stmts = [
            "CREATE TABLE IF NOT EXISTS task_messages (
                id TEXT PRIMARY KEY,
                task TEXT NOT NULL,
                args TEXT NOT NULL,
                enqueued_at TEXT NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_task_messages_enqueued
                ON task_messages (enqueued_at)",
            "CREATE TABLE IF NOT EXISTS task_results (
                id TEXT PRIMARY KEY,
                state TEXT NOT NULL,
                result TEXT,
                error TEXT,
                updated_at TEXT NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_task_results_updated
                ON task_results (state, updated_at)",
        ];

        for stmt in stmts {
            sqlx::query(stmt).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Removes and returns the oldest message in one statement, so two
    /// workers can never take the same row.
    async fn claim_next(&self) -> Result<Option<TaskMessage>, QueueError> {
        let row: Option<(String, String, String, DateTime<Utc>)> = sqlx::query_as(
            "DELETE FROM task_messages
             WHERE id = (
                SELECT id FROM task_messages
                ORDER BY enqueued_at, rowid
                LIMIT 1
             )
             RETURNING id, task, args, enqueued_at",
        )
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(id, task, args, enqueued_at)| {
            Ok::<_, QueueError>(TaskMessage {
                id,
                task,
                args: serde_json::from_str(&args)?,
                enqueued_at,
            })
        })
        .transpose()
    }
}

#[async_trait]
impl Broker for SqliteQueue {
    async fn publish(&self, message: &TaskMessage) -> Result<(), QueueError> {
        sqlx::query("INSERT INTO task_messages (id, task, args, enqueued_at) VALUES (?, ?, ?, ?)")
            .bind(&message.id)
            .bind(&message.task)
            .bind(serde_json::to_string(&message.args)?)
            .bind(message.enqueued_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn consume(&self, wait: Duration) -> Result<Option<TaskMessage>, QueueError> {
        if let Some(message) = self.claim_next().await? {
            return Ok(Some(message));
        }
        tokio::time::sleep(wait).await;
        self.claim_next().await
    }

    async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

#[async_trait]
impl ResultBackend for SqliteQueue {
    async fn store(&self, record: &JobRecord) -> Result<(), QueueError> {
        let result = record
            .result
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            "INSERT INTO task_results (id, state, result, error, updated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                state = excluded.state,
                result = excluded.result,
                error = excluded.error,
                updated_at = excluded.updated_at",
        )
        .bind(&record.id)
        .bind(record.state.as_str())
        .bind(result)
        .bind(record.error.as_deref())
        .bind(record.updated_at.unwrap_or_else(Utc::now))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<JobRecord>, QueueError> {
        let row: Option<(String, String, Option<String>, Option<String>, DateTime<Utc>)> =
            sqlx::query_as(
                "SELECT id, state, result, error, updated_at FROM task_results WHERE id = ?",
            )
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        let Some((id, state, result, error, updated_at)) = row else {
            return Ok(None);
        };

        Ok(Some(JobRecord {
            state: parse_state(&id, &state)?,
            result: result.as_deref().map(serde_json::from_str).transpose()?,
            error,
            updated_at: Some(updated_at),
            id,
        }))
    }

    async fn purge_expired(&self, cutoff: DateTime<Utc>) -> Result<u64, QueueError> {
        // Timestamps share one RFC 3339 encoding, so text order is time order
        let done = sqlx::query(
            "DELETE FROM task_results
             WHERE state IN ('SUCCESS', 'FAILURE') AND updated_at <= ?",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;
        Ok(done.rows_affected())
    }

    async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}
