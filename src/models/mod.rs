use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use utoipa::ToSchema;

/// A raw upload as written to the storage directory.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub original_name: String,
    pub stored_name: String,
    pub path: PathBuf,
}

/// Lifecycle of a job as recorded by the result backend.
///
/// `Pending -> Started -> {Success, Failure}`; the last two are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Pending,
    Started,
    Success,
    Failure,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "PENDING",
            JobState::Started => "STARTED",
            JobState::Success => "SUCCESS",
            JobState::Failure => "FAILURE",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Success | JobState::Failure)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(JobState::Pending),
            "STARTED" => Ok(JobState::Started),
            "SUCCESS" => Ok(JobState::Success),
            "FAILURE" => Ok(JobState::Failure),
            other => Err(other.to_string()),
        }
    }
}

/// Current view of a job in the result backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub state: JobState,
    /// Task return value, set once the job succeeded.
    pub result: Option<Value>,
    /// Stringified runtime error, set once the job failed.
    pub error: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    /// Record reported for ids the backend knows nothing about.
    pub fn pending(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: JobState::Pending,
            result: None,
            error: None,
            updated_at: None,
        }
    }

    pub fn started(id: impl Into<String>) -> Self {
        Self {
            state: JobState::Started,
            updated_at: Some(Utc::now()),
            ..Self::pending(id)
        }
    }

    pub fn success(id: impl Into<String>, result: Value) -> Self {
        Self {
            state: JobState::Success,
            result: Some(result),
            updated_at: Some(Utc::now()),
            ..Self::pending(id)
        }
    }

    pub fn failure(id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            state: JobState::Failure,
            error: Some(error.into()),
            updated_at: Some(Utc::now()),
            ..Self::pending(id)
        }
    }
}

/// Envelope carried by the broker from producer to worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMessage {
    pub id: String,
    pub task: String,
    pub args: Value,
    pub enqueued_at: DateTime<Utc>,
}

impl TaskMessage {
    pub fn new(task: impl Into<String>, args: Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            task: task.into(),
            args,
            enqueued_at: Utc::now(),
        }
    }
}
