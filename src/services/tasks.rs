//! Tasks a worker knows how to run, keyed by the name carried in each [`TaskMessage`].

use crate::models::TaskMessage;
use crate::services::processor::{annotate_csv, processed_path_for};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use thiserror::Error;
use utoipa::ToSchema;

pub const PROCESS_CSV: &str = "process_csv";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessCsvArgs {
    pub filepath: String,
}

/// Value returned by `process_csv`.
///
/// Processing errors are part of the result, not a task failure: the job still
/// ends in `SUCCESS` and the client finds the message under `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum ProcessCsvOutcome {
    Processed {
        message: String,
        processed_file: String,
    },
    Error {
        error: String,
    },
}

/// Errors raised by the task runtime itself; these put the job in `FAILURE`.
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("Unknown task: {0}")]
    UnknownTask(String),

    #[error("Invalid arguments for {task}: {source}")]
    InvalidArguments {
        task: String,
        source: serde_json::Error,
    },

    #[error("Failed to encode result: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Annotates the CSV at `filepath` and writes the processed copy next to it.
pub fn process_csv(filepath: &str) -> ProcessCsvOutcome {
    let input = Path::new(filepath);
    let output = processed_path_for(input);

    match annotate_csv(input, &output) {
        Ok(rows) => {
            tracing::info!("✅ Processed {} rows from {}", rows, filepath);
            ProcessCsvOutcome::Processed {
                message: "File processed successfully".to_string(),
                processed_file: output.to_string_lossy().into_owned(),
            }
        }
        Err(e) => {
            tracing::warn!("Processing {} failed: {}", filepath, e);
            ProcessCsvOutcome::Error {
                error: e.to_string(),
            }
        }
    }
}

/// Runs the task named in `message` and returns its JSON result.
///
/// Blocking: callers on the async runtime should use `spawn_blocking`.
pub fn execute(message: &TaskMessage) -> Result<Value, TaskError> {
    match message.task.as_str() {
        PROCESS_CSV => {
            let args: ProcessCsvArgs = serde_json::from_value(message.args.clone()).map_err(
                |source| TaskError::InvalidArguments {
                    task: message.task.clone(),
                    source,
                },
            )?;
            Ok(serde_json::to_value(process_csv(&args.filepath))?)
        }
        other => Err(TaskError::UnknownTask(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_process_csv_success_payload() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("data.csv");
        std::fs::write(&input, "a,b\n1,2\n").unwrap();

        let outcome = process_csv(input.to_str().unwrap());

        let expected = dir.path().join("data_processed.csv");
        assert_eq!(
            outcome,
            ProcessCsvOutcome::Processed {
                message: "File processed successfully".to_string(),
                processed_file: expected.to_string_lossy().into_owned(),
            }
        );
        assert!(expected.exists());
    }

    #[test]
    fn test_process_csv_error_payload() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("empty.csv");
        std::fs::write(&input, "").unwrap();

        let outcome = process_csv(input.to_str().unwrap());

        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({ "error": "No columns to parse from file" })
        );
    }

    #[test]
    fn test_execute_dispatches_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("data.csv");
        std::fs::write(&input, "a\n1\n").unwrap();

        let message = TaskMessage::new(PROCESS_CSV, json!({ "filepath": input }));
        let result = execute(&message).unwrap();

        assert_eq!(result["message"], "File processed successfully");
        assert!(result["processed_file"]
            .as_str()
            .unwrap()
            .ends_with("data_processed.csv"));
    }

    #[test]
    fn test_execute_rejects_unknown_task() {
        let message = TaskMessage::new("resize_image", json!({}));
        let err = execute(&message).unwrap_err();
        assert_eq!(err.to_string(), "Unknown task: resize_image");
    }

    #[test]
    fn test_execute_rejects_bad_arguments() {
        let message = TaskMessage::new(PROCESS_CSV, json!({ "path": "x.csv" }));
        assert!(matches!(
            execute(&message),
            Err(TaskError::InvalidArguments { .. })
        ));
    }
}
