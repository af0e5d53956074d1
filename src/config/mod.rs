use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration for the upload service and its workers
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Directory uploaded and processed CSV files are written to (default: "uploads")
    pub upload_folder: PathBuf,

    /// Broker connection URL (default: "sqlite://data/queue.db")
    pub broker_url: String,

    /// Result backend connection URL (default: "sqlite://data/queue.db")
    pub result_backend_url: String,

    /// Address the HTTP server binds to (default: "0.0.0.0:5000")
    pub bind_addr: String,

    /// Maximum request body size in bytes (default: 256 MB)
    pub max_file_size: usize,

    /// Run a worker inside the server process (default: false)
    pub embedded_worker: bool,

    /// Number of tasks a worker runs at once (default: 4)
    pub worker_concurrency: usize,

    /// How long a worker waits on an empty broker before polling again (default: 500 ms)
    pub worker_poll_interval_ms: u64,

    /// Seconds a finished job's result is kept; 0 keeps results forever (default: 86400)
    pub result_expires_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            upload_folder: PathBuf::from("uploads"),
            broker_url: "sqlite://data/queue.db".to_string(),
            result_backend_url: "sqlite://data/queue.db".to_string(),
            bind_addr: "0.0.0.0:5000".to_string(),
            max_file_size: 256 * 1024 * 1024, // 256 MB
            embedded_worker: false,
            worker_concurrency: 4,
            worker_poll_interval_ms: 500,
            result_expires_secs: 24 * 60 * 60,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            upload_folder: env::var("UPLOAD_FOLDER")
                .map(PathBuf::from)
                .unwrap_or(default.upload_folder),

            broker_url: env::var("BROKER_URL").unwrap_or(default.broker_url),

            result_backend_url: env::var("RESULT_BACKEND_URL")
                .unwrap_or(default.result_backend_url),

            bind_addr: env::var("BIND_ADDR").unwrap_or(default.bind_addr),

            max_file_size: env::var("MAX_FILE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_size),

            embedded_worker: env::var("EMBEDDED_WORKER")
                .map(|v| parse_flag(&v))
                .unwrap_or(default.embedded_worker),

            worker_concurrency: env::var("WORKER_CONCURRENCY")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(default.worker_concurrency),

            worker_poll_interval_ms: env::var("WORKER_POLL_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.worker_poll_interval_ms),

            result_expires_secs: env::var("RESULT_EXPIRES_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.result_expires_secs),
        }
    }

    /// Create config for development: in-process queue with an embedded worker
    pub fn development() -> Self {
        Self {
            broker_url: "memory://".to_string(),
            result_backend_url: "memory://".to_string(),
            bind_addr: "127.0.0.1:5000".to_string(),
            embedded_worker: true,
            worker_concurrency: 2,
            worker_poll_interval_ms: 50,
            ..Self::default()
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.worker_poll_interval_ms)
    }

    pub fn result_expires(&self) -> Option<Duration> {
        (self.result_expires_secs > 0).then(|| Duration::from_secs(self.result_expires_secs))
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
