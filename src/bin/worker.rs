use clap::Parser;
use dotenvy::dotenv;
use rust_csv_jobs::config::AppConfig;
use rust_csv_jobs::infrastructure::queue;
use rust_csv_jobs::services::worker::BackgroundWorker;
use rust_csv_jobs::utils::shutdown::shutdown_signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Standalone worker draining the shared broker
#[derive(Parser, Debug)]
#[command(name = "csv-worker", version, about)]
struct Args {
    /// Tasks to run at once (overrides WORKER_CONCURRENCY)
    #[arg(short, long)]
    concurrency: Option<usize>,

    /// Milliseconds to wait on an empty broker (overrides WORKER_POLL_INTERVAL_MS)
    #[arg(long)]
    poll_interval_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rust_csv_jobs=info,csv_worker=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let mut config = AppConfig::from_env();
    if let Some(concurrency) = args.concurrency {
        config.worker_concurrency = concurrency;
    }
    if let Some(poll_interval_ms) = args.poll_interval_ms {
        config.worker_poll_interval_ms = poll_interval_ms;
    }

    info!("👷 Starting CSV worker...");

    let job_queue = queue::setup_queue(&config).await?;
    if job_queue.requires_embedded_worker() {
        error!(
            "❌ BROKER_URL={} / RESULT_BACKEND_URL={}: in-process queues cannot be shared with a separate worker.",
            config.broker_url, config.result_backend_url
        );
        info!(
            "Usage: BROKER_URL=sqlite://data/queue.db RESULT_BACKEND_URL=sqlite://data/queue.db cargo run --bin csv-worker"
        );
        std::process::exit(1);
    }

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let worker = BackgroundWorker::new(
        job_queue,
        shutdown_rx,
        config.worker_concurrency,
        config.poll_interval(),
    )
    .with_result_expiry(config.result_expires());
    let handle = tokio::spawn(worker.run());

    shutdown_signal().await;
    let _ = shutdown_tx.send(true);
    handle.await?;

    info!("🛑 Worker shut down gracefully.");
    Ok(())
}
