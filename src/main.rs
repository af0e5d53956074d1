use dotenvy::dotenv;
use rust_csv_jobs::config::AppConfig;
use rust_csv_jobs::infrastructure::{queue, storage};
use rust_csv_jobs::services::worker::BackgroundWorker;
use rust_csv_jobs::utils::shutdown::shutdown_signal;
use rust_csv_jobs::{AppState, create_app};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    // Initialize tracing with EnvFilter
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rust_csv_jobs=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 Starting CSV job service...");

    let config = AppConfig::from_env();
    info!(
        "⚙️  Config: Max Size={}MB, Embedded Worker={}, Concurrency={}",
        config.max_file_size / 1024 / 1024,
        config.embedded_worker,
        config.worker_concurrency
    );

    // Setup Infrastructure
    let storage_service = storage::setup_storage(&config).await?;
    let job_queue = queue::setup_queue(&config).await?;

    // Setup Shutdown Channel
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let run_worker = config.embedded_worker || job_queue.requires_embedded_worker();
    let worker_handle = if run_worker {
        if !config.embedded_worker {
            info!("🧵 In-process broker or result backend configured, starting embedded worker");
        }
        let worker = BackgroundWorker::new(
            job_queue.clone(),
            shutdown_rx,
            config.worker_concurrency,
            config.poll_interval(),
        )
        .with_result_expiry(config.result_expires());
        Some(tokio::spawn(worker.run()))
    } else {
        info!("📭 No embedded worker; run `csv-worker` to process jobs");
        None
    };

    let state = AppState {
        config: config.clone(),
        queue: job_queue,
        storage: storage_service,
    };
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("✅ Server ready at http://{}", listener.local_addr()?);
    info!("📖 Swagger UI: http://{}/swagger-ui", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = shutdown_tx.send(true);
        })
        .await?;

    if let Some(handle) = worker_handle {
        handle.await?;
    }

    info!("🛑 Server shut down gracefully.");
    Ok(())
}
