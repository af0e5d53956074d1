use crate::config::AppConfig;
use crate::services::queue::JobQueue;
use tracing::info;

pub async fn setup_queue(config: &AppConfig) -> anyhow::Result<JobQueue> {
    info!(
        "📬 Broker: {} | Result backend: {}",
        config.broker_url, config.result_backend_url
    );

    let queue = JobQueue::connect(&config.broker_url, &config.result_backend_url).await?;

    info!("✅ Job queue connected");
    Ok(queue)
}
