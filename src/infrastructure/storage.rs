use crate::config::AppConfig;
use crate::services::storage::{LocalStorageService, StorageService};
use std::sync::Arc;
use tracing::info;

pub async fn setup_storage(config: &AppConfig) -> anyhow::Result<Arc<LocalStorageService>> {
    let storage = LocalStorageService::new(config.upload_folder.clone());
    storage.ensure_root().await?;

    info!("📁 Upload folder: {}", storage.root().display());

    Ok(Arc::new(storage))
}
