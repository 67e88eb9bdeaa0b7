pub mod browse;
pub mod manage;
pub mod transfer;

use anyhow::{Context, Result};
use std::path::Path;
use tracing::warn;
use treeport_core::{PortalConfig, StaticMappings};
use treeport_transfer::{Backend, BrowserSession};

use crate::config;

pub async fn init_config(config_path: &Path) -> Result<()> {
    config::save_config(config_path, &PortalConfig::default()).await?;
    println!("Configuration file created at: {}", config_path.display());
    println!("\nPlease review the bucket and mappings before use.");
    Ok(())
}

/// Connect the configured backend and open a session for `user_id`
pub async fn open_session(config: &PortalConfig, user_id: u64) -> Result<BrowserSession> {
    let backend = Backend::connect(config)
        .await
        .context("Failed to connect to the backing store")?;
    let mappings = StaticMappings::new(config.mappings.iter().cloned());

    let (session, report) = backend.open_session(user_id, &mappings).await;
    if session.mappings().is_empty() {
        anyhow::bail!("User {} has no directory mappings", user_id);
    }
    for failure in &report.failures {
        warn!(mapping_id = failure.mapping_id, error = %failure.error, "Mapping could not be listed");
        eprintln!("Warning: mapping {} could not be listed: {}", failure.mapping_id, failure.error);
    }

    Ok(session)
}
