use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;
use treeport_core::PortalConfig;

pub async fn load_config(path: &Path) -> Result<PortalConfig> {
    let contents = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read configuration file {}", path.display()))?;

    let config = PortalConfig::from_toml(&contents).context("Failed to parse configuration file")?;
    config.validate().context("Invalid configuration")?;

    Ok(config)
}

pub async fn save_config(path: &Path, config: &PortalConfig) -> Result<()> {
    // Create parent directory if it doesn't exist
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let contents = config.to_toml().context("Failed to serialize configuration")?;

    fs::write(path, contents)
        .await
        .context("Failed to write configuration file")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        save_config(&path, &PortalConfig::default()).await.unwrap();
        let loaded = load_config(&path).await.unwrap();
        assert_eq!(loaded.bucket, "transfer-bucket");
        assert_eq!(loaded.mappings.len(), 1);
    }

    #[tokio::test]
    async fn test_load_rejects_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        tokio::fs::write(&path, "bucket = \"\"\n").await.unwrap();
        assert!(load_config(&path).await.is_err());
    }
}
