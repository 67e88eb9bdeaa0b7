use anyhow::{Context, Result};
use std::path::Path;
use tempfile::NamedTempFile;
use treeport_transfer::{BrowserSession, TempUpload, UploadProgress};

pub async fn get(session: &BrowserSession, mapping_id: u64, key: &str, local: &Path) -> Result<()> {
    let mut stream = session.download(mapping_id, key).await?;
    let mut file = tokio::fs::File::create(local)
        .await
        .with_context(|| format!("Failed to create {}", local.display()))?;

    let bytes = tokio::io::copy(&mut stream, &mut file).await?;
    println!("Downloaded {} ({} bytes) to {}", key, bytes, local.display());
    Ok(())
}

pub async fn put(
    session: &BrowserSession,
    mapping_id: u64,
    folder: &str,
    local: &Path,
    overwrite: bool,
) -> Result<()> {
    let (_staged, temp) = stage(local).await?;

    let report = |parts: usize, done: u64, total: u64| {
        eprintln!("  part {}: {}/{} bytes", parts, done, total);
    };
    let progress: &dyn UploadProgress = &report;

    let key = session
        .upload(mapping_id, folder, &temp, overwrite, Some(progress))
        .await?;
    println!("Uploaded {} as {}", local.display(), key);
    Ok(())
}

/// Copy `local` into a staging file removed when the handle drops.
///
/// S3 uploads consume the staged file, SFTP uploads leave it in place.
async fn stage(local: &Path) -> Result<(NamedTempFile, TempUpload)> {
    let file_name = local
        .file_name()
        .and_then(|n| n.to_str())
        .context("Local path has no usable file name")?;

    let staged = tempfile::Builder::new()
        .prefix(".treeport-")
        .tempfile()
        .context("Failed to create staging file")?;
    tokio::fs::copy(local, staged.path())
        .await
        .with_context(|| format!("Failed to stage {}", local.display()))?;

    let temp = TempUpload::new(staged.path(), file_name);
    Ok((staged, temp))
}

pub async fn zip(session: &BrowserSession, mapping_id: u64, keys: &[String], out: &Path) -> Result<()> {
    let archive = session.zip(mapping_id, keys).await?;
    tokio::fs::write(out, &archive)
        .await
        .with_context(|| format!("Failed to write {}", out.display()))?;
    println!("Wrote {} files ({} bytes) to {}", keys.len(), archive.len(), out.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stage_copies_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("report.csv");
        tokio::fs::write(&local, "1,2\n").await.unwrap();

        let (staged, temp) = stage(&local).await.unwrap();
        assert_eq!(temp.file_name(), "report.csv");
        assert_ne!(temp.path(), local.as_path());
        assert_eq!(tokio::fs::read_to_string(temp.path()).await.unwrap(), "1,2\n");

        let staged_path = temp.path().to_path_buf();
        drop(staged);
        assert!(!staged_path.exists());
        assert!(local.exists());
    }

    #[tokio::test]
    async fn test_stage_requires_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(stage(&dir.path().join("missing.csv")).await.is_err());
    }
}
