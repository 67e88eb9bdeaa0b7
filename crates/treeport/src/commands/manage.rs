use anyhow::Result;
use treeport_transfer::BrowserSession;

pub async fn rm(session: &BrowserSession, mapping_id: u64, key: &str) -> Result<()> {
    session.delete(mapping_id, key).await?;
    println!("Deleted {}", key);
    Ok(())
}

pub async fn mv(session: &BrowserSession, mapping_id: u64, key: &str, new_name: &str) -> Result<()> {
    let new_key = session.rename(mapping_id, key, new_name).await?;
    println!("Renamed {} to {}", key, new_key);
    Ok(())
}
