use anyhow::Result;
use treeport_transfer::{BrowserSession, EntryView};

pub async fn tree(session: &BrowserSession) {
    let rendered = session.render().await;
    if rendered.is_empty() {
        println!("No directory mappings.");
    } else {
        print!("{}", rendered);
    }
}

pub async fn ls(session: &BrowserSession, mapping_id: u64, folder: Option<String>, json: bool) -> Result<()> {
    let folder = match folder {
        Some(folder) => folder,
        None => session.root_key(mapping_id).await?,
    };

    let mut entries = session.folders(mapping_id, &folder).await?;
    entries.extend(session.files(mapping_id, &folder).await?);

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("Folder is empty.");
        return Ok(());
    }

    println!("\n{:<40} {:<8} {:>12}", "Name", "Type", "Size");
    println!("{}", "-".repeat(62));
    for entry in &entries {
        print_entry(entry);
    }
    println!();
    Ok(())
}

fn print_entry(entry: &EntryView) {
    let kind = if entry.is_folder { "folder" } else { "file" };
    let size = entry
        .size_bytes
        .map(|bytes| format!("{:.2} MB", bytes as f64 / 1_048_576.0))
        .unwrap_or_default();
    println!("{:<40} {:<8} {:>12}", entry.label, kind, size);
}
