//! Zip export of several objects in one download
//!
//! The archive is assembled in memory. Entries are streamed from the
//! transport through a fixed 8 KiB buffer and named by their full key, so
//! the folder structure under the mapping survives extraction.

use std::io::{Cursor, Write};
use tokio::io::AsyncReadExt;
use tracing::{debug, info};
use treeport_core::TreeNode;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::transport::TransferTransport;
use crate::{Error, Result};

/// Copy buffer used for every entry
pub const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Entries at or above this size need zip64 headers
const ZIP64_THRESHOLD: u64 = u32::MAX as u64;

/// Build a zip archive of `nodes` through `transport`
pub async fn zip_objects<T>(transport: &T, nodes: &[&TreeNode], sizes: &[u64]) -> Result<Vec<u8>>
where
    T: TransferTransport + ?Sized,
{
    if nodes.len() != sizes.len() {
        return Err(Error::Archive(format!(
            "{} nodes but {} sizes",
            nodes.len(),
            sizes.len()
        )));
    }

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    let mut total = 0u64;

    for (node, &size) in nodes.iter().zip(sizes) {
        if node.is_folder() {
            return Err(Error::Archive(format!("{} is a folder", node.full_key())));
        }

        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .large_file(size >= ZIP64_THRESHOLD);

        let mut reader = transport.open_read_stream(node, size).await?;
        zip.start_file(node.full_key(), options)?;

        let mut written = 0u64;
        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            zip.write_all(&buf[..n])?;
            written += n as u64;
        }
        debug!(key = node.full_key(), bytes = written, "Added zip entry");
        total += written;
    }

    let archive = zip.finish()?.into_inner();
    info!(
        entries = nodes.len(),
        bytes_in = total,
        bytes_out = archive.len(),
        "Built zip archive"
    );
    Ok(archive)
}
