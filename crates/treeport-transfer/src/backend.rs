//! Transport selection from configuration

use std::sync::Arc;
use tracing::info;
use treeport_core::{MappingProvider, PortalConfig, TransferMode, TreeProjector};

use crate::audit::AuditLogger;
use crate::client::SftpConnection;
use crate::s3::S3Transport;
use crate::session::{BrowserSession, BuildReport};
use crate::sftp::SftpTransport;
use crate::transport::{ObjectLister, TransferTransport};
use crate::{Error, Result};

/// Transport and lister shared by every session of a deployment
///
/// Listing always goes to the bucket; only file operations switch to SFTP
/// when the deployment runs in SFTP mode.
#[derive(Clone)]
pub struct Backend {
    bucket: String,
    transport: Arc<dyn TransferTransport>,
    lister: Arc<dyn ObjectLister>,
}

impl Backend {
    pub fn new(
        bucket: impl Into<String>,
        transport: Arc<dyn TransferTransport>,
        lister: Arc<dyn ObjectLister>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            transport,
            lister,
        }
    }

    /// Connect the transport selected by `config.mode`
    pub async fn connect(config: &PortalConfig) -> Result<Self> {
        config.validate()?;
        let audit = AuditLogger::from_config(&config.audit);
        let s3 = Arc::new(S3Transport::from_config(config, audit.clone())?);

        let transport: Arc<dyn TransferTransport> = match config.mode {
            TransferMode::S3 => s3.clone(),
            TransferMode::Sftp => {
                let sftp = config
                    .sftp
                    .as_ref()
                    .ok_or_else(|| Error::Ssh("SFTP mode without an [sftp] section".to_string()))?;
                let connection = SftpConnection::connect(sftp).await?;
                Arc::new(SftpTransport::new(connection, config.bucket.clone(), audit))
            }
        };

        info!(bucket = %config.bucket, mode = %config.mode, "Backend connected");
        Ok(Self::new(config.bucket.clone(), transport, s3))
    }

    pub fn transport(&self) -> Arc<dyn TransferTransport> {
        Arc::clone(&self.transport)
    }

    pub fn lister(&self) -> Arc<dyn ObjectLister> {
        Arc::clone(&self.lister)
    }

    /// Open a browser session for `user_id`
    pub async fn open_session(
        &self,
        user_id: u64,
        provider: &dyn MappingProvider,
    ) -> (BrowserSession, BuildReport) {
        BrowserSession::open(
            user_id,
            provider,
            TreeProjector::new(self.bucket.clone()),
            self.transport(),
            self.lister(),
        )
        .await
    }
}
