//! SFTP client connection
//!
//! Opens an SSH session with russh, requests the `sftp` subsystem and
//! drives it through russh-sftp. The connection implements
//! [`SftpChannel`] so it can back an [`SftpTransport`](crate::SftpTransport).

use async_trait::async_trait;
use russh::client;
use russh::keys::{load_secret_key, HashAlg, PrivateKeyWithHashAlg, PublicKey};
use russh_sftp::client::SftpSession;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use treeport_core::SftpConfig;

use crate::sftp::SftpChannel;
use crate::transport::ObjectStream;
use crate::{Error, Result};

/// Verifies the server host key against the configured fingerprint
struct HostKeyCheck {
    host: String,
    expected: Option<String>,
}

impl client::Handler for HostKeyCheck {
    type Error = russh::Error;

    async fn check_server_key(&mut self, server_public_key: &PublicKey) -> std::result::Result<bool, Self::Error> {
        let fingerprint = server_public_key.fingerprint(HashAlg::Sha256).to_string();
        match &self.expected {
            Some(expected) if *expected == fingerprint => Ok(true),
            Some(expected) => {
                warn!(
                    host = %self.host,
                    expected = %expected,
                    presented = %fingerprint,
                    "Host key mismatch"
                );
                Ok(false)
            }
            None => {
                info!(host = %self.host, fingerprint = %fingerprint, "Accepting unpinned host key");
                Ok(true)
            }
        }
    }
}

/// Authenticated SFTP session
pub struct SftpConnection {
    session: client::Handle<HostKeyCheck>,
    sftp: SftpSession,
}

impl SftpConnection {
    /// Connect and authenticate with the configured password or identity
    ///
    /// NIST 800-53: IA-2 (Identification and Authentication)
    pub async fn connect(config: &SftpConfig) -> Result<Self> {
        info!(
            host = %config.host,
            port = config.port,
            username = %config.username,
            "Connecting to SFTP server"
        );

        let timeout = Duration::from_secs(config.timeout);
        let ssh_config = Arc::new(client::Config {
            inactivity_timeout: Some(timeout),
            ..Default::default()
        });
        let handler = HostKeyCheck {
            host: config.host.clone(),
            expected: config.host_key_fingerprint.clone(),
        };

        let mut session = tokio::time::timeout(
            timeout,
            client::connect(ssh_config, (config.host.as_str(), config.port), handler),
        )
        .await
        .map_err(|_| Error::Ssh(format!("Timed out connecting to {}:{}", config.host, config.port)))??;

        let authenticated = if let Some(identity) = &config.identity {
            let key = load_secret_key(identity, None)
                .map_err(|e| Error::Ssh(format!("Failed to load identity {:?}: {}", identity, e)))?;
            let hash_alg = session.best_supported_rsa_hash().await?.flatten();
            session
                .authenticate_publickey(
                    config.username.as_str(),
                    PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg),
                )
                .await?
                .success()
        } else if let Some(password) = &config.password {
            session
                .authenticate_password(config.username.as_str(), password.as_str())
                .await?
                .success()
        } else {
            false
        };

        if !authenticated {
            warn!(username = %config.username, host = %config.host, "SFTP authentication failed");
            return Err(Error::Ssh(format!("Authentication failed for {}", config.username)));
        }

        let channel = session.channel_open_session().await?;
        channel.request_subsystem(true, "sftp").await?;
        let sftp = SftpSession::new(channel.into_stream()).await?;

        info!(host = %config.host, "SFTP session established");
        Ok(Self { session, sftp })
    }

    /// Close the SFTP subsystem and the SSH session
    pub async fn disconnect(self) -> Result<()> {
        info!("Disconnecting from SFTP server");
        self.sftp.close().await?;
        self.session
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await?;
        Ok(())
    }
}

#[async_trait]
impl SftpChannel for SftpConnection {
    async fn open_read(&self, path: &str) -> Result<ObjectStream> {
        debug!(path, "Opening remote file");
        let file = self.sftp.open(path).await?;
        Ok(Box::pin(file))
    }

    async fn remove(&self, path: &str) -> Result<()> {
        debug!(path, "Removing remote file");
        self.sftp.remove_file(path).await?;
        Ok(())
    }

    async fn put_file(&self, local: &Path, remote: &str) -> Result<u64> {
        debug!(local = ?local, remote, "Uploading file");
        let mut source = tokio::fs::File::open(local).await?;
        let mut target = self.sftp.create(remote).await?;
        let bytes = tokio::io::copy(&mut source, &mut target).await?;
        target.shutdown().await?;
        Ok(bytes)
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        debug!(from, to, "Renaming remote file");
        self.sftp.rename(from, to).await?;
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.sftp.try_exists(path).await?)
    }
}
