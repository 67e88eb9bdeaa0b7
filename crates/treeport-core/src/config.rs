//! Portal configuration
//!
//! Loaded once at startup and passed to the projector and transports.
//! Nothing in the workspace reads configuration from global state.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::{DirectoryMapping, Error, Result, TransferMode};

/// Smallest part size S3 accepts for every part but the last
pub const MIN_PART_SIZE_FLOOR: usize = 5 * 1024 * 1024;

/// Portal configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Bucket holding every mapping target
    pub bucket: String,

    /// Region of the bucket
    #[serde(default = "default_region")]
    pub region: String,

    /// Custom S3 endpoint (MinIO, VPC endpoint)
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Transport used for file operations
    #[serde(default)]
    pub mode: TransferMode,

    /// SFTP connection settings, required in SFTP mode
    #[serde(default)]
    pub sftp: Option<SftpConfig>,

    /// Upload tuning
    #[serde(default)]
    pub upload: UploadConfig,

    /// Audit event settings
    #[serde(default)]
    pub audit: AuditConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Directory mappings visible to the command-line front end
    #[serde(default)]
    pub mappings: Vec<DirectoryMapping>,
}

/// SFTP connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SftpConfig {
    pub host: String,

    #[serde(default = "default_sftp_port")]
    pub port: u16,

    pub username: String,

    /// Password authentication
    #[serde(default)]
    pub password: Option<String>,

    /// Private key authentication
    #[serde(default)]
    pub identity: Option<PathBuf>,

    /// Expected server host key fingerprint (`SHA256:...`); any key is
    /// accepted and logged when unset
    #[serde(default)]
    pub host_key_fingerprint: Option<String>,

    /// Connection timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

/// Multipart upload tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Bytes per multipart part (default 10 MiB)
    pub min_part_size: usize,
    /// Parts uploaded concurrently
    pub max_concurrent_parts: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            min_part_size: 10 * 1024 * 1024,
            max_concurrent_parts: 8,
        }
    }
}

/// Audit event settings
///
/// NIST 800-53: AU-2 (Audit Events), AU-12 (Audit Generation)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Stream name prefixed to every audit line
    pub stream: String,
    pub enabled: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            stream: "treeport".to_string(),
            enabled: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (text or json)
    pub format: LogFormat,
    /// Optional log file path (logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            file: None,
        }
    }
}

/// Log format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Plain text logging for human readability
    Text,
    /// JSON structured logging for log aggregators
    Json,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            bucket: "transfer-bucket".to_string(),
            region: default_region(),
            endpoint: None,
            mode: TransferMode::S3,
            sftp: None,
            upload: UploadConfig::default(),
            audit: AuditConfig::default(),
            logging: LoggingConfig::default(),
            mappings: vec![DirectoryMapping::new(
                1,
                1,
                "/personal",
                "/transfer-bucket/alice",
                true,
            )],
        }
    }
}

impl PortalConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Serialize configuration to TOML text
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.bucket.trim().is_empty() || self.bucket.contains('/') {
            return Err(Error::Config(format!("Invalid bucket name: {:?}", self.bucket)));
        }

        if self.upload.min_part_size < MIN_PART_SIZE_FLOOR {
            return Err(Error::Config(format!(
                "upload.min_part_size must be at least {} bytes",
                MIN_PART_SIZE_FLOOR
            )));
        }

        if self.upload.max_concurrent_parts == 0 {
            return Err(Error::Config(
                "upload.max_concurrent_parts must be at least 1".to_string(),
            ));
        }

        if self.mode == TransferMode::Sftp {
            let sftp = self
                .sftp
                .as_ref()
                .ok_or_else(|| Error::Config("SFTP mode requires an [sftp] section".to_string()))?;
            if sftp.password.is_none() && sftp.identity.is_none() {
                return Err(Error::Config(
                    "sftp needs either a password or an identity file".to_string(),
                ));
            }
        }

        for mapping in &self.mappings {
            mapping.storage_prefix(&self.bucket).map_err(|e| Error::Config(e.to_string()))?;
            if !mapping.entry.starts_with('/') {
                return Err(Error::Config(format!(
                    "mapping {} entry must be absolute: {}",
                    mapping.id, mapping.entry
                )));
            }
        }

        Ok(())
    }
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_sftp_port() -> u16 {
    22
}

fn default_timeout() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PortalConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.upload.min_part_size, 10 * 1024 * 1024);
    }

    #[test]
    fn test_part_size_floor() {
        let mut config = PortalConfig::default();
        config.upload.min_part_size = 1024;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sftp_mode_requires_section() {
        let mut config = PortalConfig::default();
        config.mode = TransferMode::Sftp;
        assert!(config.validate().is_err());

        config.sftp = Some(SftpConfig {
            host: "sftp.example.com".to_string(),
            port: 22,
            username: "alice".to_string(),
            password: Some("secret".to_string()),
            identity: None,
            host_key_fingerprint: None,
            timeout: 30,
        });
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_mapping_outside_bucket_rejected() {
        let mut config = PortalConfig::default();
        config.mappings.push(DirectoryMapping::new(2, 1, "/shared", "/other/team", false));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_minimal_toml() {
        let config = PortalConfig::from_toml(
            r#"
            bucket = "files"
            mode = "s3"

            [[mappings]]
            id = 4
            user_id = 9
            entry = "/personal"
            target = "/files/bob"
            writable = true
            "#,
        )
        .unwrap();
        assert_eq!(config.bucket, "files");
        assert_eq!(config.region, "us-east-1");
        assert_eq!(config.mappings.len(), 1);
        assert_eq!(config.audit.stream, "treeport");
        assert_eq!(config.logging.format, LogFormat::Text);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = PortalConfig::default();
        let text = config.to_toml().unwrap();
        let parsed = PortalConfig::from_toml(&text).unwrap();
        assert_eq!(parsed.bucket, config.bucket);
        assert_eq!(parsed.mappings, config.mappings);
    }
}
