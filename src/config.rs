//! Service configuration.
//!
//! TOML file with `[service]`, `[decode]` and `[[keys]]` sections; missing
//! fields fall back to defaults, and a handful of environment variables
//! override the file for containerized deployments.

use crate::crypto::{keyring, Keyring};
use crate::defaults;
use crate::error::Result;
use crate::transcode::AudioFormat;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub decode: DecodeConfig,
    /// Decryption keys; algorithm inferred from key length.
    pub keys: Vec<KeyEntry>,
}

/// HTTP service and job manager settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    pub bind_addr: String,
    pub port: u16,
    pub output_dir: PathBuf,
    pub auth_token: Option<String>,
    pub worker_count: usize,
    pub max_queue_size: usize,
    /// Per-job wall clock budget; humantime syntax ("30s", "2m") or bare
    /// seconds.
    pub job_timeout: String,
    pub upload_script: Option<PathBuf>,
}

/// Decode output settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DecodeConfig {
    pub audio_format: AudioFormat,
    /// kbit/s; 0 picks the format default.
    pub audio_bitrate: u32,
    pub delete_temp_files: bool,
}

/// One configured key: `{ id = "0x0001", key = "0001020304050607" }`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeyEntry {
    pub id: String,
    pub key: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: defaults::DEFAULT_PORT,
            output_dir: PathBuf::from("."),
            auth_token: None,
            worker_count: defaults::DEFAULT_WORKER_COUNT,
            max_queue_size: defaults::DEFAULT_MAX_QUEUE_SIZE,
            job_timeout: "30s".to_string(),
            upload_script: None,
        }
    }
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            audio_format: AudioFormat::Wav,
            audio_bitrate: 0,
            delete_temp_files: true,
        }
    }
}

impl ServiceConfig {
    /// Parsed job timeout, falling back to the default on bad syntax.
    pub fn job_timeout(&self) -> Duration {
        parse_duration(&self.job_timeout).unwrap_or(defaults::DEFAULT_JOB_TIMEOUT)
    }
}

/// Parse a duration string: bare seconds or humantime syntax.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    humantime::parse_duration(s).ok()
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if the file does
    /// not exist. Invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e) => {
                if e.downcast_ref::<std::io::Error>()
                    .map(|io_err| io_err.kind() == std::io::ErrorKind::NotFound)
                    .unwrap_or(false)
                {
                    Ok(Self::default())
                } else {
                    Err(e)
                }
            }
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - TRUNK_DECODER_PORT → service.port
    /// - TRUNK_DECODER_OUTPUT_DIR → service.output_dir
    /// - TRUNK_DECODER_AUTH_TOKEN → service.auth_token
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(port) = std::env::var("TRUNK_DECODER_PORT") {
            if let Ok(port) = port.parse() {
                self.service.port = port;
            }
        }
        if let Ok(dir) = std::env::var("TRUNK_DECODER_OUTPUT_DIR") {
            if !dir.is_empty() {
                self.service.output_dir = PathBuf::from(dir);
            }
        }
        if let Ok(token) = std::env::var("TRUNK_DECODER_AUTH_TOKEN") {
            if !token.is_empty() {
                self.service.auth_token = Some(token);
            }
        }
        self
    }

    /// Build the keyring from the configured key entries.
    pub fn build_keyring(&self) -> Result<Keyring> {
        let mut ring = Keyring::new();
        for entry in &self.keys {
            let (key_id, key) = keyring::parse_key_spec(&format!("{}:{}", entry.id, entry.key))?;
            ring.add_key(key_id, &key)?;
        }
        Ok(ring)
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/trunk-decoder/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("trunk-decoder")
            .join("config.toml")
    }
}
