//! Configuration Module
//!
//! This module reads configuration values from environment variables, provides
//! sensible defaults, and validates key security parameters such as maximum
//! attachment sizes and decompression limits.

use anyhow::Result;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub max_file_size: usize,
    pub max_decompressed_size: usize,
    pub max_compression_ratio: f64,
    pub dns_timeout: Duration,
    pub maildir: PathBuf,
    pub test_maildir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_file_size: 10 * 1024 * 1024,
            max_decompressed_size: 100 * 1024 * 1024,
            max_compression_ratio: 1000.0,
            dns_timeout: Duration::from_secs(5),
            maildir: PathBuf::from("Maildir"),
            test_maildir: None,
        }
    }
}

impl Config {
    /// Creates a new configuration by reading environment variables.
    /// If a variable is missing or empty, a default value is used.
    pub fn new() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let var = |key: &str| {
            lookup(key)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };

        let max_file_size = var("DMARC_MAX_FILE_SIZE")
            .and_then(|s| parse_value(&s))
            .unwrap_or(defaults.max_file_size);
        if max_file_size > 500_000_000 {
            return Err(anyhow::anyhow!("Max file size too large (500MB limit)"));
        }

        let max_decompressed_size = var("DMARC_MAX_DECOMPRESSED_SIZE")
            .and_then(|s| parse_value(&s))
            .unwrap_or(defaults.max_decompressed_size);

        let max_compression_ratio = var("DMARC_MAX_COMPRESSION_RATIO")
            .and_then(|s| parse_value(&s))
            .unwrap_or(defaults.max_compression_ratio);

        let dns_timeout = var("DMARC_DNS_TIMEOUT_SECS")
            .and_then(|s| parse_value(&s))
            .map(Duration::from_secs)
            .unwrap_or(defaults.dns_timeout);

        let maildir = var("DMARC_MAILDIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.maildir);

        let test_maildir = var("DMARC_TEST_MAILDIR").map(PathBuf::from);

        Ok(Config {
            max_file_size,
            max_decompressed_size,
            max_compression_ratio,
            dns_timeout,
            maildir,
            test_maildir,
        })
    }

    /// Mailbox read by `--test`: the configured one, or the `.Old` subfolder.
    pub fn test_mailbox(&self) -> PathBuf {
        self.test_maildir
            .clone()
            .unwrap_or_else(|| self.maildir.join(".Old"))
    }
}

fn parse_value<T: FromStr>(raw: &str) -> Option<T> {
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("Ignoring unparsable configuration value {:?}", raw);
            None
        }
    }
}
