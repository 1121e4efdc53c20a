//! Configuration for Storer
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, StoreError};

/// Main configuration for a Storer instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Database name; the backing file is `{data_dir}/{name}.db`
    pub name: String,

    /// Directory holding the database file
    pub data_dir: PathBuf,

    /// Max time to wait for the exclusive file lock when opening
    ///
    /// Zero means a single attempt.
    pub open_timeout: Duration,

    // -------------------------------------------------------------------------
    // Maintenance Configuration
    // -------------------------------------------------------------------------
    /// Remove overdue TTL records on every supervisor tick
    pub autoclean: bool,

    /// Period of the supervisor's maintenance tick
    pub scan_interval: Duration,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Max concurrent client connections
    pub max_connections: usize,

    /// Connection read timeout (milliseconds)
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds)
    pub write_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: Self::DEFAULT_NAME.to_string(),
            data_dir: PathBuf::from("."),
            open_timeout: Duration::from_secs(2),
            autoclean: false,
            scan_interval: Duration::from_secs(15),
            listen_addr: "127.0.0.1:7070".to_string(),
            max_connections: 1024,
            read_timeout_ms: 5000,
            write_timeout_ms: 5000,
        }
    }
}

impl Config {
    pub const DEFAULT_NAME: &'static str = "app";

    /// File extension of database files
    pub const EXTENSION: &'static str = "db";

    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Path of the database file for `name` under this config's data dir
    pub fn database_path(&self, name: &str) -> PathBuf {
        self.data_dir.join(format!("{}.{}", name, Self::EXTENSION))
    }

    /// Check the values that would otherwise fail late
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(StoreError::Config("database name must not be empty".to_string()));
        }
        if self.name.contains(&['/', '\\'][..]) {
            return Err(StoreError::Config(format!(
                "database name ({}) must not contain path separators",
                self.name
            )));
        }
        if self.scan_interval.is_zero() {
            return Err(StoreError::Config("scan interval must be non-zero".to_string()));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the database name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Set the data directory
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the open (lock acquisition) timeout
    pub fn open_timeout(mut self, timeout: Duration) -> Self {
        self.config.open_timeout = timeout;
        self
    }

    /// Enable or disable the autoclean sweep
    pub fn autoclean(mut self, enabled: bool) -> Self {
        self.config.autoclean = enabled;
        self
    }

    /// Set the supervisor tick period
    pub fn scan_interval(mut self, interval: Duration) -> Self {
        self.config.scan_interval = interval;
        self
    }

    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
