//! Configuration for QuantaStore
//!
//! Centralized configuration with sensible defaults. Geometry defaults are
//! consumed when a device store is created and every time it is reset.

use crate::error::{Result, StoreError};

/// Default bytes per quantum
pub const DEFAULT_QUANTUM_SIZE: usize = 4000;

/// Default quantum slots per segment
pub const DEFAULT_QSET: usize = 1000;

/// Default number of independent device stores
pub const DEFAULT_DEVICE_COUNT: usize = 4;

/// Main configuration for a QuantaStore instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Store Geometry
    // -------------------------------------------------------------------------
    /// Bytes per quantum (leaf buffer)
    pub quantum_size: usize,

    /// Quantum slots per segment ("qset")
    pub blocks_per_segment: usize,

    /// Number of independent device stores
    pub device_count: usize,

    // -------------------------------------------------------------------------
    // Resource / Concurrency
    // -------------------------------------------------------------------------
    /// How reads take the device lock
    pub lock_policy: LockPolicy,

    /// Per-device cap on allocated bytes (segment records + slot arrays + quanta), None = unbounded
    pub memory_limit: Option<usize>,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Max concurrent client connections (also the worker pool size)
    pub max_connections: usize,

    /// Connection read timeout (milliseconds, 0 = none)
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds, 0 = none)
    pub write_timeout_ms: u64,
}

/// Lock discipline used by device reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockPolicy {
    /// Reader/writer lock: concurrent readers, exclusive writers
    Shared,

    /// Reads take the writer side too (one reader or writer at a time)
    Exclusive,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            quantum_size: DEFAULT_QUANTUM_SIZE,
            blocks_per_segment: DEFAULT_QSET,
            device_count: DEFAULT_DEVICE_COUNT,
            lock_policy: LockPolicy::Shared,
            memory_limit: None,
            listen_addr: "127.0.0.1:7070".to_string(),
            max_connections: 64,
            read_timeout_ms: 0,
            write_timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject configurations the store cannot be built from
    pub fn validate(&self) -> Result<()> {
        if self.quantum_size == 0 {
            return Err(StoreError::Config("quantum_size must be positive".to_string()));
        }
        if self.blocks_per_segment == 0 {
            return Err(StoreError::Config(
                "blocks_per_segment must be positive".to_string(),
            ));
        }
        if self.quantum_size.checked_mul(self.blocks_per_segment).is_none() {
            return Err(StoreError::Config(format!(
                "segment span overflows: {} * {}",
                self.quantum_size, self.blocks_per_segment
            )));
        }
        if self.device_count == 0 {
            return Err(StoreError::Config("device_count must be positive".to_string()));
        }
        if self.max_connections == 0 {
            return Err(StoreError::Config(
                "max_connections must be positive".to_string(),
            ));
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
    /// Set the quantum size (in bytes)
    pub fn quantum_size(mut self, bytes: usize) -> Self {
        self.config.quantum_size = bytes;
        self
    }

    /// Set the number of quantum slots per segment
    pub fn blocks_per_segment(mut self, count: usize) -> Self {
        self.config.blocks_per_segment = count;
        self
    }

    /// Set the number of device stores
    pub fn device_count(mut self, count: usize) -> Self {
        self.config.device_count = count;
        self
    }

    /// Set the read lock policy
    pub fn lock_policy(mut self, policy: LockPolicy) -> Self {
        self.config.lock_policy = policy;
        self
    }

    /// Cap allocated bytes per device
    pub fn memory_limit(mut self, bytes: usize) -> Self {
        self.config.memory_limit = Some(bytes);
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
