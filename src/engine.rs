//! Engine Module
//!
//! The device table that owns every store and routes commands to them.
//!
//! ## Responsibilities
//! - Validate config and create `device_count` independent stores
//! - Hand out sessions on a device
//! - Route protocol commands against a caller-owned session slot
//! - Tear all stores down together

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::Config;
use crate::error::{Result, StoreError};
use crate::protocol::Command;
use crate::session::{OpenOptions, Session};
use crate::store::{DeviceStats, DeviceStore};

/// Result of executing a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Command completed with nothing to return
    Done,

    /// Bytes read (empty at end of data or a hole)
    Data(Vec<u8>),

    /// Bytes written by a single store call
    Written(usize),

    /// Device stats
    Stats(DeviceStats),

    Pong,
}

/// The device table
///
/// ## Concurrency Model
///
/// Stores are independent: each carries its own lock and no operation
/// touches more than one store, so there is no ordering across devices.
/// The table itself is immutable after `open`.
pub struct Engine {
    /// One store per device index
    devices: Vec<Arc<DeviceStore>>,
}

impl Engine {
    /// Create the device table from config
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        let devices = (0..config.device_count)
            .map(|index| DeviceStore::from_config(index, &config).map(Arc::new))
            .collect::<Result<Vec<_>>>()?;

        info!(
            "Created {} devices (quantum={}, qset={}, lock={:?})",
            devices.len(),
            config.quantum_size,
            config.blocks_per_segment,
            config.lock_policy
        );

        Ok(Self { devices })
    }

    /// Open with default config
    pub fn open_default() -> Result<Self> {
        Self::open(Config::default())
    }

    /// Store for `index`
    pub fn device(&self, index: usize) -> Result<Arc<DeviceStore>> {
        self.devices
            .get(index)
            .cloned()
            .ok_or(StoreError::DeviceNotFound(index))
    }

    /// Open a session on `index`
    pub fn open_session(&self, index: usize, options: OpenOptions) -> Result<Session> {
        Session::open(self.device(index)?, options)
    }

    /// Reset `index` directly
    pub fn reset(&self, index: usize) -> Result<()> {
        self.device(index)?.reset()
    }

    /// Stats for `index`
    pub fn stats(&self, index: usize) -> Result<DeviceStats> {
        Ok(self.device(index)?.stats())
    }

    /// Execute a command
    ///
    /// `session` is the caller's handle slot: OPEN fills it, RELEASE empties
    /// it, READ/WRITE need it.
    pub fn execute(&self, command: Command, session: &mut Option<Session>) -> Result<Reply> {
        match command {
            Command::Open {
                device,
                mode,
                truncate,
            } => {
                let opened = self.open_session(device as usize, OpenOptions::new(mode).truncate(truncate))?;
                if let Some(previous) = session.replace(opened) {
                    previous.release();
                }
                Ok(Reply::Done)
            }
            Command::Read { max_len } => {
                let session = session.as_mut().ok_or(StoreError::NoSession)?;
                Ok(Reply::Data(session.read(max_len as usize)?))
            }
            Command::Write { data } => {
                let session = session.as_mut().ok_or(StoreError::NoSession)?;
                Ok(Reply::Written(session.write(&data)?))
            }
            Command::Release => {
                let closed = session.take().ok_or(StoreError::NoSession)?;
                closed.release();
                Ok(Reply::Done)
            }
            Command::Reset { device } => {
                self.reset(device as usize)?;
                Ok(Reply::Done)
            }
            Command::Stat { device } => Ok(Reply::Stats(self.stats(device as usize)?)),
            Command::Ping => Ok(Reply::Pong),
        }
    }

    /// Release the memory held by every store
    ///
    /// Devices stay addressable and come back empty, like a freshly opened
    /// table. Sessions still open keep working against the emptied stores.
    pub fn close(&self) -> Result<()> {
        let held: u64 = self.devices.iter().map(|d| d.stats().allocated_bytes).sum();
        for device in &self.devices {
            device.reset()?;
        }
        debug!("Closed engine: {} devices, {} bytes released", self.devices.len(), held);
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Number of devices
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }
}
