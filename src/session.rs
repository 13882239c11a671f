//! Session Module
//!
//! File-like handle over a device store.
//!
//! ## Responsibilities
//! - Own the offset cursor and advance it by what the store returns
//! - Reset the store when opened write-only or with truncate
//! - Enforce the access mode before touching the store
//! - Loop single-quantum store calls for larger transfers

use std::sync::Arc;

use tracing::debug;

use crate::error::{Result, StoreError};
use crate::store::{CancelToken, DeviceStore};

/// How a session may use its device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AccessMode {
    ReadOnly = 0x00,
    WriteOnly = 0x01,
    ReadWrite = 0x02,
}

impl AccessMode {
    pub fn can_read(self) -> bool {
        matches!(self, AccessMode::ReadOnly | AccessMode::ReadWrite)
    }

    pub fn can_write(self) -> bool {
        matches!(self, AccessMode::WriteOnly | AccessMode::ReadWrite)
    }
}

impl TryFrom<u8> for AccessMode {
    type Error = StoreError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x00 => Ok(AccessMode::ReadOnly),
            0x01 => Ok(AccessMode::WriteOnly),
            0x02 => Ok(AccessMode::ReadWrite),
            _ => Err(StoreError::Protocol(format!("Unknown access mode: 0x{:02x}", value))),
        }
    }
}

/// Options for opening a session
#[derive(Debug, Clone)]
pub struct OpenOptions {
    mode: AccessMode,
    truncate: bool,
    cancel: Option<CancelToken>,
}

impl OpenOptions {
    pub fn new(mode: AccessMode) -> Self {
        Self {
            mode,
            truncate: false,
            cancel: None,
        }
    }

    /// Reset the store on open regardless of mode
    pub fn truncate(mut self, truncate: bool) -> Self {
        self.truncate = truncate;
        self
    }

    /// Make the session's lock waits cancellable
    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// Write-only opens always truncate
    pub fn truncates(&self) -> bool {
        self.truncate || self.mode == AccessMode::WriteOnly
    }
}

/// An open handle on one device
pub struct Session {
    device: Arc<DeviceStore>,
    mode: AccessMode,
    position: u64,
    cancel: Option<CancelToken>,
}

impl Session {
    /// Open a session, resetting the device first if the options truncate
    pub fn open(device: Arc<DeviceStore>, options: OpenOptions) -> Result<Self> {
        let session = Self {
            device,
            mode: options.mode,
            position: 0,
            cancel: options.cancel.clone(),
        };

        if options.truncates() {
            match &session.cancel {
                Some(token) => session.device.interruptible(token).reset()?,
                None => session.device.reset()?,
            }
        }

        debug!(
            device = session.device.index(),
            mode = ?session.mode,
            truncated = options.truncates(),
            "Session opened"
        );
        Ok(session)
    }

    /// Read up to `len` bytes from the cursor (at most one quantum)
    pub fn read(&mut self, len: usize) -> Result<Vec<u8>> {
        if !self.mode.can_read() {
            return Err(StoreError::InvalidAccess(format!(
                "read on {:?} session",
                self.mode
            )));
        }

        let data = match &self.cancel {
            Some(token) => self.device.interruptible(token).read(self.position, len)?,
            None => self.device.read(self.position, len)?,
        };
        self.position += data.len() as u64;
        Ok(data)
    }

    /// Write from the cursor; returns bytes written (at most one quantum)
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        if !self.mode.can_write() {
            return Err(StoreError::InvalidAccess(format!(
                "write on {:?} session",
                self.mode
            )));
        }

        let written = match &self.cancel {
            Some(token) => self.device.interruptible(token).write(self.position, data)?,
            None => self.device.write(self.position, data)?,
        };
        self.position += written as u64;
        Ok(written)
    }

    /// Write all of `data`, one quantum per store call
    ///
    /// On error the cursor reflects the bytes that did land.
    pub fn write_all(&mut self, mut data: &[u8]) -> Result<()> {
        while !data.is_empty() {
            let written = self.write(data)?;
            data = &data[written..];
        }
        Ok(())
    }

    /// Read from the cursor until end of data or the first hole
    pub fn read_to_end(&mut self) -> Result<Vec<u8>> {
        let chunk = self.device.geometry().quantum_size();
        let mut out = Vec::new();

        loop {
            let data = self.read(chunk)?;
            if data.is_empty() {
                return Ok(out);
            }
            out.extend_from_slice(&data);
        }
    }

    /// Current cursor
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    pub fn device(&self) -> &Arc<DeviceStore> {
        &self.device
    }

    /// Close the session; the device is unaffected
    pub fn release(self) {
        debug!(device = self.device.index(), position = self.position, "Session released");
    }
}
