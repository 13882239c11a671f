//! Device store implementation
//!
//! One sparse byte-addressable store per logical device, guarded by a single
//! parking_lot `RwLock`.

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::config::{Config, LockPolicy};
use crate::error::{Result, StoreError};

use super::geometry::Geometry;
use super::lock::{self, CancelToken};
use super::segment::SegmentTable;
use super::{DeviceStats, StoreState};

/// Sparse store for one device
///
/// ## Concurrency:
/// - `write` and `reset` hold the writer side for their whole body
/// - `read` holds the reader side (or the writer side under
///   `LockPolicy::Exclusive`)
/// - No operation releases and reacquires the lock midway
pub struct DeviceStore {
    /// Device index in the engine's table
    index: usize,

    /// Geometry restored on every reset
    defaults: Geometry,

    /// Which side of the lock reads take
    lock_policy: LockPolicy,

    inner: RwLock<StoreInner>,
}

/// Everything guarded by the device lock
struct StoreInner {
    /// Only replaced by reset
    geometry: Geometry,

    /// High-water mark of completed writes since the last reset
    size: u64,

    state: StoreState,

    table: SegmentTable,
}

impl DeviceStore {
    /// Create an empty store
    pub fn new(index: usize, defaults: Geometry, lock_policy: LockPolicy, memory_limit: Option<usize>) -> Self {
        Self {
            index,
            defaults,
            lock_policy,
            inner: RwLock::new(StoreInner {
                geometry: defaults,
                size: 0,
                state: StoreState::JustReset,
                table: SegmentTable::new(memory_limit),
            }),
        }
    }

    /// Create an empty store from config defaults
    pub fn from_config(index: usize, config: &Config) -> Result<Self> {
        let defaults = Geometry::from_config(config)?;
        Ok(Self::new(index, defaults, config.lock_policy, config.memory_limit))
    }

    // =========================================================================
    // Core Operations
    // =========================================================================

    /// Write up to one quantum of `data` at `offset`
    ///
    /// Returns the number of bytes written, which is capped at the end of the
    /// quantum containing `offset`. Callers loop for larger transfers.
    pub fn write(&self, offset: u64, data: &[u8]) -> Result<usize> {
        self.write_with(offset, data, None)
    }

    /// Read up to `max_len` bytes at `offset`
    ///
    /// Returns an empty vector at or past the end of data and at holes.
    pub fn read(&self, offset: u64, max_len: usize) -> Result<Vec<u8>> {
        self.read_with(offset, max_len, None)
    }

    /// Read into `buf` at `offset`, returning the number of bytes copied
    pub fn read_into(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        self.read_into_with(offset, buf, None)
    }

    /// Drop all content and restore default geometry
    pub fn reset(&self) -> Result<()> {
        self.reset_with(None)
    }

    /// View of this store whose lock waits can be cancelled through `token`
    pub fn interruptible<'a>(&'a self, token: &'a CancelToken) -> Interruptible<'a> {
        Interruptible { store: self, token }
    }

    fn write_with(&self, offset: u64, data: &[u8], token: Option<&CancelToken>) -> Result<usize> {
        let mut inner = lock::write(&self.inner, token)?;
        let written = inner.write(offset, data)?;

        trace!(device = self.index, offset, written, "write");
        Ok(written)
    }

    fn read_with(&self, offset: u64, max_len: usize, token: Option<&CancelToken>) -> Result<Vec<u8>> {
        let data = match self.lock_policy {
            LockPolicy::Shared => lock::read(&self.inner, token)?.read(offset, max_len),
            LockPolicy::Exclusive => lock::write(&self.inner, token)?.read(offset, max_len),
        };

        trace!(device = self.index, offset, read = data.len(), "read");
        Ok(data)
    }

    fn read_into_with(&self, offset: u64, buf: &mut [u8], token: Option<&CancelToken>) -> Result<usize> {
        let count = match self.lock_policy {
            LockPolicy::Shared => lock::read(&self.inner, token)?.read_into(offset, buf),
            LockPolicy::Exclusive => lock::write(&self.inner, token)?.read_into(offset, buf),
        };
        Ok(count)
    }

    fn reset_with(&self, token: Option<&CancelToken>) -> Result<()> {
        let mut inner = lock::write(&self.inner, token)?;
        let freed_segments = inner.table.len();

        inner.table.clear();
        inner.size = 0;
        inner.geometry = self.defaults;
        inner.state = StoreState::JustReset;

        debug!(device = self.index, freed_segments, "Device reset");
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Device index
    pub fn index(&self) -> usize {
        self.index
    }

    /// Current logical length in bytes
    pub fn size(&self) -> u64 {
        self.inner.read().size
    }

    /// Geometry in effect until the next reset
    pub fn geometry(&self) -> Geometry {
        self.inner.read().geometry
    }

    pub fn state(&self) -> StoreState {
        self.inner.read().state
    }

    pub fn lock_policy(&self) -> LockPolicy {
        self.lock_policy
    }

    /// Snapshot of the store's shape
    pub fn stats(&self) -> DeviceStats {
        let inner = self.inner.read();
        DeviceStats {
            device: self.index as u64,
            size: inner.size,
            quantum_size: inner.geometry.quantum_size() as u64,
            blocks_per_segment: inner.geometry.blocks_per_segment() as u64,
            segments: inner.table.len() as u64,
            allocated_quanta: inner.table.allocated_quanta() as u64,
            allocated_bytes: inner.table.allocated_bytes() as u64,
            state: inner.state,
        }
    }
}

impl StoreInner {
    /// Called with the writer side held
    fn write(&mut self, offset: u64, data: &[u8]) -> Result<usize> {
        if data.is_empty() {
            return Ok(0);
        }

        let geometry = self.geometry;
        let position = geometry.locate(offset);
        let count = data.len().min(geometry.room(&position));

        let end = offset.checked_add(count as u64).ok_or_else(|| {
            StoreError::InvalidAccess(format!("write at {} overflows the address space", offset))
        })?;

        let quantum = self.table.quantum_mut(&position, &geometry)?;
        let start = position.quantum_offset;
        quantum[start..start + count].copy_from_slice(&data[..count]);

        self.size = self.size.max(end);
        self.state = StoreState::Active;
        Ok(count)
    }

    /// Called with either side held
    fn read_into(&self, offset: u64, buf: &mut [u8]) -> usize {
        if offset >= self.size {
            return 0;
        }

        let remaining = self.size - offset;
        let wanted = (buf.len() as u64).min(remaining) as usize;

        let position = self.geometry.locate(offset);
        let Some(quantum) = self.table.quantum(&position) else {
            return 0;
        };

        let count = wanted.min(self.geometry.room(&position));
        let start = position.quantum_offset;
        buf[..count].copy_from_slice(&quantum[start..start + count]);
        count
    }

    fn read(&self, offset: u64, max_len: usize) -> Vec<u8> {
        if offset >= self.size {
            return Vec::new();
        }

        // Never more than one quantum or the remaining length
        let position = self.geometry.locate(offset);
        let cap = (self.size - offset)
            .min(max_len as u64)
            .min(self.geometry.room(&position) as u64) as usize;

        let mut buf = vec![0u8; cap];
        let count = self.read_into(offset, &mut buf);
        buf.truncate(count);
        buf
    }
}

/// A [`DeviceStore`] whose lock waits observe a [`CancelToken`]
pub struct Interruptible<'a> {
    store: &'a DeviceStore,
    token: &'a CancelToken,
}

impl Interruptible<'_> {
    pub fn write(&self, offset: u64, data: &[u8]) -> Result<usize> {
        self.store.write_with(offset, data, Some(self.token))
    }

    pub fn read(&self, offset: u64, max_len: usize) -> Result<Vec<u8>> {
        self.store.read_with(offset, max_len, Some(self.token))
    }

    pub fn read_into(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        self.store.read_into_with(offset, buf, Some(self.token))
    }

    pub fn reset(&self) -> Result<()> {
        self.store.reset_with(Some(self.token))
    }
}
