//! Store Module
//!
//! Sparse, lazily-grown byte storage for a single device.
//!
//! ## Layout
//! ```text
//! DeviceStore
//!   └── segments: [Segment 0] [Segment 1] ... [Segment N]
//!                      │
//!                      └── slots: [Q 0] [Q 1] [ -- ] [Q 3] ...
//!                                  │           hole
//!                                  └── quantum_size bytes
//! ```
//!
//! ## Responsibilities
//! - Map byte offsets to (segment, slot, offset-in-quantum)
//! - Allocate segments, slot arrays and quanta only when written
//! - Treat anything unallocated as a hole: reads stop there
//! - Guard each device with one lock; waits may be cancelled
//!
//! ## Data Structure Choice
//! Segments live in a `Vec` indexed by position rather than a linked list,
//! so following to segment N is a bounds check plus growth.

mod device;
mod geometry;
mod lock;
mod segment;

pub use device::{DeviceStore, Interruptible};
pub use geometry::{Geometry, Position};
pub use lock::CancelToken;
pub use segment::{Budget, Segment, SegmentTable};

use serde::{Deserialize, Serialize};

/// Macro-state of a device store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreState {
    /// No content since the last reset
    JustReset,

    /// At least one successful write since the last reset
    Active,
}

/// Point-in-time view of a device store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStats {
    pub device: u64,
    pub size: u64,
    pub quantum_size: u64,
    pub blocks_per_segment: u64,
    pub segments: u64,
    pub allocated_quanta: u64,
    pub allocated_bytes: u64,
    pub state: StoreState,
}
