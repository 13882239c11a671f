//! # QuantaStore
//!
//! A sparse, lazily-grown, byte-addressable device store with:
//! - Two-level storage: segments of fixed-size quanta, allocated on write
//! - Hole semantics: unwritten quanta read as absent, never zero-filled
//! - One lock per device, reader/writer or exclusive, with cancellable waits
//! - A file-like session layer and a TCP client protocol
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TCP Server                              │
//! │              (one session per connection)                    │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                  Engine (device table)                       │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┼────────────┐
//!          ▼            ▼            ▼
//!   ┌─────────────┐ ┌─────────────┐ ┌─────────────┐
//!   │ DeviceStore │ │ DeviceStore │ │ DeviceStore │
//!   │  (RwLock)   │ │  (RwLock)   │ │  (RwLock)   │
//!   └──────┬──────┘ └─────────────┘ └─────────────┘
//!          │
//!          ▼
//!   [Segment] → [slot][slot][hole][slot] → quantum bytes
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod store;
pub mod session;
pub mod network;
pub mod protocol;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{StoreError, Result};
pub use config::{Config, LockPolicy};
pub use engine::{Engine, Reply};
pub use session::{AccessMode, OpenOptions, Session};
pub use store::{CancelToken, DeviceStats, DeviceStore, Geometry, StoreState};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of QuantaStore
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
