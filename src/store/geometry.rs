//! Store geometry and offset addressing
//!
//! Maps a byte offset to (segment, slot, offset-in-quantum):
//!
//! ```text
//! span           = quantum_size * blocks_per_segment
//! segment        = offset / span
//! slot           = (offset % span) / quantum_size
//! quantum_offset = offset % quantum_size
//! ```

use crate::config::Config;
use crate::error::{Result, StoreError};

/// Fixed layout of a store between resets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    quantum_size: usize,
    blocks_per_segment: usize,
}

/// Where a byte offset lives inside the segment list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    /// Index of the segment in list order
    pub segment: u64,

    /// Quantum slot within the segment
    pub slot: usize,

    /// Byte offset within the quantum
    pub quantum_offset: usize,
}

impl Geometry {
    /// Create a geometry, rejecting zero sizes and overflowing spans
    pub fn new(quantum_size: usize, blocks_per_segment: usize) -> Result<Self> {
        if quantum_size == 0 || blocks_per_segment == 0 {
            return Err(StoreError::Config(format!(
                "geometry must be positive (quantum_size={}, blocks_per_segment={})",
                quantum_size, blocks_per_segment
            )));
        }
        if quantum_size.checked_mul(blocks_per_segment).is_none() {
            return Err(StoreError::Config(format!(
                "segment span overflows: {} * {}",
                quantum_size, blocks_per_segment
            )));
        }
        Ok(Self {
            quantum_size,
            blocks_per_segment,
        })
    }

    /// Geometry defaults taken from a config
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.quantum_size, config.blocks_per_segment)
    }

    pub fn quantum_size(&self) -> usize {
        self.quantum_size
    }

    pub fn blocks_per_segment(&self) -> usize {
        self.blocks_per_segment
    }

    /// Bytes addressed by one segment
    pub fn segment_span(&self) -> u64 {
        (self.quantum_size * self.blocks_per_segment) as u64
    }

    /// Resolve a byte offset to its position
    pub fn locate(&self, offset: u64) -> Position {
        let span = self.segment_span();
        let quantum = self.quantum_size as u64;
        let rest = offset % span;

        Position {
            segment: offset / span,
            slot: (rest / quantum) as usize,
            quantum_offset: (rest % quantum) as usize,
        }
    }

    /// Bytes left in the quantum from `position` to its end
    pub fn room(&self, position: &Position) -> usize {
        self.quantum_size - position.quantum_offset
    }
}
