//! Segments and their lazily-allocated quanta
//!
//! A segment owns an optional slot array; each slot optionally owns one
//! quantum buffer. `None` at either level is a hole.
//!
//! All allocations go through `try_reserve_exact` and are charged against a
//! [`Budget`] first, so a failure leaves everything allocated so far intact.

use std::mem;

use tracing::{trace, warn};

use crate::error::{Result, StoreError};

use super::geometry::{Geometry, Position};

type Quantum = Box<[u8]>;
type SlotArray = Box<[Option<Quantum>]>;

/// One list node: covers `blocks_per_segment` quanta
#[derive(Debug, Default)]
pub struct Segment {
    slots: Option<SlotArray>,
}

impl Segment {
    /// Number of allocated quanta in this segment
    pub fn allocated_quanta(&self) -> usize {
        self.slots
            .as_ref()
            .map(|slots| slots.iter().filter(|q| q.is_some()).count())
            .unwrap_or(0)
    }

    /// Quantum at `slot`, None for a hole
    pub fn quantum(&self, slot: usize) -> Option<&[u8]> {
        self.slots.as_ref()?.get(slot)?.as_deref()
    }

    /// Quantum at `slot`, allocating the slot array and the quantum if absent
    fn quantum_mut(&mut self, slot: usize, geometry: &Geometry, budget: &mut Budget) -> Result<&mut [u8]> {
        let slots = match &mut self.slots {
            Some(slots) => slots,
            empty @ None => empty.insert(alloc_slot_array(geometry.blocks_per_segment(), budget)?),
        };

        let quantum = match &mut slots[slot] {
            Some(quantum) => quantum,
            empty @ None => empty.insert(alloc_quantum(geometry.quantum_size(), budget)?),
        };

        Ok(&mut quantum[..])
    }
}

/// The segment list plus its allocation accounting
#[derive(Debug)]
pub struct SegmentTable {
    segments: Vec<Segment>,
    budget: Budget,
}

impl SegmentTable {
    pub fn new(memory_limit: Option<usize>) -> Self {
        Self {
            segments: Vec::new(),
            budget: Budget::new(memory_limit),
        }
    }

    /// Number of segments in the list
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Bytes currently charged to the budget
    pub fn allocated_bytes(&self) -> usize {
        self.budget.used()
    }

    /// Total allocated quanta across all segments
    pub fn allocated_quanta(&self) -> usize {
        self.segments.iter().map(Segment::allocated_quanta).sum()
    }

    /// Segment at `index` without extending the list
    pub fn get(&self, index: u64) -> Option<&Segment> {
        let index = usize::try_from(index).ok()?;
        self.segments.get(index)
    }

    /// Quantum holding `position`, None if any level is a hole
    pub fn quantum(&self, position: &Position) -> Option<&[u8]> {
        self.get(position.segment)?.quantum(position.slot)
    }

    /// Quantum holding `position`, allocating whatever is missing on the way
    pub fn quantum_mut(&mut self, position: &Position, geometry: &Geometry) -> Result<&mut [u8]> {
        let index = self.follow(position.segment)?;
        let budget = &mut self.budget;
        self.segments[index].quantum_mut(position.slot, geometry, budget)
    }

    /// Extend the list until segment `index` exists; returns it as usize
    ///
    /// The extension is charged and reserved as a whole before any segment is
    /// appended, so a failure leaves the list and the budget untouched.
    pub fn follow(&mut self, index: u64) -> Result<usize> {
        let index = usize::try_from(index).map_err(|_| {
            StoreError::OutOfMemory(format!("segment index {} not addressable", index))
        })?;
        if index < self.segments.len() {
            return Ok(index);
        }

        let missing = index - self.segments.len() + 1;
        let bytes = missing
            .checked_mul(mem::size_of::<Segment>())
            .ok_or_else(|| StoreError::OutOfMemory(format!("{} segments not addressable", missing)))?;
        self.budget.charge(bytes, "segment list")?;

        if let Err(e) = self.segments.try_reserve_exact(missing) {
            self.budget.refund(bytes);
            warn!("Segment list extension to {} failed: {}", index + 1, e);
            return Err(StoreError::OutOfMemory(format!("segment list: {}", e)));
        }
        self.segments.resize_with(index + 1, Segment::default);
        trace!("Extended segment list to {} segments", self.segments.len());

        Ok(index)
    }

    /// Drop every segment and quantum
    pub fn clear(&mut self) {
        self.segments = Vec::new();
        self.budget.reset();
    }
}

/// Byte accounting against an optional limit
#[derive(Debug)]
pub struct Budget {
    limit: Option<usize>,
    used: usize,
}

impl Budget {
    pub fn new(limit: Option<usize>) -> Self {
        Self { limit, used: 0 }
    }

    pub fn used(&self) -> usize {
        self.used
    }

    /// Reserve `bytes` or fail with OutOfMemory
    pub fn charge(&mut self, bytes: usize, what: &str) -> Result<()> {
        let next = self.used.checked_add(bytes);
        match (next, self.limit) {
            (Some(next), Some(limit)) if next <= limit => {
                self.used = next;
                Ok(())
            }
            (Some(next), None) => {
                self.used = next;
                Ok(())
            }
            _ => {
                warn!(
                    "Memory limit reached allocating {} ({} bytes, {} in use)",
                    what, bytes, self.used
                );
                Err(StoreError::OutOfMemory(format!(
                    "{} of {} bytes exceeds memory limit",
                    what, bytes
                )))
            }
        }
    }

    pub fn refund(&mut self, bytes: usize) {
        self.used = self.used.saturating_sub(bytes);
    }

    pub fn reset(&mut self) {
        self.used = 0;
    }
}

fn alloc_slot_array(count: usize, budget: &mut Budget) -> Result<SlotArray> {
    let bytes = count * mem::size_of::<Option<Quantum>>();
    budget.charge(bytes, "slot array")?;

    let mut slots = Vec::new();
    if let Err(e) = slots.try_reserve_exact(count) {
        budget.refund(bytes);
        warn!("Slot array allocation failed: {}", e);
        return Err(StoreError::OutOfMemory(format!("slot array: {}", e)));
    }
    slots.resize_with(count, || None);

    trace!("Allocated slot array of {} slots", count);
    Ok(slots.into_boxed_slice())
}

fn alloc_quantum(size: usize, budget: &mut Budget) -> Result<Quantum> {
    budget.charge(size, "quantum")?;

    let mut buffer = Vec::new();
    if let Err(e) = buffer.try_reserve_exact(size) {
        budget.refund(size);
        warn!("Quantum allocation failed: {}", e);
        return Err(StoreError::OutOfMemory(format!("quantum: {}", e)));
    }
    buffer.resize(size, 0);

    trace!("Allocated quantum of {} bytes", size);
    Ok(buffer.into_boxed_slice())
}
