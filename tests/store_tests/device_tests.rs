//! Tests for DeviceStore
//!
//! These tests verify:
//! - Write/read round trips within a quantum
//! - Quantum boundary capping on read and write
//! - Size high-water mark
//! - Hole semantics
//! - Reset behaviour and default geometry restore
//! - Memory-limit failures leaving the store usable
//! - Interrupted lock waits

use quantastore::config::LockPolicy;
use quantastore::store::{CancelToken, DeviceStore, Geometry, StoreState};
use quantastore::StoreError;

// =============================================================================
// Helper Functions
// =============================================================================

/// quantum_size=4, blocks_per_segment=4 (16 bytes per segment)
fn small_store() -> DeviceStore {
    DeviceStore::new(0, Geometry::new(4, 4).unwrap(), LockPolicy::Shared, None)
}

fn limited_store(limit: usize) -> DeviceStore {
    DeviceStore::new(0, Geometry::new(4, 4).unwrap(), LockPolicy::Shared, Some(limit))
}

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_new_store_is_empty() {
    let store = small_store();

    assert_eq!(store.size(), 0);
    assert_eq!(store.state(), StoreState::JustReset);
    assert!(store.read(0, 10).unwrap().is_empty());
}

#[test]
fn test_write_then_read_same_quantum() {
    let store = small_store();

    assert_eq!(store.write(0, b"AAAA").unwrap(), 4);
    assert_eq!(store.read(0, 4).unwrap(), b"AAAA".to_vec());
    assert_eq!(store.state(), StoreState::Active);
}

#[test]
fn test_round_trip_at_unaligned_offsets() {
    let store = small_store();

    for offset in [1u64, 5, 17, 30, 63] {
        let room = 4 - (offset % 4) as usize;
        let data: Vec<u8> = (0..room as u8).map(|b| b + offset as u8).collect();

        assert_eq!(store.write(offset, &data).unwrap(), room);
        assert_eq!(store.read(offset, room).unwrap(), data);
    }
}

#[test]
fn test_worked_example() {
    let store = small_store();

    assert_eq!(store.write(0, b"AAAA").unwrap(), 4);
    assert_eq!(store.write(4, b"BBBB").unwrap(), 4);

    // One read never crosses a quantum, so two reads cover 8 bytes
    let mut data = store.read(0, 8).unwrap();
    assert_eq!(data, b"AAAA".to_vec());
    data.extend(store.read(4, 4).unwrap());
    assert_eq!(data, b"AAAABBBB".to_vec());

    // Forces allocation of segment 1
    assert_eq!(store.write(20, b"C").unwrap(), 1);
    assert_eq!(store.size(), 21);
    assert_eq!(store.stats().segments, 2);

    // Segment 1 slot 0 was never written
    assert!(store.read(16, 4).unwrap().is_empty());
    assert_eq!(store.read(20, 1).unwrap(), b"C".to_vec());
}

#[test]
fn test_read_into_buffer() {
    let store = small_store();
    store.write(0, b"WXYZ").unwrap();

    let mut buf = [0u8; 3];
    assert_eq!(store.read_into(1, &mut buf).unwrap(), 3);
    assert_eq!(&buf, b"XYZ");
}

#[cfg(target_pointer_width = "64")]
#[test]
fn test_stats_report_full_device_index() {
    let index = u32::MAX as usize + 7;
    let store = DeviceStore::new(index, Geometry::new(4, 4).unwrap(), LockPolicy::Shared, None);

    assert_eq!(store.stats().device, index as u64);
}

// =============================================================================
// Boundary Tests
// =============================================================================

#[test]
fn test_write_capped_at_quantum_boundary() {
    let store = small_store();

    assert_eq!(store.write(2, b"abcdef").unwrap(), 2);
    assert_eq!(store.size(), 4);
    assert_eq!(store.read(2, 2).unwrap(), b"ab".to_vec());
}

#[test]
fn test_write_never_crosses_quantum() {
    let store = small_store();

    for offset in 0..32u64 {
        let written = store.write(offset, &[0xAA; 16]).unwrap();
        assert!(written >= 1);
        assert_eq!((offset + written as u64 - 1) / 4, offset / 4);
    }
}

#[test]
fn test_read_clamped_to_size() {
    let store = small_store();
    store.write(0, b"AB").unwrap();

    assert_eq!(store.read(0, 4).unwrap(), b"AB".to_vec());
    assert_eq!(store.read(1, 100).unwrap(), b"B".to_vec());
}

#[test]
fn test_read_at_or_past_size_is_empty() {
    let store = small_store();
    store.write(0, b"ABCD").unwrap();

    assert!(store.read(4, 4).unwrap().is_empty());
    assert!(store.read(1_000, 4).unwrap().is_empty());
    assert!(store.read(u64::MAX, 4).unwrap().is_empty());
}

// =============================================================================
// Size Tests
// =============================================================================

#[test]
fn test_size_is_high_water_mark() {
    let store = small_store();

    store.write(8, b"XXXX").unwrap();
    assert_eq!(store.size(), 12);

    // Writing below the mark does not shrink it
    store.write(0, b"Y").unwrap();
    assert_eq!(store.size(), 12);

    store.write(12, b"ZZ").unwrap();
    assert_eq!(store.size(), 14);
}

// =============================================================================
// Hole Tests
// =============================================================================

#[test]
fn test_hole_within_size_reads_empty() {
    let store = small_store();
    store.write(12, b"DDDD").unwrap();

    assert_eq!(store.size(), 16);
    assert!(store.read(0, 4).unwrap().is_empty());
    assert!(store.read(5, 2).unwrap().is_empty());
    assert_eq!(store.read(12, 4).unwrap(), b"DDDD".to_vec());
}

#[test]
fn test_hole_in_unallocated_slot_array() {
    let store = small_store();

    // Segment 0 exists but only because segment 2 was written
    store.write(40, b"E").unwrap();
    let stats = store.stats();
    assert_eq!(stats.segments, 3);
    assert_eq!(stats.allocated_quanta, 1);

    assert!(store.read(0, 4).unwrap().is_empty());
    assert!(store.read(16, 4).unwrap().is_empty());
}

#[test]
fn test_partially_written_quantum_reads_zero_filled_tail() {
    let store = small_store();
    store.write(0, b"A").unwrap();
    store.write(4, b"B").unwrap();

    // Quantum 0 is allocated; bytes 1..4 were never written but live inside it
    assert_eq!(store.read(0, 4).unwrap(), vec![b'A', 0, 0, 0]);
}

// =============================================================================
// Reset Tests
// =============================================================================

#[test]
fn test_reset_clears_everything() {
    let store = small_store();
    store.write(0, b"AAAA").unwrap();
    store.write(20, b"C").unwrap();
    assert_eq!(store.size(), 21);

    store.reset().unwrap();

    assert_eq!(store.size(), 0);
    assert_eq!(store.state(), StoreState::JustReset);
    assert!(store.read(0, 1).unwrap().is_empty());

    let stats = store.stats();
    assert_eq!(stats.segments, 0);
    assert_eq!(stats.allocated_quanta, 0);
    assert_eq!(stats.allocated_bytes, 0);
}

#[test]
fn test_reset_is_idempotent() {
    let store = small_store();
    store.reset().unwrap();
    store.reset().unwrap();
    assert_eq!(store.size(), 0);
}

#[test]
fn test_reset_restores_default_geometry() {
    let store = small_store();
    store.write(0, b"x").unwrap();
    store.reset().unwrap();

    assert_eq!(store.geometry(), Geometry::new(4, 4).unwrap());
}

#[test]
fn test_write_after_reset() {
    let store = small_store();
    store.write(0, b"OLD!").unwrap();
    store.reset().unwrap();

    store.write(0, b"NEW").unwrap();
    assert_eq!(store.size(), 3);
    assert_eq!(store.read(0, 4).unwrap(), b"NEW".to_vec());
}

// =============================================================================
// Memory Limit Tests
// =============================================================================

#[test]
fn test_memory_limit_fails_write_with_out_of_memory() {
    let store = limited_store(0);

    let err = store.write(0, b"A").unwrap_err();
    assert!(matches!(err, StoreError::OutOfMemory(_)));
    assert_eq!(store.size(), 0);
    assert_eq!(store.state(), StoreState::JustReset);
}

#[test]
fn test_memory_limit_keeps_existing_data() {
    let store = small_store();
    store.write(0, b"AAAA").unwrap();
    let used = store.stats().allocated_bytes as usize;

    // Enough for what exists plus nothing more
    let limited = limited_store(used);
    limited.write(0, b"AAAA").unwrap();

    let err = limited.write(4, b"B").unwrap_err();
    assert!(matches!(err, StoreError::OutOfMemory(_)));

    // Existing structure survives and stays usable
    assert_eq!(limited.read(0, 4).unwrap(), b"AAAA".to_vec());
    assert_eq!(limited.write(1, b"Z").unwrap(), 1);
    assert_eq!(limited.size(), 4);

    // Reset frees the budget
    limited.reset().unwrap();
    assert_eq!(limited.write(4, b"B").unwrap(), 1);
}

#[test]
fn test_failed_far_write_leaves_budget_for_near_writes() {
    let store = limited_store(4096);

    let err = store.write(u64::MAX - 1, b"x").unwrap_err();
    assert!(matches!(err, StoreError::OutOfMemory(_)));
    assert_eq!(store.stats().segments, 0);
    assert_eq!(store.stats().allocated_bytes, 0);

    assert_eq!(store.write(0, b"ok").unwrap(), 2);
    assert_eq!(store.read(0, 2).unwrap(), b"ok".to_vec());
    assert_eq!(store.size(), 2);
}

#[test]
fn test_failed_far_write_on_unlimited_store() {
    let store = small_store();

    assert!(matches!(
        store.write(u64::MAX - 1, b"x"),
        Err(StoreError::OutOfMemory(_))
    ));
    assert_eq!(store.stats().segments, 0);
    assert_eq!(store.write(0, b"ok").unwrap(), 2);
}

// =============================================================================
// Interruption Tests
// =============================================================================

#[test]
fn test_cancelled_write_does_not_mutate() {
    let store = small_store();
    let token = CancelToken::new();
    token.cancel();

    let err = store.interruptible(&token).write(0, b"AAAA").unwrap_err();
    assert!(matches!(err, StoreError::Interrupted));
    assert!(err.is_retryable());
    assert_eq!(store.size(), 0);
    assert_eq!(store.stats().segments, 0);
}

#[test]
fn test_cancelled_reset_keeps_content() {
    let store = small_store();
    store.write(0, b"KEEP").unwrap();

    let token = CancelToken::new();
    token.cancel();
    assert!(matches!(
        store.interruptible(&token).reset(),
        Err(StoreError::Interrupted)
    ));
    assert_eq!(store.read(0, 4).unwrap(), b"KEEP".to_vec());
}

#[test]
fn test_interruptible_view_works_when_not_cancelled() {
    let store = small_store();
    let token = CancelToken::new();
    let view = store.interruptible(&token);

    assert_eq!(view.write(0, b"ok").unwrap(), 2);
    assert_eq!(view.read(0, 2).unwrap(), b"ok".to_vec());
    view.reset().unwrap();
    assert_eq!(store.size(), 0);
}

// =============================================================================
// Lock Policy Tests
// =============================================================================

#[test]
fn test_exclusive_policy_behaves_identically() {
    let shared = small_store();
    let exclusive = DeviceStore::new(0, Geometry::new(4, 4).unwrap(), LockPolicy::Exclusive, None);

    for store in [&shared, &exclusive] {
        store.write(0, b"AAAA").unwrap();
        store.write(20, b"C").unwrap();
    }

    for (offset, len) in [(0u64, 4usize), (16, 4), (20, 1), (21, 1), (2, 8)] {
        assert_eq!(
            shared.read(offset, len).unwrap(),
            exclusive.read(offset, len).unwrap()
        );
    }
    assert_eq!(exclusive.lock_policy(), LockPolicy::Exclusive);
}
