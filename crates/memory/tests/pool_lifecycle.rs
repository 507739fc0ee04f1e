//! Integration tests for pool creation, routing, reuse and teardown

use pretty_assertions::assert_eq;
use rstest::rstest;
use std::ptr::NonNull;
use tidepool_memory::{ALIGNMENT, MemoryError, Pool, PoolConfig, PoolStats, ReleaseReport};

fn fill(ptr: NonNull<u8>, len: usize, byte: u8) {
    unsafe { ptr.as_ptr().write_bytes(byte, len) };
}

fn check(ptr: NonNull<u8>, len: usize, byte: u8) -> bool {
    let bytes = unsafe { std::slice::from_raw_parts(ptr.as_ptr(), len) };
    bytes.iter().all(|&b| b == byte)
}

#[rstest]
#[case(0, 128)]
#[case(1024, 0)]
#[case(0, 0)]
fn create_rejects_zero_parameters(#[case] chunk_size: usize, #[case] threshold: usize) {
    let error = Pool::create(chunk_size, threshold).unwrap_err();
    assert!(matches!(error, MemoryError::InvalidConfig { .. }));
    assert!(!error.is_retryable());
}

#[test]
fn fresh_pool_holds_nothing() {
    let pool = Pool::create(1024, 128).expect("Failed to create pool");
    assert_eq!(pool.stats(), PoolStats::default());
    assert_eq!(pool.config().chunk_size, 1024);
    assert_eq!(pool.config().small_threshold, 128);
    assert_eq!(pool.destroy(), ReleaseReport::default());
}

#[test]
fn every_small_size_round_trips() {
    let pool = Pool::create(1024, 128).expect("Failed to create pool");

    for size in 1..=128 {
        let ptr = pool.allocate(size).expect("Allocation failed");
        assert_eq!(ptr.as_ptr() as usize % ALIGNMENT, 0);
        assert!(unsafe { pool.usable_size(ptr) } >= size);

        fill(ptr, size, size as u8);
        assert!(check(ptr, size, size as u8), "size {size}");
        unsafe { pool.free(ptr.as_ptr()) };
    }

    assert_eq!(pool.stats().live_small, 0);
}

#[test]
fn reuse_does_not_grow_chunks() {
    let pool = Pool::create(1024, 128).expect("Failed to create pool");

    let first = pool.allocate(64).expect("Allocation failed");
    let chunks = pool.stats().chunk_count;
    unsafe { pool.free(first.as_ptr()) };

    for _ in 0..1000 {
        let ptr = pool.allocate(64).expect("Allocation failed");
        assert_eq!(ptr, first, "Pool should reuse the freed block");
        unsafe { pool.free(ptr.as_ptr()) };
    }

    let stats = pool.stats();
    assert_eq!(stats.chunk_count, chunks);
    assert_eq!(stats.free_list_hits, 1000);
}

#[test]
fn sizes_in_same_class_share_blocks() {
    let pool = Pool::create(1024, 128).expect("Failed to create pool");

    // 17..=24 all round up to the 24-byte class
    let ptr = pool.allocate(17).expect("Allocation failed");
    unsafe { pool.free(ptr.as_ptr()) };
    assert_eq!(pool.allocate(24).expect("Allocation failed"), ptr);

    // a different class never sees it
    let other = pool.allocate(32).expect("Allocation failed");
    assert_ne!(other, ptr);
}

#[rstest]
#[case(128, 1, 0)]
#[case(129, 0, 1)]
fn threshold_boundary(#[case] size: usize, #[case] small: usize, #[case] large: usize) {
    let pool = Pool::create(1024, 128).expect("Failed to create pool");
    let ptr = pool.allocate(size).expect("Allocation failed");
    fill(ptr, size, 0x5A);

    let stats = pool.stats();
    assert_eq!(stats.live_small, small);
    assert_eq!(stats.live_large, large);
    assert_eq!(stats.chunk_count, small);
    assert_eq!(pool.class_of(size).is_some(), small == 1);

    unsafe { pool.free(ptr.as_ptr()) };
    assert_eq!(pool.stats().live_large, 0);
}

#[test]
fn end_to_end_mixed_sizes() {
    let pool = Pool::create(1024, 128).expect("Failed to create pool");

    let sizes: Vec<usize> = (16..=192).step_by(8).collect();
    let blocks: Vec<(NonNull<u8>, usize)> = sizes
        .iter()
        .map(|&size| {
            let ptr = pool.allocate(size).expect("Allocation failed");
            fill(ptr, size, size as u8);
            (ptr, size)
        })
        .collect();

    // every block keeps its own pattern, and no two neighbours share one
    for (ptr, size) in &blocks {
        assert!(check(*ptr, *size, *size as u8), "size {size}");
    }
    for pair in blocks.windows(2) {
        let (left, left_size) = pair[0];
        let (right, right_size) = pair[1];
        assert_ne!(left, right);
        let left_byte = unsafe { left.as_ptr().read() };
        let right_byte = unsafe { right.as_ptr().read() };
        assert_ne!(left_byte, right_byte, "sizes {left_size} and {right_size}");
    }

    let stats = pool.stats();
    let large = sizes.iter().filter(|&&size| size > 128).count();
    assert_eq!(stats.live_small, sizes.len() - large);
    assert_eq!(stats.live_large, large);
    assert_eq!(stats.large_bytes, sizes.iter().filter(|&&s| s > 128).sum::<usize>());

    // free every other block, the rest must be untouched
    for (ptr, _) in blocks.iter().step_by(2) {
        unsafe { pool.free(ptr.as_ptr()) };
    }
    for (ptr, size) in blocks.iter().skip(1).step_by(2) {
        assert!(check(*ptr, *size, *size as u8), "size {size}");
    }
    for (ptr, _) in blocks.iter().skip(1).step_by(2) {
        unsafe { pool.free(ptr.as_ptr()) };
    }

    let drained = pool.stats();
    assert_eq!(drained.live_small, 0);
    assert_eq!(drained.live_large, 0);
    assert_eq!(drained.large_bytes, 0);

    let report = pool.destroy();
    assert_eq!(report.chunks, drained.chunk_count);
    assert_eq!(report.chunk_bytes, drained.chunk_bytes);
    assert_eq!(report.large_allocations, 0);
    assert_eq!(report.large_bytes, 0);
}

#[test]
fn destroy_releases_live_large_allocations() {
    let pool = Pool::create(4096, 64).expect("Failed to create pool");
    for size in [100, 1_000, 10_000] {
        pool.allocate(size).expect("Allocation failed");
    }
    pool.allocate(32).expect("Allocation failed");

    let report = pool.destroy();
    assert_eq!(
        report,
        ReleaseReport {
            chunks: 1,
            chunk_bytes: 4096,
            large_allocations: 3,
            large_bytes: 11_100,
        }
    );
}

#[test]
fn out_of_memory_leaves_pool_usable() {
    let pool = Pool::create(1024, 128).expect("Failed to create pool");
    let before = pool.allocate(32).expect("Allocation failed");

    let error = pool.allocate(usize::MAX - 8).unwrap_err();
    assert!(matches!(error, MemoryError::OutOfMemory { .. }));
    assert!(error.is_retryable());
    assert_eq!(error.code(), "POOL:ALLOC:OOM");

    let after = pool.allocate(32).expect("Allocation failed");
    assert_ne!(before, after);
    assert_eq!(pool.stats().live_large, 0);
}

#[test]
fn failed_chunk_growth_leaves_pool_untouched() {
    let pool = Pool::with_config(PoolConfig::production().with_chunk_size(usize::MAX / 2))
        .expect("Failed to create pool");

    let error = pool.allocate(16).unwrap_err();
    assert!(matches!(error, MemoryError::OutOfMemory { .. }));
    assert!(error.is_retryable());
    assert_eq!(pool.stats(), PoolStats::default());

    // the large path does not depend on chunks
    let large = pool.allocate(1_000).expect("Allocation failed");
    fill(large, 1_000, 0x3C);
    assert!(check(large, 1_000, 0x3C));
    assert_eq!(pool.stats().live_large, 1);
    assert_eq!(pool.stats().chunk_count, 0);

    let report = pool.destroy();
    assert_eq!(report.chunks, 0);
    assert_eq!(report.large_allocations, 1);
}

#[test]
fn chunk_smaller_than_a_block() {
    // every class stride is larger than the chunk, so each carve gets its own chunk
    let pool = Pool::create(8, 64).expect("Failed to create pool");
    let a = pool.allocate(64).expect("Allocation failed");
    let b = pool.allocate(64).expect("Allocation failed");
    fill(a, 64, 1);
    fill(b, 64, 2);

    assert_eq!(pool.stats().chunk_count, 2);
    assert!(check(a, 64, 1));
    assert!(check(b, 64, 2));
}

#[test]
fn config_presets_drive_behaviour() {
    let pool = Pool::with_config(PoolConfig::debug().with_small_threshold(64))
        .expect("Failed to create pool");
    let ptr = pool.allocate(40).expect("Allocation failed");
    assert!(check(ptr, 40, 0xBB));
    unsafe { pool.free(ptr.as_ptr()) };

    let pool = Pool::with_config(PoolConfig::production()).expect("Failed to create pool");
    assert!(!pool.config().validate_headers);
}

#[test]
fn pool_holds_dynamic_values() {
    use tidepool_memory::PoolBox;
    use tidepool_support::DynValue;

    let pool = Pool::create(1024, 128).expect("Failed to create pool");
    let mut slot = PoolBox::new_in(DynValue::new(42u32), &pool).expect("Allocation failed");

    assert!(slot.is::<u32>());
    *slot.downcast_mut::<u32>().expect("u32 slot") += 1;
    assert_eq!(slot.downcast_ref::<u32>(), Some(&43));

    slot.reset();
    assert!(slot.is_empty());
    drop(slot);
    assert_eq!(pool.stats().live_small, 0);
}
