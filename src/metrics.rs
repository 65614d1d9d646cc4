use crate::table::AllocationTable;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

pub const GC_STATE_IDLE: u8 = 0;
pub const GC_STATE_UNMARKING: u8 = 1;
pub const GC_STATE_ROOT_SCAN: u8 = 2;
pub const GC_STATE_MARKING: u8 = 3;
pub const GC_STATE_SWEEPING: u8 = 4;

/// The phase a collection cycle is in.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GcState {
    Idle = GC_STATE_IDLE,
    Unmarking = GC_STATE_UNMARKING,
    RootScan = GC_STATE_ROOT_SCAN,
    Marking = GC_STATE_MARKING,
    Sweeping = GC_STATE_SWEEPING,
}

impl From<u8> for GcState {
    fn from(value: u8) -> Self {
        match value {
            GC_STATE_UNMARKING => GcState::Unmarking,
            GC_STATE_ROOT_SCAN => GcState::RootScan,
            GC_STATE_MARKING => GcState::Marking,
            GC_STATE_SWEEPING => GcState::Sweeping,
            _ => GcState::Idle,
        }
    }
}

/// A 'snapshot' of the collector's statistics.
///
/// Obtained by calling [`crate::Gc::metrics`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GcMetrics {
    pub state: GcState,

    /// Number of completed collection cycles.
    pub collections: u64,

    /// Number of cycles abandoned because no root window could be taken.
    pub skipped_collections: u64,

    /// Average time a collection cycle takes, in milliseconds.
    pub collect_avg_time: u64,

    /// Blocks reclaimed by the most recent cycle.
    pub last_freed: u64,

    /// Blocks and bytes reclaimed over the collector's lifetime.
    pub blocks_freed: u64,
    pub bytes_freed: u64,

    /// Blocks currently tracked, and the bytes they span.
    pub tracked_blocks: u64,
    pub tracked_bytes: u64,

    /// Current number of slots in the allocation table.
    pub table_capacity: u64,

    /// How many times the allocation table has grown.
    pub table_rehashes: u64,
}

#[derive(Debug, Default)]
pub struct Metrics {
    collections: AtomicU64,
    skipped_collections: AtomicU64,
    collect_avg_time: AtomicU64,
    last_freed: AtomicU64,
    blocks_freed: AtomicU64,
    bytes_freed: AtomicU64,
    tracked_blocks: AtomicU64,
    tracked_bytes: AtomicU64,
    table_capacity: AtomicU64,
    table_rehashes: AtomicU64,
    state: AtomicU8,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_state(&self, state: GcState) {
        self.state.store(state as u8, Ordering::Relaxed);
    }

    pub fn get_state(&self) -> GcState {
        self.state.load(Ordering::Relaxed).into()
    }

    pub fn get_collections(&self) -> u64 {
        self.collections.load(Ordering::Relaxed)
    }

    /// Mirrors the table's current size. Called whenever the table changed.
    pub fn observe(&self, table: &AllocationTable) {
        self.tracked_blocks
            .store(table.len() as u64, Ordering::Relaxed);
        self.tracked_bytes
            .store(table.tracked_bytes() as u64, Ordering::Relaxed);
        self.table_capacity
            .store(table.capacity() as u64, Ordering::Relaxed);
        self.table_rehashes
            .store(table.rehashes() as u64, Ordering::Relaxed);
    }

    pub fn record_cycle(&self, elapsed_millis: u64, freed_blocks: u64, freed_bytes: u64) {
        let collections = self.collections.fetch_add(1, Ordering::Relaxed) + 1;

        update_avg_u64(&self.collect_avg_time, elapsed_millis, collections);

        self.last_freed.store(freed_blocks, Ordering::Relaxed);
        self.blocks_freed.fetch_add(freed_blocks, Ordering::Relaxed);
        self.bytes_freed.fetch_add(freed_bytes, Ordering::Relaxed);
    }

    pub fn record_skip(&self) {
        self.skipped_collections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> GcMetrics {
        GcMetrics {
            state: self.get_state(),
            collections: self.get_collections(),
            skipped_collections: self.skipped_collections.load(Ordering::Relaxed),
            collect_avg_time: self.collect_avg_time.load(Ordering::Relaxed),
            last_freed: self.last_freed.load(Ordering::Relaxed),
            blocks_freed: self.blocks_freed.load(Ordering::Relaxed),
            bytes_freed: self.bytes_freed.load(Ordering::Relaxed),
            tracked_blocks: self.tracked_blocks.load(Ordering::Relaxed),
            tracked_bytes: self.tracked_bytes.load(Ordering::Relaxed),
            table_capacity: self.table_capacity.load(Ordering::Relaxed),
            table_rehashes: self.table_rehashes.load(Ordering::Relaxed),
        }
    }
}

/// Folds `new_value` into a running average over `sample_size` samples.
pub fn update_avg_u64(running_avg: &AtomicU64, new_value: u64, sample_size: u64) {
    let avg = running_avg.load(Ordering::Relaxed);
    let delta = new_value.abs_diff(avg) / sample_size.max(1);
    let new_avg = if new_value >= avg {
        avg + delta
    } else {
        avg - delta
    };

    running_avg.store(new_avg, Ordering::Relaxed);
}
