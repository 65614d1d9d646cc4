use crate::{Gc, GcConfig, GcError, GcState, RootSlots, ThreadStack};
use std::hint::black_box;
use std::thread;
use std::time::{Duration, Instant};

fn slots_gc(len: usize) -> Gc<RootSlots> {
    Gc::with_roots(GcConfig::default(), RootSlots::new(len)).unwrap()
}

unsafe fn store(block: *mut u8, index: usize, value: *mut u8) {
    (block as *mut usize).add(index).write(value as usize);
}

// Addresses are kept xor'ed with this while they should not count as roots.
const HIDE: usize = usize::MAX / 0xFF * 0xA5;

#[inline(never)]
fn allocate_hidden(gc: &Gc<ThreadStack>, size: usize) -> usize {
    gc.allocate(size).unwrap() as usize ^ HIDE
}

// Overwrites the stack below the caller so stale copies of addresses left
// by earlier calls are gone.
#[inline(never)]
fn clear_stack() {
    let junk = [0u8; 16 * 1024];
    black_box(&junk);
}

// Holds the block in a frame far below every earlier call into the
// collector, then asks the background collector for a cycle from there.
#[inline(never)]
fn collect_from_deep_frame(gc: &Gc<ThreadStack>, hidden: usize, depth: usize) -> Option<usize> {
    let pad = [0u8; 4096];
    black_box(&pad);

    if depth > 0 {
        return collect_from_deep_frame(gc, hidden, depth - 1);
    }

    let ptr = hidden ^ HIDE;
    black_box(&ptr);

    assert_eq!(gc.collect(), Ok(None));
    gc.wait_for_collection();

    let found = gc.find(ptr as *const u8);
    black_box(&ptr);

    found
}

#[test]
fn reachable_through_block_survives() {
    let gc = slots_gc(1);
    let b = gc.allocate(16).unwrap();
    let c = gc.allocate(16).unwrap();
    let lost = gc.allocate(16).unwrap();

    unsafe { store(b, 1, c) };
    gc.roots().set(0, b);

    let stats = gc.collect().unwrap().unwrap();

    assert_eq!(stats.marked, 2);
    assert_eq!(stats.freed.blocks, 1);
    assert_eq!(gc.find(b), Some(16));
    assert_eq!(gc.find(c), Some(16));
    assert_eq!(gc.find(lost), None);
    assert_eq!(gc.is_marked(b), Some(true));
    assert_eq!(gc.is_marked(lost), None);
}

#[test]
fn released_then_collected() {
    let gc = slots_gc(1);
    let first = gc.allocate(16).unwrap();
    let second = gc.allocate(32).unwrap();

    gc.roots().set(0, second);
    gc.release(first).unwrap();
    gc.collect().unwrap();

    assert_eq!(gc.find(first), None);
    assert_eq!(gc.find(second), Some(32));
    assert_eq!(gc.len(), 1);
    assert_eq!(gc.tracked_bytes(), 32);
}

#[test]
fn unrooted_cycle_is_freed() {
    let gc = slots_gc(1);
    let a = gc.allocate(8).unwrap();
    let b = gc.allocate(8).unwrap();

    unsafe {
        store(a, 0, b);
        store(b, 0, a);
    }

    gc.collect().unwrap();

    assert!(gc.is_empty());
}

#[test]
fn interior_pointer_does_not_retain() {
    let gc = slots_gc(1);
    let a = gc.allocate(64).unwrap();

    gc.roots().set(0, unsafe { a.add(8) });
    gc.collect().unwrap();

    assert_eq!(gc.find(a), None);
}

#[test]
fn collection_is_idempotent() {
    let gc = slots_gc(2);
    let mut kept = vec![];

    for i in 0..32 {
        let ptr = gc.allocate(i * 8).unwrap();

        if i % 3 == 0 {
            kept.push(ptr);
        }
    }

    // chain the kept blocks so a single root reaches all of them
    let head = gc.allocate(kept.len() * 8).unwrap();

    for (i, ptr) in kept.iter().enumerate() {
        unsafe { store(head, i, *ptr) };
    }

    gc.roots().set(1, head);
    gc.collect().unwrap();

    let after_first = gc.len();

    let stats = gc.collect().unwrap().unwrap();

    assert_eq!(stats.freed.blocks, 0);
    assert_eq!(gc.len(), after_first);
    assert_eq!(after_first, kept.len() + 1);
}

#[test]
fn zero_size_allocation() {
    let gc = slots_gc(1);
    let ptr = gc.allocate(0).unwrap();

    assert!(!ptr.is_null());
    assert_eq!(gc.find(ptr), Some(0));

    gc.release(ptr).unwrap();
}

#[test]
fn double_release_is_an_error() {
    let gc = slots_gc(1);
    let ptr = gc.allocate(24).unwrap();

    gc.release(ptr).unwrap();

    let err = gc.release(ptr).unwrap_err();

    assert_eq!(err, GcError::UntrackedPointer(ptr as usize));
    assert!(err.is_fatal());
}

#[test]
fn metrics_follow_the_table() {
    let gc = slots_gc(1);

    for _ in 0..10 {
        gc.allocate(10).unwrap();
    }

    let before = gc.metrics();

    assert_eq!(before.tracked_blocks, 10);
    assert_eq!(before.tracked_bytes, 100);
    assert_eq!(before.table_capacity, 257);

    gc.collect().unwrap();

    let after = gc.metrics();

    assert_eq!(after.collections, 1);
    assert_eq!(after.last_freed, 10);
    assert_eq!(after.bytes_freed, 100);
    assert_eq!(after.tracked_blocks, 0);
    assert_eq!(after.state, GcState::Idle);
}

#[test]
fn monitor_collects_periodically() {
    let gc = Gc::with_period(
        GcConfig::default(),
        RootSlots::new(1),
        Duration::from_millis(5),
    )
    .unwrap();

    gc.allocate(16).unwrap();
    gc.start_monitor().unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);

    while gc.metrics().collections < 2 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(1));
    }

    assert!(gc.metrics().collections >= 2);
    assert!(gc.is_empty());

    gc.stop_monitor().unwrap();
    assert!(!gc.is_monitor_running());
}

#[test]
fn collect_wakes_the_monitor() {
    let gc = Gc::with_period(
        GcConfig::default(),
        RootSlots::new(1),
        Duration::from_secs(3600),
    )
    .unwrap();

    gc.start_monitor().unwrap();
    gc.allocate(16).unwrap();

    assert_eq!(gc.collect(), Ok(None));

    let deadline = Instant::now() + Duration::from_secs(10);

    while gc.metrics().collections < 1 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(1));
    }

    gc.wait_for_collection();

    assert_eq!(gc.metrics().collections, 1);
    assert!(gc.is_empty());
}

#[test]
fn blocking_collect_with_monitor_running() {
    let gc = Gc::with_period(
        GcConfig::default(),
        RootSlots::new(1),
        Duration::from_secs(3600),
    )
    .unwrap();

    gc.start_monitor().unwrap();
    gc.allocate(16).unwrap();

    let stats = gc.collect_blocking().unwrap().unwrap();

    assert_eq!(stats.freed.blocks, 1);
}

#[test]
fn background_collect_scans_the_callers_stack() {
    let gc = Gc::with_period(
        GcConfig::default(),
        ThreadStack::new(),
        Duration::from_secs(3600),
    )
    .unwrap();

    gc.start_monitor().unwrap();

    let hidden = allocate_hidden(&gc, 16);
    clear_stack();

    assert_eq!(collect_from_deep_frame(&gc, hidden, 8), Some(16));

    let metrics = gc.metrics();

    assert_eq!(metrics.collections, 1);
    assert_eq!(metrics.skipped_collections, 0);
}

#[test]
fn thread_stack_cycles_wait_for_the_owner() {
    let gc = Gc::with_period(
        GcConfig::default(),
        ThreadStack::new(),
        Duration::from_millis(5),
    )
    .unwrap();

    let held = gc.allocate(32).unwrap();
    black_box(&held);

    gc.start_monitor().unwrap();
    thread::sleep(Duration::from_millis(50));

    // the ticks only leave a request behind while this thread is away
    assert_eq!(gc.metrics().collections, 0);
    assert_eq!(gc.metrics().skipped_collections, 0);

    // the next call into the collector hands the roots over first
    let other = gc.allocate(8).unwrap();
    gc.wait_for_collection();

    let metrics = gc.metrics();

    assert_eq!(metrics.collections, 1);
    assert_eq!(metrics.skipped_collections, 0);
    assert_eq!(gc.find(held), Some(32));
    assert_eq!(gc.find(other), Some(8));

    gc.stop_monitor().unwrap();
    black_box(&held);
}

#[test]
fn reallocate_keeps_contents_reachable() {
    let gc = slots_gc(1);
    let holder = gc.allocate(8).unwrap();
    let child = gc.allocate(8).unwrap();

    unsafe { store(holder, 0, child) };

    let grown = gc.reallocate(holder, 4096).unwrap();

    gc.roots().set(0, grown);
    gc.collect().unwrap();

    assert_eq!(gc.find(grown), Some(4096));
    assert_eq!(gc.find(child), Some(8));
}
