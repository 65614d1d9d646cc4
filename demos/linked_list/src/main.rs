// Builds a linked list out of collector blocks held only by a pointer on
// the stack, cuts it in half, and lets the collector find the lost half.

use log::info;
use std::hint::black_box;
use std::mem::size_of;
use std::ptr::null_mut;

#[repr(C)]
struct Node {
    next: *mut Node,
    value: usize,
}

fn push(head: *mut Node, value: usize) -> *mut Node {
    let node = sweepit::global::alloc(size_of::<Node>()) as *mut Node;

    if node.is_null() {
        panic!("out of memory");
    }

    unsafe {
        (*node).next = head;
        (*node).value = value;
    }

    node
}

#[inline(never)]
fn build(len: usize) -> *mut Node {
    (0..len).fold(null_mut(), push)
}

#[inline(never)]
fn cut(head: *mut Node, keep: usize) {
    let mut node = head;

    for _ in 1..keep {
        node = unsafe { (*node).next };
    }

    unsafe { (*node).next = null_mut() };
}

fn sum(head: *mut Node) -> usize {
    let mut total = 0;
    let mut node = head;

    while !node.is_null() {
        unsafe {
            total += (*node).value;
            node = (*node).next;
        }
    }

    total
}

fn main() {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Debug)
        .init()
        .unwrap();

    sweepit::global::init(0).unwrap();

    let gc = sweepit::global::instance().unwrap();
    let mut head = build(10_000);
    black_box(&mut head);

    info!("built list, {} blocks tracked", gc.len());

    cut(head, 100);
    sweepit::global::collect();

    let metrics = gc.metrics();

    info!(
        "after collecting: {} blocks tracked, {} freed, list sum {}",
        gc.len(),
        metrics.blocks_freed,
        sum(head)
    );
}
