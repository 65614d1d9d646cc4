use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

use sweepit::{AllocationTable, Block, Gc, GcConfig, RootSlots};

fn allocate_and_release(c: &mut Criterion) {
    let gc = Gc::with_roots(GcConfig::default(), RootSlots::new(1)).unwrap();

    c.bench_function("allocate + release 64 bytes", |b| {
        b.iter(|| {
            let ptr = gc.allocate(black_box(64)).unwrap();
            gc.release(ptr).unwrap();
        });
    });
}

fn table_insert(c: &mut Criterion) {
    c.bench_function("table insert 10k", |b| {
        b.iter_batched(
            || (0..10_000).map(|_| Block::new(8).unwrap()).collect::<Vec<_>>(),
            |blocks| {
                let mut table = AllocationTable::new(257, 0.74).unwrap();

                for block in blocks {
                    table.insert(block).unwrap();
                }

                table
            },
            BatchSize::LargeInput,
        );
    });
}

fn collect_chain(c: &mut Criterion) {
    c.bench_function("collect 10k reachable blocks", |b| {
        let gc = Gc::with_roots(GcConfig::default(), RootSlots::new(1)).unwrap();
        let mut head: *mut usize = std::ptr::null_mut();

        for _ in 0..10_000 {
            let node = gc.allocate(16).unwrap() as *mut usize;

            unsafe { node.write(head as usize) };
            head = node;
        }

        gc.roots().set(0, head);

        b.iter(|| gc.collect().unwrap());
    });

    c.bench_function("collect 10k unreachable blocks", |b| {
        let gc = Gc::with_roots(GcConfig::default(), RootSlots::new(1)).unwrap();

        b.iter_batched(
            || {
                for _ in 0..10_000 {
                    gc.allocate(16).unwrap();
                }
            },
            |_| gc.collect().unwrap(),
            BatchSize::PerIteration,
        );
    });
}

criterion_group!(benches, allocate_and_release, table_insert, collect_chain);
criterion_main!(benches);
