use criterion::{black_box, criterion_group, criterion_main, Criterion};

use weft::{BusFabric, Transaction};

fn bench_step(c: &mut Criterion) {
    c.bench_function("steady_state_step", |b| {
        let mut fabric = BusFabric::with_default_topology();
        let mut i = 0u16;
        b.iter(|| {
            if fabric.master(0).is_idle() {
                fabric.submit(0, Transaction::write(0, i & 0x7FF, i as u8));
                i = i.wrapping_add(1);
            }
            fabric.step();
        });
        black_box(fabric.ticks());
    });
}

fn bench_transaction(c: &mut Criterion) {
    c.bench_function("write_transaction", |b| {
        let mut fabric = BusFabric::with_default_topology();
        b.iter(|| {
            let r = fabric.run_transaction(0, Transaction::write(1, 0x123, 0x42), 200);
            black_box(r);
        });
    });
}

criterion_group!(benches, bench_step, bench_transaction);
criterion_main!(benches);
