//! Hot-path benchmarks: memoized reads, invalidation, and passes.

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use rxmod_reactive::{Computed, Graph};

/// Linear chain: source -> c1 -> c2 -> ... -> cN.
fn build_chain(graph: &Graph, depth: usize) -> (rxmod_reactive::Source<i64>, Computed<i64>) {
    let source = graph.source(0_i64);
    let mut tail: Computed<i64> = {
        let source = source.clone();
        graph.computed(move || Ok(source.get()? + 1))
    };
    for _ in 1..depth {
        let prev = tail.clone();
        tail = graph.computed(move || Ok(prev.get()? + 1));
    }
    (source, tail)
}

fn bench_memoized_read(c: &mut Criterion) {
    let graph = Graph::new();
    let (_source, tail) = build_chain(&graph, 64);
    tail.get().unwrap();

    c.bench_function("memoized_read_depth_64", |b| {
        b.iter(|| black_box(tail.get().unwrap()));
    });
}

fn bench_invalidate_and_pull(c: &mut Criterion) {
    let graph = Graph::new();
    let (source, tail) = build_chain(&graph, 64);
    tail.get().unwrap();

    let mut n = 0_i64;
    c.bench_function("invalidate_and_pull_depth_64", |b| {
        b.iter(|| {
            n += 1;
            source.set(n).unwrap();
            black_box(tail.get().unwrap())
        });
    });
}

fn bench_stabilize_fanout(c: &mut Criterion) {
    let graph = Graph::new();
    let source = graph.source(0_i64);
    let cells: Vec<Computed<i64>> = (0..256)
        .map(|i| {
            let source = source.clone();
            graph.computed(move || Ok(source.get()? + i))
        })
        .collect();
    for cell in &cells {
        cell.get().unwrap();
    }

    let mut n = 0_i64;
    c.bench_function("stabilize_fanout_256", |b| {
        b.iter(|| {
            n += 1;
            source.set(n).unwrap();
            black_box(graph.stabilize().unwrap())
        });
    });
}

criterion_group!(
    benches,
    bench_memoized_read,
    bench_invalidate_and_pull,
    bench_stabilize_fanout
);
criterion_main!(benches);
