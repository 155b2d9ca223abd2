//! Octree insertion, query and reindex benchmarks.
//!
//! Entity counts are chosen around the scale the frame pipeline sees per
//! tick: a few thousand indexed drawables, a frustum query per frame and a
//! small fraction of movers.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::Vec3;
use slotmap::SlotMap;

use fable::{BoundingBox, Camera, NodeHandle, Octree, OctreeConfig};

fn handles(n: usize) -> Vec<NodeHandle> {
    let mut map: SlotMap<NodeHandle, ()> = SlotMap::with_key();
    (0..n).map(|_| map.insert(())).collect()
}

/// Deterministic scatter over the world region, no RNG state to drag around.
fn scatter(i: usize) -> Vec3 {
    let f = i as f32;
    Vec3::new(
        (f * 0.754).rem_euclid(120.0) - 60.0,
        (f * 1.318).rem_euclid(120.0) - 60.0,
        (f * 2.077).rem_euclid(120.0) - 60.0,
    )
}

fn region() -> BoundingBox {
    BoundingBox::new(Vec3::splat(-64.0), Vec3::splat(64.0))
}

fn populated(n: usize) -> (Octree, Vec<NodeHandle>) {
    let ids = handles(n);
    let mut octree = Octree::new(region(), OctreeConfig::default());
    for (i, &id) in ids.iter().enumerate() {
        octree.insert(id, BoundingBox::unit_cube(scatter(i)));
    }
    (octree, ids)
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("octree_insert");
    for n in [1_000, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            let ids = handles(n);
            b.iter(|| {
                let mut octree = Octree::new(region(), OctreeConfig::default());
                for (i, &id) in ids.iter().enumerate() {
                    octree.insert(id, BoundingBox::unit_cube(scatter(i)));
                }
                black_box(octree.len())
            });
        });
    }
    group.finish();
}

fn bench_query_frustum(c: &mut Criterion) {
    let mut group = c.benchmark_group("octree_query_frustum");
    let camera = Camera::new_perspective(60.0, 16.0 / 9.0, 0.1, 100.0);
    for n in [1_000, 10_000] {
        let (octree, _) = populated(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &octree, |b, octree| {
            let mut out = Vec::with_capacity(n);
            b.iter(|| {
                out.clear();
                octree.query_frustum(camera.frustum(), &mut out);
                black_box(out.len())
            });
        });
    }
    group.finish();
}

fn bench_query_region(c: &mut Criterion) {
    let (octree, _) = populated(10_000);
    let probe = BoundingBox::from_center_half_extents(Vec3::ZERO, Vec3::splat(10.0));
    c.bench_function("octree_query_region_10k", |b| {
        let mut out = Vec::new();
        b.iter(|| {
            out.clear();
            octree.query_region(&probe, &mut out);
            black_box(out.len())
        });
    });
}

fn bench_update_movers(c: &mut Criterion) {
    // 10% of entities drift a little each tick, the common reindex load
    let (mut octree, ids) = populated(10_000);
    let mut offset = 0.0_f32;
    c.bench_function("octree_update_10pct_of_10k", |b| {
        b.iter(|| {
            offset += 0.01;
            octree.begin_tick();
            for (i, &id) in ids.iter().enumerate().step_by(10) {
                octree.update(id, BoundingBox::unit_cube(scatter(i) + Vec3::splat(offset.sin())));
            }
            black_box(octree.len())
        });
    });
}

fn bench_rebuild(c: &mut Criterion) {
    c.bench_function("octree_rebuild_10k", |b| {
        b.iter_batched(
            || populated(10_000).0,
            |mut octree| {
                octree.rebuild();
                black_box(octree.len())
            },
            criterion::BatchSize::LargeInput,
        );
    });
}

criterion_group!(
    benches,
    bench_insert,
    bench_query_frustum,
    bench_query_region,
    bench_update_movers,
    bench_rebuild
);
criterion_main!(benches);
