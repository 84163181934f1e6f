use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use covermap::features::{FeatureCache, ServedRecord};
use covermap::selection::{SelectionPolygon, SpatialIndex, select_contained_ids};
use rand::Rng;

const SIZES: [usize; 3] = [1_000, 10_000, 100_000];

fn random_cache(count: usize) -> FeatureCache {
    let mut rng = rand::rng();
    let records = (0..count as u64).map(|id| ServedRecord {
        address: String::new(),
        location_id: id,
        latitude: rng.random_range(25.0..49.0),
        longitude: rng.random_range(-124.0..-67.0),
        served: rng.random_bool(0.5),
    });
    let mut cache = FeatureCache::new();
    cache.replace(records);
    cache
}

/// A county-sized box in the middle of the sample area.
fn selection() -> SelectionPolygon {
    SelectionPolygon::from_ring(&[(-100.0, 38.0), (-98.0, 38.0), (-98.0, 40.0), (-100.0, 40.0)])
}

fn bench_selection(c: &mut Criterion) {
    let polygon = selection();
    let mut group = c.benchmark_group("select_contained");
    for size in SIZES {
        let cache = random_cache(size);
        let index = SpatialIndex::build(&cache);
        group.bench_with_input(BenchmarkId::new("linear", size), &cache, |b, cache| {
            b.iter(|| select_contained_ids(black_box(&polygon), cache.features()));
        });
        group.bench_with_input(BenchmarkId::new("rtree", size), &cache, |b, cache| {
            b.iter(|| index.select(black_box(&polygon), cache));
        });
    }
    group.finish();
}

fn bench_index_build(c: &mut Criterion) {
    let cache = random_cache(100_000);
    c.bench_function("index_build_100k", |b| {
        b.iter(|| SpatialIndex::build(black_box(&cache)));
    });
}

criterion_group!(benches, bench_selection, bench_index_build);
criterion_main!(benches);
