//! Store benchmarks against the in-memory client.
//!
//! ```bash
//! cargo bench -p redisobj --bench store
//! cargo bench -p redisobj --bench store -- "store/write"
//! ```

use std::collections::BTreeMap;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use redisobj::{Options, Record, Schema, Store};
use redisobj_client::{Context, InMemoryClient};
use uuid::Uuid;

#[derive(Clone, Default)]
struct Single {
    id: String,
}

impl Record for Single {
    const TYPE_NAME: &'static str = "Single";

    fn schema(schema: &mut Schema<Self>) {
        schema.key("Id", |s| &s.id, |s| &mut s.id);
    }
}

#[derive(Clone, Default)]
struct Wide {
    id: String,
    name: String,
    count: u64,
    ratio: f64,
    items: Vec<String>,
    attrs: BTreeMap<String, i32>,
}

impl Record for Wide {
    const TYPE_NAME: &'static str = "Wide";

    fn schema(schema: &mut Schema<Self>) {
        schema
            .key("Id", |w| &w.id, |w| &mut w.id)
            .scalar("Name", |w| &w.name, |w| &mut w.name)
            .scalar("Count", |w| &w.count, |w| &mut w.count)
            .scalar("Ratio", |w| &w.ratio, |w| &mut w.ratio)
            .list("Items", |w| &w.items, |w| &mut w.items)
            .map("Attrs", |w| &w.attrs, |w| &mut w.attrs);
    }
}

fn client() -> InMemoryClient {
    let client = InMemoryClient::new();
    client.disable_log();
    client
}

fn wide(items: usize) -> Wide {
    Wide {
        id: Uuid::now_v7().to_string(),
        name: "benchmark".into(),
        count: 42,
        ratio: 0.5,
        items: (0..items).map(|i| format!("item-{i}")).collect(),
        attrs: (0..items as i32).map(|i| (format!("k{i}"), i)).collect(),
    }
}

// =============================================================================
// Single-field record
// =============================================================================

fn bench_single(c: &mut Criterion) {
    let store = Store::new(client());
    let ctx = Context::background();
    let record = Single {
        id: Uuid::now_v7().to_string(),
    };
    store.write(&ctx, &record, &Options::new()).unwrap();

    let mut group = c.benchmark_group("store/single");
    for (label, options) in [("uncached", Options::new()), ("cached", Options::cached())] {
        group.bench_function(BenchmarkId::new("write", label), |b| {
            b.iter(|| store.write(&ctx, black_box(&record), &options).unwrap())
        });
        group.bench_function(BenchmarkId::new("read", label), |b| {
            b.iter(|| {
                let mut loaded = record.clone();
                store.read(&ctx, black_box(&mut loaded), &options).unwrap();
                loaded
            })
        });
    }
    group.finish();
}

// =============================================================================
// Collection size scaling
// =============================================================================

fn bench_wide(c: &mut Criterion) {
    let ctx = Context::background();
    let mut group = c.benchmark_group("store/write");
    for items in [0usize, 16, 256] {
        let store = Store::new(client());
        let record = wide(items);
        group.bench_with_input(BenchmarkId::new("wide", items), &record, |b, record| {
            b.iter(|| store.write(&ctx, record, &Options::new()).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("wide_cached", items), &record, |b, record| {
            b.iter(|| store.write(&ctx, record, &Options::cached()).unwrap())
        });
    }
    group.finish();
}

fn bench_plan(c: &mut Criterion) {
    c.bench_function("store/plan_lookup", |b| {
        let store = Store::new(client());
        store.plan::<Wide>().unwrap();
        b.iter(|| store.plan::<Wide>().unwrap())
    });
}

criterion_group!(benches, bench_single, bench_wide, bench_plan);
criterion_main!(benches);
