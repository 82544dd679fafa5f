//! Planning and read benchmarks.
//!
//! Measures plan construction for representative where clauses and end-to-end
//! reads (lookup vs scan) against the in-memory store.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use dynorm_core::catalog::{KeySchema, ModelDef, ModelRegistry, ScalarType};
use dynorm_core::query::{QueryExecutor, QueryPlanner};
use dynorm_core::store::MemoryStore;
use dynorm_proto::{Item, ReadFilter, Value, WhereClause};
use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;

const SEED: u64 = 42;
const REALMS: usize = 10;

fn schema() -> KeySchema {
    KeySchema::new("realm", ScalarType::String)
        .with_sort_key("id", ScalarType::String)
        .with_attribute("order", ScalarType::Number)
        .with_local_index("role", ScalarType::String)
}

fn setup(records: usize) -> (MemoryStore, ModelRegistry) {
    let registry = ModelRegistry::new();
    registry
        .register(ModelDef::new("Member", schema()).with_table("members"))
        .unwrap();

    let store = MemoryStore::new();
    store.create_table("members", schema());
    let mut rng = StdRng::seed_from_u64(SEED);
    for i in 0..records {
        let name: String = (&mut rng)
            .sample_iter(&Alphanumeric)
            .take(12)
            .map(char::from)
            .collect();
        let mut item = Item::new();
        item.insert("realm".into(), format!("realm-{}", i % REALMS).into());
        item.insert("id".into(), format!("{i:08}").into());
        item.insert("name".into(), name.into());
        item.insert(
            "role".into(),
            if rng.gen_bool(0.2) { "leader" } else { "member" }.into(),
        );
        item.insert("order".into(), Value::Int(rng.gen_range(0..1_000)));
        store.put("members", item).unwrap();
    }
    (store, registry)
}

fn bench_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("planner/plan");
    let model = ModelDef::new("Member", schema()).with_table("members");
    let planner = QueryPlanner::new(&model);

    let clauses = [
        ("hash", json!({"realm": "realm-1"})),
        ("hash_sort", json!({"realm": "realm-1", "id": {"between": ["00000010", "00000090"]}})),
        ("local_index", json!({"realm": "realm-1", "role": "leader", "order": {"gt": 500}})),
        ("scan_or", json!({"or": [{"role": "leader"}, {"order": 7}], "name": ["a", "b", "c"]})),
    ];

    for (name, clause) in clauses {
        let clause = WhereClause::from_json(&clause).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(name), &clause, |b, clause| {
            b.iter(|| black_box(planner.plan(clause).unwrap()));
        });
    }

    group.finish();
}

fn bench_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("planner/read");

    for size in [1_000, 10_000] {
        let (store, registry) = setup(size);
        let executor = QueryExecutor::new(&store, &registry);

        let lookup = ReadFilter::from_json(&json!({
            "where": {"realm": "realm-3", "order": {"lt": 250}},
            "order": "order DESC",
            "limit": 20
        }))
        .unwrap();
        group.bench_with_input(BenchmarkId::new("lookup", size), &lookup, |b, filter| {
            b.iter(|| black_box(executor.find("Member", filter).unwrap()));
        });

        let scan = ReadFilter::from_json(&json!({
            "where": {"role": "leader"},
            "order": "order",
            "offset": 10,
            "limit": 20
        }))
        .unwrap();
        group.bench_with_input(BenchmarkId::new("scan", size), &scan, |b, filter| {
            b.iter(|| black_box(executor.find("Member", filter).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_plan, bench_read);
criterion_main!(benches);
