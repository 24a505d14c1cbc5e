#![allow(missing_docs)]

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use refcode::{shared, List, Refcode, RefcodeObject, Shared, TypeRegistry, Value};
use std::hint::black_box;

#[derive(Default, RefcodeObject)]
#[refcode(namespace = "bench")]
struct BenchItem {
    id: i64,
    label: String,
    payload: List,
    peer: Option<Shared<BenchItem>>,
}

/// Items whose payloads are shared in pairs and whose peers form a ring.
fn generate_data(count: usize) -> (List, Vec<Shared<BenchItem>>) {
    let items: Vec<Shared<BenchItem>> = (0..count)
        .map(|i| {
            shared(BenchItem {
                id: i as i64,
                label: format!("item-{i}"),
                payload: List::from_vec((0..16).map(Value::from).collect()),
                peer: None,
            })
        })
        .collect();
    for (i, item) in items.iter().enumerate() {
        let peer = &items[(i + 1) % count];
        item.borrow_mut().peer = Some(peer.clone());
        if i % 2 == 1 {
            let payload = items[i - 1].borrow().payload.clone();
            item.borrow_mut().payload = payload;
        }
    }
    let root = List::from_vec(items.iter().cloned().map(Value::from).collect());
    (root, items)
}

fn registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    registry.register_record::<BenchItem>();
    registry
}

// --- BENCHMARKS ---

fn bench_codec(c: &mut Criterion) {
    let item_count = 10_000;
    let (root, items) = generate_data(item_count);
    let root = Value::from(root);
    let options = Refcode::builder().compact();
    let text = options.encode(&root).expect("encode failed");
    let registry = registry();

    let mut group = c.benchmark_group("Codec");
    group.throughput(Throughput::Bytes(text.len() as u64));

    group.bench_function("encode_compact", |b| {
        b.iter(|| options.encode(black_box(&root)).expect("encode failed"));
    });

    group.bench_function("encode_pretty", |b| {
        b.iter(|| Refcode::encode(black_box(&root)).expect("encode failed"));
    });

    group.bench_function("decode", |b| {
        b.iter(|| {
            let decoded = Refcode::decode(black_box(&text), &registry).expect("decode failed");
            // Open the peer ring so each iteration frees its graph.
            if let Some(list) = decoded.as_list() {
                for item in list.to_vec() {
                    if let Some(record) = item.to_record::<BenchItem>() {
                        record.borrow_mut().peer = None;
                    }
                }
            }
        });
    });

    group.finish();

    for item in &items {
        item.borrow_mut().peer = None;
    }
}

criterion_group!(benches, bench_codec);
criterion_main!(benches);
