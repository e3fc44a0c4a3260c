//! Benchmarks for the dashboard state store
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use lbdash::config::StoreConfig;
use lbdash::connection::{ConnectionEvent, Payload, PayloadFormat};
use lbdash::store::{StateKey, StateStore, TagRouter};
use lbdash::StatsFeed;

fn feed_frames(count: usize) -> Vec<String> {
    let hosts: Vec<String> = (0..8).map(|i| format!("10.0.{}.{}", i % 3, 10 + i)).collect();
    let mut feed = StatsFeed::new(&hosts, 30);
    (0..count)
        .flat_map(|_| feed.tick().unwrap())
        .collect()
}

fn message_events(frames: &[String]) -> Vec<ConnectionEvent> {
    frames
        .iter()
        .map(|f| ConnectionEvent::Message(Payload::from_text(f.as_str(), PayloadFormat::Json)))
        .collect()
}

fn bench_routing(c: &mut Criterion) {
    let mut group = c.benchmark_group("routing");
    let router = TagRouter::new(["hostList", "stats"], Some("mutation".to_string()));
    let payloads: Vec<serde_json::Value> = feed_frames(50)
        .iter()
        .map(|f| serde_json::from_str(f).unwrap())
        .collect();

    group.throughput(Throughput::Elements(payloads.len() as u64));
    group.bench_function("route_feed_frames", |b| {
        b.iter(|| {
            for payload in &payloads {
                black_box(router.route(black_box(payload)));
            }
        })
    });

    group.finish();
}

fn bench_apply(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply");

    for ticks in [10, 100] {
        let frames = feed_frames(ticks);
        group.throughput(Throughput::Elements(frames.len() as u64));

        group.bench_function(format!("no_observers_{}", ticks), |b| {
            b.iter_batched(
                || (StateStore::new(&StoreConfig::default()), message_events(&frames)),
                |(mut store, events)| {
                    for event in events {
                        store.apply(event);
                    }
                    store.revision()
                },
                BatchSize::SmallInput,
            )
        });

        group.bench_function(format!("dashboard_observers_{}", ticks), |b| {
            b.iter_batched(
                || {
                    let mut store = StateStore::new(&StoreConfig::default());
                    let subs: Vec<_> = (0..3)
                        .map(|_| {
                            store.subscribe([
                                StateKey::Connection,
                                StateKey::slot("hostList"),
                                StateKey::slot("stats"),
                            ])
                        })
                        .collect();
                    (store, subs, message_events(&frames))
                },
                |(mut store, mut subs, events)| {
                    for event in events {
                        store.apply(event);
                    }
                    subs.iter_mut().map(|s| s.drain().len()).sum::<usize>()
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

criterion_group!(benches, bench_routing, bench_apply);
criterion_main!(benches);
