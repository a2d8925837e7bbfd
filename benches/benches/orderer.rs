use atropos_consensus::orderer::Orderer;
use atropos_consensus::vector_index::VectorIndex;
use atropos_consensus::ValidatorSet;
use atropos_types::{Event, EventId, RawTimestamp, ValidatorId};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use std::collections::HashMap;

fn chain(depth: u64) -> (ValidatorSet, VectorIndex, HashMap<EventId, Event>, EventId) {
    let vs = ValidatorSet::new([(ValidatorId::new(1), 1)]);
    let mut idx = VectorIndex::new(&vs);
    let mut store = HashMap::new();

    let mut prev: Option<EventId> = None;
    let mut last = EventId::ZERO;
    for seq in 1..=depth {
        let id = EventId::compute(format!("e{seq}").as_bytes());
        let parents: Vec<EventId> = prev.into_iter().collect();
        idx.add(
            &vs,
            id,
            ValidatorId::new(1),
            seq,
            RawTimestamp::new(seq),
            &parents,
            prev,
        );
        store.insert(
            id,
            Event {
                id,
                epoch: 1,
                creator: ValidatorId::new(1),
                seq,
                lamport: seq,
                parents,
                raw_time: RawTimestamp::new(seq),
            },
        );
        prev = Some(id);
        last = id;
    }

    (vs, idx, store, last)
}

fn bench_confirm(c: &mut Criterion) {
    let mut group = c.benchmark_group("orderer_confirm");

    group.bench_function("causal_past_of_1k_events", |b| {
        b.iter_batched(
            || (Orderer::new(), chain(1000)),
            |(mut orderer, (vs, idx, store, atropos))| {
                let block = orderer.confirm(1, atropos, &|id| store.get(&id).cloned(), &idx, &vs);
                black_box(block.events.len());
            },
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

criterion_group!(benches, bench_confirm);
criterion_main!(benches);
