use atropos_consensus::vector_index::VectorIndex;
use atropos_consensus::ValidatorSet;
use atropos_types::{EventId, RawTimestamp, ValidatorId};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

fn validator_set(n: u32) -> ValidatorSet {
    ValidatorSet::new((1..=n).map(|i| (ValidatorId::new(i), 1)))
}

fn bench_add(c: &mut Criterion) {
    let mut group = c.benchmark_group("vector_index_add");

    group.bench_function("chain_of_1k_events_40_validators", |b| {
        b.iter_batched(
            || validator_set(40),
            |vs| {
                let mut idx = VectorIndex::new(&vs);
                let mut prev: Option<EventId> = None;
                for i in 0..1000u64 {
                    let id = EventId::compute(format!("e{i}").as_bytes());
                    let parents: Vec<EventId> = prev.into_iter().collect();
                    idx.add(
                        &vs,
                        id,
                        ValidatorId::new((i % 40) as u32 + 1),
                        i / 40 + 1,
                        RawTimestamp::new(i),
                        &parents,
                        prev,
                    );
                    prev = Some(id);
                }
                black_box(idx.contains(prev.unwrap()));
            },
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

fn bench_forkless_cause(c: &mut Criterion) {
    let mut group = c.benchmark_group("vector_index_forkless_cause");
    let vs = validator_set(40);

    let mut idx = VectorIndex::new(&vs);
    let mut roots = Vec::new();
    for v in 1..=40u32 {
        let id = EventId::compute(format!("root{v}").as_bytes());
        idx.add(&vs, id, ValidatorId::new(v), 1, RawTimestamp::new(1), &[], None);
        roots.push(id);
    }
    let head = EventId::compute(b"head");
    idx.add(
        &vs,
        head,
        ValidatorId::new(1),
        2,
        RawTimestamp::new(2),
        &roots,
        Some(roots[0]),
    );

    group.bench_function("quorum_over_40_validators", |b| {
        b.iter(|| black_box(idx.forkless_cause(&vs, head, roots[20])))
    });

    group.finish();
}

criterion_group!(benches, bench_add, bench_forkless_cause);
criterion_main!(benches);
