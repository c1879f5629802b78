use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use std::hint::black_box;
use tdl_2048::agent::{select_afterstate, train_episode, RandomPlacer, TdPolicy};
use tdl_2048::engine::{self, Board};
use tdl_2048::episode::play_episode;
use tdl_2048::ntuple::{Network, WeightBudget, DEFAULT_PATTERNS};

fn network() -> Network {
    Network::with_patterns(WeightBudget::default(), &DEFAULT_PATTERNS, 8).unwrap()
}

fn boards() -> Vec<Board> {
    let net = network();
    let mut play = TdPolicy::new(&net);
    let mut evil = RandomPlacer::new("seed=3").unwrap();
    play_episode(&mut play, &mut evil);
    play.into_trajectory().iter().map(|s| s.after).collect()
}

fn bench_estimate_update(c: &mut Criterion) {
    engine::warm();
    let boards = boards();
    let mut net = network();
    c.bench_function("ntuple/estimate", |bch| {
        bch.iter(|| {
            let mut acc = 0f32;
            for bd in &boards { acc += net.estimate(bd); }
            black_box(acc)
        })
    });
    c.bench_function("ntuple/update", |bch| {
        bch.iter(|| {
            let mut acc = 0f32;
            for bd in &boards { acc += net.update(bd, 0.001); }
            black_box(acc)
        })
    });
    c.bench_function("ntuple/select_afterstate", |bch| {
        bch.iter(|| {
            let mut acc = 0i32;
            for bd in &boards { acc = acc.wrapping_add(select_afterstate(&net, bd).reward); }
            black_box(acc)
        })
    });
}

fn bench_learn(c: &mut Criterion) {
    engine::warm();
    let mut net = network();
    let mut seed = 0u64;
    c.bench_function("ntuple/play_and_learn_episode", |bch| {
        bch.iter_batched(
            || {
                seed += 1;
                RandomPlacer::new(&format!("seed={seed}")).unwrap()
            },
            |mut evil| {
                let path = {
                    let mut play = TdPolicy::new(&net);
                    play_episode(&mut play, &mut evil);
                    play.into_trajectory()
                };
                black_box(train_episode(&mut net, path, 0.1))
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(ntuple, bench_estimate_update, bench_learn);
criterion_main!(ntuple);
