use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sim_core::{EconomyConfig, GameState, UpgradeKind};

fn bench_frames(c: &mut Criterion) {
    let cfg = EconomyConfig::industries();
    let mut state = GameState::new(&cfg);
    state.credits = 1e12;
    for kind in [UpgradeKind::Speed, UpgradeKind::Advertising, UpgradeKind::Logistics] {
        *state.level_mut(kind) = 20;
    }
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    c.bench_function("advance 60fps frame", |b| {
        b.iter(|| {
            let _ = black_box(sim_runtime::advance_in_place(
                &mut state,
                &cfg,
                1.0 / 60.0,
                &mut rng,
            ));
        })
    });
}

fn bench_hour(c: &mut Criterion) {
    let cfg = EconomyConfig::garage();
    let s0 = GameState::new(&cfg);
    c.bench_function("garage one simulated hour", |b| {
        b.iter(|| {
            let mut rng = ChaCha8Rng::seed_from_u64(7);
            let mut s = s0.clone();
            for _ in 0..3_600 {
                sim_runtime::advance_in_place(&mut s, &cfg, 1.0, &mut rng);
            }
            black_box(s)
        })
    });
}

criterion_group!(benches, bench_frames, bench_hour);
criterion_main!(benches);
