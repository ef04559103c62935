use criterion::{criterion_group, criterion_main, Criterion};
use reel_core::{GameConfig, LureId, PlayerProfile, RngService, RodId};
use reel_runtime::FishPool;

fn bench_pool_churn(c: &mut Criterion) {
    let cfg = GameConfig::default();
    let factory = reel_econ::FishFactory::from_config(&cfg);
    let player = PlayerProfile::new(RodId("twig".into()), LureId("worm".into()));
    let mut rng = RngService::new(42);
    let fish: Vec<_> = cfg
        .species
        .iter()
        .map(|s| factory.generate(s, &cfg.lures[0], &player, &mut rng))
        .collect();
    let mut pool = FishPool::new();
    let ids: Vec<_> = cfg.species.iter().map(|s| s.id.clone()).collect();
    pool.refill_all(&ids, 4);
    c.bench_function("pool_acquire_release", |b| {
        b.iter(|| {
            let keys: Vec<_> = fish
                .iter()
                .map(|f| pool.acquire(f.clone(), [0.0; 3]))
                .collect();
            for k in keys {
                let _ = pool.release(k);
            }
        })
    });
}

criterion_group!(benches, bench_pool_churn);
criterion_main!(benches);
