use criterion::{criterion_group, criterion_main, Criterion};
use reel_core::{GameConfig, LureId, PlayerProfile, RngService, RodId, Stat};

fn bench_generate(c: &mut Criterion) {
    let cfg = GameConfig::default();
    let factory = reel_econ::FishFactory::from_config(&cfg);
    let mut player = PlayerProfile::new(RodId("twig".into()), LureId("worm".into()));
    player.stats.set(Stat::Luck, 60);
    let lure = cfg.lures[0].clone();
    let species = cfg.species[0].clone();
    let mut rng = RngService::new(42);
    c.bench_function("fish_generate", |b| {
        b.iter(|| {
            let _ = factory.generate(&species, &lure, &player, &mut rng);
        })
    });
    c.bench_function("batch_1k", |b| {
        b.iter(|| {
            let _ = reel_econ::run_batch(&cfg, &player, &lure, &mut rng, 1_000);
        })
    });
}

criterion_group!(benches, bench_generate);
criterion_main!(benches);
