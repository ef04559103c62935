//! Aggregate statistics over many generated fish.
//!
//! Used by the CLI `stats` command and the benches to eyeball how tuning
//! changes move prices, tiers and jackpot frequency.

use crate::factory::{spawn_weights, FishFactory};
use reel_core::{FishData, GameConfig, Lure, PlayerProfile, RngService, SpeciesId, Stat};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

/// Running totals of generated fish.
#[derive(Clone, Debug, Default, Serialize)]
pub struct BatchStats {
    pub count: u64,
    pub total_price: Decimal,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub jackpots: u64,
    pub specials: u64,
    /// Fish per main-stat tier index.
    pub tiers: BTreeMap<usize, u64>,
    /// Fish per species.
    pub species: BTreeMap<SpeciesId, u64>,
}

impl BatchStats {
    pub fn record(&mut self, fish: &FishData) {
        self.count += 1;
        self.total_price += fish.price;
        self.min_price = Some(self.min_price.map_or(fish.price, |m| m.min(fish.price)));
        self.max_price = Some(self.max_price.map_or(fish.price, |m| m.max(fish.price)));
        if fish.pricing.jackpot_triggered {
            self.jackpots += 1;
        }
        if fish.special_trait {
            self.specials += 1;
        }
        *self.tiers.entry(fish.pricing.tier_index).or_default() += 1;
        *self.species.entry(fish.species.clone()).or_default() += 1;
    }

    /// Mean price rounded to cents; zero for an empty batch.
    pub fn mean_price(&self) -> Decimal {
        if self.count == 0 {
            return Decimal::new(0, 2);
        }
        reel_core::money(self.total_price / Decimal::from(self.count))
    }

    pub fn jackpot_rate(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.jackpots as f64 / self.count as f64
    }

    /// Share of fish per species, in [0,1].
    pub fn species_share(&self, id: &SpeciesId) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.species.get(id).copied().unwrap_or(0) as f64 / self.count as f64
    }
}

/// Generates `count` fish the way the bite loop would pick them (spawn
/// weights with luck and lure bias) and aggregates them. Returns an empty
/// batch when no species can spawn.
pub fn run_batch(
    cfg: &GameConfig,
    player: &PlayerProfile,
    lure: &Lure,
    rng: &mut RngService,
    count: u64,
) -> BatchStats {
    let factory = FishFactory::from_config(cfg);
    let weights = spawn_weights(
        &cfg.species,
        lure,
        player.norm(Stat::Luck),
        cfg.bite.luck_spawn_weight,
    );
    let mut stats = BatchStats::default();
    for _ in 0..count {
        let Some(i) = rng.weighted_choice_index(&weights) else {
            break;
        };
        let fish = factory.generate(&cfg.species[i], lure, player, rng);
        stats.record(&fish);
    }
    stats
}
