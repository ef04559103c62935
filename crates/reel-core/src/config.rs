//! Game configuration: species catalog, gear catalog and tuning curves.
//!
//! Every section carries defaults, so a YAML file only needs to state what it
//! overrides. [`GameConfig::load`] and [`GameConfig::from_yaml_str`] validate
//! before returning.

use crate::{
    validate_lure, validate_rod, validate_species, FishSpeciesTemplate, Lure, LureId, Rod, RodId,
    SpeciesId, ValidationError,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Errors raised while loading a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(#[from] ValidationError),
}

/// Fish attribute sampling.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FactoryTuning {
    /// Size mean as a fraction of `size_max_cm`.
    pub mean_fraction: f64,
    /// Size standard deviation as a fraction of `size_max_cm`.
    pub sd_fraction: f64,
    /// Size scale-up per unit of strength norm.
    pub size_strength_boost: f64,
    /// Quality added per unit of fishing norm.
    pub fishing_quality_weight: f64,
    /// Rarity added per unit of luck norm.
    pub luck_rarity_weight: f64,
    /// Special-trait probability at zero luck.
    pub special_base_chance: f64,
    /// Special-trait probability added per unit of luck norm.
    pub special_luck_chance: f64,
}

impl Default for FactoryTuning {
    fn default() -> Self {
        Self {
            mean_fraction: 0.7,
            sd_fraction: 0.15,
            size_strength_boost: 0.1,
            fishing_quality_weight: 0.5,
            luck_rarity_weight: 0.5,
            special_base_chance: 0.01,
            special_luck_chance: 0.02,
        }
    }
}

/// One row of the jackpot multiplier table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JackpotEntry {
    pub multiplier: f64,
    pub weight: f64,
}

/// Price curve parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingTuning {
    /// Base price per cm of the species' maximum size.
    pub price_base_per_cm: f64,
    /// Multipliers indexed by main-stat tier, lowest first.
    pub tier_multipliers: Vec<f64>,
    /// Quality-rarity multiplier at the bottom of the curve.
    pub qr_min: f64,
    /// Quality-rarity multiplier at the top of the curve.
    pub qr_max: f64,
    /// Curve exponent applied to the mean of quality and rarity.
    pub qr_exponent: f64,
    /// Lowest tier index that may roll a jackpot.
    pub jackpot_min_tier: usize,
    /// Jackpot probability at zero luck.
    pub base_jackpot_chance: f64,
    /// Jackpot probability added per unit of luck norm.
    pub luck_jackpot_weight: f64,
    /// Weighted multipliers drawn once a jackpot fires.
    pub jackpot_table: Vec<JackpotEntry>,
    /// Multiplier used when a jackpot fires but the table cannot be sampled.
    pub jackpot_fallback_multiplier: f64,
    /// Price boost per unit of trading norm.
    pub trading_boost_factor: f64,
}

impl Default for PricingTuning {
    fn default() -> Self {
        Self {
            price_base_per_cm: 0.05,
            tier_multipliers: vec![1.0, 1.2, 1.5, 2.0, 3.0],
            qr_min: 0.75,
            qr_max: 1.75,
            qr_exponent: 1.5,
            jackpot_min_tier: 3,
            base_jackpot_chance: 0.02,
            luck_jackpot_weight: 0.03,
            jackpot_table: vec![
                JackpotEntry { multiplier: 2.0, weight: 60.0 },
                JackpotEntry { multiplier: 3.0, weight: 30.0 },
                JackpotEntry { multiplier: 5.0, weight: 10.0 },
            ],
            jackpot_fallback_multiplier: 5.0,
            trading_boost_factor: 0.5,
        }
    }
}

/// Bite loop cadence.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BiteTuning {
    pub interval_min_secs: f64,
    pub interval_max_secs: f64,
    /// Probability that a wake-up produces a bite.
    pub bite_chance: f64,
    /// How long an offered fish waits for acceptance.
    pub accept_timeout_secs: f64,
    /// Spawn weight boost per unit of luck norm.
    pub luck_spawn_weight: f64,
}

impl Default for BiteTuning {
    fn default() -> Self {
        Self {
            interval_min_secs: 2.0,
            interval_max_secs: 6.0,
            bite_chance: 0.6,
            accept_timeout_secs: 3.0,
            luck_spawn_weight: 0.1,
        }
    }
}

/// Fight resolution.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CatchTuning {
    /// Logistic temperature; larger values pull odds toward 50/50.
    pub balance_factor: f64,
    /// Duration of the fight before the outcome is drawn.
    pub resolution_secs: f64,
}

impl Default for CatchTuning {
    fn default() -> Self {
        Self {
            balance_factor: 2.5,
            resolution_secs: 1.5,
        }
    }
}

/// Round goals, sell limits and upgrade prices.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyTuning {
    /// Goal of level 1.
    pub goal_base: Decimal,
    /// Geometric growth per level (>= 1).
    pub goal_growth: f64,
    /// Linear growth per level.
    pub goal_linear_add: Decimal,
    pub max_sells_per_round: u32,
    /// Only one sell action (single sale or batch) per round.
    pub one_sell_per_round: bool,
    /// Cost of a stat upgrade at stat value 0.
    pub stat_upgrade_base_cost: Decimal,
    /// Extra upgrade cost per current stat point.
    pub stat_upgrade_step_cost: Decimal,
    /// Points granted per upgrade.
    pub stat_upgrade_points: u8,
}

impl Default for EconomyTuning {
    fn default() -> Self {
        Self {
            goal_base: Decimal::new(2500, 2),
            goal_growth: 1.25,
            goal_linear_add: Decimal::new(500, 2),
            max_sells_per_round: 5,
            one_sell_per_round: false,
            stat_upgrade_base_cost: Decimal::new(500, 2),
            stat_upgrade_step_cost: Decimal::new(50, 2),
            stat_upgrade_points: 5,
        }
    }
}

/// Pool reserve sizing.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolTuning {
    /// Idle instances kept ready per species.
    pub reserve_per_species: usize,
}

impl Default for PoolTuning {
    fn default() -> Self {
        Self {
            reserve_per_species: 2,
        }
    }
}

/// Gear handed to a new (or reset) player.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StartingGear {
    pub rod: RodId,
    pub lure: LureId,
}

impl Default for StartingGear {
    fn default() -> Self {
        Self {
            rod: RodId("twig".into()),
            lure: LureId("worm".into()),
        }
    }
}

/// Complete game configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub species: Vec<FishSpeciesTemplate>,
    pub rods: Vec<Rod>,
    pub lures: Vec<Lure>,
    pub factory: FactoryTuning,
    pub pricing: PricingTuning,
    pub bite: BiteTuning,
    pub catch: CatchTuning,
    pub economy: EconomyTuning,
    pub pool: PoolTuning,
    /// Number of catch sockets the bite loop may offer to.
    pub sockets: usize,
    pub starting_gear: StartingGear,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            species: default_species(),
            rods: vec![
                rod("twig", "Twig Rod", 0.0, 0),
                rod("fiberglass", "Fiberglass Rod", 1.5, 4000),
                rod("carbon", "Carbon Rod", 3.0, 12000),
            ],
            lures: vec![
                lure("worm", "Worm", 0.0, 0.0, 0),
                lure("spinner", "Spinner", 0.1, 0.03, 2500),
                lure("golden_fly", "Golden Fly", 0.25, 0.08, 9000),
            ],
            factory: FactoryTuning::default(),
            pricing: PricingTuning::default(),
            bite: BiteTuning::default(),
            catch: CatchTuning::default(),
            economy: EconomyTuning::default(),
            pool: PoolTuning::default(),
            sockets: 1,
            starting_gear: StartingGear::default(),
        }
    }
}

impl GameConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let cfg: GameConfig = serde_yaml::from_str(text)?;
        validate_game_config(&cfg)?;
        Ok(cfg)
    }

    /// Read, parse and validate a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path.as_ref())?;
        let cfg = Self::from_yaml_str(&text)?;
        info!(
            path = %path.as_ref().display(),
            species = cfg.species.len(),
            rods = cfg.rods.len(),
            lures = cfg.lures.len(),
            "loaded game config"
        );
        Ok(cfg)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn species(&self, id: &SpeciesId) -> Option<&FishSpeciesTemplate> {
        self.species.iter().find(|s| &s.id == id)
    }

    pub fn rod(&self, id: &RodId) -> Option<&Rod> {
        self.rods.iter().find(|r| &r.id == id)
    }

    pub fn lure(&self, id: &LureId) -> Option<&Lure> {
        self.lures.iter().find(|l| &l.id == id)
    }
}

/// Validate the whole configuration, including cross-references.
pub fn validate_game_config(cfg: &GameConfig) -> Result<(), ValidationError> {
    if cfg.species.is_empty() {
        return Err(ValidationError::EmptyCatalog);
    }
    let mut seen = BTreeSet::new();
    for s in &cfg.species {
        validate_species(s)?;
        if !seen.insert(s.id.0.as_str()) {
            return Err(ValidationError::DuplicateId(s.id.0.clone()));
        }
    }
    let mut seen = BTreeSet::new();
    for r in &cfg.rods {
        validate_rod(r)?;
        if !seen.insert(r.id.0.as_str()) {
            return Err(ValidationError::DuplicateId(r.id.0.clone()));
        }
    }
    let mut seen = BTreeSet::new();
    for l in &cfg.lures {
        validate_lure(l)?;
        if !seen.insert(l.id.0.as_str()) {
            return Err(ValidationError::DuplicateId(l.id.0.clone()));
        }
    }
    if cfg.rod(&cfg.starting_gear.rod).is_none() {
        return Err(ValidationError::UnknownGear(cfg.starting_gear.rod.0.clone()));
    }
    if cfg.lure(&cfg.starting_gear.lure).is_none() {
        return Err(ValidationError::UnknownGear(cfg.starting_gear.lure.0.clone()));
    }
    validate_factory(&cfg.factory)?;
    validate_pricing(&cfg.pricing)?;

    let b = &cfg.bite;
    if !(b.interval_min_secs.is_finite() && b.interval_max_secs.is_finite())
        || b.interval_min_secs < 0.0
        || b.interval_min_secs > b.interval_max_secs
    {
        return Err(ValidationError::InvalidTuning("bite interval"));
    }
    if !(0.0..=1.0).contains(&b.bite_chance) {
        return Err(ValidationError::InvalidTuning("bite_chance must be within [0,1]"));
    }
    if !b.accept_timeout_secs.is_finite() || b.accept_timeout_secs < 0.0 {
        return Err(ValidationError::InvalidTuning("accept_timeout_secs"));
    }
    if !b.luck_spawn_weight.is_finite() {
        return Err(ValidationError::NonFinite("luck_spawn_weight"));
    }

    let c = &cfg.catch;
    if !(c.balance_factor.is_finite() && c.balance_factor > 0.0) {
        return Err(ValidationError::InvalidTuning("balance_factor must be > 0"));
    }
    if !c.resolution_secs.is_finite() || c.resolution_secs < 0.0 {
        return Err(ValidationError::InvalidTuning("resolution_secs"));
    }

    let e = &cfg.economy;
    if e.goal_base <= Decimal::ZERO {
        return Err(ValidationError::InvalidTuning("goal_base must be > 0"));
    }
    if !e.goal_growth.is_finite() || e.goal_growth < 1.0 {
        return Err(ValidationError::InvalidTuning("goal_growth must be >= 1"));
    }
    if e.goal_linear_add < Decimal::ZERO
        || e.stat_upgrade_base_cost < Decimal::ZERO
        || e.stat_upgrade_step_cost < Decimal::ZERO
    {
        return Err(ValidationError::Negative("economy"));
    }
    if e.max_sells_per_round == 0 {
        return Err(ValidationError::InvalidTuning("max_sells_per_round must be > 0"));
    }
    if cfg.sockets == 0 {
        return Err(ValidationError::InvalidTuning("at least one socket is required"));
    }
    Ok(())
}

fn validate_factory(f: &FactoryTuning) -> Result<(), ValidationError> {
    let nums = [
        f.mean_fraction,
        f.sd_fraction,
        f.size_strength_boost,
        f.fishing_quality_weight,
        f.luck_rarity_weight,
        f.special_base_chance,
        f.special_luck_chance,
    ];
    if nums.iter().any(|v| !v.is_finite()) {
        return Err(ValidationError::NonFinite("factory"));
    }
    if f.sd_fraction < 0.0 || f.mean_fraction < 0.0 {
        return Err(ValidationError::Negative("factory"));
    }
    Ok(())
}

fn validate_pricing(p: &PricingTuning) -> Result<(), ValidationError> {
    if p.tier_multipliers.is_empty() {
        return Err(ValidationError::InvalidTuning("tier_multipliers is empty"));
    }
    if p
        .tier_multipliers
        .iter()
        .any(|m| !m.is_finite() || *m <= 0.0)
    {
        return Err(ValidationError::InvalidTuning("tier multipliers must be > 0"));
    }
    let nums = [
        p.price_base_per_cm,
        p.qr_min,
        p.qr_max,
        p.qr_exponent,
        p.base_jackpot_chance,
        p.luck_jackpot_weight,
        p.jackpot_fallback_multiplier,
        p.trading_boost_factor,
    ];
    if nums.iter().any(|v| !v.is_finite()) {
        return Err(ValidationError::NonFinite("pricing"));
    }
    if p.price_base_per_cm < 0.0 || p.qr_min < 0.0 {
        return Err(ValidationError::Negative("pricing"));
    }
    if p.qr_min > p.qr_max {
        return Err(ValidationError::InvalidTuning("qr_min must be <= qr_max"));
    }
    if p.qr_exponent <= 0.0 {
        return Err(ValidationError::InvalidTuning("qr_exponent must be > 0"));
    }
    // An empty or zero-weight jackpot table is allowed: the fallback
    // multiplier covers it.
    if p
        .jackpot_table
        .iter()
        .any(|j| !(j.multiplier.is_finite() && j.weight.is_finite()) || j.multiplier < 0.0)
    {
        return Err(ValidationError::InvalidTuning("jackpot table"));
    }
    Ok(())
}

fn rod(id: &str, name: &str, strength_bonus: f64, price_cents: i64) -> Rod {
    Rod {
        id: RodId(id.into()),
        name: name.into(),
        strength_bonus,
        price: Decimal::new(price_cents, 2),
    }
}

fn lure(id: &str, name: &str, spawn_bias: f64, quality_bonus: f64, price_cents: i64) -> Lure {
    Lure {
        id: LureId(id.into()),
        name: name.into(),
        spawn_bias,
        quality_bonus,
        price: Decimal::new(price_cents, 2),
    }
}

#[allow(clippy::too_many_arguments)]
fn species(
    id: &str,
    name: &str,
    size: (f64, f64),
    age: (f64, f64, f64),
    base_quality: f64,
    base_rarity: f64,
    spawn_weight: f64,
    price_scale: f64,
) -> FishSpeciesTemplate {
    FishSpeciesTemplate {
        id: SpeciesId(id.into()),
        name: name.into(),
        size_min_cm: size.0,
        size_max_cm: size.1,
        age_min: age.0,
        age_max: age.1,
        optimal_age: age.2,
        base_quality,
        base_rarity,
        spawn_weight,
        price_scale,
    }
}

fn default_species() -> Vec<FishSpeciesTemplate> {
    vec![
        species("perch", "Perch", (10.0, 35.0), (1.0, 8.0, 4.0), 0.4, 0.1, 40.0, 1.0),
        species("trout", "Trout", (20.0, 60.0), (1.0, 10.0, 5.0), 0.6, 0.3, 25.0, 1.3),
        species("carp", "Carp", (30.0, 90.0), (2.0, 25.0, 12.0), 0.35, 0.2, 20.0, 0.9),
        species("pike", "Pike", (40.0, 120.0), (2.0, 20.0, 9.0), 0.55, 0.5, 10.0, 1.6),
        species("sturgeon", "Sturgeon", (80.0, 200.0), (5.0, 60.0, 30.0), 0.8, 0.9, 2.0, 2.5),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        validate_game_config(&GameConfig::default()).unwrap();
    }

    #[test]
    fn partial_yaml_uses_defaults() {
        let cfg = GameConfig::from_yaml_str(
            "economy:\n  max_sells_per_round: 3\nbite:\n  bite_chance: 1.0\n",
        )
        .unwrap();
        assert_eq!(cfg.economy.max_sells_per_round, 3);
        assert_eq!(cfg.bite.bite_chance, 1.0);
        assert_eq!(cfg.bite.accept_timeout_secs, 3.0);
        assert_eq!(cfg.species.len(), 5);
    }

    #[test]
    fn yaml_roundtrip() {
        let cfg = GameConfig::default();
        let text = cfg.to_yaml().unwrap();
        let back = GameConfig::from_yaml_str(&text).unwrap();
        assert_eq!(back.species.len(), cfg.species.len());
        assert_eq!(back.economy.goal_base, cfg.economy.goal_base);
        assert_eq!(back.pricing.tier_multipliers, cfg.pricing.tier_multipliers);
    }

    #[test]
    fn rejects_unknown_starting_gear() {
        let mut cfg = GameConfig::default();
        cfg.starting_gear.rod = RodId("harpoon".into());
        assert_eq!(
            validate_game_config(&cfg),
            Err(ValidationError::UnknownGear("harpoon".into()))
        );
    }

    #[test]
    fn rejects_duplicates_and_empty_catalog() {
        let mut cfg = GameConfig::default();
        let dup = cfg.species[0].clone();
        cfg.species.push(dup);
        assert_eq!(
            validate_game_config(&cfg),
            Err(ValidationError::DuplicateId("perch".into()))
        );
        cfg.species.clear();
        assert_eq!(validate_game_config(&cfg), Err(ValidationError::EmptyCatalog));
    }

    #[test]
    fn rejects_bad_tuning() {
        let mut cfg = GameConfig::default();
        cfg.bite.interval_min_secs = 9.0;
        assert!(validate_game_config(&cfg).is_err());

        let mut cfg = GameConfig::default();
        cfg.catch.balance_factor = 0.0;
        assert!(validate_game_config(&cfg).is_err());

        let mut cfg = GameConfig::default();
        cfg.pricing.tier_multipliers.clear();
        assert!(validate_game_config(&cfg).is_err());

        let mut cfg = GameConfig::default();
        cfg.economy.goal_growth = 0.5;
        assert!(validate_game_config(&cfg).is_err());
    }

    #[test]
    fn reference_asset_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../assets/game.yaml");
        let cfg = GameConfig::load(path).unwrap();
        assert!(cfg.species.len() >= 3);
        assert!(cfg.rod(&cfg.starting_gear.rod).is_some());
    }

    #[test]
    fn lookups() {
        let cfg = GameConfig::default();
        assert!(cfg.species(&SpeciesId("pike".into())).is_some());
        assert!(cfg.species(&SpeciesId("shark".into())).is_none());
        assert!(cfg.lure(&LureId("spinner".into())).is_some());
    }
}
