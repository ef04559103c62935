#![deny(warnings)]

//! Core domain models and invariants for the fishing economy.
//!
//! This crate defines the authored data (species templates, rods, lures),
//! the per-player profile, the generated fish record and its lifecycle tag,
//! together with validation helpers, the injectable [`RngService`] and the
//! [`GameConfig`] tuning tree.

pub mod config;
pub mod rng;

pub use config::*;
pub use rng::RngService;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// Upper bound of every player stat.
pub const STAT_MAX: u8 = 100;

/// Unique identifier for a fish species, e.g. "perch".
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpeciesId(pub String);

/// Unique identifier for a rod in the gear catalog.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RodId(pub String);

/// Unique identifier for a lure in the gear catalog.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LureId(pub String);

macro_rules! display_id {
    ($($t:ty),*) => {
        $(impl fmt::Display for $t {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        })*
    };
}

display_id!(SpeciesId, RodId, LureId);

/// Immutable authored description of a fish species.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FishSpeciesTemplate {
    /// Species identifier.
    pub id: SpeciesId,
    /// Human-readable name.
    pub name: String,
    /// Smallest generated size in cm (>= 0).
    pub size_min_cm: f64,
    /// Largest generated size in cm (> 0, >= `size_min_cm`).
    pub size_max_cm: f64,
    /// Youngest generated age in years.
    pub age_min: f64,
    /// Oldest generated age in years.
    pub age_max: f64,
    /// Age with the best age score, within `[age_min, age_max]`.
    pub optimal_age: f64,
    /// Baseline quality norm in [0,1].
    pub base_quality: f64,
    /// Baseline rarity norm in [0,1].
    pub base_rarity: f64,
    /// Relative spawn weight (>= 0).
    pub spawn_weight: f64,
    /// Species price multiplier (>= 0).
    pub price_scale: f64,
}

/// A fishing rod; its bonus feeds the fight resolution.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Rod {
    /// Rod identifier.
    pub id: RodId,
    /// Display name.
    pub name: String,
    /// Flat bonus added to the player's effective strength.
    pub strength_bonus: f64,
    /// Shop price.
    pub price: Decimal,
}

/// A lure; biases which species bite and nudges quality.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Lure {
    /// Lure identifier.
    pub id: LureId,
    /// Display name.
    pub name: String,
    /// Spawn weight bias applied as `1 + spawn_bias`.
    pub spawn_bias: f64,
    /// Added to the quality norm before clamping.
    pub quality_bonus: f64,
    /// Shop price.
    pub price: Decimal,
}

/// The four player stats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stat {
    Fishing,
    Strength,
    Luck,
    Trading,
}

impl Stat {
    pub const ALL: [Stat; 4] = [Stat::Fishing, Stat::Strength, Stat::Luck, Stat::Trading];
}

/// Player stats, each in `0..=100`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub fishing: u8,
    pub strength: u8,
    pub luck: u8,
    pub trading: u8,
}

impl PlayerStats {
    pub fn get(&self, stat: Stat) -> u8 {
        match stat {
            Stat::Fishing => self.fishing,
            Stat::Strength => self.strength,
            Stat::Luck => self.luck,
            Stat::Trading => self.trading,
        }
    }

    /// Sets a stat, saturating at [`STAT_MAX`].
    pub fn set(&mut self, stat: Stat, value: u8) {
        let value = value.min(STAT_MAX);
        match stat {
            Stat::Fishing => self.fishing = value,
            Stat::Strength => self.strength = value,
            Stat::Luck => self.luck = value,
            Stat::Trading => self.trading = value,
        }
    }

    /// Stat mapped to [0,1].
    pub fn norm(&self, stat: Stat) -> f64 {
        f64::from(self.get(stat).min(STAT_MAX)) / f64::from(STAT_MAX)
    }
}

/// Per-session player state: stats, gear and persistent balance.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlayerProfile {
    /// Current stats.
    pub stats: PlayerStats,
    /// Equipped rod.
    pub rod: RodId,
    /// Equipped lure.
    pub lure: LureId,
    /// Rods bought so far (always contains the equipped one).
    pub owned_rods: BTreeSet<RodId>,
    /// Lures bought so far (always contains the equipped one).
    pub owned_lures: BTreeSet<LureId>,
    /// Persistent balance, two decimals.
    pub balance: Decimal,
}

impl PlayerProfile {
    /// Fresh player with zero stats, zero money and the given starting gear.
    pub fn new(rod: RodId, lure: LureId) -> Self {
        let mut p = Self {
            stats: PlayerStats::default(),
            rod: rod.clone(),
            lure: lure.clone(),
            owned_rods: BTreeSet::new(),
            owned_lures: BTreeSet::new(),
            balance: Decimal::new(0, 2),
        };
        p.owned_rods.insert(rod);
        p.owned_lures.insert(lure);
        p
    }

    pub fn norm(&self, stat: Stat) -> f64 {
        self.stats.norm(stat)
    }

    /// Zero stats and money and re-equip baseline gear.
    pub fn reset(&mut self, rod: RodId, lure: LureId) {
        *self = Self::new(rod, lure);
    }

    pub fn credit(&mut self, amount: Decimal) {
        self.balance = money(self.balance.saturating_add(amount));
    }

    /// Removes `amount` from the balance; returns false (and leaves the
    /// balance untouched) when funds are insufficient.
    pub fn debit(&mut self, amount: Decimal) -> bool {
        if amount < Decimal::ZERO || amount > self.balance {
            return false;
        }
        self.balance = money(self.balance - amount);
        true
    }
}

/// Lifecycle tag of a fish instance. Exactly one is active at a time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Lifecycle {
    /// Idle in its species reserve.
    Pooled,
    /// Offered to a socket, awaiting acceptance.
    Pending,
    /// Accepted by a socket.
    Hooked,
    /// Sale registered; about to be pooled.
    Sold,
    /// Escaped or thrown back; about to be pooled.
    Released,
}

/// How a fish price was composed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub base_price: f64,
    pub main_stat_norm: f64,
    pub tier_index: usize,
    pub tier_multiplier: f64,
    pub qr_multiplier: f64,
    pub jackpot_triggered: bool,
    pub jackpot_multiplier: f64,
    pub trading_boost: f64,
}

/// Generated attributes of one fish.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FishData {
    /// Template this fish was generated from.
    pub species: SpeciesId,
    /// Size in cm, within the template size range.
    pub size_cm: f64,
    /// Age in years, within the template age range.
    pub age_years: f64,
    /// Quality norm in [0,1].
    pub quality_norm: f64,
    /// Rarity norm in [0,1].
    pub rarity_norm: f64,
    /// Quality projected to [1,10].
    pub quality_display: f64,
    /// Rarity projected to [1,10].
    pub rarity_display: f64,
    /// Special trait flag.
    pub special_trait: bool,
    /// Final price, >= 0, scale 2. Never changes once computed.
    pub price: Decimal,
    /// Intermediate pricing terms.
    pub pricing: PriceBreakdown,
}

/// Maps a [0,1] norm onto the 1–10 display scale.
pub fn norm_to_display(norm: f64) -> f64 {
    1.0 + clamp01(norm) * 9.0
}

/// Clamp to [0,1]; NaN maps to 0.
pub fn clamp01(v: f64) -> f64 {
    if v.is_nan() {
        return 0.0;
    }
    v.clamp(0.0, 1.0)
}

/// Rounds a float amount to cents. Non-finite input yields zero.
pub fn round2(value: f64) -> Decimal {
    let d = if value.is_finite() {
        Decimal::from_f64(value).unwrap_or(Decimal::ZERO)
    } else {
        Decimal::ZERO
    };
    money(d)
}

/// Normalizes a decimal amount to exactly two decimal places.
pub fn money(d: Decimal) -> Decimal {
    let mut d = d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    d.rescale(2);
    d
}

/// Validation errors for domain invariants.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// The species catalog has no entries.
    #[error("species catalog is empty")]
    EmptyCatalog,
    /// Two catalog entries share an id.
    #[error("duplicate id: {0}")]
    DuplicateId(String),
    /// Size range is empty, negative or has a zero maximum.
    #[error("invalid size range for species {0}")]
    InvalidSizeRange(String),
    /// Age range is inverted or the optimal age lies outside it.
    #[error("invalid age range for species {0}")]
    InvalidAgeRange(String),
    /// A norm field lies outside [0,1].
    #[error("{field} must be within [0,1] (species {species})")]
    NormOutOfRange { species: String, field: &'static str },
    /// Numeric field must be finite.
    #[error("non-finite numeric value in {0}")]
    NonFinite(&'static str),
    /// Weights, scales and prices must be non-negative.
    #[error("negative value in {0}")]
    Negative(&'static str),
    /// A referenced rod or lure does not exist.
    #[error("unknown gear: {0}")]
    UnknownGear(String),
    /// A tuning parameter is outside its allowed domain.
    #[error("invalid tuning: {0}")]
    InvalidTuning(&'static str),
}

/// Validate a species template.
pub fn validate_species(s: &FishSpeciesTemplate) -> Result<(), ValidationError> {
    let nums = [
        s.size_min_cm,
        s.size_max_cm,
        s.age_min,
        s.age_max,
        s.optimal_age,
        s.base_quality,
        s.base_rarity,
        s.spawn_weight,
        s.price_scale,
    ];
    if nums.iter().any(|v| !v.is_finite()) {
        return Err(ValidationError::NonFinite("species template"));
    }
    if s.size_min_cm < 0.0 || s.size_max_cm <= 0.0 || s.size_min_cm > s.size_max_cm {
        return Err(ValidationError::InvalidSizeRange(s.id.0.clone()));
    }
    if s.age_min < 0.0 || s.age_min > s.age_max || !(s.age_min..=s.age_max).contains(&s.optimal_age)
    {
        return Err(ValidationError::InvalidAgeRange(s.id.0.clone()));
    }
    for (field, v) in [("base_quality", s.base_quality), ("base_rarity", s.base_rarity)] {
        if !(0.0..=1.0).contains(&v) {
            return Err(ValidationError::NormOutOfRange {
                species: s.id.0.clone(),
                field,
            });
        }
    }
    if s.spawn_weight < 0.0 {
        return Err(ValidationError::Negative("spawn_weight"));
    }
    if s.price_scale < 0.0 {
        return Err(ValidationError::Negative("price_scale"));
    }
    Ok(())
}

/// Validate a rod.
pub fn validate_rod(r: &Rod) -> Result<(), ValidationError> {
    if !r.strength_bonus.is_finite() {
        return Err(ValidationError::NonFinite("rod strength_bonus"));
    }
    if r.price < Decimal::ZERO {
        return Err(ValidationError::Negative("rod price"));
    }
    Ok(())
}

/// Validate a lure.
pub fn validate_lure(l: &Lure) -> Result<(), ValidationError> {
    if !(l.spawn_bias.is_finite() && l.quality_bonus.is_finite()) {
        return Err(ValidationError::NonFinite("lure bonus"));
    }
    if l.spawn_bias <= -1.0 {
        return Err(ValidationError::InvalidTuning("lure spawn_bias must be > -1"));
    }
    if l.price < Decimal::ZERO {
        return Err(ValidationError::Negative("lure price"));
    }
    Ok(())
}
