//! Fight resolution between a hooked fish and the player.

use reel_core::{FishData, FishSpeciesTemplate, PlayerProfile, Rod, RngService, Stat};
use serde::Serialize;

/// Catch-resolution inputs published when a fish is hooked.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct HookInfo {
    pub fish_strength: f64,
    pub player_strength: f64,
    /// Landing probability in [0,1].
    pub probability: f64,
}

/// `(size / size_max) * 10`.
pub fn fish_strength(fish: &FishData, species: &FishSpeciesTemplate) -> f64 {
    if species.size_max_cm <= 0.0 {
        return 0.0;
    }
    (fish.size_cm / species.size_max_cm) * 10.0
}

/// `strength_norm * 10 + rod bonus`. An unknown rod contributes nothing.
pub fn player_effective_strength(player: &PlayerProfile, rod: Option<&Rod>) -> f64 {
    player.norm(Stat::Strength) * 10.0 + rod.map_or(0.0, |r| r.strength_bonus)
}

/// Logistic landing odds; larger `balance_factor` flattens toward 1/2.
pub fn catch_probability(player_strength: f64, fish_strength: f64, balance_factor: f64) -> f64 {
    let p = 1.0 / (1.0 + (-(player_strength - fish_strength) / balance_factor).exp());
    if p.is_nan() {
        0.5
    } else {
        p
    }
}

/// Odds for `fish`, or `None` when its species template is missing.
pub fn hook_info(
    fish: &FishData,
    species: Option<&FishSpeciesTemplate>,
    player: &PlayerProfile,
    rod: Option<&Rod>,
    balance_factor: f64,
) -> Option<HookInfo> {
    let species = species?;
    let fish_strength = fish_strength(fish, species);
    let player_strength = player_effective_strength(player, rod);
    Some(HookInfo {
        fish_strength,
        player_strength,
        probability: catch_probability(player_strength, fish_strength, balance_factor),
    })
}

/// Draws the fight outcome. Without odds (missing template) the fish is
/// landed and no draw is consumed.
pub fn roll(info: Option<&HookInfo>, rng: &mut RngService) -> bool {
    match info {
        Some(info) => rng.chance(info.probability),
        None => true,
    }
}
