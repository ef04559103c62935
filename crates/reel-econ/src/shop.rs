//! Stat upgrades and gear purchases paid from the persistent balance.

use reel_core::{money, GameConfig, LureId, PlayerProfile, RodId, Stat, STAT_MAX};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{info, warn};

/// Errors produced by shop operations. The player is untouched on error.
#[derive(Debug, Error, PartialEq)]
pub enum ShopError {
    /// Balance is below the asking price.
    #[error("insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: Decimal, available: Decimal },
    /// The stat is already at its maximum.
    #[error("{0:?} is already maxed")]
    StatMaxed(Stat),
    /// No rod or lure with that id exists in the catalog.
    #[error("unknown gear: {0}")]
    UnknownGear(String),
}

/// Cost of the next upgrade of a stat currently at `current`. Saturates at
/// `Decimal::MAX`, which no balance can pay.
///
/// Example:
/// base 5.00, step 0.50, current 10 => 10.00
pub fn upgrade_cost(cfg: &GameConfig, current: u8) -> Decimal {
    let e = &cfg.economy;
    e.stat_upgrade_step_cost
        .checked_mul(Decimal::from(current))
        .and_then(|step| step.checked_add(e.stat_upgrade_base_cost))
        .map_or(Decimal::MAX, money)
}

/// Buys `stat_upgrade_points` of `stat`, saturating at the stat maximum.
/// Returns the new stat value.
pub fn upgrade_stat(
    cfg: &GameConfig,
    player: &mut PlayerProfile,
    stat: Stat,
) -> Result<u8, ShopError> {
    let current = player.stats.get(stat);
    if current >= STAT_MAX {
        warn!(?stat, "upgrade refused, stat maxed");
        return Err(ShopError::StatMaxed(stat));
    }
    let cost = upgrade_cost(cfg, current);
    pay(player, cost)?;
    let next = current.saturating_add(cfg.economy.stat_upgrade_points);
    player.stats.set(stat, next);
    let value = player.stats.get(stat);
    info!(?stat, value, %cost, balance = %player.balance, "stat upgraded");
    Ok(value)
}

/// Equips a rod, buying it first if it is not owned yet.
/// Returns the amount paid (zero when already owned).
pub fn equip_rod(
    cfg: &GameConfig,
    player: &mut PlayerProfile,
    id: &RodId,
) -> Result<Decimal, ShopError> {
    let rod = cfg
        .rod(id)
        .ok_or_else(|| ShopError::UnknownGear(id.0.clone()))?;
    let paid = if player.owned_rods.contains(id) {
        Decimal::ZERO
    } else {
        pay(player, rod.price)?;
        player.owned_rods.insert(id.clone());
        rod.price
    };
    player.rod = id.clone();
    info!(rod = %id, %paid, "rod equipped");
    Ok(paid)
}

/// Equips a lure, buying it first if it is not owned yet.
pub fn equip_lure(
    cfg: &GameConfig,
    player: &mut PlayerProfile,
    id: &LureId,
) -> Result<Decimal, ShopError> {
    let lure = cfg
        .lure(id)
        .ok_or_else(|| ShopError::UnknownGear(id.0.clone()))?;
    let paid = if player.owned_lures.contains(id) {
        Decimal::ZERO
    } else {
        pay(player, lure.price)?;
        player.owned_lures.insert(id.clone());
        lure.price
    };
    player.lure = id.clone();
    info!(lure = %id, %paid, "lure equipped");
    Ok(paid)
}

fn pay(player: &mut PlayerProfile, cost: Decimal) -> Result<(), ShopError> {
    if player.debit(cost) {
        return Ok(());
    }
    warn!(%cost, balance = %player.balance, "purchase refused");
    Err(ShopError::InsufficientFunds {
        needed: cost,
        available: player.balance,
    })
}
