#![deny(warnings)]

//! Fish economy: procedural generation and pricing, round goals and sell
//! limits, the upgrade shop and batch statistics.
//!
//! Everything here is synchronous and deterministic given an
//! [`reel_core::RngService`]; timers and live instances live in
//! `reel-runtime`.

pub mod factory;
pub mod round;
pub mod shop;
pub mod stats;

pub use factory::{spawn_weights, FishFactory};
pub use round::{
    round_goal, RoundEconomy, RoundError, RoundOutcome, RoundPhase, RoundRecord, RoundState,
    RoundSummary, SaleReceipt,
};
pub use shop::{equip_lure, equip_rod, upgrade_cost, upgrade_stat, ShopError};
pub use stats::{run_batch, BatchStats};
