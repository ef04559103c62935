//! Round economy: goal curve, sell limits, batch bracketing and win/fail
//! transitions.
//!
//! A round is `Active` until an evaluation finds the goal reached (`Won`) or
//! the sell attempts exhausted (`Failed`). The caller then cleans up its live
//! fish and calls [`RoundEconomy::start_round`] to begin the next one.

use reel_core::{money, round2, EconomyTuning, PlayerProfile, StartingGear};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Goals never exceed this amount, keeping the curve finite for huge levels.
pub const GOAL_CAP: f64 = 1e15;

/// Money goal for `level` (1-based):
/// `base * growth^(level-1) + linear_add * (level-1)`, rounded to cents.
///
/// Pure, and non-decreasing in `level` when `growth >= 1` and
/// `linear_add >= 0`. Level 0 is treated as level 1. The result saturates at
/// [`GOAL_CAP`].
pub fn round_goal(tuning: &EconomyTuning, level: u32) -> Decimal {
    let steps = level.max(1) - 1;
    let base = tuning.goal_base.to_f64().unwrap_or(0.0);
    let exponent = i32::try_from(steps).unwrap_or(i32::MAX);
    let mut geometric = base * tuning.goal_growth.powi(exponent);
    if !geometric.is_finite() || geometric > GOAL_CAP {
        geometric = GOAL_CAP;
    }
    let cap = round2(GOAL_CAP);
    let goal = tuning
        .goal_linear_add
        .checked_mul(Decimal::from(steps))
        .and_then(|linear| linear.checked_add(round2(geometric)))
        .map_or(cap, |goal| goal.min(cap));
    money(goal)
}

/// Where the current round stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundPhase {
    Active,
    Won,
    Failed,
}

/// Result of an end-of-round evaluation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RoundOutcome {
    /// Goal reached: round money moved to the balance, level advanced.
    Won {
        level: u32,
        round_money: Decimal,
        next_level: u32,
    },
    /// Attempts exhausted: level, stats, money and gear reset.
    Failed { level: u32, round_money: Decimal },
}

/// Mutable state of the round in progress.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoundState {
    pub level: u32,
    pub round_money: Decimal,
    pub sells_used: u32,
    pub active: bool,
    /// A sell action (single sale or batch) has been used this round.
    pub sell_action_used: bool,
}

impl RoundState {
    fn fresh(level: u32) -> Self {
        Self {
            level,
            round_money: Decimal::new(0, 2),
            sells_used: 0,
            active: true,
            sell_action_used: false,
        }
    }
}

/// Read-only snapshot for HUD collaborators.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoundSummary {
    pub level: u32,
    pub goal: Decimal,
    pub round_money: Decimal,
    pub sells_used: u32,
    pub sells_remaining: u32,
    pub max_sells: u32,
    pub phase: RoundPhase,
    pub in_batch: bool,
    /// Persistent player balance.
    pub balance: Decimal,
}

/// One finished round.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
    pub level: u32,
    pub goal: Decimal,
    pub round_money: Decimal,
    pub sells_used: u32,
    pub outcome: RoundPhase,
}

/// Accepted sale.
#[derive(Clone, Debug, PartialEq)]
pub struct SaleReceipt {
    pub price: Decimal,
    pub round_money: Decimal,
    pub sells_used: u32,
    /// Set when this sale ended the round (never inside a batch).
    pub outcome: Option<RoundOutcome>,
}

/// Rejected economy operations. State is unchanged when one is returned.
#[derive(Debug, Error, PartialEq)]
pub enum RoundError {
    #[error("no active round")]
    NoActiveRound,
    #[error("no sell attempts left ({used}/{max})")]
    NoSellsLeft { used: u32, max: u32 },
    #[error("the single sell action of this round was already used")]
    SellActionUsed,
    #[error("negative sale price {0}")]
    NegativePrice(Decimal),
    #[error("a batch is already open")]
    BatchAlreadyOpen,
    #[error("no batch is open")]
    NoBatch,
    #[error("round still in progress")]
    RoundInProgress,
}

#[derive(Clone, Debug, Default)]
struct BatchScope {
    sales: u32,
}

/// Level manager: tracks round money against the goal and drives round
/// transitions.
#[derive(Clone, Debug)]
pub struct RoundEconomy {
    tuning: EconomyTuning,
    starting_gear: StartingGear,
    state: RoundState,
    phase: RoundPhase,
    batch: Option<BatchScope>,
    history: Vec<RoundRecord>,
}

impl RoundEconomy {
    /// Starts at level 1 with an active round.
    pub fn new(tuning: EconomyTuning, starting_gear: StartingGear) -> Self {
        Self {
            tuning,
            starting_gear,
            state: RoundState::fresh(1),
            phase: RoundPhase::Active,
            batch: None,
            history: Vec::new(),
        }
    }

    pub fn tuning(&self) -> &EconomyTuning {
        &self.tuning
    }

    pub fn state(&self) -> &RoundState {
        &self.state
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn level(&self) -> u32 {
        self.state.level
    }

    pub fn history(&self) -> &[RoundRecord] {
        &self.history
    }

    pub fn in_batch(&self) -> bool {
        self.batch.is_some()
    }

    /// Goal of the current level.
    pub fn current_goal(&self) -> Decimal {
        round_goal(&self.tuning, self.state.level)
    }

    pub fn summary(&self, player: &PlayerProfile) -> RoundSummary {
        let max = self.tuning.max_sells_per_round;
        RoundSummary {
            level: self.state.level,
            goal: self.current_goal(),
            round_money: self.state.round_money,
            sells_used: self.state.sells_used,
            sells_remaining: max.saturating_sub(self.state.sells_used),
            max_sells: max,
            phase: self.phase,
            in_batch: self.batch.is_some(),
            balance: player.balance,
        }
    }

    /// Whether a sale would currently be accepted.
    pub fn can_sell(&self) -> Result<(), RoundError> {
        if self.phase != RoundPhase::Active || !self.state.active {
            return Err(RoundError::NoActiveRound);
        }
        let max = self.tuning.max_sells_per_round;
        if self.state.sells_used >= max {
            return Err(RoundError::NoSellsLeft {
                used: self.state.sells_used,
                max,
            });
        }
        let continues_batch = self.batch.as_ref().is_some_and(|b| b.sales > 0);
        if self.tuning.one_sell_per_round && self.state.sell_action_used && !continues_batch {
            return Err(RoundError::SellActionUsed);
        }
        Ok(())
    }

    /// Adds a sale to the round. Outside a batch the end conditions are
    /// evaluated immediately; inside a batch they wait for
    /// [`RoundEconomy::end_batch`].
    pub fn register_sale(
        &mut self,
        player: &mut PlayerProfile,
        price: Decimal,
    ) -> Result<SaleReceipt, RoundError> {
        if price < Decimal::ZERO {
            warn!(%price, "rejected sale with negative price");
            return Err(RoundError::NegativePrice(price));
        }
        if let Err(e) = self.can_sell() {
            warn!(error = %e, %price, "rejected sale");
            return Err(e);
        }
        let price = money(price);
        self.state.sells_used += 1;
        self.state.round_money = money(self.state.round_money.saturating_add(price));
        self.state.sell_action_used = true;
        if let Some(batch) = self.batch.as_mut() {
            batch.sales += 1;
        }
        debug!(
            %price,
            round_money = %self.state.round_money,
            sells_used = self.state.sells_used,
            batched = self.batch.is_some(),
            "sale registered"
        );
        let outcome = if self.batch.is_none() {
            self.evaluate(player)
        } else {
            None
        };
        Ok(SaleReceipt {
            price,
            round_money: self.state.round_money,
            sells_used: self.state.sells_used,
            outcome,
        })
    }

    /// Opens a batch: sales registered until [`RoundEconomy::end_batch`] are
    /// evaluated together.
    pub fn begin_batch(&mut self) -> Result<(), RoundError> {
        if self.phase != RoundPhase::Active {
            warn!("begin_batch outside an active round");
            return Err(RoundError::NoActiveRound);
        }
        if self.batch.is_some() {
            warn!("begin_batch while a batch is open");
            return Err(RoundError::BatchAlreadyOpen);
        }
        self.batch = Some(BatchScope::default());
        Ok(())
    }

    /// Closes the batch. With `evaluate`, runs exactly one end-of-round
    /// evaluation regardless of how many sales the batch held. Without it the
    /// evaluation still runs once the sell attempts are used up, since no
    /// later sale could trigger it.
    pub fn end_batch(
        &mut self,
        player: &mut PlayerProfile,
        evaluate: bool,
    ) -> Result<Option<RoundOutcome>, RoundError> {
        let Some(batch) = self.batch.take() else {
            warn!("end_batch without an open batch");
            return Err(RoundError::NoBatch);
        };
        debug!(sales = batch.sales, evaluate, "batch closed");
        let exhausted = self.state.sells_used >= self.tuning.max_sells_per_round;
        if !evaluate && !exhausted {
            return Ok(None);
        }
        Ok(self.evaluate(player))
    }

    /// Begins the next round after a win or failure.
    pub fn start_round(&mut self) -> Result<(), RoundError> {
        if self.phase == RoundPhase::Active {
            return Err(RoundError::RoundInProgress);
        }
        self.state = RoundState::fresh(self.state.level);
        self.phase = RoundPhase::Active;
        self.batch = None;
        info!(level = self.state.level, goal = %self.current_goal(), "round started");
        Ok(())
    }

    fn evaluate(&mut self, player: &mut PlayerProfile) -> Option<RoundOutcome> {
        if self.phase != RoundPhase::Active {
            return None;
        }
        let goal = self.current_goal();
        let level = self.state.level;
        let round_money = self.state.round_money;
        let outcome = if round_money >= goal {
            player.credit(round_money);
            self.state.level = level.saturating_add(1);
            self.phase = RoundPhase::Won;
            RoundOutcome::Won {
                level,
                round_money,
                next_level: self.state.level,
            }
        } else if self.state.sells_used >= self.tuning.max_sells_per_round {
            player.reset(
                self.starting_gear.rod.clone(),
                self.starting_gear.lure.clone(),
            );
            self.state.level = 1;
            self.phase = RoundPhase::Failed;
            RoundOutcome::Failed { level, round_money }
        } else {
            return None;
        };
        self.state.active = false;
        self.history.push(RoundRecord {
            level,
            goal,
            round_money,
            sells_used: self.state.sells_used,
            outcome: self.phase,
        });
        info!(?outcome, %goal, balance = %player.balance, "round ended");
        Some(outcome)
    }
}
