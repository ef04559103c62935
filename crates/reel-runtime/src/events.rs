//! Notifications published by a session.
//!
//! Subscribers get a `tokio::sync::broadcast` receiver; each transition
//! publishes at most once. A lagging subscriber loses the oldest events, the
//! session never waits for it.

use crate::bite::BiteStats;
use crate::catch::HookInfo;
use crate::pool::FishKey;
use crate::socket::SocketId;
use reel_core::FishData;
use reel_econ::{RoundOutcome, RoundSummary};
use rust_decimal::Decimal;
use serde::Serialize;

/// Capacity of the event channel.
pub const EVENT_CAPACITY: usize = 256;

#[derive(Clone, Debug, Serialize)]
pub enum SessionEvent {
    /// The lure entered the water and the bite loop started.
    BiteLoopStarted,
    /// The lure left the water; counters of the finished run.
    BiteLoopStopped { stats: BiteStats },
    /// A fish is waiting for acceptance.
    Offered {
        socket: SocketId,
        fish: FishKey,
        data: FishData,
    },
    /// The offer was accepted. `info` is `None` when the species template is
    /// missing; the fight then lands without a draw.
    Hooked {
        socket: SocketId,
        fish: FishKey,
        info: Option<HookInfo>,
    },
    /// Countdown elapsed or the offer was withdrawn; the fish is pooled.
    OfferExpired { socket: SocketId, fish: FishKey },
    FightResolved {
        socket: SocketId,
        fish: FishKey,
        landed: bool,
    },
    Sold {
        socket: SocketId,
        fish: FishKey,
        price: Decimal,
        round_money: Decimal,
    },
    /// A hooked fish was thrown back.
    Released { socket: SocketId, fish: FishKey },
    RoundEnded {
        outcome: RoundOutcome,
        summary: RoundSummary,
    },
}
