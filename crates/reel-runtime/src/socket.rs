//! Catch socket: `Idle -> Pending -> {Hooked | expired back to Idle}`.
//!
//! The socket only tracks which fish occupies it, the ticket of the
//! outstanding offer and its deadline. The countdown itself is a tokio task owned by the
//! session; its [`AbortHandle`] is parked here so acceptance can cancel it.
//! A countdown that fires after acceptance carries a stale ticket and is
//! ignored by [`SocketAcceptance::expire`].

use crate::pool::FishKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Index of a catch socket within a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SocketId(pub usize);

impl fmt::Display for SocketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "socket-{}", self.0)
    }
}

/// Identifies one offer; a countdown only expires the offer it was armed for.
pub type OfferTicket = u64;

/// Progress of the fight for a hooked fish.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Fight {
    /// Not resolved yet.
    Pending,
    /// Resolution delay running.
    InProgress,
    /// Fight won; the fish can be sold.
    Landed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SocketState {
    Idle,
    Pending {
        fish: FishKey,
        ticket: OfferTicket,
        /// Instant the offer lapses unless accepted.
        #[serde(skip)]
        deadline: Instant,
    },
    Hooked { fish: FishKey, fight: Fight },
}

#[derive(Debug, Error, PartialEq)]
pub enum SocketError {
    #[error("{0} already holds a fish")]
    Occupied(SocketId),
    #[error("{0} has no pending offer")]
    NotPending(SocketId),
    #[error("{socket} offered {offered:?}, not {got:?}")]
    WrongInstance {
        socket: SocketId,
        offered: FishKey,
        got: FishKey,
    },
    #[error("{0} has no hooked fish")]
    NotHooked(SocketId),
    #[error("fight on {0} already started")]
    FightStarted(SocketId),
    #[error("fish on {0} has not been landed")]
    NotLanded(SocketId),
}

#[derive(Debug)]
pub struct SocketAcceptance {
    id: SocketId,
    state: SocketState,
    next_ticket: OfferTicket,
    countdown: Option<AbortHandle>,
}

impl SocketAcceptance {
    pub fn new(id: SocketId) -> Self {
        Self {
            id,
            state: SocketState::Idle,
            next_ticket: 0,
            countdown: None,
        }
    }

    pub fn id(&self) -> SocketId {
        self.id
    }

    pub fn state(&self) -> SocketState {
        self.state
    }

    /// True when the socket has a pending offer or a hooked occupant.
    pub fn is_occupied(&self) -> bool {
        self.state != SocketState::Idle
    }

    /// Fish currently in the socket, pending or hooked.
    pub fn occupant(&self) -> Option<FishKey> {
        match self.state {
            SocketState::Idle => None,
            SocketState::Pending { fish, .. } | SocketState::Hooked { fish, .. } => Some(fish),
        }
    }

    /// Deadline of the pending offer, if any.
    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            SocketState::Pending { deadline, .. } => Some(deadline),
            _ => None,
        }
    }

    /// `Idle -> Pending` until `deadline`. Refused while anything occupies
    /// the socket.
    pub fn offer(
        &mut self,
        fish: FishKey,
        deadline: Instant,
    ) -> Result<OfferTicket, SocketError> {
        if self.is_occupied() {
            warn!(socket = %self.id, ?fish, "offer refused, socket occupied");
            return Err(SocketError::Occupied(self.id));
        }
        self.next_ticket += 1;
        let ticket = self.next_ticket;
        self.state = SocketState::Pending {
            fish,
            ticket,
            deadline,
        };
        debug!(socket = %self.id, ?fish, ticket, "offer pending");
        Ok(ticket)
    }

    /// Parks the countdown of the current offer so it can be cancelled.
    pub fn arm(&mut self, handle: AbortHandle) {
        if let Some(old) = self.countdown.replace(handle) {
            old.abort();
        }
    }

    /// `Pending -> Hooked` for the exact offered instance; cancels the
    /// countdown.
    pub fn accept(&mut self, fish: FishKey) -> Result<(), SocketError> {
        match self.state {
            SocketState::Pending { fish: offered, .. } if offered == fish => {
                self.cancel_countdown();
                self.state = SocketState::Hooked {
                    fish,
                    fight: Fight::Pending,
                };
                debug!(socket = %self.id, ?fish, "offer accepted");
                Ok(())
            }
            SocketState::Pending { fish: offered, .. } => {
                warn!(socket = %self.id, ?offered, got = ?fish, "accept for wrong instance");
                Err(SocketError::WrongInstance {
                    socket: self.id,
                    offered,
                    got: fish,
                })
            }
            _ => {
                warn!(socket = %self.id, ?fish, "accept without pending offer");
                Err(SocketError::NotPending(self.id))
            }
        }
    }

    /// Countdown elapsed: `Pending -> Idle` if `ticket` is still the
    /// outstanding offer. Returns the fish to pool, or `None` when the offer
    /// was already accepted or replaced.
    pub fn expire(&mut self, ticket: OfferTicket) -> Option<FishKey> {
        match self.state {
            SocketState::Pending {
                fish,
                ticket: current,
                ..
            } if current == ticket => {
                self.countdown = None;
                self.state = SocketState::Idle;
                debug!(socket = %self.id, ?fish, ticket, "offer expired");
                Some(fish)
            }
            _ => None,
        }
    }

    /// Withdraws the pending offer regardless of its ticket.
    pub fn withdraw(&mut self) -> Result<FishKey, SocketError> {
        match self.state {
            SocketState::Pending { ticket, .. } => {
                self.cancel_countdown();
                self.expire(ticket).ok_or(SocketError::NotPending(self.id))
            }
            _ => Err(SocketError::NotPending(self.id)),
        }
    }

    /// Marks the fight of the hooked fish as running. Only one resolution
    /// per hook.
    pub fn begin_fight(&mut self) -> Result<FishKey, SocketError> {
        match self.state {
            SocketState::Hooked {
                fish,
                fight: Fight::Pending,
            } => {
                self.state = SocketState::Hooked {
                    fish,
                    fight: Fight::InProgress,
                };
                Ok(fish)
            }
            SocketState::Hooked { .. } => Err(SocketError::FightStarted(self.id)),
            _ => Err(SocketError::NotHooked(self.id)),
        }
    }

    /// Fight won: the fish stays hooked and becomes sellable.
    pub fn land(&mut self, fish: FishKey) -> Result<(), SocketError> {
        match self.state {
            SocketState::Hooked { fish: hooked, .. } if hooked == fish => {
                self.state = SocketState::Hooked {
                    fish,
                    fight: Fight::Landed,
                };
                Ok(())
            }
            _ => Err(SocketError::NotHooked(self.id)),
        }
    }

    /// Fish that can be sold right now.
    pub fn landed(&self) -> Result<FishKey, SocketError> {
        match self.state {
            SocketState::Hooked {
                fish,
                fight: Fight::Landed,
            } => Ok(fish),
            SocketState::Hooked { .. } => Err(SocketError::NotLanded(self.id)),
            _ => Err(SocketError::NotHooked(self.id)),
        }
    }

    /// `Hooked -> Idle`, for the given occupant only.
    pub fn clear_hook(&mut self, fish: FishKey) -> Result<(), SocketError> {
        match self.state {
            SocketState::Hooked { fish: hooked, .. } if hooked == fish => {
                self.state = SocketState::Idle;
                Ok(())
            }
            _ => Err(SocketError::NotHooked(self.id)),
        }
    }

    /// Empties the socket whatever its state; returns the evicted fish.
    pub fn reset(&mut self) -> Option<FishKey> {
        self.cancel_countdown();
        let evicted = self.occupant();
        self.state = SocketState::Idle;
        evicted
    }

    fn cancel_countdown(&mut self) {
        if let Some(handle) = self.countdown.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn soon() -> Instant {
        Instant::now() + std::time::Duration::from_secs(1)
    }

    fn keys() -> (FishKey, FishKey) {
        let mut sm: SlotMap<FishKey, ()> = SlotMap::with_key();
        (sm.insert(()), sm.insert(()))
    }

    #[test]
    fn offer_then_accept() {
        let (a, _) = keys();
        let mut s = SocketAcceptance::new(SocketId(0));
        s.offer(a, soon()).unwrap();
        assert!(s.is_occupied());
        s.accept(a).unwrap();
        assert_eq!(
            s.state(),
            SocketState::Hooked {
                fish: a,
                fight: Fight::Pending
            }
        );
    }

    #[test]
    fn second_offer_rejected() {
        let (a, b) = keys();
        let mut s = SocketAcceptance::new(SocketId(1));
        let deadline = soon();
        let t = s.offer(a, deadline).unwrap();
        assert_eq!(s.offer(b, soon()), Err(SocketError::Occupied(SocketId(1))));
        assert_eq!(
            s.state(),
            SocketState::Pending {
                fish: a,
                ticket: t,
                deadline
            }
        );
        assert_eq!(s.deadline(), Some(deadline));
    }

    #[test]
    fn accept_wrong_instance_leaves_state() {
        let (a, b) = keys();
        let mut s = SocketAcceptance::new(SocketId(0));
        let t = s.offer(a, soon()).unwrap();
        assert!(matches!(s.accept(b), Err(SocketError::WrongInstance { .. })));
        assert!(matches!(
            s.state(),
            SocketState::Pending { fish, ticket, .. } if fish == a && ticket == t
        ));
        let mut idle = SocketAcceptance::new(SocketId(2));
        assert_eq!(idle.accept(a), Err(SocketError::NotPending(SocketId(2))));
    }

    #[test]
    fn stale_ticket_does_not_expire() {
        let (a, b) = keys();
        let mut s = SocketAcceptance::new(SocketId(0));
        let first = s.offer(a, soon()).unwrap();
        s.accept(a).unwrap();
        assert_eq!(s.expire(first), None);
        s.clear_hook(a).unwrap();
        let second = s.offer(b, soon()).unwrap();
        assert_eq!(s.expire(first), None);
        assert_eq!(s.expire(second), Some(b));
        assert_eq!(s.state(), SocketState::Idle);
    }

    #[test]
    fn expiry_then_accept_is_ignored() {
        let (a, _) = keys();
        let mut s = SocketAcceptance::new(SocketId(0));
        let t = s.offer(a, soon()).unwrap();
        assert_eq!(s.expire(t), Some(a));
        assert_eq!(s.accept(a), Err(SocketError::NotPending(SocketId(0))));
    }

    #[test]
    fn fight_flow() {
        let (a, _) = keys();
        let mut s = SocketAcceptance::new(SocketId(0));
        assert_eq!(s.begin_fight(), Err(SocketError::NotHooked(SocketId(0))));
        s.offer(a, soon()).unwrap();
        s.accept(a).unwrap();
        assert_eq!(s.landed(), Err(SocketError::NotLanded(SocketId(0))));
        assert_eq!(s.begin_fight(), Ok(a));
        assert_eq!(s.begin_fight(), Err(SocketError::FightStarted(SocketId(0))));
        s.land(a).unwrap();
        assert_eq!(s.landed(), Ok(a));
        assert_eq!(s.reset(), Some(a));
        assert!(!s.is_occupied());
    }

    #[test]
    fn withdraw_pending() {
        let (a, _) = keys();
        let mut s = SocketAcceptance::new(SocketId(0));
        assert!(s.withdraw().is_err());
        s.offer(a, soon()).unwrap();
        assert_eq!(s.withdraw(), Ok(a));
        assert_eq!(s.state(), SocketState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn accept_aborts_countdown() {
        let (a, _) = keys();
        let mut s = SocketAcceptance::new(SocketId(0));
        s.offer(a, soon()).unwrap();
        let task = tokio::spawn(async {
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
        });
        s.arm(task.abort_handle());
        s.accept(a).unwrap();
        let err = task.await.unwrap_err();
        assert!(err.is_cancelled());
    }
}
