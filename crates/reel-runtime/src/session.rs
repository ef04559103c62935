//! Session: one player, one timeline.
//!
//! All state sits behind a single async mutex. Timers (bite interval, offer
//! countdown, fight delay) are tokio tasks that take the lock only for the
//! instant they act and never hold it across a sleep. Tasks keep a weak
//! reference, so dropping the last [`Session`] ends them.

use crate::bite::{self, BiteLoop, BiteStats};
use crate::catch::{self, HookInfo};
use crate::events::{SessionEvent, EVENT_CAPACITY};
use crate::pool::{FishInstance, FishKey, FishPool, PoolError, Position};
use crate::socket::{Fight, SocketAcceptance, SocketError, SocketId, SocketState};
use reel_core::{
    validate_game_config, ConfigError, GameConfig, Lifecycle, LureId, PlayerProfile, RngService,
    RodId, SpeciesId, Stat,
};
use reel_econ::{
    shop, spawn_weights, FishFactory, RoundEconomy, RoundError, RoundOutcome, RoundRecord,
    RoundSummary, SaleReceipt, ShopError,
};
use rust_decimal::Decimal;
use std::sync::{Arc, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("unknown {0}")]
    UnknownSocket(SocketId),
    #[error("unknown species {0}")]
    UnknownSpecies(SpeciesId),
    #[error("no species can spawn")]
    NoSpawnableSpecies,
    #[error("equipped lure {0} is not in the catalog")]
    UnknownLure(LureId),
    #[error("fish data missing for {0:?}")]
    MissingFishData(FishKey),
    #[error("nothing landed to sell")]
    NothingToSell,
    #[error("fight on {0} was interrupted")]
    FightInterrupted(SocketId),
    #[error(transparent)]
    Socket(#[from] SocketError),
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error(transparent)]
    Round(#[from] RoundError),
    #[error(transparent)]
    Shop(#[from] ShopError),
}

/// Result of selling every landed fish in one action.
#[derive(Clone, Debug, Default)]
pub struct BatchSale {
    pub receipts: Vec<SaleReceipt>,
    /// Set when the closing evaluation ended the round.
    pub outcome: Option<RoundOutcome>,
}

struct SessionState {
    cfg: GameConfig,
    factory: FishFactory,
    rng: RngService,
    player: PlayerProfile,
    economy: RoundEconomy,
    pool: FishPool,
    sockets: Vec<SocketAcceptance>,
    bite: BiteLoop,
}

impl SessionState {
    fn socket(&mut self, id: SocketId) -> Result<&mut SocketAcceptance, SessionError> {
        self.sockets.get_mut(id.0).ok_or_else(|| {
            warn!(socket = %id, "unknown socket");
            SessionError::UnknownSocket(id)
        })
    }

    fn refill_pool(&mut self) -> usize {
        let target = self.cfg.pool.reserve_per_species;
        let ids: Vec<SpeciesId> = self.cfg.species.iter().map(|s| s.id.clone()).collect();
        self.pool.refill_all(&ids, target)
    }
}

pub(crate) struct Inner {
    state: Mutex<SessionState>,
    events: broadcast::Sender<SessionEvent>,
}

/// Handle held by timer tasks.
#[derive(Clone)]
pub(crate) struct WeakSession(Weak<Inner>);

impl WeakSession {
    fn upgrade(&self) -> Option<Session> {
        self.0.upgrade().map(|inner| Session { inner })
    }

    pub(crate) async fn next_bite_interval(&self, generation: u64) -> Option<Duration> {
        self.upgrade()?.next_bite_interval(generation).await
    }

    pub(crate) async fn bite_tick(&self, generation: u64) -> bool {
        match self.upgrade() {
            Some(session) => session.bite_tick(generation).await,
            None => false,
        }
    }
}

/// Public handle to a running session. Cheap to clone.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl Session {
    /// Validates `cfg`, seeds the random stream and fills the pool reserves.
    pub fn new(cfg: GameConfig, seed: u64) -> Result<Self, SessionError> {
        validate_game_config(&cfg).map_err(ConfigError::from)?;
        let gear = cfg.starting_gear.clone();
        let sockets = (0..cfg.sockets)
            .map(|i| SocketAcceptance::new(SocketId(i)))
            .collect();
        let mut state = SessionState {
            factory: FishFactory::from_config(&cfg),
            rng: RngService::new(seed),
            player: PlayerProfile::new(gear.rod.clone(), gear.lure.clone()),
            economy: RoundEconomy::new(cfg.economy.clone(), gear),
            pool: FishPool::new(),
            sockets,
            bite: BiteLoop::default(),
            cfg,
        };
        let created = state.refill_pool();
        info!(seed, sockets = state.sockets.len(), pooled = created, "session created");
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            inner: Arc::new(Inner {
                state: Mutex::new(state),
                events,
            }),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    fn emit(&self, event: SessionEvent) {
        // No subscriber is fine.
        let _ = self.inner.events.send(event);
    }

    fn downgrade(&self) -> WeakSession {
        WeakSession(Arc::downgrade(&self.inner))
    }

    /// Restarts the random stream.
    pub async fn reseed(&self, seed: u64) {
        self.inner.state.lock().await.rng.reseed(seed);
    }

    // ---- water trigger ---------------------------------------------------

    /// Water-trigger notification: `true` on enter, `false` on exit.
    pub async fn request_spawn_check(&self, in_water: bool) {
        if in_water {
            self.lure_enter().await;
        } else {
            self.lure_exit().await;
        }
    }

    /// One trigger reports the lure in the water. The first one starts the
    /// bite loop.
    pub async fn lure_enter(&self) {
        let mut st = self.inner.state.lock().await;
        let Some(generation) = st.bite.enter() else {
            return;
        };
        let task = tokio::spawn(bite::run(self.downgrade(), generation));
        st.bite.attach(task.abort_handle());
        info!(generation, "bite loop started");
        self.emit(SessionEvent::BiteLoopStarted);
    }

    /// One trigger reports the lure out of the water. The last one stops the
    /// bite loop immediately. Returns whether the loop stopped.
    pub async fn lure_exit(&self) -> bool {
        let mut st = self.inner.state.lock().await;
        if st.bite.in_water() == 0 {
            warn!("lure exit without matching enter");
            return false;
        }
        if !st.bite.exit() {
            return false;
        }
        let stats = st.bite.stats();
        info!(?stats, "bite loop stopped");
        self.emit(SessionEvent::BiteLoopStopped { stats });
        true
    }

    async fn next_bite_interval(&self, generation: u64) -> Option<Duration> {
        let mut st = self.inner.state.lock().await;
        if !st.bite.is_current(generation) {
            return None;
        }
        let b = &st.cfg.bite;
        let (lo, hi) = (b.interval_min_secs, b.interval_max_secs);
        Some(bite::secs(st.rng.uniform_range(lo, hi)))
    }

    /// One wake-up of the bite loop. Returns false when the loop must end.
    async fn bite_tick(&self, generation: u64) -> bool {
        let mut guard = self.inner.state.lock().await;
        let st = &mut *guard;
        if !st.bite.is_current(generation) {
            return false;
        }
        st.bite.stats_mut().wakeups += 1;
        let Some(socket) = st.sockets.iter().find(|s| !s.is_occupied()).map(|s| s.id()) else {
            st.bite.stats_mut().skipped_busy += 1;
            debug!("all sockets occupied, skipping bite");
            return true;
        };
        let bite_chance = st.cfg.bite.bite_chance;
        if !st.rng.chance(bite_chance) {
            st.bite.stats_mut().misses += 1;
            return true;
        }
        match self.offer_locked(st, socket, None) {
            Ok(_) => st.bite.stats_mut().bites += 1,
            Err(e) => warn!(error = %e, "bite produced no offer"),
        }
        true
    }

    // ---- sockets ---------------------------------------------------------

    /// Generates a fish and offers it to `socket`. With `species` unset the
    /// species is drawn from the spawn weights. The offer expires after
    /// `bite.accept_timeout_secs` unless accepted.
    pub async fn offer_to_socket(
        &self,
        socket: SocketId,
        species: Option<SpeciesId>,
    ) -> Result<FishKey, SessionError> {
        let mut st = self.inner.state.lock().await;
        self.offer_locked(&mut st, socket, species.as_ref())
    }

    fn offer_locked(
        &self,
        st: &mut SessionState,
        socket: SocketId,
        species: Option<&SpeciesId>,
    ) -> Result<FishKey, SessionError> {
        if st.socket(socket)?.is_occupied() {
            warn!(socket = %socket, "offer refused, socket occupied");
            return Err(SocketError::Occupied(socket).into());
        }
        let lure = match st.cfg.lure(&st.player.lure) {
            Some(l) => l.clone(),
            None => {
                warn!(lure = %st.player.lure, "equipped lure missing from catalog");
                return Err(SessionError::UnknownLure(st.player.lure.clone()));
            }
        };
        let index = match species {
            Some(id) => st
                .cfg
                .species
                .iter()
                .position(|s| &s.id == id)
                .ok_or_else(|| {
                    warn!(species = %id, "offer for unknown species");
                    SessionError::UnknownSpecies(id.clone())
                })?,
            None => {
                let weights = spawn_weights(
                    &st.cfg.species,
                    &lure,
                    st.player.norm(Stat::Luck),
                    st.cfg.bite.luck_spawn_weight,
                );
                st.rng.weighted_choice_index(&weights).ok_or_else(|| {
                    warn!("spawn weights sum to zero");
                    SessionError::NoSpawnableSpecies
                })?
            }
        };
        let data = st
            .factory
            .generate(&st.cfg.species[index], &lure, &st.player, &mut st.rng);
        let fish = st.pool.acquire(data.clone(), Position::default());
        st.pool.attach(fish, socket)?;
        let deadline = Instant::now() + bite::secs(st.cfg.bite.accept_timeout_secs);
        let ticket = st.socket(socket)?.offer(fish, deadline)?;

        let weak = self.downgrade();
        let countdown = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if let Some(session) = weak.upgrade() {
                session.expire_ticket(socket, ticket).await;
            }
        });
        st.socket(socket)?.arm(countdown.abort_handle());

        info!(socket = %socket, species = %data.species, price = %data.price, "fish offered");
        self.emit(SessionEvent::Offered { socket, fish, data });
        Ok(fish)
    }

    async fn expire_ticket(&self, socket: SocketId, ticket: u64) {
        let mut st = self.inner.state.lock().await;
        // A stale ticket lost the race against acceptance: nothing to do.
        let Some(fish) = st.sockets.get_mut(socket.0).and_then(|s| s.expire(ticket)) else {
            return;
        };
        if let Err(e) = st.pool.release(fish) {
            warn!(error = %e, "expired fish was not in the pool");
        }
        info!(socket = %socket, ?fish, "offer timed out");
        self.emit(SessionEvent::OfferExpired { socket, fish });
    }

    /// Withdraws the pending offer of `socket` (select-exit before the
    /// deadline) and pools the fish.
    pub async fn expire_offer(&self, socket: SocketId) -> Result<FishKey, SessionError> {
        let mut st = self.inner.state.lock().await;
        let fish = st.socket(socket)?.withdraw()?;
        st.pool.release(fish)?;
        self.emit(SessionEvent::OfferExpired { socket, fish });
        Ok(fish)
    }

    /// Accepts the pending offer on `socket` for exactly `fish`.
    pub async fn accept_offer(
        &self,
        socket: SocketId,
        fish: FishKey,
    ) -> Result<Option<HookInfo>, SessionError> {
        let mut guard = self.inner.state.lock().await;
        let st = &mut *guard;
        st.socket(socket)?.accept(fish)?;
        st.pool.transition(fish, Lifecycle::Hooked)?;
        let data = st
            .pool
            .data(fish)
            .ok_or(SessionError::MissingFishData(fish))?;
        let info = catch::hook_info(
            data,
            st.cfg.species(&data.species),
            &st.player,
            st.cfg.rod(&st.player.rod),
            st.cfg.catch.balance_factor,
        );
        info!(socket = %socket, ?fish, ?info, "fish hooked");
        self.emit(SessionEvent::Hooked { socket, fish, info });
        Ok(info)
    }

    /// Fights the hooked fish on `socket`: waits `catch.resolution_secs`, then
    /// draws the outcome. An escaped fish is pooled and the hook cleared; a
    /// landed one stays hooked until sold or released. A fish whose species
    /// template is missing lands at once.
    ///
    /// The delay and the draw run in a spawned task, so dropping the returned
    /// future does not stop the fight: it still resolves and publishes
    /// [`SessionEvent::FightResolved`].
    pub async fn resolve_fight(&self, socket: SocketId) -> Result<bool, SessionError> {
        let (fish, info, delay) = {
            let mut guard = self.inner.state.lock().await;
            let st = &mut *guard;
            let fish = st.socket(socket)?.begin_fight()?;
            let data = st
                .pool
                .data(fish)
                .ok_or(SessionError::MissingFishData(fish))?;
            let info = catch::hook_info(
                data,
                st.cfg.species(&data.species),
                &st.player,
                st.cfg.rod(&st.player.rod),
                st.cfg.catch.balance_factor,
            );
            (fish, info, bite::secs(st.cfg.catch.resolution_secs))
        };
        let weak = self.downgrade();
        let fight = tokio::spawn(async move {
            if info.is_some() {
                tokio::time::sleep(delay).await;
            }
            match weak.upgrade() {
                Some(session) => session.finish_fight(socket, fish, info).await,
                None => Err(SessionError::FightInterrupted(socket)),
            }
        });
        fight.await.map_err(|e| {
            warn!(socket = %socket, error = %e, "fight task did not finish");
            SessionError::FightInterrupted(socket)
        })?
    }

    async fn finish_fight(
        &self,
        socket: SocketId,
        fish: FishKey,
        info: Option<HookInfo>,
    ) -> Result<bool, SessionError> {
        let mut guard = self.inner.state.lock().await;
        let st = &mut *guard;
        let still_fighting = matches!(
            st.socket(socket)?.state(),
            SocketState::Hooked { fish: f, fight: Fight::InProgress } if f == fish
        );
        if !still_fighting {
            warn!(socket = %socket, ?fish, "fight target left the socket");
            return Err(SessionError::FightInterrupted(socket));
        }
        let landed = catch::roll(info.as_ref(), &mut st.rng);
        if landed {
            st.socket(socket)?.land(fish)?;
        } else {
            st.pool.transition(fish, Lifecycle::Released)?;
            st.pool.release(fish)?;
            st.socket(socket)?.clear_hook(fish)?;
        }
        info!(socket = %socket, ?fish, landed, "fight resolved");
        self.emit(SessionEvent::FightResolved {
            socket,
            fish,
            landed,
        });
        Ok(landed)
    }

    /// Throws the hooked fish on `socket` back without selling it.
    pub async fn release_hooked(&self, socket: SocketId) -> Result<FishKey, SessionError> {
        let mut guard = self.inner.state.lock().await;
        let st = &mut *guard;
        let fish = match st.socket(socket)?.state() {
            SocketState::Hooked { fish, .. } => fish,
            _ => {
                warn!(socket = %socket, "release without hooked fish");
                return Err(SocketError::NotHooked(socket).into());
            }
        };
        st.pool.transition(fish, Lifecycle::Released)?;
        st.pool.release(fish)?;
        st.socket(socket)?.clear_hook(fish)?;
        info!(socket = %socket, ?fish, "fish released");
        self.emit(SessionEvent::Released { socket, fish });
        Ok(fish)
    }

    // ---- selling ---------------------------------------------------------

    /// Sells the landed fish on `socket` as one sell action.
    pub async fn sell_socket(&self, socket: SocketId) -> Result<SaleReceipt, SessionError> {
        let mut guard = self.inner.state.lock().await;
        let st = &mut *guard;
        let receipt = self.sell_locked(st, socket)?;
        if let Some(outcome) = receipt.outcome.clone() {
            self.finish_round(st, outcome);
        }
        Ok(receipt)
    }

    /// Sells every landed fish inside one batch, evaluated once at the end.
    /// Fish beyond the remaining sell attempts stay hooked.
    pub async fn sell_all(&self) -> Result<BatchSale, SessionError> {
        let mut guard = self.inner.state.lock().await;
        let st = &mut *guard;
        let landed: Vec<SocketId> = st
            .sockets
            .iter()
            .filter(|s| s.landed().is_ok())
            .map(|s| s.id())
            .collect();
        if landed.is_empty() {
            warn!("sell all with nothing landed");
            return Err(SessionError::NothingToSell);
        }
        st.economy.begin_batch()?;
        let mut sale = BatchSale::default();
        for socket in landed {
            match self.sell_locked(st, socket) {
                Ok(receipt) => sale.receipts.push(receipt),
                Err(e) => {
                    warn!(error = %e, socket = %socket, "batch stopped early");
                    break;
                }
            }
        }
        sale.outcome = st.economy.end_batch(&mut st.player, true)?;
        if let Some(outcome) = sale.outcome.clone() {
            self.finish_round(st, outcome);
        }
        Ok(sale)
    }

    fn sell_locked(
        &self,
        st: &mut SessionState,
        socket: SocketId,
    ) -> Result<SaleReceipt, SessionError> {
        let fish = st.socket(socket)?.landed()?;
        let price = st
            .pool
            .data(fish)
            .map(|d| d.price)
            .ok_or(SessionError::MissingFishData(fish))?;
        let receipt = st.economy.register_sale(&mut st.player, price)?;
        st.pool.transition(fish, Lifecycle::Sold)?;
        st.pool.release(fish)?;
        st.socket(socket)?.clear_hook(fish)?;
        info!(socket = %socket, ?fish, %price, round_money = %receipt.round_money, "fish sold");
        self.emit(SessionEvent::Sold {
            socket,
            fish,
            price,
            round_money: receipt.round_money,
        });
        Ok(receipt)
    }

    /// Registers a sale that does not come from a socket.
    pub async fn register_sale(&self, price: Decimal) -> Result<SaleReceipt, SessionError> {
        let mut guard = self.inner.state.lock().await;
        let st = &mut *guard;
        let receipt = st.economy.register_sale(&mut st.player, price)?;
        if let Some(outcome) = receipt.outcome.clone() {
            self.finish_round(st, outcome);
        }
        Ok(receipt)
    }

    pub async fn begin_batch(&self) -> Result<(), SessionError> {
        Ok(self.inner.state.lock().await.economy.begin_batch()?)
    }

    pub async fn end_batch(&self, evaluate: bool) -> Result<Option<RoundOutcome>, SessionError> {
        let mut guard = self.inner.state.lock().await;
        let st = &mut *guard;
        let outcome = st.economy.end_batch(&mut st.player, evaluate)?;
        if let Some(outcome) = outcome.clone() {
            self.finish_round(st, outcome);
        }
        Ok(outcome)
    }

    /// Pools every live fish, refills reserves and opens the next round.
    fn finish_round(&self, st: &mut SessionState, outcome: RoundOutcome) {
        for socket in &mut st.sockets {
            socket.reset();
        }
        let released = st.pool.release_all();
        let created = st.refill_pool();
        if let Err(e) = st.economy.start_round() {
            warn!(error = %e, "next round did not start");
        }
        let summary = st.economy.summary(&st.player);
        info!(?outcome, released, created, next_goal = %summary.goal, "round finished");
        self.emit(SessionEvent::RoundEnded { outcome, summary });
    }

    // ---- shop ------------------------------------------------------------

    pub async fn upgrade_stat(&self, stat: Stat) -> Result<u8, SessionError> {
        let mut guard = self.inner.state.lock().await;
        let st = &mut *guard;
        Ok(shop::upgrade_stat(&st.cfg, &mut st.player, stat)?)
    }

    pub async fn equip_rod(&self, id: &RodId) -> Result<Decimal, SessionError> {
        let mut guard = self.inner.state.lock().await;
        let st = &mut *guard;
        Ok(shop::equip_rod(&st.cfg, &mut st.player, id)?)
    }

    pub async fn equip_lure(&self, id: &LureId) -> Result<Decimal, SessionError> {
        let mut guard = self.inner.state.lock().await;
        let st = &mut *guard;
        Ok(shop::equip_lure(&st.cfg, &mut st.player, id)?)
    }

    // ---- queries ---------------------------------------------------------

    pub async fn current_goal(&self) -> Decimal {
        self.inner.state.lock().await.economy.current_goal()
    }

    pub async fn round_summary(&self) -> RoundSummary {
        let st = self.inner.state.lock().await;
        st.economy.summary(&st.player)
    }

    pub async fn history(&self) -> Vec<RoundRecord> {
        self.inner.state.lock().await.economy.history().to_vec()
    }

    pub async fn player(&self) -> PlayerProfile {
        self.inner.state.lock().await.player.clone()
    }

    pub async fn socket_state(&self, socket: SocketId) -> Option<SocketState> {
        let st = self.inner.state.lock().await;
        st.sockets.get(socket.0).map(|s| s.state())
    }

    pub async fn fish(&self, fish: FishKey) -> Option<FishInstance> {
        self.inner.state.lock().await.pool.get(fish).cloned()
    }

    pub async fn lifecycle(&self, fish: FishKey) -> Option<Lifecycle> {
        self.inner.state.lock().await.pool.lifecycle(fish)
    }

    /// Live (non-pooled) fish count.
    pub async fn live_fish(&self) -> usize {
        self.inner.state.lock().await.pool.live_keys().len()
    }

    pub async fn idle_fish(&self, species: &SpeciesId) -> usize {
        self.inner.state.lock().await.pool.idle_count(species)
    }

    pub async fn bite_stats(&self) -> BiteStats {
        self.inner.state.lock().await.bite.stats()
    }

    pub async fn in_water(&self) -> u32 {
        self.inner.state.lock().await.bite.in_water()
    }

    pub async fn config(&self) -> GameConfig {
        self.inner.state.lock().await.cfg.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> GameConfig {
        let mut cfg = GameConfig::default();
        cfg.bite.accept_timeout_secs = 1.0;
        cfg.catch.resolution_secs = 0.5;
        cfg
    }

    async fn hooked(session: &Session, socket: SocketId) -> FishKey {
        let fish = session
            .offer_to_socket(socket, Some(SpeciesId("perch".into())))
            .await
            .unwrap();
        session.accept_offer(socket, fish).await.unwrap();
        fish
    }

    #[tokio::test]
    async fn rejects_invalid_config() {
        let mut cfg = GameConfig::default();
        cfg.species.clear();
        assert!(matches!(
            Session::new(cfg, 1),
            Err(SessionError::Config(ConfigError::Invalid(_)))
        ));
    }

    #[tokio::test]
    async fn reserves_filled_at_start() {
        let s = Session::new(config(), 1).unwrap();
        assert_eq!(s.idle_fish(&SpeciesId("trout".into())).await, 2);
        assert_eq!(s.live_fish().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn accept_hooks_and_reports_odds() {
        let s = Session::new(config(), 5).unwrap();
        let socket = SocketId(0);
        let fish = s
            .offer_to_socket(socket, Some(SpeciesId("perch".into())))
            .await
            .unwrap();
        assert_eq!(s.lifecycle(fish).await, Some(Lifecycle::Pending));
        let info = s.accept_offer(socket, fish).await.unwrap().unwrap();
        assert!((0.0..=1.0).contains(&info.probability));
        assert_eq!(s.lifecycle(fish).await, Some(Lifecycle::Hooked));
        assert_eq!(s.fish(fish).await.unwrap().attachment, Some(socket));
        // The cancelled countdown must not pool the hooked fish.
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(s.lifecycle(fish).await, Some(Lifecycle::Hooked));
    }

    #[tokio::test(start_paused = true)]
    async fn wrong_socket_and_species_are_rejected() {
        let s = Session::new(config(), 5).unwrap();
        assert!(matches!(
            s.offer_to_socket(SocketId(9), None).await,
            Err(SessionError::UnknownSocket(SocketId(9)))
        ));
        assert!(matches!(
            s.offer_to_socket(SocketId(0), Some(SpeciesId("shark".into()))).await,
            Err(SessionError::UnknownSpecies(_))
        ));
        assert_eq!(s.socket_state(SocketId(0)).await, Some(SocketState::Idle));
    }

    #[tokio::test(start_paused = true)]
    async fn sell_requires_landing() {
        let s = Session::new(config(), 5).unwrap();
        let socket = SocketId(0);
        hooked(&s, socket).await;
        assert!(matches!(
            s.sell_socket(socket).await,
            Err(SessionError::Socket(SocketError::NotLanded(_)))
        ));
        assert_eq!(s.round_summary().await.sells_used, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn release_hooked_pools_fish() {
        let s = Session::new(config(), 5).unwrap();
        let socket = SocketId(0);
        let fish = hooked(&s, socket).await;
        let mut rx = s.subscribe();
        assert_eq!(s.release_hooked(socket).await.unwrap(), fish);
        assert_eq!(s.lifecycle(fish).await, Some(Lifecycle::Pooled));
        assert_eq!(s.socket_state(socket).await, Some(SocketState::Idle));
        assert!(matches!(rx.try_recv(), Ok(SessionEvent::Released { .. })));
        assert!(s.release_hooked(socket).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn missing_species_lands_immediately() {
        let s = Session::new(config(), 5).unwrap();
        let socket = SocketId(0);
        let fish = hooked(&s, socket).await;
        s.inner
            .state
            .lock()
            .await
            .cfg
            .species
            .retain(|sp| sp.id.0 != "perch");
        let start = tokio::time::Instant::now();
        assert!(s.resolve_fight(socket).await.unwrap());
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(
            s.socket_state(socket).await,
            Some(SocketState::Hooked {
                fish,
                fight: Fight::Landed
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn offer_deadline_is_fixed_at_offer_time() {
        let s = Session::new(config(), 5).unwrap();
        let socket = SocketId(0);
        let start = Instant::now();
        let fish = s.offer_to_socket(socket, None).await.unwrap();
        let Some(SocketState::Pending { deadline, .. }) = s.socket_state(socket).await else {
            panic!("offer is not pending");
        };
        assert_eq!(deadline, start + Duration::from_secs(1));

        tokio::time::sleep_until(deadline).await;
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
        assert_eq!(s.socket_state(socket).await, Some(SocketState::Idle));
        assert_eq!(s.lifecycle(fish).await, Some(Lifecycle::Pooled));
    }

    #[tokio::test(start_paused = true)]
    async fn expire_offer_withdraws() {
        let s = Session::new(config(), 5).unwrap();
        let fish = s.offer_to_socket(SocketId(0), None).await.unwrap();
        assert_eq!(s.expire_offer(SocketId(0)).await.unwrap(), fish);
        assert_eq!(s.lifecycle(fish).await, Some(Lifecycle::Pooled));
        assert!(s.expire_offer(SocketId(0)).await.is_err());
    }

    #[tokio::test]
    async fn shop_goes_through_session() {
        let s = Session::new(config(), 5).unwrap();
        assert!(matches!(
            s.upgrade_stat(Stat::Luck).await,
            Err(SessionError::Shop(ShopError::InsufficientFunds { .. }))
        ));
        s.register_sale(Decimal::new(1000, 2)).await.unwrap();
        s.begin_batch().await.unwrap();
        assert_eq!(s.end_batch(false).await.unwrap(), None);
        assert_eq!(s.player().await.balance, Decimal::ZERO);
        assert_eq!(s.equip_rod(&RodId("twig".into())).await.unwrap(), Decimal::ZERO);
    }
}
