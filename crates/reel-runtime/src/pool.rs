//! Fish instance arena with per-species idle reserves.
//!
//! Instances are never destroyed: a finished fish returns to its species'
//! idle list and is reused by the next [`FishPool::acquire`]. Keys are
//! generational, so a stale key held by a cancelled timer cannot reach the
//! instance after it has been recycled.

use crate::socket::SocketId;
use reel_core::{FishData, Lifecycle, SpeciesId};
use serde::Serialize;
use slotmap::{new_key_type, SlotMap};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, warn};

new_key_type! {
    /// Handle to a pooled fish instance.
    pub struct FishKey;
}

/// World-space position handed to the rendering side.
pub type Position = [f64; 3];

/// One fish slot. Physical fields are plain data for the rendering
/// collaborator; the core only keeps them consistent with the lifecycle.
#[derive(Clone, Debug, Serialize)]
pub struct FishInstance {
    pub species: SpeciesId,
    /// Generated attributes; `None` while pooled.
    pub data: Option<FishData>,
    pub lifecycle: Lifecycle,
    /// Physics disabled: zero velocity, not simulated.
    pub inert: bool,
    /// Can be grabbed by the player.
    pub interactive: bool,
    pub velocity: Position,
    pub position: Position,
    /// Socket currently holding this fish.
    pub attachment: Option<SocketId>,
}

impl FishInstance {
    fn pooled(species: SpeciesId) -> Self {
        Self {
            species,
            data: None,
            lifecycle: Lifecycle::Pooled,
            inert: true,
            interactive: false,
            velocity: [0.0; 3],
            position: [0.0; 3],
            attachment: None,
        }
    }

    fn make_inert(&mut self) {
        self.inert = true;
        self.interactive = false;
        self.velocity = [0.0; 3];
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum PoolError {
    #[error("unknown fish instance {0:?}")]
    UnknownInstance(FishKey),
    #[error("fish {key:?} cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        key: FishKey,
        from: Lifecycle,
        to: Lifecycle,
    },
}

/// Arena of fish instances plus an idle free-list per species.
#[derive(Debug, Default)]
pub struct FishPool {
    slots: SlotMap<FishKey, FishInstance>,
    idle: BTreeMap<SpeciesId, Vec<FishKey>>,
}

impl FishPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hands out an instance for `data.species`, reusing an idle one when
    /// available. The instance comes back inert, non-interactive, placed at
    /// `position`, and tagged `Pending` so no other caller can acquire it.
    pub fn acquire(&mut self, data: FishData, position: Position) -> FishKey {
        let reused = self
            .idle
            .get_mut(&data.species)
            .and_then(|list| list.pop());
        let key = match reused {
            Some(key) => key,
            None => {
                debug!(species = %data.species, "pool empty, creating instance");
                self.slots.insert(FishInstance::pooled(data.species.clone()))
            }
        };
        if let Some(inst) = self.slots.get_mut(key) {
            inst.make_inert();
            inst.position = position;
            inst.attachment = None;
            inst.lifecycle = Lifecycle::Pending;
            inst.data = Some(data);
        }
        key
    }

    /// Moves a live instance between lifecycle stages.
    ///
    /// Allowed: `Pending -> Hooked`, `Hooked -> Sold`, `Hooked -> Released`,
    /// `Pending -> Released`.
    pub fn transition(&mut self, key: FishKey, to: Lifecycle) -> Result<(), PoolError> {
        let inst = self
            .slots
            .get_mut(key)
            .ok_or(PoolError::UnknownInstance(key))?;
        let from = inst.lifecycle;
        let allowed = matches!(
            (from, to),
            (Lifecycle::Pending, Lifecycle::Hooked)
                | (Lifecycle::Hooked, Lifecycle::Sold)
                | (Lifecycle::Hooked, Lifecycle::Released)
                | (Lifecycle::Pending, Lifecycle::Released)
        );
        if !allowed {
            warn!(?key, ?from, ?to, "rejected lifecycle transition");
            return Err(PoolError::InvalidTransition { key, from, to });
        }
        inst.lifecycle = to;
        inst.interactive = to == Lifecycle::Hooked;
        Ok(())
    }

    /// Pins an instance to a socket.
    pub fn attach(&mut self, key: FishKey, socket: SocketId) -> Result<(), PoolError> {
        let inst = self
            .slots
            .get_mut(key)
            .ok_or(PoolError::UnknownInstance(key))?;
        inst.attachment = Some(socket);
        Ok(())
    }

    /// Returns an instance to its idle list. Releasing an already pooled
    /// instance is a no-op and returns `Ok(false)`.
    pub fn release(&mut self, key: FishKey) -> Result<bool, PoolError> {
        let inst = self
            .slots
            .get_mut(key)
            .ok_or(PoolError::UnknownInstance(key))?;
        if inst.lifecycle == Lifecycle::Pooled {
            return Ok(false);
        }
        inst.make_inert();
        inst.attachment = None;
        inst.data = None;
        inst.lifecycle = Lifecycle::Pooled;
        self.idle.entry(inst.species.clone()).or_default().push(key);
        Ok(true)
    }

    /// Releases every live instance; returns how many were released.
    pub fn release_all(&mut self) -> usize {
        let live = self.live_keys();
        live.into_iter()
            .filter(|k| matches!(self.release(*k), Ok(true)))
            .count()
    }

    /// Tops the idle reserve of `species` up to `target`. Live instances are
    /// left alone. Returns how many instances were created.
    pub fn refill(&mut self, species: &SpeciesId, target: usize) -> usize {
        let have = self.idle_count(species);
        let missing = target.saturating_sub(have);
        for _ in 0..missing {
            let key = self.slots.insert(FishInstance::pooled(species.clone()));
            self.idle.entry(species.clone()).or_default().push(key);
        }
        missing
    }

    pub fn refill_all<'a, I>(&mut self, species: I, target: usize) -> usize
    where
        I: IntoIterator<Item = &'a SpeciesId>,
    {
        species.into_iter().map(|s| self.refill(s, target)).sum()
    }

    pub fn get(&self, key: FishKey) -> Option<&FishInstance> {
        self.slots.get(key)
    }

    pub fn lifecycle(&self, key: FishKey) -> Option<Lifecycle> {
        self.slots.get(key).map(|i| i.lifecycle)
    }

    pub fn data(&self, key: FishKey) -> Option<&FishData> {
        self.slots.get(key).and_then(|i| i.data.as_ref())
    }

    /// Keys of instances that are not pooled.
    pub fn live_keys(&self) -> Vec<FishKey> {
        self.slots
            .iter()
            .filter(|(_, i)| i.lifecycle != Lifecycle::Pooled)
            .map(|(k, _)| k)
            .collect()
    }

    pub fn idle_count(&self, species: &SpeciesId) -> usize {
        self.idle.get(species).map_or(0, Vec::len)
    }

    /// Total instances ever created.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use proptest::prelude::*;
    use reel_core::PriceBreakdown;
    use rust_decimal::Decimal;

    pub(crate) fn fish(species: &str) -> FishData {
        FishData {
            species: SpeciesId(species.into()),
            size_cm: 20.0,
            age_years: 3.0,
            quality_norm: 0.5,
            rarity_norm: 0.5,
            quality_display: 5.5,
            rarity_display: 5.5,
            special_trait: false,
            price: Decimal::new(150, 2),
            pricing: PriceBreakdown {
                base_price: 1.0,
                main_stat_norm: 0.5,
                tier_index: 2,
                tier_multiplier: 1.5,
                qr_multiplier: 1.0,
                jackpot_triggered: false,
                jackpot_multiplier: 1.0,
                trading_boost: 1.0,
            },
        }
    }

    #[test]
    fn acquire_reuses_idle_instance() {
        let mut pool = FishPool::new();
        let perch = SpeciesId("perch".into());
        assert_eq!(pool.refill(&perch, 2), 2);
        let k = pool.acquire(fish("perch"), [1.0, 2.0, 3.0]);
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.idle_count(&perch), 1);
        let inst = pool.get(k).unwrap();
        assert!(inst.inert && !inst.interactive);
        assert_eq!(inst.velocity, [0.0; 3]);
        assert_eq!(inst.position, [1.0, 2.0, 3.0]);
        assert_eq!(inst.lifecycle, Lifecycle::Pending);
    }

    #[test]
    fn acquire_creates_when_empty() {
        let mut pool = FishPool::new();
        let a = pool.acquire(fish("pike"), [0.0; 3]);
        let b = pool.acquire(fish("pike"), [0.0; 3]);
        assert_ne!(a, b);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn release_is_idempotent() {
        let mut pool = FishPool::new();
        let k = pool.acquire(fish("perch"), [0.0; 3]);
        pool.attach(k, SocketId(0)).unwrap();
        assert_eq!(pool.release(k), Ok(true));
        assert_eq!(pool.release(k), Ok(false));
        assert_eq!(pool.idle_count(&SpeciesId("perch".into())), 1);
        let inst = pool.get(k).unwrap();
        assert_eq!(inst.attachment, None);
        assert!(inst.data.is_none());
    }

    #[test]
    fn transitions_are_checked() {
        let mut pool = FishPool::new();
        let k = pool.acquire(fish("perch"), [0.0; 3]);
        assert!(pool.transition(k, Lifecycle::Sold).is_err());
        pool.transition(k, Lifecycle::Hooked).unwrap();
        assert!(pool.get(k).unwrap().interactive);
        pool.transition(k, Lifecycle::Sold).unwrap();
        assert_eq!(
            pool.transition(k, Lifecycle::Hooked),
            Err(PoolError::InvalidTransition {
                key: k,
                from: Lifecycle::Sold,
                to: Lifecycle::Hooked
            })
        );
    }

    #[test]
    fn refill_leaves_live_instances_alone() {
        let mut pool = FishPool::new();
        let perch = SpeciesId("perch".into());
        let live = pool.acquire(fish("perch"), [0.0; 3]);
        pool.refill(&perch, 3);
        assert_eq!(pool.lifecycle(live), Some(Lifecycle::Pending));
        assert_eq!(pool.idle_count(&perch), 3);
        assert_eq!(pool.release_all(), 1);
        assert_eq!(pool.idle_count(&perch), 4);
        assert!(pool.live_keys().is_empty());
    }

    proptest! {
        #[test]
        fn acquired_keys_are_unique(ops in prop::collection::vec(any::<bool>(), 1..60)) {
            let mut pool = FishPool::new();
            let mut held: Vec<FishKey> = Vec::new();
            for acquire in ops {
                if acquire || held.is_empty() {
                    let k = pool.acquire(fish("perch"), [0.0; 3]);
                    prop_assert!(!held.contains(&k));
                    held.push(k);
                } else if let Some(k) = held.pop() {
                    prop_assert_eq!(pool.release(k), Ok(true));
                }
                prop_assert_eq!(pool.live_keys().len(), held.len());
            }
        }
    }
}
