#![deny(warnings)]

//! Live side of the fishing economy: pooled fish instances, catch sockets,
//! the bite loop and fight resolution, driven on a tokio timeline through a
//! [`Session`].
//!
//! Collaborators (water trigger, sockets, sell button, HUD) call into the
//! session and listen on its [`SessionEvent`] channel. All timers are
//! cancellable tokio tasks; nothing blocks the caller except the deliberate
//! fight delay of [`Session::resolve_fight`].

pub mod bite;
pub mod catch;
pub mod events;
pub mod pool;
pub mod session;
pub mod socket;

pub use bite::{BiteLoop, BiteStats};
pub use catch::{catch_probability, fish_strength, player_effective_strength, HookInfo};
pub use events::SessionEvent;
pub use pool::{FishInstance, FishKey, FishPool, PoolError, Position};
pub use session::{BatchSale, Session, SessionError};
pub use socket::{Fight, OfferTicket, SocketAcceptance, SocketError, SocketId, SocketState};
