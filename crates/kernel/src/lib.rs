//! World Kernel: authoritative world state, tick loop, deferred event/post queues.
//!
//! # Invariants
//! - Only the owner of [`World`] mutates world state; other threads append
//!   to its queues through a [`WorldHandle`].
//! - Within a tick, queued events run before object updates, and object
//!   updates run before queued posts.
//! - An object is in the [`ObjectIndex`] exactly when it is on a map.

pub mod accounts;
pub mod butterfly;
pub mod config;
pub mod error;
pub mod index;
pub mod map;
pub mod object;
pub mod protocol;
pub mod queue;
pub mod rng;
pub mod session;
pub mod world;

pub use accounts::{AccountError, Accounts, MemoryAccounts};
pub use config::{ButterflyTuning, WorldConfig};
pub use error::WorldError;
pub use index::ObjectIndex;
pub use map::{Map, MapState, ObjectState};
pub use object::{Body, GameObject, ObjectKind, Plan};
pub use protocol::{ServerEvent, Transport};
pub use session::SessionRegistry;
pub use world::{Event, Post, World, WorldHandle, WorldSummary};
