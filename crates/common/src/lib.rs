//! Shared value types for the mage world server.

mod types;

pub use types::{Identity, Position, SessionId, Tile, TilePos};
