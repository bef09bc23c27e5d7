use glam::Vec2;
use mage_common::{Identity, Position, SessionId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::butterfly::Butterfly;
use crate::config::ButterflyTuning;
use crate::error::WorldError;
use crate::index::ObjectIndex;
use crate::rng::SplitMix64;

/// Type tag of a game object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Player,
    Butterfly,
    Flower,
}

impl ObjectKind {
    /// Name used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Player => "player",
            Self::Butterfly => "butterfly",
            Self::Flower => "flower",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectKind {
    type Err = WorldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "player" => Ok(Self::Player),
            "butterfly" => Ok(Self::Butterfly),
            "flower" => Ok(Self::Flower),
            other => Err(WorldError::UnknownObjectType(other.to_owned())),
        }
    }
}

/// Player-specific state.
#[derive(Debug, Clone, Default)]
pub struct Player {
    /// Weak link to the connection driving this player. Set iff the player
    /// is bound in the session registry.
    pub session: Option<SessionId>,
}

/// Behavior-carrying part of an object, one variant per kind.
#[derive(Debug, Clone)]
pub enum Body {
    Player(Player),
    Butterfly(Butterfly),
    Flower,
}

impl Body {
    /// Fresh body for `kind` with default state.
    pub fn for_kind(kind: ObjectKind) -> Self {
        match kind {
            ObjectKind::Player => Self::Player(Player::default()),
            ObjectKind::Butterfly => Self::Butterfly(Butterfly::default()),
            ObjectKind::Flower => Self::Flower,
        }
    }

    /// Kind this body belongs to.
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Player(_) => ObjectKind::Player,
            Self::Butterfly(_) => ObjectKind::Butterfly,
            Self::Flower => ObjectKind::Flower,
        }
    }
}

/// What an object decided to do this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Plan {
    Stay,
    /// Adopt `velocity` and move by it.
    Drift { velocity: Vec2 },
    /// Remove itself from the world.
    Leave,
}

/// Shared inputs handed to every behavior during one update pass.
pub struct UpdateCtx<'a> {
    pub rng: &'a mut SplitMix64,
    pub butterfly: &'a ButterflyTuning,
}

/// A simulation object.
///
/// `map` is `Some` exactly while the object is registered in the world's
/// [`ObjectIndex`]. An object with no map is not in the world, but whoever
/// holds the value may place it later.
#[derive(Debug, Clone)]
pub struct GameObject {
    id: Identity,
    pos: Position,
    map: Option<Identity>,
    collides: bool,
    body: Body,
}

impl GameObject {
    /// Unplaced object at the origin.
    pub(crate) fn new(id: Identity, body: Body) -> Self {
        let collides = matches!(body, Body::Butterfly(_));
        Self {
            id,
            pos: Position::ZERO,
            map: None,
            collides,
            body,
        }
    }

    /// Stable identity.
    pub fn id(&self) -> &Identity {
        &self.id
    }

    /// Current position.
    pub fn pos(&self) -> Position {
        self.pos
    }

    /// Map the object is on, `None` while unplaced.
    pub fn map(&self) -> Option<&Identity> {
        self.map.as_ref()
    }

    /// Whether the object is on a map.
    pub fn is_placed(&self) -> bool {
        self.map.is_some()
    }

    /// Kind of the object.
    pub fn kind(&self) -> ObjectKind {
        self.body.kind()
    }

    /// Whether the object blocks movement.
    pub fn collides(&self) -> bool {
        self.collides
    }

    /// Kind-specific state.
    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Player state, if this object is a player.
    pub fn as_player(&self) -> Option<&Player> {
        match &self.body {
            Body::Player(p) => Some(p),
            _ => None,
        }
    }

    /// Mutable player state, if this object is a player.
    pub fn as_player_mut(&mut self) -> Option<&mut Player> {
        match &mut self.body {
            Body::Player(p) => Some(p),
            _ => None,
        }
    }

    /// Overwrite the position without going through a map.
    pub fn set_pos(&mut self, pos: Position) {
        self.pos = pos;
    }

    /// Only maps set this, to keep placement and membership in step.
    pub(crate) fn set_map(&mut self, map: Option<Identity>) {
        self.map = map;
    }

    /// Decide this tick's action from a read-only view of the index.
    pub fn plan(&self, index: &ObjectIndex, ctx: &mut UpdateCtx<'_>) -> Plan {
        match &self.body {
            Body::Butterfly(b) => b.plan(self, index, ctx),
            Body::Player(_) | Body::Flower => Plan::Stay,
        }
    }

    /// Apply a [`Plan::Drift`]. Other plans are handled by the caller.
    pub(crate) fn drift(&mut self, velocity: Vec2) {
        if let Body::Butterfly(b) = &mut self.body {
            b.velocity = velocity;
        }
        self.pos += velocity;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_str() {
        for kind in [ObjectKind::Player, ObjectKind::Butterfly, ObjectKind::Flower] {
            assert_eq!(kind.as_str().parse::<ObjectKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let err = "dragon".parse::<ObjectKind>().unwrap_err();
        assert!(matches!(err, WorldError::UnknownObjectType(t) if t == "dragon"));
    }

    #[test]
    fn new_object_is_unplaced() {
        let obj = GameObject::new(Identity::random(), Body::Flower);
        assert!(!obj.is_placed());
        assert_eq!(obj.pos(), Position::ZERO);
        assert!(!obj.collides());
    }

    #[test]
    fn butterflies_collide() {
        let obj = GameObject::new(Identity::random(), Body::for_kind(ObjectKind::Butterfly));
        assert!(obj.collides());
        assert_eq!(obj.kind(), ObjectKind::Butterfly);
    }

    #[test]
    fn drift_moves_and_records_velocity() {
        let mut obj = GameObject::new(Identity::random(), Body::for_kind(ObjectKind::Butterfly));
        obj.drift(Vec2::new(0.5, -0.25));
        assert_eq!(obj.pos(), Vec2::new(0.5, -0.25));
        match obj.body() {
            Body::Butterfly(b) => assert_eq!(b.velocity, Vec2::new(0.5, -0.25)),
            _ => unreachable!(),
        }
    }
}
