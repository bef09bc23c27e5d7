use glam::Vec2;
use mage_common::{Identity, Position, Tile, TilePos};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::index::ObjectIndex;
use crate::object::{GameObject, ObjectKind};

/// A map: sparse tiles plus the set of objects placed on it.
///
/// Movement is never blocked here. Any collision handling belongs to the
/// moving object's own behavior.
#[derive(Debug)]
pub struct Map {
    id: Identity,
    tiles: HashMap<TilePos, Tile>,
    objects: BTreeSet<Identity>,
}

impl Map {
    /// Empty map with no tiles or objects.
    pub fn new(id: Identity) -> Self {
        Self {
            id,
            tiles: HashMap::new(),
            objects: BTreeSet::new(),
        }
    }

    /// Identity of this map.
    pub fn id(&self) -> &Identity {
        &self.id
    }

    /// Insert or overwrite the tile at `pos`.
    pub fn set_tile(&mut self, pos: TilePos, tile: Tile) {
        self.tiles.insert(pos, tile);
    }

    /// Tile at `pos`, if one was ever set.
    pub fn tile_at(&self, pos: TilePos) -> Option<Tile> {
        self.tiles.get(&pos).copied()
    }

    /// Number of tiles set on this map.
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    /// Identities of objects placed here, in identity order.
    pub fn objects(&self) -> &BTreeSet<Identity> {
        &self.objects
    }

    /// Whether `id` is placed on this map.
    pub fn contains(&self, id: &Identity) -> bool {
        self.objects.contains(id)
    }

    /// Put `obj` on this map at `pos`. Refuses objects already placed
    /// anywhere; they must be removed first. Registering the object with the
    /// index is the world's job.
    pub fn place(&mut self, obj: &mut GameObject, pos: Position) -> bool {
        if let Some(current) = obj.map() {
            tracing::debug!(id = %obj.id(), map = %current, "object already placed, ignoring");
            return false;
        }
        obj.set_pos(pos);
        obj.set_map(Some(self.id.clone()));
        self.objects.insert(obj.id().clone());
        true
    }

    /// Take `obj` off this map. Returns `false` if it was not on it.
    pub fn remove(&mut self, obj: &mut GameObject) -> bool {
        if !self.objects.remove(obj.id()) {
            return false;
        }
        obj.set_map(None);
        true
    }

    /// Relocate `obj` to `target`, unconditionally.
    pub fn move_to(&self, obj: &mut GameObject, target: Position) {
        if obj.map() != Some(&self.id) {
            tracing::debug!(id = %obj.id(), map = %self.id, "move for object not on this map");
            return;
        }
        obj.set_pos(target);
    }

    /// Translate `obj` by `delta`. Same rules as [`move_to`](Self::move_to).
    pub fn move_by(&self, obj: &mut GameObject, delta: Vec2) {
        let target = obj.pos() + delta;
        self.move_to(obj, target);
    }

    /// Client-facing view of the map and everything on it.
    pub fn snapshot(&self, index: &ObjectIndex) -> MapState {
        let mut tiles: Vec<TileEntry> = self
            .tiles
            .iter()
            .map(|(pos, tile)| TileEntry {
                pos: *pos,
                tile: *tile,
            })
            .collect();
        tiles.sort_by_key(|t| t.pos);
        MapState {
            id: self.id.clone(),
            tiles,
            objects: self
                .objects
                .iter()
                .filter_map(|id| index.get(id))
                .map(ObjectState::from)
                .collect(),
        }
    }
}

/// One tile in a [`MapState`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileEntry {
    pub pos: TilePos,
    pub tile: Tile,
}

/// Serializable view of a map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapState {
    pub id: Identity,
    pub tiles: Vec<TileEntry>,
    pub objects: Vec<ObjectState>,
}

/// Serializable view of one object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectState {
    pub id: Identity,
    #[serde(rename = "type")]
    pub kind: ObjectKind,
    pub pos: Position,
    pub collides: bool,
}

impl From<&GameObject> for ObjectState {
    fn from(obj: &GameObject) -> Self {
        Self {
            id: obj.id().clone(),
            kind: obj.kind(),
            pos: obj.pos(),
            collides: obj.collides(),
        }
    }
}
