use mage_common::{Identity, Position};
use std::collections::HashMap;

use crate::object::{GameObject, ObjectKind, Plan, UpdateCtx};

/// Registry of every object currently placed in the world.
///
/// Iteration, queries and updates all follow insertion order, so repeated
/// runs over the same history visit objects in the same sequence.
#[derive(Debug, Default)]
pub struct ObjectIndex {
    order: Vec<Identity>,
    objects: HashMap<Identity, GameObject>,
}

impl ObjectIndex {
    /// Empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an object. A duplicate identity leaves the index untouched
    /// and the new value is dropped.
    pub fn add(&mut self, obj: GameObject) -> bool {
        if self.objects.contains_key(obj.id()) {
            tracing::warn!(id = %obj.id(), "object already registered, ignoring add");
            return false;
        }
        self.order.push(obj.id().clone());
        self.objects.insert(obj.id().clone(), obj);
        true
    }

    /// Deregister an object and hand it back. `None` if it was not present.
    pub fn remove(&mut self, id: &Identity) -> Option<GameObject> {
        let obj = self.objects.remove(id)?;
        self.order.retain(|other| other != id);
        Some(obj)
    }

    /// Look up a registered object.
    pub fn get(&self, id: &Identity) -> Option<&GameObject> {
        self.objects.get(id)
    }

    /// Mutable lookup. Does not touch map membership.
    pub fn get_mut(&mut self, id: &Identity) -> Option<&mut GameObject> {
        self.objects.get_mut(id)
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: &Identity) -> bool {
        self.objects.contains_key(id)
    }

    /// Number of registered objects.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// All objects in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &GameObject> + '_ {
        self.order.iter().filter_map(|id| self.objects.get(id))
    }

    /// Objects of `kind` (any kind when `None`) within `radius` of `center`,
    /// inclusive, in insertion order. The caller's own object is included if
    /// it matches.
    pub fn query_radius(
        &self,
        center: Position,
        radius: f32,
        kind: Option<ObjectKind>,
    ) -> impl Iterator<Item = &GameObject> + '_ {
        let radius_sq = radius * radius;
        self.iter().filter(move |obj| {
            kind.is_none_or(|k| obj.kind() == k) && obj.pos().distance_squared(center) <= radius_sq
        })
    }

    /// Run every registered object's behavior once.
    ///
    /// Walks a snapshot of the identities taken up front, so objects removed
    /// mid-pass are skipped and nothing is visited twice. Returns the objects
    /// that took themselves out of the world, with their map still set; the
    /// caller finishes detaching them.
    pub fn update_all(&mut self, ctx: &mut UpdateCtx<'_>) -> Vec<GameObject> {
        let snapshot = self.order.clone();
        let mut departed = Vec::new();

        for id in snapshot {
            let Some(obj) = self.objects.get(&id) else {
                continue;
            };
            match obj.plan(self, ctx) {
                Plan::Stay => {}
                Plan::Drift { velocity } => {
                    if let Some(obj) = self.objects.get_mut(&id) {
                        obj.drift(velocity);
                    }
                }
                Plan::Leave => {
                    if let Some(obj) = self.remove(&id) {
                        departed.push(obj);
                    }
                }
            }
        }
        departed
    }
}
