use glam::Vec2;

use crate::index::ObjectIndex;
use crate::object::{GameObject, ObjectKind, Plan, UpdateCtx};

/// A wandering butterfly. Drifts at random, flees nearby players, gets
/// caught if one comes too close, and keeps away from other butterflies.
#[derive(Debug, Clone, Default)]
pub struct Butterfly {
    pub velocity: Vec2,
}

impl Butterfly {
    /// Both proximity checks react to the first match in index order, which
    /// is not necessarily the nearest one.
    pub fn plan(&self, me: &GameObject, index: &ObjectIndex, ctx: &mut UpdateCtx<'_>) -> Plan {
        let tuning = ctx.butterfly;
        let here = me.pos();
        let mut velocity = self.velocity;

        if ctx.rng.next_f32() < tuning.wander_chance {
            velocity = Vec2::new(
                tuning.wander_speed * (ctx.rng.next_f32() - 0.5),
                tuning.wander_speed * (ctx.rng.next_f32() - 0.5),
            );
        }

        let player = index
            .query_radius(here, tuning.flee_radius, Some(ObjectKind::Player))
            .find(|o| o.map() == me.map());

        if let Some(player) = player {
            if player.pos().distance(here) < tuning.capture_radius {
                tracing::debug!(butterfly = %me.id(), player = %player.id(), "butterfly caught");
                return Plan::Leave;
            }
            velocity = (here - player.pos()).normalize_or_zero() * tuning.steer_speed;
        } else if let Some(peer) = index
            .query_radius(here, tuning.crowd_radius, Some(ObjectKind::Butterfly))
            .find(|o| o.id() != me.id() && o.map() == me.map())
        {
            velocity = (here - peer.pos()).normalize_or_zero() * tuning.steer_speed;
        }

        Plan::Drift { velocity }
    }
}
