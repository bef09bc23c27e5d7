use mage_common::{Identity, SessionId};
use std::collections::HashMap;

/// Two-way association between transport sessions and the players they
/// drive. Each session drives at most one player and each player is driven
/// by at most one session.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    by_session: HashMap<SessionId, Identity>,
    by_player: HashMap<Identity, SessionId>,
}

impl SessionRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate `session` with `player`, dropping any previous association
    /// either of them had.
    pub fn bind(&mut self, session: SessionId, player: Identity) {
        if let Some(old_player) = self.by_session.remove(&session) {
            self.by_player.remove(&old_player);
        }
        if let Some(old_session) = self.by_player.remove(&player) {
            self.by_session.remove(&old_session);
        }
        self.by_player.insert(player.clone(), session);
        self.by_session.insert(session, player);
    }

    /// Drop the association for `session`, returning the player it drove.
    pub fn unbind(&mut self, session: SessionId) -> Option<Identity> {
        let player = self.by_session.remove(&session)?;
        self.by_player.remove(&player);
        Some(player)
    }

    /// Player bound to `session`.
    pub fn player_for(&self, session: SessionId) -> Option<&Identity> {
        self.by_session.get(&session)
    }

    /// Session bound to `player`.
    pub fn session_for(&self, player: &Identity) -> Option<SessionId> {
        self.by_player.get(player).copied()
    }

    /// Every binding, in session order.
    pub fn sessions(&self) -> impl Iterator<Item = (SessionId, &Identity)> + '_ {
        self.by_session.iter().map(|(s, p)| (*s, p))
    }

    /// Number of bound sessions.
    pub fn len(&self) -> usize {
        self.by_session.len()
    }

    /// True when no session is bound.
    pub fn is_empty(&self) -> bool {
        self.by_session.is_empty()
    }
}
