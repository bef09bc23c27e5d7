//! Semantic payloads exchanged with clients.
//!
//! Framing and transport belong to the network layer. These types carry only
//! the fields the world reads or produces.

use mage_common::{Identity, SessionId, Tile, TilePos};
use serde::{Deserialize, Serialize};

use crate::map::{MapState, ObjectState};

/// `identify`: resume by token, or log in with username and password.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentifyRequest {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// How an identify request wants to be recognised.
#[derive(Debug, Clone, PartialEq)]
pub enum Credentials {
    Token(String),
    Login { username: String, password: String },
    Missing,
}

impl IdentifyRequest {
    /// Identify by session token.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..Self::default()
        }
    }

    /// Identify by username and password.
    pub fn with_login(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
            ..Self::default()
        }
    }

    /// A token wins over a login; a login needs both halves.
    pub fn credentials(self) -> Credentials {
        match self {
            Self { token: Some(token), .. } => Credentials::Token(token),
            Self {
                username: Some(username),
                password: Some(password),
                ..
            } => Credentials::Login { username, password },
            _ => Credentials::Missing,
        }
    }
}

/// `move`: relocate the caller's player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveRequest {
    pub pos: [f32; 2],
}

/// `edit`: any combination of the four sub-operations. An absent field means
/// nothing to do for that part.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditRequest {
    #[serde(default)]
    pub add_obj: Option<AddObject>,
    #[serde(default)]
    pub remove_obj: Option<Identity>,
    #[serde(default)]
    pub move_obj: Option<MoveObject>,
    /// `[x, y, kind, variant]`
    #[serde(default)]
    pub tile: Option<[i32; 4]>,
}

impl EditRequest {
    /// The tile part of the edit, if both coordinate and tile are present.
    pub fn tile_edit(&self) -> Option<(TilePos, Tile)> {
        self.tile
            .map(|[x, y, kind, variant]| (TilePos::new(x, y), Tile::new(kind, variant)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddObject {
    #[serde(rename = "type")]
    pub kind: String,
    pub pos: [f32; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveObject {
    pub id: Identity,
    pub pos: [f32; 2],
}

/// `chat`: say something to everyone on the same map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

/// `register`: attach a username and password to the caller's player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

/// Everything the world sends to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum ServerEvent {
    /// Full picture of the player's map and of the player itself.
    State { map: MapState, you: ObjectState },
    Error { message: String },
    Chat { from: Identity, message: String },
}

impl ServerEvent {
    /// Error event carrying `message`.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

/// Outbound side of the network layer. Calls must not block and must not
/// call back into the world synchronously.
pub trait Transport: Send + Sync {
    fn send(&self, session: SessionId, event: ServerEvent);
    fn close(&self, session: SessionId);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_beats_login() {
        let req = IdentifyRequest {
            token: Some("t".into()),
            username: Some("u".into()),
            password: Some("p".into()),
        };
        assert_eq!(req.credentials(), Credentials::Token("t".into()));
    }

    #[test]
    fn half_a_login_is_missing() {
        let req = IdentifyRequest {
            username: Some("u".into()),
            ..IdentifyRequest::default()
        };
        assert_eq!(req.credentials(), Credentials::Missing);
        assert_eq!(IdentifyRequest::default().credentials(), Credentials::Missing);
    }

    #[test]
    fn edit_decodes_wire_names() {
        let edit: EditRequest = serde_json::from_str(
            r#"{
                "addObj": { "type": "flower", "pos": [1.0, 2.0] },
                "removeObj": "abc",
                "tile": [3, 4, 7, 1]
            }"#,
        )
        .unwrap();
        assert_eq!(edit.add_obj.as_ref().unwrap().kind, "flower");
        assert_eq!(edit.remove_obj, Some(Identity::from("abc")));
        assert!(edit.move_obj.is_none());
        assert_eq!(
            edit.tile_edit(),
            Some((TilePos::new(3, 4), Tile::new(7, 1)))
        );
    }

    #[test]
    fn server_events_are_tagged() {
        let json = serde_json::to_value(ServerEvent::error("nope")).unwrap();
        assert_eq!(json["event"], "error");
        assert_eq!(json["message"], "nope");
    }
}
