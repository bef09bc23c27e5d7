//! Account storage consumed by the identify and register flows.

use mage_common::Identity;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Errors from account operations.
#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("username `{0}` is already taken")]
    UsernameTaken(String),
    #[error("username and password must not be empty")]
    EmptyCredentials,
}

/// Where the world resolves resume tokens and logins to player identities.
pub trait Accounts: Send {
    fn player_from_token(&self, token: &str) -> Option<Identity>;
    fn set_token_for_player(&mut self, token: &str, player: &Identity);
    fn player_from_login(&self, username: &str, password: &str) -> Option<Identity>;
    fn set_login(&mut self, username: &str, password: &str, player: &Identity) -> Result<(), AccountError>;
}

struct Login {
    digest: [u8; 32],
    player: Identity,
}

/// In-memory account store. Passwords are kept as SHA-256 digests.
#[derive(Default)]
pub struct MemoryAccounts {
    tokens: HashMap<String, Identity>,
    logins: HashMap<String, Login>,
}

impl MemoryAccounts {
    /// Empty store with no tokens or logins.
    pub fn new() -> Self {
        Self::default()
    }
}

fn digest(username: &str, password: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(username.as_bytes());
    hasher.update([0u8]);
    hasher.update(password.as_bytes());
    hasher.finalize().into()
}

impl Accounts for MemoryAccounts {
    fn player_from_token(&self, token: &str) -> Option<Identity> {
        self.tokens.get(token).cloned()
    }

    fn set_token_for_player(&mut self, token: &str, player: &Identity) {
        self.tokens.insert(token.to_owned(), player.clone());
    }

    fn player_from_login(&self, username: &str, password: &str) -> Option<Identity> {
        let login = self.logins.get(username)?;
        (login.digest == digest(username, password)).then(|| login.player.clone())
    }

    fn set_login(&mut self, username: &str, password: &str, player: &Identity) -> Result<(), AccountError> {
        if username.is_empty() || password.is_empty() {
            return Err(AccountError::EmptyCredentials);
        }
        match self.logins.get(username) {
            Some(existing) if existing.player != *player => {
                Err(AccountError::UsernameTaken(username.to_owned()))
            }
            _ => {
                self.logins.insert(
                    username.to_owned(),
                    Login {
                        digest: digest(username, password),
                        player: player.clone(),
                    },
                );
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_lookup() {
        let mut accounts = MemoryAccounts::new();
        let p = Identity::from("p");
        assert!(accounts.player_from_token("t").is_none());
        accounts.set_token_for_player("t", &p);
        assert_eq!(accounts.player_from_token("t"), Some(p));
    }

    #[test]
    fn login_requires_matching_password() {
        let mut accounts = MemoryAccounts::new();
        let p = Identity::from("p");
        accounts.set_login("alice", "hunter2", &p).unwrap();
        assert_eq!(accounts.player_from_login("alice", "hunter2"), Some(p));
        assert!(accounts.player_from_login("alice", "wrong").is_none());
        assert!(accounts.player_from_login("bob", "hunter2").is_none());
    }

    #[test]
    fn username_cannot_be_claimed_twice() {
        let mut accounts = MemoryAccounts::new();
        accounts.set_login("alice", "a", &Identity::from("p")).unwrap();
        let err = accounts.set_login("alice", "b", &Identity::from("q")).unwrap_err();
        assert!(matches!(err, AccountError::UsernameTaken(_)));
        // The owner may change their own password.
        accounts.set_login("alice", "c", &Identity::from("p")).unwrap();
        assert!(accounts.player_from_login("alice", "c").is_some());
    }

    #[test]
    fn empty_credentials_rejected() {
        let mut accounts = MemoryAccounts::new();
        let err = accounts.set_login("", "x", &Identity::from("p")).unwrap_err();
        assert!(matches!(err, AccountError::EmptyCredentials));
    }
}
