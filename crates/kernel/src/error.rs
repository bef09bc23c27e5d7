use mage_common::Identity;

use crate::accounts::AccountError;

/// Errors raised by world operations.
///
/// None of these are fatal: the tick loop logs them and moves on to the next
/// queued thunk.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    #[error("unknown object type `{0}`")]
    UnknownObjectType(String),
    #[error("object type `{0}` cannot be created by an edit")]
    NotSpawnable(String),
    #[error("object {0} is already on a map")]
    AlreadyPlaced(Identity),
    #[error("object {0} is already registered")]
    DuplicateIdentity(Identity),
    #[error("map {0} not found")]
    MapNotFound(Identity),
    #[error(transparent)]
    Account(#[from] AccountError),
}
