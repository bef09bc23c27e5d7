//! Network-side plumbing around the world kernel.
//!
//! # Invariants
//! - Handlers never touch world state; they decode and enqueue.
//! - Closing a session never calls back into the world synchronously.

mod loopback;
mod router;

pub use loopback::{LoopbackClient, LoopbackTransport};
pub use router::{Envelope, Router};

use mage_common::SessionId;
use mage_kernel::WorldHandle;
use mage_kernel::protocol::{ChatRequest, EditRequest, IdentifyRequest, MoveRequest, RegisterRequest};

/// Errors raised while routing inbound messages.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("no handler for event `{0}`")]
    UnknownEvent(String),
    #[error("bad `{event}` payload: {source}")]
    Payload {
        event: String,
        source: serde_json::Error,
    },
    #[error("{0} is closed")]
    Closed(SessionId),
}

/// Route every client event the world understands into `handle`.
pub fn bind_world(router: &mut Router, handle: WorldHandle) {
    let h = handle.clone();
    router.register("identify", move |session, req: IdentifyRequest| h.identify(session, req));
    let h = handle.clone();
    router.register("move", move |session, req: MoveRequest| h.move_player(session, req));
    let h = handle.clone();
    router.register("edit", move |session, req: EditRequest| h.edit(session, req));
    let h = handle.clone();
    router.register("chat", move |session, req: ChatRequest| h.chat(session, req));
    router.register("register", move |session, req: RegisterRequest| {
        handle.register(session, req)
    });

    // Known to clients but carrying nothing the world acts on yet.
    for event in ["action", "inventory", "editor"] {
        router.register(event, move |session, _: serde_json::Value| {
            tracing::trace!(%session, event, "ignored client event");
        });
    }
}
