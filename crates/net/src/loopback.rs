use mage_common::SessionId;
use mage_kernel::{ServerEvent, Transport, WorldHandle};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::{Envelope, NetError, Router};

/// In-process transport. Sessions are plain ids and outbound events are
/// buffered per session until the client side collects them.
#[derive(Default)]
pub struct LoopbackTransport {
    next_session: AtomicU64,
    open: Mutex<BTreeSet<SessionId>>,
    outbox: Mutex<HashMap<SessionId, Vec<ServerEvent>>>,
    closed: Mutex<Vec<SessionId>>,
    world: Mutex<Option<WorldHandle>>,
}

impl LoopbackTransport {
    /// Transport with no sessions and no world attached.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lifecycle notifications (connect, disconnect) go to `handle`.
    pub fn attach(&self, handle: WorldHandle) {
        *self.world.lock() = Some(handle);
    }

    fn world(&self) -> Option<WorldHandle> {
        self.world.lock().clone()
    }

    /// Open a new session.
    pub fn open(&self) -> SessionId {
        let session = SessionId(self.next_session.fetch_add(1, Ordering::Relaxed) + 1);
        self.open.lock().insert(session);
        if let Some(world) = self.world() {
            world.connect(session);
        }
        session
    }

    /// Whether `session` is still open.
    pub fn is_open(&self, session: SessionId) -> bool {
        self.open.lock().contains(&session)
    }

    /// Drain everything delivered to `session` so far.
    pub fn take_outbox(&self, session: SessionId) -> Vec<ServerEvent> {
        self.outbox.lock().remove(&session).unwrap_or_default()
    }

    /// Sessions closed by the server side, oldest first.
    pub fn closed(&self) -> Vec<SessionId> {
        self.closed.lock().clone()
    }

    /// The client side hangs up.
    pub fn hang_up(&self, session: SessionId) {
        if self.open.lock().remove(&session) {
            self.outbox.lock().remove(&session);
            tracing::debug!(%session, "client hung up");
            if let Some(world) = self.world() {
                world.disconnect(session);
            }
        }
    }
}

impl Transport for LoopbackTransport {
    fn send(&self, session: SessionId, event: ServerEvent) {
        if !self.is_open(session) {
            tracing::debug!(%session, "dropping event for closed session");
            return;
        }
        self.outbox.lock().entry(session).or_default().push(event);
    }

    fn close(&self, session: SessionId) {
        if !self.open.lock().remove(&session) {
            return;
        }
        // Nobody is left to collect what was still buffered.
        self.outbox.lock().remove(&session);
        self.closed.lock().push(session);
        tracing::debug!(%session, "session closed by server");
        // The world hears about it on a later tick, never re-entrantly.
        if let Some(world) = self.world() {
            world.disconnect(session);
        }
    }
}

/// Client end of one loopback session. Messages go out as JSON text through
/// the router, the same way a socket reader would feed them in.
pub struct LoopbackClient {
    session: SessionId,
    router: Arc<Router>,
    transport: Arc<LoopbackTransport>,
}

impl LoopbackClient {
    /// Open a new session on `transport`.
    pub fn connect(router: Arc<Router>, transport: Arc<LoopbackTransport>) -> Self {
        let session = transport.open();
        Self {
            session,
            router,
            transport,
        }
    }

    /// Session id of this client.
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Encode and route one message. Fails once the session is closed.
    pub fn send<T: Serialize>(&self, event: &str, data: &T) -> Result<(), NetError> {
        if !self.transport.is_open(self.session) {
            return Err(NetError::Closed(self.session));
        }
        let envelope = Envelope {
            event: event.to_owned(),
            data: serde_json::to_value(data)?,
        };
        let raw = serde_json::to_string(&envelope)?;
        self.router.dispatch(self.session, &raw)
    }

    /// Events delivered since the last call.
    pub fn receive(&self) -> Vec<ServerEvent> {
        self.transport.take_outbox(self.session)
    }

    /// Whether the server still has this session open.
    pub fn is_open(&self) -> bool {
        self.transport.is_open(self.session)
    }

    /// Close from the client side.
    pub fn hang_up(&self) {
        self.transport.hang_up(self.session);
    }
}
