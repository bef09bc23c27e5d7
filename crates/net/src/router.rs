use mage_common::SessionId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::NetError;

type Handler = Box<dyn Fn(SessionId, serde_json::Value) -> Result<(), NetError> + Send + Sync>;

/// Wire framing of one client message: `{ "event": "...", "data": { ... } }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Maps event names to handlers. Handlers may run on any thread.
#[derive(Default)]
pub struct Router {
    handlers: HashMap<String, Handler>,
}

impl Router {
    /// Router with no handlers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for messages named `event`, decoding the payload
    /// into `T` first. Registering a name twice replaces the old handler.
    pub fn register<T, F>(&mut self, event: &str, handler: F)
    where
        T: DeserializeOwned,
        F: Fn(SessionId, T) + Send + Sync + 'static,
    {
        let name = event.to_owned();
        let wrapped: Handler = Box::new(move |session, data| {
            let payload = serde_json::from_value(data).map_err(|source| NetError::Payload {
                event: name.clone(),
                source,
            })?;
            handler(session, payload);
            Ok(())
        });
        if self.handlers.insert(event.to_owned(), wrapped).is_some() {
            tracing::warn!(%event, "replaced existing handler");
        }
    }

    /// Decode one raw message from `session` and hand it to its handler.
    pub fn dispatch(&self, session: SessionId, raw: &str) -> Result<(), NetError> {
        let envelope: Envelope = serde_json::from_str(raw)?;
        self.dispatch_envelope(session, envelope)
    }

    /// Dispatch an already-parsed envelope.
    pub fn dispatch_envelope(&self, session: SessionId, envelope: Envelope) -> Result<(), NetError> {
        let handler = self
            .handlers
            .get(&envelope.event)
            .ok_or_else(|| NetError::UnknownEvent(envelope.event.clone()))?;
        tracing::trace!(%session, event = %envelope.event, "dispatch");
        handler(session, envelope.data)
    }

    /// Whether a handler is registered for `event`.
    pub fn handles(&self, event: &str) -> bool {
        self.handlers.contains_key(event)
    }
}
