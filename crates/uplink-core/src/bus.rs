//! Event bus
//!
//! Minimalist `subject:action` publish/subscribe. Delivery is synchronous
//! with respect to the emitter and runs handlers in registration order; a
//! failing handler is logged and never aborts delivery to the rest.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde_json::Value as JsonValue;

use crate::events::Event;

/// Handler invoked for every event published under its subscribed name.
pub type EventHandler = Arc<dyn Fn(&Event) -> anyhow::Result<()> + Send + Sync>;

/// Token returned by [`EventBus::on`], used to remove the subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

struct HandlerEntry {
    id: u64,
    handler: EventHandler,
}

#[derive(Default)]
struct BusInner {
    handlers: RwLock<HashMap<String, Vec<HandlerEntry>>>,
    next_id: AtomicU64,
}

/// Shared pub/sub hub. Cheap to clone; clones address the same handler map.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a handler to an exact event name (canonical or
    /// plugin-scoped). Subscription is additive.
    pub fn on<F>(&self, event: impl Into<String>, handler: F) -> HandlerId
    where
        F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let mut handlers = self
            .inner
            .handlers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        handlers.entry(event.into()).or_default().push(HandlerEntry {
            id,
            handler: Arc::new(handler),
        });
        HandlerId(id)
    }

    /// Remove a subscription. Returns whether a handler was removed.
    pub fn off(&self, id: HandlerId) -> bool {
        let mut handlers = self
            .inner
            .handlers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut removed = false;
        for entries in handlers.values_mut() {
            let before = entries.len();
            entries.retain(|entry| entry.id != id.0);
            removed |= entries.len() != before;
        }
        handlers.retain(|_, entries| !entries.is_empty());
        removed
    }

    /// Publish an event to every subscriber of its exact name.
    pub fn emit(&self, event: &Event) {
        let name = event.name();
        let snapshot: Vec<EventHandler> = {
            let handlers = self
                .inner
                .handlers
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            match handlers.get(name.as_ref()) {
                Some(entries) => entries.iter().map(|entry| entry.handler.clone()).collect(),
                None => return,
            }
        };
        for handler in snapshot {
            if let Err(error) = handler(event) {
                tracing::warn!(event = %name, error = %error, "Event handler failed");
            }
        }
    }

    pub fn handler_count(&self, event: &str) -> usize {
        let handlers = self
            .inner
            .handlers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        handlers.get(event).map(Vec::len).unwrap_or(0)
    }

    /// Emitter bound to a plugin id; see [`ScopedEmitter`].
    pub fn scoped(&self, scope: impl Into<String>) -> ScopedEmitter {
        ScopedEmitter {
            bus: self.clone(),
            scope: Arc::from(scope.into()),
        }
    }
}

/// Emitter whose events are prefixed with a plugin id, so two plugins
/// emitting the same local name never collide.
#[derive(Clone)]
pub struct ScopedEmitter {
    bus: EventBus,
    scope: Arc<str>,
}

impl ScopedEmitter {
    /// Emit `payload` under `<scope>:<action>`.
    pub fn emit(&self, action: &str, payload: JsonValue) {
        self.bus
            .emit(&Event::plugin(self.scope.as_ref(), action, payload));
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }
}
