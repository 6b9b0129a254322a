//! Awaited fan-out event bus
//!
//! `emit` runs every matching handler as its own task and returns only once
//! all of them have finished. A handler that errors or panics is logged and
//! does not affect the other handlers or the emitter.

use super::{Event, EventType};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::task::JoinSet;
use tracing::{debug, error, info};

/// Receives pipeline events
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &Event) -> anyhow::Result<()>;
}

/// Logs every event it receives
#[derive(Debug, Default)]
pub struct LoggingHandler;

#[async_trait]
impl EventHandler for LoggingHandler {
    async fn handle(&self, event: &Event) -> anyhow::Result<()> {
        match event.event_type {
            EventType::EntityDiscovered
            | EventType::EntityUpdated
            | EventType::ContentSaved => debug!(event = %event, "Pipeline event"),
            _ => info!(event = %event, "Pipeline event"),
        }
        Ok(())
    }
}

#[derive(Default)]
struct Registry {
    by_type: HashMap<EventType, Vec<Arc<dyn EventHandler>>>,
    any: Vec<Arc<dyn EventHandler>>,
}

/// Registry of per-type and wildcard handlers
///
/// The bus is cheap to clone; clones share one registry.
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Arc<RwLock<Registry>>,
}

fn same_handler(a: &Arc<dyn EventHandler>, b: &Arc<dyn EventHandler>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for one event type
    pub fn on(&self, event_type: EventType, handler: Arc<dyn EventHandler>) {
        if let Ok(mut registry) = self.registry.write() {
            registry.by_type.entry(event_type).or_default().push(handler);
        }
    }

    /// Removes a handler previously registered with [`EventBus::on`]
    pub fn off(&self, event_type: EventType, handler: &Arc<dyn EventHandler>) {
        if let Ok(mut registry) = self.registry.write() {
            if let Some(handlers) = registry.by_type.get_mut(&event_type) {
                handlers.retain(|h| !same_handler(h, handler));
            }
        }
    }

    /// Registers a handler for every event type
    pub fn on_any(&self, handler: Arc<dyn EventHandler>) {
        if let Ok(mut registry) = self.registry.write() {
            registry.any.push(handler);
        }
    }

    pub fn off_any(&self, handler: &Arc<dyn EventHandler>) {
        if let Ok(mut registry) = self.registry.write() {
            registry.any.retain(|h| !same_handler(h, handler));
        }
    }

    /// Removes every handler
    pub fn clear(&self) {
        if let Ok(mut registry) = self.registry.write() {
            registry.by_type.clear();
            registry.any.clear();
        }
    }

    /// Number of handlers an event of this type would reach
    pub fn handler_count(&self, event_type: EventType) -> usize {
        self.handlers_for(event_type).len()
    }

    fn handlers_for(&self, event_type: EventType) -> Vec<Arc<dyn EventHandler>> {
        let Ok(registry) = self.registry.read() else {
            return Vec::new();
        };
        registry
            .by_type
            .get(&event_type)
            .into_iter()
            .flatten()
            .chain(registry.any.iter())
            .cloned()
            .collect()
    }

    /// Dispatches to all matching handlers and waits for them
    pub async fn emit(&self, event: Event) {
        let handlers = self.handlers_for(event.event_type);
        if handlers.is_empty() {
            return;
        }

        let event = Arc::new(event);
        let mut tasks = JoinSet::new();
        for handler in handlers {
            let event = event.clone();
            tasks.spawn(async move { handler.handle(&event).await });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(event_type = %event.event_type, error = %e, "Event handler failed")
                }
                Err(e) => {
                    error!(event_type = %event.event_type, error = %e, "Event handler panicked")
                }
            }
        }
    }
}
