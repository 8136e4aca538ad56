//! Typed publish/subscribe for completion events.
//!
//! Feature code subscribes a handler per verb at startup; the completion
//! router publishes one event per processed completion. Handlers must
//! tolerate replays, since a transport may deliver the same completion
//! twice.

use serde::Serialize;
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// CompletionEvent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionEvent {
    pub verb: String,
    pub resource_id: String,
    pub subject: String,
    pub success: bool,
}

// ---------------------------------------------------------------------------
// HandlerRegistry
// ---------------------------------------------------------------------------

type Handler = Box<dyn Fn(&CompletionEvent) + Send + Sync>;

/// Per-verb completion handlers.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Vec<Handler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, verb: impl Into<String>, handler: F)
    where
        F: Fn(&CompletionEvent) + Send + Sync + 'static,
    {
        self.handlers
            .entry(verb.into())
            .or_default()
            .push(Box::new(handler));
    }

    /// Invoke every handler subscribed to the event's verb. Returns how many
    /// handlers ran.
    pub fn publish(&self, event: &CompletionEvent) -> usize {
        match self.handlers.get(&event.verb) {
            Some(handlers) => {
                for handler in handlers {
                    handler(event);
                }
                handlers.len()
            }
            None => 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
