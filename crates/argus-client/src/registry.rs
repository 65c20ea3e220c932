// ============================================
// File: crates/argus-client/src/registry.rs
// ============================================
//! # Action Handler Registry
//!
//! ## Creation Reason
//! Maps the stable action name carried by inbound messages to a
//! statically-typed handler. The registry is populated by explicit
//! `register` calls at process start; nothing registers itself as an
//! import-time side effect.
//!
//! ## Main Functionality
//! - `ActionRegistry`: name → handler map
//! - `ActionHandler`: the handler signature
//! - `dispatch`: run one inbound message, produce the response message
//!
//! ## ⚠️ Important Note for Next Developer
//! - Unknown action names are answered with an `action_error` response,
//!   never silently dropped: the requesting flow needs to learn its
//!   request cannot run here
//! - Handlers run on the loop task; long-running work must move off it
//!
//! ## Last Modified
//! v0.1.0 - Initial registry implementation

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use argus_core::protocol::Message;

// ============================================
// Constants
// ============================================

/// Action name of responses reporting a failed or unknown action.
pub const ACTION_ERROR: &str = "action_error";

// ============================================
// ActionHandler
// ============================================

/// A registered handler: payload in, response payload (or error) out.
pub type ActionHandler =
    Arc<dyn Fn(&Message) -> std::result::Result<Vec<u8>, String> + Send + Sync>;

// ============================================
// ActionRegistry
// ============================================

/// Registry of action handlers keyed by stable action name.
///
/// # Example
/// ```
/// use argus_client::registry::ActionRegistry;
///
/// let mut registry = ActionRegistry::new();
/// registry.register("echo", |message| Ok(message.payload.clone()));
/// assert!(registry.contains("echo"));
/// ```
#[derive(Default)]
pub struct ActionRegistry {
    handlers: HashMap<String, ActionHandler>,
}

impl ActionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registers a handler under `name`, replacing any previous one.
    pub fn register<F>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(&Message) -> std::result::Result<Vec<u8>, String> + Send + Sync + 'static,
    {
        let name = name.into();
        debug!(action = %name, "registered action handler");
        self.handlers.insert(name, Arc::new(handler));
    }

    /// Checks whether a handler is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Returns the number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Checks whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Runs the handler for one inbound message and builds the response.
    ///
    /// The response reuses the request's session and request id, with
    /// `response_id` advanced past the request's. Unknown actions and
    /// handler failures produce an [`ACTION_ERROR`] response carrying the
    /// error text.
    #[must_use]
    pub fn dispatch(&self, message: &Message) -> Message {
        let result = match self.handlers.get(&message.action) {
            Some(handler) => handler(message),
            None => {
                warn!(action = %message.action, "no handler registered");
                Err(format!("unknown action '{}'", message.action))
            }
        };

        let response_id = message.response_id + 1;
        match result {
            Ok(payload) => Message::new(message.session_id.clone(), message.action.clone(), payload)
                .with_request_id(message.request_id)
                .with_response_id(response_id),
            Err(error) => {
                Message::new(message.session_id.clone(), ACTION_ERROR, error.into_bytes())
                    .with_request_id(message.request_id)
                    .with_response_id(response_id)
            }
        }
    }
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

// ============================================
// Tests
// ============================================
