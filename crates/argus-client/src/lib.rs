// ============================================
// File: crates/argus-client/src/lib.rs
// ============================================
//! # Argus Client - Endpoint Agent Library
//!
//! ## Creation Reason
//! Implements the headless endpoint agent: a strictly sequential polling
//! loop that seals queued messages into envelopes, POSTs them to the
//! fleet server, and dispatches whatever comes back.
//!
//! ## Main Functionality
//! - [`agent`]: the polling state machine
//! - [`comms`]: sealing/opening against the server identity
//! - [`enroll`]: first-contact certificate bootstrap
//! - [`http`]: the transport seam and its `reqwest` implementation
//! - [`poll`]: adaptive interval, backoff, fast poll
//! - [`queue`]: bounded outbound buffering
//! - [`registry`]: explicit action handler registration
//! - [`config`] / [`error`]: the ambient plumbing
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │   argus-client ◄── You are here     argus-server    │
//! │            │                     │                  │
//! │            └──────────┬──────────┘                  │
//! │                       ▼                             │
//! │                  argus-core                         │
//! │                       │                             │
//! │                       ▼                             │
//! │                argus-common                         │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - The loop is deliberately single-threaded: one request in flight,
//!   ever. Do not "parallelize" it
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod agent;
pub mod comms;
pub mod config;
pub mod enroll;
pub mod error;
pub mod http;
pub mod poll;
pub mod queue;
pub mod registry;

// Re-export commonly used items at crate root
pub use agent::{Agent, CycleOutcome};
pub use comms::ClientCommunicator;
pub use config::ClientConfig;
pub use error::{ClientError, Result};
