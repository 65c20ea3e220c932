// ============================================
// File: crates/argus-server/src/lib.rs
// ============================================
//! # Argus Server - Fleet Server Library
//!
//! ## Creation Reason
//! Implements the server half of the Argus protocol: authenticate and
//! classify every client envelope, enroll first-contact clients, buffer
//! outbound work, and expose the single `/control` HTTP endpoint.
//!
//! ## Main Functionality
//! - [`communicator`]: envelope opening/sealing, identity cache
//! - [`sequencer`]: per-client freshness classification
//! - [`enroll`]: CA issuance for first-contact clients
//! - [`outbox`]: per-client server→client buffering
//! - [`dispatch`]: the flow-layer seam
//! - [`store`]: the datastore seam
//! - [`server`]: the axum control endpoint
//! - [`config`] / [`error`]: the ambient plumbing
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │   argus-client     argus-server ◄── You are here    │
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
//! - The communicator and crypto are stateless per request; the ONLY
//!   mutable shared state is the identity cache and sequencer, both
//!   bounded and sharded. Keep it that way
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod communicator;
pub mod config;
pub mod dispatch;
pub mod enroll;
pub mod error;
pub mod outbox;
pub mod sequencer;
pub mod server;
pub mod store;

// Re-export commonly used items at crate root
pub use communicator::{DecryptOutcome, ServerCommunicator};
pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use server::{handle_envelope, router, ServerState};
