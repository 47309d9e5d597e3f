//! companion-link - control-plane transport for a desktop companion app
//!
//! A reconnecting Unix domain socket link to the local supervisor process,
//! carrying newline-delimited JSON envelopes that are routed by category to
//! registered handlers.

pub mod cli;
pub mod commands;
pub mod common;
pub mod control;
pub mod ipc;
pub mod service;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use control::{Category, Envelope, Handler, MessageType, Router};
pub use ipc::{Connection, ConnectionOptions, ConnectionState, SendOutcome};
