//! IPC transport to the supervisor process
//!
//! One Unix domain socket carrying newline-delimited frames, with automatic
//! reconnection, keep-alive probing and queueing while disconnected.

pub mod backoff;
pub mod connection;
pub mod framing;
pub mod keepalive;
pub mod queue;
pub mod transport;

pub use connection::{Connection, ConnectionOptions, ConnectionState, Inbound, SendOutcome};
