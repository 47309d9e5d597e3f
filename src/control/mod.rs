//! Control protocol above the transport
//!
//! Typed request/response/event envelopes routed by category to
//! independently registered handlers.

pub mod envelope;
pub mod handler;
pub mod payload;
pub mod router;
pub mod system;

pub use envelope::{Category, Envelope, MessageType};
pub use handler::{FrameSink, Handler};
pub use router::Router;
pub use system::SystemHandler;
