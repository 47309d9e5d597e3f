//! Built-in handler for the `system` category

use async_trait::async_trait;
use serde_json::json;

use crate::common::Result;

use super::envelope::Envelope;
use super::handler::Handler;

pub const PING: &str = "ping";
pub const VERSION: &str = "version";

/// Answers liveness and version queries from the peer
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemHandler;

#[async_trait]
impl Handler for SystemHandler {
    async fn handle(&self, envelope: Envelope) -> Result<Option<Envelope>> {
        if !envelope.is_request() {
            tracing::debug!(kind = %envelope.kind, action = %envelope.action, "Ignoring system message");
            return Ok(None);
        }

        let reply = match envelope.action.as_str() {
            PING => Envelope::response(&envelope, Some(json!({ "status": "ok" }))),
            VERSION => Envelope::response(
                &envelope,
                Some(json!({ "version": env!("CARGO_PKG_VERSION") })),
            ),
            other => {
                Envelope::error_response(&envelope, format!("Unknown system action: {}", other))
            }
        };
        Ok(Some(reply))
    }
}
