//! Extension points of the router
//!
//! A [`Handler`] owns one category; a [`FrameSink`] is wherever replies go
//! (the live [`Connection`] in production, a recorder in tests).

use std::future::Future;

use async_trait::async_trait;

use crate::common::Result;
use crate::ipc::{Connection, SendOutcome};

use super::envelope::Envelope;

/// Consumer of every envelope routed to one category
///
/// Returning `Ok(Some(reply))` sends the reply; `Ok(None)` sends nothing.
/// Errors are logged by the router and treated as no reply.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, envelope: Envelope) -> Result<Option<Envelope>>;
}

#[async_trait]
impl<F, Fut> Handler for F
where
    F: Fn(Envelope) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Option<Envelope>>> + Send,
{
    async fn handle(&self, envelope: Envelope) -> Result<Option<Envelope>> {
        (self)(envelope).await
    }
}

/// Outbound side of the router
#[async_trait]
pub trait FrameSink: Send + Sync {
    async fn send_frame(&self, frame: Vec<u8>) -> Result<SendOutcome>;
}

#[async_trait]
impl FrameSink for Connection {
    async fn send_frame(&self, frame: Vec<u8>) -> Result<SendOutcome> {
        self.send(frame).await
    }
}
