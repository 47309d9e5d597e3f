//! Category router above the connection
//!
//! Decodes inbound frames, hands each envelope to the handler registered
//! for its category and sends whatever the handler returns. Requests for a
//! category nobody handles get an error response so the peer does not wait
//! forever; unrouted events and responses are dropped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};

use crate::common::{Error, Result};
use crate::ipc::{Inbound, SendOutcome};

use super::envelope::{self, Category, Envelope};
use super::handler::{FrameSink, Handler};

/// Messages buffered per category before the inbound reader waits
const LANE_CAPACITY: usize = 64;

/// Cloneable handle to the handler registry and dispatcher
#[derive(Clone)]
pub struct Router {
    inner: Arc<RouterInner>,
}

struct RouterInner {
    sink: Arc<dyn FrameSink>,
    handlers: RwLock<HashMap<Category, Arc<dyn Handler>>>,
    /// Local `request()` calls waiting for their response, by id
    awaiting: Mutex<HashMap<String, oneshot::Sender<Envelope>>>,
}

impl Router {
    pub fn new(sink: impl FrameSink + 'static) -> Self {
        Self::with_sink(Arc::new(sink))
    }

    pub fn with_sink(sink: Arc<dyn FrameSink>) -> Self {
        Self {
            inner: Arc::new(RouterInner {
                sink,
                handlers: RwLock::new(HashMap::new()),
                awaiting: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Route `category` to `handler`, replacing any previous handler
    pub fn register_handler(&self, category: impl Into<Category>, handler: impl Handler + 'static) {
        let category = category.into();
        let replaced = self
            .inner
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(category.clone(), Arc::new(handler))
            .is_some();
        tracing::debug!(category = %category, replaced, "Handler registered");
    }

    /// Remove the handler for `category`; returns whether one was registered
    pub fn unregister_handler(&self, category: impl Into<Category>) -> bool {
        let category = category.into();
        let removed = self
            .inner
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&category)
            .is_some();
        tracing::debug!(category = %category, removed, "Handler unregistered");
        removed
    }

    pub fn has_handler(&self, category: impl Into<Category>) -> bool {
        self.handler_for(&category.into()).is_some()
    }

    fn handler_for(&self, category: &Category) -> Option<Arc<dyn Handler>> {
        self.inner
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(category)
            .cloned()
    }

    /// Encode and send one envelope
    pub async fn send(&self, envelope: &Envelope) -> Result<SendOutcome> {
        let frame = envelope::encode(envelope)?;
        self.inner.sink.send_frame(frame).await
    }

    /// Send an event to the peer
    pub async fn emit(&self, event: Envelope) -> Result<SendOutcome> {
        debug_assert!(event.is_event());
        self.send(&event).await
    }

    /// Send a request and wait for the peer's response
    ///
    /// Works while disconnected: the request is queued and the wait covers
    /// the reconnect. An error response is returned as-is; callers inspect
    /// `error` themselves.
    pub async fn request(&self, request: Envelope, timeout: Duration) -> Result<Envelope> {
        let id = request.id.clone();
        let (tx, rx) = oneshot::channel();
        self.awaiting().insert(id.clone(), tx);

        if let Err(e) = self.send(&request).await {
            self.awaiting().remove(&id);
            return Err(e);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(Error::Internal(format!("response waiter for {} dropped", id))),
            Err(_) => {
                self.awaiting().remove(&id);
                Err(Error::RequestTimeout {
                    id,
                    waited: timeout,
                })
            }
        }
    }

    fn awaiting(&self) -> std::sync::MutexGuard<'_, HashMap<String, oneshot::Sender<Envelope>>> {
        self.inner
            .awaiting
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Consume inbound frames until the channel closes
    ///
    /// Frames of one category reach its handler one at a time, in receive
    /// order. Each category runs on its own worker, so a slow handler only
    /// holds up its own category. Responses to local `request()` calls are
    /// delivered straight from the reader.
    pub fn spawn(&self, mut inbound: Inbound) -> JoinHandle<()> {
        let router = self.clone();
        tokio::spawn(async move {
            let mut lanes: HashMap<Category, mpsc::Sender<Envelope>> = HashMap::new();
            let mut workers = JoinSet::new();

            while let Some(frame) = inbound.recv().await {
                let Some(envelope) = router.accept(&frame) else {
                    continue;
                };
                let lane = lanes.entry(envelope.category.clone()).or_insert_with(|| {
                    let (tx, rx) = mpsc::channel(LANE_CAPACITY);
                    workers.spawn(router.clone().run_lane(rx));
                    tx
                });
                if let Err(mpsc::error::SendError(lost)) = lane.send(envelope).await {
                    tracing::error!(
                        id = %lost.id,
                        category = %lost.category,
                        "Category worker gone, dropping message"
                    );
                }
            }

            drop(lanes);
            while workers.join_next().await.is_some() {}
            tracing::debug!("Inbound channel closed, router stopped");
        })
    }

    async fn run_lane(self, mut lane: mpsc::Receiver<Envelope>) {
        while let Some(envelope) = lane.recv().await {
            self.route(envelope).await;
        }
    }

    /// Decode, route and answer one frame
    pub async fn on_frame(&self, frame: &[u8]) {
        if let Some(envelope) = self.accept(frame) {
            self.route(envelope).await;
        }
    }

    /// Decode a frame and settle everything that needs no handler
    ///
    /// Returns the envelope when it still has to be routed by category.
    fn accept(&self, frame: &[u8]) -> Option<Envelope> {
        let envelope = match envelope::decode(frame) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(error = %e, bytes = frame.len(), "Dropping malformed frame");
                return None;
            }
        };

        tracing::trace!(
            id = %envelope.id,
            kind = %envelope.kind,
            category = %envelope.category,
            action = %envelope.action,
            "Control message received"
        );

        if envelope.is_system_ready() {
            tracing::info!("Peer reported system ready");
            return None;
        }

        if envelope.is_response() {
            let waiter = self.awaiting().remove(&envelope.id);
            if let Some(waiter) = waiter {
                let _ = waiter.send(envelope);
                return None;
            }
        }

        Some(envelope)
    }

    async fn route(&self, envelope: Envelope) {
        match self.handler_for(&envelope.category) {
            Some(handler) => {
                if let Some(reply) = Self::invoke(handler, envelope).await {
                    self.reply(reply).await;
                }
            }
            None if envelope.is_request() => {
                let message = Error::NoHandler(envelope.category.to_string()).to_string();
                tracing::warn!(
                    id = %envelope.id,
                    category = %envelope.category,
                    action = %envelope.action,
                    "No handler for request, replying with error"
                );
                self.reply(Envelope::error_response(&envelope, message)).await;
            }
            None => {
                tracing::debug!(
                    kind = %envelope.kind,
                    category = %envelope.category,
                    action = %envelope.action,
                    "No handler, dropping message"
                );
            }
        }
    }

    /// Run a handler in its own task so a panic stays contained
    async fn invoke(handler: Arc<dyn Handler>, envelope: Envelope) -> Option<Envelope> {
        let category = envelope.category.clone();
        let action = envelope.action.clone();

        match tokio::spawn(async move { handler.handle(envelope).await }).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                tracing::error!(category = %category, action = %action, error = %e, "Handler failed");
                None
            }
            Err(e) => {
                tracing::error!(category = %category, action = %action, error = %e, "Handler panicked");
                None
            }
        }
    }

    async fn reply(&self, reply: Envelope) {
        if let Err(e) = self.send(&reply).await {
            tracing::warn!(
                id = %reply.id,
                category = %reply.category,
                error = %e,
                "Failed to send reply"
            );
        }
    }
}
