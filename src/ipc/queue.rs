//! Outbound frames held while the link is down

use std::collections::VecDeque;
use std::time::Instant;

use tokio::sync::oneshot;

use crate::common::{Error, Result};

use super::connection::SendOutcome;

/// Notified once a frame is written, dropped or cancelled
pub type Completion = oneshot::Sender<Result<SendOutcome>>;

/// A frame waiting for the link to come back
#[derive(Debug)]
pub struct Pending {
    pub frame: Vec<u8>,
    pub completion: Option<Completion>,
    pub queued_at: Instant,
}

impl Pending {
    pub fn new(frame: Vec<u8>, completion: Option<Completion>) -> Self {
        Self {
            frame,
            completion,
            queued_at: Instant::now(),
        }
    }

    /// Report the final result to whoever is waiting on this frame
    pub fn complete(self, result: Result<SendOutcome>) {
        if let Some(completion) = self.completion {
            let _ = completion.send(result);
        }
    }
}

/// Bounded FIFO; the oldest frame is evicted when full
#[derive(Debug)]
pub struct PendingQueue {
    items: VecDeque<Pending>,
    capacity: usize,
    evicted: u64,
}

impl PendingQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::new(),
            capacity: capacity.max(1),
            evicted: 0,
        }
    }

    /// Queue a frame, evicting and failing the oldest one when full
    pub fn push(&mut self, pending: Pending) {
        if self.items.len() >= self.capacity {
            if let Some(oldest) = self.items.pop_front() {
                self.evicted += 1;
                tracing::warn!(
                    capacity = self.capacity,
                    waited_ms = oldest.queued_at.elapsed().as_millis() as u64,
                    "Pending queue full, dropping oldest frame"
                );
                oldest.complete(Err(Error::QueueOverflow));
            }
        }
        self.items.push_back(pending);
    }

    /// Take every queued frame in FIFO order
    pub fn drain(&mut self) -> impl Iterator<Item = Pending> + '_ {
        self.items.drain(..)
    }

    /// Fail and drop everything queued
    pub fn cancel_all(&mut self) {
        for pending in self.items.drain(..) {
            pending.complete(Err(Error::ConnectionCancelled));
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Frames dropped because the queue was full
    pub fn evicted(&self) -> u64 {
        self.evicted
    }
}
