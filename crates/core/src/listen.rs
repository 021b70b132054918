//! Blocking consumption loop with cooperative shutdown
//!
//! The listener is the only component that blocks on external I/O: it pops
//! raw payloads, feeds them through the decoder, and hands decoded changes
//! to a callback. An empty queue triggers an idle backoff that sleeps in
//! short increments, checking the shutdown flag between increments, so a
//! termination signal is honored within roughly one second.
//!
//! Error policy: transport errors are fatal and end the loop; decode errors
//! are always recovered (the payload is dropped and polling continues).

use crate::change::Change;
use crate::decode::EventDecoder;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Sleep per idle backoff increment
const BACKOFF_STEP: Duration = Duration::from_millis(100);
/// Increments per idle cycle before re-polling
const BACKOFF_STEPS: u32 = 10;

/// Transport failure while popping from the queue
#[derive(Debug, Error)]
#[error("queue transport error: {message}")]
pub struct QueueError {
    message: String,
}

impl QueueError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Pop-one primitive over an operator-configured list
pub trait Queue {
    /// Pop the next raw payload, or `None` when the list is empty
    ///
    /// Must return promptly enough that the listener can keep its sub-second
    /// shutdown polling; ordering is whatever the transport's pop discipline
    /// yields.
    fn pop(&mut self, list: &str) -> Result<Option<String>, QueueError>;
}

/// Callback verdict controlling the listen loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Outcome of a single poll
enum Polled {
    Empty,
    Dropped,
    Decoded(Change),
}

/// Ties queue, decoder and per-event callback together
pub struct Listener<Q> {
    queue: Q,
    list: String,
    decoder: EventDecoder,
    shutdown: Arc<AtomicBool>,
}

impl<Q: Queue> Listener<Q> {
    pub fn new(queue: Q, list: impl Into<String>, decoder: EventDecoder) -> Self {
        Self {
            queue,
            list: list.into(),
            decoder,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Cooperative shutdown flag
    ///
    /// Register signal handlers on this flag; the loop checks it before each
    /// pop and between backoff increments.
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Run until the callback stops the loop, shutdown is flagged, or the
    /// transport fails
    pub fn listen<F>(&mut self, mut on_event: F) -> Result<(), QueueError>
    where
        F: FnMut(Change) -> Flow,
    {
        while !self.shutdown.load(Ordering::SeqCst) {
            match self.poll()? {
                Polled::Decoded(change) => {
                    if on_event(change) == Flow::Stop {
                        debug!("listen callback requested stop");
                        break;
                    }
                }
                // dropped payloads are not retried; re-poll immediately
                Polled::Dropped => continue,
                Polled::Empty => self.idle_backoff(),
            }
        }
        Ok(())
    }

    /// Pop and decode everything currently queued
    ///
    /// Dropped payloads are skipped. The one-shot counterpart of
    /// [`listen`](Self::listen) for callers that poll on their own schedule.
    pub fn drain(&mut self) -> Result<Vec<Change>, QueueError> {
        let mut changes = Vec::new();
        loop {
            match self.poll()? {
                Polled::Empty => return Ok(changes),
                Polled::Dropped => continue,
                Polled::Decoded(change) => changes.push(change),
            }
        }
    }

    fn poll(&mut self) -> Result<Polled, QueueError> {
        match self.queue.pop(&self.list)? {
            None => Ok(Polled::Empty),
            Some(raw) => Ok(match self.decoder.decode(&raw) {
                Some(change) => Polled::Decoded(change),
                None => Polled::Dropped,
            }),
        }
    }

    /// Sleep while listening for the stop flag
    fn idle_backoff(&self) {
        for _ in 0..BACKOFF_STEPS {
            if self.shutdown.load(Ordering::SeqCst) {
                return;
            }
            std::thread::sleep(BACKOFF_STEP);
        }
    }
}
