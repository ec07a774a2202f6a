// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cross-thread FIFO of terminal-transition events with a bounded,
//! cancellable wait.
//!
//! Producers are VM-supervisor exit callbacks; consumers are `wait_next_event`
//! tool handlers running on the RPC worker pool. Unlike the teacher's
//! WAL-backed `EventBus`, this bus does not persist events: restart recovery
//! (spec.md §4.G) is driven by scanning `task.json` files, not by replaying
//! the bus, so durability here would be a concern the spec doesn't ask for.

use mvm_core::Event;
use std::future::Future;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex as AsyncMutex};

/// Outcome of a single `wait_next` call.
#[derive(Debug)]
pub enum WaitOutcome {
    Event(Event),
    Timeout,
    Cancelled,
}

/// Process-wide bounded FIFO of [`Event`]s.
///
/// `emit` never blocks and never drops. Multiple concurrent `wait_next`
/// callers serialize on an internal async mutex around the single receiver,
/// so each event is handed to exactly one waiter (the "single-consumer per
/// event" model spec.md §4.A calls for), while still allowing any number of
/// producers and waiters to be active at once.
#[derive(Clone)]
pub struct EventBus {
    tx: mpsc::UnboundedSender<Event>,
    rx: std::sync::Arc<AsyncMutex<mpsc::UnboundedReceiver<Event>>>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: std::sync::Arc::new(AsyncMutex::new(rx)),
        }
    }

    /// Emit an event. Non-blocking; the only failure mode is every receiver
    /// having been dropped, which cannot happen while `self` is alive (the
    /// bus holds the receiver itself).
    pub fn emit(&self, event: Event) {
        let _ = self.tx.send(event);
    }

    /// Wait up to `timeout_ms` for the next event. `cancel` resolves when
    /// the host transport wants to abandon the wait (e.g. the client
    /// disconnected); pass `std::future::pending()` for callers with no
    /// cancellation source.
    pub async fn wait_next<C>(&self, timeout_ms: u64, cancel: C) -> WaitOutcome
    where
        C: Future<Output = ()>,
    {
        let mut rx = self.rx.lock().await;
        tokio::pin!(cancel);
        tokio::select! {
            biased;
            _ = &mut cancel => WaitOutcome::Cancelled,
            maybe_event = rx.recv() => match maybe_event {
                Some(event) => WaitOutcome::Event(event),
                // The bus owns both ends; a closed channel only happens if
                // `self.tx` was dropped, which never occurs for a live bus.
                None => WaitOutcome::Timeout,
            },
            _ = tokio::time::sleep(Duration::from_millis(timeout_ms)) => WaitOutcome::Timeout,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "event_bus_tests.rs"]
mod tests;
