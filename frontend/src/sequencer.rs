//! Latest-request-wins sequencing of backend calls.
//!
//! Each logical request key has one current cancellation token. Issuing a
//! request under a key aborts the one in flight, and a response that still
//! manages to arrive for a stale token is discarded instead of applied.

use futures::future::{AbortHandle, Abortable};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::rc::Rc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKey {
    /// Preview rows the column layout is derived from.
    GridPreview,
    GridPage,
    Histogram,
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestKey::GridPreview => f.write_str("grid-preview"),
            RequestKey::GridPage => f.write_str("grid-page"),
            RequestKey::Histogram => f.write_str("histogram"),
        }
    }
}

/// Result of a sequenced request.
#[derive(Debug, Clone, PartialEq)]
pub enum Sequenced<T> {
    /// Still the latest request under its key; safe to apply.
    Current(T),
    /// Cancelled or overtaken by a newer request; must not be applied.
    Superseded,
}

/// What a controller did with the outcome of a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied,
    /// Cancelled, superseded or suspended. Never user-visible.
    Discarded,
    /// Failure that has been surfaced to the user.
    Failed,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u64,
    in_flight: Option<AbortHandle>,
}

/// Cloning shares the slots, so controllers holding a clone sequence against
/// each other's keys (e.g. a subset refresh supersedes a full refresh).
#[derive(Debug, Clone, Default)]
pub struct RequestSequencer {
    slots: Rc<RefCell<HashMap<RequestKey, Slot>>>,
}

impl RequestSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels whatever is in flight under `key`, then runs `request`.
    pub async fn fetch_latest<F, T>(&self, key: RequestKey, request: F) -> Sequenced<T>
    where
        F: Future<Output = T>,
    {
        let (handle, registration) = AbortHandle::new_pair();
        let generation = {
            let mut slots = self.slots.borrow_mut();
            let slot = slots.entry(key).or_default();
            if let Some(previous) = slot.in_flight.take() {
                debug!(%key, generation = slot.generation, "aborting in-flight request");
                previous.abort();
            }
            slot.generation += 1;
            slot.in_flight = Some(handle);
            slot.generation
        };

        let result = Abortable::new(request, registration).await;

        let mut slots = self.slots.borrow_mut();
        let slot = slots.entry(key).or_default();
        let current = slot.generation == generation;
        if current {
            slot.in_flight = None;
        }
        match result {
            Ok(value) if current => Sequenced::Current(value),
            _ => {
                debug!(%key, generation, "discarding stale response");
                Sequenced::Superseded
            }
        }
    }

    /// Aborts the request in flight under `key`, if any.
    pub fn cancel(&self, key: RequestKey) {
        let mut slots = self.slots.borrow_mut();
        let slot = slots.entry(key).or_default();
        slot.generation += 1;
        if let Some(handle) = slot.in_flight.take() {
            handle.abort();
        }
    }

    pub fn cancel_all(&self) {
        let keys: Vec<RequestKey> = self.slots.borrow().keys().copied().collect();
        for key in keys {
            self.cancel(key);
        }
    }

    pub fn is_in_flight(&self, key: RequestKey) -> bool {
        self.slots
            .borrow()
            .get(&key)
            .is_some_and(|slot| slot.in_flight.is_some())
    }
}
