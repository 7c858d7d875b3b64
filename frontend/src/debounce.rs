//! Cancellable timers for keystroke-driven edits.

use crate::platform;
use futures::future::{AbortHandle, Abortable};
use std::cell::{Cell, RefCell};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Debounce {
    /// The quiet period elapsed without a newer edit.
    Fired,
    /// A newer edit (or an explicit cancel) replaced this timer.
    Superseded,
}

/// One timer slot: at most one pending timer is live, and starting a new one
/// cancels the previous.
#[derive(Debug)]
pub struct DebounceSlot {
    delay: Duration,
    generation: Cell<u64>,
    pending: RefCell<Option<(u64, AbortHandle)>>,
}

impl DebounceSlot {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            generation: Cell::new(0),
            pending: RefCell::new(None),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Waits out the quiet period. Last edit wins.
    pub async fn wait(&self) -> Debounce {
        let generation = self.generation.get() + 1;
        self.generation.set(generation);

        let (handle, registration) = AbortHandle::new_pair();
        if let Some((_, previous)) = self.pending.replace(Some((generation, handle))) {
            previous.abort();
        }

        let slept = Abortable::new(platform::sleep(self.delay), registration).await;

        let mut pending = self.pending.borrow_mut();
        if pending.as_ref().is_some_and(|(owner, _)| *owner == generation) {
            *pending = None;
        }
        match slept {
            Ok(()) if self.generation.get() == generation => Debounce::Fired,
            _ => Debounce::Superseded,
        }
    }

    pub fn cancel(&self) {
        self.generation.set(self.generation.get() + 1);
        if let Some((_, handle)) = self.pending.take() {
            handle.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.borrow().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;

    #[tokio::test(start_paused = true)]
    async fn only_the_last_of_rapid_waits_fires() {
        let slot = DebounceSlot::new(Duration::from_millis(800));
        let waits = (0..5u64).map(|index| {
            let slot = &slot;
            async move {
                tokio::time::sleep(Duration::from_millis(index * 20)).await;
                slot.wait().await
            }
        });

        let outcomes = join_all(waits).await;

        assert_eq!(
            outcomes,
            vec![
                Debounce::Superseded,
                Debounce::Superseded,
                Debounce::Superseded,
                Debounce::Superseded,
                Debounce::Fired,
            ]
        );
        assert!(!slot.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn spaced_waits_each_fire() {
        let slot = DebounceSlot::new(Duration::from_millis(100));
        assert_eq!(slot.wait().await, Debounce::Fired);
        assert_eq!(slot.wait().await, Debounce::Fired);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_supersedes_pending_timer() {
        let slot = DebounceSlot::new(Duration::from_millis(850));
        let (outcome, ()) = futures::join!(slot.wait(), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            slot.cancel();
        });
        assert_eq!(outcome, Debounce::Superseded);
    }
}
