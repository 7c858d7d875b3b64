//! Event streaming from the engine to whatever renders it.
//!
//! Relays follow the `{source}_{event}_relay` naming pattern, e.g.
//! `error_alert_relay` carries alerts raised by any controller.

use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender, unbounded};

/// Sending half of an unbounded event stream.
///
/// Cloning is cheap and every clone feeds the same receiver, so several
/// controllers can publish into one stream.
#[derive(Debug)]
pub struct Relay<T> {
    sender: UnboundedSender<T>,
}

impl<T> Clone for Relay<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// The receiving side has been dropped.
    ChannelClosed,
}

impl<T> Relay<T> {
    pub fn new() -> (Self, UnboundedReceiver<T>) {
        let (sender, receiver) = unbounded();
        (Relay { sender }, receiver)
    }

    /// Sends an event; it is silently dropped when nobody listens.
    pub fn send(&self, value: T) {
        let _ = self.sender.unbounded_send(value);
    }

    pub fn try_send(&self, value: T) -> Result<(), RelayError> {
        self.sender
            .unbounded_send(value)
            .map_err(|_| RelayError::ChannelClosed)
    }
}

impl<T> Default for Relay<T> {
    /// A disconnected relay whose events go nowhere.
    fn default() -> Self {
        let (relay, _receiver) = Self::new();
        relay
    }
}

pub fn relay<T>() -> (Relay<T>, UnboundedReceiver<T>) {
    Relay::new()
}
