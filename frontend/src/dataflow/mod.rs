//! Reactive plumbing shared by the controllers.
//!
//! State that a renderer observes lives in `futures_signals` [`Mutable`]
//! cells owned by exactly one controller; events leave the engine through
//! [`Relay`]s.

pub mod relay;

pub use futures_signals::signal::{Mutable, Signal, SignalExt};
pub use relay::{Relay, RelayError, relay};
