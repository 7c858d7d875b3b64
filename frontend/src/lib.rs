//! Synchronized filter/visualization engine of the timeline viewer.
//!
//! A [`Session`] keeps a remotely paginated record grid and an aggregated
//! activity histogram consistent with one [`shared::FilterState`]. Rendering
//! is left to the host: every render artifact is a signal-capable
//! [`dataflow::Mutable`], and alerts arrive on the receiver returned by
//! [`Session::new`].

pub mod dataflow;
pub mod debounce;
pub mod error;
pub mod error_display;
pub mod filter_store;
pub mod grid;
pub mod histogram;
pub mod platform;
pub mod selection;
pub mod sequencer;
pub mod session;

#[cfg(test)]
mod testing;

pub use error::EngineError;
pub use error_display::{ErrorAlert, NotificationVariant, ViewStatus};
pub use filter_store::FilterStateStore;
pub use grid::{GridController, GridPage};
pub use histogram::{HistogramController, NoiseToggle};
pub use platform::{Backend, ExportPayload};
pub use selection::{Refresh, SelectionSet, SelectionSubsetter};
pub use sequencer::{FetchOutcome, RequestKey, RequestSequencer, Sequenced};
pub use session::{ExportedFile, Session};
