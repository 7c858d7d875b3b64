//! Single owner of the active [`FilterState`].
//!
//! Keystroke-driven edits (search text, column header filters) are staged and
//! applied only once their debounce slot fires; discrete edits (time range,
//! exclusion, selection view) apply immediately.

use crate::dataflow::{Mutable, Signal};
use crate::debounce::{Debounce, DebounceSlot};
use indexmap::IndexMap;
use shared::config::DebounceSection;
use shared::{FilterState, FilterUpdate};
use std::cell::RefCell;
use tracing::debug;

pub struct FilterStateStore {
    state: Mutable<FilterState>,
    search_debounce: DebounceSlot,
    column_filter_debounce: DebounceSlot,
    staged_search: RefCell<Option<String>>,
    staged_column_edits: RefCell<IndexMap<String, String>>,
}

impl FilterStateStore {
    pub fn new(debounce: &DebounceSection) -> Self {
        Self {
            state: Mutable::new(FilterState::default()),
            search_debounce: DebounceSlot::new(debounce.search()),
            column_filter_debounce: DebounceSlot::new(debounce.column_filter()),
            staged_search: RefCell::new(None),
            staged_column_edits: RefCell::new(IndexMap::new()),
        }
    }

    /// Immutable snapshot of the current state.
    pub fn get(&self) -> FilterState {
        self.state.get_cloned()
    }

    pub fn signal(&self) -> impl Signal<Item = FilterState> {
        self.state.signal_cloned()
    }

    /// Merges `update` and returns the new snapshot.
    pub fn set(&self, update: FilterUpdate) -> FilterState {
        let mut state = self.state.lock_mut();
        let change = state.apply(update);
        if change.any() {
            debug!(?change, "filter state updated");
        }
        state.clone()
    }

    /// Replaces the state with a fresh instance for `dataset_id`, dropping
    /// any staged edits and pending timers.
    pub fn reset(&self, dataset_id: Option<&str>) -> FilterState {
        self.search_debounce.cancel();
        self.column_filter_debounce.cancel();
        self.staged_search.take();
        self.staged_column_edits.borrow_mut().clear();

        let fresh = match dataset_id {
            Some(dataset_id) => FilterState::for_dataset(dataset_id),
            None => FilterState::default(),
        };
        self.state.set(fresh.clone());
        fresh
    }

    /// Stages new search text. Returns the applied snapshot when this edit
    /// outlived the debounce window, `None` when a newer edit replaced it.
    pub async fn edit_search(&self, text: impl Into<String>) -> Option<FilterState> {
        self.staged_search.replace(Some(text.into()));
        if self.search_debounce.wait().await == Debounce::Superseded {
            return None;
        }
        let query = self.staged_search.take()?;
        Some(self.set(FilterUpdate::default().search(query)))
    }

    /// Stages a column filter edit; blank text clears the column's filter.
    ///
    /// Edits to different columns inside one debounce window are all applied
    /// when the window closes.
    pub async fn edit_column_filter(
        &self,
        column: impl Into<String>,
        text: impl Into<String>,
    ) -> Option<FilterState> {
        self.staged_column_edits
            .borrow_mut()
            .insert(column.into(), text.into());
        if self.column_filter_debounce.wait().await == Debounce::Superseded {
            return None;
        }
        let edits = std::mem::take(&mut *self.staged_column_edits.borrow_mut());
        if edits.is_empty() {
            return None;
        }
        let update = edits
            .into_iter()
            .fold(FilterUpdate::default(), |update, (column, text)| {
                update.column_filter(column, text)
            });
        Some(self.set(update))
    }

    pub fn has_pending_edits(&self) -> bool {
        self.search_debounce.is_pending() || self.column_filter_debounce.is_pending()
    }
}
