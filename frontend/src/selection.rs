//! Row selection and the pinned "selection view".

use crate::error::EngineError;
use crate::grid::GridController;
use crate::histogram::HistogramController;
use crate::platform::Backend;
use crate::filter_store::FilterStateStore;
use crate::sequencer::FetchOutcome;
use shared::{FilterState, FilterUpdate, Record, RowId, SubsetRequest};
use std::cell::RefCell;
use std::collections::BTreeMap;
use tracing::info;

/// Checked rows, kept in row order whatever order they were clicked in.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectionSet {
    rows: BTreeMap<RowId, Record>,
}

impl SelectionSet {
    pub fn insert(&mut self, record: Record) {
        self.rows.insert(record.row_id, record);
    }

    pub fn remove(&mut self, row_id: RowId) -> bool {
        self.rows.remove(&row_id).is_some()
    }

    pub fn contains(&self, row_id: RowId) -> bool {
        self.rows.contains_key(&row_id)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_ids(&self) -> impl Iterator<Item = RowId> + '_ {
        self.rows.keys().copied()
    }

    /// Snapshot of the selected records, ascending by row id.
    pub fn records(&self) -> Vec<Record> {
        self.rows.values().cloned().collect()
    }
}

/// Both refreshes triggered by one synchronized fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Refresh {
    pub grid: FetchOutcome,
    pub histogram: FetchOutcome,
}

impl Refresh {
    pub fn discarded() -> Self {
        Self {
            grid: FetchOutcome::Discarded,
            histogram: FetchOutcome::Discarded,
        }
    }
}

/// Where the paginated grid stood when selection view was entered.
#[derive(Debug, Clone)]
struct ResumePoint {
    page_number: u64,
    filters: FilterState,
}

/// Switches the grid and chart between the paginated dataset and a pinned
/// subset of checked rows.
#[derive(Debug, Default)]
pub struct SelectionSubsetter {
    resume: RefCell<Option<ResumePoint>>,
}

impl SelectionSubsetter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.resume.borrow().is_some()
    }

    /// Pins the grid to the checked rows and scopes the chart to them.
    pub async fn enter_selection_view<B: Backend>(
        &self,
        filename: &str,
        filters: &FilterStateStore,
        grid: &GridController<B>,
        histogram: &HistogramController<B>,
    ) -> Result<FetchOutcome, EngineError> {
        let selection = grid.selection();
        if selection.is_empty() {
            return Err(EngineError::Validation(
                "Select at least one row before filtering to the selection.".to_string(),
            ));
        }

        if !self.is_active() {
            self.resume.replace(Some(ResumePoint {
                page_number: grid.page().page_number.max(1),
                filters: filters.get(),
            }));
        }
        filters.set(FilterUpdate::default().selection_view(true));
        let records = selection.records();
        info!(rows = records.len(), "entering selection view");
        grid.pin(records);

        let request = SubsetRequest::new(filename, selection.row_ids());
        Ok(histogram.refresh_subset(&request).await)
    }

    /// Leaves the selection view and restores the paginated grid under every
    /// standing filter. The grid returns to the page it was on when no filter
    /// changed in the meantime, and to page 1 otherwise.
    pub async fn exit_selection_view<B: Backend>(
        &self,
        filename: &str,
        filters: &FilterStateStore,
        grid: &GridController<B>,
        histogram: &HistogramController<B>,
    ) -> Refresh {
        let resume = self.resume.take();
        let state = filters.set(FilterUpdate::default().selection_view(false));
        let page = match resume {
            Some(resume) if resume.filters == state => resume.page_number,
            _ => 1,
        };
        grid.unpin();
        info!(page, "leaving selection view");

        let (grid_outcome, histogram_outcome) =
            futures::join!(grid.fetch_page(page, &state), histogram.refresh(filename, &state));
        Refresh {
            grid: grid_outcome,
            histogram: histogram_outcome,
        }
    }

    pub fn reset(&self) {
        self.resume.take();
    }
}
