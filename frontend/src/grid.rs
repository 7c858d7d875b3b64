//! Remotely paginated record grid.

use crate::dataflow::{Mutable, Relay, Signal};
use crate::error::EngineError;
use crate::error_display::{ErrorAlert, ViewStatus, log_alert};
use crate::platform::Backend;
use crate::selection::SelectionSet;
use crate::sequencer::{FetchOutcome, RequestKey, RequestSequencer, Sequenced};
use shared::config::GridSection;
use shared::{
    ColumnDescriptor, ColumnKind, DatasetRef, FilterState, HighlightSegment, PageQuery, PageSlice,
    Record, RowId, classify_columns, highlight_segments, is_reserved_column, render_cell,
};
use std::collections::BTreeSet;
use std::rc::Rc;
use tracing::{debug, info, warn};

/// The page currently on screen.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GridPage {
    pub records: Vec<Record>,
    pub total: u64,
    pub page_number: u64,
    pub last_page: u64,
}

pub struct GridController<B> {
    backend: Rc<B>,
    sequencer: RequestSequencer,
    error_alert_relay: Relay<ErrorAlert>,
    page_size: u64,
    preview_size: u64,
    dataset: Mutable<Option<DatasetRef>>,
    columns: Mutable<Vec<ColumnDescriptor>>,
    hidden_columns: Mutable<Option<BTreeSet<String>>>,
    page: Mutable<GridPage>,
    status: Mutable<ViewStatus>,
    selection: Mutable<SelectionSet>,
    pinned: Mutable<bool>,
}

impl<B: Backend> GridController<B> {
    pub fn new(
        backend: Rc<B>,
        sequencer: RequestSequencer,
        error_alert_relay: Relay<ErrorAlert>,
        config: &GridSection,
    ) -> Self {
        Self {
            backend,
            sequencer,
            error_alert_relay,
            page_size: config.page_size.max(1),
            preview_size: config.preview_size.max(1),
            dataset: Mutable::new(None),
            columns: Mutable::new(Vec::new()),
            hidden_columns: Mutable::new(None),
            page: Mutable::new(GridPage::default()),
            status: Mutable::new(ViewStatus::Idle),
            selection: Mutable::new(SelectionSet::default()),
            pinned: Mutable::new(false),
        }
    }

    /// Drops every transient artifact and cancels the fetches in flight.
    pub fn reset(&self) {
        self.sequencer.cancel(RequestKey::GridPreview);
        self.sequencer.cancel(RequestKey::GridPage);
        self.dataset.set(None);
        self.columns.set(Vec::new());
        self.hidden_columns.set(None);
        self.page.set(GridPage::default());
        self.status.set(ViewStatus::Idle);
        self.selection.set(SelectionSet::default());
        self.pinned.set(false);
    }

    /// Starts a dataset: classifies columns from a preview page, then shows
    /// page 1 unless a page fetch was issued while the preview was loading.
    pub async fn load(&self, dataset: &DatasetRef, state: &FilterState) -> FetchOutcome {
        self.reset();
        self.dataset.set(Some(dataset.clone()));
        self.status.set(ViewStatus::Loading);

        let preview = PageQuery::preview(state, self.preview_size);
        let slice = match self
            .request(RequestKey::GridPreview, &dataset.data_url, preview)
            .await
        {
            Sequenced::Superseded => return FetchOutcome::Discarded,
            Sequenced::Current(Err(error)) => return self.fail(error),
            Sequenced::Current(Ok(slice)) => slice,
        };
        let columns = classify_columns(&slice.records);
        info!(
            dataset = %dataset.filename,
            columns = columns.len(),
            timestamps = columns.iter().filter(|c| c.kind == ColumnKind::Timestamp).count(),
            "columns classified"
        );
        self.columns.set(columns);

        // A page requested meanwhile carries newer filters or a newer page than `state`.
        if self.page.lock_ref().page_number > 0 || self.sequencer.is_in_flight(RequestKey::GridPage) {
            debug!("page already requested during preview, keeping it");
            return FetchOutcome::Applied;
        }
        self.fetch_page(1, state).await
    }

    /// Fetches `page_number` under the standing filters and puts it on screen.
    pub async fn fetch_page(&self, page_number: u64, state: &FilterState) -> FetchOutcome {
        if self.pinned.get() {
            debug!(page_number, "grid pinned to selection, page fetch skipped");
            return FetchOutcome::Discarded;
        }
        let Some(data_url) = self.dataset.lock_ref().as_ref().map(|d| d.data_url.clone()) else {
            return FetchOutcome::Discarded;
        };

        let query = PageQuery::from_state(state, page_number, self.page_size);
        self.status.set(ViewStatus::Loading);
        match self.request(RequestKey::GridPage, &data_url, query.clone()).await {
            Sequenced::Superseded => FetchOutcome::Discarded,
            Sequenced::Current(Err(error)) => self.fail(error),
            Sequenced::Current(Ok(slice)) => {
                let total = if slice.records.is_empty() { 0 } else { slice.total };
                debug!(page = query.page, records = slice.records.len(), total, "page applied");
                self.page.set(GridPage {
                    records: slice.records,
                    total,
                    page_number: query.page,
                    last_page: slice.last_page,
                });
                self.status.set(ViewStatus::Ready);
                FetchOutcome::Applied
            }
        }
    }

    /// Page navigation clamped to the known page range.
    pub async fn go_to_page(&self, page_number: u64, state: &FilterState) -> FetchOutcome {
        let last_page = self.page.lock_ref().last_page.max(1);
        self.fetch_page(page_number.clamp(1, last_page), state).await
    }

    async fn request(
        &self,
        key: RequestKey,
        data_url: &str,
        query: PageQuery,
    ) -> Sequenced<Result<PageSlice, EngineError>> {
        let backend = Rc::clone(&self.backend);
        self.sequencer
            .fetch_latest(key, async move {
                let response = backend.fetch_page(data_url, &query).await?;
                response.normalize(&query).map_err(EngineError::Backend)
            })
            .await
    }

    fn fail(&self, error: EngineError) -> FetchOutcome {
        let alert = ErrorAlert::new_request_error("grid", &error);
        log_alert(&alert);
        self.status.set(match error {
            EngineError::Backend(message) => ViewStatus::Rejected(message),
            other => ViewStatus::Failed(other.raw_message()),
        });
        self.error_alert_relay.send(alert);
        FetchOutcome::Failed
    }

    /// Checks or unchecks a row of the current page. No request is made and
    /// the selection survives page changes.
    pub fn on_row_selection_toggled(&self, row_id: RowId, selected: bool) -> bool {
        if !selected {
            return self.selection.lock_mut().remove(row_id);
        }
        let record = self
            .page
            .lock_ref()
            .records
            .iter()
            .find(|record| record.row_id == row_id)
            .cloned();
        match record {
            Some(record) => {
                self.selection.lock_mut().insert(record);
                true
            }
            None => {
                warn!(row_id, "selected row is not on the current page");
                false
            }
        }
    }

    /// Replaces the grid with `records` and stops paginating.
    pub fn pin(&self, records: Vec<Record>) {
        self.sequencer.cancel(RequestKey::GridPage);
        self.pinned.set(true);
        self.page.set(GridPage {
            total: records.len() as u64,
            records,
            page_number: 1,
            last_page: 1,
        });
        self.status.set(ViewStatus::Ready);
    }

    /// Resumes pagination and forgets the selection.
    pub fn unpin(&self) {
        self.pinned.set(false);
        self.selection.set(SelectionSet::default());
    }

    /// Hides every column that is empty on the current page, or restores all
    /// of them. Returns whether empty columns are now hidden.
    pub fn toggle_empty_columns(&self) -> bool {
        if self.hidden_columns.lock_ref().is_some() {
            self.hidden_columns.set(None);
            return false;
        }

        let page = self.page.lock_ref();
        if page.records.is_empty() {
            return false;
        }
        let hidden: BTreeSet<String> = self
            .columns
            .lock_ref()
            .iter()
            .filter(|column| column.kind != ColumnKind::Identifier && !is_reserved_column(&column.name))
            .filter(|column| {
                page.records
                    .iter()
                    .all(|record| record.get(&column.name).is_none_or(|value| value.is_blank()))
            })
            .map(|column| column.name.clone())
            .collect();
        drop(page);

        debug!(hidden = hidden.len(), "hiding empty columns");
        self.hidden_columns.set(Some(hidden));
        true
    }

    /// Columns to draw, in their original order.
    pub fn visible_columns(&self) -> Vec<ColumnDescriptor> {
        let hidden = self.hidden_columns.lock_ref();
        self.columns
            .lock_ref()
            .iter()
            .filter(|column| hidden.as_ref().is_none_or(|hidden| !hidden.contains(&column.name)))
            .cloned()
            .collect()
    }

    pub fn columns(&self) -> Vec<ColumnDescriptor> {
        self.columns.get_cloned()
    }

    pub fn page(&self) -> GridPage {
        self.page.get_cloned()
    }

    pub fn page_signal(&self) -> impl Signal<Item = GridPage> {
        self.page.signal_cloned()
    }

    pub fn status(&self) -> ViewStatus {
        self.status.get_cloned()
    }

    pub fn status_signal(&self) -> impl Signal<Item = ViewStatus> {
        self.status.signal_cloned()
    }

    pub fn selection(&self) -> SelectionSet {
        self.selection.get_cloned()
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned.get()
    }

    pub fn record_count_label(&self) -> String {
        format!("Total Records: {}", self.page.lock_ref().total)
    }
}

/// Display text of one cell.
pub fn cell_text(record: &Record, column: &ColumnDescriptor) -> String {
    if column.kind == ColumnKind::Identifier {
        return record.row_id.to_string();
    }
    render_cell(column, record.get(&column.name))
}

/// Display text of one cell split around matches of the search query.
pub fn cell_segments(record: &Record, column: &ColumnDescriptor, query: &str) -> Vec<HighlightSegment> {
    highlight_segments(&cell_text(record, column), query)
}
