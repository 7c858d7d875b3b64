//! One loaded dataset and everything that keeps its grid and chart in step.
//!
//! `Session` owns the filter store and both controllers. Every user-facing
//! operation goes through it, so the rule "a filter edit refreshes both
//! surfaces" lives in one place.

use crate::dataflow::{Mutable, Relay, relay};
use crate::error::EngineError;
use crate::error_display::{ErrorAlert, log_alert};
use crate::filter_store::FilterStateStore;
use crate::grid::GridController;
use crate::histogram::HistogramController;
use crate::platform::Backend;
use crate::selection::{Refresh, SelectionSubsetter};
use crate::sequencer::{FetchOutcome, RequestSequencer};
use futures::channel::mpsc::UnboundedReceiver;
use shared::{
    AxisScale, DatasetRef, EngineConfig, ExportFormat, ExportRequest, FilterState, FilterUpdate,
    RowId, TimeRange, UploadResponse, export_file_name,
};
use std::rc::Rc;
use tracing::{debug, info};

/// A finished export, ready to be handed to the browser.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

pub struct Session<B> {
    config: EngineConfig,
    backend: Rc<B>,
    sequencer: RequestSequencer,
    error_alert_relay: Relay<ErrorAlert>,
    dataset: Mutable<Option<DatasetRef>>,
    filters: FilterStateStore,
    grid: GridController<B>,
    histogram: HistogramController<B>,
    subsetter: SelectionSubsetter,
}

impl<B: Backend> Session<B> {
    /// Builds an unloaded session. Alerts raised by any part of it arrive on
    /// the returned receiver.
    pub fn new(backend: B, config: EngineConfig) -> (Self, UnboundedReceiver<ErrorAlert>) {
        let backend = Rc::new(backend);
        let sequencer = RequestSequencer::new();
        let (error_alert_relay, alerts) = relay();
        let grid = GridController::new(
            Rc::clone(&backend),
            sequencer.clone(),
            error_alert_relay.clone(),
            &config.grid,
        );
        let histogram = HistogramController::new(
            Rc::clone(&backend),
            sequencer.clone(),
            error_alert_relay.clone(),
            &config.histogram,
        );
        let session = Self {
            filters: FilterStateStore::new(&config.debounce),
            config,
            backend,
            sequencer,
            error_alert_relay,
            dataset: Mutable::new(None),
            grid,
            histogram,
            subsetter: SelectionSubsetter::new(),
        };
        (session, alerts)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn dataset(&self) -> Option<DatasetRef> {
        self.dataset.get_cloned()
    }

    pub fn filters(&self) -> &FilterStateStore {
        &self.filters
    }

    pub fn grid(&self) -> &GridController<B> {
        &self.grid
    }

    pub fn histogram(&self) -> &HistogramController<B> {
        &self.histogram
    }

    pub fn in_selection_view(&self) -> bool {
        self.subsetter.is_active()
    }

    fn filename(&self) -> Result<String, EngineError> {
        self.dataset
            .lock_ref()
            .as_ref()
            .map(|dataset| dataset.filename.clone())
            .ok_or(EngineError::NoDataset)
    }

    fn reject(&self, error: EngineError) -> EngineError {
        let alert = ErrorAlert::new_validation_error(error.raw_message());
        log_alert(&alert);
        self.error_alert_relay.send(alert);
        error
    }

    // ===== DATASET LIFECYCLE =====

    /// Loads the dataset an upload produced. A failed upload shows the
    /// backend message as is and leaves the session untouched.
    pub async fn load_dataset(&self, upload: UploadResponse) -> Result<Refresh, EngineError> {
        match upload.into_dataset() {
            Ok(dataset) => Ok(self.load(dataset).await),
            Err(message) => {
                let alert = ErrorAlert::new_dataset_load_error(message.clone());
                log_alert(&alert);
                self.error_alert_relay.send(alert);
                Err(EngineError::Backend(message))
            }
        }
    }

    /// Starts over on `dataset`: fresh filters, empty selection, no chart,
    /// then the first page and the full aggregation side by side.
    pub async fn load(&self, dataset: DatasetRef) -> Refresh {
        self.reset();
        info!(
            dataset = %dataset.filename,
            records = ?dataset.record_count,
            category = ?dataset.category,
            "loading dataset"
        );
        let state = self.filters.reset(Some(&dataset.filename));
        self.dataset.set(Some(dataset.clone()));

        let (grid, histogram) = futures::join!(
            self.grid.load(&dataset, &state),
            self.histogram.refresh(&dataset.filename, &state)
        );
        Refresh { grid, histogram }
    }

    /// Forgets the dataset and cancels everything pending.
    pub fn reset(&self) {
        self.sequencer.cancel_all();
        self.filters.reset(None);
        self.subsetter.reset();
        self.grid.reset();
        self.histogram.reset();
        self.dataset.set(None);
    }

    /// Page 1 and the aggregation for `state`. Nothing is fetched while the
    /// grid is pinned to a selection; the edit is picked up on exit.
    async fn refresh_all(&self, state: &FilterState) -> Refresh {
        let Ok(filename) = self.filename() else {
            return Refresh::discarded();
        };
        if state.selection_view {
            debug!("selection view active, filter edit deferred");
            return Refresh::discarded();
        }
        let (grid, histogram) = futures::join!(
            self.grid.fetch_page(1, state),
            self.histogram.refresh(&filename, state)
        );
        Refresh { grid, histogram }
    }

    // ===== FILTER EDITS =====

    /// Search box keystroke. Resolves to `None` when a later keystroke took
    /// over before the quiet period ended.
    pub async fn on_search_edited(&self, text: impl Into<String>) -> Option<Refresh> {
        let state = self.filters.edit_search(text).await?;
        Some(self.refresh_all(&state).await)
    }

    /// Column header filter keystroke; blank text clears that column's filter.
    pub async fn on_column_filter_edited(
        &self,
        column: impl Into<String>,
        text: impl Into<String>,
    ) -> Option<Refresh> {
        let state = self.filters.edit_column_filter(column, text).await?;
        Some(self.refresh_all(&state).await)
    }

    pub async fn apply_time_range(
        &self,
        start: impl Into<String>,
        end: impl Into<String>,
    ) -> Result<Refresh, EngineError> {
        let Some(range) = TimeRange::new(start, end) else {
            return Err(self.reject(EngineError::Validation(
                "Please provide both start and end time.".to_string(),
            )));
        };
        self.filename().map_err(|error| self.reject(error))?;
        let state = self.filters.set(FilterUpdate::default().time_range(Some(range)));
        Ok(self.refresh_all(&state).await)
    }

    pub async fn clear_time_range(&self) -> Refresh {
        let state = self.filters.set(FilterUpdate::default().time_range(None));
        self.refresh_all(&state).await
    }

    /// Excludes the dominant series, or brings it back. Only the chart is
    /// refreshed since exclusion never affects the grid. `None` when no
    /// toggle is on offer.
    pub async fn toggle_noise_exclusion(&self) -> Option<FetchOutcome> {
        let filename = self.filename().ok()?;
        let toggle = self.histogram.noise_toggle(&self.filters.get())?;
        let excluded = (!toggle.active).then(|| toggle.series_id.clone());
        info!(series = %toggle.series_id, excluded = excluded.is_some(), "noise exclusion toggled");

        let state = self.filters.set(FilterUpdate::default().excluded_series(excluded));
        if state.selection_view {
            return Some(FetchOutcome::Discarded);
        }
        Some(self.histogram.refresh(&filename, &state).await)
    }

    // ===== SELECTION =====

    pub fn on_row_selection_toggled(&self, row_id: RowId, selected: bool) -> bool {
        self.grid.on_row_selection_toggled(row_id, selected)
    }

    pub async fn enter_selection_view(&self) -> Result<FetchOutcome, EngineError> {
        let filename = self.filename().map_err(|error| self.reject(error))?;
        self.subsetter
            .enter_selection_view(&filename, &self.filters, &self.grid, &self.histogram)
            .await
            .map_err(|error| self.reject(error))
    }

    /// `None` when the grid was not in selection view.
    pub async fn exit_selection_view(&self) -> Option<Refresh> {
        if !self.subsetter.is_active() {
            return None;
        }
        let filename = self.filename().ok()?;
        Some(
            self.subsetter
                .exit_selection_view(&filename, &self.filters, &self.grid, &self.histogram)
                .await,
        )
    }

    // ===== PRESENTATION =====

    pub async fn go_to_page(&self, page_number: u64) -> FetchOutcome {
        self.grid.go_to_page(page_number, &self.filters.get()).await
    }

    pub fn set_log_scale(&self, enabled: bool) {
        self.histogram.set_scale(if enabled {
            AxisScale::Logarithmic
        } else {
            AxisScale::Linear
        });
    }

    pub fn toggle_series_hidden(&self, name: &str) -> bool {
        self.histogram.toggle_series_hidden(name)
    }

    pub fn toggle_empty_columns(&self) -> bool {
        self.grid.toggle_empty_columns()
    }

    // ===== EXPORT =====

    /// Exports the filtered view, narrowed to the pinned rows while in
    /// selection view. The file name follows what the backend actually sent,
    /// not what was asked for.
    pub async fn export(&self, format: ExportFormat, ai_optimized: bool) -> Result<ExportedFile, EngineError> {
        let filename = self.filename().map_err(|error| self.reject(error))?;
        let mut request = ExportRequest::from_state(&filename, &self.filters.get(), format, ai_optimized);
        if self.subsetter.is_active() {
            request = request.with_selection(self.grid.selection().row_ids());
        }
        info!(
            %filename,
            ?format,
            ai_optimized,
            selected = request.selected_ids.len(),
            split = request.uses_split_endpoint(),
            "export requested"
        );

        match self.backend.export(&request).await {
            Ok(payload) => {
                let file = ExportedFile {
                    file_name: export_file_name(
                        &self.config.export.basename,
                        payload.content_type.as_deref(),
                        format,
                    ),
                    content_type: payload.content_type,
                    bytes: payload.bytes,
                };
                let alert = ErrorAlert::new_export_ready(&file.file_name);
                log_alert(&alert);
                self.error_alert_relay.send(alert);
                Ok(file)
            }
            Err(error) => {
                let alert = ErrorAlert::new_request_error("export", &error);
                log_alert(&alert);
                self.error_alert_relay.send(alert);
                Err(error)
            }
        }
    }
}
