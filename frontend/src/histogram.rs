//! Time-bucketed aggregation shown above the grid.

use crate::dataflow::{Mutable, Relay, Signal};
use crate::error::EngineError;
use crate::error_display::{ErrorAlert, ViewStatus, log_alert};
use crate::platform::Backend;
use crate::sequencer::{FetchOutcome, RequestKey, RequestSequencer, Sequenced};
use shared::config::HistogramSection;
use shared::{
    AggregationResponse, AggregationSeries, AxisScale, ChartModel, FilterState, HistogramQuery,
    PeakOverlay, SubsetRequest, mark_peaks,
};
use std::collections::BTreeSet;
use std::rc::Rc;
use tracing::{debug, info};

/// The "hide the dominant series" control, when it should be offered.
#[derive(Debug, Clone, PartialEq)]
pub struct NoiseToggle {
    pub series_id: String,
    pub percent_share: Option<f64>,
    /// The series is currently excluded from the aggregation.
    pub active: bool,
}

impl NoiseToggle {
    pub fn label(&self) -> String {
        if self.active {
            format!("Show {} again", self.series_id)
        } else {
            match self.percent_share {
                Some(share) => format!("Hide noise: {} ({share:.1}%)", self.series_id),
                None => format!("Hide noise: {}", self.series_id),
            }
        }
    }
}

pub struct HistogramController<B> {
    backend: Rc<B>,
    sequencer: RequestSequencer,
    error_alert_relay: Relay<ErrorAlert>,
    noise_threshold_percent: f64,
    peak_ratio: f64,
    series: Mutable<Option<AggregationSeries>>,
    status: Mutable<ViewStatus>,
    scale: Mutable<AxisScale>,
    hidden_series: Mutable<BTreeSet<String>>,
}

impl<B: Backend> HistogramController<B> {
    pub fn new(
        backend: Rc<B>,
        sequencer: RequestSequencer,
        error_alert_relay: Relay<ErrorAlert>,
        config: &HistogramSection,
    ) -> Self {
        Self {
            backend,
            sequencer,
            error_alert_relay,
            noise_threshold_percent: config.noise_threshold_percent,
            peak_ratio: config.peak_ratio,
            series: Mutable::new(None),
            status: Mutable::new(ViewStatus::Idle),
            scale: Mutable::new(AxisScale::Linear),
            hidden_series: Mutable::new(BTreeSet::new()),
        }
    }

    pub fn reset(&self) {
        self.sequencer.cancel(RequestKey::Histogram);
        self.series.set(None);
        self.status.set(ViewStatus::Idle);
        self.scale.set(AxisScale::Linear);
        self.hidden_series.set(BTreeSet::new());
    }

    /// Re-aggregates the full dataset under the standing filters.
    pub async fn refresh(&self, filename: &str, state: &FilterState) -> FetchOutcome {
        let query = HistogramQuery::from_state(filename, state);
        debug!(filename, exclude_id = ?query.exclude_id, "histogram refresh");
        let backend = Rc::clone(&self.backend);
        self.status.set(ViewStatus::Loading);
        let response = self
            .sequencer
            .fetch_latest(RequestKey::Histogram, async move {
                backend.fetch_histogram(&query).await
            })
            .await;
        self.apply(response)
    }

    /// Re-aggregates only the given rows. Shares the sequencing key with
    /// [`Self::refresh`], so whichever was issued last wins.
    pub async fn refresh_subset(&self, request: &SubsetRequest) -> FetchOutcome {
        debug!(rows = request.selected_ids.len(), "subset histogram refresh");
        let backend = Rc::clone(&self.backend);
        self.status.set(ViewStatus::Loading);
        let response = self
            .sequencer
            .fetch_latest(RequestKey::Histogram, async move {
                backend.fetch_subset_histogram(request).await
            })
            .await;
        self.apply(response)
    }

    fn apply(&self, response: Sequenced<Result<AggregationResponse, EngineError>>) -> FetchOutcome {
        match response {
            Sequenced::Superseded => FetchOutcome::Discarded,
            Sequenced::Current(Ok(AggregationResponse::Series(payload))) => {
                let series = AggregationSeries::from(payload);
                info!(
                    buckets = series.labels.len(),
                    series = series.series.len(),
                    "histogram applied"
                );
                self.series.set(Some(series));
                self.status.set(ViewStatus::Ready);
                FetchOutcome::Applied
            }
            Sequenced::Current(Ok(AggregationResponse::Failed { error })) => {
                // The chart no longer matches the filters, so it goes away.
                self.series.set(None);
                self.fail(EngineError::Backend(error))
            }
            Sequenced::Current(Err(error)) => self.fail(error),
        }
    }

    fn fail(&self, error: EngineError) -> FetchOutcome {
        let alert = ErrorAlert::new_request_error("histogram", &error);
        log_alert(&alert);
        self.status.set(match error {
            EngineError::Backend(message) => ViewStatus::Rejected(message),
            other => ViewStatus::Failed(other.raw_message()),
        });
        self.error_alert_relay.send(alert);
        FetchOutcome::Failed
    }

    /// Switches the value axis. Purely presentational; never fetches.
    pub fn set_scale(&self, scale: AxisScale) {
        if self.scale.get() != scale {
            debug!(?scale, "axis scale changed");
            self.scale.set(scale);
        }
    }

    pub fn scale(&self) -> AxisScale {
        self.scale.get()
    }

    /// Hides or shows a series in the legend sense; returns whether it is now hidden.
    pub fn toggle_series_hidden(&self, name: &str) -> bool {
        let mut hidden = self.hidden_series.lock_mut();
        if hidden.remove(name) {
            false
        } else {
            hidden.insert(name.to_string());
            true
        }
    }

    /// Drawable chart for the current series, if any.
    pub fn chart_model(&self) -> Option<ChartModel> {
        let series = self.series.lock_ref();
        let series = series.as_ref()?;
        Some(ChartModel::build(
            series,
            self.scale.get(),
            &self.hidden_series.lock_ref(),
            self.peak_ratio,
        ))
    }

    pub fn peaks(&self) -> Option<PeakOverlay> {
        let series = self.series.lock_ref();
        let series = series.as_ref()?;
        Some(mark_peaks(series, &self.hidden_series.lock_ref(), self.peak_ratio))
    }

    /// The noise control for the current aggregation.
    ///
    /// Offered while a series is excluded, so the exclusion can be undone, or
    /// when one series holds strictly more than the configured share.
    pub fn noise_toggle(&self, state: &FilterState) -> Option<NoiseToggle> {
        let series = self.series.lock_ref();
        let noise = series.as_ref().and_then(|series| series.noise_info.as_ref());

        if let Some(excluded) = &state.excluded_series_id {
            return Some(NoiseToggle {
                series_id: excluded.clone(),
                percent_share: None,
                active: true,
            });
        }
        let noise = noise.filter(|noise| noise.exceeds(self.noise_threshold_percent))?;
        Some(NoiseToggle {
            series_id: noise.top_series_id.clone(),
            percent_share: Some(noise.percent_share),
            active: false,
        })
    }

    /// Status line describing the span and volume of the filtered view.
    pub fn time_range_info(&self) -> String {
        self.series
            .lock_ref()
            .as_ref()
            .and_then(|series| series.view_stats.as_ref())
            .map(|stats| stats.describe())
            .unwrap_or_else(|| "Time Range: N/A".to_string())
    }

    pub fn interpretation(&self) -> Option<String> {
        self.series
            .lock_ref()
            .as_ref()
            .map(|series| series.interpretation.clone())
            .filter(|text| !text.is_empty())
    }

    pub fn series(&self) -> Option<AggregationSeries> {
        self.series.get_cloned()
    }

    pub fn series_signal(&self) -> impl Signal<Item = Option<AggregationSeries>> {
        self.series.signal_cloned()
    }

    pub fn status(&self) -> ViewStatus {
        self.status.get_cloned()
    }
}
