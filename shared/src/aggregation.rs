//! Aggregated activity series and their presentation-side annotations.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::warn;

// ===== WIRE SHAPE =====

#[derive(Deserialize, Debug, Clone)]
pub struct AggregationPayload {
    pub labels: Vec<String>,
    pub datasets: Vec<WireDataset>,
    #[serde(default)]
    pub interpretation: Option<String>,
    #[serde(default)]
    pub stats: Option<WireViewStats>,
    #[serde(default)]
    pub global_stats: Option<WireGlobalStats>,
    #[serde(default)]
    pub noise_info: Option<WireNoiseInfo>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct WireDataset {
    pub label: String,
    #[serde(default)]
    pub data: Vec<Option<f64>>,
    #[serde(default, rename = "type")]
    pub chart_type: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct WireViewStats {
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub total_events: Option<u64>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct WireGlobalStats {
    #[serde(default)]
    pub mean_bucket: Option<f64>,
    #[serde(default)]
    pub max_bucket: Option<f64>,
    #[serde(default)]
    pub total_events: Option<u64>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct WireNoiseInfo {
    #[serde(default)]
    pub top_talker_id: Option<serde_json::Value>,
    #[serde(default)]
    pub percent: Option<f64>,
}

// ===== CANONICAL SERIES =====

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeriesKind {
    Bar,
    Line,
    Point,
}

impl SeriesKind {
    fn from_chart_type(chart_type: Option<&str>) -> Self {
        match chart_type.map(str::to_ascii_lowercase).as_deref() {
            Some("line") => SeriesKind::Line,
            Some("scatter" | "bubble" | "point") => SeriesKind::Point,
            _ => SeriesKind::Bar,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Series {
    pub name: String,
    pub kind: SeriesKind,
    /// Exactly one value per label; missing buckets are zero.
    pub values: Vec<f64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GlobalStats {
    pub mean: f64,
    pub max: f64,
    pub total_events: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NoiseInfo {
    pub top_series_id: String,
    pub percent_share: f64,
}

impl NoiseInfo {
    /// Strictly above the threshold; a share equal to it is not noise.
    pub fn exceeds(&self, threshold_percent: f64) -> bool {
        self.percent_share > threshold_percent
    }
}

/// Bounds and volume of the currently filtered view.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct ViewStats {
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub total_events: u64,
}

impl ViewStats {
    pub fn describe(&self) -> String {
        match (&self.start_time, &self.end_time) {
            (Some(start), Some(end)) => format!(
                "Time Range: {start} to {end} ({} events)",
                self.total_events
            ),
            _ => "Time Range: N/A".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AggregationSeries {
    pub labels: Vec<String>,
    pub series: Vec<Series>,
    pub global_stats: Option<GlobalStats>,
    pub noise_info: Option<NoiseInfo>,
    pub view_stats: Option<ViewStats>,
    pub interpretation: String,
}

impl From<AggregationPayload> for AggregationSeries {
    fn from(payload: AggregationPayload) -> Self {
        let bucket_count = payload.labels.len();
        let series = payload
            .datasets
            .into_iter()
            .map(|dataset| {
                if dataset.data.len() != bucket_count {
                    warn!(
                        series = %dataset.label,
                        values = dataset.data.len(),
                        buckets = bucket_count,
                        "series length differs from bucket count, aligning"
                    );
                }
                let mut values: Vec<f64> = dataset
                    .data
                    .into_iter()
                    .map(|value| value.filter(|v| v.is_finite()).unwrap_or(0.0))
                    .collect();
                values.resize(bucket_count, 0.0);
                Series {
                    kind: SeriesKind::from_chart_type(dataset.chart_type.as_deref()),
                    name: dataset.label,
                    values,
                }
            })
            .collect();

        let view_stats = payload.stats.map(|stats| ViewStats {
            start_time: stats.start_time,
            end_time: stats.end_time,
            total_events: stats.total_events.unwrap_or(0),
        });

        let global_stats = payload.global_stats.and_then(|stats| {
            Some(GlobalStats {
                mean: stats.mean_bucket?,
                max: stats.max_bucket?,
                total_events: stats
                    .total_events
                    .or(view_stats.as_ref().map(|view| view.total_events))
                    .unwrap_or(0),
            })
        });

        let noise_info = payload.noise_info.and_then(|noise| {
            let top_series_id = match noise.top_talker_id? {
                serde_json::Value::String(id) => id,
                serde_json::Value::Null => return None,
                other => other.to_string(),
            };
            Some(NoiseInfo {
                top_series_id,
                percent_share: noise.percent.unwrap_or(0.0),
            })
        });

        Self {
            labels: payload.labels,
            series,
            global_stats,
            noise_info,
            view_stats,
            interpretation: payload.interpretation.unwrap_or_default(),
        }
    }
}

// ===== PEAKS =====

/// Buckets whose total activity is close to the busiest bucket.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct PeakOverlay {
    pub totals: Vec<f64>,
    pub threshold: f64,
    pub peaks: Vec<bool>,
}

impl PeakOverlay {
    /// Marks every non-zero bucket at or above `ratio` of the maximum total.
    pub fn from_totals(totals: Vec<f64>, ratio: f64) -> Self {
        let max = totals.iter().copied().fold(0.0_f64, f64::max);
        let threshold = max * ratio;
        let peaks = totals
            .iter()
            .map(|&total| total > 0.0 && total >= threshold)
            .collect();
        Self {
            totals,
            threshold,
            peaks,
        }
    }

    pub fn peak_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.peaks
            .iter()
            .enumerate()
            .filter_map(|(index, &peak)| peak.then_some(index))
    }
}

/// Sums every visible non-line series per bucket and marks the peaks.
pub fn mark_peaks(series: &AggregationSeries, hidden: &BTreeSet<String>, ratio: f64) -> PeakOverlay {
    let mut totals = vec![0.0; series.labels.len()];
    // Anomaly markers repeat the bar total at flagged buckets and are summed
    // along with the bars, as the stacked chart draws them.
    for entry in series
        .series
        .iter()
        .filter(|entry| entry.kind != SeriesKind::Line && !hidden.contains(&entry.name))
    {
        for (total, value) in totals.iter_mut().zip(&entry.values) {
            *total += value;
        }
    }
    PeakOverlay::from_totals(totals, ratio)
}

// ===== CHART MODEL =====

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AxisScale {
    #[default]
    Linear,
    Logarithmic,
}

impl AxisScale {
    /// Plotted coordinate of `value`; `None` leaves a gap.
    pub fn project(self, value: f64) -> Option<f64> {
        match self {
            AxisScale::Linear => Some(value),
            AxisScale::Logarithmic if value > 0.0 => Some(value.log10()),
            AxisScale::Logarithmic => None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ChartSeries {
    pub name: String,
    pub kind: SeriesKind,
    pub hidden: bool,
    pub points: Vec<Option<f64>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ReferenceLine {
    pub label: String,
    pub value: Option<f64>,
}

/// Render-ready projection of a cached [`AggregationSeries`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ChartModel {
    pub labels: Vec<String>,
    pub scale: AxisScale,
    pub series: Vec<ChartSeries>,
    pub peaks: PeakOverlay,
    pub reference_lines: Vec<ReferenceLine>,
    pub interpretation: String,
}

impl ChartModel {
    pub fn build(
        aggregation: &AggregationSeries,
        scale: AxisScale,
        hidden: &BTreeSet<String>,
        peak_ratio: f64,
    ) -> Self {
        let series = aggregation
            .series
            .iter()
            .map(|entry| ChartSeries {
                name: entry.name.clone(),
                kind: entry.kind,
                hidden: hidden.contains(&entry.name),
                points: entry
                    .values
                    .iter()
                    .map(|&value| match entry.kind {
                        // Marker series use zero for "no marker in this bucket".
                        SeriesKind::Point if value == 0.0 => None,
                        _ => scale.project(value),
                    })
                    .collect(),
            })
            .collect();

        let reference_lines = aggregation
            .global_stats
            .iter()
            .flat_map(|stats| {
                [
                    ReferenceLine {
                        label: format!("Global mean ({:.1})", stats.mean),
                        value: scale.project(stats.mean),
                    },
                    ReferenceLine {
                        label: format!("Global max ({:.0})", stats.max),
                        value: scale.project(stats.max),
                    },
                ]
            })
            .collect();

        Self {
            labels: aggregation.labels.clone(),
            scale,
            series,
            peaks: mark_peaks(aggregation, hidden, peak_ratio),
            reference_lines,
            interpretation: aggregation.interpretation.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::AggregationResponse;

    const PAYLOAD: &str = r#"{
        "labels": ["10:00", "10:05", "10:10", "10:15"],
        "datasets": [
            {"label": "Actividad", "data": [10, 30, 60, 20], "stack": "Stack 0"},
            {"label": "Alta Actividad", "data": [0, 50, 40]},
            {"label": "Tendencia", "data": [10, 40, 70, 30], "type": "line"},
            {"label": "Anomaly (> 2σ)", "data": [null, null, 100, null], "type": "scatter"}
        ],
        "interpretation": "Analysis: Peak activity at 10:10 (100 events).",
        "stats": {"start_time": "2024-01-01T10:00:00", "end_time": "2024-01-01T10:15:00", "total_events": 210},
        "global_stats": {"mean_bucket": 52.5, "max_bucket": 100, "total_events": 900},
        "noise_info": {"top_talker_id": 4624, "percent": 41.2}
    }"#;

    fn aggregation() -> AggregationSeries {
        match AggregationResponse::from_json(PAYLOAD).unwrap() {
            AggregationResponse::Series(payload) => payload.into(),
            AggregationResponse::Failed { error } => panic!("unexpected error payload: {error}"),
        }
    }

    #[test]
    fn normalization_aligns_every_series_to_labels() {
        let aggregation = aggregation();
        for series in &aggregation.series {
            assert_eq!(series.values.len(), aggregation.labels.len(), "{}", series.name);
        }
        assert_eq!(aggregation.series[1].values, vec![0.0, 50.0, 40.0, 0.0]);
        assert_eq!(aggregation.series[3].values, vec![0.0, 0.0, 100.0, 0.0]);
        assert_eq!(aggregation.series[2].kind, SeriesKind::Line);
        assert_eq!(aggregation.series[3].kind, SeriesKind::Point);
    }

    #[test]
    fn stats_and_noise_are_extracted() {
        let aggregation = aggregation();
        assert_eq!(
            aggregation.global_stats,
            Some(GlobalStats { mean: 52.5, max: 100.0, total_events: 900 })
        );
        let noise = aggregation.noise_info.unwrap();
        assert_eq!(noise.top_series_id, "4624");
        assert!(noise.exceeds(40.0));
        assert_eq!(aggregation.view_stats.unwrap().total_events, 210);
    }

    #[test]
    fn noise_threshold_is_strict() {
        let noise = NoiseInfo { top_series_id: "4624".into(), percent_share: 40.0 };
        assert!(!noise.exceeds(40.0));
    }

    #[test]
    fn backend_error_body_is_its_own_variant() {
        let response = AggregationResponse::from_json(r#"{"error": "No valid IDs provided"}"#).unwrap();
        assert!(matches!(response, AggregationResponse::Failed { error } if error == "No valid IDs provided"));
    }

    #[test]
    fn peaks_from_example_totals() {
        let overlay = PeakOverlay::from_totals(vec![10.0, 80.0, 100.0, 20.0], 0.8);
        assert_eq!(overlay.threshold, 80.0);
        assert_eq!(overlay.peak_indices().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn all_zero_totals_have_no_peaks() {
        let overlay = PeakOverlay::from_totals(vec![0.0, 0.0, 0.0], 0.8);
        assert_eq!(overlay.peak_indices().count(), 0);
    }

    #[test]
    fn peak_totals_skip_line_and_hidden_series() {
        let aggregation = aggregation();
        let overlay = mark_peaks(&aggregation, &BTreeSet::new(), 0.8);
        assert_eq!(overlay.totals, vec![10.0, 80.0, 200.0, 20.0]);

        let hidden: BTreeSet<String> = ["Anomaly (> 2σ)".to_string()].into();
        let overlay = mark_peaks(&aggregation, &hidden, 0.8);
        assert_eq!(overlay.totals, vec![10.0, 80.0, 100.0, 20.0]);
        assert_eq!(overlay.peak_indices().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn log_scale_leaves_gaps_for_non_positive_values() {
        let aggregation = aggregation();
        let model = ChartModel::build(&aggregation, AxisScale::Logarithmic, &BTreeSet::new(), 0.8);
        assert_eq!(model.series[1].points[0], None);
        assert_eq!(model.series[0].points[0], Some(1.0));
        assert_eq!(model.series[3].points, vec![None, None, Some(2.0), None]);
        assert_eq!(model.reference_lines.len(), 2);
    }
}
