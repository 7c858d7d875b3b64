//! Request builders and response normalization for the dataset endpoints.
//!
//! The backend is loose about response shapes (bare arrays, `{data, total}`,
//! `{last_page, data}`, `{error}` bodies with a success status). Every shape
//! is accepted here and immediately normalized into one canonical type.

use crate::aggregation::AggregationPayload;
use crate::error::WireError;
use crate::filter::{ColumnFilters, FilterState};
use crate::record::{Record, RowId};
use serde::{Deserialize, Serialize};

// ===== PAGE FETCH =====

#[derive(Debug, Clone, PartialEq)]
pub struct PageQuery {
    pub page: u64,
    pub size: u64,
    pub query: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub col_filters: Option<ColumnFilters>,
}

impl PageQuery {
    /// Page request carrying every standing filter of `state`.
    pub fn from_state(state: &FilterState, page: u64, size: u64) -> Self {
        let time_range = state.effective_time_range();
        Self {
            page: page.max(1),
            size: size.max(1),
            query: state.search().map(str::to_string),
            start_time: time_range.map(|range| range.start.clone()),
            end_time: time_range.map(|range| range.end.clone()),
            col_filters: state.effective_column_filters().cloned(),
        }
    }

    /// Preview request used for column classification; only the search applies.
    pub fn preview(state: &FilterState, size: u64) -> Self {
        Self {
            page: 1,
            size: size.max(1),
            query: state.search().map(str::to_string),
            start_time: None,
            end_time: None,
            col_filters: None,
        }
    }

    pub fn to_url(&self, data_url: &str) -> String {
        let mut url = format!("{data_url}?page={}&size={}", self.page, self.size);
        push_filter_params(
            &mut url,
            self.query.as_deref(),
            self.start_time.as_deref(),
            self.end_time.as_deref(),
            self.col_filters.as_ref(),
        );
        url
    }
}

/// Raw page payload in any of the shapes the backend produces.
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum PageResponse {
    Failed {
        error: String,
    },
    Counted {
        data: Vec<Record>,
        total: u64,
    },
    Paged {
        #[serde(alias = "lastPage")]
        last_page: u64,
        data: Vec<Record>,
    },
    Bare(Vec<Record>),
}

/// Canonical page of records.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageSlice {
    pub records: Vec<Record>,
    pub total: u64,
    pub last_page: u64,
}

impl PageResponse {
    pub fn from_json(body: &str) -> Result<Self, WireError> {
        Ok(serde_json::from_str(body)?)
    }

    /// Normalizes into a [`PageSlice`] for the page that was requested.
    ///
    /// Backend-reported errors come back as `Err(message)`.
    pub fn normalize(self, requested: &PageQuery) -> Result<PageSlice, String> {
        let size = requested.size.max(1);
        match self {
            PageResponse::Failed { error } => Err(error),
            PageResponse::Counted { data, total } => Ok(PageSlice {
                records: data,
                total,
                last_page: total.div_ceil(size),
            }),
            PageResponse::Paged { last_page, data } => {
                // Total is not reported; estimate from the pages that precede this one.
                let total = if requested.page >= last_page {
                    last_page.saturating_sub(1) * size + data.len() as u64
                } else {
                    last_page * size
                };
                Ok(PageSlice {
                    records: data,
                    total,
                    last_page,
                })
            }
            PageResponse::Bare(data) => {
                let total = data.len() as u64;
                Ok(PageSlice {
                    records: data,
                    total,
                    last_page: u64::from(total > 0),
                })
            }
        }
    }
}

// ===== AGGREGATION FETCH =====

#[derive(Debug, Clone, PartialEq)]
pub struct HistogramQuery {
    pub filename: String,
    pub exclude_id: Option<String>,
    pub query: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub col_filters: Option<ColumnFilters>,
}

impl HistogramQuery {
    /// Full-scope aggregation request for the standing filters of `state`.
    pub fn from_state(filename: &str, state: &FilterState) -> Self {
        let time_range = state.effective_time_range();
        Self {
            filename: filename.to_string(),
            exclude_id: state.excluded_series_id.clone(),
            query: state.search().map(str::to_string),
            start_time: time_range.map(|range| range.start.clone()),
            end_time: time_range.map(|range| range.end.clone()),
            col_filters: state.effective_column_filters().cloned(),
        }
    }

    pub fn to_url(&self, histogram_base: &str) -> String {
        let mut url = format!(
            "{}/{}",
            histogram_base.trim_end_matches('/'),
            urlencoding::encode(&self.filename)
        );
        let mut params = String::new();
        if let Some(exclude_id) = &self.exclude_id {
            params.push_str(&format!("&exclude_id={}", urlencoding::encode(exclude_id)));
        }
        push_filter_params(
            &mut params,
            self.query.as_deref(),
            self.start_time.as_deref(),
            self.end_time.as_deref(),
            self.col_filters.as_ref(),
        );
        if let Some(rest) = params.strip_prefix('&') {
            url.push('?');
            url.push_str(rest);
        }
        url
    }
}

/// Body of the subset-scoped aggregation request.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SubsetRequest {
    pub filename: String,
    pub selected_ids: Vec<RowId>,
}

impl SubsetRequest {
    /// Ids are sent in ascending row order regardless of selection order.
    pub fn new(filename: &str, ids: impl IntoIterator<Item = RowId>) -> Self {
        let mut selected_ids: Vec<RowId> = ids.into_iter().collect();
        selected_ids.sort_unstable();
        selected_ids.dedup();
        Self {
            filename: filename.to_string(),
            selected_ids,
        }
    }
}

/// Raw aggregation payload: either a series bundle or a backend-reported error.
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum AggregationResponse {
    Failed { error: String },
    Series(AggregationPayload),
}

impl AggregationResponse {
    pub fn from_json(body: &str) -> Result<Self, WireError> {
        Ok(serde_json::from_str(body)?)
    }
}

fn push_filter_params(
    url: &mut String,
    query: Option<&str>,
    start_time: Option<&str>,
    end_time: Option<&str>,
    col_filters: Option<&ColumnFilters>,
) {
    if let Some(query) = query {
        url.push_str(&format!("&query={}", urlencoding::encode(query)));
    }
    if let Some(start_time) = start_time {
        url.push_str(&format!("&start_time={}", urlencoding::encode(start_time)));
    }
    if let Some(end_time) = end_time {
        url.push_str(&format!("&end_time={}", urlencoding::encode(end_time)));
    }
    if let Some(col_filters) = col_filters.filter(|filters| !filters.is_empty()) {
        // A string-keyed map always serializes.
        let json = serde_json::to_string(col_filters).unwrap_or_default();
        url.push_str(&format!("&col_filters={}", urlencoding::encode(&json)));
    }
}

// ===== DATASET LOAD =====

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    Forensic,
    #[default]
    #[serde(other)]
    Generic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordCount {
    Known(u64),
    Unknown,
}

/// Handle of a parsed dataset the engine can page and aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetRef {
    pub data_url: String,
    pub filename: String,
    pub record_count: RecordCount,
    pub category: FileCategory,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum UploadResponse {
    Failed {
        error: String,
    },
    Loaded {
        #[serde(default)]
        status: Option<String>,
        data_url: String,
        csv_filename: String,
        #[serde(default)]
        processed_records: Option<serde_json::Value>,
        #[serde(default)]
        file_category: FileCategory,
    },
}

impl UploadResponse {
    pub fn from_json(body: &str) -> Result<Self, WireError> {
        Ok(serde_json::from_str(body)?)
    }

    /// The loadable dataset, or the backend's message verbatim.
    pub fn into_dataset(self) -> Result<DatasetRef, String> {
        match self {
            UploadResponse::Failed { error } => Err(error),
            UploadResponse::Loaded { status, .. }
                if status.as_deref().is_some_and(|status| status != "success") =>
            {
                Err(format!("upload finished with status `{}`", status.unwrap_or_default()))
            }
            UploadResponse::Loaded {
                data_url,
                csv_filename,
                processed_records,
                file_category,
                ..
            } => {
                let record_count = match processed_records {
                    Some(serde_json::Value::Number(count)) => {
                        count.as_u64().map_or(RecordCount::Unknown, RecordCount::Known)
                    }
                    Some(serde_json::Value::String(count)) => count
                        .trim()
                        .parse()
                        .map_or(RecordCount::Unknown, RecordCount::Known),
                    _ => RecordCount::Unknown,
                };
                Ok(DatasetRef {
                    data_url,
                    filename: csv_filename,
                    record_count,
                    category: file_category,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{FilterUpdate, TimeRange};

    fn state() -> FilterState {
        let mut state = FilterState::for_dataset("Report_1.csv");
        state.apply(
            FilterUpdate::default()
                .search("cmd exe")
                .time_range(TimeRange::new("2024-01-01 00:00", "2024-01-02 00:00"))
                .column_filter("EventID", "4624"),
        );
        state
    }

    #[test]
    fn page_url_encodes_every_filter() {
        let url = PageQuery::from_state(&state(), 2, 500).to_url("/api/data/Report_1.csv");
        assert_eq!(
            url,
            "/api/data/Report_1.csv?page=2&size=500&query=cmd%20exe\
             &start_time=2024-01-01%2000%3A00&end_time=2024-01-02%2000%3A00\
             &col_filters=%7B%22EventID%22%3A%224624%22%7D"
        );
    }

    #[test]
    fn histogram_url_without_filters_has_no_query_string() {
        let state = FilterState::for_dataset("Report_1.csv");
        let url = HistogramQuery::from_state("Report_1.csv", &state).to_url("/api/histogram/");
        assert_eq!(url, "/api/histogram/Report_1.csv");
    }

    #[test]
    fn histogram_url_carries_exclusion_first() {
        let mut state = state();
        state.apply(FilterUpdate::default().excluded_series(Some("4624".into())));
        let url = HistogramQuery::from_state("Report_1.csv", &state).to_url("/api/histogram");
        assert!(url.starts_with("/api/histogram/Report_1.csv?exclude_id=4624&query=cmd%20exe"));
    }

    #[test]
    fn selection_view_drops_time_and_column_filters_from_requests() {
        let mut state = state();
        state.apply(FilterUpdate::default().selection_view(true));
        let query = PageQuery::from_state(&state, 1, 50);
        assert!(query.start_time.is_none());
        assert!(query.col_filters.is_none());
        assert_eq!(query.query.as_deref(), Some("cmd exe"));
    }

    #[test]
    fn page_shapes_normalize_to_one_slice() {
        let query = PageQuery::from_state(&FilterState::default(), 1, 2);

        let counted = PageResponse::from_json(r#"{"data": [{"_id": 1}], "total": 5, "last_page": 3}"#)
            .unwrap()
            .normalize(&query)
            .unwrap();
        assert_eq!((counted.total, counted.last_page, counted.records.len()), (5, 3, 1));

        let paged = PageResponse::from_json(r#"{"lastPage": 3, "data": [{"_id": 1}, {"_id": 2}]}"#)
            .unwrap()
            .normalize(&query)
            .unwrap();
        assert_eq!((paged.total, paged.last_page), (6, 3));

        let bare = PageResponse::from_json(r#"[{"_id": 1}]"#)
            .unwrap()
            .normalize(&query)
            .unwrap();
        assert_eq!((bare.total, bare.last_page), (1, 1));

        let empty = PageResponse::from_json(r#"{"data": [], "total": 0}"#)
            .unwrap()
            .normalize(&query)
            .unwrap();
        assert_eq!((empty.total, empty.last_page), (0, 0));
    }

    #[test]
    fn paged_total_is_exact_on_last_page() {
        let query = PageQuery::from_state(&FilterState::default(), 3, 2);
        let slice = PageResponse::from_json(r#"{"last_page": 3, "data": [{"_id": 5}]}"#)
            .unwrap()
            .normalize(&query)
            .unwrap();
        assert_eq!(slice.total, 5);
    }

    #[test]
    fn page_error_body_is_reported_verbatim() {
        let query = PageQuery::from_state(&FilterState::default(), 1, 50);
        let result = PageResponse::from_json(r#"{"error": "File not found"}"#)
            .unwrap()
            .normalize(&query);
        assert_eq!(result, Err("File not found".to_string()));
    }

    #[test]
    fn subset_ids_are_sorted_ascending() {
        let request = SubsetRequest::new("Report_1.csv", [30, 4, 12, 4]);
        assert_eq!(request.selected_ids, vec![4, 12, 30]);
    }

    #[test]
    fn upload_response_variants() {
        let forensic = UploadResponse::from_json(
            r#"{"status": "success", "processed_records": 1200, "data_url": "/api/data/a.csv",
                "csv_filename": "a.csv", "file_category": "forensic"}"#,
        )
        .unwrap()
        .into_dataset()
        .unwrap();
        assert_eq!(forensic.record_count, RecordCount::Known(1200));
        assert_eq!(forensic.category, FileCategory::Forensic);

        let generic = UploadResponse::from_json(
            r#"{"status": "success", "processed_records": "N/A", "data_url": "/api/data/b.csv",
                "csv_filename": "b.csv", "file_category": "generic"}"#,
        )
        .unwrap()
        .into_dataset()
        .unwrap();
        assert_eq!(generic.record_count, RecordCount::Unknown);

        let failed = UploadResponse::from_json(r#"{"error": "Unsupported artifact: foo"}"#)
            .unwrap()
            .into_dataset();
        assert_eq!(failed, Err("Unsupported artifact: foo".to_string()));
    }
}
