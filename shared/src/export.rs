use crate::filter::{ColumnFilters, FilterState};
use crate::record::RowId;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Xlsx,
    Zip,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Zip => "zip",
        }
    }
}

/// Body of both export endpoints. Absent time bounds are sent as empty strings.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ExportRequest {
    pub filename: String,
    pub format: ExportFormat,
    pub query: String,
    pub start_time: String,
    pub end_time: String,
    pub col_filters: ColumnFilters,
    pub ai_optimized: bool,
    /// Restricts the export to these rows; empty means every matching row.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub selected_ids: Vec<RowId>,
}

impl ExportRequest {
    pub fn from_state(
        filename: &str,
        state: &FilterState,
        format: ExportFormat,
        ai_optimized: bool,
    ) -> Self {
        // Standing filters go out even in selection view; only page and
        // aggregation requests suspend them.
        let time_range = state.time_range.as_ref();
        Self {
            filename: filename.to_string(),
            format,
            query: state.search_query.clone(),
            start_time: time_range.map(|range| range.start.clone()).unwrap_or_default(),
            end_time: time_range.map(|range| range.end.clone()).unwrap_or_default(),
            col_filters: state.column_filters.clone(),
            ai_optimized,
            selected_ids: Vec::new(),
        }
    }

    /// Limits the export to `ids`, sent in ascending row order.
    pub fn with_selection(mut self, ids: impl IntoIterator<Item = RowId>) -> Self {
        self.selected_ids = ids.into_iter().collect();
        self.selected_ids.sort_unstable();
        self.selected_ids.dedup();
        self
    }

    /// Split (multi-file) exports go to their own endpoint.
    pub fn uses_split_endpoint(&self) -> bool {
        self.format == ExportFormat::Zip && !self.ai_optimized
    }
}

/// Extension the downloaded file gets, trusting the response content type
/// over the requested format.
pub fn resolve_export_extension(content_type: Option<&str>, requested: ExportFormat) -> &'static str {
    let Some(content_type) = content_type else {
        return requested.extension();
    };
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match mime.as_str() {
        "application/zip" | "application/x-zip-compressed" | "application/x-zip" => "zip",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        | "application/vnd.ms-excel" => "xlsx",
        "text/csv" | "application/csv" | "text/plain" => "csv",
        _ => requested.extension(),
    }
}

pub fn export_file_name(basename: &str, content_type: Option<&str>, requested: ExportFormat) -> String {
    format!("{basename}.{}", resolve_export_extension(content_type, requested))
}
