use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Column name -> filter text. Only non-blank filters are ever stored.
pub type ColumnFilters = BTreeMap<String, String>;

/// Inclusive time bounds as entered by the user (sent to the backend verbatim).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TimeRange {
    pub start: String,
    pub end: String,
}

impl TimeRange {
    /// Both bounds are required; blank input yields `None`.
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Option<Self> {
        let start = start.into().trim().to_string();
        let end = end.into().trim().to_string();
        if start.is_empty() || end.is_empty() {
            return None;
        }
        Some(Self { start, end })
    }
}

/// The five filter dimensions plus the identity of the loaded dataset.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct FilterState {
    pub dataset_id: Option<String>,
    pub search_query: String,
    pub time_range: Option<TimeRange>,
    pub column_filters: ColumnFilters,
    pub excluded_series_id: Option<String>,
    pub selection_view: bool,
}

impl FilterState {
    /// Fresh state for a newly loaded dataset.
    pub fn for_dataset(dataset_id: impl Into<String>) -> Self {
        Self {
            dataset_id: Some(dataset_id.into()),
            ..Self::default()
        }
    }

    /// Merges `update` into this state, reporting which parts changed.
    pub fn apply(&mut self, update: FilterUpdate) -> FilterChange {
        let mut change = FilterChange::default();

        if let Some(query) = update.search_query {
            let query = query.trim().to_string();
            if query != self.search_query {
                self.search_query = query;
                change.fetch_inputs = true;
            }
        }
        if let Some(time_range) = update.time_range {
            if time_range != self.time_range {
                self.time_range = time_range;
                change.fetch_inputs = true;
            }
        }
        for (column, text) in update.column_edits {
            let changed = if text.trim().is_empty() {
                self.column_filters.remove(&column).is_some()
            } else {
                self.column_filters.insert(column, text.clone()).as_deref() != Some(text.as_str())
            };
            change.fetch_inputs |= changed;
        }
        if let Some(excluded) = update.excluded_series_id {
            if excluded != self.excluded_series_id {
                self.excluded_series_id = excluded;
                change.exclusion = true;
            }
        }
        if let Some(selection_view) = update.selection_view {
            if selection_view != self.selection_view {
                self.selection_view = selection_view;
                change.selection_view = true;
            }
        }
        change
    }

    /// Column filters as they go on the wire; suspended in selection view.
    pub fn effective_column_filters(&self) -> Option<&ColumnFilters> {
        (!self.selection_view && !self.column_filters.is_empty()).then_some(&self.column_filters)
    }

    /// Time bounds as they go on the wire; suspended in selection view.
    pub fn effective_time_range(&self) -> Option<&TimeRange> {
        if self.selection_view {
            None
        } else {
            self.time_range.as_ref()
        }
    }

    pub fn search(&self) -> Option<&str> {
        (!self.search_query.is_empty()).then_some(self.search_query.as_str())
    }
}

/// Which parts of a [`FilterState`] an update touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FilterChange {
    /// Search text, time range or column filters changed.
    pub fetch_inputs: bool,
    pub exclusion: bool,
    pub selection_view: bool,
}

impl FilterChange {
    pub fn any(&self) -> bool {
        self.fetch_inputs || self.exclusion || self.selection_view
    }
}

/// Partial update merged by [`FilterState::apply`]. Unset fields are left alone.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterUpdate {
    pub search_query: Option<String>,
    pub time_range: Option<Option<TimeRange>>,
    /// Blank text removes the column's filter.
    pub column_edits: Vec<(String, String)>,
    pub excluded_series_id: Option<Option<String>>,
    pub selection_view: Option<bool>,
}

impl FilterUpdate {
    pub fn search(mut self, query: impl Into<String>) -> Self {
        self.search_query = Some(query.into());
        self
    }

    pub fn time_range(mut self, time_range: Option<TimeRange>) -> Self {
        self.time_range = Some(time_range);
        self
    }

    pub fn column_filter(mut self, column: impl Into<String>, text: impl Into<String>) -> Self {
        self.column_edits.push((column.into(), text.into()));
        self
    }

    pub fn excluded_series(mut self, series_id: Option<String>) -> Self {
        self.excluded_series_id = Some(series_id);
        self
    }

    pub fn selection_view(mut self, enabled: bool) -> Self {
        self.selection_view = Some(enabled);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_column_filter_removes_key() {
        let mut state = FilterState::for_dataset("report.csv");
        state.apply(FilterUpdate::default().column_filter("EventID", "4624"));
        assert_eq!(state.column_filters.get("EventID").map(String::as_str), Some("4624"));

        let change = state.apply(FilterUpdate::default().column_filter("EventID", "  "));
        assert!(change.fetch_inputs);
        assert!(state.column_filters.is_empty());
    }

    #[test]
    fn unchanged_values_report_no_change() {
        let mut state = FilterState::for_dataset("report.csv");
        state.apply(FilterUpdate::default().search("powershell"));
        let change = state.apply(FilterUpdate::default().search(" powershell "));
        assert!(!change.any());
    }

    #[test]
    fn selection_view_suspends_time_and_column_filters() {
        let mut state = FilterState::for_dataset("report.csv");
        state.apply(
            FilterUpdate::default()
                .time_range(TimeRange::new("2024-01-01 00:00", "2024-01-02 00:00"))
                .column_filter("User", "admin")
                .selection_view(true),
        );
        assert!(state.effective_time_range().is_none());
        assert!(state.effective_column_filters().is_none());

        state.apply(FilterUpdate::default().selection_view(false));
        assert!(state.effective_time_range().is_some());
        assert_eq!(state.effective_column_filters().map(|f| f.len()), Some(1));
    }

    #[test]
    fn time_range_requires_both_bounds() {
        assert!(TimeRange::new("2024-01-01", "").is_none());
        assert!(TimeRange::new(" ", "2024-01-01").is_none());
        assert!(TimeRange::new("2024-01-01", "2024-01-02").is_some());
    }

    #[test]
    fn exclusion_change_is_tracked_separately() {
        let mut state = FilterState::for_dataset("report.csv");
        let change = state.apply(FilterUpdate::default().excluded_series(Some("4624".into())));
        assert!(change.exclusion);
        assert!(!change.fetch_inputs);
    }
}
