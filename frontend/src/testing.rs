//! In-memory backend for engine tests.

use crate::error::EngineError;
use crate::platform::{Backend, ExportPayload};
use futures::channel::oneshot;
use indexmap::IndexMap;
use serde_json::json;
use shared::{
    AggregationResponse, CellValue, DatasetRef, ExportRequest, FileCategory, HistogramQuery,
    PageQuery, PageResponse, Record, RecordCount, SubsetRequest,
};
use std::cell::RefCell;
use std::collections::VecDeque;

/// Row `row_id` of the test dataset.
///
/// Columns: `TimeCreated` (epoch seconds), `EventID`, `User`, and `Notes`,
/// which is empty in every row.
pub fn record(row_id: u64) -> Record {
    let mut values = IndexMap::new();
    values.insert(
        "TimeCreated".to_string(),
        CellValue::Number(1_700_000_000.0 + row_id as f64 * 60.0),
    );
    let event_id = if row_id % 3 == 0 { "4688" } else { "4624" };
    values.insert("EventID".to_string(), CellValue::Text(event_id.to_string()));
    let user = if row_id % 2 == 1 { "CORP\\Administrator" } else { "CORP\\svc_backup" };
    values.insert("User".to_string(), CellValue::Text(user.to_string()));
    values.insert("Notes".to_string(), CellValue::Null);
    Record::new(row_id, values)
}

pub fn dataset_ref() -> DatasetRef {
    DatasetRef {
        data_url: "/api/data/Report_1.csv".to_string(),
        filename: "Report_1.csv".to_string(),
        record_count: RecordCount::Unknown,
        category: FileCategory::Forensic,
    }
}

/// Aggregation body with one bucket per label, two bar series, a trend line
/// and a noise block naming `4624` with the given share.
pub fn aggregation_json(labels: &[&str], noise_percent: f64) -> String {
    let buckets = labels.len();
    json!({
        "labels": labels,
        "datasets": [
            {"label": "4624", "data": vec![4; buckets], "type": "bar"},
            {"label": "4688", "data": vec![2; buckets], "type": "bar"},
            {"label": "Trend", "data": vec![3; buckets], "type": "line"},
        ],
        "interpretation": "Activity is steady across the window.",
        "stats": {
            "start_time": "2023-11-14 22:00",
            "end_time": "2023-11-14 23:00",
            "total_events": 6,
        },
        "global_stats": {"mean_bucket": 6.0, "max_bucket": 6.0},
        "noise_info": {"top_talker_id": "4624", "percent": noise_percent},
    })
    .to_string()
}

/// Holds back one histogram response until released.
pub struct HistogramGate {
    sender: oneshot::Sender<String>,
}

impl HistogramGate {
    pub fn release(self, body: impl Into<String>) {
        let _ = self.sender.send(body.into());
    }
}

/// Holds back one page response until released.
pub struct PageGate {
    sender: oneshot::Sender<()>,
}

impl PageGate {
    pub fn release(self) {
        let _ = self.sender.send(());
    }
}

pub struct MockBackend {
    rows: Vec<Record>,
    page_gates: RefCell<VecDeque<oneshot::Receiver<()>>>,
    histogram_json: RefCell<String>,
    histogram_gates: RefCell<VecDeque<oneshot::Receiver<String>>>,
    page_failure: RefCell<Option<EngineError>>,
    histogram_failure: RefCell<Option<EngineError>>,
    export_content_type: RefCell<Option<String>>,
    page_calls: RefCell<Vec<PageQuery>>,
    histogram_calls: RefCell<Vec<HistogramQuery>>,
    subset_calls: RefCell<Vec<SubsetRequest>>,
    export_calls: RefCell<Vec<ExportRequest>>,
}

impl MockBackend {
    /// Dataset of rows `1..=count`.
    pub fn with_rows(count: u64) -> Self {
        Self {
            rows: (1..=count).map(record).collect(),
            page_gates: RefCell::new(VecDeque::new()),
            histogram_json: RefCell::new(aggregation_json(&["22:00", "22:30", "23:00"], 25.0)),
            histogram_gates: RefCell::new(VecDeque::new()),
            page_failure: RefCell::new(None),
            histogram_failure: RefCell::new(None),
            export_content_type: RefCell::new(None),
            page_calls: RefCell::new(Vec::new()),
            histogram_calls: RefCell::new(Vec::new()),
            subset_calls: RefCell::new(Vec::new()),
            export_calls: RefCell::new(Vec::new()),
        }
    }

    pub fn set_histogram_json(&self, body: &str) {
        self.histogram_json.replace(body.to_string());
        self.histogram_failure.take();
    }

    /// The next page call (preview or regular) waits for the returned gate.
    pub fn gate_next_page(&self) -> PageGate {
        let (sender, receiver) = oneshot::channel();
        self.page_gates.borrow_mut().push_back(receiver);
        PageGate { sender }
    }

    /// The next histogram call (full or subset) waits for the returned gate.
    pub fn gate_next_histogram(&self) -> HistogramGate {
        let (sender, receiver) = oneshot::channel();
        self.histogram_gates.borrow_mut().push_back(receiver);
        HistogramGate { sender }
    }

    pub fn fail_pages_with(&self, error: EngineError) {
        self.page_failure.replace(Some(error));
    }

    pub fn fail_histograms_with(&self, error: EngineError) {
        self.histogram_failure.replace(Some(error));
    }

    pub fn set_export_content_type(&self, content_type: &str) {
        self.export_content_type.replace(Some(content_type.to_string()));
    }

    pub fn page_calls(&self) -> Vec<PageQuery> {
        self.page_calls.borrow().clone()
    }

    pub fn histogram_calls(&self) -> Vec<HistogramQuery> {
        self.histogram_calls.borrow().clone()
    }

    pub fn subset_calls(&self) -> Vec<SubsetRequest> {
        self.subset_calls.borrow().clone()
    }

    pub fn export_calls(&self) -> Vec<ExportRequest> {
        self.export_calls.borrow().clone()
    }

    fn matches(record: &Record, query: &PageQuery) -> bool {
        let contains = |value: &CellValue, needle: &str| {
            value.to_string().to_lowercase().contains(&needle.to_lowercase())
        };
        let search_hit = query
            .query
            .as_deref()
            .is_none_or(|needle| record.values.values().any(|value| contains(value, needle)));
        let columns_hit = query.col_filters.as_ref().is_none_or(|filters| {
            filters.iter().all(|(column, needle)| {
                record.get(column).is_some_and(|value| contains(value, needle))
            })
        });
        search_hit && columns_hit
    }

    async fn aggregation(&self) -> Result<AggregationResponse, EngineError> {
        if let Some(error) = self.histogram_failure.borrow().clone() {
            return Err(error);
        }
        let gate = self.histogram_gates.borrow_mut().pop_front();
        let body = match gate {
            Some(receiver) => receiver
                .await
                .map_err(|_| EngineError::transport("gate dropped"))?,
            None => self.histogram_json.borrow().clone(),
        };
        Ok(AggregationResponse::from_json(&body)?)
    }
}

impl Backend for MockBackend {
    async fn fetch_page(&self, _data_url: &str, query: &PageQuery) -> Result<PageResponse, EngineError> {
        self.page_calls.borrow_mut().push(query.clone());
        let gate = self.page_gates.borrow_mut().pop_front();
        if let Some(receiver) = gate {
            receiver
                .await
                .map_err(|_| EngineError::transport("gate dropped"))?;
        }
        if let Some(error) = self.page_failure.borrow().clone() {
            return Err(error);
        }
        let matching: Vec<&Record> = self
            .rows
            .iter()
            .filter(|record| Self::matches(record, query))
            .collect();
        let start = ((query.page - 1) * query.size) as usize;
        let data = matching
            .iter()
            .skip(start)
            .take(query.size as usize)
            .map(|record| (*record).clone())
            .collect();
        Ok(PageResponse::Counted {
            data,
            total: matching.len() as u64,
        })
    }

    async fn fetch_histogram(&self, query: &HistogramQuery) -> Result<AggregationResponse, EngineError> {
        self.histogram_calls.borrow_mut().push(query.clone());
        self.aggregation().await
    }

    async fn fetch_subset_histogram(
        &self,
        request: &SubsetRequest,
    ) -> Result<AggregationResponse, EngineError> {
        self.subset_calls.borrow_mut().push(request.clone());
        self.aggregation().await
    }

    async fn export(&self, request: &ExportRequest) -> Result<ExportPayload, EngineError> {
        self.export_calls.borrow_mut().push(request.clone());
        Ok(ExportPayload {
            content_type: self.export_content_type.borrow().clone(),
            bytes: b"EventID,User\n4624,admin\n".to_vec(),
        })
    }
}
