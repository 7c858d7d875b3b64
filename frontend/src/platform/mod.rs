//! Boundary between the engine and the outside world: the dataset backend
//! and timers.
//!
//! The browser build talks HTTP through [`web::HttpBackend`] and sleeps on
//! `gloo-timers`; native builds (tests, tooling) provide their own
//! [`Backend`] and sleep on tokio's clock.

use crate::error::EngineError;
use shared::{AggregationResponse, ExportRequest, HistogramQuery, PageQuery, PageResponse, SubsetRequest};
use std::time::Duration;

#[cfg(target_arch = "wasm32")]
pub mod web;

/// Binary export stream as delivered by the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportPayload {
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Capability provider for the paginated-data, aggregation and export
/// endpoints. Implementations return the decoded payload; normalization
/// happens in the controllers.
pub trait Backend {
    async fn fetch_page(&self, data_url: &str, query: &PageQuery) -> Result<PageResponse, EngineError>;

    async fn fetch_histogram(&self, query: &HistogramQuery) -> Result<AggregationResponse, EngineError>;

    async fn fetch_subset_histogram(
        &self,
        request: &SubsetRequest,
    ) -> Result<AggregationResponse, EngineError>;

    async fn export(&self, request: &ExportRequest) -> Result<ExportPayload, EngineError>;
}

#[cfg(target_arch = "wasm32")]
pub async fn sleep(duration: Duration) {
    let millis = u32::try_from(duration.as_millis()).unwrap_or(u32::MAX);
    gloo_timers::future::TimeoutFuture::new(millis).await;
}

#[cfg(not(target_arch = "wasm32"))]
pub async fn sleep(duration: Duration) {
    tokio::time::sleep(duration).await;
}
