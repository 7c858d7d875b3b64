//! Browser backend: `fetch` against the viewer's HTTP endpoints.
//!
//! Dropping one of these futures does not stop the browser request, but its
//! result is never read, which is all the sequencer needs.

use crate::error::EngineError;
use crate::platform::{Backend, ExportPayload};
use crate::session::ExportedFile;
use serde::Serialize;
use shared::config::EndpointSection;
use shared::{AggregationResponse, ExportRequest, HistogramQuery, PageQuery, PageResponse, SubsetRequest};
use tracing::debug;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{Blob, BlobPropertyBag, HtmlAnchorElement, Request, RequestInit, Response, Url};

pub struct HttpBackend {
    endpoints: EndpointSection,
}

impl HttpBackend {
    pub fn new(endpoints: EndpointSection) -> Self {
        Self { endpoints }
    }

    async fn get(&self, url: &str) -> Result<String, EngineError> {
        debug!(%url, "GET");
        let request = Request::new_with_str(url).map_err(js_error)?;
        let response = send(request).await?;
        body_text(&response).await
    }

    async fn post<T: Serialize>(&self, url: &str, body: &T) -> Result<Response, EngineError> {
        debug!(%url, "POST");
        let json = serde_json::to_string(body).map_err(|error| EngineError::Decode(error.to_string()))?;
        let init = RequestInit::new();
        init.set_method("POST");
        init.set_body(&JsValue::from_str(&json));
        let request = Request::new_with_str_and_init(url, &init).map_err(js_error)?;
        request
            .headers()
            .set("Content-Type", "application/json")
            .map_err(js_error)?;
        send(request).await
    }
}

impl Backend for HttpBackend {
    async fn fetch_page(&self, data_url: &str, query: &PageQuery) -> Result<PageResponse, EngineError> {
        let body = self.get(&query.to_url(data_url)).await?;
        Ok(PageResponse::from_json(&body)?)
    }

    async fn fetch_histogram(&self, query: &HistogramQuery) -> Result<AggregationResponse, EngineError> {
        let body = self.get(&query.to_url(&self.endpoints.histogram_base)).await?;
        Ok(AggregationResponse::from_json(&body)?)
    }

    async fn fetch_subset_histogram(
        &self,
        request: &SubsetRequest,
    ) -> Result<AggregationResponse, EngineError> {
        let response = self.post(&self.endpoints.subset, request).await?;
        let body = body_text(&response).await?;
        Ok(AggregationResponse::from_json(&body)?)
    }

    async fn export(&self, request: &ExportRequest) -> Result<ExportPayload, EngineError> {
        let endpoint = if request.uses_split_endpoint() {
            &self.endpoints.export_split
        } else {
            &self.endpoints.export_filtered
        };
        let response = self.post(endpoint, request).await?;
        let content_type = response.headers().get("content-type").map_err(js_error)?;
        let buffer = JsFuture::from(response.array_buffer().map_err(js_error)?)
            .await
            .map_err(js_error)?;
        Ok(ExportPayload {
            content_type,
            bytes: js_sys::Uint8Array::new(&buffer).to_vec(),
        })
    }
}

/// Hands an exported file to the browser's download machinery.
pub fn save_download(file: &ExportedFile) -> Result<(), EngineError> {
    let parts = js_sys::Array::new();
    parts.push(&js_sys::Uint8Array::from(file.bytes.as_slice()));
    let options = BlobPropertyBag::new();
    if let Some(content_type) = &file.content_type {
        options.set_type(content_type);
    }
    let blob = Blob::new_with_u8_array_sequence_and_options(&parts, &options).map_err(js_error)?;
    let url = Url::create_object_url_with_blob(&blob).map_err(js_error)?;

    let document = web_sys::window()
        .and_then(|window| window.document())
        .ok_or_else(|| EngineError::transport("no document to attach the download to"))?;
    let anchor: HtmlAnchorElement = document
        .create_element("a")
        .map_err(js_error)?
        .dyn_into()
        .map_err(js_error)?;
    anchor.set_href(&url);
    anchor.set_download(&file.file_name);
    anchor.click();
    Url::revoke_object_url(&url).map_err(js_error)
}

async fn send(request: Request) -> Result<Response, EngineError> {
    let window = web_sys::window().ok_or_else(|| EngineError::transport("no window"))?;
    let response: Response = JsFuture::from(window.fetch_with_request(&request))
        .await
        .map_err(js_error)?
        .dyn_into()
        .map_err(js_error)?;
    if response.ok() {
        return Ok(response);
    }
    // Error bodies usually carry `{"error": "..."}`; surface that message.
    let body = body_text(&response).await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|value| value.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or_else(|| response.status_text());
    Err(EngineError::http_status(response.status(), message))
}

async fn body_text(response: &Response) -> Result<String, EngineError> {
    let text = JsFuture::from(response.text().map_err(js_error)?)
        .await
        .map_err(js_error)?;
    Ok(text.as_string().unwrap_or_default())
}

fn js_error(value: impl Into<JsValue>) -> EngineError {
    let value = value.into();
    EngineError::transport(
        value
            .as_string()
            .unwrap_or_else(|| format!("{value:?}")),
    )
}
