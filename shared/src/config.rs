use crate::error::WireError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables of the viewer engine. Every field has a default, so a TOML
/// document only needs the keys it wants to override.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub endpoints: EndpointSection,
    pub grid: GridSection,
    pub debounce: DebounceSection,
    pub histogram: HistogramSection,
    pub export: ExportSection,
}

impl EngineConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, WireError> {
        toml::from_str(source).map_err(|error| WireError::Config(error.to_string()))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct EndpointSection {
    pub histogram_base: String,
    pub subset: String,
    pub export_filtered: String,
    pub export_split: String,
}

impl Default for EndpointSection {
    fn default() -> Self {
        Self {
            histogram_base: "/api/histogram".to_string(),
            subset: "/api/histogram_subset".to_string(),
            export_filtered: "/api/export_filtered".to_string(),
            export_split: "/api/export_split".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct GridSection {
    pub page_size: u64,
    pub preview_size: u64,
}

impl Default for GridSection {
    fn default() -> Self {
        Self {
            page_size: 500,
            preview_size: 50,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct DebounceSection {
    pub search_ms: u64,
    pub column_filter_ms: u64,
}

impl DebounceSection {
    pub fn search(&self) -> Duration {
        Duration::from_millis(self.search_ms)
    }

    pub fn column_filter(&self) -> Duration {
        Duration::from_millis(self.column_filter_ms)
    }
}

impl Default for DebounceSection {
    fn default() -> Self {
        Self {
            search_ms: 850,
            column_filter_ms: 800,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct HistogramSection {
    pub noise_threshold_percent: f64,
    pub peak_ratio: f64,
}

impl Default for HistogramSection {
    fn default() -> Self {
        Self {
            noise_threshold_percent: 40.0,
            peak_ratio: 0.8,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ExportSection {
    pub basename: String,
}

impl Default for ExportSection {
    fn default() -> Self {
        Self {
            basename: "timeline_export".to_string(),
        }
    }
}
