//! Wire types and pure domain logic shared by the timeline viewer engine.
//!
//! Nothing in this crate performs I/O. Request builders produce URLs and
//! bodies, response types normalize whatever shape the backend sends into
//! one canonical form, and the classification / annotation helpers are plain
//! functions over those types.

pub mod aggregation;
pub mod classify;
pub mod config;
pub mod error;
pub mod export;
pub mod filter;
pub mod record;
pub mod wire;

pub use aggregation::{
    AggregationSeries, AxisScale, ChartModel, ChartSeries, GlobalStats, NoiseInfo, PeakOverlay,
    ReferenceLine, Series, SeriesKind, ViewStats, mark_peaks,
};
pub use classify::{
    ColumnDescriptor, ColumnKind, FormatterKind, HighlightSegment, classify_columns,
    highlight_segments, is_reserved_column, render_cell,
};
pub use config::EngineConfig;
pub use error::WireError;
pub use export::{ExportFormat, ExportRequest, export_file_name, resolve_export_extension};
pub use filter::{ColumnFilters, FilterChange, FilterState, FilterUpdate, TimeRange};
pub use record::{CellValue, Record, RowId};
pub use wire::{
    AggregationResponse, DatasetRef, FileCategory, HistogramQuery, PageQuery, PageResponse,
    PageSlice, RecordCount, SubsetRequest, UploadResponse,
};

// ===== RESERVED COLUMN NAMES =====

/// Synthetic row identifier assigned by the backend.
pub const ROW_ID_COLUMN: &str = "_id";
/// Display alias of the row identifier column.
pub const ROW_NUMBER_COLUMN: &str = "No.";
/// Selection checkbox column.
pub const ROW_TAG_COLUMN: &str = "Tag";
