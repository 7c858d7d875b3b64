use crate::error::EngineError;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{error, warn};

/// Notification variant for styling different types of toasts
#[derive(Debug, Clone, PartialEq, Copy, Default)]
pub enum NotificationVariant {
    #[default]
    Error,
    Info,
    Success,
}

/// Status line of a controller's render surface (grid status area, chart
/// interpretation area).
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ViewStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    /// Transport failure; the previous render is left in place.
    Failed(String),
    /// Backend-reported error; the previous render has been torn down.
    Rejected(String),
}

impl ViewStatus {
    pub fn is_error(&self) -> bool {
        matches!(self, ViewStatus::Failed(_) | ViewStatus::Rejected(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ErrorAlert {
    pub id: String,
    pub title: String,
    /// Shown to the user; always contains the raw backend message when there is one.
    pub message: String,
    pub technical_error: String,
    pub auto_dismiss_ms: u64,
    pub variant: NotificationVariant,
}

static ALERT_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_alert_id(prefix: &str) -> String {
    format!("{prefix}_{}", ALERT_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
}

impl ErrorAlert {
    pub fn new_dataset_load_error(error: String) -> Self {
        Self {
            id: next_alert_id("dataset_error"),
            title: "Dataset Load Error".to_string(),
            technical_error: format!("Dataset load failed: {error}"),
            message: error,
            auto_dismiss_ms: 0,
            variant: NotificationVariant::Error,
        }
    }

    pub fn new_validation_error(message: String) -> Self {
        Self {
            id: next_alert_id("validation"),
            title: "Invalid Input".to_string(),
            technical_error: format!("Validation: {message}"),
            message,
            auto_dismiss_ms: 4000,
            variant: NotificationVariant::Info,
        }
    }

    /// Alert for a failed request of `surface` ("grid", "histogram", "export").
    pub fn new_request_error(surface: &str, error: &EngineError) -> Self {
        let title = match error {
            EngineError::Backend(_) => "Server Reported an Error",
            EngineError::Decode(_) => "Unexpected Server Response",
            _ => "Request Failed",
        };
        Self {
            id: next_alert_id(&format!("{surface}_error")),
            title: title.to_string(),
            message: error.raw_message(),
            technical_error: format!("{surface} request failed: {error:?}"),
            auto_dismiss_ms: 5000,
            variant: NotificationVariant::Error,
        }
    }

    pub fn new_export_ready(file_name: &str) -> Self {
        Self {
            id: next_alert_id("export_ready"),
            title: "Export Ready".to_string(),
            message: file_name.to_string(),
            technical_error: format!("Export downloaded as {file_name}"),
            auto_dismiss_ms: 3000,
            variant: NotificationVariant::Success,
        }
    }
}

/// Logs the technical side of an alert without showing anything.
pub fn log_alert(alert: &ErrorAlert) {
    match alert.variant {
        NotificationVariant::Error => error!(id = %alert.id, "{}", alert.technical_error),
        NotificationVariant::Info | NotificationVariant::Success => {
            warn!(id = %alert.id, "{}", alert.technical_error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_alert_carries_raw_backend_message() {
        let alert = ErrorAlert::new_request_error(
            "histogram",
            &EngineError::Backend("No matching rows found".to_string()),
        );
        assert_eq!(alert.message, "No matching rows found");
        assert_eq!(alert.title, "Server Reported an Error");
        assert!(alert.id.starts_with("histogram_error_"));
    }

    #[test]
    fn transport_alert_includes_status() {
        let alert = ErrorAlert::new_request_error(
            "grid",
            &EngineError::http_status(500, "File not found"),
        );
        assert_eq!(alert.message, "HTTP 500: File not found");
    }

    #[test]
    fn alert_ids_are_unique() {
        let first = ErrorAlert::new_validation_error("x".into());
        let second = ErrorAlert::new_validation_error("x".into());
        assert_ne!(first.id, second.id);
    }
}
