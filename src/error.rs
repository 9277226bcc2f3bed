use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Invalid capture request: {0}")]
    InvalidRequest(String),

    #[error("Browser acquisition failed: {0}")]
    EngineAcquisition(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Capture failed: {0}")]
    Capture(String),

    #[error("PDF compression failed: {0}")]
    Compression(String),

    #[error("Teardown failed: {0}")]
    Teardown(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CaptureError {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        CaptureError::InvalidRequest(message.into())
    }

    pub fn acquisition(message: impl Into<String>) -> Self {
        CaptureError::EngineAcquisition(message.into())
    }

    pub fn navigation(message: impl Into<String>) -> Self {
        CaptureError::Navigation(message.into())
    }

    pub fn capture(message: impl Into<String>) -> Self {
        CaptureError::Capture(message.into())
    }

    pub fn compression(message: impl Into<String>) -> Self {
        CaptureError::Compression(message.into())
    }

    pub fn teardown(message: impl Into<String>) -> Self {
        CaptureError::Teardown(message.into())
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            CaptureError::InvalidRequest(_) => ErrorCategory::Request,
            CaptureError::EngineAcquisition(_) => ErrorCategory::Engine,
            CaptureError::Navigation(_) => ErrorCategory::Navigation,
            CaptureError::Capture(_) => ErrorCategory::Capture,
            CaptureError::Compression(_) => ErrorCategory::Compression,
            CaptureError::Teardown(_) => ErrorCategory::Teardown,
            CaptureError::Config(_) | CaptureError::Io(_) | CaptureError::Serialization(_) => {
                ErrorCategory::Config
            }
        }
    }

    pub fn to_payload(&self) -> ErrorPayload {
        let message = self.to_string();
        match self {
            CaptureError::InvalidRequest(_) => ErrorPayload::new(
                ErrorCategory::Request,
                message,
                "Provide capture parameters with either a url or html target.",
            ),
            CaptureError::EngineAcquisition(msg) => {
                let lower = msg.to_ascii_lowercase();
                if lower.contains("connect") || lower.contains("websocket") {
                    ErrorPayload::new(
                        ErrorCategory::Engine,
                        message,
                        "Check BROWSERLESS_URL and that the remote browser endpoint is reachable.",
                    )
                } else {
                    ErrorPayload::new(
                        ErrorCategory::Engine,
                        message,
                        "Install Chromium/Chrome or point CHROME_PATH at the executable.",
                    )
                }
            }
            CaptureError::Navigation(msg) => {
                if msg.contains('#') || msg.to_ascii_lowercase().contains("selector") {
                    ErrorPayload::new(
                        ErrorCategory::Navigation,
                        message,
                        "Make sure the rendered page adds the readiness marker element once it is laid out.",
                    )
                } else {
                    ErrorPayload::new(
                        ErrorCategory::Navigation,
                        message,
                        "Check the target loads without blocking; try a longer timeout or a lighter waitUntil policy.",
                    )
                }
            }
            CaptureError::Capture(_) => ErrorPayload::new(
                ErrorCategory::Capture,
                message,
                "Check pdfOptions/screenshotOptions for values the browser rejects.",
            ),
            CaptureError::Compression(msg) => {
                let lower = msg.to_ascii_lowercase();
                if lower.contains("not found on path") {
                    ErrorPayload::new(
                        ErrorCategory::Compression,
                        message,
                        "Install Ghostscript (`gs`) or set PAGECAP_COMPRESSOR to its path.",
                    )
                } else {
                    ErrorPayload::new(
                        ErrorCategory::Compression,
                        message,
                        "Check that the scratch directory is writable and Ghostscript can read the PDF.",
                    )
                }
            }
            CaptureError::Teardown(_) => ErrorPayload::new(
                ErrorCategory::Teardown,
                message,
                "A browser process may have been left behind; check for stray chromium processes.",
            ),
            CaptureError::Config(_) | CaptureError::Io(_) | CaptureError::Serialization(_) => {
                ErrorPayload::new(
                    ErrorCategory::Config,
                    message,
                    "Check flags, config file paths and BROWSERLESS/BROWSERLESS_URL.",
                )
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, CaptureError>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Request,
    Engine,
    Navigation,
    Capture,
    Compression,
    Teardown,
    Config,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub category: ErrorCategory,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

impl ErrorPayload {
    pub fn new(category: ErrorCategory, message: String, remediation: impl Into<String>) -> Self {
        Self {
            category,
            message,
            remediation: Some(remediation.into()),
        }
    }
}
