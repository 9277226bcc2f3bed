//! Capture request types.
//!
//! - [`CaptureType`] - screenshot or PDF
//! - [`LifecycleEvent`] - completion-policy tokens
//! - [`CaptureParameters`] - target, timeouts, viewport and opaque engine options
//! - [`CaptureRequest`] - a capture type paired with (possibly absent) parameters

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use crate::viewport::ViewportOverride;
use crate::{CaptureError, Result};

/// Target used when neither a url nor inline html was supplied.
pub const BLANK_PAGE_URL: &str = "about:blank";

/// Default navigation timeout (300000 ms).
pub const DEFAULT_NAVIGATION_TIMEOUT: Duration = Duration::from_millis(300_000);

/// Opaque option dictionary handed through to the browser.
pub type EngineOptions = Map<String, Value>;

/// Which artifact a capture produces. Fixed for the lifetime of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaptureType {
    /// Rasterized screenshot of the viewport (or full page).
    #[serde(rename = "screenshot", alias = "image")]
    Image,
    /// Paginated PDF, always post-processed by the compressor.
    #[serde(rename = "pdf", alias = "document")]
    PaginatedDocument,
}

impl fmt::Display for CaptureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureType::Image => f.write_str("screenshot"),
            CaptureType::PaginatedDocument => f.write_str("pdf"),
        }
    }
}

/// Navigation lifecycle stage that must be observed before a load counts
/// as finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleEvent {
    #[serde(rename = "load")]
    Load,
    #[serde(rename = "domcontentloaded")]
    DomContentLoaded,
    /// No network connections for at least 500 ms.
    #[serde(rename = "networkidle0")]
    NetworkIdle0,
    /// No more than two network connections for at least 500 ms.
    #[serde(rename = "networkidle2")]
    NetworkIdle2,
}

impl LifecycleEvent {
    /// Policy used for url targets when the caller gives none.
    pub const URL_DEFAULT: [LifecycleEvent; 4] = [
        LifecycleEvent::DomContentLoaded,
        LifecycleEvent::Load,
        LifecycleEvent::NetworkIdle2,
        LifecycleEvent::NetworkIdle0,
    ];

    /// Policy used for inline markup (and the blank page) when none is given.
    pub const MARKUP_DEFAULT: [LifecycleEvent; 1] = [LifecycleEvent::Load];

    pub fn token(self) -> &'static str {
        match self {
            LifecycleEvent::Load => "load",
            LifecycleEvent::DomContentLoaded => "domcontentloaded",
            LifecycleEvent::NetworkIdle0 => "networkidle0",
            LifecycleEvent::NetworkIdle2 => "networkidle2",
        }
    }

    /// Name Chromium uses for this stage in `Page.lifecycleEvent`.
    pub fn protocol_name(self) -> &'static str {
        match self {
            LifecycleEvent::Load => "load",
            LifecycleEvent::DomContentLoaded => "DOMContentLoaded",
            LifecycleEvent::NetworkIdle0 => "networkIdle",
            LifecycleEvent::NetworkIdle2 => "networkAlmostIdle",
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for LifecycleEvent {
    type Err = CaptureError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "load" => Ok(LifecycleEvent::Load),
            "domcontentloaded" => Ok(LifecycleEvent::DomContentLoaded),
            "networkidle0" => Ok(LifecycleEvent::NetworkIdle0),
            "networkidle2" => Ok(LifecycleEvent::NetworkIdle2),
            other => Err(CaptureError::invalid_request(format!(
                "Unknown waitUntil value '{}'; expected load, domcontentloaded, networkidle0 or networkidle2",
                other
            ))),
        }
    }
}

/// Where the page content comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Url(String),
    Html(String),
}

/// Parameters of one capture call, in the camelCase shape callers send.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    /// Page navigation timeout in milliseconds; 0 or absent means the default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_until: Option<Vec<LifecycleEvent>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport: Option<ViewportOverride>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_options: Option<EngineOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot_options: Option<EngineOptions>,
}

impl CaptureParameters {
    pub fn for_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn for_html(html: impl Into<String>) -> Self {
        Self {
            html: Some(html.into()),
            ..Self::default()
        }
    }

    /// Inline html wins when non-empty, then the url, then the blank page.
    pub fn target(&self) -> Target {
        if let Some(html) = self.html.as_deref().filter(|h| !h.is_empty()) {
            return Target::Html(html.to_string());
        }
        match self.url.as_deref().filter(|u| !u.is_empty()) {
            Some(url) => Target::Url(url.to_string()),
            None => Target::Url(BLANK_PAGE_URL.to_string()),
        }
    }

    /// Caller policy, or the default for the kind of target in use.
    pub fn completion_policy(&self) -> Vec<LifecycleEvent> {
        if let Some(policy) = &self.wait_until {
            return policy.clone();
        }
        let has_url = self.url.as_deref().is_some_and(|u| !u.is_empty());
        if has_url {
            LifecycleEvent::URL_DEFAULT.to_vec()
        } else {
            LifecycleEvent::MARKUP_DEFAULT.to_vec()
        }
    }

    pub fn navigation_timeout(&self) -> Duration {
        match self.timeout {
            Some(ms) if ms > 0 => Duration::from_millis(ms),
            _ => DEFAULT_NAVIGATION_TIMEOUT,
        }
    }

    /// Presence and shape checks only; engine option schemas are not validated.
    pub fn validate(&self) -> Result<()> {
        if let Target::Url(url) = self.target() {
            Url::parse(&url).map_err(|e| {
                CaptureError::invalid_request(format!("Invalid url '{}': {}", url, e))
            })?;
        }
        if let Some(viewport) = &self.viewport {
            if viewport.width == Some(0) || viewport.height == Some(0) {
                return Err(CaptureError::invalid_request(
                    "Viewport width and height must be positive",
                ));
            }
        }
        Ok(())
    }
}

/// A capture type with its parameters, as read from a request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureRequest {
    pub capture_type: CaptureType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<CaptureParameters>,
}

impl CaptureRequest {
    pub fn new(capture_type: CaptureType, params: CaptureParameters) -> Self {
        Self {
            capture_type,
            params: Some(params),
        }
    }
}
