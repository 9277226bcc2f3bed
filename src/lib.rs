//! pagecap Library
//!
//! Renders a url or inline HTML in headless Chromium and returns either a
//! raster screenshot or a Ghostscript-compressed PDF. Every capture owns one
//! browser session for its whole lifetime and releases it on every exit path.
//!
//! # Module Overview
//!
//! - [`browser`] - Engine traits, the chromiumoxide engine and `CaptureService`
//! - [`loader`] - Content loading and the staged readiness waits
//! - [`dispatch`] - Screenshot or PDF capture from a ready page
//! - [`compress`] - Ghostscript post-processing through scratch files
//! - [`logging`] - Labelled failure logging and tracing setup
//! - [`config`] - Engine strategy, timeouts and compressor settings
//! - [`types`] - Request and artifact types
//!
//! # Example
//!
//! ```no_run
//! use pagecap_lib::{CaptureConfig, CaptureParameters, CaptureService, CaptureType};
//!
//! # async fn example() -> pagecap_lib::Result<()> {
//! let service = CaptureService::new(CaptureConfig::from_env()?);
//! let params = CaptureParameters::for_url("https://example.com/invoice/42");
//! let png = service.capture(CaptureType::Image, Some(params)).await?;
//! std::fs::write("invoice.png", png.bytes())?;
//! # Ok(())
//! # }
//! ```

pub mod browser;
pub mod compress;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod loader;
pub mod logging;
pub mod types;
pub mod viewport;

#[cfg(test)]
mod test_support;

pub use browser::{
    CaptureService, ChromiumEngine, Engine, EngineHandle, EnginePage, NavigationWaiter,
    LAUNCH_ARGS,
};
pub use compress::{Compressor, ScratchPair, GHOSTSCRIPT_ARGS};
pub use config::{CaptureConfig, CompressionConfig, EngineAcquisitionStrategy, Timeouts};
pub use dispatch::{default_pdf_options, dispatch, merge_options, strip_output_path};
pub use error::{CaptureError, ErrorCategory, ErrorPayload, Result};
pub use loader::{load_content, LoadSettings};
pub use logging::{format_exception, init_tracing, log_exception};
pub use types::{
    ArtifactFormat, CaptureArtifact, CaptureParameters, CaptureRequest, CaptureType,
    EngineOptions, LifecycleEvent, Target, BLANK_PAGE_URL, DEFAULT_NAVIGATION_TIMEOUT,
};
pub use viewport::{Viewport, ViewportOverride};
