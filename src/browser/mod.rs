//! Headless browser boundary and the capture session manager.
//!
//! The pipeline talks to the rendering engine only through the [`Engine`],
//! [`EngineHandle`] and [`EnginePage`] traits. [`chromium`] implements them
//! over chromiumoxide. The DevTools protocol and Chromium internals stay
//! behind that seam.
//!
//! # Module Structure
//!
//! - [`manager`] - `CaptureService`, the per-request session orchestrator
//! - [`chromium`] - chromiumoxide-backed engine (local launch or remote connect)
//! - [`lifecycle`] - completion-policy tracking over `Page.lifecycleEvent`
//! - [`print`] - translation of opaque option dictionaries into protocol params
//!
//! # Example
//!
//! ```no_run
//! use pagecap_lib::{CaptureConfig, CaptureParameters, CaptureService, CaptureType};
//!
//! # async fn example() -> pagecap_lib::Result<()> {
//! let service = CaptureService::new(CaptureConfig::from_env()?);
//! let params = CaptureParameters::for_html(r#"<div id="pdf-ready">Hello</div>"#);
//! let pdf = service.capture(CaptureType::PaginatedDocument, Some(params)).await?;
//! println!("{} bytes", pdf.len());
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::config::EngineAcquisitionStrategy;
use crate::types::{EngineOptions, LifecycleEvent};
use crate::{Result, Viewport};

pub mod chromium;
pub mod lifecycle;
pub mod manager;
pub mod print;

pub use chromium::{ChromiumEngine, LAUNCH_ARGS};
pub use manager::CaptureService;

/// A navigation wait that is already listening; awaiting it resolves once
/// the policy has been observed or the timeout elapsed.
pub type NavigationWaiter = BoxFuture<'static, Result<()>>;

/// Source of browser handles.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Launches a local browser or connects to the remote endpoint.
    async fn acquire(&self, strategy: &EngineAcquisitionStrategy)
        -> Result<Box<dyn EngineHandle>>;
}

/// One acquired browser. Released exactly once by its owner.
#[async_trait]
pub trait EngineHandle: Send {
    async fn new_page(&mut self) -> Result<Box<dyn EnginePage>>;

    /// Closes (local) or disconnects from (remote) the browser.
    async fn release(self: Box<Self>) -> Result<()>;
}

/// One page (tab) inside an acquired browser.
#[async_trait]
pub trait EnginePage: Send + Sync {
    fn set_navigation_timeout(&mut self, timeout: Duration);

    fn navigation_timeout(&self) -> Duration;

    async fn set_viewport(&self, viewport: &Viewport) -> Result<()>;

    /// Subscribes to lifecycle events *now* and returns the pending wait.
    /// Callers register this before issuing the call that mutates content.
    async fn navigation_waiter(
        &self,
        policy: &[LifecycleEvent],
        timeout: Duration,
    ) -> Result<NavigationWaiter>;

    /// Replaces the document with `html`.
    async fn set_content(&self, html: &str) -> Result<()>;

    /// Navigates to `url` and waits until `policy` is satisfied.
    async fn goto(&self, url: &str, policy: &[LifecycleEvent], timeout: Duration) -> Result<()>;

    /// Resolves once `document.fonts.ready` does.
    async fn wait_for_fonts(&self, timeout: Duration) -> Result<()>;

    /// Resolves once an element matching `selector` exists.
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()>;

    async fn emulate_media_type(&self, media: &str) -> Result<()>;

    async fn screenshot(&self, options: &EngineOptions) -> Result<Vec<u8>>;

    async fn pdf(&self, options: &EngineOptions) -> Result<Vec<u8>>;

    async fn close(self: Box<Self>) -> Result<()>;
}
