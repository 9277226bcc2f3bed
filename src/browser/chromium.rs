//! chromiumoxide-backed engine.
//!
//! Local mode launches a fresh Chromium per request with a fixed hardened
//! argument set. Remote mode connects to a shared browser over its
//! websocket endpoint and only ever disconnects from it.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::emulation::{
    ScreenOrientation, ScreenOrientationType, SetDeviceMetricsOverrideParams,
    SetEmulatedMediaParams, SetTouchEmulationEnabledParams,
};
use chromiumoxide::cdp::browser_protocol::page::{
    EventLifecycleEvent, NavigateParams, SetLifecycleEventsEnabledParams,
};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};

use super::lifecycle::{wait_for_policy, LifecycleTracker};
use super::print::{pdf_params, screenshot_params};
use super::{Engine, EngineHandle, EnginePage, NavigationWaiter};
use crate::config::{CaptureConfig, EngineAcquisitionStrategy};
use crate::types::{EngineOptions, LifecycleEvent, BLANK_PAGE_URL};
use crate::{CaptureError, Result, Viewport};

/// Chromium flags for local launches.
///
/// Sandboxing and site isolation are switched off on purpose: only trusted
/// content is rendered, and the sandbox does not work inside most containers.
pub const LAUNCH_ARGS: [&str; 23] = [
    "--disable-accelerated-2d-canvas",
    "--disable-background-networking",
    "--disable-background-timer-throttling",
    "--disable-backgrounding-occluded-windows",
    "--disable-breakpad",
    "--disable-component-extensions-with-background-pages",
    "--disable-dev-shm-usage",
    "--disable-extensions",
    "--disable-features=TranslateUI,BlinkGenPropertyTrees,IsolateOrigins,site-per-process",
    "--disable-gpu",
    "--disable-infobars",
    "--disable-ipc-flooding-protection",
    "--disable-notifications",
    "--disable-setuid-sandbox",
    "--enable-features=NetworkService,NetworkServiceInProcess",
    "--font-render-hinting=none",
    "--hide-scrollbars",
    "--mute-audio",
    "--no-first-run",
    "--no-sandbox",
    "--no-zygote",
    "--safebrowsing-disable-auto-update",
    "--single-process",
];

const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct ChromiumEngine {
    executable: Option<PathBuf>,
    request_timeout: Duration,
}

impl ChromiumEngine {
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            executable: config.executable.clone(),
            request_timeout: config.timeouts.navigation,
        }
    }

    fn browser_config(&self) -> Result<BrowserConfig> {
        let mut builder = BrowserConfig::builder()
            .args(LAUNCH_ARGS)
            .request_timeout(self.request_timeout);
        if let Some(path) = &self.executable {
            builder = builder.chrome_executable(path);
        }
        builder.build().map_err(|e| {
            CaptureError::acquisition(format!("Failed to build launch options: {}", e))
        })
    }
}

/// Runs `check` every `interval` until it reports true or `limit` elapses.
/// Each check is bounded by the time left. Failed checks count as not yet.
async fn poll_until<F, Fut>(limit: Duration, interval: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<bool, String>>,
{
    let deadline = Instant::now() + limit;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match timeout(remaining, check()).await {
            Ok(Ok(true)) => return true,
            Ok(Ok(false)) => {}
            // Evaluation fails transiently while a document is being replaced.
            Ok(Err(err)) => tracing::trace!("readiness check failed: {}", err),
            Err(_) => return false,
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return false;
        }
        sleep(interval.min(remaining)).await;
    }
}

/// The handler stream must be polled for the connection to make progress.
fn spawn_handler(mut handler: chromiumoxide::Handler) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if event.is_err() {
                break;
            }
        }
    })
}

#[async_trait]
impl Engine for ChromiumEngine {
    async fn acquire(
        &self,
        strategy: &EngineAcquisitionStrategy,
    ) -> Result<Box<dyn EngineHandle>> {
        match strategy {
            EngineAcquisitionStrategy::Local => {
                let (browser, handler) = Browser::launch(self.browser_config()?)
                    .await
                    .map_err(|e| {
                        CaptureError::acquisition(format!("Failed to launch browser: {}", e))
                    })?;
                tracing::debug!("launched local chromium");
                Ok(Box::new(ChromiumHandle {
                    browser,
                    handler: spawn_handler(handler),
                    remote: false,
                }))
            }
            EngineAcquisitionStrategy::Remote { endpoint } => {
                let (browser, handler) = Browser::connect(endpoint.as_str())
                    .await
                    .map_err(|e| {
                        CaptureError::acquisition(format!(
                            "Failed to connect to {}: {}",
                            endpoint, e
                        ))
                    })?;
                tracing::debug!(%endpoint, "connected to remote chromium");
                Ok(Box::new(ChromiumHandle {
                    browser,
                    handler: spawn_handler(handler),
                    remote: true,
                }))
            }
        }
    }
}

struct ChromiumHandle {
    browser: Browser,
    handler: JoinHandle<()>,
    remote: bool,
}

#[async_trait]
impl EngineHandle for ChromiumHandle {
    async fn new_page(&mut self) -> Result<Box<dyn EnginePage>> {
        let page = self
            .browser
            .new_page(BLANK_PAGE_URL)
            .await
            .map_err(|e| CaptureError::acquisition(format!("Failed to open page: {}", e)))?;
        page.execute(SetLifecycleEventsEnabledParams::new(true))
            .await
            .map_err(|e| {
                CaptureError::acquisition(format!("Failed to enable lifecycle events: {}", e))
            })?;
        Ok(Box::new(ChromiumPage {
            page,
            navigation_timeout: crate::types::DEFAULT_NAVIGATION_TIMEOUT,
        }))
    }

    async fn release(self: Box<Self>) -> Result<()> {
        let ChromiumHandle {
            mut browser,
            handler,
            remote,
        } = *self;

        // Remote browsers are shared: drop the connection, leave the process.
        if remote {
            handler.abort();
            drop(browser);
            return Ok(());
        }

        let closed = browser.close().await;
        let outcome = match closed {
            Ok(_) => {
                let _ = browser.wait().await;
                Ok(())
            }
            Err(err) => {
                let _ = browser.kill().await;
                Err(CaptureError::teardown(format!(
                    "Failed to close browser: {}",
                    err
                )))
            }
        };
        handler.abort();
        outcome
    }
}

struct ChromiumPage {
    page: Page,
    navigation_timeout: Duration,
}

impl ChromiumPage {
    async fn evaluate_bool(&self, expression: String) -> std::result::Result<bool, String> {
        let params = EvaluateParams::builder()
            .expression(expression)
            .await_promise(true)
            .return_by_value(true)
            .build()?;
        let result = self
            .page
            .evaluate_expression(params)
            .await
            .map_err(|e| e.to_string())?;
        result.into_value::<bool>().map_err(|e| e.to_string())
    }

    async fn lifecycle_waiter(
        &self,
        policy: &[LifecycleEvent],
        limit: Duration,
    ) -> Result<NavigationWaiter> {
        let events = self
            .page
            .event_listener::<EventLifecycleEvent>()
            .await
            .map_err(|e| CaptureError::navigation(format!("Failed to watch navigation: {}", e)))?;
        let main_frame = self
            .page
            .mainframe()
            .await
            .map_err(|e| CaptureError::navigation(format!("Failed to resolve main frame: {}", e)))?;

        let events = events.map(move |event| {
            let is_main = main_frame
                .as_ref()
                .map_or(true, |frame| *frame == event.frame_id);
            (is_main, event.name.clone())
        });
        let tracker = LifecycleTracker::new(policy);
        let tokens: Vec<&'static str> = policy.iter().map(|e| e.token()).collect();

        Ok(Box::pin(async move {
            timeout(limit, wait_for_policy(tracker, events))
                .await
                .map_err(|_| {
                    CaptureError::navigation(format!(
                        "Navigation timeout of {} ms exceeded waiting for [{}]",
                        limit.as_millis(),
                        tokens.join(", ")
                    ))
                })?
        }))
    }
}

#[async_trait]
impl EnginePage for ChromiumPage {
    fn set_navigation_timeout(&mut self, timeout: Duration) {
        self.navigation_timeout = timeout;
    }

    fn navigation_timeout(&self) -> Duration {
        self.navigation_timeout
    }

    async fn set_viewport(&self, viewport: &Viewport) -> Result<()> {
        let mut metrics = SetDeviceMetricsOverrideParams::new(
            i64::from(viewport.width),
            i64::from(viewport.height),
            viewport.device_scale_factor,
            viewport.is_mobile,
        );
        metrics.screen_orientation = Some(if viewport.is_landscape {
            ScreenOrientation::new(ScreenOrientationType::LandscapePrimary, 90)
        } else {
            ScreenOrientation::new(ScreenOrientationType::PortraitPrimary, 0)
        });
        self.page
            .execute(metrics)
            .await
            .map_err(|e| CaptureError::navigation(format!("Failed to set viewport: {}", e)))?;
        self.page
            .execute(SetTouchEmulationEnabledParams::new(viewport.has_touch))
            .await
            .map_err(|e| {
                CaptureError::navigation(format!("Failed to set touch emulation: {}", e))
            })?;
        Ok(())
    }

    async fn navigation_waiter(
        &self,
        policy: &[LifecycleEvent],
        limit: Duration,
    ) -> Result<NavigationWaiter> {
        self.lifecycle_waiter(policy, limit).await
    }

    async fn set_content(&self, html: &str) -> Result<()> {
        timeout(self.navigation_timeout, self.page.set_content(html))
            .await
            .map_err(|_| {
                CaptureError::navigation(format!(
                    "Setting content timed out after {} ms",
                    self.navigation_timeout.as_millis()
                ))
            })?
            .map_err(|e| CaptureError::navigation(format!("Failed to set content: {}", e)))?;
        Ok(())
    }

    async fn goto(&self, url: &str, policy: &[LifecycleEvent], limit: Duration) -> Result<()> {
        let waiter = self.lifecycle_waiter(policy, limit).await?;
        let navigate = async {
            let response = timeout(limit, self.page.execute(NavigateParams::new(url)))
                .await
                .map_err(|_| {
                    CaptureError::navigation(format!(
                        "Navigation timeout of {} ms exceeded for {}",
                        limit.as_millis(),
                        url
                    ))
                })?
                .map_err(|e| {
                    CaptureError::navigation(format!("Failed to navigate to {}: {}", url, e))
                })?;
            match &response.result.error_text {
                Some(text) if !text.is_empty() => Err(CaptureError::navigation(format!(
                    "{} at {}",
                    text, url
                ))),
                _ => Ok(()),
            }
        };
        futures::try_join!(waiter, navigate)?;
        Ok(())
    }

    async fn wait_for_fonts(&self, limit: Duration) -> Result<()> {
        let ready = self.evaluate_bool("document.fonts.ready.then(() => true)".to_string());
        timeout(limit, ready)
            .await
            .map_err(|_| {
                CaptureError::navigation(format!(
                    "Waiting for fonts timed out after {} ms",
                    limit.as_millis()
                ))
            })?
            .map_err(|e| CaptureError::navigation(format!("Font readiness check failed: {}", e)))?;
        Ok(())
    }

    async fn wait_for_selector(&self, selector: &str, limit: Duration) -> Result<()> {
        let quoted = serde_json::to_string(selector)?;
        let expression = format!("document.querySelector({}) !== null", quoted);
        let found = poll_until(limit, SELECTOR_POLL_INTERVAL, || {
            self.evaluate_bool(expression.clone())
        })
        .await;
        if found {
            Ok(())
        } else {
            Err(CaptureError::navigation(format!(
                "Waiting for selector `{}` failed: timeout {}ms exceeded",
                selector,
                limit.as_millis()
            )))
        }
    }

    async fn emulate_media_type(&self, media: &str) -> Result<()> {
        let params = SetEmulatedMediaParams {
            media: Some(media.to_string()),
            features: None,
        };
        self.page
            .execute(params)
            .await
            .map_err(|e| CaptureError::capture(format!("Failed to emulate media type: {}", e)))?;
        Ok(())
    }

    async fn screenshot(&self, options: &EngineOptions) -> Result<Vec<u8>> {
        let params = screenshot_params(options)?;
        self.page
            .screenshot(params)
            .await
            .map_err(|e| CaptureError::capture(format!("Screenshot failed: {}", e)))
    }

    async fn pdf(&self, options: &EngineOptions) -> Result<Vec<u8>> {
        let params = pdf_params(options)?;
        self.page
            .pdf(params)
            .await
            .map_err(|e| CaptureError::capture(format!("PDF generation failed: {}", e)))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.page
            .close()
            .await
            .map_err(|e| CaptureError::teardown(format!("Failed to close page: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sandbox_flag_is_listed_once() {
        assert_eq!(
            LAUNCH_ARGS.iter().filter(|a| **a == "--no-sandbox").count(),
            1
        );
        let mut sorted = LAUNCH_ARGS.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), LAUNCH_ARGS.len());
    }

    #[tokio::test]
    async fn hung_check_is_cut_off_at_the_limit() {
        let started = Instant::now();
        let found = timeout(
            Duration::from_secs(2),
            poll_until(Duration::from_millis(50), SELECTOR_POLL_INTERVAL, || {
                futures::future::pending::<std::result::Result<bool, String>>()
            }),
        )
        .await
        .expect("polling ran past its limit");

        assert!(!found);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn polling_retries_until_the_check_passes() {
        let mut calls = 0;
        let found = poll_until(Duration::from_secs(5), Duration::from_millis(1), || {
            calls += 1;
            let attempt = calls;
            async move {
                match attempt {
                    1 => Err("Execution context was destroyed".to_string()),
                    2 => Ok(false),
                    _ => Ok(true),
                }
            }
        })
        .await;

        assert!(found);
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn slow_negative_checks_stop_at_the_limit() {
        let started = Instant::now();
        let found = poll_until(Duration::from_millis(60), Duration::from_millis(5), || async {
            sleep(Duration::from_millis(25)).await;
            Ok::<bool, String>(false)
        })
        .await;

        assert!(!found);
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn launch_args_disable_sandbox_and_isolation() {
        assert!(LAUNCH_ARGS.contains(&"--no-sandbox"));
        assert!(LAUNCH_ARGS.contains(&"--disable-setuid-sandbox"));
        assert!(LAUNCH_ARGS
            .iter()
            .any(|a| a.contains("IsolateOrigins,site-per-process")));
        assert!(LAUNCH_ARGS.contains(&"--single-process"));
    }

    #[test]
    fn engine_uses_configured_executable_and_timeout() {
        let config = CaptureConfig {
            executable: Some(PathBuf::from("/opt/chromium/chrome")),
            ..CaptureConfig::default()
        };
        let engine = ChromiumEngine::new(&config);
        assert_eq!(engine.executable, Some(PathBuf::from("/opt/chromium/chrome")));
        assert_eq!(engine.request_timeout, config.timeouts.navigation);
    }
}
