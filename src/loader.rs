//! Content loading and readiness synchronisation.
//!
//! Loading is finished only after three things hold, in order: navigation
//! has met the completion policy, `document.fonts.ready` has resolved, and
//! the readiness marker element exists in the page.

use std::time::Duration;

use crate::browser::EnginePage;
use crate::config::CaptureConfig;
use crate::logging::log_exception;
use crate::types::{CaptureParameters, Target};
use crate::Result;

/// Timeouts and marker used by [`load_content`].
#[derive(Debug, Clone)]
pub struct LoadSettings {
    /// Fixed timeout for url navigation.
    pub navigation_timeout: Duration,
    /// Timeout for the font and marker gates.
    pub readiness_timeout: Duration,
    pub readiness_selector: String,
}

impl From<&CaptureConfig> for LoadSettings {
    fn from(config: &CaptureConfig) -> Self {
        Self {
            navigation_timeout: config.timeouts.navigation,
            readiness_timeout: config.timeouts.readiness,
            readiness_selector: config.readiness_selector.clone(),
        }
    }
}

/// Drives `page` to the request's target and waits until it is ready for
/// capture.
pub async fn load_content(
    page: &dyn EnginePage,
    params: &CaptureParameters,
    settings: &LoadSettings,
) -> Result<()> {
    let policy = params.completion_policy();

    match params.target() {
        Target::Html(html) => {
            // The waiter is subscribed before the markup goes in, so a fast
            // `load` cannot slip past it.
            let loaded = log_exception(
                "page.waitForNavigation",
                page.navigation_waiter(&policy, page.navigation_timeout()),
            )
            .await?;
            futures::try_join!(
                log_exception("page.waitForNavigation", loaded),
                log_exception("page.setContent", page.set_content(&html)),
            )?;
        }
        Target::Url(url) => {
            log_exception(
                "page.goto",
                page.goto(&url, &policy, settings.navigation_timeout),
            )
            .await?;
        }
    }

    log_exception(
        "page.waitForFonts",
        page.wait_for_fonts(settings.readiness_timeout),
    )
    .await?;

    log_exception(
        "page.waitForSelector",
        page.wait_for_selector(&settings.readiness_selector, settings.readiness_timeout),
    )
    .await?;

    tracing::debug!("content ready");
    Ok(())
}
