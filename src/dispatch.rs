//! Capture-mode dispatch: screenshot or compressed PDF from a ready page.

use std::time::Duration;

use serde_json::{json, Value};

use crate::browser::EnginePage;
use crate::compress::Compressor;
use crate::logging::log_exception;
use crate::types::{ArtifactFormat, CaptureArtifact, CaptureParameters, CaptureType, EngineOptions};
use crate::types::DEFAULT_NAVIGATION_TIMEOUT;
use crate::{CaptureError, Result};

/// Key callers may use to ask for a file on disk; never honoured.
pub const OUTPUT_PATH_KEY: &str = "path";

/// PDF defaults: backgrounds on, CSS page size preferred, no margins.
pub fn default_pdf_options() -> EngineOptions {
    let value = json!({
        "printBackground": true,
        "preferCSSPageSize": true,
        "timeout": DEFAULT_NAVIGATION_TIMEOUT.as_millis() as u64,
        "margin": {
            "top": "0",
            "right": "0",
            "bottom": "0",
            "left": "0",
        },
    });
    match value {
        Value::Object(map) => map,
        _ => EngineOptions::new(),
    }
}

/// Screenshot defaults are the engine's own.
pub fn default_screenshot_options() -> EngineOptions {
    EngineOptions::new()
}

/// Shallow merge: top-level caller keys replace defaults wholesale.
pub fn merge_options(defaults: EngineOptions, overrides: EngineOptions) -> EngineOptions {
    let mut merged = defaults;
    merged.extend(overrides);
    merged
}

/// Drops any caller-supplied output path so artifacts never hit local disk.
pub fn strip_output_path(options: Option<&EngineOptions>) -> EngineOptions {
    let mut options = options.cloned().unwrap_or_default();
    options.remove(OUTPUT_PATH_KEY);
    options
}

/// `timeout` in ms from merged PDF options; 0 disables the bound.
fn pdf_timeout(options: &EngineOptions) -> Option<Duration> {
    match options.get("timeout").and_then(Value::as_u64) {
        Some(0) => None,
        Some(ms) => Some(Duration::from_millis(ms)),
        None => Some(DEFAULT_NAVIGATION_TIMEOUT),
    }
}

/// Produces the artifact for `capture_type` from a page that has finished
/// loading.
pub async fn dispatch(
    page: &dyn EnginePage,
    capture_type: CaptureType,
    params: &CaptureParameters,
    compressor: &Compressor,
) -> Result<CaptureArtifact> {
    match capture_type {
        CaptureType::Image => capture_screenshot(page, params.screenshot_options.as_ref()).await,
        CaptureType::PaginatedDocument => {
            capture_pdf(page, params.pdf_options.as_ref(), compressor).await
        }
    }
}

async fn capture_screenshot(
    page: &dyn EnginePage,
    options: Option<&EngineOptions>,
) -> Result<CaptureArtifact> {
    let options = strip_output_path(options);

    if let Some(media) = options
        .get("emulateMediaType")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
    {
        log_exception("page.emulateMediaType", page.emulate_media_type(media)).await?;
    }

    let mut merged = merge_options(default_screenshot_options(), options);
    merged.insert("encoding".to_string(), Value::from("binary"));

    let bytes = log_exception("page.screenshot", async {
        let bytes = page.screenshot(&merged).await?;
        match ArtifactFormat::sniff(&bytes) {
            Some(format) if format.is_raster() => Ok(bytes),
            _ => Err(CaptureError::capture(format!(
                "Browser returned {} bytes without a known image signature",
                bytes.len()
            ))),
        }
    })
    .await?;

    Ok(CaptureArtifact::new(CaptureType::Image, bytes))
}

async fn capture_pdf(
    page: &dyn EnginePage,
    options: Option<&EngineOptions>,
    compressor: &Compressor,
) -> Result<CaptureArtifact> {
    let merged = merge_options(default_pdf_options(), strip_output_path(options));
    let limit = pdf_timeout(&merged);

    tracing::info!("Start");
    let raw = log_exception("page.pdf", async {
        let printing = page.pdf(&merged);
        let bytes = match limit {
            Some(limit) => tokio::time::timeout(limit, printing).await.map_err(|_| {
                CaptureError::capture(format!(
                    "PDF generation timed out after {} ms",
                    limit.as_millis()
                ))
            })??,
            None => printing.await?,
        };
        if bytes.is_empty() {
            return Err(CaptureError::capture("Browser returned an empty PDF"));
        }
        Ok(bytes)
    })
    .await?;
    tracing::info!(bytes = raw.len(), "PDF");

    let compressed = log_exception("pdf.compress", compressor.compress(&raw)).await?;
    tracing::info!(
        original = raw.len(),
        compressed = compressed.len(),
        "Optimized"
    );

    Ok(CaptureArtifact::new(CaptureType::PaginatedDocument, compressed))
}
