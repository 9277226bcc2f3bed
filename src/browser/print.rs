//! Translation of caller option dictionaries into DevTools parameters.
//!
//! Callers send screenshot and PDF options in the familiar camelCase shape
//! (`fullPage`, `printBackground`, `margin: { top: "1cm" }`, `format: "A4"`).
//! Only the keys below are understood. Anything else passes through
//! untouched and is ignored here.

use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, PrintToPdfParams, Viewport as ClipRect,
};
use chromiumoxide::page::ScreenshotParams;
use serde_json::Value;

use crate::types::EngineOptions;
use crate::{CaptureError, Result};

const CSS_PX_PER_INCH: f64 = 96.0;

/// Paper sizes in inches (width, height).
fn paper_format(name: &str) -> Option<(f64, f64)> {
    let size = match name.to_ascii_lowercase().as_str() {
        "letter" => (8.5, 11.0),
        "legal" => (8.5, 14.0),
        "tabloid" => (11.0, 17.0),
        "ledger" => (17.0, 11.0),
        "a0" => (33.1, 46.8),
        "a1" => (23.4, 33.1),
        "a2" => (16.54, 23.4),
        "a3" => (11.7, 16.54),
        "a4" => (8.27, 11.7),
        "a5" => (5.83, 8.27),
        "a6" => (4.13, 5.83),
        _ => return None,
    };
    Some(size)
}

/// Converts a CSS length (number = px, or string with px/in/cm/mm) to inches.
pub fn length_to_inches(value: &Value) -> Result<f64> {
    let px = match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| CaptureError::capture(format!("Invalid length: {}", n)))?,
        Value::String(s) => {
            let s = s.trim();
            let (number, unit) = match s.len().checked_sub(2).and_then(|i| s.get(i..)) {
                Some(suffix) if suffix.chars().all(|c| c.is_ascii_alphabetic()) => {
                    (&s[..s.len() - 2], suffix.to_ascii_lowercase())
                }
                _ => (s, "px".to_string()),
            };
            let number: f64 = number
                .trim()
                .parse()
                .map_err(|_| CaptureError::capture(format!("Invalid length: '{}'", s)))?;
            let per_unit = match unit.as_str() {
                "px" => 1.0,
                "in" => 96.0,
                "cm" => 37.8,
                "mm" => 3.78,
                other => {
                    return Err(CaptureError::capture(format!(
                        "Unknown unit '{}' in length '{}'",
                        other, s
                    )))
                }
            };
            number * per_unit
        }
        other => return Err(CaptureError::capture(format!("Invalid length: {}", other))),
    };
    Ok(px / CSS_PX_PER_INCH)
}

fn bool_opt(options: &EngineOptions, key: &str) -> Option<bool> {
    options.get(key).and_then(Value::as_bool)
}

fn str_opt<'a>(options: &'a EngineOptions, key: &str) -> Option<&'a str> {
    options.get(key).and_then(Value::as_str)
}

fn f64_opt(options: &EngineOptions, key: &str) -> Option<f64> {
    options.get(key).and_then(Value::as_f64)
}

pub fn pdf_params(options: &EngineOptions) -> Result<PrintToPdfParams> {
    let mut params = PrintToPdfParams::default();
    params.print_background = bool_opt(options, "printBackground");
    params.prefer_css_page_size = bool_opt(options, "preferCSSPageSize");
    params.landscape = bool_opt(options, "landscape");
    params.display_header_footer = bool_opt(options, "displayHeaderFooter");
    params.scale = f64_opt(options, "scale");
    params.header_template = str_opt(options, "headerTemplate").map(str::to_string);
    params.footer_template = str_opt(options, "footerTemplate").map(str::to_string);
    params.page_ranges = str_opt(options, "pageRanges")
        .filter(|r| !r.is_empty())
        .map(str::to_string);

    if let Some(format) = str_opt(options, "format") {
        let (width, height) = paper_format(format)
            .ok_or_else(|| CaptureError::capture(format!("Unknown paper format: {}", format)))?;
        params.paper_width = Some(width);
        params.paper_height = Some(height);
    }
    if let Some(width) = options.get("width") {
        params.paper_width = Some(length_to_inches(width)?);
    }
    if let Some(height) = options.get("height") {
        params.paper_height = Some(length_to_inches(height)?);
    }

    if let Some(margin) = options.get("margin").and_then(Value::as_object) {
        let side = |key: &str| margin.get(key).map(length_to_inches).transpose();
        params.margin_top = side("top")?;
        params.margin_right = side("right")?;
        params.margin_bottom = side("bottom")?;
        params.margin_left = side("left")?;
    }

    Ok(params)
}

pub fn screenshot_params(options: &EngineOptions) -> Result<ScreenshotParams> {
    let mut builder = ScreenshotParams::builder();

    if let Some(kind) = str_opt(options, "type") {
        let format = match kind.to_ascii_lowercase().as_str() {
            "png" => CaptureScreenshotFormat::Png,
            "jpeg" | "jpg" => CaptureScreenshotFormat::Jpeg,
            "webp" => CaptureScreenshotFormat::Webp,
            other => {
                return Err(CaptureError::capture(format!(
                    "Unsupported screenshot type: {}",
                    other
                )))
            }
        };
        builder = builder.format(format);
    }
    if let Some(quality) = options.get("quality").and_then(Value::as_i64) {
        builder = builder.quality(quality);
    }
    if let Some(full_page) = bool_opt(options, "fullPage") {
        builder = builder.full_page(full_page);
    }
    if let Some(omit) = bool_opt(options, "omitBackground") {
        builder = builder.omit_background(omit);
    }
    if let Some(beyond) = bool_opt(options, "captureBeyondViewport") {
        builder = builder.capture_beyond_viewport(beyond);
    }
    if let Some(clip) = options.get("clip").and_then(Value::as_object) {
        let field = |key: &str| {
            clip.get(key).and_then(Value::as_f64).ok_or_else(|| {
                CaptureError::capture(format!("screenshot clip is missing numeric '{}'", key))
            })
        };
        builder = builder.clip(ClipRect {
            x: field("x")?,
            y: field("y")?,
            width: field("width")?,
            height: field("height")?,
            scale: clip.get("scale").and_then(Value::as_f64).unwrap_or(1.0),
        });
    }

    Ok(builder.build())
}
