use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Default viewport; a common notebook resolution, meant to be overridden.
pub const DEFAULT_VIEWPORT_WIDTH: u32 = 1200;
pub const DEFAULT_VIEWPORT_HEIGHT: u32 = 800;

/// Fully resolved viewport applied to a page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub device_scale_factor: f64,
    pub is_mobile: bool,
    pub has_touch: bool,
    pub is_landscape: bool,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: DEFAULT_VIEWPORT_WIDTH,
            height: DEFAULT_VIEWPORT_HEIGHT,
            device_scale_factor: 1.0,
            is_mobile: false,
            has_touch: false,
            is_landscape: false,
        }
    }
}

impl Viewport {
    /// Caller-supplied fields win; anything left out keeps `self`'s value.
    pub fn merged(self, overrides: Option<&ViewportOverride>) -> Self {
        let Some(o) = overrides else {
            return self;
        };
        Self {
            width: o.width.unwrap_or(self.width),
            height: o.height.unwrap_or(self.height),
            device_scale_factor: o.device_scale_factor.unwrap_or(self.device_scale_factor),
            is_mobile: o.is_mobile.unwrap_or(self.is_mobile),
            has_touch: o.has_touch.unwrap_or(self.has_touch),
            is_landscape: o.is_landscape.unwrap_or(self.is_landscape),
        }
    }
}

/// Viewport as it arrives in a request: every field optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewportOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_scale_factor: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_mobile: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_touch: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_landscape: Option<bool>,
}

#[derive(Debug, Error)]
pub enum ViewportParseError {
    #[error("Invalid viewport format: expected WIDTHxHEIGHT (e.g., 1200x800)")]
    InvalidFormat,
    #[error("Invalid width: {0}")]
    InvalidWidth(String),
    #[error("Invalid height: {0}")]
    InvalidHeight(String),
    #[error("Width must be positive")]
    ZeroWidth,
    #[error("Height must be positive")]
    ZeroHeight,
}

impl FromStr for ViewportOverride {
    type Err = ViewportParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('x').collect();
        if parts.len() != 2 {
            return Err(ViewportParseError::InvalidFormat);
        }

        let width: u32 = parts[0]
            .trim()
            .parse()
            .map_err(|_| ViewportParseError::InvalidWidth(parts[0].to_string()))?;

        let height: u32 = parts[1]
            .trim()
            .parse()
            .map_err(|_| ViewportParseError::InvalidHeight(parts[1].to_string()))?;

        if width == 0 {
            return Err(ViewportParseError::ZeroWidth);
        }
        if height == 0 {
            return Err(ViewportParseError::ZeroHeight);
        }

        Ok(ViewportOverride {
            width: Some(width),
            height: Some(height),
            ..ViewportOverride::default()
        })
    }
}

impl std::fmt::Display for Viewport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
