use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::types::DEFAULT_NAVIGATION_TIMEOUT;
use crate::{CaptureError, Result};

/// Environment flag selecting remote-engine mode (`BROWSERLESS=1`).
pub const REMOTE_FLAG_ENV: &str = "BROWSERLESS";
/// Websocket endpoint of the remote engine.
pub const REMOTE_ENDPOINT_ENV: &str = "BROWSERLESS_URL";
pub const CHROME_PATH_ENV: &str = "CHROME_PATH";
pub const SCRATCH_DIR_ENV: &str = "PAGECAP_SCRATCH_DIR";
pub const COMPRESSOR_ENV: &str = "PAGECAP_COMPRESSOR";

pub const DEFAULT_READINESS_SELECTOR: &str = "#pdf-ready";
pub const DEFAULT_COMPRESSOR_COMMAND: &str = "gs";
pub const DEFAULT_COMPRESSION_TIMEOUT: Duration = Duration::from_secs(300);

/// How a browser handle is obtained for each capture.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EngineAcquisitionStrategy {
    /// Launch a fresh, isolated local Chromium per request.
    #[default]
    Local,
    /// Connect to a shared remote browser; each request still gets its own page.
    Remote { endpoint: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeouts {
    /// Used for url navigation and as the page default.
    pub navigation: Duration,
    /// Used by the font and readiness-marker gates.
    pub readiness: Duration,
    /// Upper bound for one compressor run.
    pub compression: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            navigation: DEFAULT_NAVIGATION_TIMEOUT,
            readiness: DEFAULT_NAVIGATION_TIMEOUT,
            compression: DEFAULT_COMPRESSION_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressionConfig {
    pub command: String,
    pub scratch_dir: PathBuf,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            command: DEFAULT_COMPRESSOR_COMMAND.to_string(),
            scratch_dir: cwd.join("temp"),
        }
    }
}

/// Process-wide capture configuration, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    pub strategy: EngineAcquisitionStrategy,
    /// Chromium executable for local launches; auto-detected when unset.
    pub executable: Option<PathBuf>,
    pub readiness_selector: String,
    pub timeouts: Timeouts,
    pub compression: CompressionConfig,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            strategy: EngineAcquisitionStrategy::Local,
            executable: None,
            readiness_selector: DEFAULT_READINESS_SELECTOR.to_string(),
            timeouts: Timeouts::default(),
            compression: CompressionConfig::default(),
        }
    }
}

/// On-disk (TOML) shape; every field optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    engine: EngineSection,
    #[serde(default)]
    timeouts: TimeoutsSection,
    #[serde(default)]
    compression: CompressionSection,
    readiness_selector: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct EngineSection {
    mode: Option<EngineMode>,
    endpoint: Option<String>,
    executable: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum EngineMode {
    Local,
    Remote,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TimeoutsSection {
    #[serde(default, with = "humantime_serde")]
    navigation: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    readiness: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    compression: Option<Duration>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct CompressionSection {
    command: Option<String>,
    scratch_dir: Option<PathBuf>,
}

impl CaptureConfig {
    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env(|key| std::env::var(key).ok())
    }

    /// Loads `path` (if any) over the defaults, then applies the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let base = match path {
            Some(path) => Self::from_toml_file(path)?,
            None => Self::default(),
        };
        base.with_env(|key| std::env::var(key).ok())
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CaptureError::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&raw).map_err(|e| match e {
            CaptureError::Config(msg) => {
                CaptureError::Config(format!("Invalid config ({}): {}", path.display(), msg))
            }
            other => other,
        })
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let file: ConfigFile =
            toml::from_str(raw).map_err(|e| CaptureError::Config(e.to_string()))?;
        let mut cfg = Self::default();

        match (file.engine.mode, file.engine.endpoint) {
            (Some(EngineMode::Remote), Some(endpoint)) => {
                cfg.strategy = EngineAcquisitionStrategy::Remote { endpoint };
            }
            (Some(EngineMode::Remote), None) => {
                return Err(CaptureError::Config(
                    "engine.mode = \"remote\" requires engine.endpoint".to_string(),
                ));
            }
            _ => cfg.strategy = EngineAcquisitionStrategy::Local,
        }
        cfg.executable = file.engine.executable;

        if let Some(selector) = file.readiness_selector {
            cfg.readiness_selector = selector;
        }
        if let Some(d) = file.timeouts.navigation {
            cfg.timeouts.navigation = d;
        }
        if let Some(d) = file.timeouts.readiness {
            cfg.timeouts.readiness = d;
        }
        if let Some(d) = file.timeouts.compression {
            cfg.timeouts.compression = d;
        }
        if let Some(command) = file.compression.command {
            cfg.compression.command = command;
        }
        if let Some(dir) = file.compression.scratch_dir {
            cfg.compression.scratch_dir = dir;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Applies environment overrides through `lookup` so tests need not touch
    /// the real process environment.
    pub fn with_env<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if lookup(REMOTE_FLAG_ENV).as_deref() == Some("1") {
            let endpoint = lookup(REMOTE_ENDPOINT_ENV)
                .filter(|e| !e.trim().is_empty())
                .ok_or_else(|| {
                    CaptureError::Config(format!(
                        "{}=1 requires {} to be set",
                        REMOTE_FLAG_ENV, REMOTE_ENDPOINT_ENV
                    ))
                })?;
            self.strategy = EngineAcquisitionStrategy::Remote { endpoint };
        }
        if let Some(path) = lookup(CHROME_PATH_ENV).filter(|p| !p.is_empty()) {
            self.executable = Some(PathBuf::from(path));
        }
        if let Some(dir) = lookup(SCRATCH_DIR_ENV).filter(|d| !d.is_empty()) {
            self.compression.scratch_dir = PathBuf::from(dir);
        }
        if let Some(command) = lookup(COMPRESSOR_ENV).filter(|c| !c.is_empty()) {
            self.compression.command = command;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.readiness_selector.trim().is_empty() {
            return Err(CaptureError::Config(
                "readiness_selector must not be empty".to_string(),
            ));
        }
        if self.compression.command.trim().is_empty() {
            return Err(CaptureError::Config(
                "compression.command must not be empty".to_string(),
            ));
        }
        for (name, value) in [
            ("navigation", self.timeouts.navigation),
            ("readiness", self.timeouts.readiness),
            ("compression", self.timeouts.compression),
        ] {
            if value.is_zero() {
                return Err(CaptureError::Config(format!(
                    "timeouts.{} must be greater than zero",
                    name
                )));
            }
        }
        Ok(())
    }
}
