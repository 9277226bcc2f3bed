use std::path::{Path, PathBuf};
use std::time::Duration;

use pagecap_lib::{
    CaptureConfig, CaptureError, CaptureParameters, EngineAcquisitionStrategy, EngineOptions,
    LifecycleEvent, ViewportOverride,
};

/// Tracks which CLI flags were explicitly provided vs. defaulted.
#[derive(Debug, Default)]
pub struct CaptureFlagSources {
    pub readiness_selector: bool,
    pub readiness_timeout: bool,
}

impl CaptureFlagSources {
    pub fn from_args(args: &[String]) -> Self {
        Self {
            readiness_selector: flag_present(args, "--readiness-selector"),
            readiness_timeout: flag_present(args, "--readiness-timeout"),
        }
    }
}

/// Checks if a flag was present in the command-line arguments.
pub fn flag_present(args: &[String], flag: &str) -> bool {
    args.iter()
        .any(|arg| arg == flag || arg.starts_with(&format!("{flag}=")))
}

/// Engine-level CLI overrides, applied on top of the loaded config.
#[derive(Debug, Clone, Default)]
pub struct EngineOverrides {
    pub remote: Option<String>,
    pub chrome: Option<PathBuf>,
    pub readiness_selector: String,
    pub readiness_timeout: u64,
}

/// Merge CLI arguments into the config, preferring CLI when flags are present.
pub fn resolve_capture_config(
    mut config: CaptureConfig,
    overrides: EngineOverrides,
    flags: &CaptureFlagSources,
) -> Result<CaptureConfig, CaptureError> {
    if let Some(endpoint) = overrides.remote {
        config.strategy = EngineAcquisitionStrategy::Remote { endpoint };
    }
    if let Some(chrome) = overrides.chrome {
        config.executable = Some(chrome);
    }
    if flags.readiness_selector {
        config.readiness_selector = overrides.readiness_selector;
    }
    if flags.readiness_timeout {
        config.timeouts.readiness = Duration::from_secs(overrides.readiness_timeout);
    }
    config.validate()?;
    Ok(config)
}

/// Load config from a TOML file (when given), then the environment over it.
pub fn load_config(path: Option<&Path>) -> Result<CaptureConfig, CaptureError> {
    let cfg = CaptureConfig::load(path)?;
    tracing::debug!(
        source = %path.map(|p| p.display().to_string()).unwrap_or_else(|| "defaults".to_string()),
        "loaded configuration"
    );
    Ok(cfg)
}

/// Request-level CLI inputs.
#[derive(Debug, Clone, Default)]
pub struct RequestArgs {
    pub url: Option<String>,
    pub html: Option<String>,
    pub request: Option<String>,
    pub viewport: Option<ViewportOverride>,
    pub wait_until: Option<Vec<String>>,
    pub timeout: Option<u64>,
    pub pdf_options: Option<String>,
    pub screenshot_options: Option<String>,
}

fn parse_options(raw: &str, flag: &str) -> Result<EngineOptions, CaptureError> {
    serde_json::from_str(raw).map_err(|e| {
        CaptureError::invalid_request(format!("{flag} must be a JSON object: {e}"))
    })
}

/// Builds capture parameters from `--request` and the individual flags,
/// individual flags winning.
pub fn build_parameters(args: RequestArgs) -> Result<CaptureParameters, CaptureError> {
    let mut params = match args.request.as_deref() {
        Some(raw) => serde_json::from_str::<CaptureParameters>(raw).map_err(|e| {
            CaptureError::invalid_request(format!("--request is not valid capture parameters: {e}"))
        })?,
        None => CaptureParameters::default(),
    };

    if let Some(url) = args.url {
        params.url = Some(url);
    }
    if let Some(html) = args.html {
        params.html = Some(html);
    }
    if let Some(viewport) = args.viewport {
        params.viewport = Some(viewport);
    }
    if let Some(events) = args.wait_until {
        let policy = events
            .iter()
            .map(|e| e.parse::<LifecycleEvent>())
            .collect::<Result<Vec<_>, _>>()?;
        params.wait_until = Some(policy);
    }
    if let Some(timeout) = args.timeout {
        params.timeout = Some(timeout);
    }
    if let Some(raw) = args.pdf_options.as_deref() {
        params.pdf_options = Some(parse_options(raw, "--pdf-options")?);
    }
    if let Some(raw) = args.screenshot_options.as_deref() {
        params.screenshot_options = Some(parse_options(raw, "--screenshot-options")?);
    }
    Ok(params)
}

/// Format effective config as a single-line string.
pub fn format_effective_config(config: &CaptureConfig, config_source: Option<&Path>) -> String {
    let source = config_source
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "defaults".to_string());
    let engine = match &config.strategy {
        EngineAcquisitionStrategy::Local => "local".to_string(),
        EngineAcquisitionStrategy::Remote { endpoint } => format!("remote ({endpoint})"),
    };
    format!(
        "Effective config [{source}]: engine={}, readiness={}, timeouts: nav={}ms, readiness={}ms, compression={}ms, compressor={}, scratch={}",
        engine,
        config.readiness_selector,
        config.timeouts.navigation.as_millis(),
        config.timeouts.readiness.as_millis(),
        config.timeouts.compression.as_millis(),
        config.compression.command,
        config.compression.scratch_dir.display(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(flags: &[&str]) -> Vec<String> {
        flags.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn flag_presence_handles_equals_form() {
        let raw = args(&["pagecap", "capture", "--readiness-timeout=5"]);
        assert!(flag_present(&raw, "--readiness-timeout"));
        assert!(!flag_present(&raw, "--readiness-selector"));
    }

    #[test]
    fn resolve_prefers_config_when_flags_absent() {
        let mut cfg = CaptureConfig::default();
        cfg.readiness_selector = "#done".to_string();
        cfg.timeouts.readiness = Duration::from_secs(7);

        let resolved = resolve_capture_config(
            cfg,
            EngineOverrides {
                readiness_selector: "#pdf-ready".to_string(),
                readiness_timeout: 300,
                ..EngineOverrides::default()
            },
            &CaptureFlagSources::default(),
        )
        .unwrap();

        assert_eq!(resolved.readiness_selector, "#done");
        assert_eq!(resolved.timeouts.readiness, Duration::from_secs(7));
        assert_eq!(resolved.strategy, EngineAcquisitionStrategy::Local);
    }

    #[test]
    fn resolve_prefers_cli_when_flags_present() {
        let resolved = resolve_capture_config(
            CaptureConfig::default(),
            EngineOverrides {
                remote: Some("ws://browserless:3000".to_string()),
                chrome: Some(PathBuf::from("/usr/bin/chromium")),
                readiness_selector: "body".to_string(),
                readiness_timeout: 12,
            },
            &CaptureFlagSources {
                readiness_selector: true,
                readiness_timeout: true,
            },
        )
        .unwrap();

        assert_eq!(
            resolved.strategy,
            EngineAcquisitionStrategy::Remote {
                endpoint: "ws://browserless:3000".to_string()
            }
        );
        assert_eq!(resolved.executable, Some(PathBuf::from("/usr/bin/chromium")));
        assert_eq!(resolved.readiness_selector, "body");
        assert_eq!(resolved.timeouts.readiness, Duration::from_secs(12));
    }

    #[test]
    fn flags_override_request_json() {
        let params = build_parameters(RequestArgs {
            request: Some(
                r#"{"url":"https://a.example","timeout":100,"pdfOptions":{"scale":0.5}}"#
                    .to_string(),
            ),
            url: Some("https://b.example".to_string()),
            wait_until: Some(vec!["load".to_string(), "networkidle2".to_string()]),
            ..RequestArgs::default()
        })
        .unwrap();

        assert_eq!(params.url.as_deref(), Some("https://b.example"));
        assert_eq!(params.timeout, Some(100));
        assert_eq!(
            params.wait_until,
            Some(vec![LifecycleEvent::Load, LifecycleEvent::NetworkIdle2])
        );
        assert_eq!(params.pdf_options.unwrap()["scale"], serde_json::json!(0.5));
    }

    #[test]
    fn bad_inputs_are_invalid_requests() {
        let err = build_parameters(RequestArgs {
            wait_until: Some(vec!["whenever".to_string()]),
            ..RequestArgs::default()
        })
        .unwrap_err();
        assert!(matches!(err, CaptureError::InvalidRequest(_)));

        let err = build_parameters(RequestArgs {
            pdf_options: Some("[1,2]".to_string()),
            ..RequestArgs::default()
        })
        .unwrap_err();
        assert!(err.to_string().contains("--pdf-options"));
    }

    #[test]
    fn format_effective_config_includes_all_fields() {
        let summary = format_effective_config(
            &CaptureConfig::default(),
            Some(Path::new("pagecap.toml")),
        );
        assert!(summary.contains("engine=local"));
        assert!(summary.contains("readiness=#pdf-ready"));
        assert!(summary.contains("nav=300000ms"));
        assert!(summary.contains("compressor=gs"));
        assert!(summary.contains("pagecap.toml"));
    }
}
