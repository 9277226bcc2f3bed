use std::io::{self, Write};
use std::path::Path;
use std::process::ExitCode;

use pagecap_lib::{CaptureArtifact, CaptureError, ErrorPayload};
use serde::Serialize;

/// Error body printed on failure; artifacts never share this shape.
#[derive(Debug, Serialize)]
pub struct ErrorOutput {
    pub mode: &'static str,
    pub error: ErrorPayload,
}

/// Write the artifact bytes to `output`, or stdout when omitted.
pub fn write_artifact(artifact: CaptureArtifact, output: Option<&Path>) -> io::Result<()> {
    let bytes = artifact.into_bytes();
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, bytes)
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(&bytes)?;
            stdout.flush()
        }
    }
}

/// One-line summary of a written artifact, for verbose mode.
pub fn describe_artifact(artifact: &CaptureArtifact, output: Option<&Path>) -> String {
    let format = artifact
        .detected_format()
        .map(|f| f.extension())
        .unwrap_or("unknown");
    let target = output
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "stdout".to_string());
    format!(
        "Captured {} ({}, {} bytes) -> {}",
        artifact.kind(),
        format,
        artifact.len(),
        target
    )
}

pub fn error_json(err: &CaptureError) -> String {
    let payload = ErrorOutput {
        mode: "error",
        error: err.to_payload(),
    };
    serde_json::to_string(&payload).unwrap_or_else(|_| "{\"mode\":\"error\"}".into())
}

/// Render an error and return the appropriate exit code.
pub fn render_error(err: CaptureError) -> ExitCode {
    // stdout carries artifacts, so a failure never writes to --output.
    println!("{}", error_json(&err));
    ExitCode::from(2)
}
