//! Uniform failure logging for named async operations.
//!
//! Every call that reaches the browser, the filesystem or the compressor is
//! wrapped with [`log_exception`], so a failure is reported once, at the
//! point where it happened, under a stable operation label.

use std::fmt::Display;
use std::future::Future;

use chrono::{DateTime, SecondsFormat, Utc};
use tracing_subscriber::EnvFilter;

/// Awaits `operation`; on failure logs it under `label` and returns the
/// error unchanged.
pub async fn log_exception<T, E, F>(label: &str, operation: F) -> Result<T, E>
where
    E: Display,
    F: Future<Output = Result<T, E>>,
{
    match operation.await {
        Ok(value) => Ok(value),
        Err(err) => {
            tracing::error!(
                operation = label,
                "{}",
                format_exception(Utc::now(), label, &err)
            );
            Err(err)
        }
    }
}

/// `[<timestamp>] Exception at <label>: "<message>"`
pub fn format_exception(at: DateTime<Utc>, label: &str, err: &impl Display) -> String {
    format!(
        "[{}] Exception at {}: \"{}\"",
        at.to_rfc3339_opts(SecondsFormat::Millis, true),
        label,
        err
    )
}

/// Installs the fmt subscriber for binaries. `RUST_LOG` wins over `verbose`.
pub fn init_tracing(verbose: bool) {
    let fallback = if verbose { "pagecap=debug,info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
