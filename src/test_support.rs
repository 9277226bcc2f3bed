//! In-crate fakes: a scripted engine that journals every call, and shell
//! scripts standing in for Ghostscript.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::browser::{Engine, EngineHandle, EnginePage, NavigationWaiter};
use crate::config::EngineAcquisitionStrategy;
use crate::types::{EngineOptions, LifecycleEvent};
use crate::{CaptureError, Result, Viewport};

pub(crate) const FAKE_PNG: &[u8] = &[
    0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D, b'I', b'H', b'D', b'R',
];
pub(crate) const FAKE_PDF: &[u8] = b"%PDF-1.4\n1 0 obj\n<<>>\nendobj\ntrailer\n<<>>\n%%EOF\n";
/// What [`shrinking_script`] writes, whatever its input.
#[cfg(unix)]
pub(crate) const SHRUNK_PDF: &[u8] = b"%PDF-1.4\n%%EOF\n";

#[derive(Debug, Clone, Default)]
pub(crate) struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub(crate) fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub(crate) fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, prefix: &str) -> usize {
        self.entries().iter().filter(|e| e.starts_with(prefix)).count()
    }

    pub(crate) fn position(&self, prefix: &str) -> Option<usize> {
        self.entries().iter().position(|e| e.starts_with(prefix))
    }
}

/// Scripted behaviour of the fake engine. `fail_at` names the call that
/// should fail (`acquire`, `newPage`, `setViewport`, `goto`, `setContent`,
/// `fonts`, `screenshot`, `pdf`, `page.close`, `release`).
#[derive(Debug, Clone)]
pub(crate) struct FakeBehavior {
    pub fail_at: Option<&'static str>,
    pub marker_present: bool,
    pub screenshot: Vec<u8>,
    pub pdf: Vec<u8>,
}

impl Default for FakeBehavior {
    fn default() -> Self {
        Self {
            fail_at: None,
            marker_present: true,
            screenshot: FAKE_PNG.to_vec(),
            pdf: FAKE_PDF.to_vec(),
        }
    }
}

fn injected(stage: &str) -> CaptureError {
    let message = format!("injected failure at {stage}");
    match stage {
        "acquire" | "newPage" => CaptureError::acquisition(message),
        "goto" | "setContent" | "fonts" | "setViewport" => CaptureError::navigation(message),
        "screenshot" | "pdf" => CaptureError::capture(message),
        _ => CaptureError::teardown(message),
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct FakeEngine {
    pub journal: Journal,
    pub behavior: FakeBehavior,
}

impl FakeEngine {
    pub(crate) fn new(behavior: FakeBehavior) -> Self {
        Self {
            journal: Journal::default(),
            behavior,
        }
    }

    fn check(&self, stage: &'static str) -> Result<()> {
        if self.behavior.fail_at == Some(stage) {
            Err(injected(stage))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Engine for FakeEngine {
    async fn acquire(
        &self,
        strategy: &EngineAcquisitionStrategy,
    ) -> Result<Box<dyn EngineHandle>> {
        match strategy {
            EngineAcquisitionStrategy::Local => self.journal.push("acquire:local"),
            EngineAcquisitionStrategy::Remote { endpoint } => {
                self.journal.push(format!("acquire:remote:{endpoint}"))
            }
        }
        self.check("acquire")?;
        Ok(Box::new(self.clone()))
    }
}

#[async_trait]
impl EngineHandle for FakeEngine {
    async fn new_page(&mut self) -> Result<Box<dyn EnginePage>> {
        self.journal.push("newPage");
        self.check("newPage")?;
        Ok(Box::new(FakePage {
            engine: self.clone(),
            navigation_timeout: Duration::ZERO,
        }))
    }

    async fn release(self: Box<Self>) -> Result<()> {
        self.journal.push("release");
        self.check("release")
    }
}

pub(crate) struct FakePage {
    engine: FakeEngine,
    navigation_timeout: Duration,
}

fn policy_tokens(policy: &[LifecycleEvent]) -> String {
    policy
        .iter()
        .map(|e| e.token())
        .collect::<Vec<_>>()
        .join(",")
}

#[async_trait]
impl EnginePage for FakePage {
    fn set_navigation_timeout(&mut self, timeout: Duration) {
        self.engine
            .journal
            .push(format!("setNavigationTimeout:{}", timeout.as_millis()));
        self.navigation_timeout = timeout;
    }

    fn navigation_timeout(&self) -> Duration {
        self.navigation_timeout
    }

    async fn set_viewport(&self, viewport: &Viewport) -> Result<()> {
        self.engine.journal.push(format!(
            "setViewport:{}x{}@{}",
            viewport.width, viewport.height, viewport.device_scale_factor
        ));
        self.engine.check("setViewport")
    }

    async fn navigation_waiter(
        &self,
        policy: &[LifecycleEvent],
        timeout: Duration,
    ) -> Result<NavigationWaiter> {
        self.engine.journal.push(format!(
            "waiter:{}:{}",
            policy_tokens(policy),
            timeout.as_millis()
        ));
        let journal = self.engine.journal.clone();
        Ok(Box::pin(async move {
            journal.push("waitForNavigation");
            Ok(())
        }))
    }

    async fn set_content(&self, html: &str) -> Result<()> {
        self.engine.journal.push(format!("setContent:{}", html.len()));
        self.engine.check("setContent")
    }

    async fn goto(&self, url: &str, policy: &[LifecycleEvent], timeout: Duration) -> Result<()> {
        self.engine.journal.push(format!(
            "goto:{}:{}:{}",
            url,
            policy_tokens(policy),
            timeout.as_millis()
        ));
        self.engine.check("goto")
    }

    async fn wait_for_fonts(&self, timeout: Duration) -> Result<()> {
        self.engine
            .journal
            .push(format!("fonts:{}", timeout.as_millis()));
        self.engine.check("fonts")
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()> {
        self.engine
            .journal
            .push(format!("selector:{}:{}", selector, timeout.as_millis()));
        if self.engine.behavior.marker_present {
            Ok(())
        } else {
            tokio::time::sleep(timeout).await;
            Err(CaptureError::navigation(format!(
                "Waiting for selector `{}` failed: timeout {}ms exceeded",
                selector,
                timeout.as_millis()
            )))
        }
    }

    async fn emulate_media_type(&self, media: &str) -> Result<()> {
        self.engine.journal.push(format!("emulateMediaType:{media}"));
        Ok(())
    }

    async fn screenshot(&self, options: &EngineOptions) -> Result<Vec<u8>> {
        self.engine.journal.push(format!(
            "screenshot:{}",
            serde_json::Value::Object(options.clone())
        ));
        self.engine.check("screenshot")?;
        Ok(self.engine.behavior.screenshot.clone())
    }

    async fn pdf(&self, options: &EngineOptions) -> Result<Vec<u8>> {
        self.engine
            .journal
            .push(format!("pdf:{}", serde_json::Value::Object(options.clone())));
        self.engine.check("pdf")?;
        Ok(self.engine.behavior.pdf.clone())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.engine.journal.push("page.close");
        self.engine.check("page.close")
    }
}

#[cfg(unix)]
fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

/// Stand-in for `gs` that copies its input to `-sOutputFile=`.
#[cfg(unix)]
pub(crate) fn passthrough_script(dir: &Path) -> PathBuf {
    write_script(
        dir,
        "fake-gs",
        r#"out=""
last=""
for arg in "$@"; do
  case "$arg" in
    -sOutputFile=*) out="${arg#-sOutputFile=}" ;;
  esac
  last="$arg"
done
cp "$last" "$out"
"#,
    )
}

/// Stand-in for `gs` that ignores its input and writes [`SHRUNK_PDF`] to
/// `-sOutputFile=`.
#[cfg(unix)]
pub(crate) fn shrinking_script(dir: &Path) -> PathBuf {
    write_script(
        dir,
        "shrinking-gs",
        r#"out=""
for arg in "$@"; do
  case "$arg" in
    -sOutputFile=*) out="${arg#-sOutputFile=}" ;;
  esac
done
printf '%%PDF-1.4\n%%%%EOF\n' > "$out"
"#,
    )
}

/// Stand-in for `gs` that prints `message` to stderr and exits non-zero.
#[cfg(unix)]
pub(crate) fn failing_script(dir: &Path, message: &str) -> PathBuf {
    write_script(dir, "failing-gs", &format!("echo '{message}' >&2\nexit 3\n"))
}
