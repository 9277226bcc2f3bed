//! PDF compression through an external Ghostscript process.
//!
//! The compressor talks to `gs` only through the filesystem: the raw PDF is
//! written to a scratch file, `gs` rewrites it into a second scratch file,
//! and the result is read back. Both files are removed before `compress`
//! returns, on failure as well as on success.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::fs;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::timeout;
use uuid::Uuid;

use crate::config::CaptureConfig;
use crate::{CaptureError, Result};

/// Fixed Ghostscript flags: structure-preserving pdfwrite, safe mode, font
/// subsetting and embedding, untouched colours, "printer" preset, batch mode.
pub const GHOSTSCRIPT_ARGS: [&str; 10] = [
    "-sDEVICE=pdfwrite",
    "-dSAFER",
    "-dCompatibilityLevel=1.4",
    "-dColorConversionStrategy=/LeaveColorUnchanged",
    "-dSubsetFonts=true",
    "-dEmbedAllFonts=true",
    "-dPDFSETTINGS=/printer",
    "-dNOPAUSE",
    "-dQUIET",
    "-dBATCH",
];

/// Input/output scratch files belonging to one compression call.
#[derive(Debug, Clone)]
pub struct ScratchPair {
    pub original: PathBuf,
    pub compressed: PathBuf,
}

impl ScratchPair {
    /// Timestamp-prefixed names; the uuid keeps same-millisecond calls apart.
    pub fn allocate(dir: &Path) -> Self {
        let stem = format!(
            "{}_{}",
            Utc::now().timestamp_millis(),
            Uuid::new_v4().simple()
        );
        Self {
            original: dir.join(format!("{stem}_original.pdf")),
            compressed: dir.join(format!("{stem}_compressed.pdf")),
        }
    }

    /// Removes both files. A file that was never created is not an error.
    pub async fn remove(&self) -> io::Result<()> {
        let mut first_err = None;
        for path in [&self.original, &self.compressed] {
            match fs::remove_file(path).await {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => {
                    first_err.get_or_insert(err);
                }
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Compressor {
    command: String,
    scratch_dir: PathBuf,
    timeout: Duration,
}

impl Compressor {
    pub fn new(command: impl Into<String>, scratch_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            scratch_dir: scratch_dir.into(),
            timeout,
        }
    }

    pub fn from_config(config: &CaptureConfig) -> Self {
        Self::new(
            config.compression.command.clone(),
            config.compression.scratch_dir.clone(),
            config.timeouts.compression,
        )
    }

    /// Returns the Ghostscript-rewritten form of `document`.
    pub async fn compress(&self, document: &[u8]) -> Result<Vec<u8>> {
        fs::create_dir_all(&self.scratch_dir).await.map_err(|e| {
            CaptureError::compression(format!(
                "Failed to create scratch dir {}: {}",
                self.scratch_dir.display(),
                e
            ))
        })?;

        let job = ScratchPair::allocate(&self.scratch_dir);
        let outcome = self.run_job(&job, document).await;
        let cleanup = job.remove().await;

        match (outcome, cleanup) {
            (Ok(bytes), Ok(())) => Ok(bytes),
            (Ok(_), Err(err)) => Err(CaptureError::compression(format!(
                "Failed to remove scratch files: {}",
                err
            ))),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(cleanup_err)) => {
                tracing::warn!(
                    original = %job.original.display(),
                    "Failed to remove scratch files after compression error: {}",
                    cleanup_err
                );
                Err(err)
            }
        }
    }

    async fn run_job(&self, job: &ScratchPair, document: &[u8]) -> Result<Vec<u8>> {
        fs::write(&job.original, document).await.map_err(|e| {
            CaptureError::compression(format!(
                "Failed to write {}: {}",
                job.original.display(),
                e
            ))
        })?;

        self.run_ghostscript(job).await?;

        fs::read(&job.compressed).await.map_err(|e| {
            CaptureError::compression(format!(
                "Failed to read {}: {}",
                job.compressed.display(),
                e
            ))
        })
    }

    fn command_for(&self, job: &ScratchPair) -> Command {
        let mut cmd = Command::new(&self.command);
        cmd.args(GHOSTSCRIPT_ARGS)
            .arg(format!("-sOutputFile={}", job.compressed.display()))
            .arg(&job.original)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    async fn run_ghostscript(&self, job: &ScratchPair) -> Result<()> {
        let start = Instant::now();
        let mut child = self
            .command_for(job)
            .spawn()
            .map_err(|err| map_spawn_error(err, &self.command))?;

        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();

        let stdout_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(mut out) = stdout_pipe {
                let _ = out.read_to_end(&mut buf).await;
            }
            buf
        });

        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(mut err) = stderr_pipe {
                let _ = err.read_to_end(&mut buf).await;
            }
            buf
        });

        let status = match timeout(self.timeout, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(err)) => {
                return Err(CaptureError::compression(format!(
                    "Failed waiting for {}: {}",
                    self.command, err
                )))
            }
            Err(_) => {
                let _ = child.kill().await;
                let _ = child.wait().await;
                return Err(CaptureError::compression(format!(
                    "{} timed out after {:?}",
                    self.command, self.timeout
                )));
            }
        };

        // Output is drained so a chatty gs never blocks on a full pipe.
        let _ = stdout_task.await;
        let stderr = stderr_task.await.unwrap_or_default();

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr);
            let detail = stderr.trim();
            return Err(CaptureError::compression(format!(
                "{} exited with {}{}",
                self.command,
                status,
                if detail.is_empty() {
                    String::new()
                } else {
                    format!(": {}", detail)
                }
            )));
        }

        tracing::debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            "ghostscript finished"
        );
        Ok(())
    }
}

fn map_spawn_error(err: io::Error, command: &str) -> CaptureError {
    if err.kind() == io::ErrorKind::NotFound {
        CaptureError::compression(format!(
            "Unable to run the PDF compressor; '{}' was not found on PATH",
            command
        ))
    } else {
        CaptureError::compression(format!("Failed to spawn '{}': {}", command, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[cfg(unix)]
    use crate::test_support::{failing_script, passthrough_script};
    use tempfile::tempdir;

    fn scratch_entries(dir: &Path) -> Vec<PathBuf> {
        match std::fs::read_dir(dir) {
            Ok(entries) => entries.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
            Err(_) => Vec::new(),
        }
    }

    #[test]
    fn command_uses_fixed_flags_and_paths() {
        let compressor = Compressor::new("gs", "/tmp/scratch", Duration::from_secs(1));
        let job = ScratchPair {
            original: PathBuf::from("/tmp/scratch/1_original.pdf"),
            compressed: PathBuf::from("/tmp/scratch/1_compressed.pdf"),
        };
        let cmd = compressor.command_for(&job);
        let args: Vec<String> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().to_string())
            .collect();

        assert_eq!(&args[..10], &GHOSTSCRIPT_ARGS);
        assert_eq!(args[10], "-sOutputFile=/tmp/scratch/1_compressed.pdf");
        assert_eq!(args[11], "/tmp/scratch/1_original.pdf");
        assert_eq!(cmd.as_std().get_program(), "gs");
    }

    #[test]
    fn scratch_names_are_unique_and_timestamped() {
        let dir = Path::new("/tmp");
        let a = ScratchPair::allocate(dir);
        let b = ScratchPair::allocate(dir);
        assert_ne!(a.original, b.original);

        let name = a.original.file_name().unwrap().to_string_lossy().to_string();
        let stamp = name.split('_').next().unwrap();
        assert!(stamp.parse::<i64>().is_ok(), "expected millis prefix in {name}");
        assert!(name.ends_with("_original.pdf"));
        assert!(a
            .compressed
            .to_string_lossy()
            .ends_with("_compressed.pdf"));
    }

    #[tokio::test]
    async fn missing_compressor_is_compression_failure() {
        let scratch = tempdir().unwrap();
        let compressor = Compressor::new(
            "definitely-not-a-binary",
            scratch.path().join("temp"),
            Duration::from_secs(5),
        );

        let err = compressor.compress(b"%PDF-1.4").await.unwrap_err();
        assert!(matches!(err, CaptureError::Compression(_)));
        assert!(err.to_string().contains("not found on PATH"));
        assert!(scratch_entries(&scratch.path().join("temp")).is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn compress_round_trips_and_cleans_up() {
        let tools = tempdir().unwrap();
        let scratch = tempdir().unwrap();
        let script = passthrough_script(tools.path());
        let dir = scratch.path().join("nested").join("temp");
        let compressor = Compressor::new(
            script.to_string_lossy().to_string(),
            &dir,
            Duration::from_secs(10),
        );

        let input = b"%PDF-1.4\n1 0 obj\n<<>>\nendobj\n%%EOF\n".to_vec();
        let output = compressor.compress(&input).await.unwrap();

        assert!(output.starts_with(b"%PDF-"));
        assert!(output.len() <= input.len());
        assert!(dir.is_dir(), "scratch dir should be created lazily");
        assert!(scratch_entries(&dir).is_empty(), "scratch files must be removed");

        // Second call reuses the existing directory.
        compressor.compress(&input).await.unwrap();
        assert!(scratch_entries(&dir).is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_compressor_reports_stderr_and_cleans_up() {
        let tools = tempdir().unwrap();
        let scratch = tempdir().unwrap();
        let script = failing_script(tools.path(), "Unrecoverable error in pdfwrite");
        let compressor = Compressor::new(
            script.to_string_lossy().to_string(),
            scratch.path(),
            Duration::from_secs(10),
        );

        let err = compressor.compress(b"%PDF-1.4").await.unwrap_err();
        match &err {
            CaptureError::Compression(msg) => {
                assert!(msg.contains("Unrecoverable error in pdfwrite"), "got: {msg}")
            }
            other => panic!("expected compression failure, got {other:?}"),
        }
        assert!(
            scratch_entries(scratch.path()).is_empty(),
            "scratch files must be removed on failure too"
        );
    }

    #[tokio::test]
    async fn removing_absent_scratch_files_is_ok() {
        let scratch = tempdir().unwrap();
        let job = ScratchPair::allocate(scratch.path());
        job.remove().await.unwrap();
    }
}
