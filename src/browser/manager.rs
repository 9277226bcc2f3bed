//! Capture service coordinating one browser session per request.
//!
//! This module provides the `CaptureService` struct: acquire an engine
//! handle, open one page, load, dispatch, and release everything again on
//! every exit path.

use std::sync::Arc;

use tracing::Instrument;
use uuid::Uuid;

use super::chromium::ChromiumEngine;
use super::{Engine, EngineHandle, EnginePage};
use crate::compress::Compressor;
use crate::config::{CaptureConfig, EngineAcquisitionStrategy};
use crate::dispatch::dispatch;
use crate::loader::{load_content, LoadSettings};
use crate::logging::log_exception;
use crate::types::{CaptureArtifact, CaptureParameters, CaptureRequest, CaptureType};
use crate::{CaptureError, Result, Viewport};

/// Entry point for captures. Cheap to clone; holds no per-request state.
#[derive(Clone)]
pub struct CaptureService {
    config: CaptureConfig,
    engine: Arc<dyn Engine>,
    compressor: Compressor,
    load_settings: LoadSettings,
}

impl std::fmt::Debug for CaptureService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureService")
            .field("config", &self.config)
            .field("compressor", &self.compressor)
            .finish_non_exhaustive()
    }
}

impl CaptureService {
    /// Creates a service backed by Chromium.
    pub fn new(config: CaptureConfig) -> Self {
        let engine = Arc::new(ChromiumEngine::new(&config));
        Self::with_engine(config, engine)
    }

    /// Creates a service over any [`Engine`] implementation.
    pub fn with_engine(config: CaptureConfig, engine: Arc<dyn Engine>) -> Self {
        Self {
            compressor: Compressor::from_config(&config),
            load_settings: LoadSettings::from(&config),
            config,
            engine,
        }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub async fn execute(&self, request: CaptureRequest) -> Result<CaptureArtifact> {
        self.capture(request.capture_type, request.params).await
    }

    /// Captures one artifact. Fails with `InvalidRequest` before touching the
    /// engine when `params` is missing or malformed.
    pub async fn capture(
        &self,
        capture_type: CaptureType,
        params: Option<CaptureParameters>,
    ) -> Result<CaptureArtifact> {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("capture", %request_id, kind = %capture_type);
        self.capture_inner(capture_type, params)
            .instrument(span)
            .await
    }

    async fn capture_inner(
        &self,
        capture_type: CaptureType,
        params: Option<CaptureParameters>,
    ) -> Result<CaptureArtifact> {
        let params = params.ok_or_else(|| {
            CaptureError::invalid_request("Capture parameters should be defined")
        })?;
        params.validate()?;
        tracing::info!("New");

        let strategy = &self.config.strategy;
        let label = match strategy {
            EngineAcquisitionStrategy::Local => "browser.launch",
            EngineAcquisitionStrategy::Remote { .. } => "browser.connect",
        };
        let mut handle = log_exception(label, self.engine.acquire(strategy)).await?;

        let outcome = self
            .run_session(handle.as_mut(), capture_type, &params)
            .await;
        let released = log_exception("browser.close", handle.release()).await;

        finish(outcome, released)
    }

    async fn run_session(
        &self,
        handle: &mut dyn EngineHandle,
        capture_type: CaptureType,
        params: &CaptureParameters,
    ) -> Result<CaptureArtifact> {
        let mut page = log_exception("browser.newPage", handle.new_page()).await?;

        let outcome = self
            .drive_page(page.as_mut(), capture_type, params)
            .await;
        let closed = log_exception("page.close", page.close()).await;

        finish(outcome, closed)
    }

    async fn drive_page(
        &self,
        page: &mut dyn EnginePage,
        capture_type: CaptureType,
        params: &CaptureParameters,
    ) -> Result<CaptureArtifact> {
        page.set_navigation_timeout(params.navigation_timeout());

        if params.viewport.is_some() || capture_type == CaptureType::Image {
            let viewport = Viewport::default().merged(params.viewport.as_ref());
            tracing::debug!(%viewport, "applying viewport");
            log_exception("page.setViewport", page.set_viewport(&viewport)).await?;
        }

        load_content(&*page, params, &self.load_settings).await?;
        dispatch(&*page, capture_type, params, &self.compressor).await
    }
}

/// The earlier error wins; a cleanup error only surfaces after success.
fn finish<T>(outcome: Result<T>, cleanup: Result<()>) -> Result<T> {
    match (outcome, cleanup) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(err)) => Err(err),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(cleanup_err)) => {
            tracing::warn!(error = %cleanup_err, "cleanup failed after an earlier error");
            Err(err)
        }
    }
}
