//! Request and artifact types shared across the capture pipeline.

mod artifact;
mod request;

pub use artifact::{ArtifactFormat, CaptureArtifact, PDF_SIGNATURE};
pub use request::{
    CaptureParameters, CaptureRequest, CaptureType, EngineOptions, LifecycleEvent, Target,
    BLANK_PAGE_URL, DEFAULT_NAVIGATION_TIMEOUT,
};
