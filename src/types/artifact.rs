use serde::{Deserialize, Serialize};

use super::request::CaptureType;

/// Leading bytes of every PDF file.
pub const PDF_SIGNATURE: &[u8] = b"%PDF-";

/// Payload format recognised from its leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactFormat {
    Png,
    Jpeg,
    Webp,
    Pdf,
}

impl ArtifactFormat {
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(PDF_SIGNATURE) {
            return Some(ArtifactFormat::Pdf);
        }
        match image::guess_format(bytes).ok()? {
            image::ImageFormat::Png => Some(ArtifactFormat::Png),
            image::ImageFormat::Jpeg => Some(ArtifactFormat::Jpeg),
            image::ImageFormat::WebP => Some(ArtifactFormat::Webp),
            _ => None,
        }
    }

    pub fn is_raster(self) -> bool {
        !matches!(self, ArtifactFormat::Pdf)
    }

    pub fn extension(self) -> &'static str {
        match self {
            ArtifactFormat::Png => "png",
            ArtifactFormat::Jpeg => "jpg",
            ArtifactFormat::Webp => "webp",
            ArtifactFormat::Pdf => "pdf",
        }
    }
}

/// Bytes produced by one capture, tagged with the mode that produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureArtifact {
    kind: CaptureType,
    bytes: Vec<u8>,
}

impl CaptureArtifact {
    pub fn new(kind: CaptureType, bytes: Vec<u8>) -> Self {
        Self { kind, bytes }
    }

    pub fn kind(&self) -> CaptureType {
        self.kind
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn detected_format(&self) -> Option<ArtifactFormat> {
        ArtifactFormat::sniff(&self.bytes)
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}
