//! Data models shared across the engine

use serde::{Deserialize, Serialize};
use std::fmt;

/// Metadata for one bitmap embedded in the host-managed binary.
///
/// Enumerated once from the host image store at startup and never mutated;
/// identity key is `id`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmbeddedImage {
    pub id: u32,
    pub width: u32,
    pub height: u32,
    pub bits_per_pixel: u16,
}

impl EmbeddedImage {
    /// Size in bytes of this image's RGBA8 pixel buffer.
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// Category of a recorded, non-fatal failure.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticKind {
    /// Malformed or suspicious vector template
    Parse,
    /// Template fetched and parsed but could not be rasterized
    Resolve,
    /// Template fetch failed with something other than not-found
    Fetch,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticKind::Parse => write!(f, "parse"),
            DiagnosticKind::Resolve => write!(f, "resolve"),
            DiagnosticKind::Fetch => write!(f, "fetch"),
        }
    }
}

/// A recorded, non-fatal failure.
///
/// Every failure in the engine degrades to the next-lower-precedence raster
/// candidate; diagnostics are how the degraded path is reported to the UI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Diagnostic {
    pub image_id: Option<u32>,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub fn new(image_id: u32, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            image_id: Some(image_id),
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.image_id {
            Some(id) => write!(f, "[{}] image {}: {}", self.kind, id, self.message),
            None => write!(f, "[{}] {}", self.kind, self.message),
        }
    }
}
