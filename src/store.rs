//! Consumed external interfaces
//!
//! The engine never owns the host binary or the template source; it talks to
//! both through these traits. The host image store parses and patches the
//! binary's embedded images; the template store serves the vector template
//! for a `(theme, image id)` pair.

use std::collections::HashMap;
use std::path::PathBuf;

use thiserror::Error;

use crate::models::EmbeddedImage;

/// Failure inside the host image store collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("no embedded image with id {0}")]
    UnknownImage(u32),
    #[error("pixel buffer has {given} bytes, expected {expected}")]
    BufferSize { given: usize, expected: usize },
    #[error("host store failure: {0}")]
    Host(String),
}

/// The host image store: owns the binary's embedded images and palette.
///
/// Consumed, never reimplemented. None of these calls are assumed cheap.
pub trait ImageStore {
    /// Images embedded in the host binary, enumerated once at startup.
    fn enumerate_images(&self) -> Vec<EmbeddedImage>;

    /// Read an image's original pixels into `out` (straight RGBA8,
    /// `width * height * 4` bytes).
    fn read_original_pixels(&mut self, id: u32, out: &mut [u8]) -> Result<(), StoreError>;

    /// Replace an image's pixels with an arbitrary RGBA8 buffer.
    fn write_replacement_pixels(&mut self, id: u32, pixels: &[u8]) -> Result<(), StoreError>;

    /// Remap literal 24-bit colors across the binary's palette. Consumed by
    /// the host wizard's recolor step; the resolution engine never calls it.
    fn write_palette(&mut self, map: &HashMap<u32, u32>) -> Result<(), StoreError>;

    /// Finish patching and return the rebuilt binary.
    fn finalize(&mut self) -> Result<Vec<u8>, StoreError>;
}

/// Result of asking the template store for a `(theme, image id)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Raw template bytes
    Found(Vec<u8>),
    /// No override exists for this pair; a normal outcome, not an error
    NotFound,
    /// Anything else went wrong; reported but treated like [`Self::NotFound`]
    Failed(String),
}

/// Source of vector templates, keyed by theme and image id.
pub trait TemplateStore {
    fn fetch(&self, theme: &str, image_id: u32) -> FetchOutcome;
}

/// Template store over a directory laid out as `{root}/{theme}/{id}.svg`.
#[derive(Debug, Clone)]
pub struct DirTemplateStore {
    root: PathBuf,
}

impl DirTemplateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl TemplateStore for DirTemplateStore {
    fn fetch(&self, theme: &str, image_id: u32) -> FetchOutcome {
        let path = self.root.join(theme).join(format!("{}.svg", image_id));
        match std::fs::read(&path) {
            Ok(bytes) => FetchOutcome::Found(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => FetchOutcome::NotFound,
            Err(e) => FetchOutcome::Failed(format!("{}: {}", path.display(), e)),
        }
    }
}
