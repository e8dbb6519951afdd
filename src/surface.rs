//! Raster surface ownership
//!
//! Decoded pixel surfaces live in a [`SurfaceArena`]; everything else refers
//! to them through opaque [`RasterHandle`] keys. A handle is owned by exactly
//! one candidate slot at a time and must be released exactly once: releasing
//! frees the pixels, a second release is refused and logged, and reading a
//! released handle yields `None`. The arena keeps live/released counts so
//! tests can verify the lifetime invariants.

use std::collections::HashMap;

use image::RgbaImage;

/// Opaque key for a decoded pixel surface held by a [`SurfaceArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RasterHandle(u64);

/// Owner of all decoded pixel surfaces.
#[derive(Debug, Default)]
pub struct SurfaceArena {
    surfaces: HashMap<u64, RgbaImage>,
    next_id: u64,
    released: u64,
}

impl SurfaceArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a surface and hand back its handle.
    pub fn insert(&mut self, pixels: RgbaImage) -> RasterHandle {
        let id = self.next_id;
        self.next_id += 1;
        self.surfaces.insert(id, pixels);
        RasterHandle(id)
    }

    /// Pixels behind a handle, or `None` if it was released.
    pub fn pixels(&self, handle: RasterHandle) -> Option<&RgbaImage> {
        self.surfaces.get(&handle.0)
    }

    /// Release a handle's pixels. Returns false (and logs) when the handle
    /// was already released.
    pub fn release(&mut self, handle: RasterHandle) -> bool {
        if self.surfaces.remove(&handle.0).is_some() {
            self.released += 1;
            true
        } else {
            log::warn!("double release of raster handle {}", handle.0);
            false
        }
    }

    /// Number of live surfaces.
    pub fn live(&self) -> usize {
        self.surfaces.len()
    }

    /// Number of releases performed so far.
    pub fn released(&self) -> u64 {
        self.released
    }
}
