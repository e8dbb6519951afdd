//! Resolution registry
//!
//! Aggregates one [`ImageCell`] per embedded image and routes the three
//! external events to them: theme changed, upload set, upload cleared.
//! Theme renders are not performed inside `set_theme`; they are queued and
//! driven by [`ResolutionRegistry::step`] (or [`ResolutionRegistry::settle`]),
//! which is the engine's only suspension point besides upload decoding.
//! Results whose generation was superseded by a later theme event are
//! discarded at install time, along with any diagnostics the job produced.

use std::collections::{BTreeMap, VecDeque};

use image::RgbaImage;
use thiserror::Error;

use crate::cell::{ImageCell, Resolution};
use crate::models::{Diagnostic, DiagnosticKind, EmbeddedImage};
use crate::palette::ThemePalette;
use crate::raster::render_template;
use crate::store::{FetchOutcome, ImageStore, StoreError, TemplateStore};
use crate::surface::{RasterHandle, SurfaceArena};
use crate::template::parse_template;

/// Theme key meaning "no themed rendering".
pub const THEME_NONE: &str = "none";

/// Error from `set_upload`, surfaced so the UI can reject the file. The
/// cell's state is left unchanged.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("no embedded image with id {0}")]
    UnknownImage(u32),
    #[error("could not decode uploaded image: {0}")]
    Decode(#[from] image::ImageError),
}

/// A queued theme render: fetch, parse and rasterize for one image.
#[derive(Debug, Clone)]
struct PendingRender {
    image_id: u32,
    theme: String,
    generation: u64,
}

/// Owner of all per-image resolution state.
pub struct ResolutionRegistry<T: TemplateStore> {
    cells: BTreeMap<u32, ImageCell>,
    arena: SurfaceArena,
    templates: T,
    palette: ThemePalette,
    theme_key: String,
    queue: VecDeque<PendingRender>,
    diagnostics: Vec<Diagnostic>,
}

impl<T: TemplateStore> ResolutionRegistry<T> {
    /// Build one cell per enumerated embedded image.
    pub fn new(images: Vec<EmbeddedImage>, templates: T, palette: ThemePalette) -> Self {
        let cells = images
            .into_iter()
            .map(|info| (info.id, ImageCell::new(info)))
            .collect();
        Self {
            cells,
            arena: SurfaceArena::new(),
            templates,
            palette,
            theme_key: THEME_NONE.to_string(),
            queue: VecDeque::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Currently selected theme key.
    pub fn theme(&self) -> &str {
        &self.theme_key
    }

    /// Replace the active palette; read by renders queued after this call.
    pub fn set_palette(&mut self, palette: ThemePalette) {
        self.palette = palette;
    }

    /// Enumerated images, in id order.
    pub fn images(&self) -> impl Iterator<Item = &EmbeddedImage> {
        self.cells.values().map(|cell| cell.info())
    }

    /// Surface bookkeeping, exposed for lifetime assertions in tests.
    pub fn arena(&self) -> &SurfaceArena {
        &self.arena
    }

    /// The consumed template store.
    pub fn template_store(&self) -> &T {
        &self.templates
    }

    /// Broadcast a theme change to every cell.
    ///
    /// `"none"` clears all theme candidates synchronously. Any other key
    /// queues one render per cell that does not already hold (or is not
    /// already computing) that key's outcome.
    pub fn set_theme(&mut self, key: &str) {
        self.theme_key = key.to_string();
        if key == THEME_NONE {
            for cell in self.cells.values_mut() {
                cell.clear_theme(&mut self.arena);
            }
            return;
        }
        for (&id, cell) in self.cells.iter_mut() {
            if let Some(generation) = cell.begin_theme(key) {
                log::debug!(
                    "queued theme render: image {}, theme '{}', generation {}",
                    id,
                    key,
                    generation
                );
                self.queue.push_back(PendingRender {
                    image_id: id,
                    theme: key.to_string(),
                    generation,
                });
            }
        }
    }

    /// Decode uploaded bytes and install them as the image's user candidate.
    ///
    /// Dimensions are passed through uncorrected; a mismatch against the
    /// embedded image's declared size is only logged.
    pub fn set_upload(&mut self, id: u32, bytes: &[u8]) -> Result<(), UploadError> {
        let cell = self
            .cells
            .get_mut(&id)
            .ok_or(UploadError::UnknownImage(id))?;
        let decoded = image::load_from_memory(bytes)?.to_rgba8();
        let info = cell.info();
        if (decoded.width(), decoded.height()) != (info.width, info.height) {
            log::warn!(
                "upload for image {} is {}x{}, embedded image is {}x{}",
                id,
                decoded.width(),
                decoded.height(),
                info.width,
                info.height
            );
        }
        let handle = self.arena.insert(decoded);
        cell.set_user(&mut self.arena, handle);
        Ok(())
    }

    /// Drop the image's user candidate; resolution falls back to the theme
    /// candidate if present, else the original.
    pub fn clear_upload(&mut self, id: u32) {
        if let Some(cell) = self.cells.get_mut(&id) {
            cell.clear_user(&mut self.arena);
        }
    }

    /// Run one queued theme render to completion. Returns false when the
    /// queue is empty.
    ///
    /// In-flight work is never cancelled: a superseded job still runs, and
    /// the generation check at install time discards its result together
    /// with any diagnostics it produced. Only accepted jobs are visible.
    pub fn step(&mut self) -> bool {
        let Some(job) = self.queue.pop_front() else {
            return false;
        };

        let mut diagnostics = Vec::new();
        let raster = match self.templates.fetch(&job.theme, job.image_id) {
            FetchOutcome::NotFound => None,
            FetchOutcome::Failed(message) => {
                diagnostics.push(Diagnostic::new(job.image_id, DiagnosticKind::Fetch, message));
                None
            }
            FetchOutcome::Found(bytes) => {
                self.render_themed(job.image_id, &bytes, &mut diagnostics)
            }
        };
        let handle = raster.map(|image| self.arena.insert(image));

        let Some(cell) = self.cells.get_mut(&job.image_id) else {
            if let Some(handle) = handle {
                self.arena.release(handle);
            }
            return true;
        };
        if cell.settle_theme(&mut self.arena, job.theme.clone(), job.generation, handle) {
            for diagnostic in diagnostics {
                log::debug!("{}", diagnostic);
                self.diagnostics.push(diagnostic);
            }
        } else {
            log::debug!(
                "discarded superseded theme render: image {}, theme '{}', generation {}",
                job.image_id,
                job.theme,
                job.generation
            );
            if let Some(handle) = handle {
                self.arena.release(handle);
            }
        }
        true
    }

    /// Drive queued renders until everything has settled.
    pub fn settle(&mut self) {
        while self.step() {}
    }

    /// Number of queued renders still outstanding.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// The replacement map: image id to active replacement raster, for every
    /// cell not resolving to the original. Reflects settled work only;
    /// a cell with a render in flight still shows its previous candidate.
    pub fn snapshot(&self) -> BTreeMap<u32, &RgbaImage> {
        let mut map = BTreeMap::new();
        for (&id, cell) in &self.cells {
            let handle = match cell.resolution() {
                Resolution::User(handle) | Resolution::Theme(handle) => handle,
                Resolution::Original => continue,
            };
            if let Some(pixels) = self.arena.pixels(handle) {
                map.insert(id, pixels);
            }
        }
        map
    }

    /// The image's currently active raster, for preview. Falls back to the
    /// lazily fetched original when no replacement candidate is installed.
    pub fn active_raster<S: ImageStore>(
        &mut self,
        id: u32,
        store: &mut S,
    ) -> Result<&RgbaImage, StoreError> {
        let cell = self.cells.get(&id).ok_or(StoreError::UnknownImage(id))?;
        match cell.resolution() {
            Resolution::User(handle) | Resolution::Theme(handle) => self
                .arena
                .pixels(handle)
                .ok_or_else(|| StoreError::Host("active raster was released".into())),
            Resolution::Original => self.original_raster(id, store),
        }
    }

    /// The image's original raster, for comparison previews. Read from the
    /// host store at most once per image and cached.
    pub fn original_raster<S: ImageStore>(
        &mut self,
        id: u32,
        store: &mut S,
    ) -> Result<&RgbaImage, StoreError> {
        let cell = self.cells.get_mut(&id).ok_or(StoreError::UnknownImage(id))?;
        let handle = match cell.original() {
            Some(handle) => handle,
            None => {
                let info = *cell.info();
                let mut buffer = vec![0u8; info.byte_len()];
                store.read_original_pixels(id, &mut buffer)?;
                // Buffer is allocated at exactly width * height * 4, so the
                // size check inside from_raw cannot fail.
                let image = RgbaImage::from_raw(info.width, info.height, buffer)
                    .ok_or_else(|| StoreError::Host(format!("image {} buffer rejected", id)))?;
                let handle = self.arena.insert(image);
                cell.set_original(handle);
                handle
            }
        };
        self.arena
            .pixels(handle)
            .ok_or_else(|| StoreError::Host("original raster was released".into()))
    }

    /// Write every non-original resolution into the host store, then let the
    /// store finish the patched binary. The engine's only write into the
    /// collaborator.
    pub fn finalize<S: ImageStore>(&mut self, store: &mut S) -> Result<Vec<u8>, StoreError> {
        let replacements: Vec<(u32, RasterHandle)> = self
            .cells
            .iter()
            .filter_map(|(&id, cell)| match cell.resolution() {
                Resolution::User(handle) | Resolution::Theme(handle) => Some((id, handle)),
                Resolution::Original => None,
            })
            .collect();
        for (id, handle) in replacements {
            let pixels = self
                .arena
                .pixels(handle)
                .ok_or_else(|| StoreError::Host("replacement raster was released".into()))?;
            store.write_replacement_pixels(id, pixels.as_raw())?;
        }
        store.finalize()
    }

    /// Diagnostics recorded so far, oldest first.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Drain the recorded diagnostics.
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    /// Release every held surface; called on drop and when the wizard step
    /// is abandoned.
    pub fn clear(&mut self) {
        self.queue.clear();
        for cell in self.cells.values_mut() {
            cell.release_all(&mut self.arena);
        }
    }

    /// Parse and rasterize fetched template bytes; failures degrade to "no
    /// override". Diagnostics go to the caller, which records them only if
    /// the job's generation is still current.
    fn render_themed(
        &self,
        image_id: u32,
        bytes: &[u8],
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Option<RgbaImage> {
        let parsed = match parse_template(bytes) {
            Ok(parsed) => parsed,
            Err(e) => {
                diagnostics.push(Diagnostic::new(image_id, DiagnosticKind::Parse, e.to_string()));
                return None;
            }
        };
        for warning in &parsed.warnings {
            diagnostics.push(Diagnostic::new(
                image_id,
                DiagnosticKind::Parse,
                warning.clone(),
            ));
        }
        match render_template(&parsed.template, &self.palette) {
            Ok(image) => Some(image),
            Err(e) => {
                diagnostics.push(Diagnostic::new(
                    image_id,
                    DiagnosticKind::Resolve,
                    e.to_string(),
                ));
                None
            }
        }
    }
}

impl<T: TemplateStore> Drop for ResolutionRegistry<T> {
    fn drop(&mut self) {
        self.clear();
    }
}
