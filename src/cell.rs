//! Per-image resolution state
//!
//! Each embedded image gets one [`ImageCell`] tracking its three raster
//! candidates: the original pixels (fetched lazily from the host store), an
//! optional theme-rendered raster, and an optional user-uploaded raster. The
//! active candidate follows a strict precedence: user > theme > original.
//!
//! Theme renders settle asynchronously, so the cell carries a generation
//! counter: every theme event bumps it, render jobs capture it when queued,
//! and a result whose generation has been superseded is discarded instead of
//! installed. Replacement always installs the new handle before releasing
//! the old one, so an observer of the active handle never sees a released
//! one.

use crate::models::EmbeddedImage;
use crate::surface::{RasterHandle, SurfaceArena};

/// The active raster choice for one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Use the original embedded pixels
    Original,
    /// Use the theme-rendered replacement
    Theme(RasterHandle),
    /// Use the user-uploaded replacement
    User(RasterHandle),
}

/// State machine for one embedded image's raster candidates.
#[derive(Debug)]
pub struct ImageCell {
    info: EmbeddedImage,
    /// Theme key whose outcome is currently installed, including `"none"`
    /// and keys that settled with no override.
    settled_key: Option<String>,
    /// Key and generation of the render job still in flight, if any.
    pending: Option<(String, u64)>,
    generation: u64,
    theme: Option<RasterHandle>,
    user: Option<RasterHandle>,
    original: Option<RasterHandle>,
}

impl ImageCell {
    pub fn new(info: EmbeddedImage) -> Self {
        Self {
            info,
            settled_key: None,
            pending: None,
            generation: 0,
            theme: None,
            user: None,
            original: None,
        }
    }

    pub fn info(&self) -> &EmbeddedImage {
        &self.info
    }

    /// Active candidate by precedence: user > theme > original.
    pub fn resolution(&self) -> Resolution {
        if let Some(handle) = self.user {
            Resolution::User(handle)
        } else if let Some(handle) = self.theme {
            Resolution::Theme(handle)
        } else {
            Resolution::Original
        }
    }

    /// React to a theme change to `key` (not `"none"`).
    ///
    /// Returns the generation a render job should carry, or `None` when the
    /// cell already holds (or is already computing) this key's outcome.
    pub(crate) fn begin_theme(&mut self, key: &str) -> Option<u64> {
        if self.pending.as_ref().is_some_and(|(k, _)| k == key) {
            return None;
        }
        if self.settled_key.as_deref() == Some(key) {
            // Switching back before an in-flight switch away settled:
            // supersede the in-flight job, keep the installed outcome.
            if self.pending.take().is_some() {
                self.generation += 1;
            }
            return None;
        }
        self.generation += 1;
        self.pending = Some((key.to_string(), self.generation));
        Some(self.generation)
    }

    /// React to the theme changing to `"none"`: synchronously drop the theme
    /// candidate and supersede any in-flight render.
    pub(crate) fn clear_theme(&mut self, arena: &mut SurfaceArena) {
        if self.pending.take().is_some() {
            self.generation += 1;
        }
        self.settled_key = Some("none".to_string());
        if let Some(old) = self.theme.take() {
            arena.release(old);
        }
    }

    /// Install a settled render outcome (`None` = no override for this key).
    ///
    /// Returns false when the result's generation was superseded; the caller
    /// still owns `raster` in that case and must release it.
    pub(crate) fn settle_theme(
        &mut self,
        arena: &mut SurfaceArena,
        key: String,
        generation: u64,
        raster: Option<RasterHandle>,
    ) -> bool {
        if self.pending.as_ref().map(|&(_, g)| g) != Some(generation) {
            return false;
        }
        self.pending = None;
        self.settled_key = Some(key);
        // Install first, release after: no observer window on a dead handle.
        let old = self.theme;
        self.theme = raster;
        if let Some(old) = old {
            arena.release(old);
        }
        true
    }

    /// Install a decoded user upload, replacing any previous one.
    pub(crate) fn set_user(&mut self, arena: &mut SurfaceArena, handle: RasterHandle) {
        let old = self.user.replace(handle);
        if let Some(old) = old {
            arena.release(old);
        }
    }

    /// Drop the user candidate; resolution falls back to theme or original.
    pub(crate) fn clear_user(&mut self, arena: &mut SurfaceArena) {
        if let Some(old) = self.user.take() {
            arena.release(old);
        }
    }

    pub(crate) fn original(&self) -> Option<RasterHandle> {
        self.original
    }

    pub(crate) fn set_original(&mut self, handle: RasterHandle) {
        self.original = Some(handle);
    }

    /// Release every held handle; used at registry teardown.
    pub(crate) fn release_all(&mut self, arena: &mut SurfaceArena) {
        self.pending = None;
        self.generation += 1;
        for handle in [self.theme.take(), self.user.take(), self.original.take()]
            .into_iter()
            .flatten()
        {
            arena.release(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    fn cell() -> ImageCell {
        ImageCell::new(EmbeddedImage {
            id: 1,
            width: 4,
            height: 4,
            bits_per_pixel: 8,
        })
    }

    fn handle(arena: &mut SurfaceArena) -> RasterHandle {
        arena.insert(RgbaImage::new(4, 4))
    }

    #[test]
    fn test_precedence_user_over_theme() {
        let mut arena = SurfaceArena::new();
        let mut cell = cell();
        assert_eq!(cell.resolution(), Resolution::Original);

        let generation = cell.begin_theme("vector").unwrap();
        let themed = handle(&mut arena);
        assert!(cell.settle_theme(&mut arena, "vector".into(), generation, Some(themed)));
        assert_eq!(cell.resolution(), Resolution::Theme(themed));

        let uploaded = handle(&mut arena);
        cell.set_user(&mut arena, uploaded);
        assert_eq!(cell.resolution(), Resolution::User(uploaded));

        cell.clear_user(&mut arena);
        assert_eq!(cell.resolution(), Resolution::Theme(themed));
    }

    #[test]
    fn test_same_key_is_noop_after_settle() {
        let mut arena = SurfaceArena::new();
        let mut cell = cell();
        let generation = cell.begin_theme("vector").unwrap();
        cell.settle_theme(&mut arena, "vector".into(), generation, None);
        // Settled with no override; the key is still cached.
        assert_eq!(cell.begin_theme("vector"), None);
    }

    #[test]
    fn test_same_key_is_noop_while_pending() {
        let mut cell = cell();
        assert!(cell.begin_theme("vector").is_some());
        assert_eq!(cell.begin_theme("vector"), None);
    }

    #[test]
    fn test_stale_result_discarded() {
        let mut arena = SurfaceArena::new();
        let mut cell = cell();

        let gen_a = cell.begin_theme("a").unwrap();
        let gen_b = cell.begin_theme("b").unwrap();
        assert_ne!(gen_a, gen_b);

        // A's render finishes late: refused.
        let stale = handle(&mut arena);
        assert!(!cell.settle_theme(&mut arena, "a".into(), gen_a, Some(stale)));
        assert_eq!(cell.resolution(), Resolution::Original);

        // B's render installs normally.
        let fresh = handle(&mut arena);
        assert!(cell.settle_theme(&mut arena, "b".into(), gen_b, Some(fresh)));
        assert_eq!(cell.resolution(), Resolution::Theme(fresh));
    }

    #[test]
    fn test_switch_back_cancels_in_flight_switch() {
        let mut arena = SurfaceArena::new();
        let mut cell = cell();

        let gen_a = cell.begin_theme("a").unwrap();
        let themed = handle(&mut arena);
        cell.settle_theme(&mut arena, "a".into(), gen_a, Some(themed));

        // Switch away, then back before the switch-away settles.
        let gen_b = cell.begin_theme("b").unwrap();
        assert_eq!(cell.begin_theme("a"), None);
        assert_eq!(cell.resolution(), Resolution::Theme(themed));

        // The superseded B result must not install now.
        let stale = handle(&mut arena);
        assert!(!cell.settle_theme(&mut arena, "b".into(), gen_b, Some(stale)));
        assert_eq!(cell.resolution(), Resolution::Theme(themed));
    }

    #[test]
    fn test_clear_theme_supersedes_and_releases() {
        let mut arena = SurfaceArena::new();
        let mut cell = cell();

        let generation = cell.begin_theme("vector").unwrap();
        let themed = handle(&mut arena);
        cell.settle_theme(&mut arena, "vector".into(), generation, Some(themed));
        assert_eq!(arena.live(), 1);

        let generation = cell.begin_theme("other").unwrap();
        cell.clear_theme(&mut arena);
        assert_eq!(cell.resolution(), Resolution::Original);
        assert_eq!(arena.live(), 0);

        // The in-flight "other" render was superseded by the clear.
        let stale = handle(&mut arena);
        assert!(!cell.settle_theme(&mut arena, "other".into(), generation, Some(stale)));
    }

    #[test]
    fn test_replacement_releases_old_exactly_once() {
        let mut arena = SurfaceArena::new();
        let mut cell = cell();

        let generation = cell.begin_theme("a").unwrap();
        let first = handle(&mut arena);
        cell.settle_theme(&mut arena, "a".into(), generation, Some(first));

        let generation = cell.begin_theme("b").unwrap();
        let second = handle(&mut arena);
        cell.settle_theme(&mut arena, "b".into(), generation, Some(second));

        assert_eq!(arena.live(), 1);
        assert_eq!(arena.released(), 1);
        assert!(arena.pixels(first).is_none());
        assert!(arena.pixels(second).is_some());
    }

    #[test]
    fn test_release_all() {
        let mut arena = SurfaceArena::new();
        let mut cell = cell();

        let generation = cell.begin_theme("a").unwrap();
        let themed = handle(&mut arena);
        cell.settle_theme(&mut arena, "a".into(), generation, Some(themed));
        let uploaded = handle(&mut arena);
        cell.set_user(&mut arena, uploaded);
        cell.set_original(handle(&mut arena));

        cell.release_all(&mut arena);
        assert_eq!(arena.live(), 0);
        assert_eq!(arena.released(), 3);
    }
}
