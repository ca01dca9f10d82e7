//! The page-geometry collaborator contract.
//!
//! The core pipeline never talks to a PDF library directly; it consumes this
//! trait. That keeps detection, injection, and resolution testable against
//! in-memory stubs and lets the rendering backend be swapped without touching
//! pipeline code, the same seam the vision side gets from
//! [`crate::pipeline::vision::VisionModel`].
//!
//! Coordinate convention: page units with a top-left origin, y growing
//! downward (see [`crate::geometry`]). Implementations over bottom-left
//! native spaces flip before returning.

use crate::geometry::{Point, Rect};
use image::DynamicImage;
use std::path::Path;
use thiserror::Error;

#[cfg(feature = "pdfium")]
pub mod pdfium;

/// Errors surfaced by a page-geometry backend.
///
/// Page-scoped variants are treated as recoverable by the detector (the page
/// is skipped); the rest are fatal for the ingestion.
#[derive(Debug, Error)]
pub enum BackendError {
    /// A single page could not be scanned or rendered.
    #[error("page {page}: {detail}")]
    Page { page: usize, detail: String },

    /// The document could not be opened or parsed.
    #[error("document unusable: {detail}")]
    Document { detail: String },

    /// Persisting the mutated copy failed.
    #[error("save failed: {detail}")]
    Save { detail: String },
}

/// Everything the pipeline needs from a document: geometry enumeration,
/// region rendering, invisible-text insertion, and persistence of the
/// mutated copy.
///
/// Methods are synchronous; the orchestrator wraps backend-heavy phases in
/// `spawn_blocking` because PDF libraries are not async-safe.
pub trait PageGeometry: Send {
    /// Number of pages in the document.
    fn page_count(&self) -> usize;

    /// Page `(width, height)` in page units. `page` is zero-based.
    fn page_size(&self, page: usize) -> Result<(f32, f32), BackendError>;

    /// Bounding boxes of the page's vector-drawing primitives (path
    /// objects). Text and images are not included.
    fn drawing_rects(&self, page: usize) -> Result<Vec<Rect>, BackendError>;

    /// Independently detected table bounding boxes for the page.
    fn table_rects(&self, page: usize) -> Result<Vec<Rect>, BackendError>;

    /// Render `clip` (page units) at `scale`× into a raster image.
    fn render_region(
        &self,
        page: usize,
        clip: Rect,
        scale: f32,
    ) -> Result<DynamicImage, BackendError>;

    /// Render the full page at `scale`× (page-scan mode).
    fn render_page(&self, page: usize, scale: f32) -> Result<DynamicImage, BackendError> {
        let (w, h) = self.page_size(page)?;
        self.render_region(page, Rect::new(0.0, 0.0, w, h), scale)
    }

    /// Insert `text` at `at`, rendered in the page background colour at
    /// `font_size` so it is invisible to a human reader but extracted as
    /// literal text by any text-based converter.
    ///
    /// Mutations accumulate on the backend's working copy; the source
    /// document is never modified. Nothing is durable until
    /// [`save_copy`](Self::save_copy).
    fn insert_hidden_text(
        &mut self,
        page: usize,
        at: Point,
        text: &str,
        font_size: f32,
    ) -> Result<(), BackendError>;

    /// Persist the working copy (including inserted text) to `path`.
    fn save_copy(&self, path: &Path) -> Result<(), BackendError>;
}
