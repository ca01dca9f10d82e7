//! pdfium-render implementation of the [`PageGeometry`] contract.
//!
//! pdfium document handles borrow the `Pdfium` binding, which makes a
//! self-referential "open once, hold forever" struct impossible in safe
//! Rust. Instead the file is reopened per operation and text insertions are
//! buffered on the backend, then replayed onto a fresh copy inside
//! [`save_copy`](PdfiumBackend::save_copy). The source file on disk is never
//! written to.
//!
//! pdfium works in bottom-left page space; every rectangle and point is
//! flipped to the crate's top-left convention at this boundary.

use super::{BackendError, PageGeometry};
use crate::geometry::{Point, Rect};
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Thin segments at most this thick (page units) count as rule lines for
/// the table heuristic.
const LINE_THICKNESS: f32 = 2.0;
/// Rule lines shorter than this are ignored (tick marks, serifs).
const LINE_MIN_LENGTH: f32 = 15.0;
/// Clustering window when grouping rule lines into grids.
const GRID_TOLERANCE: f32 = 12.0;

/// A buffered invisible-text insertion, replayed at save time.
#[derive(Debug, Clone)]
struct PendingText {
    page: usize,
    at: Point,
    text: String,
    font_size: f32,
}

/// [`PageGeometry`] over a PDF file via pdfium.
pub struct PdfiumBackend {
    pdfium: Pdfium,
    path: PathBuf,
    password: Option<String>,
    page_count: usize,
    pending: Vec<PendingText>,
}

impl PdfiumBackend {
    /// Open `path`, verifying it parses. The file is reopened per operation.
    pub fn open(path: impl Into<PathBuf>, password: Option<&str>) -> Result<Self, BackendError> {
        let path = path.into();
        let pdfium = Pdfium::default();
        let page_count = {
            let document = pdfium
                .load_pdf_from_file(&path, password)
                .map_err(|e| BackendError::Document {
                    detail: format!("{e:?}"),
                })?;
            document.pages().len() as usize
        };
        debug!("opened '{}': {} pages", path.display(), page_count);
        Ok(Self {
            pdfium,
            path,
            password: password.map(str::to_owned),
            page_count,
            pending: Vec::new(),
        })
    }

    fn load(&self) -> Result<PdfDocument<'_>, BackendError> {
        self.pdfium
            .load_pdf_from_file(&self.path, self.password.as_deref())
            .map_err(|e| BackendError::Document {
                detail: format!("{e:?}"),
            })
    }

    /// Bounding boxes of path objects, flipped to top-left space.
    fn path_object_rects(&self, page_idx: usize) -> Result<Vec<Rect>, BackendError> {
        let document = self.load()?;
        let page = document
            .pages()
            .get(page_idx as u16)
            .map_err(|e| page_err(page_idx, e))?;
        let page_h = page.height().value;

        let mut rects = Vec::new();
        for object in page.objects().iter() {
            if object.object_type() != PdfPageObjectType::Path {
                continue;
            }
            let Ok(bounds) = object.bounds() else {
                continue;
            };
            rects.push(Rect::new(
                bounds.left().value,
                page_h - bounds.top().value,
                bounds.right().value,
                page_h - bounds.bottom().value,
            ));
        }
        Ok(rects)
    }
}

fn page_err(page: usize, e: PdfiumError) -> BackendError {
    BackendError::Page {
        page,
        detail: format!("{e:?}"),
    }
}

impl PageGeometry for PdfiumBackend {
    fn page_count(&self) -> usize {
        self.page_count
    }

    fn page_size(&self, page_idx: usize) -> Result<(f32, f32), BackendError> {
        let document = self.load()?;
        let page = document
            .pages()
            .get(page_idx as u16)
            .map_err(|e| page_err(page_idx, e))?;
        Ok((page.width().value, page.height().value))
    }

    fn drawing_rects(&self, page_idx: usize) -> Result<Vec<Rect>, BackendError> {
        self.path_object_rects(page_idx)
    }

    /// Grid heuristic: rule lines (thin, long path objects) that cluster
    /// into a region containing both horizontal and vertical members form a
    /// table. Borderless tables are invisible to this, which errs on the
    /// side of keeping candidates.
    fn table_rects(&self, page_idx: usize) -> Result<Vec<Rect>, BackendError> {
        let mut lines: Vec<(Rect, bool)> = Vec::new();
        for r in self.path_object_rects(page_idx)? {
            let (w, h) = (r.width(), r.height());
            if h <= LINE_THICKNESS && w >= LINE_MIN_LENGTH {
                lines.push((r, true));
            } else if w <= LINE_THICKNESS && h >= LINE_MIN_LENGTH {
                lines.push((r, false));
            }
        }

        // Transitive merge, tracking horizontal/vertical membership.
        let mut grids: Vec<(Rect, usize, usize)> = Vec::new();
        for (line, horizontal) in lines {
            let grown = line.inflate(GRID_TOLERANCE, GRID_TOLERANCE);
            let mut merged = (line, horizontal as usize, !horizontal as usize);
            let mut i = 0;
            while i < grids.len() {
                if grown
                    .intersect(&grids[i].0.inflate(GRID_TOLERANCE, GRID_TOLERANCE))
                    .is_some()
                {
                    let (r, h, v) = grids.swap_remove(i);
                    merged = (merged.0.union(&r), merged.1 + h, merged.2 + v);
                } else {
                    i += 1;
                }
            }
            grids.push(merged);
        }

        Ok(grids
            .into_iter()
            .filter(|&(_, h, v)| h >= 2 && v >= 2)
            .map(|(r, _, _)| r)
            .collect())
    }

    fn render_region(
        &self,
        page_idx: usize,
        clip: Rect,
        scale: f32,
    ) -> Result<DynamicImage, BackendError> {
        let document = self.load()?;
        let page = document
            .pages()
            .get(page_idx as u16)
            .map_err(|e| page_err(page_idx, e))?;
        let page_w = page.width().value;
        let page_h = page.height().value;

        let render_config = PdfRenderConfig::new()
            .set_target_width((page_w * scale).round() as i32)
            .set_maximum_height((page_h * scale).round() as i32);

        let image = page
            .render_with_config(&render_config)
            .map_err(|e| page_err(page_idx, e))?
            .as_image();

        // Crop in pixel space. The effective scale may differ slightly from
        // the requested one after rounding, so derive it from the render.
        let px_per_unit = image.width() as f32 / page_w;
        let x = (clip.x0.max(0.0) * px_per_unit) as u32;
        let y = (clip.y0.max(0.0) * px_per_unit) as u32;
        let w = (clip.width() * px_per_unit) as u32;
        let h = (clip.height() * px_per_unit) as u32;
        let w = w.min(image.width().saturating_sub(x)).max(1);
        let h = h.min(image.height().saturating_sub(y)).max(1);

        Ok(image.crop_imm(x, y, w, h))
    }

    fn insert_hidden_text(
        &mut self,
        page: usize,
        at: Point,
        text: &str,
        font_size: f32,
    ) -> Result<(), BackendError> {
        if page >= self.page_count {
            return Err(BackendError::Page {
                page,
                detail: "page index out of range".into(),
            });
        }
        self.pending.push(PendingText {
            page,
            at,
            text: text.to_owned(),
            font_size,
        });
        Ok(())
    }

    fn save_copy(&self, out_path: &Path) -> Result<(), BackendError> {
        let mut document = self.load()?;
        let font = document.fonts_mut().helvetica();

        for pending in &self.pending {
            let mut page = document
                .pages()
                .get(pending.page as u16)
                .map_err(|e| page_err(pending.page, e))?;
            let page_h = page.height().value;

            let mut object = PdfPageTextObject::new(
                &document,
                &pending.text,
                font,
                PdfPoints::new(pending.font_size),
            )
            .map_err(|e| page_err(pending.page, e))?;
            // White fill: invisible on the page background, still literal
            // text to any extractor.
            object
                .set_fill_color(PdfColor::new(255, 255, 255, 255))
                .map_err(|e| page_err(pending.page, e))?;
            object
                .translate(
                    PdfPoints::new(pending.at.x),
                    PdfPoints::new(page_h - pending.at.y),
                )
                .map_err(|e| page_err(pending.page, e))?;
            page.objects_mut()
                .add_text_object(object)
                .map_err(|e| page_err(pending.page, e))?;
        }

        document.save_to_file(out_path).map_err(|e| BackendError::Save {
            detail: format!("{e:?}"),
        })?;
        debug!(
            "saved marked copy with {} insertions to '{}'",
            self.pending.len(),
            out_path.display()
        );
        Ok(())
    }
}
