//! Marker injection: render candidates and stamp invisible tokens.
//!
//! This is the sender side of the marker protocol. For each candidate
//! region, in discovery order: render an upscaled crop for the vision model,
//! drop the candidate if the crop is near-blank, otherwise issue the next
//! sequential [`MarkerToken`] and insert it as invisible text just inside
//! the top of the region. Insertions mutate only the backend's working copy;
//! the marked document is persisted as a new artifact and the source file is
//! never touched.
//!
//! When zero candidates survive, the original document is returned unmarked
//! and the caller can skip the converter round trip entirely.

use crate::backend::PageGeometry;
use crate::config::ExtractionConfig;
use crate::error::Formula2MdError;
use crate::geometry::{PageRegion, Point};
use crate::marker::MarkerSequence;
use crate::output::{FormulaCandidate, MarkedDocument};
use image::DynamicImage;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};

/// What injection produced: the document for the converter plus the
/// surviving candidates.
#[derive(Debug)]
pub struct InjectionOutcome {
    pub document: MarkedDocument,
    pub candidates: Vec<FormulaCandidate>,
    /// Candidates dropped because their crop was near-blank or failed to
    /// render. Dropped candidates consume no marker sequence number.
    pub skipped: usize,
}

/// Render, filter, and mark every candidate region, then persist the marked
/// copy (if any marker was placed) beside the system temp directory.
pub fn inject_markers<B: PageGeometry + ?Sized>(
    backend: &mut B,
    source: &Path,
    regions: &[PageRegion],
    config: &ExtractionConfig,
) -> Result<InjectionOutcome, Formula2MdError> {
    let mut sequence = MarkerSequence::new();
    let mut candidates = Vec::new();
    let mut skipped = 0usize;

    for region in regions {
        let clip = region
            .rect
            .inflate(config.render_padding, config.render_padding);
        let image = match backend.render_region(region.page, clip, config.render_scale) {
            Ok(img) => img,
            Err(e) => {
                warn!("page {}: candidate render failed, dropping: {}", region.page, e);
                skipped += 1;
                continue;
            }
        };

        if !has_distinct_colors(&image, config.min_color_count) {
            debug!(
                "page {}: near-blank candidate at {:?}, dropping",
                region.page, region.rect
            );
            skipped += 1;
            continue;
        }

        let token = sequence.issue();
        let at = Point::new(region.rect.x0, region.rect.y0 + config.marker_offset_y);
        backend
            .insert_hidden_text(region.page, at, token.as_str(), config.marker_font_size)
            .map_err(|e| Formula2MdError::Backend {
                detail: format!("marker insertion on page {}: {}", region.page, e),
            })?;

        candidates.push(FormulaCandidate {
            region: *region,
            marker: token,
            image,
        });
    }

    if candidates.is_empty() {
        info!("no candidates survived injection; returning original document");
        return Ok(InjectionOutcome {
            document: MarkedDocument {
                path: source.to_path_buf(),
                marked: false,
            },
            candidates,
            skipped,
        });
    }

    let marked_path = marked_copy_path(source);
    backend
        .save_copy(&marked_path)
        .map_err(|e| Formula2MdError::MarkedDocumentWriteFailed {
            path: marked_path.clone(),
            detail: e.to_string(),
        })?;
    info!(
        "injected {} markers, marked copy at '{}'",
        candidates.len(),
        marked_path.display()
    );

    Ok(InjectionOutcome {
        document: MarkedDocument {
            path: marked_path,
            marked: true,
        },
        candidates,
        skipped,
    })
}

/// Where the marked copy lands: `<tmp>/<stem>_marked.<ext>`.
fn marked_copy_path(source: &Path) -> std::path::PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    let ext = source
        .extension()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "pdf".to_string());
    std::env::temp_dir().join(format!("{stem}_marked.{ext}"))
}

/// True when the image contains at least `threshold` distinct colours.
///
/// Counting stops as soon as the threshold is reached, so a real formula
/// crop (dozens of anti-aliased shades) costs a few pixels, not a
/// histogram.
fn has_distinct_colors(image: &DynamicImage, threshold: u32) -> bool {
    if threshold <= 1 {
        return true;
    }
    let rgba = image.to_rgba8();
    let mut seen: HashSet<[u8; 4]> = HashSet::new();
    for pixel in rgba.pixels() {
        if seen.insert(pixel.0) && seen.len() as u32 >= threshold {
            return true;
        }
    }
    false
}
