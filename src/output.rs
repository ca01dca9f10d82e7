//! Result types: candidates, extracted formulas, reports, and statistics.

use crate::error::ExtractionFailure;
use crate::geometry::{PageRegion, Rect};
use crate::marker::MarkerToken;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A detected candidate region, rendered and assigned a marker.
///
/// Created by the injector; owned by the injection step until the vision
/// adapter resolves it into an [`ExtractedFormula`].
#[derive(Debug, Clone)]
pub struct FormulaCandidate {
    /// Where on the document the candidate sits.
    pub region: PageRegion,
    /// The token stamped invisibly at this region's location.
    pub marker: MarkerToken,
    /// The upscaled raster crop sent to the vision model.
    pub image: DynamicImage,
}

/// The document handed to the external converter.
///
/// Either a marked copy (a new artifact; the source file is never touched)
/// or, when no candidates survived injection, the original document itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkedDocument {
    pub path: PathBuf,
    /// True when `path` points at a marked copy rather than the original.
    pub marked: bool,
}

/// Output of the detection/injection phase, before any vision calls.
#[derive(Debug)]
pub struct PreparedDocument {
    /// Document to feed the external converter.
    pub document: MarkedDocument,
    /// Surviving candidates in discovery order.
    pub candidates: Vec<FormulaCandidate>,
    /// Pages actually scanned.
    pub pages_scanned: usize,
    /// Pages whose geometry scan failed and was skipped.
    pub page_scan_errors: usize,
    /// Candidates discarded because their render was near-blank.
    pub skipped_blank: usize,
}

/// One formula correlated across the pipeline stages.
///
/// Created when a candidate (or page-scan hit) enters the vision stage and
/// never mutated after resolution. `raw_latex = None` means the extraction
/// failed; `failure` says why.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedFormula {
    /// Marker token, present in marker mode; absent for page-scan hits.
    pub marker: Option<MarkerToken>,
    /// One-based page number.
    pub page: usize,
    /// Source region, present in marker mode.
    pub region: Option<Rect>,
    /// Free-text location hint, present in page-scan mode. Never parsed.
    pub location: Option<String>,
    /// LaTeX exactly as the vision model produced it (after fence/`$` cleanup).
    pub raw_latex: Option<String>,
    /// Canonicalized LaTeX; empty when extraction failed.
    pub normalized_latex: String,
    /// Semantic tag phrase plus the canonical LaTeX, for embedding.
    pub description: String,
    /// Why extraction failed, when it did.
    pub failure: Option<ExtractionFailure>,
}

impl ExtractedFormula {
    /// Whether the vision stage produced usable LaTeX for this formula.
    pub fn is_resolved(&self) -> bool {
        self.raw_latex.is_some()
    }
}

/// Marker-resolution accounting. Mismatches are counted, never silently
/// fixed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionReport {
    /// Markers (or placeholders) replaced with a display-math block.
    pub replaced: usize,
    /// Formulas whose marker never appeared in the converter text.
    pub markers_not_in_text: usize,
    /// Formulas with `raw_latex = None`; their markers stay verbatim.
    pub failed_extractions: usize,
    /// Placeholder-mode only: placeholders left over after the formula list
    /// ran out.
    pub placeholders_unfilled: usize,
    /// Placeholder-mode only: formulas left over after the placeholders ran
    /// out.
    pub formulas_unplaced: usize,
}

/// Aggregate statistics for one document ingestion.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ExtractionStats {
    pub pages_scanned: usize,
    pub page_scan_errors: usize,
    pub candidates_detected: usize,
    pub candidates_skipped_blank: usize,
    pub markers_injected: usize,
    pub formulas_extracted: usize,
    pub extraction_failures: usize,
    pub detect_duration_ms: u64,
    pub vision_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Everything the end-to-end pipeline returns.
#[derive(Debug)]
pub struct DocumentOutput {
    /// Converter text with markers resolved into display-math blocks.
    pub markdown: String,
    /// Every formula that entered the vision stage, resolved or not.
    pub formulas: Vec<ExtractedFormula>,
    pub report: ResolutionReport,
    pub stats: ExtractionStats,
}
