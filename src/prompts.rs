//! Fixed instruction prompts for the vision extraction adapter.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth**: the response parsers in
//!    [`crate::pipeline::vision`] are written against the exact wording
//!    below; changing a sentinel (`FORMULA:`, `NO_FORMULAS`, …) requires
//!    editing exactly one place on each side.
//!
//! 2. **Testability**: unit tests can inspect prompts directly without
//!    spinning up a real vision model.

/// Prompt for a single cropped candidate region (marker mode).
///
/// The reply must open with the `FORMULA: YES` / `FORMULA: NO` indicator
/// that [`crate::pipeline::vision::parse_single_region`] keys on.
pub const SINGLE_REGION_PROMPT: &str = r#"Analyze this image carefully.

If this image contains a mathematical formula, equation, or expression:
1. First, respond with "FORMULA: YES"
2. Then on the next line, provide the LaTeX representation of the formula/equation

If this image does NOT contain a mathematical formula (e.g., it's a diagram, photo, chart, etc.):
1. Respond with "FORMULA: NO"
2. Then provide a brief description of what the image shows

Be precise with the LaTeX - include all symbols, subscripts, superscripts, fractions, etc. exactly as shown.
Do not wrap the LaTeX in $$ or code blocks."#;

/// Prompt for a whole rendered page (page-scan mode).
///
/// The reply is either the `NO_FORMULAS` sentinel or a sequence of
/// `FORMULA_START`/`FORMULA_END` blocks parsed by
/// [`crate::pipeline::vision::parse_page_response`].
pub const WHOLE_PAGE_PROMPT: &str = r#"Analyze this PDF page image carefully.

Find ALL mathematical formulas, equations, or expressions on this page.
For each formula found:
1. Extract the complete LaTeX representation
2. Note approximately where it appears (e.g., "after paragraph about heat loss", "in the middle of the page")

Respond in this format for EACH formula found:
FORMULA_START
LOCATION: [brief description of where on page]
LATEX: [the LaTeX code]
FORMULA_END

If there are NO mathematical formulas on this page, respond with:
NO_FORMULAS

Be precise with the LaTeX - include all symbols, subscripts, superscripts, fractions, Greek letters, integrals, etc."#;
