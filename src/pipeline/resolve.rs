//! Marker resolution: splice extracted LaTeX back into the converter text.
//!
//! This is the receiver side of the marker protocol. Two modes:
//!
//! * [`resolve_markers`] is the normal path. Every resolved formula's token
//!   is replaced, wherever it appears, by a display-math block. Tokens the
//!   converter dropped and formulas whose extraction failed are counted,
//!   never silently fixed; a failed formula's token stays in the text as a
//!   visible artifact.
//!
//! * [`resolve_placeholders`] is the fallback for converters that mangle markers
//!   but emit their own formula placeholders (`$$(Formule 3.1)$$`, often
//!   with the word spread letter by letter). Placeholders are paired with
//!   formulas by document order, an explicitly unreliable heuristic, so
//!   every count mismatch is reported.

use crate::output::{ExtractedFormula, ResolutionReport};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

/// Converter output sometimes renders a placeholder with the word "Formule"
/// spread out (`$$( F o r m u l e 3 . 1 )$$`). Each letter after the first
/// is optional and whitespace may appear anywhere.
static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\$\$\s*\(\s*[Ff]\s*o?\s*r?\s*m?\s*u?\s*l?\s*e?\s*[\s\\]*(\d+)\s*\.?\s*(\d+)\s*\)\s*\$\$",
    )
    .expect("placeholder regex is valid")
});

fn display_block(latex: &str) -> String {
    format!("\n\n$${latex}$$\n\n")
}

/// Replace marker tokens with display-math blocks.
pub fn resolve_markers(
    markdown: &str,
    formulas: &[ExtractedFormula],
) -> (String, ResolutionReport) {
    let mut text = markdown.to_string();
    let mut report = ResolutionReport::default();

    for formula in formulas {
        let Some(marker) = &formula.marker else {
            continue;
        };
        if !formula.is_resolved() {
            report.failed_extractions += 1;
            debug!("{}: extraction failed, token left in place", marker);
            continue;
        }
        if !text.contains(marker.as_str()) {
            report.markers_not_in_text += 1;
            warn!("{}: token absent from converter text", marker);
            continue;
        }
        text = text.replace(marker.as_str(), &display_block(&formula.normalized_latex));
        report.replaced += 1;
    }

    (text, report)
}

/// Replace converter-emitted placeholders with display-math blocks, pairing
/// the i-th placeholder with the i-th formula.
pub fn resolve_placeholders(
    markdown: &str,
    formulas: &[ExtractedFormula],
) -> (String, ResolutionReport) {
    let mut report = ResolutionReport::default();
    let resolved: Vec<&ExtractedFormula> =
        formulas.iter().filter(|f| f.is_resolved()).collect();
    report.failed_extractions = formulas.len() - resolved.len();

    let mut next = 0usize;
    let text = PLACEHOLDER
        .replace_all(markdown, |caps: &regex::Captures<'_>| {
            if let Some(formula) = resolved.get(next) {
                next += 1;
                report.replaced += 1;
                display_block(&formula.normalized_latex)
            } else {
                report.placeholders_unfilled += 1;
                caps[0].to_string()
            }
        })
        .into_owned();

    report.formulas_unplaced = resolved.len().saturating_sub(next);
    if report.placeholders_unfilled > 0 || report.formulas_unplaced > 0 {
        warn!(
            "placeholder pairing mismatch: {} placeholders unfilled, {} formulas unplaced",
            report.placeholders_unfilled, report.formulas_unplaced
        );
    }

    (text, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marker::MarkerToken;

    fn formula(seq: u32, latex: Option<&str>) -> ExtractedFormula {
        ExtractedFormula {
            marker: Some(MarkerToken::new(seq)),
            page: 1,
            region: None,
            location: None,
            raw_latex: latex.map(str::to_string),
            normalized_latex: latex.unwrap_or_default().to_string(),
            description: String::new(),
            failure: None,
        }
    }

    fn page_formula(latex: Option<&str>) -> ExtractedFormula {
        ExtractedFormula {
            marker: None,
            ..formula(0, latex)
        }
    }

    #[test]
    fn resolved_marker_becomes_display_block() {
        let md = "Intro.\n\n##FORMULA_000##\n\nOutro.";
        let (text, report) = resolve_markers(md, &[formula(0, Some("\\frac{a}{b}"))]);
        assert!(text.contains("\n\n$$\\frac{a}{b}$$\n\n"));
        assert!(!text.contains("##FORMULA_000##"));
        assert_eq!(report.replaced, 1);
    }

    #[test]
    fn every_occurrence_of_a_token_is_replaced() {
        let md = "##FORMULA_000## and again ##FORMULA_000##";
        let (text, report) = resolve_markers(md, &[formula(0, Some("x"))]);
        assert!(!text.contains("##FORMULA_000##"));
        assert_eq!(text.matches("$$x$$").count(), 2);
        // Counted once per formula, not per occurrence.
        assert_eq!(report.replaced, 1);
    }

    #[test]
    fn dropped_marker_is_counted_not_fixed() {
        let md = "The converter ate the token.";
        let (text, report) = resolve_markers(md, &[formula(0, Some("x"))]);
        assert_eq!(text, md);
        assert_eq!(report.markers_not_in_text, 1);
        assert_eq!(report.replaced, 0);
    }

    #[test]
    fn failed_extraction_leaves_token_verbatim() {
        let md = "Before ##FORMULA_000## after.";
        let (text, report) = resolve_markers(md, &[formula(0, None)]);
        assert!(text.contains("##FORMULA_000##"));
        assert_eq!(report.failed_extractions, 1);
        assert_eq!(report.replaced, 0);
    }

    #[test]
    fn placeholder_pairing_by_order() {
        let md = "a $$(Formule 3.1)$$ b $$( F o r m u l e 3 . 2 )$$ c";
        let formulas = [page_formula(Some("x")), page_formula(Some("y"))];
        let (text, report) = resolve_placeholders(md, &formulas);
        assert!(text.contains("$$x$$"));
        assert!(text.contains("$$y$$"));
        assert!(text.find("$$x$$").unwrap() < text.find("$$y$$").unwrap());
        assert_eq!(report.replaced, 2);
        assert_eq!(report.placeholders_unfilled, 0);
        assert_eq!(report.formulas_unplaced, 0);
    }

    #[test]
    fn surplus_placeholders_are_left_and_counted() {
        let md = "$$(Formule 1.1)$$ and $$(Formule 1.2)$$";
        let (text, report) = resolve_placeholders(md, &[page_formula(Some("x"))]);
        assert!(text.contains("$$x$$"));
        assert!(text.contains("$$(Formule 1.2)$$"));
        assert_eq!(report.replaced, 1);
        assert_eq!(report.placeholders_unfilled, 1);
    }

    #[test]
    fn surplus_formulas_are_counted() {
        let md = "$$(Formule 1.1)$$";
        let formulas = [page_formula(Some("x")), page_formula(Some("y"))];
        let (_, report) = resolve_placeholders(md, &formulas);
        assert_eq!(report.replaced, 1);
        assert_eq!(report.formulas_unplaced, 1);
    }

    #[test]
    fn failed_page_formulas_are_skipped_in_pairing() {
        let md = "$$(Formule 2.1)$$";
        let formulas = [page_formula(None), page_formula(Some("y"))];
        let (text, report) = resolve_placeholders(md, &formulas);
        assert!(text.contains("$$y$$"));
        assert_eq!(report.failed_extractions, 1);
    }
}
