//! Formula description: semantic tags for embedding enrichment.
//!
//! Embedding models handle natural language better than raw LaTeX, so each
//! canonical formula is paired with a short tag phrase naming the structures
//! it contains. The scan is a fixed, ordered substring check; it never
//! fails and never returns an empty description.

/// Structural markers and their tags, checked in order. A marker is a set
/// of substrings any one of which triggers the tag.
const TAGS: [(&[&str], &str); 12] = [
    (&["\\frac"], "fraction/ratio"),
    (&["\\sum"], "summation"),
    (&["\\int"], "integral"),
    (&["\\prod"], "product"),
    (&["\\lim"], "limit"),
    (&["\\sin", "\\cos", "\\tan"], "trigonometric"),
    (&["\\sqrt"], "square root"),
    (&["="], "equation"),
    (&["\\geq", "\\leq", ">", "<"], "inequality"),
    (&["\\partial"], "partial derivative"),
    (&["\\nabla", "\\grad"], "gradient"),
    (&["\\matrix", "\\begin{matrix}"], "matrix"),
];

/// Describe a canonicalized LaTeX string for embedding.
///
/// Output format: a tag phrase opening with `Mathematical formula:`, then
/// the LaTeX on its own line prefixed `LaTeX: `. When no structural marker
/// matches, the opening phrase stands alone as the generic tag.
pub fn describe(latex: &str) -> String {
    let mut parts = vec!["Mathematical formula:"];
    for (markers, tag) in TAGS {
        if markers.iter().any(|m| latex.contains(m)) {
            parts.push(tag);
        }
    }
    format!("{}\nLaTeX: {latex}", parts.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::canonical::canonicalize;

    #[test]
    fn fraction_equation_combination() {
        let desc = describe(&canonicalize("a=c/d"));
        assert!(desc.contains("fraction/ratio"), "got: {desc}");
        assert!(desc.contains("equation"));
        assert!(desc.contains("LaTeX: a=\\frac{c}{d}"));
    }

    #[test]
    fn no_match_falls_back_to_generic_tag() {
        let desc = describe("x + y");
        assert!(desc.starts_with("Mathematical formula:\n"), "got: {desc}");
    }

    #[test]
    fn tags_appear_in_table_order() {
        let desc = describe("\\int \\frac{1}{x} dx = \\ln x");
        let frac = desc.find("fraction/ratio").expect("fraction tag");
        let int = desc.find("integral").expect("integral tag");
        assert!(frac < int);
    }

    #[test]
    fn inequality_and_gradient() {
        let desc = describe("\\nabla f \\geq 0");
        assert!(desc.contains("inequality"));
        assert!(desc.contains("gradient"));
    }

    #[test]
    fn latex_is_carried_verbatim_on_its_own_line() {
        let desc = describe("\\sum_{i=1}^{n} i");
        let mut lines = desc.lines();
        let tags = lines.next().expect("tag line");
        let latex = lines.next().expect("latex line");
        assert!(tags.contains("summation"));
        assert_eq!(latex, "LaTeX: \\sum_{i=1}^{n} i");
    }
}
