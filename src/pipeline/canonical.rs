//! LaTeX canonicalization: deterministic rewrite passes for consistent
//! downstream embedding.
//!
//! Vision models transcribe the same formula many ways (`a/b`,
//! `\frac{a}{b}`, `$a/b$`). Canonicalization maps those spellings onto one
//! form so semantically equal formulas land near each other in vector space.
//!
//! ## Pass order (load-bearing)
//!
//! 1. Strip surrounding `$`/`$$` delimiters; collapse whitespace runs.
//! 2. Fraction inference: `a/b` and `(expr)/(expr)` → `\frac{..}{..}`.
//! 3. Function escaping: bare `sin`, `log`, `lim`, … → `\sin`, `\log`, …
//! 4. Operator substitution: `*` → `\cdot`, comparison and arrow symbols,
//!    `infinity`, `+/-`.
//! 5. Root notation: `sqrt(x)`, `cbrt(x)`, `nthroot(n,x)` → `\sqrt` forms.
//! 6. Sub/superscript bracing: `x_ab` → `x_{ab}`, `^2` → `^{2}`.
//! 7. Greek letters: bare names → control sequences. List order matters
//!    where one name could shadow another.
//! 8. Bracket pass: identity, reserved for auto-sizing.
//!
//! Every pass is total: malformed input degrades to best-effort output,
//! nothing returns an error. The whole pipeline is idempotent
//! (`canonicalize(canonicalize(x)) == canonicalize(x)`), which is what lets
//! already-clean LaTeX flow through unharmed.

use once_cell::sync::Lazy;
use regex::Regex;

/// Function names that get control-sequence-escaped when bare.
const FUNCTION_NAMES: [&str; 29] = [
    "sin", "cos", "tan", "cot", "sec", "csc", //
    "sinh", "cosh", "tanh", "coth", //
    "arcsin", "arccos", "arctan", //
    "asin", "acos", "atan", //
    "log", "ln", "exp", "lg", //
    "lim", "max", "min", "sup", "inf", //
    "det", "dim", "ker", "deg", //
];

/// Extra operator-like names escaped alongside [`FUNCTION_NAMES`].
const FUNCTION_NAMES_EXTRA: [&str; 6] = ["gcd", "lcm", "mod", "arg", "sgn", "abs"];

/// Greek letter names in substitution order. `pi` sits after `upsilon` and
/// `lambda` is a separately ordered case; the uppercase block runs last.
const GREEK_NAMES: [&str; 33] = [
    "alpha", "beta", "gamma", "delta", "epsilon", "zeta", //
    "eta", "theta", "iota", "kappa", "mu", //
    "nu", "xi", "rho", "sigma", "tau", //
    "upsilon", "phi", "chi", "psi", "omega", //
    "pi", "lambda", //
    "Gamma", "Delta", "Theta", "Lambda", "Xi", "Pi", //
    "Sigma", "Phi", "Psi", "Omega",
];

static FUNCTION_RULES: Lazy<Vec<(Regex, String)>> = Lazy::new(|| {
    FUNCTION_NAMES
        .iter()
        .chain(FUNCTION_NAMES_EXTRA.iter())
        .map(|name| word_rule(name))
        .collect()
});

static GREEK_RULES: Lazy<Vec<(Regex, String)>> =
    Lazy::new(|| GREEK_NAMES.iter().map(|name| word_rule(name)).collect());

static PAREN_FRACTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(([^()]+)\)/\(([^()]+)\)").expect("valid regex"));

static SQRT: Lazy<Regex> = Lazy::new(|| Regex::new(r"sqrt\(([^)]+)\)").expect("valid regex"));
static CBRT: Lazy<Regex> = Lazy::new(|| Regex::new(r"cbrt\(([^)]+)\)").expect("valid regex"));
static NTHROOT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"nthroot\((\d+),\s*([^)]+)\)").expect("valid regex"));

static INFINITY: Lazy<Regex> = Lazy::new(|| Regex::new(r"\binfinity\b").expect("valid regex"));

fn word_rule(name: &str) -> (Regex, String) {
    (
        Regex::new(&format!(r"\b{name}\b")).expect("valid regex"),
        format!("\\{name}"),
    )
}

/// Canonicalize a LaTeX string. Pure, deterministic, idempotent; never
/// fails. Empty or whitespace-only input yields an empty string.
pub fn canonicalize(latex: &str) -> String {
    if latex.trim().is_empty() {
        return String::new();
    }
    let s = strip_delimiters(latex);
    let s = collapse_whitespace(s);
    let s = pass_fractions(&s);
    let s = pass_functions(&s);
    let s = pass_operators(&s);
    let s = pass_roots(&s);
    let s = pass_scripts(&s);
    let s = pass_greek(&s);
    let s = pass_brackets(s);
    s.trim().to_string()
}

/// Pass 1a: remove at most one layer of `$` or `$$` on each side.
fn strip_delimiters(s: &str) -> &str {
    let s = s.trim();
    let s = s
        .strip_prefix("$$")
        .or_else(|| s.strip_prefix('$'))
        .unwrap_or(s);
    let s = s
        .strip_suffix("$$")
        .or_else(|| s.strip_suffix('$'))
        .unwrap_or(s);
    s.trim()
}

/// Pass 1b: collapse whitespace runs to single spaces.
fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Pass 2: fraction inference.
fn pass_fractions(s: &str) -> String {
    let simple = infer_simple_fractions(s);
    PAREN_FRACTION
        .replace_all(&simple, "\\frac{${1}}{${2}}")
        .into_owned()
}

/// `a/b` → `\frac{a}{b}` for single alphanumeric characters, when the
/// numerator is not the tail of an identifier or control sequence and the
/// denominator is not the head of one. `x/y/z` converts only the first pair;
/// `dy/dx` is left alone.
fn infer_simple_fractions(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len() + 8);
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '/' && i >= 1 && i + 1 < chars.len() {
            let num = chars[i - 1];
            let den = chars[i + 1];
            let prev_ok = i < 2 || {
                let p = chars[i - 2];
                p != '\\' && !p.is_ascii_alphabetic()
            };
            let next_ok = i + 2 >= chars.len() || !chars[i + 2].is_ascii_alphabetic();
            // The numerator must still be sitting at the tail of the output;
            // if an earlier fraction consumed it, this slash stays literal.
            if num.is_ascii_alphanumeric()
                && den.is_ascii_alphanumeric()
                && prev_ok
                && next_ok
                && out.ends_with(num)
            {
                out.pop();
                out.push_str("\\frac{");
                out.push(num);
                out.push_str("}{");
                out.push(den);
                out.push('}');
                i += 2;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

/// Pass 3: escape bare function names, in table order.
fn pass_functions(s: &str) -> String {
    let mut out = s.to_string();
    for (re, cmd) in FUNCTION_RULES.iter() {
        out = replace_word_unescaped(&out, re, cmd);
    }
    out
}

/// Pass 4: operator substitution. Ends with a whitespace collapse so the
/// padding around `\cdot` stays single-spaced no matter how often the pass
/// runs.
fn pass_operators(s: &str) -> String {
    let mut out = s.replace('*', " \\cdot ");
    out = out.replace(">=", "\\geq ");
    out = out.replace("<=", "\\leq ");
    out = out.replace("!=", "\\neq ");
    out = out.replace("~=", "\\approx ");
    out = out.replace("->", "\\rightarrow ");
    out = out.replace("<-", "\\leftarrow ");
    out = out.replace("=>", "\\Rightarrow ");
    out = replace_word_unescaped(&out, &INFINITY, "\\infty");
    out = out.replace("+/-", "\\pm ");
    out = out.replace("-/+", "\\mp ");
    collapse_whitespace(&out)
}

/// Pass 5: root notation, skipping forms already escaped.
fn pass_roots(s: &str) -> String {
    let out = replace_captures_unescaped(s, &SQRT, |caps| format!("\\sqrt{{{}}}", &caps[1]));
    let out = replace_captures_unescaped(&out, &CBRT, |caps| format!("\\sqrt[3]{{{}}}", &caps[1]));
    replace_captures_unescaped(&out, &NTHROOT, |caps| {
        format!("\\sqrt[{}]{{{}}}", &caps[1], &caps[2])
    })
}

/// Pass 6: sub/superscript bracing.
fn pass_scripts(s: &str) -> String {
    let out = brace_multichar_scripts(s, '_');
    let out = brace_multichar_scripts(&out, '^');
    brace_common_superscripts(&out)
}

/// `x_ab` → `x_{ab}` (and the same for `^`): runs of two or more
/// alphanumerics after the script mark get braces. Single characters stay
/// bare; already-braced scripts are untouched.
fn brace_multichar_scripts(s: &str, mark: char) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len() + 8);
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == mark {
            let start = i + 1;
            let mut end = start;
            while end < chars.len() && chars[end].is_ascii_alphanumeric() {
                end += 1;
            }
            let mut run_end = end;
            // A brace right after the run means its last character belongs
            // to the braced group that follows; leave that character out.
            if end < chars.len() && (chars[end] == '{' || chars[end] == '}') {
                run_end = run_end.saturating_sub(1);
            }
            if run_end - start >= 2 {
                out.push(mark);
                out.push('{');
                out.extend(&chars[start..run_end]);
                out.push('}');
                i = run_end;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

/// `^2`, `^3`, `^n` → `^{2}`, `^{3}`, `^{n}` unless already braced or part
/// of a longer run.
fn brace_common_superscripts(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len() + 8);
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '^' && i + 1 < chars.len() {
            let c = chars[i + 1];
            let next = chars.get(i + 2).copied();
            let blocked = match c {
                '2' | '3' => next.is_some_and(|n| n == '{' || n == '}' || n.is_ascii_digit()),
                'n' => next.is_some_and(|n| n == '{' || n == '}' || n.is_ascii_alphabetic()),
                _ => true,
            };
            if !blocked {
                out.push('^');
                out.push('{');
                out.push(c);
                out.push('}');
                i += 2;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

/// Pass 7: Greek letters, in [`GREEK_NAMES`] order.
fn pass_greek(s: &str) -> String {
    let mut out = s.to_string();
    for (re, cmd) in GREEK_RULES.iter() {
        out = replace_word_unescaped(&out, re, cmd);
    }
    out
}

/// Pass 8: bracket normalization. `\left`/`\right` auto-sizing is left to a
/// future pass; today this is the identity.
fn pass_brackets(s: String) -> String {
    s
}

/// Replace every match of `re` with `replacement`, skipping matches whose
/// preceding character is a backslash (already a control sequence). The
/// regex crate has no look-behind, so the check is done per match.
fn replace_word_unescaped(text: &str, re: &Regex, replacement: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for m in re.find_iter(text) {
        if text[..m.start()].ends_with('\\') {
            continue;
        }
        out.push_str(&text[last..m.start()]);
        out.push_str(replacement);
        last = m.end();
    }
    out.push_str(&text[last..]);
    out
}

/// Capture-group variant of [`replace_word_unescaped`].
fn replace_captures_unescaped<F>(text: &str, re: &Regex, build: F) -> String
where
    F: Fn(&regex::Captures<'_>) -> String,
{
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in re.captures_iter(text) {
        let m = match caps.get(0) {
            Some(m) => m,
            None => continue,
        };
        if text[..m.start()].ends_with('\\') {
            continue;
        }
        out.push_str(&text[last..m.start()]);
        out.push_str(&build(&caps));
        last = m.end();
    }
    out.push_str(&text[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_empty() {
        assert_eq!(canonicalize(""), "");
        assert_eq!(canonicalize("   "), "");
    }

    #[test]
    fn delimiters_are_stripped() {
        assert_eq!(canonicalize("$x$"), "x");
        assert_eq!(canonicalize("$$E = mc^2$$"), "E = mc^{2}");
    }

    #[test]
    fn whitespace_collapses() {
        assert_eq!(canonicalize("a   +\n  b"), "a + b");
    }

    #[test]
    fn simple_fraction() {
        assert_eq!(canonicalize("a/b"), "\\frac{a}{b}");
        assert_eq!(canonicalize("1/2"), "\\frac{1}{2}");
    }

    #[test]
    fn identifier_tails_are_not_fractions() {
        // `dy/dx` is a derivative spelled out, not `y` over `d`.
        assert_eq!(canonicalize("dy/dx"), "dy/dx");
    }

    #[test]
    fn chained_slashes_convert_only_the_first_pair() {
        assert_eq!(canonicalize("x/y/z"), "\\frac{x}{y}/z");
    }

    #[test]
    fn parenthesized_fraction() {
        assert_eq!(canonicalize("(a+b)/(c+d)"), "\\frac{a+b}{c+d}");
    }

    #[test]
    fn functions_are_escaped_once() {
        assert_eq!(canonicalize("sin(x) + cos(y)"), "\\sin(x) + \\cos(y)");
        assert_eq!(canonicalize("\\sin(x)"), "\\sin(x)");
        assert_eq!(canonicalize("arcsin(x)"), "\\arcsin(x)");
    }

    #[test]
    fn operators_substitute() {
        assert_eq!(canonicalize("a * b"), "a \\cdot b");
        assert_eq!(canonicalize("x >= y"), "x \\geq y");
        assert_eq!(canonicalize("f -> g"), "f \\rightarrow g");
        assert_eq!(canonicalize("n -> infinity"), "n \\rightarrow \\infty");
        assert_eq!(canonicalize("a +/- b"), "a \\pm b");
    }

    #[test]
    fn roots_normalize() {
        assert_eq!(canonicalize("sqrt(x+1)"), "\\sqrt{x+1}");
        assert_eq!(canonicalize("cbrt(x)"), "\\sqrt[3]{x}");
        assert_eq!(canonicalize("nthroot(4, x)"), "\\sqrt[4]{x}");
        assert_eq!(canonicalize("\\sqrt{x}"), "\\sqrt{x}");
    }

    #[test]
    fn multichar_scripts_get_braces() {
        assert_eq!(canonicalize("x_ab"), "x_{ab}");
        assert_eq!(canonicalize("x^ab"), "x^{ab}");
        // Single-character scripts stay bare.
        assert_eq!(canonicalize("x_a"), "x_a");
        assert_eq!(canonicalize("x_{ab}"), "x_{ab}");
    }

    #[test]
    fn common_superscripts_get_braces() {
        assert_eq!(canonicalize("x^2"), "x^{2}");
        assert_eq!(canonicalize("x^3 + y^n"), "x^{3} + y^{n}");
        assert_eq!(canonicalize("x^{2}"), "x^{2}");
    }

    #[test]
    fn greek_letters_escape_once() {
        assert_eq!(canonicalize("alpha"), "\\alpha");
        assert_eq!(canonicalize("\\alpha"), "\\alpha");
        assert_eq!(canonicalize("alpha + beta"), "\\alpha + \\beta");
        assert_eq!(canonicalize("lambda"), "\\lambda");
        assert_eq!(canonicalize("Pi"), "\\Pi");
        // `pi` must not corrupt longer names it could shadow.
        assert_eq!(canonicalize("upsilon"), "\\upsilon");
        assert_eq!(canonicalize("epsilon"), "\\epsilon");
    }

    #[test]
    fn idempotence_over_assorted_inputs() {
        let inputs = [
            "a/b",
            "x/y/z",
            "a * b",
            "$$E = mc^2$$",
            "sin(x) + alpha^2",
            "sqrt(x+1) >= nthroot(3, y)",
            "x_ab + y^cd",
            "n -> infinity",
            "(a+b)/(c+d)",
            "\\frac{\\partial f}{\\partial x} = \\nabla f",
            "totally not latex at all",
            "",
        ];
        for input in inputs {
            let once = canonicalize(input);
            let twice = canonicalize(&once);
            assert_eq!(once, twice, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn malformed_input_degrades_gracefully() {
        // Unbalanced braces and stray backslashes pass through untouched.
        assert_eq!(canonicalize("\\frac{a}{"), "\\frac{a}{");
        assert_eq!(canonicalize("{{{"), "{{{");
    }
}
