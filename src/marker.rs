//! The invisible-marker protocol alphabet.
//!
//! Markers are the side channel that carries formula identity through the
//! external document-to-text converter: the injector (sender) stamps a token
//! into the document as invisible text, the converter passes it through as
//! literal text, and the resolver (receiver) finds it in the converter's
//! output and substitutes the extracted LaTeX. Both ends must agree on the
//! token format, so it is defined in exactly one place: here.
//!
//! Token shape: `##FORMULA_` + zero-padded sequence + `##`, e.g.
//! `##FORMULA_007##`. Sequence numbers are monotonic in discovery order and
//! unique within one document.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Leading sentinel of every marker token.
pub const MARKER_PREFIX: &str = "##FORMULA_";
/// Trailing sentinel of every marker token.
pub const MARKER_SUFFIX: &str = "##";

/// A single marker token, unique within one document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarkerToken {
    seq: u32,
    text: String,
}

impl MarkerToken {
    /// Build the token for sequence number `seq`.
    pub fn new(seq: u32) -> Self {
        // Three digits of zero padding; wider sequences are not truncated.
        let text = format!("{MARKER_PREFIX}{seq:03}{MARKER_SUFFIX}");
        Self { seq, text }
    }

    /// The sequence number encoded in this token.
    pub fn seq(&self) -> u32 {
        self.seq
    }

    /// The literal text stamped into the document.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Parse a token back from its literal text. Used by tests and by the
    /// resolver when auditing leftover markers.
    pub fn parse(s: &str) -> Option<Self> {
        let body = s.strip_prefix(MARKER_PREFIX)?.strip_suffix(MARKER_SUFFIX)?;
        if body.is_empty() || !body.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let seq: u32 = body.parse().ok()?;
        Some(Self::new(seq))
    }
}

impl fmt::Display for MarkerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Monotonic token issuer, scoped to one document ingestion.
#[derive(Debug, Default)]
pub struct MarkerSequence {
    next: u32,
}

impl MarkerSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next token. Tokens are never reused within a sequence.
    pub fn issue(&mut self) -> MarkerToken {
        let token = MarkerToken::new(self.next);
        self.next += 1;
        token
    }

    /// How many tokens have been issued so far.
    pub fn issued(&self) -> u32 {
        self.next
    }
}
