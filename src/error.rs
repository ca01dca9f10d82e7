//! Error types for the formula2md library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Formula2MdError`] is **fatal**: the ingestion cannot proceed at all
//!   (missing document, unusable backend, output path not writable).
//!   Returned as `Err(Formula2MdError)` from the top-level entry points.
//!
//! * [`ExtractionFailure`] is **non-fatal**: one candidate's vision call
//!   failed (transport error, timeout, unparseable reply). Stored on the
//!   [`crate::output::ExtractedFormula`] with `raw_latex = None` so callers
//!   can inspect partial success rather than losing the whole document to
//!   one bad formula.
//!
//! Per-page geometry scan failures are a third, even softer category: they
//! are logged and collapse to an empty candidate list for that page, never
//! surfacing as an error value at all.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the formula2md library.
///
/// Per-candidate failures use [`ExtractionFailure`] and are stored in
/// [`crate::output::ExtractedFormula`] rather than propagated here.
#[derive(Debug, Error)]
pub enum Formula2MdError {
    /// Input document was not found at the given path.
    #[error("document not found: '{path}'\nCheck the path exists and is readable.")]
    DocumentNotFound { path: PathBuf },

    /// The page-geometry backend failed in a way that affects the whole
    /// document (not a single page).
    #[error("page-geometry backend error: {detail}")]
    Backend { detail: String },

    /// The external document-to-text converter failed.
    #[error("document converter failed for '{path}': {detail}")]
    ConverterFailed { path: PathBuf, detail: String },

    /// Could not persist the marked document copy.
    #[error("failed to write marked document '{path}': {detail}")]
    MarkedDocumentWriteFailed { path: PathBuf, detail: String },

    /// Could not create or write the output Markdown file.
    #[error("failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Builder validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// A non-fatal failure for a single formula candidate.
///
/// Recorded on [`crate::output::ExtractedFormula`] when the vision call for
/// that one candidate fails. Sibling candidates are unaffected.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum ExtractionFailure {
    /// The vision API call failed after all retries.
    #[error("vision call failed after {retries} retries: {detail}")]
    Api { retries: u8, detail: String },

    /// The vision API call exceeded the configured deadline.
    #[error("vision call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The reply arrived but did not match either response contract.
    #[error("unparseable vision reply: {detail}")]
    UnparseableReply { detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_display_includes_path() {
        let e = Formula2MdError::DocumentNotFound {
            path: PathBuf::from("missing.pdf"),
        };
        assert!(e.to_string().contains("missing.pdf"));
    }

    #[test]
    fn failure_display_api() {
        let f = ExtractionFailure::Api {
            retries: 3,
            detail: "HTTP 503".into(),
        };
        let msg = f.to_string();
        assert!(msg.contains("3 retries"), "got: {msg}");
        assert!(msg.contains("HTTP 503"));
    }

    #[test]
    fn failure_display_timeout() {
        let f = ExtractionFailure::Timeout { secs: 60 };
        assert!(f.to_string().contains("60s"));
    }

    #[test]
    fn failure_serializes() {
        let f = ExtractionFailure::Timeout { secs: 5 };
        let json = serde_json::to_string(&f).expect("serialize");
        assert!(json.contains("Timeout"));
    }
}
