//! # formula2md
//!
//! Extract vector-drawn mathematical formulas from PDF documents and resolve
//! them into canonical LaTeX inside the converted Markdown.
//!
//! ## Why this crate?
//!
//! Many technical PDFs carry their formulas as raw vector drawings: bare
//! line and curve primitives with no text layer at all. Every text-based
//! converter walks straight past them: the surrounding prose survives, the
//! math silently vanishes. This crate finds those formula-shaped drawing
//! clusters geometrically, has a vision model transcribe each one to LaTeX,
//! and smuggles formula identity through the (opaque) document converter
//! with an invisible-marker protocol so the LaTeX lands back exactly where
//! the drawing was.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Detect   cluster vector primitives, filter tables/margins/noise
//!  ├─ 2. Inject   render crops, stamp invisible ##FORMULA_nnn## tokens
//!  ├─ 3. Convert  external converter emits markdown, tokens pass through
//!  ├─ 4. Vision   concurrent crop → LaTeX calls with retry/backoff
//!  ├─ 5. Resolve  tokens → $$…$$ display blocks; mismatches counted
//!  └─ 6. Finish   canonicalize LaTeX + describe for embedding
//! ```
//!
//! Documents with no vector math fall back to page-scan mode: whole pages go
//! to the vision model and extracted formulas are paired with converter
//! placeholders by order.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use formula2md::{process_document, ExtractionConfig, LlmVision, PdfiumBackend};
//! use std::sync::Arc;
//!
//! # struct MyConverter;
//! # #[async_trait::async_trait]
//! # impl formula2md::MarkdownConverter for MyConverter {
//! #     async fn convert(&self, _d: &std::path::Path)
//! #         -> Result<String, Box<dyn std::error::Error + Send + Sync>> { Ok(String::new()) }
//! # }
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExtractionConfig::default();
//!     let backend = PdfiumBackend::open("report.pdf", None)?;
//!     let provider = edgequake_llm::ProviderFactory::create_llm_provider("openai", "gpt-4.1")?;
//!     let model = Arc::new(LlmVision::new(provider));
//!     let output = process_document(backend, "report.pdf", &MyConverter, model, &config).await?;
//!     println!("{}", output.markdown);
//!     eprintln!("{} formulas resolved", output.stats.formulas_extracted);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `pdfium` | on      | Enables [`PdfiumBackend`] (pdfium-render) |
//!
//! Disable `pdfium` when supplying your own [`PageGeometry`] implementation:
//! ```toml
//! formula2md = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backend;
pub mod config;
pub mod error;
pub mod extract;
pub mod geometry;
pub mod marker;
pub mod output;
pub mod pipeline;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use backend::{BackendError, PageGeometry};
pub use config::{ExtractionConfig, ExtractionConfigBuilder};
pub use error::{ExtractionFailure, Formula2MdError};
pub use extract::{
    extract_formulas, extract_page_formulas, prepare_document, process_document, process_to_file,
    MarkdownConverter,
};
pub use geometry::{PageRegion, Point, Rect};
pub use marker::{MarkerSequence, MarkerToken};
pub use output::{
    DocumentOutput, ExtractedFormula, ExtractionStats, FormulaCandidate, MarkedDocument,
    PreparedDocument, ResolutionReport,
};
pub use pipeline::canonical::canonicalize;
pub use pipeline::describe::describe;
pub use pipeline::vision::{LlmVision, VisionModel};

#[cfg(feature = "pdfium")]
pub use backend::pdfium::PdfiumBackend;
