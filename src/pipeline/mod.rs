//! Pipeline stages for vector-formula extraction.
//!
//! Each submodule implements exactly one transformation step. Keeping the
//! stages separate makes each independently testable and lets a stage be
//! swapped (different geometry backend, different vision provider) without
//! touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! detect ──▶ inject ──▶ [external converter] ──▶ resolve
//! (geometry)  (markers)    (opaque, markdown)     (splice LaTeX)
//!                │                                    ▲
//!                └──▶ encode ──▶ vision ──────────────┘
//!                     (base64)   (image → LaTeX)
//!
//!                resolve ──▶ canonical ──▶ describe
//!                            (normalize)   (tags)
//! ```
//!
//! 1. [`detect`]    clusters vector primitives into candidate regions
//! 2. [`inject`]    renders candidates and stamps invisible marker tokens
//! 3. [`encode`]    PNG-encodes and base64-wraps each crop for the
//!    multimodal API request body
//! 4. [`vision`]    turns images into LaTeX with retry/backoff; the only
//!    stage with network I/O
//! 5. [`resolve`]   splices extracted LaTeX into the converter's markdown
//! 6. [`canonical`] applies deterministic LaTeX rewrite passes
//! 7. [`describe`]  builds a semantic tag phrase for embedding enrichment

pub mod canonical;
pub mod describe;
pub mod detect;
pub mod encode;
pub mod inject;
pub mod resolve;
pub mod vision;
