//! End-to-end document ingestion entry points.
//!
//! Orchestrates the pipeline stages: geometric detection and marker
//! injection (blocking, so wrapped in `spawn_blocking`), the external
//! document-to-text converter, concurrent vision extraction, marker
//! resolution, and canonicalization. Returns a [`DocumentOutput`] with the
//! resolved markdown, every formula (resolved or not), the resolution
//! report, and timing statistics.
//!
//! Nothing in here aborts a document for a per-formula problem: vision
//! failures become failed-extraction records, dropped markers become report
//! counts, and partial results are always returned.

use crate::backend::PageGeometry;
use crate::config::ExtractionConfig;
use crate::error::Formula2MdError;
use crate::output::{DocumentOutput, ExtractedFormula, ExtractionStats, PreparedDocument};
use crate::pipeline::vision::{
    self, PageFormula, RegionReply, VisionModel,
};
use crate::pipeline::{canonical, describe, detect, encode, inject, resolve};
use crate::prompts::{SINGLE_REGION_PROMPT, WHOLE_PAGE_PROMPT};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// The opaque external document-to-text converter.
///
/// The pipeline assumes, but cannot verify, that the converter passes
/// unrecognized literal text (the marker tokens) through verbatim.
#[async_trait]
pub trait MarkdownConverter: Send + Sync {
    async fn convert(
        &self,
        document: &Path,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>>;
}

/// Run detection and injection for one document.
///
/// Backend work is synchronous (PDF libraries are not async-safe), so the
/// whole phase runs on the blocking pool. The backend is returned so the
/// caller can reuse it for page-scan mode.
pub async fn prepare_document<B>(
    mut backend: B,
    source: impl Into<PathBuf>,
    config: &ExtractionConfig,
) -> Result<(B, PreparedDocument), Formula2MdError>
where
    B: PageGeometry + Send + 'static,
{
    let source = source.into();
    if !source.exists() {
        return Err(Formula2MdError::DocumentNotFound { path: source });
    }

    let config = config.clone();
    let handle = tokio::task::spawn_blocking(move || {
        let pages_scanned = backend.page_count();
        let (regions, page_scan_errors) = detect::scan_document(&backend, &config);
        info!(
            "detected {} candidate regions across {} pages ({} page errors)",
            regions.len(),
            pages_scanned,
            page_scan_errors
        );

        let outcome = inject::inject_markers(&mut backend, &source, &regions, &config)?;
        Ok::<_, Formula2MdError>((
            backend,
            PreparedDocument {
                document: outcome.document,
                candidates: outcome.candidates,
                pages_scanned,
                page_scan_errors,
                skipped_blank: outcome.skipped,
            },
        ))
    });

    handle
        .await
        .map_err(|e| Formula2MdError::Internal(format!("blocking task panicked: {e}")))?
}

/// Extract LaTeX for every candidate via the vision model, with bounded
/// concurrency. Results come back in marker-sequence order.
pub async fn extract_formulas(
    model: Arc<dyn VisionModel>,
    prepared: &PreparedDocument,
    config: &ExtractionConfig,
) -> Vec<ExtractedFormula> {
    let mut formulas: Vec<ExtractedFormula> =
        stream::iter(prepared.candidates.iter().map(|candidate| {
            let model = Arc::clone(&model);
            let candidate = candidate.clone();
            let config = config.clone();
            async move {
                let (raw_latex, description, failure) = match encode::encode_image(&candidate.image)
                {
                    Ok(image_data) => {
                        match vision::query_with_retry(
                            model.as_ref(),
                            SINGLE_REGION_PROMPT,
                            image_data,
                            config.max_tokens,
                            &config,
                        )
                        .await
                        .and_then(|reply| vision::parse_single_region(&reply))
                        {
                            Ok(RegionReply::Formula(latex)) => (Some(latex), None, None),
                            Ok(RegionReply::NotFormula(prose)) => {
                                debug!("{}: not a formula per vision model", candidate.marker);
                                (None, Some(prose), None)
                            }
                            Err(failure) => {
                                warn!("{}: extraction failed: {}", candidate.marker, failure);
                                (None, None, Some(failure))
                            }
                        }
                    }
                    Err(e) => {
                        warn!("{}: image encoding failed: {}", candidate.marker, e);
                        let failure = crate::error::ExtractionFailure::Api {
                            retries: 0,
                            detail: format!("image encoding failed: {e}"),
                        };
                        (None, None, Some(failure))
                    }
                };

                let (normalized_latex, description) = match (&raw_latex, description) {
                    (Some(latex), _) => {
                        let normalized = canonical::canonicalize(latex);
                        let desc = describe::describe(&normalized);
                        (normalized, desc)
                    }
                    (None, Some(prose)) => (String::new(), prose),
                    (None, None) => (String::new(), String::new()),
                };

                ExtractedFormula {
                    marker: Some(candidate.marker.clone()),
                    page: candidate.region.page + 1,
                    region: Some(candidate.region.rect),
                    location: None,
                    raw_latex,
                    normalized_latex,
                    description,
                    failure,
                }
            }
        }))
        .buffer_unordered(config.concurrency)
        .collect()
        .await;

    // buffer_unordered returns in completion order; restore marker order.
    formulas.sort_by_key(|f| f.marker.as_ref().map(|m| m.seq()));
    formulas
}

/// Page-scan fallback: render whole pages and ask the vision model for every
/// formula on each, with its approximate location.
pub async fn extract_page_formulas<B>(
    backend: B,
    model: Arc<dyn VisionModel>,
    config: &ExtractionConfig,
) -> Result<(B, Vec<ExtractedFormula>), Formula2MdError>
where
    B: PageGeometry + Send + 'static,
{
    // Render everything up front on the blocking pool, then fan the vision
    // calls out concurrently.
    let scale = config.page_dpi as f32 / 72.0;
    let (backend, rendered) = tokio::task::spawn_blocking(move || {
        let mut rendered = Vec::new();
        for page in 0..backend.page_count() {
            match backend.render_page(page, scale) {
                Ok(image) => rendered.push((page, image)),
                Err(e) => warn!("page {}: render failed, skipping: {}", page, e),
            }
        }
        (backend, rendered)
    })
    .await
    .map_err(|e| Formula2MdError::Internal(format!("blocking task panicked: {e}")))?;

    let mut per_page: Vec<(usize, Vec<ExtractedFormula>)> =
        stream::iter(rendered.into_iter().map(|(page, image)| {
            let model = Arc::clone(&model);
            let config = config.clone();
            async move {
                let formulas = scan_one_page(model.as_ref(), page, &image, &config).await;
                (page, formulas)
            }
        }))
        .buffer_unordered(config.concurrency)
        .collect()
        .await;

    per_page.sort_by_key(|(page, _)| *page);
    let formulas = per_page.into_iter().flat_map(|(_, f)| f).collect();
    Ok((backend, formulas))
}

async fn scan_one_page(
    model: &dyn VisionModel,
    page: usize,
    image: &image::DynamicImage,
    config: &ExtractionConfig,
) -> Vec<ExtractedFormula> {
    let image_data = match encode::encode_image(image) {
        Ok(data) => data,
        Err(e) => {
            warn!("page {}: image encoding failed: {}", page, e);
            return Vec::new();
        }
    };

    let parsed = vision::query_with_retry(
        model,
        WHOLE_PAGE_PROMPT,
        image_data,
        config.page_max_tokens,
        config,
    )
    .await
    .and_then(|reply| vision::parse_page_response(&reply));

    match parsed {
        Ok(found) => found
            .into_iter()
            .map(|PageFormula { location, latex }| {
                let normalized = canonical::canonicalize(&latex);
                let description = describe::describe(&normalized);
                ExtractedFormula {
                    marker: None,
                    page: page + 1,
                    region: None,
                    location,
                    raw_latex: Some(latex),
                    normalized_latex: normalized,
                    description,
                    failure: None,
                }
            })
            .collect(),
        Err(failure) => {
            warn!("page {}: page scan failed: {}", page, failure);
            vec![ExtractedFormula {
                marker: None,
                page: page + 1,
                region: None,
                location: None,
                raw_latex: None,
                normalized_latex: String::new(),
                description: String::new(),
                failure: Some(failure),
            }]
        }
    }
}

/// Full ingestion of one document.
///
/// When candidates are found, runs the marker protocol: converter sees the
/// marked copy and the resolver splices LaTeX over the tokens. When no
/// vector candidates survive, falls back to converting the original and
/// scanning whole pages, pairing extracted formulas with converter-emitted
/// placeholders by order.
pub async fn process_document<B, C>(
    backend: B,
    source: impl Into<PathBuf>,
    converter: &C,
    model: Arc<dyn VisionModel>,
    config: &ExtractionConfig,
) -> Result<DocumentOutput, Formula2MdError>
where
    B: PageGeometry + Send + 'static,
    C: MarkdownConverter + ?Sized,
{
    let total_start = Instant::now();
    let source = source.into();
    info!("starting ingestion: {}", source.display());

    // Step 1: detect candidates and inject markers.
    let detect_start = Instant::now();
    let (backend, prepared) = prepare_document(backend, &source, config).await?;
    let detect_duration_ms = detect_start.elapsed().as_millis() as u64;

    // Step 2: hand the (possibly marked) document to the converter.
    let markdown = converter
        .convert(&prepared.document.path)
        .await
        .map_err(|e| Formula2MdError::ConverterFailed {
            path: prepared.document.path.clone(),
            detail: e.to_string(),
        })?;

    // Step 3: extract, resolve, correlate.
    let vision_start = Instant::now();
    let (markdown, formulas, report) = if prepared.document.marked {
        let formulas = extract_formulas(Arc::clone(&model), &prepared, config).await;
        let (resolved, report) = resolve::resolve_markers(&markdown, &formulas);
        (resolved, formulas, report)
    } else {
        debug!("no markers injected; falling back to page-scan mode");
        let (_backend, formulas) = extract_page_formulas(backend, model, config).await?;
        let (resolved, report) = resolve::resolve_placeholders(&markdown, &formulas);
        (resolved, formulas, report)
    };
    let vision_duration_ms = vision_start.elapsed().as_millis() as u64;

    let stats = ExtractionStats {
        pages_scanned: prepared.pages_scanned,
        page_scan_errors: prepared.page_scan_errors,
        candidates_detected: prepared.candidates.len() + prepared.skipped_blank,
        candidates_skipped_blank: prepared.skipped_blank,
        markers_injected: prepared.candidates.len(),
        formulas_extracted: formulas.iter().filter(|f| f.is_resolved()).count(),
        extraction_failures: formulas.iter().filter(|f| f.failure.is_some()).count(),
        detect_duration_ms,
        vision_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "ingestion complete: {}/{} formulas resolved, {} replaced in text, {}ms total",
        stats.formulas_extracted,
        formulas.len(),
        report.replaced,
        stats.total_duration_ms
    );

    Ok(DocumentOutput {
        markdown,
        formulas,
        report,
        stats,
    })
}

/// Ingest a document and persist the resolved markdown.
///
/// The artifact is keyed by the source's base name (`report.pdf` →
/// `report.md`), placed in `config.output_dir` or next to the source.
/// Written atomically (temp file + rename) so readers never see a partial
/// file. Returns the output path alongside the in-memory result.
pub async fn process_to_file<B, C>(
    backend: B,
    source: impl Into<PathBuf>,
    converter: &C,
    model: Arc<dyn VisionModel>,
    config: &ExtractionConfig,
) -> Result<(PathBuf, DocumentOutput), Formula2MdError>
where
    B: PageGeometry + Send + 'static,
    C: MarkdownConverter + ?Sized,
{
    let source = source.into();
    let output = process_document(backend, &source, converter, model, config).await?;
    let path = output_path(&source, config);
    write_atomic(&path, &output.markdown).await?;
    info!("wrote '{}'", path.display());
    Ok((path, output))
}

fn output_path(source: &Path, config: &ExtractionConfig) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    let dir = config
        .output_dir
        .clone()
        .or_else(|| source.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));
    dir.join(format!("{stem}.md"))
}

async fn write_atomic(path: &Path, contents: &str) -> Result<(), Formula2MdError> {
    let write_err = |e: std::io::Error| Formula2MdError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, contents)
        .await
        .map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)
}
