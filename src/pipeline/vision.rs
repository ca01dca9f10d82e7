//! Vision extraction adapter: image in, structured reply out.
//!
//! The pipeline talks to the vision side through the [`VisionModel`] trait
//! so tests can substitute a canned model. The production implementation
//! ([`LlmVision`]) wraps an `edgequake_llm` provider.
//!
//! Replies follow one of two fixed contracts (see [`crate::prompts`]):
//!
//! * single-region: a `FORMULA: YES` / `FORMULA: NO` indicator, then the
//!   LaTeX; parsed by [`parse_single_region`].
//! * whole-page: `FORMULA_START` / `FORMULA_END` blocks with `LOCATION:` and
//!   `LATEX:` lines, or the `NO_FORMULAS` sentinel; parsed by
//!   [`parse_page_response`].
//!
//! ## Retry strategy
//!
//! Transient API errors are retried with exponential backoff
//! (`retry_backoff_ms * 2^attempt`). Each attempt runs under the configured
//! deadline; failures never propagate past the candidate they belong to.

use crate::config::ExtractionConfig;
use crate::error::ExtractionFailure;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use std::sync::Arc;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Low temperature keeps transcription literal.
const VISION_TEMPERATURE: f32 = 0.1;

/// Transport-level error from a vision call, before retry classification.
pub type VisionCallError = Box<dyn std::error::Error + Send + Sync>;

/// The seam between the pipeline and whatever answers vision queries.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Send `prompt` plus one image, return the raw reply text.
    async fn complete(
        &self,
        prompt: &str,
        image: ImageData,
        max_tokens: usize,
    ) -> Result<String, VisionCallError>;
}

/// Production [`VisionModel`] over an `edgequake_llm` provider.
pub struct LlmVision {
    provider: Arc<dyn LLMProvider>,
}

impl LlmVision {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl VisionModel for LlmVision {
    async fn complete(
        &self,
        prompt: &str,
        image: ImageData,
        max_tokens: usize,
    ) -> Result<String, VisionCallError> {
        let messages = vec![ChatMessage::user_with_images(prompt, vec![image])];
        let options = CompletionOptions {
            temperature: Some(VISION_TEMPERATURE),
            max_tokens: Some(max_tokens),
            ..Default::default()
        };
        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| -> VisionCallError { format!("{e}").into() })?;
        debug!(
            "vision reply: {} prompt tokens, {} completion tokens",
            response.prompt_tokens, response.completion_tokens
        );
        Ok(response.content)
    }
}

/// Call the model with retry, backoff, and a per-attempt deadline.
///
/// Returns the raw reply text, or the [`ExtractionFailure`] describing the
/// final attempt. Never panics, never propagates a fatal error; the caller
/// records the failure on the affected formula and moves on.
pub async fn query_with_retry(
    model: &dyn VisionModel,
    prompt: &str,
    image: ImageData,
    max_tokens: usize,
    config: &ExtractionConfig,
) -> Result<String, ExtractionFailure> {
    let deadline = Duration::from_secs(config.api_timeout_secs);
    let mut last_failure = ExtractionFailure::Api {
        retries: config.max_retries as u8,
        detail: "no attempt made".into(),
    };

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = config.retry_backoff_ms * 2u64.pow(attempt - 1);
            warn!(
                "vision retry {}/{} after {}ms",
                attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match timeout(deadline, model.complete(prompt, image.clone(), max_tokens)).await {
            Ok(Ok(reply)) => return Ok(reply),
            Ok(Err(e)) => {
                warn!("vision attempt {} failed: {}", attempt + 1, e);
                last_failure = ExtractionFailure::Api {
                    retries: config.max_retries as u8,
                    detail: e.to_string(),
                };
            }
            Err(_) => {
                warn!(
                    "vision attempt {} timed out after {}s",
                    attempt + 1,
                    config.api_timeout_secs
                );
                last_failure = ExtractionFailure::Timeout {
                    secs: config.api_timeout_secs,
                };
            }
        }
    }

    Err(last_failure)
}

/// Outcome of a single-region reply: either LaTeX, or the model's prose
/// description of a crop that turned out not to be a formula.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionReply {
    Formula(String),
    NotFormula(String),
}

/// Parse a single-region reply.
///
/// Keys on the `FORMULA: YES` / `FORMULA: NO` indicator; the remaining
/// lines are the LaTeX payload or the prose description respectively. A
/// reply with neither indicator is unparseable.
pub fn parse_single_region(reply: &str) -> Result<RegionReply, ExtractionFailure> {
    let upper = reply.to_uppercase();
    let is_formula = if upper.contains("FORMULA: NO") {
        false
    } else if upper.contains("FORMULA: YES") {
        true
    } else {
        return Err(ExtractionFailure::UnparseableReply {
            detail: format!("missing FORMULA indicator in: {}", truncate(reply, 120)),
        });
    };

    // Everything except the indicator line is the payload.
    let payload = reply
        .lines()
        .filter(|line| !line.to_uppercase().contains("FORMULA:"))
        .collect::<Vec<_>>()
        .join("\n");

    if !is_formula {
        return Ok(RegionReply::NotFormula(payload.trim().to_string()));
    }

    let latex = cleanup_latex(&payload);
    if latex.is_empty() {
        return Err(ExtractionFailure::UnparseableReply {
            detail: "FORMULA: YES with empty LaTeX payload".into(),
        });
    }
    Ok(RegionReply::Formula(latex))
}

/// One formula reported by a whole-page scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFormula {
    /// Free-text location hint, carried verbatim.
    pub location: Option<String>,
    pub latex: String,
}

/// Parse a whole-page reply into its formula blocks.
///
/// The `NO_FORMULAS` sentinel yields an empty list. Blocks with an empty
/// `LATEX:` line are dropped. A reply with neither sentinel nor blocks is
/// unparseable.
pub fn parse_page_response(reply: &str) -> Result<Vec<PageFormula>, ExtractionFailure> {
    if reply.to_uppercase().contains("NO_FORMULAS") {
        return Ok(Vec::new());
    }

    let mut formulas = Vec::new();
    let mut blocks = reply.split("FORMULA_START");
    let _preamble = blocks.next();
    for block in blocks {
        let body = block.split("FORMULA_END").next().unwrap_or(block);
        let mut location = None;
        let mut latex = None;
        for line in body.lines() {
            let trimmed = line.trim();
            let upper = trimmed.to_uppercase();
            // Prefixes are ASCII, so byte offsets carry over to the
            // original-case line.
            if upper.starts_with("LOCATION:") {
                location = Some(trimmed["LOCATION:".len()..].trim().to_string());
            } else if upper.starts_with("LATEX:") {
                latex = Some(cleanup_latex(trimmed["LATEX:".len()..].trim()));
            }
        }
        match latex {
            Some(l) if !l.is_empty() => formulas.push(PageFormula {
                location: location.filter(|s| !s.is_empty()),
                latex: l,
            }),
            _ => debug!("dropping page-scan block with empty LATEX line"),
        }
    }

    if formulas.is_empty() {
        return Err(ExtractionFailure::UnparseableReply {
            detail: format!(
                "neither NO_FORMULAS nor formula blocks in: {}",
                truncate(reply, 120)
            ),
        });
    }
    Ok(formulas)
}

/// Strip code fences and math delimiters the model sometimes adds despite
/// the prompt.
pub fn cleanup_latex(raw: &str) -> String {
    raw.replace("```latex", "")
        .replace("```", "")
        .trim()
        .trim_matches('$')
        .trim()
        .to_string()
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FlakyModel {
        remaining_failures: std::sync::Mutex<u32>,
        reply: String,
    }

    #[async_trait]
    impl VisionModel for FlakyModel {
        async fn complete(
            &self,
            _prompt: &str,
            _image: ImageData,
            _max_tokens: usize,
        ) -> Result<String, VisionCallError> {
            let mut remaining = self.remaining_failures.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err("HTTP 503".into());
            }
            Ok(self.reply.clone())
        }
    }

    fn image() -> ImageData {
        ImageData::new("aGVsbG8=", "image/png")
    }

    fn fast_config() -> ExtractionConfig {
        ExtractionConfig::builder()
            .max_retries(2)
            .retry_backoff_ms(1)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn retry_recovers_from_transient_error() {
        let model = FlakyModel {
            remaining_failures: std::sync::Mutex::new(1),
            reply: "FORMULA: YES\nx^2".into(),
        };
        let out = query_with_retry(&model, "p", image(), 100, &fast_config()).await;
        assert_eq!(out.unwrap(), "FORMULA: YES\nx^2");
    }

    #[tokio::test]
    async fn exhausted_retries_return_api_failure() {
        let model = FlakyModel {
            remaining_failures: std::sync::Mutex::new(100),
            reply: String::new(),
        };
        let out = query_with_retry(&model, "p", image(), 100, &fast_config()).await;
        match out {
            Err(ExtractionFailure::Api { retries, detail }) => {
                assert_eq!(retries, 2);
                assert!(detail.contains("503"));
            }
            other => panic!("expected Api failure, got {other:?}"),
        }
    }

    #[test]
    fn single_region_yes_extracts_latex() {
        let reply = "FORMULA: YES\n\\frac{a}{b} + c";
        assert_eq!(
            parse_single_region(reply).unwrap(),
            RegionReply::Formula("\\frac{a}{b} + c".to_string())
        );
    }

    #[test]
    fn single_region_no_keeps_the_description() {
        let reply = "FORMULA: NO\nA photograph of a cat.";
        assert_eq!(
            parse_single_region(reply).unwrap(),
            RegionReply::NotFormula("A photograph of a cat.".to_string())
        );
    }

    #[test]
    fn single_region_strips_fences_and_dollars() {
        let reply = "FORMULA: YES\n```latex\n$E = mc^2$\n```";
        assert_eq!(
            parse_single_region(reply).unwrap(),
            RegionReply::Formula("E = mc^2".to_string())
        );
    }

    #[test]
    fn single_region_gibberish_is_unparseable() {
        let reply = "I see an image of something.";
        assert!(matches!(
            parse_single_region(reply),
            Err(ExtractionFailure::UnparseableReply { .. })
        ));
    }

    #[test]
    fn page_response_no_formulas_sentinel() {
        assert!(parse_page_response("NO_FORMULAS").unwrap().is_empty());
        assert!(parse_page_response("  no_formulas\n").unwrap().is_empty());
    }

    #[test]
    fn page_response_parses_blocks_in_order() {
        let reply = "\
Some preamble text.
FORMULA_START
LOCATION: after the first paragraph
LATEX: E = mc^2
FORMULA_END
FORMULA_START
LOCATION: bottom of the page
LATEX: \\sum_{i=1}^n i
FORMULA_END";
        let formulas = parse_page_response(reply).unwrap();
        assert_eq!(formulas.len(), 2);
        assert_eq!(
            formulas[0],
            PageFormula {
                location: Some("after the first paragraph".into()),
                latex: "E = mc^2".into(),
            }
        );
        assert_eq!(formulas[1].latex, "\\sum_{i=1}^n i");
    }

    #[test]
    fn page_response_case_insensitive_prefixes_and_empty_latex() {
        let reply = "\
FORMULA_START
location: somewhere
latex: a + b
FORMULA_END
FORMULA_START
LATEX:
FORMULA_END";
        let formulas = parse_page_response(reply).unwrap();
        // The empty-LaTeX block is dropped.
        assert_eq!(formulas.len(), 1);
        assert_eq!(formulas[0].latex, "a + b");
    }

    #[test]
    fn page_response_gibberish_is_unparseable() {
        assert!(matches!(
            parse_page_response("nothing useful here"),
            Err(ExtractionFailure::UnparseableReply { .. })
        ));
    }
}
