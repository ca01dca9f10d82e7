//! Configuration for the formula extraction pipeline.
//!
//! Every knob lives in one [`ExtractionConfig`] struct built via its
//! [`ExtractionConfigBuilder`]. Keeping the geometry thresholds, rendering
//! parameters, and vision-call discipline together makes it trivial to share
//! a config across threads and to diff two runs to understand why their
//! outputs differ.
//!
//! The geometric defaults are tuned for technical reports typeset on A4/US
//! Letter pages in PDF points; they are exposed because scanned or oversized
//! documents need different windows.

use crate::error::Formula2MdError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for one document ingestion.
///
/// Built via [`ExtractionConfig::builder()`] or [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use formula2md::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .concurrency(4)
///     .render_scale(4.0)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Horizontal tolerance (page units) when clustering drawing primitives.
    /// Default: 30.0. Glyph strokes within a formula are spaced well under
    /// this; separate formulas on one line rarely sit closer.
    pub cluster_x_tolerance: f32,

    /// Vertical clustering tolerance. Default: 4.0. Tight, so stacked
    /// formulas in consecutive display lines stay separate clusters.
    pub cluster_y_tolerance: f32,

    /// Height of the header and footer exclusion bands. Default: 70.0.
    /// Clusters entirely inside the top band or starting inside the bottom
    /// band are rejected; running heads and rules live there, not math.
    pub margin_band: f32,

    /// Minimum cluster width to survive the noise gate. Default: 30.0.
    pub min_width: f32,

    /// Minimum cluster height to survive the noise gate. Default: 10.0.
    pub min_height: f32,

    /// Clusters wider than this fraction of the page width are rejected as
    /// figures. Default: 0.9.
    pub max_width_ratio: f32,

    /// A cluster overlapping any table bounding box by more than this
    /// fraction of its own area is rejected. Default: 0.5.
    pub table_overlap_ratio: f32,

    /// Upscaling factor when rendering a candidate region for the vision
    /// model. Default: 4.0. Formula crops are small; 4× keeps sub/superscripts
    /// legible without blowing up request payloads.
    pub render_scale: f32,

    /// Padding (page units) added around a candidate region before rendering.
    /// Default: 3.0.
    pub render_padding: f32,

    /// Minimum distinct-colour count for a rendered crop to be considered
    /// non-blank. Default: 3. Anti-aliased strokes produce dozens of
    /// colours; a stray rule or empty clip produces one or two.
    pub min_color_count: u32,

    /// Downward offset (page units) from a candidate's top edge where the
    /// invisible marker text is inserted. Default: 10.0, so the marker sits
    /// inside the region rather than colliding with the line above.
    pub marker_offset_y: f32,

    /// Font size for the invisible marker text. Default: 8.0. Small enough
    /// not to disturb layout, large enough for converters to pick up.
    pub marker_font_size: f32,

    /// DPI for whole-page renders in page-scan mode. Default: 150.
    pub page_dpi: u32,

    /// Pages sampled by the quick [`crate::pipeline::detect::has_vector_formulas`]
    /// probe. Default: 3.
    pub probe_pages: usize,

    /// Number of concurrent vision API calls. Default: 4.
    ///
    /// Formula crops are tiny, so the calls are latency-bound; modest
    /// parallelism captures most of the win without tripping rate limits.
    pub concurrency: usize,

    /// Maximum retry attempts on a transient vision API failure. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (doubles per attempt). Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-vision-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Maximum tokens the vision model may generate for one formula crop.
    /// Default: 500.
    pub max_tokens: usize,

    /// Maximum tokens for a whole-page scan reply, which may contain many
    /// formula blocks. Default: 2000.
    pub page_max_tokens: usize,

    /// Directory for the persisted Markdown artifact. Default: None, meaning
    /// the output lands next to the source document.
    pub output_dir: Option<PathBuf>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            cluster_x_tolerance: 30.0,
            cluster_y_tolerance: 4.0,
            margin_band: 70.0,
            min_width: 30.0,
            min_height: 10.0,
            max_width_ratio: 0.9,
            table_overlap_ratio: 0.5,
            render_scale: 4.0,
            render_padding: 3.0,
            min_color_count: 3,
            marker_offset_y: 10.0,
            marker_font_size: 8.0,
            page_dpi: 150,
            probe_pages: 3,
            concurrency: 4,
            max_retries: 3,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            max_tokens: 500,
            page_max_tokens: 2000,
            output_dir: None,
        }
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn cluster_tolerances(mut self, x: f32, y: f32) -> Self {
        self.config.cluster_x_tolerance = x.max(0.0);
        self.config.cluster_y_tolerance = y.max(0.0);
        self
    }

    pub fn margin_band(mut self, units: f32) -> Self {
        self.config.margin_band = units.max(0.0);
        self
    }

    pub fn min_size(mut self, width: f32, height: f32) -> Self {
        self.config.min_width = width.max(0.0);
        self.config.min_height = height.max(0.0);
        self
    }

    pub fn max_width_ratio(mut self, ratio: f32) -> Self {
        self.config.max_width_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    pub fn table_overlap_ratio(mut self, ratio: f32) -> Self {
        self.config.table_overlap_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    pub fn render_scale(mut self, scale: f32) -> Self {
        self.config.render_scale = scale.clamp(1.0, 8.0);
        self
    }

    pub fn render_padding(mut self, units: f32) -> Self {
        self.config.render_padding = units.max(0.0);
        self
    }

    pub fn min_color_count(mut self, n: u32) -> Self {
        self.config.min_color_count = n.max(1);
        self
    }

    pub fn page_dpi(mut self, dpi: u32) -> Self {
        self.config.page_dpi = dpi.clamp(72, 400);
        self
    }

    pub fn probe_pages(mut self, n: usize) -> Self {
        self.config.probe_pages = n.max(1);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn page_max_tokens(mut self, n: usize) -> Self {
        self.config.page_max_tokens = n;
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = Some(dir.into());
        self
    }

    /// Build the configuration, validating cross-field constraints.
    pub fn build(self) -> Result<ExtractionConfig, Formula2MdError> {
        let c = &self.config;
        if c.min_width <= 0.0 || c.min_height <= 0.0 {
            return Err(Formula2MdError::InvalidConfig(
                "minimum cluster size must be positive".into(),
            ));
        }
        if c.max_width_ratio <= 0.0 {
            return Err(Formula2MdError::InvalidConfig(
                "max_width_ratio must be positive".into(),
            ));
        }
        if c.concurrency == 0 {
            return Err(Formula2MdError::InvalidConfig(
                "concurrency must be >= 1".into(),
            ));
        }
        Ok(self.config)
    }
}
