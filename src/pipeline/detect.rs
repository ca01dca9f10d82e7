//! Geometric formula detection: find vector-drawing clusters shaped like
//! display math.
//!
//! This is a heuristic filter, not a classifier. It clusters the page's
//! vector primitives with a tolerance window, then rejects clusters that are
//! really tables, header/footer furniture, noise, or full-width figures.
//! Whatever survives becomes a candidate region for the marker round trip.
//!
//! A page whose geometry scan fails is skipped with an empty candidate list;
//! the document-level scan always completes and always returns a list.

use crate::backend::PageGeometry;
use crate::config::ExtractionConfig;
use crate::geometry::{cluster_rects, PageRegion, Rect};
use tracing::{debug, warn};

/// Why a cluster was rejected. Only used for trace output.
#[derive(Debug, PartialEq, Eq)]
enum Rejection {
    TableOverlap,
    MarginBand,
    TooSmall,
    TooWide,
}

/// Scan one page and return candidate regions in deterministic order
/// (top-to-bottom, then left-to-right, the order `cluster_rects` emits).
pub fn scan_page<B: PageGeometry + ?Sized>(
    backend: &B,
    page: usize,
    config: &ExtractionConfig,
) -> Result<Vec<PageRegion>, crate::backend::BackendError> {
    let (page_w, page_h) = backend.page_size(page)?;
    let primitives = backend.drawing_rects(page)?;
    let tables = backend.table_rects(page)?;

    let clusters = cluster_rects(
        &primitives,
        config.cluster_x_tolerance,
        config.cluster_y_tolerance,
    );

    let mut candidates = Vec::new();
    for cluster in clusters {
        match filter_cluster(&cluster, &tables, page_w, page_h, config) {
            None => candidates.push(PageRegion::new(page, cluster)),
            Some(reason) => debug!("page {}: cluster {:?} rejected: {:?}", page, cluster, reason),
        }
    }
    Ok(candidates)
}

/// Apply the rejection filters in order. Returns the first reason that
/// fires, or `None` for a surviving candidate.
fn filter_cluster(
    cluster: &Rect,
    tables: &[Rect],
    page_w: f32,
    page_h: f32,
    config: &ExtractionConfig,
) -> Option<Rejection> {
    // 1. Tables are excluded, not formulas: reject when more than half of
    //    the cluster lies inside table boxes.
    let table_overlap: f32 = tables
        .iter()
        .filter_map(|t| cluster.intersect(t))
        .map(|i| i.area())
        .sum();
    if cluster.area() > 0.0 && table_overlap > cluster.area() * config.table_overlap_ratio {
        return Some(Rejection::TableOverlap);
    }

    // 2. Header/footer bands.
    if cluster.y1 < config.margin_band || cluster.y0 > page_h - config.margin_band {
        return Some(Rejection::MarginBand);
    }

    // 3. Size gates: noise below, figures above.
    if cluster.width() < config.min_width || cluster.height() < config.min_height {
        return Some(Rejection::TooSmall);
    }
    if cluster.width() > page_w * config.max_width_ratio {
        return Some(Rejection::TooWide);
    }

    None
}

/// Scan the whole document. Pages are visited in ascending order so the
/// discovery order of the returned regions is page, then (y0, x0).
///
/// Per-page scan errors are logged and skipped; this function never fails
/// for recoverable per-page issues. Returns the regions plus the count of
/// pages that errored.
pub fn scan_document<B: PageGeometry + ?Sized>(
    backend: &B,
    config: &ExtractionConfig,
) -> (Vec<PageRegion>, usize) {
    let mut regions = Vec::new();
    let mut errors = 0usize;

    for page in 0..backend.page_count() {
        match scan_page(backend, page, config) {
            Ok(mut page_regions) => regions.append(&mut page_regions),
            Err(e) => {
                warn!("page {}: geometry scan failed, skipping: {}", page, e);
                errors += 1;
            }
        }
    }

    debug!(
        "document scan: {} candidate regions, {} page errors",
        regions.len(),
        errors
    );
    (regions, errors)
}

/// Quick probe: does the document appear to contain vector formulas at all?
///
/// Samples the first `config.probe_pages` pages so callers can skip the
/// expensive marker round trip for documents with no vector math. Errors
/// (including a missing or unreadable document) answer `false`.
pub fn has_vector_formulas<B: PageGeometry + ?Sized>(
    backend: &B,
    config: &ExtractionConfig,
) -> bool {
    let pages = backend.page_count().min(config.probe_pages);
    for page in 0..pages {
        match scan_page(backend, page, config) {
            Ok(regions) if !regions.is_empty() => return true,
            Ok(_) => {}
            Err(e) => warn!("page {}: probe scan failed: {}", page, e),
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendError;
    use crate::geometry::Point;
    use image::DynamicImage;
    use std::path::Path;

    /// In-memory backend exposing hand-placed primitives and tables on a
    /// 612×792 (US Letter) page.
    struct FakePage {
        primitives: Vec<Rect>,
        tables: Vec<Rect>,
        fail: bool,
    }

    struct FakeBackend {
        pages: Vec<FakePage>,
    }

    impl PageGeometry for FakeBackend {
        fn page_count(&self) -> usize {
            self.pages.len()
        }

        fn page_size(&self, _page: usize) -> Result<(f32, f32), BackendError> {
            Ok((612.0, 792.0))
        }

        fn drawing_rects(&self, page: usize) -> Result<Vec<Rect>, BackendError> {
            let p = &self.pages[page];
            if p.fail {
                return Err(BackendError::Page {
                    page,
                    detail: "simulated scan failure".into(),
                });
            }
            Ok(p.primitives.clone())
        }

        fn table_rects(&self, page: usize) -> Result<Vec<Rect>, BackendError> {
            Ok(self.pages[page].tables.clone())
        }

        fn render_region(
            &self,
            _page: usize,
            _clip: Rect,
            _scale: f32,
        ) -> Result<DynamicImage, BackendError> {
            unimplemented!("not used by detection tests")
        }

        fn insert_hidden_text(
            &mut self,
            _page: usize,
            _at: Point,
            _text: &str,
            _font_size: f32,
        ) -> Result<(), BackendError> {
            unimplemented!("not used by detection tests")
        }

        fn save_copy(&self, _path: &Path) -> Result<(), BackendError> {
            unimplemented!("not used by detection tests")
        }
    }

    /// A formula-sized primitive in the body of the page.
    fn formula_primitive() -> Rect {
        Rect::new(200.0, 300.0, 260.0, 320.0)
    }

    fn config() -> ExtractionConfig {
        ExtractionConfig::default()
    }

    #[test]
    fn body_cluster_is_accepted() {
        let backend = FakeBackend {
            pages: vec![FakePage {
                primitives: vec![formula_primitive()],
                tables: vec![],
                fail: false,
            }],
        };
        let regions = scan_page(&backend, 0, &config()).unwrap();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].page, 0);
        assert_eq!(regions[0].rect, formula_primitive());
    }

    #[test]
    fn cluster_inside_table_is_rejected() {
        let backend = FakeBackend {
            pages: vec![FakePage {
                primitives: vec![formula_primitive()],
                tables: vec![Rect::new(150.0, 250.0, 400.0, 400.0)],
                fail: false,
            }],
        };
        let regions = scan_page(&backend, 0, &config()).unwrap();
        assert!(regions.is_empty(), "table-covered cluster must be rejected");
    }

    #[test]
    fn partial_table_overlap_below_half_survives() {
        // Table covers the left quarter of the cluster only.
        let backend = FakeBackend {
            pages: vec![FakePage {
                primitives: vec![formula_primitive()],
                tables: vec![Rect::new(100.0, 250.0, 215.0, 400.0)],
                fail: false,
            }],
        };
        let regions = scan_page(&backend, 0, &config()).unwrap();
        assert_eq!(regions.len(), 1);
    }

    #[test]
    fn top_margin_band_is_excluded() {
        // Entirely inside the top band: y1 < 70.
        let backend = FakeBackend {
            pages: vec![FakePage {
                primitives: vec![Rect::new(200.0, 30.0, 260.0, 50.0)],
                tables: vec![],
                fail: false,
            }],
        };
        let regions = scan_page(&backend, 0, &config()).unwrap();
        assert!(regions.is_empty());
    }

    #[test]
    fn bottom_margin_band_is_excluded() {
        // Starts inside the bottom band: y0 > 792 - 70.
        let backend = FakeBackend {
            pages: vec![FakePage {
                primitives: vec![Rect::new(200.0, 740.0, 260.0, 760.0)],
                tables: vec![],
                fail: false,
            }],
        };
        let regions = scan_page(&backend, 0, &config()).unwrap();
        assert!(regions.is_empty());
    }

    #[test]
    fn noise_and_figures_are_excluded() {
        let backend = FakeBackend {
            pages: vec![FakePage {
                primitives: vec![
                    // Too narrow.
                    Rect::new(200.0, 300.0, 220.0, 315.0),
                    // Too flat.
                    Rect::new(200.0, 400.0, 300.0, 405.0),
                    // Wider than 90% of the page: a figure.
                    Rect::new(10.0, 500.0, 605.0, 560.0),
                ],
                tables: vec![],
                fail: false,
            }],
        };
        let regions = scan_page(&backend, 0, &config()).unwrap();
        assert!(regions.is_empty());
    }

    #[test]
    fn failed_page_is_skipped_and_scan_continues() {
        let backend = FakeBackend {
            pages: vec![
                FakePage {
                    primitives: vec![],
                    tables: vec![],
                    fail: true,
                },
                FakePage {
                    primitives: vec![formula_primitive()],
                    tables: vec![],
                    fail: false,
                },
            ],
        };
        let (regions, errors) = scan_document(&backend, &config());
        assert_eq!(errors, 1);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].page, 1);
    }

    #[test]
    fn discovery_order_is_page_then_top_left() {
        let backend = FakeBackend {
            pages: vec![
                FakePage {
                    primitives: vec![
                        Rect::new(300.0, 500.0, 360.0, 520.0),
                        Rect::new(100.0, 200.0, 160.0, 220.0),
                    ],
                    tables: vec![],
                    fail: false,
                },
                FakePage {
                    primitives: vec![formula_primitive()],
                    tables: vec![],
                    fail: false,
                },
            ],
        };
        let (regions, _) = scan_document(&backend, &config());
        assert_eq!(regions.len(), 3);
        assert_eq!((regions[0].page, regions[0].rect.y0), (0, 200.0));
        assert_eq!((regions[1].page, regions[1].rect.y0), (0, 500.0));
        assert_eq!(regions[2].page, 1);
    }

    #[test]
    fn probe_sees_only_sampled_pages() {
        let empty = || FakePage {
            primitives: vec![],
            tables: vec![],
            fail: false,
        };
        let backend = FakeBackend {
            pages: vec![
                empty(),
                empty(),
                empty(),
                // A formula on page 4 is beyond the default 3-page sample.
                FakePage {
                    primitives: vec![formula_primitive()],
                    tables: vec![],
                    fail: false,
                },
            ],
        };
        assert!(!has_vector_formulas(&backend, &config()));

        let cfg = ExtractionConfig::builder().probe_pages(4).build().unwrap();
        assert!(has_vector_formulas(&backend, &cfg));
    }
}
