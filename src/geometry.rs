//! Page-space geometry: rectangles, regions, and drawing clustering.
//!
//! All coordinates live in page units with a **top-left origin** (y grows
//! downward), matching what text-layout code expects. Backends that work in
//! PDF-native bottom-left space (pdfium) flip the y axis before handing
//! rectangles to this module.

use serde::{Deserialize, Serialize};

/// A point in page coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned rectangle `(x0, y0, x1, y1)` in page coordinate space.
///
/// Degenerate rectangles (`x1 < x0` etc.) are representable; `width()` and
/// `height()` clamp to zero so downstream area math stays total.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Rect {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f32 {
        (self.x1 - self.x0).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y1 - self.y0).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Intersection with another rectangle, or `None` when they are disjoint.
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let r = Rect::new(
            self.x0.max(other.x0),
            self.y0.max(other.y0),
            self.x1.min(other.x1),
            self.y1.min(other.y1),
        );
        if r.x1 > r.x0 && r.y1 > r.y0 {
            Some(r)
        } else {
            None
        }
    }

    /// Smallest rectangle covering both `self` and `other`.
    pub fn union(&self, other: &Rect) -> Rect {
        Rect::new(
            self.x0.min(other.x0),
            self.y0.min(other.y0),
            self.x1.max(other.x1),
            self.y1.max(other.y1),
        )
    }

    /// Grow the rectangle by `dx`/`dy` on every side.
    pub fn inflate(&self, dx: f32, dy: f32) -> Rect {
        Rect::new(self.x0 - dx, self.y0 - dy, self.x1 + dx, self.y1 + dy)
    }

    /// Fraction of this rectangle's area covered by `other` (0.0 when this
    /// rectangle is degenerate).
    pub fn overlap_ratio(&self, other: &Rect) -> f32 {
        let area = self.area();
        if area <= 0.0 {
            return 0.0;
        }
        self.intersect(other).map_or(0.0, |i| i.area() / area)
    }
}

/// A rectangle tied to a specific page. Immutable once created.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageRegion {
    /// Zero-based page index.
    pub page: usize,
    pub rect: Rect,
}

impl PageRegion {
    pub fn new(page: usize, rect: Rect) -> Self {
        Self { page, rect }
    }
}

/// Merge drawing-primitive bounding boxes into clusters using a tolerance
/// window: two boxes belong to the same cluster when their bounds, grown by
/// `(x_tol, y_tol)`, touch. Membership is transitive: a chain of touching
/// boxes forms one cluster.
///
/// The result is sorted top-to-bottom, then left-to-right, so cluster order
/// is deterministic regardless of primitive emission order.
pub fn cluster_rects(primitives: &[Rect], x_tol: f32, y_tol: f32) -> Vec<Rect> {
    let mut clusters: Vec<Rect> = Vec::new();

    for &prim in primitives {
        // Collect every existing cluster this primitive touches, merge them
        // all into one. Zero-area primitives (perfectly flat fraction bars)
        // still participate.
        let grown = prim.inflate(x_tol, y_tol);
        let mut merged = prim;
        let mut i = 0;
        while i < clusters.len() {
            if grown.intersect(&clusters[i].inflate(x_tol, y_tol)).is_some() {
                merged = merged.union(&clusters.swap_remove(i));
            } else {
                i += 1;
            }
        }
        clusters.push(merged);
    }

    clusters.sort_by(|a, b| {
        (a.y0, a.x0)
            .partial_cmp(&(b.y0, b.x0))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    clusters
}
