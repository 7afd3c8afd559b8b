//! Avoid-zone collection.
//!
//! The content renderer reports the pixel extents of every keep-together block
//! (metric tables, chart panels, photo cards). The slicer never looks at those
//! boxes directly; it consults the sorted, disjoint list of normalized zones
//! produced here.

use log::debug;
use serde::{Deserialize, Serialize};

/// The kind of keep-together element a content box was measured from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoxKind {
    Table,
    Chart,
    PhotoCard,
    #[default]
    Other,
}

/// Vertical extent of a keep-together element, in source pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContentBox {
    pub top: f64,
    pub bottom: f64,
    #[serde(default)]
    pub kind: BoxKind,
}

impl ContentBox {
    pub fn new(top: f64, bottom: f64, kind: BoxKind) -> Self {
        Self { top, bottom, kind }
    }
}

/// A normalized height range a page boundary must not fall strictly inside.
///
/// Both bounds are fractions of the total source height and `bottom > top`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AvoidZone {
    pub top: f64,
    pub bottom: f64,
}

impl AvoidZone {
    /// Fraction of the document height covered by the zone.
    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    /// Returns whether `fraction` lies strictly inside the zone, `epsilon` away
    /// from both edges.
    pub fn strictly_contains(&self, fraction: f64, epsilon: f64) -> bool {
        fraction > self.top + epsilon && fraction < self.bottom - epsilon
    }
}

/// Normalizes, clamps and merges content boxes into sorted, disjoint zones.
///
/// Boxes with `bottom <= top`, non-finite bounds, or no overlap with the raster
/// are dropped. Overlapping and touching boxes collapse into a single zone.
pub fn collect_avoid_zones(boxes: &[ContentBox], source_height_px: u32) -> Vec<AvoidZone> {
    if source_height_px == 0 {
        return Vec::new();
    }
    let height = f64::from(source_height_px);

    let mut spans: Vec<(f64, f64)> = boxes
        .iter()
        .filter_map(|content_box| {
            let finite = content_box.top.is_finite() && content_box.bottom.is_finite();
            let top = content_box.top.max(0.0);
            let bottom = content_box.bottom.min(height);
            if !finite || bottom <= top {
                debug!(
                    "dropping degenerate {:?} box [{}, {})",
                    content_box.kind, content_box.top, content_box.bottom
                );
                return None;
            }
            Some((top, bottom))
        })
        .collect();

    spans.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));

    let mut merged: Vec<(f64, f64)> = Vec::with_capacity(spans.len());
    for (top, bottom) in spans {
        match merged.last_mut() {
            Some(last) if top <= last.1 => last.1 = last.1.max(bottom),
            _ => merged.push((top, bottom)),
        }
    }

    merged
        .into_iter()
        .map(|(top, bottom)| AvoidZone {
            top: top / height,
            bottom: bottom / height,
        })
        .collect()
}
