//! Greedy page slicing of the detail raster.
//!
//! The slicer walks the detail stream top to bottom in physical units. Each
//! page proposes a cut one content slot below the cursor; a cut landing
//! strictly inside an avoid zone is pulled back to the zone's top edge, unless
//! that would leave the page less than [`MIN_ACCEPTABLE_FILL_RATIO`] full, in
//! which case the cut stays where it was and the zone is split.
//!
//! Only the first zone containing a cut is consulted. Zones are sorted and
//! disjoint, and a snapped cut sits on a zone edge, so the adjusted cut is not
//! re-checked.

use log::{debug, trace, warn};
use serde::Serialize;

use crate::error::{ExportError, Result};
use crate::geometry::PageGeometry;
use crate::raster::RasterImage;
use crate::zones::AvoidZone;

/// Smallest share of a content slot a snapped page may fill.
pub const MIN_ACCEPTABLE_FILL_RATIO: f64 = 0.25;

/// Residual height, in millimetres, below which slicing stops.
pub const DEFAULT_EPSILON_MM: f64 = 0.5;

/// Tolerance, as a fraction of the document height, around zone edges.
pub const ZONE_EDGE_EPSILON: f64 = 1e-4;

/// One contiguous band of the source raster mapped onto one output page.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PageSlice {
    pub source_top_px: u32,
    pub source_height_px: u32,
    /// Height in millimetres the band occupies on its page.
    pub dest_physical_height: f64,
}

impl PageSlice {
    /// First pixel row below the slice.
    pub fn source_bottom_px(&self) -> u32 {
        self.source_top_px + self.source_height_px
    }
}

/// A page boundary the slicer had to place inside an avoid zone.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ForcedSplit {
    pub zone: AvoidZone,
    /// Index of the slice whose bottom edge falls inside the zone.
    pub slice_index: usize,
    /// The zone is taller than the slot it was cut against.
    pub oversized: bool,
}

/// The ordered slices for one detail raster.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SlicePlan {
    pub slices: Vec<PageSlice>,
    pub forced_splits: Vec<ForcedSplit>,
}

impl SlicePlan {
    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    pub fn len(&self) -> usize {
        self.slices.len()
    }

    /// Number of distinct zones split because they exceed a content slot.
    pub fn oversized_zone_count(&self) -> usize {
        let mut zones: Vec<AvoidZone> = self
            .forced_splits
            .iter()
            .filter(|split| split.oversized)
            .map(|split| split.zone)
            .collect();
        zones.dedup();
        zones.len()
    }
}

/// Slot heights and tuning for the greedy slicer.
///
/// By default the detail stream is taken to open with its own section header:
/// slice 0 uses the first-page slot and its page carries no banner, even when
/// it is the only detail page. Pass `false` to
/// [`Slicer::with_inline_section_header`] to lay out every slice as a
/// continuation page.
///
/// Zone containment is strict. A cut within [`ZONE_EDGE_EPSILON`] of a zone
/// edge, such as a 95mm cut against a zone ending at 95mm, is not inside the
/// zone and stays where it is.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Slicer {
    first_slot: f64,
    continuation_slot: f64,
    min_fill_ratio: f64,
    epsilon: f64,
    inline_section_header: bool,
}

impl Slicer {
    /// Creates a slicer with explicit first-page and continuation slot heights.
    pub fn new(first_slot: f64, continuation_slot: f64) -> Self {
        Self {
            first_slot,
            continuation_slot,
            min_fill_ratio: MIN_ACCEPTABLE_FILL_RATIO,
            epsilon: DEFAULT_EPSILON_MM,
            inline_section_header: true,
        }
    }

    /// Derives slot heights from the page geometry.
    pub fn from_geometry(geometry: &PageGeometry) -> Self {
        Self::new(
            geometry.first_slot_height(),
            geometry.continuation_slot_height(),
        )
    }

    /// Sets the minimum fill ratio a snapped cut must keep.
    pub fn with_min_fill_ratio(mut self, ratio: f64) -> Self {
        self.min_fill_ratio = ratio;
        self
    }

    /// Sets the residual height at which slicing stops.
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Declares whether the detail stream opens with its own section header.
    ///
    /// When it does, the first slice uses the first-page slot; otherwise every
    /// slice is a continuation slice.
    pub fn with_inline_section_header(mut self, inline: bool) -> Self {
        self.inline_section_header = inline;
        self
    }

    pub fn inline_section_header(&self) -> bool {
        self.inline_section_header
    }

    /// Returns whether slice `index` is laid out as the first detail page.
    pub fn is_first_page_slot(&self, index: usize) -> bool {
        index == 0 && self.inline_section_header
    }

    /// Content slot height of slice `index`.
    pub fn slot_height(&self, index: usize) -> f64 {
        if self.is_first_page_slot(index) {
            self.first_slot
        } else {
            self.continuation_slot
        }
    }

    /// Rejects settings that could not terminate or would ignore every zone.
    pub fn validate(&self) -> Result<()> {
        if !(self.first_slot > 0.0 && self.first_slot.is_finite())
            || !(self.continuation_slot > 0.0 && self.continuation_slot.is_finite())
        {
            return Err(ExportError::InvalidGeometry(format!(
                "slot heights must be positive, got {}mm and {}mm",
                self.first_slot, self.continuation_slot
            )));
        }
        if !(0.0..=1.0).contains(&self.min_fill_ratio) {
            return Err(ExportError::InvalidGeometry(format!(
                "minimum fill ratio {} is outside [0, 1]",
                self.min_fill_ratio
            )));
        }
        if !(self.epsilon >= 0.0 && self.epsilon.is_finite()) {
            return Err(ExportError::InvalidGeometry(format!(
                "slicing epsilon {} must be a non-negative number",
                self.epsilon
            )));
        }
        Ok(())
    }

    /// Plans the slices for `raster`.
    pub fn plan_raster(&self, raster: &RasterImage, zones: &[AvoidZone]) -> Result<SlicePlan> {
        self.plan(raster.height_px(), raster.px_per_unit(), zones)
    }

    /// Plans the slices for a raster `height_px` rows tall at `px_per_unit`.
    ///
    /// `zones` must be sorted and disjoint, as produced by
    /// [`collect_avoid_zones`](crate::zones::collect_avoid_zones). Settings
    /// rejected by [`Slicer::validate`] return
    /// [`ExportError::InvalidGeometry`] before any slicing starts.
    pub fn plan(&self, height_px: u32, px_per_unit: f64, zones: &[AvoidZone]) -> Result<SlicePlan> {
        self.validate()?;

        let mut plan = SlicePlan::default();
        if height_px == 0 || !(px_per_unit > 0.0 && px_per_unit.is_finite()) {
            return Ok(plan);
        }

        let total = f64::from(height_px) / px_per_unit;
        let to_px = |physical: f64| ((physical * px_per_unit).round() as u32).min(height_px);

        let mut remaining = total;
        let mut cursor = 0.0_f64;

        while remaining > self.epsilon || (plan.slices.is_empty() && remaining > 0.0) {
            let index = plan.slices.len();
            let slot = self.slot_height(index);
            let mut chunk = remaining.min(slot);
            let cut = (cursor + chunk) / total;

            if let Some(zone) = zones
                .iter()
                .find(|zone| zone.strictly_contains(cut, ZONE_EDGE_EPSILON))
            {
                let snapped = (zone.top * total - cursor).max(0.0);
                if snapped > 0.0 && snapped >= self.min_fill_ratio * slot {
                    trace!(
                        "slice {index}: cut at {:.2}mm snapped to zone top at {:.2}mm",
                        cursor + chunk,
                        cursor + snapped
                    );
                    chunk = snapped;
                } else {
                    let oversized = zone.height() * total > slot;
                    if oversized {
                        warn!(
                            "oversized avoid zone [{:.4}, {:.4}) ({:.1}mm) exceeds the {:.1}mm content slot; splitting it",
                            zone.top,
                            zone.bottom,
                            zone.height() * total,
                            slot
                        );
                    } else {
                        debug!(
                            "slice {index}: snapping to zone top would fill only {:.1}mm of {:.1}mm; splitting zone",
                            snapped, slot
                        );
                    }
                    plan.forced_splits.push(ForcedSplit {
                        zone: *zone,
                        slice_index: index,
                        oversized,
                    });
                }
            }

            let top_px = to_px(cursor);
            let bottom_px = to_px(cursor + chunk);
            plan.slices.push(PageSlice {
                source_top_px: top_px,
                source_height_px: bottom_px - top_px,
                dest_physical_height: chunk,
            });

            cursor += chunk;
            remaining -= chunk;
        }

        if let Some(last) = plan.slices.last_mut() {
            last.source_height_px = height_px - last.source_top_px;
            last.dest_physical_height += remaining.max(0.0);
        }

        debug!(
            "planned {} slice(s) for {:.1}mm of detail content ({} forced split(s))",
            plan.slices.len(),
            total,
            plan.forced_splits.len()
        );
        Ok(plan)
    }
}
