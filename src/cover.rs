//! The cover page.
//!
//! The cover block is template-fixed and is expected to fit one page. It is
//! written as page 1 inside all four margins and never sliced; a cover taller
//! than the slot is clipped at the bottom margin and reported as overflow.

use log::warn;

use crate::export::RenderedContent;
use crate::geometry::PageGeometry;
use crate::raster::RasterImage;

/// The cover raster prepared for a single page.
#[derive(Clone, Debug)]
pub struct CoverPage {
    raster: RasterImage,
    visible_height_px: u32,
    overflow_px: u32,
}

impl CoverPage {
    /// Prepares the rendered cover for `geometry`. Content boxes are ignored.
    pub fn from_content(content: RenderedContent, geometry: &PageGeometry) -> Self {
        Self::from_raster(content.raster, geometry)
    }

    /// Prepares a cover raster for `geometry`.
    pub fn from_raster(raster: RasterImage, geometry: &PageGeometry) -> Self {
        // The cover is drawn at content width, so its rows map to millimetres
        // through the horizontal scale rather than the raster's own scale.
        let rows_per_mm = if raster.width_px() == 0 {
            raster.px_per_unit()
        } else {
            f64::from(raster.width_px()) / geometry.content_width()
        };
        let slot_px = (geometry.cover_slot_height() * rows_per_mm).floor() as u32;
        let visible_height_px = raster.height_px().min(slot_px);
        let overflow_px = raster.height_px() - visible_height_px;

        if overflow_px > 0 {
            warn!(
                "cover content overflows its page by {:.1}mm; clipping",
                f64::from(overflow_px) / rows_per_mm
            );
        }

        Self {
            raster,
            visible_height_px,
            overflow_px,
        }
    }

    pub fn raster(&self) -> &RasterImage {
        &self.raster
    }

    /// Rows of the cover raster that fit on the page.
    pub fn visible_height_px(&self) -> u32 {
        self.visible_height_px
    }

    /// Rows clipped off the bottom of the page.
    pub fn overflow_px(&self) -> u32 {
        self.overflow_px
    }

    /// Height in millimetres the visible cover occupies at content width.
    pub fn dest_physical_height(&self, geometry: &PageGeometry) -> f64 {
        if self.raster.width_px() == 0 {
            return 0.0;
        }
        f64::from(self.visible_height_px) * geometry.content_width()
            / f64::from(self.raster.width_px())
    }
}
