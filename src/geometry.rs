//! Physical page geometry shared by the slicer and the document writer.
//!
//! All values are millimetres. The geometry distinguishes the top margin of the
//! first detail page, whose rendered content already opens with a section
//! header, from the top margin of continuation pages, which must leave room for
//! the synthesized header banner.

use serde::{Deserialize, Serialize};

use crate::error::{ExportError, Result};

/// Width of an A4 page in portrait orientation.
pub const A4_WIDTH_MM: f64 = 210.0;
/// Height of an A4 page in portrait orientation.
pub const A4_HEIGHT_MM: f64 = 297.0;

const DEFAULT_MARGIN_MM: f64 = 10.0;
const DEFAULT_BANNER_HEIGHT_MM: f64 = 14.0;
const DEFAULT_BANNER_GAP_MM: f64 = 4.0;

/// Physical page size, margins and banner reservation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageGeometry {
    pub page_width: f64,
    pub page_height: f64,
    pub margin_top: f64,
    pub margin_bottom: f64,
    pub margin_left: f64,
    pub margin_right: f64,
    /// Top margin of the first detail page.
    pub first_page_top_margin: f64,
    /// Top margin of continuation pages; includes the banner and its gap.
    pub continuation_top_margin: f64,
    /// Height of the header banner stamped at `margin_top` on continuation pages.
    pub banner_height: f64,
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self::a4()
    }
}

impl PageGeometry {
    /// A4 portrait with uniform 10mm margins and a 14mm banner.
    pub fn a4() -> Self {
        Self {
            page_width: A4_WIDTH_MM,
            page_height: A4_HEIGHT_MM,
            margin_top: DEFAULT_MARGIN_MM,
            margin_bottom: DEFAULT_MARGIN_MM,
            margin_left: DEFAULT_MARGIN_MM,
            margin_right: DEFAULT_MARGIN_MM,
            first_page_top_margin: DEFAULT_MARGIN_MM,
            continuation_top_margin: DEFAULT_MARGIN_MM
                + DEFAULT_BANNER_HEIGHT_MM
                + DEFAULT_BANNER_GAP_MM,
            banner_height: DEFAULT_BANNER_HEIGHT_MM,
        }
    }

    /// Sets the physical page size.
    pub fn with_page_size(mut self, width: f64, height: f64) -> Self {
        self.page_width = width;
        self.page_height = height;
        self
    }

    /// Sets the four base margins.
    pub fn with_margins(mut self, top: f64, right: f64, bottom: f64, left: f64) -> Self {
        self.margin_top = top;
        self.margin_right = right;
        self.margin_bottom = bottom;
        self.margin_left = left;
        self
    }

    /// Overrides the top margins used for the detail stream.
    pub fn with_detail_top_margins(mut self, first_page: f64, continuation: f64) -> Self {
        self.first_page_top_margin = first_page;
        self.continuation_top_margin = continuation;
        self
    }

    /// Sets the banner height reserved on continuation pages.
    pub fn with_banner_height(mut self, height: f64) -> Self {
        self.banner_height = height;
        self
    }

    /// Horizontal space between the left and right margins.
    pub fn content_width(&self) -> f64 {
        self.page_width - self.margin_left - self.margin_right
    }

    /// Vertical space available to the cover raster.
    pub fn cover_slot_height(&self) -> f64 {
        self.page_height - self.margin_top - self.margin_bottom
    }

    /// Content slot of the first detail page.
    pub fn first_slot_height(&self) -> f64 {
        self.page_height - self.first_page_top_margin - self.margin_bottom
    }

    /// Content slot of a continuation page, below the banner.
    pub fn continuation_slot_height(&self) -> f64 {
        self.page_height - self.continuation_top_margin - self.margin_bottom
    }

    /// Rejects geometries that cannot hold any content.
    pub fn validate(&self) -> Result<()> {
        let finite = [
            self.page_width,
            self.page_height,
            self.margin_top,
            self.margin_bottom,
            self.margin_left,
            self.margin_right,
            self.first_page_top_margin,
            self.continuation_top_margin,
            self.banner_height,
        ]
        .iter()
        .all(|value| value.is_finite());
        if !finite {
            return Err(invalid("all dimensions must be finite numbers"));
        }

        if self.page_width <= 0.0 || self.page_height <= 0.0 {
            return Err(invalid(format!(
                "page size {}x{}mm must be positive",
                self.page_width, self.page_height
            )));
        }

        let margins = [
            ("margin_top", self.margin_top),
            ("margin_bottom", self.margin_bottom),
            ("margin_left", self.margin_left),
            ("margin_right", self.margin_right),
            ("first_page_top_margin", self.first_page_top_margin),
            ("continuation_top_margin", self.continuation_top_margin),
            ("banner_height", self.banner_height),
        ];
        if let Some((name, value)) = margins.iter().find(|(_, value)| *value < 0.0) {
            return Err(invalid(format!("{name} must not be negative, got {value}mm")));
        }

        if self.content_width() <= 0.0 {
            return Err(invalid(format!(
                "horizontal margins leave no content width on a {}mm page",
                self.page_width
            )));
        }

        let slots = [
            ("cover", self.cover_slot_height()),
            ("first detail page", self.first_slot_height()),
            ("continuation page", self.continuation_slot_height()),
        ];
        if let Some((name, height)) = slots.iter().find(|(_, height)| *height <= 0.0) {
            return Err(invalid(format!(
                "{name} content slot is {height}mm; margins exceed the page height"
            )));
        }

        if self.margin_top + self.banner_height > self.continuation_top_margin {
            return Err(invalid(format!(
                "banner of {}mm at margin_top {}mm overlaps the continuation top margin of {}mm",
                self.banner_height, self.margin_top, self.continuation_top_margin
            )));
        }

        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> ExportError {
    ExportError::InvalidGeometry(message.into())
}
