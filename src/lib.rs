//! Paginated export of pre-rendered reports.
//!
//! A host renders the report into two rasters, a short cover block and a tall
//! detail stream, and reports the pixel extents of the detail blocks that must
//! stay together. This crate slices the detail stream into page-sized bands
//! without cutting through those blocks, stamps a header banner on
//! continuation pages and writes an image-per-page PDF.
//!
//! ```no_run
//! use report_paginator::{
//!     ContentRenderer, ExportOptions, Exporter, NeverCancel, RasterImage, RenderedContent,
//!     ReportHeaderInfo,
//! };
//!
//! struct PngRenderer;
//!
//! impl ContentRenderer for PngRenderer {
//!     fn render_cover(&self) -> Result<RenderedContent, report_paginator::BoxError> {
//!         let raster = RasterImage::from_path("cover.png", 190.0)?;
//!         Ok(RenderedContent::new(raster, Vec::new()))
//!     }
//!
//!     fn render_detail(&self) -> Result<RenderedContent, report_paginator::BoxError> {
//!         let raster = RasterImage::from_path("detail.png", 190.0)?;
//!         Ok(RenderedContent::new(raster, Vec::new()))
//!     }
//! }
//!
//! let header = ReportHeaderInfo::new("Lot 42 Quality Report", "QA", "2026-10-18");
//! let report = Exporter::new(ExportOptions::new())
//!     .export_to_file(&PngRenderer, &header, &NeverCancel, "report.pdf")?;
//! println!("{} pages", report.page_count);
//! # Ok::<(), report_paginator::ExportError>(())
//! ```

pub mod banner;
pub mod cover;
pub mod document;
pub mod error;
pub mod export;
pub mod fonts;
pub mod geometry;
pub mod raster;
pub mod slicer;
pub mod writer;
pub mod zones;

#[cfg(feature = "bookmarks")]
pub mod outline;

pub use banner::{BannerRenderer, HeaderBanner, ReportHeaderInfo, TextBannerRenderer};
pub use error::{BoxError, ContentPart, ExportError, Result};
pub use export::{
    default_export_filename, CancelToken, ContentRenderer, ExportOptions, ExportReport, Exporter,
    NeverCancel, RenderedContent,
};
pub use geometry::PageGeometry;
pub use raster::{ImageEncoding, RasterImage};
pub use slicer::{PageSlice, SlicePlan, Slicer, MIN_ACCEPTABLE_FILL_RATIO};
pub use zones::{collect_avoid_zones, AvoidZone, BoxKind, ContentBox};
