//! The export pipeline.
//!
//! One call runs one export: render cover and detail, collect avoid zones,
//! render the banner while the slicer plans pages, assemble the document and
//! write it. Any stage failure aborts the export without producing output;
//! only a banner failure is recovered from, by omitting the banner.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use log::{debug, info, warn};
use serde::Serialize;

use crate::banner::{render_header_banner, BannerRenderer, ReportHeaderInfo, TextBannerRenderer};
use crate::cover::CoverPage;
use crate::document::{Document, Page};
use crate::error::{BoxError, ContentPart, ExportError, Result};
use crate::geometry::PageGeometry;
use crate::raster::{ImageEncoding, RasterImage};
use crate::slicer::{Slicer, DEFAULT_EPSILON_MM, MIN_ACCEPTABLE_FILL_RATIO};
use crate::writer::{persist_atomically, DocumentWriter};
use crate::zones::{collect_avoid_zones, ContentBox};

/// A raster capture plus the keep-together boxes measured while rendering it.
#[derive(Clone, Debug)]
pub struct RenderedContent {
    pub raster: RasterImage,
    pub content_boxes: Vec<ContentBox>,
}

impl RenderedContent {
    pub fn new(raster: RasterImage, content_boxes: Vec<ContentBox>) -> Self {
        Self {
            raster,
            content_boxes,
        }
    }
}

/// Host-provided renderer turning the report snapshot into rasters.
pub trait ContentRenderer {
    fn render_cover(&self) -> std::result::Result<RenderedContent, BoxError>;
    fn render_detail(&self) -> std::result::Result<RenderedContent, BoxError>;
}

/// Polled between pages to abort an export.
pub trait CancelToken {
    fn is_cancelled(&self) -> bool;
}

/// A token that never cancels.
#[derive(Clone, Copy, Debug, Default)]
pub struct NeverCancel;

impl CancelToken for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}

impl CancelToken for AtomicBool {
    fn is_cancelled(&self) -> bool {
        self.load(Ordering::Relaxed)
    }
}

impl<T: CancelToken + ?Sized> CancelToken for Arc<T> {
    fn is_cancelled(&self) -> bool {
        (**self).is_cancelled()
    }
}

/// Returns the default output file name for an export on `date`.
pub fn default_export_filename(date: NaiveDate) -> String {
    format!("report_{}.pdf", date.format("%Y-%m-%d"))
}

/// Settings for one export.
///
/// Defaults: A4 geometry, a 25% fill floor, a 0.5mm epsilon, JPEG images,
/// the text banner, and a detail stream that opens with its own section
/// header. Under that last default the first detail page has no banner, so a
/// report whose details fit on one page shows no banner at all; see
/// [`ExportOptions::with_inline_section_header`].
#[derive(Clone)]
pub struct ExportOptions {
    geometry: PageGeometry,
    min_fill_ratio: f64,
    epsilon: f64,
    inline_section_header: bool,
    encoding: ImageEncoding,
    banner_renderer: Option<Arc<dyn BannerRenderer>>,
    title: Option<String>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            geometry: PageGeometry::default(),
            min_fill_ratio: MIN_ACCEPTABLE_FILL_RATIO,
            epsilon: DEFAULT_EPSILON_MM,
            inline_section_header: true,
            encoding: ImageEncoding::default(),
            banner_renderer: Some(Arc::new(TextBannerRenderer::new())),
            title: None,
        }
    }
}

impl ExportOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the page geometry.
    pub fn with_geometry(mut self, geometry: PageGeometry) -> Self {
        self.geometry = geometry;
        self
    }

    /// Sets the minimum share of a slot a snapped page must fill.
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
    /// `true` (the default) gives the first detail page the smaller first-page
    /// top margin and no banner. `false` makes every detail page a
    /// continuation page with the banner.
    pub fn with_inline_section_header(mut self, inline: bool) -> Self {
        self.inline_section_header = inline;
        self
    }

    /// Sets how page images are embedded.
    pub fn with_image_encoding(mut self, encoding: ImageEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Replaces the banner renderer.
    pub fn with_banner_renderer<R>(mut self, renderer: R) -> Self
    where
        R: BannerRenderer + 'static,
    {
        self.banner_renderer = Some(Arc::new(renderer));
        self
    }

    /// Disables the header banner entirely.
    pub fn without_banner(mut self) -> Self {
        self.banner_renderer = None;
        self
    }

    /// Overrides the PDF title, which defaults to the report title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn geometry(&self) -> &PageGeometry {
        &self.geometry
    }

    /// The slicer configured by these options.
    pub fn slicer(&self) -> Slicer {
        Slicer::from_geometry(&self.geometry)
            .with_min_fill_ratio(self.min_fill_ratio)
            .with_epsilon(self.epsilon)
            .with_inline_section_header(self.inline_section_header)
    }

    fn validate(&self) -> Result<()> {
        self.geometry.validate()?;
        self.slicer().validate()
    }
}

/// What an export produced.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ExportReport {
    pub page_count: usize,
    pub detail_pages: usize,
    /// Page boundaries placed inside an avoid zone.
    pub forced_splits: usize,
    /// Distinct zones split because they exceed a content slot.
    pub oversized_zones: usize,
    pub banner_rendered: bool,
    /// Cover rows clipped at the bottom margin.
    pub cover_overflow_px: u32,
}

/// Runs exports with a fixed set of options.
#[derive(Clone, Default)]
pub struct Exporter {
    options: ExportOptions,
}

impl Exporter {
    pub fn new(options: ExportOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    /// Runs the full pipeline and returns the PDF bytes.
    pub fn export_to_bytes(
        &self,
        renderer: &dyn ContentRenderer,
        header: &ReportHeaderInfo,
        cancel: &dyn CancelToken,
    ) -> Result<(Vec<u8>, ExportReport)> {
        self.options.validate()?;
        let geometry = self.options.geometry;

        let cover = renderer
            .render_cover()
            .map_err(|source| ExportError::render_unavailable(ContentPart::Cover, source))?;
        let detail = renderer
            .render_detail()
            .map_err(|source| ExportError::render_unavailable(ContentPart::Detail, source))?;

        let cover = CoverPage::from_content(cover, &geometry);
        let RenderedContent {
            raster: detail,
            content_boxes,
        } = detail;

        let detail = detail_at_content_width(detail, geometry.content_width())?;

        let zones = collect_avoid_zones(&content_boxes, detail.height_px());
        debug!(
            "collected {} avoid zone(s) from {} content box(es)",
            zones.len(),
            content_boxes.len()
        );

        let slicer = self.options.slicer();
        let banner_scale = if detail.is_empty() {
            cover.raster().px_per_unit()
        } else {
            detail.px_per_unit()
        };

        let (banner, plan) = rayon::join(
            || {
                self.options.banner_renderer.as_deref().and_then(|renderer| {
                    render_header_banner(renderer, header, &geometry, banner_scale)
                })
            },
            || slicer.plan_raster(&detail, &zones),
        );
        let plan = plan?;

        if plan.is_empty() {
            info!("detail stream is empty; writing cover page only");
        }

        let document = Document::assemble(cover, &plan, &slicer, &geometry);
        let report = ExportReport {
            page_count: document.page_count(),
            detail_pages: plan.len(),
            forced_splits: plan.forced_splits.len(),
            oversized_zones: plan.oversized_zone_count(),
            banner_rendered: banner.is_some(),
            cover_overflow_px: match document.pages().first() {
                Some(Page::Cover(cover)) => cover.overflow_px(),
                _ => 0,
            },
        };

        let title = self
            .options
            .title
            .clone()
            .unwrap_or_else(|| header.title.clone());
        let bytes = DocumentWriter::new(geometry)
            .with_encoding(self.options.encoding)
            .with_title(title)
            .write(&document, &detail, banner.as_ref(), cancel)?;

        #[cfg(feature = "bookmarks")]
        let bytes = crate::outline::apply_page_outline(&bytes, &outline_entries(&report))?;

        Ok((bytes, report))
    }

    /// Runs the full pipeline and writes the PDF to `path`.
    ///
    /// The file only appears once the document is complete.
    pub fn export_to_file(
        &self,
        renderer: &dyn ContentRenderer,
        header: &ReportHeaderInfo,
        cancel: &dyn CancelToken,
        path: impl AsRef<Path>,
    ) -> Result<ExportReport> {
        let path = path.as_ref();
        let (bytes, report) = self.export_to_bytes(renderer, header, cancel)?;
        persist_atomically(&bytes, path)?;
        info!("exported {} page(s) to {}", report.page_count, path.display());
        Ok(report)
    }
}

/// Relative scale difference tolerated before the detail raster is refit.
const SCALE_TOLERANCE: f64 = 0.01;

/// Maps detail rows to millimetres through the horizontal scale, since the
/// writer draws every slice at content width.
fn detail_at_content_width(detail: RasterImage, content_width: f64) -> Result<RasterImage> {
    if detail.is_empty() {
        return Ok(detail);
    }

    let fitted = detail
        .rescaled_to_width(content_width)
        .map_err(|err| ExportError::InvalidGeometry(err.to_string()))?;
    let drift = (fitted.px_per_unit() - detail.px_per_unit()).abs() / detail.px_per_unit();
    if drift > SCALE_TOLERANCE {
        warn!(
            "detail raster spans {:.1}mm at {:.3}px/mm but is drawn {:.1}mm wide; paginating at {:.3}px/mm",
            detail.physical_width(),
            detail.px_per_unit(),
            content_width,
            fitted.px_per_unit()
        );
    }
    Ok(fitted)
}

#[cfg(feature = "bookmarks")]
fn outline_entries(report: &ExportReport) -> Vec<crate::outline::OutlineEntry> {
    use crate::outline::OutlineEntry;

    let mut entries = vec![OutlineEntry::new("Cover", 1)];
    if report.detail_pages > 0 {
        entries.push(OutlineEntry::new("Details", 2));
    }
    entries
}
