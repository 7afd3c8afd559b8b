use std::sync::atomic::AtomicBool;

use image::{Rgb, RgbImage};
use lopdf::{Dictionary, Object, ObjectId};
use report_paginator::banner::BannerError;
use report_paginator::{
    fonts, BannerRenderer, BoxError, BoxKind, ContentBox, ContentRenderer, ExportError,
    ExportOptions, Exporter, ImageEncoding, NeverCancel, PageGeometry, RasterImage,
    RenderedContent, ReportHeaderInfo,
};
use sha2::{Digest, Sha256};

const A4_WIDTH_PT: f64 = 595.2756;
const A4_HEIGHT_PT: f64 = 841.8898;

struct StaticRenderer {
    cover: RenderedContent,
    detail: RenderedContent,
}

impl ContentRenderer for StaticRenderer {
    fn render_cover(&self) -> Result<RenderedContent, BoxError> {
        Ok(self.cover.clone())
    }

    fn render_detail(&self) -> Result<RenderedContent, BoxError> {
        Ok(self.detail.clone())
    }
}

struct UnavailableRenderer;

impl ContentRenderer for UnavailableRenderer {
    fn render_cover(&self) -> Result<RenderedContent, BoxError> {
        Err("host surface missing".into())
    }

    fn render_detail(&self) -> Result<RenderedContent, BoxError> {
        Err("host surface missing".into())
    }
}

struct StripeBanner;

impl BannerRenderer for StripeBanner {
    fn render(
        &self,
        _info: &ReportHeaderInfo,
        width_px: u32,
        height_px: u32,
    ) -> Result<RgbImage, BannerError> {
        Ok(RgbImage::from_fn(width_px, height_px, |x, _| {
            Rgb([(x % 255) as u8, 40, 40])
        }))
    }
}

struct BrokenBanner;

impl BannerRenderer for BrokenBanner {
    fn render(&self, _: &ReportHeaderInfo, _: u32, _: u32) -> Result<RgbImage, BannerError> {
        Err(BannerError::Backend("no drawing surface".into()))
    }
}

fn raster(width_px: u32, height_px: u32, px_per_unit: f64) -> RasterImage {
    let pixels = RgbImage::from_fn(width_px, height_px, |x, y| {
        Rgb([(y % 251) as u8, (x % 241) as u8, 128])
    });
    RasterImage::from_rgb(pixels, px_per_unit).expect("raster")
}

/// A4 content is 190mm wide; rasters are rendered at 2px/mm.
fn a4_renderer(detail_height_px: u32, boxes: Vec<ContentBox>) -> StaticRenderer {
    StaticRenderer {
        cover: RenderedContent::new(raster(380, 420, 2.0), Vec::new()),
        detail: RenderedContent::new(raster(380, detail_height_px, 2.0), boxes),
    }
}

/// 100-unit content area with a 95-unit first slot and an 80-unit
/// continuation slot below a 10-unit banner.
fn compact_geometry() -> PageGeometry {
    PageGeometry::a4()
        .with_page_size(100.0, 110.0)
        .with_margins(5.0, 5.0, 10.0, 5.0)
        .with_detail_top_margins(5.0, 20.0)
        .with_banner_height(10.0)
}

fn compact_renderer(detail_height_px: u32) -> StaticRenderer {
    StaticRenderer {
        cover: RenderedContent::new(raster(90, 60, 1.0), Vec::new()),
        detail: RenderedContent::new(raster(90, detail_height_px, 1.0), Vec::new()),
    }
}

fn header() -> ReportHeaderInfo {
    ReportHeaderInfo::new("Lot 7 Quality Report", "QA Department", "2026-10-18")
        .with_subtitle(Some("Manufacturing".to_string()))
}

fn parse(bytes: &[u8]) -> lopdf::Document {
    lopdf::Document::load_mem(bytes).expect("parse exported pdf")
}

fn number(object: &Object) -> f64 {
    match object {
        Object::Integer(value) => *value as f64,
        Object::Real(value) => *value as f64,
        other => panic!("expected a number, got {other:?}"),
    }
}

fn media_box(document: &lopdf::Document, page_id: ObjectId) -> (f64, f64) {
    let page = document.get_dictionary(page_id).expect("page dictionary");
    let values = page
        .get(b"MediaBox")
        .and_then(Object::as_array)
        .expect("media box");
    (number(&values[2]), number(&values[3]))
}

fn page_xobjects(document: &lopdf::Document, page_id: ObjectId) -> Vec<ObjectId> {
    let (direct, inherited) = document.get_page_resources(page_id);
    let mut resources: Vec<&Dictionary> = direct.into_iter().collect();
    resources.extend(
        inherited
            .into_iter()
            .filter_map(|id| document.get_dictionary(id).ok()),
    );

    let mut ids = Vec::new();
    for xobjects in resources
        .iter()
        .filter_map(|dictionary| dictionary.get(b"XObject").ok())
    {
        let dictionary = match xobjects {
            Object::Dictionary(dictionary) => Some(dictionary),
            Object::Reference(id) => document.get_dictionary(*id).ok(),
            _ => None,
        };
        if let Some(dictionary) = dictionary {
            ids.extend(
                dictionary
                    .iter()
                    .filter_map(|(_, value)| value.as_reference().ok()),
            );
        }
    }
    ids
}

fn xobject_count(document: &lopdf::Document, page_id: ObjectId) -> usize {
    page_xobjects(document, page_id).len()
}

type ImageFingerprint = (i64, i64, [u8; 32]);

/// Per page, the embedded images as (width, height, content digest).
///
/// Object numbers and resource names are not stable between runs, so images
/// are compared by what they contain and sorted within each page.
fn page_images(bytes: &[u8]) -> Vec<Vec<ImageFingerprint>> {
    let document = parse(bytes);
    document
        .get_pages()
        .values()
        .map(|page_id| {
            let mut images: Vec<ImageFingerprint> = page_xobjects(&document, *page_id)
                .into_iter()
                .filter_map(|id| document.get_object(id).ok()?.as_stream().ok())
                .map(|stream| {
                    let dimension = |key: &[u8]| {
                        stream
                            .dict
                            .get(key)
                            .and_then(Object::as_i64)
                            .expect("image dimension")
                    };
                    (
                        dimension(b"Width"),
                        dimension(b"Height"),
                        Sha256::digest(&stream.content).into(),
                    )
                })
                .collect();
            images.sort();
            images
        })
        .collect()
}

#[test]
fn exports_cover_and_detail_pages_at_a4() {
    // 1200 rows at 2px/mm = 600mm: slots of 277, 259 and the 64mm remainder.
    let exporter = Exporter::new(
        ExportOptions::new()
            .with_banner_renderer(StripeBanner)
            .with_image_encoding(ImageEncoding::Raw),
    );
    let (bytes, report) = exporter
        .export_to_bytes(&a4_renderer(1200, Vec::new()), &header(), &NeverCancel)
        .expect("export");

    assert_eq!(report.page_count, 4);
    assert_eq!(report.detail_pages, 3);
    assert!(report.banner_rendered);

    let document = parse(&bytes);
    let pages = document.get_pages();
    assert_eq!(pages.len(), 4);
    for page_id in pages.values() {
        let (width, height) = media_box(&document, *page_id);
        assert!((width - A4_WIDTH_PT).abs() < 0.01, "page width {width}");
        assert!((height - A4_HEIGHT_PT).abs() < 0.01, "page height {height}");
    }
}

#[test]
fn continuation_pages_carry_banner_and_first_detail_page_does_not() {
    let exporter = Exporter::new(ExportOptions::new().with_banner_renderer(StripeBanner));
    let (bytes, _) = exporter
        .export_to_bytes(&a4_renderer(1200, Vec::new()), &header(), &NeverCancel)
        .expect("export");

    let document = parse(&bytes);
    let pages = document.get_pages();
    assert_eq!(xobject_count(&document, pages[&1]), 1, "cover");
    assert_eq!(xobject_count(&document, pages[&2]), 1, "first detail page");
    assert_eq!(xobject_count(&document, pages[&3]), 2, "continuation page");
    assert_eq!(xobject_count(&document, pages[&4]), 2, "continuation page");
}

#[test]
fn single_detail_page_without_inline_header_carries_banner() {
    let exporter = Exporter::new(
        ExportOptions::new()
            .with_geometry(compact_geometry())
            .with_inline_section_header(false)
            .with_banner_renderer(StripeBanner),
    );
    let (bytes, report) = exporter
        .export_to_bytes(&compact_renderer(50), &header(), &NeverCancel)
        .expect("export");

    assert_eq!(report.detail_pages, 1);
    let document = parse(&bytes);
    let pages = document.get_pages();
    assert_eq!(pages.len(), 2);
    assert_eq!(xobject_count(&document, pages[&2]), 2);
}

#[test]
fn compact_geometry_paginates_at_slot_boundaries() {
    let exporter = Exporter::new(
        ExportOptions::new()
            .with_geometry(compact_geometry())
            .without_banner(),
    );
    let (_, report) = exporter
        .export_to_bytes(&compact_renderer(150), &header(), &NeverCancel)
        .expect("export");
    assert_eq!(report.page_count, 3);
    assert!(!report.banner_rendered);
}

#[test]
fn avoid_zones_shift_page_breaks() {
    // A 40mm table straddling the first 277mm break moves to page two.
    let boxes = vec![
        ContentBox::new(500.0, 580.0, BoxKind::Table),
        ContentBox::new(590.0, 600.0, BoxKind::Chart),
    ];
    let options = ExportOptions::new().without_banner();
    let (_, report) = Exporter::new(options.clone())
        .export_to_bytes(&a4_renderer(1100, boxes.clone()), &header(), &NeverCancel)
        .expect("export");
    assert_eq!(report.forced_splits, 0);

    let zones = report_paginator::collect_avoid_zones(&boxes, 1100);
    let plan = options
        .slicer()
        .plan_raster(&raster(380, 1100, 2.0), &zones)
        .expect("plan");
    assert_eq!(plan.slices[0].source_bottom_px(), 500);
    assert_eq!(report.detail_pages, plan.len());
}

#[test]
fn detail_scale_is_taken_from_content_width() {
    // Declared at 4px/mm, but 380px drawn across 190mm is 2px/mm: 600mm of content.
    let renderer = StaticRenderer {
        cover: RenderedContent::new(raster(380, 420, 2.0), Vec::new()),
        detail: RenderedContent::new(raster(380, 1200, 4.0), Vec::new()),
    };
    let (_, report) = Exporter::new(ExportOptions::new().without_banner())
        .export_to_bytes(&renderer, &header(), &NeverCancel)
        .expect("export");
    assert_eq!(report.detail_pages, 3);
}

#[test]
fn oversized_zone_is_reported_not_fatal() {
    // A 300mm chart panel cannot fit any slot.
    let boxes = vec![ContentBox::new(100.0, 700.0, BoxKind::Chart)];
    let (_, report) = Exporter::new(ExportOptions::new().without_banner())
        .export_to_bytes(&a4_renderer(1000, boxes), &header(), &NeverCancel)
        .expect("export");
    assert_eq!(report.oversized_zones, 1);
    assert!(report.forced_splits >= 1);
}

#[test]
fn empty_detail_stream_writes_cover_only() {
    let (bytes, report) = Exporter::new(ExportOptions::new().with_banner_renderer(StripeBanner))
        .export_to_bytes(&a4_renderer(0, Vec::new()), &header(), &NeverCancel)
        .expect("export");

    assert_eq!(report.page_count, 1);
    assert_eq!(report.detail_pages, 0);
    assert_eq!(parse(&bytes).get_pages().len(), 1);
}

#[test]
fn overflowing_cover_is_clipped_to_one_page() {
    let renderer = StaticRenderer {
        cover: RenderedContent::new(raster(380, 700, 2.0), Vec::new()),
        detail: RenderedContent::new(raster(380, 100, 2.0), Vec::new()),
    };
    let (_, report) = Exporter::new(ExportOptions::new().without_banner())
        .export_to_bytes(&renderer, &header(), &NeverCancel)
        .expect("export");
    assert_eq!(report.page_count, 2);
    assert_eq!(report.cover_overflow_px, 146);
}

#[test]
fn banner_failure_degrades_gracefully() {
    let (_, report) = Exporter::new(ExportOptions::new().with_banner_renderer(BrokenBanner))
        .export_to_bytes(&a4_renderer(1200, Vec::new()), &header(), &NeverCancel)
        .expect("export despite banner failure");
    assert!(!report.banner_rendered);
    assert_eq!(report.page_count, 4);
}

#[test]
fn render_failure_aborts_without_output_file() {
    let directory = tempfile::tempdir().expect("tempdir");
    let target = directory.path().join("report.pdf");

    let err = Exporter::default()
        .export_to_file(&UnavailableRenderer, &header(), &NeverCancel, &target)
        .unwrap_err();

    assert!(matches!(err, ExportError::RenderUnavailable { .. }));
    assert!(!target.exists());
}

#[test]
fn cancelled_export_leaves_no_file() {
    let directory = tempfile::tempdir().expect("tempdir");
    let target = directory.path().join("report.pdf");
    let cancel = AtomicBool::new(true);

    let err = Exporter::new(ExportOptions::new().without_banner())
        .export_to_file(&a4_renderer(1200, Vec::new()), &header(), &cancel, &target)
        .unwrap_err();

    assert!(matches!(err, ExportError::Cancelled));
    assert!(!target.exists());
}

#[test]
fn invalid_geometry_is_rejected_before_rendering() {
    let geometry = PageGeometry::a4().with_detail_top_margins(10.0, 300.0);
    let err = Exporter::new(ExportOptions::new().with_geometry(geometry))
        .export_to_bytes(&UnavailableRenderer, &header(), &NeverCancel)
        .unwrap_err();
    assert!(matches!(err, ExportError::InvalidGeometry(_)));
}

#[test]
fn export_to_file_writes_complete_pdf() {
    let directory = tempfile::tempdir().expect("tempdir");
    let target = directory.path().join("report_2026-10-18.pdf");

    let report = Exporter::new(ExportOptions::new().with_banner_renderer(StripeBanner))
        .export_to_file(&a4_renderer(900, Vec::new()), &header(), &NeverCancel, &target)
        .expect("export to file");

    let bytes = std::fs::read(&target).expect("read output");
    assert_eq!(parse(&bytes).get_pages().len(), report.page_count);
}

#[test]
fn exports_are_deterministic() {
    let boxes = vec![ContentBox::new(480.0, 620.0, BoxKind::PhotoCard)];
    let exporter = Exporter::new(ExportOptions::new().with_banner_renderer(StripeBanner));
    let renderer = a4_renderer(1500, boxes);

    let (bytes_a, report_a) = exporter
        .export_to_bytes(&renderer, &header(), &NeverCancel)
        .expect("first export");
    let (bytes_b, report_b) = exporter
        .export_to_bytes(&renderer, &header(), &NeverCancel)
        .expect("second export");

    assert_eq!(report_a, report_b);

    let pages_a = page_images(&bytes_a);
    let pages_b = page_images(&bytes_b);
    assert_eq!(pages_a.len(), report_a.page_count);
    assert_eq!(
        pages_a, pages_b,
        "exports of the same content must embed the same images on the same pages"
    );

    // Cover, first detail page, then continuations with the 28px banner.
    assert_eq!(pages_a[0].len(), 1);
    assert_eq!(pages_a[1].len(), 1);
    for page in &pages_a[2..] {
        assert_eq!(page.len(), 2);
        assert!(page.iter().any(|(width, height, _)| (*width, *height) == (380, 28)));
    }
}

#[test]
fn default_banner_uses_bundled_fonts_when_available() {
    let (_, report) = Exporter::default()
        .export_to_bytes(&a4_renderer(1200, Vec::new()), &header(), &NeverCancel)
        .expect("export");

    if fonts::default_fonts_available() {
        assert!(report.banner_rendered);
    } else {
        eprintln!(
            "Bundled fonts missing; verified the export completes without a banner. Set REPORT_PAGINATOR_FONTS_DIR to exercise text banners."
        );
    }
    assert_eq!(report.page_count, 4);
}
