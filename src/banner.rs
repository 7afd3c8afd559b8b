//! Header banner rendering for continuation pages.
//!
//! The banner is a small raster summarizing document identity: title and
//! subtitle on the left, owner label and date on the right, and a rule line
//! underneath. It is rendered once per export and shared by every
//! continuation page. A banner that cannot be rendered is dropped with a
//! warning instead of failing the export.

use image::{Rgb, RgbImage};
use log::{debug, warn};
use rusttype::{point, Font, Scale};
use thiserror::Error;

use crate::fonts::{self, BannerFonts, FontError};
use crate::geometry::PageGeometry;
use crate::raster::{RasterError, RasterImage};

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const TEXT_COLOR: Rgb<u8> = Rgb([33, 37, 41]);
const MUTED_COLOR: Rgb<u8> = Rgb([108, 117, 125]);
const RULE_COLOR: Rgb<u8> = Rgb([52, 58, 64]);

const PADDING_RATIO: f32 = 0.10;
const TITLE_SCALE_RATIO: f32 = 0.34;
const SUBTITLE_SCALE_RATIO: f32 = 0.22;
const OWNER_SCALE_RATIO: f32 = 0.24;
const DATE_SCALE_RATIO: f32 = 0.22;
const RULE_THICKNESS_RATIO: f32 = 0.03;
const LEFT_COLUMN_RATIO: f32 = 0.62;

/// Document identity shown in the banner.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReportHeaderInfo {
    pub title: String,
    pub subtitle: Option<String>,
    pub owner_label: String,
    pub date: String,
}

impl ReportHeaderInfo {
    pub fn new(
        title: impl Into<String>,
        owner_label: impl Into<String>,
        date: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            subtitle: None,
            owner_label: owner_label.into(),
            date: date.into(),
        }
    }

    /// Sets the subtitle shown below the title.
    pub fn with_subtitle(mut self, subtitle: impl Into<Option<String>>) -> Self {
        self.subtitle = subtitle.into();
        self
    }
}

/// Errors raised while rendering a banner.
#[derive(Error, Debug)]
pub enum BannerError {
    #[error(transparent)]
    Fonts(#[from] FontError),

    #[error("banner canvas of {width}x{height}px is empty")]
    EmptyCanvas { width: u32, height: u32 },

    #[error(transparent)]
    Raster(#[from] RasterError),

    /// A custom renderer failed.
    #[error("banner backend failed: {0}")]
    Backend(String),
}

/// Produces the banner raster for a given pixel size.
pub trait BannerRenderer: Send + Sync {
    fn render(
        &self,
        info: &ReportHeaderInfo,
        width_px: u32,
        height_px: u32,
    ) -> Result<RgbImage, BannerError>;
}

/// The rendered banner, shared by reference across continuation pages.
#[derive(Clone, Debug)]
pub struct HeaderBanner {
    raster: RasterImage,
}

impl HeaderBanner {
    pub fn raster(&self) -> &RasterImage {
        &self.raster
    }
}

/// Renders the banner once at `content_width x banner_height`.
///
/// Returns `None`, after logging, when the geometry reserves no banner height
/// or the renderer fails.
pub fn render_header_banner(
    renderer: &dyn BannerRenderer,
    info: &ReportHeaderInfo,
    geometry: &PageGeometry,
    px_per_unit: f64,
) -> Option<HeaderBanner> {
    if geometry.banner_height <= 0.0 {
        debug!("geometry reserves no banner height; continuation pages carry no banner");
        return None;
    }

    let width_px = (geometry.content_width() * px_per_unit).round() as u32;
    let height_px = (geometry.banner_height * px_per_unit).round() as u32;

    let rendered = renderer
        .render(info, width_px, height_px)
        .and_then(|pixels| Ok(RasterImage::from_rgb(pixels, px_per_unit)?));

    match rendered {
        Ok(raster) => Some(HeaderBanner { raster }),
        Err(err) => {
            warn!("header banner unavailable, continuing without it: {err}");
            None
        }
    }
}

/// Draws the banner text with `rusttype`.
#[derive(Default)]
pub struct TextBannerRenderer {
    fonts: Option<BannerFonts>,
}

impl TextBannerRenderer {
    /// Creates a renderer that locates fonts when it first renders.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a renderer using already loaded fonts.
    pub fn with_fonts(fonts: BannerFonts) -> Self {
        Self { fonts: Some(fonts) }
    }
}

impl BannerRenderer for TextBannerRenderer {
    fn render(
        &self,
        info: &ReportHeaderInfo,
        width_px: u32,
        height_px: u32,
    ) -> Result<RgbImage, BannerError> {
        if width_px == 0 || height_px == 0 {
            return Err(BannerError::EmptyCanvas {
                width: width_px,
                height: height_px,
            });
        }

        let loaded;
        let fonts = match &self.fonts {
            Some(fonts) => fonts,
            None => {
                loaded = fonts::load_banner_fonts()?;
                &loaded
            }
        };

        let mut canvas = RgbImage::from_pixel(width_px, height_px, BACKGROUND);
        let height = height_px as f32;
        let width = width_px as f32;
        let padding = (height * PADDING_RATIO).max(1.0);
        let rule = (height * RULE_THICKNESS_RATIO).ceil().max(1.0) as u32;
        let text_bottom = height - rule as f32 - padding;

        let title_scale = Scale::uniform(height * TITLE_SCALE_RATIO);
        let title_baseline = padding + ascent(&fonts.bold, title_scale);
        let left_limit = width * LEFT_COLUMN_RATIO;
        draw_text(
            &mut canvas,
            &fonts.bold,
            title_scale,
            &info.title,
            padding,
            title_baseline,
            left_limit,
            TEXT_COLOR,
        );

        if let Some(subtitle) = info.subtitle.as_deref().filter(|s| !s.is_empty()) {
            let scale = Scale::uniform(height * SUBTITLE_SCALE_RATIO);
            let baseline = text_bottom + descent(&fonts.regular, scale);
            draw_text(
                &mut canvas,
                &fonts.regular,
                scale,
                subtitle,
                padding,
                baseline,
                left_limit,
                MUTED_COLOR,
            );
        }

        let owner_scale = Scale::uniform(height * OWNER_SCALE_RATIO);
        let owner_x = width - padding - text_width(&fonts.bold, owner_scale, &info.owner_label);
        draw_text(
            &mut canvas,
            &fonts.bold,
            owner_scale,
            &info.owner_label,
            owner_x.max(left_limit),
            padding + ascent(&fonts.bold, owner_scale),
            width - padding,
            TEXT_COLOR,
        );

        let date_scale = Scale::uniform(height * DATE_SCALE_RATIO);
        let date_x = width - padding - text_width(&fonts.regular, date_scale, &info.date);
        draw_text(
            &mut canvas,
            &fonts.regular,
            date_scale,
            &info.date,
            date_x.max(left_limit),
            text_bottom + descent(&fonts.regular, date_scale),
            width - padding,
            MUTED_COLOR,
        );

        fill_rows(&mut canvas, height_px.saturating_sub(rule), rule, RULE_COLOR);
        Ok(canvas)
    }
}

fn ascent(font: &Font<'_>, scale: Scale) -> f32 {
    font.v_metrics(scale).ascent
}

// rusttype reports descent as a negative offset below the baseline.
fn descent(font: &Font<'_>, scale: Scale) -> f32 {
    font.v_metrics(scale).descent
}

fn text_width(font: &Font<'_>, scale: Scale, text: &str) -> f32 {
    font.layout(text, scale, point(0.0, 0.0))
        .last()
        .map(|glyph| glyph.position().x + glyph.unpositioned().h_metrics().advance_width)
        .unwrap_or(0.0)
}

#[allow(clippy::too_many_arguments)]
fn draw_text(
    canvas: &mut RgbImage,
    font: &Font<'_>,
    scale: Scale,
    text: &str,
    x: f32,
    baseline: f32,
    right_limit: f32,
    color: Rgb<u8>,
) {
    let (width, height) = canvas.dimensions();
    let limit = right_limit.min(width as f32).max(0.0) as i32;

    for glyph in font.layout(text, scale, point(x, baseline)) {
        let Some(bounds) = glyph.pixel_bounding_box() else {
            continue;
        };
        if bounds.max.x > limit {
            break;
        }
        glyph.draw(|gx, gy, coverage| {
            let px = bounds.min.x + gx as i32;
            let py = bounds.min.y + gy as i32;
            if px < 0 || py < 0 || px as u32 >= width || py as u32 >= height {
                return;
            }
            let pixel = canvas.get_pixel_mut(px as u32, py as u32);
            *pixel = blend(*pixel, color, coverage);
        });
    }
}

fn blend(background: Rgb<u8>, foreground: Rgb<u8>, coverage: f32) -> Rgb<u8> {
    let coverage = coverage.clamp(0.0, 1.0);
    let mix = |bg: u8, fg: u8| (bg as f32 * (1.0 - coverage) + fg as f32 * coverage).round() as u8;
    Rgb([
        mix(background[0], foreground[0]),
        mix(background[1], foreground[1]),
        mix(background[2], foreground[2]),
    ])
}

fn fill_rows(canvas: &mut RgbImage, top: u32, rows: u32, color: Rgb<u8>) {
    let bottom = top.saturating_add(rows).min(canvas.height());
    for y in top..bottom {
        for x in 0..canvas.width() {
            canvas.put_pixel(x, y, color);
        }
    }
}
