//! PDF output built with `printpdf`.
//!
//! Every page shares one physical size. Each page embeds its raster content as
//! an image scaled to the content width; detail pages place the slice at their
//! own top margin and, when requested, the header banner at `margin_top`.

use std::io::Write;
use std::path::Path;

use image::RgbImage;
use log::{debug, info};
use printpdf::{ImageTransform, Mm, PdfDocument, PdfLayerReference};
use tempfile::NamedTempFile;

use crate::banner::HeaderBanner;
use crate::cover::CoverPage;
use crate::document::{DetailPage, Document, Page};
use crate::error::{ExportError, Result};
use crate::export::CancelToken;
use crate::geometry::PageGeometry;
use crate::raster::{to_pdf_image, ImageEncoding, RasterImage, MM_PER_INCH};

const DEFAULT_DOCUMENT_TITLE: &str = "Report";

/// Serializes a [`Document`] into PDF bytes.
#[derive(Clone, Debug)]
pub struct DocumentWriter {
    geometry: PageGeometry,
    encoding: ImageEncoding,
    title: String,
}

impl DocumentWriter {
    pub fn new(geometry: PageGeometry) -> Self {
        Self {
            geometry,
            encoding: ImageEncoding::default(),
            title: DEFAULT_DOCUMENT_TITLE.to_string(),
        }
    }

    /// Sets how page images are embedded.
    pub fn with_encoding(mut self, encoding: ImageEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Sets the PDF document title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Writes all pages and returns the finished PDF.
    ///
    /// `cancel` is polled before each page; a cancelled write returns
    /// [`ExportError::Cancelled`] and produces no bytes.
    pub fn write(
        &self,
        document: &Document,
        detail: &RasterImage,
        banner: Option<&HeaderBanner>,
        cancel: &dyn CancelToken,
    ) -> Result<Vec<u8>> {
        let width = Mm(self.geometry.page_width as f32);
        let height = Mm(self.geometry.page_height as f32);
        let (pdf, first_page, first_layer) = PdfDocument::new(&self.title, width, height, "Page 1");

        for (index, page) in document.pages().iter().enumerate() {
            if cancel.is_cancelled() {
                info!("export cancelled before page {}", index + 1);
                return Err(ExportError::Cancelled);
            }

            let layer = if index == 0 {
                pdf.get_page(first_page).get_layer(first_layer)
            } else {
                let (page_index, layer_index) =
                    pdf.add_page(width, height, format!("Page {}", index + 1));
                pdf.get_page(page_index).get_layer(layer_index)
            };

            match page {
                Page::Cover(cover) => self.draw_cover(&layer, cover)?,
                Page::Detail(detail_page) => {
                    self.draw_detail(&layer, detail_page, detail, banner)?
                }
            }
        }

        let bytes = pdf.save_to_bytes()?;
        info!(
            "wrote {} page(s), {} bytes",
            document.page_count(),
            bytes.len()
        );
        Ok(bytes)
    }

    fn draw_cover(&self, layer: &PdfLayerReference, cover: &CoverPage) -> Result<()> {
        let pixels = cover.raster().crop_rows(0, cover.visible_height_px());
        self.place(
            layer,
            &pixels,
            self.geometry.margin_top,
            cover.dest_physical_height(&self.geometry),
        )
    }

    fn draw_detail(
        &self,
        layer: &PdfLayerReference,
        page: &DetailPage,
        detail: &RasterImage,
        banner: Option<&HeaderBanner>,
    ) -> Result<()> {
        if page.banner {
            match banner {
                Some(banner) => self.place(
                    layer,
                    banner.raster().pixels(),
                    self.geometry.margin_top,
                    self.geometry.banner_height,
                )?,
                None => debug!("no banner available for continuation page"),
            }
        }

        let pixels = detail.crop_rows(page.slice.source_top_px, page.slice.source_height_px);
        self.place(
            layer,
            &pixels,
            page.top_margin,
            page.slice.dest_physical_height,
        )
    }

    /// Draws `pixels` at content width, `top` millimetres below the page edge.
    fn place(
        &self,
        layer: &PdfLayerReference,
        pixels: &RgbImage,
        top: f64,
        dest_height: f64,
    ) -> Result<()> {
        let (width_px, height_px) = pixels.dimensions();
        if width_px == 0 || height_px == 0 || dest_height <= 0.0 {
            return Ok(());
        }

        let dest_width = self.geometry.content_width();
        let dpi = f64::from(width_px) * MM_PER_INCH / dest_width;
        let natural_height = f64::from(height_px) * MM_PER_INCH / dpi;
        let bottom = self.geometry.page_height - top - dest_height;

        let image = to_pdf_image(pixels, self.encoding)?;
        image.add_to_layer(
            layer.clone(),
            ImageTransform {
                translate_x: Some(Mm(self.geometry.margin_left as f32)),
                translate_y: Some(Mm(bottom as f32)),
                scale_x: Some(1.0),
                scale_y: Some((dest_height / natural_height) as f32),
                dpi: Some(dpi as f32),
                ..Default::default()
            },
        );
        Ok(())
    }
}

/// Writes `bytes` to `path` through a temporary file in the same directory.
/// A failed write leaves no partial document at `path`.
pub fn persist_atomically(bytes: &[u8], path: &Path) -> Result<()> {
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = NamedTempFile::new_in(directory)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|err| err.error)?;
    Ok(())
}
