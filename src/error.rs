//! Error types for the export pipeline.

use std::fmt;
use std::io;

use thiserror::Error;

/// Result type alias for export operations.
pub type Result<T> = std::result::Result<T, ExportError>;

/// Boxed error returned by external collaborators such as content renderers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The part of the report a content renderer was asked to produce.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentPart {
    /// The fixed-size cover block.
    Cover,
    /// The variable-height detail stream.
    Detail,
}

impl fmt::Display for ContentPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cover => f.write_str("cover"),
            Self::Detail => f.write_str("detail"),
        }
    }
}

/// Errors that abort an export.
///
/// Oversized avoid zones, empty detail streams and banner failures are not
/// represented here: the pipeline recovers from them and reports them through
/// [`ExportReport`](crate::export::ExportReport) instead.
#[derive(Error, Debug)]
pub enum ExportError {
    /// The content renderer could not produce a raster.
    #[error("content renderer could not produce the {part} raster: {source}")]
    RenderUnavailable {
        /// Which part of the report failed to render.
        part: ContentPart,
        /// Error reported by the renderer.
        #[source]
        source: BoxError,
    },

    /// The page geometry or slicer settings cannot produce a usable layout.
    #[error("invalid page geometry: {0}")]
    InvalidGeometry(String),

    /// A page image could not be encoded for embedding.
    #[error("failed to encode page image: {0}")]
    ImageEncode(#[from] image::ImageError),

    /// The PDF document could not be serialized.
    #[error("failed to serialize PDF document: {0}")]
    PdfSerialize(String),

    /// The finished document could not be written to its destination.
    #[error("failed to write document: {0}")]
    WriteFailure(#[from] io::Error),

    /// The caller cancelled the export before the document was finalized.
    #[error("export cancelled")]
    Cancelled,

    /// The document outline could not be applied.
    #[cfg(feature = "bookmarks")]
    #[error(transparent)]
    Outline(#[from] crate::outline::OutlineError),
}

impl ExportError {
    pub(crate) fn render_unavailable(part: ContentPart, source: BoxError) -> Self {
        Self::RenderUnavailable { part, source }
    }
}

impl From<printpdf::Error> for ExportError {
    fn from(err: printpdf::Error) -> Self {
        Self::PdfSerialize(err.to_string())
    }
}
