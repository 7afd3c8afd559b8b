//! Page-ordered document model assembled before anything is written.

use crate::cover::CoverPage;
use crate::geometry::PageGeometry;
use crate::slicer::{PageSlice, SlicePlan, Slicer};

/// One detail page: a slice of the detail raster plus its page chrome.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetailPage {
    pub slice: PageSlice,
    /// Top margin in millimetres at which the slice starts.
    pub top_margin: f64,
    /// Whether the header banner is stamped above the slice.
    pub banner: bool,
}

/// A page of the output document.
#[derive(Clone, Debug)]
pub enum Page {
    Cover(CoverPage),
    Detail(DetailPage),
}

/// The ordered pages of one export.
#[derive(Clone, Debug)]
pub struct Document {
    pages: Vec<Page>,
}

impl Document {
    /// Lays out the cover followed by one page per planned slice.
    ///
    /// The first slice is treated as the first detail page only when the slicer
    /// was told the detail stream carries its own section header; every other
    /// detail page uses the continuation margin and requests the banner.
    pub fn assemble(
        cover: CoverPage,
        plan: &SlicePlan,
        slicer: &Slicer,
        geometry: &PageGeometry,
    ) -> Self {
        let mut pages = Vec::with_capacity(plan.len() + 1);
        pages.push(Page::Cover(cover));

        pages.extend(plan.slices.iter().enumerate().map(|(index, slice)| {
            let first = slicer.is_first_page_slot(index);
            Page::Detail(DetailPage {
                slice: *slice,
                top_margin: if first {
                    geometry.first_page_top_margin
                } else {
                    geometry.continuation_top_margin
                },
                banner: !first,
            })
        }));

        Self { pages }
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Detail pages in output order.
    pub fn detail_pages(&self) -> impl Iterator<Item = &DetailPage> {
        self.pages.iter().filter_map(|page| match page {
            Page::Detail(detail) => Some(detail),
            Page::Cover(_) => None,
        })
    }
}
