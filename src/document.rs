use image::RgbaImage;
use kurbo::Size;

use crate::render::RenderTile;

/// A decoded PDF as seen by the reader.
///
/// Implementations are shared with background threads, hence `Send + Sync`.
/// Backends whose native handles are thread bound (poppler) keep one handle
/// per thread behind this trait.
pub trait PdfDocument: Send + Sync + 'static {
    type Page: PdfPage;

    fn page_count(&self) -> usize;

    fn page(&self, index: usize) -> Option<Self::Page>;

    /// Stable byte identity of the document source (its URI), used to key
    /// per-document settings.
    fn identity(&self) -> &[u8];

    fn last_page_index(&self) -> usize {
        self.page_count().saturating_sub(1)
    }

    /// Like [`PdfDocument::page`] but with the index clamped into range.
    fn safe_page(&self, index: isize) -> Option<Self::Page> {
        if self.page_count() == 0 {
            return None;
        }
        self.page(clamp_index(index, self.page_count()))
    }
}

pub trait PdfPage {
    fn index(&self) -> usize;

    /// Size of the page's crop box in PDF points.
    fn crop_box_size(&self) -> Size;

    /// Renders the page through `tile`'s transform into a fresh image of the
    /// tile's size. Returns `None` when the page content cannot be drawn.
    fn render(&self, tile: &RenderTile) -> Option<RgbaImage>;
}

/// Clamps a possibly negative or too large index into `[0, count - 1]`.
/// `count` must be nonzero.
pub(crate) fn clamp_index(index: isize, count: usize) -> usize {
    let last = count.saturating_sub(1);
    if index <= 0 {
        0
    } else {
        (index as usize).min(last)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use image::{Rgba, RgbaImage};
    use kurbo::Size;

    use super::{PdfDocument, PdfPage};
    use crate::render::RenderTile;

    /// In-memory document whose pages render as solid images and which
    /// counts how many renders were requested.
    #[derive(Debug, Clone)]
    pub(crate) struct FakeDocument {
        pub(crate) sizes: Vec<Size>,
        pub(crate) uri: String,
        pub(crate) renders: Arc<AtomicUsize>,
        pub(crate) broken: Option<usize>,
    }

    impl FakeDocument {
        pub(crate) fn new(n_pages: usize) -> Self {
            FakeDocument {
                sizes: vec![Size::new(600.0, 800.0); n_pages],
                uri: "file:///tmp/fake.pdf".to_string(),
                renders: Arc::new(AtomicUsize::new(0)),
                broken: None,
            }
        }

        pub(crate) fn render_count(&self) -> usize {
            self.renders.load(Ordering::SeqCst)
        }
    }

    #[derive(Debug, Clone)]
    pub(crate) struct FakePage {
        index: usize,
        size: Size,
        renders: Arc<AtomicUsize>,
        broken: bool,
    }

    impl PdfDocument for FakeDocument {
        type Page = FakePage;

        fn page_count(&self) -> usize {
            self.sizes.len()
        }

        fn page(&self, index: usize) -> Option<FakePage> {
            self.sizes.get(index).map(|size| FakePage {
                index,
                size: *size,
                renders: self.renders.clone(),
                broken: self.broken == Some(index),
            })
        }

        fn identity(&self) -> &[u8] {
            self.uri.as_bytes()
        }
    }

    impl PdfPage for FakePage {
        fn index(&self) -> usize {
            self.index
        }

        fn crop_box_size(&self) -> Size {
            self.size
        }

        fn render(&self, tile: &RenderTile) -> Option<RgbaImage> {
            if self.broken {
                return None;
            }
            self.renders.fetch_add(1, Ordering::SeqCst);
            let (w, h) = tile.pixel_size();
            Some(RgbaImage::from_pixel(w, h, Rgba([self.index as u8, 0, 0, 255])))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::FakeDocument;
    use super::*;

    #[test]
    fn test_clamp_index() {
        assert_eq!(clamp_index(-5, 3), 0);
        assert_eq!(clamp_index(0, 3), 0);
        assert_eq!(clamp_index(2, 3), 2);
        assert_eq!(clamp_index(9, 3), 2);
        assert_eq!(clamp_index(isize::MAX, 3), 2);
    }

    #[test]
    fn test_safe_page() {
        let doc = FakeDocument::new(4);
        assert_eq!(doc.safe_page(-1).map(|p| p.index()), Some(0));
        assert_eq!(doc.safe_page(2).map(|p| p.index()), Some(2));
        assert_eq!(doc.safe_page(40).map(|p| p.index()), Some(3));
        assert_eq!(doc.last_page_index(), 3);

        let empty = FakeDocument::new(0);
        assert!(empty.safe_page(0).is_none());
        assert_eq!(empty.last_page_index(), 0);
    }
}
