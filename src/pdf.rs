//! Poppler backed [`PdfDocument`].
//!
//! Poppler documents must stay on the thread that opened them, so
//! `PopplerDocument` only keeps the URI and the page sizes. Every thread that
//! asks for a page opens its own copy of the document and keeps it until a
//! different URI is requested.

use std::cell::RefCell;

use gtk::cairo;
use image::RgbaImage;
use kurbo::Size;

use crate::document::{PdfDocument, PdfPage};
use crate::render::RenderTile;

thread_local!(
    static DOCUMENT: RefCell<Option<(String, poppler::Document)>> = const { RefCell::new(None) };
);

fn with_document<T>(uri: &str, f: impl FnOnce(&poppler::Document) -> T) -> Option<T> {
    DOCUMENT.with(|cell| {
        let mut cell = cell.borrow_mut();
        if cell.as_ref().map_or(true, |(doc_uri, _)| doc_uri != uri) {
            match poppler::Document::from_file(uri, None) {
                Ok(doc) => *cell = Some((uri.to_string(), doc)),
                Err(err) => {
                    log::error!("failed to open {uri}: {err}");
                    return None;
                }
            }
        }
        cell.as_ref().map(|(_, doc)| f(doc))
    })
}

#[derive(Debug, Clone)]
pub struct PopplerDocument {
    uri: String,
    page_sizes: Vec<Size>,
}

impl PopplerDocument {
    pub fn open(uri: &str) -> Result<Self, glib::Error> {
        let doc = poppler::Document::from_file(uri, None)?;
        let page_sizes = (0..doc.n_pages())
            .map(|i| {
                doc.page(i)
                    .map(|page| {
                        let (width, height) = page.size();
                        Size::new(width, height)
                    })
                    .unwrap_or(Size::ZERO)
            })
            .collect();

        DOCUMENT.with(|cell| *cell.borrow_mut() = Some((uri.to_string(), doc)));

        Ok(PopplerDocument {
            uri: uri.to_string(),
            page_sizes,
        })
    }
}

impl PdfDocument for PopplerDocument {
    type Page = PopplerPage;

    fn page_count(&self) -> usize {
        self.page_sizes.len()
    }

    fn page(&self, index: usize) -> Option<PopplerPage> {
        let size = *self.page_sizes.get(index)?;
        let page = with_document(&self.uri, |doc| doc.page(index as i32)).flatten()?;
        Some(PopplerPage { index, size, page })
    }

    fn identity(&self) -> &[u8] {
        self.uri.as_bytes()
    }
}

#[derive(Debug, Clone)]
pub struct PopplerPage {
    index: usize,
    size: Size,
    page: poppler::Page,
}

impl PopplerPage {
    /// Draws the tile onto `cr`, whose origin is the tile's top-left corner.
    fn draw(&self, cr: &cairo::Context, tile: &RenderTile) -> Result<(), cairo::Error> {
        cr.save()?;
        cr.set_source_rgb(1.0, 1.0, 1.0);
        cr.paint()?;

        let [a, b, c, d, e, f] = tile.top_left_affine().as_coeffs();
        cr.transform(cairo::Matrix::new(a, b, c, d, e, f));
        self.page.render(cr);
        cr.restore()
    }
}

impl PdfPage for PopplerPage {
    fn index(&self) -> usize {
        self.index
    }

    fn crop_box_size(&self) -> Size {
        self.size
    }

    fn render(&self, tile: &RenderTile) -> Option<RgbaImage> {
        let (width, height) = tile.pixel_size();
        let surface = match cairo::ImageSurface::create(
            cairo::Format::ARgb32,
            width as i32,
            height as i32,
        ) {
            Ok(surface) => surface,
            Err(err) => {
                log::warn!("cannot allocate a {width}x{height} surface: {err}");
                return None;
            }
        };

        {
            let cr = cairo::Context::new(&surface).ok()?;
            if let Err(err) = self.draw(&cr, tile) {
                log::warn!("failed to render page {}: {err}", self.index);
                return None;
            }
        }
        surface.flush();

        let stride = surface.stride() as usize;
        let mut image = RgbaImage::new(width, height);
        surface
            .with_data(|data| {
                for (y, row) in data.chunks(stride).take(height as usize).enumerate() {
                    for x in 0..width as usize {
                        // native endian ARGB32, opaque after the white fill
                        let px = &row[x * 4..x * 4 + 4];
                        let pixel = if cfg!(target_endian = "little") {
                            [px[2], px[1], px[0], px[3]]
                        } else {
                            [px[1], px[2], px[3], px[0]]
                        };
                        image.put_pixel(x as u32, y as u32, image::Rgba(pixel));
                    }
                }
            })
            .ok()?;

        Some(image)
    }
}
