//! Geometry for drawing a cropped page into a fixed-size output.
//!
//! PDF page space has its origin at the bottom-left of the crop box, output
//! images and widgets have it at the top-left. [`TileTransform`] reconciles
//! the two and scales the cropped part of the page to fill the output.

use image::RgbaImage;
use kurbo::{Affine, Rect, Size, Vec2};

use crate::document::PdfPage;
use crate::unit_rect::UnitRect;

const LEVELS_OF_DETAIL: u32 = 4;
const SMALL_TILE: f64 = 512.0;
const LARGE_TILE: f64 = 1024.0;

/// Origin and uniform scale that draw `unit` of a page so that it fills a
/// destination of a given size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileTransform {
    pub scale: f64,
    pub translate: Vec2,
}

impl TileTransform {
    /// `dest` is assumed to have the aspect ratio of the cropped region. If it
    /// does not, the larger of the two axis scales wins and the region
    /// overflows the destination on the other axis.
    ///
    /// Returns `None` for degenerate geometry (empty page, crop or output).
    pub fn new(page: Size, unit: UnitRect, dest: Size) -> Option<Self> {
        let cropped = unit.cropped_size(page);
        if !is_drawable(cropped) || !is_drawable(dest) {
            return None;
        }

        let scale = (dest.width / cropped.width).max(dest.height / cropped.height);
        let translate = Vec2::new(
            -page.width * scale * unit.x,
            page.height * scale * (1.0 - unit.y),
        );

        Some(TileTransform { scale, translate })
    }

    /// Maps PDF page space (bottom-left origin) to output space.
    pub fn affine(&self) -> Affine {
        Affine::translate(self.translate) * Affine::scale_non_uniform(self.scale, -self.scale)
    }

    /// The same mapping for renderers whose page space already has a top-left
    /// origin: `y_top = page_height - y_pdf`.
    pub fn top_left_affine(&self, page_height: f64) -> Affine {
        let translate = Vec2::new(
            self.translate.x,
            self.translate.y - self.scale * page_height,
        );
        Affine::translate(translate) * Affine::scale(self.scale)
    }
}

fn is_drawable(size: Size) -> bool {
    size.width > 0.0 && size.height > 0.0 && size.width.is_finite() && size.height.is_finite()
}

/// One output region of a page: the whole page content at `content_size`, or
/// a tile of it.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderTile {
    pub page_index: usize,
    pub page_size: Size,
    pub content_size: Size,
    /// Part of the content drawn by this tile, in content coordinates.
    pub region: Rect,
    pub transform: TileTransform,
}

impl RenderTile {
    /// A tile covering the whole destination.
    pub fn new(page_index: usize, page_size: Size, unit: UnitRect, dest: Size) -> Option<Self> {
        Self::for_region(page_index, page_size, unit, dest, dest.to_rect())
    }

    pub fn for_region(
        page_index: usize,
        page_size: Size,
        unit: UnitRect,
        content_size: Size,
        region: Rect,
    ) -> Option<Self> {
        let transform = TileTransform::new(page_size, unit, content_size)?;
        let region = region.intersect(content_size.to_rect());
        if !is_drawable(region.size()) {
            return None;
        }

        Some(RenderTile {
            page_index,
            page_size,
            content_size,
            region,
            transform,
        })
    }

    fn region_offset(&self) -> Affine {
        Affine::translate(-self.region.origin().to_vec2())
    }

    /// Page space (bottom-left origin) to tile pixels.
    pub fn affine(&self) -> Affine {
        self.region_offset() * self.transform.affine()
    }

    /// Top-left page space to tile pixels.
    pub fn top_left_affine(&self) -> Affine {
        self.region_offset() * self.transform.top_left_affine(self.page_size.height)
    }

    pub fn pixel_size(&self) -> (u32, u32) {
        let size = self.region.size();
        (
            size.width.ceil().max(1.0) as u32,
            size.height.ceil().max(1.0) as u32,
        )
    }
}

/// Size of the on-screen page for a viewport of `base` size: the cropped
/// page scaled to fit. Without a page the viewport size is used as is.
pub fn fit_content_size(page: Option<Size>, unit: UnitRect, base: Size) -> Size {
    let Some(page) = page else {
        return base;
    };
    let cropped = unit.cropped_size(page);
    if !is_drawable(cropped) {
        return base;
    }

    let scale = (base.width / cropped.width).min(base.height / cropped.height);
    Size::new(cropped.width * scale, cropped.height * scale)
}

/// Tiling parameters of the full-resolution page layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileGrid {
    pub tile_size: f64,
    pub levels_of_detail: u32,
    pub levels_of_detail_bias: u32,
}

impl TileGrid {
    /// `screen` is in points, `screen_scale` in pixels per point.
    pub fn for_screen(screen: Size, screen_scale: f64) -> Self {
        let max_pixels = screen.width.max(screen.height) * screen_scale;
        TileGrid {
            tile_size: if max_pixels < SMALL_TILE {
                SMALL_TILE
            } else {
                LARGE_TILE
            },
            levels_of_detail: LEVELS_OF_DETAIL,
            levels_of_detail_bias: LEVELS_OF_DETAIL - 1,
        }
    }

    /// Resolution multiplier tiles are drawn at for a zoom factor: the nearest
    /// power of two at or above `zoom`, limited to the available levels.
    pub fn detail_scale(&self, zoom: f64) -> f64 {
        let max_level = self.levels_of_detail_bias as i32;
        let min_level = max_level - (self.levels_of_detail as i32 - 1);
        let level = if zoom > 0.0 && zoom.is_finite() {
            (zoom.log2().ceil() as i32).clamp(min_level, max_level)
        } else {
            0
        };
        2f64.powi(level)
    }

    /// Tiles, in content coordinates, that cover the visible part of a
    /// content area. Edge tiles are cut to the content bounds.
    pub fn tiles_for(&self, content: Size, visible: Rect) -> Vec<Rect> {
        let area = visible.intersect(content.to_rect());
        if !is_drawable(area.size()) {
            return Vec::new();
        }

        let ts = self.tile_size;
        let (col0, col1) = ((area.x0 / ts).floor() as u32, (area.x1 / ts).ceil() as u32);
        let (row0, row1) = ((area.y0 / ts).floor() as u32, (area.y1 / ts).ceil() as u32);

        let mut tiles = Vec::with_capacity(((col1 - col0) * (row1 - row0)) as usize);
        for row in row0..row1 {
            for col in col0..col1 {
                let tile = Rect::from_origin_size((col as f64 * ts, row as f64 * ts), (ts, ts));
                tiles.push(tile.intersect(content.to_rect()));
            }
        }
        tiles
    }
}

/// Draws one page with a fixed crop. Hosts hold one per page view and call
/// it from their draw callbacks.
#[derive(Debug, Clone)]
pub struct TileRenderer<P> {
    page: Option<P>,
    unit: UnitRect,
}

impl<P: PdfPage> TileRenderer<P> {
    pub fn new(page: Option<P>, unit: UnitRect) -> Self {
        TileRenderer { page, unit }
    }

    pub fn page(&self) -> Option<&P> {
        self.page.as_ref()
    }

    pub fn unit(&self) -> UnitRect {
        self.unit
    }

    pub fn tile(&self, content: Size, region: Rect) -> Option<RenderTile> {
        let Some(page) = &self.page else {
            log::debug!("no page to draw, leaving the tile blank");
            return None;
        };
        RenderTile::for_region(page.index(), page.crop_box_size(), self.unit, content, region)
    }

    /// Renders the whole cropped page at `dest` size.
    pub fn render(&self, dest: Size) -> Option<RgbaImage> {
        self.render_region(dest, dest.to_rect())
    }

    pub fn render_region(&self, content: Size, region: Rect) -> Option<RgbaImage> {
        let tile = self.tile(content, region)?;
        self.page.as_ref()?.render(&tile)
    }
}
