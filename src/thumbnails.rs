//! Page thumbnails, pre-rendered in the background.
//!
//! Every page has one slot. A single background pass fills the slots in page
//! order; each slot is written at most once and reading never blocks, so a
//! reader may see an empty slot and has to treat it as "not ready yet".

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::thread::JoinHandle;
use std::time::Duration;

use futures::channel::oneshot;
use image::{Rgba, RgbaImage};
use kurbo::{Point, Rect, Size};
use once_cell::sync::OnceCell;

use crate::bg_job::{self, JobQueue};
use crate::document::{clamp_index, PdfDocument, PdfPage};
use crate::render::{fit_content_size, RenderTile};
use crate::unit_rect::UnitRect;

pub type Thumbnail = Arc<RgbaImage>;

/// Box a thumbnail is fitted into.
pub const THUMBNAIL_SIZE: Size = Size::new(360.0, 480.0);

const FALLBACK_WORKERS: usize = 2;

struct Store<D> {
    doc: Arc<D>,
    slots: Vec<OnceCell<Thumbnail>>,
    filled: AtomicBool,
}

impl<D: PdfDocument> Store<D> {
    fn get(&self, index: isize) -> Option<Thumbnail> {
        if self.slots.is_empty() {
            return None;
        }
        self.slots[clamp_index(index, self.slots.len())].get().cloned()
    }

    /// Renders a thumbnail without touching the slots. Pages that cannot be
    /// drawn get a blank image so that every slot ends up filled.
    fn render(&self, index: usize) -> Option<Thumbnail> {
        let page = self.doc.page(index)?;
        let page_size = page.crop_box_size();
        let dest = fit_content_size(Some(page_size), UnitRect::FULL, THUMBNAIL_SIZE);

        let image = RenderTile::new(index, page_size, UnitRect::FULL, dest)
            .and_then(|tile| page.render(&tile))
            .unwrap_or_else(|| {
                log::warn!("page {index} could not be rendered, using a blank thumbnail");
                blank(dest)
            });
        Some(Arc::new(image))
    }

    fn fill(&self) {
        let started = std::time::Instant::now();
        for (index, slot) in self.slots.iter().enumerate() {
            if let Some(thumbnail) = self.render(index) {
                // a slot has exactly one writer: this pass
                let _ = slot.set(thumbnail);
            }
        }
        self.filled.store(true, Ordering::Release);
        log::debug!(
            "rendered {} thumbnails in {} ms",
            self.slots.len(),
            started.elapsed().as_millis()
        );
    }
}

fn blank(size: Size) -> RgbaImage {
    let w = size.width.ceil().max(1.0) as u32;
    let h = size.height.ceil().max(1.0) as u32;
    RgbaImage::from_pixel(w, h, Rgba([255, 255, 255, 255]))
}

pub struct ThumbnailCache<D> {
    store: Arc<Store<D>>,
    fill: Mutex<Option<JoinHandle<()>>>,
    started: AtomicBool,
    jobs: JobQueue,
}

impl<D> std::fmt::Debug for ThumbnailCache<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("ThumbnailCache")
            .field("len", &self.store.slots.len())
            .field("filled", &self.store.filled.load(Ordering::Acquire))
            .finish()
    }
}

impl<D: PdfDocument> ThumbnailCache<D> {
    /// Creates the cache and starts the background pass right away.
    pub fn new(doc: Arc<D>) -> Self {
        let cache = Self::deferred(doc);
        cache.start_fill();
        cache
    }

    /// Creates the cache with all slots empty; nothing is rendered until
    /// [`ThumbnailCache::start_fill`] is called.
    pub fn deferred(doc: Arc<D>) -> Self {
        let slots = (0..doc.page_count()).map(|_| OnceCell::new()).collect();
        ThumbnailCache {
            store: Arc::new(Store {
                doc,
                slots,
                filled: AtomicBool::new(false),
            }),
            fill: Mutex::new(None),
            started: AtomicBool::new(false),
            jobs: JobQueue::new("thumbnail-fallback", FALLBACK_WORKERS),
        }
    }

    /// Spawns the single background pass. Later calls do nothing.
    pub fn start_fill(&self) {
        if self.started.swap(true, Ordering::AcqRel) {
            return;
        }

        let store = self.store.clone();
        let handle = bg_job::spawn_once("thumbnails", move || store.fill());
        if let Ok(mut fill) = self.fill.lock() {
            *fill = handle;
        }
    }

    pub fn len(&self) -> usize {
        self.store.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.slots.is_empty()
    }

    pub fn is_filled(&self) -> bool {
        self.store.filled.load(Ordering::Acquire)
    }

    /// Thumbnail of page `index` (clamped into range) if it was rendered
    /// already. Never blocks.
    pub fn get(&self, index: isize) -> Option<Thumbnail> {
        self.store.get(index)
    }

    /// Cached thumbnail or, when the slot is still empty, one rendered on the
    /// calling thread.
    pub fn get_or_render(&self, index: isize) -> Option<Thumbnail> {
        if self.is_empty() {
            return None;
        }
        self.get(index)
            .or_else(|| self.store.render(clamp_index(index, self.len())))
    }

    /// Asks for the thumbnail of `index` from a background worker, for views
    /// that cannot wait. The request resolves to the index it was made for,
    /// so a recycled view can tell a stale result apart (see
    /// [`ThumbnailCell`]).
    pub fn request(&self, index: usize) -> ThumbnailRequest {
        let (send, recv) = oneshot::channel();
        let store = self.store.clone();
        self.jobs.execute(Box::new(move || {
            let thumbnail = store
                .get(index as isize)
                .or_else(|| store.render(index.min(store.slots.len().saturating_sub(1))));
            let _ = send.send(thumbnail);
        }));

        ThumbnailRequest { index, recv }
    }

    /// Blocks until the background pass has finished.
    pub fn wait_filled(&self) {
        let handle = match self.fill.lock() {
            Ok(mut fill) => fill.take(),
            Err(_) => None,
        };
        if let Some(handle) = handle {
            if handle.join().is_err() {
                log::error!("thumbnail pass panicked");
            }
        }
    }
}

/// Pending result of [`ThumbnailCache::request`].
#[derive(Debug)]
pub struct ThumbnailRequest {
    index: usize,
    recv: oneshot::Receiver<Option<Thumbnail>>,
}

impl ThumbnailRequest {
    pub fn index(&self) -> usize {
        self.index
    }
}

impl Future for ThumbnailRequest {
    type Output = Option<(usize, Thumbnail)>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let index = self.index;
        match Pin::new(&mut self.recv).poll(cx) {
            Poll::Ready(Ok(thumbnail)) => Poll::Ready(thumbnail.map(|t| (index, t))),
            Poll::Ready(Err(oneshot::Canceled)) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// A reusable view slot in the thumbnail grid. Results of requests made for
/// an index the cell no longer shows are dropped.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ThumbnailCell {
    bound: Option<usize>,
}

impl ThumbnailCell {
    pub fn bind(&mut self, index: usize) {
        self.bound = Some(index);
    }

    pub fn bound(&self) -> Option<usize> {
        self.bound
    }

    pub fn accept(&self, result: (usize, Thumbnail)) -> Option<Thumbnail> {
        let (index, thumbnail) = result;
        (self.bound == Some(index)).then_some(thumbnail)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Insets {
    pub top: f64,
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
}

/// Height of the bar above the thumbnail grid.
pub const TOP_BAR_HEIGHT: f64 = 44.0;

/// Flow layout of the thumbnail grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLayout {
    pub item: Size,
    pub inter_item_spacing: f64,
    pub line_spacing: f64,
    pub insets: Insets,
}

impl GridLayout {
    /// Compact layouts (phones) use everything at half size.
    pub fn new(compact: bool) -> Self {
        let scale = if compact { 0.5 } else { 1.0 };
        GridLayout {
            item: Size::new(180.0 * scale, 240.0 * scale),
            inter_item_spacing: 10.0 * scale,
            line_spacing: 20.0 * scale,
            insets: Insets {
                top: 0.0,
                left: 8.0 * scale,
                bottom: 20.0 * scale,
                right: 8.0 * scale,
            },
        }
    }

    fn available_width(&self, width: f64) -> f64 {
        (width - self.insets.left - self.insets.right).max(0.0)
    }

    pub fn columns(&self, width: f64) -> usize {
        let available = self.available_width(width);
        let per_item = self.item.width + self.inter_item_spacing;
        (((available + self.inter_item_spacing) / per_item).floor() as usize).max(1)
    }

    /// Rect of item `index` in grid coordinates. Items of a row are spread
    /// over the available width; a lone column is centered.
    pub fn item_rect(&self, index: usize, width: f64) -> Rect {
        let columns = self.columns(width);
        let (row, col) = (index / columns, index % columns);
        let available = self.available_width(width);

        let x = if columns > 1 {
            let spacing = (available - columns as f64 * self.item.width) / (columns - 1) as f64;
            self.insets.left + col as f64 * (self.item.width + spacing.max(self.inter_item_spacing))
        } else {
            self.insets.left + (available - self.item.width) / 2.0
        };
        let y = self.insets.top + row as f64 * (self.item.height + self.line_spacing);

        Rect::from_origin_size((x, y), self.item)
    }

    pub fn content_height(&self, count: usize, width: f64) -> f64 {
        if count == 0 {
            return self.insets.top + self.insets.bottom;
        }
        let rows = count.div_ceil(self.columns(width));
        self.insets.top
            + rows as f64 * self.item.height
            + (rows - 1) as f64 * self.line_spacing
            + self.insets.bottom
    }

    pub fn index_at(&self, p: Point, width: f64, count: usize) -> Option<usize> {
        let columns = self.columns(width);
        if p.y < self.insets.top {
            return None;
        }
        let row = ((p.y - self.insets.top) / (self.item.height + self.line_spacing)) as usize;
        (row * columns..(row * columns + columns).min(count))
            .find(|&i| self.item_rect(i, width).contains(p))
    }

    /// The page image inside an item: 3:4, full item height, centered.
    pub fn image_rect(&self, item: Rect) -> Rect {
        let height = item.height();
        let width = height * 3.0 / 4.0;
        Rect::from_origin_size((item.x0 + (item.width() - width) / 2.0, item.y0), (width, height))
    }
}

/// Delay before closing the grid after a selection, giving the selection
/// highlight time to show. Picking the current page closes at once.
pub fn selection_delay(current: usize, selected: usize) -> Duration {
    if current == selected {
        Duration::ZERO
    } else {
        Duration::from_millis(300)
    }
}
