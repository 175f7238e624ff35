//! The reader: one open document and everything shown around it.
//!
//! `Reader` does no drawing. Hosts feed it input (page turns, taps, slider
//! drags, crop edits) and apply the [`ReaderEvent`]s it answers with.

use std::sync::Arc;

use kurbo::{Point, Rect, Size};

use crate::config::ReaderConfig;
use crate::crop::{self, CropEditor};
use crate::document::{PdfDocument, PdfPage};
use crate::navigation::{Direction, Navigator, Swipe, Transition};
use crate::render::{fit_content_size, TileGrid, TileRenderer};
use crate::settings::{DocumentSettings, KeyValueStore};
use crate::slider::{preview_label, PreviewLayout, Scrubber};
use crate::thumbnails::{Thumbnail, ThumbnailCache};
use crate::unit_rect::UnitRect;
use crate::zoom::ZoomState;

/// Share of the view width at each side where taps belong to page turning
/// and do not toggle the chrome.
const TAP_EDGE_RATIO: f64 = 0.14;

/// Ask the host to show page `page` at `content_size`.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    pub page: usize,
    pub content_size: Size,
    pub unit: UnitRect,
    pub direction: Direction,
    pub animated: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReaderEvent {
    Render(RenderRequest),
    SliderValue(usize),
    ChromeVisible(bool),
    SwipeEnabled(bool),
    PreviewShown { panel: Rect, image: Rect },
    PreviewUpdated {
        page: usize,
        label: String,
        thumbnail: Option<Thumbnail>,
    },
    PreviewHidden,
}

pub struct Reader<D: PdfDocument> {
    config: ReaderConfig,
    doc: Arc<D>,
    settings: DocumentSettings,
    navigator: Navigator,
    scrubber: Scrubber,
    preview: PreviewLayout,
    /// Page the scrub preview currently shows.
    previewed: Option<usize>,
    thumbnails: Option<ThumbnailCache<D>>,
    crop: Option<CropEditor>,
    crop_toolbar_height: f64,
    view: Size,
    zoom: ZoomState,
    chrome_visible: bool,
}

impl<D: PdfDocument> std::fmt::Debug for Reader<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Reader")
            .field("page", &self.navigator.index())
            .field("page_count", &self.navigator.page_count())
            .field("settings", &self.settings)
            .field("view", &self.view)
            .finish()
    }
}

impl<D: PdfDocument> Reader<D> {
    /// Opens `doc` with the settings stored for it. Documents without pages
    /// cannot be shown and yield `None`.
    pub fn open(config: ReaderConfig, doc: Arc<D>, store: &dyn KeyValueStore) -> Option<Self> {
        let page_count = doc.page_count();
        if page_count == 0 {
            log::warn!("document has no pages");
            return None;
        }

        let settings = DocumentSettings::load(store, doc.identity(), config.remember_last_page);
        let start = isize::try_from(settings.last_page_index).unwrap_or(isize::MAX);
        let navigator = Navigator::new(page_count, start);

        let view = config.screen_size;
        let mut scrubber = Scrubber::new(page_count, view.width, view.height);
        scrubber.set_value(navigator.index());

        let thumbnails = config
            .thumbnails_enabled
            .then(|| ThumbnailCache::new(doc.clone()));

        let mut reader = Reader {
            preview: PreviewLayout::for_screen(view),
            config,
            doc,
            settings: DocumentSettings {
                last_page_index: navigator.index(),
                ..settings
            },
            navigator,
            scrubber,
            previewed: None,
            thumbnails,
            crop: None,
            crop_toolbar_height: 0.0,
            view,
            zoom: ZoomState::new(view, view),
            chrome_visible: false,
        };
        reader.zoom = ZoomState::new(reader.content_size(reader.navigator.index()), view);

        log::debug!(
            "opened document with {page_count} pages at page {}",
            reader.navigator.index()
        );
        Some(reader)
    }

    /// Events that bring a fresh host view in sync: the current page, the
    /// slider, swipe state and hidden chrome.
    pub fn initial_events(&self) -> Vec<ReaderEvent> {
        let index = self.navigator.index();
        vec![
            ReaderEvent::Render(self.render_request(index, Direction::Forward, false)),
            ReaderEvent::SliderValue(index),
            ReaderEvent::SwipeEnabled(self.navigator.swipe_enabled()),
            ReaderEvent::ChromeVisible(self.chrome_visible),
        ]
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    pub fn document(&self) -> &Arc<D> {
        &self.doc
    }

    pub fn current_page(&self) -> usize {
        self.navigator.index()
    }

    pub fn page_count(&self) -> usize {
        self.navigator.page_count()
    }

    pub fn crop(&self) -> UnitRect {
        self.settings.crop
    }

    pub fn is_chrome_visible(&self) -> bool {
        self.chrome_visible
    }

    pub fn swipe_enabled(&self) -> bool {
        self.navigator.swipe_enabled()
    }

    pub fn view_size(&self) -> Size {
        self.view
    }

    pub fn zoom(&self) -> &ZoomState {
        &self.zoom
    }

    pub fn zoom_mut(&mut self) -> &mut ZoomState {
        &mut self.zoom
    }

    pub fn scrubber(&self) -> &Scrubber {
        &self.scrubber
    }

    pub fn thumbnails(&self) -> Option<&ThumbnailCache<D>> {
        self.thumbnails.as_ref()
    }

    pub fn tile_grid(&self) -> TileGrid {
        TileGrid::for_screen(self.config.screen_size, self.config.screen_scale)
    }

    /// On-screen size of page `index` with the current crop.
    pub fn content_size(&self, index: usize) -> Size {
        let page_size = self.doc.safe_page(index as isize).map(|p| p.crop_box_size());
        fit_content_size(page_size, self.settings.crop, self.view)
    }

    /// A renderer for page `index` with the current crop.
    pub fn renderer(&self, index: usize) -> TileRenderer<D::Page> {
        TileRenderer::new(self.doc.safe_page(index as isize), self.settings.crop)
    }

    pub fn next(&mut self) -> Vec<ReaderEvent> {
        let transition = self.navigator.next();
        self.transition_events(transition)
    }

    pub fn prev(&mut self) -> Vec<ReaderEvent> {
        let transition = self.navigator.prev();
        self.transition_events(transition)
    }

    pub fn jump(&mut self, index: isize) -> Vec<ReaderEvent> {
        let transition = self.navigator.jump(index);
        self.transition_events(transition)
    }

    /// A swipe the host's own paging did not handle. Only does something on
    /// the first and last page.
    pub fn swipe(&mut self, swipe: Swipe) -> Vec<ReaderEvent> {
        let transition = self.navigator.peek(swipe);
        self.transition_events(transition)
    }

    /// Single tap at `p`. Taps near the left and right edges are left to
    /// page turning; the rest toggle the chrome.
    pub fn tap(&mut self, p: Point) -> Vec<ReaderEvent> {
        let w = self.view.width;
        if p.x < w * TAP_EDGE_RATIO || p.x > w * (1.0 - TAP_EDGE_RATIO) {
            return Vec::new();
        }
        self.chrome_visible = !self.chrome_visible;
        vec![ReaderEvent::ChromeVisible(self.chrome_visible)]
    }

    pub fn set_chrome_visible(&mut self, visible: bool) -> Vec<ReaderEvent> {
        if self.chrome_visible == visible {
            return Vec::new();
        }
        self.chrome_visible = visible;
        vec![ReaderEvent::ChromeVisible(visible)]
    }

    pub fn set_track_width(&mut self, width: f64) {
        self.scrubber.set_track_width(width);
    }

    /// Device pixels per logical pixel of the display the reader is on.
    pub fn set_screen_scale(&mut self, scale: f64) {
        if scale.is_finite() && scale > 0.0 {
            self.config.screen_scale = scale;
        }
    }

    /// Finger down on the slider thumb, which sits at `thumb_center`.
    pub fn slider_touch_down(&mut self, thumb_center: Point) -> Vec<ReaderEvent> {
        self.scrubber.set_value(self.navigator.index());
        self.scrubber.begin(thumb_center);

        let panel = self.preview.panel_rect(self.view);
        let mut events = vec![ReaderEvent::PreviewShown {
            panel,
            image: self.preview.image_rect(panel),
        }];
        self.previewed = None;
        events.extend(self.update_preview());
        events
    }

    pub fn slider_moved(&mut self, previous: Point, current: Point) -> Vec<ReaderEvent> {
        if self.scrubber.track(previous, current).is_none() {
            return Vec::new();
        }
        self.update_preview().into_iter().collect()
    }

    /// Finger up (or the drag was cancelled). Hides the preview and the
    /// chrome and turns to the selected page if it changed.
    pub fn slider_touch_up(&mut self) -> Vec<ReaderEvent> {
        let Some(selected) = self.scrubber.end() else {
            return Vec::new();
        };
        self.previewed = None;

        let mut events = vec![ReaderEvent::PreviewHidden];
        events.extend(self.set_chrome_visible(false));
        if selected != self.navigator.index() {
            events.extend(self.jump(selected as isize));
        }
        events
    }

    fn update_preview(&mut self) -> Option<ReaderEvent> {
        let page = self.scrubber.int_value();
        if self.previewed == Some(page) {
            return None;
        }
        self.previewed = Some(page);

        Some(ReaderEvent::PreviewUpdated {
            page,
            label: preview_label(page, self.navigator.page_count()),
            thumbnail: self
                .thumbnails
                .as_ref()
                .and_then(|t| t.get(page as isize)),
        })
    }

    /// The thumbnail grid is about to be shown.
    pub fn show_thumbnails(&mut self) -> Vec<ReaderEvent> {
        if self.thumbnails.is_none() {
            return Vec::new();
        }
        self.set_chrome_visible(false)
    }

    pub fn select_thumbnail(&mut self, index: usize) -> Vec<ReaderEvent> {
        self.jump(index as isize)
    }

    /// Opens the crop editor on the current page, laid out below a toolbar
    /// of `toolbar_height`. Returns `None` when cropping is switched off.
    pub fn begin_crop(&mut self, toolbar_height: f64) -> Option<&mut CropEditor> {
        if !self.config.crop_enabled {
            return None;
        }
        let page = self.doc.safe_page(self.navigator.index() as isize)?;
        let image = crop::preview_rect(page.crop_box_size(), self.view, toolbar_height);

        self.chrome_visible = false;
        self.crop_toolbar_height = toolbar_height;
        Some(self.crop.insert(CropEditor::new(image, self.settings.crop)))
    }

    pub fn crop_editor(&mut self) -> Option<&mut CropEditor> {
        self.crop.as_mut()
    }

    /// Closes the editor without changing the crop.
    pub fn cancel_crop(&mut self) {
        self.crop = None;
    }

    /// Closes the editor, stores the new crop and redraws the current page.
    pub fn commit_crop(&mut self, store: &mut dyn KeyValueStore) -> Vec<ReaderEvent> {
        let Some(editor) = self.crop.take() else {
            return Vec::new();
        };

        self.settings.crop = editor.confirm();
        log::debug!("crop set to {}", self.settings.crop);
        self.persist(store);

        self.jump(self.navigator.index() as isize)
    }

    /// The view changed size: relayout and redraw the current page.
    pub fn resize(&mut self, view: Size) -> Vec<ReaderEvent> {
        self.view = view;
        self.config.screen_size = view;
        self.preview = PreviewLayout::for_screen(view);
        self.scrubber = {
            let mut scrubber = Scrubber::new(self.page_count(), view.width, view.height);
            scrubber.set_value(self.navigator.index());
            scrubber
        };

        if let Some(editor) = &mut self.crop {
            if let Some(page) = self.doc.safe_page(self.navigator.index() as isize) {
                editor.set_image_rect(crop::preview_rect(
                    page.crop_box_size(),
                    view,
                    self.crop_toolbar_height,
                ));
            }
        }

        let index = self.navigator.index();
        self.zoom = ZoomState::new(self.content_size(index), view);
        vec![ReaderEvent::Render(
            self.render_request(index, Direction::Forward, false),
        )]
    }

    /// Stores the settings and closes the reader.
    pub fn teardown(mut self, store: &mut dyn KeyValueStore) {
        self.persist(store);
        log::debug!("reader closed at page {}", self.navigator.index());
    }

    fn persist(&mut self, store: &mut dyn KeyValueStore) {
        self.settings.last_page_index = self.navigator.index();
        self.settings
            .save(store, self.doc.identity(), self.config.remember_last_page);
        if let Err(err) = store.flush() {
            log::error!("failed to save settings: {err}");
        }
    }

    fn render_request(&self, page: usize, direction: Direction, animated: bool) -> RenderRequest {
        RenderRequest {
            page,
            content_size: self.content_size(page),
            unit: self.settings.crop,
            direction,
            animated,
        }
    }

    fn transition_events(&mut self, transition: Option<Transition>) -> Vec<ReaderEvent> {
        let Some(t) = transition else {
            return Vec::new();
        };

        self.settings.last_page_index = t.to;
        self.scrubber.set_value(t.to);
        self.zoom = ZoomState::new(self.content_size(t.to), self.view);

        vec![
            ReaderEvent::Render(self.render_request(t.to, t.direction, t.animated)),
            ReaderEvent::SwipeEnabled(self.navigator.swipe_enabled()),
            ReaderEvent::SliderValue(t.to),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::testing::FakeDocument;
    use crate::settings::{MemoryStore, SettingsKeys};

    const URI: &[u8] = b"file:///tmp/fake.pdf";

    fn config() -> ReaderConfig {
        ReaderConfig {
            remember_last_page: true,
            thumbnails_enabled: false,
            screen_size: Size::new(300.0, 400.0),
            ..ReaderConfig::default()
        }
    }

    fn open(n_pages: usize, store: &dyn KeyValueStore) -> Reader<FakeDocument> {
        Reader::open(config(), Arc::new(FakeDocument::new(n_pages)), store).unwrap()
    }

    fn rendered(events: &[ReaderEvent]) -> Option<&RenderRequest> {
        events.iter().find_map(|e| match e {
            ReaderEvent::Render(r) => Some(r),
            _ => None,
        })
    }

    #[test]
    fn test_screen_scale_sizes_tiles() {
        let mut reader = open(3, &MemoryStore::new());
        assert_eq!(reader.tile_grid().tile_size, 512.0);

        reader.set_screen_scale(2.0);
        assert_eq!(reader.config().screen_scale, 2.0);
        assert_eq!(reader.tile_grid().tile_size, 1024.0);

        reader.set_screen_scale(0.0);
        assert_eq!(reader.config().screen_scale, 2.0);
    }

    #[test]
    fn test_renderer_uses_current_crop() {
        let mut store = MemoryStore::new();
        let mut reader = open(3, &store);
        assert!(reader.renderer(1).unit().is_full());

        let editor = reader.begin_crop(44.0).unwrap();
        let image = editor.image_rect();
        editor.begin(crop::Handle::Left);
        editor.change(crop::Handle::Left, Point::new(image.center().x, image.center().y));
        editor.end(crop::Handle::Left);
        reader.commit_crop(&mut store);

        let renderer = reader.renderer(7);
        assert_eq!(renderer.unit(), reader.crop());
        assert!((renderer.unit().x - 0.5).abs() < 1e-9);
        assert_eq!(renderer.page().map(|p| p.index()), Some(2));
    }

    #[test]
    fn test_empty_document_is_rejected() {
        let store = MemoryStore::new();
        assert!(Reader::open(config(), Arc::new(FakeDocument::new(0)), &store).is_none());
    }

    #[test]
    fn test_initial_events() {
        let reader = open(5, &MemoryStore::new());
        let events = reader.initial_events();

        let render = rendered(&events).unwrap();
        assert_eq!(render.page, 0);
        assert_eq!(render.content_size, Size::new(300.0, 400.0));
        assert!(events.contains(&ReaderEvent::SwipeEnabled(false)));
        assert!(events.contains(&ReaderEvent::ChromeVisible(false)));
        assert!(events.contains(&ReaderEvent::SliderValue(0)));
    }

    #[test]
    fn test_restores_and_clamps_last_page() {
        let mut store = MemoryStore::new();
        let keys = SettingsKeys::for_identity(URI);
        store.set(&keys.page, "40".to_string());

        let reader = open(5, &store);
        assert_eq!(reader.current_page(), 4, "stored page is clamped");
        assert_eq!(reader.scrubber().int_value(), 4);
    }

    #[test]
    fn test_paging_emits_render_requests() {
        let mut reader = open(3, &MemoryStore::new());

        assert!(reader.prev().is_empty());
        let events = reader.next();
        let render = rendered(&events).unwrap();
        assert_eq!((render.page, render.direction, render.animated), (1, Direction::Forward, true));
        assert!(events.contains(&ReaderEvent::SwipeEnabled(true)));
        assert!(events.contains(&ReaderEvent::SliderValue(1)));

        reader.next();
        assert!(reader.next().is_empty());
        assert_eq!(reader.current_page(), 2);
    }

    #[test]
    fn test_boundary_swipes() {
        let mut reader = open(5, &MemoryStore::new());
        let events = reader.swipe(Swipe::Left);
        assert_eq!(rendered(&events).map(|r| r.page), Some(1));
        assert!(reader.swipe(Swipe::Left).is_empty());

        let mut single = open(1, &MemoryStore::new());
        assert!(single.swipe(Swipe::Left).is_empty());
        assert!(single.swipe(Swipe::Right).is_empty());
    }

    #[test]
    fn test_tap_toggles_chrome_in_the_middle_only() {
        let mut reader = open(3, &MemoryStore::new());
        assert!(reader.tap(Point::new(10.0, 200.0)).is_empty());
        assert!(reader.tap(Point::new(290.0, 200.0)).is_empty());

        assert_eq!(reader.tap(Point::new(150.0, 200.0)), vec![ReaderEvent::ChromeVisible(true)]);
        assert_eq!(reader.tap(Point::new(150.0, 200.0)), vec![ReaderEvent::ChromeVisible(false)]);
    }

    #[test]
    fn test_scrub_to_another_page() {
        let mut reader = open(11, &MemoryStore::new());
        reader.set_track_width(100.0);
        reader.set_chrome_visible(true);

        let events = reader.slider_touch_down(Point::new(0.0, 380.0));
        assert!(matches!(events[0], ReaderEvent::PreviewShown { .. }));
        assert!(matches!(
            &events[1],
            ReaderEvent::PreviewUpdated { page: 0, label, thumbnail: None } if label == "1 of 11"
        ));

        let events = reader.slider_moved(Point::new(0.0, 380.0), Point::new(50.0, 380.0));
        assert!(matches!(
            &events[..],
            [ReaderEvent::PreviewUpdated { page: 5, label, .. }] if label == "6 of 11"
        ));
        // same page again: no update
        assert!(reader
            .slider_moved(Point::new(50.0, 380.0), Point::new(52.0, 380.0))
            .is_empty());

        let events = reader.slider_touch_up();
        assert_eq!(events[0], ReaderEvent::PreviewHidden);
        assert!(events.contains(&ReaderEvent::ChromeVisible(false)));
        assert_eq!(rendered(&events).map(|r| r.page), Some(5));
        assert_eq!(reader.current_page(), 5);
    }

    #[test]
    fn test_scrub_back_to_current_page_does_not_navigate() {
        let mut reader = open(11, &MemoryStore::new());
        reader.set_track_width(100.0);
        reader.slider_touch_down(Point::new(0.0, 380.0));
        reader.slider_moved(Point::new(0.0, 380.0), Point::new(5.0, 380.0));

        let events = reader.slider_touch_up();
        assert!(rendered(&events).is_none());
        assert!(reader.slider_touch_up().is_empty(), "second touch up is ignored");
    }

    #[test]
    fn test_commit_crop_persists_and_redraws() {
        let mut store = MemoryStore::new();
        let mut reader = open(3, &store);

        let editor = reader.begin_crop(44.0).unwrap();
        let image = editor.image_rect();
        assert!(editor.begin(crop::Handle::Left));
        editor.change(crop::Handle::Left, Point::new(image.x0 + image.width() / 2.0, image.center().y));
        editor.end(crop::Handle::Left);

        let events = reader.commit_crop(&mut store);
        let crop = reader.crop();
        assert!((crop.x - 0.5).abs() < 1e-9 && (crop.w - 0.5).abs() < 1e-9, "{crop:?}");

        let render = rendered(&events).unwrap();
        assert_eq!(render.page, 0);
        // right half of a 600x800 page fitted into 300x400
        assert!((render.content_size.width - 150.0).abs() < 1e-9);
        assert!((render.content_size.height - 400.0).abs() < 1e-9);

        let keys = SettingsKeys::for_identity(URI);
        assert!(store.get(&keys.crop).is_some());
    }

    #[test]
    fn test_cancel_crop_keeps_settings() {
        let mut reader = open(3, &MemoryStore::new());
        let editor = reader.begin_crop(44.0).unwrap();
        editor.begin(crop::Handle::Top);
        editor.change(crop::Handle::Top, Point::new(150.0, 300.0));
        reader.cancel_crop();

        assert!(reader.crop().is_full());
        assert!(reader.crop_editor().is_none());
    }

    #[test]
    fn test_crop_disabled() {
        let store = MemoryStore::new();
        let config = ReaderConfig {
            crop_enabled: false,
            ..config()
        };
        let mut reader = Reader::open(config, Arc::new(FakeDocument::new(2)), &store).unwrap();
        assert!(reader.begin_crop(44.0).is_none());
    }

    #[test]
    fn test_teardown_saves_page() {
        let mut store = MemoryStore::new();
        let mut reader = open(5, &store);
        reader.jump(3);
        reader.teardown(&mut store);

        let keys = SettingsKeys::for_identity(URI);
        assert_eq!(store.get(&keys.page).as_deref(), Some("3"));
        assert_eq!(open(5, &store).current_page(), 3);
    }

    #[test]
    fn test_teardown_after_peek_back_from_last_page() {
        let mut store = MemoryStore::new();
        let mut reader = open(5, &store);
        reader.jump(4);
        reader.swipe(Swipe::Right);
        reader.teardown(&mut store);

        assert_eq!(open(5, &store).current_page(), 3);
    }

    #[test]
    fn test_resize_rerenders() {
        let mut reader = open(3, &MemoryStore::new());
        let events = reader.resize(Size::new(600.0, 400.0));
        let render = rendered(&events).unwrap();
        assert_eq!(render.content_size, Size::new(300.0, 400.0));
        assert_eq!(reader.zoom().min_zoom(), 1.0);
    }

    #[test]
    fn test_preview_uses_thumbnails() {
        let store = MemoryStore::new();
        let config = ReaderConfig {
            thumbnails_enabled: true,
            ..config()
        };
        let mut reader = Reader::open(config, Arc::new(FakeDocument::new(4)), &store).unwrap();
        reader.thumbnails().unwrap().wait_filled();

        let events = reader.slider_touch_down(Point::new(0.0, 380.0));
        assert!(matches!(
            &events[1],
            ReaderEvent::PreviewUpdated { thumbnail: Some(_), .. }
        ));
    }
}
