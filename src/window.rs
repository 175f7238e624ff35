//! GTK front end: one window showing one document.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use glib::clone;
use gtk::gdk::{Key, ModifierType};
use gtk::prelude::*;
use gtk::{cairo, glib, Application};
use image::RgbaImage;
use kurbo::{Point, Rect, Size, Vec2};

use crate::config::ReaderConfig;
use crate::crop::{self, Handle, HANDLE_DRAW_SIZE, PREVIEW_RENDER_SCALE};
use crate::document::PdfDocument;
use crate::navigation::Swipe;
use crate::pdf::PopplerDocument;
use crate::reader::{Reader, ReaderEvent, RenderRequest};
use crate::render::TileRenderer;
use crate::settings::FileStore;
use crate::slider::PREVIEW_BOTTOM_OFFSET;
use crate::thumbnails::{selection_delay, GridLayout, Thumbnail, ThumbnailCell, TOP_BAR_HEIGHT};
use crate::unit_rect::UnitRect;

const TRACK_PADDING: f64 = 16.0;
const THUMB_RADIUS: f64 = 10.0;
const SWIPE_VELOCITY: f64 = 600.0;
const THUMBNAIL_REFRESH: std::time::Duration = std::time::Duration::from_millis(250);
const SCROLL_STEP: f64 = 40.0;
/// Rasterized tiles kept around while panning a zoomed page.
const MAX_CACHED_TILES: usize = 48;

/// Resolution the page tiles were rasterized at.
#[derive(Debug, Clone, Copy, PartialEq)]
struct TileLevel {
    page: usize,
    unit: UnitRect,
    /// Size of the whole page at this level, in device pixels.
    raster: Size,
}

#[derive(Default)]
struct TileCache {
    level: Option<TileLevel>,
    surfaces: HashMap<(i64, i64), cairo::ImageSurface>,
}

struct Ui {
    reader: Reader<PopplerDocument>,
    store: FileStore,
    request: Option<RenderRequest>,
    preview_cell: ThumbnailCell,
    preview_thumbnail: Option<Thumbnail>,
    thumbnail_surfaces: HashMap<usize, cairo::ImageSurface>,
    selected_thumbnail: Option<usize>,
    crop_preview: Option<cairo::ImageSurface>,
    crop_handle: Option<Handle>,
    pinch_scale: f64,
    pan_last: Vec2,
    tiles: TileCache,
    scrub_last: Option<Point>,
}

struct Widgets {
    window: gtk::ApplicationWindow,
    header_bar: gtk::HeaderBar,
    toolbar: gtk::Box,
    page_area: gtk::DrawingArea,
    scrub_area: gtk::DrawingArea,
    preview_box: gtk::Box,
    preview_area: gtk::DrawingArea,
    preview_label: gtk::Label,
    thumbs_scroll: gtk::ScrolledWindow,
    thumbs_area: gtk::DrawingArea,
    crop_area: gtk::DrawingArea,
    crop_bar: gtk::CenterBox,
    crop_cancel: gtk::Button,
    crop_done: gtk::Button,
}

type Shared = (Rc<RefCell<Option<Ui>>>, Rc<Widgets>);

/// Opens the document at `uri` in a new window of `app`.
pub fn open(
    app: &Application,
    uri: &str,
    config: ReaderConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let doc = PopplerDocument::open(uri)?;
    let store = FileStore::open_default()?;
    let title = config.display_title(uri);
    let compact = config.compact;

    let reader = Reader::open(config, std::sync::Arc::new(doc), &store)
        .ok_or_else(|| format!("{uri} has no pages"))?;

    let widgets = Rc::new(build_widgets(app, &title, &reader));
    let ui = Rc::new(RefCell::new(Some(Ui {
        reader,
        store,
        request: None,
        preview_cell: ThumbnailCell::default(),
        preview_thumbnail: None,
        thumbnail_surfaces: HashMap::new(),
        selected_thumbnail: None,
        crop_preview: None,
        crop_handle: None,
        pinch_scale: 1.0,
        pan_last: Vec2::ZERO,
        tiles: TileCache::default(),
        scrub_last: None,
    })));
    let shared: Shared = (ui, widgets);

    setup_page_area(&shared);
    setup_scrubber(&shared);
    setup_thumbnails(&shared, GridLayout::new(compact));
    setup_crop(&shared);
    setup_keys(&shared);

    let events = with_ui(&shared.0, |ui| ui.reader.initial_events()).unwrap_or_default();
    apply(&shared, events);

    app.connect_shutdown(clone!(
        #[strong(rename_to = ui)]
        shared.0,
        move |_| {
            if let Some(mut ui) = ui.borrow_mut().take() {
                ui.reader.teardown(&mut ui.store);
            }
        }
    ));

    shared.1.window.present();
    Ok(())
}

fn with_ui<T>(ui: &Rc<RefCell<Option<Ui>>>, f: impl FnOnce(&mut Ui) -> T) -> Option<T> {
    ui.borrow_mut().as_mut().map(f)
}

fn build_widgets(
    app: &Application,
    title: &str,
    reader: &Reader<PopplerDocument>,
) -> Widgets {
    let header_bar = gtk::HeaderBar::builder().build();
    let window = gtk::ApplicationWindow::builder()
        .application(app)
        .title(title)
        .default_width(reader.view_size().width as i32)
        .default_height(reader.view_size().height as i32)
        .build();
    window.set_titlebar(Some(&header_bar));

    let page_area = gtk::DrawingArea::builder()
        .hexpand(true)
        .vexpand(true)
        .build();

    let scrub_area = gtk::DrawingArea::builder()
        .hexpand(true)
        .content_height(PREVIEW_BOTTOM_OFFSET as i32)
        .build();
    let toolbar = gtk::Box::builder()
        .orientation(gtk::Orientation::Horizontal)
        .valign(gtk::Align::End)
        .css_classes(vec!["toolbar"])
        .build();
    toolbar.append(&scrub_area);

    let preview_area = gtk::DrawingArea::builder().vexpand(true).build();
    let preview_label = gtk::Label::new(None);
    let preview_box = gtk::Box::builder()
        .orientation(gtk::Orientation::Vertical)
        .halign(gtk::Align::Start)
        .valign(gtk::Align::Start)
        .css_classes(vec!["osd"])
        .visible(false)
        .build();
    preview_box.append(&preview_area);
    preview_box.append(&preview_label);

    let thumbs_area = gtk::DrawingArea::builder().hexpand(true).build();
    let thumbs_scroll = gtk::ScrolledWindow::builder()
        .hscrollbar_policy(gtk::PolicyType::Never)
        .margin_top(TOP_BAR_HEIGHT as i32)
        .child(&thumbs_area)
        .visible(false)
        .build();

    let crop_area = gtk::DrawingArea::builder()
        .hexpand(true)
        .vexpand(true)
        .visible(false)
        .build();

    let crop_cancel = gtk::Button::with_label("Cancel");
    let crop_done = gtk::Button::with_label("Done");
    crop_done.add_css_class("suggested-action");
    let crop_bar = gtk::CenterBox::builder()
        .valign(gtk::Align::Start)
        .height_request(TOP_BAR_HEIGHT as i32)
        .css_classes(vec!["toolbar"])
        .visible(false)
        .build();
    crop_bar.set_start_widget(Some(&crop_cancel));
    crop_bar.set_center_widget(Some(&gtk::Label::new(Some("Crop Margins"))));
    crop_bar.set_end_widget(Some(&crop_done));

    let btn_thumbnails = gtk::Button::from_icon_name("view-grid-symbolic");
    btn_thumbnails.set_action_name(Some("win.thumbnails"));
    btn_thumbnails.set_sensitive(reader.thumbnails().is_some());
    let btn_crop = gtk::Button::from_icon_name("object-flip-horizontal");
    btn_crop.set_action_name(Some("win.crop"));
    btn_crop.set_sensitive(reader.config().crop_enabled);
    header_bar.pack_start(&btn_thumbnails);
    header_bar.pack_end(&btn_crop);

    let overlay = gtk::Overlay::new();
    overlay.set_child(Some(&page_area));
    overlay.add_overlay(&toolbar);
    overlay.add_overlay(&preview_box);
    overlay.add_overlay(&thumbs_scroll);
    overlay.add_overlay(&crop_area);
    overlay.add_overlay(&crop_bar);
    window.set_child(Some(&overlay));

    Widgets {
        window,
        header_bar,
        toolbar,
        page_area,
        scrub_area,
        preview_box,
        preview_area,
        preview_label,
        thumbs_scroll,
        thumbs_area,
        crop_area,
        crop_bar,
        crop_cancel,
        crop_done,
    }
}

fn apply(shared: &Shared, events: Vec<ReaderEvent>) {
    let (ui, w) = shared;
    for event in events {
        match event {
            ReaderEvent::Render(request) => {
                with_ui(ui, |ui| ui.request = Some(request));
                w.page_area.queue_draw();
            }
            ReaderEvent::SliderValue(_) => w.scrub_area.queue_draw(),
            ReaderEvent::ChromeVisible(visible) => {
                w.header_bar.set_visible(visible);
                w.toolbar.set_visible(visible);
            }
            ReaderEvent::SwipeEnabled(enabled) => {
                log::debug!("paging swipes {}", if enabled { "on" } else { "off" });
            }
            ReaderEvent::PreviewShown { panel, image } => {
                w.preview_box.set_margin_start(panel.x0 as i32);
                w.preview_box.set_margin_top(panel.y0 as i32);
                w.preview_box.set_size_request(panel.width() as i32, panel.height() as i32);
                w.preview_area.set_content_height(image.height() as i32);
                w.preview_box.set_visible(true);
            }
            ReaderEvent::PreviewUpdated {
                page,
                label,
                thumbnail,
            } => {
                w.preview_label.set_label(&label);
                let pending = with_ui(ui, |ui| {
                    ui.preview_cell.bind(page);
                    ui.preview_thumbnail = thumbnail.clone();
                    match (&thumbnail, ui.reader.thumbnails()) {
                        (None, Some(cache)) => Some(cache.request(page)),
                        _ => None,
                    }
                })
                .flatten();

                if let Some(pending) = pending {
                    glib::spawn_future_local(clone!(
                        #[strong]
                        shared,
                        async move {
                            let Some(result) = pending.await else {
                                return;
                            };
                            let (ui, w) = &shared;
                            with_ui(ui, |ui| {
                                if let Some(thumbnail) = ui.preview_cell.accept(result) {
                                    ui.preview_thumbnail = Some(thumbnail);
                                }
                            });
                            w.preview_area.queue_draw();
                        }
                    ));
                }
                w.preview_area.queue_draw();
            }
            ReaderEvent::PreviewHidden => w.preview_box.set_visible(false),
        }
    }
}

fn setup_page_area(shared: &Shared) {
    let (ui, w) = shared;
    let [r, g, b, a] = with_ui(ui, |ui| ui.reader.config().background).unwrap_or([0.5; 4]);

    w.page_area.set_draw_func(clone!(
        #[strong]
        ui,
        move |_, cr, _, _| {
            cr.set_source_rgba(r, g, b, a);
            let _ = cr.paint();
            if let Some(ui) = ui.borrow_mut().as_mut() {
                draw_page(ui, cr);
            }
        }
    ));

    w.page_area.connect_resize(clone!(
        #[strong]
        shared,
        move |area, width, height| {
            let events = with_ui(&shared.0, |ui| {
                ui.reader.set_screen_scale(area.scale_factor() as f64);
                ui.reader.resize(Size::new(width as f64, height as f64))
            });
            apply(&shared, events.unwrap_or_default());
        }
    ));

    w.page_area.connect_scale_factor_notify(clone!(
        #[strong]
        ui,
        move |area| {
            log::debug!("page area scale factor is now {}", area.scale_factor());
            with_ui(&ui, |ui| ui.reader.set_screen_scale(area.scale_factor() as f64));
            area.queue_draw();
        }
    ));

    let tap = gtk::GestureClick::new();
    tap.connect_released(clone!(
        #[strong]
        shared,
        move |_, n_press, x, y| {
            if n_press != 1 {
                return;
            }
            let events = with_ui(&shared.0, |ui| ui.reader.tap(Point::new(x, y)));
            apply(&shared, events.unwrap_or_default());
        }
    ));
    w.page_area.add_controller(tap);

    let swipe = gtk::GestureSwipe::new();
    swipe.connect_swipe(clone!(
        #[strong]
        shared,
        move |_, vx, _vy| {
            let events = with_ui(&shared.0, |ui| {
                if !ui.reader.zoom().is_fit() {
                    return Vec::new();
                }
                let enabled = ui.reader.swipe_enabled();
                if vx < -SWIPE_VELOCITY {
                    if enabled {
                        ui.reader.next()
                    } else {
                        ui.reader.swipe(Swipe::Left)
                    }
                } else if vx > SWIPE_VELOCITY {
                    if enabled {
                        ui.reader.prev()
                    } else {
                        ui.reader.swipe(Swipe::Right)
                    }
                } else {
                    Vec::new()
                }
            });
            apply(&shared, events.unwrap_or_default());
        }
    ));
    w.page_area.add_controller(swipe);

    let pinch = gtk::GestureZoom::new();
    pinch.connect_begin(clone!(
        #[strong]
        ui,
        move |_, _| {
            with_ui(&ui, |ui| ui.pinch_scale = 1.0);
        }
    ));
    pinch.connect_scale_changed(clone!(
        #[strong]
        ui,
        #[weak(rename_to = page_area)]
        w.page_area,
        move |_, scale| {
            with_ui(&ui, |ui| {
                ui.reader.zoom_mut().apply_zoom(scale / ui.pinch_scale);
                ui.pinch_scale = scale;
            });
            page_area.queue_draw();
        }
    ));
    pinch.connect_end(clone!(
        #[strong]
        ui,
        #[weak(rename_to = page_area)]
        w.page_area,
        move |_, _| {
            if let Some(Some(zoom)) = with_ui(&ui, |ui| ui.reader.zoom_mut().end_zoom()) {
                log::debug!("zoom bounced back to {zoom}");
            }
            page_area.queue_draw();
        }
    ));
    w.page_area.add_controller(pinch);

    let pan = gtk::GestureDrag::new();
    pan.connect_drag_begin(clone!(
        #[strong]
        ui,
        move |_, _, _| {
            with_ui(&ui, |ui| ui.pan_last = Vec2::ZERO);
        }
    ));
    pan.connect_drag_update(clone!(
        #[strong]
        ui,
        #[weak(rename_to = page_area)]
        w.page_area,
        move |_, dx, dy| {
            let moved = with_ui(&ui, |ui| {
                let total = Vec2::new(dx, dy);
                let delta = total - std::mem::replace(&mut ui.pan_last, total);
                pan_page(ui, delta)
            });
            if moved == Some(true) {
                page_area.queue_draw();
            }
        }
    ));
    w.page_area.add_controller(pan);

    let scroll = gtk::EventControllerScroll::new(gtk::EventControllerScrollFlags::BOTH_AXES);
    scroll.connect_scroll(clone!(
        #[strong]
        ui,
        #[weak(rename_to = page_area)]
        w.page_area,
        #[upgrade_or]
        glib::Propagation::Proceed,
        move |_, dx, dy| {
            let delta = Vec2::new(-dx, -dy) * SCROLL_STEP;
            match with_ui(&ui, |ui| pan_page(ui, delta)) {
                Some(true) => {
                    page_area.queue_draw();
                    glib::Propagation::Stop
                }
                _ => glib::Propagation::Proceed,
            }
        }
    ));
    w.page_area.add_controller(scroll);
}

/// Pans a zoomed page. Returns whether the visible part changed.
fn pan_page(ui: &mut Ui, delta: Vec2) -> bool {
    let zoom = ui.reader.zoom_mut();
    if zoom.is_fit() {
        return false;
    }
    let before = zoom.offset();
    zoom.pan(delta);
    zoom.offset() != before
}

fn draw_page(ui: &mut Ui, cr: &cairo::Context) {
    let Some(request) = ui.request.clone() else {
        return;
    };
    let zoom = *ui.reader.zoom();
    let content = zoom.zoomed_size();
    if content.width <= 0.0 || request.content_size.width <= 0.0 {
        return;
    }

    // tiles are rasterized at a power of two of the fit size, so pinching
    // between two levels only rescales what is cached
    let grid = ui.reader.tile_grid();
    let detail = grid.detail_scale(zoom.zoom() / zoom.min_zoom());
    let level = TileLevel {
        page: request.page,
        unit: request.unit,
        raster: request.content_size * (ui.reader.config().screen_scale * detail),
    };
    if ui.tiles.level != Some(level) {
        ui.tiles = TileCache {
            level: Some(level),
            surfaces: HashMap::new(),
        };
    }

    let to_raster = level.raster.width / content.width;
    let visible = zoom.visible_rect().scale_from_origin(to_raster);
    let regions = grid.tiles_for(level.raster, visible);
    let key = |region: &Rect| (region.x0.round() as i64, region.y0.round() as i64);

    if ui.tiles.surfaces.len() + regions.len() > MAX_CACHED_TILES {
        let keep: Vec<_> = regions.iter().map(key).collect();
        ui.tiles.surfaces.retain(|k, _| keep.contains(k));
    }

    let renderer = ui.reader.renderer(request.page);
    let origin = zoom.origin();
    cr.save().ok();
    cr.translate(origin.x, origin.y);
    cr.scale(1.0 / to_raster, 1.0 / to_raster);

    for region in &regions {
        let surface = match ui.tiles.surfaces.entry(key(region)) {
            std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
            std::collections::hash_map::Entry::Vacant(entry) => {
                let Some(surface) = renderer
                    .render_region(level.raster, *region)
                    .as_ref()
                    .and_then(image_surface)
                else {
                    log::warn!("failed to render tile {region:?} of page {}", request.page);
                    continue;
                };
                entry.insert(surface)
            }
        };
        if cr.set_source_surface(&*surface, region.x0, region.y0).is_ok() {
            let _ = cr.paint();
        }
    }
    cr.restore().ok();
}

fn track_rect(width: f64, height: f64) -> Rect {
    Rect::new(TRACK_PADDING, 0.0, (width - TRACK_PADDING).max(TRACK_PADDING), height)
}

fn setup_scrubber(shared: &Shared) {
    let (ui, w) = shared;

    w.scrub_area.set_draw_func(clone!(
        #[strong]
        ui,
        move |_, cr, width, height| {
            let Some(scrubber) = ui.borrow().as_ref().map(|ui| ui.reader.scrubber().clone()) else {
                return;
            };
            let track = track_rect(width as f64, height as f64);
            let center = scrubber.thumb_center(track);

            cr.set_source_rgba(1.0, 1.0, 1.0, 0.6);
            cr.set_line_width(2.0);
            cr.move_to(track.x0, track.center().y);
            cr.line_to(track.x1, track.center().y);
            let _ = cr.stroke();
            cr.arc(center.x, center.y, THUMB_RADIUS, 0.0, std::f64::consts::TAU);
            let _ = cr.fill();
        }
    ));

    w.preview_area.set_draw_func(clone!(
        #[strong]
        ui,
        move |_, cr, width, height| {
            let thumbnail = ui.borrow().as_ref().and_then(|ui| ui.preview_thumbnail.clone());
            if let Some(surface) = thumbnail.and_then(|t| image_surface(&t)) {
                paint_fitted(cr, &surface, Rect::new(0.0, 0.0, width as f64, height as f64));
            }
        }
    ));

    let drag = gtk::GestureDrag::new();
    drag.connect_drag_begin(clone!(
        #[strong]
        shared,
        move |_, x, y| {
            let (ui, w) = &shared;
            let track = track_rect(w.scrub_area.width() as f64, w.scrub_area.height() as f64);
            let events = with_ui(ui, |ui| {
                let thumb = ui.reader.scrubber().thumb_center(track);
                if (Point::new(x, y) - thumb).hypot() > THUMB_RADIUS * 2.0 {
                    return Vec::new();
                }
                ui.reader.set_track_width(track.width());
                ui.scrub_last = Some(Point::new(x, y));
                ui.reader.slider_touch_down(thumb)
            });
            apply(&shared, events.unwrap_or_default());
        }
    ));
    drag.connect_drag_update(clone!(
        #[strong]
        shared,
        move |gesture, dx, dy| {
            let Some((x, y)) = gesture.start_point() else {
                return;
            };
            let current = Point::new(x + dx, y + dy);
            let events = with_ui(&shared.0, |ui| {
                let Some(previous) = ui.scrub_last.replace(current) else {
                    return Vec::new();
                };
                ui.reader.slider_moved(previous, current)
            });
            shared.1.scrub_area.queue_draw();
            apply(&shared, events.unwrap_or_default());
        }
    ));
    drag.connect_drag_end(clone!(
        #[strong]
        shared,
        move |_, _, _| {
            let events = with_ui(&shared.0, |ui| {
                ui.scrub_last = None;
                ui.reader.slider_touch_up()
            });
            shared.1.scrub_area.queue_draw();
            apply(&shared, events.unwrap_or_default());
        }
    ));
    w.scrub_area.add_controller(drag);
}

fn setup_thumbnails(shared: &Shared, grid: GridLayout) {
    let (ui, w) = shared;

    w.thumbs_area.set_draw_func(clone!(
        #[strong]
        ui,
        move |_, cr, width, _| {
            let mut ui = ui.borrow_mut();
            let Some(ui) = ui.as_mut() else {
                return;
            };
            let width = width as f64;
            let (_, y0, _, y1) = cr.clip_extents().unwrap_or((0.0, 0.0, 0.0, f64::MAX));

            for index in 0..ui.reader.page_count() {
                let item = grid.item_rect(index, width);
                if item.y1 < y0 || item.y0 > y1 {
                    continue;
                }
                let image = grid.image_rect(item);

                let current = ui.reader.current_page();
                if !ui.thumbnail_surfaces.contains_key(&index) {
                    let thumbnail = ui.reader.thumbnails().and_then(|t| {
                        if index == current {
                            t.get_or_render(index as isize)
                        } else {
                            t.get(index as isize)
                        }
                    });
                    if let Some(surface) = thumbnail.and_then(|t| image_surface(&t)) {
                        ui.thumbnail_surfaces.insert(index, surface);
                    }
                }
                match ui.thumbnail_surfaces.get(&index) {
                    Some(surface) => paint_fitted(cr, surface, image),
                    None => {
                        cr.set_source_rgba(1.0, 1.0, 1.0, 0.3);
                        cr.rectangle(image.x0, image.y0, image.width(), image.height());
                        let _ = cr.fill();
                    }
                }

                if ui.selected_thumbnail.unwrap_or(current) == index {
                    cr.set_source_rgb(0.2, 0.5, 1.0);
                    cr.set_line_width(3.0);
                    cr.rectangle(image.x0, image.y0, image.width(), image.height());
                    let _ = cr.stroke();
                }
            }
        }
    ));

    w.thumbs_area.connect_resize(clone!(
        #[strong]
        ui,
        move |area, width, _| {
            let count = ui.borrow().as_ref().map_or(0, |ui| ui.reader.page_count());
            area.set_content_height(grid.content_height(count, width as f64) as i32);
        }
    ));

    let click = gtk::GestureClick::new();
    click.connect_released(clone!(
        #[strong]
        shared,
        move |_, _, x, y| {
            let (ui, w) = &shared;
            let width = w.thumbs_area.width() as f64;
            let Some((current, selected)) = with_ui(ui, |ui| {
                let selected = grid.index_at(Point::new(x, y), width, ui.reader.page_count())?;
                ui.selected_thumbnail = Some(selected);
                Some((ui.reader.current_page(), selected))
            })
            .flatten() else {
                return;
            };
            w.thumbs_area.queue_draw();

            glib::timeout_add_local_once(
                selection_delay(current, selected),
                clone!(
                    #[strong]
                    shared,
                    move || {
                        shared.1.thumbs_scroll.set_visible(false);
                        let events = with_ui(&shared.0, |ui| {
                            ui.selected_thumbnail = None;
                            ui.reader.select_thumbnail(selected)
                        });
                        apply(&shared, events.unwrap_or_default());
                    }
                ),
            );
        }
    ));
    w.thumbs_area.add_controller(click);

    let action = gtk::gio::SimpleAction::new("thumbnails", None);
    action.connect_activate(clone!(
        #[strong]
        shared,
        move |_, _| toggle_thumbnails(&shared)
    ));
    w.window.add_action(&action);
}

fn toggle_thumbnails(shared: &Shared) {
    let (ui, w) = shared;
    if w.thumbs_scroll.is_visible() {
        w.thumbs_scroll.set_visible(false);
        return;
    }

    let events = with_ui(ui, |ui| ui.reader.show_thumbnails()).unwrap_or_default();
    if with_ui(ui, |ui| ui.reader.thumbnails().is_none()).unwrap_or(true) {
        return;
    }
    apply(shared, events);
    w.thumbs_scroll.set_visible(true);
    w.thumbs_area.queue_draw();

    // redraw while the background pass is still filling slots
    glib::timeout_add_local(
        THUMBNAIL_REFRESH,
        clone!(
            #[strong]
            shared,
            move || {
                let (ui, w) = &shared;
                w.thumbs_area.queue_draw();
                let filled = with_ui(ui, |ui| {
                    ui.reader.thumbnails().map_or(true, |t| t.is_filled())
                });
                if filled.unwrap_or(true) || !w.thumbs_scroll.is_visible() {
                    glib::ControlFlow::Break
                } else {
                    glib::ControlFlow::Continue
                }
            }
        ),
    );
}

fn setup_crop(shared: &Shared) {
    let (ui, w) = shared;

    w.crop_area.set_draw_func(clone!(
        #[strong]
        ui,
        move |_, cr, _, _| {
            let mut ui = ui.borrow_mut();
            let Some(ui) = ui.as_mut() else {
                return;
            };
            let preview = ui.crop_preview.clone();
            let Some(editor) = ui.reader.crop_editor() else {
                return;
            };
            draw_crop(cr, preview.as_ref(), editor);
        }
    ));

    let drag = gtk::GestureDrag::new();
    drag.connect_drag_begin(clone!(
        #[strong]
        shared,
        move |_, x, y| {
            with_ui(&shared.0, |ui| {
                let Some(editor) = ui.reader.crop_editor() else {
                    return;
                };
                let p = Point::new(x, y);
                if let Some(handle) = editor.handle_at(p) {
                    if editor.begin_at(handle, Some(p)) {
                        ui.crop_handle = Some(handle);
                    }
                }
            });
        }
    ));
    drag.connect_drag_update(clone!(
        #[strong]
        shared,
        move |gesture, dx, dy| {
            let Some((x, y)) = gesture.start_point() else {
                return;
            };
            let changed = with_ui(&shared.0, |ui| {
                let handle = ui.crop_handle?;
                let editor = ui.reader.crop_editor()?;
                Some(editor.change(handle, Point::new(x + dx, y + dy)))
            });
            if let Some(Some(true)) = changed {
                shared.1.crop_area.queue_draw();
            }
        }
    ));
    drag.connect_drag_end(clone!(
        #[strong]
        shared,
        move |_, _, _| {
            with_ui(&shared.0, |ui| {
                let handle = ui.crop_handle.take();
                if let (Some(handle), Some(editor)) = (handle, ui.reader.crop_editor()) {
                    editor.end(handle);
                }
            });
        }
    ));
    drag.connect_cancel(clone!(
        #[strong]
        shared,
        move |_, _| {
            with_ui(&shared.0, |ui| {
                let handle = ui.crop_handle.take();
                if let (Some(handle), Some(editor)) = (handle, ui.reader.crop_editor()) {
                    editor.cancel(handle);
                }
            });
        }
    ));
    w.crop_area.add_controller(drag);

    w.crop_cancel.connect_clicked(clone!(
        #[strong]
        shared,
        move |_| end_crop(&shared, false)
    ));
    w.crop_done.connect_clicked(clone!(
        #[strong]
        shared,
        move |_| end_crop(&shared, true)
    ));

    let action = gtk::gio::SimpleAction::new("crop", None);
    action.connect_activate(clone!(
        #[strong]
        shared,
        move |_, _| begin_crop(&shared)
    ));
    w.window.add_action(&action);
}

fn begin_crop(shared: &Shared) {
    let (ui, w) = shared;
    let started = with_ui(ui, |ui| {
        let image = ui.reader.begin_crop(TOP_BAR_HEIGHT)?.image_rect();
        let page = ui
            .reader
            .document()
            .safe_page(ui.reader.current_page() as isize);
        let scale = PREVIEW_RENDER_SCALE * ui.reader.config().screen_scale;
        let preview = TileRenderer::new(page, UnitRect::FULL).render(image.size() * scale);
        ui.crop_preview = preview.as_ref().and_then(image_surface);
        Some(())
    })
    .flatten();

    if started.is_some() {
        w.header_bar.set_visible(false);
        w.toolbar.set_visible(false);
        w.crop_area.set_visible(true);
        w.crop_bar.set_visible(true);
        w.crop_area.queue_draw();
    }
}

fn end_crop(shared: &Shared, commit: bool) {
    let (ui, w) = shared;
    let events = with_ui(ui, |ui| {
        ui.crop_preview = None;
        ui.crop_handle = None;
        ui.thumbnail_surfaces.clear();
        if commit {
            ui.reader.commit_crop(&mut ui.store)
        } else {
            ui.reader.cancel_crop();
            Vec::new()
        }
    });
    w.crop_area.set_visible(false);
    w.crop_bar.set_visible(false);
    apply(shared, events.unwrap_or_default());
}

fn draw_crop(cr: &cairo::Context, preview: Option<&cairo::ImageSurface>, editor: &crop::CropEditor) {
    cr.set_source_rgb(0.1, 0.1, 0.1);
    let _ = cr.paint();

    let image = editor.image_rect();
    if let Some(surface) = preview {
        paint_fitted(cr, surface, image);
    }

    // shade what gets cut away
    let cropped = editor.cropped_rect();
    cr.set_fill_rule(cairo::FillRule::EvenOdd);
    cr.rectangle(image.x0, image.y0, image.width(), image.height());
    cr.rectangle(cropped.x0, cropped.y0, cropped.width(), cropped.height());
    cr.set_source_rgba(0.0, 0.0, 0.0, 0.5);
    let _ = cr.fill();

    cr.set_source_rgb(0.2, 0.5, 1.0);
    cr.set_line_width(1.0);
    cr.rectangle(cropped.x0, cropped.y0, cropped.width(), cropped.height());
    let _ = cr.stroke();

    let half = HANDLE_DRAW_SIZE / 2.0;
    for (handle, center) in editor.handle_centers() {
        if editor.active_handle() == Some(handle) {
            cr.set_source_rgb(1.0, 0.6, 0.0);
        } else {
            cr.set_source_rgb(0.2, 0.5, 1.0);
        }
        cr.rectangle(center.x - half, center.y - half, HANDLE_DRAW_SIZE, HANDLE_DRAW_SIZE);
        let _ = cr.fill();
    }
}

fn setup_keys(shared: &Shared) {
    let controller = gtk::EventControllerKey::new();
    controller.connect_key_pressed(clone!(
        #[strong]
        shared,
        move |_, keyval, _keycode, modifier| handle_key_press(&shared, keyval, modifier)
    ));
    shared.1.window.add_controller(controller);
}

fn handle_key_press(shared: &Shared, keyval: Key, modifier: ModifierType) -> glib::Propagation {
    let (ui, w) = shared;
    if modifier.intersects(ModifierType::CONTROL_MASK | ModifierType::ALT_MASK) {
        return glib::Propagation::Proceed;
    }

    if w.crop_area.is_visible() {
        match keyval {
            Key::Escape => end_crop(shared, false),
            Key::Return | Key::KP_Enter => end_crop(shared, true),
            _ => return glib::Propagation::Proceed,
        }
        return glib::Propagation::Stop;
    }

    let events = match keyval {
        Key::Right | Key::l => with_ui(ui, |ui| ui.reader.next()),
        Key::Left | Key::h => with_ui(ui, |ui| ui.reader.prev()),
        Key::Home => with_ui(ui, |ui| ui.reader.jump(0)),
        Key::End => with_ui(ui, |ui| {
            let last = ui.reader.document().last_page_index();
            ui.reader.jump(last as isize)
        }),
        Key::t => {
            toggle_thumbnails(shared);
            None
        }
        Key::c => {
            begin_crop(shared);
            None
        }
        Key::Escape => {
            w.thumbs_scroll.set_visible(false);
            None
        }
        _ => return glib::Propagation::Proceed,
    };

    apply(shared, events.unwrap_or_default());
    glib::Propagation::Stop
}

/// Copies an RGBA image into a cairo surface (premultiplied native endian
/// ARGB).
fn image_surface(image: &RgbaImage) -> Option<cairo::ImageSurface> {
    let (width, height) = image.dimensions();
    let mut surface =
        cairo::ImageSurface::create(cairo::Format::ARgb32, width as i32, height as i32).ok()?;
    let stride = surface.stride() as usize;
    {
        let mut data = surface.data().ok()?;
        for (y, row) in data.chunks_mut(stride).take(height as usize).enumerate() {
            for x in 0..width {
                let [r, g, b, a] = image.get_pixel(x, y as u32).0;
                let premultiply = |c: u8| ((c as u16 * a as u16) / 255) as u8;
                let px = [premultiply(r), premultiply(g), premultiply(b), a];
                let bytes = if cfg!(target_endian = "little") {
                    [px[2], px[1], px[0], px[3]]
                } else {
                    [px[3], px[0], px[1], px[2]]
                };
                let offset = x as usize * 4;
                row[offset..offset + 4].copy_from_slice(&bytes);
            }
        }
    }
    surface.mark_dirty();
    Some(surface)
}

fn paint_fitted(cr: &cairo::Context, surface: &cairo::ImageSurface, dest: Rect) {
    let (sw, sh) = (surface.width() as f64, surface.height() as f64);
    if sw <= 0.0 || sh <= 0.0 {
        return;
    }
    let scale = (dest.width() / sw).min(dest.height() / sh);
    let x = dest.x0 + (dest.width() - sw * scale) / 2.0;
    let y = dest.y0 + (dest.height() - sh * scale) / 2.0;

    cr.save().ok();
    cr.translate(x, y);
    cr.scale(scale, scale);
    if cr.set_source_surface(surface, 0.0, 0.0).is_ok() {
        let _ = cr.paint();
    }
    cr.restore().ok();
}

pub fn show_error_dialog(app: &Application, message: &str) {
    gtk::AlertDialog::builder()
        .message(message)
        .build()
        .show(app.active_window().as_ref());
}
