//! Interactive editor for the crop margins.
//!
//! The page preview is shown at `image` (display coordinates) and the crop is
//! manipulated through eight handles placed on the crop rectangle's corners
//! and edge midpoints.

use kurbo::{Point, Rect, Size};

use crate::unit_rect::{UnitRect, MIN_UNIT_SIZE};

/// Edge length of the square area around a handle that reacts to touches.
pub const HANDLE_HIT_SIZE: f64 = 60.0;
/// Edge length of the drawn handle square.
pub const HANDLE_DRAW_SIZE: f64 = 10.0;

const PREVIEW_FIT_RATIO: f64 = 0.8;
/// The preview is rasterized at this multiple of its display size.
pub const PREVIEW_RENDER_SCALE: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handle {
    Top,
    Bottom,
    Left,
    Right,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Handle {
    pub const ALL: [Handle; 8] = [
        Handle::Top,
        Handle::Bottom,
        Handle::Left,
        Handle::Right,
        Handle::TopLeft,
        Handle::TopRight,
        Handle::BottomLeft,
        Handle::BottomRight,
    ];

    fn center(self, r: Rect) -> Point {
        let mid = r.center();
        match self {
            Handle::Top => Point::new(mid.x, r.y0),
            Handle::Bottom => Point::new(mid.x, r.y1),
            Handle::Left => Point::new(r.x0, mid.y),
            Handle::Right => Point::new(r.x1, mid.y),
            Handle::TopLeft => Point::new(r.x0, r.y0),
            Handle::TopRight => Point::new(r.x1, r.y0),
            Handle::BottomLeft => Point::new(r.x0, r.y1),
            Handle::BottomRight => Point::new(r.x1, r.y1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CropEditor {
    image: Rect,
    unit: UnitRect,
    /// Crop rectangle in display coordinates when the active drag began.
    initial: Rect,
    active: Option<Handle>,
    /// Display position the drag started from, and the handle center then.
    grab: Option<(Point, Point)>,
}

impl CropEditor {
    pub fn new(image: Rect, unit: UnitRect) -> Self {
        CropEditor {
            image,
            unit: unit.clamp_to_min_size(),
            initial: Rect::ZERO,
            active: None,
            grab: None,
        }
    }

    pub fn unit_rect(&self) -> UnitRect {
        self.unit
    }

    pub fn image_rect(&self) -> Rect {
        self.image
    }

    /// Relayouts the preview, e.g. after the window was resized. The unit
    /// crop is kept.
    pub fn set_image_rect(&mut self, image: Rect) {
        self.image = image;
    }

    pub fn active_handle(&self) -> Option<Handle> {
        self.active
    }

    /// Current crop rectangle in display coordinates.
    pub fn cropped_rect(&self) -> Rect {
        self.unit.to_display(self.image)
    }

    pub fn handle_centers(&self) -> [(Handle, Point); 8] {
        let r = self.cropped_rect();
        Handle::ALL.map(|h| (h, h.center(r)))
    }

    /// The handle whose hit area contains `p`. Corners win over edges when
    /// areas overlap on a small crop.
    pub fn handle_at(&self, p: Point) -> Option<Handle> {
        let half = HANDLE_HIT_SIZE / 2.0;
        let mut best: Option<(Handle, f64)> = None;

        for (handle, center) in self.handle_centers() {
            let hit = Rect::new(center.x - half, center.y - half, center.x + half, center.y + half);
            if !hit.contains(p) {
                continue;
            }
            let dist = (p - center).hypot2();
            if best.map_or(true, |(_, d)| dist < d) {
                best = Some((handle, dist));
            }
        }

        best.map(|(handle, _)| handle)
    }

    /// Starts dragging `handle`. Ignored (returns false) while another handle
    /// is being dragged.
    pub fn begin(&mut self, handle: Handle) -> bool {
        self.begin_at(handle, None)
    }

    /// Like [`CropEditor::begin`] but with the touch location, so that later
    /// positions are applied relative to where the finger grabbed the handle.
    pub fn begin_at(&mut self, handle: Handle, touch: Option<Point>) -> bool {
        if self.active.is_some_and(|h| h != handle) {
            return false;
        }

        self.active = Some(handle);
        self.initial = self.cropped_rect();
        let center = handle.center(self.initial);
        self.grab = Some((touch.unwrap_or(center), center));
        true
    }

    /// Moves the active handle to `p` (display coordinates). Updates for any
    /// other handle are ignored. Returns whether the crop changed.
    pub fn change(&mut self, handle: Handle, p: Point) -> bool {
        if self.active != Some(handle) {
            return false;
        }

        let p = match self.grab {
            Some((touch, center)) => center + (p - touch),
            None => p,
        };
        let x = p.x.clamp(self.image.x0, self.image.x1);
        let y = p.y.clamp(self.image.y0, self.image.y1);

        let before = self.unit;
        match handle {
            Handle::Top => self.move_top_edge(y),
            Handle::Bottom => self.move_bottom_edge(y),
            Handle::Left => self.move_left_edge(x),
            Handle::Right => self.move_right_edge(x),
            Handle::TopLeft => {
                self.move_top_edge(y);
                self.move_left_edge(x);
            }
            Handle::TopRight => {
                self.move_top_edge(y);
                self.move_right_edge(x);
            }
            Handle::BottomLeft => {
                self.move_bottom_edge(y);
                self.move_left_edge(x);
            }
            Handle::BottomRight => {
                self.move_bottom_edge(y);
                self.move_right_edge(x);
            }
        }
        self.unit = self.unit.clamp_to_min_size();

        self.unit != before
    }

    /// Ends the drag of `handle`, freeing the editor for the next one. The
    /// crop reached so far is kept.
    pub fn end(&mut self, handle: Handle) {
        if self.active == Some(handle) {
            self.active = None;
            self.grab = None;
        }
    }

    /// A cancelled touch releases the handle like `end`.
    pub fn cancel(&mut self, handle: Handle) {
        self.end(handle);
    }

    /// Converts the displayed crop back into unit coordinates for saving.
    pub fn confirm(&self) -> UnitRect {
        UnitRect::from_display(self.cropped_rect(), self.image).clamp_to_min_size()
    }

    pub fn move_top_edge(&mut self, y: f64) {
        let img = self.image;
        let unit_y = (y - img.y0) / img.height();
        let unit_y_max = self.unit.y + self.unit.h - MIN_UNIT_SIZE.height;
        let unit_h = (self.initial.y1 - y) / img.height();
        self.unit.y = unit_y.min(unit_y_max);
        self.unit.h = unit_h.max(MIN_UNIT_SIZE.height);
    }

    pub fn move_bottom_edge(&mut self, y: f64) {
        let unit_h = (y - self.initial.y0) / self.image.height();
        self.unit.h = unit_h.max(MIN_UNIT_SIZE.height);
    }

    pub fn move_left_edge(&mut self, x: f64) {
        let img = self.image;
        let unit_x = (x - img.x0) / img.width();
        let unit_x_max = self.unit.x + self.unit.w - MIN_UNIT_SIZE.width;
        let unit_w = (self.initial.x1 - x) / img.width();
        self.unit.x = unit_x.min(unit_x_max);
        self.unit.w = unit_w.max(MIN_UNIT_SIZE.width);
    }

    pub fn move_right_edge(&mut self, x: f64) {
        let unit_w = (x - self.initial.x0) / self.image.width();
        self.unit.w = unit_w.max(MIN_UNIT_SIZE.width);
    }
}

/// Display size of the page preview in the crop screen: the crop box fitted
/// into `base` and shrunk a little to leave room around the handles.
pub fn preview_size(page: Size, base: Size) -> Size {
    if page.width <= 0.0 || page.height <= 0.0 {
        return Size::ZERO;
    }
    let scale = (base.width / page.width).min(base.height / page.height) * PREVIEW_FIT_RATIO;
    Size::new(page.width * scale, page.height * scale)
}

/// Preview rect centered in a view of `base` size, shifted down by half the
/// toolbar height.
pub fn preview_rect(page: Size, base: Size, toolbar_height: f64) -> Rect {
    let size = preview_size(page, base);
    let center = Point::new(base.width / 2.0, base.height / 2.0 + toolbar_height / 2.0);
    Rect::from_center_size(center, size)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn editor() -> CropEditor {
        CropEditor::new(Rect::new(0.0, 0.0, 400.0, 600.0), UnitRect::FULL)
    }

    fn assert_unit_eq(a: UnitRect, b: UnitRect) {
        let close = |x: f64, y: f64| (x - y).abs() < 1e-9;
        assert!(
            close(a.x, b.x) && close(a.y, b.y) && close(a.w, b.w) && close(a.h, b.h),
            "{a:?} != {b:?}"
        );
    }

    #[test]
    fn test_drag_top_edge() {
        let mut e = editor();
        assert!(e.begin(Handle::Top));
        assert!(e.change(Handle::Top, Point::new(200.0, 60.0)));
        e.end(Handle::Top);

        assert_unit_eq(e.unit_rect(), UnitRect::new(0.0, 0.1, 1.0, 0.9));
    }

    #[test]
    fn test_move_top_edge_is_idempotent() {
        let mut e = editor();
        e.begin(Handle::Top);
        e.move_top_edge(120.0);
        let once = e.unit_rect();
        e.move_top_edge(120.0);

        assert_eq!(e.unit_rect(), once);
    }

    #[test]
    fn test_top_edge_stops_at_min_height() {
        let mut e = editor();
        e.begin(Handle::Top);
        e.change(Handle::Top, Point::new(200.0, 600.0));

        let r = e.unit_rect();
        assert_unit_eq(r, UnitRect::new(0.0, 0.9, 1.0, 0.1));
    }

    #[test]
    fn test_drag_bottom_right_corner() {
        let mut e = editor();
        e.begin(Handle::BottomRight);
        e.change(Handle::BottomRight, Point::new(200.0, 300.0));
        e.end(Handle::BottomRight);

        assert_unit_eq(e.unit_rect(), UnitRect::new(0.0, 0.0, 0.5, 0.5));
    }

    #[test]
    fn test_drag_top_left_corner() {
        let mut e = editor();
        e.begin(Handle::TopLeft);
        e.change(Handle::TopLeft, Point::new(100.0, 150.0));
        e.end(Handle::TopLeft);

        assert_unit_eq(e.unit_rect(), UnitRect::new(0.25, 0.25, 0.75, 0.75));
    }

    #[test]
    fn test_drag_outside_image_is_clamped() {
        let mut e = editor();
        e.begin(Handle::Left);
        e.change(Handle::Left, Point::new(-500.0, 300.0));
        assert_unit_eq(e.unit_rect(), UnitRect::FULL);

        e.change(Handle::Left, Point::new(10_000.0, 300.0));
        let r = e.unit_rect();
        assert!(r.w >= MIN_UNIT_SIZE.width);
        assert!(r.max_x() <= 1.0 + 1e-9);
    }

    #[test]
    fn test_second_handle_is_ignored() {
        let mut e = editor();
        assert!(e.begin(Handle::Right));
        assert!(!e.begin(Handle::Bottom), "second handle must not take over");
        assert!(!e.change(Handle::Bottom, Point::new(200.0, 300.0)));
        assert_eq!(e.unit_rect(), UnitRect::FULL);

        assert!(e.change(Handle::Right, Point::new(200.0, 300.0)));
        e.cancel(Handle::Bottom);
        assert_eq!(e.active_handle(), Some(Handle::Right));

        e.end(Handle::Right);
        assert!(e.begin(Handle::Bottom));
    }

    #[test]
    fn test_grab_offset_is_kept() {
        let mut e = editor();
        // finger lands 10px below the top handle
        e.begin_at(Handle::Top, Some(Point::new(200.0, 10.0)));
        e.change(Handle::Top, Point::new(200.0, 70.0));

        assert_unit_eq(e.unit_rect(), UnitRect::new(0.0, 0.1, 1.0, 0.9));
    }

    #[test]
    fn test_handle_hit_testing() {
        let e = editor();
        assert_eq!(e.handle_at(Point::new(5.0, 5.0)), Some(Handle::TopLeft));
        assert_eq!(e.handle_at(Point::new(200.0, 590.0)), Some(Handle::Bottom));
        assert_eq!(e.handle_at(Point::new(395.0, 300.0)), Some(Handle::Right));
        assert_eq!(e.handle_at(Point::new(200.0, 300.0)), None);
    }

    #[test]
    fn test_confirm_with_offset_image() {
        let mut e = CropEditor::new(Rect::new(50.0, 100.0, 450.0, 700.0), UnitRect::FULL);
        e.begin(Handle::BottomRight);
        e.change(Handle::BottomRight, Point::new(250.0, 400.0));
        e.end(Handle::BottomRight);

        assert_unit_eq(e.confirm(), UnitRect::new(0.0, 0.0, 0.5, 0.5));
    }

    #[test]
    fn test_preview_layout() {
        let page = Size::new(600.0, 800.0);
        let size = preview_size(page, Size::new(1000.0, 1000.0));
        assert!((size.width - 600.0).abs() < 1e-9);
        assert!((size.height - 800.0).abs() < 1e-9);

        let rect = preview_rect(page, Size::new(1000.0, 1000.0), 40.0);
        assert!((rect.x0 - 200.0).abs() < 1e-9);
        assert!((rect.y0 - 120.0).abs() < 1e-9);
    }
}
