use kurbo::{Insets, Point, Rect, Size, Vec2};

/// How far past the fit scale a page may be zoomed in.
pub const MAX_ZOOM_FACTOR: f64 = 4.0;

/// Zoom of a single page inside its scroll container.
///
/// The minimum scale fits the page into the view; the maximum is
/// [`MAX_ZOOM_FACTOR`] times that. Pinching may overshoot the maximum while
/// the gesture lasts and bounces back when it ends.
///
/// A page zoomed past the view can be panned. The pan offset is the point of
/// the zoomed page shown at the view's top-left corner and is kept inside the
/// page on every axis where the page is larger than the view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomState {
    zoom: f64,
    min_zoom: f64,
    max_zoom: f64,
    content: Size,
    view: Size,
    offset: Vec2,
}

impl ZoomState {
    /// `content` is the page size at scale 1.0, `view` the container size.
    pub fn new(content: Size, view: Size) -> Self {
        let mut state = ZoomState {
            zoom: 1.0,
            min_zoom: 1.0,
            max_zoom: MAX_ZOOM_FACTOR,
            content,
            view,
            offset: Vec2::ZERO,
        };
        state.update_limits();
        state.zoom = state.min_zoom;
        state
    }

    fn update_limits(&mut self) {
        let fit = if self.content.width > 0.0 && self.content.height > 0.0 {
            (self.view.width / self.content.width).min(self.view.height / self.content.height)
        } else {
            1.0
        };
        self.min_zoom = if fit.is_finite() && fit > 0.0 { fit } else { 1.0 };
        self.max_zoom = self.min_zoom * MAX_ZOOM_FACTOR;
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn min_zoom(&self) -> f64 {
        self.min_zoom
    }

    pub fn max_zoom(&self) -> f64 {
        self.max_zoom
    }

    pub fn is_fit(&self) -> bool {
        self.zoom == self.min_zoom
    }

    /// Applies a pinch step. Zooming below the fit scale is not possible;
    /// zooming past the maximum is, until [`ZoomState::end_zoom`].
    pub fn apply_zoom(&mut self, zoom_factor: f64) {
        if !zoom_factor.is_finite() || zoom_factor <= 0.0 {
            return;
        }
        self.set_zoom((self.zoom * zoom_factor).max(self.min_zoom));
    }

    /// Changes the scale keeping the page point under the view center in
    /// place.
    fn set_zoom(&mut self, zoom: f64) {
        let center = self.view.to_vec2() * 0.5;
        let anchor = (center - self.origin().to_vec2()) * (zoom / self.zoom);
        self.zoom = zoom;
        self.offset = anchor - center;
        self.clamp_offset();
    }

    /// Ends a pinch. Returns the scale to animate back to if the page was
    /// zoomed past the maximum.
    pub fn end_zoom(&mut self) -> Option<f64> {
        if self.zoom > self.max_zoom {
            self.set_zoom(self.max_zoom);
            return Some(self.zoom);
        }
        None
    }

    pub fn reset(&mut self) {
        self.zoom = self.min_zoom;
        self.offset = Vec2::ZERO;
    }

    /// The view changed size (rotation, window resize). Zoom goes back to
    /// fit.
    pub fn resize(&mut self, view: Size) {
        self.view = view;
        self.update_limits();
        self.reset();
    }

    pub fn zoomed_size(&self) -> Size {
        self.content * self.zoom
    }

    /// Insets that keep content smaller than the view centered in it.
    pub fn centering_insets(&self) -> Insets {
        let zoomed = self.zoomed_size();
        let iw = ((self.view.width - zoomed.width) * 0.5).max(0.0);
        let ih = ((self.view.height - zoomed.height) * 0.5).max(0.0);
        Insets::new(iw, ih, iw, ih)
    }

    pub fn offset(&self) -> Vec2 {
        self.offset
    }

    /// Moves the page by `delta` view pixels, as a drag does. Axes on which
    /// the page fits the view do not move.
    pub fn pan(&mut self, delta: Vec2) {
        self.offset -= delta;
        self.clamp_offset();
    }

    fn clamp_offset(&mut self) {
        let zoomed = self.zoomed_size();
        let max_x = (zoomed.width - self.view.width).max(0.0);
        let max_y = (zoomed.height - self.view.height).max(0.0);
        self.offset = Vec2::new(
            self.offset.x.clamp(0.0, max_x),
            self.offset.y.clamp(0.0, max_y),
        );
    }

    /// Top-left corner of the zoomed page in view coordinates.
    pub fn origin(&self) -> Point {
        let insets = self.centering_insets();
        Point::new(insets.x0 - self.offset.x, insets.y0 - self.offset.y)
    }

    /// The part of the zoomed page the view shows, in page coordinates.
    pub fn visible_rect(&self) -> Rect {
        let origin = self.origin();
        Rect::from_origin_size((-origin.x, -origin.y), self.view)
    }
}
