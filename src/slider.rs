//! Page scrubber with variable scrubbing speed.
//!
//! Dragging along the track moves the value at full speed. Moving the finger
//! away from the track vertically slows it down, down to 5% of the normal
//! speed, which allows picking a single page in a long document.

use kurbo::{Point, Rect, Size};

const MIN_SPEED: f64 = 0.05;
/// Share of the screen height over which the speed decays.
const SPEED_DISTANCE_RATIO: f64 = 0.5;

/// Offset between the preview panel's bottom and the view's bottom, leaving
/// room for the toolbar holding the slider.
pub const PREVIEW_BOTTOM_OFFSET: f64 = 44.0;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Tracking {
    began: Point,
    real: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Scrubber {
    value: f64,
    max: f64,
    track_width: f64,
    speed_distance: f64,
    tracking: Option<Tracking>,
}

/// Scrubbing speed for a finger `vertical_offset` away from where the drag
/// began: 1.0 on the track, falling in steps of 0.1 to a floor of 0.05.
pub fn scrubbing_speed(vertical_offset: f64, speed_distance: f64) -> f64 {
    if speed_distance <= 0.0 {
        return 1.0;
    }
    let offset_ratio = (speed_distance - vertical_offset.abs()).max(0.0) / speed_distance;
    MIN_SPEED.max((offset_ratio * 10.0).ceil() / 10.0)
}

impl Scrubber {
    pub fn new(page_count: usize, track_width: f64, screen_height: f64) -> Self {
        Scrubber {
            value: 0.0,
            max: page_count.saturating_sub(1) as f64,
            track_width,
            speed_distance: screen_height * SPEED_DISTANCE_RATIO,
            tracking: None,
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// The page the thumb currently points at.
    pub fn int_value(&self) -> usize {
        self.value as usize
    }

    pub fn set_value(&mut self, page: usize) {
        self.value = (page as f64).clamp(0.0, self.max);
    }

    pub fn set_track_width(&mut self, width: f64) {
        self.track_width = width;
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking.is_some()
    }

    /// Center of the thumb on a track laid out at `track`.
    pub fn thumb_center(&self, track: Rect) -> Point {
        let ratio = if self.max > 0.0 {
            self.value / self.max
        } else {
            0.0
        };
        Point::new(track.x0 + track.width() * ratio, track.center().y)
    }

    /// Starts a drag. `thumb_center` is where the thumb was when touched.
    pub fn begin(&mut self, thumb_center: Point) {
        self.tracking = Some(Tracking {
            began: thumb_center,
            real: self.value,
        });
    }

    /// Applies a finger move from `previous` to `current`. Returns the new
    /// value, or `None` when no drag is in progress.
    pub fn track(&mut self, previous: Point, current: Point) -> Option<f64> {
        let tracking = self.tracking.as_mut()?;
        if self.track_width <= 0.0 {
            return Some(self.value);
        }

        let movement_ratio = (current.x - previous.x) / self.track_width;
        let range = self.max;
        tracking.real += range * movement_ratio;

        let vertical_offset = (current.y - tracking.began.y).abs();
        let speed = scrubbing_speed(vertical_offset, self.speed_distance);
        let value_adjustment = speed * range * movement_ratio;

        // moving back toward the track: catch up with the real finger position
        let began_y = tracking.began.y;
        let approaching = (began_y < current.y && current.y < previous.y)
            || (began_y > current.y && current.y > previous.y);
        let thumb_adjustment = if approaching {
            (tracking.real - self.value) / (1.0 + vertical_offset)
        } else {
            0.0
        };

        self.value = (self.value + value_adjustment + thumb_adjustment).clamp(0.0, self.max);
        Some(self.value)
    }

    /// Ends the drag and returns the selected page.
    pub fn end(&mut self) -> Option<usize> {
        self.tracking.take()?;
        Some(self.int_value())
    }
}

pub fn preview_label(page_index: usize, page_count: usize) -> String {
    format!("{} of {}", page_index + 1, page_count)
}

/// Geometry of the page preview shown above the scrubber while dragging.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviewLayout {
    pub panel: Size,
    pub image: Size,
    pub label_height: f64,
}

impl PreviewLayout {
    pub fn for_screen(screen: Size) -> Self {
        let panel_height = screen.width.max(screen.height) * 0.4;
        let panel_width = panel_height * 3.0 / 4.0;
        let image_width = panel_width / 6.0 * 5.0;
        let image_height = image_width * 4.0 / 3.0;

        PreviewLayout {
            panel: Size::new(panel_width, panel_height),
            image: Size::new(image_width, image_height),
            label_height: (panel_height - image_height) / 2.0,
        }
    }

    /// Panel rect, horizontally centered above the bottom toolbar of a view.
    pub fn panel_rect(&self, view: Size) -> Rect {
        let origin = Point::new(
            view.width / 2.0 - self.panel.width / 2.0,
            view.height - self.panel.height - PREVIEW_BOTTOM_OFFSET,
        );
        Rect::from_origin_size(origin, self.panel)
    }

    /// Image rect centered in a panel placed at `panel`.
    pub fn image_rect(&self, panel: Rect) -> Rect {
        Rect::from_center_size(panel.center(), self.image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scrubber() -> Scrubber {
        // 101 pages over a 500px track, 1000px high screen
        Scrubber::new(101, 500.0, 1000.0)
    }

    #[test]
    fn test_speed_profile() {
        assert_eq!(scrubbing_speed(0.0, 500.0), 1.0);
        assert_eq!(scrubbing_speed(50.0, 500.0), 0.9);
        assert_eq!(scrubbing_speed(-50.0, 500.0), 0.9);
        assert_eq!(scrubbing_speed(499.0, 500.0), 0.1);
        assert_eq!(scrubbing_speed(500.0, 500.0), MIN_SPEED);
        assert_eq!(scrubbing_speed(5000.0, 500.0), MIN_SPEED);
    }

    #[test]
    fn test_full_speed_on_track() {
        let mut s = scrubber();
        s.begin(Point::new(0.0, 20.0));
        let v = s.track(Point::new(0.0, 20.0), Point::new(50.0, 20.0)).unwrap();

        assert!((v - 10.0).abs() < 1e-9, "got {v}");
        assert_eq!(s.end(), Some(10));
        assert!(!s.is_tracking());
    }

    #[test]
    fn test_far_from_track_is_slow() {
        let mut s = scrubber();
        s.begin(Point::new(0.0, 20.0));
        let v = s.track(Point::new(0.0, 620.0), Point::new(50.0, 620.0)).unwrap();

        assert!((v - 0.5).abs() < 1e-9, "got {v}");
        assert_eq!(s.end(), Some(0));
    }

    #[test]
    fn test_catch_up_when_returning_to_track() {
        let mut s = scrubber();
        s.begin(Point::new(0.0, 20.0));
        // slow scrub far away from the track
        s.track(Point::new(0.0, 620.0), Point::new(50.0, 620.0));
        let slow = s.value();

        // move straight back toward the track: no horizontal movement but the
        // value drifts toward the real finger position
        let v = s.track(Point::new(50.0, 620.0), Point::new(50.0, 120.0)).unwrap();
        assert!(v > slow, "value should move toward the real position");
        assert!(v < 10.0, "value should not overshoot the real position");

        // moving away again does not pull
        let away = s.track(Point::new(50.0, 120.0), Point::new(50.0, 300.0)).unwrap();
        assert_eq!(away, v);
    }

    #[test]
    fn test_value_is_clamped() {
        let mut s = scrubber();
        s.begin(Point::new(0.0, 0.0));
        s.track(Point::new(0.0, 0.0), Point::new(-300.0, 0.0));
        assert_eq!(s.value(), 0.0);

        s.track(Point::new(0.0, 0.0), Point::new(5000.0, 0.0));
        assert_eq!(s.value(), 100.0);
        assert_eq!(s.end(), Some(100));
    }

    #[test]
    fn test_track_without_begin() {
        let mut s = scrubber();
        assert_eq!(s.track(Point::ZERO, Point::new(10.0, 0.0)), None);
        assert_eq!(s.end(), None);
    }

    #[test]
    fn test_single_page_never_moves() {
        let mut s = Scrubber::new(1, 500.0, 1000.0);
        s.begin(Point::ZERO);
        assert_eq!(s.track(Point::ZERO, Point::new(400.0, 0.0)), Some(0.0));
        assert_eq!(s.end(), Some(0));
    }

    #[test]
    fn test_thumb_center() {
        let mut s = scrubber();
        s.set_value(50);
        let track = Rect::new(100.0, 0.0, 600.0, 40.0);
        assert_eq!(s.thumb_center(track), Point::new(350.0, 20.0));

        s.set_value(1000);
        assert_eq!(s.value(), 100.0);
    }

    #[test]
    fn test_preview() {
        assert_eq!(preview_label(0, 12), "1 of 12");

        let layout = PreviewLayout::for_screen(Size::new(768.0, 1000.0));
        assert!((layout.panel.height - 400.0).abs() < 1e-9);
        assert!((layout.panel.width - 300.0).abs() < 1e-9);
        assert!((layout.image.width - 250.0).abs() < 1e-9);
        assert!((layout.label_height - (400.0 - 250.0 * 4.0 / 3.0) / 2.0).abs() < 1e-9);

        let panel = layout.panel_rect(Size::new(768.0, 1000.0));
        assert!((panel.x0 - 234.0).abs() < 1e-9);
        assert!((panel.y0 - 556.0).abs() < 1e-9);
    }
}
