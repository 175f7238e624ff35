//! Rectangles in coordinates normalized to a page's crop box.
//!
//! `(0, 0)` is the top-left corner of the crop box and `(1, 1)` the
//! bottom-right one, so a unit rect stays valid whatever resolution the
//! page is displayed at.

use std::fmt;
use std::str::FromStr;

use kurbo::{Rect, Size};

use crate::error::Error;

/// Smallest crop the editor lets the user make.
pub const MIN_UNIT_SIZE: Size = Size::new(0.1, 0.1);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitRect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl UnitRect {
    /// The whole crop box, i.e. no cropping at all.
    pub const FULL: UnitRect = UnitRect::new(0.0, 0.0, 1.0, 1.0);

    pub const fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        UnitRect { x, y, w, h }
    }

    pub fn is_full(&self) -> bool {
        *self == Self::FULL
    }

    pub fn max_x(&self) -> f64 {
        self.x + self.w
    }

    pub fn max_y(&self) -> f64 {
        self.y + self.h
    }

    /// Brings the rect back inside the unit square while keeping it at least
    /// [`MIN_UNIT_SIZE`] large. Non-finite components fall back to the full
    /// extent on that axis.
    pub fn clamp_to_min_size(self) -> Self {
        let (x, w) = clamp_axis(self.x, self.w, MIN_UNIT_SIZE.width);
        let (y, h) = clamp_axis(self.y, self.h, MIN_UNIT_SIZE.height);
        UnitRect { x, y, w, h }
    }

    /// Maps the rect onto an image displayed at `image`.
    pub fn to_display(&self, image: Rect) -> Rect {
        Rect::from_origin_size(
            (
                image.x0 + image.width() * self.x,
                image.y0 + image.height() * self.y,
            ),
            (image.width() * self.w, image.height() * self.h),
        )
    }

    /// Inverse of [`UnitRect::to_display`].
    pub fn from_display(rect: Rect, image: Rect) -> Self {
        let (iw, ih) = (image.width(), image.height());
        if iw <= 0.0 || ih <= 0.0 {
            return Self::FULL;
        }

        UnitRect {
            x: (rect.x0 - image.x0) / iw,
            y: (rect.y0 - image.y0) / ih,
            w: rect.width() / iw,
            h: rect.height() / ih,
        }
    }

    /// Size of the cropped region of a page whose crop box is `page`.
    pub fn cropped_size(&self, page: Size) -> Size {
        Size::new(page.width * self.w, page.height * self.h)
    }
}

impl Default for UnitRect {
    fn default() -> Self {
        Self::FULL
    }
}

fn clamp_axis(origin: f64, len: f64, min_len: f64) -> (f64, f64) {
    let len = if len.is_finite() {
        len.clamp(min_len, 1.0)
    } else {
        1.0
    };
    let origin = if origin.is_finite() {
        origin.clamp(0.0, 1.0 - len)
    } else {
        0.0
    };
    (origin, len)
}

/// Formats as `{{x, y}, {w, h}}`, the form the crop is persisted in.
impl fmt::Display for UnitRect {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{{{{}, {}}}, {{{}, {}}}}}", self.x, self.y, self.w, self.h)
    }
}

impl FromStr for UnitRect {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values: Vec<f64> = s
            .replace(['{', '}'], " ")
            .split(',')
            .map(|part| part.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|_| Error::InvalidRect(s.to_string()))?;

        match values[..] {
            [x, y, w, h] => Ok(UnitRect::new(x, y, w, h)),
            _ => Err(Error::InvalidRect(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_invariants(r: UnitRect) {
        assert!(r.w >= MIN_UNIT_SIZE.width, "width below minimum: {r:?}");
        assert!(r.h >= MIN_UNIT_SIZE.height, "height below minimum: {r:?}");
        assert!(r.x >= 0.0 && r.max_x() <= 1.0 + 1e-12, "x out of range: {r:?}");
        assert!(r.y >= 0.0 && r.max_y() <= 1.0 + 1e-12, "y out of range: {r:?}");
    }

    #[test]
    fn test_clamp_keeps_valid_rect() {
        let r = UnitRect::new(0.1, 0.2, 0.5, 0.6);
        assert_eq!(r.clamp_to_min_size(), r);
    }

    #[test]
    fn test_clamp_holds_invariants_for_odd_inputs() {
        let inputs = [
            UnitRect::new(-0.5, -3.0, 0.0, 0.0),
            UnitRect::new(0.95, 0.99, 0.5, 2.0),
            UnitRect::new(2.0, 2.0, -1.0, 0.05),
            UnitRect::new(0.3, 0.3, 1.5, 0.01),
            UnitRect::new(f64::NAN, 0.5, f64::INFINITY, f64::NAN),
        ];

        for r in inputs {
            assert_invariants(r.clamp_to_min_size());
        }
    }

    #[test]
    fn test_clamp_grid() {
        let steps = [-1.0, -0.1, 0.0, 0.05, 0.3, 0.9, 1.0, 1.2];
        for x in steps {
            for w in steps {
                assert_invariants(UnitRect::new(x, 1.0 - x, w, x).clamp_to_min_size());
            }
        }
    }

    #[test]
    fn test_display_mapping_round_trip() {
        let image = Rect::new(20.0, 40.0, 420.0, 640.0);
        let r = UnitRect::new(0.25, 0.5, 0.5, 0.25);
        let display = r.to_display(image);

        assert_eq!(display, Rect::new(120.0, 340.0, 320.0, 490.0));

        let back = UnitRect::from_display(display, image);
        assert!((back.x - r.x).abs() < 1e-12);
        assert!((back.y - r.y).abs() < 1e-12);
        assert!((back.w - r.w).abs() < 1e-12);
        assert!((back.h - r.h).abs() < 1e-12);
    }

    #[test]
    fn test_from_display_with_empty_image() {
        let r = UnitRect::from_display(Rect::new(0.0, 0.0, 10.0, 10.0), Rect::ZERO);
        assert_eq!(r, UnitRect::FULL);
    }

    #[test]
    fn test_string_form() {
        let r = UnitRect::new(0.1, 0.1, 0.5, 0.5);
        assert_eq!(r.to_string(), "{{0.1, 0.1}, {0.5, 0.5}}");
        assert_eq!("{{0.1, 0.1}, {0.5, 0.5}}".parse::<UnitRect>().unwrap(), r);
        assert_eq!("{{0, 0}, {1, 1}}".parse::<UnitRect>().unwrap(), UnitRect::FULL);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("".parse::<UnitRect>().is_err());
        assert!("{{0.1, 0.1}, {0.5}}".parse::<UnitRect>().is_err());
        assert!("{{a, b}, {c, d}}".parse::<UnitRect>().is_err());
    }
}
