// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Mapping between image-pixel space and editor display space.
//!
//! `display = image * scale + offset`. Every drag converts display to image coordinates
//! and every redraw converts image to display coordinates, so the two directions must be
//! exact inverses. All arithmetic is done in `f64`.

use crate::error::{PoseError, Result};
use crate::pose::ImageInfo;

/// Size of the visible editor canvas in display pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportSize {
    /// Width in display pixels.
    pub width: f64,
    /// Height in display pixels.
    pub height: f64,
}

impl ViewportSize {
    /// Create a validated viewport size.
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::InvalidViewport`] unless both sides are positive and finite.
    pub fn new(width: f64, height: f64) -> Result<Self> {
        if width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0 {
            Ok(Self { width, height })
        } else {
            Err(PoseError::InvalidViewport(format!(
                "canvas size {width}x{height} must be positive"
            )))
        }
    }

    /// Center point of the canvas.
    #[must_use]
    pub fn center(&self) -> (f64, f64) {
        (self.width / 2.0, self.height / 2.0)
    }
}

impl From<ImageInfo> for ViewportSize {
    fn from(info: ImageInfo) -> Self {
        Self {
            width: f64::from(info.width),
            height: f64::from(info.height),
        }
    }
}

/// Scale and offset mapping image space to display space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EditorViewport {
    scale: f64,
    offset_x: f64,
    offset_y: f64,
}

impl Default for EditorViewport {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl EditorViewport {
    /// Display space equals image space.
    pub const IDENTITY: Self = Self {
        scale: 1.0,
        offset_x: 0.0,
        offset_y: 0.0,
    };

    /// Create a viewport.
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::InvalidViewport`] unless `scale` is positive and finite and both
    /// offsets are finite.
    pub fn new(scale: f64, offset_x: f64, offset_y: f64) -> Result<Self> {
        if !(scale.is_finite() && scale > 0.0) {
            return Err(PoseError::InvalidViewport(format!(
                "scale {scale} must be positive"
            )));
        }
        if !(offset_x.is_finite() && offset_y.is_finite()) {
            return Err(PoseError::InvalidViewport(format!(
                "offset ({offset_x}, {offset_y}) must be finite"
            )));
        }
        Ok(Self {
            scale,
            offset_x,
            offset_y,
        })
    }

    /// Display pixels per image pixel.
    #[must_use]
    pub const fn scale(&self) -> f64 {
        self.scale
    }

    /// Display position of the image origin.
    #[must_use]
    pub const fn offset(&self) -> (f64, f64) {
        (self.offset_x, self.offset_y)
    }

    /// Image point to display point.
    #[must_use]
    pub fn to_display(&self, x: f64, y: f64) -> (f64, f64) {
        (
            x.mul_add(self.scale, self.offset_x),
            y.mul_add(self.scale, self.offset_y),
        )
    }

    /// Display point to image point.
    #[must_use]
    pub fn to_image(&self, dx: f64, dy: f64) -> (f64, f64) {
        (
            (dx - self.offset_x) / self.scale,
            (dy - self.offset_y) / self.scale,
        )
    }

    /// Fit the whole image inside `viewport`, preserving aspect ratio, centered.
    ///
    /// The scale is the smaller of the width-fit and height-fit scales so the image never
    /// overflows.
    #[must_use]
    pub fn fit(image: ImageInfo, viewport: ViewportSize) -> Self {
        let (iw, ih) = (f64::from(image.width), f64::from(image.height));
        let scale = (viewport.width / iw).min(viewport.height / ih);
        Self {
            scale,
            offset_x: iw.mul_add(-scale, viewport.width) / 2.0,
            offset_y: ih.mul_add(-scale, viewport.height) / 2.0,
        }
    }

    /// Zoom by `factor` around the display point `anchor`, which stays fixed on screen.
    ///
    /// The resulting scale is clamped to `[min_scale, max_scale]`. A non-finite factor, anchor
    /// or result leaves the viewport unchanged.
    #[must_use]
    pub fn zoom_about(&self, factor: f64, anchor: (f64, f64), min_scale: f64, max_scale: f64) -> Self {
        let (ix, iy) = self.to_image(anchor.0, anchor.1);
        let scale = (self.scale * factor).clamp(min_scale, max_scale);
        Self {
            scale,
            offset_x: ix.mul_add(-scale, anchor.0),
            offset_y: iy.mul_add(-scale, anchor.1),
        }
        .or_keep(*self)
    }

    /// Shift the image by a display-space delta. A non-finite delta, or one that overflows
    /// the offset, leaves the viewport unchanged.
    #[must_use]
    pub fn panned(&self, dx: f64, dy: f64) -> Self {
        Self {
            offset_x: self.offset_x + dx,
            offset_y: self.offset_y + dy,
            ..*self
        }
        .or_keep(*self)
    }

    fn is_finite(&self) -> bool {
        self.scale.is_finite() && self.scale > 0.0 && self.offset_x.is_finite() && self.offset_y.is_finite()
    }

    fn or_keep(self, previous: Self) -> Self {
        if self.is_finite() { self } else { previous }
    }
}

/// Image point to display point under `viewport`.
#[must_use]
pub fn to_display(viewport: &EditorViewport, x: f64, y: f64) -> (f64, f64) {
    viewport.to_display(x, y)
}

/// Display point to image point under `viewport`.
#[must_use]
pub fn to_image(viewport: &EditorViewport, dx: f64, dy: f64) -> (f64, f64) {
    viewport.to_image(dx, dy)
}

/// Viewport that fits `image` inside `viewport`, centered.
#[must_use]
pub fn fit_to_viewport(image: ImageInfo, viewport: ViewportSize) -> EditorViewport {
    EditorViewport::fit(image, viewport)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-6 * a.abs().max(b.abs()).max(1.0)
    }

    #[test]
    fn test_round_trip() {
        let viewports = [
            EditorViewport::IDENTITY,
            EditorViewport::new(0.5, 10.0, 10.0).unwrap(),
            EditorViewport::new(3.75, -412.5, 96.0).unwrap(),
            EditorViewport::new(0.013, 1e4, -2e3).unwrap(),
        ];
        let points = [
            (0.0, 0.0),
            (200.0, 200.0),
            (-35.5, 1920.25),
            (1280.0, -0.001),
            (123_456.7, 98_765.4),
        ];
        for vp in &viewports {
            for &(x, y) in &points {
                let (dx, dy) = to_display(vp, x, y);
                let (rx, ry) = to_image(vp, dx, dy);
                assert!(close(rx, x) && close(ry, y), "{vp:?} ({x}, {y}) -> ({rx}, {ry})");
            }
        }
    }

    #[test]
    fn test_to_display() {
        let vp = EditorViewport::new(0.5, 10.0, 10.0).unwrap();
        assert_eq!(vp.to_display(200.0, 200.0), (110.0, 110.0));
        assert_eq!(vp.to_image(160.0, 160.0), (300.0, 300.0));
    }

    #[test]
    fn test_invalid_viewport() {
        assert!(EditorViewport::new(0.0, 0.0, 0.0).is_err());
        assert!(EditorViewport::new(-1.0, 0.0, 0.0).is_err());
        assert!(EditorViewport::new(f64::NAN, 0.0, 0.0).is_err());
        assert!(EditorViewport::new(1.0, f64::INFINITY, 0.0).is_err());
        assert!(ViewportSize::new(0.0, 10.0).is_err());
    }

    #[test]
    fn test_fit_portrait_image() {
        let image = ImageInfo::new(1280, 1920).unwrap();
        let vp = fit_to_viewport(image, ViewportSize::new(800.0, 600.0).unwrap());
        // height-limited: 600 / 1920
        assert!(close(vp.scale(), 0.3125));
        let (ox, oy) = vp.offset();
        assert!(close(ox, (800.0 - 1280.0 * 0.3125) / 2.0));
        assert!(close(oy, 0.0));

        // image corners land inside the canvas
        let (x1, y1) = vp.to_display(1280.0, 1920.0);
        assert!(x1 <= 800.0 + 1e-9 && y1 <= 600.0 + 1e-9);
    }

    #[test]
    fn test_fit_exact_aspect() {
        let image = ImageInfo::new(400, 200).unwrap();
        let vp = fit_to_viewport(image, ViewportSize::new(800.0, 400.0).unwrap());
        assert!(close(vp.scale(), 2.0));
        assert_eq!(vp.offset(), (0.0, 0.0));
    }

    #[test]
    fn test_zoom_keeps_anchor_fixed() {
        let vp = EditorViewport::new(0.5, 10.0, 20.0).unwrap();
        let anchor = (300.0, 150.0);
        let before = vp.to_image(anchor.0, anchor.1);
        let zoomed = vp.zoom_about(2.0, anchor, 0.05, 20.0);
        assert!(close(zoomed.scale(), 1.0));
        let after = zoomed.to_image(anchor.0, anchor.1);
        assert!(close(before.0, after.0) && close(before.1, after.1));
    }

    #[test]
    fn test_zoom_clamps_scale() {
        let vp = EditorViewport::new(10.0, 0.0, 0.0).unwrap();
        assert!(close(vp.zoom_about(4.0, (0.0, 0.0), 0.05, 20.0).scale(), 20.0));
        assert!(close(vp.zoom_about(1e-6, (0.0, 0.0), 0.05, 20.0).scale(), 0.05));
    }

    #[test]
    fn test_pan() {
        let vp = EditorViewport::new(2.0, 1.0, 1.0).unwrap().panned(4.0, -6.0);
        assert_eq!(vp.offset(), (5.0, -5.0));
        assert!(close(vp.scale(), 2.0));
    }

    #[test]
    fn test_non_finite_pan_and_zoom_keep_viewport() {
        let vp = EditorViewport::new(2.0, 1.0, 1.0).unwrap();
        assert_eq!(vp.panned(f64::NAN, 0.0), vp);
        assert_eq!(vp.panned(0.0, f64::INFINITY), vp);
        assert_eq!(vp.panned(f64::MAX, 0.0).panned(f64::MAX, 0.0), vp.panned(f64::MAX, 0.0));
        assert_eq!(vp.zoom_about(f64::NAN, (0.0, 0.0), 0.05, 20.0), vp);
        assert_eq!(vp.zoom_about(2.0, (f64::NAN, 5.0), 0.05, 20.0), vp);
        assert_eq!(vp.zoom_about(2.0, (f64::INFINITY, 5.0), 0.05, 20.0), vp);

        let moved = vp.panned(3.0, 4.0);
        assert!(moved.offset().0.is_finite() && moved.offset().1.is_finite());
    }
}
