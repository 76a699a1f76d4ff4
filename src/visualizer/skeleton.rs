// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Local vector skeleton renderer.
//!
//! Rendering happens in two steps: [`LocalRenderer::scene`] resolves which bones and markers
//! are drawn and where (in canvas pixels), then [`LocalRenderer::rasterize`] draws that scene
//! with `imageproc`. The scene is plain data, which keeps the drawing rules testable without
//! inspecting pixels.

use std::f64::consts::TAU;

use image::{DynamicImage, Rgba, RgbaImage, imageops};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};

use crate::config::{EditorConfig, RenderStyle};
use crate::error::{PoseError, Result};
use crate::pose::PoseDocument;
use crate::render::{RasterImage, Renderer};
use crate::topology::Subset;
use crate::transform::{EditorViewport, ViewportSize};
use crate::visualizer::color::Color;

/// Number of placeholder markers drawn around each wrist.
pub const HAND_MARKER_COUNT: usize = 5;

/// Distance of the placeholder markers from the wrist, in canvas pixels.
pub const HAND_MARKER_DISTANCE: f64 = 15.0;

/// Whether keypoint `index` is displayed: visible, and its subset enabled.
#[must_use]
pub fn is_displayed(doc: &PoseDocument, index: usize, show_face: bool) -> bool {
    doc.is_visible(index) && (show_face || doc.schema().subset(index) != Subset::Face)
}

/// A bone resolved to canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneBone {
    /// First keypoint index.
    pub a: usize,
    /// Second keypoint index.
    pub b: usize,
    /// Canvas position of `a`.
    pub from: (f64, f64),
    /// Canvas position of `b`.
    pub to: (f64, f64),
    /// Stroke colour.
    pub color: Color,
}

/// What a marker stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    /// A document keypoint.
    Keypoint(usize),
    /// A cosmetic hand placeholder around a wrist keypoint.
    Hand {
        /// Wrist keypoint index.
        wrist: usize,
    },
}

/// A filled circle resolved to canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneMarker {
    /// Keypoint or placeholder.
    pub kind: MarkerKind,
    /// Canvas position.
    pub center: (f64, f64),
    /// Radius in canvas pixels.
    pub radius: f64,
    /// Fill colour.
    pub color: Color,
}

/// Everything one render draws, in drawing order.
#[derive(Debug, Clone, PartialEq)]
pub struct SkeletonScene {
    /// Canvas width.
    pub width: u32,
    /// Canvas height.
    pub height: u32,
    /// Image-to-canvas mapping used.
    pub viewport: EditorViewport,
    /// Bones, drawn first.
    pub bones: Vec<SceneBone>,
    /// Keypoint markers, then hand placeholders.
    pub markers: Vec<SceneMarker>,
}

impl SkeletonScene {
    /// Keypoint indices that received a marker.
    pub fn keypoint_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.markers.iter().filter_map(|m| match m.kind {
            MarkerKind::Keypoint(i) => Some(i),
            MarkerKind::Hand { .. } => None,
        })
    }
}

/// Draws skeletons locally, without the rendering service.
#[derive(Debug, Clone)]
pub struct LocalRenderer {
    style: RenderStyle,
    show_face: bool,
    show_hands: bool,
    target: Option<(EditorViewport, ViewportSize)>,
}

impl Default for LocalRenderer {
    fn default() -> Self {
        Self::new(RenderStyle::default())
    }
}

impl LocalRenderer {
    /// Renderer drawing in image space with the face layer on and hands off.
    #[must_use]
    pub const fn new(style: RenderStyle) -> Self {
        Self {
            style,
            show_face: true,
            show_hands: false,
            target: None,
        }
    }

    /// Renderer matching an editor configuration.
    #[must_use]
    pub const fn from_config(config: &EditorConfig) -> Self {
        Self::new(config.style)
            .with_face(config.show_face)
            .with_hands(config.show_hands)
    }

    /// Toggle the face layer.
    #[must_use]
    pub const fn with_face(mut self, enabled: bool) -> Self {
        self.show_face = enabled;
        self
    }

    /// Toggle the hand placeholders.
    #[must_use]
    pub const fn with_hands(mut self, enabled: bool) -> Self {
        self.show_hands = enabled;
        self
    }

    /// Draw through `viewport` onto a canvas of `canvas` display pixels.
    #[must_use]
    pub const fn with_viewport(mut self, viewport: EditorViewport, canvas: ViewportSize) -> Self {
        self.target = Some((viewport, canvas));
        self
    }

    /// Draw in image space on a canvas the size of the source image.
    #[must_use]
    pub const fn in_image_space(mut self) -> Self {
        self.target = None;
        self
    }

    /// Drawing style.
    #[must_use]
    pub const fn style(&self) -> &RenderStyle {
        &self.style
    }

    /// Resolve what to draw for `doc`.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn scene(&self, doc: &PoseDocument) -> SkeletonScene {
        let (viewport, width, height) = match self.target {
            Some((vp, canvas)) => (
                vp,
                canvas.width.round().max(1.0) as u32,
                canvas.height.round().max(1.0) as u32,
            ),
            None => {
                let info = doc.image_info();
                (EditorViewport::IDENTITY, info.width, info.height)
            }
        };

        let schema = doc.schema();
        let shown = |i: usize| is_displayed(doc, i, self.show_face);
        let at = |i: usize| {
            let kp = doc.keypoints()[i];
            viewport.to_display(kp.x, kp.y)
        };

        let bones = schema
            .bones
            .iter()
            .filter(|b| shown(b.a) && shown(b.b))
            .map(|b| SceneBone {
                a: b.a,
                b: b.b,
                from: at(b.a),
                to: at(b.b),
                color: if self.style.limb_palette {
                    Color::from_pose_index(b.color)
                } else {
                    self.style.skeleton_color
                },
            })
            .collect();

        let radius = f64::from(self.style.point_radius);
        let mut markers: Vec<SceneMarker> = (0..doc.len())
            .filter(|&i| shown(i))
            .map(|i| SceneMarker {
                kind: MarkerKind::Keypoint(i),
                center: at(i),
                radius,
                color: if self.style.limb_palette {
                    Color::from_pose_index(schema.keypoint_colors[i])
                } else {
                    self.style.point_color
                },
            })
            .collect();

        if self.show_hands {
            for &wrist in schema.wrists.iter().filter(|&&w| shown(w)) {
                let (cx, cy) = at(wrist);
                markers.extend((0..HAND_MARKER_COUNT).map(|k| {
                    let angle = TAU * k as f64 / HAND_MARKER_COUNT as f64;
                    SceneMarker {
                        kind: MarkerKind::Hand { wrist },
                        center: (
                            angle.cos().mul_add(HAND_MARKER_DISTANCE, cx),
                            angle.sin().mul_add(HAND_MARKER_DISTANCE, cy),
                        ),
                        radius: (radius / 2.0).max(1.0),
                        color: self.style.point_color,
                    }
                }));
            }
        }

        SkeletonScene {
            width,
            height,
            viewport,
            bones,
            markers,
        }
    }

    /// Draw a scene, over an optional background image placed by the scene's viewport.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn rasterize(
        &self,
        scene: &SkeletonScene,
        background: Option<&DynamicImage>,
        image_size: (u32, u32),
    ) -> RgbaImage {
        let mut canvas =
            RgbaImage::from_pixel(scene.width, scene.height, self.style.background.to_rgba());

        if let Some((visible, x, y)) =
            background.and_then(|bg| visible_background(bg, scene, image_size))
        {
            imageops::overlay(&mut canvas, &visible, x, y);
        }

        for bone in &scene.bones {
            draw_thick_line(
                &mut canvas,
                bone.from,
                bone.to,
                self.style.line_width,
                bone.color.to_rgba(),
            );
        }
        for marker in &scene.markers {
            draw_filled_circle_mut(
                &mut canvas,
                (marker.center.0.round() as i32, marker.center.1.round() as i32),
                marker.radius.round() as i32,
                marker.color.to_rgba(),
            );
        }
        canvas
    }
}

impl Renderer for LocalRenderer {
    fn name(&self) -> &'static str {
        "local"
    }

    fn render(&self, doc: &PoseDocument, background: Option<&DynamicImage>) -> Result<RasterImage> {
        let info = doc.image_info();
        if !info.is_valid() {
            return Err(PoseError::InvalidImageInfo {
                width: info.width,
                height: info.height,
            });
        }
        let scene = self.scene(doc);
        Ok(self.rasterize(&scene, background, (info.width, info.height)))
    }
}

/// The part of `background` the scene's canvas can see, scaled to display pixels, with its
/// canvas origin. `background` is stretched over an image of `image_size` pixels.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn visible_background(
    background: &DynamicImage,
    scene: &SkeletonScene,
    image_size: (u32, u32),
) -> Option<(RgbaImage, i64, i64)> {
    let vp = scene.viewport;
    let (bw, bh) = (f64::from(background.width()), f64::from(background.height()));
    let sx = bw / f64::from(image_size.0.max(1));
    let sy = bh / f64::from(image_size.1.max(1));

    // Canvas corners in background pixels, clamped to the background.
    let (ix0, iy0) = vp.to_image(0.0, 0.0);
    let (ix1, iy1) = vp.to_image(f64::from(scene.width), f64::from(scene.height));
    let x0 = (ix0 * sx).floor().clamp(0.0, bw) as u32;
    let y0 = (iy0 * sy).floor().clamp(0.0, bh) as u32;
    let x1 = (ix1 * sx).ceil().clamp(0.0, bw) as u32;
    let y1 = (iy1 * sy).ceil().clamp(0.0, bh) as u32;
    if x1 <= x0 || y1 <= y0 {
        return None;
    }

    let (dx0, dy0) = vp.to_display(f64::from(x0) / sx, f64::from(y0) / sy);
    let (dx1, dy1) = vp.to_display(f64::from(x1) / sx, f64::from(y1) / sy);
    let (ox, oy) = (dx0.round() as i64, dy0.round() as i64);
    let w = (dx1.round() as i64 - ox).max(1) as u32;
    let h = (dy1.round() as i64 - oy).max(1) as u32;

    let crop = background.crop_imm(x0, y0, x1 - x0, y1 - y0).to_rgba8();
    let visible = if crop.dimensions() == (w, h) {
        crop
    } else {
        imageops::resize(&crop, w, h, imageops::FilterType::Triangle)
    };
    Some((visible, ox, oy))
}

/// Draw a line `width` pixels wide as parallel one-pixel segments.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn draw_thick_line(canvas: &mut RgbaImage, from: (f64, f64), to: (f64, f64), width: u32, color: Rgba<u8>) {
    let (x0, y0) = (from.0 as f32, from.1 as f32);
    let (x1, y1) = (to.0 as f32, to.1 as f32);
    let len = (x1 - x0).hypot(y1 - y0);
    if width <= 1 || len <= f32::EPSILON {
        draw_line_segment_mut(canvas, (x0, y0), (x1, y1), color);
        return;
    }
    let (nx, ny) = (-(y1 - y0) / len, (x1 - x0) / len);
    let half = (width - 1) as f32 / 2.0;
    for t in 0..width {
        let off = t as f32 - half;
        draw_line_segment_mut(
            canvas,
            (nx.mul_add(off, x0), ny.mul_add(off, y0)),
            (nx.mul_add(off, x1), ny.mul_add(off, y1)),
            color,
        );
    }
}
