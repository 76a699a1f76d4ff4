// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Pointer-driven keypoint editing.
//!
//! [`Editor`] is a small state machine (`Idle` / `Dragging(index)`) fed with
//! [`EditorEvent`]s in display coordinates. It owns the viewport and mutates the
//! [`PoseDocument`] it is handed, one update per event, in input order.

use crate::config::EditorConfig;
use crate::error::Result;
use crate::pose::{ImageInfo, PoseDocument};
use crate::transform::{EditorViewport, ViewportSize};
use crate::verbose;
use crate::visualizer::skeleton::is_displayed;

/// Drag state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditorState {
    /// No keypoint grabbed.
    #[default]
    Idle,
    /// Keypoint at this index follows the pointer.
    Dragging(usize),
}

/// Input to the editor. Coordinates are display pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EditorEvent {
    /// Pointer pressed.
    PointerDown {
        /// Display x.
        x: f64,
        /// Display y.
        y: f64,
    },
    /// Pointer moved.
    PointerMove {
        /// Display x.
        x: f64,
        /// Display y.
        y: f64,
    },
    /// Pointer released.
    PointerUp,
    /// Abort the current drag (Escape). The keypoint stays where it was moved.
    Cancel,
    /// Zoom in by the configured step around the canvas centre.
    ZoomIn,
    /// Zoom out by the configured step around the canvas centre.
    ZoomOut,
    /// Zoom by `factor` keeping the display point `(x, y)` fixed.
    ZoomAt {
        /// Multiplicative factor.
        factor: f64,
        /// Anchor x.
        x: f64,
        /// Anchor y.
        y: f64,
    },
    /// Fit the whole image in the canvas.
    FitToView,
    /// Shift the view.
    Pan {
        /// Display delta x.
        dx: f64,
        /// Display delta y.
        dy: f64,
    },
    /// Canvas resized.
    Resize {
        /// New width.
        width: f64,
        /// New height.
        height: f64,
    },
    /// Restore the document from its original snapshot.
    Reset,
}

/// Effect of one event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EditorOutcome {
    /// Nothing changed.
    Ignored,
    /// A keypoint was grabbed.
    DragStarted(usize),
    /// A keypoint moved to a new image position.
    KeypointMoved {
        /// Keypoint index.
        index: usize,
        /// Image x.
        x: f64,
        /// Image y.
        y: f64,
    },
    /// The drag finished normally.
    DragEnded(usize),
    /// The drag was aborted.
    DragCancelled(usize),
    /// Only the viewport changed.
    ViewportChanged,
    /// The document was restored.
    DocumentReset,
}

/// Keypoint drag editor.
#[derive(Debug, Clone)]
pub struct Editor {
    state: EditorState,
    viewport: EditorViewport,
    canvas: ViewportSize,
    image: ImageInfo,
    hit_radius: f64,
    zoom_step: f64,
    min_scale: f64,
    max_scale: f64,
    show_face: bool,
}

impl Editor {
    /// Create an editor whose viewport fits `image` into `canvas`.
    #[must_use]
    pub fn new(config: &EditorConfig, image: ImageInfo, canvas: ViewportSize) -> Self {
        Self {
            state: EditorState::Idle,
            viewport: EditorViewport::fit(image, canvas),
            canvas,
            image,
            hit_radius: config.hit_radius(),
            zoom_step: config.zoom_step,
            min_scale: config.min_scale,
            max_scale: config.max_scale,
            show_face: config.show_face,
        }
    }

    /// Replace the viewport.
    #[must_use]
    pub const fn with_viewport(mut self, viewport: EditorViewport) -> Self {
        self.viewport = viewport;
        self
    }

    /// Current drag state.
    #[must_use]
    pub const fn state(&self) -> EditorState {
        self.state
    }

    /// Current viewport.
    #[must_use]
    pub const fn viewport(&self) -> EditorViewport {
        self.viewport
    }

    /// Current canvas size.
    #[must_use]
    pub const fn canvas(&self) -> ViewportSize {
        self.canvas
    }

    /// Nearest displayed keypoint within the hit radius of a display point.
    /// Ties go to the lowest index.
    #[must_use]
    pub fn hit_test(&self, doc: &PoseDocument, x: f64, y: f64) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, kp) in doc.keypoints().iter().enumerate() {
            if !is_displayed(doc, i, self.show_face) {
                continue;
            }
            let (dx, dy) = self.viewport.to_display(kp.x, kp.y);
            let dist = (dx - x).hypot(dy - y);
            if dist <= self.hit_radius && best.is_none_or(|(_, d)| dist < d) {
                best = Some((i, dist));
            }
        }
        best.map(|(i, _)| i)
    }

    /// Apply one event. Pointer, pan and zoom events with non-finite coordinates are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::InvalidViewport`](crate::PoseError::InvalidViewport) for a resize to
    /// a non-positive size; editor and document are left unchanged.
    pub fn handle(&mut self, doc: &mut PoseDocument, event: EditorEvent) -> Result<EditorOutcome> {
        let outcome = match (event, self.state) {
            (EditorEvent::PointerDown { x, y }, EditorState::Idle) => match self.hit_test(doc, x, y) {
                Some(index) => {
                    verbose!("Grabbed keypoint {index} ({})", doc.schema().names[index]);
                    self.state = EditorState::Dragging(index);
                    EditorOutcome::DragStarted(index)
                }
                None => EditorOutcome::Ignored,
            },
            (EditorEvent::PointerMove { x, y }, EditorState::Dragging(index)) => {
                let (ix, iy) = self.viewport.to_image(x, y);
                if ix.is_finite() && iy.is_finite() {
                    doc.set_keypoint(index, ix, iy)?;
                    EditorOutcome::KeypointMoved { index, x: ix, y: iy }
                } else {
                    EditorOutcome::Ignored
                }
            }
            (EditorEvent::PointerUp, EditorState::Dragging(index)) => {
                self.state = EditorState::Idle;
                EditorOutcome::DragEnded(index)
            }
            (EditorEvent::Cancel, EditorState::Dragging(index)) => {
                self.state = EditorState::Idle;
                EditorOutcome::DragCancelled(index)
            }
            (EditorEvent::ZoomIn, _) => self.zoom(self.zoom_step, self.canvas.center()),
            (EditorEvent::ZoomOut, _) => self.zoom(1.0 / self.zoom_step, self.canvas.center()),
            (EditorEvent::ZoomAt { factor, x, y }, _) => {
                if factor.is_finite() && factor > 0.0 && x.is_finite() && y.is_finite() {
                    self.zoom(factor, (x, y))
                } else {
                    EditorOutcome::Ignored
                }
            }
            (EditorEvent::FitToView, _) => {
                self.viewport = EditorViewport::fit(self.image, self.canvas);
                EditorOutcome::ViewportChanged
            }
            (EditorEvent::Pan { dx, dy }, _) => {
                if dx.is_finite() && dy.is_finite() {
                    self.viewport = self.viewport.panned(dx, dy);
                    EditorOutcome::ViewportChanged
                } else {
                    EditorOutcome::Ignored
                }
            }
            (EditorEvent::Resize { width, height }, _) => {
                self.canvas = ViewportSize::new(width, height)?;
                EditorOutcome::ViewportChanged
            }
            (EditorEvent::Reset, _) => {
                doc.reset();
                self.state = EditorState::Idle;
                EditorOutcome::DocumentReset
            }
            (
                EditorEvent::PointerDown { .. }
                | EditorEvent::PointerMove { .. }
                | EditorEvent::PointerUp
                | EditorEvent::Cancel,
                _,
            ) => EditorOutcome::Ignored,
        };
        Ok(outcome)
    }

    /// Apply events in order.
    ///
    /// # Errors
    ///
    /// Stops at the first failing event; earlier events stay applied.
    pub fn dispatch<I>(&mut self, doc: &mut PoseDocument, events: I) -> Result<Vec<EditorOutcome>>
    where
        I: IntoIterator<Item = EditorEvent>,
    {
        events.into_iter().map(|e| self.handle(doc, e)).collect()
    }

    fn zoom(&mut self, factor: f64, anchor: (f64, f64)) -> EditorOutcome {
        self.viewport = self
            .viewport
            .zoom_about(factor, anchor, self.min_scale, self.max_scale);
        EditorOutcome::ViewportChanged
    }
}
