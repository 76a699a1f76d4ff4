// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

#![allow(clippy::multiple_crate_versions)]

//! # Pose Editor
//!
//! Core of an interactive pose skeleton editor: inspect a machine-detected human pose
//! overlaid on its source image, drag keypoints to correct it, re-render the skeleton and
//! hand the result to a host canvas.
//!
//! ## Features
//!
//! - **Keypoint Schemas** - 18-point OpenPose body and 17-point COCO, with bone graph and palette
//! - **Viewport Transforms** - Image ⇄ display mapping with fit, zoom about a point and pan
//! - **Drag Editing** - Event-driven hit testing and drag state machine, reset to the original
//! - **Two Render Paths** - Remote AI rendering with automatic local vector fallback
//! - **Single-Flight Apply** - Request ids, stale response handling and an injected host canvas
//! - **Wire Format** - JSON pose documents compatible with the detection service
//!
//! ## Quick Start (Library)
//!
//! ```no_run
//! use pose_editor::{EditSession, EditorConfig, EditorEvent, ViewportSize, io};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let doc = io::load_pose("pose.json", None)?;
//!     println!("{} of {} keypoints visible", doc.count_visible(), doc.len());
//!
//!     let mut session = EditSession::open(doc, &EditorConfig::default(), ViewportSize::new(800.0, 600.0)?);
//!     session.handle_event(EditorEvent::PointerDown { x: 110.0, y: 110.0 })?;
//!     session.handle_event(EditorEvent::PointerMove { x: 160.0, y: 160.0 })?;
//!     session.handle_event(EditorEvent::PointerUp)?;
//!
//!     let preview = session.render_preview()?;
//!     preview.image.save("preview.png")?;
//!     io::save_pose(&session.close(), "edited.json")?;
//!     Ok(())
//! }
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! # Draw a pose over its source image
//! pose-editor render --pose pose.json --image photo.jpg
//!
//! # Move keypoint 3 and write the edited pose
//! pose-editor edit --pose pose.json --op 3=300,300 --output edited.json
//!
//! # Render remotely and place the result on a canvas file
//! pose-editor apply --pose edited.json --output applied.png --service http://127.0.0.1:8000
//! ```
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`topology`] | Keypoint schemas ([`KeypointSchema`], [`get_schema`]) |
//! | [`pose`] | Pose documents ([`PoseDocument`], [`Keypoint`], [`ImageInfo`]) |
//! | [`transform`] | Image ⇄ display mapping ([`EditorViewport`]) |
//! | [`editor`] | Hit testing and drag state machine ([`Editor`], [`EditorEvent`]) |
//! | [`render`] | Remote-first render pipeline ([`RenderPipeline`]) |
//! | [`visualizer`] | Local skeleton renderer and colours ([`LocalRenderer`]) |
//! | [`apply`] | Single-flight apply ([`ApplyPipeline`], [`HostCanvas`]) |
//! | [`session`] | Editing sessions ([`EditSession`]) |
//! | [`client`] | Pose service client ([`PoseService`], [`HttpPoseService`]) |
//! | [`api`] | Service wire types |
//! | [`config`] | Configuration ([`EditorConfig`], [`RenderStyle`], [`ServiceConfig`]) |
//! | [`io`] | Pose JSON and base64 image helpers |
//! | [`error`] | Error types ([`PoseError`], [`Result`]) |
//!
//! ## License
//!
//! This project is licensed under [AGPL-3.0](https://ultralytics.com/license).

// Modules
pub mod api;
pub mod apply;
pub mod cli;
pub mod client;
pub mod config;
pub mod editor;
pub mod error;
pub mod io;
pub mod pose;
pub mod render;
pub mod session;
pub mod topology;
pub mod transform;
pub mod visualizer;

// Re-export main types for convenience
pub use apply::{ApplyOutcome, ApplyPipeline, ApplyState, FileCanvas, HostCanvas, RequestId};
pub use client::{HttpPoseService, PoseService};
pub use config::{EditorConfig, RenderStyle, ServiceConfig};
pub use editor::{Editor, EditorEvent, EditorOutcome, EditorState};
pub use error::{PoseError, Result};
pub use pose::{ImageInfo, Keypoint, PoseDocument};
pub use render::{RasterImage, RemoteRenderer, RenderOutput, RenderPipeline, RenderSource, Renderer};
pub use session::{EditSession, SessionUpdate};
pub use topology::{KeypointSchema, Subset, get_schema};
pub use transform::{EditorViewport, ViewportSize};
pub use visualizer::{Background, Color, LocalRenderer};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(VERSION.contains('.'));
    }

    #[test]
    fn test_name() {
        assert_eq!(NAME, "pose-editor");
    }
}
