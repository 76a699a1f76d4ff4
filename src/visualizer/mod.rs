// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Skeleton drawing: colours and the local vector renderer.

/// Color definitions and palettes.
pub mod color;
/// Local skeleton renderer.
pub mod skeleton;

pub use color::{Background, Color};
pub use skeleton::{LocalRenderer, MarkerKind, SceneBone, SceneMarker, SkeletonScene};
