// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Editor, rendering and service configuration.
//!
//! All configuration structs use a builder pattern:
//!
//! ```rust
//! use pose_editor::{EditorConfig, RenderStyle};
//!
//! let config = EditorConfig::new()
//!     .with_visibility_threshold(0.4)
//!     .with_face(false)
//!     .with_style(RenderStyle::new().with_point_radius(6));
//! assert!((config.hit_radius() - 6.0).abs() < f64::EPSILON);
//! ```

use std::env;
use std::time::Duration;

use crate::api::{DetectionParams, RenderParameters};
use crate::pose::DEFAULT_VISIBILITY_THRESHOLD;
use crate::visualizer::color::{Background, Color};
use crate::warn;

/// Environment variable holding the service base URL.
pub const SERVICE_URL_ENV: &str = "POSE_SERVICE_URL";

/// Default service base URL.
pub const DEFAULT_SERVICE_URL: &str = "http://127.0.0.1:8000";

/// Default detection model id.
pub const DEFAULT_MODEL: &str = "dwpose";

/// How skeletons are drawn, locally or by the rendering service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderStyle {
    /// Bone colour.
    pub skeleton_color: Color,
    /// Marker colour.
    pub point_color: Color,
    /// Canvas fill.
    pub background: Background,
    /// Bone width in display pixels.
    pub line_width: u32,
    /// Marker radius in display pixels.
    pub point_radius: u32,
    /// Colour bones and markers from the pose palette instead of the flat colours.
    pub limb_palette: bool,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            skeleton_color: Color::WHITE,
            point_color: Color::RED,
            background: Background::Solid(Color::BLACK),
            line_width: 2,
            point_radius: 4,
            limb_palette: false,
        }
    }
}

impl RenderStyle {
    /// Create a style with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bone colour.
    #[must_use]
    pub const fn with_skeleton_color(mut self, color: Color) -> Self {
        self.skeleton_color = color;
        self
    }

    /// Set the marker colour.
    #[must_use]
    pub const fn with_point_color(mut self, color: Color) -> Self {
        self.point_color = color;
        self
    }

    /// Set the canvas fill.
    #[must_use]
    pub const fn with_background(mut self, background: Background) -> Self {
        self.background = background;
        self
    }

    /// Set the bone width.
    #[must_use]
    pub const fn with_line_width(mut self, width: u32) -> Self {
        self.line_width = width;
        self
    }

    /// Set the marker radius.
    #[must_use]
    pub const fn with_point_radius(mut self, radius: u32) -> Self {
        self.point_radius = radius;
        self
    }

    /// Toggle the pose palette.
    #[must_use]
    pub const fn with_limb_palette(mut self, enabled: bool) -> Self {
        self.limb_palette = enabled;
        self
    }

    /// Wire parameters for the rendering service.
    ///
    /// The service only knows [`Color::NAMED`]; other colours are sent as the nearest named
    /// colour, with a warning.
    #[must_use]
    pub fn to_parameters(&self) -> RenderParameters {
        RenderParameters {
            skeleton_color: service_color("skeleton", self.skeleton_color),
            point_color: service_color("point", self.point_color),
            background_color: match self.background {
                Background::Solid(color) => service_color("background", color),
                Background::Transparent => "transparent".to_string(),
            },
            line_width: self.line_width,
            point_radius: self.point_radius,
        }
    }
}

fn service_color(role: &str, color: Color) -> String {
    let (name, named) = color.nearest_named();
    if named != color {
        warn!("Rendering service has no {role} colour {color}, sending nearest '{name}'");
    }
    name.to_string()
}

/// Per-session editor configuration.
#[derive(Debug, Clone)]
pub struct EditorConfig {
    /// Minimum confidence (exclusive) for a keypoint to be displayed.
    pub visibility_threshold: f32,
    /// Pointer hit radius in display pixels. `None` uses the marker radius.
    pub hit_radius: Option<f64>,
    /// Multiplicative zoom step for zoom in / zoom out.
    pub zoom_step: f64,
    /// Smallest allowed viewport scale.
    pub min_scale: f64,
    /// Largest allowed viewport scale.
    pub max_scale: f64,
    /// Draw and hit-test the face subset.
    pub show_face: bool,
    /// Draw the hand placeholder markers.
    pub show_hands: bool,
    /// Use the remote renderer for previews.
    pub remote_preview: bool,
    /// Detection model id.
    pub model: String,
    /// Detection parameters for remote previews.
    pub detection: DetectionParams,
    /// Drawing style.
    pub style: RenderStyle,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            visibility_threshold: DEFAULT_VISIBILITY_THRESHOLD,
            hit_radius: None,
            zoom_step: 1.25,
            min_scale: 0.05,
            max_scale: 20.0,
            show_face: true,
            show_hands: false,
            remote_preview: false,
            model: DEFAULT_MODEL.to_string(),
            detection: DetectionParams::default(),
            style: RenderStyle::default(),
        }
    }
}

impl EditorConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Effective hit radius in display pixels.
    #[must_use]
    pub fn hit_radius(&self) -> f64 {
        self.hit_radius
            .unwrap_or_else(|| f64::from(self.style.point_radius))
    }

    /// Set the visibility threshold.
    #[must_use]
    pub const fn with_visibility_threshold(mut self, threshold: f32) -> Self {
        self.visibility_threshold = threshold;
        self
    }

    /// Set an explicit hit radius.
    #[must_use]
    pub const fn with_hit_radius(mut self, radius: f64) -> Self {
        self.hit_radius = Some(radius);
        self
    }

    /// Set the zoom step.
    #[must_use]
    pub const fn with_zoom_step(mut self, step: f64) -> Self {
        self.zoom_step = step;
        self
    }

    /// Toggle the face subset.
    #[must_use]
    pub const fn with_face(mut self, enabled: bool) -> Self {
        self.show_face = enabled;
        self
    }

    /// Toggle the hand placeholder markers.
    #[must_use]
    pub const fn with_hands(mut self, enabled: bool) -> Self {
        self.show_hands = enabled;
        self
    }

    /// Toggle remote previews.
    #[must_use]
    pub const fn with_remote_preview(mut self, enabled: bool) -> Self {
        self.remote_preview = enabled;
        self
    }

    /// Set the detection model id.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the detection parameters.
    #[must_use]
    pub fn with_detection(mut self, params: DetectionParams) -> Self {
        self.detection = params;
        self
    }

    /// Set the drawing style.
    #[must_use]
    pub const fn with_style(mut self, style: RenderStyle) -> Self {
        self.style = style;
        self
    }
}

/// Location and timeouts of the pose service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Base URL, without trailing slash.
    pub base_url: String,
    /// Detection endpoint path.
    pub detect_path: String,
    /// Skeleton render endpoint path.
    pub render_path: String,
    /// Pose extraction endpoint path.
    pub extract_path: String,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Response body timeout.
    pub read_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SERVICE_URL.to_string(),
            detect_path: "/api/pose/detect".to_string(),
            render_path: "/api/pose/render".to_string(),
            extract_path: "/api/pose/extract".to_string(),
            connect_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(300),
        }
    }
}

impl ServiceConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults, with the base URL taken from `POSE_SERVICE_URL` when set.
    #[must_use]
    pub fn from_env() -> Self {
        let config = Self::default();
        match env::var(SERVICE_URL_ENV) {
            Ok(url) if !url.trim().is_empty() => config.with_base_url(url),
            _ => config,
        }
    }

    /// Set the base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set both timeouts.
    #[must_use]
    pub const fn with_timeouts(mut self, connect: Duration, read: Duration) -> Self {
        self.connect_timeout = connect;
        self.read_timeout = read;
        self
    }

    /// Full URL of an endpoint path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}
