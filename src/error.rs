// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Error types for the pose editor.

use std::fmt;

/// Result type alias for pose editing operations.
pub type Result<T> = std::result::Result<T, PoseError>;

/// Main error type for the pose editor.
///
/// Local validation errors (`SchemaMismatch`, `InvalidConfidence`, `InvalidCoordinate`,
/// `IndexOutOfRange`, `UnknownSchema`, `InvalidImageInfo`, `InvalidViewport`) fail the offending call only.
/// Remote errors are recoverable: callers fall back to the local renderer or report the
/// failure and return to idle.
#[derive(Debug)]
pub enum PoseError {
    /// Keypoint count does not match the schema.
    SchemaMismatch {
        /// Keypoints required by the schema.
        expected: usize,
        /// Keypoints supplied.
        actual: usize,
    },
    /// A confidence value lies outside `[0, 1]`.
    InvalidConfidence {
        /// Keypoint index.
        index: usize,
        /// Offending value.
        value: f32,
    },
    /// A keypoint coordinate is NaN or infinite.
    InvalidCoordinate {
        /// Keypoint index.
        index: usize,
        /// Offending x.
        x: f64,
        /// Offending y.
        y: f64,
    },
    /// Keypoint index outside the document.
    IndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of keypoints.
        len: usize,
    },
    /// Schema id not present in the registry.
    UnknownSchema(String),
    /// Image dimensions must both be non-zero.
    InvalidImageInfo {
        /// Width in pixels.
        width: u32,
        /// Height in pixels.
        height: u32,
    },
    /// Viewport scale or size is not positive and finite.
    InvalidViewport(String),
    /// The detection service failed or answered `success: false`.
    DetectionServiceError(String),
    /// The skeleton rendering service failed or answered `success: false`.
    RenderServiceError(String),
    /// A returned raster could not be decoded.
    ImageDecodeError(String),
    /// Neither the remote nor the local renderer produced an image.
    NoRenderer(String),
    /// Malformed pose JSON or wire payload.
    ParseError(String),
    /// Invalid configuration provided.
    ConfigError(String),
    /// Wrapped `std::io::Error`
    Io(std::io::Error),
}

impl PoseError {
    /// Whether this error came from the remote service path.
    ///
    /// Decode failures of returned rasters count as remote failures.
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        matches!(
            self,
            Self::DetectionServiceError(_) | Self::RenderServiceError(_) | Self::ImageDecodeError(_)
        )
    }
}

impl fmt::Display for PoseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SchemaMismatch { expected, actual } => {
                write!(f, "Schema mismatch: expected {expected} keypoints, got {actual}")
            }
            Self::InvalidConfidence { index, value } => {
                write!(f, "Invalid confidence: keypoint {index} has {value} (must be in [0, 1])")
            }
            Self::InvalidCoordinate { index, x, y } => {
                write!(f, "Invalid coordinate: keypoint {index} at ({x}, {y}) must be finite")
            }
            Self::IndexOutOfRange { index, len } => {
                write!(f, "Index out of range: keypoint {index} (document has {len})")
            }
            Self::UnknownSchema(id) => write!(f, "Unknown schema: {id}"),
            Self::InvalidImageInfo { width, height } => {
                write!(f, "Invalid image info: {width}x{height}")
            }
            Self::InvalidViewport(msg) => write!(f, "Invalid viewport: {msg}"),
            Self::DetectionServiceError(msg) => write!(f, "Detection service error: {msg}"),
            Self::RenderServiceError(msg) => write!(f, "Render service error: {msg}"),
            Self::ImageDecodeError(msg) => write!(f, "Image decode error: {msg}"),
            Self::NoRenderer(msg) => write!(f, "No renderer available: {msg}"),
            Self::ParseError(msg) => write!(f, "Parse error: {msg}"),
            Self::ConfigError(msg) => write!(f, "Config error: {msg}"),
            Self::Io(err) => write!(f, "IO error: {err}"),
        }
    }
}

impl std::error::Error for PoseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PoseError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<image::ImageError> for PoseError {
    fn from(err: image::ImageError) -> Self {
        Self::ImageDecodeError(err.to_string())
    }
}

impl From<base64::DecodeError> for PoseError {
    fn from(err: base64::DecodeError) -> Self {
        Self::ImageDecodeError(err.to_string())
    }
}

impl From<serde_json::Error> for PoseError {
    fn from(err: serde_json::Error) -> Self {
        Self::ParseError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PoseError::SchemaMismatch {
            expected: 18,
            actual: 17,
        };
        assert_eq!(err.to_string(), "Schema mismatch: expected 18 keypoints, got 17");

        let err = PoseError::UnknownSchema("hand_21".to_string());
        assert_eq!(err.to_string(), "Unknown schema: hand_21");
    }

    #[test]
    fn test_remote_classification() {
        assert!(PoseError::RenderServiceError("500".into()).is_remote());
        assert!(PoseError::ImageDecodeError("bad png".into()).is_remote());
        assert!(!PoseError::IndexOutOfRange { index: 3, len: 2 }.is_remote());
        assert!(!PoseError::NoRenderer("none".into()).is_remote());
    }
}
