// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Wire types exchanged with the pose detection and rendering service.
//!
//! Images travel as base64-encoded PNG (see [`crate::io`]).

use serde::{Deserialize, Serialize};

use crate::error::{PoseError, Result};
use crate::io::decode_image_base64;
use crate::pose::{ImageInfo, PoseDocument};

/// A pose on the wire: flat `[x0, y0, c0, x1, y1, c1, ...]` in schema order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseData {
    /// Flat keypoint triples in image-pixel space.
    pub keypoints: Vec<f64>,
    /// Source image dimensions.
    pub image_info: ImageInfo,
}

/// Detection parameters forwarded to the detection service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionParams {
    /// Minimum keypoint confidence kept by the detector.
    pub confidence_threshold: f32,
    /// Marker radius in the processed image.
    pub keypoint_thickness: u32,
    /// Bone width in the processed image.
    pub skeleton_thickness: u32,
    /// Include face keypoints.
    #[serde(default)]
    pub detect_face: bool,
    /// Include hand keypoints.
    #[serde(default)]
    pub detect_hand: bool,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.3,
            keypoint_thickness: 4,
            skeleton_thickness: 2,
            detect_face: true,
            detect_hand: false,
        }
    }
}

/// Body of a detection request.
#[derive(Debug, Clone, Serialize)]
pub struct DetectionRequest {
    /// Encoded source image.
    pub image: String,
    /// Model / schema identifier.
    pub model: String,
    /// Detection parameters.
    pub params: DetectionParams,
}

/// Body of a detection response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetectionResponse {
    /// Whether detection succeeded.
    pub success: bool,
    /// Encoded processed image.
    #[serde(default)]
    pub processed_image: Option<String>,
    /// Error message when `success` is false.
    #[serde(default)]
    pub error: Option<String>,
    /// Server-side processing time in seconds.
    #[serde(default)]
    pub processing_time: Option<f64>,
}

impl DetectionResponse {
    /// Decode the processed image.
    ///
    /// # Errors
    ///
    /// [`PoseError::DetectionServiceError`] for `success: false` or a missing image,
    /// [`PoseError::ImageDecodeError`] if the image cannot be decoded.
    pub fn into_image(self) -> Result<image::DynamicImage> {
        if !self.success {
            return Err(PoseError::DetectionServiceError(
                self.error.unwrap_or_else(|| "detection failed".to_string()),
            ));
        }
        let encoded = self.processed_image.ok_or_else(|| {
            PoseError::DetectionServiceError("response has no processed_image".to_string())
        })?;
        decode_image_base64(&encoded)
    }
}

/// Drawing parameters for the skeleton rendering service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderParameters {
    /// Bone colour name (e.g. `white`) or `#rrggbb`.
    pub skeleton_color: String,
    /// Marker colour name or `#rrggbb`.
    pub point_color: String,
    /// Background colour name, `#rrggbb` or `transparent`.
    pub background_color: String,
    /// Bone width in pixels.
    pub line_width: u32,
    /// Marker radius in pixels.
    pub point_radius: u32,
}

/// Body of a skeleton render request.
#[derive(Debug, Clone, Serialize)]
pub struct SkeletonRenderRequest {
    /// Pose to draw.
    pub pose_data: PoseData,
    /// Output width.
    pub image_width: u32,
    /// Output height.
    pub image_height: u32,
    /// Drawing parameters.
    pub parameters: RenderParameters,
}

impl SkeletonRenderRequest {
    /// Request rendering `doc` at its source image size.
    #[must_use]
    pub fn for_document(doc: &PoseDocument, parameters: RenderParameters) -> Self {
        let info = doc.image_info();
        Self {
            pose_data: doc.to_pose_data(),
            image_width: info.width,
            image_height: info.height,
            parameters,
        }
    }
}

/// Body of a skeleton render response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SkeletonRenderResponse {
    /// Whether rendering succeeded.
    pub success: bool,
    /// Encoded skeleton raster.
    #[serde(default)]
    pub skeleton_image: Option<String>,
    /// Error message when `success` is false.
    #[serde(default)]
    pub error: Option<String>,
    /// Server-side processing time in seconds.
    #[serde(default)]
    pub processing_time: Option<f64>,
}

impl SkeletonRenderResponse {
    /// Decode the skeleton raster.
    ///
    /// # Errors
    ///
    /// [`PoseError::RenderServiceError`] for `success: false` or a missing image,
    /// [`PoseError::ImageDecodeError`] if the image cannot be decoded.
    pub fn into_image(self) -> Result<image::DynamicImage> {
        if !self.success {
            return Err(PoseError::RenderServiceError(
                self.error.unwrap_or_else(|| "skeleton rendering failed".to_string()),
            ));
        }
        let encoded = self.skeleton_image.ok_or_else(|| {
            PoseError::RenderServiceError("response has no skeleton_image".to_string())
        })?;
        decode_image_base64(&encoded)
    }
}

/// Body of a pose extraction request.
#[derive(Debug, Clone, Serialize)]
pub struct PoseExtractRequest {
    /// Encoded source image.
    pub image: String,
    /// Processor id on the service (e.g. `dwpose`).
    pub processor: String,
    /// Free-form processor parameters.
    pub parameters: serde_json::Map<String, serde_json::Value>,
}

/// Body of a pose extraction response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PoseExtractResponse {
    /// Whether extraction succeeded.
    pub success: bool,
    /// Extracted poses.
    #[serde(default)]
    pub pose_data: Option<OpenPoseFrame>,
    /// Error message when `success` is false.
    #[serde(default)]
    pub error: Option<String>,
}

impl PoseExtractResponse {
    /// Take the extracted frame.
    ///
    /// # Errors
    ///
    /// [`PoseError::DetectionServiceError`] for `success: false` or a missing frame.
    pub fn into_frame(self) -> Result<OpenPoseFrame> {
        if !self.success {
            return Err(PoseError::DetectionServiceError(
                self.error.unwrap_or_else(|| "pose extraction failed".to_string()),
            ));
        }
        self.pose_data.ok_or_else(|| {
            PoseError::DetectionServiceError("response has no pose_data".to_string())
        })
    }
}

/// One person in an OpenPose-style frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpenPosePerson {
    /// Flat body keypoint triples.
    #[serde(default)]
    pub pose_keypoints_2d: Vec<f64>,
    /// Flat face keypoint triples (not edited).
    #[serde(default)]
    pub face_keypoints_2d: Vec<f64>,
    /// Flat left-hand keypoint triples (not edited).
    #[serde(default)]
    pub hand_left_keypoints_2d: Vec<f64>,
    /// Flat right-hand keypoint triples (not edited).
    #[serde(default)]
    pub hand_right_keypoints_2d: Vec<f64>,
}

/// OpenPose-style multi-person frame as returned by the extraction endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpenPoseFrame {
    /// Detected people.
    #[serde(default)]
    pub people: Vec<OpenPosePerson>,
    /// Canvas width in pixels.
    pub canvas_width: u32,
    /// Canvas height in pixels.
    pub canvas_height: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pose_data_wire_shape() {
        let data = PoseData {
            keypoints: vec![1.0, 2.0, 0.5],
            image_info: ImageInfo {
                width: 640,
                height: 480,
            },
        };
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "keypoints": [1.0, 2.0, 0.5],
                "image_info": { "width": 640, "height": 480 }
            })
        );
    }

    #[test]
    fn test_failed_render_response() {
        let response: SkeletonRenderResponse =
            serde_json::from_str(r#"{"success": false, "error": "out of memory"}"#).unwrap();
        match response.into_image() {
            Err(PoseError::RenderServiceError(msg)) => assert_eq!(msg, "out of memory"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_successful_response_without_image() {
        let response: DetectionResponse = serde_json::from_str(r#"{"success": true}"#).unwrap();
        assert!(matches!(
            response.into_image(),
            Err(PoseError::DetectionServiceError(_))
        ));
    }

    #[test]
    fn test_malformed_image_is_decode_error() {
        let response = SkeletonRenderResponse {
            success: true,
            skeleton_image: Some("bm90IGFuIGltYWdl".to_string()),
            ..Default::default()
        };
        let err = response.into_image().unwrap_err();
        assert!(matches!(err, PoseError::ImageDecodeError(_)));
        assert!(err.is_remote());
    }

    #[test]
    fn test_openpose_frame_defaults() {
        let frame: OpenPoseFrame = serde_json::from_str(
            r#"{"people": [{"pose_keypoints_2d": [0.5, 0.5, 0.9]}], "canvas_width": 10, "canvas_height": 20}"#,
        )
        .unwrap();
        assert_eq!(frame.people.len(), 1);
        assert!(frame.people[0].face_keypoints_2d.is_empty());
    }
}
