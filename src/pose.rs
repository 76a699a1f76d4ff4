// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! The mutable pose document edited by a session.
//!
//! Keypoints are stored in image-pixel space. Coordinates are deliberately not clamped to the
//! image bounds: low-confidence guesses may sit outside the frame.

use serde::{Deserialize, Serialize};

use crate::api::{OpenPoseFrame, PoseData};
use crate::error::{PoseError, Result};
use crate::topology::{self, KeypointSchema};

/// Default minimum confidence (exclusive) for a keypoint to count as visible.
pub const DEFAULT_VISIBILITY_THRESHOLD: f32 = 0.3;

/// Pixel dimensions of the source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl ImageInfo {
    /// Create validated image info.
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::InvalidImageInfo`] if either dimension is zero.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let info = Self { width, height };
        if info.is_valid() {
            Ok(info)
        } else {
            Err(PoseError::InvalidImageInfo { width, height })
        }
    }

    /// Whether both dimensions are non-zero.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// A single keypoint in image-pixel space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    /// X coordinate in pixels.
    pub x: f64,
    /// Y coordinate in pixels.
    pub y: f64,
    /// Detection confidence (0.0 - 1.0).
    pub confidence: f32,
}

impl Keypoint {
    /// Create a keypoint.
    #[must_use]
    pub const fn new(x: f64, y: f64, confidence: f32) -> Self {
        Self { x, y, confidence }
    }
}

/// One pose being edited.
#[derive(Debug, Clone)]
pub struct PoseDocument {
    schema: &'static KeypointSchema,
    keypoints: Vec<Keypoint>,
    original: Box<[Keypoint]>,
    image_info: ImageInfo,
    visibility_threshold: f32,
}

impl PoseDocument {
    /// Create a document, validating it against its schema.
    ///
    /// # Errors
    ///
    /// * [`PoseError::UnknownSchema`] if `schema_id` is not registered.
    /// * [`PoseError::SchemaMismatch`] if the keypoint count differs from the schema.
    /// * [`PoseError::InvalidConfidence`] if a confidence is outside `[0, 1]` or NaN.
    /// * [`PoseError::InvalidCoordinate`] if a coordinate is NaN or infinite.
    /// * [`PoseError::InvalidImageInfo`] if an image dimension is zero.
    pub fn create(schema_id: &str, keypoints: Vec<Keypoint>, image_info: ImageInfo) -> Result<Self> {
        let schema = topology::get_schema(schema_id)?;
        Self::with_schema(schema, keypoints, image_info)
    }

    /// Create a document for an already resolved schema.
    ///
    /// # Errors
    ///
    /// Same as [`PoseDocument::create`], minus the schema lookup.
    pub fn with_schema(
        schema: &'static KeypointSchema,
        keypoints: Vec<Keypoint>,
        image_info: ImageInfo,
    ) -> Result<Self> {
        if keypoints.len() != schema.len() {
            return Err(PoseError::SchemaMismatch {
                expected: schema.len(),
                actual: keypoints.len(),
            });
        }
        if let Some((index, kp)) = keypoints
            .iter()
            .enumerate()
            .find(|(_, kp)| !(0.0..=1.0).contains(&kp.confidence))
        {
            return Err(PoseError::InvalidConfidence {
                index,
                value: kp.confidence,
            });
        }
        if let Some((index, kp)) = keypoints
            .iter()
            .enumerate()
            .find(|(_, kp)| !(kp.x.is_finite() && kp.y.is_finite()))
        {
            return Err(PoseError::InvalidCoordinate {
                index,
                x: kp.x,
                y: kp.y,
            });
        }
        if !image_info.is_valid() {
            return Err(PoseError::InvalidImageInfo {
                width: image_info.width,
                height: image_info.height,
            });
        }

        Ok(Self {
            schema,
            original: keypoints.clone().into_boxed_slice(),
            keypoints,
            image_info,
            visibility_threshold: DEFAULT_VISIBILITY_THRESHOLD,
        })
    }

    /// Use a different visibility threshold.
    #[must_use]
    pub fn with_visibility_threshold(mut self, threshold: f32) -> Self {
        self.visibility_threshold = threshold;
        self
    }

    /// Schema this document conforms to.
    #[must_use]
    pub const fn schema(&self) -> &'static KeypointSchema {
        self.schema
    }

    /// Current keypoints, in schema order.
    #[must_use]
    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }

    /// A single keypoint.
    #[must_use]
    pub fn keypoint(&self, index: usize) -> Option<&Keypoint> {
        self.keypoints.get(index)
    }

    /// Snapshot taken when the document was created.
    #[must_use]
    pub fn original_keypoints(&self) -> &[Keypoint] {
        &self.original
    }

    /// Source image dimensions.
    #[must_use]
    pub const fn image_info(&self) -> ImageInfo {
        self.image_info
    }

    /// Visibility threshold in use.
    #[must_use]
    pub const fn visibility_threshold(&self) -> f32 {
        self.visibility_threshold
    }

    /// Number of keypoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    /// Whether the document has no keypoints.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }

    /// Whether any keypoint differs from the original snapshot.
    #[must_use]
    pub fn is_modified(&self) -> bool {
        *self.keypoints != *self.original
    }

    /// Move a keypoint. The confidence is left unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::IndexOutOfRange`] if `index` is not a keypoint, or
    /// [`PoseError::InvalidCoordinate`] if `x` or `y` is not finite; the document is left
    /// untouched.
    pub fn set_keypoint(&mut self, index: usize, x: f64, y: f64) -> Result<()> {
        let len = self.keypoints.len();
        let kp = self
            .keypoints
            .get_mut(index)
            .ok_or(PoseError::IndexOutOfRange { index, len })?;
        if !(x.is_finite() && y.is_finite()) {
            return Err(PoseError::InvalidCoordinate { index, x, y });
        }
        kp.x = x;
        kp.y = y;
        Ok(())
    }

    /// Restore every keypoint from the original snapshot.
    pub fn reset(&mut self) {
        self.keypoints.copy_from_slice(&self.original);
    }

    /// Whether the keypoint at `index` is above the visibility threshold.
    #[must_use]
    pub fn is_visible(&self, index: usize) -> bool {
        self.keypoints
            .get(index)
            .is_some_and(|kp| kp.confidence > self.visibility_threshold)
    }

    /// Visible keypoints with their indices, in schema order.
    pub fn visible_keypoints(&self) -> impl Iterator<Item = (usize, Keypoint)> + '_ {
        let threshold = self.visibility_threshold;
        self.keypoints
            .iter()
            .copied()
            .enumerate()
            .filter(move |(_, kp)| kp.confidence > threshold)
    }

    /// Number of visible keypoints.
    #[must_use]
    pub fn count_visible(&self) -> usize {
        self.visible_keypoints().count()
    }

    /// Convert to the flat wire representation.
    #[must_use]
    pub fn to_pose_data(&self) -> PoseData {
        PoseData {
            keypoints: self
                .keypoints
                .iter()
                .flat_map(|kp| [kp.x, kp.y, widen_confidence(kp.confidence)])
                .collect(),
            image_info: self.image_info,
        }
    }

    /// Build a document from the flat wire representation.
    ///
    /// When `schema_id` is `None` the schema is resolved from the keypoint count.
    ///
    /// # Errors
    ///
    /// [`PoseError::ParseError`] if the flat array is not made of triples, plus every error
    /// of [`PoseDocument::create`].
    pub fn from_pose_data(schema_id: Option<&str>, data: &PoseData) -> Result<Self> {
        let keypoints = triples(&data.keypoints)?;
        let schema = match schema_id {
            Some(id) => topology::get_schema(id)?,
            None => topology::schema_for_keypoint_count(keypoints.len())?,
        };
        Self::with_schema(schema, keypoints, data.image_info)
    }

    /// Serialize to the pose JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::ParseError`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_pose_data())?)
    }

    /// Parse a pose JSON document. Accepts either the bare pose or an object with a
    /// `pose_data` field.
    ///
    /// # Errors
    ///
    /// [`PoseError::ParseError`] for malformed JSON, plus every error of
    /// [`PoseDocument::from_pose_data`].
    pub fn from_json(schema_id: Option<&str>, json: &str) -> Result<Self> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Envelope {
            Wrapped { pose_data: PoseData },
            Bare(PoseData),
        }

        let data = match serde_json::from_str::<Envelope>(json)? {
            Envelope::Wrapped { pose_data } => pose_data,
            Envelope::Bare(data) => data,
        };
        Self::from_pose_data(schema_id, &data)
    }

    /// Build a document from one person of an OpenPose-style frame.
    ///
    /// Frames whose coordinates all lie in `[0, 1]` are treated as normalized and scaled by
    /// the canvas size.
    ///
    /// # Errors
    ///
    /// [`PoseError::IndexOutOfRange`] if `person` does not exist, plus every error of
    /// [`PoseDocument::from_pose_data`].
    pub fn from_openpose(schema_id: Option<&str>, frame: &OpenPoseFrame, person: usize) -> Result<Self> {
        let p = frame.people.get(person).ok_or(PoseError::IndexOutOfRange {
            index: person,
            len: frame.people.len(),
        })?;
        let image_info = ImageInfo::new(frame.canvas_width, frame.canvas_height)?;

        let mut flat = p.pose_keypoints_2d.clone();
        let normalized = flat
            .chunks(3)
            .all(|c| c.iter().take(2).all(|v| (0.0..=1.0).contains(v)));
        if normalized {
            for c in flat.chunks_mut(3) {
                if let [x, y, ..] = c {
                    *x *= f64::from(image_info.width);
                    *y *= f64::from(image_info.height);
                }
            }
        }

        Self::from_pose_data(
            schema_id,
            &PoseData {
                keypoints: flat,
                image_info,
            },
        )
    }
}

#[allow(clippy::cast_possible_truncation)]
fn triples(flat: &[f64]) -> Result<Vec<Keypoint>> {
    if flat.len() % 3 != 0 {
        return Err(PoseError::ParseError(format!(
            "keypoints array has {} values, expected triples of x, y, confidence",
            flat.len()
        )));
    }
    Ok(flat
        .chunks_exact(3)
        .map(|c| Keypoint::new(c[0], c[1], c[2] as f32))
        .collect())
}

/// Widen a confidence to `f64` through its shortest decimal form, so `0.9f32` is written
/// as `0.9` rather than `0.8999999761581421`.
fn widen_confidence(confidence: f32) -> f64 {
    confidence
        .to_string()
        .parse()
        .unwrap_or_else(|_| f64::from(confidence))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::OpenPosePerson;
    use crate::topology::DEFAULT_SCHEMA;

    fn info() -> ImageInfo {
        ImageInfo::new(1280, 1920).unwrap()
    }

    #[allow(clippy::cast_precision_loss)]
    fn body(conf: impl Fn(usize) -> f32) -> Vec<Keypoint> {
        (0..18)
            .map(|i| Keypoint::new(100.0 + i as f64 * 10.0, 200.0 + i as f64 * 5.0, conf(i)))
            .collect()
    }

    #[test]
    fn test_create_validates_length() {
        let err = PoseDocument::create(DEFAULT_SCHEMA, body(|_| 0.9)[..17].to_vec(), info())
            .unwrap_err();
        assert!(matches!(
            err,
            PoseError::SchemaMismatch {
                expected: 18,
                actual: 17
            }
        ));
    }

    #[test]
    fn test_create_validates_confidence() {
        for bad in [-0.1, 1.1, f32::NAN] {
            let err = PoseDocument::create(DEFAULT_SCHEMA, body(|i| if i == 5 { bad } else { 0.5 }), info())
                .unwrap_err();
            assert!(matches!(err, PoseError::InvalidConfidence { index: 5, .. }), "{bad}");
        }
        assert!(PoseDocument::create(DEFAULT_SCHEMA, body(|i| if i == 0 { 0.0 } else { 1.0 }), info()).is_ok());
    }

    #[test]
    fn test_create_validates_schema_and_image() {
        assert!(matches!(
            PoseDocument::create("mystery", body(|_| 0.9), info()),
            Err(PoseError::UnknownSchema(_))
        ));
        assert!(matches!(
            PoseDocument::create(DEFAULT_SCHEMA, body(|_| 0.9), ImageInfo { width: 0, height: 10 }),
            Err(PoseError::InvalidImageInfo { .. })
        ));
    }

    #[test]
    fn test_set_keypoint_keeps_confidence() {
        let mut doc = PoseDocument::create(DEFAULT_SCHEMA, body(|_| 0.42), info()).unwrap();
        doc.set_keypoint(3, -50.0, 5000.0).unwrap();
        let kp = doc.keypoint(3).unwrap();
        assert_eq!((kp.x, kp.y), (-50.0, 5000.0));
        assert!((kp.confidence - 0.42).abs() < f32::EPSILON);
        assert!(doc.is_modified());
    }

    #[test]
    fn test_set_keypoint_out_of_range_leaves_state() {
        let mut doc = PoseDocument::create(DEFAULT_SCHEMA, body(|_| 0.9), info()).unwrap();
        let before = doc.keypoints().to_vec();
        let err = doc.set_keypoint(18, 1.0, 1.0).unwrap_err();
        assert!(matches!(err, PoseError::IndexOutOfRange { index: 18, len: 18 }));
        assert_eq!(doc.keypoints(), &before[..]);
    }

    #[test]
    fn test_set_keypoint_rejects_non_finite() {
        let mut doc = PoseDocument::create(DEFAULT_SCHEMA, body(|_| 0.9), info()).unwrap();
        let before = doc.keypoints().to_vec();
        for (x, y) in [(f64::NAN, 1.0), (1.0, f64::INFINITY), (f64::NEG_INFINITY, f64::NAN)] {
            let err = doc.set_keypoint(4, x, y).unwrap_err();
            assert!(matches!(err, PoseError::InvalidCoordinate { index: 4, .. }), "{x}, {y}");
        }
        assert_eq!(doc.keypoints(), &before[..]);
        assert!(!doc.is_modified());
        // still serializable
        assert!(doc.to_json().unwrap().contains("\"keypoints\""));
    }

    #[test]
    fn test_create_rejects_non_finite_coordinates() {
        let mut points = body(|_| 0.9);
        points[7].y = f64::NAN;
        assert!(matches!(
            PoseDocument::create(DEFAULT_SCHEMA, points, info()),
            Err(PoseError::InvalidCoordinate { index: 7, .. })
        ));
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut doc = PoseDocument::create(DEFAULT_SCHEMA, body(|_| 0.9), info()).unwrap();
        let original = doc.keypoints().to_vec();
        doc.set_keypoint(0, 1.0, 2.0).unwrap();
        doc.set_keypoint(17, 3.0, 4.0).unwrap();

        doc.reset();
        let once = doc.keypoints().to_vec();
        doc.reset();
        assert_eq!(doc.keypoints(), &once[..]);
        assert_eq!(once, original);
        assert!(!doc.is_modified());
    }

    #[test]
    fn test_visibility_filter() {
        let doc = PoseDocument::create(DEFAULT_SCHEMA, body(|i| if i % 3 == 0 { 0.3 } else { 0.31 }), info())
            .unwrap();
        let visible: Vec<_> = doc.visible_keypoints().collect();
        assert_eq!(doc.count_visible(), visible.len());
        assert_eq!(visible.len(), 12);
        assert!(visible.iter().all(|(_, kp)| kp.confidence > 0.3));
        // restartable
        assert_eq!(doc.visible_keypoints().count(), visible.len());
        assert!(!doc.is_visible(0));
        assert!(doc.is_visible(1));
        assert!(!doc.is_visible(99));
    }

    #[test]
    fn test_custom_threshold() {
        let doc = PoseDocument::create(DEFAULT_SCHEMA, body(|i| if i < 9 { 0.2 } else { 0.6 }), info())
            .unwrap()
            .with_visibility_threshold(0.1);
        assert_eq!(doc.count_visible(), 18);
    }

    #[test]
    fn test_json_round_trip() {
        let mut doc = PoseDocument::create(DEFAULT_SCHEMA, body(|_| 0.5), info()).unwrap();
        doc.set_keypoint(2, 12.5, 99.25).unwrap();
        let json = doc.to_json().unwrap();
        let back = PoseDocument::from_json(None, &json).unwrap();
        assert_eq!(back.schema().id, DEFAULT_SCHEMA);
        assert_eq!(back.keypoints(), doc.keypoints());
        assert_eq!(back.image_info(), doc.image_info());
    }

    #[test]
    fn test_confidence_written_as_given() {
        let doc = PoseDocument::create(DEFAULT_SCHEMA, body(|i| if i == 0 { 0.9 } else { 0.3 }), info())
            .unwrap();
        let data = doc.to_pose_data();
        assert_eq!(data.keypoints[2], 0.9);
        assert_eq!(data.keypoints[5], 0.3);

        let json = doc.to_json().unwrap();
        assert!(json.contains("0.9"), "{json}");
        assert!(!json.contains("0.899999"), "{json}");
        assert!(!json.contains("0.300000"), "{json}");

        let back = PoseDocument::from_json(None, &json).unwrap();
        assert_eq!(back.keypoints(), doc.keypoints());
    }

    #[test]
    fn test_from_json_accepts_pose_data_envelope() {
        let json = r#"{"pose_data": {"keypoints": [
            1,1,1, 2,2,1, 3,3,1, 4,4,1, 5,5,1, 6,6,1, 7,7,1, 8,8,1, 9,9,1,
            10,10,1, 11,11,1, 12,12,1, 13,13,1, 14,14,1, 15,15,1, 16,16,1, 17,17,1
        ], "image_info": {"width": 64, "height": 64}}}"#;
        let doc = PoseDocument::from_json(None, json).unwrap();
        assert_eq!(doc.schema().id, "coco_17");
    }

    #[test]
    fn test_from_pose_data_rejects_partial_triples() {
        let data = PoseData {
            keypoints: vec![1.0, 2.0],
            image_info: info(),
        };
        assert!(matches!(
            PoseDocument::from_pose_data(None, &data),
            Err(PoseError::ParseError(_))
        ));
    }

    #[test]
    fn test_from_openpose_scales_normalized_frames() {
        let mut flat = Vec::new();
        for _ in 0..18 {
            flat.extend_from_slice(&[0.5, 0.25, 0.8]);
        }
        let frame = OpenPoseFrame {
            people: vec![OpenPosePerson {
                pose_keypoints_2d: flat,
                ..Default::default()
            }],
            canvas_width: 200,
            canvas_height: 400,
        };
        let doc = PoseDocument::from_openpose(None, &frame, 0).unwrap();
        let kp = doc.keypoint(0).unwrap();
        assert!((kp.x - 100.0).abs() < 1e-9);
        assert!((kp.y - 100.0).abs() < 1e-9);

        assert!(matches!(
            PoseDocument::from_openpose(None, &frame, 1),
            Err(PoseError::IndexOutOfRange { index: 1, len: 1 })
        ));
    }
}
