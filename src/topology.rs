// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Keypoint schemas and their skeletal connectivity.
//!
//! Schemas are static and registered at compile time. Look them up with [`get_schema`].

use crate::error::{PoseError, Result};

/// Id of the default schema (18-point OpenPose body).
pub const DEFAULT_SCHEMA: &str = "openpose_18";

/// Optional keypoint groups that can be toggled on and off when drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subset {
    /// Always drawn.
    Body,
    /// Eyes and ears, drawn only when the face layer is enabled.
    Face,
}

/// A bone joining two keypoints, by index into the schema's keypoint list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bone {
    /// First endpoint.
    pub a: usize,
    /// Second endpoint.
    pub b: usize,
    /// Index into [`POSE_COLORS`](crate::visualizer::color::POSE_COLORS) used when the limb palette is on.
    pub color: usize,
}

const fn bone(a: usize, b: usize, color: usize) -> Bone {
    Bone { a, b, color }
}

/// Immutable description of a pose model.
#[derive(Debug)]
pub struct KeypointSchema {
    /// Registry id.
    pub id: &'static str,
    /// Ordered keypoint names.
    pub names: &'static [&'static str],
    /// Subset tag for each keypoint (same order as `names`).
    pub subsets: &'static [Subset],
    /// Skeletal connections.
    pub bones: &'static [Bone],
    /// Wrist keypoints, anchors for the hand placeholder markers.
    pub wrists: &'static [usize],
    /// Pose palette index for each keypoint marker.
    pub keypoint_colors: &'static [usize],
}

impl KeypointSchema {
    /// Number of keypoints in this schema.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the schema has no keypoints.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Index of a keypoint by name.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| *n == name)
    }

    /// Subset tag of a keypoint. Out-of-range indices are reported as [`Subset::Body`].
    #[must_use]
    pub fn subset(&self, index: usize) -> Subset {
        self.subsets.get(index).copied().unwrap_or(Subset::Body)
    }

    /// Bones as pairs of keypoint names.
    pub fn bone_names(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.bones.iter().map(|b| (self.names[b.a], self.names[b.b]))
    }
}

use Subset::{Body, Face};

/// OpenPose 18-keypoint body model.
pub static OPENPOSE_18: KeypointSchema = KeypointSchema {
    id: "openpose_18",
    names: &[
        "nose",
        "neck",
        "right_shoulder",
        "right_elbow",
        "right_wrist",
        "left_shoulder",
        "left_elbow",
        "left_wrist",
        "right_hip",
        "right_knee",
        "right_ankle",
        "left_hip",
        "left_knee",
        "left_ankle",
        "right_eye",
        "left_eye",
        "right_ear",
        "left_ear",
    ],
    subsets: &[
        Body, Body, Body, Body, Body, Body, Body, Body, Body, Body, Body, Body, Body, Body, Face,
        Face, Face, Face,
    ],
    bones: &[
        bone(1, 0, 16),   // neck to nose
        bone(1, 2, 7),    // neck to right shoulder
        bone(1, 5, 7),    // neck to left shoulder
        bone(2, 3, 9),    // right upper arm
        bone(3, 4, 9),    // right forearm
        bone(5, 6, 9),    // left upper arm
        bone(6, 7, 9),    // left forearm
        bone(1, 8, 7),    // neck to right hip
        bone(8, 9, 0),    // right thigh
        bone(9, 10, 0),   // right shin
        bone(1, 11, 7),   // neck to left hip
        bone(11, 12, 0),  // left thigh
        bone(12, 13, 0),  // left shin
        bone(0, 14, 16),  // nose to right eye
        bone(14, 16, 16), // right eye to right ear
        bone(0, 15, 16),  // nose to left eye
        bone(15, 17, 16), // left eye to left ear
    ],
    wrists: &[4, 7],
    keypoint_colors: &[16, 7, 9, 9, 9, 9, 9, 9, 0, 0, 0, 0, 0, 0, 16, 16, 16, 16],
};

/// COCO 17-keypoint body model (face points at indices 0-4).
pub static COCO_17: KeypointSchema = KeypointSchema {
    id: "coco_17",
    names: &[
        "nose",
        "left_eye",
        "right_eye",
        "left_ear",
        "right_ear",
        "left_shoulder",
        "right_shoulder",
        "left_elbow",
        "right_elbow",
        "left_wrist",
        "right_wrist",
        "left_hip",
        "right_hip",
        "left_knee",
        "right_knee",
        "left_ankle",
        "right_ankle",
    ],
    subsets: &[
        Face, Face, Face, Face, Face, Body, Body, Body, Body, Body, Body, Body, Body, Body, Body,
        Body, Body,
    ],
    bones: &[
        bone(15, 13, 0), // left ankle to left knee
        bone(13, 11, 0), // left knee to left hip
        bone(16, 14, 0), // right ankle to right knee
        bone(14, 12, 0), // right knee to right hip
        bone(11, 12, 7), // left hip to right hip
        bone(5, 11, 7),  // left shoulder to left hip
        bone(6, 12, 7),  // right shoulder to right hip
        bone(5, 6, 9),   // left shoulder to right shoulder
        bone(5, 7, 9),   // left shoulder to left elbow
        bone(6, 8, 9),   // right shoulder to right elbow
        bone(7, 9, 9),   // left elbow to left wrist
        bone(8, 10, 9),  // right elbow to right wrist
        bone(1, 2, 16),  // left eye to right eye
        bone(0, 1, 16),  // nose to left eye
        bone(0, 2, 16),  // nose to right eye
        bone(1, 3, 16),  // left eye to left ear
        bone(2, 4, 16),  // right eye to right ear
        bone(3, 5, 16),  // left ear to left shoulder
        bone(4, 6, 16),  // right ear to right shoulder
    ],
    wrists: &[9, 10],
    keypoint_colors: &[16, 16, 16, 16, 16, 9, 9, 9, 9, 9, 9, 0, 0, 0, 0, 0, 0],
};

static REGISTRY: [&KeypointSchema; 2] = [&OPENPOSE_18, &COCO_17];

/// All registered schemas.
#[must_use]
pub fn schemas() -> &'static [&'static KeypointSchema] {
    &REGISTRY
}

/// Look up a schema by id.
///
/// # Errors
///
/// Returns [`PoseError::UnknownSchema`] if no schema with this id is registered.
pub fn get_schema(id: &str) -> Result<&'static KeypointSchema> {
    REGISTRY
        .iter()
        .copied()
        .find(|s| s.id == id)
        .ok_or_else(|| PoseError::UnknownSchema(id.to_string()))
}

/// Resolve a schema from a bare keypoint count, for payloads that do not name one.
///
/// # Errors
///
/// Returns [`PoseError::UnknownSchema`] if no registered schema has `count` keypoints.
pub fn schema_for_keypoint_count(count: usize) -> Result<&'static KeypointSchema> {
    REGISTRY
        .iter()
        .copied()
        .find(|s| s.len() == count)
        .ok_or_else(|| PoseError::UnknownSchema(format!("<{count} keypoints>")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bones_reference_known_keypoints() {
        for schema in schemas() {
            assert_eq!(schema.subsets.len(), schema.len(), "{}", schema.id);
            assert_eq!(schema.keypoint_colors.len(), schema.len(), "{}", schema.id);
            for b in schema.bones {
                assert!(b.a < schema.len() && b.b < schema.len(), "{}: {b:?}", schema.id);
                assert_ne!(b.a, b.b);
            }
            for &w in schema.wrists {
                assert!(schema.names[w].ends_with("wrist"));
            }
        }
    }

    #[test]
    fn test_get_schema() {
        let schema = get_schema(DEFAULT_SCHEMA).unwrap();
        assert_eq!(schema.len(), 18);
        assert_eq!(get_schema("coco_17").unwrap().len(), 17);
        assert!(matches!(
            get_schema("hand_21"),
            Err(PoseError::UnknownSchema(id)) if id == "hand_21"
        ));
    }

    #[test]
    fn test_openpose_face_subset() {
        let face: Vec<usize> = (0..OPENPOSE_18.len())
            .filter(|&i| OPENPOSE_18.subset(i) == Subset::Face)
            .collect();
        assert_eq!(face, vec![14, 15, 16, 17]);
    }

    #[test]
    fn test_bone_names() {
        let names: Vec<_> = OPENPOSE_18.bone_names().collect();
        assert!(names.contains(&("right_shoulder", "right_elbow")));
        assert_eq!(OPENPOSE_18.index_of("left_ankle"), Some(13));
        assert_eq!(OPENPOSE_18.index_of("tail"), None);
    }

    #[test]
    fn test_schema_for_keypoint_count() {
        assert_eq!(schema_for_keypoint_count(18).unwrap().id, "openpose_18");
        assert_eq!(schema_for_keypoint_count(17).unwrap().id, "coco_17");
        assert!(schema_for_keypoint_count(21).is_err());
    }
}
