// Data models for body pose estimation and full-body landmark groups

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ==============================================================================
// Body Landmarks (33 keypoints)
// ==============================================================================

/// MediaPipe Pose Landmark indices (33 total)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum BodyLandmark {
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    MouthLeft = 9,
    MouthRight = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

impl BodyLandmark {
    /// Number of body landmarks produced by the pose model
    pub const COUNT: usize = 33;

    /// Position of this landmark in the model's output list
    pub fn index(self) -> usize {
        self as usize
    }
}

/// A single anatomical point with the model's visibility confidence
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32, // Normalized [0, 1] for image coordinates
    pub y: f32, // Normalized [0, 1] for image coordinates
    pub z: f32, // Depth relative to the hip midpoint
    pub visibility: f32, // Likelihood the point is visible and in frame [0, 1]
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32, visibility: f32) -> Self {
        Self { x, y, z, visibility }
    }

    /// Strictly above the threshold; a landmark sitting exactly on it does not count.
    pub fn is_visible(&self, threshold: f32) -> bool {
        self.visibility > threshold
    }
}

// ==============================================================================
// Landmark Groups
// ==============================================================================

/// Named set of landmarks; the group is visible when any member is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LandmarkGroup {
    pub name: &'static str,
    pub members: &'static [BodyLandmark],
}

pub const UPPER_BODY: LandmarkGroup = LandmarkGroup {
    name: "upper_body",
    members: &[BodyLandmark::LeftShoulder, BodyLandmark::RightShoulder],
};

pub const LOWER_BODY: LandmarkGroup = LandmarkGroup {
    name: "lower_body",
    members: &[
        BodyLandmark::LeftAnkle,
        BodyLandmark::RightAnkle,
        BodyLandmark::LeftHeel,
        BodyLandmark::RightHeel,
    ],
};

/// Groups that must all be visible for a full-body verdict
pub const LANDMARK_GROUPS: [LandmarkGroup; 2] = [UPPER_BODY, LOWER_BODY];

// ==============================================================================
// Estimation Outcome
// ==============================================================================

/// Result of running the pose model on one image
#[derive(Debug, Clone, PartialEq)]
pub enum PoseOutcome {
    /// A body was detected; landmarks are ordered by `BodyLandmark` index
    Landmarks(Vec<Landmark>),
    /// No body in the image. A legitimate outcome, not an error.
    NoPoseFound,
}

impl PoseOutcome {
    pub fn landmarks(&self) -> Option<&[Landmark]> {
        match self {
            PoseOutcome::Landmarks(landmarks) => Some(landmarks),
            PoseOutcome::NoPoseFound => None,
        }
    }
}

// ==============================================================================
// Configuration
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoseConfig {
    pub model_path: PathBuf,                    // ONNX landmark model on disk
    pub model_url: Option<String>,              // Download source when model_path is missing
    pub model_complexity: ModelComplexity,      // Model complexity (0=lite, 1=full, 2=heavy)
    pub min_detection_confidence: f32,          // Minimum pose presence score (default: 0.5)
    pub intra_threads: usize,                   // ONNX Runtime threads per instance
    pub input_size: u32,                        // Square model input edge in pixels
    pub landmarks_output: String,               // Output tensor holding the landmark rows
    pub pose_flag_output: String,               // Output tensor holding the presence score
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelComplexity {
    Lite = 0,   // Fastest, less accurate
    Full = 1,   // Balanced
    Heavy = 2,  // Slowest, most accurate
}

impl ModelComplexity {
    pub fn model_file_name(&self) -> &'static str {
        match self {
            ModelComplexity::Lite => "pose_landmark_lite.onnx",
            ModelComplexity::Full => "pose_landmark_full.onnx",
            ModelComplexity::Heavy => "pose_landmark_heavy.onnx",
        }
    }
}

impl Default for PoseConfig {
    fn default() -> Self {
        let complexity = ModelComplexity::Full;
        Self {
            model_path: PathBuf::from("models").join(complexity.model_file_name()),
            model_url: None,
            model_complexity: complexity,
            min_detection_confidence: 0.5,
            intra_threads: 1,
            input_size: 256,
            landmarks_output: "Identity".to_string(),
            pose_flag_output: "Identity_1".to_string(),
        }
    }
}

// ==============================================================================
// Error Types
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PoseError {
    #[error("Model loading failed: {0}")]
    ModelLoadFailed(String),

    #[error("Inference failed: {0}")]
    InferenceFailed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Pose worker stopped before answering")]
    WorkerStopped,

    #[error("No pose backend compiled in (enable the '{0}' feature)")]
    NotSupported(&'static str),
}

pub type PoseResult<T> = Result<T, PoseError>;
