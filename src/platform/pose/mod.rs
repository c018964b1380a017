// Pose estimation platform integration
// Provides the MediaPipe bridge and helper utilities

pub mod mediapipe_bridge;

pub use mediapipe_bridge::{create_estimators, PoseEstimator};
