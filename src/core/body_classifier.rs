// Full-body verdict from pose landmark visibility

use crate::core::config::ClassifierConfig;
use crate::models::pose::{Landmark, LandmarkGroup, LANDMARK_GROUPS};

/// Coarse two-region heuristic: an image is full-body when every landmark
/// group has at least one member above the visibility threshold.
#[derive(Debug, Clone, Copy)]
pub struct FullBodyClassifier {
    visibility_threshold: f32,
}

impl FullBodyClassifier {
    pub fn new(config: &ClassifierConfig) -> Self {
        Self {
            visibility_threshold: config.visibility_threshold,
        }
    }

    pub fn visibility_threshold(&self) -> f32 {
        self.visibility_threshold
    }

    pub fn classify(&self, landmarks: &[Landmark]) -> bool {
        LANDMARK_GROUPS
            .iter()
            .all(|group| self.is_group_visible(group, landmarks))
    }

    /// Members beyond the end of `landmarks` are skipped, not treated as errors
    pub fn is_group_visible(&self, group: &LandmarkGroup, landmarks: &[Landmark]) -> bool {
        group
            .members
            .iter()
            .filter_map(|member| landmarks.get(member.index()))
            .any(|landmark| landmark.is_visible(self.visibility_threshold))
    }
}

impl Default for FullBodyClassifier {
    fn default() -> Self {
        Self::new(&ClassifierConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::pose::{BodyLandmark, LOWER_BODY, UPPER_BODY};

    /// Full 33-point set at zero visibility with the given overrides
    fn landmarks_with(overrides: &[(BodyLandmark, f32)]) -> Vec<Landmark> {
        let mut landmarks = vec![Landmark::new(0.5, 0.5, 0.0, 0.0); BodyLandmark::COUNT];
        for (landmark, visibility) in overrides {
            landmarks[landmark.index()].visibility = *visibility;
        }
        landmarks
    }

    #[test]
    fn test_lower_body_below_threshold() {
        let landmarks = landmarks_with(&[
            (BodyLandmark::LeftShoulder, 0.7),
            (BodyLandmark::RightAnkle, 0.5),
        ]);
        assert!(!FullBodyClassifier::default().classify(&landmarks));
    }

    #[test]
    fn test_both_groups_just_above_threshold() {
        let landmarks = landmarks_with(&[
            (BodyLandmark::RightShoulder, 0.61),
            (BodyLandmark::LeftHeel, 0.61),
        ]);
        assert!(FullBodyClassifier::default().classify(&landmarks));
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let landmarks = landmarks_with(&[
            (BodyLandmark::LeftShoulder, 0.6),
            (BodyLandmark::LeftAnkle, 0.9),
        ]);
        assert!(!FullBodyClassifier::default().classify(&landmarks));
    }

    #[test]
    fn test_empty_landmarks() {
        assert!(!FullBodyClassifier::default().classify(&[]));
    }

    #[test]
    fn test_short_landmark_list_skips_missing_members() {
        // Only the first 28 points: right ankle (28) and heels (29, 30) are absent
        let mut landmarks = landmarks_with(&[
            (BodyLandmark::LeftShoulder, 0.9),
            (BodyLandmark::LeftAnkle, 0.9),
        ]);
        landmarks.truncate(28);

        let classifier = FullBodyClassifier::default();
        assert!(classifier.is_group_visible(&UPPER_BODY, &landmarks));
        assert!(classifier.is_group_visible(&LOWER_BODY, &landmarks));
        assert!(classifier.classify(&landmarks));

        landmarks.truncate(20);
        assert!(!classifier.is_group_visible(&LOWER_BODY, &landmarks));
        assert!(!classifier.classify(&landmarks));
    }

    #[test]
    fn test_custom_threshold() {
        let classifier = FullBodyClassifier::new(&ClassifierConfig {
            visibility_threshold: 0.3,
        });
        let landmarks = landmarks_with(&[
            (BodyLandmark::LeftShoulder, 0.4),
            (BodyLandmark::RightHeel, 0.35),
        ]);
        assert!(classifier.classify(&landmarks));
        assert_eq!(classifier.visibility_threshold(), 0.3);
    }
}
