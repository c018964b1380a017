// Sequential first-match search over a record's candidate images

use crate::core::body_classifier::FullBodyClassifier;
use crate::core::image_fetcher::ImageFetcher;
use crate::core::pose_queue::PoseQueue;
use crate::models::dataset::CandidateList;
use crate::models::pose::PoseOutcome;
use serde::Serialize;
use std::sync::Arc;

/// What happened to a single candidate URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", content = "reason", rename_all = "snake_case")]
pub enum CandidateVerdict {
    FullBody,
    NotFullBody,
    NoPoseFound,
    FetchFailed { kind: &'static str, message: String },
    InferenceFailed(String),
}

impl CandidateVerdict {
    /// Stable short name used in run summaries
    pub fn kind(&self) -> &'static str {
        match self {
            CandidateVerdict::FullBody => "full_body",
            CandidateVerdict::NotFullBody => "not_full_body",
            CandidateVerdict::NoPoseFound => "no_pose_found",
            CandidateVerdict::FetchFailed { kind, .. } => *kind,
            CandidateVerdict::InferenceFailed(_) => "inference_failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateAttempt {
    pub url: String,
    #[serde(flatten)]
    pub verdict: CandidateVerdict,
}

/// Outcome of evaluating one candidate list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Found {
        url: String,
        attempts: Vec<CandidateAttempt>,
    },
    NotFound {
        attempts: Vec<CandidateAttempt>,
    },
}

impl Selection {
    pub fn url(&self) -> Option<&str> {
        match self {
            Selection::Found { url, .. } => Some(url),
            Selection::NotFound { .. } => None,
        }
    }

    pub fn attempts(&self) -> &[CandidateAttempt] {
        match self {
            Selection::Found { attempts, .. } | Selection::NotFound { attempts } => attempts,
        }
    }
}

/// Fetch, estimate, classify - one candidate at a time, stopping at the
/// first full-body image. Candidate order is the caller's preference.
#[derive(Clone)]
pub struct CandidateSelector {
    fetcher: Arc<dyn ImageFetcher>,
    poses: Arc<PoseQueue>,
    classifier: FullBodyClassifier,
}

impl CandidateSelector {
    pub fn new(fetcher: Arc<dyn ImageFetcher>, poses: Arc<PoseQueue>, classifier: FullBodyClassifier) -> Self {
        Self {
            fetcher,
            poses,
            classifier,
        }
    }

    pub async fn select(&self, candidates: &CandidateList) -> Selection {
        let mut attempts = Vec::with_capacity(candidates.len());

        for url in candidates.iter() {
            tracing::info!("Checking: {}", url);
            let verdict = self.evaluate(url).await;

            let hit = verdict == CandidateVerdict::FullBody;
            attempts.push(CandidateAttempt {
                url: url.to_string(),
                verdict,
            });

            if hit {
                tracing::info!("--> Found full body image: {}", url);
                return Selection::Found {
                    url: url.to_string(),
                    attempts,
                };
            }
        }

        Selection::NotFound { attempts }
    }

    /// Every failure is logged here and turned into a verdict; nothing escapes
    async fn evaluate(&self, url: &str) -> CandidateVerdict {
        let image = match self.fetcher.fetch(url).await {
            Ok(image) => image,
            Err(e) => {
                tracing::warn!("Skipping {}: {}", url, e);
                return CandidateVerdict::FetchFailed {
                    kind: e.kind(),
                    message: e.to_string(),
                };
            }
        };

        match self.poses.estimate(image).await {
            Ok(PoseOutcome::NoPoseFound) => {
                tracing::debug!("No pose found in {}", url);
                CandidateVerdict::NoPoseFound
            }
            Ok(PoseOutcome::Landmarks(landmarks)) => {
                if self.classifier.classify(&landmarks) {
                    CandidateVerdict::FullBody
                } else {
                    tracing::debug!("Not a full-body shot: {}", url);
                    CandidateVerdict::NotFullBody
                }
            }
            Err(e) => {
                tracing::warn!("Pose estimation failed for {}: {}", url, e);
                CandidateVerdict::InferenceFailed(e.to_string())
            }
        }
    }
}
