pub mod core;
pub mod models;
pub mod platform;

use crate::core::body_classifier::FullBodyClassifier;
use crate::core::candidate_selector::CandidateSelector;
use crate::core::config::{Config, ConfigError};
use crate::core::dataset_updater::{DatasetUpdater, UpdateOutcome};
use crate::core::image_fetcher::HttpImageFetcher;
use crate::core::ml_models::{ModelError, ModelInfo, ModelManager, ModelSource};
use crate::core::pose_queue::PoseQueue;
use crate::models::dataset::DatasetError;
use crate::models::image::FetchError;
use crate::models::pose::{PoseConfig, PoseError};
use std::path::PathBuf;
use std::sync::Arc;

/// Fatal pipeline failures. Per-candidate problems never surface here.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Pose(#[from] PoseError),

    #[error("HTTP client setup failed: {0}")]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),
}

/// Make the pose model available locally, downloading it into the model
/// directory when `model_url` is set and the file is missing
pub async fn resolve_model(pose: &PoseConfig) -> Result<PathBuf, PipelineError> {
    if pose.model_path.is_file() {
        return Ok(pose.model_path.clone());
    }

    let Some(url) = &pose.model_url else {
        return Err(PoseError::ModelLoadFailed(format!(
            "model file not found: {} (set pose.model_url to download it)",
            pose.model_path.display()
        ))
        .into());
    };

    let cache_dir = pose
        .model_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let name = pose
        .model_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| pose.model_complexity.model_file_name().to_string());

    let manager = ModelManager::new(cache_dir)?;
    let path = manager
        .ensure_model(&ModelInfo::new(name, ModelSource::Url(url.clone())))
        .await?;
    Ok(path)
}

/// Run the whole batch: resolve the model, start the pose workers, update the
/// dataset, and release the workers again.
///
/// A failure to save the output is reported in `UpdateOutcome::persisted`
/// rather than as an error.
pub async fn run(config: &Config) -> Result<UpdateOutcome, PipelineError> {
    config.validate()?;
    // Fail before any model work when there is nothing to process
    if !config.input_path.is_file() {
        return Err(DatasetError::InputNotFound(config.input_path.clone()).into());
    }

    let mut pose_config = config.pose.clone();
    pose_config.model_path = resolve_model(&config.pose).await?;

    let estimators = crate::platform::pose::create_estimators(&pose_config, config.workers)?;
    let poses = Arc::new(PoseQueue::spawn(estimators)?);
    let fetcher = Arc::new(HttpImageFetcher::new(&config.fetch)?);

    let selector = CandidateSelector::new(fetcher, poses.clone(), FullBodyClassifier::new(&config.classifier));
    let updater = DatasetUpdater::new(selector, config.workers);

    let outcome = updater
        .run_file(&config.input_path, &config.output_path, &config.output_column)
        .await;

    drop(updater);
    match Arc::try_unwrap(poses) {
        Ok(queue) => queue.shutdown().await,
        Err(_) => tracing::warn!("pose workers still referenced; released on drop"),
    }

    let outcome = outcome?;

    if let Some(report_path) = &config.report_path {
        match outcome.report.save(report_path) {
            Ok(()) => tracing::info!("Run report written to {}", report_path.display()),
            Err(e) => tracing::error!("Could not write run report to {}: {}", report_path.display(), e),
        }
    }

    Ok(outcome)
}
