pub mod config;
pub mod ml_models;

// Candidate image evaluation
pub mod image_fetcher;
pub mod pose_queue;
pub mod body_classifier;
pub mod candidate_selector;

// Product table processing
pub mod dataset_store;
pub mod dataset_updater;
