// Data models for candidate images, pose landmarks, and catalog records

pub mod dataset;
pub mod image;
pub mod pose;
