use crate::models::pose::PoseConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Browser-like agent; some image CDNs reject default client agents
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.3";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write config {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Table of products to resolve
    pub input_path: PathBuf,
    /// Where the updated table is written
    pub output_path: PathBuf,
    /// Column receiving the resolved image URL
    pub output_column: String,
    /// Records evaluated concurrently (1 = strictly sequential)
    pub workers: usize,
    /// Optional JSON report of every candidate decision
    pub report_path: Option<PathBuf>,
    pub fetch: FetchConfig,
    pub classifier: ClassifierConfig,
    pub pose: PoseConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FetchConfig {
    /// Whole-request timeout per candidate
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Bodies larger than this are rejected without decoding
    pub max_image_bytes: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ClassifierConfig {
    /// A landmark counts when its visibility is strictly greater than this
    pub visibility_threshold: f32,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = PathBuf::from("data");
        Self {
            input_path: data_dir.join("pae_dataset.csv"),
            output_path: data_dir.join("myntra_data_updated.csv"),
            output_column: "new_model_image_url".to_string(),
            workers: 1,
            report_path: None,
            fetch: FetchConfig::default(),
            classifier: ClassifierConfig::default(),
            pose: PoseConfig::default(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_image_bytes: 20 * 1024 * 1024,
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            visibility_threshold: 0.6,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file; absent fields keep their defaults
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        self.validate()?;

        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents).map_err(write_err)?;

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> ConfigResult<()> {
        if self.output_column.trim().is_empty() {
            return Err(invalid("output_column", "must not be empty".to_string()));
        }

        if self.workers == 0 || self.workers > 16 {
            return Err(invalid(
                "workers",
                format!("{}. Must be between 1 and 16", self.workers),
            ));
        }

        if self.fetch.timeout_secs == 0 || self.fetch.timeout_secs > 300 {
            return Err(invalid(
                "fetch.timeout_secs",
                format!("{}. Must be between 1 and 300", self.fetch.timeout_secs),
            ));
        }

        if self.fetch.user_agent.trim().is_empty() {
            return Err(invalid("fetch.user_agent", "must not be empty".to_string()));
        }

        if self.fetch.max_image_bytes == 0 {
            return Err(invalid("fetch.max_image_bytes", "must be positive".to_string()));
        }

        if !(0.0..=1.0).contains(&self.classifier.visibility_threshold) {
            return Err(invalid(
                "classifier.visibility_threshold",
                format!(
                    "{}. Must be between 0.0 and 1.0",
                    self.classifier.visibility_threshold
                ),
            ));
        }

        if !(0.0..=1.0).contains(&self.pose.min_detection_confidence) {
            return Err(invalid(
                "pose.min_detection_confidence",
                format!(
                    "{}. Must be between 0.0 and 1.0",
                    self.pose.min_detection_confidence
                ),
            ));
        }

        if self.pose.input_size == 0 {
            return Err(invalid("pose.input_size", "must be positive".to_string()));
        }

        if self.pose.intra_threads == 0 {
            return Err(invalid("pose.intra_threads", "must be at least 1".to_string()));
        }

        Ok(())
    }
}

fn invalid(field: &'static str, reason: String) -> ConfigError {
    ConfigError::Invalid { field, reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn test_config_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join("lookbook_test_config")
            .join(name)
            .join("settings.json")
    }

    fn cleanup(path: &Path) {
        if let Some(parent) = path.parent() {
            let _ = fs::remove_dir_all(parent);
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.output_column, "new_model_image_url");
        assert_eq!(config.workers, 1);
        assert_eq!(config.fetch.timeout_secs, 15);
        assert_eq!(config.fetch.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(config.classifier.visibility_threshold, 0.6);
        assert_eq!(config.pose.min_detection_confidence, 0.5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.workers = 0;
        assert!(config.validate().is_err());
        config.workers = 17;
        assert!(config.validate().is_err());
        config.workers = 4;
        assert!(config.validate().is_ok());

        config.classifier.visibility_threshold = 1.5;
        assert!(config.validate().is_err());
        config.classifier.visibility_threshold = 0.6;

        config.fetch.timeout_secs = 0;
        assert!(config.validate().is_err());
        config.fetch.timeout_secs = 15;

        config.output_column = "  ".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "output_column", .. })
        ));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config =
            serde_json::from_str(r#"{ "workers": 3, "classifier": { "visibility_threshold": 0.7 } }"#)
                .unwrap();
        assert_eq!(config.workers, 3);
        assert_eq!(config.classifier.visibility_threshold, 0.7);
        assert_eq!(config.fetch, FetchConfig::default());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let parsed: Result<Config, _> = serde_json::from_str(r#"{ "wrokers": 3 }"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_save_and_load() {
        let path = test_config_path("roundtrip");
        cleanup(&path);

        let mut config = Config::default();
        config.workers = 2;
        config.report_path = Some(PathBuf::from("out/report.json"));
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config);

        cleanup(&path);
    }

    #[test]
    fn test_load_missing_file() {
        let path = test_config_path("missing");
        cleanup(&path);
        assert!(matches!(Config::load(&path), Err(ConfigError::Read { .. })));
    }
}
