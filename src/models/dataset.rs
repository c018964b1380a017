// Data models for catalog records and their candidate image lists

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use thiserror::Error;

/// One catalog item as read from the input table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub product_id: String,
    pub model_image_url: Option<String>,
    pub additional_images: Option<String>,
    /// Starts as `model_image_url`; only ever replaced by a full-body candidate
    pub resolved_image_url: Option<String>,
}

impl Record {
    pub fn new(
        product_id: impl Into<String>,
        model_image_url: Option<String>,
        additional_images: Option<String>,
    ) -> Self {
        let resolved_image_url = model_image_url.clone();
        Self {
            product_id: product_id.into(),
            model_image_url,
            additional_images,
            resolved_image_url,
        }
    }

    /// Primary image first, then additional images, duplicates dropped
    pub fn candidates(&self) -> CandidateList {
        CandidateList::from_sources(
            self.model_image_url.as_deref(),
            self.additional_images.as_deref(),
        )
    }
}

// ==============================================================================
// Candidate List
// ==============================================================================

/// Ordered, de-duplicated candidate URLs for a single record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateList {
    urls: Vec<String>,
}

impl CandidateList {
    /// Build from the primary URL and a `;`/`,` delimited list of extras.
    /// Blank entries are ignored and the first occurrence of a URL wins.
    pub fn from_sources(primary: Option<&str>, additional: Option<&str>) -> Self {
        let primary = primary.map(str::trim).filter(|url| !url.is_empty());
        let extras = additional
            .into_iter()
            .flat_map(|joined| joined.split([';', ',']))
            .map(str::trim)
            .filter(|url| !url.is_empty());

        let mut seen = HashSet::new();
        let urls = primary
            .into_iter()
            .chain(extras)
            .filter(|url| seen.insert(*url))
            .map(str::to_string)
            .collect();

        Self { urls }
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls.iter().any(|candidate| candidate == url)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.urls.iter().map(String::as_str)
    }
}

impl FromIterator<String> for CandidateList {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        let mut seen = HashSet::new();
        let urls = iter
            .into_iter()
            .filter(|url| seen.insert(url.clone()))
            .collect();
        Self { urls }
    }
}

// ==============================================================================
// Errors
// ==============================================================================

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Input file not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("Input file is missing required column '{0}'")]
    MissingColumn(&'static str),

    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Failed to persist {}: {reason}", path.display())]
    Persist { path: PathBuf, reason: String },
}

pub type DatasetResult<T> = Result<T, DatasetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_order_and_dedup() {
        let list = CandidateList::from_sources(Some("u0"), Some("u1,u2;u1,u3"));
        assert_eq!(list.urls(), ["u0", "u1", "u2", "u3"]);
    }

    #[test]
    fn test_primary_repeated_in_additional() {
        let list = CandidateList::from_sources(Some("u0"), Some("u1;u0; u2 ,,"));
        assert_eq!(list.urls(), ["u0", "u1", "u2"]);
    }

    #[test]
    fn test_missing_fields_give_no_candidates() {
        assert!(CandidateList::from_sources(None, None).is_empty());
        assert!(CandidateList::from_sources(Some("   "), Some(" ; , ")).is_empty());

        let only_extras = CandidateList::from_sources(None, Some("a;b"));
        assert_eq!(only_extras.urls(), ["a", "b"]);
    }

    #[test]
    fn test_record_defaults_resolved_to_primary() {
        let record = Record::new("p1", Some("u0".into()), Some("u1".into()));
        assert_eq!(record.resolved_image_url.as_deref(), Some("u0"));
        assert_eq!(record.candidates().urls(), ["u0", "u1"]);
    }

    #[test]
    fn test_collect_dedups() {
        let list: CandidateList = ["a", "b", "a"].iter().map(|s| s.to_string()).collect();
        assert_eq!(list.urls(), ["a", "b"]);
        assert!(list.contains("b"));
    }
}
