// Dataset update pipeline - resolves a full-body image for every product row
// and persists the table with the extra column

use crate::core::candidate_selector::{CandidateAttempt, CandidateSelector, CandidateVerdict, Selection};
use crate::core::dataset_store::Dataset;
use crate::models::dataset::{CandidateList, DatasetResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

// ==============================================================================
// Reports
// ==============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateSummary {
    pub total: usize,
    /// Rows whose resolved URL differs from the original primary image
    pub updated: usize,
    pub unchanged: usize,
    pub candidates_checked: usize,
    /// Non-winning candidate verdicts, keyed by verdict kind
    pub skipped_by_reason: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordReport {
    pub product_id: String,
    pub original_url: Option<String>,
    pub resolved_url: Option<String>,
    pub attempts: Vec<CandidateAttempt>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    pub summary: UpdateSummary,
    pub records: Vec<RecordReport>,
}

impl RunReport {
    fn from_records(records: Vec<RecordReport>) -> Self {
        let mut summary = UpdateSummary {
            total: records.len(),
            ..Default::default()
        };

        for record in &records {
            if record.resolved_url != record.original_url {
                summary.updated += 1;
            } else {
                summary.unchanged += 1;
            }

            summary.candidates_checked += record.attempts.len();
            for attempt in &record.attempts {
                if attempt.verdict != CandidateVerdict::FullBody {
                    *summary
                        .skipped_by_reason
                        .entry(attempt.verdict.kind().to_string())
                        .or_insert(0) += 1;
                }
            }
        }

        Self {
            generated_at: Utc::now(),
            summary,
            records,
        }
    }

    /// Write the report as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }
}

/// Result of a full load-update-save run. `persisted` carries a save
/// failure without discarding the updated table.
pub struct UpdateOutcome {
    pub dataset: Dataset,
    pub report: RunReport,
    pub persisted: DatasetResult<()>,
}

// ==============================================================================
// Updater
// ==============================================================================

pub struct DatasetUpdater {
    selector: CandidateSelector,
    workers: usize,
}

impl DatasetUpdater {
    /// `workers` is the number of records in flight at once; 1 processes the
    /// table strictly in order
    pub fn new(selector: CandidateSelector, workers: usize) -> Self {
        Self {
            selector,
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Load `input`, resolve every row, then save to `output`.
    /// Loading errors are fatal; a save error is returned inside the outcome.
    pub async fn run_file(&self, input: &Path, output: &Path, output_column: &str) -> DatasetResult<UpdateOutcome> {
        tracing::info!("Loading dataset from {}", input.display());
        let mut dataset = Dataset::load(input, output_column)?;
        tracing::info!("Loaded {} products", dataset.len());

        let report = self.update(&mut dataset).await;

        let persisted = dataset.save(output);
        match &persisted {
            Ok(()) => tracing::info!("Updated dataset saved to {}", output.display()),
            Err(e) => tracing::error!("Could not save updated dataset: {}", e),
        }

        Ok(UpdateOutcome {
            dataset,
            report,
            persisted,
        })
    }

    /// Resolve every record in place. Only the resolved column is touched,
    /// and only with a URL from the record's own candidates.
    pub async fn update(&self, dataset: &mut Dataset) -> RunReport {
        let jobs: Vec<(String, CandidateList)> = dataset
            .records()
            .iter()
            .map(|record| (record.product_id.clone(), record.candidates()))
            .collect();

        let selections = if self.workers == 1 {
            self.select_sequential(jobs).await
        } else {
            self.select_concurrent(jobs).await
        };

        let mut reports = Vec::with_capacity(selections.len());
        for (index, selection) in selections.into_iter().enumerate() {
            let record = &dataset.records()[index];
            let product_id = record.product_id.clone();
            let original_url = record.model_image_url.clone();

            let attempts = match selection {
                Selection::Found { url, attempts } => {
                    dataset.set_resolved(index, url);
                    attempts
                }
                Selection::NotFound { attempts } => {
                    tracing::info!(
                        "No suitable full-body image found for product {}. Keeping original.",
                        product_id
                    );
                    attempts
                }
            };

            reports.push(RecordReport {
                product_id,
                original_url,
                resolved_url: dataset.records()[index].resolved_image_url.clone(),
                attempts,
            });
        }

        let report = RunReport::from_records(reports);
        tracing::info!(
            "Processed {} products: {} updated, {} unchanged, {} candidates checked",
            report.summary.total,
            report.summary.updated,
            report.summary.unchanged,
            report.summary.candidates_checked
        );
        report
    }

    async fn select_sequential(&self, jobs: Vec<(String, CandidateList)>) -> Vec<Selection> {
        let total = jobs.len();
        let mut selections = Vec::with_capacity(total);
        for (index, (product_id, candidates)) in jobs.into_iter().enumerate() {
            selections.push(select_one(&self.selector, index, total, &product_id, &candidates).await);
        }
        selections
    }

    /// Bounded fan-out over records. Results are collected by index and
    /// returned only after every task has finished.
    async fn select_concurrent(&self, jobs: Vec<(String, CandidateList)>) -> Vec<Selection> {
        let total = jobs.len();
        let permits = Arc::new(Semaphore::new(self.workers));
        let mut tasks = JoinSet::new();

        for (index, (product_id, candidates)) in jobs.into_iter().enumerate() {
            let selector = self.selector.clone();
            let permits = permits.clone();
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await;
                let selection = select_one(&selector, index, total, &product_id, &candidates).await;
                (index, selection)
            });
        }

        let mut slots: Vec<Option<Selection>> = vec![None; total];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, selection)) => slots[index] = Some(selection),
                Err(e) => tracing::error!("Record task failed: {}", e),
            }
        }

        slots
            .into_iter()
            .map(|slot| slot.unwrap_or(Selection::NotFound { attempts: Vec::new() }))
            .collect()
    }
}

async fn select_one(
    selector: &CandidateSelector,
    index: usize,
    total: usize,
    product_id: &str,
    candidates: &CandidateList,
) -> Selection {
    tracing::info!("Processing product {}/{}: {}", index + 1, total, product_id);
    tracing::info!("Found {} unique candidate URLs.", candidates.len());
    selector.select(candidates).await
}
