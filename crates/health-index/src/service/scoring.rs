use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::store::{ConfigStore, StoreError};
use crate::rollup::{rollup, ChqRollup, ParticipationCounts, ReportingPeriod, RollupError};
use crate::scoring::{
    BatchError, BatchReport, BatchScorer, ConfigSnapshot, Measurement, ScoreBounds, ScoringEngine,
    SnapshotDocument,
};

/// Service composing the configuration store, the engine, and the worker pool.
pub struct ScoringService<S> {
    store: Arc<S>,
    bounds: ScoreBounds,
    scorer: BatchScorer,
}

impl<S> ScoringService<S>
where
    S: ConfigStore + 'static,
{
    pub fn new(store: Arc<S>, bounds: ScoreBounds, workers: usize) -> Result<Self, ScoringServiceError> {
        Ok(Self {
            store,
            bounds,
            scorer: BatchScorer::new(workers)?,
        })
    }

    pub fn current_config(&self) -> Result<SnapshotSummary, ScoringServiceError> {
        let snapshot = self.store.snapshot()?;
        Ok(SnapshotSummary::from(snapshot.as_ref()))
    }

    pub fn replace_config(
        &self,
        document: SnapshotDocument,
    ) -> Result<SnapshotSummary, ScoringServiceError> {
        let snapshot = self.store.replace(document)?;
        Ok(SnapshotSummary::from(snapshot.as_ref()))
    }

    /// Score a batch against the configuration as it stands right now.
    pub fn score_batch(
        &self,
        measurements: &[Measurement],
    ) -> Result<BatchReport, ScoringServiceError> {
        self.score_batch_until(measurements, &AtomicBool::new(false))
    }

    /// The snapshot is captured once, before the first employee is scored;
    /// configuration replaced mid-run does not reach this batch.
    pub fn score_batch_until(
        &self,
        measurements: &[Measurement],
        cancel: &AtomicBool,
    ) -> Result<BatchReport, ScoringServiceError> {
        let snapshot = self.store.snapshot()?;
        let engine = ScoringEngine::new(snapshot, self.bounds);
        Ok(self.scorer.score_until(&engine, measurements, cancel))
    }

    /// Score a company's batch and roll it up into the CHQ.
    pub fn company_rollup(
        &self,
        request: RollupRequest,
    ) -> Result<CompanyRollup, ScoringServiceError> {
        let RollupRequest {
            company_id,
            year,
            enrolled,
            screened,
            measurements,
        } = request;

        let report = self.score_batch(&measurements)?;
        let rollup = rollup(
            ReportingPeriod { company_id, year },
            ParticipationCounts { enrolled, screened },
            &report.results,
            report.failures.len(),
            self.bounds,
        )?;

        Ok(CompanyRollup { report, rollup })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollupRequest {
    pub company_id: String,
    pub year: i32,
    pub enrolled: u32,
    pub screened: u32,
    pub measurements: Vec<Measurement>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyRollup {
    pub report: BatchReport,
    pub rollup: ChqRollup,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigIssueView {
    pub subject: String,
    pub message: String,
}

/// Public description of a configuration snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotSummary {
    pub revision: u64,
    pub parameters: usize,
    pub scorable_parameters: usize,
    pub rules: usize,
    pub active_rules: usize,
    pub issues: Vec<ConfigIssueView>,
}

impl From<&ConfigSnapshot> for SnapshotSummary {
    fn from(snapshot: &ConfigSnapshot) -> Self {
        Self {
            revision: snapshot.revision(),
            parameters: snapshot.parameters().count(),
            scorable_parameters: snapshot.scorable_parameters().count(),
            rules: snapshot.rules().count(),
            active_rules: snapshot.active_rules().count(),
            issues: snapshot
                .issues()
                .iter()
                .map(|issue| ConfigIssueView {
                    subject: issue.subject().to_string(),
                    message: issue.to_string(),
                })
                .collect(),
        }
    }
}

/// Error raised by the scoring service.
#[derive(Debug, thiserror::Error)]
pub enum ScoringServiceError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Batch(#[from] BatchError),
    #[error(transparent)]
    Rollup(#[from] RollupError),
}
