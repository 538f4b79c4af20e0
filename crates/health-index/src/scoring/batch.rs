use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::aggregate::{HealthIndexResult, ScoreStatus};
use super::domain::{EmployeeId, Measurement};
use super::ScoringEngine;

/// Employee whose computation failed; siblings are unaffected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeFailure {
    pub employee_id: EmployeeId,
    pub error: String,
}

/// Results of scoring one batch against one configuration snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub config_revision: u64,
    pub results: Vec<HealthIndexResult>,
    pub failures: Vec<EmployeeFailure>,
    /// Employees never started because the batch was cancelled.
    pub unscored_employees: Vec<EmployeeId>,
    pub cancelled: bool,
}

impl BatchReport {
    pub fn scored(&self) -> impl Iterator<Item = &HealthIndexResult> {
        self.results.iter().filter(|result| result.is_scored())
    }

    pub fn insufficient_data(&self) -> impl Iterator<Item = &HealthIndexResult> {
        self.results
            .iter()
            .filter(|result| result.status == ScoreStatus::InsufficientData)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("failed to build scoring worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

enum EmployeeRun {
    Finished(Box<HealthIndexResult>),
    Failed(EmployeeFailure),
    NotStarted(EmployeeId),
}

/// Scores many employees on a bounded worker pool.
///
/// Employees are independent, so they are fanned out across the pool; the
/// report is always ordered by employee id regardless of scheduling.
pub struct BatchScorer {
    pool: rayon::ThreadPool,
}

impl BatchScorer {
    /// `workers == 0` sizes the pool to the host's available parallelism.
    pub fn new(workers: usize) -> Result<Self, BatchError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|index| format!("health-index-{index}"))
            .build()?;
        Ok(Self { pool })
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub fn score(&self, engine: &ScoringEngine, measurements: &[Measurement]) -> BatchReport {
        self.score_until(engine, measurements, &AtomicBool::new(false))
    }

    /// Scores the batch, checking `cancel` before each employee starts.
    ///
    /// An employee already in progress always runs to completion.
    pub fn score_until(
        &self,
        engine: &ScoringEngine,
        measurements: &[Measurement],
        cancel: &AtomicBool,
    ) -> BatchReport {
        let mut grouped: BTreeMap<&EmployeeId, Vec<&Measurement>> = BTreeMap::new();
        for measurement in measurements {
            grouped
                .entry(&measurement.employee_id)
                .or_default()
                .push(measurement);
        }
        let employees: Vec<(&EmployeeId, Vec<&Measurement>)> = grouped.into_iter().collect();

        let runs: Vec<EmployeeRun> = self.pool.install(|| {
            employees
                .par_iter()
                .map(|(employee_id, readings)| {
                    if cancel.load(Ordering::Acquire) {
                        return EmployeeRun::NotStarted((*employee_id).clone());
                    }
                    match engine.score(employee_id, readings.iter().copied()) {
                        Ok(result) => EmployeeRun::Finished(Box::new(result)),
                        Err(error) => {
                            warn!(%employee_id, %error, "employee scoring failed");
                            EmployeeRun::Failed(EmployeeFailure {
                                employee_id: (*employee_id).clone(),
                                error: error.to_string(),
                            })
                        }
                    }
                })
                .collect()
        });

        let mut report = BatchReport {
            config_revision: engine.snapshot().revision(),
            results: Vec::new(),
            failures: Vec::new(),
            unscored_employees: Vec::new(),
            cancelled: false,
        };
        for run in runs {
            match run {
                EmployeeRun::Finished(result) => report.results.push(*result),
                EmployeeRun::Failed(failure) => report.failures.push(failure),
                EmployeeRun::NotStarted(employee_id) => {
                    report.cancelled = true;
                    report.unscored_employees.push(employee_id);
                }
            }
        }

        info!(
            revision = report.config_revision,
            workers = self.workers(),
            scored = report.scored().count(),
            insufficient = report.insufficient_data().count(),
            failed = report.failures.len(),
            unscored = report.unscored_employees.len(),
            "health index batch complete"
        );

        report
    }
}
