//! Health Index scoring engine.
//!
//! Scoring is a pure function of a [`ConfigSnapshot`] and one employee's
//! measurements: the same snapshot and readings always produce the same
//! [`HealthIndexResult`]. Nothing here reads live configuration, the clock, or
//! any other ambient state.

mod aggregate;
mod batch;
mod classifier;
mod combination;
pub mod domain;
mod error;
mod penalty;
mod snapshot;

#[cfg(test)]
mod tests;

pub use aggregate::{
    aggregate, ContributingFactor, FactorSource, HealthIndexResult, ParameterOutcome,
    RulePenalty, ScoreBounds, ScoreStatus, BASELINE, MIN_INDEX,
};
pub use batch::{BatchError, BatchReport, BatchScorer, EmployeeFailure};
pub use classifier::{classify, DeviationSet};
pub use combination::{evaluate_rule, evaluate_rules, RuleEvaluation, RuleStatus};
pub use domain::{
    CombinationRule, Direction, EmployeeId, Gender, GenderRange, Measurement, Parameter,
    ParameterDeviation, ParameterId, ReferenceRange, RuleDefinition, RuleName, RuleTrigger,
    TriggerType,
};
pub use error::{ConfigIssue, ExcludedParameter, ExclusionReason, ScoringError, ScoringUnit};
pub use penalty::assess;
pub use snapshot::{ConfigSnapshot, SnapshotDocument};

use std::sync::Arc;

/// Stateless scorer bound to one immutable configuration snapshot.
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    snapshot: Arc<ConfigSnapshot>,
    bounds: ScoreBounds,
}

impl ScoringEngine {
    pub fn new(snapshot: Arc<ConfigSnapshot>, bounds: ScoreBounds) -> Self {
        Self { snapshot, bounds }
    }

    pub fn snapshot(&self) -> &ConfigSnapshot {
        &self.snapshot
    }

    /// Score one employee; measurements belonging to other employees are ignored.
    pub fn score<'a, I>(
        &self,
        employee_id: &EmployeeId,
        measurements: I,
    ) -> Result<HealthIndexResult, ScoringError>
    where
        I: IntoIterator<Item = &'a Measurement>,
    {
        let deviations = classify(&self.snapshot, employee_id, measurements);
        let rules = evaluate_rules(&self.snapshot, employee_id, &deviations);
        aggregate(&self.snapshot, self.bounds, employee_id, &deviations, &rules)
    }
}
