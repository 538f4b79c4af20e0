use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::classifier::DeviationSet;
use super::combination::{RuleEvaluation, RuleStatus};
use super::domain::{EmployeeId, ParameterDeviation, ParameterId, RuleName};
use super::error::{ExcludedParameter, ScoringError};
use super::snapshot::ConfigSnapshot;

/// Index reported for an employee with no accumulated penalty.
pub const BASELINE: f64 = 100.0;
/// Floor of the per-employee index after clamping.
pub const MIN_INDEX: f64 = 0.0;

/// Bounds the aggregated index is clamped into.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBounds {
    pub baseline: f64,
    pub min_index: f64,
}

impl ScoreBounds {
    pub fn new(baseline: f64, min_index: f64) -> Option<Self> {
        if baseline.is_finite() && min_index.is_finite() && baseline > min_index {
            Some(Self {
                baseline,
                min_index,
            })
        } else {
            None
        }
    }

    pub fn span(&self) -> f64 {
        self.baseline - self.min_index
    }
}

impl Default for ScoreBounds {
    fn default() -> Self {
        Self {
            baseline: BASELINE,
            min_index: MIN_INDEX,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreStatus {
    Scored,
    InsufficientData,
}

/// Per-parameter breakdown entry carried on the result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterOutcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub value: f64,
    pub is_out_of_range: bool,
    pub deviation_ratio: f64,
    pub penalty: f64,
}

/// Per-rule breakdown entry carried on the result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RulePenalty {
    pub triggered: bool,
    pub penalty: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum FactorSource {
    Parameter(ParameterId),
    Rule(RuleName),
}

impl FactorSource {
    fn key(&self) -> &str {
        match self {
            FactorSource::Parameter(id) => id.as_str(),
            FactorSource::Rule(name) => name.as_str(),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            FactorSource::Parameter(_) => 0,
            FactorSource::Rule(_) => 1,
        }
    }
}

/// Nonzero penalty source, ranked for user-facing explanation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributingFactor {
    pub source: FactorSource,
    pub label: String,
    pub penalty: f64,
    pub notes: String,
}

/// Explainable Health Index for one employee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthIndexResult {
    pub employee_id: EmployeeId,
    pub status: ScoreStatus,
    /// `None` whenever `status` is `insufficient_data`.
    pub health_index: Option<f64>,
    pub total_penalty: f64,
    pub parameter_penalties: BTreeMap<ParameterId, ParameterOutcome>,
    pub rule_penalties: BTreeMap<RuleName, RulePenalty>,
    pub contributing_factors: Vec<ContributingFactor>,
    pub excluded_parameters: Vec<ExcludedParameter>,
    pub config_revision: u64,
}

impl HealthIndexResult {
    pub fn is_scored(&self) -> bool {
        self.status == ScoreStatus::Scored
    }
}

/// Folds deviations and rule outcomes into a bounded, explainable result.
pub fn aggregate(
    snapshot: &ConfigSnapshot,
    bounds: ScoreBounds,
    employee_id: &EmployeeId,
    deviations: &DeviationSet,
    rules: &BTreeMap<RuleName, RuleEvaluation>,
) -> Result<HealthIndexResult, ScoringError> {
    let parameter_penalties: BTreeMap<ParameterId, ParameterOutcome> = deviations
        .deviations()
        .map(|deviation| {
            let category = snapshot
                .parameter(&deviation.parameter_id)
                .and_then(|parameter| parameter.category.clone());
            (
                deviation.parameter_id.clone(),
                ParameterOutcome {
                    category,
                    value: deviation.value,
                    is_out_of_range: deviation.is_out_of_range,
                    deviation_ratio: deviation.deviation_ratio,
                    penalty: deviation.penalty_points,
                },
            )
        })
        .collect();

    let rule_penalties: BTreeMap<RuleName, RulePenalty> = rules
        .iter()
        .map(|(name, evaluation)| {
            (
                name.clone(),
                RulePenalty {
                    triggered: evaluation.triggered(),
                    penalty: evaluation.penalty,
                },
            )
        })
        .collect();

    let excluded_parameters = deviations.excluded().to_vec();

    if deviations.is_empty() {
        return Ok(HealthIndexResult {
            employee_id: employee_id.clone(),
            status: ScoreStatus::InsufficientData,
            health_index: None,
            total_penalty: 0.0,
            parameter_penalties,
            rule_penalties,
            contributing_factors: Vec::new(),
            excluded_parameters,
            config_revision: snapshot.revision(),
        });
    }

    let parameter_total: f64 = deviations
        .deviations()
        .map(|deviation| deviation.penalty_points)
        .sum();
    let rule_total: f64 = rules
        .values()
        .filter(|evaluation| evaluation.triggered())
        .map(|evaluation| evaluation.penalty)
        .sum();
    let total_penalty = parameter_total + rule_total;

    let unclamped = bounds.baseline - total_penalty;
    let health_index = unclamped.max(bounds.min_index).min(bounds.baseline);
    if !total_penalty.is_finite()
        || !(health_index >= bounds.min_index && health_index <= bounds.baseline)
    {
        return Err(ScoringError::InvariantViolation {
            employee_id: employee_id.clone(),
            health_index: unclamped,
            min_index: bounds.min_index,
            baseline: bounds.baseline,
        });
    }

    let contributing_factors = rank_factors(snapshot, deviations, rules);

    Ok(HealthIndexResult {
        employee_id: employee_id.clone(),
        status: ScoreStatus::Scored,
        health_index: Some(health_index),
        total_penalty,
        parameter_penalties,
        rule_penalties,
        contributing_factors,
        excluded_parameters,
        config_revision: snapshot.revision(),
    })
}

fn rank_factors(
    snapshot: &ConfigSnapshot,
    deviations: &DeviationSet,
    rules: &BTreeMap<RuleName, RuleEvaluation>,
) -> Vec<ContributingFactor> {
    let parameters = deviations
        .deviations()
        .filter(|deviation| deviation.penalty_points > 0.0)
        .map(|deviation| parameter_factor(snapshot, deviation));

    let combos = rules
        .values()
        .filter(|evaluation| evaluation.triggered() && evaluation.penalty > 0.0)
        .map(|evaluation| rule_factor(snapshot, evaluation));

    let mut factors: Vec<ContributingFactor> = parameters.chain(combos).collect();
    factors.sort_by(|left, right| {
        right
            .penalty
            .total_cmp(&left.penalty)
            .then_with(|| left.source.key().cmp(right.source.key()))
            .then_with(|| left.source.rank().cmp(&right.source.rank()))
    });
    factors
}

fn parameter_factor(snapshot: &ConfigSnapshot, deviation: &ParameterDeviation) -> ContributingFactor {
    let label = snapshot
        .parameter(&deviation.parameter_id)
        .map(|parameter| parameter.name.clone())
        .unwrap_or_else(|| deviation.parameter_id.to_string());

    let range = deviation.range;
    let side = match deviation.value.partial_cmp(&range.hi) {
        Some(Ordering::Greater) => "above",
        _ => "below",
    };
    let notes = if deviation.degenerate_range {
        format!(
            "value {:.2} outside degenerate reference {:.2}-{:.2}; penalty saturated",
            deviation.value, range.lo, range.hi
        )
    } else {
        format!(
            "value {:.2} {} reference {:.2}-{:.2} (deviation {:.0}% of saturation)",
            deviation.value,
            side,
            range.lo,
            range.hi,
            deviation.deviation_ratio * 100.0
        )
    };

    ContributingFactor {
        source: FactorSource::Parameter(deviation.parameter_id.clone()),
        label,
        penalty: deviation.penalty_points,
        notes,
    }
}

fn rule_factor(snapshot: &ConfigSnapshot, evaluation: &RuleEvaluation) -> ContributingFactor {
    let trigger = snapshot
        .rules()
        .find(|rule| rule.rule_name == evaluation.rule_name)
        .map(|rule| rule.trigger.describe())
        .unwrap_or_else(|| "combination triggered".to_string());

    let notes = match (&evaluation.status, evaluation.mean_deviation) {
        (RuleStatus::Triggered, Some(mean)) => format!(
            "{trigger}; {} member(s) out of range, mean deviation {:.0}%",
            evaluation.out_of_range_members,
            mean * 100.0
        ),
        _ => trigger,
    };

    ContributingFactor {
        source: FactorSource::Rule(evaluation.rule_name.clone()),
        label: evaluation.rule_name.to_string(),
        penalty: evaluation.penalty,
        notes,
    }
}
