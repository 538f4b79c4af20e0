use serde::{Deserialize, Serialize};

use super::domain::{EmployeeId, ParameterId, RuleName, TriggerType};

/// Problems found while validating admin configuration into a snapshot.
///
/// Each issue isolates a single parameter or rule; the rest of the snapshot
/// stays usable.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigIssue {
    #[error("parameter {0} is defined more than once")]
    DuplicateParameter(ParameterId),
    #[error("parameter {parameter_id} is invalid: {reason}")]
    InvalidParameter {
        parameter_id: ParameterId,
        reason: String,
    },
    #[error("rule {0} is defined more than once")]
    DuplicateRule(RuleName),
    #[error("rule {rule_name} needs at least 2 members (found {count})")]
    TooFewMembers { rule_name: RuleName, count: usize },
    #[error("rule {rule_name} lists member {parameter_id} more than once")]
    DuplicateMember {
        rule_name: RuleName,
        parameter_id: ParameterId,
    },
    #[error("rule {rule_name} references unknown parameter {parameter_id}")]
    UnknownMember {
        rule_name: RuleName,
        parameter_id: ParameterId,
    },
    #[error("rule {rule_name} uses avg_dev_ge_t without a trigger_threshold")]
    ThresholdRequired { rule_name: RuleName },
    #[error("rule {rule_name} sets trigger_threshold but trigger {trigger_type:?} does not use one")]
    UnexpectedThreshold {
        rule_name: RuleName,
        trigger_type: TriggerType,
    },
    #[error("rule {rule_name} trigger_threshold {threshold} must be within (0, 1]")]
    ThresholdOutOfRange { rule_name: RuleName, threshold: f64 },
    #[error("rule {rule_name} combo_max {combo_max} must be a finite value >= 0")]
    InvalidComboMax { rule_name: RuleName, combo_max: f64 },
}

impl ConfigIssue {
    /// Name of the parameter or rule the issue was isolated to.
    pub fn subject(&self) -> &str {
        match self {
            ConfigIssue::DuplicateParameter(parameter_id)
            | ConfigIssue::InvalidParameter { parameter_id, .. } => parameter_id.as_str(),
            ConfigIssue::DuplicateRule(rule_name)
            | ConfigIssue::TooFewMembers { rule_name, .. }
            | ConfigIssue::DuplicateMember { rule_name, .. }
            | ConfigIssue::UnknownMember { rule_name, .. }
            | ConfigIssue::ThresholdRequired { rule_name }
            | ConfigIssue::UnexpectedThreshold { rule_name, .. }
            | ConfigIssue::ThresholdOutOfRange { rule_name, .. }
            | ConfigIssue::InvalidComboMax { rule_name, .. } => rule_name.as_str(),
        }
    }
}

/// Unit of work that can be skipped without affecting its siblings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ScoringUnit {
    Parameter(ParameterId),
    Rule(RuleName),
}

impl std::fmt::Display for ScoringUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScoringUnit::Parameter(id) => write!(f, "parameter {id}"),
            ScoringUnit::Rule(name) => write!(f, "rule {name}"),
        }
    }
}

/// Error taxonomy of the scoring engine.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScoringError {
    #[error(transparent)]
    Config(#[from] ConfigIssue),
    #[error("employee {employee_id} has no usable data for {unit}")]
    MissingMeasurement {
        employee_id: EmployeeId,
        unit: ScoringUnit,
    },
    #[error("parameter {parameter_id} has a degenerate reference range [{lo}, {hi}]; saturating deviations")]
    DegenerateRange {
        parameter_id: ParameterId,
        lo: f64,
        hi: f64,
    },
    #[error("employee {employee_id} health index {health_index} escaped bounds [{min_index}, {baseline}]")]
    InvariantViolation {
        employee_id: EmployeeId,
        health_index: f64,
        min_index: f64,
        baseline: f64,
    },
}

/// Why a scorable parameter did not contribute to an employee's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    MissingMeasurement,
    DuplicateMeasurement,
    NonFiniteValue,
}

impl ExclusionReason {
    pub const fn label(self) -> &'static str {
        match self {
            ExclusionReason::MissingMeasurement => "missing_measurement",
            ExclusionReason::DuplicateMeasurement => "duplicate_measurement",
            ExclusionReason::NonFiniteValue => "non_finite_value",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcludedParameter {
    pub parameter_id: ParameterId,
    pub reason: ExclusionReason,
}
