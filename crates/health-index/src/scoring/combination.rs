use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::classifier::DeviationSet;
use super::domain::{CombinationRule, EmployeeId, ParameterId, RuleName, RuleTrigger};
use super::error::{ScoringError, ScoringUnit};
use super::snapshot::ConfigSnapshot;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RuleStatus {
    Triggered,
    NotTriggered,
    /// An eligible member had no deviation record, so the rule was not evaluated.
    Skipped { missing_members: Vec<ParameterId> },
    /// Fewer than two members remain once configuration-excluded parameters are dropped.
    Inapplicable { excluded_members: Vec<ParameterId> },
}

/// Outcome of one active rule for one employee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleEvaluation {
    pub rule_name: RuleName,
    #[serde(flatten)]
    pub status: RuleStatus,
    pub penalty: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_deviation: Option<f64>,
    pub out_of_range_members: usize,
}

impl RuleEvaluation {
    pub fn triggered(&self) -> bool {
        matches!(self.status, RuleStatus::Triggered)
    }
}

/// Evaluates every active combination rule against one employee's deviations.
///
/// Rules are independent of each other; overlapping member sets may all fire.
pub fn evaluate_rules(
    snapshot: &ConfigSnapshot,
    employee_id: &EmployeeId,
    deviations: &DeviationSet,
) -> BTreeMap<RuleName, RuleEvaluation> {
    snapshot
        .active_rules()
        .map(|rule| {
            let evaluation = evaluate_rule(snapshot, rule, employee_id, deviations);
            (rule.rule_name.clone(), evaluation)
        })
        .collect()
}

/// Members whose parameter is inactive or excluded from the index are dropped
/// from the rule. Any remaining member without a deviation record skips the
/// rule entirely: partial data never fires a combination.
pub fn evaluate_rule(
    snapshot: &ConfigSnapshot,
    rule: &CombinationRule,
    employee_id: &EmployeeId,
    deviations: &DeviationSet,
) -> RuleEvaluation {
    let mut members = Vec::with_capacity(rule.members.len());
    let mut missing_members = Vec::new();
    let mut excluded_members = Vec::new();
    for member in &rule.members {
        let scorable = snapshot
            .parameter(member)
            .map(|parameter| parameter.is_scorable())
            .unwrap_or(false);
        if !scorable {
            excluded_members.push(member.clone());
            continue;
        }
        match deviations.get(member) {
            Some(deviation) => members.push(deviation),
            None => missing_members.push(member.clone()),
        }
    }

    if missing_members.is_empty() && members.len() < 2 {
        debug!(
            %employee_id,
            rule = %rule.rule_name,
            excluded = excluded_members.len(),
            "combination rule has too few eligible members"
        );
        return RuleEvaluation {
            rule_name: rule.rule_name.clone(),
            status: RuleStatus::Inapplicable { excluded_members },
            penalty: 0.0,
            mean_deviation: None,
            out_of_range_members: 0,
        };
    }

    if !missing_members.is_empty() {
        let skipped = ScoringError::MissingMeasurement {
            employee_id: employee_id.clone(),
            unit: ScoringUnit::Rule(rule.rule_name.clone()),
        };
        debug!(missing = missing_members.len(), %skipped, "combination rule skipped");
        return RuleEvaluation {
            rule_name: rule.rule_name.clone(),
            status: RuleStatus::Skipped { missing_members },
            penalty: 0.0,
            mean_deviation: None,
            out_of_range_members: 0,
        };
    }

    let out_of_range_members = members
        .iter()
        .filter(|deviation| deviation.is_out_of_range)
        .count();
    let mean_deviation = members
        .iter()
        .map(|deviation| deviation.deviation_ratio)
        .sum::<f64>()
        / members.len() as f64;

    let triggered = match rule.trigger {
        RuleTrigger::AllOut => out_of_range_members == members.len(),
        RuleTrigger::AnyTwo => out_of_range_members >= 2,
        RuleTrigger::AverageDeviationAtLeast { threshold } => mean_deviation >= threshold,
    };

    let (status, penalty) = if triggered {
        let penalty = if rule.scale_by_avg {
            (rule.combo_max * mean_deviation).min(rule.combo_max)
        } else {
            rule.combo_max
        };
        (RuleStatus::Triggered, penalty)
    } else {
        (RuleStatus::NotTriggered, 0.0)
    };

    RuleEvaluation {
        rule_name: rule.rule_name.clone(),
        status,
        penalty,
        mean_deviation: Some(mean_deviation),
        out_of_range_members,
    }
}
