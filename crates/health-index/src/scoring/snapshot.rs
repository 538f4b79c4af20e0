use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::domain::{
    CombinationRule, Parameter, ParameterId, RuleDefinition, RuleName, RuleTrigger, TriggerType,
};
use super::error::{ConfigIssue, ScoringError};

/// Serialized form of the admin configuration handed to a scoring run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotDocument {
    #[serde(default)]
    pub revision: u64,
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub rules: Vec<RuleDefinition>,
}

/// Immutable, validated configuration captured at the start of a scoring run.
///
/// Invalid parameters and rules are dropped while building and recorded as
/// [`ConfigIssue`]s, so one bad admin edit never blocks the rest of a batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigSnapshot {
    revision: u64,
    parameters: BTreeMap<ParameterId, Parameter>,
    rules: BTreeMap<RuleName, CombinationRule>,
    issues: Vec<ConfigIssue>,
}

impl ConfigSnapshot {
    pub fn build(revision: u64, parameters: Vec<Parameter>, rules: Vec<RuleDefinition>) -> Self {
        let mut issues = Vec::new();

        let parameters = collect_parameters(parameters, &mut issues);
        let rules = collect_rules(rules, &parameters, &mut issues);

        for issue in &issues {
            warn!(revision, subject = issue.subject(), %issue, "skipping invalid configuration");
        }

        Self {
            revision,
            parameters,
            rules,
            issues,
        }
    }

    pub fn from_document(document: SnapshotDocument) -> Self {
        Self::build(document.revision, document.parameters, document.rules)
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn parameter(&self, parameter_id: &ParameterId) -> Option<&Parameter> {
        self.parameters.get(parameter_id)
    }

    pub fn parameters(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.values()
    }

    /// Parameters that are both active and included in the index, in id order.
    pub fn scorable_parameters(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.values().filter(|parameter| parameter.is_scorable())
    }

    pub fn rules(&self) -> impl Iterator<Item = &CombinationRule> {
        self.rules.values()
    }

    pub fn active_rules(&self) -> impl Iterator<Item = &CombinationRule> {
        self.rules.values().filter(|rule| rule.is_active)
    }

    pub fn issues(&self) -> &[ConfigIssue] {
        &self.issues
    }

    /// Round-trips the validated configuration back into its admin form.
    pub fn to_document(&self) -> SnapshotDocument {
        SnapshotDocument {
            revision: self.revision,
            parameters: self.parameters.values().cloned().collect(),
            rules: self.rules.values().map(rule_definition).collect(),
        }
    }
}

fn collect_parameters(
    parameters: Vec<Parameter>,
    issues: &mut Vec<ConfigIssue>,
) -> BTreeMap<ParameterId, Parameter> {
    let duplicates = duplicated(parameters.iter().map(|parameter| &parameter.parameter_id));
    for parameter_id in &duplicates {
        issues.push(ConfigIssue::DuplicateParameter(parameter_id.clone()));
    }

    let mut collected = BTreeMap::new();
    for parameter in parameters {
        if duplicates.contains(&parameter.parameter_id) {
            continue;
        }

        if let Some(reason) = parameter_defect(&parameter) {
            issues.push(ConfigIssue::InvalidParameter {
                parameter_id: parameter.parameter_id.clone(),
                reason,
            });
            continue;
        }

        let degenerate = std::iter::once(parameter.default_range)
            .chain(parameter.gender_ranges.iter().map(|range| range.range()))
            .find(|range| range.is_degenerate());
        if let Some(range) = degenerate {
            let warning = ScoringError::DegenerateRange {
                parameter_id: parameter.parameter_id.clone(),
                lo: range.lo,
                hi: range.hi,
            };
            warn!(%warning, "degenerate reference range configured");
        }

        collected.insert(parameter.parameter_id.clone(), parameter);
    }
    collected
}

fn parameter_defect(parameter: &Parameter) -> Option<String> {
    if !parameter.pmax.is_finite() || parameter.pmax < 0.0 {
        return Some(format!("pmax {} must be a finite value >= 0", parameter.pmax));
    }
    if !parameter.k_full.is_finite() || parameter.k_full <= 0.0 || parameter.k_full > 1.0 {
        return Some(format!("k_full {} must be within (0, 1]", parameter.k_full));
    }
    if !parameter.weight.is_finite() || parameter.weight <= 0.0 {
        return Some(format!("weight {} must be a finite value > 0", parameter.weight));
    }

    let default = parameter.default_range;
    if !default.lo.is_finite() || !default.hi.is_finite() {
        return Some("default range bounds must be finite".to_string());
    }

    let mut seen = BTreeSet::new();
    for range in &parameter.gender_ranges {
        if !range.lo.is_finite() || !range.hi.is_finite() {
            return Some(format!("{:?} range bounds must be finite", range.gender));
        }
        if !seen.insert(range.gender) {
            return Some(format!("{:?} range is defined more than once", range.gender));
        }
    }

    None
}

fn collect_rules(
    rules: Vec<RuleDefinition>,
    parameters: &BTreeMap<ParameterId, Parameter>,
    issues: &mut Vec<ConfigIssue>,
) -> BTreeMap<RuleName, CombinationRule> {
    let duplicates = duplicated(rules.iter().map(|rule| &rule.rule_name));
    for rule_name in &duplicates {
        issues.push(ConfigIssue::DuplicateRule(rule_name.clone()));
    }

    let mut collected = BTreeMap::new();
    for definition in rules {
        if duplicates.contains(&definition.rule_name) {
            continue;
        }
        match validate_rule(definition, parameters) {
            Ok(rule) => {
                collected.insert(rule.rule_name.clone(), rule);
            }
            Err(issue) => issues.push(issue),
        }
    }
    collected
}

fn validate_rule(
    definition: RuleDefinition,
    parameters: &BTreeMap<ParameterId, Parameter>,
) -> Result<CombinationRule, ConfigIssue> {
    let RuleDefinition {
        rule_name,
        members,
        trigger_type,
        trigger_threshold,
        combo_max,
        scale_by_avg,
        is_active,
    } = definition;

    if members.len() < 2 {
        return Err(ConfigIssue::TooFewMembers {
            rule_name,
            count: members.len(),
        });
    }

    let mut seen = BTreeSet::new();
    for member in &members {
        if !seen.insert(member) {
            return Err(ConfigIssue::DuplicateMember {
                rule_name,
                parameter_id: member.clone(),
            });
        }
        if !parameters.contains_key(member) {
            return Err(ConfigIssue::UnknownMember {
                rule_name,
                parameter_id: member.clone(),
            });
        }
    }

    let trigger = match (trigger_type, trigger_threshold) {
        (TriggerType::AvgDevGeT, None) => {
            return Err(ConfigIssue::ThresholdRequired { rule_name });
        }
        (TriggerType::AvgDevGeT, Some(threshold)) => {
            if !(threshold > 0.0 && threshold <= 1.0) {
                return Err(ConfigIssue::ThresholdOutOfRange {
                    rule_name,
                    threshold,
                });
            }
            RuleTrigger::AverageDeviationAtLeast { threshold }
        }
        (trigger_type, Some(_)) => {
            return Err(ConfigIssue::UnexpectedThreshold {
                rule_name,
                trigger_type,
            });
        }
        (TriggerType::AllOut, None) => RuleTrigger::AllOut,
        (TriggerType::AnyTwo, None) => RuleTrigger::AnyTwo,
    };

    if !combo_max.is_finite() || combo_max < 0.0 {
        return Err(ConfigIssue::InvalidComboMax {
            rule_name,
            combo_max,
        });
    }

    Ok(CombinationRule {
        rule_name,
        members,
        trigger,
        combo_max,
        scale_by_avg,
        is_active,
    })
}

fn rule_definition(rule: &CombinationRule) -> RuleDefinition {
    let (trigger_type, trigger_threshold) = match rule.trigger {
        RuleTrigger::AllOut => (TriggerType::AllOut, None),
        RuleTrigger::AnyTwo => (TriggerType::AnyTwo, None),
        RuleTrigger::AverageDeviationAtLeast { threshold } => {
            (TriggerType::AvgDevGeT, Some(threshold))
        }
    };

    RuleDefinition {
        rule_name: rule.rule_name.clone(),
        members: rule.members.clone(),
        trigger_type,
        trigger_threshold,
        combo_max: rule.combo_max,
        scale_by_avg: rule.scale_by_avg,
        is_active: rule.is_active,
    }
}

fn duplicated<'a, T>(ids: impl Iterator<Item = &'a T>) -> BTreeSet<T>
where
    T: Ord + Clone + 'a,
{
    let mut seen = BTreeSet::new();
    let mut duplicates = BTreeSet::new();
    for id in ids {
        if !seen.insert(id) {
            duplicates.insert(id.clone());
        }
    }
    duplicates
}
