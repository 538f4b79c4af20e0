use std::sync::Arc;

use crate::scoring::{
    ConfigSnapshot, Direction, EmployeeId, Measurement, Parameter, ParameterId, ReferenceRange,
    RuleDefinition, RuleName, ScoreBounds, ScoringEngine, TriggerType,
};

pub(super) fn parameter(
    id: &str,
    direction: Direction,
    lo: f64,
    hi: f64,
    pmax: f64,
    k_full: f64,
) -> Parameter {
    Parameter {
        parameter_id: ParameterId::new(id),
        name: id.to_uppercase(),
        category: Some("metabolic".to_string()),
        direction,
        default_range: ReferenceRange::new(lo, hi),
        gender_ranges: Vec::new(),
        pmax,
        k_full,
        weight: 1.0,
        include_in_index: true,
        is_active: true,
    }
}

pub(super) fn glucose() -> Parameter {
    parameter("glucose", Direction::HighBad, 70.0, 100.0, 50.0, 0.25)
}

pub(super) fn hdl() -> Parameter {
    parameter("hdl", Direction::LowBad, 40.0, 60.0, 30.0, 0.5)
}

pub(super) fn triglycerides() -> Parameter {
    parameter("triglycerides", Direction::HighBad, 0.0, 150.0, 30.0, 0.5)
}

pub(super) fn parameters() -> Vec<Parameter> {
    vec![glucose(), hdl(), triglycerides()]
}

pub(super) fn rule(
    name: &str,
    members: &[&str],
    trigger_type: TriggerType,
    trigger_threshold: Option<f64>,
    combo_max: f64,
    scale_by_avg: bool,
) -> RuleDefinition {
    RuleDefinition {
        rule_name: RuleName::new(name),
        members: members.iter().map(|member| ParameterId::new(*member)).collect(),
        trigger_type,
        trigger_threshold,
        combo_max,
        scale_by_avg,
        is_active: true,
    }
}

pub(super) fn metabolic_risk() -> RuleDefinition {
    rule(
        "Metabolic Risk",
        &["glucose", "hdl", "triglycerides"],
        TriggerType::AnyTwo,
        None,
        40.0,
        true,
    )
}

pub(super) fn snapshot_with(parameters: Vec<Parameter>, rules: Vec<RuleDefinition>) -> Arc<ConfigSnapshot> {
    Arc::new(ConfigSnapshot::build(1, parameters, rules))
}

pub(super) fn engine_with(parameters: Vec<Parameter>, rules: Vec<RuleDefinition>) -> ScoringEngine {
    ScoringEngine::new(snapshot_with(parameters, rules), ScoreBounds::default())
}

pub(super) fn engine() -> ScoringEngine {
    engine_with(parameters(), vec![metabolic_risk()])
}

pub(super) fn employee(id: &str) -> EmployeeId {
    EmployeeId::new(id)
}

pub(super) fn reading(employee: &str, parameter: &str, value: f64) -> Measurement {
    Measurement::new(employee, parameter, value, None)
}

pub(super) fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}
