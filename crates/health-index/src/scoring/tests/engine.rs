use std::sync::Arc;

use super::common::*;
use crate::scoring::{
    ConfigSnapshot, ExclusionReason, FactorSource, ParameterId, RuleName, RuleStatus,
    ScoreBounds, ScoreStatus, ScoringEngine, ScoringError, TriggerType,
};

fn parameter_penalty(result: &crate::scoring::HealthIndexResult, id: &str) -> f64 {
    result.parameter_penalties[&ParameterId::new(id)].penalty
}

#[test]
fn high_bad_reading_saturates_at_pmax() {
    let engine = engine_with(vec![glucose()], Vec::new());
    let readings = vec![reading("e-1", "glucose", 120.0)];

    let result = engine.score(&employee("e-1"), &readings).expect("scored");

    assert_eq!(result.status, ScoreStatus::Scored);
    assert_close(parameter_penalty(&result, "glucose"), 50.0);
    assert_close(result.health_index.expect("index"), 50.0);
}

#[test]
fn low_bad_reading_scales_with_deviation() {
    let engine = engine_with(vec![hdl()], Vec::new());
    let readings = vec![reading("e-1", "hdl", 34.0)];

    let result = engine.score(&employee("e-1"), &readings).expect("scored");

    let outcome = &result.parameter_penalties[&ParameterId::new("hdl")];
    assert!(outcome.is_out_of_range);
    assert_close(outcome.deviation_ratio, 0.6);
    assert_close(outcome.penalty, 18.0);
    assert_close(result.health_index.expect("index"), 82.0);
}

#[test]
fn combination_over_remaining_members_stacks_and_clamps_to_floor() {
    let mut excluded = triglycerides();
    excluded.include_in_index = false;
    let engine = engine_with(vec![glucose(), hdl(), excluded], vec![metabolic_risk()]);
    let readings = vec![reading("e-1", "glucose", 120.0), reading("e-1", "hdl", 34.0)];

    let result = engine.score(&employee("e-1"), &readings).expect("scored");

    let rule = &result.rule_penalties[&RuleName::new("Metabolic Risk")];
    assert!(rule.triggered);
    assert_close(rule.penalty, 32.0);
    assert_close(result.total_penalty, 100.0);
    assert_close(result.health_index.expect("index"), 0.0);
}

#[test]
fn missing_member_reading_prevents_rule_from_firing() {
    let engine = engine();
    let readings = vec![reading("e-1", "glucose", 120.0), reading("e-1", "hdl", 34.0)];

    let result = engine.score(&employee("e-1"), &readings).expect("scored");

    let rule = &result.rule_penalties[&RuleName::new("Metabolic Risk")];
    assert!(!rule.triggered);
    assert_eq!(rule.penalty, 0.0);
    assert_close(result.health_index.expect("index"), 32.0);
    assert_eq!(result.excluded_parameters.len(), 1);
    assert_eq!(
        result.excluded_parameters[0].reason,
        ExclusionReason::MissingMeasurement
    );
}

#[test]
fn no_usable_readings_yields_insufficient_data() {
    let engine = engine();
    let readings = vec![reading("e-2", "glucose", 120.0)];

    let result = engine.score(&employee("e-1"), &readings).expect("scored");

    assert_eq!(result.status, ScoreStatus::InsufficientData);
    assert_eq!(result.health_index, None);
    assert!(result.parameter_penalties.is_empty());
    assert!(result.contributing_factors.is_empty());
    assert_eq!(result.excluded_parameters.len(), 3);
}

#[test]
fn deactivating_a_parameter_leaves_other_penalties_unchanged() {
    let readings = vec![
        reading("e-1", "glucose", 120.0),
        reading("e-1", "hdl", 34.0),
        reading("e-1", "triglycerides", 180.0),
    ];
    let before = engine_with(parameters(), Vec::new())
        .score(&employee("e-1"), &readings)
        .expect("scored");

    let mut inactive = glucose();
    inactive.is_active = false;
    let after = engine_with(vec![inactive, hdl(), triglycerides()], Vec::new())
        .score(&employee("e-1"), &readings)
        .expect("scored");

    assert!(!after.parameter_penalties.contains_key(&ParameterId::new("glucose")));
    for id in ["hdl", "triglycerides"] {
        assert_eq!(
            before.parameter_penalties[&ParameterId::new(id)],
            after.parameter_penalties[&ParameterId::new(id)]
        );
    }
    assert_close(
        after.health_index.expect("index") - before.health_index.expect("index"),
        50.0,
    );
}

#[test]
fn deactivating_a_rule_removes_only_its_penalty() {
    let readings = vec![
        reading("e-1", "glucose", 120.0),
        reading("e-1", "hdl", 34.0),
        reading("e-1", "triglycerides", 100.0),
    ];
    let glycemic_lipid = || {
        rule(
            "Glycemic Lipid",
            &["glucose", "hdl"],
            TriggerType::AllOut,
            None,
            15.0,
            false,
        )
    };
    let before = engine_with(parameters(), vec![metabolic_risk(), glycemic_lipid()])
        .score(&employee("e-1"), &readings)
        .expect("scored");

    let mut dormant = glycemic_lipid();
    dormant.is_active = false;
    let after = engine_with(parameters(), vec![metabolic_risk(), dormant])
        .score(&employee("e-1"), &readings)
        .expect("scored");

    let metabolic = RuleName::new("Metabolic Risk");
    let glycemic = RuleName::new("Glycemic Lipid");
    assert_eq!(before.parameter_penalties, after.parameter_penalties);
    assert_eq!(before.rule_penalties[&metabolic], after.rule_penalties[&metabolic]);
    assert_close(after.rule_penalties[&metabolic].penalty, 40.0 * 1.6 / 3.0);
    assert_close(before.rule_penalties[&glycemic].penalty, 15.0);
    assert!(!after.rule_penalties.contains_key(&glycemic));
    assert_close(before.total_penalty - after.total_penalty, 15.0);
}

#[test]
fn scoring_is_idempotent_for_one_snapshot() {
    let engine = engine();
    let readings = vec![
        reading("e-1", "glucose", 104.0),
        reading("e-1", "hdl", 37.0),
        reading("e-1", "triglycerides", 170.0),
    ];

    let first = engine.score(&employee("e-1"), &readings).expect("scored");
    let second = engine.score(&employee("e-1"), readings.iter().rev()).expect("scored");

    assert_eq!(first, second);
}

#[test]
fn penalties_beyond_baseline_clamp_to_min_index() {
    let engine = engine_with(
        vec![
            parameter("a", crate::scoring::Direction::HighBad, 0.0, 10.0, 80.0, 0.5),
            parameter("b", crate::scoring::Direction::HighBad, 0.0, 10.0, 80.0, 0.5),
        ],
        Vec::new(),
    );
    let readings = vec![reading("e-1", "a", 50.0), reading("e-1", "b", 50.0)];

    let result = engine.score(&employee("e-1"), &readings).expect("scored");

    assert_close(result.total_penalty, 160.0);
    assert_eq!(result.health_index, Some(0.0));
}

#[test]
fn in_range_readings_score_at_baseline() {
    let bounds = ScoreBounds::new(10.0, 1.0).expect("bounds");
    let engine = ScoringEngine::new(snapshot_with(parameters(), vec![metabolic_risk()]), bounds);
    let readings = vec![
        reading("e-1", "glucose", 85.0),
        reading("e-1", "hdl", 50.0),
        reading("e-1", "triglycerides", 90.0),
    ];

    let result = engine.score(&employee("e-1"), &readings).expect("scored");

    assert_eq!(result.health_index, Some(10.0));
    assert!(result.contributing_factors.is_empty());
}

#[test]
fn contributing_factors_rank_by_penalty_then_key() {
    let engine = engine_with(
        vec![
            parameter("beta", crate::scoring::Direction::HighBad, 0.0, 10.0, 20.0, 1.0),
            parameter("alpha", crate::scoring::Direction::HighBad, 0.0, 10.0, 20.0, 1.0),
            parameter("gamma", crate::scoring::Direction::HighBad, 0.0, 10.0, 5.0, 1.0),
        ],
        vec![rule(
            "alpha",
            &["alpha", "beta"],
            TriggerType::AllOut,
            None,
            20.0,
            false,
        )],
    );
    let readings = vec![
        reading("e-1", "alpha", 30.0),
        reading("e-1", "beta", 30.0),
        reading("e-1", "gamma", 30.0),
    ];

    let result = engine.score(&employee("e-1"), &readings).expect("scored");

    let order: Vec<FactorSource> = result
        .contributing_factors
        .iter()
        .map(|factor| factor.source.clone())
        .collect();
    assert_eq!(
        order,
        vec![
            FactorSource::Parameter(ParameterId::new("alpha")),
            FactorSource::Rule(RuleName::new("alpha")),
            FactorSource::Parameter(ParameterId::new("beta")),
            FactorSource::Parameter(ParameterId::new("gamma")),
        ]
    );
    assert!(result.contributing_factors[0].notes.contains("above reference"));
    assert!(result.contributing_factors[1]
        .notes
        .contains("all members out of range"));
}

#[test]
fn zero_penalty_out_of_range_is_not_a_contributing_factor() {
    let engine = engine_with(vec![glucose()], Vec::new());
    let readings = vec![reading("e-1", "glucose", 60.0)];

    let result = engine.score(&employee("e-1"), &readings).expect("scored");

    let outcome = &result.parameter_penalties[&ParameterId::new("glucose")];
    assert!(outcome.is_out_of_range);
    assert_eq!(outcome.penalty, 0.0);
    assert!(result.contributing_factors.is_empty());
    assert_eq!(result.health_index, Some(100.0));
}

#[test]
fn duplicate_and_non_finite_readings_are_excluded() {
    let engine = engine_with(parameters(), Vec::new());
    let readings = vec![
        reading("e-1", "glucose", 120.0),
        reading("e-1", "glucose", 90.0),
        reading("e-1", "hdl", f64::NAN),
        reading("e-1", "triglycerides", 100.0),
    ];

    let result = engine.score(&employee("e-1"), &readings).expect("scored");

    let reasons: Vec<(String, ExclusionReason)> = result
        .excluded_parameters
        .iter()
        .map(|excluded| (excluded.parameter_id.to_string(), excluded.reason))
        .collect();
    assert_eq!(
        reasons,
        vec![
            ("glucose".to_string(), ExclusionReason::DuplicateMeasurement),
            ("hdl".to_string(), ExclusionReason::NonFiniteValue),
        ]
    );
    assert_eq!(result.health_index, Some(100.0));
}

#[test]
fn invalid_rule_does_not_disturb_valid_scoring() {
    let broken = rule(
        "Broken",
        &["glucose", "hdl"],
        TriggerType::AvgDevGeT,
        None,
        10.0,
        false,
    );
    let engine = engine_with(parameters(), vec![metabolic_risk(), broken]);
    let readings = vec![
        reading("e-1", "glucose", 120.0),
        reading("e-1", "hdl", 34.0),
        reading("e-1", "triglycerides", 100.0),
    ];

    let result = engine.score(&employee("e-1"), &readings).expect("scored");

    assert_eq!(engine.snapshot().issues().len(), 1);
    assert!(!result.rule_penalties.contains_key(&RuleName::new("Broken")));
    let rule = &result.rule_penalties[&RuleName::new("Metabolic Risk")];
    assert!(rule.triggered);
    assert_close(rule.penalty, 40.0 * (1.0 + 0.6 + 0.0) / 3.0);
}

#[test]
fn escaped_bounds_are_reported_as_invariant_violation() {
    let bounds = ScoreBounds {
        baseline: 0.0,
        min_index: 10.0,
    };
    let snapshot = Arc::new(ConfigSnapshot::build(1, vec![glucose()], Vec::new()));
    let engine = ScoringEngine::new(snapshot, bounds);
    let readings = vec![reading("e-1", "glucose", 90.0)];

    let error = engine.score(&employee("e-1"), &readings).unwrap_err();

    assert!(matches!(error, ScoringError::InvariantViolation { .. }));
}

#[test]
fn rule_status_records_excluded_members() {
    let mut inactive = hdl();
    inactive.is_active = false;
    let engine = engine_with(
        vec![glucose(), inactive],
        vec![rule(
            "Pair",
            &["glucose", "hdl"],
            TriggerType::AllOut,
            None,
            10.0,
            false,
        )],
    );
    let readings = vec![reading("e-1", "glucose", 120.0)];
    let deviations =
        crate::scoring::classify(engine.snapshot(), &employee("e-1"), &readings);

    let evaluations =
        crate::scoring::evaluate_rules(engine.snapshot(), &employee("e-1"), &deviations);

    assert_eq!(
        evaluations[&RuleName::new("Pair")].status,
        RuleStatus::Inapplicable {
            excluded_members: vec![ParameterId::new("hdl")]
        }
    );
}

#[test]
fn result_carries_snapshot_revision() {
    let snapshot = Arc::new(ConfigSnapshot::build(42, parameters(), Vec::new()));
    let engine = ScoringEngine::new(snapshot, ScoreBounds::default());

    let result = engine
        .score(&employee("e-1"), &[reading("e-1", "glucose", 80.0)])
        .expect("scored");

    assert_eq!(result.config_revision, 42);
}
