use health_index::config::ScoringConfig;
use health_index::error::AppError;
use health_index::loader::read_snapshot_path;
use health_index::scoring::{
    ConfigSnapshot, Direction, Gender, GenderRange, Measurement, Parameter, ParameterId,
    ReferenceRange, RuleDefinition, RuleName, SnapshotDocument, TriggerType,
};
use health_index::service::InMemoryConfigStore;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Store seeded from `SCORING_CONFIG_PATH`, or empty until an admin pushes a snapshot.
pub(crate) fn seed_store(config: &ScoringConfig) -> Result<InMemoryConfigStore, AppError> {
    let Some(path) = config.snapshot_path.as_ref() else {
        warn!("no scoring configuration path set; starting with an empty snapshot");
        return Ok(InMemoryConfigStore::default());
    };

    let snapshot = read_snapshot_path(path)?;
    info!(
        path = %path.display(),
        revision = snapshot.revision(),
        parameters = snapshot.parameters().count(),
        rules = snapshot.rules().count(),
        issues = snapshot.issues().len(),
        "loaded scoring configuration"
    );
    Ok(InMemoryConfigStore::new(snapshot))
}

fn parameter(
    id: &str,
    name: &str,
    category: &str,
    direction: Direction,
    range: (f64, f64),
    pmax: f64,
    k_full: f64,
) -> Parameter {
    Parameter {
        parameter_id: ParameterId::new(id),
        name: name.to_string(),
        category: Some(category.to_string()),
        direction,
        default_range: ReferenceRange::new(range.0, range.1),
        gender_ranges: Vec::new(),
        pmax,
        k_full,
        weight: 1.0,
        include_in_index: true,
        is_active: true,
    }
}

fn combination(
    name: &str,
    members: &[&str],
    trigger_type: TriggerType,
    trigger_threshold: Option<f64>,
    combo_max: f64,
) -> RuleDefinition {
    RuleDefinition {
        rule_name: RuleName::new(name),
        members: members.iter().map(|member| ParameterId::new(*member)).collect(),
        trigger_type,
        trigger_threshold,
        combo_max,
        scale_by_avg: true,
        is_active: true,
    }
}

/// Reference panel used by the demo and for local smoke testing.
pub(crate) fn sample_document() -> SnapshotDocument {
    let mut hdl = parameter(
        "hdl",
        "HDL Cholesterol",
        "lipids",
        Direction::LowBad,
        (40.0, 60.0),
        30.0,
        0.5,
    );
    hdl.gender_ranges = vec![GenderRange {
        gender: Gender::Female,
        lo: 50.0,
        hi: 70.0,
    }];

    let mut waist = parameter(
        "waist",
        "Waist Circumference",
        "anthropometric",
        Direction::HighBad,
        (60.0, 94.0),
        15.0,
        0.3,
    );
    waist.gender_ranges = vec![GenderRange {
        gender: Gender::Female,
        lo: 55.0,
        hi: 80.0,
    }];

    SnapshotDocument {
        revision: 1,
        parameters: vec![
            parameter(
                "glucose",
                "Fasting Glucose",
                "metabolic",
                Direction::HighBad,
                (70.0, 100.0),
                50.0,
                0.25,
            ),
            hdl,
            parameter(
                "triglycerides",
                "Triglycerides",
                "lipids",
                Direction::HighBad,
                (0.0, 150.0),
                30.0,
                0.5,
            ),
            parameter(
                "systolic",
                "Systolic Blood Pressure",
                "cardiovascular",
                Direction::HighBad,
                (90.0, 120.0),
                40.0,
                0.5,
            ),
            parameter(
                "bmi",
                "Body Mass Index",
                "anthropometric",
                Direction::TwoSided,
                (18.5, 25.0),
                20.0,
                0.6,
            ),
            waist,
        ],
        rules: vec![
            combination(
                "Metabolic Risk",
                &["glucose", "hdl", "triglycerides"],
                TriggerType::AnyTwo,
                None,
                40.0,
            ),
            combination(
                "Central Adiposity",
                &["bmi", "waist"],
                TriggerType::AllOut,
                None,
                15.0,
            ),
            combination(
                "Cardiometabolic Load",
                &["glucose", "systolic", "bmi"],
                TriggerType::AvgDevGeT,
                Some(0.5),
                25.0,
            ),
        ],
    }
}

pub(crate) fn sample_snapshot() -> ConfigSnapshot {
    ConfigSnapshot::from_document(sample_document())
}

/// Synthetic screening roster spanning healthy, at-risk, and incomplete employees.
pub(crate) fn sample_measurements() -> Vec<Measurement> {
    let rows: [(&str, Option<Gender>, &[(&str, f64)]); 5] = [
        (
            "emp-001",
            Some(Gender::Female),
            &[
                ("glucose", 88.0),
                ("hdl", 62.0),
                ("triglycerides", 95.0),
                ("systolic", 112.0),
                ("bmi", 22.4),
                ("waist", 74.0),
            ],
        ),
        (
            "emp-002",
            Some(Gender::Male),
            &[
                ("glucose", 118.0),
                ("hdl", 36.0),
                ("triglycerides", 210.0),
                ("systolic", 138.0),
                ("bmi", 31.2),
                ("waist", 108.0),
            ],
        ),
        (
            "emp-003",
            Some(Gender::Male),
            &[
                ("glucose", 96.0),
                ("hdl", 44.0),
                ("triglycerides", 160.0),
                ("systolic", 124.0),
                ("bmi", 26.1),
                ("waist", 92.0),
            ],
        ),
        (
            "emp-004",
            None,
            &[("glucose", 104.0), ("systolic", 119.0)],
        ),
        ("emp-005", Some(Gender::Female), &[("cortisol", 14.0)]),
    ];

    rows.iter()
        .flat_map(|(employee, gender, readings)| {
            readings.iter().map(move |(parameter, value)| {
                Measurement::new(*employee, *parameter, *value, *gender)
            })
        })
        .collect()
}
