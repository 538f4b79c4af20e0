use serde::{Deserialize, Serialize};

/// Identifier wrapper for configured biomarker parameters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterId(pub String);

impl ParameterId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ParameterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique name of a combination rule.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleName(pub String);

impl RuleName {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RuleName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmployeeId(pub String);

impl EmployeeId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }
}

impl std::fmt::Display for EmployeeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Gender as normalized by the upstream ingestion pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
}

/// Which side of the reference interval is penalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    HighBad,
    LowBad,
    TwoSided,
}

/// Closed reference interval `[lo, hi]`; both bounds count as normal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRange {
    pub lo: f64,
    pub hi: f64,
}

impl ReferenceRange {
    pub const fn new(lo: f64, hi: f64) -> Self {
        Self { lo, hi }
    }

    /// `hi <= lo` leaves no width to normalize deviations against.
    pub fn is_degenerate(&self) -> bool {
        self.hi <= self.lo
    }

    pub fn width(&self) -> f64 {
        self.hi - self.lo
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.lo && value <= self.hi
    }
}

/// Gender-specific override of a parameter's default range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenderRange {
    pub gender: Gender,
    pub lo: f64,
    pub hi: f64,
}

impl GenderRange {
    pub fn range(&self) -> ReferenceRange {
        ReferenceRange::new(self.lo, self.hi)
    }
}

/// Admin-configured biomarker parameter metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub parameter_id: ParameterId,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    pub direction: Direction,
    pub default_range: ReferenceRange,
    #[serde(default)]
    pub gender_ranges: Vec<GenderRange>,
    pub pmax: f64,
    pub k_full: f64,
    pub weight: f64,
    #[serde(default = "default_true")]
    pub include_in_index: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl Parameter {
    /// Only active parameters that count toward the index are ever scored.
    pub fn is_scorable(&self) -> bool {
        self.include_in_index && self.is_active
    }

    pub fn range_for(&self, gender: Option<Gender>) -> ReferenceRange {
        gender
            .and_then(|gender| {
                self.gender_ranges
                    .iter()
                    .find(|candidate| candidate.gender == gender)
            })
            .map(GenderRange::range)
            .unwrap_or(self.default_range)
    }

    /// Upper bound for the penalty a single measurement can contribute.
    pub fn max_penalty(&self) -> f64 {
        self.pmax * self.weight
    }
}

fn default_true() -> bool {
    true
}

/// Condition family a combination rule evaluates, as stored by the admin surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    AllOut,
    AnyTwo,
    AvgDevGeT,
}

/// Combination rule exactly as the admin configuration surface records it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDefinition {
    pub rule_name: RuleName,
    pub members: Vec<ParameterId>,
    pub trigger_type: TriggerType,
    #[serde(default)]
    pub trigger_threshold: Option<f64>,
    pub combo_max: f64,
    #[serde(default)]
    pub scale_by_avg: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Validated trigger; a threshold only exists for the averaging trigger.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleTrigger {
    AllOut,
    AnyTwo,
    #[serde(rename = "avg_dev_ge_t")]
    AverageDeviationAtLeast { threshold: f64 },
}

impl RuleTrigger {
    pub fn describe(&self) -> String {
        match self {
            RuleTrigger::AllOut => "all members out of range".to_string(),
            RuleTrigger::AnyTwo => "at least two members out of range".to_string(),
            RuleTrigger::AverageDeviationAtLeast { threshold } => {
                format!("mean deviation at least {:.0}%", threshold * 100.0)
            }
        }
    }
}

/// Validated multi-parameter co-occurrence rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinationRule {
    pub rule_name: RuleName,
    pub members: Vec<ParameterId>,
    pub trigger: RuleTrigger,
    pub combo_max: f64,
    pub scale_by_avg: bool,
    pub is_active: bool,
}

/// One numeric reading for one employee, already format-validated upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub employee_id: EmployeeId,
    pub parameter_id: ParameterId,
    pub value: f64,
    #[serde(default)]
    pub gender: Option<Gender>,
}

impl Measurement {
    pub fn new(
        employee_id: impl Into<String>,
        parameter_id: impl Into<String>,
        value: f64,
        gender: Option<Gender>,
    ) -> Self {
        Self {
            employee_id: EmployeeId::new(employee_id),
            parameter_id: ParameterId::new(parameter_id),
            value,
            gender,
        }
    }
}

/// Derived per-parameter deviation fact for one employee; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDeviation {
    pub parameter_id: ParameterId,
    pub value: f64,
    pub range: ReferenceRange,
    pub is_out_of_range: bool,
    pub deviation_ratio: f64,
    pub penalty_points: f64,
    pub degenerate_range: bool,
}
