use serde::{Deserialize, Serialize};

use crate::scoring::{RuleName, ScoreBounds};

/// Company and reporting year a rollup describes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportingPeriod {
    pub company_id: String,
    pub year: i32,
}

/// Headcounts supplied by the batch workflow alongside the results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipationCounts {
    pub enrolled: u32,
    pub screened: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participation {
    pub enrolled: u32,
    pub screened: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participation_rate: Option<f64>,
}

/// Coarse wellness band, relative to the span of the score bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthBand {
    Optimal,
    Moderate,
    Elevated,
    HighRisk,
}

impl HealthBand {
    pub const fn ordered() -> [HealthBand; 4] {
        [
            HealthBand::Optimal,
            HealthBand::Moderate,
            HealthBand::Elevated,
            HealthBand::HighRisk,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            HealthBand::Optimal => "Optimal",
            HealthBand::Moderate => "Moderate",
            HealthBand::Elevated => "Elevated risk",
            HealthBand::HighRisk => "High risk",
        }
    }

    pub fn classify(health_index: f64, bounds: ScoreBounds) -> Self {
        let position = (health_index - bounds.min_index) / bounds.span();
        if position >= 0.85 {
            HealthBand::Optimal
        } else if position >= 0.70 {
            HealthBand::Moderate
        } else if position >= 0.50 {
            HealthBand::Elevated
        } else {
            HealthBand::HighRisk
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandCount {
    pub band: HealthBand,
    pub label: String,
    pub employees: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryBreakdown {
    pub category: String,
    pub assessments: usize,
    pub out_of_range: usize,
    pub out_of_range_rate: f64,
    pub mean_penalty: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleFrequency {
    pub rule_name: RuleName,
    pub triggered_employees: usize,
}

/// Organization-level Company Health Quotient for one reporting period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChqRollup {
    pub period: ReportingPeriod,
    pub config_revision: Option<u64>,
    pub participation: Participation,
    pub scored_employees: usize,
    pub insufficient_data_employees: usize,
    /// Employees whose computation failed; they carry no result.
    pub failed_employees: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_health_index: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chq: Option<f64>,
    pub chq_scale_max: f64,
    pub category_breakdowns: Vec<CategoryBreakdown>,
    pub rule_frequencies: Vec<RuleFrequency>,
    pub band_distribution: Vec<BandCount>,
}

impl ChqRollup {
    /// Dashboard rendering such as `812/1000`; `None` without scored employees.
    pub fn display(&self) -> Option<String> {
        self.chq
            .map(|chq| format!("{:.0}/{:.0}", chq, self.chq_scale_max))
    }
}
