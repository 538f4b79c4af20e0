//! Company Health Quotient rollup over many employees' results.

pub mod views;

pub use views::{
    BandCount, CategoryBreakdown, ChqRollup, HealthBand, Participation, ParticipationCounts,
    ReportingPeriod, RuleFrequency,
};

use std::collections::{BTreeMap, BTreeSet};

use crate::scoring::{EmployeeId, HealthIndexResult, RuleName, ScoreBounds};

/// Multiplier from the per-employee index scale to the displayed CHQ scale
/// (a 0-100 index is shown out of 1000).
pub const CHQ_DISPLAY_SCALE: f64 = 10.0;

/// Category bucket for parameters configured without one.
pub const UNCATEGORIZED: &str = "uncategorized";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RollupError {
    #[error("screened count {screened} exceeds enrolled count {enrolled}")]
    ScreenedExceedsEnrolled { enrolled: u32, screened: u32 },
    #[error("screened count {screened} is below the {processed} employee(s) in the batch")]
    ScreenedBelowProcessed { screened: u32, processed: usize },
    #[error("employee {0} appears more than once in the rollup input")]
    DuplicateEmployee(EmployeeId),
    #[error("results mix configuration revisions {first} and {other}")]
    MixedRevisions { first: u64, other: u64 },
}

#[derive(Default)]
struct CategoryTotals {
    assessments: usize,
    out_of_range: usize,
    penalty: f64,
}

/// Aggregates a company/year's results into the CHQ and its breakdowns.
///
/// Employees with insufficient data are counted but never contribute to the
/// mean. `failed_employees` counts employees whose computation failed in the
/// batch; they are reported but carry no result. Results are folded in
/// employee-id order so the floating-point sums do not depend on input order.
pub fn rollup(
    period: ReportingPeriod,
    counts: ParticipationCounts,
    results: &[HealthIndexResult],
    failed_employees: usize,
    bounds: ScoreBounds,
) -> Result<ChqRollup, RollupError> {
    if counts.screened > counts.enrolled {
        return Err(RollupError::ScreenedExceedsEnrolled {
            enrolled: counts.enrolled,
            screened: counts.screened,
        });
    }

    let processed = results.len() + failed_employees;
    if (counts.screened as usize) < processed {
        return Err(RollupError::ScreenedBelowProcessed {
            screened: counts.screened,
            processed,
        });
    }

    let mut ordered: Vec<&HealthIndexResult> = results.iter().collect();
    ordered.sort_by(|left, right| left.employee_id.cmp(&right.employee_id));

    let mut seen = BTreeSet::new();
    for result in &ordered {
        if !seen.insert(&result.employee_id) {
            return Err(RollupError::DuplicateEmployee(result.employee_id.clone()));
        }
    }

    let config_revision = ordered.first().map(|result| result.config_revision);
    if let Some(first) = config_revision {
        if let Some(other) = ordered
            .iter()
            .map(|result| result.config_revision)
            .find(|revision| *revision != first)
        {
            return Err(RollupError::MixedRevisions { first, other });
        }
    }

    let scored: Vec<(&HealthIndexResult, f64)> = ordered
        .iter()
        .filter_map(|result| result.health_index.map(|index| (*result, index)))
        .collect();
    let insufficient_data_employees = ordered.len() - scored.len();

    let mean_health_index = if scored.is_empty() {
        None
    } else {
        let total: f64 = scored.iter().map(|(_, index)| index).sum();
        Some(total / scored.len() as f64)
    };

    let participation_rate = if counts.enrolled == 0 {
        None
    } else {
        Some(f64::from(counts.screened) / f64::from(counts.enrolled))
    };

    Ok(ChqRollup {
        period,
        config_revision,
        participation: Participation {
            enrolled: counts.enrolled,
            screened: counts.screened,
            participation_rate,
        },
        scored_employees: scored.len(),
        insufficient_data_employees,
        failed_employees,
        mean_health_index,
        chq: mean_health_index.map(|mean| mean * CHQ_DISPLAY_SCALE),
        chq_scale_max: bounds.baseline * CHQ_DISPLAY_SCALE,
        category_breakdowns: category_breakdowns(&scored),
        rule_frequencies: rule_frequencies(&scored),
        band_distribution: band_distribution(&scored, bounds),
    })
}

fn category_breakdowns(scored: &[(&HealthIndexResult, f64)]) -> Vec<CategoryBreakdown> {
    let mut totals: BTreeMap<&str, CategoryTotals> = BTreeMap::new();
    for (result, _) in scored {
        for outcome in result.parameter_penalties.values() {
            let category = outcome.category.as_deref().unwrap_or(UNCATEGORIZED);
            let entry = totals.entry(category).or_default();
            entry.assessments += 1;
            if outcome.is_out_of_range {
                entry.out_of_range += 1;
            }
            entry.penalty += outcome.penalty;
        }
    }

    totals
        .into_iter()
        .map(|(category, totals)| {
            let assessments = totals.assessments as f64;
            CategoryBreakdown {
                category: category.to_string(),
                assessments: totals.assessments,
                out_of_range: totals.out_of_range,
                out_of_range_rate: totals.out_of_range as f64 / assessments,
                mean_penalty: totals.penalty / assessments,
            }
        })
        .collect()
}

fn rule_frequencies(scored: &[(&HealthIndexResult, f64)]) -> Vec<RuleFrequency> {
    let mut counts: BTreeMap<&RuleName, usize> = BTreeMap::new();
    for (result, _) in scored {
        for (rule_name, penalty) in &result.rule_penalties {
            if penalty.triggered {
                *counts.entry(rule_name).or_default() += 1;
            }
        }
    }

    let mut frequencies: Vec<RuleFrequency> = counts
        .into_iter()
        .map(|(rule_name, triggered_employees)| RuleFrequency {
            rule_name: rule_name.clone(),
            triggered_employees,
        })
        .collect();
    frequencies.sort_by(|left, right| {
        right
            .triggered_employees
            .cmp(&left.triggered_employees)
            .then_with(|| left.rule_name.cmp(&right.rule_name))
    });
    frequencies
}

fn band_distribution(scored: &[(&HealthIndexResult, f64)], bounds: ScoreBounds) -> Vec<BandCount> {
    let mut counts: BTreeMap<HealthBand, usize> = BTreeMap::new();
    for (_, index) in scored {
        *counts.entry(HealthBand::classify(*index, bounds)).or_default() += 1;
    }

    HealthBand::ordered()
        .into_iter()
        .map(|band| BandCount {
            band,
            label: band.label().to_string(),
            employees: counts.get(&band).copied().unwrap_or(0),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::{ParameterId, ParameterOutcome, RulePenalty, ScoreStatus};

    fn period() -> ReportingPeriod {
        ReportingPeriod {
            company_id: "acme".to_string(),
            year: 2025,
        }
    }

    fn result(employee: &str, index: Option<f64>) -> HealthIndexResult {
        let mut parameter_penalties = BTreeMap::new();
        let mut rule_penalties = BTreeMap::new();
        if let Some(index) = index {
            parameter_penalties.insert(
                ParameterId::new("glucose"),
                ParameterOutcome {
                    category: Some("metabolic".to_string()),
                    value: 110.0,
                    is_out_of_range: index < 100.0,
                    deviation_ratio: (100.0 - index) / 50.0,
                    penalty: 100.0 - index,
                },
            );
            parameter_penalties.insert(
                ParameterId::new("bmi"),
                ParameterOutcome {
                    category: None,
                    value: 22.0,
                    is_out_of_range: false,
                    deviation_ratio: 0.0,
                    penalty: 0.0,
                },
            );
            rule_penalties.insert(
                RuleName::new("Metabolic Risk"),
                RulePenalty {
                    triggered: index < 80.0,
                    penalty: 0.0,
                },
            );
        }

        HealthIndexResult {
            employee_id: EmployeeId::new(employee),
            status: if index.is_some() {
                ScoreStatus::Scored
            } else {
                ScoreStatus::InsufficientData
            },
            health_index: index,
            total_penalty: index.map(|index| 100.0 - index).unwrap_or(0.0),
            parameter_penalties,
            rule_penalties,
            contributing_factors: Vec::new(),
            excluded_parameters: Vec::new(),
            config_revision: 3,
        }
    }

    fn counts(enrolled: u32, screened: u32) -> ParticipationCounts {
        ParticipationCounts { enrolled, screened }
    }

    #[test]
    fn chq_scales_mean_of_scored_employees() {
        let results = vec![
            result("e-1", Some(90.0)),
            result("e-2", Some(70.0)),
            result("e-3", None),
        ];

        let rollup = rollup(period(), counts(4, 3), &results, 0, ScoreBounds::default())
            .expect("rollup builds");

        assert_eq!(rollup.scored_employees, 2);
        assert_eq!(rollup.insufficient_data_employees, 1);
        assert_eq!(rollup.mean_health_index, Some(80.0));
        assert_eq!(rollup.chq, Some(800.0));
        assert_eq!(rollup.display().as_deref(), Some("800/1000"));
        assert_eq!(rollup.participation.participation_rate, Some(0.75));
        assert_eq!(rollup.config_revision, Some(3));
    }

    #[test]
    fn no_scored_employees_yields_no_chq() {
        let results = vec![result("e-1", None)];

        let rollup = rollup(period(), counts(1, 1), &results, 0, ScoreBounds::default())
            .expect("rollup builds");

        assert_eq!(rollup.chq, None);
        assert_eq!(rollup.display(), None);
        assert!(rollup.category_breakdowns.is_empty());
        assert!(rollup
            .band_distribution
            .iter()
            .all(|band| band.employees == 0));
    }

    #[test]
    fn breakdowns_group_by_category_and_rule() {
        let results = vec![result("e-2", Some(70.0)), result("e-1", Some(100.0))];

        let rollup = rollup(period(), counts(2, 2), &results, 0, ScoreBounds::default())
            .expect("rollup builds");

        let categories: Vec<&str> = rollup
            .category_breakdowns
            .iter()
            .map(|entry| entry.category.as_str())
            .collect();
        assert_eq!(categories, vec!["metabolic", UNCATEGORIZED]);

        let metabolic = &rollup.category_breakdowns[0];
        assert_eq!(metabolic.assessments, 2);
        assert_eq!(metabolic.out_of_range, 1);
        assert_eq!(metabolic.out_of_range_rate, 0.5);
        assert_eq!(metabolic.mean_penalty, 15.0);

        assert_eq!(rollup.rule_frequencies.len(), 1);
        assert_eq!(rollup.rule_frequencies[0].triggered_employees, 1);

        let optimal = &rollup.band_distribution[0];
        assert_eq!(optimal.band, HealthBand::Optimal);
        assert_eq!(optimal.employees, 1);
        let moderate = &rollup.band_distribution[1];
        assert_eq!(moderate.employees, 1);
    }

    #[test]
    fn input_order_does_not_change_rollup() {
        let forward = vec![
            result("e-1", Some(91.3)),
            result("e-2", Some(47.9)),
            result("e-3", Some(66.6)),
        ];
        let mut reversed = forward.clone();
        reversed.reverse();

        let left = rollup(period(), counts(3, 3), &forward, 0, ScoreBounds::default());
        let right = rollup(period(), counts(3, 3), &reversed, 0, ScoreBounds::default());

        assert_eq!(left, right);
    }

    #[test]
    fn rejects_inconsistent_input() {
        let results = vec![result("e-1", Some(90.0))];
        assert_eq!(
            rollup(period(), counts(1, 2), &results, 0, ScoreBounds::default()),
            Err(RollupError::ScreenedExceedsEnrolled {
                enrolled: 1,
                screened: 2
            })
        );

        let duplicated = vec![result("e-1", Some(90.0)), result("e-1", Some(80.0))];
        assert!(matches!(
            rollup(period(), counts(2, 2), &duplicated, 0, ScoreBounds::default()),
            Err(RollupError::DuplicateEmployee(_))
        ));

        let mut mixed = vec![result("e-1", Some(90.0)), result("e-2", Some(80.0))];
        mixed[1].config_revision = 4;
        assert_eq!(
            rollup(period(), counts(2, 2), &mixed, 0, ScoreBounds::default()),
            Err(RollupError::MixedRevisions { first: 3, other: 4 })
        );
    }

    #[test]
    fn screened_count_must_cover_every_processed_employee() {
        let results = vec![
            result("e-1", Some(90.0)),
            result("e-2", Some(80.0)),
            result("e-3", None),
        ];

        assert_eq!(
            rollup(period(), counts(5, 1), &results, 0, ScoreBounds::default()),
            Err(RollupError::ScreenedBelowProcessed {
                screened: 1,
                processed: 3
            })
        );
        assert_eq!(
            rollup(period(), counts(5, 3), &results, 1, ScoreBounds::default()),
            Err(RollupError::ScreenedBelowProcessed {
                screened: 3,
                processed: 4
            })
        );
    }

    #[test]
    fn failed_employees_are_reported_without_affecting_the_mean() {
        let results = vec![result("e-1", Some(90.0)), result("e-2", Some(70.0))];

        let rollup = rollup(period(), counts(4, 3), &results, 1, ScoreBounds::default())
            .expect("rollup builds");

        assert_eq!(rollup.failed_employees, 1);
        assert_eq!(rollup.scored_employees, 2);
        assert_eq!(rollup.mean_health_index, Some(80.0));
        assert_eq!(rollup.participation.screened, 3);
    }
}
