use crate::infra::{sample_measurements, sample_snapshot};
use chrono::{Datelike, Local};
use clap::Args;
use health_index::config::{AppConfig, ScoringConfig};
use health_index::error::AppError;
use health_index::loader::{read_measurements_path, read_snapshot_path};
use health_index::rollup::ChqRollup;
use health_index::scoring::{BatchReport, ConfigSnapshot, HealthIndexResult, Measurement};
use health_index::service::{InMemoryConfigStore, RollupRequest, ScoringService};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct ScoreArgs {
    /// Configuration snapshot (JSON) with parameters and combination rules
    #[arg(long)]
    pub(crate) config: PathBuf,
    /// Measurement export (CSV: employee_id,parameter_id,value,gender)
    #[arg(long)]
    pub(crate) measurements: PathBuf,
    /// Roll the batch up into a CHQ for this company
    #[arg(long)]
    pub(crate) company: Option<String>,
    /// Reporting year for the rollup (defaults to the current year)
    #[arg(long)]
    pub(crate) year: Option<i32>,
    /// Enrolled headcount (defaults to the number of screened employees)
    #[arg(long)]
    pub(crate) enrolled: Option<u32>,
    /// Print JSON instead of the text summary
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Company name used for the demo rollup
    #[arg(long, default_value = "Demo Manufacturing")]
    pub(crate) company: String,
    /// Reporting year (defaults to the current year)
    #[arg(long)]
    pub(crate) year: Option<i32>,
    /// Enrolled headcount (defaults to screened employees plus two)
    #[arg(long)]
    pub(crate) enrolled: Option<u32>,
}

pub(crate) fn run_score(args: ScoreArgs) -> Result<(), AppError> {
    let ScoreArgs {
        config: config_path,
        measurements,
        company,
        year,
        enrolled,
        json,
    } = args;

    let config = AppConfig::load()?;
    let snapshot = read_snapshot_path(&config_path)?;
    let measurements = read_measurements_path(&measurements)?;
    let service = build_service(snapshot, &config.scoring)?;

    if !json {
        render_config(&service)?;
    }

    match company {
        Some(company_id) => {
            let screened = screened_count(&measurements);
            let request = rollup_request(
                company_id,
                year,
                enrolled.unwrap_or(screened),
                measurements,
            );
            let outcome = service.company_rollup(request)?;
            if json {
                print_json(&outcome)?;
            } else {
                render_report(&outcome.report);
                render_rollup(&outcome.rollup);
            }
        }
        None => {
            let report = service.score_batch(&measurements)?;
            if json {
                print_json(&report)?;
            } else {
                render_report(&report);
            }
        }
    }

    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        company,
        year,
        enrolled,
    } = args;

    let config = AppConfig::load()?;
    let service = build_service(sample_snapshot(), &config.scoring)?;
    let measurements = sample_measurements();
    let enrolled = enrolled.unwrap_or_else(|| screened_count(&measurements).saturating_add(2));

    println!("Health Index demo");
    render_config(&service)?;
    let outcome = service.company_rollup(rollup_request(company, year, enrolled, measurements))?;
    render_report(&outcome.report);
    render_rollup(&outcome.rollup);

    Ok(())
}

fn build_service(
    snapshot: ConfigSnapshot,
    config: &ScoringConfig,
) -> Result<ScoringService<InMemoryConfigStore>, AppError> {
    let store = Arc::new(InMemoryConfigStore::new(snapshot));
    Ok(ScoringService::new(store, config.bounds, config.workers)?)
}

fn screened_count(measurements: &[Measurement]) -> u32 {
    let employees: BTreeSet<_> = measurements
        .iter()
        .map(|measurement| &measurement.employee_id)
        .collect();
    u32::try_from(employees.len()).unwrap_or(u32::MAX)
}

fn rollup_request(
    company_id: String,
    year: Option<i32>,
    enrolled: u32,
    measurements: Vec<Measurement>,
) -> RollupRequest {
    RollupRequest {
        company_id,
        year: year.unwrap_or_else(|| Local::now().year()),
        enrolled,
        screened: screened_count(&measurements),
        measurements,
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let stdout = std::io::stdout();
    serde_json::to_writer_pretty(stdout.lock(), value).map_err(std::io::Error::from)?;
    println!();
    Ok(())
}

fn render_config(service: &ScoringService<InMemoryConfigStore>) -> Result<(), AppError> {
    let summary = service.current_config()?;
    println!(
        "Configuration revision {}: {} scorable parameter(s), {} active rule(s)",
        summary.revision, summary.scorable_parameters, summary.active_rules
    );
    for issue in &summary.issues {
        println!("  ! skipped {}: {}", issue.subject, issue.message);
    }
    Ok(())
}

fn render_report(report: &BatchReport) {
    println!(
        "\nEmployee Health Index (configuration revision {})",
        report.config_revision
    );
    for result in &report.results {
        render_result(result);
    }
    for failure in &report.failures {
        println!("- {}: failed ({})", failure.employee_id, failure.error);
    }
    if report.cancelled {
        println!(
            "Batch cancelled; {} employee(s) not scored",
            report.unscored_employees.len()
        );
    }
}

fn render_result(result: &HealthIndexResult) {
    match result.health_index {
        Some(index) => println!(
            "- {}: {:.1} (penalty {:.1})",
            result.employee_id, index, result.total_penalty
        ),
        None => println!("- {}: insufficient data", result.employee_id),
    }

    for factor in result.contributing_factors.iter().take(3) {
        println!(
            "    {:>5.1} pts  {}: {}",
            factor.penalty, factor.label, factor.notes
        );
    }

    if !result.excluded_parameters.is_empty() {
        let excluded: Vec<String> = result
            .excluded_parameters
            .iter()
            .map(|excluded| format!("{} ({})", excluded.parameter_id, excluded.reason.label()))
            .collect();
        println!("    excluded: {}", excluded.join(", "));
    }
}

fn render_rollup(rollup: &ChqRollup) {
    println!(
        "\nCompany Health Quotient for {} ({})",
        rollup.period.company_id, rollup.period.year
    );
    match rollup.display() {
        Some(display) => println!("- CHQ {display}"),
        None => println!("- CHQ unavailable: no employee had enough data"),
    }

    let participation = rollup
        .participation
        .participation_rate
        .map(|rate| format!("{:.0}%", rate * 100.0))
        .unwrap_or_else(|| "n/a".to_string());
    println!(
        "- {} scored | {} insufficient data | {} failed | participation {} ({}/{})",
        rollup.scored_employees,
        rollup.insufficient_data_employees,
        rollup.failed_employees,
        participation,
        rollup.participation.screened,
        rollup.participation.enrolled
    );

    println!("Risk bands:");
    for band in &rollup.band_distribution {
        println!("  - {}: {}", band.label, band.employees);
    }

    if !rollup.category_breakdowns.is_empty() {
        println!("Categories:");
        for category in &rollup.category_breakdowns {
            println!(
                "  - {}: {:.0}% out of range | mean penalty {:.1}",
                category.category,
                category.out_of_range_rate * 100.0,
                category.mean_penalty
            );
        }
    }

    if !rollup.rule_frequencies.is_empty() {
        println!("Combination rules:");
        for rule in &rollup.rule_frequencies {
            println!(
                "  - {}: {} employee(s)",
                rule.rule_name, rule.triggered_employees
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rollup_request_counts_distinct_employees() {
        let measurements = sample_measurements();

        let request = rollup_request("acme".to_string(), Some(2025), 10, measurements);

        assert_eq!(request.screened, 5);
        assert_eq!(request.enrolled, 10);
        assert_eq!(request.year, 2025);
    }

    #[test]
    fn sample_roster_rolls_up_into_chq() {
        let service =
            build_service(sample_snapshot(), &ScoringConfig::default()).expect("service");
        let request = rollup_request("acme".to_string(), Some(2025), 7, sample_measurements());

        let outcome = service.company_rollup(request).expect("rollup");

        assert_eq!(outcome.report.results.len(), 5);
        assert_eq!(outcome.report.results[0].health_index, Some(100.0));
        assert_eq!(outcome.rollup.scored_employees, 4);
        assert_eq!(outcome.rollup.insufficient_data_employees, 1);
        assert_eq!(outcome.rollup.failed_employees, 0);
        let chq = outcome.rollup.chq.expect("chq");
        assert!(chq > 0.0 && chq <= outcome.rollup.chq_scale_max);
    }
}
