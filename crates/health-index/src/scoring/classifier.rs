use std::collections::BTreeMap;

use tracing::debug;

use super::domain::{EmployeeId, Measurement, ParameterDeviation, ParameterId};
use super::error::{ExcludedParameter, ExclusionReason, ScoringError, ScoringUnit};
use super::penalty::assess;
use super::snapshot::ConfigSnapshot;

/// Every deviation fact for one employee, derived in a single pass over one snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviationSet {
    deviations: BTreeMap<ParameterId, ParameterDeviation>,
    excluded: Vec<ExcludedParameter>,
}

impl DeviationSet {
    pub fn get(&self, parameter_id: &ParameterId) -> Option<&ParameterDeviation> {
        self.deviations.get(parameter_id)
    }

    pub fn deviations(&self) -> impl Iterator<Item = &ParameterDeviation> {
        self.deviations.values()
    }

    pub fn excluded(&self) -> &[ExcludedParameter] {
        &self.excluded
    }

    pub fn is_empty(&self) -> bool {
        self.deviations.is_empty()
    }
}

/// Assesses every scorable parameter in the snapshot for one employee.
///
/// Measurements for other employees, unknown parameters, or parameters that
/// are inactive or excluded from the index are ignored. A scorable parameter
/// without exactly one finite reading is excluded rather than scored as healthy.
pub fn classify<'a, I>(
    snapshot: &ConfigSnapshot,
    employee_id: &EmployeeId,
    measurements: I,
) -> DeviationSet
where
    I: IntoIterator<Item = &'a Measurement>,
{
    let mut readings: BTreeMap<&ParameterId, Vec<&Measurement>> = BTreeMap::new();
    for measurement in measurements {
        if &measurement.employee_id != employee_id {
            debug!(
                %employee_id,
                other = %measurement.employee_id,
                "ignoring measurement for another employee"
            );
            continue;
        }
        match snapshot.parameter(&measurement.parameter_id) {
            Some(parameter) if parameter.is_scorable() => {
                readings
                    .entry(&measurement.parameter_id)
                    .or_default()
                    .push(measurement);
            }
            Some(_) => {}
            None => debug!(
                %employee_id,
                parameter_id = %measurement.parameter_id,
                "ignoring measurement for unknown parameter"
            ),
        }
    }

    let mut set = DeviationSet::default();
    for parameter in snapshot.scorable_parameters() {
        let outcome = match readings.get(&parameter.parameter_id).map(Vec::as_slice) {
            None | Some([]) => Err(ExclusionReason::MissingMeasurement),
            Some([reading]) if !reading.value.is_finite() => Err(ExclusionReason::NonFiniteValue),
            Some([reading]) => Ok(assess(parameter, reading.value, reading.gender)),
            Some(_) => Err(ExclusionReason::DuplicateMeasurement),
        };

        match outcome {
            Ok(deviation) => {
                set.deviations
                    .insert(parameter.parameter_id.clone(), deviation);
            }
            Err(reason) => {
                let skipped = ScoringError::MissingMeasurement {
                    employee_id: employee_id.clone(),
                    unit: ScoringUnit::Parameter(parameter.parameter_id.clone()),
                };
                debug!(reason = reason.label(), %skipped, "parameter excluded");
                set.excluded.push(ExcludedParameter {
                    parameter_id: parameter.parameter_id.clone(),
                    reason,
                });
            }
        }
    }

    set
}
