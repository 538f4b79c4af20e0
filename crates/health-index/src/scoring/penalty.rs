use super::domain::{Direction, Gender, Parameter, ParameterDeviation, ReferenceRange};

/// Scores a single measurement against one parameter's configuration.
///
/// Boundaries count as normal. Deviations are normalized by the range width,
/// divided by `k_full` and saturate at 1. A degenerate range (`hi <= lo`)
/// cannot be normalized: values equal to a bound are normal, anything else is
/// fully saturated.
pub fn assess(parameter: &Parameter, value: f64, gender: Option<Gender>) -> ParameterDeviation {
    let range = parameter.range_for(gender);
    let degenerate_range = range.is_degenerate();

    let (is_out_of_range, deviation_ratio) = if degenerate_range {
        degenerate_deviation(&range, value)
    } else {
        let raw = raw_deviation(parameter.direction, &range, value);
        (!range.contains(value), (raw / parameter.k_full).min(1.0))
    };

    ParameterDeviation {
        parameter_id: parameter.parameter_id.clone(),
        value,
        range,
        is_out_of_range,
        deviation_ratio,
        penalty_points: deviation_ratio * parameter.pmax * parameter.weight,
        degenerate_range,
    }
}

fn raw_deviation(direction: Direction, range: &ReferenceRange, value: f64) -> f64 {
    let width = range.width();
    let above = (value - range.hi) / width;
    let below = (range.lo - value) / width;

    match direction {
        Direction::HighBad => above.max(0.0),
        Direction::LowBad => below.max(0.0),
        Direction::TwoSided => above.max(below).max(0.0),
    }
}

fn degenerate_deviation(range: &ReferenceRange, value: f64) -> (bool, f64) {
    if value == range.lo || value == range.hi {
        (false, 0.0)
    } else {
        (true, 1.0)
    }
}
