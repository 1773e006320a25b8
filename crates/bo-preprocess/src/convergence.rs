//! Convergence detection.
//!
//! A run has converged to a tolerance at the first iteration after which the
//! measure never leaves the band `|value| <= tolerance` again. The scan walks
//! the series from the most recent iteration backward and counts how long it
//! stays inside the band; an excursion after a temporary dip resets the point
//! of convergence.

use tracing::warn;

use bo_types::{ConvergenceSeries, ExperimentRecord, Measure, PreprocessError};

/// Length of the most recent stretch of `values` that stays within `tolerance`.
///
/// NaN and infinite values always count as outside the band.
pub fn converged_suffix_len(values: &[f64], tolerance: f64) -> usize {
    values
        .iter()
        .rev()
        .take_while(|value| value.abs() <= tolerance)
        .count()
}

/// Iteration at which `values` entered the tolerance band for good, or `None`
/// if the most recent value is outside it.
pub fn convergence_iteration(values: &[f64], tolerance: f64) -> Option<usize> {
    match converged_suffix_len(values, tolerance) {
        0 => None,
        count => Some(values.len() - count),
    }
}

/// Element `count` positions from the end of `series` (1 = last).
fn from_end<T: Copy>(series: &[T], count: usize) -> Option<T> {
    series
        .len()
        .checked_sub(count)
        .and_then(|idx| series.get(idx).copied())
}

/// Compute the convergence series of `measure` for every tolerance level.
///
/// Returns `Ok(None)` when the measure has no values (an interrupted run):
/// convergence is then indeterminate rather than unreached.
pub fn convergence_series(
    record: &ExperimentRecord,
    measure: Measure,
    tolerance_levels: &[f64],
) -> Result<Option<ConvergenceSeries>, PreprocessError> {
    let values = measure.values(record);
    if values.is_empty() {
        warn!(
            "Record {} has no {} values, skipping convergence",
            record.name, measure
        );
        return Ok(None);
    }

    let highest_fidelity = record
        .is_multi_fidelity()
        .then(|| record.highest_fidelity_iterations());

    let shape_error = |message: String| PreprocessError::ShapeMismatch {
        name: record.name.clone(),
        message,
    };

    let mut series = ConvergenceSeries {
        measure,
        iterations: Vec::with_capacity(tolerance_levels.len()),
        totaltime: Vec::with_capacity(tolerance_levels.len()),
        observations: Vec::with_capacity(tolerance_levels.len()),
        highest_fidelity_iterations: Vec::with_capacity(tolerance_levels.len()),
    };

    for &tolerance in tolerance_levels {
        let count = converged_suffix_len(&values, tolerance);
        if count == 0 {
            series.iterations.push(None);
            series.totaltime.push(None);
            series.observations.push(None);
            series.highest_fidelity_iterations.push(None);
            continue;
        }

        let iterations = values.len() - count;
        let totaltime = from_end(&record.total_time, count).ok_or_else(|| {
            shape_error(format!(
                "{} total_time entries for {count} converged {} iterations",
                record.total_time.len(),
                measure
            ))
        })?;
        let observations = record.xy.len().checked_sub(count).ok_or_else(|| {
            shape_error(format!(
                "{} samples for {count} converged {} iterations",
                record.xy.len(),
                measure
            ))
        })?;
        let highest_fidelity_iterations = match &highest_fidelity {
            Some(counts) => from_end(counts, count).ok_or_else(|| {
                shape_error(format!(
                    "{} sample indices for {count} converged {} iterations",
                    counts.len(),
                    measure
                ))
            })?,
            None => iterations,
        };

        series.iterations.push(Some(iterations));
        series.totaltime.push(Some(totaltime));
        series.observations.push(Some(observations));
        series
            .highest_fidelity_iterations
            .push(Some(highest_fidelity_iterations));
    }

    Ok(Some(series))
}
