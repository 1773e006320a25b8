//! Task-correlation (coregionalization) matrices of multi-task runs.

use bo_types::{ExperimentRecord, PreprocessError};

/// `B = W·Wᵀ + diag(kappa)` for every iteration's hyperparameters, flattened
/// row-major. Single-task records have no task correlation.
pub fn task_correlation(record: &ExperimentRecord) -> Result<Option<Vec<Vec<f64>>>, PreprocessError> {
    if !record.is_multi_task() {
        return Ok(None);
    }
    if record.hyperparameters.is_empty() {
        return Ok(Some(Vec::new()));
    }

    let tasks = record.tasks.ok_or_else(|| PreprocessError::InvalidHyperparameters {
        iteration: 0,
        message: format!("multi-task record {} has no task count", record.name),
    })?;

    record
        .hyperparameters
        .iter()
        .enumerate()
        .map(|(iteration, params)| {
            coregionalization_matrix(params, record.dim, tasks)
                .map_err(|message| PreprocessError::InvalidHyperparameters { iteration, message })
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

/// Build `B` from one hyperparameter vector laid out as
/// `[kernel params (dim) .., W (row-major, tasks columns) .., kappa (tasks)]`.
///
/// `W` has either `tasks` rows or a single row (rank-1 loading); a single
/// row's `W·Wᵀ` is a scalar that is added to every entry of `B`.
pub fn coregionalization_matrix(params: &[f64], dim: usize, tasks: usize) -> Result<Vec<f64>, String> {
    if tasks == 0 {
        return Err("task count must be positive".to_string());
    }
    if params.len() < dim + tasks {
        return Err(format!(
            "{} hyperparameters, need at least {} (dim {dim} + kappa {tasks})",
            params.len(),
            dim + tasks
        ));
    }

    let (head, kappa) = params.split_at(params.len() - tasks);
    let w = &head[dim..];
    let rows = w.len() / tasks;
    if w.is_empty() || w.len() % tasks != 0 || (rows != 1 && rows != tasks) {
        return Err(format!(
            "W block of {} values is neither 1x{tasks} nor {tasks}x{tasks}",
            w.len()
        ));
    }

    let dot = |i: usize, j: usize| -> f64 {
        (0..tasks).map(|k| w[i * tasks + k] * w[j * tasks + k]).sum()
    };
    let rank_one = (rows == 1).then(|| dot(0, 0));

    let mut b = vec![0.0; tasks * tasks];
    for i in 0..tasks {
        for j in 0..tasks {
            let ww = rank_one.unwrap_or_else(|| dot(i, j));
            b[i * tasks + j] = if i == j { ww + kappa[i] } else { ww };
        }
    }
    Ok(b)
}
