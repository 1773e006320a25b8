//! Time accounting: surrogate model time and the acquisition cost of
//! initial data generated outside the run.

use bo_types::PreprocessError;

/// Model fitting time per iteration, `iter_time - acq_time`.
///
/// The two series are paired from their most recent entries, so when their
/// lengths differ the result covers their common most-recent suffix.
pub fn model_time(iter_times: &[f64], acq_times: &[f64]) -> Vec<f64> {
    let n = iter_times.len().min(acq_times.len());
    iter_times[iter_times.len() - n..]
        .iter()
        .zip(&acq_times[acq_times.len() - n..])
        .map(|(iter_time, acq_time)| iter_time - acq_time)
        .collect()
}

/// Add the acquisition cost of reused initial points to `total_time`.
///
/// Fidelities are walked in order; a `None` cost means the fidelity
/// initialized itself and needs no correction. For a costed fidelity, its
/// points occupy `[begin, end)` where `begin` is the number of initial points
/// accounted for so far, moved back by one once that count is non-zero.
/// Each point in the range gets the matching cost entry and every later
/// entry of `total_time` gets the cost of the fidelity's last initial point.
pub fn add_init_acq_times(
    total_time: &mut [f64],
    initpts: &[usize],
    init_data_cost: &[Option<Vec<f64>>],
) -> Result<(), PreprocessError> {
    let mut accounted_initpts = 0usize;

    for (fidelity, (cost, &points)) in init_data_cost.iter().zip(initpts).enumerate() {
        if let Some(cost) = cost {
            let begin = if accounted_initpts != 0 {
                accounted_initpts - 1
            } else {
                accounted_initpts
            };
            let end = begin + points;

            if end > total_time.len() {
                return Err(PreprocessError::InvalidInitCost {
                    fidelity,
                    message: format!(
                        "initial points [{begin}, {end}) exceed {} total_time entries",
                        total_time.len()
                    ),
                });
            }
            if cost.len() < points {
                return Err(PreprocessError::InvalidInitCost {
                    fidelity,
                    message: format!("{} cost entries for {points} initial points", cost.len()),
                });
            }

            let carried = if points == 0 {
                cost.last()
            } else {
                cost.get(points - 1)
            }
            .copied()
            .ok_or_else(|| PreprocessError::InvalidInitCost {
                fidelity,
                message: "empty cost vector".to_string(),
            })?;

            for (time, c) in total_time[begin..end].iter_mut().zip(cost) {
                *time += c;
            }
            for time in &mut total_time[end..] {
                *time += carried;
            }
        }
        accounted_initpts += points;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_time_is_iteration_minus_acquisition() {
        let model = model_time(&[10.0, 12.0, 15.0], &[1.0, 2.0, 5.0]);
        assert_eq!(model, vec![9.0, 10.0, 10.0]);
    }

    #[test]
    fn model_time_pairs_most_recent_entries() {
        let model = model_time(&[100.0, 10.0, 12.0], &[1.0, 2.0]);
        assert_eq!(model, vec![9.0, 10.0]);
    }

    #[test]
    fn self_initialized_fidelity_is_skipped() {
        let mut total_time = vec![1.0, 2.0, 3.0];
        add_init_acq_times(&mut total_time, &[2, 0], &[None, None]).unwrap();
        assert_eq!(total_time, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn first_fidelity_cost_is_distributed_then_carried() {
        let mut total_time = vec![0.0; 5];
        add_init_acq_times(&mut total_time, &[2], &[Some(vec![10.0, 20.0, 99.0])]).unwrap();
        assert_eq!(total_time, vec![10.0, 20.0, 20.0, 20.0, 20.0]);
    }

    #[test]
    fn later_fidelity_starts_one_before_accounted_points() {
        let mut total_time = vec![0.0; 6];
        add_init_acq_times(&mut total_time, &[2, 3], &[None, Some(vec![1.0, 2.0, 3.0])]).unwrap();
        // accounted = 2, so the second fidelity covers [1, 4)
        assert_eq!(total_time, vec![0.0, 1.0, 2.0, 3.0, 3.0, 3.0]);
    }

    #[test]
    fn zero_initial_points_carry_the_last_cost() {
        let mut total_time = vec![0.0; 3];
        add_init_acq_times(&mut total_time, &[0], &[Some(vec![4.0, 7.0])]).unwrap();
        assert_eq!(total_time, vec![7.0, 7.0, 7.0]);
    }

    #[test]
    fn short_cost_vector_is_rejected() {
        let mut total_time = vec![0.0; 4];
        let err = add_init_acq_times(&mut total_time, &[3], &[Some(vec![1.0])]).unwrap_err();
        assert!(matches!(err, PreprocessError::InvalidInitCost { fidelity: 0, .. }));
    }

    #[test]
    fn range_beyond_total_time_is_rejected() {
        let mut total_time = vec![0.0; 2];
        let err = add_init_acq_times(&mut total_time, &[3], &[Some(vec![1.0; 3])]).unwrap_err();
        assert!(err.to_string().contains("exceed"));
    }
}
