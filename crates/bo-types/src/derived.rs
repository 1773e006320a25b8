//! Statistics derived from a raw record by preprocessing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::record::ExperimentRecord;

/// A per-iteration scalar series that convergence can be measured on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Measure {
    /// Predicted mean of the global minimum prediction.
    Gmp,
    /// Value of the best acquisition so far.
    BestAcq,
}

impl Measure {
    pub const ALL: [Measure; 2] = [Measure::Gmp, Measure::BestAcq];

    /// Key fragment used in the derived field names.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Gmp => "gmp",
            Self::BestAcq => "best_acq",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.key() == key)
    }

    /// The measure's values in iteration order.
    pub fn values(&self, record: &ExperimentRecord) -> Vec<f64> {
        match self {
            Self::Gmp => record.gmp.iter().map(|g| g.mean).collect(),
            Self::BestAcq => record.best_acq.iter().map(|a| a.value).collect(),
        }
    }

    pub fn iterations_key(&self) -> String {
        format!("iterations_to_{}_convergence", self.key())
    }

    pub fn totaltime_key(&self) -> String {
        format!("totaltime_to_{}_convergence", self.key())
    }

    pub fn observations_key(&self) -> String {
        format!("observations_to_{}_convergence", self.key())
    }

    pub fn highest_fidelity_iterations_key(&self) -> String {
        format!("highest_fidelity_iterations_to_{}_convergence", self.key())
    }
}

impl fmt::Display for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Convergence points of one measure, one entry per tolerance level.
///
/// `None` entries mark tolerances the run never converged to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceSeries {
    pub measure: Measure,
    /// BO iterations until the run entered the tolerance band for good.
    pub iterations: Vec<Option<usize>>,
    /// Cumulative run time (seconds) at that iteration.
    pub totaltime: Vec<Option<f64>>,
    /// BO iterations plus initial points.
    pub observations: Vec<Option<usize>>,
    /// Highest-fidelity evaluations until convergence; equals `iterations`
    /// for runs that are not multi-fidelity.
    pub highest_fidelity_iterations: Vec<Option<usize>>,
}

impl ConvergenceSeries {
    pub fn len(&self) -> usize {
        self.iterations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.iterations.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DerivedStatistics {
    /// Surrogate model fitting time per iteration.
    pub model_time: Vec<f64>,
    pub tolerance_levels: Vec<f64>,
    /// Only measures with a non-empty series appear; a missing measure is
    /// indeterminate, not unconverged.
    pub convergence: BTreeMap<Measure, ConvergenceSeries>,
    /// Flattened task-correlation matrix per iteration, multi-task runs only.
    pub task_correlation: Option<Vec<Vec<f64>>>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl DerivedStatistics {
    pub fn convergence_of(&self, measure: Measure) -> Option<&ConvergenceSeries> {
        self.convergence.get(&measure)
    }

    pub fn gmp_convergence(&self) -> Option<&ConvergenceSeries> {
        self.convergence_of(Measure::Gmp)
    }
}

/// A record after offset normalization, carrying its derived statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedExperiment {
    pub record: ExperimentRecord,
    pub derived: DerivedStatistics,
}

impl ProcessedExperiment {
    pub fn name(&self) -> &str {
        &self.record.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn measure_keys_match_consumer_fields() {
        assert_eq!(Measure::Gmp.iterations_key(), "iterations_to_gmp_convergence");
        assert_eq!(
            Measure::Gmp.highest_fidelity_iterations_key(),
            "highest_fidelity_iterations_to_gmp_convergence"
        );
        assert_eq!(Measure::BestAcq.totaltime_key(), "totaltime_to_best_acq_convergence");
        assert_eq!(Measure::from_key("best_acq"), Some(Measure::BestAcq));
        assert_eq!(Measure::from_key("xy"), None);
    }

    #[test]
    fn measure_values_follow_iteration_order() {
        use crate::record::{GlobalMinimumPrediction, LocatedValue};

        let mut record = ExperimentRecord::new("run", 1);
        record.gmp = vec![
            GlobalMinimumPrediction {
                location: vec![0.0],
                mean: 3.0,
                variance: 0.1,
            },
            GlobalMinimumPrediction {
                location: vec![0.1],
                mean: 2.0,
                variance: 0.1,
            },
        ];
        record.best_acq = vec![LocatedValue {
            location: vec![0.0],
            value: 4.0,
        }];
        assert_eq!(Measure::Gmp.values(&record), vec![3.0, 2.0]);
        assert_eq!(Measure::BestAcq.values(&record), vec![4.0]);
    }
}
