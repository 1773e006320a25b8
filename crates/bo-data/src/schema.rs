//! On-disk JSON layout of raw and processed experiment records.
//!
//! Records are stored with positional rows (`xy`, `gmp`, `best_acq`,
//! `truemin`) exactly as the optimizer writes them. This module is the only
//! place that knows those column positions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use bo_types::{
    source_tag, ConvergenceSeries, DataError, DerivedStatistics, ExperimentRecord,
    GlobalMinimumPrediction, LocatedValue, Measure, ProcessedExperiment, Sample, SampleLayout,
};

/// Keys only ever written by preprocessing.
pub const DERIVED_KEYS: [&str; 3] = ["model_time", "tolerance_levels", "B"];

/// A raw results record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub name: String,
    pub dim: usize,
    pub xy: Vec<Vec<f64>>,
    pub gmp: Vec<Vec<f64>>,
    pub best_acq: Vec<Vec<f64>>,
    pub total_time: Vec<f64>,
    pub iter_times: Vec<f64>,
    pub acq_times: Vec<f64>,
    pub initpts: Vec<f64>,
    #[serde(default)]
    pub sample_indices: Vec<f64>,
    pub truemin: Vec<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks: Option<usize>,
    #[serde(rename = "GP_hyperparam", default)]
    pub hyperparameters: Vec<Vec<f64>>,
}

impl RawRecord {
    /// Validate row shapes and map positional rows onto named fields.
    pub fn into_record(self) -> Result<ExperimentRecord, DataError> {
        let name = self.name;
        let invalid = |message: String| DataError::InvalidFormat {
            message: format!("{name}: {message}"),
        };

        let layout = match self.xy.first() {
            None => SampleLayout::SingleTask,
            Some(row) => SampleLayout::from_width(self.dim, row.len()).ok_or_else(|| {
                invalid(format!(
                    "sample width {} does not fit dim {} (expected {} or {})",
                    row.len(),
                    self.dim,
                    self.dim + 1,
                    self.dim + 2
                ))
            })?,
        };

        let xy = self
            .xy
            .iter()
            .enumerate()
            .map(|(i, row)| {
                Sample::from_row(row, self.dim, layout)
                    .map_err(|e| invalid(format!("xy row {i}: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let gmp = self
            .gmp
            .iter()
            .enumerate()
            .map(|(i, row)| {
                GlobalMinimumPrediction::from_row(row)
                    .map_err(|e| invalid(format!("gmp row {i}: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let best_acq = located_rows(&self.best_acq, "best_acq").map_err(invalid)?;
        let truemin = located_rows(&self.truemin, "truemin").map_err(invalid)?;

        let initpts = tags(&self.initpts, "initpts").map_err(invalid)?;
        let sample_indices = tags(&self.sample_indices, "sample_indices").map_err(invalid)?;

        Ok(ExperimentRecord {
            name,
            dim: self.dim,
            layout,
            xy,
            gmp,
            best_acq,
            total_time: self.total_time,
            iter_times: self.iter_times,
            acq_times: self.acq_times,
            initpts,
            sample_indices,
            truemin,
            tasks: self.tasks,
            hyperparameters: self.hyperparameters,
        })
    }

    pub fn from_record(record: &ExperimentRecord) -> Self {
        Self {
            name: record.name.clone(),
            dim: record.dim,
            xy: record.xy.iter().map(|s| s.to_row(record.layout)).collect(),
            gmp: record.gmp.iter().map(GlobalMinimumPrediction::to_row).collect(),
            best_acq: record.best_acq.iter().map(LocatedValue::to_row).collect(),
            total_time: record.total_time.clone(),
            iter_times: record.iter_times.clone(),
            acq_times: record.acq_times.clone(),
            initpts: record.initpts.iter().map(|&n| n as f64).collect(),
            sample_indices: record.sample_indices.iter().map(|&n| n as f64).collect(),
            truemin: record.truemin.iter().map(LocatedValue::to_row).collect(),
            tasks: record.tasks,
            hyperparameters: record.hyperparameters.clone(),
        }
    }
}

fn located_rows(rows: &[Vec<f64>], field: &str) -> Result<Vec<LocatedValue>, String> {
    rows.iter()
        .enumerate()
        .map(|(i, row)| LocatedValue::from_row(row).map_err(|e| format!("{field} row {i}: {e}")))
        .collect()
}

fn tags(values: &[f64], field: &str) -> Result<Vec<usize>, String> {
    values
        .iter()
        .map(|&v| source_tag(v).map_err(|e| format!("{field}: {e}")))
        .collect()
}

/// A processed record: the raw keys plus the derived consumer fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedRecordFile {
    #[serde(flatten)]
    pub raw: RawRecord,
    pub model_time: Vec<f64>,
    pub tolerance_levels: Vec<f64>,
    #[serde(rename = "B")]
    pub task_correlation: Option<Vec<Vec<f64>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
    /// `<quantity>_to_<measure>_convergence` series.
    #[serde(flatten)]
    pub convergence: BTreeMap<String, serde_json::Value>,
}

impl ProcessedRecordFile {
    pub fn from_processed(processed: &ProcessedExperiment) -> Self {
        let derived = &processed.derived;
        let mut convergence = BTreeMap::new();
        for series in derived.convergence.values() {
            let m = series.measure;
            convergence.insert(m.iterations_key(), serde_json::json!(series.iterations));
            convergence.insert(m.totaltime_key(), serde_json::json!(series.totaltime));
            convergence.insert(m.observations_key(), serde_json::json!(series.observations));
            convergence.insert(
                m.highest_fidelity_iterations_key(),
                serde_json::json!(series.highest_fidelity_iterations),
            );
        }

        Self {
            raw: RawRecord::from_record(&processed.record),
            model_time: derived.model_time.clone(),
            tolerance_levels: derived.tolerance_levels.clone(),
            task_correlation: derived.task_correlation.clone(),
            processed_at: derived.processed_at,
            convergence,
        }
    }

    pub fn into_processed(self) -> Result<ProcessedExperiment, DataError> {
        let record = self.raw.into_record()?;
        let mut convergence = BTreeMap::new();

        for measure in Measure::ALL {
            let Some(iterations) = self.convergence.get(&measure.iterations_key()) else {
                continue;
            };
            let iterations: Vec<Option<usize>> = series_field(&record.name, &measure.iterations_key(), iterations)?;
            let totaltime: Vec<Option<f64>> =
                required_series(&record.name, &self.convergence, &measure.totaltime_key())?;
            let observations: Vec<Option<usize>> =
                required_series(&record.name, &self.convergence, &measure.observations_key())?;
            let highest_fidelity_iterations =
                match self.convergence.get(&measure.highest_fidelity_iterations_key()) {
                    Some(value) => series_field(
                        &record.name,
                        &measure.highest_fidelity_iterations_key(),
                        value,
                    )?,
                    None => iterations.clone(),
                };

            let lengths = [totaltime.len(), observations.len(), highest_fidelity_iterations.len()];
            if lengths.iter().any(|&len| len != iterations.len())
                || iterations.len() != self.tolerance_levels.len()
            {
                return Err(DataError::InvalidFormat {
                    message: format!(
                        "{}: {} convergence series are not aligned with {} tolerance levels",
                        record.name,
                        measure,
                        self.tolerance_levels.len()
                    ),
                });
            }

            convergence.insert(
                measure,
                ConvergenceSeries {
                    measure,
                    iterations,
                    totaltime,
                    observations,
                    highest_fidelity_iterations,
                },
            );
        }

        Ok(ProcessedExperiment {
            record,
            derived: DerivedStatistics {
                model_time: self.model_time,
                tolerance_levels: self.tolerance_levels,
                convergence,
                task_correlation: self.task_correlation,
                processed_at: self.processed_at,
            },
        })
    }
}

fn series_field<T: serde::de::DeserializeOwned>(
    name: &str,
    key: &str,
    value: &serde_json::Value,
) -> Result<T, DataError> {
    serde_json::from_value(value.clone()).map_err(|e| DataError::ParseError {
        message: format!("{name}: field {key}: {e}"),
    })
}

fn required_series<T: serde::de::DeserializeOwned>(
    name: &str,
    fields: &BTreeMap<String, serde_json::Value>,
    key: &str,
) -> Result<T, DataError> {
    let value = fields.get(key).ok_or_else(|| DataError::MissingField {
        name: name.to_string(),
        field: key.to_string(),
    })?;
    series_field(name, key, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw() -> RawRecord {
        RawRecord {
            name: "2UHF_ICM1_ELCB1_exp1".to_string(),
            dim: 2,
            xy: vec![vec![0.1, 0.2, 1.0, 4.0], vec![0.3, 0.4, 0.0, 2.0]],
            gmp: vec![vec![0.3, 0.4, 2.5, 0.1]],
            best_acq: vec![vec![0.3, 0.4, 2.0]],
            total_time: vec![1.0, 2.0],
            iter_times: vec![1.0, 1.0],
            acq_times: vec![0.2, 0.3],
            initpts: vec![1.0, 1.0],
            sample_indices: vec![1.0, 0.0],
            truemin: vec![vec![0.0, 0.0, 1.5], vec![0.0, 0.0, 3.5]],
            tasks: Some(2),
            hyperparameters: vec![],
        }
    }

    #[test]
    fn positional_rows_become_named_fields() {
        let record = raw().into_record().unwrap();
        assert_eq!(record.layout, SampleLayout::MultiTask);
        assert_eq!(record.xy[0].source, 1);
        assert_eq!(record.xy[1].value, 2.0);
        assert_eq!(record.gmp[0].mean, 2.5);
        assert_eq!(record.truemin[1].value, 3.5);
        assert_eq!(record.initpts, vec![1, 1]);
    }

    #[test]
    fn ragged_sample_rows_are_rejected() {
        let mut raw = raw();
        raw.xy.push(vec![0.1, 0.2, 3.0]);
        let err = raw.into_record().unwrap_err();
        assert!(matches!(err, DataError::InvalidFormat { .. }));
    }

    #[test]
    fn width_not_matching_dim_is_rejected() {
        let mut raw = raw();
        raw.dim = 5;
        assert!(raw.into_record().is_err());
    }

    #[test]
    fn record_converts_back_to_same_rows() {
        let original = raw();
        let record = original.clone().into_record().unwrap();
        assert_eq!(RawRecord::from_record(&record), original);
    }

    #[test]
    fn processed_file_exposes_consumer_keys() {
        let record = raw().into_record().unwrap();
        let mut convergence = BTreeMap::new();
        convergence.insert(
            Measure::Gmp,
            ConvergenceSeries {
                measure: Measure::Gmp,
                iterations: vec![Some(3), None],
                totaltime: vec![Some(12.5), None],
                observations: vec![Some(5), None],
                highest_fidelity_iterations: vec![Some(2), None],
            },
        );
        let processed = ProcessedExperiment {
            record,
            derived: DerivedStatistics {
                model_time: vec![0.8, 0.7],
                tolerance_levels: vec![0.1, 0.0],
                convergence,
                task_correlation: None,
                processed_at: None,
            },
        };

        let value = serde_json::to_value(ProcessedRecordFile::from_processed(&processed)).unwrap();
        assert_eq!(value["iterations_to_gmp_convergence"], serde_json::json!([3, null]));
        assert_eq!(value["highest_fidelity_iterations_to_gmp_convergence"], serde_json::json!([2, null]));
        assert_eq!(value["B"], serde_json::Value::Null);
        assert_eq!(value["GP_hyperparam"], serde_json::json!([]));

        let parsed: ProcessedRecordFile = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.into_processed().unwrap(), processed);
    }

    #[test]
    fn misaligned_convergence_series_are_rejected() {
        let mut file = ProcessedRecordFile {
            raw: raw(),
            model_time: vec![],
            tolerance_levels: vec![0.1, 0.2],
            task_correlation: None,
            processed_at: None,
            convergence: BTreeMap::new(),
        };
        file.convergence.insert("iterations_to_gmp_convergence".into(), serde_json::json!([1]));
        file.convergence.insert("totaltime_to_gmp_convergence".into(), serde_json::json!([1.0]));
        file.convergence.insert("observations_to_gmp_convergence".into(), serde_json::json!([2]));
        assert!(file.into_processed().is_err());
    }
}
