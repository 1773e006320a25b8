//! The experiment preprocessor and its batch drivers.

use chrono::Utc;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use bo_data::{DataLoaderUtils, ExperimentLoader, ProcessedStorage};
use bo_types::{
    validation_error, BoResult, DerivedStatistics, ExperimentRecord, Measure, PreprocessError, ProcessedExperiment,
};

use crate::{convergence, correlation, offsets, timing};

/// Preprocessing parameters shared by every record of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessConfig {
    pub tolerance_levels: Vec<f64>,
    /// Acquisition cost per fidelity of initial data generated outside the
    /// run; `None` entries are self-initializing fidelities.
    pub init_data_cost: Option<Vec<Option<Vec<f64>>>>,
    /// Measures to compute convergence for.
    pub measures: Vec<Measure>,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            tolerance_levels: vec![0.0],
            init_data_cost: None,
            measures: vec![Measure::Gmp],
        }
    }
}

impl PreprocessConfig {
    pub fn new(tolerance_levels: Vec<f64>) -> Self {
        Self {
            tolerance_levels,
            ..Self::default()
        }
    }

    pub fn with_init_data_cost(mut self, cost: Vec<Option<Vec<f64>>>) -> Self {
        self.init_data_cost = Some(cost);
        self
    }

    pub fn with_measures(mut self, measures: Vec<Measure>) -> Self {
        self.measures = measures;
        self
    }

    pub fn validate(&self) -> Result<(), PreprocessError> {
        if self.tolerance_levels.is_empty() {
            return Err(PreprocessError::NoToleranceLevels);
        }
        match self
            .tolerance_levels
            .iter()
            .find(|t| !t.is_finite() || **t < 0.0)
        {
            Some(&value) => Err(PreprocessError::InvalidTolerance { value }),
            None => Ok(()),
        }
    }
}

/// Turns raw experiment records into analysis-ready ones.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    config: PreprocessConfig,
}

/// Outcome of preprocessing a directory of results files.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Paths of the stored processed records.
    pub stored: Vec<PathBuf>,
    /// Records without any measure values: stored, but convergence is indeterminate.
    pub indeterminate: Vec<String>,
    pub failed: Vec<(PathBuf, String)>,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

impl Preprocessor {
    pub fn new(config: PreprocessConfig) -> BoResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// Preprocess one record: model time, initial data cost, offset
    /// normalization, convergence and task correlation.
    ///
    /// The record is consumed; the result cannot be fed back in, so offsets
    /// are applied exactly once.
    pub fn preprocess(&self, mut record: ExperimentRecord) -> BoResult<ProcessedExperiment> {
        debug!("Preprocessing record {}", record.name);

        let model_time = timing::model_time(&record.iter_times, &record.acq_times);

        if let Some(cost) = &self.config.init_data_cost {
            timing::add_init_acq_times(&mut record.total_time, &record.initpts, cost)?;
        }

        offsets::subtract_true_minimum(&mut record)?;

        let mut convergence = BTreeMap::new();
        for &measure in &self.config.measures {
            if let Some(series) =
                convergence::convergence_series(&record, measure, &self.config.tolerance_levels)?
            {
                convergence.insert(measure, series);
            }
        }

        let task_correlation = correlation::task_correlation(&record)?;

        Ok(ProcessedExperiment {
            record,
            derived: DerivedStatistics {
                model_time,
                tolerance_levels: self.config.tolerance_levels.clone(),
                convergence,
                task_correlation,
                processed_at: Some(Utc::now()),
            },
        })
    }

    /// Preprocess independent records in parallel. Results keep input order
    /// and a failing record does not affect the others.
    pub fn preprocess_batch(&self, records: Vec<ExperimentRecord>) -> Vec<BoResult<ProcessedExperiment>> {
        records
            .into_par_iter()
            .map(|record| self.preprocess(record))
            .collect()
    }

    /// Preprocess every results file in `input_dir` and store the results as
    /// experiment `experiment` in `storage`, one output per results file
    /// under the same file stem.
    pub fn preprocess_directory<P: AsRef<Path>>(
        &self,
        input_dir: P,
        storage: &ProcessedStorage,
        experiment: &str,
    ) -> BoResult<BatchReport> {
        let input_dir = input_dir.as_ref();
        if experiment.trim().is_empty() {
            return Err(validation_error!("experiment name must not be empty"));
        }
        let files = DataLoaderUtils::list_record_files(input_dir)?;
        info!(
            "Preprocessing {} results files from {} into experiment {}",
            files.len(),
            input_dir.display(),
            experiment
        );

        let mut report = BatchReport::default();

        // Each output file stem is written at most once.
        let mut claimed = HashSet::new();
        let mut jobs = Vec::with_capacity(files.len());
        for path in files {
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                warn!("Skipping {}: file name is not valid UTF-8", path.display());
                report.failed.push((path, "file name is not valid UTF-8".to_string()));
                continue;
            };
            if !claimed.insert(stem.clone()) {
                warn!("Skipping {}: output {}.json is already taken", path.display(), stem);
                report
                    .failed
                    .push((path, format!("output {stem}.json is already taken by another results file")));
                continue;
            }
            jobs.push((path, stem));
        }

        let loader = ExperimentLoader::new();
        let outcomes: Vec<(PathBuf, BoResult<(PathBuf, ProcessedExperiment)>)> = jobs
            .into_par_iter()
            .map(|(path, stem)| {
                let outcome = loader
                    .load_raw(&path)
                    .and_then(|record| self.preprocess(record))
                    .and_then(|processed| {
                        let stored = storage.save_as(experiment, &stem, &processed)?;
                        Ok((stored, processed))
                    });
                (path, outcome)
            })
            .collect();

        for (path, outcome) in outcomes {
            match outcome {
                Ok((stored, processed)) => {
                    if processed.derived.convergence.is_empty() {
                        report.indeterminate.push(processed.name().to_string());
                    }
                    report.stored.push(stored);
                }
                Err(e) => {
                    warn!("Failed to preprocess {}: {}", path.display(), e);
                    report.failed.push((path, e.to_string()));
                }
            }
        }

        info!(
            "Stored {} processed records ({} indeterminate, {} failed)",
            report.stored.len(),
            report.indeterminate.len(),
            report.failed.len()
        );
        Ok(report)
    }
}

/// Preprocess a single record with the given tolerance levels and optional
/// initial data cost.
pub fn preprocess(
    record: ExperimentRecord,
    tolerance_levels: &[f64],
    init_data_cost: Option<&[Option<Vec<f64>>]>,
) -> BoResult<ProcessedExperiment> {
    let mut config = PreprocessConfig::new(tolerance_levels.to_vec());
    if let Some(cost) = init_data_cost {
        config = config.with_init_data_cost(cost.to_vec());
    }
    Preprocessor::new(config)?.preprocess(record)
}
