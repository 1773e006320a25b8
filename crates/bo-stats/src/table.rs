//! One row per run: convergence at a chosen tolerance level.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

use bo_data::ExperimentLoader;
use bo_types::{BoError, BoResult, ExperimentTags, ProcessedExperiment, Setup, StatsError, Strategy};

const SECONDS_PER_HOUR: f64 = 3600.0;

/// Position of `tolerance` among the tolerance levels a run was processed with.
pub fn tolerance_index(levels: &[f64], tolerance: f64) -> BoResult<usize> {
    levels
        .iter()
        .position(|&level| (level - tolerance).abs() <= f64::EPSILON * level.abs().max(1.0))
        .ok_or_else(|| {
            StatsError::UnknownTolerance {
                tolerance,
                available: levels.to_vec(),
            }
            .into()
        })
}

/// A column of the convergence table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Quantity {
    Iterations,
    HighestFidelityIterations,
    Observations,
    TotalTimeSeconds,
    CpuTimeHours,
}

impl Quantity {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Iterations => "iterations",
            Self::HighestFidelityIterations => "Highest fidelity iterations",
            Self::Observations => "observations",
            Self::TotalTimeSeconds => "CPU time [s]",
            Self::CpuTimeHours => "CPU time [h]",
        }
    }
}

/// Which source is the target of a multi-task run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighestFidelity {
    /// Names tagged `UHF`.
    Uhf,
    /// Everything else.
    Hf,
}

impl FromStr for HighestFidelity {
    type Err = BoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "uhf" => Ok(Self::Uhf),
            "hf" => Ok(Self::Hf),
            _ => Err(StatsError::InvalidHighestFidelity {
                value: s.to_string(),
            }
            .into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConvergenceRow {
    pub name: String,
    pub tags: ExperimentTags,
    pub secondary_initpts: usize,
    pub iterations: Option<usize>,
    pub highest_fidelity_iterations: Option<usize>,
    pub observations: Option<usize>,
    /// Cumulative run time at convergence, seconds.
    pub totaltime: Option<f64>,
}

impl ConvergenceRow {
    /// Row of `run` at tolerance index `idx`. Runs whose convergence is
    /// indeterminate get empty cells.
    pub fn from_run(run: &ProcessedExperiment, idx: usize) -> Self {
        let series = run.derived.gmp_convergence();
        let at = |values: Option<&Vec<Option<usize>>>| values.and_then(|v| v.get(idx).copied().flatten());

        Self {
            name: run.name().to_string(),
            tags: run.record.tags(),
            secondary_initpts: run.record.secondary_initpts(),
            iterations: at(series.map(|s| &s.iterations)),
            highest_fidelity_iterations: at(series.map(|s| &s.highest_fidelity_iterations)),
            observations: at(series.map(|s| &s.observations)),
            totaltime: series.and_then(|s| s.totaltime.get(idx).copied().flatten()),
        }
    }

    pub fn setup(&self) -> Setup {
        self.tags.setup()
    }

    pub fn strategy(&self) -> Strategy {
        self.tags.strategy()
    }

    pub fn cpu_time_hours(&self) -> Option<f64> {
        self.totaltime.map(|seconds| seconds / SECONDS_PER_HOUR)
    }

    pub fn value(&self, quantity: Quantity) -> Option<f64> {
        match quantity {
            Quantity::Iterations => self.iterations.map(|v| v as f64),
            Quantity::HighestFidelityIterations => self.highest_fidelity_iterations.map(|v| v as f64),
            Quantity::Observations => self.observations.map(|v| v as f64),
            Quantity::TotalTimeSeconds => self.totaltime,
            Quantity::CpuTimeHours => self.cpu_time_hours(),
        }
    }
}

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    name: &'a str,
    setup: String,
    strategy: String,
    secondary_initpts: usize,
    iterations: Option<usize>,
    highest_fidelity_iterations: Option<usize>,
    observations: Option<usize>,
    totaltime_s: Option<f64>,
    cpu_time_h: Option<f64>,
}

/// Convergence statistics of many runs at one tolerance level.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvergenceTable {
    pub tolerance: f64,
    pub rows: Vec<ConvergenceRow>,
}

impl ConvergenceTable {
    pub fn build(runs: &[ProcessedExperiment], tolerance: f64) -> BoResult<Self> {
        let rows = runs
            .iter()
            .map(|run| {
                let idx = tolerance_index(&run.derived.tolerance_levels, tolerance)?;
                Ok(ConvergenceRow::from_run(run, idx))
            })
            .collect::<BoResult<Vec<_>>>()?;

        Ok(Self { tolerance, rows })
    }

    pub fn filter_highest_fidelity(mut self, highest_fidelity: HighestFidelity) -> Self {
        self.rows.retain(|row| match highest_fidelity {
            HighestFidelity::Uhf => row.tags.uhf,
            HighestFidelity::Hf => !row.tags.uhf,
        });
        self
    }

    /// Rows of runs that never converged (or are indeterminate).
    pub fn non_converged(&self) -> Vec<&ConvergenceRow> {
        self.rows.iter().filter(|row| row.iterations.is_none()).collect()
    }

    /// `(secondary initpts, value)` pairs of a quantity, missing values dropped.
    pub fn points(&self, quantity: Quantity) -> Vec<(f64, f64)> {
        self.rows
            .iter()
            .filter_map(|row| row.value(quantity).map(|v| (row.secondary_initpts as f64, v)))
            .collect()
    }

    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> BoResult<()> {
        let file = std::fs::File::create(path.as_ref())?;
        self.write_csv_to(file)?;
        tracing::info!("Wrote {} rows to {}", self.rows.len(), path.as_ref().display());
        Ok(())
    }

    pub fn write_csv_to<W: Write>(&self, writer: W) -> BoResult<()> {
        let csv_error = |e: csv::Error| BoError::Csv(e.to_string());
        let mut wtr = csv::Writer::from_writer(writer);
        for row in &self.rows {
            wtr.serialize(CsvRow {
                name: &row.name,
                setup: row.setup().to_string(),
                strategy: row.strategy().to_string(),
                secondary_initpts: row.secondary_initpts,
                iterations: row.iterations,
                highest_fidelity_iterations: row.highest_fidelity_iterations,
                observations: row.observations,
                totaltime_s: row.totaltime,
                cpu_time_h: row.cpu_time_hours(),
            })
            .map_err(csv_error)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

/// Combine the processed runs of baseline and transfer experiments: baselines
/// first, at most `num_exp` runs per experiment directory.
pub fn load_statistics<P: AsRef<Path>>(
    baselines: &[P],
    experiments: &[P],
    num_exp: usize,
) -> BoResult<Vec<ProcessedExperiment>> {
    let loader = ExperimentLoader::with_limit(num_exp);

    let mut runs = Vec::new();
    for dir in baselines.iter().chain(experiments.iter()) {
        runs.extend(loader.load_experiment_dir(dir)?);
    }

    tracing::info!(
        "Loaded {} runs from {} baseline and {} transfer directories",
        runs.len(),
        baselines.len(),
        experiments.len()
    );
    Ok(runs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bo_types::{ConvergenceSeries, DerivedStatistics, ExperimentRecord, Measure};
    use std::collections::BTreeMap;

    pub(crate) fn run(
        name: &str,
        initpts: Vec<usize>,
        iterations: Vec<Option<usize>>,
        totaltime: Vec<Option<f64>>,
    ) -> ProcessedExperiment {
        let mut record = ExperimentRecord::new(name, 2);
        record.initpts = initpts;
        let tolerance_levels = vec![0.1, 0.23];
        let mut convergence = BTreeMap::new();
        convergence.insert(
            Measure::Gmp,
            ConvergenceSeries {
                measure: Measure::Gmp,
                observations: iterations.iter().map(|i| i.map(|i| i + 2)).collect(),
                highest_fidelity_iterations: iterations.iter().map(|i| i.map(|i| i / 2)).collect(),
                iterations,
                totaltime,
            },
        );
        ProcessedExperiment {
            record,
            derived: DerivedStatistics {
                model_time: vec![],
                tolerance_levels,
                convergence,
                task_correlation: None,
                processed_at: None,
            },
        }
    }

    #[test]
    fn tolerance_must_be_configured() {
        assert_eq!(tolerance_index(&[0.1, 0.23], 0.23).unwrap(), 1);
        match tolerance_index(&[0.1, 0.23], 0.5) {
            Err(BoError::Stats(StatsError::UnknownTolerance { available, .. })) => {
                assert_eq!(available, vec![0.1, 0.23]);
            }
            other => panic!("Expected UnknownTolerance, got: {:?}", other),
        }
    }

    #[test]
    fn rows_pick_the_tolerance_column() {
        let runs = vec![
            run("2UHF_basic_exp1", vec![5], vec![Some(40), Some(30)], vec![Some(7200.0), Some(3600.0)]),
            run("2UHF_ICM1_ELCB1_exp1", vec![5, 20], vec![None, Some(12)], vec![None, Some(1800.0)]),
        ];
        let table = ConvergenceTable::build(&runs, 0.23).unwrap();

        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].iterations, Some(30));
        assert_eq!(table.rows[0].cpu_time_hours(), Some(1.0));
        assert_eq!(table.rows[0].setup(), Setup::Baseline);
        assert_eq!(table.rows[1].secondary_initpts, 20);
        assert_eq!(table.rows[1].highest_fidelity_iterations, Some(6));
        assert_eq!(table.rows[1].observations, Some(14));
        assert_eq!(table.rows[1].strategy(), Strategy::MfboApproach(1));

        let at_tight = ConvergenceTable::build(&runs, 0.1).unwrap();
        let missing: Vec<_> = at_tight.non_converged().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(missing, vec!["2UHF_ICM1_ELCB1_exp1"]);
    }

    #[test]
    fn indeterminate_runs_have_empty_cells() {
        let mut interrupted = run("2UHF_basic_sobol", vec![5], vec![Some(1), Some(1)], vec![None, None]);
        interrupted.derived.convergence.clear();
        let table = ConvergenceTable::build(&[interrupted], 0.1).unwrap();
        assert_eq!(table.rows[0].iterations, None);
        assert_eq!(table.rows[0].totaltime, None);
    }

    #[test]
    fn highest_fidelity_filter() {
        let runs = vec![
            run("2UHF_basic_exp1", vec![5], vec![Some(1), Some(1)], vec![None, None]),
            run("2HF_basic_exp1", vec![5], vec![Some(1), Some(1)], vec![None, None]),
        ];
        let table = ConvergenceTable::build(&runs, 0.1).unwrap();
        let hf = table.clone().filter_highest_fidelity(HighestFidelity::Hf);
        assert_eq!(hf.rows.len(), 1);
        assert_eq!(hf.rows[0].name, "2HF_basic_exp1");
        let uhf = table.filter_highest_fidelity("UHF".parse().unwrap());
        assert_eq!(uhf.rows[0].name, "2UHF_basic_exp1");
        assert!("lf".parse::<HighestFidelity>().is_err());
    }

    #[test]
    fn points_drop_missing_values() {
        let runs = vec![
            run("a", vec![5, 10], vec![Some(4), Some(3)], vec![None, Some(50.0)]),
            run("b", vec![5], vec![None, None], vec![None, None]),
        ];
        let table = ConvergenceTable::build(&runs, 0.23).unwrap();
        assert_eq!(table.points(Quantity::Iterations), vec![(10.0, 3.0)]);
        assert_eq!(table.points(Quantity::TotalTimeSeconds), vec![(10.0, 50.0)]);
    }

    #[test]
    fn csv_export_leaves_missing_cells_empty() {
        let runs = vec![run("2UHF_ICM2_ELCB6_exp1", vec![5, 0], vec![None, Some(8)], vec![None, Some(900.0)])];
        let table = ConvergenceTable::build(&runs, 0.1).unwrap();

        let mut buffer = Vec::new();
        table.write_csv_to(&mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "name,setup,strategy,secondary_initpts,iterations,highest_fidelity_iterations,observations,totaltime_s,cpu_time_h"
        );
        assert_eq!(lines.next().unwrap(), "2UHF_ICM2_ELCB6_exp1,HF -> UHF,MFBO approach 6,0,,,,,");
    }

    #[test]
    fn load_statistics_limits_runs_per_directory() {
        use bo_data::ProcessedStorage;

        let root = tempfile::TempDir::new().unwrap();
        let storage = ProcessedStorage::new(root.path()).unwrap();
        for i in 1..=3 {
            let name = format!("2UHF_basic_exp{i}");
            storage
                .save("2UHF_basic", &run(&name, vec![5], vec![Some(4), Some(3)], vec![Some(1.0), Some(2.0)]))
                .unwrap();
            let name = format!("2UHF_ICM1_ELCB1_exp{i}");
            storage
                .save("2UHF_ICM1_ELCB1", &run(&name, vec![5, 10], vec![None, Some(3)], vec![None, Some(2.0)]))
                .unwrap();
        }

        let runs = load_statistics(
            &[root.path().join("2UHF_basic")],
            &[root.path().join("2UHF_ICM1_ELCB1")],
            2,
        )
        .unwrap();
        let names: Vec<_> = runs.iter().map(|r| r.name()).collect();
        assert_eq!(
            names,
            vec!["2UHF_basic_exp1", "2UHF_basic_exp2", "2UHF_ICM1_ELCB1_exp1", "2UHF_ICM1_ELCB1_exp2"]
        );
    }
}
