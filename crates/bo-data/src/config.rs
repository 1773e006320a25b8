//! Analysis configuration: where experiments live, which tolerances to
//! evaluate and which baseline each transfer experiment is compared against.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use bo_types::{config_error, BoResult, StatsError};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV_VAR: &str = "BO_ANALYSIS_CONFIG";

/// Experiment directory -> `[baseline, ...]`; the first entry is the baseline.
pub type ExperimentGroup = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub data_root: PathBuf,
    /// Subdirectory of `data_root` holding processed experiments.
    pub processed_dir: String,
    pub tolerances: Vec<f64>,
    /// Runs read per experiment directory.
    pub num_experiments: usize,
    /// Per-experiment acquisition cost of externally generated initial data.
    pub init_data_cost: BTreeMap<String, Vec<Option<Vec<f64>>>>,
    /// Named groups such as `MT_experiment_plots_2D`.
    pub experiment_groups: BTreeMap<String, ExperimentGroup>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("data"),
            processed_dir: "processed".to_string(),
            tolerances: vec![0.0],
            num_experiments: 5,
            init_data_cost: BTreeMap::new(),
            experiment_groups: BTreeMap::new(),
        }
    }
}

impl AnalysisConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> BoResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| config_error!("Cannot read {}: {}", path.display(), e))?;
        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| config_error!("Invalid config {}: {}", path.display(), e))?;
        config.validate()?;

        tracing::info!(
            "Loaded analysis config from {} ({} groups, {} tolerances)",
            path.display(),
            config.experiment_groups.len(),
            config.tolerances.len()
        );
        Ok(config)
    }

    /// Resolve the configuration from an explicit path, then `BO_ANALYSIS_CONFIG`,
    /// falling back to defaults.
    pub fn resolve(path: Option<&Path>) -> BoResult<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(path) => Self::from_file(path),
            Err(_) => {
                tracing::debug!("{} not set, using default analysis config", CONFIG_ENV_VAR);
                Ok(Self::default())
            }
        }
    }

    pub fn validate(&self) -> BoResult<()> {
        if self.tolerances.is_empty() {
            return Err(config_error!("at least one tolerance level is required"));
        }
        if let Some(bad) = self.tolerances.iter().find(|t| !t.is_finite() || **t < 0.0) {
            return Err(config_error!("tolerance {} must be finite and non-negative", bad));
        }
        if self.num_experiments == 0 {
            return Err(config_error!("num_experiments must be positive"));
        }
        for (group, experiments) in &self.experiment_groups {
            if let Some((exp, _)) = experiments.iter().find(|(_, b)| b.is_empty()) {
                return Err(config_error!("experiment {} in group {} has no baseline", exp, group));
            }
        }
        Ok(())
    }

    pub fn processed_root(&self) -> PathBuf {
        self.data_root.join(&self.processed_dir)
    }

    pub fn group(&self, name: &str) -> BoResult<&ExperimentGroup> {
        self.experiment_groups.get(name).ok_or_else(|| {
            StatsError::GroupNotFound {
                group: name.to_string(),
            }
            .into()
        })
    }

    /// Processed directories of a group's experiments and of their baselines.
    /// Baselines shared by several experiments are listed once.
    pub fn group_dirs(&self, name: &str) -> BoResult<(Vec<PathBuf>, Vec<PathBuf>)> {
        let group = self.group(name)?;
        let root = self.processed_root();

        let experiments = group.keys().map(|exp| root.join(exp)).collect();

        let mut baselines: Vec<&String> = Vec::new();
        for baseline in group.values().filter_map(|b| b.first()) {
            if !baselines.contains(&baseline) {
                baselines.push(baseline);
            }
        }
        let baselines = baselines.into_iter().map(|b| root.join(b)).collect();

        Ok((experiments, baselines))
    }

    pub fn init_cost_for(&self, experiment: &str) -> Option<&[Option<Vec<f64>>]> {
        self.init_data_cost.get(experiment).map(Vec::as_slice)
    }
}
