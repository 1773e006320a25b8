use std::fs;
use std::path::{Path, PathBuf};

use bo_types::{BoResult, DataError, ExperimentRecord, ProcessedExperiment};

use crate::schema::{ProcessedRecordFile, RawRecord, DERIVED_KEYS};

/// Loads experiment records from JSON results files.
#[derive(Debug, Clone, Default)]
pub struct ExperimentLoader {
    /// Maximum number of runs read per experiment directory.
    limit: Option<usize>,
}

impl ExperimentLoader {
    pub fn new() -> Self {
        Self { limit: None }
    }

    pub fn with_limit(limit: usize) -> Self {
        Self { limit: Some(limit) }
    }

    /// Load a raw (not yet preprocessed) record.
    pub fn load_raw<P: AsRef<Path>>(&self, file_path: P) -> BoResult<ExperimentRecord> {
        let path = file_path.as_ref();
        tracing::debug!("Loading raw record from: {}", path.display());
        let contents = read_file(path)?;
        self.parse_raw(&contents)
    }

    pub fn parse_raw(&self, json: &str) -> BoResult<ExperimentRecord> {
        let value: serde_json::Value = serde_json::from_str(json).map_err(|e| DataError::ParseError {
            message: format!("Invalid JSON: {}", e),
        })?;

        if let Some(fields) = value.as_object() {
            if DERIVED_KEYS.iter().any(|key| fields.contains_key(*key)) {
                let name = fields
                    .get("name")
                    .and_then(|n| n.as_str())
                    .unwrap_or("<unnamed>")
                    .to_string();
                return Err(DataError::AlreadyProcessed { name }.into());
            }
        }

        let raw: RawRecord = serde_json::from_value(value).map_err(|e| DataError::ParseError {
            message: format!("Invalid raw record: {}", e),
        })?;
        Ok(raw.into_record()?)
    }

    /// Load a preprocessed record written by [`crate::ProcessedStorage`].
    pub fn load_processed<P: AsRef<Path>>(&self, file_path: P) -> BoResult<ProcessedExperiment> {
        let path = file_path.as_ref();
        tracing::debug!("Loading processed record from: {}", path.display());
        let contents = read_file(path)?;
        self.parse_processed(&contents)
    }

    pub fn parse_processed(&self, json: &str) -> BoResult<ProcessedExperiment> {
        let file: ProcessedRecordFile = serde_json::from_str(json).map_err(|e| DataError::ParseError {
            message: format!("Invalid processed record: {}", e),
        })?;
        Ok(file.into_processed()?)
    }

    /// Load every processed run of one experiment directory, ordered by file name.
    pub fn load_experiment_dir<P: AsRef<Path>>(&self, dir: P) -> BoResult<Vec<ProcessedExperiment>> {
        let dir = dir.as_ref();
        let mut files = DataLoaderUtils::list_record_files(dir)?;
        if let Some(limit) = self.limit {
            files.truncate(limit);
        }

        let runs = files
            .iter()
            .map(|path| self.load_processed(path))
            .collect::<BoResult<Vec<_>>>()?;

        tracing::info!("Loaded {} runs from {}", runs.len(), dir.display());
        Ok(runs)
    }

    /// Load several experiment directories, one entry per directory.
    pub fn load_experiments<P: AsRef<Path>>(&self, dirs: &[P]) -> BoResult<Vec<Vec<ProcessedExperiment>>> {
        dirs.iter().map(|dir| self.load_experiment_dir(dir)).collect()
    }
}

fn read_file(path: &Path) -> BoResult<String> {
    if !path.exists() {
        return Err(DataError::FileNotFound {
            path: path.display().to_string(),
        }
        .into());
    }
    Ok(fs::read_to_string(path)?)
}

/// Utility functions for data loading
pub struct DataLoaderUtils;

impl DataLoaderUtils {
    /// Whether a path names a JSON record file, by extension.
    pub fn is_record_file<P: AsRef<Path>>(file_path: P) -> bool {
        file_path
            .as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
    }

    /// JSON record files directly inside `dir`, sorted by file name.
    pub fn list_record_files<P: AsRef<Path>>(dir: P) -> BoResult<Vec<PathBuf>> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(DataError::DirectoryNotFound {
                path: dir.display().to_string(),
            }
            .into());
        }

        let mut files = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && Self::is_record_file(&path) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    const RAW: &str = r#"{
        "name": "2UHF_basic_exp1",
        "dim": 1,
        "xy": [[0.1, 7.0], [0.4, 6.0], [0.5, 5.5]],
        "gmp": [[0.4, 6.0, 0.2], [0.5, 5.5, 0.1]],
        "best_acq": [[0.4, 6.0], [0.5, 5.5]],
        "total_time": [10, 20.5],
        "iter_times": [10, 10.5],
        "acq_times": [2, 2.5],
        "initpts": [1],
        "truemin": [[0.5, 5.5]]
    }"#;

    #[test]
    fn test_raw_loading() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", RAW).unwrap();
        temp_file.flush().unwrap();

        let loader = ExperimentLoader::new();
        let record = loader.load_raw(temp_file.path()).unwrap();
        assert_eq!(record.name, "2UHF_basic_exp1");
        assert_eq!(record.xy.len(), 3);
        assert_eq!(record.xy[2].value, 5.5);
        assert_eq!(record.total_time, vec![10.0, 20.5]);
        assert!(record.sample_indices.is_empty());
        assert!(record.hyperparameters.is_empty());
        assert_eq!(record.tasks, None);
    }

    #[test]
    fn test_missing_required_field() {
        let loader = ExperimentLoader::new();
        let result = loader.parse_raw(r#"{"name": "x", "dim": 1}"#);
        match result.unwrap_err() {
            bo_types::BoError::Data(DataError::ParseError { message }) => {
                assert!(message.contains("missing field"));
            }
            other => panic!("Expected ParseError, got: {:?}", other),
        }
    }

    #[test]
    fn test_processed_file_rejected_as_raw() {
        let mut value: serde_json::Value = serde_json::from_str(RAW).unwrap();
        value["tolerance_levels"] = serde_json::json!([0.1]);

        let loader = ExperimentLoader::new();
        let result = loader.parse_raw(&value.to_string());
        match result.unwrap_err() {
            bo_types::BoError::Data(DataError::AlreadyProcessed { name }) => {
                assert_eq!(name, "2UHF_basic_exp1");
            }
            other => panic!("Expected AlreadyProcessed error, got: {:?}", other),
        }
    }

    #[test]
    fn test_loading_nonexistent_file() {
        let loader = ExperimentLoader::new();
        let result = loader.load_raw("/path/that/does/not/exist.json");
        match result.unwrap_err() {
            bo_types::BoError::Data(DataError::FileNotFound { .. }) => {}
            other => panic!("Expected FileNotFound error, got: {:?}", other),
        }
    }

    #[test]
    fn test_list_record_files_sorted_and_filtered() {
        let temp_dir = TempDir::new().unwrap();
        for name in ["b.json", "a.json", "notes.txt"] {
            std::fs::write(temp_dir.path().join(name), "{}").unwrap();
        }
        std::fs::create_dir(temp_dir.path().join("nested.json")).unwrap();

        let files = DataLoaderUtils::list_record_files(temp_dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.json", "b.json"]);
    }

    #[test]
    fn test_missing_directory() {
        let result = DataLoaderUtils::list_record_files("/no/such/experiment");
        assert!(matches!(
            result,
            Err(bo_types::BoError::Data(DataError::DirectoryNotFound { .. }))
        ));
    }

    #[test]
    fn test_record_file_detection() {
        assert!(DataLoaderUtils::is_record_file("run.JSON"));
        assert!(DataLoaderUtils::is_record_file("data/exp1/run.json"));
        assert!(!DataLoaderUtils::is_record_file("table.csv"));
        assert!(!DataLoaderUtils::is_record_file("boss.out"));
        assert!(!DataLoaderUtils::is_record_file("json"));
    }
}
