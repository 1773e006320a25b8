use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use bo_types::{BoResult, ProcessedExperiment};

use crate::schema::ProcessedRecordFile;

/// Writes processed records below `<root>/<experiment>/<run>.json`.
#[derive(Debug, Clone)]
pub struct ProcessedStorage {
    pub data_root: PathBuf,
}

impl ProcessedStorage {
    pub fn new<P: AsRef<Path>>(data_root: P) -> BoResult<Self> {
        let data_root = data_root.as_ref().to_path_buf();
        fs::create_dir_all(&data_root)?;

        Ok(Self { data_root })
    }

    /// Storage path of one run of an experiment.
    pub fn record_path(&self, experiment: &str, run_name: &str) -> PathBuf {
        self.data_root
            .join(experiment)
            .join(format!("{}.json", sanitize(run_name)))
    }

    /// Store a run under its record name.
    pub fn save(&self, experiment: &str, processed: &ProcessedExperiment) -> BoResult<PathBuf> {
        self.save_as(experiment, processed.name(), processed)
    }

    /// Store a run under an explicit file stem, e.g. that of its results file.
    pub fn save_as(
        &self,
        experiment: &str,
        file_stem: &str,
        processed: &ProcessedExperiment,
    ) -> BoResult<PathBuf> {
        let path = self.record_path(experiment, file_stem);
        Self::write_to(&path, processed)?;
        Ok(path)
    }

    /// Write a processed record to an explicit path, creating parent directories.
    pub fn write_to(path: &Path, processed: &ProcessedExperiment) -> BoResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = fs::File::create(path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, &ProcessedRecordFile::from_processed(processed))?;
        writer.flush()?;

        tracing::debug!("Stored processed record {} at {}", processed.name(), path.display());
        Ok(())
    }
}

fn sanitize(run_name: &str) -> String {
    run_name
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect()
}
