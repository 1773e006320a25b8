//! Raw experiment records as produced by one optimization run.
//!
//! Every per-iteration series is stored oldest first: index 0 is the first
//! iteration, the last element is the most recent one.

use crate::errors::DataError;
use crate::tags::ExperimentTags;

/// How the input coordinates and the source tag are laid out in a sample row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleLayout {
    /// `[x_1 .. x_dim, value]`
    SingleTask,
    /// `[x_1 .. x_dim, source, value]`
    MultiTask,
}

impl SampleLayout {
    /// Infer the layout from the search dimensionality and the row width.
    pub fn from_width(dim: usize, width: usize) -> Option<Self> {
        if width == dim + 1 {
            Some(Self::SingleTask)
        } else if width == dim + 2 {
            Some(Self::MultiTask)
        } else {
            None
        }
    }

    pub fn row_width(&self, dim: usize) -> usize {
        match self {
            Self::SingleTask => dim + 1,
            Self::MultiTask => dim + 2,
        }
    }
}

/// One observed sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub coordinates: Vec<f64>,
    /// Fidelity/task source that produced the sample (0 = highest fidelity).
    pub source: usize,
    pub value: f64,
}

impl Sample {
    pub fn new(coordinates: Vec<f64>, source: usize, value: f64) -> Self {
        Self {
            coordinates,
            source,
            value,
        }
    }

    /// Build a sample from its positional row.
    pub fn from_row(row: &[f64], dim: usize, layout: SampleLayout) -> Result<Self, DataError> {
        if row.len() != layout.row_width(dim) {
            return Err(DataError::InvalidFormat {
                message: format!(
                    "sample row has {} columns, expected {}",
                    row.len(),
                    layout.row_width(dim)
                ),
            });
        }

        let source = match layout {
            SampleLayout::SingleTask => 0,
            SampleLayout::MultiTask => source_tag(row[dim])?,
        };

        Ok(Self {
            coordinates: row[..dim].to_vec(),
            source,
            value: row[row.len() - 1],
        })
    }

    pub fn to_row(&self, layout: SampleLayout) -> Vec<f64> {
        let mut row = self.coordinates.clone();
        if layout == SampleLayout::MultiTask {
            row.push(self.source as f64);
        }
        row.push(self.value);
        row
    }
}

/// Parse a source tag stored as a float column.
pub fn source_tag(raw: f64) -> Result<usize, DataError> {
    if raw.is_finite() && raw >= 0.0 && raw.fract() == 0.0 {
        Ok(raw as usize)
    } else {
        Err(DataError::InvalidFormat {
            message: format!("source tag {raw} is not a non-negative integer"),
        })
    }
}

/// The surrogate model's estimate of the global minimum at one iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalMinimumPrediction {
    pub location: Vec<f64>,
    /// Predicted mean at `location`; the value convergence is measured on.
    pub mean: f64,
    pub variance: f64,
}

impl GlobalMinimumPrediction {
    /// Rows are `[location.., mean, variance]`.
    pub fn from_row(row: &[f64]) -> Result<Self, DataError> {
        if row.len() < 2 {
            return Err(DataError::InvalidFormat {
                message: format!("gmp row has {} columns, expected at least 2", row.len()),
            });
        }
        let n = row.len();
        Ok(Self {
            location: row[..n - 2].to_vec(),
            mean: row[n - 2],
            variance: row[n - 1],
        })
    }

    pub fn to_row(&self) -> Vec<f64> {
        let mut row = self.location.clone();
        row.push(self.mean);
        row.push(self.variance);
        row
    }
}

/// A located objective value: best acquisitions and true minima share this shape.
#[derive(Debug, Clone, PartialEq)]
pub struct LocatedValue {
    pub location: Vec<f64>,
    pub value: f64,
}

/// Best acquisition observed up to an iteration.
pub type Acquisition = LocatedValue;

/// Known true minimum of one source.
pub type TrueMinimum = LocatedValue;

impl LocatedValue {
    /// Rows are `[location.., value]`.
    pub fn from_row(row: &[f64]) -> Result<Self, DataError> {
        match row.split_last() {
            Some((value, location)) => Ok(Self {
                location: location.to_vec(),
                value: *value,
            }),
            None => Err(DataError::InvalidFormat {
                message: "empty row where [location.., value] was expected".to_string(),
            }),
        }
    }

    pub fn to_row(&self) -> Vec<f64> {
        let mut row = self.location.clone();
        row.push(self.value);
        row
    }
}

/// One optimization run, as loaded from its results file.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentRecord {
    pub name: String,
    pub dim: usize,
    pub layout: SampleLayout,
    pub xy: Vec<Sample>,
    pub gmp: Vec<GlobalMinimumPrediction>,
    pub best_acq: Vec<Acquisition>,
    pub total_time: Vec<f64>,
    pub iter_times: Vec<f64>,
    pub acq_times: Vec<f64>,
    /// Initial point count per fidelity/task source.
    pub initpts: Vec<usize>,
    pub sample_indices: Vec<usize>,
    pub truemin: Vec<TrueMinimum>,
    pub tasks: Option<usize>,
    pub hyperparameters: Vec<Vec<f64>>,
}

impl ExperimentRecord {
    /// An empty single-task record; loaders and tests fill in the series.
    pub fn new(name: impl Into<String>, dim: usize) -> Self {
        Self {
            name: name.into(),
            dim,
            layout: SampleLayout::SingleTask,
            xy: Vec::new(),
            gmp: Vec::new(),
            best_acq: Vec::new(),
            total_time: Vec::new(),
            iter_times: Vec::new(),
            acq_times: Vec::new(),
            initpts: Vec::new(),
            sample_indices: Vec::new(),
            truemin: Vec::new(),
            tasks: None,
            hyperparameters: Vec::new(),
        }
    }

    pub fn tags(&self) -> ExperimentTags {
        ExperimentTags::parse(&self.name)
    }

    /// Multi-fidelity (ICM) runs report convergence in highest-fidelity evaluations too.
    pub fn is_multi_fidelity(&self) -> bool {
        self.tags().icm.is_some()
    }

    pub fn is_multi_task(&self) -> bool {
        self.layout == SampleLayout::MultiTask
    }

    /// Number of initial points taken from the secondary source, 0 for single-source runs.
    pub fn secondary_initpts(&self) -> usize {
        self.initpts.get(1).copied().unwrap_or(0)
    }

    /// Running count of highest-fidelity samples, one entry per sample index.
    pub fn highest_fidelity_iterations(&self) -> Vec<usize> {
        self.sample_indices
            .iter()
            .scan(0usize, |count, &source| {
                if source == 0 {
                    *count += 1;
                }
                Some(*count)
            })
            .collect()
    }
}
