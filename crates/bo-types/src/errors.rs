use thiserror::Error;

/// Main error type for BO-Analysis
#[derive(Error, Debug)]
pub enum BoError {
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Preprocessing error: {0}")]
    Preprocess(#[from] PreprocessError),

    #[error("Statistics error: {0}")]
    Stats(#[from] StatsError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Errors raised while reading or writing experiment records
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Experiment file not found: {path}")]
    FileNotFound { path: String },

    #[error("Experiment directory not found: {path}")]
    DirectoryNotFound { path: String },

    #[error("Missing field '{field}' in record {name}")]
    MissingField { name: String, field: String },

    #[error("Invalid data format: {message}")]
    InvalidFormat { message: String },

    #[error("Record {name} has already been preprocessed")]
    AlreadyProcessed { name: String },

    #[error("Data parsing error: {message}")]
    ParseError { message: String },
}

/// Errors raised by the experiment preprocessor
#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("No tolerance levels given")]
    NoToleranceLevels,

    #[error("Invalid tolerance level {value}: must be finite and non-negative")]
    InvalidTolerance { value: f64 },

    #[error("Record {name} has no true minimum to offset against")]
    MissingTrueMinimum { name: String },

    #[error("Shape mismatch in record {name}: {message}")]
    ShapeMismatch { name: String, message: String },

    #[error("Invalid initialization cost for fidelity {fidelity}: {message}")]
    InvalidInitCost { fidelity: usize, message: String },

    #[error("Invalid hyperparameters at iteration {iteration}: {message}")]
    InvalidHyperparameters { iteration: usize, message: String },
}

/// Errors raised while tabulating convergence statistics
#[derive(Error, Debug)]
pub enum StatsError {
    #[error("Invalid tolerance level {tolerance}, choose from {available:?}")]
    UnknownTolerance { tolerance: f64, available: Vec<f64> },

    #[error("Invalid highest fidelity '{value}', choose 'uhf' or 'hf'")]
    InvalidHighestFidelity { value: String },

    #[error("Experiment group not found: {group}")]
    GroupNotFound { group: String },
}

/// Result type alias for BO-Analysis operations
pub type BoResult<T> = Result<T, BoError>;

/// Macro for creating validation errors
#[macro_export]
macro_rules! validation_error {
    ($($arg:tt)*) => {
        $crate::BoError::Validation(format!($($arg)*))
    };
}

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::BoError::Config(format!($($arg)*))
    };
}
