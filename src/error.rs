//! Error types for the Koopman generator library.

use thiserror::Error;

/// Result type alias for generator estimation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while simulating, fitting or analysing.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid input data or parameters
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Array shapes that do not line up
    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    /// A matrix that had to be inverted was singular
    #[error("Singular matrix: {0}")]
    SingularMatrix(String),

    /// An iterative decomposition did not converge
    #[error("Decomposition failed: {0}")]
    Decomposition(String),

    /// Data loading failed
    #[error("Failed to load data: {0}")]
    DataLoad(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// NumPy array file error
    #[error("NPY read error: {0}")]
    Npy(#[from] ndarray_npy::ReadNpyError),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlDe(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

impl Error {
    /// Shorthand for a shape mismatch between two described shapes.
    pub fn shape(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Error::ShapeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}
