//! Error types for feature extraction and inference
//!
//! Error types for the parameter store, configuration and the classifier
//! pipeline using `thiserror`.

use std::path::PathBuf;

use iclabel_core::InputShapeError;
use thiserror::Error;

/// Problems with the parameter store or the feature configuration.
///
/// All of these surface before any inference runs.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    /// Parameter file missing or unreadable
    #[error("Cannot read parameter file {path}: {source}")]
    Unreadable {
        /// File that failed to open
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// File is not a valid safetensors container
    #[error("Malformed parameter file: {reason}")]
    Malformed {
        /// What was wrong
        reason: String,
    },

    /// A required tensor is absent
    #[error("Missing tensor '{name}'")]
    MissingTensor {
        /// Tensor key
        name: String,
    },

    /// Tensor stored with a dtype other than F32
    #[error("Tensor '{name}' has unsupported dtype {dtype} (expected F32)")]
    UnsupportedDtype {
        /// Tensor key
        name: String,
        /// Dtype found in the header
        dtype: String,
    },

    /// Tensor shape differs from the fixed network topology
    #[error("Tensor '{name}' has shape {actual:?}, expected {expected:?}")]
    ShapeMismatch {
        /// Tensor key
        name: String,
        /// Required shape
        expected: Vec<usize>,
        /// Shape found in the file
        actual: Vec<usize>,
    },

    /// Feature configuration out of range
    #[error("Invalid feature configuration: {reason}")]
    InvalidConfig {
        /// What was wrong
        reason: String,
    },
}

/// Umbrella error for the ICLabel pipeline.
#[derive(Error, Debug)]
pub enum IcLabelError {
    /// Parameter store or configuration error
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Inputs with incompatible shapes
    #[error("Input shape error: {0}")]
    InputShape(#[from] InputShapeError),

    /// Topography interpolation system could not be solved
    #[error("Topography interpolation failed: {reason}")]
    Interpolation {
        /// Error reason
        reason: String,
    },

    /// Pseudo-inverse of a decomposition matrix failed
    #[error("Linear algebra error: {reason}")]
    LinearAlgebra {
        /// Error reason
        reason: String,
    },

    /// I/O error while writing output
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialisation error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for ICLabel operations
pub type IcLabelResult<T> = Result<T, IcLabelError>;
