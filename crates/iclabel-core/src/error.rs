//! Error types for ICLabel input validation
//!
//! These errors describe inputs whose shapes cannot be reconciled. They are
//! raised before any numerical work starts, so a failed call never produces
//! partial features or probabilities.

use core::fmt;

/// Shape or size mismatch in the inputs to feature extraction or inference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputShapeError {
    /// Number of sensor positions differs from the mixing-vector length
    ChannelCountMismatch {
        /// Number of sensor positions supplied
        positions: usize,
        /// Number of rows in the mixing matrix
        mixing: usize,
    },
    /// Activations contain no components, epochs or samples
    EmptyActivations,
    /// Mixing / unmixing matrices disagree on their dimensions
    MixingShape {
        /// Expected `(rows, cols)`
        expected: (usize, usize),
        /// Actual `(rows, cols)`
        got: (usize, usize),
    },
    /// Component count differs between two inputs
    ComponentCountMismatch {
        /// Which input disagrees
        what: &'static str,
        /// Expected component count
        expected: usize,
        /// Actual component count
        got: usize,
    },
    /// A feature tensor has the wrong per-component shape
    FeatureShape {
        /// Feature name
        feature: &'static str,
        /// Expected `(height, width)`
        expected: (usize, usize),
        /// Actual `(height, width)`
        got: (usize, usize),
    },
    /// Epochs are too short to estimate the spectrum
    EpochTooShort {
        /// Samples per epoch
        samples: usize,
        /// Minimum number of samples required
        required: usize,
    },
}

impl fmt::Display for InputShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChannelCountMismatch { positions, mixing } => {
                write!(
                    f,
                    "Channel count mismatch: {positions} sensor positions, mixing matrix has {mixing} channels"
                )
            }
            Self::EmptyActivations => write!(f, "Activations are empty"),
            Self::MixingShape { expected, got } => {
                write!(
                    f,
                    "Mixing matrix shape mismatch: expected {}x{}, got {}x{}",
                    expected.0, expected.1, got.0, got.1
                )
            }
            Self::ComponentCountMismatch { what, expected, got } => {
                write!(f, "Component count mismatch in {what}: expected {expected}, got {got}")
            }
            Self::FeatureShape { feature, expected, got } => {
                write!(
                    f,
                    "Invalid {feature} shape: expected {}x{}, got {}x{}",
                    expected.0, expected.1, got.0, got.1
                )
            }
            Self::EpochTooShort { samples, required } => {
                write!(f, "Epochs too short: {samples} samples, need more than {required}")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for InputShapeError {}
