//! ICLabel Native - Feature extraction and network inference
//!
//! This crate classifies independent components of an EEG recording:
//! - Topographic interpolation of the mixing matrix columns
//! - Power spectral density and autocorrelation of the activations
//! - Inference with the fixed ICLabel network over four augmented views
//!
//! # Modules
//!
//! - [`ica`]: ICA decomposition and component activations
//! - [`processing`]: Signal processing and interpolation
//! - [`features`]: Per-component feature extraction
//! - [`ml`]: Network parameters, layers and the classifier
//! - [`config`]: Feature extraction settings
//! - [`error`]: Error types

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]

pub mod config;
pub mod error;
pub mod features;
pub mod ica;
pub mod ml;
pub mod processing;

// Re-export key types
pub use config::{AutocorrMethod, FeatureConfig};
pub use error::{ConfigurationError, IcLabelError, IcLabelResult};
pub use features::{FeatureExtractor, IcFeatures};
pub use ica::{Activations, IcaDecomposition, RecordingKind};
pub use ml::classifier::{Classifier, ComponentLabels};
pub use ml::network::IcLabelNet;
pub use ml::params::NetworkParameters;
