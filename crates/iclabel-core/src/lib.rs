//! ICLabel Core - `no_std` compatible types and utilities
//!
//! This crate provides the foundational types for classifying ICA components
//! of EEG recordings. It is designed to work without the standard library
//! (only `alloc` is required) so the geometry and label contracts can be
//! shared with constrained targets.
//!
//! # Modules
//!
//! - [`types`]: Feature dimensions and the fixed network constants
//! - [`labels`]: Component classes, probability vectors and the label mapper
//! - [`geometry`]: Sensor positions and the polar topographic projection
//! - [`math`]: Window functions and small statistics helpers
//! - [`error`]: Input shape errors
//!
//! # Features
//!
//! - `std`: Enable standard library support (`std::error::Error` impls)
//!
//! # Example
//!
//! ```rust
//! use iclabel_core::geometry::{HeadFrame, SensorPosition};
//! use iclabel_core::labels::ClassProbability;
//!
//! // A sensor at the vertex projects onto the centre of the scalp map
//! let polar = SensorPosition::new(0.0, 0.0, 1.0).to_polar(HeadFrame::Eeglab);
//! assert!(polar.radius.abs() < 1e-12);
//!
//! let probs = ClassProbability::new([0.7, 0.1, 0.05, 0.05, 0.05, 0.025, 0.025]);
//! assert_eq!(probs.predict().label.name(), "Brain");
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_precision_loss)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod error;
pub mod geometry;
pub mod labels;
pub mod math;
pub mod types;

// Re-export commonly used types at crate root
pub use error::InputShapeError;
pub use geometry::{ChannelLayout, HeadFrame, PolarPosition, SensorPosition};
pub use labels::{ClassProbability, IcLabel, Prediction};
pub use types::{FeatureKind, AUTOCORR_LAGS, N_CLASSES, N_VIEWS, PSD_BINS, TOPO_GRID};
