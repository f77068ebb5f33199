//! Classifier network and inference
//!
//! Parameters are loaded from a safetensors file, bound to the fixed
//! network topology and run over a four-view augmented batch.

pub mod augment;
pub mod classifier;
pub mod layers;
pub mod network;
pub mod params;
