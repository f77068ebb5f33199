//! Parameter store for the classifier network
//!
//! Parameters live in a safetensors container:
//!
//! ```text
//! [u64 LE header length][JSON header][little-endian tensor payload]
//! ```
//!
//! The header maps tensor names to `{dtype, shape, data_offsets}`; offsets
//! are relative to the start of the payload. Only `F32` tensors are decoded.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::layers::all_specs;
use crate::error::{ConfigurationError, IcLabelResult};

/// Header key reserved for free-form metadata.
const METADATA_KEY: &str = "__metadata__";

/// Dtype tag of 32-bit floats.
const F32_DTYPE: &str = "F32";

/// Header entry of one tensor.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct TensorMetadata {
    dtype: String,
    shape: Vec<usize>,
    data_offsets: [usize; 2],
}

/// A dense f32 tensor in row-major order.
#[derive(Clone, Debug, PartialEq)]
pub struct ParamTensor {
    shape: Vec<usize>,
    data: Vec<f32>,
}

impl ParamTensor {
    /// Tensor shape
    #[inline]
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Flattened values
    #[inline]
    #[must_use]
    pub fn data(&self) -> &[f32] {
        &self.data
    }
}

/// Named network parameters, immutable once handed to the network.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NetworkParameters {
    tensors: BTreeMap<String, ParamTensor>,
    /// Tensors present in the file with a dtype other than F32
    unsupported: BTreeMap<String, String>,
}

impl NetworkParameters {
    /// Empty parameter set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a safetensors file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::Unreadable`] when the file cannot be
    /// read and [`ConfigurationError::Malformed`] when it is not a valid
    /// container.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| ConfigurationError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        let params = Self::from_safetensors_bytes(&bytes)?;
        info!(tensors = params.len(), file = %path.display(), "Loaded network parameters");
        Ok(params)
    }

    /// Decode a safetensors container held in memory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::Malformed`] for a truncated buffer, an
    /// invalid header or tensor offsets outside the payload.
    pub fn from_safetensors_bytes(bytes: &[u8]) -> Result<Self, ConfigurationError> {
        let malformed = |reason: String| ConfigurationError::Malformed { reason };

        let len_bytes: [u8; 8] = bytes
            .get(..8)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| malformed(format!("file too short for header length ({} bytes)", bytes.len())))?;
        let header_len = usize::try_from(u64::from_le_bytes(len_bytes))
            .map_err(|_| malformed("header length overflows".into()))?;
        let header_end = 8usize
            .checked_add(header_len)
            .filter(|&end| end <= bytes.len())
            .ok_or_else(|| malformed(format!("header length {header_len} exceeds file size {}", bytes.len())))?;

        let header: BTreeMap<String, serde_json::Value> = serde_json::from_slice(&bytes[8..header_end])
            .map_err(|e| malformed(format!("invalid header: {e}")))?;
        let payload = &bytes[header_end..];

        let mut params = Self::new();
        for (name, value) in header {
            if name == METADATA_KEY {
                continue;
            }
            let meta: TensorMetadata = serde_json::from_value(value)
                .map_err(|e| malformed(format!("invalid entry for '{name}': {e}")))?;

            let [start, end] = meta.data_offsets;
            if start > end || end > payload.len() {
                return Err(malformed(format!(
                    "tensor '{name}' spans bytes {start}..{end} of a {}-byte payload",
                    payload.len()
                )));
            }

            if meta.dtype != F32_DTYPE {
                debug!(tensor = %name, dtype = %meta.dtype, "Skipping non-F32 tensor");
                params.unsupported.insert(name, meta.dtype);
                continue;
            }

            let byte_len = meta
                .shape
                .iter()
                .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
                .and_then(|count| count.checked_mul(4))
                .ok_or_else(|| malformed(format!("tensor '{name}' shape {:?} is too large", meta.shape)))?;
            if end - start != byte_len {
                return Err(malformed(format!(
                    "tensor '{name}' has {} bytes for shape {:?}",
                    end - start,
                    meta.shape
                )));
            }

            let data = payload[start..end]
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect();
            params.tensors.insert(name, ParamTensor { shape: meta.shape, data });
        }

        Ok(params)
    }

    /// Encode all F32 tensors as a safetensors container.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::Malformed`] if the header cannot be
    /// serialised.
    pub fn to_safetensors_bytes(&self) -> Result<Vec<u8>, ConfigurationError> {
        let mut header: BTreeMap<&str, TensorMetadata> = BTreeMap::new();
        let mut payload: Vec<u8> = Vec::new();

        for (name, tensor) in &self.tensors {
            let start = payload.len();
            for &v in &tensor.data {
                payload.extend_from_slice(&v.to_le_bytes());
            }
            header.insert(
                name,
                TensorMetadata {
                    dtype: F32_DTYPE.to_string(),
                    shape: tensor.shape.clone(),
                    data_offsets: [start, payload.len()],
                },
            );
        }

        let mut header_json = serde_json::to_string(&header).map_err(|e| ConfigurationError::Malformed {
            reason: format!("cannot serialise header: {e}"),
        })?;
        // Pad the header so the payload starts 8-byte aligned
        while header_json.len() % 8 != 0 {
            header_json.push(' ');
        }

        let mut bytes = Vec::with_capacity(8 + header_json.len() + payload.len());
        bytes.extend_from_slice(&(header_json.len() as u64).to_le_bytes());
        bytes.extend_from_slice(header_json.as_bytes());
        bytes.extend(payload);
        Ok(bytes)
    }

    /// Write the parameters to a safetensors file.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> IcLabelResult<()> {
        let bytes = self.to_safetensors_bytes()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Add or replace a tensor.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::Malformed`] when `data` does not hold
    /// exactly as many values as `shape` describes.
    pub fn insert(&mut self, name: impl Into<String>, shape: Vec<usize>, data: Vec<f32>) -> Result<(), ConfigurationError> {
        let name = name.into();
        let count = shape.iter().try_fold(1usize, |acc, &dim| acc.checked_mul(dim));
        if count != Some(data.len()) {
            return Err(ConfigurationError::Malformed {
                reason: format!("tensor '{name}' has {} values for shape {shape:?}", data.len()),
            });
        }
        self.unsupported.remove(&name);
        self.tensors.insert(name, ParamTensor { shape, data });
        Ok(())
    }

    /// Remove a tensor, returning it if present.
    pub fn remove(&mut self, name: &str) -> Option<ParamTensor> {
        self.tensors.remove(name)
    }

    /// Look up a tensor.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::UnsupportedDtype`] when the tensor was
    /// stored with another dtype and [`ConfigurationError::MissingTensor`]
    /// when it is absent.
    pub fn get(&self, name: &str) -> Result<&ParamTensor, ConfigurationError> {
        if let Some(tensor) = self.tensors.get(name) {
            return Ok(tensor);
        }
        match self.unsupported.get(name) {
            Some(dtype) => Err(ConfigurationError::UnsupportedDtype {
                name: name.to_string(),
                dtype: dtype.clone(),
            }),
            None => Err(ConfigurationError::MissingTensor { name: name.to_string() }),
        }
    }

    /// Number of decoded tensors
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    /// Whether no tensor was decoded
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// Iterate over `(name, tensor)` pairs in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamTensor)> {
        self.tensors.iter().map(|(name, tensor)| (name.as_str(), tensor))
    }

    /// Full parameter set for the classifier with every value produced by
    /// `fill(tensor_name, flat_index)`.
    pub fn filled_with(mut fill: impl FnMut(&str, usize) -> f32) -> Self {
        let mut params = Self::new();
        for spec in all_specs() {
            let weight_key = spec.weight_key();
            let shape = spec.weight_shape().to_vec();
            let count: usize = shape.iter().product();
            let data = (0..count).map(|i| fill(&weight_key, i)).collect();
            params.tensors.insert(weight_key, ParamTensor { shape, data });

            let bias_key = spec.bias_key();
            let data = (0..spec.out_channels).map(|i| fill(&bias_key, i)).collect();
            params.tensors.insert(bias_key, ParamTensor { shape: vec![spec.out_channels], data });
        }
        params
    }

    /// Full parameter set for the classifier with all values zero
    #[must_use]
    pub fn zeros() -> Self {
        Self::filled_with(|_, _| 0.0)
    }
}
