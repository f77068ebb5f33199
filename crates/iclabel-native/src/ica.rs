//! ICA decomposition and component activations
//!
//! The decomposition itself is computed elsewhere; this module only holds
//! its outputs and derives what the classifier needs from them.

use nalgebra::DMatrix;
use ndarray::{Array2, Array3, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

use iclabel_core::InputShapeError;

use crate::error::{IcLabelError, IcLabelResult};

/// Whether activations come from a continuous recording or from epochs.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingKind {
    /// One uninterrupted recording (a single epoch)
    #[default]
    Continuous,
    /// Several equal-length epochs
    Epoched,
}

/// Unmixing and mixing matrices of an ICA decomposition.
#[derive(Clone, Debug, PartialEq)]
pub struct IcaDecomposition {
    /// Components × channels
    unmixing: Array2<f64>,
    /// Channels × components; column `i` is the scalp map of component `i`
    mixing: Array2<f64>,
}

impl IcaDecomposition {
    /// Wrap an unmixing matrix and its matching mixing matrix.
    ///
    /// # Errors
    ///
    /// Returns [`InputShapeError::MixingShape`] when the mixing matrix is not
    /// `channels × components`, or [`InputShapeError::EmptyActivations`] for
    /// an empty decomposition.
    pub fn new(unmixing: Array2<f64>, mixing: Array2<f64>) -> IcLabelResult<Self> {
        let (n_components, n_channels) = unmixing.dim();
        if n_components == 0 || n_channels == 0 {
            return Err(InputShapeError::EmptyActivations.into());
        }
        if mixing.dim() != (n_channels, n_components) {
            return Err(InputShapeError::MixingShape {
                expected: (n_channels, n_components),
                got: mixing.dim(),
            }
            .into());
        }
        Ok(Self { unmixing, mixing })
    }

    /// Build from the unmixing matrix alone, using its pseudo-inverse as the
    /// mixing matrix.
    ///
    /// # Errors
    ///
    /// Fails for an empty matrix or when the pseudo-inverse cannot be formed.
    pub fn from_unmixing(unmixing: Array2<f64>) -> IcLabelResult<Self> {
        let (rows, cols) = unmixing.dim();
        if rows == 0 || cols == 0 {
            return Err(InputShapeError::EmptyActivations.into());
        }

        let w = DMatrix::from_fn(rows, cols, |r, c| unmixing[[r, c]]);
        let eps = f64::EPSILON * rows.max(cols) as f64 * w.norm();
        let pinv = w
            .pseudo_inverse(eps)
            .map_err(|reason| IcLabelError::LinearAlgebra { reason: reason.to_string() })?;

        let mixing = Array2::from_shape_fn((cols, rows), |(r, c)| pinv[(r, c)]);
        Self::new(unmixing, mixing)
    }

    /// Build from the mixing matrix alone, using its pseudo-inverse as the
    /// unmixing matrix.
    ///
    /// # Errors
    ///
    /// Fails for an empty matrix or when the pseudo-inverse cannot be formed.
    pub fn from_mixing(mixing: Array2<f64>) -> IcLabelResult<Self> {
        let (rows, cols) = mixing.dim();
        if rows == 0 || cols == 0 {
            return Err(InputShapeError::EmptyActivations.into());
        }

        let a = DMatrix::from_fn(rows, cols, |r, c| mixing[[r, c]]);
        let eps = f64::EPSILON * rows.max(cols) as f64 * a.norm();
        let pinv = a
            .pseudo_inverse(eps)
            .map_err(|reason| IcLabelError::LinearAlgebra { reason: reason.to_string() })?;

        let unmixing = Array2::from_shape_fn((cols, rows), |(r, c)| pinv[(r, c)]);
        Self::new(unmixing, mixing)
    }

    /// Number of components
    #[inline]
    #[must_use]
    pub fn n_components(&self) -> usize {
        self.unmixing.nrows()
    }

    /// Number of channels
    #[inline]
    #[must_use]
    pub fn n_channels(&self) -> usize {
        self.unmixing.ncols()
    }

    /// Unmixing matrix (components × channels)
    #[inline]
    #[must_use]
    pub fn unmixing(&self) -> &Array2<f64> {
        &self.unmixing
    }

    /// Mixing matrix (channels × components)
    #[inline]
    #[must_use]
    pub fn mixing(&self) -> &Array2<f64> {
        &self.mixing
    }

    /// Scalp map (mixing column) of one component
    #[inline]
    #[must_use]
    pub fn component(&self, index: usize) -> ArrayView1<'_, f64> {
        self.mixing.column(index)
    }

    /// Project continuous sensor data (channels × samples) onto the components.
    ///
    /// # Errors
    ///
    /// Fails when the channel count differs or the data is empty.
    pub fn sources(&self, data: &Array2<f64>) -> IcLabelResult<Activations> {
        if data.nrows() != self.n_channels() {
            return Err(InputShapeError::ChannelCountMismatch {
                positions: data.nrows(),
                mixing: self.n_channels(),
            }
            .into());
        }
        Activations::continuous(self.unmixing.dot(data))
    }

    /// Project epoched sensor data (channels × epochs × samples) onto the
    /// components.
    ///
    /// # Errors
    ///
    /// Fails when the channel count differs or the data is empty.
    pub fn epoched_sources(&self, data: &Array3<f64>) -> IcLabelResult<Activations> {
        let (n_channels, n_epochs, n_samples) = data.dim();
        if n_channels != self.n_channels() {
            return Err(InputShapeError::ChannelCountMismatch {
                positions: n_channels,
                mixing: self.n_channels(),
            }
            .into());
        }

        let mut out = Array3::zeros((self.n_components(), n_epochs, n_samples));
        for epoch in 0..n_epochs {
            let projected = self.unmixing.dot(&data.index_axis(Axis(1), epoch));
            out.index_axis_mut(Axis(1), epoch).assign(&projected);
        }
        Activations::epoched(out)
    }
}

/// Component time courses, shaped components × epochs × samples.
#[derive(Clone, Debug, PartialEq)]
pub struct Activations {
    data: Array3<f64>,
    kind: RecordingKind,
}

impl Activations {
    /// Wrap continuous activations (components × samples).
    ///
    /// # Errors
    ///
    /// Returns [`InputShapeError::EmptyActivations`] for an empty array.
    pub fn continuous(data: Array2<f64>) -> IcLabelResult<Self> {
        Self::with_kind(data.insert_axis(Axis(1)), RecordingKind::Continuous)
    }

    /// Wrap epoched activations (components × epochs × samples).
    ///
    /// # Errors
    ///
    /// Returns [`InputShapeError::EmptyActivations`] for an empty array.
    pub fn epoched(data: Array3<f64>) -> IcLabelResult<Self> {
        Self::with_kind(data, RecordingKind::Epoched)
    }

    fn with_kind(data: Array3<f64>, kind: RecordingKind) -> IcLabelResult<Self> {
        if data.is_empty() {
            return Err(InputShapeError::EmptyActivations.into());
        }
        Ok(Self { data, kind })
    }

    /// Recording layout
    #[inline]
    #[must_use]
    pub fn kind(&self) -> RecordingKind {
        self.kind
    }

    /// Number of components
    #[inline]
    #[must_use]
    pub fn n_components(&self) -> usize {
        self.data.dim().0
    }

    /// Number of epochs (1 for continuous data)
    #[inline]
    #[must_use]
    pub fn n_epochs(&self) -> usize {
        self.data.dim().1
    }

    /// Samples per epoch
    #[inline]
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.data.dim().2
    }

    /// Raw array (components × epochs × samples)
    #[inline]
    #[must_use]
    pub fn data(&self) -> &Array3<f64> {
        &self.data
    }

    /// Time course of one component in one epoch
    #[inline]
    #[must_use]
    pub fn epoch(&self, component: usize, epoch: usize) -> ArrayView1<'_, f64> {
        self.data.slice(ndarray::s![component, epoch, ..])
    }
}
