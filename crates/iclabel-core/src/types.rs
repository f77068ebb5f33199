//! Core data types for ICLabel feature tensors
//!
//! The classifier was trained on features of one fixed resolution. The
//! constants in this module pin that resolution; nothing downstream is
//! allowed to change it.

use serde::{Deserialize, Serialize};

// ============================================================================
// Fixed Feature Dimensions
// ============================================================================

/// Side length of the square topography image (pixels).
pub const TOPO_GRID: usize = 32;

/// Number of frequency bins in the PSD strip (1 Hz bins, 1-100 Hz).
pub const PSD_BINS: usize = 100;

/// Number of lags in the autocorrelation strip (10 ms lags, 1 second).
pub const AUTOCORR_LAGS: usize = 100;

/// Number of component classes produced by the network.
pub const N_CLASSES: usize = 7;

/// Number of augmented views evaluated per component.
pub const N_VIEWS: usize = 4;

/// Sample rate the autocorrelation feature is resampled to (Hz).
pub const AUTOCORR_RATE_HZ: u32 = 100;

// ============================================================================
// Feature Kinds
// ============================================================================

/// The three per-component feature tensors consumed by the network.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum FeatureKind {
    /// Interpolated scalp topography (single channel image)
    Topography = 0,
    /// Power spectral density strip
    Psd = 1,
    /// Autocorrelation strip
    Autocorrelation = 2,
}

impl FeatureKind {
    /// All feature kinds in network input order
    pub const ALL: [Self; 3] = [Self::Topography, Self::Psd, Self::Autocorrelation];

    /// Spatial shape `(height, width)` of one component's tensor.
    #[inline]
    #[must_use]
    pub const fn spatial_shape(self) -> (usize, usize) {
        match self {
            Self::Topography => (TOPO_GRID, TOPO_GRID),
            Self::Psd => (1, PSD_BINS),
            Self::Autocorrelation => (1, AUTOCORR_LAGS),
        }
    }

    /// Number of scalar values per component.
    #[inline]
    #[must_use]
    pub const fn len(self) -> usize {
        let (h, w) = self.spatial_shape();
        h * w
    }

    /// Short name used in logs and error messages.
    #[inline]
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Topography => "topography",
            Self::Psd => "psd",
            Self::Autocorrelation => "autocorrelation",
        }
    }
}
