//! Feature extraction configuration

use serde::{Deserialize, Serialize};

use iclabel_core::HeadFrame;

use crate::error::ConfigurationError;
use crate::ica::RecordingKind;

/// Estimator used for the autocorrelation feature.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutocorrMethod {
    /// Welch for epoched recordings, FFT for continuous ones
    #[default]
    Auto,
    /// Segment-averaged spectrum with unbiased lag normalisation
    Welch,
    /// Single full-length FFT
    Fft,
}

impl AutocorrMethod {
    /// Resolve `Auto` against the recording layout.
    #[inline]
    #[must_use]
    pub const fn resolve(self, kind: RecordingKind) -> Self {
        match (self, kind) {
            (Self::Auto, RecordingKind::Epoched) => Self::Welch,
            (Self::Auto, RecordingKind::Continuous) => Self::Fft,
            (method, _) => method,
        }
    }
}

/// Parameters shared by all feature extractors.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Sampling rate of the activations (Hz)
    pub sample_rate_hz: u32,
    /// Axis convention of the sensor positions
    pub head_frame: HeadFrame,
    /// Autocorrelation estimator
    pub autocorr_method: AutocorrMethod,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 128,
            head_frame: HeadFrame::Mne,
            autocorr_method: AutocorrMethod::Auto,
        }
    }
}

impl FeatureConfig {
    /// Create a configuration for the given sample rate.
    #[must_use]
    pub fn with_sample_rate(sample_rate_hz: u32) -> Self {
        Self {
            sample_rate_hz,
            ..Self::default()
        }
    }

    /// Check that the configuration can drive feature extraction.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidConfig`] when the sample rate is
    /// below 2 Hz (no frequency bin above DC).
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.sample_rate_hz < 2 {
            return Err(ConfigurationError::InvalidConfig {
                reason: format!("sample rate must be at least 2 Hz, got {}", self.sample_rate_hz),
            });
        }
        Ok(())
    }

    /// Sample rate as `usize`
    #[inline]
    #[must_use]
    pub fn sample_rate(&self) -> usize {
        self.sample_rate_hz as usize
    }
}
