//! Feature extraction for the component classifier
//!
//! Turns an ICA decomposition and its activations into the three
//! per-component tensors the network consumes.

use ndarray::{Array2, Array3, Axis};
use tracing::{debug, warn};

use iclabel_core::{
    ChannelLayout, FeatureKind, InputShapeError, SensorPosition, AUTOCORR_LAGS, PSD_BINS,
    TOPO_GRID,
};

use crate::config::FeatureConfig;
use crate::error::IcLabelResult;
use crate::ica::{Activations, IcaDecomposition};
use crate::processing::autocorr::AutocorrEstimator;
use crate::processing::fft::SpectralAnalyzer;
use crate::processing::psd::PsdEstimator;
use crate::processing::topography::TopographyInterpolator;

/// Scale applied to every feature value; the network was trained on
/// features in `[-0.99, 0.99]`.
pub const FEATURE_SCALE: f32 = 0.99;

/// Feature tensors for a set of components.
///
/// All three tensors always describe the same number of components.
#[derive(Clone, Debug, PartialEq)]
pub struct IcFeatures {
    topographies: Array3<f32>,
    psds: Array2<f32>,
    autocorrs: Array2<f32>,
}

impl IcFeatures {
    /// Assemble features from components × 32 × 32 images, components × 100
    /// PSD strips and components × 100 autocorrelation strips.
    ///
    /// # Errors
    ///
    /// Returns an [`InputShapeError`] when a tensor has the wrong
    /// per-component shape, when the component counts differ, or when there
    /// are no components.
    pub fn new(
        topographies: Array3<f32>,
        psds: Array2<f32>,
        autocorrs: Array2<f32>,
    ) -> Result<Self, InputShapeError> {
        let (n, h, w) = topographies.dim();
        if (h, w) != FeatureKind::Topography.spatial_shape() {
            return Err(InputShapeError::FeatureShape {
                feature: FeatureKind::Topography.name(),
                expected: FeatureKind::Topography.spatial_shape(),
                got: (h, w),
            });
        }
        for (kind, strip) in [(FeatureKind::Psd, &psds), (FeatureKind::Autocorrelation, &autocorrs)] {
            if strip.ncols() != kind.len() {
                return Err(InputShapeError::FeatureShape {
                    feature: kind.name(),
                    expected: kind.spatial_shape(),
                    got: (1, strip.ncols()),
                });
            }
            if strip.nrows() != n {
                return Err(InputShapeError::ComponentCountMismatch {
                    what: kind.name(),
                    expected: n,
                    got: strip.nrows(),
                });
            }
        }
        if n == 0 {
            return Err(InputShapeError::EmptyActivations);
        }

        Ok(Self { topographies, psds, autocorrs })
    }

    /// All-zero features for `n` components
    #[must_use]
    pub fn zeros(n: usize) -> Self {
        Self {
            topographies: Array3::zeros((n, TOPO_GRID, TOPO_GRID)),
            psds: Array2::zeros((n, PSD_BINS)),
            autocorrs: Array2::zeros((n, AUTOCORR_LAGS)),
        }
    }

    /// Number of components
    #[inline]
    #[must_use]
    pub fn n_components(&self) -> usize {
        self.psds.nrows()
    }

    /// Topography images (components × 32 × 32)
    #[inline]
    #[must_use]
    pub fn topographies(&self) -> &Array3<f32> {
        &self.topographies
    }

    /// PSD strips (components × 100)
    #[inline]
    #[must_use]
    pub fn psds(&self) -> &Array2<f32> {
        &self.psds
    }

    /// Autocorrelation strips (components × 100)
    #[inline]
    #[must_use]
    pub fn autocorrs(&self) -> &Array2<f32> {
        &self.autocorrs
    }

    /// Features of a subset of components, in the given order.
    ///
    /// # Panics
    ///
    /// Panics if an index is out of range.
    #[must_use]
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            topographies: self.topographies.select(Axis(0), indices),
            psds: self.psds.select(Axis(0), indices),
            autocorrs: self.autocorrs.select(Axis(0), indices),
        }
    }

    /// Mutable topography images
    pub fn topographies_mut(&mut self) -> &mut Array3<f32> {
        &mut self.topographies
    }

    /// Mutable PSD strips
    pub fn psds_mut(&mut self) -> &mut Array2<f32> {
        &mut self.psds
    }

    /// Mutable autocorrelation strips
    pub fn autocorrs_mut(&mut self) -> &mut Array2<f32> {
        &mut self.autocorrs
    }
}

/// Feature extractor bound to one electrode layout and sample rate.
pub struct FeatureExtractor {
    config: FeatureConfig,
    layout: ChannelLayout,
    interpolator: TopographyInterpolator,
    analyzer: SpectralAnalyzer,
}

impl FeatureExtractor {
    /// Create a feature extractor
    ///
    /// # Arguments
    ///
    /// * `config` - Sample rate and estimator selection
    /// * `layout` - Electrode layout, one entry per ICA channel
    ///
    /// # Errors
    ///
    /// Fails for an invalid configuration or a layout the topography
    /// interpolation cannot use.
    pub fn new(config: FeatureConfig, layout: ChannelLayout) -> IcLabelResult<Self> {
        config.validate()?;
        let interpolator = TopographyInterpolator::new(&layout)?;
        Ok(Self {
            config,
            layout,
            interpolator,
            analyzer: SpectralAnalyzer::new(),
        })
    }

    /// Create a feature extractor from raw sensor positions, interpreted in
    /// the configured head frame.
    ///
    /// # Errors
    ///
    /// See [`FeatureExtractor::new`].
    pub fn from_positions(config: FeatureConfig, positions: Vec<SensorPosition>) -> IcLabelResult<Self> {
        let layout = ChannelLayout::new(positions, config.head_frame);
        Self::new(config, layout)
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Electrode layout
    #[inline]
    #[must_use]
    pub fn layout(&self) -> &ChannelLayout {
        &self.layout
    }

    /// Extract topography, PSD and autocorrelation features for every
    /// component.
    ///
    /// # Errors
    ///
    /// Returns an input shape error when the layout, decomposition and
    /// activations disagree, or when epochs are too short for the spectrum.
    /// No partial result is returned.
    pub fn extract(&mut self, ica: &IcaDecomposition, activations: &Activations) -> IcLabelResult<IcFeatures> {
        if self.layout.len() != ica.n_channels() {
            return Err(InputShapeError::ChannelCountMismatch {
                positions: self.layout.len(),
                mixing: ica.n_channels(),
            }
            .into());
        }
        if activations.n_components() != ica.n_components() {
            return Err(InputShapeError::ComponentCountMismatch {
                what: "activations",
                expected: ica.n_components(),
                got: activations.n_components(),
            }
            .into());
        }

        let n_components = ica.n_components();
        let sample_rate = self.config.sample_rate();
        let n_samples = activations.n_samples();
        let psd = PsdEstimator::new(sample_rate, n_samples)?;
        let method = self.config.autocorr_method.resolve(activations.kind());
        let autocorr = AutocorrEstimator::new(method, sample_rate, n_samples);

        debug!(
            components = n_components,
            channels = ica.n_channels(),
            epochs = activations.n_epochs(),
            samples = n_samples,
            ?method,
            "Extracting component features"
        );

        let mut features = IcFeatures::zeros(n_components);
        for c in 0..n_components {
            let image = self.interpolator.interpolate(ica.component(c))?;
            if image.iter().all(|&v| v == 0.0) {
                warn!(component = c, "Topography is flat");
            }
            features
                .topographies
                .index_axis_mut(Axis(0), c)
                .zip_mut_with(&image, |dst, &src| *dst = FEATURE_SCALE * src as f32);

            let epochs = activations.data().index_axis(Axis(0), c);
            let strip = psd.estimate(&mut self.analyzer, epochs);
            for (dst, src) in features.psds.row_mut(c).iter_mut().zip(&strip) {
                *dst = FEATURE_SCALE * *src as f32;
            }

            let strip = autocorr.estimate(&mut self.analyzer, epochs);
            for (dst, src) in features.autocorrs.row_mut(c).iter_mut().zip(&strip) {
                *dst = FEATURE_SCALE * *src as f32;
            }
        }

        Ok(features)
    }
}
