//! Autocorrelation feature
//!
//! One second of lags, computed through the power spectrum and resampled to
//! 100 Hz. Lag 0 is dropped from the final strip, leaving 100 values.

use ndarray::ArrayView2;

use iclabel_core::math::{next_pow2, zero_non_finite};
use iclabel_core::types::AUTOCORR_RATE_HZ;
use iclabel_core::AUTOCORR_LAGS;

use super::fft::SpectralAnalyzer;
use super::resample::PolyphaseResampler;
use crate::config::AutocorrMethod;

/// Autocorrelation estimator for one sample rate and epoch length.
#[derive(Clone, Debug)]
pub struct AutocorrEstimator {
    method: AutocorrMethod,
    sample_rate: usize,
    n_samples: usize,
    resampler: PolyphaseResampler,
}

impl AutocorrEstimator {
    /// Create an estimator. `method` must already be resolved to `Welch` or
    /// `Fft`; `Auto` is treated as `Welch`.
    #[must_use]
    pub fn new(method: AutocorrMethod, sample_rate: usize, n_samples: usize) -> Self {
        Self {
            method,
            sample_rate,
            n_samples,
            resampler: PolyphaseResampler::new(AUTOCORR_RATE_HZ as usize, sample_rate),
        }
    }

    /// Estimator in use
    #[inline]
    #[must_use]
    pub fn method(&self) -> AutocorrMethod {
        self.method
    }

    /// Compute the 100-lag autocorrelation strip of one component.
    ///
    /// `epochs` is shaped epochs × samples.
    pub fn estimate(&self, analyzer: &mut SpectralAnalyzer, epochs: ArrayView2<'_, f64>) -> Vec<f64> {
        let lags = match self.method {
            AutocorrMethod::Fft => self.fft_lags(analyzer, epochs),
            AutocorrMethod::Welch | AutocorrMethod::Auto => self.welch_lags(analyzer, epochs),
        };

        let mut resampled = self.resampler.process(&lags);
        resampled.resize(AUTOCORR_LAGS + 1, 0.0);
        let mut strip = resampled.split_off(1);
        zero_non_finite(&mut strip);
        strip
    }

    /// Lags `0..=srate` from segment-averaged spectra, each lag normalised by
    /// the number of overlapping sample pairs.
    fn welch_lags(&self, analyzer: &mut SpectralAnalyzer, epochs: ArrayView2<'_, f64>) -> Vec<f64> {
        let srate = self.sample_rate;
        let n_points = self.n_samples.min(3 * srate);
        let nfft = next_pow2(2 * n_points - 1);

        let cutoff = (self.n_samples / n_points) * n_points;
        let step = n_points as f64 / 2.0;
        let limit = cutoff as f64 - step;
        let starts: Vec<usize> = (0..)
            .map(|k| k as f64 * step)
            .take_while(|&start| start < limit)
            .map(|start| start.floor() as usize)
            .filter(|&start| start + n_points <= self.n_samples)
            .collect();

        let mut spectrum = vec![0.0; nfft];
        let mut count = 0usize;
        let mut segment = vec![0.0; n_points];
        for epoch in epochs.rows() {
            for &start in &starts {
                for (dst, src) in segment.iter_mut().zip(epoch.iter().skip(start)) {
                    *dst = *src;
                }
                let power = analyzer.power_spectrum(&segment, None, nfft);
                for (acc, p) in spectrum.iter_mut().zip(&power) {
                    *acc += p;
                }
                count += 1;
            }
        }
        if count > 0 {
            for acc in &mut spectrum {
                *acc /= count as f64;
            }
        }

        let ac = analyzer.inverse_real(&spectrum);
        let ac0 = ac[0];
        let n = n_points as f64;

        if self.n_samples < srate {
            let mut lags: Vec<f64> = (0..n_points)
                .map(|k| ac[k] / (ac0 * (n_points - k) as f64 / n))
                .collect();
            lags.resize(srate + 1, 0.0);
            lags
        } else {
            (0..=srate)
                .map(|k| {
                    let pairs = if k == srate {
                        n_points.saturating_sub(srate).max(1)
                    } else {
                        n_points - k
                    };
                    ac[k] / (ac0 * pairs as f64 / n)
                })
                .collect()
        }
    }

    /// Lags `0..=srate` from one full-length transform per epoch, normalised
    /// by lag 0.
    fn fft_lags(&self, analyzer: &mut SpectralAnalyzer, epochs: ArrayView2<'_, f64>) -> Vec<f64> {
        let srate = self.sample_rate;
        let nfft = next_pow2(2 * self.n_samples - 1);

        let mut spectrum = vec![0.0; nfft];
        for epoch in epochs.rows() {
            let samples: Vec<f64> = epoch.to_vec();
            let power = analyzer.power_spectrum(&samples, None, nfft);
            for (acc, p) in spectrum.iter_mut().zip(&power) {
                *acc += p;
            }
        }

        let ac = analyzer.inverse_real(&spectrum);
        let kept = self.n_samples.min(srate + 1);
        let mut lags = ac[..kept].to_vec();
        lags.resize(srate + 1, 0.0);

        let ac0 = lags[0];
        for v in &mut lags {
            *v /= ac0;
        }
        lags
    }
}
