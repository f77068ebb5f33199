//! Median power spectral density feature
//!
//! Hamming-windowed, half-overlapping segments of one second (or the whole
//! epoch when shorter), median over segments, in dB, 1 Hz bins from 1 to
//! 100 Hz.

use ndarray::ArrayView2;

use iclabel_core::math::{hamming_window, median, normalize_max_abs};
use iclabel_core::{InputShapeError, PSD_BINS};

use super::fft::SpectralAnalyzer;

/// Bins checked for a notch filter dip (50 Hz and 60 Hz).
const LINE_NOISE_BINS: [usize; 2] = [49, 59];

/// Minimum dip depth (dB) on both sides that marks a notch.
const NOTCH_DEPTH_DB: f64 = 5.0;

/// Median PSD estimator for one sample rate and epoch length.
#[derive(Clone, Debug)]
pub struct PsdEstimator {
    sample_rate: usize,
    n_points: usize,
    nfreqs: usize,
    window: Vec<f64>,
    scale: f64,
    starts: Vec<usize>,
}

impl PsdEstimator {
    /// Create an estimator for epochs of `n_samples` samples.
    ///
    /// # Errors
    ///
    /// Returns [`InputShapeError::EpochTooShort`] when an epoch holds no more
    /// samples than the number of frequency bins.
    pub fn new(sample_rate: usize, n_samples: usize) -> Result<Self, InputShapeError> {
        let n_points = n_samples.min(sample_rate);
        let nfreqs = PSD_BINS.min(sample_rate / 2);
        if n_points <= nfreqs || nfreqs == 0 {
            return Err(InputShapeError::EpochTooShort {
                samples: n_samples,
                required: nfreqs.max(1),
            });
        }

        let window = hamming_window(n_points);
        let denominator = sample_rate as f64 * window.iter().map(|w| w * w).sum::<f64>();

        // Half-overlapping segments inside the largest multiple of n_points
        let cutoff = (n_samples / n_points) * n_points;
        let limit = (cutoff - n_points + 1) as f64;
        let step = n_points as f64 / 2.0;
        let starts = (0..)
            .map(|k| k as f64 * step)
            .take_while(|&start| start < limit)
            .map(|start| start.ceil() as usize)
            .filter(|&start| start + n_points <= n_samples)
            .collect();

        Ok(Self {
            sample_rate,
            n_points,
            nfreqs,
            window,
            scale: 2.0 / denominator,
            starts,
        })
    }

    /// Segment length in samples
    #[inline]
    #[must_use]
    pub fn segment_len(&self) -> usize {
        self.n_points
    }

    /// Number of segments taken from each epoch
    #[inline]
    #[must_use]
    pub fn segments_per_epoch(&self) -> usize {
        self.starts.len()
    }

    /// Compute the normalised 100-bin PSD strip of one component.
    ///
    /// `epochs` is shaped epochs × samples.
    pub fn estimate(&self, analyzer: &mut SpectralAnalyzer, epochs: ArrayView2<'_, f64>) -> Vec<f64> {
        let n_segments = epochs.nrows() * self.starts.len();
        let mut per_bin: Vec<Vec<f64>> = vec![Vec::with_capacity(n_segments); self.nfreqs];
        let nyquist = self.sample_rate / 2;

        let mut segment = vec![0.0; self.n_points];
        for epoch in epochs.rows() {
            for &start in &self.starts {
                for (dst, src) in segment.iter_mut().zip(epoch.iter().skip(start)) {
                    *dst = *src;
                }
                let power = analyzer.power_spectrum(&segment, Some(&self.window), self.n_points);
                for (f, bin) in per_bin.iter_mut().enumerate() {
                    let mut p = power[f + 1] * self.scale;
                    if f + 1 == nyquist {
                        p /= 2.0;
                    }
                    bin.push(p);
                }
            }
        }

        let mut psd: Vec<f64> = per_bin
            .iter_mut()
            .map(|values| 20.0 * median(values).log10())
            .collect();

        extend_to_bins(&mut psd);
        undo_notch(&mut psd);
        normalize_max_abs(&mut psd);
        psd
    }
}

/// Repeat the last bin until the strip holds [`PSD_BINS`] values.
fn extend_to_bins(psd: &mut Vec<f64>) {
    let last = psd.last().copied().unwrap_or(0.0);
    psd.resize(PSD_BINS, last);
}

/// Fill in line-noise bins that sit well below both neighbours.
fn undo_notch(psd: &mut [f64]) {
    for &bin in &LINE_NOISE_BINS {
        let below = psd[bin - 1];
        let above = psd[bin + 1];
        if below - psd[bin] > NOTCH_DEPTH_DB && above - psd[bin] > NOTCH_DEPTH_DB {
            psd[bin] = (below + above) / 2.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::Array2;
    use std::f64::consts::PI;

    fn sine_epochs(freq: f64, srate: usize, epochs: usize, samples: usize) -> Array2<f64> {
        Array2::from_shape_fn((epochs, samples), |(e, i)| {
            let t = (e * samples + i) as f64 / srate as f64;
            (2.0 * PI * freq * t).sin() + 0.01 * ((i * 7919 % 113) as f64 / 113.0 - 0.5)
        })
    }

    #[test]
    fn test_segment_layout() {
        // 3 s epochs at 128 Hz: starts 0, 64, ..., 256
        let estimator = PsdEstimator::new(128, 384).unwrap();
        assert_eq!(estimator.segment_len(), 128);
        assert_eq!(estimator.segments_per_epoch(), 5);

        // Epoch shorter than one second uses the whole epoch once
        let estimator = PsdEstimator::new(128, 100).unwrap();
        assert_eq!(estimator.segment_len(), 100);
        assert_eq!(estimator.segments_per_epoch(), 1);
    }

    #[test]
    fn test_epoch_too_short() {
        let err = PsdEstimator::new(128, 64).unwrap_err();
        assert_eq!(err, InputShapeError::EpochTooShort { samples: 64, required: 64 });
    }

    #[test]
    fn test_peak_at_sine_frequency() {
        let srate = 256;
        let epochs = sine_epochs(20.0, srate, 2, 512);
        let estimator = PsdEstimator::new(srate, 512).unwrap();
        let mut analyzer = SpectralAnalyzer::new();

        let psd = estimator.estimate(&mut analyzer, epochs.view());
        assert_eq!(psd.len(), PSD_BINS);

        // Bin k holds (k + 1) Hz
        let peak = (0..PSD_BINS)
            .max_by(|&a, &b| psd[a].total_cmp(&psd[b]))
            .unwrap();
        assert_eq!(peak, 19);
        assert!(psd.iter().all(|v| v.is_finite() && v.abs() <= 1.0 + 1e-12));
    }

    #[test]
    fn test_low_sample_rate_extends_last_bin() {
        // 128 Hz: 64 real bins, the remaining 36 repeat bin 63
        let epochs = sine_epochs(10.0, 128, 1, 384);
        let estimator = PsdEstimator::new(128, 384).unwrap();
        let mut analyzer = SpectralAnalyzer::new();

        let psd = estimator.estimate(&mut analyzer, epochs.view());
        for &v in &psd[64..] {
            assert_abs_diff_eq!(v, psd[63]);
        }
    }

    #[test]
    fn test_notch_is_filled() {
        let mut psd = vec![-10.0; PSD_BINS];
        psd[49] = -30.0;
        psd[59] = -12.0;
        undo_notch(&mut psd);
        assert_abs_diff_eq!(psd[49], -10.0);
        assert_abs_diff_eq!(psd[59], -12.0);
    }
}
