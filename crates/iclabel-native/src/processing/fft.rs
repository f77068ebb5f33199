//! FFT-based spectral primitives
//!
//! Power spectra and their inverse transform, shared by the PSD and
//! autocorrelation features.

use rustfft::{num_complex::Complex, FftPlanner};

/// FFT-based spectral analyzer
///
/// Keeps a planner and scratch buffers so repeated transforms of the same
/// size do not reallocate.
pub struct SpectralAnalyzer {
    planner: FftPlanner<f64>,
    buffer: Vec<Complex<f64>>,
    scratch: Vec<Complex<f64>>,
}

impl Default for SpectralAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SpectralAnalyzer {
    /// Create a new spectral analyzer
    #[must_use]
    pub fn new() -> Self {
        Self {
            planner: FftPlanner::new(),
            buffer: Vec::new(),
            scratch: Vec::new(),
        }
    }

    /// Squared magnitude of the `nfft`-point FFT of `samples`.
    ///
    /// Samples are zero-padded (or truncated) to `nfft`. When `window` is
    /// given it multiplies the samples element-wise first. All `nfft` bins
    /// are returned, unscaled.
    pub fn power_spectrum(&mut self, samples: &[f64], window: Option<&[f64]>, nfft: usize) -> Vec<f64> {
        self.load(nfft, |i| {
            let s = samples.get(i).copied().unwrap_or(0.0);
            window.and_then(|w| w.get(i)).map_or(s, |w| s * w)
        });

        let fft = self.planner.plan_fft_forward(nfft);
        self.scratch.resize(fft.get_inplace_scratch_len(), Complex::new(0.0, 0.0));
        fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        self.buffer.iter().map(|c| c.re * c.re + c.im * c.im).collect()
    }

    /// Real part of the inverse FFT of a real spectrum, scaled by `1/n`.
    pub fn inverse_real(&mut self, spectrum: &[f64]) -> Vec<f64> {
        let n = spectrum.len();
        if n == 0 {
            return Vec::new();
        }
        self.load(n, |i| spectrum[i]);

        let fft = self.planner.plan_fft_inverse(n);
        self.scratch.resize(fft.get_inplace_scratch_len(), Complex::new(0.0, 0.0));
        fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        let norm = 1.0 / n as f64;
        self.buffer.iter().map(|c| c.re * norm).collect()
    }

    fn load(&mut self, len: usize, value: impl Fn(usize) -> f64) {
        self.buffer.clear();
        self.buffer.extend((0..len).map(|i| Complex::new(value(i), 0.0)));
    }
}
