//! Polyphase rational resampling
//!
//! Upsample by `up`, apply a Kaiser-windowed FIR low-pass, downsample by
//! `down`. Filter design and edge handling follow the common
//! `resample_poly` convention: β = 5, half length `10·max(up, down)`,
//! zero padding outside the signal.

use iclabel_core::math::{gcd, kaiser_window, sinc};

/// Kaiser window shape parameter of the anti-aliasing filter.
const KAISER_BETA: f64 = 5.0;

/// Filter half length in units of `max(up, down)`.
const HALF_LEN_FACTOR: usize = 10;

/// Rational resampler for a fixed `up / down` ratio.
#[derive(Clone, Debug)]
pub struct PolyphaseResampler {
    up: usize,
    down: usize,
    /// Filter taps with the alignment padding already prepended
    taps: Vec<f64>,
    pre_remove: usize,
}

impl PolyphaseResampler {
    /// Create a resampler converting `from_hz` to `to_hz`.
    ///
    /// Both rates must be non-zero.
    #[must_use]
    pub fn new(to_hz: usize, from_hz: usize) -> Self {
        let g = gcd(to_hz as u64, from_hz as u64).max(1) as usize;
        let up = to_hz / g;
        let down = from_hz / g;

        if up == 1 && down == 1 {
            return Self { up, down, taps: vec![1.0], pre_remove: 0 };
        }

        let max_rate = up.max(down);
        let cutoff = 1.0 / max_rate as f64;
        let half_len = HALF_LEN_FACTOR * max_rate;
        let n_taps = 2 * half_len + 1;

        let window = kaiser_window(n_taps, KAISER_BETA);
        let mut taps: Vec<f64> = window
            .iter()
            .enumerate()
            .map(|(n, w)| cutoff * sinc(cutoff * (n as f64 - half_len as f64)) * w)
            .collect();
        let sum: f64 = taps.iter().sum();
        for t in &mut taps {
            *t = *t / sum * up as f64;
        }

        let pre_pad = down - half_len % down;
        let pre_remove = (half_len + pre_pad) / down;
        let mut padded = vec![0.0; pre_pad];
        padded.extend(taps);

        Self { up, down, taps: padded, pre_remove }
    }

    /// Reduced `(up, down)` factors
    #[inline]
    #[must_use]
    pub fn factors(&self) -> (usize, usize) {
        (self.up, self.down)
    }

    /// Number of output samples produced for `n_in` input samples.
    #[inline]
    #[must_use]
    pub fn output_len(&self, n_in: usize) -> usize {
        (n_in * self.up).div_ceil(self.down)
    }

    /// Resample a signal.
    #[must_use]
    pub fn process(&self, input: &[f64]) -> Vec<f64> {
        if self.up == 1 && self.down == 1 {
            return input.to_vec();
        }

        let n_out = self.output_len(input.len());
        (0..n_out)
            .map(|m| {
                let t = (m + self.pre_remove) * self.down;
                // Inputs whose upsampled position lies under the filter
                let lo = (t + 1).saturating_sub(self.taps.len()).div_ceil(self.up);
                let hi = (t / self.up + 1).min(input.len());
                (lo..hi).map(|i| self.taps[t - i * self.up] * input[i]).sum::<f64>()
            })
            .collect()
    }
}
