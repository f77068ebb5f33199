//! Window functions and small numeric helpers
//!
//! Everything here is `no_std` and allocation-light; transcendental
//! functions come from `libm`.

use alloc::vec::Vec;
use core::f64::consts::PI;

/// Symmetric Hamming window of length `n`.
///
/// `w[k] = 0.54 - 0.46 cos(2πk / (n - 1))`. A window of length 1 is `[1.0]`.
#[must_use]
pub fn hamming_window(n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => alloc::vec![1.0],
        _ => {
            let denom = (n - 1) as f64;
            (0..n)
                .map(|k| 0.54 - 0.46 * libm::cos(2.0 * PI * k as f64 / denom))
                .collect()
        }
    }
}

/// Modified Bessel function of the first kind, order zero.
///
/// Power series; converges quickly for the β values used by FIR design.
#[must_use]
pub fn bessel_i0(x: f64) -> f64 {
    let half_sq = x * x / 4.0;
    let mut term = 1.0;
    let mut sum = 1.0;
    let mut k = 1.0;
    while term > sum * 1e-17 {
        term *= half_sq / (k * k);
        sum += term;
        k += 1.0;
    }
    sum
}

/// Symmetric Kaiser window of length `n` with shape parameter `beta`.
#[must_use]
pub fn kaiser_window(n: usize, beta: f64) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => alloc::vec![1.0],
        _ => {
            let denom = bessel_i0(beta);
            let half = (n - 1) as f64 / 2.0;
            (0..n)
                .map(|k| {
                    let ratio = (k as f64 - half) / half;
                    let arg = libm::sqrt((1.0 - ratio * ratio).max(0.0));
                    bessel_i0(beta * arg) / denom
                })
                .collect()
        }
    }
}

/// Normalised sinc: `sin(πx) / (πx)`, 1 at the origin.
#[inline]
#[must_use]
pub fn sinc(x: f64) -> f64 {
    if x == 0.0 {
        1.0
    } else {
        let px = PI * x;
        libm::sin(px) / px
    }
}

/// Median of a slice, reordering it in place.
///
/// Even lengths average the two middle values. An empty slice yields NaN.
pub fn median(values: &mut [f64]) -> f64 {
    let n = values.len();
    if n == 0 {
        return f64::NAN;
    }
    values.sort_unstable_by(f64::total_cmp);
    if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    }
}

/// Smallest power of two that is `>= n` (1 for `n == 0`).
#[inline]
#[must_use]
pub const fn next_pow2(n: usize) -> usize {
    if n <= 1 {
        1
    } else {
        n.next_power_of_two()
    }
}

/// Greatest common divisor.
#[must_use]
pub const fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// Replace NaN and infinities with zero.
pub fn zero_non_finite(values: &mut [f64]) {
    for v in values.iter_mut() {
        if !v.is_finite() {
            *v = 0.0;
        }
    }
}

/// Divide by the largest absolute value, then zero any non-finite entry.
///
/// An all-zero input stays all-zero.
pub fn normalize_max_abs(values: &mut [f64]) {
    let peak = values
        .iter()
        .filter(|v| v.is_finite())
        .fold(0.0_f64, |acc, v| acc.max(libm::fabs(*v)));
    if peak > 0.0 {
        for v in values.iter_mut() {
            *v /= peak;
        }
    }
    zero_non_finite(values);
}
