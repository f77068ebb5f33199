//! Signal processing for component features
//!
//! This module provides the numerical building blocks of feature extraction:
//! - [`fft`]: Power spectra and inverse transforms
//! - [`psd`]: Median power spectral density strip
//! - [`autocorr`]: Autocorrelation strip (Welch or single FFT)
//! - [`resample`]: Polyphase rational resampling
//! - [`topography`]: Biharmonic scalp map interpolation

pub mod autocorr;
pub mod fft;
pub mod psd;
pub mod resample;
pub mod topography;
