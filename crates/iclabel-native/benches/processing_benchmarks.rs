//! Benchmarks for feature extraction and inference

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::{Array2, Array3, Array4};

use iclabel_core::{ChannelLayout, HeadFrame, AUTOCORR_LAGS, PSD_BINS, TOPO_GRID};
use iclabel_native::config::AutocorrMethod;
use iclabel_native::ml::network::IcLabelNet;
use iclabel_native::ml::params::NetworkParameters;
use iclabel_native::processing::{
    autocorr::AutocorrEstimator, fft::SpectralAnalyzer, psd::PsdEstimator,
    topography::TopographyInterpolator,
};

/// Generate synthetic EEG epochs (sinusoidal with noise)
fn generate_eeg_epochs(epochs: usize, samples: usize, freq_hz: f64, sample_rate: f64) -> Array2<f64> {
    use std::f64::consts::PI;

    Array2::from_shape_fn((epochs, samples), |(e, i)| {
        let t = (e * samples + i) as f64 / sample_rate;
        let signal = (2.0 * PI * freq_hz * t).sin();
        let noise = (i as f64 * 0.123).sin() * 0.1; // Pseudo-noise
        (signal + noise) * 50.0
    })
}

/// Channels spread over the upper hemisphere
fn generate_layout(n: usize) -> ChannelLayout {
    let coords: Vec<[f64; 3]> = (0..n)
        .map(|k| {
            let az = 2.4 * k as f64;
            let elev = 0.1 + 1.3 * k as f64 / n as f64;
            [elev.cos() * az.cos(), elev.cos() * az.sin(), elev.sin()]
        })
        .collect();
    ChannelLayout::from_xyz(&coords, HeadFrame::Eeglab)
}

fn bench_psd(c: &mut Criterion) {
    let mut group = c.benchmark_group("psd");

    for epochs in [1, 10, 50].iter() {
        let data = generate_eeg_epochs(*epochs, 256, 10.0, 128.0);
        let estimator = PsdEstimator::new(128, 256).expect("valid epoch length");

        group.bench_with_input(BenchmarkId::from_parameter(epochs), epochs, |b, _| {
            let mut analyzer = SpectralAnalyzer::new();
            b.iter(|| black_box(estimator.estimate(&mut analyzer, black_box(data.view()))));
        });
    }

    group.finish();
}

fn bench_autocorrelation(c: &mut Criterion) {
    let mut group = c.benchmark_group("autocorrelation");
    let data = generate_eeg_epochs(10, 256, 10.0, 250.0);

    for method in [AutocorrMethod::Welch, AutocorrMethod::Fft] {
        let estimator = AutocorrEstimator::new(method, 250, 256);
        group.bench_function(format!("{method:?}"), |b| {
            let mut analyzer = SpectralAnalyzer::new();
            b.iter(|| black_box(estimator.estimate(&mut analyzer, black_box(data.view()))));
        });
    }

    group.finish();
}

fn bench_topography(c: &mut Criterion) {
    let mut group = c.benchmark_group("topography");

    for channels in [32, 64, 128].iter() {
        let layout = generate_layout(*channels);
        let interpolator = TopographyInterpolator::new(&layout).expect("interpolator");
        let values = ndarray::Array1::from_shape_fn(*channels, |i| (i as f64 * 0.37).sin());

        group.bench_with_input(BenchmarkId::from_parameter(channels), channels, |b, _| {
            b.iter(|| black_box(interpolator.interpolate(black_box(values.view()))));
        });
    }

    group.finish();
}

fn bench_network_forward(c: &mut Criterion) {
    let mut group = c.benchmark_group("network_forward");
    group.sample_size(10);

    let params = NetworkParameters::filled_with(|_, i| ((i % 17) as f32 - 8.0) * 1e-3);
    let net = IcLabelNet::from_parameters(&params).expect("complete parameter set");

    for batch in [4, 16, 64].iter() {
        let images = Array4::from_shape_fn((*batch, 1, TOPO_GRID, TOPO_GRID), |(b, _, i, j)| {
            ((b + i * j) as f32 * 0.01).sin()
        });
        let psds = Array4::from_shape_fn((*batch, 1, 1, PSD_BINS), |(_, _, _, f)| -(f as f32) / 100.0);
        let autocorrs = Array4::from_shape_fn((*batch, 1, 1, AUTOCORR_LAGS), |(_, _, _, k)| {
            (k as f32 * 0.2).cos()
        });

        group.bench_with_input(BenchmarkId::from_parameter(batch), batch, |b, _| {
            b.iter(|| black_box(net.forward(images.view(), psds.view(), autocorrs.view())));
        });
    }

    group.finish();
}

fn bench_feature_tensors(c: &mut Criterion) {
    use iclabel_native::IcFeatures;

    let mut group = c.benchmark_group("feature_tensors");
    let topographies = Array3::zeros((32, TOPO_GRID, TOPO_GRID));
    let psds = Array2::zeros((32, PSD_BINS));
    let autocorrs = Array2::zeros((32, AUTOCORR_LAGS));
    let features = IcFeatures::new(topographies, psds, autocorrs).expect("valid shapes");

    group.bench_function("augment", |b| {
        b.iter(|| black_box(iclabel_native::ml::augment::augment(black_box(&features))));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_psd,
    bench_autocorrelation,
    bench_topography,
    bench_network_forward,
    bench_feature_tensors,
);
criterion_main!(benches);
