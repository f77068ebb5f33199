//! Convolution layers and activations
//!
//! The classifier only needs 2D convolution, leaky rectification and a
//! softmax. Convolution is lowered to a matrix product (im2col) per sample.

use ndarray::{Array1, Array2, Array4, ArrayView3, ArrayView4, Axis};

use crate::error::ConfigurationError;

/// Negative slope of the leaky rectifier after every convolution.
pub const LEAKY_SLOPE: f32 = 0.2;

/// Static description of one convolution in the network.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ConvSpec {
    /// Parameter key prefix (`<key>.weight`, `<key>.bias`)
    pub key: &'static str,
    /// Input channels
    pub in_channels: usize,
    /// Output channels
    pub out_channels: usize,
    /// Kernel `(height, width)`
    pub kernel: (usize, usize),
    /// Stride `(height, width)`
    pub stride: (usize, usize),
    /// Zero padding `(height, width)`
    pub padding: (usize, usize),
}

impl ConvSpec {
    const fn image(key: &'static str, in_channels: usize, out_channels: usize) -> Self {
        Self { key, in_channels, out_channels, kernel: (4, 4), stride: (2, 2), padding: (1, 1) }
    }

    const fn strip(key: &'static str, in_channels: usize, out_channels: usize) -> Self {
        Self { key, in_channels, out_channels, kernel: (1, 3), stride: (1, 1), padding: (0, 1) }
    }

    /// Weight tensor shape `[out, in, kh, kw]`
    #[inline]
    #[must_use]
    pub const fn weight_shape(&self) -> [usize; 4] {
        [self.out_channels, self.in_channels, self.kernel.0, self.kernel.1]
    }

    /// Weight tensor key
    #[must_use]
    pub fn weight_key(&self) -> String {
        format!("{}.weight", self.key)
    }

    /// Bias tensor key
    #[must_use]
    pub fn bias_key(&self) -> String {
        format!("{}.bias", self.key)
    }

    /// Spatial output size for an input of `(height, width)`.
    #[inline]
    #[must_use]
    pub const fn output_size(&self, height: usize, width: usize) -> (usize, usize) {
        (
            (height + 2 * self.padding.0 - self.kernel.0) / self.stride.0 + 1,
            (width + 2 * self.padding.1 - self.kernel.1) / self.stride.1 + 1,
        )
    }
}

/// Image branch: 32×32 → 16×16 → 8×8 → 4×4
pub const IMAGE_BRANCH: [ConvSpec; 3] = [
    ConvSpec::image("img_conv.conv1", 1, 128),
    ConvSpec::image("img_conv.conv2", 128, 256),
    ConvSpec::image("img_conv.conv3", 256, 512),
];

/// PSD branch: length-preserving 1×3 convolutions
pub const PSD_BRANCH: [ConvSpec; 3] = [
    ConvSpec::strip("psds_conv.conv1", 1, 128),
    ConvSpec::strip("psds_conv.conv2", 128, 256),
    ConvSpec::strip("psds_conv.conv3", 256, 1),
];

/// Autocorrelation branch: same topology as the PSD branch
pub const AUTOCORR_BRANCH: [ConvSpec; 3] = [
    ConvSpec::strip("autocorr_conv.conv1", 1, 128),
    ConvSpec::strip("autocorr_conv.conv2", 128, 256),
    ConvSpec::strip("autocorr_conv.conv3", 256, 1),
];

/// Fusion convolution over the 712 concatenated channels
pub const FUSION: ConvSpec = ConvSpec {
    key: "conv",
    in_channels: 712,
    out_channels: 7,
    kernel: (4, 4),
    stride: (1, 1),
    padding: (0, 0),
};

/// Every convolution of the network, in forward order per branch.
pub fn all_specs() -> impl Iterator<Item = ConvSpec> {
    IMAGE_BRANCH
        .into_iter()
        .chain(PSD_BRANCH)
        .chain(AUTOCORR_BRANCH)
        .chain(std::iter::once(FUSION))
}

/// 2D convolution with bias.
#[derive(Clone, Debug)]
pub struct Conv2d {
    spec: ConvSpec,
    /// Weights flattened to `out × (in·kh·kw)`
    kernel: Array2<f32>,
    bias: Array1<f32>,
}

impl Conv2d {
    /// Create a convolution from its weight `[out, in, kh, kw]` and bias
    /// `[out]` tensors.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::ShapeMismatch`] when either tensor does
    /// not match `spec`.
    pub fn new(spec: ConvSpec, weight: &Array4<f32>, bias: Array1<f32>) -> Result<Self, ConfigurationError> {
        let expected = spec.weight_shape();
        if weight.shape() != expected {
            return Err(ConfigurationError::ShapeMismatch {
                name: spec.weight_key(),
                expected: expected.to_vec(),
                actual: weight.shape().to_vec(),
            });
        }
        if bias.len() != spec.out_channels {
            return Err(ConfigurationError::ShapeMismatch {
                name: spec.bias_key(),
                expected: vec![spec.out_channels],
                actual: bias.shape().to_vec(),
            });
        }

        let (kh, kw) = spec.kernel;
        let kernel = Array2::from_shape_fn((spec.out_channels, spec.in_channels * kh * kw), |(o, q)| {
            weight[[o, q / (kh * kw), (q / kw) % kh, q % kw]]
        });

        Ok(Self { spec, kernel, bias })
    }

    /// Layer description
    #[inline]
    #[must_use]
    pub fn spec(&self) -> &ConvSpec {
        &self.spec
    }

    /// Apply the convolution to a batch shaped `[batch, in, height, width]`.
    ///
    /// # Panics
    ///
    /// Panics if the input channel count differs from the layer's.
    #[must_use]
    pub fn forward(&self, input: ArrayView4<'_, f32>) -> Array4<f32> {
        let (batch, channels, height, width) = input.dim();
        assert_eq!(channels, self.spec.in_channels, "{}: input channel count", self.spec.key);

        let (out_h, out_w) = self.spec.output_size(height, width);
        let mut output = Array4::zeros((batch, self.spec.out_channels, out_h, out_w));

        for (sample, mut out) in input.outer_iter().zip(output.outer_iter_mut()) {
            let cols = self.im2col(sample, out_h, out_w);
            let product = self.kernel.dot(&cols);
            for ((mut plane, row), &b) in out.outer_iter_mut().zip(product.outer_iter()).zip(&self.bias) {
                for (dst, &v) in plane.iter_mut().zip(row.iter()) {
                    *dst = v + b;
                }
            }
        }
        output
    }

    /// Unfold one sample into `(in·kh·kw) × (out_h·out_w)` patches.
    fn im2col(&self, sample: ArrayView3<'_, f32>, out_h: usize, out_w: usize) -> Array2<f32> {
        let (channels, height, width) = sample.dim();
        let (kh, kw) = self.spec.kernel;
        let (sh, sw) = self.spec.stride;
        let (ph, pw) = self.spec.padding;

        let mut cols = Array2::zeros((channels * kh * kw, out_h * out_w));
        for c in 0..channels {
            for i in 0..kh {
                for j in 0..kw {
                    let mut row = cols.row_mut((c * kh + i) * kw + j);
                    for oh in 0..out_h {
                        let Some(ih) = (oh * sh + i).checked_sub(ph).filter(|&ih| ih < height) else {
                            continue;
                        };
                        for ow in 0..out_w {
                            if let Some(iw) = (ow * sw + j).checked_sub(pw).filter(|&iw| iw < width) {
                                row[oh * out_w + ow] = sample[[c, ih, iw]];
                            }
                        }
                    }
                }
            }
        }
        cols
    }
}

/// Leaky rectification in place: `x` if positive, `0.2·x` otherwise.
pub fn leaky_relu(x: &mut Array4<f32>) {
    x.mapv_inplace(|v| if v >= 0.0 { v } else { LEAKY_SLOPE * v });
}

/// Row-wise softmax in place (numerically stabilised).
pub fn softmax_rows(x: &mut Array2<f32>) {
    for mut row in x.axis_iter_mut(Axis(0)) {
        let max = row.fold(f32::NEG_INFINITY, |acc, &v| acc.max(v));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|v| v / sum);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array};

    /// Direct (non-lowered) convolution for cross-checking.
    fn naive_conv(spec: &ConvSpec, weight: &Array4<f32>, bias: &Array1<f32>, input: &Array4<f32>) -> Array4<f32> {
        let (batch, channels, height, width) = input.dim();
        let (out_h, out_w) = spec.output_size(height, width);
        let (kh, kw) = spec.kernel;
        let mut out = Array4::zeros((batch, spec.out_channels, out_h, out_w));
        for b in 0..batch {
            for o in 0..spec.out_channels {
                for oh in 0..out_h {
                    for ow in 0..out_w {
                        let mut sum = bias[o];
                        for c in 0..channels {
                            for i in 0..kh {
                                for j in 0..kw {
                                    let ih = (oh * spec.stride.0 + i) as isize - spec.padding.0 as isize;
                                    let iw = (ow * spec.stride.1 + j) as isize - spec.padding.1 as isize;
                                    if ih >= 0 && iw >= 0 && (ih as usize) < height && (iw as usize) < width {
                                        sum += input[[b, c, ih as usize, iw as usize]] * weight[[o, c, i, j]];
                                    }
                                }
                            }
                        }
                        out[[b, o, oh, ow]] = sum;
                    }
                }
            }
        }
        out
    }

    fn pseudo_random(len: usize, seed: u32) -> Vec<f32> {
        let mut state = seed;
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (state >> 8) as f32 / (1u32 << 24) as f32 - 0.5
            })
            .collect()
    }

    #[test]
    fn test_output_sizes() {
        assert_eq!(IMAGE_BRANCH[0].output_size(32, 32), (16, 16));
        assert_eq!(IMAGE_BRANCH[2].output_size(8, 8), (4, 4));
        assert_eq!(PSD_BRANCH[1].output_size(1, 100), (1, 100));
        assert_eq!(FUSION.output_size(4, 4), (1, 1));
        assert_eq!(all_specs().count(), 10);
    }

    #[test]
    fn test_strided_conv_matches_naive() {
        let spec = ConvSpec::image("test", 2, 3);
        let weight = Array::from_shape_vec((3, 2, 4, 4), pseudo_random(96, 1)).unwrap();
        let bias = Array1::from(pseudo_random(3, 2));
        let input = Array::from_shape_vec((2, 2, 8, 8), pseudo_random(256, 3)).unwrap();

        let conv = Conv2d::new(spec, &weight, bias.clone()).unwrap();
        let fast = conv.forward(input.view());
        let slow = naive_conv(&spec, &weight, &bias, &input);

        assert_eq!(fast.dim(), (2, 3, 4, 4));
        for (a, b) in fast.iter().zip(slow.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_strip_conv_matches_naive() {
        let spec = ConvSpec::strip("test", 3, 2);
        let weight = Array::from_shape_vec((2, 3, 1, 3), pseudo_random(18, 4)).unwrap();
        let bias = Array1::from(pseudo_random(2, 5));
        let input = Array::from_shape_vec((1, 3, 1, 10), pseudo_random(30, 6)).unwrap();

        let conv = Conv2d::new(spec, &weight, bias.clone()).unwrap();
        let fast = conv.forward(input.view());
        let slow = naive_conv(&spec, &weight, &bias, &input);

        assert_eq!(fast.dim(), (1, 2, 1, 10));
        for (a, b) in fast.iter().zip(slow.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let err = Conv2d::new(FUSION, &Array4::zeros((7, 711, 4, 4)), Array1::zeros(7)).unwrap_err();
        assert!(matches!(err, ConfigurationError::ShapeMismatch { ref name, .. } if name == "conv.weight"));

        let err = Conv2d::new(FUSION, &Array4::zeros((7, 712, 4, 4)), Array1::zeros(6)).unwrap_err();
        assert!(matches!(err, ConfigurationError::ShapeMismatch { ref name, .. } if name == "conv.bias"));
    }

    #[test]
    fn test_leaky_relu() {
        let mut x = Array4::from_shape_vec((1, 1, 1, 3), vec![-1.0, 0.0, 2.0]).unwrap();
        leaky_relu(&mut x);
        assert_eq!(x.iter().copied().collect::<Vec<_>>(), vec![-0.2, 0.0, 2.0]);
    }

    #[test]
    fn test_softmax_rows() {
        let mut x = array![[0.0_f32, 0.0], [1000.0, 0.0]];
        softmax_rows(&mut x);
        assert_abs_diff_eq!(x[[0, 0]], 0.5);
        assert_abs_diff_eq!(x[[1, 0]], 1.0);
        assert_abs_diff_eq!(x[[1, 1]], 0.0);
    }
}
