//! Fixed-topology classifier network
//!
//! Three convolutional branches (image, PSD, autocorrelation) feed a single
//! fusion convolution followed by a softmax over the seven classes.

use ndarray::{s, Array2, Array4, ArrayView4, Axis};
use tracing::debug;

use iclabel_core::{AUTOCORR_LAGS, N_CLASSES, PSD_BINS, TOPO_GRID};

use super::layers::{leaky_relu, softmax_rows, Conv2d, ConvSpec, AUTOCORR_BRANCH, FUSION, IMAGE_BRANCH, PSD_BRANCH};
use super::params::NetworkParameters;
use crate::error::ConfigurationError;

/// Channels produced by the image branch
const IMAGE_CHANNELS: usize = 512;

/// Spatial side of the fused feature map
const FUSED_SIDE: usize = 4;

/// The ICLabel network with all parameters bound.
#[derive(Clone, Debug)]
pub struct IcLabelNet {
    image: [Conv2d; 3],
    psd: [Conv2d; 3],
    autocorr: [Conv2d; 3],
    fusion: Conv2d,
}

impl IcLabelNet {
    /// Bind a parameter set to the network topology.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] naming the first tensor that is
    /// missing, has an unsupported dtype or has the wrong shape.
    pub fn from_parameters(params: &NetworkParameters) -> Result<Self, ConfigurationError> {
        let branch = |specs: [ConvSpec; 3]| -> Result<[Conv2d; 3], ConfigurationError> {
            let [a, b, c] = specs;
            Ok([conv_layer(params, a)?, conv_layer(params, b)?, conv_layer(params, c)?])
        };

        let net = Self {
            image: branch(IMAGE_BRANCH)?,
            psd: branch(PSD_BRANCH)?,
            autocorr: branch(AUTOCORR_BRANCH)?,
            fusion: conv_layer(params, FUSION)?,
        };
        debug!(parameters = net.parameter_count(), "Classifier network ready");
        Ok(net)
    }

    /// Total number of scalar parameters
    #[must_use]
    pub fn parameter_count(&self) -> usize {
        self.layers()
            .map(|layer| {
                let [o, i, kh, kw] = layer.spec().weight_shape();
                o * i * kh * kw + o
            })
            .sum()
    }

    fn layers(&self) -> impl Iterator<Item = &Conv2d> {
        self.image
            .iter()
            .chain(&self.psd)
            .chain(&self.autocorr)
            .chain(std::iter::once(&self.fusion))
    }

    /// Run the network on a batch.
    ///
    /// * `images` - `[batch, 1, 32, 32]`
    /// * `psds` - `[batch, 1, 1, 100]`
    /// * `autocorrs` - `[batch, 1, 1, 100]`
    ///
    /// Returns `[batch, 7]` class probabilities (rows sum to one).
    ///
    /// # Panics
    ///
    /// Panics if the batch sizes differ or an input has the wrong shape.
    #[must_use]
    pub fn forward(
        &self,
        images: ArrayView4<'_, f32>,
        psds: ArrayView4<'_, f32>,
        autocorrs: ArrayView4<'_, f32>,
    ) -> Array2<f32> {
        let batch = images.dim().0;
        assert_eq!(images.dim(), (batch, 1, TOPO_GRID, TOPO_GRID), "image batch shape");
        assert_eq!(psds.dim(), (batch, 1, 1, PSD_BINS), "psd batch shape");
        assert_eq!(autocorrs.dim(), (batch, 1, 1, AUTOCORR_LAGS), "autocorrelation batch shape");

        let image_out = run_branch(&self.image, images);
        let psd_out = run_branch(&self.psd, psds);
        let autocorr_out = run_branch(&self.autocorr, autocorrs);

        let fused = fuse(&image_out, &psd_out, &autocorr_out);
        let logits = self.fusion.forward(fused.view());

        let mut probs = Array2::from_shape_fn((batch, N_CLASSES), |(b, k)| logits[[b, k, 0, 0]]);
        softmax_rows(&mut probs);
        probs
    }
}

fn conv_layer(params: &NetworkParameters, spec: ConvSpec) -> Result<Conv2d, ConfigurationError> {
    let weight_key = spec.weight_key();
    let weight = params.get(&weight_key)?;
    let expected = spec.weight_shape();
    let dims: [usize; 4] = weight.shape().try_into().map_err(|_| ConfigurationError::ShapeMismatch {
        name: weight_key.clone(),
        expected: expected.to_vec(),
        actual: weight.shape().to_vec(),
    })?;
    let weight = Array4::from_shape_vec(dims, weight.data().to_vec()).map_err(|_| ConfigurationError::ShapeMismatch {
        name: weight_key,
        expected: expected.to_vec(),
        actual: dims.to_vec(),
    })?;

    let bias_key = spec.bias_key();
    let bias = params.get(&bias_key)?;
    if bias.shape().len() != 1 {
        return Err(ConfigurationError::ShapeMismatch {
            name: bias_key,
            expected: vec![spec.out_channels],
            actual: bias.shape().to_vec(),
        });
    }

    Conv2d::new(spec, &weight, bias.data().to_vec().into())
}

fn run_branch(layers: &[Conv2d; 3], input: ArrayView4<'_, f32>) -> Array4<f32> {
    let mut x = layers[0].forward(input);
    leaky_relu(&mut x);
    for layer in &layers[1..] {
        x = layer.forward(x.view());
        leaky_relu(&mut x);
    }
    x
}

/// Concatenate the image features with both strips broadcast over the 4×4
/// map: channel `512 + c` holds PSD element `c`, channel `612 + c` holds
/// autocorrelation element `c`.
fn fuse(image: &Array4<f32>, psd: &Array4<f32>, autocorr: &Array4<f32>) -> Array4<f32> {
    let batch = image.dim().0;
    let channels = IMAGE_CHANNELS + PSD_BINS + AUTOCORR_LAGS;
    let mut fused = Array4::zeros((batch, channels, FUSED_SIDE, FUSED_SIDE));

    fused.slice_mut(s![.., ..IMAGE_CHANNELS, .., ..]).assign(image);
    for (b, mut sample) in fused.axis_iter_mut(Axis(0)).enumerate() {
        for c in 0..PSD_BINS {
            sample.slice_mut(s![IMAGE_CHANNELS + c, .., ..]).fill(psd[[b, 0, 0, c]]);
        }
        for c in 0..AUTOCORR_LAGS {
            sample
                .slice_mut(s![IMAGE_CHANNELS + PSD_BINS + c, .., ..])
                .fill(autocorr[[b, 0, 0, c]]);
        }
    }
    fused
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::testing::random_parameters;
    use approx::assert_abs_diff_eq;

    const REFERENCE: [f32; N_CLASSES] = [0.4, 0.2, 0.1, 0.1, 0.1, 0.05, 0.05];

    fn zero_inputs(batch: usize) -> (Array4<f32>, Array4<f32>, Array4<f32>) {
        (
            Array4::zeros((batch, 1, TOPO_GRID, TOPO_GRID)),
            Array4::zeros((batch, 1, 1, PSD_BINS)),
            Array4::zeros((batch, 1, 1, AUTOCORR_LAGS)),
        )
    }

    fn reference_parameters() -> NetworkParameters {
        NetworkParameters::filled_with(|name, i| if name == "conv.bias" { REFERENCE[i].ln() } else { 0.0 })
    }

    #[test]
    fn test_parameter_count() {
        let net = IcLabelNet::from_parameters(&NetworkParameters::zeros()).unwrap();
        let image = (128 * 16 + 128) + (256 * 128 * 16 + 256) + (512 * 256 * 16 + 512);
        let strip = (128 * 3 + 128) + (256 * 128 * 3 + 256) + (256 * 3 + 1);
        let fusion = 7 * 712 * 16 + 7;
        assert_eq!(net.parameter_count(), image + 2 * strip + fusion);
    }

    #[test]
    fn test_bias_only_golden() {
        let net = IcLabelNet::from_parameters(&reference_parameters()).unwrap();
        let (images, psds, autocorrs) = zero_inputs(2);

        let probs = net.forward(images.view(), psds.view(), autocorrs.view());
        assert_eq!(probs.dim(), (2, N_CLASSES));
        for row in probs.rows() {
            for (p, r) in row.iter().zip(REFERENCE) {
                assert_abs_diff_eq!(*p, r, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn test_strip_broadcast_golden() {
        // PSD branch emits leaky(-1) = -0.2 everywhere; class 1 reads PSD
        // element 0 (channel 512) at all 16 positions: logit shift -3.2
        let mut params = reference_parameters();
        params.insert("psds_conv.conv3.bias", vec![1], vec![-1.0]).unwrap();
        let mut fusion = vec![0.0; 7 * 712 * 16];
        for pos in 0..16 {
            fusion[(712 + 512) * 16 + pos] = 1.0;
        }
        params.insert("conv.weight", vec![7, 712, 4, 4], fusion).unwrap();

        let net = IcLabelNet::from_parameters(&params).unwrap();
        let (images, psds, autocorrs) = zero_inputs(1);
        let probs = net.forward(images.view(), psds.view(), autocorrs.view());

        let shifted = f64::from(REFERENCE[1]) * (-3.2_f64).exp();
        let z = 1.0 - f64::from(REFERENCE[1]) + shifted;
        for (i, &r) in REFERENCE.iter().enumerate() {
            let expected = if i == 1 { shifted / z } else { f64::from(r) / z };
            assert_abs_diff_eq!(f64::from(probs[[0, i]]), expected, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_autocorr_channels_follow_psd_channels() {
        // Class 2 reads autocorrelation element 3 (channel 615)
        let mut params = reference_parameters();
        params.insert("autocorr_conv.conv3.bias", vec![1], vec![2.0]).unwrap();
        let mut fusion = vec![0.0; 7 * 712 * 16];
        fusion[(2 * 712 + 615) * 16] = 1.0;
        params.insert("conv.weight", vec![7, 712, 4, 4], fusion).unwrap();

        let net = IcLabelNet::from_parameters(&params).unwrap();
        let (images, psds, autocorrs) = zero_inputs(1);
        let probs = net.forward(images.view(), psds.view(), autocorrs.view());

        let boosted = f64::from(REFERENCE[2]) * 2.0_f64.exp();
        let z = 1.0 - f64::from(REFERENCE[2]) + boosted;
        assert_abs_diff_eq!(f64::from(probs[[0, 2]]), boosted / z, epsilon = 1e-6);
    }

    #[test]
    fn test_rows_are_distributions() {
        let net = IcLabelNet::from_parameters(&random_parameters(7)).unwrap();
        let images = Array4::from_shape_fn((3, 1, 32, 32), |(b, _, h, w)| ((b + h * w) as f32 * 0.01).sin());
        let psds = Array4::from_shape_fn((3, 1, 1, 100), |(b, _, _, f)| ((b * 3 + f) as f32 * 0.1).cos());
        let autocorrs = Array4::from_shape_fn((3, 1, 1, 100), |(b, _, _, k)| (-(k as f32) / (10.0 + b as f32)).exp());

        let probs = net.forward(images.view(), psds.view(), autocorrs.view());
        for row in probs.rows() {
            assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-5);
            assert!(row.iter().all(|&p| (0.0..=1.0).contains(&p)));
        }
    }

    #[test]
    fn test_missing_tensor_rejected() {
        let mut params = NetworkParameters::zeros();
        params.remove("autocorr_conv.conv2.weight");
        let err = IcLabelNet::from_parameters(&params).unwrap_err();
        assert!(matches!(err, ConfigurationError::MissingTensor { ref name } if name == "autocorr_conv.conv2.weight"));
    }

    #[test]
    fn test_wrong_shape_rejected() {
        let mut params = NetworkParameters::zeros();
        params.insert("img_conv.conv1.weight", vec![128, 1, 3, 3], vec![0.0; 128 * 9]).unwrap();
        let err = IcLabelNet::from_parameters(&params).unwrap_err();
        assert!(matches!(err, ConfigurationError::ShapeMismatch { ref name, .. } if name == "img_conv.conv1.weight"));

        let mut params = NetworkParameters::zeros();
        params.insert("conv.bias", vec![1, 7], vec![0.0; 7]).unwrap();
        let err = IcLabelNet::from_parameters(&params).unwrap_err();
        assert!(matches!(err, ConfigurationError::ShapeMismatch { ref name, .. } if name == "conv.bias"));
    }
}
