//! Component classifier
//!
//! Holds a loaded network and turns component features into class
//! probabilities and labels.

use std::path::Path;
use std::sync::Arc;

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use iclabel_core::{ClassProbability, IcLabel, N_CLASSES};

use super::augment::{augment, average_views};
use super::network::IcLabelNet;
use super::params::NetworkParameters;
use crate::error::{ConfigurationError, IcLabelResult};
use crate::features::{FeatureExtractor, IcFeatures};
use crate::ica::{Activations, IcaDecomposition};

/// Per-component classification report.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComponentLabels {
    /// Class probabilities, one row per component
    pub y_pred_proba: Vec<[f32; N_CLASSES]>,
    /// Arg-max class index per component
    pub y_pred: Vec<usize>,
    /// Arg-max class name per component
    pub labels: Vec<String>,
}

impl ComponentLabels {
    /// Build the report from an `N × 7` probability matrix.
    #[must_use]
    pub fn from_probabilities(probs: &Array2<f32>) -> Self {
        let mut report = Self { y_pred_proba: Vec::new(), y_pred: Vec::new(), labels: Vec::new() };
        for row in probs.rows() {
            let mut values = [0.0; N_CLASSES];
            for (dst, src) in values.iter_mut().zip(row) {
                *dst = *src;
            }
            let prediction = ClassProbability::new(values).predict();
            report.y_pred_proba.push(values);
            report.y_pred.push(prediction.index);
            report.labels.push(prediction.label.name().to_string());
        }
        report
    }

    /// Number of components
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.y_pred.len()
    }

    /// Whether the report is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.y_pred.is_empty()
    }

    /// Probabilities of one component
    #[must_use]
    pub fn probabilities(&self, component: usize) -> Option<ClassProbability> {
        self.y_pred_proba.get(component).copied().map(ClassProbability::new)
    }

    /// Components whose winning class is `label`
    pub fn components_labelled(&self, label: IcLabel) -> impl Iterator<Item = usize> + '_ {
        self.y_pred
            .iter()
            .enumerate()
            .filter(move |&(_, &index)| index == label.index())
            .map(|(component, _)| component)
    }
}

/// ICLabel classifier.
///
/// The network is immutable after loading and can be shared between
/// classifiers through an [`Arc`].
#[derive(Clone, Debug)]
pub struct Classifier {
    net: Arc<IcLabelNet>,
}

impl Classifier {
    /// Wrap an already loaded network.
    #[must_use]
    pub fn new(net: Arc<IcLabelNet>) -> Self {
        Self { net }
    }

    /// Bind a parameter set.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] if a tensor is missing or malformed.
    pub fn from_parameters(params: &NetworkParameters) -> Result<Self, ConfigurationError> {
        Ok(Self::new(Arc::new(IcLabelNet::from_parameters(params)?)))
    }

    /// Load parameters from a safetensors file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not describe the
    /// network.
    pub fn from_file(path: impl AsRef<Path>) -> IcLabelResult<Self> {
        let params = NetworkParameters::load(path)?;
        Ok(Self::from_parameters(&params)?)
    }

    /// The shared network
    #[inline]
    pub fn network(&self) -> &Arc<IcLabelNet> {
        &self.net
    }

    /// Class probabilities for every component (`N × 7`, rows sum to one).
    ///
    /// Each component is classified under four framings of its topography
    /// and the results are averaged.
    #[must_use]
    pub fn predict_proba(&self, features: &IcFeatures) -> Array2<f32> {
        let n = features.n_components();
        let batch = augment(features);
        debug!(components = n, rows = batch.len(), "Running classifier");

        let probs = self.net.forward(batch.images.view(), batch.psds.view(), batch.autocorrs.view());
        average_views(&probs, n)
    }

    /// Classify components and build the label report.
    #[must_use]
    pub fn classify(&self, features: &IcFeatures) -> ComponentLabels {
        ComponentLabels::from_probabilities(&self.predict_proba(features))
    }

    /// Extract features and classify every component of a decomposition.
    ///
    /// # Errors
    ///
    /// Returns an error if feature extraction fails.
    pub fn label_components(
        &self,
        extractor: &mut FeatureExtractor,
        ica: &IcaDecomposition,
        activations: &Activations,
    ) -> IcLabelResult<ComponentLabels> {
        let features = extractor.extract(ica, activations)?;
        Ok(self.classify(&features))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FeatureConfig;
    use crate::ml::testing::random_parameters;
    use approx::assert_abs_diff_eq;
    use iclabel_core::{ChannelLayout, HeadFrame, AUTOCORR_LAGS, PSD_BINS, TOPO_GRID};
    use ndarray::{s, Array, Array3};
    use std::f64::consts::PI;

    const REFERENCE: [f32; N_CLASSES] = [0.4, 0.2, 0.1, 0.1, 0.1, 0.05, 0.05];

    fn sample_features(n: usize) -> IcFeatures {
        let topographies = Array3::from_shape_fn((n, TOPO_GRID, TOPO_GRID), |(c, i, j)| {
            let x = (i as f32 - 15.5) / 16.0;
            let y = (j as f32 - 10.0 - c as f32 * 3.0) / 16.0;
            (-(x * x + y * y) * 4.0).exp() - 0.3 * x
        });
        let psds = Array2::from_shape_fn((n, PSD_BINS), |(c, f)| -((f + c * 7) as f32 / 40.0).min(1.0));
        let autocorrs =
            Array2::from_shape_fn((n, AUTOCORR_LAGS), |(c, k)| ((k as f32) * 0.3 + c as f32).cos() * 0.9);
        IcFeatures::new(topographies, psds, autocorrs).unwrap()
    }

    fn random_classifier() -> Classifier {
        Classifier::from_parameters(&random_parameters(7)).unwrap()
    }

    #[test]
    fn test_rows_are_distributions() {
        let probs = random_classifier().predict_proba(&sample_features(3));
        assert_eq!(probs.dim(), (3, N_CLASSES));
        for row in probs.rows() {
            assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-5);
            assert!(row.iter().all(|&p| (0.0..=1.0).contains(&p)));
        }
    }

    #[test]
    fn test_framing_invariance() {
        let classifier = random_classifier();
        let original = sample_features(2);

        let mut negated = original.clone();
        negated.topographies_mut().mapv_inplace(|v| -v);

        let mut flipped = original.clone();
        let mirror = original.topographies().slice(s![.., .., ..;-1]).to_owned();
        flipped.topographies_mut().assign(&mirror);

        let expected = classifier.predict_proba(&original);
        for framed in [negated, flipped] {
            let probs = classifier.predict_proba(&framed);
            for (p, e) in probs.iter().zip(expected.iter()) {
                assert_abs_diff_eq!(*p, *e, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn test_batch_size_invariance() {
        let classifier = random_classifier();
        let features = sample_features(3);
        let batched = classifier.predict_proba(&features);

        for c in 0..3 {
            let single = classifier.predict_proba(&features.select(&[c]));
            for (p, e) in single.row(0).iter().zip(batched.row(c)) {
                assert_abs_diff_eq!(*p, *e, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn test_deterministic() {
        let classifier = random_classifier();
        let features = sample_features(2);
        assert_eq!(classifier.predict_proba(&features), classifier.predict_proba(&features));
    }

    #[test]
    fn test_zero_features_golden() {
        let params =
            NetworkParameters::filled_with(|name, i| if name == "conv.bias" { REFERENCE[i].ln() } else { 0.0 });
        let classifier = Classifier::from_parameters(&params).unwrap();

        let report = classifier.classify(&IcFeatures::zeros(2));
        assert_eq!(report.len(), 2);
        assert_eq!(report.y_pred, vec![0, 0]);
        assert_eq!(report.labels, vec!["Brain", "Brain"]);
        for row in &report.y_pred_proba {
            for (p, r) in row.iter().zip(REFERENCE) {
                assert_abs_diff_eq!(*p, r, epsilon = 1e-6);
            }
        }
        assert_eq!(report.components_labelled(IcLabel::Brain).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(report.components_labelled(IcLabel::Eye).count(), 0);
    }

    #[test]
    fn test_random_weights_golden() {
        // Recorded with an independent float64 evaluation of the network
        const ZEROS: [f32; N_CLASSES] = [
            0.143_899_40, 0.147_108_97, 0.137_982_37, 0.149_147_68, 0.145_218_93, 0.140_734_36, 0.135_908_28,
        ];
        const PATTERN: [f32; N_CLASSES] = [
            0.145_620_50, 0.148_574_09, 0.138_849_43, 0.147_235_68, 0.145_201_91, 0.139_209_21, 0.135_309_18,
        ];

        let classifier = random_classifier();

        let probs = classifier.predict_proba(&IcFeatures::zeros(1));
        for (p, e) in probs.row(0).iter().zip(ZEROS) {
            assert_abs_diff_eq!(*p, e, epsilon = 1e-5);
        }

        let topographies =
            Array3::from_shape_fn((1, TOPO_GRID, TOPO_GRID), |(_, i, j)| ((i * 7 + j * 3) % 11) as f32 / 10.0 - 0.5);
        let psds = Array2::from_shape_fn((1, PSD_BINS), |(_, f)| -((f % 13) as f32) / 12.0);
        let autocorrs = Array2::from_shape_fn((1, AUTOCORR_LAGS), |(_, k)| ((k % 9) as f32 - 4.0) / 4.0);
        let features = IcFeatures::new(topographies, psds, autocorrs).unwrap();

        let probs = classifier.predict_proba(&features);
        for (p, e) in probs.row(0).iter().zip(PATTERN) {
            assert_abs_diff_eq!(*p, e, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_report_from_probabilities() {
        let probs = ndarray::array![
            [0.7, 0.1, 0.05, 0.05, 0.05, 0.025, 0.025],
            [0.1, 0.1, 0.6, 0.05, 0.05, 0.05, 0.05],
        ];
        let report = ComponentLabels::from_probabilities(&probs);
        assert_eq!(report.y_pred, vec![0, 2]);
        assert_eq!(report.labels, vec!["Brain", "Eye"]);
        assert_eq!(report.probabilities(1).unwrap().predict().label, IcLabel::Eye);
        assert!(report.probabilities(2).is_none());

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"y_pred\":[0,2]"));
    }

    #[test]
    fn test_from_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("iclabel.safetensors");
        random_parameters(3).save(&path).unwrap();

        let loaded = Classifier::from_file(&path).unwrap();
        let direct = Classifier::from_parameters(&random_parameters(3)).unwrap();
        let features = sample_features(1);
        assert_eq!(loaded.predict_proba(&features), direct.predict_proba(&features));
    }

    #[test]
    fn test_from_file_missing() {
        assert!(Classifier::from_file("/nonexistent/iclabel.safetensors").is_err());
    }

    #[test]
    fn test_label_components_end_to_end() {
        let coords: Vec<[f64; 3]> = (0..6)
            .map(|k| {
                let az = 2.0 * PI * k as f64 / 6.0;
                [0.8 * az.cos(), 0.8 * az.sin(), 0.6]
            })
            .collect();
        let layout = ChannelLayout::from_xyz(&coords, HeadFrame::Eeglab);
        let mut extractor = FeatureExtractor::new(FeatureConfig::with_sample_rate(128), layout).unwrap();

        let unmixing = Array2::from_shape_fn((3, 6), |(i, j)| if i == j { 1.0 } else { 0.05 * (i + j) as f64 });
        let ica = IcaDecomposition::from_unmixing(unmixing).unwrap();
        let data = Array::from_shape_fn((3, 512), |(c, i)| {
            (2.0 * PI * (6.0 + 5.0 * c as f64) * i as f64 / 128.0).sin()
        });
        let activations = Activations::continuous(data).unwrap();

        let report = random_classifier().label_components(&mut extractor, &ica, &activations).unwrap();
        assert_eq!(report.len(), 3);
        for row in &report.y_pred_proba {
            assert_abs_diff_eq!(row.iter().sum::<f32>(), 1.0, epsilon = 1e-5);
        }
    }
}
