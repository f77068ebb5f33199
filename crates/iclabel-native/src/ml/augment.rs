//! Input augmentation and view averaging
//!
//! Every component is classified under four framings of its topography.
//! For `N` components the batch has `4N` rows and row `k·N + n` holds view
//! `k` of component `n`; the strips are tiled unchanged into every view.

use ndarray::{s, Array2, Array4, ArrayView2, Axis};

use iclabel_core::{AUTOCORR_LAGS, N_CLASSES, N_VIEWS, PSD_BINS, TOPO_GRID};

use crate::features::IcFeatures;

/// One framing of a topography image.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum View {
    /// Unchanged
    Original = 0,
    /// Sign inverted
    Negated = 1,
    /// Columns reversed (left-right mirror)
    Flipped = 2,
    /// Sign inverted and columns reversed
    NegatedFlipped = 3,
}

impl View {
    /// All views in batch order
    pub const ALL: [Self; N_VIEWS] = [Self::Original, Self::Negated, Self::Flipped, Self::NegatedFlipped];

    /// Position of this view in the batch
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Whether the sign is inverted
    #[inline]
    #[must_use]
    pub const fn is_negated(self) -> bool {
        matches!(self, Self::Negated | Self::NegatedFlipped)
    }

    /// Whether the columns are reversed
    #[inline]
    #[must_use]
    pub const fn is_flipped(self) -> bool {
        matches!(self, Self::Flipped | Self::NegatedFlipped)
    }

    /// Apply the view to one image.
    #[must_use]
    pub fn apply(self, image: ArrayView2<'_, f32>) -> Array2<f32> {
        let framed = if self.is_flipped() { image.slice_move(s![.., ..;-1]) } else { image };
        if self.is_negated() {
            framed.mapv(|v| -v)
        } else {
            framed.to_owned()
        }
    }
}

/// Network inputs for `4N` augmented rows.
#[derive(Clone, Debug)]
pub struct AugmentedBatch {
    /// `[4N, 1, 32, 32]`
    pub images: Array4<f32>,
    /// `[4N, 1, 1, 100]`
    pub psds: Array4<f32>,
    /// `[4N, 1, 1, 100]`
    pub autocorrs: Array4<f32>,
}

impl AugmentedBatch {
    /// Number of augmented rows
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.images.dim().0
    }

    /// Whether the batch is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Build the four-view batch for a feature set.
#[must_use]
pub fn augment(features: &IcFeatures) -> AugmentedBatch {
    let n = features.n_components();
    let rows = N_VIEWS * n;

    let mut images = Array4::zeros((rows, 1, TOPO_GRID, TOPO_GRID));
    let mut psds = Array4::zeros((rows, 1, 1, PSD_BINS));
    let mut autocorrs = Array4::zeros((rows, 1, 1, AUTOCORR_LAGS));

    for view in View::ALL {
        for c in 0..n {
            let row = view.index() * n + c;
            let image = features.topographies().index_axis(Axis(0), c);
            images.slice_mut(s![row, 0, .., ..]).assign(&view.apply(image));
            psds.slice_mut(s![row, 0, 0, ..]).assign(&features.psds().row(c));
            autocorrs.slice_mut(s![row, 0, 0, ..]).assign(&features.autocorrs().row(c));
        }
    }

    AugmentedBatch { images, psds, autocorrs }
}

/// Average the `4N × 7` network output back to `N × 7`: component `n` is
/// the mean of rows `k·N + n` over the four views.
///
/// # Panics
///
/// Panics if the row count is not `4 × n_components`.
#[must_use]
pub fn average_views(probs: &Array2<f32>, n_components: usize) -> Array2<f32> {
    assert_eq!(probs.dim(), (N_VIEWS * n_components, N_CLASSES), "augmented output shape");

    let mut mean = Array2::zeros((n_components, N_CLASSES));
    for view in View::ALL {
        let block = probs.slice(s![view.index() * n_components..(view.index() + 1) * n_components, ..]);
        mean += &block;
    }
    mean /= N_VIEWS as f32;
    mean
}
