//! Scalp topography images
//!
//! Each component's scalp map is interpolated from the electrode positions
//! onto a 32×32 grid with a biharmonic spline, masked to the head disk and
//! scaled to unit peak magnitude.

use nalgebra::{DMatrix, DVector, Dyn, SVD};
use ndarray::{Array2, ArrayView1};
use tracing::warn;

use iclabel_core::math::normalize_max_abs;
use iclabel_core::{ChannelLayout, TOPO_GRID};

use crate::error::{IcLabelError, IcLabelResult};

/// Radius of the head disk in grid coordinates.
const HEAD_RADIUS: f64 = 0.5;

/// Headroom factor applied to the largest electrode radius.
const RADIUS_MARGIN: f64 = 1.02;

/// Iteration bound of the spline system's SVD.
const SVD_MAX_ITERATIONS: usize = 1000;

/// Biharmonic Green's function `d² (ln d − 1)`, zero at the origin.
#[inline]
fn green(d: f64) -> f64 {
    if d == 0.0 {
        0.0
    } else {
        d * d * (d.ln() - 1.0)
    }
}

/// Grid coordinate of row or column `k`
#[inline]
fn grid_coord(k: usize) -> f64 {
    -HEAD_RADIUS + k as f64 / (TOPO_GRID - 1) as f64
}

/// Biharmonic spline interpolator bound to one electrode layout.
///
/// Everything that depends only on the geometry is factorised once, so
/// each component only costs a solve and a matrix-vector product.
pub struct TopographyInterpolator {
    n_channels: usize,
    /// Layout index of every channel inside the interpolation radius
    kept: Vec<usize>,
    /// Unique-point index of every kept channel
    groups: Vec<usize>,
    group_sizes: Vec<usize>,
    svd: SVD<f64, Dyn, Dyn>,
    eps: f64,
    /// Green's function from every grid point to every unique point
    grid_greens: DMatrix<f64>,
    inside: Vec<bool>,
}

impl TopographyInterpolator {
    /// Prepare the interpolation for a layout.
    ///
    /// # Errors
    ///
    /// Returns [`IcLabelError::Interpolation`] when a channel position is
    /// not finite, when no channel lies inside the interpolation radius, or
    /// when the spline system does not converge.
    pub fn new(layout: &ChannelLayout) -> IcLabelResult<Self> {
        if let Some(index) = layout
            .polar()
            .iter()
            .position(|p| !p.radius.is_finite() || !p.angle_deg.is_finite())
        {
            return Err(IcLabelError::Interpolation {
                reason: format!("channel {index} has a non-finite position"),
            });
        }

        let max_radius = layout.max_radius();
        let plot_radius = (RADIUS_MARGIN * max_radius).min(1.0).max(HEAD_RADIUS);
        let interp_radius = (RADIUS_MARGIN * max_radius).min(1.0);
        let squeeze = HEAD_RADIUS / plot_radius;

        let mut kept = Vec::with_capacity(layout.len());
        let mut groups = Vec::with_capacity(layout.len());
        let mut points: Vec<(f64, f64)> = Vec::new();
        let mut group_sizes: Vec<usize> = Vec::new();

        for (index, polar) in layout.polar().iter().enumerate() {
            if polar.radius > interp_radius {
                continue;
            }
            let (x, y) = polar.to_cartesian();
            let point = (x * squeeze, y * squeeze);

            let group = match points.iter().position(|&p| p == point) {
                Some(group) => group,
                None => {
                    points.push(point);
                    group_sizes.push(0);
                    points.len() - 1
                }
            };
            group_sizes[group] += 1;
            kept.push(index);
            groups.push(group);
        }

        if kept.len() < layout.len() {
            warn!(
                dropped = layout.len() - kept.len(),
                "Channels outside the interpolation radius ignored"
            );
        }
        if points.is_empty() {
            return Err(IcLabelError::Interpolation {
                reason: "no channel inside the interpolation radius".into(),
            });
        }

        let m = points.len();
        let distance = |a: (f64, f64), b: (f64, f64)| (a.0 - b.0).hypot(a.1 - b.1);

        let greens = DMatrix::from_fn(m, m, |i, j| green(distance(points[i], points[j])));
        let svd = greens
            .try_svd(true, true, f64::EPSILON, SVD_MAX_ITERATIONS)
            .ok_or_else(|| IcLabelError::Interpolation {
                reason: format!("spline system did not converge in {SVD_MAX_ITERATIONS} iterations"),
            })?;
        let eps = svd.singular_values.max() * m as f64 * f64::EPSILON;

        let n_grid = TOPO_GRID * TOPO_GRID;
        let grid_greens = DMatrix::from_fn(n_grid, m, |g, j| {
            let p = (grid_coord(g / TOPO_GRID), grid_coord(g % TOPO_GRID));
            green(distance(p, points[j]))
        });
        let inside = (0..n_grid)
            .map(|g| {
                let (x, y) = (grid_coord(g / TOPO_GRID), grid_coord(g % TOPO_GRID));
                x.hypot(y) <= HEAD_RADIUS
            })
            .collect();

        Ok(Self {
            n_channels: layout.len(),
            kept,
            groups,
            group_sizes,
            svd,
            eps,
            grid_greens,
            inside,
        })
    }

    /// Number of channels of the layout this interpolator was built for
    #[inline]
    #[must_use]
    pub fn n_channels(&self) -> usize {
        self.n_channels
    }

    /// Number of distinct interpolation nodes after merging duplicates
    #[inline]
    #[must_use]
    pub fn n_nodes(&self) -> usize {
        self.group_sizes.len()
    }

    /// Interpolate one scalp map (one value per layout channel).
    ///
    /// The result is indexed `[row, column]`: rows run along the first
    /// planar axis, columns along the second. Points outside the head disk
    /// are zero and the image is scaled to unit peak magnitude.
    ///
    /// # Errors
    ///
    /// Returns [`IcLabelError::Interpolation`] when the spline system cannot
    /// be solved.
    pub fn interpolate(&self, values: ArrayView1<'_, f64>) -> IcLabelResult<Array2<f64>> {
        let mut merged = DVector::zeros(self.n_nodes());
        for (&index, &group) in self.kept.iter().zip(&self.groups) {
            merged[group] += values[index];
        }
        for (value, &size) in merged.iter_mut().zip(&self.group_sizes) {
            *value /= size as f64;
        }

        let weights = self
            .svd
            .solve(&merged, self.eps)
            .map_err(|reason| IcLabelError::Interpolation { reason: reason.to_string() })?;
        let grid = &self.grid_greens * weights;

        let mut pixels: Vec<f64> = grid
            .iter()
            .zip(&self.inside)
            .map(|(&v, &inside)| if inside { v } else { 0.0 })
            .collect();
        normalize_max_abs(&mut pixels);

        Array2::from_shape_vec((TOPO_GRID, TOPO_GRID), pixels).map_err(|e| IcLabelError::Interpolation {
            reason: e.to_string(),
        })
    }
}
