//! Sensor geometry and the polar topographic projection
//!
//! Topographies are interpolated in a 2D polar projection of the scalp:
//! the vertex maps to radius 0, the ear-nasion-inion plane to radius 0.5.
//! Angles follow the display convention of the training data: the azimuth
//! is negated, so positive angles run clockwise when seen from above.
//!
//! Two Cartesian input frames are supported, see [`HeadFrame`].

use alloc::vec::Vec;
use core::f64::consts::FRAC_PI_2;
use core::f64::consts::PI;

use serde::{Deserialize, Serialize};

/// Axis convention of the supplied sensor coordinates.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeadFrame {
    /// Head coordinates with +x towards the right ear, +y towards the nasion
    /// and +z towards the vertex.
    #[default]
    Mne,
    /// Head coordinates with +x towards the nasion, +y towards the left ear
    /// and +z towards the vertex.
    Eeglab,
}

/// 3D sensor position in a head-centred frame.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorPosition {
    /// First axis coordinate
    pub x: f64,
    /// Second axis coordinate
    pub y: f64,
    /// Vertical coordinate
    pub z: f64,
}

impl SensorPosition {
    /// Create a new position
    #[inline]
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Express the position in the nose-forward frame used for projection.
    ///
    /// `Mne` coordinates are rotated by 90° about the vertical axis:
    /// `X = y`, `Y = -x`.
    #[inline]
    #[must_use]
    pub fn to_eeglab(self, frame: HeadFrame) -> Self {
        match frame {
            HeadFrame::Eeglab => self,
            HeadFrame::Mne => Self::new(self.y, -self.x, self.z),
        }
    }

    /// Project the position onto the polar scalp map.
    #[must_use]
    pub fn to_polar(self, frame: HeadFrame) -> PolarPosition {
        let p = self.to_eeglab(frame);
        let (azimuth, elevation, _) = cart_to_sph(p.x, p.y, p.z);
        sph_to_topo(azimuth, elevation)
    }
}

/// Polar scalp-map coordinate of one channel.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PolarPosition {
    /// Normalised distance from the vertex (0 at the vertex, 0.5 at the equator)
    pub radius: f64,
    /// Angle in degrees (negated azimuth)
    pub angle_deg: f64,
}

impl PolarPosition {
    /// Angle in radians
    #[inline]
    #[must_use]
    pub fn angle_rad(&self) -> f64 {
        self.angle_deg * PI / 180.0
    }

    /// Planar coordinates `(x, y)` of the projected point.
    #[inline]
    #[must_use]
    pub fn to_cartesian(&self) -> (f64, f64) {
        let theta = self.angle_rad();
        (self.radius * libm::cos(theta), self.radius * libm::sin(theta))
    }
}

/// Cartesian to spherical coordinates: `(azimuth, elevation, radius)`.
///
/// A point on the vertical axis (including the origin) has no defined
/// azimuth; it is reported as 0.
#[must_use]
pub fn cart_to_sph(x: f64, y: f64, z: f64) -> (f64, f64, f64) {
    let azimuth = if x == 0.0 && y == 0.0 { 0.0 } else { libm::atan2(y, x) };
    let horizontal = libm::sqrt(x * x + y * y);
    let elevation = libm::atan2(z, horizontal);
    let radius = libm::sqrt(x * x + y * y + z * z);
    (azimuth, elevation, radius)
}

/// Spherical angles to polar scalp-map coordinates.
#[must_use]
pub fn sph_to_topo(azimuth: f64, elevation: f64) -> PolarPosition {
    let angle = -azimuth;
    let radius = (FRAC_PI_2 - elevation) / PI;
    PolarPosition {
        radius,
        angle_deg: angle * 180.0 / PI,
    }
}

/// Electrode montage with its polar projection.
///
/// The projection is computed once at construction and never mutated.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelLayout {
    positions: Vec<SensorPosition>,
    polar: Vec<PolarPosition>,
    frame: HeadFrame,
}

impl ChannelLayout {
    /// Build a layout from sensor positions given in `frame`.
    #[must_use]
    pub fn new(positions: Vec<SensorPosition>, frame: HeadFrame) -> Self {
        let polar = positions.iter().map(|p| p.to_polar(frame)).collect();
        Self { positions, polar, frame }
    }

    /// Build a layout from `[x, y, z]` triples.
    #[must_use]
    pub fn from_xyz(coords: &[[f64; 3]], frame: HeadFrame) -> Self {
        let positions = coords
            .iter()
            .map(|&[x, y, z]| SensorPosition::new(x, y, z))
            .collect();
        Self::new(positions, frame)
    }

    /// Number of channels
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether the layout has no channels
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Frame the positions were supplied in
    #[inline]
    #[must_use]
    pub const fn frame(&self) -> HeadFrame {
        self.frame
    }

    /// Original sensor positions
    #[inline]
    #[must_use]
    pub fn positions(&self) -> &[SensorPosition] {
        &self.positions
    }

    /// Polar projection of every channel
    #[inline]
    #[must_use]
    pub fn polar(&self) -> &[PolarPosition] {
        &self.polar
    }

    /// Radius vector (one entry per channel)
    #[must_use]
    pub fn radii(&self) -> Vec<f64> {
        self.polar.iter().map(|p| p.radius).collect()
    }

    /// Angle vector in degrees (one entry per channel)
    #[must_use]
    pub fn angles_deg(&self) -> Vec<f64> {
        self.polar.iter().map(|p| p.angle_deg).collect()
    }

    /// Largest projected radius, 0 for an empty layout
    #[must_use]
    pub fn max_radius(&self) -> f64 {
        self.polar.iter().map(|p| p.radius).fold(0.0, f64::max)
    }
}
