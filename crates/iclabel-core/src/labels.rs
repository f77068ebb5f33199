//! Component classes and the label mapper
//!
//! The class order is part of the model contract: index `i` of every
//! probability vector refers to `IcLabel::ALL[i]`.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::types::N_CLASSES;

/// Physiological / artifact category of an independent component.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum IcLabel {
    /// Cortical brain activity
    Brain = 0,
    /// Muscle (EMG) artifact
    Muscle = 1,
    /// Ocular artifact (blinks, saccades)
    Eye = 2,
    /// Cardiac (ECG) artifact
    Heart = 3,
    /// Mains interference (50/60 Hz)
    LineNoise = 4,
    /// Single bad channel
    ChannelNoise = 5,
    /// Anything else
    Other = 6,
}

impl IcLabel {
    /// All classes in network output order
    pub const ALL: [Self; N_CLASSES] = [
        Self::Brain, Self::Muscle, Self::Eye, Self::Heart,
        Self::LineNoise, Self::ChannelNoise, Self::Other,
    ];

    /// Number of classes
    pub const COUNT: usize = N_CLASSES;

    /// Get the output index for this class
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Get class from output index (returns None if out of range)
    #[inline]
    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Brain),
            1 => Some(Self::Muscle),
            2 => Some(Self::Eye),
            3 => Some(Self::Heart),
            4 => Some(Self::LineNoise),
            5 => Some(Self::ChannelNoise),
            6 => Some(Self::Other),
            _ => None,
        }
    }

    /// Human-readable label string
    #[inline]
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Brain => "Brain",
            Self::Muscle => "Muscle",
            Self::Eye => "Eye",
            Self::Heart => "Heart",
            Self::LineNoise => "Line Noise",
            Self::ChannelNoise => "Channel Noise",
            Self::Other => "Other",
        }
    }

    /// Whether the class is an artifact (everything but brain activity)
    #[inline]
    #[must_use]
    pub const fn is_artifact(self) -> bool {
        !matches!(self, Self::Brain)
    }
}

impl fmt::Display for IcLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Arg-max result of a probability vector.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Index of the winning class
    pub index: usize,
    /// Probability of the winning class
    pub probability: f32,
    /// Winning class
    pub label: IcLabel,
}

/// Per-component class probabilities in [`IcLabel::ALL`] order.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassProbability {
    /// Probabilities (non-negative, summing to one)
    pub probabilities: [f32; N_CLASSES],
}

impl ClassProbability {
    /// Wrap a probability vector.
    #[inline]
    #[must_use]
    pub const fn new(probabilities: [f32; N_CLASSES]) -> Self {
        Self { probabilities }
    }

    /// Build from a slice, returning None unless it holds exactly 7 values.
    #[must_use]
    pub fn from_slice(values: &[f32]) -> Option<Self> {
        let probabilities: [f32; N_CLASSES] = values.try_into().ok()?;
        Some(Self { probabilities })
    }

    /// Probability of one class
    #[inline]
    #[must_use]
    pub const fn get(&self, label: IcLabel) -> f32 {
        self.probabilities[label.index()]
    }

    /// Sum of all entries (1.0 for a well-formed vector)
    #[must_use]
    pub fn total(&self) -> f32 {
        self.probabilities.iter().sum()
    }

    /// Map the vector to its winning class.
    ///
    /// Ties resolve to the lowest index. NaN entries never win.
    #[must_use]
    pub fn predict(&self) -> Prediction {
        let mut index = 0;
        let mut best = self.probabilities[0];
        for (i, &p) in self.probabilities.iter().enumerate().skip(1) {
            if p > best || (best.is_nan() && !p.is_nan()) {
                best = p;
                index = i;
            }
        }

        Prediction {
            index,
            probability: best,
            // index < N_CLASSES by construction
            label: IcLabel::ALL[index],
        }
    }
}

impl From<[f32; N_CLASSES]> for ClassProbability {
    fn from(probabilities: [f32; N_CLASSES]) -> Self {
        Self::new(probabilities)
    }
}
