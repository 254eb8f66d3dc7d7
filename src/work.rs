//! Block weight functions for the supported consensus protocols
//!
//! Every block carries a [`WorkSample`], the abstract stand-in for the value of
//! its proof-of-work hash. A [`WorkModel`] turns that sample into the weight
//! the block contributes to its chain.

use std::fmt::Display;

use rand::{distributions::Open01, Rng};
use rand_distr::Distribution;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Default security parameter: the number of bits in a proof-of-work hash.
pub const DEFAULT_KAPPA: u32 = 256;

/// Proof sample of a single block, stored as the base-2 logarithm of the
/// hash value so that `2^κ` never has to be represented directly.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct WorkSample(f64);

impl WorkSample {
    /// Creates a sample whose hash value is `2^log2`.
    pub fn from_log2(log2: f64) -> Self {
        Self(log2)
    }

    /// Base-2 logarithm of the sampled hash value.
    pub fn log2(&self) -> f64 {
        self.0
    }
}

/// Consensus protocols that can be simulated.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum Protocol {
    /// Longest chain rule: every block weighs one unit.
    #[default]
    Nakamoto,
    /// Heaviest chain rule where blocks weigh the surprise of their proof
    /// (PoEM).
    #[cfg_attr(feature = "cli", value(name = "poem"))]
    EntropyWeighted,
}

impl Protocol {
    /// Work model used by this protocol under security parameter `kappa`.
    pub fn work_model(&self, kappa: u32) -> WorkModel {
        match self {
            Self::Nakamoto => WorkModel::Nakamoto,
            Self::EntropyWeighted => WorkModel::EntropyWeighted { kappa },
        }
    }

    /// Whether per-block work bias (gamma) applies to this protocol.
    pub fn is_biased(&self) -> bool {
        matches!(self, Self::EntropyWeighted)
    }
}

impl Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Nakamoto => write!(f, "Nakamoto"),
            Self::EntropyWeighted => write!(f, "PoEM"),
        }
    }
}

/// Maps proof samples to block weights.
///
/// Two formulations of the entropy-weighted sample are kept side by side:
/// [`WorkModel::EntropyWeighted`] draws the hash uniformly over all `κ` bits,
/// while [`WorkModel::TargetRelative`] draws it uniformly below the mining
/// target. They agree in distribution only up to a constant shift.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum WorkModel {
    /// Unit weight for every valid block.
    #[default]
    Nakamoto,
    /// `κ − log2(sample)` with `sample ~ U(0, 2^κ)`.
    EntropyWeighted { kappa: u32 },
    /// `κ − log2(sample)` with `sample ~ U(0, 2^target_bits)`.
    TargetRelative { kappa: u32, target_bits: f64 },
}

impl WorkModel {
    /// Checks that the parameters of this model describe a valid hash space.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            Self::Nakamoto => Ok(()),
            Self::EntropyWeighted { kappa } => {
                if kappa == 0 {
                    return Err(ConfigError::ZeroKappa);
                }

                Ok(())
            }
            Self::TargetRelative { kappa, target_bits } => {
                if kappa == 0 {
                    return Err(ConfigError::ZeroKappa);
                }
                if target_bits.is_nan()
                    || target_bits <= 0.0
                    || target_bits > kappa as f64
                {
                    return Err(ConfigError::BadTarget(target_bits, kappa));
                }

                Ok(())
            }
        }
    }

    /// Number of bits of the range proof samples are drawn from.
    #[inline]
    fn sample_bits(&self) -> f64 {
        match *self {
            Self::Nakamoto => DEFAULT_KAPPA as f64,
            Self::EntropyWeighted { kappa } => kappa as f64,
            Self::TargetRelative { target_bits, .. } => target_bits,
        }
    }

    /// Draws an independent proof sample for a newly created block.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> WorkSample {
        let u: f64 = Open01.sample(rng);

        WorkSample(u.log2() + self.sample_bits())
    }

    /// Weight contributed by a block with the given proof sample.
    ///
    /// Entropy weights are positive for every sample drawn by
    /// [`WorkModel::sample`]. A sample within one ulp of `2^κ` rounds to zero
    /// weight, which happens with probability below `2^-44`. Samples above
    /// `2^κ` can only be built by hand and weigh zero.
    #[inline]
    pub fn work(&self, sample: WorkSample) -> f64 {
        match *self {
            Self::Nakamoto => 1.0,
            Self::EntropyWeighted { kappa }
            | Self::TargetRelative { kappa, .. } => {
                (kappa as f64 - sample.log2()).max(0.0)
            }
        }
    }

    /// Samples a proof and returns the resulting block weight.
    #[inline]
    pub fn block_work<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.work(self.sample(rng))
    }

    /// Expected weight of a single block.
    pub fn mean_work(&self) -> f64 {
        match *self {
            Self::Nakamoto => 1.0,
            Self::EntropyWeighted { .. } => std::f64::consts::LOG2_E,
            Self::TargetRelative { kappa, target_bits } => {
                kappa as f64 - target_bits + std::f64::consts::LOG2_E
            }
        }
    }
}
