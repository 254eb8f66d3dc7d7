//! Validated simulation parameters

use std::num::NonZeroUsize;

use serde::Serialize;

use crate::work::{Protocol, WorkModel, DEFAULT_KAPPA};

/// Default number of Monte-Carlo trials per estimate.
pub const DEFAULT_TRIALS: usize = 1000;
/// Default error tolerance.
pub const DEFAULT_EPSILON: f64 = 0.1;
/// Default maximum chain weight simulated per trial.
pub const DEFAULT_HORIZON: u64 = 600;
/// Default network delay, in the same units as `1 / g`.
pub const DEFAULT_DELAY: f64 = 1.0;

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("adversarial ratio {0} is not in the range 0.0..1.0")]
    BadBeta(f64),
    #[error("honest mining rate {0} must be positive and finite")]
    NonPositiveRate(f64),
    #[error("error tolerance {0} is not in the range (0.0, 1.0)")]
    BadEpsilon(f64),
    #[error("work bias {0} must be non-negative and finite")]
    NegativeBias(f64),
    #[error("network delay {0} must be positive and finite")]
    NonPositiveDelay(f64),
    #[error("number of trials must be greater than 0")]
    ZeroTrials,
    #[error("weight horizon must be greater than 0")]
    ZeroHorizon,
    #[error("security parameter kappa must be greater than 0")]
    ZeroKappa,
    #[error("target of {0} bits is not valid for a {1}-bit hash")]
    BadTarget(f64, u32),
    #[error("{0} corrupted parties leave no honest party among {1}")]
    TooManyCorrupted(u64, u64),
    #[error("round success probability {0} is not in the range (0.0, 1.0)")]
    BadRoundSuccess(f64),
    #[error("parties must be allowed at least one query per round")]
    ZeroQueries,
    #[error("{0} corrupted parties with {1} queries each overflows")]
    QueryOverflow(u64, u64),
    #[error("parameter range is empty")]
    EmptyRange,
}

/// Immutable parameters of a latency estimate. Created through
/// [`SimulationConfig::builder`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationConfig {
    g: f64,
    beta: f64,
    gamma: f64,
    epsilon: f64,
    trials: NonZeroUsize,
    horizon: u64,
    protocol: Protocol,
    seed: u64,
    delay: f64,
    kappa: u32,
    work_model: Option<WorkModel>,
}

impl SimulationConfig {
    pub fn builder() -> SimulationConfigBuilder {
        SimulationConfigBuilder::new()
    }

    /// Expected number of honest blocks mined per network delay.
    #[inline]
    pub fn g(&self) -> f64 {
        self.g
    }

    /// Fraction of total mining power held by the adversary.
    #[inline]
    pub fn beta(&self) -> f64 {
        self.beta
    }

    /// Requested per-block work bias. See [`SimulationConfig::bias`] for the
    /// value actually applied.
    #[inline]
    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    #[inline]
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    #[inline]
    pub fn trials(&self) -> usize {
        self.trials.get()
    }

    /// Maximum chain weight `W` simulated in each trial.
    #[inline]
    pub fn horizon(&self) -> u64 {
        self.horizon
    }

    #[inline]
    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    #[inline]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    #[inline]
    pub fn delay(&self) -> f64 {
        self.delay
    }

    #[inline]
    pub fn kappa(&self) -> u32 {
        self.kappa
    }

    /// Work model used to weigh blocks. An explicit override wins over the
    /// protocol default.
    pub fn work_model(&self) -> WorkModel {
        self.work_model
            .unwrap_or_else(|| self.protocol.work_model(self.kappa))
    }

    /// Honest blocks per unit of time.
    #[inline]
    pub fn honest_rate(&self) -> f64 {
        self.g / self.delay
    }

    /// Adversarial blocks per unit of time, `g·β/(1−β)` per network delay.
    #[inline]
    pub fn adversary_rate(&self) -> f64 {
        self.honest_rate() * self.beta / (1.0 - self.beta)
    }

    /// Work added to every block. Zero unless the protocol is weighted.
    #[inline]
    pub fn bias(&self) -> f64 {
        if self.protocol.is_biased() {
            self.gamma
        } else {
            0.0
        }
    }

    /// Builder pre-filled with every parameter of this config.
    pub fn to_builder(&self) -> SimulationConfigBuilder {
        SimulationConfigBuilder {
            g: Some(self.g),
            beta: Some(self.beta),
            gamma: Some(self.gamma),
            epsilon: Some(self.epsilon),
            trials: Some(self.trials.get()),
            horizon: Some(self.horizon),
            protocol: Some(self.protocol),
            seed: Some(self.seed),
            delay: Some(self.delay),
            kappa: Some(self.kappa),
            work_model: self.work_model,
        }
    }
}

/// Builds a [`SimulationConfig`]. The honest rate `g` and adversarial ratio
/// `beta` must be given; every other parameter has a default.
#[derive(Debug, Default, Clone)]
pub struct SimulationConfigBuilder {
    pub g: Option<f64>,
    pub beta: Option<f64>,
    pub gamma: Option<f64>,
    pub epsilon: Option<f64>,
    pub trials: Option<usize>,
    pub horizon: Option<u64>,
    pub protocol: Option<Protocol>,
    pub seed: Option<u64>,
    pub delay: Option<f64>,
    pub kappa: Option<u32>,
    pub work_model: Option<WorkModel>,
}

impl SimulationConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the honest block rate per network delay.
    pub fn g(mut self, g: f64) -> Self {
        self.g = Some(g);

        self
    }

    /// Sets the adversarial fraction of mining power.
    pub fn beta(mut self, beta: f64) -> Self {
        self.beta = Some(beta);

        self
    }

    /// Sets the per-block work bias (default 0).
    pub fn gamma(mut self, gamma: f64) -> Self {
        self.gamma = Some(gamma);

        self
    }

    /// Sets the tolerated fraction of failing trials (default 0.1).
    pub fn epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = Some(epsilon);

        self
    }

    /// Sets the number of Monte-Carlo trials (default 1000).
    pub fn trials(mut self, trials: usize) -> Self {
        self.trials = Some(trials);

        self
    }

    /// Sets the maximum chain weight simulated per trial (default 600).
    pub fn horizon(mut self, horizon: u64) -> Self {
        self.horizon = Some(horizon);

        self
    }

    pub fn protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = Some(protocol);

        self
    }

    /// Sets the seed every trial stream is derived from (default 0).
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);

        self
    }

    /// Sets the network delay (default 1).
    pub fn delay(mut self, delay: f64) -> Self {
        self.delay = Some(delay);

        self
    }

    /// Sets the hash length used by entropy-weighted work (default 256).
    pub fn kappa(mut self, kappa: u32) -> Self {
        self.kappa = Some(kappa);

        self
    }

    /// Overrides the work model implied by the protocol.
    pub fn work_model(mut self, work_model: WorkModel) -> Self {
        self.work_model = Some(work_model);

        self
    }

    /// Creates a [`SimulationConfig`] from the specified parameters.
    pub fn build(self) -> Result<SimulationConfig, ConfigError> {
        use ConfigError::*;

        let SimulationConfigBuilder {
            g,
            beta,
            gamma,
            epsilon,
            trials,
            horizon,
            protocol,
            seed,
            delay,
            kappa,
            work_model,
        } = self;

        let g = g.unwrap_or(f64::NAN);
        if !(g.is_finite() && g > 0.0) {
            return Err(NonPositiveRate(g));
        }

        let beta = beta.unwrap_or(f64::NAN);
        if !(0.0..1.0).contains(&beta) {
            return Err(BadBeta(beta));
        }

        let gamma = gamma.unwrap_or(0.0);
        if !(gamma.is_finite() && gamma >= 0.0) {
            return Err(NegativeBias(gamma));
        }

        let epsilon = epsilon.unwrap_or(DEFAULT_EPSILON);
        if !(epsilon > 0.0 && epsilon < 1.0) {
            return Err(BadEpsilon(epsilon));
        }

        let delay = delay.unwrap_or(DEFAULT_DELAY);
        if !(delay.is_finite() && delay > 0.0) {
            return Err(NonPositiveDelay(delay));
        }

        let trials = NonZeroUsize::new(trials.unwrap_or(DEFAULT_TRIALS))
            .ok_or(ZeroTrials)?;
        let horizon = match horizon {
            Some(0) => return Err(ZeroHorizon),
            Some(x) => x,
            None => DEFAULT_HORIZON,
        };

        let protocol = protocol.unwrap_or_default();
        let kappa = kappa.unwrap_or(DEFAULT_KAPPA);
        protocol.work_model(kappa).validate()?;
        if let Some(model) = work_model {
            model.validate()?;
        }

        Ok(SimulationConfig {
            g,
            beta,
            gamma,
            epsilon,
            trials,
            horizon,
            protocol,
            seed: seed.unwrap_or_default(),
            delay,
            kappa,
            work_model,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> SimulationConfigBuilder {
        SimulationConfig::builder().g(0.7).beta(0.3)
    }

    #[test]
    fn example_build() {
        let config = base().build().expect("valid config build");

        assert_eq!(config.trials(), DEFAULT_TRIALS);
        assert_eq!(config.horizon(), DEFAULT_HORIZON);
        assert_eq!(config.delay(), 1.0);
        assert_eq!(config.kappa(), 256);
        assert_eq!(config.protocol(), Protocol::Nakamoto);
        assert_eq!(config.work_model(), WorkModel::Nakamoto);
        assert!((config.adversary_rate() - 0.3).abs() < 1e-12);
    }

    #[test]
    fn rejects_invalid_parameters() {
        use ConfigError::*;

        assert_eq!(base().beta(1.0).build(), Err(BadBeta(1.0)));
        assert_eq!(base().beta(-0.1).build(), Err(BadBeta(-0.1)));
        assert_eq!(base().g(0.0).build(), Err(NonPositiveRate(0.0)));
        assert_eq!(base().epsilon(0.0).build(), Err(BadEpsilon(0.0)));
        assert_eq!(base().epsilon(1.0).build(), Err(BadEpsilon(1.0)));
        assert_eq!(base().gamma(-1.0).build(), Err(NegativeBias(-1.0)));
        assert_eq!(base().delay(0.0).build(), Err(NonPositiveDelay(0.0)));
        assert_eq!(base().trials(0).build(), Err(ZeroTrials));
        assert_eq!(base().horizon(0).build(), Err(ZeroHorizon));
        assert_eq!(
            base().protocol(Protocol::EntropyWeighted).kappa(0).build(),
            Err(ZeroKappa)
        );
        assert!(matches!(
            SimulationConfig::builder().beta(0.3).build(),
            Err(NonPositiveRate(_))
        ));
        assert!(matches!(
            SimulationConfig::builder().g(1.0).build(),
            Err(BadBeta(_))
        ));
    }

    #[test]
    fn bias_only_applies_to_weighted_protocol() {
        let nakamoto = base().gamma(3.0).build().unwrap();
        assert_eq!(nakamoto.bias(), 0.0);

        let poem = base()
            .gamma(3.0)
            .protocol(Protocol::EntropyWeighted)
            .build()
            .unwrap();
        assert_eq!(poem.bias(), 3.0);
        assert_eq!(
            poem.work_model(),
            WorkModel::EntropyWeighted { kappa: 256 }
        );
    }

    #[test]
    fn to_builder_round_trips() {
        let config = base()
            .protocol(Protocol::EntropyWeighted)
            .gamma(2.0)
            .seed(99)
            .trials(17)
            .build()
            .unwrap();

        assert_eq!(config.to_builder().build(), Ok(config.clone()));
        assert_eq!(config.to_builder().g(1.5).build().unwrap().g(), 1.5);
    }
}
