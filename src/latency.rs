//! Monte-Carlo estimation of confirmation latency
//!
//! Every trial samples a private adversarial chain and the best honest chain
//! in continuous time, up to a weight horizon `W`. The confirmation depth of a
//! trial is the lowest weight from which the honest chain stays strictly
//! ahead of the adversary at every integer weight up to `W`. Across trials the
//! depth that all but an `ε` fraction of trials meet is converted into a
//! latency using the mean time honest parties took to reach `W`.

use std::fmt::Display;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
#[cfg(feature = "rayon")]
use rayon::prelude::*;
use serde::Serialize;

use crate::{
    config::SimulationConfig,
    sampler::{AdversaryProcess, HonestProcess},
    work::Protocol,
};

/// Confirmation depth reached by a trial, or the sentinel for a trial in
/// which the adversary was not behind at the horizon. The sentinel orders
/// after every depth.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Confirmation {
    Depth(u64),
    HorizonTooSmall,
}

impl Confirmation {
    /// Returns the depth if one was reached.
    #[inline]
    pub fn depth(&self) -> Option<u64> {
        match *self {
            Self::Depth(k) => Some(k),
            Self::HorizonTooSmall => None,
        }
    }

    #[inline]
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Depth(_))
    }
}

impl Display for Confirmation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Depth(k) => write!(f, "{k}"),
            Self::HorizonTooSmall => write!(f, "inf"),
        }
    }
}

/// For each level `0..=W`, whether the honest parties reached it strictly
/// before the adversary did.
pub fn dominance(honest: &[f64], adversary: &[f64]) -> Vec<bool> {
    honest
        .iter()
        .zip(adversary)
        .map(|(h, a)| h < a)
        .collect()
}

/// Number of levels in `1..=W` at which the honest parties dominate. Equals
/// `W` exactly when they dominate at every level.
pub fn dominated_levels(honest: &[f64], adversary: &[f64]) -> u64 {
    dominance(honest, adversary)
        .into_iter()
        .skip(1)
        .filter(|&d| d)
        .count() as u64
}

/// Finds the lowest level `k` such that the honest parties dominate at every
/// level in `k..=W`, given the level crossing times of both parties for
/// levels `0..=W`.
///
/// Level 0 is shared by both parties at time 0 and never counts, so full
/// dominance yields `Depth(1)`: the suffix of dominated levels starts right
/// after the origin. The count of dominated levels, which is `W` in that
/// case, is given by [`dominated_levels`].
pub fn get_k(honest: &[f64], adversary: &[f64]) -> Confirmation {
    let levels = honest.len().min(adversary.len());

    let mut k = None;
    for w in (1..levels).rev() {
        if honest[w] >= adversary[w] {
            break;
        }
        k = Some(w as u64);
    }

    match k {
        Some(k) => Confirmation::Depth(k),
        None => Confirmation::HorizonTooSmall,
    }
}

/// Returns the `⌈(1−ε)·n⌉`-th smallest confirmation: the smallest value that
/// at least a `1 − ε` fraction of `confirmations` do not exceed. Returns
/// `None` for an empty slice.
pub fn confirmation_quantile(
    confirmations: &[Confirmation],
    epsilon: f64,
) -> Option<Confirmation> {
    if confirmations.is_empty() {
        return None;
    }

    let mut sorted = confirmations.to_vec();
    sorted.sort_unstable();

    let n = sorted.len();
    let rank = ((1.0 - epsilon) * n as f64 - 1e-9).ceil() as usize;

    Some(sorted[rank.clamp(1, n) - 1])
}

/// Outcome of a single trial.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrialResult {
    pub confirmation: Confirmation,
    /// Time at which the honest chain reached the horizon.
    pub completion_time: f64,
    pub honest_work: f64,
    pub honest_height: u64,
    /// Adversarial work at the honest completion time.
    pub adversary_work: f64,
    /// Adversarial height at the honest completion time.
    pub adversary_height: u64,
}

/// Aggregated result of a latency estimate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencyEstimate {
    pub protocol: Protocol,
    pub g: f64,
    pub beta: f64,
    pub gamma: f64,
    pub epsilon: f64,
    pub trials: usize,
    pub horizon: u64,
    /// Confirmation depth met by all but an `ε` fraction of trials.
    pub confirmation: Confirmation,
    /// Expected time to confirm a block at the selected depth. Infinite when
    /// the horizon was too small.
    pub latency: f64,
    pub mean_completion_time: f64,
    pub mean_honest_work: f64,
    pub mean_honest_height: f64,
    pub mean_adversary_work: f64,
    pub mean_adversary_height: f64,
    /// Honest chain work per unit of time.
    pub throughput: f64,
    /// Number of trials ending with [`Confirmation::HorizonTooSmall`].
    pub failures: usize,
}

impl LatencyEstimate {
    /// Aggregates the results of independent trials run under `config`.
    ///
    /// ## Panics
    /// If `trials` is empty.
    pub fn from_trials(
        config: &SimulationConfig,
        trials: &[TrialResult],
    ) -> Self {
        assert!(!trials.is_empty(), "cannot aggregate zero trials");

        let n = trials.len() as f64;
        let mean = |f: fn(&TrialResult) -> f64| {
            trials.iter().map(f).sum::<f64>() / n
        };

        let confirmations: Vec<_> =
            trials.iter().map(|t| t.confirmation).collect();
        let confirmation =
            confirmation_quantile(&confirmations, config.epsilon())
                .unwrap_or(Confirmation::HorizonTooSmall);

        let mean_completion_time = mean(|t| t.completion_time);
        let mean_honest_work = mean(|t| t.honest_work);
        let latency = match confirmation {
            Confirmation::Depth(k) => {
                k as f64 * mean_completion_time / config.horizon() as f64
            }
            Confirmation::HorizonTooSmall => f64::INFINITY,
        };

        LatencyEstimate {
            protocol: config.protocol(),
            g: config.g(),
            beta: config.beta(),
            gamma: config.bias(),
            epsilon: config.epsilon(),
            trials: trials.len(),
            horizon: config.horizon(),
            confirmation,
            latency,
            mean_completion_time,
            mean_honest_work,
            mean_honest_height: mean(|t| t.honest_height as f64),
            mean_adversary_work: mean(|t| t.adversary_work),
            mean_adversary_height: mean(|t| t.adversary_height as f64),
            throughput: mean_honest_work / mean_completion_time,
            failures: confirmations
                .iter()
                .filter(|c| !c.is_confirmed())
                .count(),
        }
    }
}

/// Runs latency trials for a single [`SimulationConfig`].
#[derive(Debug, Clone)]
pub struct LatencyEstimator {
    config: SimulationConfig,
}

impl LatencyEstimator {
    pub fn new(config: SimulationConfig) -> Self {
        LatencyEstimator { config }
    }

    #[inline]
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Random stream owned by trial `trial`.
    pub fn trial_rng(&self, trial: usize) -> ChaCha8Rng {
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed());
        rng.set_stream(trial as u64);

        rng
    }

    fn honest_process(&self) -> HonestProcess {
        let config = &self.config;

        HonestProcess {
            rate: config.honest_rate(),
            delay: config.delay(),
            work_model: config.work_model(),
            bias: config.bias(),
        }
    }

    fn adversary_process(&self) -> AdversaryProcess {
        let config = &self.config;

        AdversaryProcess {
            rate: config.adversary_rate(),
            work_model: config.work_model(),
            bias: config.bias(),
        }
    }

    /// Runs trial number `trial`. The same trial of two estimators sharing a
    /// seed draws the same random numbers.
    pub fn run_trial(&self, trial: usize) -> TrialResult {
        let horizon = self.config.horizon();
        let mut rng = self.trial_rng(trial);

        let adversary = self.adversary_process();
        let base = AdversaryProcess::sample_base(
            adversary.work_model,
            horizon as f64,
            &mut rng,
        );
        let adversary = adversary.scale(&base);
        let honest = self.honest_process().sample(horizon as f64, &mut rng);

        let confirmation = get_k(
            &honest.level_times(horizon),
            &adversary.level_times(horizon),
        );

        let completion_time = honest.completion_time(horizon);
        let honest_tip = honest.last();
        let adversary_tip = adversary.progress_at(completion_time);

        log::trace!(
            "trial {trial}: {confirmation} at time {completion_time:.3}"
        );

        TrialResult {
            confirmation,
            completion_time,
            honest_work: honest_tip.work,
            honest_height: honest_tip.height,
            adversary_work: adversary_tip.work,
            adversary_height: adversary_tip.height,
        }
    }

    /// Runs every configured trial, returning results in trial order.
    pub fn run_trials(&self) -> Vec<TrialResult> {
        let trials = self.config.trials();

        #[cfg(feature = "rayon")]
        let results = (0..trials)
            .into_par_iter()
            .map(|i| self.run_trial(i))
            .collect();
        #[cfg(not(feature = "rayon"))]
        let results = (0..trials).map(|i| self.run_trial(i)).collect();

        results
    }

    /// Runs every trial and aggregates the results.
    pub fn estimate(&self) -> LatencyEstimate {
        let estimate =
            LatencyEstimate::from_trials(&self.config, &self.run_trials());

        log::debug!(
            "{} g={} beta={} gamma={}: k={} latency={:.4} ({} failures)",
            estimate.protocol,
            estimate.g,
            estimate.beta,
            estimate.gamma,
            estimate.confirmation,
            estimate.latency,
            estimate.failures,
        );

        estimate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INF: f64 = f64::INFINITY;

    #[test]
    fn full_dominance_confirms_from_first_level() {
        let honest = [0.0, 1.0, 2.0, 3.0, 4.0];
        let adversary = [0.0, 1.5, 2.5, INF, INF];

        assert_eq!(get_k(&honest, &adversary), Confirmation::Depth(1));
        assert_eq!(dominated_levels(&honest, &adversary), 4);
        assert!(!dominance(&honest, &adversary)[0]);
    }

    #[test]
    fn adversary_ahead_at_horizon() {
        let honest = [0.0, 1.0, 2.0, 3.0, 4.0];
        let adversary = [0.0, 1.5, 2.5, 3.5, 3.9];

        assert_eq!(
            get_k(&honest, &adversary),
            Confirmation::HorizonTooSmall
        );
        assert_eq!(dominated_levels(&honest, &adversary), 3);
    }

    #[test]
    fn last_catch_up_sets_depth() {
        let honest = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let adversary = [0.0, 0.5, 2.5, 3.0, 6.0, 7.0];

        // Ties do not count as dominance
        assert_eq!(get_k(&honest, &adversary), Confirmation::Depth(4));
    }

    #[test]
    fn confirmations_order_sentinel_last() {
        let mut confirmations = vec![
            Confirmation::HorizonTooSmall,
            Confirmation::Depth(7),
            Confirmation::Depth(2),
        ];
        confirmations.sort();

        assert_eq!(
            confirmations,
            vec![
                Confirmation::Depth(2),
                Confirmation::Depth(7),
                Confirmation::HorizonTooSmall
            ]
        );
    }

    #[test]
    fn quantile_of_ten_trials() {
        let confirmations: Vec<_> =
            (1..=10).rev().map(Confirmation::Depth).collect();

        assert_eq!(
            confirmation_quantile(&confirmations, 0.1),
            Some(Confirmation::Depth(9))
        );
        assert_eq!(
            confirmation_quantile(&confirmations, 0.5),
            Some(Confirmation::Depth(5))
        );
        assert_eq!(
            confirmation_quantile(&confirmations, 0.99),
            Some(Confirmation::Depth(1))
        );
        assert_eq!(confirmation_quantile(&[], 0.1), None);
    }

    #[test]
    fn quantile_with_repeated_values() {
        let mut confirmations = vec![Confirmation::Depth(3); 8];
        confirmations.push(Confirmation::Depth(5));
        confirmations.push(Confirmation::HorizonTooSmall);

        assert_eq!(
            confirmation_quantile(&confirmations, 0.1),
            Some(Confirmation::Depth(5))
        );
        assert_eq!(
            confirmation_quantile(&confirmations, 0.05),
            Some(Confirmation::HorizonTooSmall)
        );
    }

    #[test]
    fn aggregate_latency() {
        let config = SimulationConfig::builder()
            .g(1.0)
            .beta(0.2)
            .horizon(10)
            .epsilon(0.5)
            .build()
            .unwrap();
        let trial = |k, completion_time| TrialResult {
            confirmation: Confirmation::Depth(k),
            completion_time,
            honest_work: 10.0,
            honest_height: 10,
            adversary_work: 2.0,
            adversary_height: 2,
        };

        let estimate = LatencyEstimate::from_trials(
            &config,
            &[trial(2, 18.0), trial(4, 22.0)],
        );

        assert_eq!(estimate.confirmation, Confirmation::Depth(2));
        assert!((estimate.latency - 4.0).abs() < 1e-12);
        assert!((estimate.throughput - 0.5).abs() < 1e-12);
        assert_eq!(estimate.failures, 0);
    }

    #[test]
    fn entropy_weighted_estimate_is_reproducible() {
        let config = SimulationConfig::builder()
            .g(0.7)
            .beta(0.3)
            .protocol(Protocol::EntropyWeighted)
            .trials(1000)
            .horizon(400)
            .seed(0x5eed)
            .build()
            .unwrap();

        let first = LatencyEstimator::new(config.clone()).estimate();
        let second = LatencyEstimator::new(config).estimate();

        assert!(first.latency.is_finite());
        let k = first.confirmation.depth().expect("finite confirmation");
        assert!((1..=400).contains(&k));
        assert_eq!(first, second);
        assert_eq!(first.latency.to_bits(), second.latency.to_bits());
    }

    #[test]
    fn trials_own_independent_streams() {
        let base = SimulationConfig::builder()
            .g(0.5)
            .beta(0.25)
            .horizon(50)
            .trials(4)
            .seed(3);

        let slow = LatencyEstimator::new(base.clone().build().unwrap());
        let fast = LatencyEstimator::new(base.g(1.0).build().unwrap());

        assert_eq!(slow.run_trial(2), slow.run_trial(2));
        assert_ne!(slow.run_trial(1), slow.run_trial(2));
        assert_ne!(
            slow.run_trial(2).completion_time,
            fast.run_trial(2).completion_time
        );
        assert_eq!(slow.run_trials()[2], slow.run_trial(2));
    }

    #[test]
    fn powerless_adversary_confirms_immediately() {
        let config = SimulationConfig::builder()
            .g(1.0)
            .beta(0.0)
            .horizon(30)
            .trials(20)
            .build()
            .unwrap();

        let estimate = LatencyEstimator::new(config).estimate();
        assert_eq!(estimate.confirmation, Confirmation::Depth(1));
        assert_eq!(estimate.mean_adversary_work, 0.0);
        assert_eq!(estimate.failures, 0);
    }
}
