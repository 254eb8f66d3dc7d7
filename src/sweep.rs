//! Parameter sweeps over latency estimates
//!
//! A sweep walks one parameter axis and, at each point, searches the
//! remaining free parameters for the operating point with the lowest latency.
//! Every estimate of a sweep is seeded identically, so points are compared on
//! common random numbers.

use serde::{Deserialize, Serialize};

use crate::{
    config::{ConfigError, SimulationConfig, SimulationConfigBuilder},
    latency::{LatencyEstimate, LatencyEstimator},
    work::Protocol,
};

/// Parameter that indexes the output of a sweep.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum SweepAxis {
    /// Adversarial ratio; the best `g` and `γ` are found per point.
    #[default]
    Beta,
    /// Honest rate at a single `β`; the best `γ` is found per point.
    G,
    /// Work bias at a single `β`; the best `g` is found per point.
    Gamma,
}

impl std::fmt::Display for SweepAxis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Beta => write!(f, "beta"),
            Self::G => write!(f, "g"),
            Self::Gamma => write!(f, "gamma"),
        }
    }
}

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum SweepError {
    #[error("a sweep over {0} needs exactly one beta, got {1}")]
    MultipleBetas(SweepAxis, usize),
    #[error("work bias has no effect on Nakamoto consensus")]
    UnbiasedGammaAxis,
    #[error("a sweep over {0} has no points")]
    EmptyAxis(SweepAxis),
    #[error(transparent)]
    ConfigError(#[from] ConfigError),
}

/// Results of a sweep as parallel arrays, one entry per axis point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepRecord {
    pub protocol: Protocol,
    pub axis: SweepAxis,
    pub epsilon: f64,
    pub trials: usize,
    pub horizon: u64,
    pub seed: u64,
    /// Value of the swept parameter at each point.
    pub axis_values: Vec<f64>,
    pub beta: Vec<f64>,
    pub latency: Vec<f64>,
    pub optimal_g: Vec<f64>,
    pub optimal_gamma: Vec<f64>,
    pub optimal_k: Vec<Option<u64>>,
    pub throughput: Vec<f64>,
    pub completion_time: Vec<f64>,
    pub honest_work: Vec<f64>,
    pub honest_height: Vec<f64>,
    pub adversary_work: Vec<f64>,
    pub adversary_height: Vec<f64>,
}

impl SweepRecord {
    fn new(sweep: &ParameterSweep) -> Self {
        SweepRecord {
            protocol: sweep.protocol,
            axis: sweep.axis,
            epsilon: sweep.base.epsilon(),
            trials: sweep.base.trials(),
            horizon: sweep.base.horizon(),
            seed: sweep.base.seed(),
            axis_values: vec![],
            beta: vec![],
            latency: vec![],
            optimal_g: vec![],
            optimal_gamma: vec![],
            optimal_k: vec![],
            throughput: vec![],
            completion_time: vec![],
            honest_work: vec![],
            honest_height: vec![],
            adversary_work: vec![],
            adversary_height: vec![],
        }
    }

    fn push(&mut self, axis_value: f64, best: &LatencyEstimate) {
        self.axis_values.push(axis_value);
        self.beta.push(best.beta);
        self.latency.push(best.latency);
        self.optimal_g.push(best.g);
        self.optimal_gamma.push(best.gamma);
        self.optimal_k.push(best.confirmation.depth());
        self.throughput.push(best.throughput);
        self.completion_time.push(best.mean_completion_time);
        self.honest_work.push(best.mean_honest_work);
        self.honest_height.push(best.mean_honest_height);
        self.adversary_work.push(best.mean_adversary_work);
        self.adversary_height.push(best.mean_adversary_height);
    }

    /// Number of axis points in the record.
    #[inline]
    pub fn len(&self) -> usize {
        self.axis_values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.axis_values.is_empty()
    }
}

/// Both protocols swept over the same adversarial ratios.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRecord {
    pub beta: Vec<f64>,
    pub nakamoto: SweepRecord,
    pub entropy_weighted: SweepRecord,
    /// Nakamoto latency divided by entropy-weighted latency, per `β`.
    pub speedup: Vec<f64>,
}

/// Builds a [`ParameterSweep`].
#[derive(Debug, Default, Clone)]
pub struct ParameterSweepBuilder {
    pub protocol: Option<Protocol>,
    pub axis: Option<SweepAxis>,
    pub betas: Vec<f64>,
    pub gs: Vec<f64>,
    pub gammas: Vec<f64>,
    config: SimulationConfigBuilder,
}

impl ParameterSweepBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = Some(protocol);

        self
    }

    /// Sets the parameter indexing the output ([`SweepAxis::Beta`] otherwise).
    pub fn axis(mut self, axis: SweepAxis) -> Self {
        self.axis = Some(axis);

        self
    }

    /// Adds a single adversarial ratio.
    pub fn beta(mut self, beta: f64) -> Self {
        self.betas.push(beta);

        self
    }

    pub fn betas<I: IntoIterator<Item = f64>>(mut self, betas: I) -> Self {
        self.betas.extend(betas);

        self
    }

    /// Adds a single honest rate.
    pub fn g(mut self, g: f64) -> Self {
        self.gs.push(g);

        self
    }

    pub fn gs<I: IntoIterator<Item = f64>>(mut self, gs: I) -> Self {
        self.gs.extend(gs);

        self
    }

    /// Adds a single work bias. Ignored under [`Protocol::Nakamoto`].
    pub fn gamma(mut self, gamma: f64) -> Self {
        self.gammas.push(gamma);

        self
    }

    pub fn gammas<I: IntoIterator<Item = f64>>(mut self, gammas: I) -> Self {
        self.gammas.extend(gammas);

        self
    }

    pub fn epsilon(mut self, epsilon: f64) -> Self {
        self.config = self.config.epsilon(epsilon);

        self
    }

    pub fn trials(mut self, trials: usize) -> Self {
        self.config = self.config.trials(trials);

        self
    }

    pub fn horizon(mut self, horizon: u64) -> Self {
        self.config = self.config.horizon(horizon);

        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config = self.config.seed(seed);

        self
    }

    pub fn delay(mut self, delay: f64) -> Self {
        self.config = self.config.delay(delay);

        self
    }

    pub fn kappa(mut self, kappa: u32) -> Self {
        self.config = self.config.kappa(kappa);

        self
    }

    /// Creates a [`ParameterSweep`], validating every grid value.
    pub fn build(self) -> Result<ParameterSweep, SweepError> {
        let ParameterSweepBuilder {
            protocol,
            axis,
            betas,
            gs,
            mut gammas,
            config,
        } = self;

        let protocol = protocol.unwrap_or_default();
        let axis = axis.unwrap_or_default();

        if axis != SweepAxis::Beta && betas.len() != 1 {
            return Err(SweepError::MultipleBetas(axis, betas.len()));
        }
        if !protocol.is_biased() && axis == SweepAxis::Gamma {
            return Err(SweepError::UnbiasedGammaAxis);
        }
        let axis_len = match axis {
            SweepAxis::Beta => betas.len(),
            SweepAxis::G => gs.len(),
            SweepAxis::Gamma => gammas.len(),
        };
        if axis_len == 0 {
            return Err(SweepError::EmptyAxis(axis));
        }
        if gammas.is_empty() {
            gammas = vec![0.0];
        }
        if betas.is_empty() || gs.is_empty() {
            return Err(ConfigError::EmptyRange.into());
        }

        // Validate the whole grid up front
        let template = config.protocol(protocol);
        for &beta in &betas {
            for &g in &gs {
                for &gamma in &gammas {
                    template.clone().g(g).beta(beta).gamma(gamma).build()?;
                }
            }
        }
        let base = template
            .clone()
            .g(gs[0])
            .beta(betas[0])
            .gamma(gammas[0])
            .build()?;

        Ok(ParameterSweep {
            protocol,
            axis,
            betas,
            gs,
            gammas,
            base,
        })
    }
}

/// A grid of operating points to estimate latency over. Run with
/// [`ParameterSweep::run`] or [`ParameterSweep::compare`].
#[derive(Debug, Clone)]
pub struct ParameterSweep {
    protocol: Protocol,
    axis: SweepAxis,
    betas: Vec<f64>,
    gs: Vec<f64>,
    gammas: Vec<f64>,
    /// Configuration shared by every point, up to `g`, `β` and `γ`.
    base: SimulationConfig,
}

impl ParameterSweep {
    pub fn builder() -> ParameterSweepBuilder {
        ParameterSweepBuilder::new()
    }

    #[inline]
    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    #[inline]
    pub fn axis(&self) -> SweepAxis {
        self.axis
    }

    /// Work biases searched at each point. Only zero for unbiased protocols.
    fn effective_gammas(&self) -> Vec<f64> {
        if self.protocol.is_biased() {
            self.gammas.clone()
        } else {
            vec![0.0]
        }
    }

    fn config(
        &self,
        g: f64,
        beta: f64,
        gamma: f64,
    ) -> Result<SimulationConfig, ConfigError> {
        self.base.to_builder().g(g).beta(beta).gamma(gamma).build()
    }

    /// Lowest-latency estimate over every combination of `gs` and `gammas`.
    ///
    /// For each `γ`, honest rates are scanned with [`scan_rates`].
    fn optimize(
        &self,
        beta: f64,
        gs: &[f64],
        gammas: &[f64],
    ) -> Result<LatencyEstimate, SweepError> {
        let mut gs = gs.to_vec();
        gs.sort_by(f64::total_cmp);

        let mut best: Option<LatencyEstimate> = None;
        for &gamma in gammas {
            let candidate = scan_rates(&gs, |g| {
                let config = self.config(g, beta, gamma)?;
                Ok(LatencyEstimator::new(config).estimate())
            })?;

            match (&best, candidate) {
                (Some(b), Some(c)) if b.latency <= c.latency => (),
                (_, Some(c)) => best = Some(c),
                (_, None) => (),
            }
        }

        best.ok_or(SweepError::ConfigError(ConfigError::EmptyRange))
    }

    /// Estimates the optimal latency at every point of the axis.
    pub fn run(&self) -> Result<SweepRecord, SweepError> {
        let mut record = SweepRecord::new(self);

        let points: Vec<f64> = match self.axis {
            SweepAxis::Beta => self.betas.clone(),
            SweepAxis::G => self.gs.clone(),
            SweepAxis::Gamma => self.gammas.clone(),
        };

        let gammas = self.effective_gammas();
        for (i, &x) in points.iter().enumerate() {
            let best = match self.axis {
                SweepAxis::Beta => self.optimize(x, &self.gs, &gammas)?,
                SweepAxis::G => self.optimize(self.betas[0], &[x], &gammas)?,
                SweepAxis::Gamma => {
                    self.optimize(self.betas[0], &self.gs, &[x])?
                }
            };

            log::info!(
                "[{}/{}] {} {}={}: latency={:.4} k={} g={} gamma={}",
                i + 1,
                points.len(),
                self.protocol,
                self.axis,
                x,
                best.latency,
                best.confirmation,
                best.g,
                best.gamma,
            );
            record.push(x, &best);
        }

        Ok(record)
    }

    /// Sweeps both protocols over the `β` values of this sweep, sharing every
    /// other parameter.
    pub fn compare(&self) -> Result<ComparisonRecord, SweepError> {
        let with_protocol = |protocol: Protocol| {
            let base = self.base.to_builder().protocol(protocol).build()?;

            Ok::<_, SweepError>(ParameterSweep {
                protocol,
                axis: SweepAxis::Beta,
                betas: self.betas.clone(),
                gs: self.gs.clone(),
                gammas: self.gammas.clone(),
                base,
            })
        };

        let nakamoto = with_protocol(Protocol::Nakamoto)?.run()?;
        let entropy_weighted = with_protocol(Protocol::EntropyWeighted)?.run()?;

        let speedup = nakamoto
            .latency
            .iter()
            .zip(&entropy_weighted.latency)
            .map(|(n, e)| n / e)
            .collect();

        Ok(ComparisonRecord {
            beta: self.betas.clone(),
            nakamoto,
            entropy_weighted,
            speedup,
        })
    }
}

/// Estimates each honest rate of `gs` in order and returns the estimate with
/// the lowest latency, the first one on ties. The scan stops at the first
/// infinite latency following a finite one, and later rates are never
/// estimated.
fn scan_rates<F>(
    gs: &[f64],
    mut estimate: F,
) -> Result<Option<LatencyEstimate>, SweepError>
where
    F: FnMut(f64) -> Result<LatencyEstimate, SweepError>,
{
    let mut best: Option<LatencyEstimate> = None;
    let mut seen_finite = false;

    for &g in gs {
        let estimate = estimate(g)?;

        if estimate.latency.is_finite() {
            seen_finite = true;
        } else if seen_finite {
            log::debug!(
                "{} beta={} gamma={}: latency diverged at g={g}, skipping \
                 larger g",
                estimate.protocol,
                estimate.beta,
                estimate.gamma,
            );
            break;
        }

        match &best {
            Some(b) if b.latency <= estimate.latency => (),
            _ => best = Some(estimate),
        }
    }

    Ok(best)
}

/// `points` evenly spaced values from `start` to `end` inclusive.
pub fn linear_range(
    start: f64,
    end: f64,
    points: usize,
) -> Result<Vec<f64>, ConfigError> {
    match points {
        0 => Err(ConfigError::EmptyRange),
        1 => Ok(vec![start]),
        n => Ok((0..n)
            .map(|i| start + (end - start) * (i as f64 / (n - 1) as f64))
            .collect()),
    }
}

/// `points` values from `start` to `end` inclusive, spaced geometrically
/// after warping the position of each point by `exponent`. Values cluster
/// towards `start` for exponents below 1. A zero `start` is kept as the
/// first value, with the geometric spacing anchored just above it.
pub fn log_spaced_range(
    start: f64,
    end: f64,
    points: usize,
    exponent: f64,
) -> Result<Vec<f64>, ConfigError> {
    const ZERO_OFFSET: f64 = 0.005;

    if points == 0 {
        return Err(ConfigError::EmptyRange);
    }
    if points == 1 {
        return Ok(vec![start]);
    }

    let anchor = if start == 0.0 { ZERO_OFFSET } else { start };
    let mut range: Vec<f64> = (0..points)
        .map(|i| {
            let fraction = (i as f64 / (points - 1) as f64).powf(exponent);
            anchor * (end / anchor).powf(fraction)
        })
        .collect();

    if start == 0.0 {
        range[0] = 0.0;
    }

    Ok(range)
}

/// [`log_spaced_range`] with square-root warping.
#[inline]
pub fn sqrt_spaced_range(
    start: f64,
    end: f64,
    points: usize,
) -> Result<Vec<f64>, ConfigError> {
    log_spaced_range(start, end, points, 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::latency::Confirmation;

    fn quick() -> ParameterSweepBuilder {
        ParameterSweep::builder()
            .trials(60)
            .horizon(40)
            .seed(11)
    }

    #[test]
    fn ranges() {
        assert_eq!(linear_range(0.1, 0.3, 3).unwrap().len(), 3);
        assert_eq!(linear_range(1.0, 2.0, 1), Ok(vec![1.0]));
        assert_eq!(linear_range(1.0, 2.0, 0), Err(ConfigError::EmptyRange));

        let r = sqrt_spaced_range(1.0, 100.0, 5).unwrap();
        assert_eq!(r[0], 1.0);
        assert!((r[4] - 100.0).abs() < 1e-9);
        assert!(r.windows(2).all(|w| w[0] < w[1]));
        // A quarter of the way along is already half way in log scale
        assert!((r[1] - 10f64.powf(1.0)).abs() < 1e-9);

        let z = sqrt_spaced_range(0.0, 10.0, 4).unwrap();
        assert_eq!(z[0], 0.0);
        assert!(z[1] > 0.005);
    }

    #[test]
    fn rejects_invalid_grids() {
        assert_eq!(
            quick().axis(SweepAxis::G).g(1.0).build().unwrap_err(),
            SweepError::MultipleBetas(SweepAxis::G, 0)
        );
        assert_eq!(
            quick().g(1.0).build().unwrap_err(),
            SweepError::EmptyAxis(SweepAxis::Beta)
        );
        assert_eq!(
            quick()
                .axis(SweepAxis::Gamma)
                .beta(0.2)
                .g(1.0)
                .build()
                .unwrap_err(),
            SweepError::UnbiasedGammaAxis
        );
        assert_eq!(
            quick().beta(0.2).build().unwrap_err(),
            SweepError::ConfigError(ConfigError::EmptyRange)
        );
        assert_eq!(
            quick().beta(0.2).beta(1.2).g(1.0).build().unwrap_err(),
            SweepError::ConfigError(ConfigError::BadBeta(1.2))
        );
    }

    fn estimate_at(g: f64, latency: f64) -> LatencyEstimate {
        let confirmation = if latency.is_finite() {
            Confirmation::Depth(3)
        } else {
            Confirmation::HorizonTooSmall
        };

        LatencyEstimate {
            protocol: Protocol::Nakamoto,
            g,
            beta: 0.3,
            gamma: 0.0,
            epsilon: 0.1,
            trials: 10,
            horizon: 10,
            confirmation,
            latency,
            mean_completion_time: 10.0,
            mean_honest_work: 10.0,
            mean_honest_height: 10.0,
            mean_adversary_work: 5.0,
            mean_adversary_height: 5.0,
            throughput: 1.0,
            failures: 0,
        }
    }

    #[test]
    fn rate_scan_stops_once_latency_diverges() {
        let latencies = [
            (0.5, f64::INFINITY),
            (1.0, 5.0),
            (2.0, 3.0),
            (4.0, f64::INFINITY),
            (8.0, 1.0),
        ];
        let gs: Vec<f64> = latencies.iter().map(|&(g, _)| g).collect();

        let mut estimated = vec![];
        let best = scan_rates(&gs, |g| {
            estimated.push(g);
            let &(_, latency) =
                latencies.iter().find(|&&(x, _)| x == g).unwrap();
            Ok(estimate_at(g, latency))
        })
        .unwrap()
        .unwrap();

        assert_eq!(estimated, vec![0.5, 1.0, 2.0, 4.0]);
        assert_eq!(best.g, 2.0);
        assert_eq!(best.latency, 3.0);
    }

    #[test]
    fn rate_scan_keeps_leading_infinite_latencies() {
        let mut estimated = 0;
        let best = scan_rates(&[1.0, 2.0], |g| {
            estimated += 1;
            Ok(estimate_at(g, f64::INFINITY))
        })
        .unwrap()
        .unwrap();

        assert_eq!(estimated, 2);
        assert_eq!(best.g, 1.0);
        assert_eq!(scan_rates(&[], |g| Ok(estimate_at(g, 1.0))), Ok(None));
    }

    #[test]
    fn fast_honest_rates_are_cut_from_sweep() {
        // Past g ≈ 1.3 the forking honest chain grows slower than the
        // adversary at beta = 0.25, so every trial runs out of horizon
        let sweep = quick()
            .beta(0.25)
            .gs([8.0, 0.1, 4.0, 0.2])
            .horizon(30)
            .build()
            .unwrap();
        let record = sweep.run().unwrap();

        assert!(record.latency[0].is_finite());
        assert!([0.1, 0.2].contains(&record.optimal_g[0]));
        assert!(record.optimal_k[0].is_some());
    }

    #[test]
    fn nakamoto_beta_sweep() {
        let sweep = quick()
            .betas([0.1, 0.2])
            .gs([0.5, 1.0])
            .gammas([5.0])
            .build()
            .unwrap();
        let record = sweep.run().unwrap();

        assert_eq!(record.len(), 2);
        assert_eq!(record.axis_values, vec![0.1, 0.2]);
        assert_eq!(record.beta, vec![0.1, 0.2]);
        assert_eq!(record.optimal_gamma, vec![0.0, 0.0]);
        assert!(record.optimal_g.iter().all(|g| [0.5, 1.0].contains(g)));
        assert!(record.latency.iter().all(|l| l.is_finite()));
    }

    #[test]
    fn gamma_sweep_fixes_beta() {
        let sweep = quick()
            .protocol(Protocol::EntropyWeighted)
            .axis(SweepAxis::Gamma)
            .beta(0.2)
            .gs([0.5, 1.0])
            .gammas([0.0, 1.0, 2.0])
            .build()
            .unwrap();
        let record = sweep.run().unwrap();

        assert_eq!(record.axis_values, vec![0.0, 1.0, 2.0]);
        assert_eq!(record.optimal_gamma, vec![0.0, 1.0, 2.0]);
        assert_eq!(record.beta, vec![0.2; 3]);
    }

    #[test]
    fn sweeps_are_reproducible() {
        let sweep = quick()
            .protocol(Protocol::EntropyWeighted)
            .axis(SweepAxis::G)
            .beta(0.25)
            .gs([0.4, 0.8])
            .gammas([0.5, 1.5])
            .build()
            .unwrap();

        assert_eq!(sweep.run().unwrap(), sweep.run().unwrap());
    }

    #[test]
    fn comparison_covers_both_protocols() {
        let sweep = quick()
            .betas([0.1, 0.2])
            .gs([0.5, 1.0])
            .gammas([0.0, 2.0])
            .build()
            .unwrap();
        let comparison = sweep.compare().unwrap();

        assert_eq!(comparison.nakamoto.protocol, Protocol::Nakamoto);
        assert_eq!(
            comparison.entropy_weighted.protocol,
            Protocol::EntropyWeighted
        );
        assert_eq!(comparison.speedup.len(), 2);
        assert_eq!(comparison.beta, vec![0.1, 0.2]);
    }
}
