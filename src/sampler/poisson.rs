//! Continuous-time block production
//!
//! Blocks arrive as a Poisson process. Honest parties see each other's blocks
//! only after a fixed network delay, while the adversary mines privately on
//! its own chain and never waits.

use std::collections::VecDeque;

use rand::Rng;
use rand_distr::{Distribution, Exp1};

use super::{Progress, WeightTimeSeries};
use crate::work::WorkModel;

/// Draws an exponential inter-arrival time for a process with rate `rate`.
#[inline]
fn inter_arrival<R: Rng + ?Sized>(rng: &mut R, rate: f64) -> f64 {
    let unit: f64 = Exp1.sample(rng);
    unit / rate
}

/// Honest block production under a bounded-delay network.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HonestProcess {
    /// Expected number of blocks per unit of time.
    pub rate: f64,
    /// Time taken for a block to reach every honest party.
    pub delay: f64,
    pub work_model: WorkModel,
    /// Work added to every block on top of its sampled weight.
    pub bias: f64,
}

impl HonestProcess {
    /// Samples the weight of the best honest chain over time until it reaches
    /// `horizon`.
    ///
    /// A block mined at time `t` extends the heaviest chain delivered by `t`
    /// and is itself delivered at `t + delay`. Only blocks that raise the best
    /// weight mined so far are recorded.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        horizon: f64,
        rng: &mut R,
    ) -> WeightTimeSeries {
        let mut series = WeightTimeSeries::new();
        let mut block_time = 0.0;
        let mut delivered = (0.0, 0);
        // (arrival time, chain work, chain height), ordered by arrival
        let mut in_flight: VecDeque<(f64, f64, u64)> = VecDeque::new();

        while series.last().work < horizon {
            block_time += inter_arrival(rng, self.rate);

            while let Some(&(arrival, work, height)) = in_flight.front() {
                if arrival > block_time {
                    break;
                }
                if work > delivered.0 {
                    delivered = (work, height);
                }
                in_flight.pop_front();
            }

            let work =
                delivered.0 + self.work_model.block_work(rng) + self.bias;
            let height = delivered.1 + 1;
            in_flight.push_back((block_time + self.delay, work, height));

            series.push(Progress {
                time: block_time,
                work,
                height,
            });
        }

        series
    }
}

/// Private adversarial block production.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdversaryProcess {
    /// Expected number of blocks per unit of time. Zero for an adversary
    /// without mining power.
    pub rate: f64,
    pub work_model: WorkModel,
    /// Work added to every block on top of its sampled weight.
    pub bias: f64,
}

impl AdversaryProcess {
    /// Samples a private chain at unit rate without bias until its weight
    /// reaches `horizon`.
    pub fn sample_base<R: Rng + ?Sized>(
        work_model: WorkModel,
        horizon: f64,
        rng: &mut R,
    ) -> WeightTimeSeries {
        let mut series = WeightTimeSeries::new();
        let mut tip = Progress::ORIGIN;

        while tip.work < horizon {
            tip = Progress {
                time: tip.time + inter_arrival(rng, 1.0),
                work: tip.work + work_model.block_work(rng),
                height: tip.height + 1,
            };
            series.push(tip);
        }

        series
    }

    /// Maps a base series from [`AdversaryProcess::sample_base`] onto this
    /// process.
    #[inline]
    pub fn scale(&self, base: &WeightTimeSeries) -> WeightTimeSeries {
        base.scaled(self.rate, self.bias)
    }

    /// Samples this process directly until its weight reaches `horizon`.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        horizon: f64,
        rng: &mut R,
    ) -> WeightTimeSeries {
        if self.rate <= 0.0 {
            return WeightTimeSeries::new();
        }

        self.scale(&Self::sample_base(self.work_model, horizon, rng))
    }
}
