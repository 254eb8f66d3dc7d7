//! Sampling block production events
//!
//! Two models are provided. [`rounds`] produces blocks in synchronous rounds
//! and grows a [`BlockTree`](crate::blocktree::BlockTree) directly, while
//! [`poisson`] produces blocks in continuous time and only records how the
//! best known chain weight of a party evolves, as a [`WeightTimeSeries`].

use serde::Serialize;

pub mod poisson;
pub mod rounds;

pub use poisson::{AdversaryProcess, HonestProcess};
pub use rounds::{balanced_mining, RoundModel, RoundOutcome};

/// A point at which the best chain known to a party improved.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Progress {
    pub time: f64,
    pub work: f64,
    pub height: u64,
}

impl Progress {
    pub const ORIGIN: Progress = Progress {
        time: 0.0,
        work: 0.0,
        height: 0,
    };
}

/// The best chain weight known to a party over time, as a sequence of
/// [`Progress`] points which is strictly increasing in both time and work
/// and always starts at [`Progress::ORIGIN`].
#[derive(Debug, Clone, PartialEq)]
pub struct WeightTimeSeries {
    points: Vec<Progress>,
}

impl Default for WeightTimeSeries {
    fn default() -> Self {
        Self::new()
    }
}

impl WeightTimeSeries {
    pub fn new() -> Self {
        WeightTimeSeries {
            points: vec![Progress::ORIGIN],
        }
    }

    /// Records `progress` if it strictly improves on the last recorded work.
    /// Returns whether the point was recorded.
    pub fn push(&mut self, progress: Progress) -> bool {
        let last = self.last();
        if progress.work <= last.work {
            return false;
        }
        debug_assert!(progress.time >= last.time);

        self.points.push(progress);
        true
    }

    #[inline]
    pub fn points(&self) -> &[Progress] {
        &self.points
    }

    /// Most recent progress point.
    #[inline]
    pub fn last(&self) -> Progress {
        // Never empty: the origin is inserted on creation
        self.points[self.points.len() - 1]
    }

    /// Number of recorded points, including the origin.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false: the origin is part of every series.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Earliest time at which the recorded work was at least `level`, or
    /// infinity if it never was.
    pub fn level_time(&self, level: f64) -> f64 {
        let i = self.points.partition_point(|p| p.work < level);

        self.points.get(i).map_or(f64::INFINITY, |p| p.time)
    }

    /// Earliest crossing time of every integer level `0..=horizon`.
    pub fn level_times(&self, horizon: u64) -> Vec<f64> {
        let mut times = Vec::with_capacity(horizon as usize + 1);
        let mut points = self.points.iter().peekable();

        for w in 0..=horizon {
            let level = w as f64;
            while points.next_if(|p| p.work < level).is_some() {}
            times.push(points.peek().map_or(f64::INFINITY, |p| p.time));
        }

        times
    }

    /// Time at which the recorded work first reached `horizon`.
    #[inline]
    pub fn completion_time(&self, horizon: u64) -> f64 {
        self.level_time(horizon as f64)
    }

    /// Latest progress point recorded no later than `time`.
    pub fn progress_at(&self, time: f64) -> Progress {
        let i = self.points.partition_point(|p| p.time <= time);

        match i {
            0 => Progress::ORIGIN,
            i => self.points[i - 1],
        }
    }

    /// Best known work at `time`.
    #[inline]
    pub fn work_at(&self, time: f64) -> f64 {
        self.progress_at(time).work
    }

    /// Height of the best known chain at `time`.
    #[inline]
    pub fn height_at(&self, time: f64) -> u64 {
        self.progress_at(time).height
    }

    /// Maps a series sampled at unit rate without bias onto a process with
    /// block rate `rate` and per-block bias `bias`. A non-positive rate gives
    /// a series that never leaves the origin.
    pub fn scaled(&self, rate: f64, bias: f64) -> Self {
        if rate <= 0.0 {
            return Self::new();
        }

        let points = self
            .points
            .iter()
            .map(|p| Progress {
                time: p.time / rate,
                work: p.work + bias * p.height as f64,
                height: p.height,
            })
            .collect();

        WeightTimeSeries { points }
    }
}

impl FromIterator<Progress> for WeightTimeSeries {
    fn from_iter<T: IntoIterator<Item = Progress>>(iter: T) -> Self {
        let mut series = Self::new();
        for progress in iter {
            series.push(progress);
        }

        series
    }
}
