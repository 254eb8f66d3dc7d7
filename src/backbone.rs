//! Executions of the discrete-round backbone protocol
//!
//! Honest parties spread their blocks over the current honest tips, then a
//! rushing [`Adversary`] places its own blocks. The common prefix parameter of
//! the honest and adversarial tips is tracked after every round.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
#[cfg(feature = "rayon")]
use rayon::prelude::*;
use serde::Serialize;

use crate::{
    adversary::{Adversary, PrivateMining},
    block::BlockId,
    blocktree::{BlockTree, BlockTreeError},
    common_prefix::CommonPrefixAnalyzer,
    config::ConfigError,
    sampler::rounds::{balanced_mining, RoundModel},
    work::WorkModel,
};

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum BackboneError {
    #[error("number of rounds must be greater than 0")]
    ZeroRounds,
    #[error("cannot repeat an execution 0 times")]
    ZeroRepeats,
    #[error(transparent)]
    ConfigError(#[from] ConfigError),
    #[error(transparent)]
    BlockTreeError(#[from] BlockTreeError),
}

/// Builds a [`Backbone`].
#[derive(Debug, Default, Clone)]
pub struct BackboneBuilder {
    pub parties: Option<u64>,
    pub corrupted: Option<u64>,
    pub queries: Option<u64>,
    pub round_success: Option<f64>,
    pub rounds: Option<u64>,
    pub work_model: Option<WorkModel>,
    adversary: Option<Box<dyn Adversary>>,
}

impl BackboneBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the total number of parties `n` (default 100).
    pub fn parties(mut self, parties: u64) -> Self {
        self.parties = Some(parties);

        self
    }

    /// Sets the number of corrupted parties `t` (default 0).
    pub fn corrupted(mut self, corrupted: u64) -> Self {
        self.corrupted = Some(corrupted);

        self
    }

    /// Sets the number of hash queries per party per round `q` (default 1).
    pub fn queries(mut self, queries: u64) -> Self {
        self.queries = Some(queries);

        self
    }

    /// Sets the probability `f` that an honest block is found in a round.
    pub fn round_success(mut self, f: f64) -> Self {
        self.round_success = Some(f);

        self
    }

    /// Sets the number of rounds each execution lasts for.
    pub fn rounds(mut self, rounds: u64) -> Self {
        self.rounds = Some(rounds);

        self
    }

    pub fn work_model(mut self, work_model: WorkModel) -> Self {
        self.work_model = Some(work_model);

        self
    }

    /// Sets the adversarial strategy ([`PrivateMining`] otherwise).
    pub fn adversary<A: Adversary + 'static>(mut self, adversary: A) -> Self {
        self.adversary = Some(Box::new(adversary));

        self
    }

    /// Creates a [`Backbone`] from the specified parameters.
    pub fn build(self) -> Result<Backbone, BackboneError> {
        use BackboneError::*;

        let BackboneBuilder {
            parties,
            corrupted,
            queries,
            round_success,
            rounds,
            work_model,
            adversary,
        } = self;

        let rounds = match rounds {
            Some(0) => return Err(ZeroRounds),
            Some(x) => x,
            None => 1,
        };
        let round_success = round_success.unwrap_or(f64::NAN);
        let model = RoundModel::new(
            parties.unwrap_or(100),
            corrupted.unwrap_or(0),
            queries.unwrap_or(1),
            round_success,
        )?;

        let work_model = work_model.unwrap_or_default();
        work_model.validate()?;

        Ok(Backbone {
            model,
            rounds,
            work_model,
            adversary: adversary
                .unwrap_or_else(|| Box::new(PrivateMining::new())),
        })
    }
}

/// A configured backbone execution. Run with [`Backbone::run`] or
/// [`Backbone::run_all`].
#[derive(Debug, Clone)]
pub struct Backbone {
    model: RoundModel,
    rounds: u64,
    work_model: WorkModel,
    adversary: Box<dyn Adversary>,
}

/// Final state of a single execution.
#[derive(Debug, Clone)]
pub struct BackboneOutcome {
    pub tree: BlockTree,
    pub honest_tips: Vec<BlockId>,
    pub adversary_tips: Vec<BlockId>,
    /// Largest common prefix parameter seen after any round.
    pub common_prefix: u64,
    pub rounds: u64,
    pub honest_blocks: u64,
    pub adversarial_blocks: u64,
}

/// Aggregate statistics over repeated executions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackboneSummary {
    pub adversary: String,
    pub executions: usize,
    pub rounds: u64,
    pub query_success: f64,
    pub common_prefix: Vec<u64>,
    pub max_common_prefix: u64,
    pub mean_common_prefix: f64,
    pub mean_height: f64,
    pub mean_honest_blocks: f64,
    pub mean_adversarial_blocks: f64,
}

impl Backbone {
    pub fn builder() -> BackboneBuilder {
        BackboneBuilder::new()
    }

    #[inline]
    pub fn model(&self) -> &RoundModel {
        &self.model
    }

    #[inline]
    pub fn rounds(&self) -> u64 {
        self.rounds
    }

    /// Executes the configured number of rounds on a fresh tree.
    pub fn run<R: Rng>(
        &self,
        rng: &mut R,
    ) -> Result<BackboneOutcome, BackboneError> {
        let mut tree = BlockTree::new(self.work_model);
        let mut adversary = self.adversary.clone();
        let mut analyzer = CommonPrefixAnalyzer::new();

        let mut honest_tips = vec![tree.genesis()];
        let mut honest_blocks = 0;
        let mut adversarial_blocks = 0;

        for _ in 0..self.rounds {
            let round = self.model.sample_round(rng);
            honest_blocks += round.honest;
            adversarial_blocks += round.adversarial;

            honest_tips =
                balanced_mining(&mut tree, &honest_tips, round.honest, rng)?;
            adversary.mine(
                &mut tree,
                &mut honest_tips,
                round.adversarial,
                rng,
            )?;

            let mut tips = honest_tips.clone();
            tips.extend(adversary.tips());
            analyzer.observe(&tree, &tips)?;
        }

        Ok(BackboneOutcome {
            adversary_tips: adversary.tips(),
            tree,
            honest_tips,
            common_prefix: analyzer.safety_depth(),
            rounds: self.rounds,
            honest_blocks,
            adversarial_blocks,
        })
    }

    /// Runs `repeats` independent executions. Execution `i` draws from stream
    /// `i` of a ChaCha generator seeded with `seed`.
    pub fn run_all(
        &self,
        seed: u64,
        repeats: usize,
    ) -> Result<Vec<BackboneOutcome>, BackboneError> {
        if repeats == 0 {
            return Err(BackboneError::ZeroRepeats);
        }

        let run = |i: usize| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            rng.set_stream(i as u64);
            self.run(&mut rng)
        };

        #[cfg(feature = "rayon")]
        let outcomes = (0..repeats).into_par_iter().map(run).collect();
        #[cfg(not(feature = "rayon"))]
        let outcomes = (0..repeats).map(run).collect();

        outcomes
    }

    /// Runs [`Backbone::run_all`] and aggregates the outcomes.
    pub fn summarize(
        &self,
        seed: u64,
        repeats: usize,
    ) -> Result<BackboneSummary, BackboneError> {
        let outcomes = self.run_all(seed, repeats)?;
        let n = outcomes.len() as f64;

        let common_prefix: Vec<u64> =
            outcomes.iter().map(|o| o.common_prefix).collect();
        let mean = |f: &dyn Fn(&BackboneOutcome) -> f64| {
            outcomes.iter().map(f).sum::<f64>() / n
        };

        Ok(BackboneSummary {
            adversary: self.adversary.name(),
            executions: outcomes.len(),
            rounds: self.rounds,
            query_success: self.model.query_success(),
            max_common_prefix: common_prefix.iter().copied().max().unwrap_or(0),
            mean_common_prefix: mean(&|o| o.common_prefix as f64),
            mean_height: mean(&|o| o.tree.max_height() as f64),
            mean_honest_blocks: mean(&|o| o.honest_blocks as f64),
            mean_adversarial_blocks: mean(&|o| o.adversarial_blocks as f64),
            common_prefix,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adversary::{Balancing, Idle};

    fn backbone() -> BackboneBuilder {
        Backbone::builder()
            .parties(50)
            .corrupted(10)
            .queries(4)
            .round_success(0.3)
            .rounds(200)
    }

    #[test]
    fn example_build() {
        let backbone = backbone().build().expect("valid backbone build");

        assert_eq!(backbone.rounds(), 200);
        assert_eq!(backbone.model().parties(), 50);
    }

    #[test]
    fn rejects_invalid_parameters() {
        assert_eq!(
            backbone().rounds(0).build().unwrap_err(),
            BackboneError::ZeroRounds
        );
        assert!(matches!(
            backbone().corrupted(50).build(),
            Err(BackboneError::ConfigError(ConfigError::TooManyCorrupted(
                50, 50
            )))
        ));
        assert!(matches!(
            Backbone::builder().build(),
            Err(BackboneError::ConfigError(ConfigError::BadRoundSuccess(_)))
        ));
        assert!(matches!(
            backbone().build().unwrap().run_all(0, 0),
            Err(BackboneError::ZeroRepeats)
        ));
    }

    #[test]
    fn execution_accounts_for_every_block() {
        let mut rng = ChaCha8Rng::seed_from_u64(81);
        let outcome = backbone()
            .adversary(PrivateMining::new())
            .build()
            .unwrap()
            .run(&mut rng)
            .unwrap();

        assert_eq!(
            outcome.tree.len() as u64,
            1 + outcome.honest_blocks + outcome.adversarial_blocks
        );
        assert_eq!(outcome.adversary_tips.len(), 1);
        assert!(outcome.common_prefix <= outcome.tree.max_height());
    }

    #[test]
    fn idle_adversary_only_leaves_honest_forks() {
        let mut rng = ChaCha8Rng::seed_from_u64(82);
        let outcome = backbone()
            .adversary(Idle)
            .build()
            .unwrap()
            .run(&mut rng)
            .unwrap();

        assert_eq!(outcome.tree.len() as u64, 1 + outcome.honest_blocks);
        assert!(outcome.adversary_tips.is_empty());
    }

    #[test]
    fn balancing_keeps_forks_level() {
        let mut rng = ChaCha8Rng::seed_from_u64(83);
        let backbone = backbone().corrupted(20).build().unwrap();
        let mut tree = BlockTree::default();
        let mut adversary = Balancing::new();

        let heights = |tree: &BlockTree, tips: &[BlockId]| -> Vec<u64> {
            tips.iter().map(|&t| tree[t].height).collect()
        };

        let mut tips = vec![tree.genesis()];
        let mut released = 0;
        for _ in 0..backbone.rounds() {
            let round = backbone.model().sample_round(&mut rng);
            tips = balanced_mining(&mut tree, &tips, round.honest, &mut rng)
                .unwrap();
            let before: u64 = heights(&tree, &tips).iter().sum();

            adversary
                .mine(&mut tree, &mut tips, round.adversarial, &mut rng)
                .unwrap();
            released += round.adversarial;

            let after = heights(&tree, &tips);
            let (lo, hi) = (after.iter().min(), after.iter().max());
            assert!(hi.unwrap() - lo.unwrap() <= 1, "heights {after:?}");
            assert_eq!(after.iter().sum::<u64>(), before + round.adversarial);
        }

        assert!(released > 0);
        assert!(adversary.tips().is_empty());
    }

    #[test]
    fn repeated_runs_are_reproducible() {
        let backbone = backbone().build().unwrap();

        let first = backbone.summarize(7, 8).unwrap();
        let second = backbone.summarize(7, 8).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.executions, 8);
        assert_eq!(first.common_prefix.len(), 8);
        assert_eq!(first.adversary, "Private mining");
    }
}
