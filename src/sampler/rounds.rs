//! Synchronous rounds of the backbone protocol
//!
//! Each of `n` parties makes `q` hash queries per round, `t` of them
//! corrupted. A single query succeeds with probability `p`, chosen so that
//! at least one honest success happens in a round with probability `f`.

use rand::Rng;
use rand_distr::{Binomial, Distribution};

use crate::{
    block::BlockId,
    blocktree::{BlockTree, BlockTreeError},
    config::ConfigError,
};

/// Number of blocks produced in a single round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RoundOutcome {
    /// Number of honest parties that found a block.
    pub honest: u64,
    /// Number of successful adversarial queries.
    pub adversarial: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct RoundModel {
    parties: u64,
    corrupted: u64,
    queries: u64,
    round_success: f64,
    query_success: f64,
    honest: Binomial,
    adversarial: Binomial,
}

impl RoundModel {
    pub fn new(
        parties: u64,
        corrupted: u64,
        queries: u64,
        round_success: f64,
    ) -> Result<Self, ConfigError> {
        use ConfigError::*;

        if corrupted >= parties {
            return Err(TooManyCorrupted(corrupted, parties));
        }
        if queries == 0 {
            return Err(ZeroQueries);
        }
        if !(round_success > 0.0 && round_success < 1.0) {
            return Err(BadRoundSuccess(round_success));
        }
        let adversarial_queries = corrupted
            .checked_mul(queries)
            .ok_or(QueryOverflow(corrupted, queries))?;

        // Solve f = 1 - (1 - p)^(q(n - t)) for p
        let honest_queries = queries as f64 * (parties - corrupted) as f64;
        let query_success =
            -((-round_success).ln_1p() / honest_queries).exp_m1();
        let party_success =
            -(queries as f64 * (-query_success).ln_1p()).exp_m1();

        let honest = Binomial::new(parties - corrupted, party_success)
            .map_err(|_| BadRoundSuccess(round_success))?;
        let adversarial = Binomial::new(adversarial_queries, query_success)
            .map_err(|_| BadRoundSuccess(round_success))?;

        Ok(RoundModel {
            parties,
            corrupted,
            queries,
            round_success,
            query_success,
            honest,
            adversarial,
        })
    }

    #[inline]
    pub fn parties(&self) -> u64 {
        self.parties
    }

    #[inline]
    pub fn corrupted(&self) -> u64 {
        self.corrupted
    }

    #[inline]
    pub fn queries(&self) -> u64 {
        self.queries
    }

    /// Probability that some honest party succeeds in a round.
    #[inline]
    pub fn round_success(&self) -> f64 {
        self.round_success
    }

    /// Probability that a single hash query succeeds.
    #[inline]
    pub fn query_success(&self) -> f64 {
        self.query_success
    }

    /// Samples the number of honest and adversarial successes in one round.
    pub fn sample_round<R: Rng + ?Sized>(&self, rng: &mut R) -> RoundOutcome {
        RoundOutcome {
            honest: self.honest.sample(rng),
            adversarial: self.adversarial.sample(rng),
        }
    }
}

/// Spreads `blocks` new blocks evenly over `tips`. Each tip first receives
/// `blocks / m` children, grouped per tip, and the first `blocks % m` tips
/// then receive one more each. Returns the new blocks in creation order, or
/// `tips` unchanged when no block was mined.
pub fn balanced_mining<R: Rng + ?Sized>(
    tree: &mut BlockTree,
    tips: &[BlockId],
    blocks: u64,
    rng: &mut R,
) -> Result<Vec<BlockId>, BlockTreeError> {
    if blocks == 0 || tips.is_empty() {
        return Ok(tips.to_vec());
    }

    let m = tips.len() as u64;
    let (each, extra) = (blocks / m, blocks % m);

    let mut mined = Vec::with_capacity(blocks as usize);
    for &parent in tips {
        for _ in 0..each {
            mined.push(tree.mine(parent, rng)?);
        }
    }
    for &parent in &tips[..extra as usize] {
        mined.push(tree.mine(parent, rng)?);
    }

    Ok(mined)
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::work::WorkModel;

    #[test]
    fn query_success_solves_round_success() {
        let model = RoundModel::new(100, 30, 5, 0.2).unwrap();
        let p = model.query_success();

        let f = 1.0 - (1.0 - p).powf(5.0 * 70.0);
        assert!((f - 0.2).abs() < 1e-12);
    }

    #[test]
    fn rejects_invalid_rounds() {
        use ConfigError::*;

        assert_eq!(
            RoundModel::new(10, 10, 1, 0.5).unwrap_err(),
            TooManyCorrupted(10, 10)
        );
        assert_eq!(RoundModel::new(10, 1, 0, 0.5).unwrap_err(), ZeroQueries);
        assert_eq!(
            RoundModel::new(10, 1, 1, 1.0).unwrap_err(),
            BadRoundSuccess(1.0)
        );
        assert_eq!(
            RoundModel::new(u64::MAX, 2, u64::MAX, 0.5).unwrap_err(),
            QueryOverflow(2, u64::MAX)
        );
    }

    #[test]
    fn rounds_stay_within_bounds() {
        let mut rng = ChaCha8Rng::seed_from_u64(31);
        let model = RoundModel::new(20, 5, 10, 0.5).unwrap();

        for _ in 0..1000 {
            let outcome = model.sample_round(&mut rng);
            assert!(outcome.honest <= 15);
            assert!(outcome.adversarial <= 50);
        }
    }

    #[test]
    fn spreads_blocks_evenly_over_tips() {
        let mut rng = ChaCha8Rng::seed_from_u64(32);
        let mut tree = BlockTree::new(WorkModel::Nakamoto);
        let genesis = tree.genesis();

        let tips = balanced_mining(&mut tree, &[genesis], 3, &mut rng).unwrap();
        assert_eq!(tips.len(), 3);

        let new_tips = balanced_mining(&mut tree, &tips, 7, &mut rng).unwrap();
        assert_eq!(new_tips.len(), 7);

        let per_tip: Vec<usize> =
            tips.iter().map(|&t| tree[t].children.len()).collect();
        assert_eq!(per_tip, vec![3, 2, 2]);

        let parents: Vec<_> = new_tips
            .iter()
            .map(|&block| tree.get_parent(block).unwrap())
            .collect();
        assert_eq!(
            parents,
            vec![tips[0], tips[0], tips[1], tips[1], tips[2], tips[2], tips[0]]
        );
        assert!(new_tips.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn extras_follow_grouped_order_in_next_round() {
        let mut rng = ChaCha8Rng::seed_from_u64(34);
        let mut tree = BlockTree::default();
        let genesis = tree.genesis();

        let first =
            balanced_mining(&mut tree, &[genesis], 2, &mut rng).unwrap();
        let second = balanced_mining(&mut tree, &first, 5, &mut rng).unwrap();
        let third = balanced_mining(&mut tree, &second, 7, &mut rng).unwrap();

        let parents: Vec<_> =
            second.iter().map(|&t| tree.get_parent(t).unwrap()).collect();
        let (a, b) = (first[0], first[1]);
        assert_eq!(parents, vec![a, a, b, b, a]);

        // Both extras of the third round land on children of `a`
        assert_eq!(tree.get_parent(third[5]), Some(second[0]));
        assert_eq!(tree.get_parent(third[6]), Some(second[1]));
        assert_eq!(tree[second[0]].children.len(), 2);
        assert_eq!(tree[second[2]].children.len(), 1);
    }

    #[test]
    fn no_blocks_keeps_tips() {
        let mut rng = ChaCha8Rng::seed_from_u64(33);
        let mut tree = BlockTree::default();
        let genesis = tree.genesis();

        let tips = balanced_mining(&mut tree, &[genesis], 0, &mut rng).unwrap();
        assert_eq!(tips, vec![genesis]);
        assert_eq!(tree.len(), 1);
    }
}
