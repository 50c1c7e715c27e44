//! Raw/paired split of the final corpus.
//!
//! A pair counts as two text units and a raw unit as one. Pairs are capped at
//! `qa_ratio` of all units; overflow pairs are shuffled out and demoted into
//! the raw pool as two separate units.

use chatcorpus_schema::{QaPair, RawUnit};
use rand::seq::SliceRandom;
use rand::Rng;

pub const DEFAULT_QA_RATIO: f64 = 0.2;

/// Final corpus after sampling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampledCorpus {
    pub raw: Vec<RawUnit>,
    pub pairs: Vec<QaPair>,
    pub target_pairs: usize,
    pub demoted_pairs: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorpusSampler {
    qa_ratio: f64,
}

impl Default for CorpusSampler {
    fn default() -> Self {
        Self::new(DEFAULT_QA_RATIO)
    }
}

impl CorpusSampler {
    pub fn new(qa_ratio: f64) -> Self {
        Self { qa_ratio }
    }

    /// `floor(((raw + 2 * pairs) * ratio) / 2)`
    pub fn target_pair_count(&self, raw: usize, pairs: usize) -> usize {
        let total_units = (raw + 2 * pairs) as f64;
        (total_units * self.qa_ratio / 2.0).floor() as usize
    }

    pub fn sample<R: Rng + ?Sized>(
        &self,
        mut raw: Vec<RawUnit>,
        mut pairs: Vec<QaPair>,
        rng: &mut R,
    ) -> SampledCorpus {
        let target_pairs = self.target_pair_count(raw.len(), pairs.len());

        pairs.shuffle(rng);
        let mut demoted_pairs = 0;
        if pairs.len() > target_pairs {
            let overflow = pairs.split_off(target_pairs);
            demoted_pairs = overflow.len();
            raw.reserve(overflow.len() * 2);
            raw.extend(overflow.into_iter().flat_map(QaPair::into_raw_units));
        }

        raw.shuffle(rng);

        SampledCorpus {
            raw,
            pairs,
            target_pairs,
            demoted_pairs,
        }
    }
}
