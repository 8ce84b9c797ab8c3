use std::collections::BTreeMap;

use proptest::prelude::*;
use voteledger::{tally, Block, BlockData, BlockTemplate, Miner, Vote};

fn build_chain(candidates: &[String]) -> Vec<Block> {
    let miner = Miner::new(0);
    let mut blocks = vec![miner.mine(BlockTemplate::genesis(0)).unwrap()];
    for (i, candidate) in candidates.iter().enumerate() {
        let ts = i as i64 + 1;
        let data = BlockData::vote(Vote::new(candidate.clone(), None, ts));
        let template = BlockTemplate::after(blocks.last().unwrap(), ts, data).unwrap();
        blocks.push(miner.mine(template).unwrap());
    }
    blocks
}

proptest! {
    #[test]
    fn tally_is_independent_of_traversal_order(
        candidates in prop::collection::vec(prop::sample::select(vec!["A", "B", "C", "D"]), 0..40),
        rotation in 0usize..40,
    ) {
        let candidates: Vec<String> = candidates.into_iter().map(String::from).collect();
        let blocks = build_chain(&candidates);

        let mut expected: BTreeMap<String, u64> = BTreeMap::new();
        for c in &candidates {
            *expected.entry(c.clone()).or_default() += 1;
        }

        let forward = tally(&blocks);
        prop_assert_eq!(&forward.counts, &expected);
        prop_assert_eq!(forward.total_votes(), candidates.len() as u64);

        // Vote blocks read in any order give the same counts.
        let mut votes = blocks[1..].to_vec();
        votes.reverse();
        if !votes.is_empty() {
            let shift = rotation % votes.len();
            votes.rotate_left(shift);
        }
        let mut reordered = vec![blocks[0].clone()];
        reordered.extend(votes);
        prop_assert_eq!(tally(&reordered).counts, expected);
    }
}
