use derive_more::Display;
use log::warn;

use crate::block::Block;
use crate::crypto::{zero_digest, Digest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ChainFault {
    #[display(fmt = "index out of sequence")]
    IndexMismatch,

    #[display(fmt = "stored hash does not match recomputed hash")]
    HashMismatch,

    #[display(fmt = "hash does not meet the difficulty target")]
    DifficultyNotMet,

    #[display(fmt = "previous_hash does not match the preceding block")]
    LinkageMismatch,
}

/// First block that failed verification and the check it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[display(fmt = "block {} failed: {}", index, fault)]
pub struct ChainInvalid {
    /// Position of the block in the chain.
    pub index: u64,
    pub fault: ChainFault,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainReport {
    pub blocks_checked: usize,
    pub difficulty: usize,
    pub first_failure: Option<ChainInvalid>,
}

impl ChainReport {
    pub fn is_valid(&self) -> bool {
        self.first_failure.is_none()
    }

    pub fn failing_index(&self) -> Option<u64> {
        self.first_failure.map(|failure| failure.index)
    }
}

/// Checks one block against its predecessor. Checks run in a fixed order and
/// the first one that fails is reported.
fn check_block(
    position: usize,
    block: &Block,
    parent_hash: &Digest,
    difficulty: usize,
) -> Option<ChainFault> {
    if block.index != position as u64 {
        return Some(ChainFault::IndexMismatch);
    }
    match block.compute_hash() {
        Ok(recomputed) if recomputed == block.hash => {}
        _ => return Some(ChainFault::HashMismatch),
    }
    if !block.hash.meets_difficulty(difficulty) {
        return Some(ChainFault::DifficultyNotMet);
    }
    if block.previous_hash != *parent_hash {
        return Some(ChainFault::LinkageMismatch);
    }
    None
}

/// Walks the chain front to back. The genesis block is held to the same
/// difficulty as every other block and must point at the zero digest.
pub fn verify_chain(blocks: &[Block], difficulty: usize) -> ChainReport {
    let mut parent_hash = zero_digest();
    for (position, block) in blocks.iter().enumerate() {
        if let Some(fault) = check_block(position, block, &parent_hash, difficulty) {
            let failure = ChainInvalid {
                index: position as u64,
                fault,
            };
            warn!("Chain verification failed; {}", failure);
            return ChainReport {
                blocks_checked: position + 1,
                difficulty,
                first_failure: Some(failure),
            };
        }
        parent_hash = block.hash;
    }

    ChainReport {
        blocks_checked: blocks.len(),
        difficulty,
        first_failure: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{BlockData, BlockTemplate};
    use crate::miner::Miner;
    use crate::vote::Vote;

    fn chain(difficulty: usize, candidates: &[&str]) -> Vec<Block> {
        let miner = Miner::new(difficulty);
        let mut blocks = vec![miner.mine(BlockTemplate::genesis(1_000)).unwrap()];
        for (i, candidate) in candidates.iter().enumerate() {
            let ts = 1_000 + i as i64 + 1;
            let data = BlockData::vote(Vote::new(candidate.to_string(), None, ts));
            let template = BlockTemplate::after(blocks.last().unwrap(), ts, data).unwrap();
            blocks.push(miner.mine(template).unwrap());
        }
        blocks
    }

    #[test]
    fn test_valid_chain() {
        let blocks = chain(1, &["A", "B", "C"]);
        let report = verify_chain(&blocks, 1);
        assert!(report.is_valid());
        assert_eq!(report.blocks_checked, 4);
        assert_eq!(report.failing_index(), None);
    }

    #[test]
    fn test_empty_chain_is_vacuously_valid() {
        assert!(verify_chain(&[], 3).is_valid());
    }

    #[test]
    fn test_hash_mismatch_on_tampered_data() {
        let mut blocks = chain(1, &["A", "B", "C"]);
        blocks[1].data = BlockData::vote(Vote::new("C".into(), None, 1_001));
        let report = verify_chain(&blocks, 1);
        assert_eq!(
            report.first_failure,
            Some(ChainInvalid {
                index: 1,
                fault: ChainFault::HashMismatch
            })
        );
        assert_eq!(report.blocks_checked, 2);
    }

    #[test]
    fn test_index_mismatch() {
        let mut blocks = chain(1, &["A", "B"]);
        blocks[2].index = 7;
        assert_eq!(
            verify_chain(&blocks, 1).first_failure,
            Some(ChainInvalid {
                index: 2,
                fault: ChainFault::IndexMismatch
            })
        );
    }

    #[test]
    fn test_difficulty_not_met() {
        let blocks = chain(0, &["A"]);
        let report = verify_chain(&blocks, crate::crypto::DIGEST_HEX_LEN);
        assert_eq!(
            report.first_failure.map(|f| f.fault),
            Some(ChainFault::DifficultyNotMet)
        );
    }

    #[test]
    fn test_linkage_mismatch_when_block_is_reparented() {
        let miner = Miner::new(1);
        let mut blocks = chain(1, &["A", "B"]);
        // Re-mine block 2 on top of the genesis hash: self-consistent, wrong parent.
        let data = blocks[2].data.clone();
        let template = BlockTemplate {
            index: 2,
            timestamp: blocks[2].timestamp,
            data,
            previous_hash: blocks[0].hash,
        };
        blocks[2] = miner.mine(template).unwrap();
        assert_eq!(
            verify_chain(&blocks, 1).first_failure,
            Some(ChainInvalid {
                index: 2,
                fault: ChainFault::LinkageMismatch
            })
        );
    }

    #[test]
    fn test_genesis_must_point_at_zero_digest() {
        let miner = Miner::new(1);
        let mut template = BlockTemplate::genesis(5);
        template.previous_hash = crate::crypto::digest_bytes(b"elsewhere");
        let blocks = vec![miner.mine(template).unwrap()];
        assert_eq!(
            verify_chain(&blocks, 1).first_failure.map(|f| f.fault),
            Some(ChainFault::LinkageMismatch)
        );
    }
}
