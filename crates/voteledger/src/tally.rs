use std::collections::BTreeMap;

use derive_more::Display;

use crate::block::{Block, BlockData, Payload};
use crate::error::RejectReason;
use crate::registry::Candidate;

#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum MalformedReason {
    #[display(fmt = "payload is not a recognised record")]
    Unreadable,

    #[display(fmt = "vote record is invalid: {}", _0)]
    InvalidVote(RejectReason),

    #[display(fmt = "genesis marker outside the first block")]
    MisplacedGenesis,
}

/// A block whose payload could not be counted.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
#[display(fmt = "block {}: {}", index, reason)]
pub struct MalformedVoteRecord {
    pub index: u64,
    pub reason: MalformedReason,
}

/// One line of a presented result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TallyRow {
    pub candidate_id: String,
    pub name: String,
    pub votes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    pub counts: BTreeMap<String, u64>,
    pub malformed: Vec<MalformedVoteRecord>,
}

impl Tally {
    /// Replays `blocks`. The genesis block is skipped; every other block
    /// either adds one vote or one malformed record.
    pub fn from_blocks(blocks: &[Block]) -> Self {
        let mut tally = Tally::default();
        for (position, block) in blocks.iter().enumerate() {
            let index = block.index;
            match &block.data {
                BlockData::Known(Payload::Genesis { .. }) if position == 0 => {}
                BlockData::Known(Payload::Genesis { .. }) => {
                    tally.malformed.push(MalformedVoteRecord {
                        index,
                        reason: MalformedReason::MisplacedGenesis,
                    });
                }
                BlockData::Known(Payload::Vote(vote)) => match vote.validate() {
                    Ok(()) => *tally.counts.entry(vote.candidate_id.clone()).or_default() += 1,
                    Err(reason) => tally.malformed.push(MalformedVoteRecord {
                        index,
                        reason: MalformedReason::InvalidVote(reason),
                    }),
                },
                BlockData::Unreadable(_) => tally.malformed.push(MalformedVoteRecord {
                    index,
                    reason: MalformedReason::Unreadable,
                }),
            }
        }
        tally
    }

    pub fn votes_for(&self, candidate_id: &str) -> u64 {
        self.counts.get(candidate_id).copied().unwrap_or(0)
    }

    pub fn total_votes(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn malformed_count(&self) -> usize {
        self.malformed.len()
    }

    /// Counts sorted by votes descending, ties broken by candidate id.
    pub fn ranked(&self) -> Vec<(String, u64)> {
        let mut ranked: Vec<_> = self
            .counts
            .iter()
            .map(|(id, votes)| (id.clone(), *votes))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked
    }

    pub fn leader(&self) -> Option<(String, u64)> {
        self.ranked().into_iter().next()
    }

    /// Rows with display names, sorted by votes descending and then by name.
    /// Ids without a known candidate keep the id as name.
    pub fn labelled(&self, candidates: &[Candidate]) -> Vec<TallyRow> {
        let mut rows: Vec<TallyRow> = self
            .counts
            .iter()
            .map(|(candidate_id, votes)| {
                let name = candidates
                    .iter()
                    .find(|c| &c.id == candidate_id)
                    .map(|c| c.name.clone())
                    .unwrap_or_else(|| candidate_id.clone());
                TallyRow {
                    candidate_id: candidate_id.clone(),
                    name,
                    votes: *votes,
                }
            })
            .collect();
        rows.sort_by(|a, b| {
            b.votes
                .cmp(&a.votes)
                .then_with(|| a.name.cmp(&b.name))
                .then_with(|| a.candidate_id.cmp(&b.candidate_id))
        });
        rows
    }
}

pub fn tally(blocks: &[Block]) -> Tally {
    Tally::from_blocks(blocks)
}
