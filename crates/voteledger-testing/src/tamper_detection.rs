use anyhow::{bail, ensure, Result};
use log::info;
use rand::Rng;
use voteledger::{Block, BlockData, Vote};

use crate::harness::TestLedgerEnvironment;
use crate::traits::Test;

/// Edits one field of every non-tail block on disk in turn and checks that a
/// fresh ledger reports exactly that block as the first failure.
#[derive(Debug)]
pub struct TamperDetection {
    difficulty: usize,
}

impl TamperDetection {
    pub fn new(difficulty: usize) -> Self {
        Self { difficulty }
    }
}

fn tamper(block: &mut Block, field: usize) -> &'static str {
    match field {
        0 => {
            block.timestamp += 1;
            "timestamp"
        }
        1 => {
            block.nonce = block.nonce.wrapping_add(1);
            "nonce"
        }
        2 => {
            let cast_at = block.data.as_vote().map(|v| v.cast_at).unwrap_or(block.timestamp);
            block.data = BlockData::vote(Vote::new("mallory".into(), None, cast_at));
            "data"
        }
        _ => {
            block.hash = voteledger::crypto::digest_bytes(b"forged");
            "hash"
        }
    }
}

impl Test for TamperDetection {
    fn run(&self, n_votes: usize) -> Result<()> {
        let env = TestLedgerEnvironment::new(self.difficulty)?;
        let original = env.populate(n_votes)?.export();
        let mut rng = rand::thread_rng();

        for target in 0..original.len().saturating_sub(1) {
            let mut blocks = original.clone();
            let field = tamper(&mut blocks[target], rng.gen_range(0..4));
            env.overwrite(&blocks)?;

            let report = env.open()?.is_chain_valid();
            match report.first_failure {
                Some(failure) if failure.index == target as u64 => {
                    info!("Tampered {} of block {}: detected ({})", field, target, failure.fault);
                }
                Some(failure) => bail!(
                    "tampered {} of block {} but verification blamed block {}",
                    field,
                    target,
                    failure.index
                ),
                None => bail!("tampered {} of block {} went undetected", field, target),
            }
        }

        env.overwrite(&original)?;
        ensure!(env.open()?.is_chain_valid().is_valid(), "restored chain does not verify");
        Ok(())
    }
}
