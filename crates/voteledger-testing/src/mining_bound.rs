use anyhow::{bail, Result};
use log::info;
use voteledger::crypto::DIGEST_HEX_LEN;
use voteledger::{Ledger, LedgerError, Miner};

use crate::harness::TestLedgerEnvironment;
use crate::traits::Test;

/// Checks that an unreachable difficulty trips the attempt guard instead of hanging.
#[derive(Debug)]
pub struct MiningBound {
    difficulty: usize,
}

impl MiningBound {
    pub fn new(difficulty: usize) -> Self {
        Self { difficulty }
    }
}

impl Test for MiningBound {
    fn run(&self, n_votes: usize) -> Result<()> {
        let env = TestLedgerEnvironment::new(self.difficulty)?;
        let before = env.populate(n_votes)?.len();

        let max_attempts = 1_000;
        let config = env.config();
        let miner = Miner::new(DIGEST_HEX_LEN).with_max_attempts(Some(max_attempts));
        let mut ledger =
            Ledger::with_miner(env.store(), config.chain_key.clone(), miner, config.voter_ids);
        ledger.initialize()?;

        match ledger.append_vote("alpha", Some("late-voter")) {
            Err(LedgerError::MiningExhausted { attempts, .. }) if attempts == max_attempts => {
                info!("Mining gave up after {} attempts", attempts);
            }
            Err(e) => bail!("expected mining to be exhausted, got {}", e),
            Ok(block) => bail!("mined {} at an unreachable difficulty", block),
        }

        let after = env.open()?.len();
        if after != before {
            bail!("chain length changed from {} to {} after a failed append", before, after);
        }
        Ok(())
    }
}
