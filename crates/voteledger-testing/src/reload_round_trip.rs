use anyhow::{ensure, Result};
use log::info;

use crate::harness::{TestLedgerEnvironment, CANDIDATES};
use crate::traits::Test;

/// Builds a chain, reopens it from disk and compares everything.
#[derive(Debug)]
pub struct ReloadRoundTrip {
    difficulty: usize,
}

impl ReloadRoundTrip {
    pub fn new(difficulty: usize) -> Self {
        Self { difficulty }
    }
}

impl Test for ReloadRoundTrip {
    fn run(&self, n_votes: usize) -> Result<()> {
        let env = TestLedgerEnvironment::new(self.difficulty)?;
        let written = env.populate(n_votes)?;
        let reloaded = env.open()?;

        ensure!(
            written.export() == reloaded.export(),
            "reloaded chain differs from written chain"
        );
        ensure!(reloaded.is_chain_valid().is_valid(), "reloaded chain does not verify");

        let tally = reloaded.tally();
        ensure!(tally.total_votes() == n_votes as u64, "tally lost votes");
        for (i, candidate) in CANDIDATES.iter().enumerate() {
            let expected = (n_votes + CANDIDATES.len() - 1 - i) / CANDIDATES.len();
            ensure!(
                tally.votes_for(candidate) == expected as u64,
                "candidate {} has {} votes, expected {}",
                candidate,
                tally.votes_for(candidate),
                expected
            );
        }

        let indices: Vec<u64> = reloaded.blocks().iter().map(|b| b.index).collect();
        ensure!(
            indices == (0..=n_votes as u64).collect::<Vec<_>>(),
            "indices are not contiguous"
        );
        info!("Reloaded {} blocks from {}", reloaded.len(), env.chain_path().display());
        Ok(())
    }
}
