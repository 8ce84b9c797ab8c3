//! The test harness sets up a scratch data directory and opens ledgers on it.

use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use log::{error, info};
use voteledger::{ChainStore, JsonFileStore, Ledger, LedgerConfig, VoterIdPolicy};

pub const CANDIDATES: [&str; 3] = ["alpha", "beta", "gamma"];

pub struct TestLedgerEnvironment {
    config: LedgerConfig,
}

impl TestLedgerEnvironment {
    pub fn new(difficulty: usize) -> Result<Self> {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .context("Reading system clock")?
            .as_nanos();
        let data_dir = std::env::temp_dir().join(format!("voteledger_scenario_{}", unique));
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("Creating scratch directory {}", data_dir.display()))?;
        info!("Scratch data directory {}", data_dir.display());

        let config = LedgerConfig {
            data_dir,
            difficulty,
            voter_ids: VoterIdPolicy::Hashed,
            ..LedgerConfig::default()
        };
        Ok(Self { config })
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn chain_path(&self) -> PathBuf {
        self.store().path_for(&self.config.chain_key)
    }

    pub fn store(&self) -> JsonFileStore {
        self.config.chain_store()
    }

    /// Opens and initializes a ledger on the scratch directory.
    pub fn open(&self) -> Result<Ledger<JsonFileStore>> {
        let mut ledger = Ledger::new(self.store(), &self.config);
        ledger.initialize().context("Initializing ledger")?;
        Ok(ledger)
    }

    /// Opens a ledger and appends `n_votes` votes cycling through [`CANDIDATES`].
    pub fn populate(&self, n_votes: usize) -> Result<Ledger<JsonFileStore>> {
        let mut ledger = self.open()?;
        for i in 0..n_votes {
            let candidate = CANDIDATES[i % CANDIDATES.len()];
            let voter = format!("voter-{}", i);
            ledger
                .append_vote(candidate, Some(voter.as_str()))
                .with_context(|| format!("Appending vote {}", i))?;
        }
        info!("Populated chain with {} votes", n_votes);
        Ok(ledger)
    }

    /// Overwrites the stored chain, bypassing the ledger.
    pub fn overwrite(&self, blocks: &[voteledger::Block]) -> Result<()> {
        self.store()
            .save(&self.config.chain_key, blocks)
            .context("Overwriting stored chain")
    }
}

impl Drop for TestLedgerEnvironment {
    /// Removes the scratch directory.
    fn drop(&mut self) {
        if let Err(e) = fs::remove_dir_all(&self.config.data_dir) {
            error!(
                "error removing scratch directory {}, leaving it around for manual cleanup; \
                error={}",
                self.config.data_dir.display(),
                e
            );
        }
    }
}
