use std::path::PathBuf;

use clap::Args;

use crate::miner::Miner;
use crate::store::JsonFileStore;
use crate::vote::VoterIdPolicy;

#[derive(Debug, Clone, Args)]
pub struct LedgerConfig {
    /// Directory holding the chain, voter and candidate files.
    #[arg(long, env = "VOTELEDGER_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// Key the chain is stored under inside the data directory.
    #[arg(long, env = "VOTELEDGER_CHAIN_KEY", default_value = "chain")]
    pub chain_key: String,

    /// Leading zero hex characters every block hash must carry.
    #[arg(long, env = "VOTELEDGER_DIFFICULTY", default_value_t = 4)]
    pub difficulty: usize,

    /// Give up mining a block after this many hash attempts. Unbounded when unset.
    #[arg(long, env = "VOTELEDGER_MAX_ATTEMPTS")]
    pub max_attempts: Option<u64>,

    /// How voter identifiers are written into vote blocks.
    #[arg(long, env = "VOTELEDGER_VOTER_IDS", value_enum, default_value_t = VoterIdPolicy::Hashed)]
    pub voter_ids: VoterIdPolicy,
}

impl LedgerConfig {
    pub fn miner(&self) -> Miner {
        Miner::new(self.difficulty).with_max_attempts(self.max_attempts)
    }

    pub fn chain_store(&self) -> JsonFileStore {
        JsonFileStore::new(&self.data_dir)
    }

    pub fn voters_path(&self) -> PathBuf {
        self.data_dir.join("voters.json")
    }

    pub fn candidates_path(&self) -> PathBuf {
        self.data_dir.join("candidates.json")
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            chain_key: "chain".to_owned(),
            difficulty: 4,
            max_attempts: None,
            voter_ids: VoterIdPolicy::Hashed,
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Debug, Parser)]
    struct Wrapper {
        #[command(flatten)]
        config: LedgerConfig,
    }

    #[test]
    fn test_defaults_match_cli_defaults() {
        let parsed = Wrapper::parse_from(["voteledger"]).config;
        let default = LedgerConfig::default();
        assert_eq!(parsed.data_dir, default.data_dir);
        assert_eq!(parsed.chain_key, default.chain_key);
        assert_eq!(parsed.difficulty, default.difficulty);
        assert_eq!(parsed.max_attempts, default.max_attempts);
        assert_eq!(parsed.voter_ids, default.voter_ids);
    }

    #[test]
    fn test_flags_override() {
        let parsed = Wrapper::parse_from([
            "voteledger",
            "--difficulty",
            "2",
            "--max-attempts",
            "100",
            "--voter-ids",
            "omit",
        ])
        .config;
        assert_eq!(parsed.difficulty, 2);
        assert_eq!(parsed.max_attempts, Some(100));
        assert_eq!(parsed.voter_ids, VoterIdPolicy::Omit);
        assert_eq!(parsed.miner().difficulty(), 2);
        assert_eq!(parsed.voters_path(), PathBuf::from("data/voters.json"));
    }
}
