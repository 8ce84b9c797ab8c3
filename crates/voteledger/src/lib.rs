//! A hash-linked, proof-of-work gated ledger for recording votes.

pub mod block;
pub mod config;
pub mod crypto;
pub mod error;
pub mod ledger;
pub mod miner;
pub mod registry;
pub mod store;
pub mod tally;
pub mod verify;
pub mod vote;

pub use block::{Block, BlockData, BlockTemplate, Payload};
pub use config::LedgerConfig;
pub use crypto::{zero_digest, Digest};
pub use error::{LedgerError, LedgerResult, RejectReason};
pub use ledger::{Ledger, SharedLedger};
pub use miner::Miner;
pub use registry::{Candidate, CandidateList, RegistryError, VoterRegistry};
pub use store::{ChainStore, JsonFileStore, MemoryStore, StoreError};
pub use tally::{tally, MalformedVoteRecord, Tally};
pub use verify::{verify_chain, ChainFault, ChainInvalid, ChainReport};
pub use vote::{Vote, VoterIdPolicy};
