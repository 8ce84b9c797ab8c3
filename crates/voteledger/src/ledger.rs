use std::sync::{Arc, PoisonError, RwLock};

use log::{error, info, warn};
use tokio_util::sync::CancellationToken;

use crate::block::{Block, BlockData, BlockTemplate};
use crate::config::LedgerConfig;
use crate::error::{LedgerError, LedgerResult, RejectReason};
use crate::miner::Miner;
use crate::store::{ChainStore, StoreError};
use crate::tally::Tally;
use crate::verify::{verify_chain, ChainReport};
use crate::vote::{validate_identifier, Vote, VoterIdPolicy};

/// Wall-clock milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// The append-only chain of vote blocks together with the store it is saved to.
#[derive(Debug)]
pub struct Ledger<S> {
    key: String,
    blocks: Vec<Block>,
    miner: Miner,
    voter_ids: VoterIdPolicy,
    store: S,
}

impl<S: ChainStore> Ledger<S> {
    pub fn new(store: S, config: &LedgerConfig) -> Self {
        Self::with_miner(store, config.chain_key.clone(), config.miner(), config.voter_ids)
    }

    pub fn with_miner(
        store: S,
        key: impl Into<String>,
        miner: Miner,
        voter_ids: VoterIdPolicy,
    ) -> Self {
        Self {
            key: key.into(),
            blocks: Vec::new(),
            miner,
            voter_ids,
            store,
        }
    }

    /// Lets `token` abort any mining this ledger starts.
    pub fn cancel_with(mut self, token: CancellationToken) -> Self {
        self.miner = self.miner.with_cancellation(token);
        self
    }

    /// Loads the stored chain, or mines and saves a genesis block when
    /// nothing is stored yet. Other storage failures are returned as-is.
    pub fn initialize(&mut self) -> LedgerResult<&[Block]> {
        match self.store.load(&self.key) {
            Ok(blocks) if !blocks.is_empty() => {
                info!("Loaded chain {} with {} blocks", self.key, blocks.len());
                self.blocks = blocks;
            }
            Ok(_) | Err(StoreError::NotFound(_)) => {
                info!("No chain stored under {}, creating genesis", self.key);
                self.blocks = vec![self.mine_genesis()?];
                self.persist()?;
            }
            Err(e) => {
                error!("Failed to load chain {}; error = {}", self.key, e);
                return Err(e.into());
            }
        }
        Ok(&self.blocks)
    }

    fn mine_genesis(&self) -> LedgerResult<Block> {
        self.miner.mine(BlockTemplate::genesis(now_millis()))
    }

    fn persist(&self) -> LedgerResult<()> {
        self.store.save(&self.key, &self.blocks)?;
        Ok(())
    }

    /// Mines a block carrying one vote onto the tail and saves the chain.
    ///
    /// Eligibility is the caller's business; only the shape of the
    /// identifiers is checked here. If saving fails the block is dropped
    /// again so memory never runs ahead of storage.
    pub fn append_vote(
        &mut self,
        candidate_id: &str,
        voter_id: Option<&str>,
    ) -> LedgerResult<&Block> {
        let reject = |reason: RejectReason| {
            warn!("Rejected vote; reason = {}", reason);
            LedgerError::AppendRejected(reason)
        };

        let parent = self
            .blocks
            .last()
            .ok_or_else(|| reject(RejectReason::NotInitialized))?;
        validate_identifier("candidate_id", candidate_id).map_err(reject)?;
        if let Some(voter_id) = voter_id {
            validate_identifier("voter_id", voter_id).map_err(reject)?;
        }

        // Never stamp a block earlier than its parent.
        let timestamp = now_millis().max(parent.timestamp);
        let vote = Vote::new(
            candidate_id.to_owned(),
            self.voter_ids.apply(voter_id),
            timestamp,
        );
        let template =
            BlockTemplate::after(parent, timestamp, BlockData::vote(vote)).map_err(reject)?;
        let block = self.miner.mine(template)?;

        self.blocks.push(block);
        if let Err(e) = self.persist() {
            error!("Failed to save chain {}; dropping new block; error = {}", self.key, e);
            self.blocks.pop();
            return Err(e);
        }

        let block = &self.blocks[self.blocks.len() - 1];
        info!("Appended {}", block);
        Ok(block)
    }

    /// Discards the whole chain and starts over from a fresh genesis block.
    pub fn reset(&mut self) -> LedgerResult<&[Block]> {
        let genesis = self.mine_genesis()?;
        let previous = std::mem::replace(&mut self.blocks, vec![genesis]);
        if let Err(e) = self.persist() {
            self.blocks = previous;
            return Err(e);
        }
        warn!("Reset chain {}; {} blocks discarded", self.key, previous.len());
        Ok(&self.blocks)
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S> Ledger<S> {
    pub fn is_chain_valid(&self) -> ChainReport {
        verify_chain(&self.blocks, self.miner.difficulty())
    }

    pub fn tally(&self) -> Tally {
        Tally::from_blocks(&self.blocks)
    }

    /// Replaces the in-memory chain. Nothing is verified; run
    /// [`Ledger::is_chain_valid`] to audit what was loaded.
    pub fn load(&mut self, blocks: Vec<Block>) {
        self.blocks = blocks;
    }

    pub fn export(&self) -> Vec<Block> {
        self.blocks.clone()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn tail(&self) -> Option<&Block> {
        self.blocks.last()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn is_initialized(&self) -> bool {
        !self.blocks.is_empty()
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn difficulty(&self) -> usize {
        self.miner.difficulty()
    }
}

/// A ledger behind a single reader/writer lock. Appends hold the write side;
/// audits and tallies share the read side.
#[derive(Debug)]
pub struct SharedLedger<S> {
    inner: Arc<RwLock<Ledger<S>>>,
}

impl<S> Clone for SharedLedger<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S: ChainStore> SharedLedger<S> {
    pub fn new(ledger: Ledger<S>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ledger)),
        }
    }

    pub fn append_vote(&self, candidate_id: &str, voter_id: Option<&str>) -> LedgerResult<Block> {
        let mut ledger = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        ledger.append_vote(candidate_id, voter_id).cloned()
    }

    pub fn is_chain_valid(&self) -> ChainReport {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_chain_valid()
    }

    pub fn tally(&self) -> Tally {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .tally()
    }

    pub fn export(&self) -> Vec<Block> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .export()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
