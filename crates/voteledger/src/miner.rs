use log::{debug, warn};
use tokio_util::sync::CancellationToken;

use crate::block::{Block, BlockTemplate};
use crate::crypto::DIGEST_HEX_LEN;
use crate::error::{LedgerError, LedgerResult};

/// Proof-of-work search over ascending nonces.
///
/// The attempt guard and the cancellation token are both optional; without
/// them the search runs until a nonce is found.
#[derive(Debug, Clone)]
pub struct Miner {
    difficulty: usize,
    max_attempts: Option<u64>,
    cancel: Option<CancellationToken>,
}

impl Miner {
    pub fn new(difficulty: usize) -> Self {
        Self {
            difficulty,
            max_attempts: None,
            cancel: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: Option<u64>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    pub fn max_attempts(&self) -> Option<u64> {
        self.max_attempts
    }

    /// Finds the smallest nonce whose hash carries at least `difficulty`
    /// leading zero hex characters and seals the block with it.
    pub fn mine(&self, template: BlockTemplate) -> LedgerResult<Block> {
        let difficulty = self.difficulty;
        if difficulty > DIGEST_HEX_LEN {
            warn!(
                "Difficulty {} can never be met by a {}-character hash",
                difficulty, DIGEST_HEX_LEN
            );
            return Err(LedgerError::MiningExhausted {
                attempts: 0,
                difficulty,
            });
        }

        let mut preimage = template.preimage()?;
        let mut attempts: u64 = 0;
        let mut nonce: u64 = 0;

        loop {
            if self.max_attempts.is_some_and(|max| attempts >= max) {
                warn!(
                    "Mining block {} gave up after {} attempts at difficulty {}",
                    template.index, attempts, difficulty
                );
                return Err(LedgerError::MiningExhausted {
                    attempts,
                    difficulty,
                });
            }
            if self.cancel.as_ref().is_some_and(|token| token.is_cancelled()) {
                return Err(LedgerError::MiningCancelled { attempts });
            }

            let hash = preimage.hash(nonce);
            attempts += 1;
            if hash.meets_difficulty(difficulty) {
                debug!(
                    "Mined block {}; nonce = {}, attempts = {}, hash = {}",
                    template.index, nonce, attempts, hash
                );
                return Ok(template.seal(nonce, hash));
            }

            nonce = match nonce.checked_add(1) {
                Some(next) => next,
                None => {
                    return Err(LedgerError::MiningExhausted {
                        attempts,
                        difficulty,
                    })
                }
            };
        }
    }
}
