use derive_more::Display;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::crypto::{digest_bytes, zero_digest, Digest};
use crate::error::{CodecError, RejectReason};
use crate::vote::Vote;

/// Marker text carried by the genesis payload.
pub const GENESIS_NOTE: &str = "genesis";

const HASH_DOMAIN: &str = "voteledger/block/v1";

/// Payloads the ledger knows how to write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    Genesis { note: String },
    Vote(Vote),
}

/// The `data` field of a block.
///
/// Anything that does not parse as a [`Payload`] is kept verbatim so that the
/// block can still be hashed, exported and reported by an audit.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockData {
    Known(Payload),
    Unreadable(serde_json::Value),
}

impl BlockData {
    pub fn genesis() -> Self {
        BlockData::Known(Payload::Genesis {
            note: GENESIS_NOTE.to_owned(),
        })
    }

    pub fn vote(vote: Vote) -> Self {
        BlockData::Known(Payload::Vote(vote))
    }

    pub fn as_vote(&self) -> Option<&Vote> {
        match self {
            BlockData::Known(Payload::Vote(vote)) => Some(vote),
            _ => None,
        }
    }

    /// Compact JSON text of the payload, as fed to the block hash.
    pub fn canonical_text(&self) -> Result<String, CodecError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl Serialize for BlockData {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            BlockData::Known(payload) => payload.serialize(serializer),
            BlockData::Unreadable(value) => value.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for BlockData {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        // A payload is only known if it re-encodes to exactly what was stored;
        // otherwise extra or duplicate keys would vanish from the hash input.
        let payload = match serde_json::from_value::<Payload>(value.clone()) {
            Ok(payload) => payload,
            Err(_) => return Ok(BlockData::Unreadable(value)),
        };
        match serde_json::to_value(&payload) {
            Ok(encoded) if encoded == value => Ok(BlockData::Known(payload)),
            _ => Ok(BlockData::Unreadable(value)),
        }
    }
}

#[derive(Serialize)]
struct CanonicalHeader<'a> {
    domain: &'static str,
    index: u64,
    timestamp: i64,
    data: &'a str,
    previous_hash: &'a Digest,
}

/// Hash input for one block with the nonce left open.
///
/// The canonical bytes are the bincode encoding of `(domain, index, timestamp,
/// data, previous_hash)` followed by the nonce as 8 little-endian bytes.
#[derive(Debug, Clone)]
pub struct Preimage {
    prefix: Vec<u8>,
    buffer: Vec<u8>,
}

impl Preimage {
    pub fn new(
        index: u64,
        timestamp: i64,
        data: &BlockData,
        previous_hash: &Digest,
    ) -> Result<Self, CodecError> {
        let text = data.canonical_text()?;
        let header = CanonicalHeader {
            domain: HASH_DOMAIN,
            index,
            timestamp,
            data: &text,
            previous_hash,
        };
        let prefix = bincode::serialize(&header)?;
        let buffer = Vec::with_capacity(prefix.len() + 8);
        Ok(Self { prefix, buffer })
    }

    pub fn canonical_bytes(&self, nonce: u64) -> Vec<u8> {
        let mut bytes = self.prefix.clone();
        bytes.extend_from_slice(&nonce.to_le_bytes());
        bytes
    }

    /// Same as hashing [`Preimage::canonical_bytes`], without a fresh allocation per call.
    pub fn hash(&mut self, nonce: u64) -> Digest {
        self.buffer.clear();
        self.buffer.extend_from_slice(&self.prefix);
        self.buffer.extend_from_slice(&nonce.to_le_bytes());
        digest_bytes(&self.buffer)
    }
}

/// Block fields fixed before mining starts.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockTemplate {
    pub index: u64,
    pub timestamp: i64,
    pub data: BlockData,
    pub previous_hash: Digest,
}

impl BlockTemplate {
    pub fn genesis(timestamp: i64) -> Self {
        Self {
            index: 0,
            timestamp,
            data: BlockData::genesis(),
            previous_hash: zero_digest(),
        }
    }

    /// Template for the block that follows `parent`. Fails when `parent`
    /// already carries the largest representable index.
    pub fn after(parent: &Block, timestamp: i64, data: BlockData) -> Result<Self, RejectReason> {
        let index = parent
            .index
            .checked_add(1)
            .ok_or(RejectReason::IndexOverflow(parent.index))?;
        Ok(Self {
            index,
            timestamp,
            data,
            previous_hash: parent.hash,
        })
    }

    pub fn preimage(&self) -> Result<Preimage, CodecError> {
        Preimage::new(self.index, self.timestamp, &self.data, &self.previous_hash)
    }

    pub fn seal(self, nonce: u64, hash: Digest) -> Block {
        Block {
            index: self.index,
            timestamp: self.timestamp,
            data: self.data,
            previous_hash: self.previous_hash,
            nonce,
            hash,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Display)]
#[display(fmt = "Block(index={}, nonce={}, hash={})", index, nonce, hash)]
pub struct Block {
    pub index: u64,
    pub timestamp: i64,
    pub data: BlockData,
    pub previous_hash: Digest,
    pub nonce: u64,
    pub hash: Digest,
}

impl Block {
    pub fn preimage(&self) -> Result<Preimage, CodecError> {
        Preimage::new(self.index, self.timestamp, &self.data, &self.previous_hash)
    }

    /// Recomputes the hash from the stored fields, ignoring the cached `hash`.
    pub fn compute_hash(&self) -> Result<Digest, CodecError> {
        Ok(self.preimage()?.hash(self.nonce))
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0
    }
}
