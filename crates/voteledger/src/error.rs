use derive_more::Display;

use crate::store::StoreError;

pub type LedgerResult<T> = core::result::Result<T, LedgerError>;

/// Why an input was refused before any mining took place.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum RejectReason {
    #[display(fmt = "ledger has not been initialized")]
    NotInitialized,

    #[display(fmt = "{} must not be empty", _0)]
    EmptyField(&'static str),

    #[display(fmt = "{} has leading or trailing whitespace", _0)]
    UntrimmedField(&'static str),

    #[display(fmt = "{} contains control characters", _0)]
    ControlCharacters(&'static str),

    #[display(fmt = "{} is longer than {} bytes", _0, _1)]
    TooLong(&'static str, usize),

    #[display(fmt = "block index {} has no successor", _0)]
    IndexOverflow(u64),
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Serialization error: {0}")]
    Bincode(#[from] Box<bincode::ErrorKind>),

    #[error("JSON encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("mining exhausted after {attempts} attempts at difficulty {difficulty}")]
    MiningExhausted { attempts: u64, difficulty: usize },

    #[error("mining cancelled after {attempts} attempts")]
    MiningCancelled { attempts: u64 },

    #[error("append rejected: {0}")]
    AppendRejected(RejectReason),

    #[error("Storage failure: {0}")]
    Io(#[from] StoreError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}
