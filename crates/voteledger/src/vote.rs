use clap::ValueEnum;
use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::crypto::hash_one_thing;
use crate::error::RejectReason;

/// Longest identifier accepted for candidates and voters, in bytes.
pub const MAX_IDENTIFIER_LEN: usize = 128;

/// One ballot as it is recorded inside a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Display)]
#[display(fmt = "Vote(candidate_id={}, cast_at={})", candidate_id, cast_at)]
pub struct Vote {
    pub candidate_id: String,

    /// Present only when the voter-id policy keeps one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voter_id: Option<String>,

    /// Milliseconds since the Unix epoch.
    pub cast_at: i64,
}

impl Vote {
    pub fn new(candidate_id: String, voter_id: Option<String>, cast_at: i64) -> Self {
        Self {
            candidate_id,
            voter_id,
            cast_at,
        }
    }

    pub fn validate(&self) -> Result<(), RejectReason> {
        validate_identifier("candidate_id", &self.candidate_id)?;
        if let Some(voter_id) = &self.voter_id {
            validate_identifier("voter_id", voter_id)?;
        }
        Ok(())
    }
}

pub fn validate_identifier(field: &'static str, value: &str) -> Result<(), RejectReason> {
    if value.is_empty() {
        return Err(RejectReason::EmptyField(field));
    }
    if value.trim() != value {
        return Err(RejectReason::UntrimmedField(field));
    }
    if value.chars().any(char::is_control) {
        return Err(RejectReason::ControlCharacters(field));
    }
    if value.len() > MAX_IDENTIFIER_LEN {
        return Err(RejectReason::TooLong(field, MAX_IDENTIFIER_LEN));
    }
    Ok(())
}

/// How a voter identifier is written into the chain.
///
/// Every block is readable by anyone holding the chain file, so storing the raw
/// identifier ties each ballot to a voter. `Hashed` keeps a stable pseudonym that
/// an auditor can match against a known voter id; `Omit` drops it entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoterIdPolicy {
    Omit,
    #[default]
    Hashed,
    Plain,
}

impl VoterIdPolicy {
    pub fn apply(&self, voter_id: Option<&str>) -> Option<String> {
        let voter_id = voter_id?;
        match self {
            VoterIdPolicy::Omit => None,
            VoterIdPolicy::Hashed => Some(hash_one_thing("voter_id", voter_id).to_hex()),
            VoterIdPolicy::Plain => Some(voter_id.to_owned()),
        }
    }
}
