//! Voter and candidate bookkeeping kept beside the chain.
//!
//! Eligibility ("one vote per voter") is decided here, before the ledger is
//! asked to append anything.

use std::collections::BTreeMap;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::crypto::hash_labelled;
use crate::error::RejectReason;
use crate::store::{read_json, write_json, StoreError};
use crate::vote::validate_identifier;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("{0}")]
    Invalid(RejectReason),

    #[error("voter {0} is already registered")]
    AlreadyRegistered(String),

    #[error("voter {0} is not registered")]
    NotRegistered(String),

    #[error("wrong password for voter {0}")]
    BadPassword(String),

    #[error("voter {0} has already voted")]
    AlreadyVoted(String),

    #[error("candidate {0} already exists")]
    DuplicateCandidate(String),

    #[error("unknown candidate {0}")]
    UnknownCandidate(String),
}

impl From<RejectReason> for RegistryError {
    fn from(reason: RejectReason) -> Self {
        RegistryError::Invalid(reason)
    }
}

/// SHA-256 of the password, salted with the voter id.
pub fn hash_password(voter_id: &str, password: &str) -> String {
    hash_labelled(
        "voteledger/password",
        &[
            ("voter_id", voter_id.as_bytes()),
            ("password", password.as_bytes()),
        ],
    )
    .to_hex()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub name: String,
}

impl Candidate {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateList {
    candidates: Vec<Candidate>,
}

impl CandidateList {
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        Ok(read_json(path)?.unwrap_or_default())
    }

    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        write_json(path, self)
    }

    pub fn add(&mut self, candidate: Candidate) -> Result<(), RegistryError> {
        validate_identifier("candidate_id", &candidate.id)?;
        validate_identifier("candidate_name", &candidate.name)?;
        if self.find(&candidate.id).is_some() {
            return Err(RegistryError::DuplicateCandidate(candidate.id));
        }
        info!("Added candidate {} ({})", candidate.id, candidate.name);
        self.candidates.push(candidate);
        Ok(())
    }

    pub fn find(&self, id: &str) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.id == id)
    }

    /// An empty list accepts any candidate id.
    pub fn check(&self, id: &str) -> Result<(), RegistryError> {
        if self.candidates.is_empty() || self.find(id).is_some() {
            Ok(())
        } else {
            Err(RegistryError::UnknownCandidate(id.to_owned()))
        }
    }

    pub fn as_slice(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterRecord {
    pub name: String,
    pub password_hash: String,
    #[serde(default)]
    pub voted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Turnout {
    pub registered: usize,
    pub voted: usize,
}

impl Turnout {
    pub fn not_voted(&self) -> usize {
        self.registered - self.voted
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoterRegistry {
    voters: BTreeMap<String, VoterRecord>,
}

impl VoterRegistry {
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        Ok(read_json(path)?.unwrap_or_default())
    }

    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        write_json(path, self)
    }

    pub fn register(
        &mut self,
        voter_id: &str,
        name: &str,
        password: &str,
    ) -> Result<(), RegistryError> {
        validate_identifier("voter_id", voter_id)?;
        validate_identifier("name", name)?;
        if password.is_empty() {
            return Err(RejectReason::EmptyField("password").into());
        }
        if self.voters.contains_key(voter_id) {
            return Err(RegistryError::AlreadyRegistered(voter_id.to_owned()));
        }
        self.voters.insert(
            voter_id.to_owned(),
            VoterRecord {
                name: name.to_owned(),
                password_hash: hash_password(voter_id, password),
                voted: false,
            },
        );
        info!("Registered voter {}", voter_id);
        Ok(())
    }

    /// Checks credentials and that the voter may still cast a ballot.
    pub fn authenticate(
        &self,
        voter_id: &str,
        password: &str,
    ) -> Result<&VoterRecord, RegistryError> {
        let record = self
            .voters
            .get(voter_id)
            .ok_or_else(|| RegistryError::NotRegistered(voter_id.to_owned()))?;
        if record.password_hash != hash_password(voter_id, password) {
            return Err(RegistryError::BadPassword(voter_id.to_owned()));
        }
        if record.voted {
            return Err(RegistryError::AlreadyVoted(voter_id.to_owned()));
        }
        Ok(record)
    }

    pub fn mark_voted(&mut self, voter_id: &str) -> Result<(), RegistryError> {
        let record = self
            .voters
            .get_mut(voter_id)
            .ok_or_else(|| RegistryError::NotRegistered(voter_id.to_owned()))?;
        record.voted = true;
        Ok(())
    }

    pub fn get(&self, voter_id: &str) -> Option<&VoterRecord> {
        self.voters.get(voter_id)
    }

    /// Registered voters ordered by voter id.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &VoterRecord)> {
        self.voters.iter().map(|(id, record)| (id.as_str(), record))
    }

    pub fn turnout(&self) -> Turnout {
        Turnout {
            registered: self.voters.len(),
            voted: self.voters.values().filter(|v| v.voted).count(),
        }
    }

    pub fn clear(&mut self) {
        self.voters.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_authenticate() {
        let mut registry = VoterRegistry::default();
        registry.register("v1", "Ada", "secret").unwrap();
        assert_eq!(
            registry.register("v1", "Ada", "other"),
            Err(RegistryError::AlreadyRegistered("v1".into()))
        );
        assert_eq!(registry.authenticate("v1", "secret").unwrap().name, "Ada");
        assert_eq!(
            registry.authenticate("v1", "wrong"),
            Err(RegistryError::BadPassword("v1".into()))
        );
        assert_eq!(
            registry.authenticate("v2", "secret"),
            Err(RegistryError::NotRegistered("v2".into()))
        );
    }

    #[test]
    fn test_voter_cannot_vote_twice() {
        let mut registry = VoterRegistry::default();
        registry.register("v1", "Ada", "secret").unwrap();
        registry.mark_voted("v1").unwrap();
        assert_eq!(
            registry.authenticate("v1", "secret"),
            Err(RegistryError::AlreadyVoted("v1".into()))
        );
        assert_eq!(
            registry.turnout(),
            Turnout {
                registered: 1,
                voted: 1
            }
        );
    }

    #[test]
    fn test_register_rejects_bad_input() {
        let mut registry = VoterRegistry::default();
        assert_eq!(
            registry.register("", "Ada", "pw"),
            Err(RegistryError::Invalid(RejectReason::EmptyField("voter_id")))
        );
        assert_eq!(
            registry.register("v1", "Ada", ""),
            Err(RegistryError::Invalid(RejectReason::EmptyField("password")))
        );
    }

    #[test]
    fn test_iter_lists_voters_in_id_order() {
        let mut registry = VoterRegistry::default();
        registry.register("v2", "Bo", "pw").unwrap();
        registry.register("v1", "Ada", "pw").unwrap();
        registry.mark_voted("v2").unwrap();

        let listed: Vec<_> = registry
            .iter()
            .map(|(id, record)| (id, record.name.as_str(), record.voted))
            .collect();
        assert_eq!(listed, vec![("v1", "Ada", false), ("v2", "Bo", true)]);
        assert!(registry.iter().all(|(_, r)| r.password_hash.len() == 64));
    }

    #[test]
    fn test_password_hash_is_salted_by_voter() {
        assert_ne!(hash_password("v1", "pw"), hash_password("v2", "pw"));
        assert_eq!(hash_password("v1", "pw"), hash_password("v1", "pw"));
    }

    #[test]
    fn test_candidate_list() {
        let mut list = CandidateList::default();
        assert!(list.check("anyone").is_ok());
        list.add(Candidate::new("c1", "Carol")).unwrap();
        assert_eq!(
            list.add(Candidate::new("c1", "Other")),
            Err(RegistryError::DuplicateCandidate("c1".into()))
        );
        assert!(list.check("c1").is_ok());
        assert_eq!(
            list.check("c2"),
            Err(RegistryError::UnknownCandidate("c2".into()))
        );
    }

    #[test]
    fn test_registry_json_shape() {
        let mut registry = VoterRegistry::default();
        registry.register("v1", "Ada", "pw").unwrap();
        let json = serde_json::to_value(&registry).unwrap();
        assert_eq!(json["v1"]["name"], "Ada");
        assert_eq!(json["v1"]["voted"], false);
    }
}
