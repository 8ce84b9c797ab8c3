use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Serialize};
use sha2::Digest as Sha2Digest;
use sha2::{self, Sha256};

/// Length of a digest rendered as lowercase hex.
pub const DIGEST_HEX_LEN: usize = 64;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum DigestParseError {
    #[error("expected {expected} digest bytes, found {found}")]
    InvalidLength { expected: usize, found: usize },

    #[error("digest is not valid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest(pub digest::Output<sha2::Sha256>);

impl Digest {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, DigestParseError> {
        let expected = Sha256::output_size();
        if bytes.len() != expected {
            return Err(DigestParseError::InvalidLength {
                expected,
                found: bytes.len(),
            });
        }
        Ok(Digest(*digest::Output::<Sha256>::from_slice(bytes)))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    /// Number of leading `'0'` characters in the hex form of this digest.
    pub fn leading_zero_count(&self) -> usize {
        let mut count = 0;
        for b in self.0.iter() {
            if *b == 0 {
                count += 2;
                continue;
            }
            if b >> 4 == 0 {
                count += 1;
            }
            break;
        }
        count
    }

    pub fn meets_difficulty(&self, difficulty: usize) -> bool {
        self.leading_zero_count() >= difficulty
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        // JSON and other text formats carry the hex form.
        if deserializer.is_human_readable() {
            let text = String::deserialize(deserializer)?;
            return text.parse().map_err(de::Error::custom);
        }

        struct DigestVisitor;
        impl<'de> Visitor<'de> for DigestVisitor {
            type Value = Vec<u8>;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a sha256 digest")
            }

            fn visit_bytes<E>(self, v: &[u8]) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(Vec::from(v))
            }
        }

        let inner = deserializer.deserialize_bytes(DigestVisitor)?;
        Digest::from_slice(&inner).map_err(de::Error::custom)
    }
}

impl Serialize for Digest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_hex())
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl std::fmt::Debug for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("sha256:")?;
        for b in self.0.iter() {
            f.write_fmt(format_args!("{:02x}", b))?;
        }
        Ok(())
    }
}

impl std::fmt::Display for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Digest {
    type Err = DigestParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        Digest::from_slice(&bytes)
    }
}

/// The sentinel carried by the genesis block in place of a parent hash.
pub fn zero_digest() -> Digest {
    Digest(digest::Output::<sha2::Sha256>::default())
}

impl From<digest::Output<sha2::Sha256>> for Digest {
    fn from(d: digest::Output<sha2::Sha256>) -> Self {
        Self(d)
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// SHA-256 over already-canonicalised bytes.
pub fn digest_bytes(canonical_bytes: &[u8]) -> Digest {
    let mut hasher = sha2::Sha256::new();
    hasher.update(canonical_bytes);
    hasher.finalize().into()
}

/// Domain-separated hash over labelled parts. Each part is length-prefixed so
/// that no two distinct part lists feed the hasher the same bytes.
pub fn hash_labelled(domain: &str, parts: &[(&str, &[u8])]) -> Digest {
    let mut hasher = sha2::Sha256::new();
    hasher.update(domain.as_bytes());
    for (label, value) in parts {
        hasher.update((label.len() as u64).to_le_bytes());
        hasher.update(label.as_bytes());
        hasher.update((value.len() as u64).to_le_bytes());
        hasher.update(value);
    }

    hasher.finalize().into()
}

pub fn hash_one_thing<T1>(label1: &str, v1: T1) -> Digest
where
    T1: AsRef<[u8]>,
{
    hash_labelled("hash_one_thing", &[(label1, v1.as_ref())])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bincode_serializer() {
        let digest = hash_one_thing("Test Value", "Hey there!");
        let serialized = bincode::serialize(&digest).unwrap();
        let deserialized: Digest = bincode::deserialize(&serialized).unwrap();
        assert_eq!(digest, deserialized);
    }

    #[test]
    fn test_json_uses_hex() {
        let digest = hash_one_thing("Test Value", "Hey there!");
        let json = serde_json::to_string(&digest).unwrap();
        assert_eq!(json, format!("\"{}\"", digest.to_hex()));
        let back: Digest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, digest);
    }

    #[test]
    fn test_digest_is_deterministic() {
        assert_eq!(digest_bytes(b"ballot"), digest_bytes(b"ballot"));
        assert_ne!(digest_bytes(b"ballot"), digest_bytes(b"ballots"));
        assert_eq!(digest_bytes(b"").to_hex().len(), DIGEST_HEX_LEN);
    }

    #[test]
    fn test_labels_separate_parts() {
        let a = hash_labelled("d", &[("x", &b"ab"[..]), ("y", &b"c"[..])]);
        let b = hash_labelled("d", &[("x", &b"a"[..]), ("y", &b"bc"[..])]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_leading_zero_count() {
        let mut bytes = [0xffu8; 32];
        assert_eq!(Digest::from_slice(&bytes).unwrap().leading_zero_count(), 0);
        bytes[0] = 0x0f;
        assert_eq!(Digest::from_slice(&bytes).unwrap().leading_zero_count(), 1);
        bytes[0] = 0x00;
        bytes[1] = 0x01;
        let d = Digest::from_slice(&bytes).unwrap();
        assert_eq!(d.leading_zero_count(), 3);
        assert!(d.meets_difficulty(3));
        assert!(!d.meets_difficulty(4));
        assert_eq!(zero_digest().leading_zero_count(), DIGEST_HEX_LEN);
    }

    #[test]
    fn test_parse_rejects_wrong_length() {
        assert_eq!(
            "abcd".parse::<Digest>(),
            Err(DigestParseError::InvalidLength {
                expected: 32,
                found: 2
            })
        );
        assert!("zz".parse::<Digest>().is_err());
        assert!(zero_digest().is_zero());
    }
}
