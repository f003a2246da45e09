//! The hashing capability and its implementations.

use anyhow::Error;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

mod standard;
mod xor;

pub use standard::StandardHasher;
pub use xor::XorHasher;

/// A raw digest produced by a [`Hasher`].
///
/// The length is fixed per algorithm but opaque to consumers; tree nodes at
/// every depth carry one of these.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Digest(#[serde(with = "serde_bytes")] Vec<u8>);

impl Digest {
    /// Wraps raw digest bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// The digest length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the digest holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrows the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consumes the digest, yielding its bytes.
    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for Digest {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for Digest {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

/// The hash algorithms veritree can be configured with.
///
/// `Xor` is an 8-bit folding hash used exclusively to make test fixtures
/// computable by hand.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub enum HashAlgorithm {
    Sha256,
    Sha512,
    Blake2b256,
    Xor,
}

impl HashAlgorithm {
    /// Builds a hasher instance for this algorithm.
    pub fn hasher(&self) -> Box<dyn Hasher> {
        match self {
            HashAlgorithm::Sha256 => Box::new(StandardHasher::<sha2::Sha256>::new(*self)),
            HashAlgorithm::Sha512 => Box::new(StandardHasher::<sha2::Sha512>::new(*self)),
            HashAlgorithm::Blake2b256 => {
                Box::new(StandardHasher::<blake2::Blake2b<digest::consts::U32>>::new(*self))
            }
            HashAlgorithm::Xor => Box::new(XorHasher),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashAlgorithm::Sha256 => write!(f, "sha256"),
            HashAlgorithm::Sha512 => write!(f, "sha512"),
            HashAlgorithm::Blake2b256 => write!(f, "blake2b-256"),
            HashAlgorithm::Xor => write!(f, "xor"),
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sha256" => Ok(HashAlgorithm::Sha256),
            "sha512" => Ok(HashAlgorithm::Sha512),
            "blake2b-256" => Ok(HashAlgorithm::Blake2b256),
            "xor" => Ok(HashAlgorithm::Xor),
            _ => Err(Error::msg(format!("illegal hash algorithm '{s}'"))),
        }
    }
}

/// A polymorphic hashing capability.
///
/// Implementations must be deterministic and length-stable: the same parts
/// always produce the same digest, and every digest has exactly
/// `output_bits() / 8` bytes.
pub trait Hasher: Send + Sync {
    /// The algorithm backing this hasher.
    fn algorithm(&self) -> HashAlgorithm;

    /// The digest length in bits.
    fn output_bits(&self) -> u16;

    /// Hashes the concatenation of `parts`.
    fn digest(&self, parts: &[&[u8]]) -> Digest;

    /// Hashes `parts` prefixed with `salt`.
    ///
    /// Tree engines salt interior and leaf hashes with the node position to
    /// prevent second-preimage collisions across heights.
    fn salted(&self, salt: &[u8], parts: &[&[u8]]) -> Digest;
}
