//! Digest provider.
//!
//! Wraps the supported hash constructions behind one incremental
//! [`Accumulator`]. Every digest the crate produces (file contents and
//! directory compositions alike) goes through a fresh accumulator obtained from
//! [`DigestAlgorithm::accumulator`]; accumulators are never shared or reused.
//!
//! # Example
//!
//! ```
//! use pathfingerprint::digest::DigestAlgorithm;
//!
//! let algorithm: DigestAlgorithm = "sha1".parse().unwrap();
//! let mut acc = algorithm.accumulator();
//! acc.write(b"abc");
//! assert_eq!(acc.finalize(), "a9993e364706816aba3e25717850c26c9cd0d89d");
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha1::Digest as _;

/// Errors raised when selecting a digest algorithm.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DigestError {
    /// The algorithm name is not one of the supported constructions.
    #[error("Hash algorithm [{0}] is not valid/supported (expected sha1, sha256 or blake3)")]
    UnsupportedAlgorithm(String),
}

/// Supported hash constructions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    /// SHA-1, 160-bit output.
    #[default]
    Sha1,
    /// SHA-256, 256-bit output.
    Sha256,
    /// BLAKE3, 256-bit output.
    Blake3,
}

impl DigestAlgorithm {
    /// Canonical lowercase name, as stored in the catalog.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
            Self::Blake3 => "blake3",
        }
    }

    /// Length in hex characters of a finalized digest.
    #[must_use]
    pub fn hex_len(self) -> usize {
        match self {
            Self::Sha1 => 40,
            Self::Sha256 | Self::Blake3 => 64,
        }
    }

    /// Create a fresh accumulator for this algorithm.
    #[must_use]
    pub fn accumulator(self) -> Accumulator {
        let inner = match self {
            Self::Sha1 => Inner::Sha1(sha1::Sha1::new()),
            Self::Sha256 => Inner::Sha256(sha2::Sha256::new()),
            Self::Blake3 => Inner::Blake3(Box::new(blake3::Hasher::new())),
        };
        Accumulator { inner }
    }

    /// Digest a complete byte slice in one call.
    #[must_use]
    pub fn digest(self, data: &[u8]) -> String {
        let mut acc = self.accumulator();
        acc.write(data);
        acc.finalize()
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sha1" => Ok(Self::Sha1),
            "sha256" => Ok(Self::Sha256),
            "blake3" => Ok(Self::Blake3),
            _ => Err(DigestError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

enum Inner {
    Sha1(sha1::Sha1),
    Sha256(sha2::Sha256),
    // blake3's hasher carries a large chunk stack
    Blake3(Box<blake3::Hasher>),
}

/// Incremental hash accumulator.
pub struct Accumulator {
    inner: Inner,
}

impl Accumulator {
    /// Feed bytes into the accumulator.
    pub fn write(&mut self, bytes: &[u8]) {
        match &mut self.inner {
            Inner::Sha1(h) => h.update(bytes),
            Inner::Sha256(h) => h.update(bytes),
            Inner::Blake3(h) => {
                h.update(bytes);
            }
        }
    }

    /// Consume the accumulator and return the lowercase hex digest.
    #[must_use]
    pub fn finalize(self) -> String {
        match self.inner {
            Inner::Sha1(h) => format!("{:x}", h.finalize()),
            Inner::Sha256(h) => format!("{:x}", h.finalize()),
            Inner::Blake3(h) => h.finalize().to_hex().to_string(),
        }
    }
}

impl fmt::Debug for Accumulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.inner {
            Inner::Sha1(_) => "sha1",
            Inner::Sha256(_) => "sha256",
            Inner::Blake3(_) => "blake3",
        };
        f.debug_struct("Accumulator").field("algorithm", &name).finish()
    }
}
