#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Checksums for mirrored repository files
//!
//! APT indexes declare MD5, SHA1, SHA256 and SHA512 digests side by side.
//! This crate parses those digests, computes them over files and streams,
//! and checks whether two declarations of the same file agree.

mod algorithm;
mod set;

pub use algorithm::ChecksumAlgorithm;
pub use set::{ChecksumSet, SetHasher};

use aptsync_errors::{Error, NetworkError, StorageError};
use md5::Md5;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};
use std::fmt;
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

/// Size of chunks for streaming hash computation
const CHUNK_SIZE: usize = 64 * 1024; // 64KB

/// A single digest tagged with the algorithm that produced it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checksum {
    algorithm: ChecksumAlgorithm,
    hex: String,
}

impl Checksum {
    /// Parse a hex digest declared for `algorithm`
    ///
    /// # Errors
    /// Returns an error if the input is not hexadecimal or has the wrong length
    /// for the algorithm.
    pub fn from_hex(algorithm: ChecksumAlgorithm, s: &str) -> Result<Self, Error> {
        let hex = s.trim().to_ascii_lowercase();
        if hex.len() != algorithm.hex_len() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(StorageError::CorruptedData {
                message: format!("invalid {algorithm} digest: {s}"),
            }
            .into());
        }
        Ok(Self { algorithm, hex })
    }

    #[must_use]
    pub fn algorithm(&self) -> ChecksumAlgorithm {
        self.algorithm
    }

    #[must_use]
    pub fn to_hex(&self) -> &str {
        &self.hex
    }

    /// Compute a digest over a byte slice
    #[must_use]
    pub fn from_data(algorithm: ChecksumAlgorithm, data: &[u8]) -> Self {
        let mut hasher = StreamHasher::new(algorithm);
        hasher.update(data);
        hasher.finalize()
    }

    /// Compute a digest over a file
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or read.
    pub async fn hash_file(algorithm: ChecksumAlgorithm, path: &Path) -> Result<Self, Error> {
        let mut file = File::open(path)
            .await
            .map_err(|e| StorageError::from_io_with_path(&e, path))?;

        let mut hasher = StreamHasher::new(algorithm);
        let mut buffer = vec![0; CHUNK_SIZE];

        loop {
            let n = file.read(&mut buffer).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }

        Ok(hasher.finalize())
    }

    /// Check `self` against a computed digest of the same algorithm
    ///
    /// # Errors
    /// Returns `ChecksumMismatch` when the digests differ.
    pub fn verify(&self, actual: &Checksum) -> Result<(), Error> {
        if self == actual {
            Ok(())
        } else {
            Err(NetworkError::ChecksumMismatch {
                expected: self.to_string(),
                actual: actual.to_string(),
            }
            .into())
        }
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}

/// Incremental hasher for any supported algorithm
pub enum StreamHasher {
    Md5(Md5),
    Sha1(Sha1),
    Sha256(Sha256),
    Sha512(Sha512),
}

impl StreamHasher {
    #[must_use]
    pub fn new(algorithm: ChecksumAlgorithm) -> Self {
        match algorithm {
            ChecksumAlgorithm::Md5 => Self::Md5(Md5::new()),
            ChecksumAlgorithm::Sha1 => Self::Sha1(Sha1::new()),
            ChecksumAlgorithm::Sha256 => Self::Sha256(Sha256::new()),
            ChecksumAlgorithm::Sha512 => Self::Sha512(Sha512::new()),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::Md5(h) => h.update(data),
            Self::Sha1(h) => h.update(data),
            Self::Sha256(h) => h.update(data),
            Self::Sha512(h) => h.update(data),
        }
    }

    #[must_use]
    pub fn finalize(self) -> Checksum {
        let (algorithm, hex) = match self {
            Self::Md5(h) => (ChecksumAlgorithm::Md5, hex::encode(h.finalize())),
            Self::Sha1(h) => (ChecksumAlgorithm::Sha1, hex::encode(h.finalize())),
            Self::Sha256(h) => (ChecksumAlgorithm::Sha256, hex::encode(h.finalize())),
            Self::Sha512(h) => (ChecksumAlgorithm::Sha512, hex::encode(h.finalize())),
        };
        Checksum { algorithm, hex }
    }
}
