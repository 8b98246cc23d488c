//! Content digests for baseline files
//!
//! Files are streamed through a fixed-size buffer so arbitrarily large
//! targets never load fully into memory. Both supported algorithms yield a
//! 256-bit hash rendered as 64 lowercase hex characters.

use crate::error::{IntegrityError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

/// Buffer size for streaming reads (64KB)
const BUFFER_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    #[default]
    Sha256,
    Blake3,
}

impl HashAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Blake3 => "blake3",
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = IntegrityError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "sha256" | "sha-256" => Ok(Self::Sha256),
            "blake3" => Ok(Self::Blake3),
            other => Err(IntegrityError::Config(format!(
                "unknown hash algorithm: {other}"
            ))),
        }
    }
}

/// Hex-encoded content hash of one file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest(String);

impl Digest {
    /// Wrap a stored hex string. Baseline text is taken as-is.
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Digest(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hash a file's full contents.
pub fn hash_file(path: &Path, algorithm: HashAlgorithm) -> Result<Digest> {
    let file = File::open(path).map_err(|e| IntegrityError::io(path, e))?;
    hash_reader(file, algorithm).map_err(|e| IntegrityError::io(path, e))
}

/// Hash everything readable from `reader`.
pub fn hash_reader<R: Read>(mut reader: R, algorithm: HashAlgorithm) -> std::io::Result<Digest> {
    let mut buffer = vec![0u8; BUFFER_SIZE];
    let hex = match algorithm {
        HashAlgorithm::Sha256 => {
            let mut hasher = Sha256::new();
            loop {
                match reader.read(&mut buffer)? {
                    0 => break,
                    n => hasher.update(&buffer[..n]),
                }
            }
            hex::encode(hasher.finalize())
        }
        HashAlgorithm::Blake3 => {
            let mut hasher = blake3::Hasher::new();
            loop {
                match reader.read(&mut buffer)? {
                    0 => break,
                    n => {
                        hasher.update(&buffer[..n]);
                    }
                }
            }
            hasher.finalize().to_hex().to_string()
        }
    };
    Ok(Digest(hex))
}
