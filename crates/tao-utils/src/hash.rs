//! Hash and HMAC algorithm agility.
//!
//! Quotes, certificate-request hashes and the TPM2 key derivation function are
//! all parameterised by the hash algorithm named in the signing instructions.
//!
//! ## Authors
//!
//! The CloudProxy Development Team.
//!
//! ## Licensing and copyright notice
//!
//! See the `LICENSE.md` file in the CloudProxy root directory for
//! information on licensing and copyright.

use crate::error::CryptoError;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::{fmt, str::FromStr};

/// TPM2 algorithm identifier of SHA-1.
pub const TPM_ALG_SHA1: u16 = 0x0004;
/// TPM2 algorithm identifier of SHA-256.
pub const TPM_ALG_SHA256: u16 = 0x000B;

/// The hash algorithms a quote or key derivation may use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlg {
    Sha1,
    Sha256,
}

macro_rules! keyed {
    ($digest:ty, $key:expr, $parts:expr) => {{
        let mut mac = <Hmac<$digest> as Mac>::new_from_slice($key)
            .map_err(|_| CryptoError::InvalidKeyLength)?;
        for part in $parts.iter() {
            mac.update(part);
        }
        mac
    }};
}

impl HashAlg {
    /// Digest size in bytes.
    #[inline]
    pub fn size(self) -> usize {
        match self {
            HashAlg::Sha1 => 20,
            HashAlg::Sha256 => 32,
        }
    }

    #[inline]
    pub fn tpm_alg_id(self) -> u16 {
        match self {
            HashAlg::Sha1 => TPM_ALG_SHA1,
            HashAlg::Sha256 => TPM_ALG_SHA256,
        }
    }

    pub fn from_tpm_alg_id(id: u16) -> Option<Self> {
        match id {
            TPM_ALG_SHA1 => Some(HashAlg::Sha1),
            TPM_ALG_SHA256 => Some(HashAlg::Sha256),
            _ => None,
        }
    }

    pub fn digest(self, data: &[u8]) -> Vec<u8> {
        self.digest_parts(&[data])
    }

    /// Digest of the concatenation of `parts`.
    pub fn digest_parts(self, parts: &[&[u8]]) -> Vec<u8> {
        match self {
            HashAlg::Sha1 => {
                let mut hasher = Sha1::new();
                for part in parts {
                    hasher.update(part);
                }
                hasher.finalize().to_vec()
            }
            HashAlg::Sha256 => {
                let mut hasher = Sha256::new();
                for part in parts {
                    hasher.update(part);
                }
                hasher.finalize().to_vec()
            }
        }
    }

    /// HMAC under `key` of the concatenation of `parts`.
    pub fn hmac(self, key: &[u8], parts: &[&[u8]]) -> Result<Vec<u8>, CryptoError> {
        let tag = match self {
            HashAlg::Sha1 => keyed!(Sha1, key, parts).finalize().into_bytes().to_vec(),
            HashAlg::Sha256 => keyed!(Sha256, key, parts).finalize().into_bytes().to_vec(),
        };
        Ok(tag)
    }

    /// Constant-time check of `tag` against the HMAC of `parts`.
    pub fn verify_hmac(self, key: &[u8], parts: &[&[u8]], tag: &[u8]) -> Result<(), CryptoError> {
        match self {
            HashAlg::Sha1 => keyed!(Sha1, key, parts).verify_slice(tag),
            HashAlg::Sha256 => keyed!(Sha256, key, parts).verify_slice(tag),
        }
        .map_err(|_| CryptoError::IntegrityError)
    }
}

impl fmt::Display for HashAlg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashAlg::Sha1 => write!(f, "sha1"),
            HashAlg::Sha256 => write!(f, "sha256"),
        }
    }
}

impl FromStr for HashAlg {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sha1" => Ok(HashAlg::Sha1),
            "sha256" => Ok(HashAlg::Sha256),
            other => Err(CryptoError::UnsupportedHashAlgorithm(other.to_string())),
        }
    }
}

impl Default for HashAlg {
    fn default() -> Self {
        HashAlg::Sha256
    }
}

/// Compute SHA-256 hash/digest.
#[inline]
pub fn sha256(x: &[u8]) -> Vec<u8> {
    Sha256::digest(x).to_vec()
}
