//! Signing instructions
//!
//! What the policy authority puts into certificates it issues for program
//! keys, read from a JSON file.
//!
//! ## Authors
//!
//! The CloudProxy Development Team.
//!
//! ## Licensing and copyright notice
//!
//! See the `LICENSE.md` file in the CloudProxy root directory for
//! information on licensing and copyright.

use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, time::Duration};
use tao_utils::HashAlg;

/// One year, in seconds.
pub const DEFAULT_DURATION: u64 = 31_536_000;
pub const DEFAULT_PURPOSE: &str = "digitalSignature, keyEncipherment";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SigningInstructions {
    /// Common name of the issuer written into certificates.
    pub issuer: String,
    /// Certificate lifetime in seconds.
    pub duration: u64,
    pub purpose: String,
    /// Hash for quotes and key derivation.
    pub hash_alg: HashAlg,
    /// Issue CA certificates rather than end-entity certificates.
    pub is_ca: bool,
    /// Whether the authority may sign at all.
    pub can_sign: bool,
}

impl Default for SigningInstructions {
    fn default() -> Self {
        SigningInstructions {
            issuer: String::new(),
            duration: DEFAULT_DURATION,
            purpose: DEFAULT_PURPOSE.to_string(),
            hash_alg: HashAlg::Sha256,
            is_ca: false,
            can_sign: true,
        }
    }
}

impl SigningInstructions {
    pub fn new<T: Into<String>>(issuer: T) -> Self {
        SigningInstructions {
            issuer: issuer.into(),
            ..Default::default()
        }
    }

    #[inline]
    pub fn validity(&self) -> Duration {
        Duration::from_secs(self.duration)
    }

    /// Whether certificates may be used for key transport.
    pub fn key_encipherment(&self) -> bool {
        self.purpose
            .split(',')
            .any(|usage| usage.trim() == "keyEncipherment")
    }

    pub fn from_file(path: &Path) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_slice(&fs::read(path)?)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ProtocolError> {
        fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }
}
