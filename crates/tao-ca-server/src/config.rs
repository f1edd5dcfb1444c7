//! CA server configuration
//!
//! The server reads one JSON file at startup, for example:
//!
//! ```json
//! {
//!   "listen_address": "127.0.0.1:8124",
//!   "policy_key_path": "policy_keys/signer",
//!   "policy_cert_path": "policy_keys/cert",
//!   "policy_details": { "common_name": "CloudProxy policy" },
//!   "acl_path": "acls",
//!   "first_serial": 2,
//!   "leaf_duration": 31536000
//! }
//! ```
//!
//! ## Authors
//!
//! The CloudProxy Development Team.
//!
//! ## Licensing and copyright notice
//!
//! See the `LICENSE.md` file in the CloudProxy root directory for
//! information on licensing and copyright.

use crate::error::CaServerError;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use tao::PrincipalName;
use tao_utils::x509::X509Details;

/// Serial number of the first leaf certificate; 1 is the policy certificate.
pub const DEFAULT_FIRST_SERIAL: u64 = 2;
/// One year, in seconds.
pub const DEFAULT_LEAF_DURATION: u64 = 31536000;

fn default_first_serial() -> u64 {
    DEFAULT_FIRST_SERIAL
}

fn default_leaf_duration() -> u64 {
    DEFAULT_LEAF_DURATION
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaServerConfig {
    pub listen_address: String,
    /// PKCS#8 DER policy key.
    pub policy_key_path: PathBuf,
    /// DER self-signed policy certificate.
    pub policy_cert_path: PathBuf,
    pub policy_details: X509Details,
    /// Key principals, besides the policy key, whose attestations are
    /// accepted.
    #[serde(default)]
    pub trusted_roots: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acl_path: Option<PathBuf>,
    #[serde(default = "default_first_serial")]
    pub first_serial: u64,
    /// Validity of issued leaf certificates, in seconds.
    #[serde(default = "default_leaf_duration")]
    pub leaf_duration: u64,
}

impl CaServerConfig {
    pub fn from_json(json: &str) -> Result<Self, CaServerError> {
        let config: CaServerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CaServerError> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    fn validate(&self) -> Result<(), CaServerError> {
        if self.listen_address.is_empty() {
            return Err(CaServerError::ConfigError("empty listen address".to_string()));
        }
        if self.first_serial < DEFAULT_FIRST_SERIAL {
            return Err(CaServerError::ConfigError(format!(
                "serial {} is reserved for the policy certificate",
                self.first_serial
            )));
        }
        if self.leaf_duration == 0 {
            return Err(CaServerError::ConfigError("zero leaf duration".to_string()));
        }
        self.parsed_trusted_roots()?;
        Ok(())
    }

    pub fn parsed_trusted_roots(&self) -> Result<Vec<PrincipalName>, CaServerError> {
        Ok(self
            .trusted_roots
            .iter()
            .map(|root| PrincipalName::parse(root))
            .collect::<Result<Vec<_>, _>>()?)
    }

    #[inline]
    pub fn leaf_validity(&self) -> Duration {
        Duration::from_secs(self.leaf_duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_optional_fields() {
        let config = CaServerConfig::from_json(
            r#"{
                "listen_address": "127.0.0.1:0",
                "policy_key_path": "signer",
                "policy_cert_path": "cert",
                "policy_details": { "common_name": "policy" }
            }"#,
        )
        .unwrap();
        assert_eq!(config.first_serial, DEFAULT_FIRST_SERIAL);
        assert_eq!(config.leaf_validity(), Duration::from_secs(DEFAULT_LEAF_DURATION));
        assert!(config.acl_path.is_none());
        assert!(config.parsed_trusted_roots().unwrap().is_empty());
    }

    #[test]
    fn reserved_serial_is_rejected() {
        let result = CaServerConfig::from_json(
            r#"{
                "listen_address": "127.0.0.1:0",
                "policy_key_path": "signer",
                "policy_cert_path": "cert",
                "policy_details": { "common_name": "policy" },
                "first_serial": 1
            }"#,
        );
        assert!(matches!(result, Err(CaServerError::ConfigError(_))));
    }

    #[test]
    fn malformed_root_is_rejected() {
        let result = CaServerConfig::from_json(
            r#"{
                "listen_address": "127.0.0.1:0",
                "policy_key_path": "signer",
                "policy_cert_path": "cert",
                "policy_details": { "common_name": "policy" },
                "trusted_roots": ["key(00)//prog"]
            }"#,
        );
        assert!(result.is_err());
    }
}
