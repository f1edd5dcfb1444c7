//! PCR allow-list
//!
//! A quote is acceptable only if its PCR selection and digest match an
//! entry of the policy.  An empty policy accepts nothing.
//!
//! ## Authors
//!
//! The CloudProxy Development Team.
//!
//! ## Licensing and copyright notice
//!
//! See the `LICENSE.md` file in the CloudProxy root directory for
//! information on licensing and copyright.

use crate::{error::ProtocolError, tpm::PcrSelection};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use tao_utils::HashAlg;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PcrPolicyEntry {
    pub hash_alg: HashAlg,
    /// The selection bitmap, hex encoded.
    pub pcr_selection: String,
    /// The expected PCR digest, hex encoded.
    pub digest: String,
}

impl PcrPolicyEntry {
    pub fn new(selection: &PcrSelection, digest: &[u8]) -> Result<Self, ProtocolError> {
        Ok(PcrPolicyEntry {
            hash_alg: selection.hash_alg()?,
            pcr_selection: hex::encode(&selection.select),
            digest: hex::encode(digest),
        })
    }

    fn matches(&self, selection: &PcrSelection, digest: &[u8]) -> bool {
        self.hash_alg.tpm_alg_id() == selection.hash
            && hex::decode(&self.pcr_selection).map_or(false, |s| s == selection.select)
            && hex::decode(&self.digest).map_or(false, |d| d == digest)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PcrPolicy {
    entries: Vec<PcrPolicyEntry>,
}

impl PcrPolicy {
    #[inline]
    pub fn new(entries: Vec<PcrPolicyEntry>) -> Self {
        PcrPolicy { entries }
    }

    pub fn allow(&mut self, entry: PcrPolicyEntry) {
        self.entries.push(entry);
    }

    #[inline]
    pub fn entries(&self) -> &[PcrPolicyEntry] {
        &self.entries
    }

    /// Whether a quote over `selection` with `digest` is acceptable.
    pub fn permits(&self, selection: &PcrSelection, digest: &[u8]) -> bool {
        self.entries.iter().any(|entry| entry.matches(selection, digest))
    }

    pub fn from_file(path: &Path) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_slice(&fs::read(path)?)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ProtocolError> {
        fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_policy_permits_nothing() {
        let selection = PcrSelection::new(HashAlg::Sha256, &[7]).unwrap();
        assert!(!PcrPolicy::default().permits(&selection, &[0; 32]));
    }

    #[test]
    fn selection_and_digest_must_both_match() {
        let selection = PcrSelection::new(HashAlg::Sha256, &[0, 7]).unwrap();
        let mut policy = PcrPolicy::default();
        policy.allow(PcrPolicyEntry::new(&selection, &[1; 32]).unwrap());

        assert!(policy.permits(&selection, &[1; 32]));
        assert!(!policy.permits(&selection, &[2; 32]));
        let other = PcrSelection::new(HashAlg::Sha256, &[0]).unwrap();
        assert!(!policy.permits(&other, &[1; 32]));
        let other_bank = PcrSelection::new(HashAlg::Sha1, &[0, 7]).unwrap();
        assert!(!policy.permits(&other_bank, &[1; 32]));
    }

    #[test]
    fn policy_file_is_a_json_list() {
        let text = r#"[{ "hash_alg": "sha256", "pcr_selection": "810000", "digest": "00ff" }]"#;
        let policy: PcrPolicy = serde_json::from_str(text).unwrap();
        let selection = PcrSelection::new(HashAlg::Sha256, &[0, 7]).unwrap();
        assert!(policy.permits(&selection, &[0x00, 0xff]));
    }
}
