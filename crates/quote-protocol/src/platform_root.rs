//! The platform root of trust
//!
//! `PlatformRoot` is the handful of TPM2 commands the provisioning protocol
//! needs.  `SoftwareTpm` implements them in process, keeping its persistent
//! state (endorsement key, NV-stored key contexts, PCR banks, clock) in a
//! value that can be saved to and restored from a file.
//!
//! Key contexts for the CloudProxy hierarchy live in fixed NV slots:
//! `ROOT_KEY_SLOT`, `SEAL_KEY_SLOT` and `QUOTE_KEY_SLOT`.
//!
//! ## Authors
//!
//! The CloudProxy Development Team.
//!
//! ## Licensing and copyright notice
//!
//! See the `LICENSE.md` file in the CloudProxy root directory for
//! information on licensing and copyright.

use crate::{
    credential::{self, CredentialBlob},
    error::ProtocolError,
    tpm::{pcr_digest, quoted_value, ClockInfo, PcrSelection, QuoteInfo, PCR_COUNT, TPM_GENERATED_VALUE, TPM_ST_ATTEST_QUOTE},
};
use log::{debug, info};
use rsa::Pkcs1v15Sign;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::Sha256;
use std::{collections::BTreeMap, fs, path::Path};
use tao_utils::{keys::SigningKey, random_bytes, unix_now, HashAlg};
use zeroize::Zeroizing;

pub const ROOT_KEY_SLOT: u32 = 1000;
pub const SEAL_KEY_SLOT: u32 = 1001;
pub const QUOTE_KEY_SLOT: u32 = 1002;

/// Algorithm used for key names.
pub const NAME_ALG: HashAlg = HashAlg::Sha256;

const FIRMWARE_VERSION: u64 = 0x2015_0701_0000_0001;
const FIRST_TRANSIENT_HANDLE: u32 = 0x8000_0000;

/// A loaded object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct KeyHandle(pub u32);

/// The public part of a loaded key and its TPM name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicArea {
    /// SubjectPublicKeyInfo DER.
    pub public_key_der: Vec<u8>,
    pub name: Vec<u8>,
}

/// A marshaled `TPMS_ATTEST` and the signature over its hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub attest: Vec<u8>,
    pub signature: Vec<u8>,
}

/// The name of a key: its name algorithm's TPM identifier followed by the
/// digest of its public area.
pub fn key_name(alg: HashAlg, public_key_der: &[u8]) -> Vec<u8> {
    let mut name = alg.tpm_alg_id().to_be_bytes().to_vec();
    name.extend_from_slice(&alg.digest(public_key_der));
    name
}

pub trait PlatformRoot {
    /// Restarts the platform: loaded objects are flushed and PCRs cleared.
    fn reset(&mut self) -> Result<(), ProtocolError>;

    fn get_random(&mut self, size: usize) -> Result<Vec<u8>, ProtocolError>;

    /// Loads the endorsement key, creating it on first use.
    fn create_primary(&mut self) -> Result<KeyHandle, ProtocolError>;

    fn read_public(&mut self, handle: KeyHandle) -> Result<PublicArea, ProtocolError>;

    /// Loads the key context saved in NV slot `slot`.
    fn load_context(&mut self, slot: u32) -> Result<KeyHandle, ProtocolError>;

    /// Quotes the registers in `selection`, embedding `qualifying_data`, and
    /// signs the quote with `signer` using the selection's bank hash.
    fn quote(&mut self, signer: KeyHandle, qualifying_data: &[u8], selection: &PcrSelection) -> Result<Quote, ProtocolError>;

    /// Releases the credential in `blob` if it was made for `endorsement`
    /// and bound to the name of `active`.
    fn activate_credential(
        &mut self,
        active: KeyHandle,
        endorsement: KeyHandle,
        alg: HashAlg,
        blob: &CredentialBlob,
    ) -> Result<Zeroizing<Vec<u8>>, ProtocolError>;
}

////////////////////////////////////////////////////////////////////////////////
// The software TPM.
////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct SoftwareTpmState {
    /// PKCS#8 DER of the endorsement key.
    endorsement_key: Option<Vec<u8>>,
    /// PKCS#8 DER of the keys saved in NV storage, by slot.
    nv_contexts: BTreeMap<u32, Vec<u8>>,
    /// PCR banks by TPM algorithm identifier.
    pcrs: BTreeMap<u16, Vec<Vec<u8>>>,
    reset_count: u32,
    restart_count: u32,
}

pub struct SoftwareTpm {
    state: SoftwareTpmState,
    loaded: BTreeMap<KeyHandle, SigningKey>,
    next_handle: u32,
    key_bits: usize,
}

impl SoftwareTpm {
    /// A TPM that creates `key_bits`-bit RSA keys.
    pub fn new(key_bits: usize) -> Self {
        let mut tpm = SoftwareTpm {
            state: SoftwareTpmState::default(),
            loaded: BTreeMap::new(),
            next_handle: FIRST_TRANSIENT_HANDLE,
            key_bits,
        };
        tpm.clear_pcrs();
        tpm
    }

    pub fn load(path: &Path, key_bits: usize) -> Result<Self, ProtocolError> {
        let state: SoftwareTpmState = bincode::deserialize(&Zeroizing::new(fs::read(path)?))?;
        let mut tpm = SoftwareTpm::new(key_bits);
        tpm.state = state;
        tpm.state.restart_count = tpm.state.restart_count.wrapping_add(1);
        Ok(tpm)
    }

    pub fn save(&self, path: &Path) -> Result<(), ProtocolError> {
        let bytes = Zeroizing::new(bincode::serialize(&self.state)?);
        fs::write(path, &*bytes)?;
        Ok(())
    }

    /// Creates the root, sealing and quoting keys and saves their contexts
    /// to NV storage, keeping any that already exist.
    pub fn provision_hierarchy(&mut self) -> Result<(), ProtocolError> {
        for slot in [ROOT_KEY_SLOT, SEAL_KEY_SLOT, QUOTE_KEY_SLOT] {
            if !self.state.nv_contexts.contains_key(&slot) {
                let key = SigningKey::generate(self.key_bits)?;
                self.state.nv_contexts.insert(slot, key.to_pkcs8_der()?.to_vec());
                info!("Created key context in NV slot {}.", slot);
            }
        }
        Ok(())
    }

    /// `PCR[index] = H(PCR[index] || H(data))` in every bank.
    pub fn extend_pcr(&mut self, index: usize, data: &[u8]) -> Result<(), ProtocolError> {
        if index >= PCR_COUNT {
            return Err(ProtocolError::PlatformError(format!("PCR {} does not exist", index)));
        }
        // Every bank is checked before any is changed; a state file with a
        // short or unknown bank must not leave the banks out of step.
        let mut extended = Vec::with_capacity(self.state.pcrs.len());
        for (id, bank) in self.state.pcrs.iter() {
            let alg = HashAlg::from_tpm_alg_id(*id)
                .ok_or_else(|| ProtocolError::PlatformError(format!("unknown PCR bank {:#06x}", id)))?;
            let current = bank.get(index).ok_or_else(|| {
                ProtocolError::PlatformError(format!("PCR bank {:#06x} has no register {}", id, index))
            })?;
            extended.push((*id, alg.digest_parts(&[current.as_slice(), &alg.digest(data)])));
        }
        for (id, value) in extended {
            if let Some(slot) = self.state.pcrs.get_mut(&id).and_then(|bank| bank.get_mut(index)) {
                *slot = value;
            }
        }
        Ok(())
    }

    pub fn pcr_value(&self, alg: HashAlg, index: usize) -> Option<&[u8]> {
        self.state
            .pcrs
            .get(&alg.tpm_alg_id())
            .and_then(|bank| bank.get(index))
            .map(|value| value.as_slice())
    }

    /// The digest a quote over `selection` would currently carry.
    pub fn selection_digest(&self, selection: &PcrSelection) -> Result<Vec<u8>, ProtocolError> {
        let alg = selection.hash_alg()?;
        let values = selection
            .indices()
            .into_iter()
            .map(|index| {
                self.pcr_value(alg, index)
                    .ok_or_else(|| ProtocolError::PlatformError(format!("PCR {} does not exist", index)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(pcr_digest(alg, &values))
    }

    fn clear_pcrs(&mut self) {
        for alg in [HashAlg::Sha1, HashAlg::Sha256] {
            self.state
                .pcrs
                .insert(alg.tpm_alg_id(), vec![vec![0u8; alg.size()]; PCR_COUNT]);
        }
    }

    fn insert_loaded(&mut self, key: SigningKey) -> KeyHandle {
        let handle = KeyHandle(self.next_handle);
        self.next_handle = self.next_handle.wrapping_add(1);
        self.loaded.insert(handle, key);
        handle
    }

    fn loaded_key(&self, handle: KeyHandle) -> Result<&SigningKey, ProtocolError> {
        self.loaded
            .get(&handle)
            .ok_or_else(|| ProtocolError::PlatformError(format!("no object loaded at {:#010x}", handle.0)))
    }
}

impl PlatformRoot for SoftwareTpm {
    fn reset(&mut self) -> Result<(), ProtocolError> {
        self.loaded.clear();
        self.next_handle = FIRST_TRANSIENT_HANDLE;
        self.clear_pcrs();
        self.state.reset_count = self.state.reset_count.wrapping_add(1);
        debug!("Software TPM reset ({}).", self.state.reset_count);
        Ok(())
    }

    fn get_random(&mut self, size: usize) -> Result<Vec<u8>, ProtocolError> {
        Ok(random_bytes(size)?)
    }

    fn create_primary(&mut self) -> Result<KeyHandle, ProtocolError> {
        if self.state.endorsement_key.is_none() {
            let key = SigningKey::generate(self.key_bits)?;
            self.state.endorsement_key = Some(key.to_pkcs8_der()?.to_vec());
            info!("Created endorsement key.");
        }
        let der = self
            .state
            .endorsement_key
            .as_ref()
            .ok_or_else(|| ProtocolError::PlatformError("endorsement key missing".to_string()))?;
        let key = SigningKey::from_pkcs8_der(der)?;
        Ok(self.insert_loaded(key))
    }

    fn read_public(&mut self, handle: KeyHandle) -> Result<PublicArea, ProtocolError> {
        let public_key_der = self.loaded_key(handle)?.public_key_der()?;
        let name = key_name(NAME_ALG, &public_key_der);
        Ok(PublicArea { public_key_der, name })
    }

    fn load_context(&mut self, slot: u32) -> Result<KeyHandle, ProtocolError> {
        let der = self
            .state
            .nv_contexts
            .get(&slot)
            .ok_or_else(|| ProtocolError::PlatformError(format!("NV slot {} is empty", slot)))?;
        let key = SigningKey::from_pkcs8_der(der)?;
        Ok(self.insert_loaded(key))
    }

    fn quote(&mut self, signer: KeyHandle, qualifying_data: &[u8], selection: &PcrSelection) -> Result<Quote, ProtocolError> {
        let alg = selection.hash_alg()?;
        let digest = self.selection_digest(selection)?;
        let key = self.loaded_key(signer)?;
        let info = QuoteInfo {
            magic: TPM_GENERATED_VALUE,
            attest_type: TPM_ST_ATTEST_QUOTE,
            qualified_signer: key_name(NAME_ALG, &key.public_key_der()?),
            extra_data: qualifying_data.to_vec(),
            clock_info: ClockInfo {
                clock: (unix_now().max(0) as u64).saturating_mul(1000),
                reset_count: self.state.reset_count,
                restart_count: self.state.restart_count,
                safe: 1,
            },
            firmware_version: FIRMWARE_VERSION,
            pcr_select: vec![selection.clone()],
            pcr_digest: digest,
        };
        let attest = info.marshal()?;
        let hash = quoted_value(alg, &attest);
        let padding = match alg {
            HashAlg::Sha1 => Pkcs1v15Sign::new::<Sha1>(),
            HashAlg::Sha256 => Pkcs1v15Sign::new::<Sha256>(),
        };
        let signature = key.rsa().sign(padding, &hash)?;
        Ok(Quote { attest, signature })
    }

    fn activate_credential(
        &mut self,
        active: KeyHandle,
        endorsement: KeyHandle,
        alg: HashAlg,
        blob: &CredentialBlob,
    ) -> Result<Zeroizing<Vec<u8>>, ProtocolError> {
        let name = self.read_public(active)?.name;
        let endorsement_key = self.loaded_key(endorsement)?;
        credential::activate_credential(alg, endorsement_key.rsa(), &name, blob)
    }
}
