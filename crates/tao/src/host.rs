//! Software Tao hosts
//!
//! `TaoHost` holds a host's key material and answers Tao requests on behalf
//! of the principals it hosts.  Every request names the calling principal
//! explicitly; wrapping the host for a particular caller (`SoftTao`, or the
//! RPC `TaoServer`) is what turns it into a `Tao`.
//!
//! A host is either a *root*, named after its own signing key, or *stacked*
//! on a parent Tao, in which case it takes its parent's name for it and the
//! parent attests that the host's signing key speaks for that name.
//!
//! Counters for rollback protection are keyed by the sealing principal and
//! label.  They live in host memory unless the host is given a counter store
//! (`TaoHost::with_counter_store`), in which case every change is written to
//! a file sealed under the host's own sealing key and reloaded on restart.
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
    attestation::{Attestation, Statement},
    error::TaoError,
    policy::{PolicyClass, SEAL_POLICY_SELF},
    principal::PrincipalName,
    storage::{load_or_create_sealed, write_private_file},
    tao::Tao,
};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};
use tao_utils::{
    keys::{SigningKey, DEFAULT_RSA_BITS},
    sealed_blob::{SealedBlobCodec, SealingKey},
    unix_now, CryptoError,
};

/// Hosted programs may not grow their names beyond this many segments.
pub const DEFAULT_MAX_NAME_DEPTH: usize = 32;
/// Largest single request for random or shared-secret bytes.
pub const MAX_SECRET_SIZE: usize = 1 << 20;
/// Sealed file holding a stacked host's signing key.
pub const SEALED_SIGNING_KEY_FILE: &str = "sealed_signing_key";
/// Sealed file holding a stacked host's symmetric sealing key.
pub const SEALED_SYMMETRIC_KEY_FILE: &str = "sealed_symmetric_key";
/// Sealed file holding a host's rollback counters.
pub const SEALED_COUNTERS_FILE: &str = "sealed_counters";

const SHARED_SECRET_LABEL: &str = "tao::SharedSecret";

////////////////////////////////////////////////////////////////////////////////
// Key material.
////////////////////////////////////////////////////////////////////////////////

/// The keys a host owns.  Both keys wipe themselves when dropped.
#[derive(Clone, Debug)]
pub struct HostKeys {
    signing: Option<SigningKey>,
    sealing: SealingKey,
}

impl HostKeys {
    #[inline]
    pub fn new(signing: Option<SigningKey>, sealing: SealingKey) -> Self {
        HostKeys { signing, sealing }
    }

    pub fn generate() -> Result<Self, TaoError> {
        Self::generate_with_bits(DEFAULT_RSA_BITS)
    }

    pub fn generate_with_bits(bits: usize) -> Result<Self, TaoError> {
        Ok(HostKeys {
            signing: Some(SigningKey::generate(bits)?),
            sealing: SealingKey::generate()?,
        })
    }

    /// Loads the keys sealed by `parent` in `dir`, or generates, seals and
    /// saves fresh ones if the sealed files are absent.
    pub fn load_or_create<T: Tao + ?Sized>(parent: &mut T, dir: &Path, bits: usize) -> Result<Self, TaoError> {
        let sealing = load_or_create_sealed(parent, &dir.join(SEALED_SYMMETRIC_KEY_FILE), SEAL_POLICY_SELF, || {
            Ok(SealingKey::generate()?.to_bytes().to_vec())
        })?;
        let signing = load_or_create_sealed(parent, &dir.join(SEALED_SIGNING_KEY_FILE), SEAL_POLICY_SELF, || {
            Ok(SigningKey::generate(bits)?.to_pkcs8_der()?.to_vec())
        })?;
        Ok(HostKeys {
            signing: Some(SigningKey::from_pkcs8_der(&signing)?),
            sealing: SealingKey::from_bytes(&sealing)?,
        })
    }

    #[inline]
    pub fn signing_key(&self) -> Option<&SigningKey> {
        self.signing.as_ref()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Sealed payloads.
////////////////////////////////////////////////////////////////////////////////

#[derive(Serialize, Deserialize)]
struct SealedCounter {
    label: String,
    value: i64,
}

/// What a host encrypts on Seal.
#[derive(Serialize, Deserialize)]
struct SealedPayload {
    policy: String,
    sealer: PrincipalName,
    data: Vec<u8>,
    counter: Option<SealedCounter>,
}

////////////////////////////////////////////////////////////////////////////////
// The host.
////////////////////////////////////////////////////////////////////////////////

pub struct TaoHost {
    name: PrincipalName,
    signing: Option<SigningKey>,
    delegation: Option<Attestation>,
    codec: SealedBlobCodec,
    counters: BTreeMap<(PrincipalName, String), i64>,
    counter_store: Option<PathBuf>,
    max_name_depth: usize,
}

impl TaoHost {
    /// A host at the bottom of the stack, named after its signing key.
    pub fn root(keys: HostKeys) -> Result<Self, TaoError> {
        let HostKeys { signing, sealing } = keys;
        let signing = signing.ok_or_else(|| TaoError::SigningError("a root host needs a signing key".to_string()))?;
        let name = PrincipalName::from_key(&signing.public_key_der()?);
        info!("Root Tao host {} initialized.", name);
        Ok(TaoHost {
            name,
            signing: Some(signing),
            delegation: None,
            codec: SealedBlobCodec::new(sealing),
            counters: BTreeMap::new(),
            counter_store: None,
            max_name_depth: DEFAULT_MAX_NAME_DEPTH,
        })
    }

    /// A host running as a hosted program of `parent`.  The parent attests
    /// that the host's signing key, if any, speaks for the host's name.
    pub fn stacked<T: Tao + ?Sized>(parent: &mut T, keys: HostKeys) -> Result<Self, TaoError> {
        let HostKeys { signing, sealing } = keys;
        let name = parent.get_tao_name()?;
        let delegation = match &signing {
            Some(key) => {
                let speaker = PrincipalName::from_key(&key.public_key_der()?);
                Some(parent.attest(speaker.to_string().as_bytes())?)
            }
            None => None,
        };
        info!("Stacked Tao host {} initialized.", name);
        Ok(TaoHost {
            name,
            signing,
            delegation,
            codec: SealedBlobCodec::new(sealing),
            counters: BTreeMap::new(),
            counter_store: None,
            max_name_depth: DEFAULT_MAX_NAME_DEPTH,
        })
    }

    pub fn with_max_name_depth(mut self, depth: usize) -> Self {
        self.max_name_depth = depth;
        self
    }

    /// Keeps rollback counters in the sealed file at `path`, loading any
    /// counters already saved there.  A file sealed under other keys, or
    /// modified, is an `IntegrityError`.
    pub fn with_counter_store(mut self, path: &Path) -> Result<Self, TaoError> {
        if path.exists() {
            let saved: Vec<(PrincipalName, String, i64)> = self.open_blob(&fs::read(path)?)?;
            self.counters = saved
                .into_iter()
                .map(|(principal, label, value)| ((principal, label), value))
                .collect();
            info!("Loaded {} rollback counters from {}.", self.counters.len(), path.display());
        }
        self.counter_store = Some(path.to_path_buf());
        Ok(self)
    }

    #[inline]
    pub fn name(&self) -> &PrincipalName {
        &self.name
    }

    /// The attestation linking this host's key to its name, for stacked hosts.
    #[inline]
    pub fn delegation(&self) -> Option<&Attestation> {
        self.delegation.as_ref()
    }

    /// The name given to a hosted program launched as `subprin`.
    pub fn child_name(&self, subprin: &str) -> Result<PrincipalName, TaoError> {
        self.extend_name(&self.name, subprin)
    }

    /// `current` extended by `subprin`, refusing to grow past the depth limit.
    pub fn extend_name(&self, current: &PrincipalName, subprin: &str) -> Result<PrincipalName, TaoError> {
        self.check_hosted(current)?;
        let extended = current.extend(subprin)?;
        if extended.depth() > self.max_name_depth {
            return Err(TaoError::NameError(format!(
                "{} may not be extended beyond {} segments",
                current, self.max_name_depth
            )));
        }
        debug!("Extended {} to {}.", current, extended);
        Ok(extended)
    }

    pub fn random_bytes(&self, size: usize) -> Result<Vec<u8>, TaoError> {
        check_size(size)?;
        tao_utils::random_bytes(size).map_err(|e| TaoError::EntropyError(e.to_string()))
    }

    pub fn shared_secret(&self, caller: &PrincipalName, size: usize, policy: &str) -> Result<Vec<u8>, TaoError> {
        self.check_hosted(caller)?;
        check_size(size)?;
        let class = PolicyClass::parse(policy)?.class_name(&self.name, caller);
        Ok(self
            .codec
            .key()
            .derive(SHARED_SECRET_LABEL, class.to_string().as_bytes(), size)?)
    }

    pub fn attest(&self, caller: &PrincipalName, message: &[u8]) -> Result<Attestation, TaoError> {
        self.check_hosted(caller)?;
        let key = self
            .signing
            .as_ref()
            .ok_or_else(|| TaoError::SigningError("attestation key not initialized".to_string()))?;
        let statement = Statement::new(caller, message.to_vec(), unix_now());
        Attestation::sign(key, &statement, self.delegation.clone())
    }

    pub fn seal(&self, caller: &PrincipalName, data: &[u8], policy: &str) -> Result<Vec<u8>, TaoError> {
        self.check_hosted(caller)?;
        self.protect(caller, data, policy, None)
    }

    pub fn unseal(&self, caller: &PrincipalName, sealed: &[u8]) -> Result<(Vec<u8>, String), TaoError> {
        self.check_hosted(caller)?;
        let payload = self.open(sealed)?;
        if payload.counter.is_some() {
            return Err(TaoError::RollbackError(
                "envelope is rollback protected and must be opened as such".to_string(),
            ));
        }
        self.authorize(&payload, caller)?;
        Ok((payload.data, payload.policy))
    }

    pub fn init_counter(&mut self, caller: &PrincipalName, label: &str, counter: i64) -> Result<(), TaoError> {
        self.check_hosted(caller)?;
        check_label(label)?;
        let key = (caller.clone(), label.to_string());
        if let Some(current) = self.counters.get(&key) {
            if counter < *current {
                return Err(TaoError::RollbackError(format!(
                    "counter {:?} is at {}, cannot move back to {}",
                    label, current, counter
                )));
            }
        }
        self.counters.insert(key, counter);
        self.save_counters()
    }

    pub fn get_counter(&self, caller: &PrincipalName, label: &str) -> Result<i64, TaoError> {
        self.check_hosted(caller)?;
        self.counter(caller, label)
    }

    pub fn rollback_protected_seal(
        &mut self,
        caller: &PrincipalName,
        label: &str,
        data: &[u8],
        policy: &str,
    ) -> Result<Vec<u8>, TaoError> {
        self.check_hosted(caller)?;
        PolicyClass::parse(policy)?;
        let next = self
            .counter(caller, label)?
            .checked_add(1)
            .ok_or_else(|| TaoError::RollbackError(format!("counter {:?} is exhausted", label)))?;
        let sealed = self.protect(
            caller,
            data,
            policy,
            Some(SealedCounter {
                label: label.to_string(),
                value: next,
            }),
        )?;
        self.counters.insert((caller.clone(), label.to_string()), next);
        self.save_counters()?;
        Ok(sealed)
    }

    pub fn rollback_protected_unseal(&self, caller: &PrincipalName, sealed: &[u8]) -> Result<(Vec<u8>, String), TaoError> {
        self.check_hosted(caller)?;
        let payload = self.open(sealed)?;
        let counter = payload
            .counter
            .as_ref()
            .ok_or_else(|| TaoError::RollbackError("envelope is not rollback protected".to_string()))?;
        self.authorize(&payload, caller)?;

        let current = self.counter(&payload.sealer, &counter.label)?;
        if counter.value < current {
            return Err(TaoError::RollbackError(format!(
                "envelope counter {} is behind current counter {} for {:?}",
                counter.value, current, counter.label
            )));
        }
        if counter.value > current {
            return Err(TaoError::RollbackError(format!(
                "envelope counter {} is ahead of current counter {} for {:?}",
                counter.value, current, counter.label
            )));
        }
        Ok((payload.data, payload.policy))
    }

    ////////////////////////////////////////////////////////////////////////////
    // Internals.
    ////////////////////////////////////////////////////////////////////////////

    fn check_hosted(&self, caller: &PrincipalName) -> Result<(), TaoError> {
        if self.name.is_prefix_of(caller) {
            Ok(())
        } else {
            Err(TaoError::HostError(format!("{} is not hosted by {}", caller, self.name)))
        }
    }

    fn counter(&self, principal: &PrincipalName, label: &str) -> Result<i64, TaoError> {
        self.counters
            .get(&(principal.clone(), label.to_string()))
            .copied()
            .ok_or_else(|| TaoError::RollbackError(format!("no counter initialized for {:?}", label)))
    }

    fn protect(
        &self,
        caller: &PrincipalName,
        data: &[u8],
        policy: &str,
        counter: Option<SealedCounter>,
    ) -> Result<Vec<u8>, TaoError> {
        PolicyClass::parse(policy)?;
        let payload = SealedPayload {
            policy: policy.to_string(),
            sealer: caller.clone(),
            data: data.to_vec(),
            counter,
        };
        let plaintext = zeroize::Zeroizing::new(bincode::serialize(&payload)?);
        Ok(self.codec.protect(&plaintext)?)
    }

    fn open(&self, sealed: &[u8]) -> Result<SealedPayload, TaoError> {
        self.open_blob(sealed)
    }

    fn open_blob<T: serde::de::DeserializeOwned>(&self, sealed: &[u8]) -> Result<T, TaoError> {
        let plaintext = self.codec.unprotect(sealed).map_err(|e| match e {
            CryptoError::IntegrityError | CryptoError::MalformedBlob => TaoError::IntegrityError,
            other => TaoError::CryptoError(other),
        })?;
        let plaintext = zeroize::Zeroizing::new(plaintext);
        bincode::deserialize(&plaintext).map_err(|_| TaoError::IntegrityError)
    }

    /// Rewrites the counter store, if any.  The new file replaces the old one
    /// only once it is completely written.
    fn save_counters(&self) -> Result<(), TaoError> {
        let path = match &self.counter_store {
            Some(path) => path,
            None => return Ok(()),
        };
        let saved: Vec<(&PrincipalName, &String, i64)> = self
            .counters
            .iter()
            .map(|((principal, label), value)| (principal, label, *value))
            .collect();
        let sealed = self.codec.protect(&bincode::serialize(&saved)?)?;
        let staging = path.with_extension("tmp");
        write_private_file(&staging, &sealed)?;
        fs::rename(&staging, path)?;
        debug!("Saved {} rollback counters to {}.", saved.len(), path.display());
        Ok(())
    }

    fn authorize(&self, payload: &SealedPayload, caller: &PrincipalName) -> Result<(), TaoError> {
        let class = PolicyClass::parse(&payload.policy)?;
        if class.satisfied_by(&self.name, &payload.sealer, caller) {
            Ok(())
        } else {
            Err(TaoError::PolicyError(format!(
                "{} does not satisfy policy {:?} of {}",
                caller, payload.policy, payload.sealer
            )))
        }
    }
}

fn check_size(size: usize) -> Result<(), TaoError> {
    if size == 0 || size > MAX_SECRET_SIZE {
        return Err(TaoError::InvalidArgument(format!(
            "size must be between 1 and {}, not {}",
            MAX_SECRET_SIZE, size
        )));
    }
    Ok(())
}

fn check_label(label: &str) -> Result<(), TaoError> {
    if label.is_empty() {
        return Err(TaoError::InvalidArgument("empty counter label".to_string()));
    }
    Ok(())
}

////////////////////////////////////////////////////////////////////////////////
// The host, as seen by a single in-process caller.
////////////////////////////////////////////////////////////////////////////////

/// A Tao served directly by an in-process `TaoHost`.  The caller starts out
/// with the host's own name and may extend it.
pub struct SoftTao {
    host: TaoHost,
    name: PrincipalName,
}

impl SoftTao {
    /// A root soft Tao over freshly supplied keys.
    pub fn new(keys: HostKeys) -> Result<Self, TaoError> {
        Ok(Self::from_host(TaoHost::root(keys)?))
    }

    pub fn from_host(host: TaoHost) -> Self {
        let name = host.name().clone();
        SoftTao { host, name }
    }

    #[inline]
    pub fn host(&self) -> &TaoHost {
        &self.host
    }
}

impl Tao for SoftTao {
    fn get_tao_name(&mut self) -> Result<PrincipalName, TaoError> {
        Ok(self.name.clone())
    }

    fn extend_tao_name(&mut self, subprin: &str) -> Result<PrincipalName, TaoError> {
        self.name = self.host.extend_name(&self.name, subprin)?;
        Ok(self.name.clone())
    }

    fn get_random_bytes(&mut self, size: usize) -> Result<Vec<u8>, TaoError> {
        self.host.random_bytes(size)
    }

    fn get_shared_secret(&mut self, size: usize, policy: &str) -> Result<Vec<u8>, TaoError> {
        self.host.shared_secret(&self.name, size, policy)
    }

    fn attest(&mut self, message: &[u8]) -> Result<Attestation, TaoError> {
        self.host.attest(&self.name, message)
    }

    fn seal(&mut self, data: &[u8], policy: &str) -> Result<Vec<u8>, TaoError> {
        self.host.seal(&self.name, data, policy)
    }

    fn unseal(&mut self, sealed: &[u8]) -> Result<(Vec<u8>, String), TaoError> {
        self.host.unseal(&self.name, sealed)
    }

    fn init_counter(&mut self, label: &str, counter: i64) -> Result<(), TaoError> {
        let name = self.name.clone();
        self.host.init_counter(&name, label, counter)
    }

    fn get_counter(&mut self, label: &str) -> Result<i64, TaoError> {
        self.host.get_counter(&self.name, label)
    }

    fn rollback_protected_seal(&mut self, label: &str, data: &[u8], policy: &str) -> Result<Vec<u8>, TaoError> {
        let name = self.name.clone();
        self.host.rollback_protected_seal(&name, label, data, policy)
    }

    fn rollback_protected_unseal(&mut self, sealed: &[u8]) -> Result<(Vec<u8>, String), TaoError> {
        self.host.rollback_protected_unseal(&self.name, sealed)
    }
}
