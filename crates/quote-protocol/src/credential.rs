//! Credential wrapping
//!
//! The server hands the client a certificate that only the holder of both
//! the endorsement key and the quoting key can read:
//!
//! - the certificate is encrypted and MACed under keys derived from a fresh
//!   16-byte *credential* (`wrap_certificate`);
//! - the credential is wrapped TPM2 MakeCredential style for the endorsement
//!   key, bound to the *name* of the quoting key (`make_credential`).
//!
//! The TPM releases the credential (ActivateCredential) only when the key
//! named in the blob is loaded next to the endorsement key.
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
    error::ProtocolError,
    tpm::{unwrap_sized, write_sized},
};
use rand::rngs::OsRng;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tao_utils::{
    cipher::{aes128_cfb_decrypt, aes128_cfb_encrypt, aes128_ctr, ZERO_IV},
    kdf::kdfa,
    random_bytes, HashAlg,
};
use zeroize::Zeroizing;

/// Size of credentials and seeds.
pub const CREDENTIAL_SIZE: usize = 16;

const PROTECT_LABEL: &str = "PROTECT";
const STORAGE_LABEL: &str = "STORAGE";
const INTEGRITY_LABEL: &str = "INTEGRITY";
/// OAEP label for seeds, including the terminating NUL the TPM hashes.
const IDENTITY_LABEL: &str = "IDENTITY\0";

/// A credential wrapped for an endorsement key, as consumed by
/// ActivateCredential.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialBlob {
    /// The seed, RSA-OAEP encrypted to the endorsement key.
    pub secret: Vec<u8>,
    /// The sized credential, AES-128-CFB encrypted under a seed-derived key.
    pub enc_identity: Vec<u8>,
    /// Sized HMAC over `enc_identity || name`.
    pub integrity_hmac: Vec<u8>,
}

fn seed_padding() -> Oaep {
    Oaep::new_with_label::<Sha256, _>(IDENTITY_LABEL)
}

/// Wraps `credential` so that only `endorsement_key` can recover it, and
/// only on behalf of the key named `name`.
pub fn make_credential(
    alg: HashAlg,
    endorsement_key: &RsaPublicKey,
    name: &[u8],
    credential: &[u8],
) -> Result<CredentialBlob, ProtocolError> {
    let seed = Zeroizing::new(random_bytes(CREDENTIAL_SIZE)?);
    let secret = endorsement_key.encrypt(&mut OsRng, seed_padding(), &seed)?;

    let storage_key = Zeroizing::new(kdfa(alg, &seed, STORAGE_LABEL, name, &[], 128)?);
    let mut enc_identity = Vec::with_capacity(credential.len() + 2);
    write_sized(&mut enc_identity, credential)?;
    aes128_cfb_encrypt(&storage_key, &ZERO_IV, &mut enc_identity)?;

    let integrity_key = Zeroizing::new(kdfa(alg, &seed, INTEGRITY_LABEL, &[], &[], 8 * alg.size() as u32)?);
    let integrity = alg.hmac(&integrity_key, &[&enc_identity, name])?;
    let mut integrity_hmac = Vec::with_capacity(integrity.len() + 2);
    write_sized(&mut integrity_hmac, &integrity)?;

    Ok(CredentialBlob {
        secret,
        enc_identity,
        integrity_hmac,
    })
}

/// Recovers the credential from `blob` using the endorsement private key and
/// the name of the key the credential was bound to.
pub fn activate_credential(
    alg: HashAlg,
    endorsement_key: &RsaPrivateKey,
    name: &[u8],
    blob: &CredentialBlob,
) -> Result<Zeroizing<Vec<u8>>, ProtocolError> {
    let seed = Zeroizing::new(
        endorsement_key
            .decrypt(seed_padding(), &blob.secret)
            .map_err(|_| ProtocolError::ActivationError("seed does not decrypt".to_string()))?,
    );

    let integrity_key = Zeroizing::new(kdfa(alg, &seed, INTEGRITY_LABEL, &[], &[], 8 * alg.size() as u32)?);
    let integrity = unwrap_sized(&blob.integrity_hmac)?;
    alg.verify_hmac(&integrity_key, &[&blob.enc_identity, name], integrity)
        .map_err(|_| ProtocolError::ActivationError("integrity check failed".to_string()))?;

    let storage_key = Zeroizing::new(kdfa(alg, &seed, STORAGE_LABEL, name, &[], 128)?);
    let mut identity = Zeroizing::new(blob.enc_identity.clone());
    aes128_cfb_decrypt(&storage_key, &ZERO_IV, &mut identity)?;
    Ok(Zeroizing::new(unwrap_sized(&identity)?.to_vec()))
}

fn protection_keys(alg: HashAlg, credential: &[u8]) -> Result<Zeroizing<Vec<u8>>, ProtocolError> {
    Ok(Zeroizing::new(kdfa(alg, credential, PROTECT_LABEL, &[], &[], 256)?))
}

/// Encrypts `certificate` under the AES half of the keys derived from
/// `credential` and MACs the ciphertext under the other half.  Returns the
/// ciphertext and its MAC.
pub fn wrap_certificate(alg: HashAlg, credential: &[u8], certificate: &[u8]) -> Result<(Vec<u8>, Vec<u8>), ProtocolError> {
    let keys = protection_keys(alg, credential)?;
    let mut encrypted = certificate.to_vec();
    aes128_ctr(&keys[..16], &ZERO_IV, &mut encrypted)?;
    let mac = alg.hmac(&keys[16..], &[&encrypted])?;
    Ok((encrypted, mac))
}

/// Checks the MAC and decrypts what `wrap_certificate` produced.
pub fn unwrap_certificate(alg: HashAlg, credential: &[u8], encrypted: &[u8], mac: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    let keys = protection_keys(alg, credential)?;
    alg.verify_hmac(&keys[16..], &[encrypted], mac)
        .map_err(|_| ProtocolError::ActivationError("certificate MAC does not verify".to_string()))?;
    let mut certificate = encrypted.to_vec();
    aes128_ctr(&keys[..16], &ZERO_IV, &mut certificate)?;
    Ok(certificate)
}
