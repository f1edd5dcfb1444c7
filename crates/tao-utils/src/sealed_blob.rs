//! Sealed blobs: authenticated encryption of small secrets.
//!
//! A `SealedBlobCodec` protects a plaintext under a host-bound `SealingKey`
//! using AES-128 in counter mode followed by HMAC-SHA256 over the version,
//! counter block and ciphertext (encrypt-then-MAC).  The codec is a pure data
//! transform: persisting the blob is the caller's business.
//!
//! ## Authors
//!
//! The CloudProxy Development Team.
//!
//! ## Licensing and copyright notice
//!
//! See the `LICENSE.md` file in the CloudProxy root directory for
//! information on licensing and copyright.

use crate::{cipher::aes128_ctr, error::CryptoError, hash::HashAlg, kdf::kdfa, random_bytes};
use byteorder::{BigEndian, ByteOrder};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

pub const AES_KEY_SIZE: usize = 16;
pub const HMAC_KEY_SIZE: usize = 32;
pub const IV_SIZE: usize = 16;
pub const SEALING_KEY_SIZE: usize = AES_KEY_SIZE + HMAC_KEY_SIZE;

/// Blob format version: aes128-ctr with hmac-sha256.
const BLOB_VERSION: u32 = 1;

////////////////////////////////////////////////////////////////////////////////
// Keys.
////////////////////////////////////////////////////////////////////////////////

/// The symmetric key material of a host.  Wiped when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SealingKey {
    aes: [u8; AES_KEY_SIZE],
    hmac: [u8; HMAC_KEY_SIZE],
}

impl SealingKey {
    /// Samples a fresh key from the platform entropy source.
    pub fn generate() -> Result<Self, CryptoError> {
        let bytes = Zeroizing::new(random_bytes(SEALING_KEY_SIZE)?);
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != SEALING_KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength);
        }
        let mut aes = [0u8; AES_KEY_SIZE];
        let mut hmac = [0u8; HMAC_KEY_SIZE];
        aes.copy_from_slice(&bytes[..AES_KEY_SIZE]);
        hmac.copy_from_slice(&bytes[AES_KEY_SIZE..]);
        Ok(SealingKey { aes, hmac })
    }

    pub fn to_bytes(&self) -> Zeroizing<Vec<u8>> {
        let mut bytes = Zeroizing::new(Vec::with_capacity(SEALING_KEY_SIZE));
        bytes.extend_from_slice(&self.aes);
        bytes.extend_from_slice(&self.hmac);
        bytes
    }

    /// Derives `size` bytes bound to `label` and `context` from the MAC half
    /// of the key.  Used for secrets shared between callers of one identity
    /// class.
    pub fn derive(&self, label: &str, context: &[u8], size: usize) -> Result<Vec<u8>, CryptoError> {
        let bits = (size as u32).saturating_mul(8);
        kdfa(HashAlg::Sha256, &self.hmac, label, context, b"", bits)
    }
}

impl std::fmt::Debug for SealingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SealingKey(..)")
    }
}

////////////////////////////////////////////////////////////////////////////////
// The codec.
////////////////////////////////////////////////////////////////////////////////

#[derive(Serialize, Deserialize)]
struct SealedBlob {
    version: u32,
    iv: Vec<u8>,
    ciphertext: Vec<u8>,
    mac: Vec<u8>,
}

/// Encrypts and decrypts small secrets under a `SealingKey`.
#[derive(Clone, Debug)]
pub struct SealedBlobCodec {
    key: SealingKey,
}

impl SealedBlobCodec {
    #[inline]
    pub fn new(key: SealingKey) -> Self {
        SealedBlobCodec { key }
    }

    #[inline]
    pub fn key(&self) -> &SealingKey {
        &self.key
    }

    /// Encrypts `plaintext` under a fresh counter block and authenticates the
    /// result.
    pub fn protect(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let iv = random_bytes(IV_SIZE)?;

        let mut ciphertext = plaintext.to_vec();
        aes128_ctr(&self.key.aes, &iv, &mut ciphertext)?;

        let mac = self.mac(BLOB_VERSION, &iv, &ciphertext)?;

        let blob = SealedBlob {
            version: BLOB_VERSION,
            iv,
            ciphertext,
            mac,
        };
        Ok(bincode::serialize(&blob)?)
    }

    /// Checks the authenticator of `blob` and, only if it verifies, decrypts
    /// it.  Any modification of the blob is reported as an error, never as
    /// corrupted plaintext.
    pub fn unprotect(&self, blob: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let blob: SealedBlob =
            bincode::deserialize(blob).map_err(|_| CryptoError::MalformedBlob)?;
        if blob.version != BLOB_VERSION || blob.iv.len() != IV_SIZE {
            return Err(CryptoError::MalformedBlob);
        }

        let mut version = [0u8; 4];
        BigEndian::write_u32(&mut version, blob.version);
        HashAlg::Sha256.verify_hmac(&self.key.hmac, &[&version, &blob.iv, &blob.ciphertext], &blob.mac)?;

        let mut plaintext = blob.ciphertext;
        aes128_ctr(&self.key.aes, &blob.iv, &mut plaintext)?;
        Ok(plaintext)
    }

    fn mac(&self, version: u32, iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut version_be = [0u8; 4];
        BigEndian::write_u32(&mut version_be, version);
        HashAlg::Sha256.hmac(&self.key.hmac, &[&version_be, iv, ciphertext])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> SealedBlobCodec {
        SealedBlobCodec::new(SealingKey::generate().unwrap())
    }

    #[test]
    fn protect_then_unprotect() {
        let codec = codec();
        let blob = codec.protect(b"secret key material").unwrap();
        assert_eq!(codec.unprotect(&blob).unwrap(), b"secret key material");
    }

    #[test]
    fn empty_plaintext() {
        let codec = codec();
        let blob = codec.protect(b"").unwrap();
        assert!(codec.unprotect(&blob).unwrap().is_empty());
    }

    #[test]
    fn ciphertext_hides_plaintext() {
        let codec = codec();
        let blob = codec.protect(b"AAAAAAAAAAAAAAAAAAAAAAAA").unwrap();
        assert!(!blob.windows(24).any(|w| w == b"AAAAAAAAAAAAAAAAAAAAAAAA"));
    }

    #[test]
    fn every_single_byte_tamper_is_rejected() {
        let codec = codec();
        let blob = codec.protect(b"secret").unwrap();
        for i in 0..blob.len() {
            let mut tampered = blob.clone();
            tampered[i] ^= 0x01;
            assert!(codec.unprotect(&tampered).is_err(), "byte {} accepted", i);
        }
    }

    #[test]
    fn wrong_key_is_rejected() {
        let blob = codec().protect(b"secret").unwrap();
        match codec().unprotect(&blob) {
            Err(CryptoError::IntegrityError) => (),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn truncated_blob_is_rejected() {
        let codec = codec();
        let blob = codec.protect(b"secret").unwrap();
        assert!(codec.unprotect(&blob[..blob.len() - 1]).is_err());
        assert!(codec.unprotect(&[]).is_err());
    }

    #[test]
    fn key_bytes_round_trip() {
        let key = SealingKey::generate().unwrap();
        let again = SealingKey::from_bytes(&key.to_bytes()).unwrap();
        let blob = SealedBlobCodec::new(key).protect(b"x").unwrap();
        assert_eq!(SealedBlobCodec::new(again).unprotect(&blob).unwrap(), b"x");
        assert!(SealingKey::from_bytes(&[0u8; 3]).is_err());
    }

    #[test]
    fn derivation_is_deterministic_and_separated() {
        let key = SealingKey::generate().unwrap();
        let a = key.derive("SHARED", b"alice", 32).unwrap();
        assert_eq!(a, key.derive("SHARED", b"alice", 32).unwrap());
        assert_ne!(a, key.derive("SHARED", b"bob", 32).unwrap());
        assert_eq!(key.derive("SHARED", b"alice", 7).unwrap().len(), 7);
    }
}
