//! Owned RSA keys.
//!
//! `SigningKey` exclusively owns its private key; the underlying
//! `rsa::RsaPrivateKey` wipes its limbs when dropped, and every exported
//! encoding is handed out in a `Zeroizing` buffer.
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
use rand::rngs::OsRng;
use rsa::{
    pkcs1v15,
    pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey},
    signature::{SignatureEncoding, Signer, Verifier},
    RsaPrivateKey, RsaPublicKey,
};
use sha2::Sha256;
use std::convert::TryFrom;
use zeroize::Zeroizing;

/// Modulus size of keys generated by default.
pub const DEFAULT_RSA_BITS: usize = 2048;

/// An RSA key used to sign attestations, certificates and quotes.
#[derive(Clone)]
pub struct SigningKey {
    key: RsaPrivateKey,
}

impl SigningKey {
    pub fn generate(bits: usize) -> Result<Self, CryptoError> {
        let key = RsaPrivateKey::new(&mut OsRng, bits)?;
        Ok(SigningKey { key })
    }

    #[inline]
    pub fn from_rsa(key: RsaPrivateKey) -> Self {
        SigningKey { key }
    }

    pub fn from_pkcs8_der(der: &[u8]) -> Result<Self, CryptoError> {
        let key = RsaPrivateKey::from_pkcs8_der(der)
            .map_err(|e| CryptoError::KeyEncodingError(e.to_string()))?;
        Ok(SigningKey { key })
    }

    pub fn to_pkcs8_der(&self) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        let document = self
            .key
            .to_pkcs8_der()
            .map_err(|e| CryptoError::KeyEncodingError(e.to_string()))?;
        Ok(Zeroizing::new(document.as_bytes().to_vec()))
    }

    #[inline]
    pub fn rsa(&self) -> &RsaPrivateKey {
        &self.key
    }

    #[inline]
    pub fn public_key(&self) -> RsaPublicKey {
        self.key.to_public_key()
    }

    /// The SubjectPublicKeyInfo DER encoding of the public half.
    pub fn public_key_der(&self) -> Result<Vec<u8>, CryptoError> {
        public_key_to_der(&self.public_key())
    }

    /// RSASSA-PKCS1-v1_5 with SHA-256 over `message`.
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let signer = pkcs1v15::SigningKey::<Sha256>::new(self.key.clone());
        let signature = signer
            .try_sign(message)
            .map_err(|_| CryptoError::SignatureVerificationError)?;
        Ok(signature.to_vec())
    }

    /// The signer handed to the X.509 certificate builder.
    #[inline]
    pub(crate) fn certificate_signer(&self) -> pkcs1v15::SigningKey<Sha256> {
        pkcs1v15::SigningKey::<Sha256>::new(self.key.clone())
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SigningKey(..)")
    }
}

pub fn public_key_to_der(key: &RsaPublicKey) -> Result<Vec<u8>, CryptoError> {
    let document = key
        .to_public_key_der()
        .map_err(|e| CryptoError::KeyEncodingError(e.to_string()))?;
    Ok(document.as_bytes().to_vec())
}

pub fn public_key_from_der(der: &[u8]) -> Result<RsaPublicKey, CryptoError> {
    RsaPublicKey::from_public_key_der(der).map_err(|e| CryptoError::KeyEncodingError(e.to_string()))
}

/// Checks an RSASSA-PKCS1-v1_5/SHA-256 `signature` over `message` under the
/// DER-encoded public key `public_key_der`.
pub fn verify_signature(public_key_der: &[u8], message: &[u8], signature: &[u8]) -> Result<(), CryptoError> {
    let key = public_key_from_der(public_key_der)?;
    let verifier = pkcs1v15::VerifyingKey::<Sha256>::new(key);
    let signature = pkcs1v15::Signature::try_from(signature)
        .map_err(|_| CryptoError::SignatureVerificationError)?;
    verifier
        .verify(message, &signature)
        .map_err(|_| CryptoError::SignatureVerificationError)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lazy_static::lazy_static;

    lazy_static! {
        static ref KEY: SigningKey = SigningKey::generate(1024).unwrap();
    }

    #[test]
    fn sign_and_verify() {
        let der = KEY.public_key_der().unwrap();
        let signature = KEY.sign(b"statement").unwrap();
        assert!(verify_signature(&der, b"statement", &signature).is_ok());
        assert!(verify_signature(&der, b"statemenu", &signature).is_err());
        assert!(verify_signature(&der, b"statement", &signature[1..]).is_err());
    }

    #[test]
    fn pkcs8_round_trip() {
        let der = KEY.to_pkcs8_der().unwrap();
        let again = SigningKey::from_pkcs8_der(&der).unwrap();
        assert_eq!(again.public_key(), KEY.public_key());
        assert!(SigningKey::from_pkcs8_der(&der[1..]).is_err());
    }

    #[test]
    fn public_key_der_round_trip() {
        let der = KEY.public_key_der().unwrap();
        assert_eq!(public_key_from_der(&der).unwrap(), KEY.public_key());
    }
}
