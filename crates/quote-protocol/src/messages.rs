//! Provisioning messages
//!
//! The files exchanged between client and server: the certificate request
//! and the response carrying the wrapped certificate.  Both are flat bincode
//! structures.
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
use rsa::traits::PublicKeyParts;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{fs, path::Path};
use tao_utils::{keys::SigningKey, HashAlg};

pub const RSA_KEY_TYPE: &str = "RSA";

/// The key being certified and the name to certify it under.  Its hash is
/// what the client's quote vouches for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramKeyParameters {
    pub program_name: String,
    pub key_type: String,
    pub bit_modulus_size: u32,
    /// SubjectPublicKeyInfo DER.
    pub public_key_der: Vec<u8>,
}

impl ProgramKeyParameters {
    pub fn new(program_name: &str, key: &SigningKey) -> Result<Self, ProtocolError> {
        Ok(ProgramKeyParameters {
            program_name: program_name.to_string(),
            key_type: RSA_KEY_TYPE.to_string(),
            bit_modulus_size: (key.rsa().size() * 8) as u32,
            public_key_der: key.public_key_der()?,
        })
    }

    /// The value the quote's `extraData` must carry.
    pub fn request_hash(&self, alg: HashAlg) -> Result<Vec<u8>, ProtocolError> {
        Ok(alg.digest(&bincode::serialize(self)?))
    }
}

/// The quoting key, as the client presents it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteKeyCredential {
    pub hash_alg: HashAlg,
    /// SubjectPublicKeyInfo DER.
    pub public_key_der: Vec<u8>,
    /// The key's TPM name.
    pub name: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramKeyRequest {
    /// DER endorsement certificate issued by the policy root.
    pub endorsement_cert: Vec<u8>,
    pub program_key: ProgramKeyParameters,
    pub credential: QuoteKeyCredential,
    /// Marshaled `TPMS_ATTEST`.
    pub quote: Vec<u8>,
    pub quote_signature: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramKeyResponse {
    pub hash_alg: HashAlg,
    pub encrypted_cert: Vec<u8>,
    pub encrypted_cert_hmac: Vec<u8>,
    /// The OAEP-wrapped seed.
    pub secret: Vec<u8>,
    pub enc_identity: Vec<u8>,
    pub integrity_hmac: Vec<u8>,
}

/// Reads a bincode provisioning file.
pub fn read_message<M: DeserializeOwned>(path: &Path) -> Result<M, ProtocolError> {
    Ok(bincode::deserialize(&fs::read(path)?)?)
}

/// Writes a bincode provisioning file.
pub fn write_message<M: Serialize>(path: &Path, message: &M) -> Result<(), ProtocolError> {
    fs::write(path, bincode::serialize(message)?)?;
    Ok(())
}
