//! Errors raised by the cryptographic utilities.
//!
//! ## Authors
//!
//! The CloudProxy Development Team.
//!
//! ## Licensing and copyright notice
//!
//! See the `LICENSE.md` file in the CloudProxy root directory for
//! information on licensing and copyright.

use err_derive::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error(display = "CryptoError: entropy source failed: {}.", _0)]
    EntropyError(&'static str),
    #[error(display = "CryptoError: unsupported hash algorithm: {:?}.", _0)]
    UnsupportedHashAlgorithm(String),
    #[error(display = "CryptoError: invalid key length.")]
    InvalidKeyLength,
    #[error(display = "CryptoError: integrity check failed.")]
    IntegrityError,
    #[error(display = "CryptoError: malformed sealed blob.")]
    MalformedBlob,
    #[error(display = "CryptoError: RSA error: {:?}.", _0)]
    RsaError(#[error(source)] rsa::Error),
    #[error(display = "CryptoError: key encoding error: {}.", _0)]
    KeyEncodingError(String),
    #[error(display = "CryptoError: DER error: {:?}.", _0)]
    DerError(#[error(source)] der::Error),
    #[error(display = "CryptoError: X.509 error: {}.", _0)]
    X509Error(String),
    #[error(display = "CryptoError: certificate is not signed by the expected issuer.")]
    CertificateVerificationError,
    #[error(display = "CryptoError: signature does not verify.")]
    SignatureVerificationError,
    #[error(display = "CryptoError: BincodeError: {:?}.", _0)]
    BincodeError(#[error(source)] bincode::Error),
}
