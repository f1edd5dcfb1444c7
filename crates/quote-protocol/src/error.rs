//! Provisioning errors
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
use tao::TaoError;
use tao_utils::CryptoError;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error(display = "ProtocolError: endorsement certificate rejected: {}.", _0)]
    EndorsementError(String),
    #[error(display = "ProtocolError: quote rejected: {}.", _0)]
    QuoteError(String),
    #[error(display = "ProtocolError: quoted data does not match the certificate request.")]
    HashMismatchError,
    #[error(display = "ProtocolError: quote signature does not verify: {}.", _0)]
    SignatureError(String),
    #[error(display = "ProtocolError: signing instructions forbid this: {}.", _0)]
    PolicyViolation(String),
    #[error(display = "ProtocolError: credential activation failed: {}.", _0)]
    ActivationError(String),
    #[error(display = "ProtocolError: platform root error: {}.", _0)]
    PlatformError(String),
    #[error(display = "ProtocolError: malformed TPM structure: {}.", _0)]
    MarshalError(String),
    #[error(display = "ProtocolError: CryptoError: {:?}.", _0)]
    CryptoError(#[error(source)] CryptoError),
    #[error(display = "ProtocolError: TaoError: {:?}.", _0)]
    TaoError(#[error(source)] TaoError),
    #[error(display = "ProtocolError: RsaError: {:?}.", _0)]
    RsaError(#[error(source)] rsa::Error),
    #[error(display = "ProtocolError: BincodeError: {:?}.", _0)]
    BincodeError(#[error(source)] bincode::Error),
    #[error(display = "ProtocolError: SerdeJsonError: {:?}.", _0)]
    SerdeJsonError(#[error(source)] serde_json::Error),
    #[error(display = "ProtocolError: IOError: {:?}.", _0)]
    IOError(#[error(source)] std::io::Error),
}
