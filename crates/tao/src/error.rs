//! Tao errors
//!
//! Every failure a Tao operation can report is one variant of `TaoError`.
//! Across an RPC channel an error travels as an `RpcFailure`, which carries
//! the variant's `TaoErrorKind` so the client can rebuild the same variant.
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
use io_utils::SocketError;
use serde::{Deserialize, Serialize};
use tao_utils::CryptoError;

#[derive(Debug, Error)]
pub enum TaoError {
    #[error(display = "TaoError: name error: {}.", _0)]
    NameError(String),
    #[error(display = "TaoError: entropy error: {}.", _0)]
    EntropyError(String),
    #[error(display = "TaoError: signing error: {}.", _0)]
    SigningError(String),
    #[error(display = "TaoError: policy error: {}.", _0)]
    PolicyError(String),
    #[error(display = "TaoError: rollback error: {}.", _0)]
    RollbackError(String),
    #[error(display = "TaoError: channel error: {}.", _0)]
    ChannelError(String),
    #[error(display = "TaoError: invalid argument: {}.", _0)]
    InvalidArgument(String),
    #[error(display = "TaoError: sealed data failed its integrity check.")]
    IntegrityError,
    #[error(display = "TaoError: attestation does not verify: {}.", _0)]
    VerificationError(String),
    #[error(display = "TaoError: failed to obtain lock {:?}.", _0)]
    LockError(String),
    #[error(display = "TaoError: host error: {}.", _0)]
    HostError(String),
    #[error(display = "TaoError: CryptoError: {:?}.", _0)]
    CryptoError(#[error(source)] CryptoError),
    #[error(display = "TaoError: IOError: {:?}.", _0)]
    IOError(#[error(source)] std::io::Error),
    #[error(display = "TaoError: BincodeError: {:?}.", _0)]
    BincodeError(#[error(source)] bincode::Error),
}

impl<T> From<std::sync::PoisonError<T>> for TaoError {
    fn from(error: std::sync::PoisonError<T>) -> Self {
        TaoError::LockError(format!("{:?}", error))
    }
}

impl From<SocketError> for TaoError {
    fn from(error: SocketError) -> Self {
        TaoError::ChannelError(error.to_string())
    }
}

////////////////////////////////////////////////////////////////////////////////
// Errors on the wire.
////////////////////////////////////////////////////////////////////////////////

/// The taxonomy entry of an error, as carried in an RPC response.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaoErrorKind {
    Name,
    Entropy,
    Signing,
    Policy,
    Rollback,
    Channel,
    InvalidArgument,
    Integrity,
    Verification,
    Host,
}

/// A failed RPC, as reported by the host.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcFailure {
    pub kind: TaoErrorKind,
    pub message: String,
}

impl TaoError {
    pub fn kind(&self) -> TaoErrorKind {
        match self {
            TaoError::NameError(_) => TaoErrorKind::Name,
            TaoError::EntropyError(_) => TaoErrorKind::Entropy,
            TaoError::SigningError(_) => TaoErrorKind::Signing,
            TaoError::PolicyError(_) => TaoErrorKind::Policy,
            TaoError::RollbackError(_) => TaoErrorKind::Rollback,
            TaoError::ChannelError(_) => TaoErrorKind::Channel,
            TaoError::InvalidArgument(_) => TaoErrorKind::InvalidArgument,
            TaoError::IntegrityError => TaoErrorKind::Integrity,
            TaoError::VerificationError(_) => TaoErrorKind::Verification,
            TaoError::CryptoError(CryptoError::IntegrityError)
            | TaoError::CryptoError(CryptoError::MalformedBlob) => TaoErrorKind::Integrity,
            TaoError::CryptoError(CryptoError::EntropyError(_)) => TaoErrorKind::Entropy,
            TaoError::LockError(_)
            | TaoError::HostError(_)
            | TaoError::CryptoError(_)
            | TaoError::IOError(_)
            | TaoError::BincodeError(_) => TaoErrorKind::Host,
        }
    }

    /// The detail message sent to the peer, without the variant prefix.
    fn detail(&self) -> String {
        match self {
            TaoError::NameError(m)
            | TaoError::EntropyError(m)
            | TaoError::SigningError(m)
            | TaoError::PolicyError(m)
            | TaoError::RollbackError(m)
            | TaoError::ChannelError(m)
            | TaoError::InvalidArgument(m)
            | TaoError::VerificationError(m)
            | TaoError::LockError(m)
            | TaoError::HostError(m) => m.clone(),
            other => other.to_string(),
        }
    }

    pub fn to_failure(&self) -> RpcFailure {
        RpcFailure {
            kind: self.kind(),
            message: self.detail(),
        }
    }
}

impl From<RpcFailure> for TaoError {
    fn from(failure: RpcFailure) -> Self {
        let RpcFailure { kind, message } = failure;
        match kind {
            TaoErrorKind::Name => TaoError::NameError(message),
            TaoErrorKind::Entropy => TaoError::EntropyError(message),
            TaoErrorKind::Signing => TaoError::SigningError(message),
            TaoErrorKind::Policy => TaoError::PolicyError(message),
            TaoErrorKind::Rollback => TaoError::RollbackError(message),
            TaoErrorKind::Channel => TaoError::ChannelError(message),
            TaoErrorKind::InvalidArgument => TaoError::InvalidArgument(message),
            TaoErrorKind::Integrity => TaoError::IntegrityError,
            TaoErrorKind::Verification => TaoError::VerificationError(message),
            TaoErrorKind::Host => TaoError::HostError(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_survives_the_wire() {
        let errors = vec![
            TaoError::NameError("n".into()),
            TaoError::EntropyError("e".into()),
            TaoError::SigningError("s".into()),
            TaoError::PolicyError("p".into()),
            TaoError::RollbackError("r".into()),
            TaoError::InvalidArgument("i".into()),
            TaoError::IntegrityError,
            TaoError::VerificationError("v".into()),
        ];
        for error in errors {
            let failure = error.to_failure();
            let rebuilt = TaoError::from(failure.clone());
            assert_eq!(rebuilt.kind(), error.kind());
            assert_eq!(rebuilt.to_failure(), failure);
        }
    }

    #[test]
    fn codec_failures_are_integrity_failures() {
        assert_eq!(TaoError::CryptoError(CryptoError::MalformedBlob).kind(), TaoErrorKind::Integrity);
        assert_eq!(
            TaoError::IOError(std::io::Error::new(std::io::ErrorKind::Other, "x")).kind(),
            TaoErrorKind::Host
        );
    }
}
