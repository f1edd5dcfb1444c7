//! CA server error type
//!
//! ## Authors
//!
//! The CloudProxy Development Team.
//!
//! ## Licensing and copyright notice
//!
//! See the `LICENSE.md` file in the CloudProxy root directory for
//! information on licensing and copyright.

use cloud_auth::CloudAuthError;
use err_derive::Error;
use io_utils::SocketError;
use tao::TaoError;
use tao_utils::CryptoError;

#[derive(Debug, Error)]
pub enum CaServerError {
    #[error(display = "CaServer: TaoError: {}.", _0)]
    TaoError(#[error(source)] TaoError),
    #[error(display = "CaServer: CryptoError: {}.", _0)]
    CryptoError(#[error(source)] CryptoError),
    #[error(display = "CaServer: CloudAuthError: {}.", _0)]
    CloudAuthError(#[error(source)] CloudAuthError),
    #[error(display = "CaServer: SocketError: {}.", _0)]
    SocketError(#[error(source)] SocketError),
    #[error(display = "CaServer: IOError: {:?}.", _0)]
    IOError(#[error(source)] std::io::Error),
    #[error(display = "CaServer: SerdeJsonError: {:?}.", _0)]
    SerdeJsonError(#[error(source)] serde_json::Error),
    #[error(display = "CaServer: Nix Error: {:?}.", _0)]
    NixError(#[error(source)] nix::Error),
    #[error(display = "CaServer: invalid configuration: {}.", _0)]
    ConfigError(String),
    #[error(display = "CaServer: {} may not obtain certificates.", _0)]
    Unauthorized(String),
    #[error(display = "CaServer: request failed: {}.", _0)]
    RequestFailed(String),
}
