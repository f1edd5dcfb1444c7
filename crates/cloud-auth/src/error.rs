//! Errors raised while loading or mutating an ACL.
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
pub enum CloudAuthError {
    #[error(display = "CloudAuthError: malformed ACL: {}.", _0)]
    MalformedAcl(String),
    #[error(display = "CloudAuthError: empty {} name.", _0)]
    EmptyName(&'static str),
    #[error(display = "CloudAuthError: unknown operation {:?}.", _0)]
    UnknownOp(String),
    #[error(display = "CloudAuthError: SerdeJsonError: {:?}.", _0)]
    SerdeJsonError(#[error(source)] serde_json::Error),
    #[error(display = "CloudAuthError: IOError: {:?}.", _0)]
    IOError(#[error(source)] std::io::Error),
}
