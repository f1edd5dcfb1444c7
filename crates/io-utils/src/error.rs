//! IO-related errors
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

////////////////////////////////////////////////////////////////////////////////
// Socket-related error types.
////////////////////////////////////////////////////////////////////////////////

/// An enumerated type for CloudProxy-specific io errors.
#[derive(Debug, Error)]
pub enum SocketError {
    #[error(display = "SocketError: an IO error occurred: {:?}.", _0)]
    IOError(#[error(source)] std::io::Error),
    #[error(display = "SocketError: the channel is closed.")]
    ChannelClosed,
    #[error(display = "SocketError: the stream ended inside a message.")]
    TruncatedMessage,
    #[error(display = "SocketError: message of {} bytes exceeds the frame limit.", _0)]
    MessageTooLarge(u64),
    #[error(display = "SocketError: BincodeError: {:?}.", _0)]
    BincodeError(#[error(source)] bincode::Error),
    #[error(display = "SocketError: invalid channel specification: {:?}.", _0)]
    InvalidChannelSpec(String),
}
