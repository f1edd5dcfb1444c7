//! IO-related functionality
//!
//! This is input/output-related functionality that is useful in many places
//! across the CloudProxy codebase.  The material consists of length-prefixed
//! framing over any byte stream, the file-descriptor message channel a hosted
//! program uses to reach its host, and socket helpers that move whole
//! serialized messages.
//!
//! ## Authors
//!
//! The CloudProxy Development Team.
//!
//! ## Licensing and copyright notice
//!
//! See the `LICENSE.md` file in the CloudProxy root directory for
//! information on licensing and copyright.

/// Message channels between hosted programs and their hosts.
pub mod channel;
/// IO-related error type.
pub mod error;
/// Length-prefixed framing.
pub mod fd;
/// Whole-message socket helpers.
pub mod socket;

pub use channel::{FdMessageChannel, MessageChannel};
pub use error::SocketError;
