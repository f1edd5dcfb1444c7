//! Error codes for platform services
//!
//! A platform service can end in one of three ways:
//!
//! 1. *Success*, in which the platform service successfully executed,
//! 2. *Unavailable*, in which the service in question is not available on
//!    the current platform,
//! 3. *UnknownError*: the service is available, but there was some error
//!    raised during service execution.
//!
//! ## Authors
//!
//! The CloudProxy Development Team.
//!
//! ## Licensing and copyright notice
//!
//! See the `LICENSE.md` file in the CloudProxy root directory for
//! information on licensing and copyright.

/// Error codes describing the result of a platform service function.
#[derive(Debug, PartialEq, Eq)]
pub enum Result<T> {
    /// The operation completed successfully.
    Success(T),
    /// The operation is unavailable on this platform.
    Unavailable,
    /// An unknown error occurred during the execution of the operation.
    UnknownError,
}

impl<T> Result<T> {
    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self, Result::Success(_))
    }

    /// Converts into a `core::result::Result`, mapping both failure modes
    /// through `f`.
    pub fn ok_or_else<E, F>(self, f: F) -> core::result::Result<T, E>
    where
        F: FnOnce(&'static str) -> E,
    {
        match self {
            Result::Success(t) => Ok(t),
            Result::Unavailable => Err(f("platform service unavailable")),
            Result::UnknownError => Err(f("platform service failed")),
        }
    }
}
