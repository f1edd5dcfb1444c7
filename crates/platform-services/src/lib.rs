//! Platform services
//!
//! A thin abstraction-layer over the services a platform provides to the
//! bottom-most Tao host.  Layers above the root never call into this crate
//! directly: they obtain the same services from their host through the Tao
//! interface.
//!
//! Services provided by this library:
//! - A random number source taken from a platform-specific trusted source of
//!   entropy.  Note for `std` targets the random source is assumed to be the
//!   random number generator of the host operating system.
//!
//! ## Authors
//!
//! The CloudProxy Development Team.
//!
//! ## Licensing and copyright notice
//!
//! See the `LICENSE.md` file in the CloudProxy root directory for
//! information on licensing and copyright.

#![cfg_attr(not(test), no_std)]

use cfg_if::cfg_if;

pub mod result;

cfg_if! {
    if #[cfg(feature = "std")] {
        #[path="std_platform_services.rs"]
        mod imp;
    } else {
        compile_error!(
            "Unrecognised feature: the only platform supported is std.");
    }
}

////////////////////////////////////////////////////////////////////////////////
// Platform services
////////////////////////////////////////////////////////////////////////////////

/// Fills a `buffer` with random bytes taken from a trusted entropy source.
///
/// Returns:
///     - `result::Result::Success` if the random number generation successfully
///       completed.  In which case, `buffer` is correctly filled with random
///       bytes to completion.
///     - `result::Result::Unavailable` if a trusted source of entropy is not
///       available on this platform.  In which case, the contents of `buffer`
///       can be trusted not to have been modified by this function.
///     - `result::Result::UnknownError` if a runtime error occurred during
///       generation of the random numbers.  In which case, the contents of
///       `buffer` are undefined and must not be used.
pub fn getrandom(buffer: &mut [u8]) -> result::Result<()> {
    if buffer.is_empty() {
        result::Result::Success(())
    } else {
        imp::platform_getrandom(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_buffer_is_trivially_filled() {
        let mut buffer = [0u8; 0];
        assert!(getrandom(&mut buffer).is_success());
    }

    #[test]
    fn buffer_is_filled() {
        let mut buffer = [0u8; 64];
        assert!(getrandom(&mut buffer).is_success());
        // 64 zero bytes from a working RNG is not a realistic outcome.
        assert!(buffer.iter().any(|b| *b != 0));
    }
}
