//! CloudProxy cryptographic utilities
//!
//! Material shared by every layer of the Tao stack:
//!
//! - `hash`: the agile hash/HMAC algorithm choice used by quotes and key
//!   derivation,
//! - `kdf`: the TPM2 `KDFa` counter-mode key derivation function,
//! - `sealed_blob`: authenticated encryption of small secrets under a
//!   host-bound symmetric key,
//! - `keys`: owned RSA signing keys,
//! - `x509`: certificate issuance and verification.
//!
//! ## Authors
//!
//! The CloudProxy Development Team.
//!
//! ## Licensing and copyright notice
//!
//! See the `LICENSE.md` file in the CloudProxy root directory for
//! information on licensing and copyright.

pub mod cipher;
pub mod error;
pub mod hash;
pub mod kdf;
pub mod keys;
pub mod sealed_blob;
pub mod x509;

pub use error::CryptoError;
pub use hash::{sha256, HashAlg};

/// Seconds since the Unix epoch, read from the system clock.
#[inline]
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Fills a fresh buffer of `size` bytes from the platform entropy source.
pub fn random_bytes(size: usize) -> Result<Vec<u8>, CryptoError> {
    let mut buffer = vec![0u8; size];
    platform_services::getrandom(&mut buffer).ok_or_else(CryptoError::EntropyError)?;
    Ok(buffer)
}
