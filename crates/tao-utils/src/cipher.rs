//! AES-128 stream modes
//!
//! Counter mode protects sealed blobs and wrapped certificates; CFB mode is
//! what the TPM uses for credential blobs.
//!
//! ## Authors
//!
//! The CloudProxy Development Team.
//!
//! ## Licensing and copyright notice
//!
//! See the `LICENSE.md` file in the CloudProxy root directory for
//! information on licensing and copyright.

use crate::error::CryptoError;
use aes::{
    cipher::{AsyncStreamCipher, KeyIvInit, StreamCipher},
    Aes128,
};

type Aes128Ctr = ctr::Ctr128BE<Aes128>;
type Aes128CfbEnc = cfb_mode::Encryptor<Aes128>;
type Aes128CfbDec = cfb_mode::Decryptor<Aes128>;

/// All-zero IV, for keys that are used exactly once.
pub const ZERO_IV: [u8; 16] = [0u8; 16];

/// Applies the AES-128-CTR keystream for `key` and `iv` to `buffer` in place.
/// Encryption and decryption are the same operation.
pub fn aes128_ctr(key: &[u8], iv: &[u8], buffer: &mut [u8]) -> Result<(), CryptoError> {
    Aes128Ctr::new_from_slices(key, iv)
        .map_err(|_| CryptoError::InvalidKeyLength)?
        .apply_keystream(buffer);
    Ok(())
}

pub fn aes128_cfb_encrypt(key: &[u8], iv: &[u8], buffer: &mut [u8]) -> Result<(), CryptoError> {
    Aes128CfbEnc::new_from_slices(key, iv)
        .map_err(|_| CryptoError::InvalidKeyLength)?
        .encrypt(buffer);
    Ok(())
}

pub fn aes128_cfb_decrypt(key: &[u8], iv: &[u8], buffer: &mut [u8]) -> Result<(), CryptoError> {
    Aes128CfbDec::new_from_slices(key, iv)
        .map_err(|_| CryptoError::InvalidKeyLength)?
        .decrypt(buffer);
    Ok(())
}
