//! The TPM2 `KDFa` key derivation function (TPM 2.0 Part 1, 11.4.10.2).
//!
//! `KDFa` is an HMAC-based counter-mode construction:
//!
//! ```text
//! K(i) = HMAC(key, [i]32 || label || 0x00 || contextU || contextV || [bits]32)
//! ```
//!
//! The output is the first `bits` bits of `K(1) || K(2) || ...`.
//!
//! ## Authors
//!
//! The CloudProxy Development Team.
//!
//! ## Licensing and copyright notice
//!
//! See the `LICENSE.md` file in the CloudProxy root directory for
//! information on licensing and copyright.

use crate::{error::CryptoError, hash::HashAlg};
use byteorder::{BigEndian, ByteOrder};

/// Derives `bits` bits of key material from `key`.
pub fn kdfa(
    alg: HashAlg,
    key: &[u8],
    label: &str,
    context_u: &[u8],
    context_v: &[u8],
    bits: u32,
) -> Result<Vec<u8>, CryptoError> {
    let bytes = ((bits + 7) / 8) as usize;

    let mut label_z = label.as_bytes().to_vec();
    label_z.push(0);

    let mut bits_be = [0u8; 4];
    BigEndian::write_u32(&mut bits_be, bits);

    let mut out = Vec::with_capacity(bytes + alg.size());
    let mut counter: u32 = 0;
    while out.len() < bytes {
        counter += 1;
        let mut counter_be = [0u8; 4];
        BigEndian::write_u32(&mut counter_be, counter);
        let block = alg.hmac(key, &[&counter_be, &label_z, context_u, context_v, &bits_be])?;
        out.extend_from_slice(&block);
    }
    out.truncate(bytes);

    // A partial leading byte keeps only its low-order bits.
    if bits % 8 != 0 {
        out[0] &= (1u8 << (bits % 8)) - 1;
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_length_follows_bits() {
        for (bits, len) in [(128, 16), (256, 32), (160, 20), (512, 64), (12, 2)] {
            let out = kdfa(HashAlg::Sha256, b"seed", "STORAGE", b"name", b"", bits).unwrap();
            assert_eq!(out.len(), len);
        }
    }

    #[test]
    fn deterministic() {
        let a = kdfa(HashAlg::Sha1, b"seed", "INTEGRITY", b"", b"", 160).unwrap();
        let b = kdfa(HashAlg::Sha1, b"seed", "INTEGRITY", b"", b"", 160).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn inputs_separate_outputs() {
        let base = kdfa(HashAlg::Sha256, b"seed", "STORAGE", b"name", b"", 128).unwrap();
        let other_label = kdfa(HashAlg::Sha256, b"seed", "PROTECT", b"name", b"", 128).unwrap();
        let other_context = kdfa(HashAlg::Sha256, b"seed", "STORAGE", b"nome", b"", 128).unwrap();
        let other_key = kdfa(HashAlg::Sha256, b"seeds", "STORAGE", b"name", b"", 128).unwrap();
        assert_ne!(base, other_label);
        assert_ne!(base, other_context);
        assert_ne!(base, other_key);
    }

    #[test]
    fn first_block_matches_hmac_definition() {
        let out = kdfa(HashAlg::Sha256, b"k", "PROTECT", b"", b"", 256).unwrap();
        let expected = HashAlg::Sha256
            .hmac(b"k", &[&[0, 0, 0, 1], b"PROTECT\0", &[0, 0, 1, 0]])
            .unwrap();
        assert_eq!(out, expected);
    }

    #[test]
    fn partial_byte_is_masked() {
        let out = kdfa(HashAlg::Sha256, b"k", "X", b"", b"", 4).unwrap();
        assert_eq!(out.len(), 1);
        assert!(out[0] < 16);
    }
}
