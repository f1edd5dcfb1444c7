//! TPM2 quote structures
//!
//! The signed body of a TPM2 quote is a marshaled `TPMS_ATTEST`.  All
//! integers are big-endian; sized buffers (`TPM2B_*`) carry a `u16` length.
//!
//! ```text
//! TPMS_ATTEST {
//!     magic           u32      0xff544347
//!     type            u16      0x8018 (quote)
//!     qualifiedSigner TPM2B_NAME
//!     extraData       TPM2B_DATA
//!     clockInfo       { clock u64, resetCount u32, restartCount u32, safe u8 }
//!     firmwareVersion u64
//!     attested.quote  { pcrSelect TPML_PCR_SELECTION, pcrDigest TPM2B_DIGEST }
//! }
//! ```
//!
//! ## Authors
//!
//! The CloudProxy Development Team.
//!
//! ## Licensing and copyright notice
//!
//! See the `LICENSE.md` file in the CloudProxy root directory for
//! information on licensing and copyright.

use crate::error::ProtocolError;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Read};
use tao_utils::HashAlg;

/// `TPM_GENERATED_VALUE`: marks structures the TPM itself produced.
pub const TPM_GENERATED_VALUE: u32 = 0xff54_4347;
/// `TPM_ST_ATTEST_QUOTE`.
pub const TPM_ST_ATTEST_QUOTE: u16 = 0x8018;
/// Number of PCRs in a bank.
pub const PCR_COUNT: usize = 24;
/// Size of a PCR selection bitmap covering `PCR_COUNT` registers.
pub const PCR_SELECT_SIZE: usize = PCR_COUNT / 8;

const MAX_PCR_SELECTIONS: u32 = 16;

/// One `TPMS_PCR_SELECTION`: a hash bank and a bitmap of registers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PcrSelection {
    pub hash: u16,
    pub select: Vec<u8>,
}

impl PcrSelection {
    /// Selects `indices` in the bank of `alg`.
    pub fn new(alg: HashAlg, indices: &[usize]) -> Result<Self, ProtocolError> {
        let mut select = vec![0u8; PCR_SELECT_SIZE];
        for &index in indices {
            if index >= PCR_COUNT {
                return Err(ProtocolError::MarshalError(format!("PCR {} does not exist", index)));
            }
            select[index / 8] |= 1 << (index % 8);
        }
        Ok(PcrSelection {
            hash: alg.tpm_alg_id(),
            select,
        })
    }

    /// The selected register indices, in ascending order.
    pub fn indices(&self) -> Vec<usize> {
        (0..self.select.len() * 8)
            .filter(|i| self.select[i / 8] & (1 << (i % 8)) != 0)
            .collect()
    }

    pub fn hash_alg(&self) -> Result<HashAlg, ProtocolError> {
        HashAlg::from_tpm_alg_id(self.hash)
            .ok_or_else(|| ProtocolError::QuoteError(format!("unsupported PCR bank {:#06x}", self.hash)))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockInfo {
    pub clock: u64,
    pub reset_count: u32,
    pub restart_count: u32,
    pub safe: u8,
}

/// A `TPMS_ATTEST` whose attested field is a quote.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteInfo {
    pub magic: u32,
    pub attest_type: u16,
    pub qualified_signer: Vec<u8>,
    pub extra_data: Vec<u8>,
    pub clock_info: ClockInfo,
    pub firmware_version: u64,
    pub pcr_select: Vec<PcrSelection>,
    pub pcr_digest: Vec<u8>,
}

impl QuoteInfo {
    pub fn marshal(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut out = Vec::new();
        out.write_u32::<BigEndian>(self.magic)?;
        out.write_u16::<BigEndian>(self.attest_type)?;
        write_sized(&mut out, &self.qualified_signer)?;
        write_sized(&mut out, &self.extra_data)?;
        out.write_u64::<BigEndian>(self.clock_info.clock)?;
        out.write_u32::<BigEndian>(self.clock_info.reset_count)?;
        out.write_u32::<BigEndian>(self.clock_info.restart_count)?;
        out.write_u8(self.clock_info.safe)?;
        out.write_u64::<BigEndian>(self.firmware_version)?;
        out.write_u32::<BigEndian>(self.pcr_select.len() as u32)?;
        for selection in &self.pcr_select {
            out.write_u16::<BigEndian>(selection.hash)?;
            if selection.select.len() > u8::MAX as usize {
                return Err(ProtocolError::MarshalError("PCR bitmap too large".to_string()));
            }
            out.write_u8(selection.select.len() as u8)?;
            out.extend_from_slice(&selection.select);
        }
        write_sized(&mut out, &self.pcr_digest)?;
        Ok(out)
    }

    /// Parses a marshaled quote.  Trailing bytes are an error.
    pub fn unmarshal(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let mut cursor = Cursor::new(bytes);
        let quote = Self::read(&mut cursor).map_err(|e| ProtocolError::MarshalError(e.to_string()))?;
        if cursor.position() as usize != bytes.len() {
            return Err(ProtocolError::MarshalError("trailing bytes after quote".to_string()));
        }
        Ok(quote)
    }

    fn read(cursor: &mut Cursor<&[u8]>) -> std::io::Result<Self> {
        let magic = cursor.read_u32::<BigEndian>()?;
        let attest_type = cursor.read_u16::<BigEndian>()?;
        let qualified_signer = read_sized(cursor)?;
        let extra_data = read_sized(cursor)?;
        let clock_info = ClockInfo {
            clock: cursor.read_u64::<BigEndian>()?,
            reset_count: cursor.read_u32::<BigEndian>()?,
            restart_count: cursor.read_u32::<BigEndian>()?,
            safe: cursor.read_u8()?,
        };
        let firmware_version = cursor.read_u64::<BigEndian>()?;
        let count = cursor.read_u32::<BigEndian>()?;
        if count > MAX_PCR_SELECTIONS {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("{} PCR selections", count),
            ));
        }
        let mut pcr_select = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let hash = cursor.read_u16::<BigEndian>()?;
            let size = cursor.read_u8()?;
            let mut select = vec![0u8; size as usize];
            cursor.read_exact(&mut select)?;
            pcr_select.push(PcrSelection { hash, select });
        }
        let pcr_digest = read_sized(cursor)?;
        Ok(QuoteInfo {
            magic,
            attest_type,
            qualified_signer,
            extra_data,
            clock_info,
            firmware_version,
            pcr_select,
            pcr_digest,
        })
    }

    /// Checks the header fields the TPM sets on every quote.
    pub fn check_header(&self) -> Result<(), ProtocolError> {
        if self.magic != TPM_GENERATED_VALUE {
            return Err(ProtocolError::QuoteError(format!("bad magic {:#010x}", self.magic)));
        }
        if self.attest_type != TPM_ST_ATTEST_QUOTE {
            return Err(ProtocolError::QuoteError(format!(
                "attestation type {:#06x} is not a quote",
                self.attest_type
            )));
        }
        Ok(())
    }
}

/// The value a quote signature covers: the hash of the marshaled quote.
#[inline]
pub fn quoted_value(alg: HashAlg, marshaled_quote: &[u8]) -> Vec<u8> {
    alg.digest(marshaled_quote)
}

/// The digest of the selected registers, concatenated in index order.
pub fn pcr_digest(alg: HashAlg, values: &[&[u8]]) -> Vec<u8> {
    alg.digest_parts(values)
}

/// `len(data)` as a big-endian `u16`, followed by `data`.
pub fn write_sized(out: &mut Vec<u8>, data: &[u8]) -> Result<(), ProtocolError> {
    if data.len() > u16::MAX as usize {
        return Err(ProtocolError::MarshalError(format!("{} bytes do not fit a TPM2B", data.len())));
    }
    out.write_u16::<BigEndian>(data.len() as u16)?;
    out.extend_from_slice(data);
    Ok(())
}

fn read_sized(cursor: &mut Cursor<&[u8]>) -> std::io::Result<Vec<u8>> {
    let size = cursor.read_u16::<BigEndian>()?;
    let mut data = vec![0u8; size as usize];
    cursor.read_exact(&mut data)?;
    Ok(data)
}

/// Splits a `TPM2B` into its contents, requiring the length to cover exactly
/// the rest of `bytes`.
pub fn unwrap_sized(bytes: &[u8]) -> Result<&[u8], ProtocolError> {
    if bytes.len() < 2 {
        return Err(ProtocolError::MarshalError("TPM2B shorter than its size".to_string()));
    }
    let size = u16::from_be_bytes([bytes[0], bytes[1]]) as usize;
    if bytes.len() != size + 2 {
        return Err(ProtocolError::MarshalError(format!(
            "TPM2B claims {} bytes, holds {}",
            size,
            bytes.len() - 2
        )));
    }
    Ok(&bytes[2..])
}
