//! CA server wire messages
//!
//! One bincode-serialized request and one response per exchange, framed by
//! `io_utils::socket`.
//!
//! ## Authors
//!
//! The CloudProxy Development Team.
//!
//! ## Licensing and copyright notice
//!
//! See the `LICENSE.md` file in the CloudProxy root directory for
//! information on licensing and copyright.

use serde::{Deserialize, Serialize};
use tao::Attestation;
use tao_utils::x509::X509Details;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaRequest {
    /// Witness `attestation` under the policy root.  With `x509_details`,
    /// additionally certify the attested key with those subject details.
    Attestation {
        attestation: Attestation,
        x509_details: Option<X509Details>,
    },
    Shutdown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaResponseType {
    Success,
    Failure,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaResponse {
    pub kind: CaResponseType,
    pub reason: Option<String>,
    pub attestation: Option<Attestation>,
    /// DER certificates, leaf first, ending at the policy certificate.
    pub x509_chain: Vec<Vec<u8>>,
}

impl CaResponse {
    pub fn success() -> Self {
        CaResponse {
            kind: CaResponseType::Success,
            reason: None,
            attestation: None,
            x509_chain: Vec::new(),
        }
    }

    pub fn failure<T: Into<String>>(reason: T) -> Self {
        CaResponse {
            kind: CaResponseType::Failure,
            reason: Some(reason.into()),
            attestation: None,
            x509_chain: Vec::new(),
        }
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        self.kind == CaResponseType::Success
    }
}
