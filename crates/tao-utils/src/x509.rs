//! X.509 certificate issuance and verification
//!
//! Certificates are issued by the policy root (or a key it delegated to) for
//! endorsement keys, program keys, and subject keys presented to the CA
//! server.  All certificates are RSA/SHA-256 and DER-encoded.
//!
//! ## Authors
//!
//! The CloudProxy Development Team.
//!
//! ## Licensing and copyright notice
//!
//! See the `LICENSE.md` file in the CloudProxy root directory for
//! information on licensing and copyright.

use crate::{
    error::CryptoError,
    keys::{public_key_from_der, SigningKey},
};
use der::{Decode, Encode};
use rsa::{
    pkcs1v15,
    signature::Verifier,
    RsaPublicKey,
};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::{convert::TryFrom, str::FromStr, time::Duration};
use x509_cert::{
    builder::{Builder, CertificateBuilder, Profile},
    name::Name,
    serial_number::SerialNumber,
    spki::SubjectPublicKeyInfoOwned,
    time::Validity,
    Certificate,
};

////////////////////////////////////////////////////////////////////////////////
// Subject names.
////////////////////////////////////////////////////////////////////////////////

/// The distinguished-name fields a certificate subject may carry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct X509Details {
    pub common_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organizational_unit_name: Option<String>,
}

impl X509Details {
    pub fn new<T: Into<String>>(common_name: T) -> Self {
        X509Details {
            common_name: common_name.into(),
            ..Default::default()
        }
    }

    /// Renders the details as an RFC 4514 distinguished name.
    pub fn to_name(&self) -> Result<Name, CryptoError> {
        let mut components = vec![format!("CN={}", escape(&self.common_name))];
        if let Some(ou) = &self.organizational_unit_name {
            components.push(format!("OU={}", escape(ou)));
        }
        if let Some(o) = &self.organization_name {
            components.push(format!("O={}", escape(o)));
        }
        if let Some(st) = &self.state_name {
            components.push(format!("ST={}", escape(st)));
        }
        if let Some(c) = &self.country_name {
            components.push(format!("C={}", escape(c)));
        }
        Name::from_str(&components.join(",")).map_err(|e| CryptoError::X509Error(e.to_string()))
    }
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

////////////////////////////////////////////////////////////////////////////////
// Issuance.
////////////////////////////////////////////////////////////////////////////////

/// What kind of certificate to issue.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CertificateKind {
    /// Self-signed trust anchor.
    Root,
    /// Intermediate certificate that may itself sign certificates.
    Authority,
    /// End-entity certificate.  `key_encipherment` additionally allows the
    /// subject key to be used for key transport.
    Leaf { key_encipherment: bool },
}

/// The parameters of one certificate issuance.
#[derive(Clone, Debug)]
pub struct CertificateRequest<'a> {
    pub kind: CertificateKind,
    pub serial: u64,
    pub validity: Duration,
    pub issuer: &'a X509Details,
    pub subject: &'a X509Details,
    /// SubjectPublicKeyInfo DER of the key being certified.  Ignored for
    /// `CertificateKind::Root`, which certifies the signer's own key.
    pub subject_public_key_der: &'a [u8],
}

/// Issues a DER-encoded certificate signed by `signer`.
pub fn issue_certificate(signer: &SigningKey, request: &CertificateRequest<'_>) -> Result<Vec<u8>, CryptoError> {
    let issuer = request.issuer.to_name()?;
    let (profile, spki_der) = match request.kind {
        CertificateKind::Root => (Profile::Root, signer.public_key_der()?),
        CertificateKind::Authority => (
            Profile::SubCA {
                issuer,
                path_len_constraint: None,
            },
            request.subject_public_key_der.to_vec(),
        ),
        CertificateKind::Leaf { key_encipherment } => (
            Profile::Leaf {
                issuer,
                enable_key_agreement: false,
                enable_key_encipherment: key_encipherment,
            },
            request.subject_public_key_der.to_vec(),
        ),
    };

    // Reject anything that is not an RSA key before certifying it.
    public_key_from_der(&spki_der)?;
    let spki = SubjectPublicKeyInfoOwned::from_der(&spki_der)?;
    let serial = SerialNumber::new(&serial_bytes(request.serial))?;
    let validity = Validity::from_now(request.validity)?;
    let subject = request.subject.to_name()?;

    let certificate_signer = signer.certificate_signer();
    let builder = CertificateBuilder::new(profile, serial, validity, subject, spki, &certificate_signer)
        .map_err(|e| CryptoError::X509Error(e.to_string()))?;
    let certificate = builder
        .build::<pkcs1v15::Signature>()
        .map_err(|e| CryptoError::X509Error(e.to_string()))?;
    Ok(certificate.to_der()?)
}

/// Minimal big-endian two's-complement encoding of a positive serial number.
fn serial_bytes(serial: u64) -> Vec<u8> {
    let serial = serial.max(1);
    let bytes = serial.to_be_bytes();
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len() - 1);
    let mut out = bytes[first..].to_vec();
    if out[0] & 0x80 != 0 {
        out.insert(0, 0);
    }
    out
}

////////////////////////////////////////////////////////////////////////////////
// Verification.
////////////////////////////////////////////////////////////////////////////////

/// Checks that `certificate_der` carries a valid signature by `issuer`.
pub fn verify_certificate(certificate_der: &[u8], issuer: &RsaPublicKey) -> Result<(), CryptoError> {
    let certificate = Certificate::from_der(certificate_der)?;
    let tbs = certificate.tbs_certificate.to_der()?;
    let signature = pkcs1v15::Signature::try_from(certificate.signature.raw_bytes())
        .map_err(|_| CryptoError::CertificateVerificationError)?;
    pkcs1v15::VerifyingKey::<Sha256>::new(issuer.clone())
        .verify(&tbs, &signature)
        .map_err(|_| CryptoError::CertificateVerificationError)
}

/// The RSA key a certificate certifies.
pub fn certificate_public_key(certificate_der: &[u8]) -> Result<RsaPublicKey, CryptoError> {
    public_key_from_der(&certificate_public_key_der(certificate_der)?)
}

/// The SubjectPublicKeyInfo DER a certificate certifies.
pub fn certificate_public_key_der(certificate_der: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let certificate = Certificate::from_der(certificate_der)?;
    Ok(certificate.tbs_certificate.subject_public_key_info.to_der()?)
}

/// The subject of a certificate rendered as an RFC 4514 string.
pub fn certificate_subject(certificate_der: &[u8]) -> Result<String, CryptoError> {
    let certificate = Certificate::from_der(certificate_der)?;
    Ok(certificate.tbs_certificate.subject.to_string())
}
