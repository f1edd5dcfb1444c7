//! The trust context of a policy authority
//!
//! A `TrustContext` holds the policy root's key, its self-signed certificate
//! and the set of root principals whose attestations the authority accepts.
//! It is built once at startup and handed to whatever needs it.
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
    attestation::{Attestation, Statement},
    error::TaoError,
    principal::PrincipalName,
    storage::write_private_file,
};
use log::info;
use std::{fs, path::Path, time::Duration};
use tao_utils::{
    keys::SigningKey,
    x509::{
        certificate_public_key, certificate_public_key_der, issue_certificate, verify_certificate, CertificateKind,
        CertificateRequest, X509Details,
    },
};

/// Validity of a freshly generated policy certificate: ten years.
pub const POLICY_CERTIFICATE_VALIDITY: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

#[derive(Debug)]
pub struct TrustContext {
    policy_key: SigningKey,
    policy_certificate: Vec<u8>,
    policy_details: X509Details,
    policy_name: PrincipalName,
    trusted_roots: Vec<PrincipalName>,
}

impl TrustContext {
    /// Pairs a policy key with its certificate.  The certificate must be
    /// self-signed by that key.
    pub fn new(policy_key: SigningKey, policy_certificate: Vec<u8>, policy_details: X509Details) -> Result<Self, TaoError> {
        let key_der = policy_key.public_key_der()?;
        if certificate_public_key_der(&policy_certificate)? != key_der {
            return Err(TaoError::VerificationError(
                "policy certificate does not certify the policy key".to_string(),
            ));
        }
        verify_certificate(&policy_certificate, &policy_key.public_key())?;
        Ok(TrustContext {
            policy_key,
            policy_certificate,
            policy_details,
            policy_name: PrincipalName::from_key(&key_der),
            trusted_roots: Vec::new(),
        })
    }

    /// A fresh policy key and self-signed certificate.
    pub fn generate(policy_details: X509Details, bits: usize) -> Result<Self, TaoError> {
        let policy_key = SigningKey::generate(bits)?;
        let policy_certificate = issue_certificate(
            &policy_key,
            &CertificateRequest {
                kind: CertificateKind::Root,
                serial: 1,
                validity: POLICY_CERTIFICATE_VALIDITY,
                issuer: &policy_details,
                subject: &policy_details,
                subject_public_key_der: &[],
            },
        )?;
        Self::new(policy_key, policy_certificate, policy_details)
    }

    /// Reads a PKCS#8 DER policy key and a DER policy certificate.
    pub fn load(key_path: &Path, certificate_path: &Path, policy_details: X509Details) -> Result<Self, TaoError> {
        let key_der = zeroize::Zeroizing::new(fs::read(key_path)?);
        let policy_key = SigningKey::from_pkcs8_der(&key_der)?;
        let policy_certificate = fs::read(certificate_path)?;
        let context = Self::new(policy_key, policy_certificate, policy_details)?;
        info!("Loaded policy root {}.", context.policy_name);
        Ok(context)
    }

    pub fn save(&self, key_path: &Path, certificate_path: &Path) -> Result<(), TaoError> {
        write_private_file(key_path, &self.policy_key.to_pkcs8_der()?)?;
        fs::write(certificate_path, &self.policy_certificate)?;
        Ok(())
    }

    /// Additionally accept attestations rooted at `roots`.
    pub fn with_trusted_roots(mut self, roots: Vec<PrincipalName>) -> Self {
        self.trusted_roots = roots;
        self
    }

    #[inline]
    pub fn policy_key(&self) -> &SigningKey {
        &self.policy_key
    }

    #[inline]
    pub fn policy_certificate(&self) -> &[u8] {
        &self.policy_certificate
    }

    #[inline]
    pub fn policy_details(&self) -> &X509Details {
        &self.policy_details
    }

    #[inline]
    pub fn policy_name(&self) -> &PrincipalName {
        &self.policy_name
    }

    #[inline]
    pub fn trusted_roots(&self) -> &[PrincipalName] {
        &self.trusted_roots
    }

    /// Verifies `attestation` at `now` against the trusted roots and the
    /// policy root itself.
    pub fn verify_attestation(&self, attestation: &Attestation, now: i64) -> Result<Statement, TaoError> {
        let (statement, root) = attestation.verify_chain(now)?;
        if root != self.policy_name && !self.trusted_roots.contains(&root) {
            return Err(TaoError::VerificationError(format!("{} is not a trusted root", root)));
        }
        Ok(statement)
    }

    /// Re-signs `statement` under the policy key: same data and validity
    /// window, issued by the policy root.
    pub fn witness(&self, statement: &Statement) -> Result<Attestation, TaoError> {
        let witnessed = Statement {
            issuer: self.policy_name.to_string(),
            time: statement.time,
            expiration: statement.expiration,
            data: statement.data.clone(),
        };
        Attestation::sign(&self.policy_key, &witnessed, None)
    }

    /// Issues a certificate signed by the policy key.
    pub fn issue(
        &self,
        kind: CertificateKind,
        serial: u64,
        validity: Duration,
        subject: &X509Details,
        subject_public_key_der: &[u8],
    ) -> Result<Vec<u8>, TaoError> {
        Ok(issue_certificate(
            &self.policy_key,
            &CertificateRequest {
                kind,
                serial,
                validity,
                issuer: &self.policy_details,
                subject,
                subject_public_key_der,
            },
        )?)
    }

    /// Checks that `certificate_der` was signed by the policy key.
    pub fn verify_certificate(&self, certificate_der: &[u8]) -> Result<(), TaoError> {
        let policy_public_key = certificate_public_key(&self.policy_certificate)?;
        Ok(verify_certificate(certificate_der, &policy_public_key)?)
    }
}
