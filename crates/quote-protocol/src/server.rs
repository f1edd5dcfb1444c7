//! The policy authority's half of provisioning
//!
//! `ProvisioningServer::sign_program_key` runs every check on a request
//! before producing anything; a request that fails one gate gets no partial
//! response.
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
    credential::{make_credential, wrap_certificate, CREDENTIAL_SIZE},
    error::ProtocolError,
    instructions::SigningInstructions,
    messages::{ProgramKeyRequest, ProgramKeyResponse},
    pcr::PcrPolicy,
    platform_root::key_name,
    tpm::{quoted_value, QuoteInfo},
};
use log::{info, warn};
use rsa::{traits::PublicKeyParts, BigUint};
use std::{collections::BTreeSet, time::Duration};
use tao::TrustContext;
use tao_utils::{
    keys::public_key_from_der,
    random_bytes,
    x509::{certificate_public_key, issue_certificate, CertificateKind, CertificateRequest, X509Details},
    HashAlg,
};
use zeroize::Zeroizing;

/// Issues an endorsement certificate for the TPM endorsement key whose
/// SubjectPublicKeyInfo DER is `endorsement_key_der`.
pub fn certify_endorsement_key(
    context: &TrustContext,
    endorsement_key_der: &[u8],
    subject: &X509Details,
    serial: u64,
    validity: Duration,
) -> Result<Vec<u8>, ProtocolError> {
    Ok(context.issue(
        CertificateKind::Leaf { key_encipherment: true },
        serial,
        validity,
        subject,
        endorsement_key_der,
    )?)
}

pub struct ProvisioningServer<'a> {
    context: &'a TrustContext,
    instructions: SigningInstructions,
    pcr_policy: PcrPolicy,
    next_serial: u64,
    /// Quoted values of requests already answered.
    answered: BTreeSet<Vec<u8>>,
}

impl<'a> ProvisioningServer<'a> {
    pub fn new(context: &'a TrustContext, instructions: SigningInstructions, pcr_policy: PcrPolicy, first_serial: u64) -> Self {
        ProvisioningServer {
            context,
            instructions,
            pcr_policy,
            next_serial: first_serial,
            answered: BTreeSet::new(),
        }
    }

    #[inline]
    pub fn instructions(&self) -> &SigningInstructions {
        &self.instructions
    }

    pub fn sign_program_key(&mut self, request: &ProgramKeyRequest) -> Result<ProgramKeyResponse, ProtocolError> {
        let result = self.try_sign_program_key(request);
        if let Err(e) = &result {
            warn!("Refused program key {:?}: {}", request.program_key.program_name, e);
        }
        result
    }

    fn try_sign_program_key(&mut self, request: &ProgramKeyRequest) -> Result<ProgramKeyResponse, ProtocolError> {
        let alg = self.instructions.hash_alg;

        // 1. The endorsement key must be certified by the policy root.
        self.context
            .verify_certificate(&request.endorsement_cert)
            .map_err(|e| ProtocolError::EndorsementError(e.to_string()))?;
        let endorsement_key = certificate_public_key(&request.endorsement_cert)
            .map_err(|e| ProtocolError::EndorsementError(e.to_string()))?;

        // 2. The quote must be well formed and over allow-listed PCRs.
        if request.credential.hash_alg != alg {
            return Err(ProtocolError::QuoteError(format!(
                "quote uses {}, instructions require {}",
                request.credential.hash_alg, alg
            )));
        }
        let quote = QuoteInfo::unmarshal(&request.quote).map_err(|e| ProtocolError::QuoteError(e.to_string()))?;
        quote.check_header()?;
        let selection = match quote.pcr_select.as_slice() {
            [selection] if selection.hash == alg.tpm_alg_id() => selection,
            _ => return Err(ProtocolError::QuoteError("unexpected PCR selection".to_string())),
        };
        if !self.pcr_policy.permits(selection, &quote.pcr_digest) {
            return Err(ProtocolError::QuoteError(format!(
                "PCR digest {} is not allow-listed",
                hex::encode(&quote.pcr_digest)
            )));
        }

        // 3. The quote must vouch for exactly this request.
        if quote.extra_data != request.program_key.request_hash(alg)? {
            return Err(ProtocolError::HashMismatchError);
        }

        // 4. The quoting key must have signed it.
        let quoted = quoted_value(alg, &request.quote);
        check_quote_key(request, &quote)?;
        verify_raw_signature(&request.credential.public_key_der, &request.quote_signature, &quoted)?;
        if self.answered.contains(&quoted) {
            return Err(ProtocolError::QuoteError("request was already answered".to_string()));
        }

        // 5. Certify the program key.
        if !self.instructions.can_sign {
            return Err(ProtocolError::PolicyViolation("signing is disabled".to_string()));
        }
        let certificate = self.issue_program_certificate(request)?;

        // 6-8. Wrap the certificate for the holder of both keys.
        let credential = Zeroizing::new(random_bytes(CREDENTIAL_SIZE)?);
        let (encrypted_cert, encrypted_cert_hmac) = wrap_certificate(alg, &credential, &certificate)?;
        let blob = make_credential(alg, &endorsement_key, &request.credential.name, &credential)?;

        self.answered.insert(quoted);
        info!("Certified program key {:?}.", request.program_key.program_name);
        Ok(ProgramKeyResponse {
            hash_alg: alg,
            encrypted_cert,
            encrypted_cert_hmac,
            secret: blob.secret,
            enc_identity: blob.enc_identity,
            integrity_hmac: blob.integrity_hmac,
        })
    }

    fn issue_program_certificate(&mut self, request: &ProgramKeyRequest) -> Result<Vec<u8>, ProtocolError> {
        let issuer = if self.instructions.issuer.is_empty() {
            self.context.policy_details().clone()
        } else {
            X509Details::new(self.instructions.issuer.clone())
        };
        let subject = X509Details::new(request.program_key.program_name.clone());
        let kind = if self.instructions.is_ca {
            CertificateKind::Authority
        } else {
            CertificateKind::Leaf {
                key_encipherment: self.instructions.key_encipherment(),
            }
        };
        let serial = self.next_serial;
        let certificate = issue_certificate(
            self.context.policy_key(),
            &CertificateRequest {
                kind,
                serial,
                validity: self.instructions.validity(),
                issuer: &issuer,
                subject: &subject,
                subject_public_key_der: &request.program_key.public_key_der,
            },
        )
        .map_err(|e| ProtocolError::PolicyViolation(format!("cannot certify program key: {}", e)))?;
        self.next_serial = self.next_serial.wrapping_add(1);
        Ok(certificate)
    }
}

/// The presented name must be the name of the presented key, and the quote
/// must say it was signed by that key.
fn check_quote_key(request: &ProgramKeyRequest, quote: &QuoteInfo) -> Result<(), ProtocolError> {
    let name = &request.credential.name;
    let name_alg = match name.as_slice() {
        [hi, lo, ..] => HashAlg::from_tpm_alg_id(u16::from_be_bytes([*hi, *lo])),
        _ => None,
    }
    .ok_or_else(|| ProtocolError::SignatureError("malformed quoting key name".to_string()))?;
    if key_name(name_alg, &request.credential.public_key_der) != *name {
        return Err(ProtocolError::SignatureError("name does not match the quoting key".to_string()));
    }
    if quote.qualified_signer != *name {
        return Err(ProtocolError::SignatureError("quote was not produced by the quoting key".to_string()));
    }
    Ok(())
}

/// Raw RSA check: `signature^e mod n` must end in `quoted`.
fn verify_raw_signature(public_key_der: &[u8], signature: &[u8], quoted: &[u8]) -> Result<(), ProtocolError> {
    let key = public_key_from_der(public_key_der).map_err(|e| ProtocolError::SignatureError(e.to_string()))?;
    let s = BigUint::from_bytes_be(signature);
    if signature.len() != key.size() || &s >= key.n() {
        return Err(ProtocolError::SignatureError("signature out of range".to_string()));
    }
    let recovered = s.modpow(key.e(), key.n()).to_bytes_be();
    if recovered.len() < quoted.len() || recovered[recovered.len() - quoted.len()..] != *quoted {
        return Err(ProtocolError::SignatureError("signature does not cover the quote".to_string()));
    }
    Ok(())
}
