//! The platform's half of provisioning
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
    credential::{unwrap_certificate, CredentialBlob},
    error::ProtocolError,
    messages::{ProgramKeyParameters, ProgramKeyRequest, ProgramKeyResponse, QuoteKeyCredential},
    platform_root::{KeyHandle, PlatformRoot, PublicArea, QUOTE_KEY_SLOT, ROOT_KEY_SLOT, SEAL_KEY_SLOT},
    tpm::PcrSelection,
};
use log::{debug, info};
use tao_utils::{keys::SigningKey, x509::certificate_public_key_der, HashAlg};

/// Drives a platform root through the client side of the protocol.
pub struct ProvisioningClient<'a, P: PlatformRoot> {
    root: &'a mut P,
    endorsement: KeyHandle,
    endorsement_public: PublicArea,
    quote_key: KeyHandle,
    quote_public: PublicArea,
}

impl<'a, P: PlatformRoot> ProvisioningClient<'a, P> {
    /// Loads the endorsement key, creating it if absent, and the CloudProxy
    /// key hierarchy from NV storage.
    pub fn new(root: &'a mut P) -> Result<Self, ProtocolError> {
        let endorsement = root.create_primary()?;
        let endorsement_public = root.read_public(endorsement)?;
        root.load_context(ROOT_KEY_SLOT)?;
        root.load_context(SEAL_KEY_SLOT)?;
        let quote_key = root.load_context(QUOTE_KEY_SLOT)?;
        let quote_public = root.read_public(quote_key)?;
        debug!("Quoting key name {}.", hex::encode(&quote_public.name));
        Ok(ProvisioningClient {
            root,
            endorsement,
            endorsement_public,
            quote_key,
            quote_public,
        })
    }

    #[inline]
    pub fn endorsement_public(&self) -> &PublicArea {
        &self.endorsement_public
    }

    #[inline]
    pub fn quote_public(&self) -> &PublicArea {
        &self.quote_public
    }

    /// Generates a `bits`-bit program key and a request to certify it.
    pub fn create_request(
        &mut self,
        endorsement_cert: &[u8],
        program_name: &str,
        bits: usize,
        alg: HashAlg,
        pcrs: &[usize],
    ) -> Result<(SigningKey, ProgramKeyRequest), ProtocolError> {
        let program_key = SigningKey::generate(bits)?;
        let request = self.request_for_key(endorsement_cert, program_name, &program_key, alg, pcrs)?;
        Ok((program_key, request))
    }

    /// A request to certify an existing `program_key`, backed by a quote over
    /// the registers `pcrs` in the `alg` bank.
    pub fn request_for_key(
        &mut self,
        endorsement_cert: &[u8],
        program_name: &str,
        program_key: &SigningKey,
        alg: HashAlg,
        pcrs: &[usize],
    ) -> Result<ProgramKeyRequest, ProtocolError> {
        let program_key = ProgramKeyParameters::new(program_name, program_key)?;
        let request_hash = program_key.request_hash(alg)?;
        let selection = PcrSelection::new(alg, pcrs)?;
        let quote = self.root.quote(self.quote_key, &request_hash, &selection)?;
        info!("Quoted certificate request for {:?}.", program_name);
        Ok(ProgramKeyRequest {
            endorsement_cert: endorsement_cert.to_vec(),
            program_key,
            credential: QuoteKeyCredential {
                hash_alg: alg,
                public_key_der: self.quote_public.public_key_der.clone(),
                name: self.quote_public.name.clone(),
            },
            quote: quote.attest,
            quote_signature: quote.signature,
        })
    }

    /// Recovers the certificate from `response`, checking that it certifies
    /// the key with SubjectPublicKeyInfo DER `program_public_key_der`.
    pub fn activate(&mut self, response: &ProgramKeyResponse, program_public_key_der: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        let blob = CredentialBlob {
            secret: response.secret.clone(),
            enc_identity: response.enc_identity.clone(),
            integrity_hmac: response.integrity_hmac.clone(),
        };
        let credential = self
            .root
            .activate_credential(self.quote_key, self.endorsement, response.hash_alg, &blob)?;
        let certificate = unwrap_certificate(
            response.hash_alg,
            &credential,
            &response.encrypted_cert,
            &response.encrypted_cert_hmac,
        )?;
        if certificate_public_key_der(&certificate)? != program_public_key_der {
            return Err(ProtocolError::ActivationError(
                "certificate is for a different key".to_string(),
            ));
        }
        info!("Activated program key certificate.");
        Ok(certificate)
    }
}
