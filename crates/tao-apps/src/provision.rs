//! Each function is one step of the exchange between a policy authority and
//! a platform holding a TPM.  The platform side runs against a software TPM
//! whose state persists in a file between steps.
//!
//! ## Authors
//!
//! The CloudProxy Development Team.
//!
//! ## Licensing and copyright notice
//!
//! See the `LICENSE.md` file in the CloudProxy root directory for
//! information on licensing and copyright.

use anyhow::Result;
use log::info;
use quote_protocol::{
    certify_endorsement_key, tpm::PcrSelection, PcrPolicy, PcrPolicyEntry, PlatformRoot, ProgramKeyRequest,
    ProgramKeyResponse, ProvisioningClient, ProvisioningServer, SigningInstructions, SoftwareTpm,
};
use std::{path::Path, time::Duration};
use tao::{PrincipalName, TrustContext};
use tao_utils::{keys::SigningKey, x509::X509Details, HashAlg};

pub const DEFAULT_KEY_BITS: usize = 2048;
pub const DEFAULT_POLICY_COMMON_NAME: &str = "CloudProxy policy";

/// Creates a policy key and its self-signed certificate and writes both.
pub fn generate_policy_key(details: &X509Details, bits: usize, key_path: &Path, cert_path: &Path) -> Result<PrincipalName> {
    let context = TrustContext::generate(details.clone(), bits)?;
    context.save(key_path, cert_path)?;
    info!("Generated policy root {}.", context.policy_name());
    Ok(context.policy_name().clone())
}

/// Loads the software TPM state at `path`, or starts a fresh TPM if there is
/// none.  Either way the CloudProxy key hierarchy is present afterwards.
pub fn open_tpm(path: &Path, bits: usize) -> Result<SoftwareTpm> {
    let mut tpm = if path.exists() {
        SoftwareTpm::load(path, bits)?
    } else {
        info!("Creating software TPM state at {}.", path.display());
        SoftwareTpm::new(bits)
    };
    tpm.provision_hierarchy()?;
    Ok(tpm)
}

/// Certifies the endorsement key of `tpm` under the policy root.
pub fn sign_endorsement_key(
    context: &TrustContext,
    tpm: &mut SoftwareTpm,
    subject: &X509Details,
    serial: u64,
    validity: Duration,
) -> Result<Vec<u8>> {
    let endorsement = tpm.create_primary()?;
    let public = tpm.read_public(endorsement)?;
    let certificate = certify_endorsement_key(context, &public.public_key_der, subject, serial, validity)?;
    info!("Certified endorsement key as serial {}.", serial);
    Ok(certificate)
}

/// Adds the current state of the registers `pcrs` of `tpm` to `policy`.
pub fn record_pcr_state(tpm: &SoftwareTpm, alg: HashAlg, pcrs: &[usize], policy: &mut PcrPolicy) -> Result<()> {
    let selection = PcrSelection::new(alg, pcrs)?;
    let digest = tpm.selection_digest(&selection)?;
    policy.allow(PcrPolicyEntry::new(&selection, &digest)?);
    Ok(())
}

/// A fresh program key and the quoted request to certify it.
pub fn client_request(
    tpm: &mut SoftwareTpm,
    endorsement_cert: &[u8],
    program_name: &str,
    bits: usize,
    alg: HashAlg,
    pcrs: &[usize],
) -> Result<(SigningKey, ProgramKeyRequest)> {
    let mut client = ProvisioningClient::new(tpm)?;
    Ok(client.create_request(endorsement_cert, program_name, bits, alg, pcrs)?)
}

pub fn server_sign(
    context: &TrustContext,
    instructions: SigningInstructions,
    pcr_policy: PcrPolicy,
    serial: u64,
    request: &ProgramKeyRequest,
) -> Result<ProgramKeyResponse> {
    let mut server = ProvisioningServer::new(context, instructions, pcr_policy, serial);
    Ok(server.sign_program_key(request)?)
}

/// Recovers the program certificate from `response`.
pub fn client_activate(tpm: &mut SoftwareTpm, program_key: &SigningKey, response: &ProgramKeyResponse) -> Result<Vec<u8>> {
    let mut client = ProvisioningClient::new(tpm)?;
    Ok(client.activate(response, &program_key.public_key_der()?)?)
}
