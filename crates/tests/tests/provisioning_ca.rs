//! A hosted program's sealed key, certified both through TPM-backed
//! provisioning and through the Tao CA, by one policy authority.
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
use lazy_static::lazy_static;
use log::info;
use quote_protocol::{
    certify_endorsement_key, tpm::PcrSelection, PcrPolicy, PcrPolicyEntry, PlatformRoot, ProtocolError, ProvisioningClient,
    ProvisioningServer, SigningInstructions, SoftwareTpm,
};
use std::{net::TcpListener, path::Path, thread, time::Duration};
use tao::{storage::ProgramKeyStore, HostKeys, PrincipalName, Tao, TrustContext};
use tao_ca_server::{TaoCaClient, TaoCaServer};
use tao_utils::{
    x509::{certificate_public_key_der, X509Details},
    HashAlg,
};
use tests::{spawn_hosted, stacked_host, timeout};

const TIMEOUT: Duration = Duration::from_secs(600);
const BITS: usize = 1024;
const PCRS: [usize; 2] = [0, 7];
const POLICY: &str = "CloudProxyPolicy";

lazy_static! {
    static ref ROOT_KEYS: HostKeys = HostKeys::generate_with_bits(BITS).unwrap();
}

fn root_name() -> Result<PrincipalName> {
    let key = ROOT_KEYS
        .signing_key()
        .ok_or_else(|| anyhow::anyhow!("root host has no signing key"))?;
    Ok(PrincipalName::from_key(&key.public_key_der()?))
}

/// A measured software TPM, its endorsement certificate from `context`, and
/// a PCR policy admitting its current state.
fn measured_platform(context: &TrustContext) -> Result<(SoftwareTpm, Vec<u8>, PcrPolicy)> {
    let mut tpm = SoftwareTpm::new(BITS);
    tpm.provision_hierarchy()?;
    tpm.extend_pcr(0, b"firmware")?;
    tpm.extend_pcr(7, b"boot policy")?;

    let selection = PcrSelection::new(HashAlg::Sha256, &PCRS)?;
    let digest = tpm.selection_digest(&selection)?;
    let policy = PcrPolicy::new(vec![PcrPolicyEntry::new(&selection, &digest)?]);

    let ek = tpm.create_primary()?;
    let ek_public = tpm.read_public(ek)?;
    let endorsement_cert = certify_endorsement_key(
        context,
        &ek_public.public_key_der,
        &X509Details::new("endorsement"),
        1,
        Duration::from_secs(3600),
    )?;
    Ok((tpm, endorsement_cert, policy))
}

fn policy_context(dir: &Path) -> Result<TrustContext> {
    Ok(TrustContext::load(
        &dir.join("policy_key"),
        &dir.join("policy_cert"),
        X509Details::new(POLICY),
    )?)
}

#[test]
fn sealed_program_key_certified_by_tpm_and_ca() -> Result<()> {
    timeout(TIMEOUT, || -> Result<()> {
        let _ = env_logger::builder().is_test(true).try_init();
        let policy_dir = tempfile::tempdir()?;
        TrustContext::generate(X509Details::new(POLICY), BITS)?
            .save(&policy_dir.path().join("policy_key"), &policy_dir.path().join("policy_cert"))?;
        let provisioning_context = policy_context(policy_dir.path())?;

        let host = stacked_host(&ROOT_KEYS, "Host(linux)")?;
        let (mut tao, _) = spawn_hosted(&host, "Program(web)")?;
        let program_name = tao.get_tao_name()?;
        let storage = tempfile::tempdir()?;
        let mut store = ProgramKeyStore::init(&mut tao, storage.path(), "web", BITS)?;
        let key_der = store.key().public_key_der()?;

        info!("Provisioning a TPM certificate for {}.", program_name);
        let (mut tpm, endorsement_cert, pcr_policy) = measured_platform(&provisioning_context)?;
        let tpm_certificate = {
            let mut client = ProvisioningClient::new(&mut tpm)?;
            let request = client.request_for_key(&endorsement_cert, "web", store.key(), HashAlg::Sha256, &PCRS)?;
            let mut server =
                ProvisioningServer::new(&provisioning_context, SigningInstructions::new(POLICY), pcr_policy, 10);
            let response = server.sign_program_key(&request)?;
            client.activate(&response, &key_der)?
        };
        provisioning_context.verify_certificate(&tpm_certificate)?;
        assert_eq!(certificate_public_key_der(&tpm_certificate)?, key_der);
        store.set_certificate(tpm_certificate.clone())?;

        info!("Certifying the same key through the Tao CA.");
        let ca_context = policy_context(policy_dir.path())?.with_trusted_roots(vec![root_name()?]);
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let mut ca = TaoCaServer::new(listener, ca_context, None, 100, Duration::from_secs(3600));
        let address = ca.local_addr()?;
        let served = thread::spawn(move || ca.listen());

        let mut client = TaoCaClient::connect(address)?;
        let response = client.attest(tao.attest(&key_der)?, Some(X509Details::new("web")))?;
        provisioning_context.verify_certificate(&response.x509_chain[0])?;
        assert_eq!(certificate_public_key_der(&response.x509_chain[0])?, key_der);
        assert_eq!(response.x509_chain[1], provisioning_context.policy_certificate());
        client.shutdown()?;
        served
            .join()
            .map_err(|_| anyhow::anyhow!("CA server thread panicked"))??;

        // The program restarts and finds the TPM-issued certificate with its
        // sealed key.
        let reloaded = ProgramKeyStore::init(&mut tao, storage.path(), "web", BITS)?;
        assert_eq!(reloaded.certificate(), &tpm_certificate[..]);
        assert_eq!(reloaded.key().public_key_der()?, key_der);
        Ok(())
    })
}

#[test]
fn program_key_from_unmeasured_platform_is_refused() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();
    let context = TrustContext::generate(X509Details::new(POLICY), BITS)?;
    let (mut tpm, endorsement_cert, pcr_policy) = measured_platform(&context)?;
    tpm.extend_pcr(7, b"unexpected boot policy")?;

    let host = stacked_host(&ROOT_KEYS, "Host(linux)")?;
    let (mut tao, _) = spawn_hosted(&host, "Program(web)")?;
    let storage = tempfile::tempdir()?;
    let store = ProgramKeyStore::init(&mut tao, storage.path(), "web", BITS)?;

    let mut client = ProvisioningClient::new(&mut tpm)?;
    let request = client.request_for_key(&endorsement_cert, "web", store.key(), HashAlg::Sha256, &PCRS)?;
    let mut server = ProvisioningServer::new(&context, SigningInstructions::new(POLICY), pcr_policy, 1);
    assert!(matches!(server.sign_program_key(&request), Err(ProtocolError::QuoteError(_))));
    Ok(())
}
