//! A hosted program on a stacked host obtains a CA-issued certificate for
//! its program key.
//!
//! ## Authors
//!
//! The CloudProxy Development Team.
//!
//! ## Licensing and copyright notice
//!
//! See the `LICENSE.md` file in the CloudProxy root directory for
//! information on licensing and copyright.

use cloud_auth::{CloudAuth, Op};
use lazy_static::lazy_static;
use std::{net::TcpListener, thread, time::Duration};
use tao::{storage::ProgramKeyStore, HostKeys, PrincipalName, Tao, TrustContext};
use tao_ca_server::{server::CA_ACL_OBJECT, CaServerError, TaoCaClient, TaoCaServer};
use tao_utils::{
    unix_now,
    x509::{certificate_public_key_der, X509Details},
};
use tests::{spawn_hosted, stacked_host, timeout};

const TIMEOUT: Duration = Duration::from_secs(600);

lazy_static! {
    static ref ROOT_KEYS: HostKeys = HostKeys::generate_with_bits(1024).unwrap();
}

fn root_name() -> PrincipalName {
    PrincipalName::from_key(&ROOT_KEYS.signing_key().unwrap().public_key_der().unwrap())
}

fn start_ca(acl: Option<CloudAuth>) -> (std::net::SocketAddr, thread::JoinHandle<Result<(), CaServerError>>, Vec<u8>) {
    let context = TrustContext::generate(X509Details::new("CloudProxy policy"), 1024)
        .unwrap()
        .with_trusted_roots(vec![root_name()]);
    let policy_certificate = context.policy_certificate().to_vec();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let mut server = TaoCaServer::new(listener, context, acl, 2, Duration::from_secs(3600));
    let address = server.local_addr().unwrap();
    (address, thread::spawn(move || server.listen()), policy_certificate)
}

#[test]
fn program_key_certified_through_stacked_host() {
    timeout(TIMEOUT, || {
        let _ = env_logger::builder().is_test(true).try_init();
        let (address, ca, policy_certificate) = start_ca(None);
        let host = stacked_host(&ROOT_KEYS, "Host(linux)").unwrap();
        let (mut tao, served) = spawn_hosted(&host, "Program(web)").unwrap();
        let storage = tempfile::tempdir().unwrap();

        let mut store = ProgramKeyStore::init(&mut tao, storage.path(), "web", 1024).unwrap();
        let key_der = store.key().public_key_der().unwrap();
        let attestation = tao.attest(&key_der).unwrap();

        // The chain runs program -> stacked host -> root host key.
        let (statement, root) = attestation.verify_chain(unix_now()).unwrap();
        assert_eq!(root, root_name());
        assert_eq!(statement.issuer().unwrap(), tao.get_tao_name().unwrap());

        let mut client = TaoCaClient::connect(address).unwrap();
        let response = client
            .attest(attestation, Some(X509Details::new("web")))
            .unwrap();
        assert_eq!(response.x509_chain[1], policy_certificate);
        assert_eq!(certificate_public_key_der(&response.x509_chain[0]).unwrap(), key_der);
        store.set_certificate(response.x509_chain[0].clone()).unwrap();

        // A restarted program finds the sealed key and the issued certificate.
        let reloaded = ProgramKeyStore::init(&mut tao, storage.path(), "web", 1024).unwrap();
        assert_eq!(reloaded.certificate(), &response.x509_chain[0][..]);
        assert_eq!(reloaded.key().public_key_der().unwrap(), key_der);

        client.shutdown().unwrap();
        ca.join().unwrap().unwrap();
        drop(tao);
        served.join().unwrap().unwrap();
    });
}

#[test]
fn acl_admits_only_listed_programs() {
    timeout(TIMEOUT, || {
        let host = stacked_host(&ROOT_KEYS, "Host(linux)").unwrap();
        let (mut admitted, _) = spawn_hosted(&host, "Program(admitted)").unwrap();
        let (mut other, _) = spawn_hosted(&host, "Program(other)").unwrap();

        let mut acl = CloudAuth::new();
        acl.insert(&admitted.get_tao_name().unwrap().to_string(), Op::Execute, CA_ACL_OBJECT)
            .unwrap();
        let (address, ca, _) = start_ca(Some(acl));
        let mut client = TaoCaClient::connect(address).unwrap();

        assert!(client.attest(admitted.attest(b"admitted").unwrap(), None).is_ok());

        let mut refused = TaoCaClient::connect(address).unwrap();
        assert!(refused.attest(other.attest(b"other").unwrap(), None).is_err());

        client.shutdown().unwrap();
        ca.join().unwrap().unwrap();
    });
}
