//! CA server tests over TCP
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
use io_utils::fd::send_buffer;
use lazy_static::lazy_static;
use std::{
    fs,
    io::Write,
    net::{SocketAddr, TcpListener, TcpStream},
    os::unix::net::UnixStream,
    thread::{self, JoinHandle},
    time::Duration,
};
use tao::{HostKeys, SoftTao, Tao, TrustContext};
use tao_ca_server::{
    server::{ATTESTATION_FAILED, CA_ACL_OBJECT},
    CaServerConfig, CaServerError, TaoCaClient, TaoCaServer,
};
use tao_utils::{
    keys::SigningKey,
    unix_now,
    x509::{certificate_public_key_der, certificate_subject, X509Details},
};

lazy_static! {
    static ref HOST_KEYS: HostKeys = HostKeys::generate_with_bits(1024).unwrap();
    static ref PROGRAM_KEY: SigningKey = SigningKey::generate(1024).unwrap();
}

fn hosted_tao() -> SoftTao {
    let mut tao = SoftTao::new(HOST_KEYS.clone()).unwrap();
    tao.extend_tao_name("Program(\"ca-test\")").unwrap();
    tao
}

fn context() -> TrustContext {
    let root = SoftTao::new(HOST_KEYS.clone()).unwrap().host().name().root();
    TrustContext::generate(X509Details::new("CloudProxy test policy"), 1024)
        .unwrap()
        .with_trusted_roots(vec![root])
}

fn spawn(mut server: TaoCaServer) -> (SocketAddr, JoinHandle<Result<(), CaServerError>>) {
    let address = server.local_addr().unwrap();
    let handle = thread::spawn(move || server.listen());
    (address, handle)
}

#[test]
fn attest_and_certify_over_tcp() {
    let _ = env_logger::try_init();
    let context = context();
    let policy_certificate = context.policy_certificate().to_vec();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let (address, handle) = spawn(TaoCaServer::new(listener, context, None, 7, Duration::from_secs(3600)));

    let mut tao = hosted_tao();
    let key_der = PROGRAM_KEY.public_key_der().unwrap();
    let mut client = TaoCaClient::connect(address).unwrap();
    let response = client
        .attest(tao.attest(&key_der).unwrap(), Some(X509Details::new("ca-test")))
        .unwrap();

    let chain = &response.x509_chain;
    assert_eq!(chain.len(), 2);
    assert_eq!(certificate_public_key_der(&chain[0]).unwrap(), key_der);
    assert!(certificate_subject(&chain[0]).unwrap().contains("ca-test"));
    assert_eq!(chain[1], policy_certificate);

    let witnessed = response.attestation.unwrap();
    let (statement, _) = witnessed.verify_chain(unix_now()).unwrap();
    assert_eq!(statement.data, key_der);

    client.shutdown().unwrap();
    handle.join().unwrap().unwrap();
}

#[test]
fn failed_client_does_not_disturb_others() {
    let _ = env_logger::try_init();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let (address, handle) = spawn(TaoCaServer::new(listener, context(), None, 2, Duration::from_secs(3600)));

    let mut patient = TaoCaClient::connect(address).unwrap();

    // A garbage frame and a refused attestation each cost only their own
    // connection.
    let mut garbage = TcpStream::connect(address).unwrap();
    send_buffer(&mut garbage, b"\xff\xff\xff").unwrap();

    let mut stranger = SoftTao::new(HostKeys::generate_with_bits(1024).unwrap()).unwrap();
    let mut refused = TaoCaClient::connect(address).unwrap();
    match refused.attest(stranger.attest(b"hello").unwrap(), None) {
        Err(CaServerError::RequestFailed(reason)) => assert_eq!(reason, ATTESTATION_FAILED),
        other => panic!("unexpected result {:?}", other.map(|r| r.kind)),
    }

    let mut tao = hosted_tao();
    assert!(patient.attest(tao.attest(b"still here").unwrap(), None).is_ok());

    patient.shutdown().unwrap();
    handle.join().unwrap().unwrap();
}

#[test]
fn stop_pipe_ends_the_loop() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let mut server = TaoCaServer::new(listener, context(), None, 2, Duration::from_secs(3600));
    let (reader, mut writer) = UnixStream::pair().unwrap();
    let handle = thread::spawn(move || server.serve(&reader));
    writer.write_all(&[1]).unwrap();
    handle.join().unwrap().unwrap();
}

#[test]
fn closed_stop_pipe_ends_the_loop() {
    let _ = env_logger::try_init();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let mut server = TaoCaServer::new(listener, context(), None, 2, Duration::from_secs(3600));
    let (reader, writer) = UnixStream::pair().unwrap();
    let handle = thread::spawn(move || server.serve(&reader));
    drop(writer);
    handle.join().unwrap().unwrap();
}

#[test]
fn server_from_config_files() {
    let _ = env_logger::try_init();
    let dir = tempfile::tempdir().unwrap();
    let details = X509Details::new("CloudProxy test policy");
    let policy = TrustContext::generate(details.clone(), 1024).unwrap();
    let key_path = dir.path().join("signer");
    let cert_path = dir.path().join("cert");
    policy.save(&key_path, &cert_path).unwrap();

    let tao = hosted_tao();
    let mut acl = CloudAuth::new();
    acl.insert(&tao.host().name().to_string(), Op::Execute, CA_ACL_OBJECT)
        .unwrap();
    let acl_path = dir.path().join("acls");
    acl.save(&acl_path).unwrap();

    let root = tao.host().name().root();
    let config = CaServerConfig {
        listen_address: "127.0.0.1:0".to_string(),
        policy_key_path: key_path,
        policy_cert_path: cert_path,
        policy_details: details,
        trusted_roots: vec![root.to_string()],
        acl_path: Some(acl_path),
        first_serial: 2,
        leaf_duration: 3600,
    };
    let config_path = dir.path().join("ca.json");
    fs::write(&config_path, serde_json::to_vec(&config).unwrap()).unwrap();

    let server = TaoCaServer::from_config(&CaServerConfig::from_file(&config_path).unwrap()).unwrap();
    let (address, handle) = spawn(server);

    // The host itself is on the ACL; its hosted program is not.
    let mut host_tao = SoftTao::new(HOST_KEYS.clone()).unwrap();
    let mut client = TaoCaClient::connect(address).unwrap();
    assert!(client.attest(host_tao.attest(b"host").unwrap(), None).is_ok());

    let mut program_tao = hosted_tao();
    let mut refused = TaoCaClient::connect(address).unwrap();
    assert!(refused.attest(program_tao.attest(b"program").unwrap(), None).is_err());

    client.shutdown().unwrap();
    handle.join().unwrap().unwrap();
}
