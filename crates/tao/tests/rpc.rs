//! A hosted program talking to its host over a socket pair.
//!
//! ## Authors
//!
//! The CloudProxy Development Team.
//!
//! ## Licensing and copyright notice
//!
//! See the `LICENSE.md` file in the CloudProxy root directory for
//! information on licensing and copyright.

use io_utils::{FdMessageChannel, MessageChannel};
use lazy_static::lazy_static;
use std::{
    os::unix::net::UnixStream,
    sync::{Arc, Mutex},
    thread,
};
use tao::{
    rpc::{ChannelState, RpcOp, RpcRequest},
    HostKeys, Tao, TaoError, TaoHost, TaoRpc, TaoServer, SEAL_POLICY_FEW, SEAL_POLICY_SELF,
};
use tao_utils::unix_now;

lazy_static! {
    static ref KEYS: HostKeys = HostKeys::generate_with_bits(1024).unwrap();
}

type Client = TaoRpc<FdMessageChannel<UnixStream, UnixStream>>;

fn spawn_child(host: &Arc<Mutex<TaoHost>>, program: &str) -> (Client, thread::JoinHandle<Result<(), TaoError>>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let (ours, theirs) = UnixStream::pair().unwrap();
    let child = host.lock().unwrap().child_name(program).unwrap();
    let mut server = TaoServer::new(
        host.clone(),
        child,
        FdMessageChannel::from_unix_stream(theirs).unwrap(),
    );
    let handle = thread::spawn(move || server.serve());
    (TaoRpc::new(FdMessageChannel::from_unix_stream(ours).unwrap()), handle)
}

fn shared_host() -> Arc<Mutex<TaoHost>> {
    Arc::new(Mutex::new(TaoHost::root(KEYS.clone()).unwrap()))
}

#[test]
fn hosted_program_uses_every_operation() {
    let host = shared_host();
    let host_name = host.lock().unwrap().name().clone();
    let (mut tao, handle) = spawn_child(&host, "Program(app)");

    let name = tao.get_tao_name().unwrap();
    assert!(host_name.is_prefix_of(&name));
    let extended = tao.extend_tao_name("Args(1)").unwrap();
    assert_eq!(tao.get_tao_name().unwrap(), extended);

    assert_eq!(tao.get_random_bytes(16).unwrap().len(), 16);
    assert!(matches!(tao.get_random_bytes(0), Err(TaoError::InvalidArgument(_))));
    assert_eq!(
        tao.get_shared_secret(32, SEAL_POLICY_SELF).unwrap(),
        tao.get_shared_secret(32, SEAL_POLICY_SELF).unwrap()
    );

    let sealed = tao.seal(b"secret", SEAL_POLICY_SELF).unwrap();
    assert_eq!(tao.unseal(&sealed).unwrap(), (b"secret".to_vec(), SEAL_POLICY_SELF.to_string()));

    let mut tampered = sealed.clone();
    let middle = tampered.len() / 2;
    tampered[middle] ^= 1;
    assert!(matches!(tao.unseal(&tampered), Err(TaoError::IntegrityError)));

    let attestation = tao.attest(b"hello").unwrap();
    let statement = attestation.verify(unix_now(), &[host_name]).unwrap();
    assert_eq!(statement.issuer().unwrap(), extended);

    tao.init_counter("state", 1).unwrap();
    let protected = tao.rollback_protected_seal("state", b"v", SEAL_POLICY_SELF).unwrap();
    assert_eq!(tao.get_counter("state").unwrap(), 2);
    assert_eq!(tao.rollback_protected_unseal(&protected).unwrap().0, b"v");
    tao.rollback_protected_seal("state", b"w", SEAL_POLICY_SELF).unwrap();
    assert!(matches!(tao.rollback_protected_unseal(&protected), Err(TaoError::RollbackError(_))));

    assert_eq!(tao.state(), ChannelState::Idle);
    drop(tao);
    assert!(handle.join().unwrap().is_ok());
}

#[test]
fn siblings_are_kept_apart() {
    let host = shared_host();
    let (mut alice, _) = spawn_child(&host, "Program(alice)");
    let (mut bob, _) = spawn_child(&host, "Program(bob)");

    let pinned = alice.seal(b"alice's", SEAL_POLICY_FEW).unwrap();
    let sealed = alice.seal(b"alice's", SEAL_POLICY_SELF).unwrap();
    assert!(matches!(bob.unseal(&sealed), Err(TaoError::PolicyError(_))));
    assert!(matches!(bob.unseal(&pinned), Err(TaoError::PolicyError(_))));
    alice.extend_tao_name("Args(later)").unwrap();
    assert_eq!(alice.unseal(&sealed).unwrap().0, b"alice's");
    assert!(matches!(alice.unseal(&pinned), Err(TaoError::PolicyError(_))));
}

#[test]
fn host_hanging_up_is_a_channel_error() {
    let (ours, theirs) = UnixStream::pair().unwrap();
    let mut tao = TaoRpc::new(FdMessageChannel::from_unix_stream(ours).unwrap());

    let request = tao.send_request(RpcRequest::new(RpcOp::GetTaoName, 0)).unwrap();
    let mut host_side = FdMessageChannel::from_unix_stream(theirs).unwrap();
    assert!(!host_side.receive_message().unwrap().is_empty());
    drop(host_side);

    assert!(matches!(tao.receive_response(&request), Err(TaoError::ChannelError(_))));
    assert_eq!(tao.state(), ChannelState::Closed);
}
