//! CloudProxy test material
//!
//! Helpers shared by the integration tests under `tests/`: hosts with hosted
//! programs attached over socket pairs, and a timeout wrapper so that a
//! wedged channel fails a test instead of hanging it.
//!
//! ## Authors
//!
//! The CloudProxy Development Team.
//!
//! ## Licensing and copyright notice
//!
//! See the `LICENSE.md` file in the CloudProxy root directory for
//! information on licensing and copyright.

use either::{Left, Right};
use io_utils::FdMessageChannel;
use std::{
    env::{self, VarError},
    os::unix::net::UnixStream,
    sync::{mpsc::channel, Arc, Mutex},
    thread::{self, JoinHandle},
    time::Duration,
};
use tao::{rpc::SharedHost, HostKeys, SoftTao, Tao, TaoError, TaoHost, TaoRpc, TaoServer};

pub type HostedTao = TaoRpc<FdMessageChannel<UnixStream, UnixStream>>;

/// Runs `f` on a fresh thread, panicking if it takes longer than `timeout`.
///
/// Note this is overrideable with the CLOUDPROXY_TEST_TIMEOUT environment
/// variable, which provides a timeout in seconds
pub fn timeout<R: Send + 'static, F: (FnOnce() -> R) + Send + 'static>(timeout: Duration, f: F) -> R {
    let timeout = match env::var("CLOUDPROXY_TEST_TIMEOUT")
        .map_err(Left)
        .and_then(|timeout| timeout.parse::<u64>().map_err(Right))
    {
        Ok(val) => Duration::from_secs(val),
        Err(Left(VarError::NotPresent)) => timeout,
        Err(err) => panic!("Couldn't parse CLOUDPROXY_TEST_TIMEOUT: {:?}", err),
    };

    let (done_tx, done_rx) = channel();
    let thread = thread::spawn(move || {
        let r = f();
        done_tx.send(()).unwrap();
        r
    });

    match done_rx.recv_timeout(timeout) {
        Ok(_) => thread.join().expect("thread panicked"),
        Err(_) => panic!(
            "timeout after {:?}, specify CLOUDPROXY_TEST_TIMEOUT to override",
            timeout
        ),
    }
}

/// A host stacked on a program named `host_program` of the root host built
/// from `root_keys`.
pub fn stacked_host(root_keys: &HostKeys, host_program: &str) -> Result<SharedHost, TaoError> {
    let mut parent = SoftTao::new(root_keys.clone())?;
    parent.extend_tao_name(host_program)?;
    let host = TaoHost::stacked(&mut parent, HostKeys::generate_with_bits(1024)?)?;
    Ok(Arc::new(Mutex::new(host)))
}

/// Starts `program` under `host`, serving its channel on a new thread.
pub fn spawn_hosted(host: &SharedHost, program: &str) -> Result<(HostedTao, JoinHandle<Result<(), TaoError>>), TaoError> {
    let (ours, theirs) = UnixStream::pair()?;
    let child = host
        .lock()
        .map_err(|e| TaoError::LockError(e.to_string()))?
        .child_name(program)?;
    let mut server = TaoServer::new(host.clone(), child, FdMessageChannel::from_unix_stream(theirs)?);
    let handle = thread::spawn(move || server.serve());
    Ok((TaoRpc::new(FdMessageChannel::from_unix_stream(ours)?), handle))
}
