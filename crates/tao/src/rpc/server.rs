//! The host's end of the channel
//!
//! One `TaoServer` serves one hosted program.  Several servers may share a
//! host; the host is locked for the duration of each call.
//!
//! ## Authors
//!
//! The CloudProxy Development Team.
//!
//! ## Licensing and copyright notice
//!
//! See the `LICENSE.md` file in the CloudProxy root directory for
//! information on licensing and copyright.

use super::message::{RpcOp, RpcRequest, RpcResponse};
use crate::{error::TaoError, host::TaoHost, principal::PrincipalName};
use io_utils::{MessageChannel, SocketError};
use log::{debug, info, warn};
use std::{
    convert::TryFrom,
    sync::{Arc, Mutex},
};

/// A host shared between the servers of its hosted programs.
pub type SharedHost = Arc<Mutex<TaoHost>>;

pub struct TaoServer<C> {
    host: SharedHost,
    child: PrincipalName,
    channel: C,
}

impl<C: MessageChannel> TaoServer<C> {
    /// Serves the hosted program `child` over `channel`.
    pub fn new(host: SharedHost, child: PrincipalName, channel: C) -> Self {
        TaoServer { host, child, channel }
    }

    /// The hosted program's current name.
    #[inline]
    pub fn child(&self) -> &PrincipalName {
        &self.child
    }

    /// Answers requests until the hosted program closes the channel.  A frame
    /// that cannot be decoded ends the session with a `ChannelError`.
    pub fn serve(&mut self) -> Result<(), TaoError> {
        loop {
            let bytes = match self.channel.receive_message() {
                Ok(bytes) => bytes,
                Err(SocketError::ChannelClosed) => {
                    info!("Hosted program {} closed its channel.", self.child);
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            };
            let request: RpcRequest = bincode::deserialize(&bytes)
                .map_err(|e| TaoError::ChannelError(format!("malformed request from {}: {}", self.child, e)))?;
            let response = self.handle(&request);
            self.channel.send_message(&bincode::serialize(&response)?)?;
        }
    }

    /// Answers one request.  Failures are reported in the response.
    pub fn handle(&mut self, request: &RpcRequest) -> RpcResponse {
        debug!("{} #{} from {}.", request.op, request.seq, self.child);
        match self.dispatch(request) {
            Ok(response) => response,
            Err(e) => {
                warn!("{} #{} from {} failed: {}", request.op, request.seq, self.child, e);
                RpcResponse::failed(request, &e)
            }
        }
    }

    fn dispatch(&mut self, request: &RpcRequest) -> Result<RpcResponse, TaoError> {
        let op: RpcOp = request.op.parse()?;
        let mut response = RpcResponse::to(request);
        let mut host = self.host.lock()?;

        match op {
            RpcOp::GetTaoName => {
                response.data = Some(self.child.to_string().into_bytes());
            }
            RpcOp::ExtendTaoName => {
                let subprin = String::from_utf8(data(request)?.to_vec())
                    .map_err(|_| TaoError::NameError("subprincipal is not UTF-8".to_string()))?;
                self.child = host.extend_name(&self.child, &subprin)?;
                response.data = Some(self.child.to_string().into_bytes());
            }
            RpcOp::GetRandomBytes => {
                response.data = Some(host.random_bytes(size(request)?)?);
            }
            RpcOp::GetSharedSecret => {
                response.data = Some(host.shared_secret(&self.child, size(request)?, policy(request)?)?);
            }
            RpcOp::Attest => {
                response.data = Some(host.attest(&self.child, data(request)?)?.to_bytes()?);
            }
            RpcOp::Seal => {
                response.data = Some(host.seal(&self.child, data(request)?, policy(request)?)?);
            }
            RpcOp::Unseal => {
                let (data, policy) = host.unseal(&self.child, data(request)?)?;
                response.data = Some(data);
                response.policy = Some(policy);
            }
            RpcOp::InitCounter => {
                let counter = request
                    .counter
                    .ok_or_else(|| missing("counter"))?;
                host.init_counter(&self.child, label(request)?, counter)?;
            }
            RpcOp::GetCounter => {
                response.counter = Some(host.get_counter(&self.child, label(request)?)?);
            }
            RpcOp::RollbackProtectedSeal => {
                response.data = Some(host.rollback_protected_seal(
                    &self.child,
                    label(request)?,
                    data(request)?,
                    policy(request)?,
                )?);
            }
            RpcOp::RollbackProtectedUnseal => {
                let (data, policy) = host.rollback_protected_unseal(&self.child, data(request)?)?;
                response.data = Some(data);
                response.policy = Some(policy);
            }
        }
        Ok(response)
    }
}

fn missing(field: &str) -> TaoError {
    TaoError::InvalidArgument(format!("request lacks {}", field))
}

fn data(request: &RpcRequest) -> Result<&[u8], TaoError> {
    request.data.as_deref().ok_or_else(|| missing("data"))
}

fn policy(request: &RpcRequest) -> Result<&str, TaoError> {
    request.policy.as_deref().ok_or_else(|| missing("policy"))
}

fn label(request: &RpcRequest) -> Result<&str, TaoError> {
    request.label.as_deref().ok_or_else(|| missing("label"))
}

fn size(request: &RpcRequest) -> Result<usize, TaoError> {
    let size = request.size.ok_or_else(|| missing("size"))?;
    usize::try_from(size).map_err(|_| TaoError::InvalidArgument(format!("size {} is out of range", size)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostKeys;
    use lazy_static::lazy_static;

    lazy_static! {
        static ref KEYS: HostKeys = HostKeys::generate_with_bits(1024).unwrap();
    }

    struct NoChannel;

    impl MessageChannel for NoChannel {
        fn send_message(&mut self, _: &[u8]) -> Result<(), SocketError> {
            Err(SocketError::ChannelClosed)
        }

        fn receive_message(&mut self) -> Result<Vec<u8>, SocketError> {
            Err(SocketError::ChannelClosed)
        }
    }

    fn server() -> TaoServer<NoChannel> {
        let host = TaoHost::root(KEYS.clone()).unwrap();
        let child = host.child_name("Program(child)").unwrap();
        TaoServer::new(Arc::new(Mutex::new(host)), child, NoChannel)
    }

    fn kind_of(response: &RpcResponse) -> Option<crate::error::TaoErrorKind> {
        response.error.as_ref().map(|failure| failure.kind)
    }

    #[test]
    fn zero_sized_random_request_is_rejected() {
        let mut server = server();
        let response = server.handle(&RpcRequest::new(RpcOp::GetRandomBytes, 1).with_size(0));
        assert_eq!(kind_of(&response), Some(crate::error::TaoErrorKind::InvalidArgument));
        let response = server.handle(&RpcRequest::new(RpcOp::GetRandomBytes, 2).with_size(8));
        assert_eq!(response.data.unwrap().len(), 8);
    }

    #[test]
    fn extension_applies_to_the_child_only() {
        let mut server = server();
        let before = server.child().clone();
        let response = server.handle(&RpcRequest::new(RpcOp::ExtendTaoName, 1).with_data(b"Args(x)"));
        assert!(response.error.is_none());
        assert!(before.is_prefix_of(server.child()));
        assert_eq!(server.child().depth(), before.depth() + 1);
        assert_eq!(server.host.lock().unwrap().name().depth(), 1);
    }

    #[test]
    fn unknown_operation_is_reported() {
        let mut server = server();
        let mut request = RpcRequest::new(RpcOp::GetTaoName, 3);
        request.op = "Tao.Reboot".to_string();
        let response = server.handle(&request);
        assert_eq!(response.op, "Tao.Reboot");
        assert_eq!(kind_of(&response), Some(crate::error::TaoErrorKind::InvalidArgument));
    }

    #[test]
    fn missing_fields_are_reported() {
        let mut server = server();
        let response = server.handle(&RpcRequest::new(RpcOp::Seal, 1).with_data(b"x"));
        assert_eq!(kind_of(&response), Some(crate::error::TaoErrorKind::InvalidArgument));
    }

    #[test]
    fn closed_channel_ends_the_session() {
        assert!(server().serve().is_ok());
    }
}
