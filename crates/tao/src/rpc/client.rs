//! The hosted program's end of the channel
//!
//! `TaoRpc` implements `Tao` by forwarding every call to the host.  It has
//! one call in flight at a time:
//!
//! ```text
//! Idle -> RequestSent -> AwaitingResponse -> Idle
//! ```
//!
//! Any transport failure, undecodable response, or response that does not
//! echo the request's `op` and `seq` moves the channel to `Closed` for good.
//! An error *reported* by the host leaves the channel usable.
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
use crate::{attestation::Attestation, error::TaoError, principal::PrincipalName, tao::Tao};
use io_utils::{
    channel::{channel_spec, DEFAULT_READ_FD, DEFAULT_WRITE_FD},
    FdMessageChannel, MessageChannel,
};
use log::{debug, error};
use std::{env, fs::File};

/// Environment variable naming the channel to the host.
pub const TAO_HOST_CHANNEL_VAR: &str = "TAO_HOST_CHANNEL";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelState {
    Idle,
    RequestSent,
    AwaitingResponse,
    Closed,
}

pub struct TaoRpc<C> {
    channel: C,
    state: ChannelState,
    seq: u64,
}

impl TaoRpc<FdMessageChannel<File, File>> {
    /// Opens the channel named by `TAO_HOST_CHANNEL`, or the default
    /// descriptors when it is unset.
    ///
    /// # Safety
    ///
    /// The named descriptors must be open and owned by nothing else in this
    /// process.
    pub unsafe fn from_env() -> Result<Self, TaoError> {
        let spec = env::var(TAO_HOST_CHANNEL_VAR).unwrap_or_else(|_| channel_spec(DEFAULT_READ_FD, DEFAULT_WRITE_FD));
        debug!("Connecting to host over {}.", spec);
        Ok(TaoRpc::new(FdMessageChannel::from_spec(&spec)?))
    }
}

impl<C: MessageChannel> TaoRpc<C> {
    pub fn new(channel: C) -> Self {
        TaoRpc {
            channel,
            state: ChannelState::Idle,
            seq: 0,
        }
    }

    #[inline]
    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// Sends `request`, stamping it with the next sequence number.  Returns
    /// the stamped request for `receive_response` to match against.
    pub fn send_request(&mut self, mut request: RpcRequest) -> Result<RpcRequest, TaoError> {
        if self.state != ChannelState::Idle {
            return Err(TaoError::ChannelError(format!(
                "cannot send a request while the channel is {:?}",
                self.state
            )));
        }
        self.seq = self.seq.wrapping_add(1);
        request.seq = self.seq;
        let bytes = bincode::serialize(&request)?;

        self.state = ChannelState::RequestSent;
        if let Err(e) = self.channel.send_message(&bytes) {
            return Err(self.close(format!("failed to send {}: {}", request.op, e)));
        }
        self.state = ChannelState::AwaitingResponse;
        Ok(request)
    }

    /// Blocks for the response to `request`.
    pub fn receive_response(&mut self, request: &RpcRequest) -> Result<RpcResponse, TaoError> {
        if self.state != ChannelState::AwaitingResponse {
            return Err(TaoError::ChannelError(format!(
                "no response is awaited while the channel is {:?}",
                self.state
            )));
        }
        let bytes = match self.channel.receive_message() {
            Ok(bytes) => bytes,
            Err(e) => return Err(self.close(format!("failed to receive {}: {}", request.op, e))),
        };
        let response: RpcResponse = match bincode::deserialize(&bytes) {
            Ok(response) => response,
            Err(e) => return Err(self.close(format!("malformed response to {}: {}", request.op, e))),
        };
        if response.op != request.op || response.seq != request.seq {
            return Err(self.close(format!(
                "response {} #{} does not match request {} #{}",
                response.op, response.seq, request.op, request.seq
            )));
        }
        self.state = ChannelState::Idle;
        match response.error {
            Some(failure) => Err(TaoError::from(failure)),
            None => Ok(response),
        }
    }

    fn call(&mut self, request: RpcRequest) -> Result<RpcResponse, TaoError> {
        let request = self.send_request(request)?;
        self.receive_response(&request)
    }

    fn close(&mut self, reason: String) -> TaoError {
        error!("Closing Tao channel: {}", reason);
        self.state = ChannelState::Closed;
        TaoError::ChannelError(reason)
    }
}

fn required<T>(field: Option<T>, op: RpcOp, name: &str) -> Result<T, TaoError> {
    field.ok_or_else(|| TaoError::ChannelError(format!("response to {} lacks {}", op, name)))
}

/// A host answers name requests with UTF-8; anything else means the channel
/// is not carrying what the client asked for.
fn principal_from_response(data: Vec<u8>, op: RpcOp) -> Result<PrincipalName, TaoError> {
    let name = String::from_utf8(data)
        .map_err(|e| TaoError::ChannelError(format!("response to {} is not a UTF-8 name: {}", op, e)))?;
    PrincipalName::parse(&name)
}

impl<C: MessageChannel> Tao for TaoRpc<C> {
    fn get_tao_name(&mut self) -> Result<PrincipalName, TaoError> {
        let op = RpcOp::GetTaoName;
        let response = self.call(RpcRequest::new(op, 0))?;
        principal_from_response(required(response.data, op, "data")?, op)
    }

    fn extend_tao_name(&mut self, subprin: &str) -> Result<PrincipalName, TaoError> {
        let op = RpcOp::ExtendTaoName;
        let response = self.call(RpcRequest::new(op, 0).with_data(subprin.as_bytes()))?;
        principal_from_response(required(response.data, op, "data")?, op)
    }

    fn get_random_bytes(&mut self, size: usize) -> Result<Vec<u8>, TaoError> {
        let op = RpcOp::GetRandomBytes;
        let response = self.call(RpcRequest::new(op, 0).with_size(size))?;
        let data = required(response.data, op, "data")?;
        if data.len() != size {
            return Err(TaoError::EntropyError(format!("host returned {} of {} bytes", data.len(), size)));
        }
        Ok(data)
    }

    fn get_shared_secret(&mut self, size: usize, policy: &str) -> Result<Vec<u8>, TaoError> {
        let op = RpcOp::GetSharedSecret;
        let response = self.call(RpcRequest::new(op, 0).with_size(size).with_policy(policy))?;
        required(response.data, op, "data")
    }

    fn attest(&mut self, message: &[u8]) -> Result<Attestation, TaoError> {
        let op = RpcOp::Attest;
        let response = self.call(RpcRequest::new(op, 0).with_data(message))?;
        Attestation::from_bytes(&required(response.data, op, "data")?)
    }

    fn seal(&mut self, data: &[u8], policy: &str) -> Result<Vec<u8>, TaoError> {
        let op = RpcOp::Seal;
        let response = self.call(RpcRequest::new(op, 0).with_data(data).with_policy(policy))?;
        required(response.data, op, "data")
    }

    fn unseal(&mut self, sealed: &[u8]) -> Result<(Vec<u8>, String), TaoError> {
        let op = RpcOp::Unseal;
        let response = self.call(RpcRequest::new(op, 0).with_data(sealed))?;
        Ok((required(response.data, op, "data")?, required(response.policy, op, "policy")?))
    }

    fn init_counter(&mut self, label: &str, counter: i64) -> Result<(), TaoError> {
        self.call(RpcRequest::new(RpcOp::InitCounter, 0).with_label(label).with_counter(counter))?;
        Ok(())
    }

    fn get_counter(&mut self, label: &str) -> Result<i64, TaoError> {
        let op = RpcOp::GetCounter;
        let response = self.call(RpcRequest::new(op, 0).with_label(label))?;
        required(response.counter, op, "counter")
    }

    fn rollback_protected_seal(&mut self, label: &str, data: &[u8], policy: &str) -> Result<Vec<u8>, TaoError> {
        let op = RpcOp::RollbackProtectedSeal;
        let request = RpcRequest::new(op, 0)
            .with_label(label)
            .with_data(data)
            .with_policy(policy);
        required(self.call(request)?.data, op, "data")
    }

    fn rollback_protected_unseal(&mut self, sealed: &[u8]) -> Result<(Vec<u8>, String), TaoError> {
        let op = RpcOp::RollbackProtectedUnseal;
        let response = self.call(RpcRequest::new(op, 0).with_data(sealed))?;
        Ok((required(response.data, op, "data")?, required(response.policy, op, "policy")?))
    }
}
