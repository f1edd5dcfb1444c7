//! RPC messages
//!
//! ## Authors
//!
//! The CloudProxy Development Team.
//!
//! ## Licensing and copyright notice
//!
//! See the `LICENSE.md` file in the CloudProxy root directory for
//! information on licensing and copyright.

use crate::error::{RpcFailure, TaoError};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// The operations a hosted program may invoke.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RpcOp {
    GetTaoName,
    ExtendTaoName,
    GetRandomBytes,
    GetSharedSecret,
    Attest,
    Seal,
    Unseal,
    InitCounter,
    GetCounter,
    RollbackProtectedSeal,
    RollbackProtectedUnseal,
}

impl RpcOp {
    pub const ALL: [RpcOp; 11] = [
        RpcOp::GetTaoName,
        RpcOp::ExtendTaoName,
        RpcOp::GetRandomBytes,
        RpcOp::GetSharedSecret,
        RpcOp::Attest,
        RpcOp::Seal,
        RpcOp::Unseal,
        RpcOp::InitCounter,
        RpcOp::GetCounter,
        RpcOp::RollbackProtectedSeal,
        RpcOp::RollbackProtectedUnseal,
    ];

    /// The name carried on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            RpcOp::GetTaoName => "Tao.GetTaoName",
            RpcOp::ExtendTaoName => "Tao.ExtendTaoName",
            RpcOp::GetRandomBytes => "Tao.GetRandomBytes",
            RpcOp::GetSharedSecret => "Tao.GetSharedSecret",
            RpcOp::Attest => "Tao.Attest",
            RpcOp::Seal => "Tao.Seal",
            RpcOp::Unseal => "Tao.Unseal",
            RpcOp::InitCounter => "Tao.InitCounter",
            RpcOp::GetCounter => "Tao.GetCounter",
            RpcOp::RollbackProtectedSeal => "Tao.RollbackProtectedSeal",
            RpcOp::RollbackProtectedUnseal => "Tao.RollbackProtectedUnseal",
        }
    }
}

impl fmt::Display for RpcOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RpcOp {
    type Err = TaoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RpcOp::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| TaoError::InvalidArgument(format!("unknown operation {:?}", s)))
    }
}

/// One call.  Only the fields the operation uses are set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub op: String,
    pub seq: u64,
    pub data: Option<Vec<u8>>,
    pub size: Option<u64>,
    pub policy: Option<String>,
    pub label: Option<String>,
    pub counter: Option<i64>,
}

impl RpcRequest {
    pub fn new(op: RpcOp, seq: u64) -> Self {
        RpcRequest {
            op: op.as_str().to_string(),
            seq,
            ..Default::default()
        }
    }

    pub fn with_data(mut self, data: &[u8]) -> Self {
        self.data = Some(data.to_vec());
        self
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = Some(size as u64);
        self
    }

    pub fn with_policy(mut self, policy: &str) -> Self {
        self.policy = Some(policy.to_string());
        self
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn with_counter(mut self, counter: i64) -> Self {
        self.counter = Some(counter);
        self
    }
}

/// The answer to one call, echoing its `op` and `seq`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub op: String,
    pub seq: u64,
    pub error: Option<RpcFailure>,
    pub data: Option<Vec<u8>>,
    pub policy: Option<String>,
    pub counter: Option<i64>,
}

impl RpcResponse {
    pub fn to(request: &RpcRequest) -> Self {
        RpcResponse {
            op: request.op.clone(),
            seq: request.seq,
            ..Default::default()
        }
    }

    pub fn failed(request: &RpcRequest, error: &TaoError) -> Self {
        RpcResponse {
            error: Some(error.to_failure()),
            ..Self::to(request)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn op_names_parse_back() {
        for op in RpcOp::ALL.iter() {
            assert_eq!(op.as_str().parse::<RpcOp>().unwrap(), *op);
            assert!(op.as_str().starts_with("Tao."));
        }
        assert!("Tao.Reboot".parse::<RpcOp>().is_err());
    }

    #[test]
    fn failure_echoes_the_request() {
        let request = RpcRequest::new(RpcOp::Seal, 41).with_data(b"x").with_policy("self");
        let response = RpcResponse::failed(&request, &TaoError::PolicyError("no".into()));
        assert_eq!(response.op, "Tao.Seal");
        assert_eq!(response.seq, 41);
        assert!(response.data.is_none());
        assert!(matches!(TaoError::from(response.error.unwrap()), TaoError::PolicyError(_)));
    }
}
