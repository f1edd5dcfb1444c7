//! The Tao
//!
//! The trust interface a host exposes to the programs it runs.  A hosted
//! program learns its name, draws randomness, seals data to its identity and
//! obtains attestations through a `Tao`; hosts stack, each one a hosted
//! program of the layer beneath, so every attestation chains back to a key
//! at the bottom of the stack.
//!
//! ## Authors
//!
//! The CloudProxy Development Team.
//!
//! ## Licensing and copyright notice
//!
//! See the `LICENSE.md` file in the CloudProxy root directory for
//! information on licensing and copyright.

pub mod attestation;
pub mod context;
pub mod error;
pub mod host;
pub mod policy;
pub mod principal;
pub mod rpc;
pub mod storage;
#[allow(clippy::module_inception)]
pub mod tao;

pub use crate::{
    attestation::{Attestation, Statement},
    context::TrustContext,
    error::{RpcFailure, TaoError, TaoErrorKind},
    host::{HostKeys, SoftTao, TaoHost},
    policy::{SEAL_POLICY_ANY, SEAL_POLICY_DEFAULT, SEAL_POLICY_FEW, SEAL_POLICY_SELF},
    principal::PrincipalName,
    rpc::{TaoRpc, TaoServer},
    tao::Tao,
};
