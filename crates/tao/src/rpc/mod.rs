//! The Tao over a message channel
//!
//! A hosted program reaches its host through a `TaoRpc` client; the host
//! answers through one `TaoServer` per hosted program.  Each call is one
//! bincode-encoded `RpcRequest` frame answered by one `RpcResponse` frame.
//!
//! ## Authors
//!
//! The CloudProxy Development Team.
//!
//! ## Licensing and copyright notice
//!
//! See the `LICENSE.md` file in the CloudProxy root directory for
//! information on licensing and copyright.

pub mod client;
pub mod message;
pub mod server;

pub use client::{ChannelState, TaoRpc, TAO_HOST_CHANNEL_VAR};
pub use message::{RpcOp, RpcRequest, RpcResponse};
pub use server::{SharedHost, TaoServer};
