//! The Tao certificate authority
//!
//! Hosted programs that can prove, by an attestation chain rooted at a trusted
//! key, that they hold a key may ask the CA to restate that attestation under
//! the policy root and to issue an X.509 certificate for the key.  The chain
//! returned is the leaf followed by the policy certificate.
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
pub mod config;
pub mod error;
pub mod messages;
pub mod server;

pub use client::TaoCaClient;
pub use config::CaServerConfig;
pub use error::CaServerError;
pub use messages::{CaRequest, CaResponse, CaResponseType};
pub use server::TaoCaServer;
