//! Program-key provisioning
//!
//! A hosted program obtains a certificate for a fresh signing key by proving
//! to the policy authority that the key was generated on a platform with an
//! endorsed TPM in an allow-listed state:
//!
//! 1. the client quotes the hash of its certificate request with a TPM
//!    quoting key and sends the quote, the quoting key and its endorsement
//!    certificate (`ProvisioningClient::create_request`);
//! 2. the server checks the endorsement, the quote and its signature, issues
//!    the certificate and wraps it so that only the TPM holding both the
//!    endorsement key and the quoting key can unwrap it
//!    (`ProvisioningServer::sign_program_key`);
//! 3. the client activates the credential and unwraps the certificate
//!    (`ProvisioningClient::activate`).
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
pub mod credential;
pub mod error;
pub mod instructions;
pub mod messages;
pub mod pcr;
pub mod platform_root;
pub mod server;
pub mod tpm;

pub use crate::{
    client::ProvisioningClient,
    error::ProtocolError,
    instructions::SigningInstructions,
    messages::{ProgramKeyParameters, ProgramKeyRequest, ProgramKeyResponse},
    pcr::{PcrPolicy, PcrPolicyEntry},
    platform_root::{PlatformRoot, SoftwareTpm},
    server::{certify_endorsement_key, ProvisioningServer},
};
