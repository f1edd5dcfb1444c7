//! A blocking client for the CA server
//!
//! ## Authors
//!
//! The CloudProxy Development Team.
//!
//! ## Licensing and copyright notice
//!
//! See the `LICENSE.md` file in the CloudProxy root directory for
//! information on licensing and copyright.

use crate::{
    error::CaServerError,
    messages::{CaRequest, CaResponse},
};
use io_utils::socket::{receive_message, send_message};
use std::net::{TcpStream, ToSocketAddrs};
use tao::Attestation;
use tao_utils::x509::X509Details;

pub struct TaoCaClient {
    stream: TcpStream,
}

impl TaoCaClient {
    pub fn connect<A: ToSocketAddrs>(address: A) -> Result<Self, CaServerError> {
        Ok(TaoCaClient {
            stream: TcpStream::connect(address)?,
        })
    }

    pub fn request(&mut self, request: &CaRequest) -> Result<CaResponse, CaServerError> {
        send_message(&mut self.stream, request)?;
        Ok(receive_message(&mut self.stream)?)
    }

    /// Asks the CA to witness `attestation` and, with `x509_details`, to
    /// certify the attested key.  A failure response becomes an error.
    pub fn attest(
        &mut self,
        attestation: Attestation,
        x509_details: Option<X509Details>,
    ) -> Result<CaResponse, CaServerError> {
        let response = self.request(&CaRequest::Attestation {
            attestation,
            x509_details,
        })?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(CaServerError::RequestFailed(response.reason.unwrap_or_default()))
        }
    }

    pub fn shutdown(&mut self) -> Result<(), CaServerError> {
        let response = self.request(&CaRequest::Shutdown)?;
        if response.is_success() {
            Ok(())
        } else {
            Err(CaServerError::RequestFailed(response.reason.unwrap_or_default()))
        }
    }
}
