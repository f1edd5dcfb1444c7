//! The CA server event loop
//!
//! A single thread owns the listening socket, every client connection and the
//! read end of a shutdown pipe, and multiplexes them with `poll`.  Each ready
//! client gets one request read, dispatched and answered; a client whose
//! exchange fails is disconnected without disturbing the others.
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
    config::CaServerConfig,
    error::CaServerError,
    messages::{CaRequest, CaResponse},
};
use cloud_auth::{CloudAuth, Op};
use io_utils::socket::{receive_message, send_message};
use log::{debug, error, info, warn};
use nix::{
    errno::Errno,
    poll::{poll, PollFd, PollFlags},
};
use signal_hook::consts::SIGTERM;
use std::{
    io::{self, Read},
    net::{SocketAddr, TcpListener, TcpStream},
    os::unix::{io::AsRawFd, net::UnixStream},
    time::Duration,
};
use tao::{Attestation, Statement, TrustContext};
use tao_utils::{
    keys::public_key_from_der,
    unix_now,
    x509::{CertificateKind, X509Details},
};

/// The ACL object a statement issuer must be allowed to `EXECUTE`.
pub const CA_ACL_OBJECT: &str = "tao-ca";

pub const ATTESTATION_FAILED: &str = "Attestation failed";
pub const CHAIN_GENERATION_FAILED: &str = "Certificate chain generation failed";

pub struct TaoCaServer {
    listener: TcpListener,
    context: TrustContext,
    acl: Option<CloudAuth>,
    next_serial: u64,
    leaf_validity: Duration,
    clients: Vec<TcpStream>,
    shutting_down: bool,
}

impl TaoCaServer {
    pub fn new(
        listener: TcpListener,
        context: TrustContext,
        acl: Option<CloudAuth>,
        first_serial: u64,
        leaf_validity: Duration,
    ) -> Self {
        TaoCaServer {
            listener,
            context,
            acl,
            next_serial: first_serial,
            leaf_validity,
            clients: Vec::new(),
            shutting_down: false,
        }
    }

    /// Loads the policy root and ACL named by `config` and binds the listen
    /// address.
    pub fn from_config(config: &CaServerConfig) -> Result<Self, CaServerError> {
        let context = TrustContext::load(
            &config.policy_key_path,
            &config.policy_cert_path,
            config.policy_details.clone(),
        )?
        .with_trusted_roots(config.parsed_trusted_roots()?);
        let acl = match &config.acl_path {
            Some(path) => {
                let acl = CloudAuth::from_file(path)?;
                info!("Loaded {} ACL entries from {:?}.", acl.len(), path);
                Some(acl)
            }
            None => None,
        };
        let listener = TcpListener::bind(&config.listen_address)?;
        Ok(Self::new(
            listener,
            context,
            acl,
            config.first_serial,
            config.leaf_validity(),
        ))
    }

    pub fn local_addr(&self) -> Result<SocketAddr, CaServerError> {
        Ok(self.listener.local_addr()?)
    }

    #[inline]
    pub fn context(&self) -> &TrustContext {
        &self.context
    }

    /// Serves until a `Shutdown` request arrives or the process receives
    /// SIGTERM.
    pub fn listen(&mut self) -> Result<(), CaServerError> {
        let (stop_reader, stop_writer) = UnixStream::pair()?;
        let signal_id = signal_hook::low_level::pipe::register(SIGTERM, stop_writer)?;
        let result = self.serve(&stop_reader);
        signal_hook::low_level::unregister(signal_id);
        result
    }

    /// Serves until a `Shutdown` request arrives or `stop` becomes readable.
    pub fn serve(&mut self, stop: &UnixStream) -> Result<(), CaServerError> {
        info!("CA server listening on {}.", self.local_addr()?);
        let readable = PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR;
        let is_ready =
            |fd: &PollFd| fd.revents().map_or(false, |events| events.intersects(readable));

        while !self.shutting_down {
            let mut fds = vec![
                PollFd::new(stop.as_raw_fd(), PollFlags::POLLIN),
                PollFd::new(self.listener.as_raw_fd(), PollFlags::POLLIN),
            ];
            fds.extend(
                self.clients
                    .iter()
                    .map(|client| PollFd::new(client.as_raw_fd(), PollFlags::POLLIN)),
            );

            match poll(&mut fds, -1) {
                Ok(_) => (),
                Err(Errno::EINTR) => continue,
                Err(err) => return Err(err.into()),
            }

            if is_ready(&fds[0]) {
                let mut byte = [0u8; 1];
                match (&*stop).read(&mut byte) {
                    Ok(0) => info!("Shutdown pipe closed; stopping the CA server."),
                    Ok(_) => info!("Shutdown signalled; stopping the CA server."),
                    Err(ref err) if err.kind() == io::ErrorKind::Interrupted => continue,
                    Err(err) => warn!("Shutdown pipe failed ({}); stopping the CA server.", err),
                }
                self.shutting_down = true;
                break;
            }

            let ready: Vec<usize> = fds[2..]
                .iter()
                .enumerate()
                .filter(|(_, fd)| is_ready(fd))
                .map(|(index, _)| index)
                .collect();
            let mut failed = Vec::new();
            for index in ready {
                if let Err(err) = self.serve_client(index) {
                    warn!("Closing CA client connection: {}", err);
                    failed.push(index);
                }
            }
            // Dropping a stream closes it.  Remove from the back so earlier
            // indices stay valid.
            for index in failed.into_iter().rev() {
                self.clients.remove(index);
            }

            if is_ready(&fds[1]) {
                match self.listener.accept() {
                    Ok((stream, peer)) => {
                        debug!("Accepted CA client {}.", peer);
                        self.clients.push(stream);
                    }
                    Err(err) if err.kind() == io::ErrorKind::Interrupted => (),
                    Err(err) => error!("Failed to accept a CA client: {}", err),
                }
            }
        }

        info!("CA server stopped with {} open connections.", self.clients.len());
        self.clients.clear();
        Ok(())
    }

    /// One request/response exchange with client `index`.  A failure
    /// response is still sent, then reported as an error so the caller
    /// drops the connection.
    fn serve_client(&mut self, index: usize) -> Result<(), CaServerError> {
        let request: CaRequest = receive_message(&mut self.clients[index])?;
        let response = self.handle_request(&request);
        send_message(&mut self.clients[index], &response)?;
        if response.is_success() {
            Ok(())
        } else {
            Err(CaServerError::RequestFailed(response.reason.unwrap_or_default()))
        }
    }

    pub fn handle_request(&mut self, request: &CaRequest) -> CaResponse {
        match request {
            CaRequest::Shutdown => {
                info!("Received a shutdown request.");
                self.shutting_down = true;
                CaResponse::success()
            }
            CaRequest::Attestation {
                attestation,
                x509_details,
            } => {
                let (statement, witnessed) = match self.witness(attestation) {
                    Ok(result) => result,
                    Err(err) => {
                        warn!("Refusing to witness an attestation: {}", err);
                        return CaResponse::failure(ATTESTATION_FAILED);
                    }
                };
                let mut response = CaResponse::success();
                response.attestation = Some(witnessed);
                if let Some(details) = x509_details {
                    match self.certificate_chain(&statement, details) {
                        Ok(chain) => response.x509_chain = chain,
                        Err(err) => {
                            warn!("Failed to certify {}: {}", statement.issuer, err);
                            return CaResponse::failure(CHAIN_GENERATION_FAILED);
                        }
                    }
                }
                response
            }
        }
    }

    fn witness(&self, attestation: &Attestation) -> Result<(Statement, Attestation), CaServerError> {
        let statement = self.context.verify_attestation(attestation, unix_now())?;
        if let Some(acl) = &self.acl {
            if !acl.permitted(&statement.issuer, Op::Execute, CA_ACL_OBJECT) {
                return Err(CaServerError::Unauthorized(statement.issuer));
            }
        }
        let witnessed = self.context.witness(&statement)?;
        info!("Witnessed a statement by {}.", statement.issuer);
        Ok((statement, witnessed))
    }

    /// The attested data is the SubjectPublicKeyInfo DER of the key to
    /// certify.
    fn certificate_chain(&mut self, statement: &Statement, details: &X509Details) -> Result<Vec<Vec<u8>>, CaServerError> {
        public_key_from_der(&statement.data)?;
        let serial = self.next_serial;
        let leaf = self.context.issue(
            CertificateKind::Leaf {
                key_encipherment: false,
            },
            serial,
            self.leaf_validity,
            details,
            &statement.data,
        )?;
        self.next_serial += 1;
        info!("Issued certificate {} to {}.", serial, details.common_name);
        Ok(vec![leaf, self.context.policy_certificate().to_vec()])
    }
}
