//! The Tao interface
//!
//! `Tao` is what a host offers the programs it runs.  Every implementation
//! answers for exactly one caller (the hosted program holding it), so the
//! caller's identity is implicit in every call.  Implementations may serve a
//! call themselves or delegate it to their own host.
//!
//! ## Authors
//!
//! The CloudProxy Development Team.
//!
//! ## Licensing and copyright notice
//!
//! See the `LICENSE.md` file in the CloudProxy root directory for
//! information on licensing and copyright.

use crate::{attestation::Attestation, error::TaoError, principal::PrincipalName};

pub trait Tao {
    /// The caller's full principal name.  Deterministic for a given boot and
    /// measurement.
    fn get_tao_name(&mut self) -> Result<PrincipalName, TaoError>;

    /// Irreversibly appends `subprin` to the caller's name and returns the
    /// extended name.
    fn extend_tao_name(&mut self, subprin: &str) -> Result<PrincipalName, TaoError>;

    /// Exactly `size` bytes from the host's entropy source.
    fn get_random_bytes(&mut self, size: usize) -> Result<Vec<u8>, TaoError>;

    /// A secret of `size` bytes shared by every caller in the identity class
    /// `policy` names.
    fn get_shared_secret(&mut self, size: usize, policy: &str) -> Result<Vec<u8>, TaoError>;

    /// Signs `message` on behalf of the caller, valid for one year.
    fn attest(&mut self, message: &[u8]) -> Result<Attestation, TaoError>;

    /// Encrypts `data` so that only callers satisfying `policy` can recover
    /// it.
    fn seal(&mut self, data: &[u8], policy: &str) -> Result<Vec<u8>, TaoError>;

    /// Recovers sealed data and the policy it was sealed under.
    ///
    /// Fails if the caller does not satisfy the recorded policy.  The
    /// returned policy is reported, not checked: callers that expect a
    /// particular policy must compare it themselves.
    fn unseal(&mut self, sealed: &[u8]) -> Result<(Vec<u8>, String), TaoError>;

    /// Sets the caller's monotonic counter for `label`.  The counter can
    /// never be moved backwards.
    fn init_counter(&mut self, label: &str, counter: i64) -> Result<(), TaoError>;

    fn get_counter(&mut self, label: &str) -> Result<i64, TaoError>;

    /// Seals `data` bound to a fresh value of the counter for `label`.
    /// Envelopes sealed earlier under the same label become stale.
    fn rollback_protected_seal(&mut self, label: &str, data: &[u8], policy: &str) -> Result<Vec<u8>, TaoError>;

    /// As `unseal`, failing with `RollbackError` if the envelope's counter is
    /// behind the current counter for its label.
    fn rollback_protected_unseal(&mut self, sealed: &[u8]) -> Result<(Vec<u8>, String), TaoError>;
}
