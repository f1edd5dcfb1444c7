//! Attestations
//!
//! An attestation is a `Statement` (`issuer`, validity window, `data`) signed
//! by a key.  The signature covers the serialized statement prefixed with the
//! signing context `tao::Attestation Version 1`, so a Tao attestation can
//! never be confused with any other signature made by the same key.
//!
//! The signer speaks for the issuer in one of two ways:
//!
//! - the issuer's name is rooted at the signer's key principal, or
//! - the attestation carries a `delegation`: an attestation, itself valid,
//!   whose statement says the signer's key principal speaks for a name that is
//!   a prefix of the issuer.  This is how a stacked host, whose key was
//!   generated above its parent, links its statements back to the root.
//!
//! A chain therefore always terminates at a key principal, and a verifier
//! decides whether that root is one it recognizes.
//!
//! ## Authors
//!
//! The CloudProxy Development Team.
//!
//! ## Licensing and copyright notice
//!
//! See the `LICENSE.md` file in the CloudProxy root directory for
//! information on licensing and copyright.

use crate::{error::TaoError, principal::PrincipalName};
use serde::{Deserialize, Serialize};
use tao_utils::keys::{verify_signature, SigningKey};

/// Prepended to every serialized statement before signing.
pub const ATTESTATION_SIGNING_CONTEXT: &str = "tao::Attestation Version 1";
/// Validity of a fresh attestation: one year, in seconds.
pub const DEFAULT_ATTESTATION_TIMEOUT: i64 = 31556926;

const MAX_DELEGATION_DEPTH: usize = 8;

////////////////////////////////////////////////////////////////////////////////
// Statements.
////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    /// The principal making the statement.
    pub issuer: String,
    /// Start of validity, seconds since the Unix epoch.
    pub time: i64,
    /// End of validity, seconds since the Unix epoch.
    pub expiration: i64,
    pub data: Vec<u8>,
}

impl Statement {
    /// A statement by `issuer` valid from `now` for the default timeout.
    pub fn new(issuer: &PrincipalName, data: Vec<u8>, now: i64) -> Self {
        Statement {
            issuer: issuer.to_string(),
            time: now,
            expiration: now.saturating_add(DEFAULT_ATTESTATION_TIMEOUT),
            data,
        }
    }

    pub fn issuer(&self) -> Result<PrincipalName, TaoError> {
        PrincipalName::parse(&self.issuer)
    }

    #[inline]
    pub fn is_valid_at(&self, now: i64) -> bool {
        self.time <= now && now <= self.expiration
    }
}

fn signing_message(serialized_statement: &[u8]) -> Vec<u8> {
    let mut message = Vec::with_capacity(ATTESTATION_SIGNING_CONTEXT.len() + 1 + serialized_statement.len());
    message.extend_from_slice(ATTESTATION_SIGNING_CONTEXT.as_bytes());
    message.push(0);
    message.extend_from_slice(serialized_statement);
    message
}

////////////////////////////////////////////////////////////////////////////////
// Attestations.
////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attestation {
    pub serialized_statement: Vec<u8>,
    /// SubjectPublicKeyInfo DER of the signing key.
    pub signer_key: Vec<u8>,
    pub signature: Vec<u8>,
    pub delegation: Option<Box<Attestation>>,
}

impl Attestation {
    /// Signs `statement` under `key`.
    pub fn sign(key: &SigningKey, statement: &Statement, delegation: Option<Attestation>) -> Result<Self, TaoError> {
        let serialized_statement = bincode::serialize(statement)?;
        let signature = key
            .sign(&signing_message(&serialized_statement))
            .map_err(|e| TaoError::SigningError(e.to_string()))?;
        let signer_key = key
            .public_key_der()
            .map_err(|e| TaoError::SigningError(e.to_string()))?;
        Ok(Attestation {
            serialized_statement,
            signer_key,
            signature,
            delegation: delegation.map(Box::new),
        })
    }

    pub fn statement(&self) -> Result<Statement, TaoError> {
        bincode::deserialize(&self.serialized_statement)
            .map_err(|e| TaoError::VerificationError(format!("malformed statement: {}", e)))
    }

    /// The key principal of the signing key.
    #[inline]
    pub fn signer(&self) -> PrincipalName {
        PrincipalName::from_key(&self.signer_key)
    }

    /// Checks signatures, validity windows and the speaks-for links of the
    /// whole chain at time `now`.  Returns the statement and the key
    /// principal the chain terminates at.
    pub fn verify_chain(&self, now: i64) -> Result<(Statement, PrincipalName), TaoError> {
        self.verify_chain_at_depth(now, 0)
    }

    /// As `verify_chain`, additionally requiring the chain to terminate at one
    /// of `roots`.
    pub fn verify(&self, now: i64, roots: &[PrincipalName]) -> Result<Statement, TaoError> {
        let (statement, root) = self.verify_chain(now)?;
        if !roots.contains(&root) {
            return Err(TaoError::VerificationError(format!("{} is not a recognized root", root)));
        }
        Ok(statement)
    }

    fn verify_chain_at_depth(&self, now: i64, depth: usize) -> Result<(Statement, PrincipalName), TaoError> {
        if depth > MAX_DELEGATION_DEPTH {
            return Err(TaoError::VerificationError("delegation chain too long".to_string()));
        }

        let statement = self.statement()?;
        if !statement.is_valid_at(now) {
            return Err(TaoError::VerificationError(format!(
                "statement valid from {} to {}, not at {}",
                statement.time, statement.expiration, now
            )));
        }

        verify_signature(&self.signer_key, &signing_message(&self.serialized_statement), &self.signature)
            .map_err(|_| TaoError::VerificationError("bad signature".to_string()))?;

        let issuer = statement
            .issuer()
            .map_err(|e| TaoError::VerificationError(e.to_string()))?;
        let signer = self.signer();

        match &self.delegation {
            None => {
                if !signer.is_prefix_of(&issuer) {
                    return Err(TaoError::VerificationError(format!(
                        "{} does not speak for {}",
                        signer, issuer
                    )));
                }
                Ok((statement, signer))
            }
            Some(delegation) => {
                let (grant, root) = delegation.verify_chain_at_depth(now, depth + 1)?;
                let delegator = grant
                    .issuer()
                    .map_err(|e| TaoError::VerificationError(e.to_string()))?;
                if grant.data != signer.to_string().as_bytes() || !delegator.is_prefix_of(&issuer) {
                    return Err(TaoError::VerificationError(format!(
                        "delegation by {} does not cover {} speaking for {}",
                        delegator, signer, issuer
                    )));
                }
                Ok((statement, root))
            }
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, TaoError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TaoError> {
        bincode::deserialize(bytes)
            .map_err(|e| TaoError::VerificationError(format!("malformed attestation: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lazy_static::lazy_static;

    lazy_static! {
        static ref ROOT: SigningKey = SigningKey::generate(1024).unwrap();
        static ref STACKED: SigningKey = SigningKey::generate(1024).unwrap();
    }

    const NOW: i64 = 1_700_000_000;

    fn root_name() -> PrincipalName {
        PrincipalName::from_key(&ROOT.public_key_der().unwrap())
    }

    #[test]
    fn direct_attestation_verifies() {
        let issuer = root_name().extend("Program(a)").unwrap();
        let statement = Statement::new(&issuer, b"hello".to_vec(), NOW);
        assert_eq!(statement.expiration - statement.time, DEFAULT_ATTESTATION_TIMEOUT);

        let attestation = Attestation::sign(&ROOT, &statement, None).unwrap();
        let verified = attestation.verify(NOW + 10, &[root_name()]).unwrap();
        assert_eq!(verified, statement);
    }

    #[test]
    fn window_is_enforced() {
        let statement = Statement::new(&root_name(), b"x".to_vec(), NOW);
        let attestation = Attestation::sign(&ROOT, &statement, None).unwrap();
        assert!(attestation.verify_chain(NOW - 1).is_err());
        assert!(attestation.verify_chain(NOW).is_ok());
        assert!(attestation.verify_chain(NOW + DEFAULT_ATTESTATION_TIMEOUT).is_ok());
        assert!(attestation.verify_chain(NOW + DEFAULT_ATTESTATION_TIMEOUT + 1).is_err());
    }

    #[test]
    fn unknown_root_is_refused() {
        let statement = Statement::new(&root_name(), b"x".to_vec(), NOW);
        let attestation = Attestation::sign(&ROOT, &statement, None).unwrap();
        let stranger = PrincipalName::from_key(b"someone else");
        assert!(attestation.verify(NOW, &[stranger]).is_err());
    }

    #[test]
    fn signer_must_speak_for_issuer() {
        let statement = Statement::new(&root_name(), b"x".to_vec(), NOW);
        let attestation = Attestation::sign(&STACKED, &statement, None).unwrap();
        assert!(attestation.verify_chain(NOW).is_err());
    }

    #[test]
    fn tampered_statement_is_refused() {
        let statement = Statement::new(&root_name(), b"x".to_vec(), NOW);
        let mut attestation = Attestation::sign(&ROOT, &statement, None).unwrap();
        let last = attestation.serialized_statement.len() - 1;
        attestation.serialized_statement[last] ^= 1;
        assert!(attestation.verify_chain(NOW).is_err());
    }

    #[test]
    fn delegated_chain_terminates_at_root() {
        let host = root_name().extend("Host(stacked)").unwrap();
        let stacked_key = PrincipalName::from_key(&STACKED.public_key_der().unwrap());

        let grant = Statement::new(&host, stacked_key.to_string().into_bytes(), NOW);
        let delegation = Attestation::sign(&ROOT, &grant, None).unwrap();

        let program = host.extend("Program(b)").unwrap();
        let statement = Statement::new(&program, b"data".to_vec(), NOW);
        let attestation = Attestation::sign(&STACKED, &statement, Some(delegation.clone())).unwrap();

        let (verified, root) = attestation.verify_chain(NOW).unwrap();
        assert_eq!(verified, statement);
        assert_eq!(root, root_name());

        // The delegation does not cover names outside the stacked host.
        let outsider = root_name().extend("Host(other)").unwrap();
        let statement = Statement::new(&outsider, b"data".to_vec(), NOW);
        let attestation = Attestation::sign(&STACKED, &statement, Some(delegation)).unwrap();
        assert!(attestation.verify_chain(NOW).is_err());
    }

    #[test]
    fn bytes_round_trip() {
        let statement = Statement::new(&root_name(), b"x".to_vec(), NOW);
        let attestation = Attestation::sign(&ROOT, &statement, None).unwrap();
        let again = Attestation::from_bytes(&attestation.to_bytes().unwrap()).unwrap();
        assert_eq!(again, attestation);
        assert!(Attestation::from_bytes(b"junk").is_err());
    }
}
