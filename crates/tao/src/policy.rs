//! Seal policies
//!
//! A seal policy names which callers may unseal an envelope.  The policy is an
//! opaque, host-defined string; the hosts in this crate recognize three
//! canonical values, each naming a class of callers relative to the sealer:
//!
//! - `self`: any principal sharing the sealer's first subprincipal under the
//!   host, i.e. past or future instances of the same hosted program,
//! - `few`: exactly the sealing principal, including every extension it has
//!   made since it was started,
//! - `any`: any principal hosted by the same host.
//!
//! `few` is never more permissive than `self`, and `self` never more
//! permissive than `any`.
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

pub const SEAL_POLICY_SELF: &str = "self";
pub const SEAL_POLICY_FEW: &str = "few";
pub const SEAL_POLICY_ANY: &str = "any";
/// The policy used when a caller does not choose one.
pub const SEAL_POLICY_DEFAULT: &str = SEAL_POLICY_SELF;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PolicyClass {
    SelfOnly,
    Few,
    Any,
}

impl PolicyClass {
    pub(crate) fn parse(policy: &str) -> Result<Self, TaoError> {
        match policy {
            SEAL_POLICY_SELF => Ok(PolicyClass::SelfOnly),
            SEAL_POLICY_FEW => Ok(PolicyClass::Few),
            SEAL_POLICY_ANY => Ok(PolicyClass::Any),
            other => Err(TaoError::PolicyError(format!("unrecognized seal policy {:?}", other))),
        }
    }

    /// The name that identifies the class `principal` belongs to under a
    /// host named `host`.
    pub(crate) fn class_name(self, host: &PrincipalName, principal: &PrincipalName) -> PrincipalName {
        match self {
            PolicyClass::SelfOnly => principal
                .prefix(host.depth() + 1)
                .unwrap_or_else(|| principal.clone()),
            PolicyClass::Few => principal.clone(),
            PolicyClass::Any => host.clone(),
        }
    }

    /// Whether `caller` may open what `sealer` sealed under this class.
    pub(crate) fn satisfied_by(self, host: &PrincipalName, sealer: &PrincipalName, caller: &PrincipalName) -> bool {
        host.is_prefix_of(caller) && self.class_name(host, sealer) == self.class_name(host, caller)
    }
}
