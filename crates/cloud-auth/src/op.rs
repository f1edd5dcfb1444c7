//! Operations a subject may be granted on an object.
//!
//! ## Authors
//!
//! The CloudProxy Development Team.
//!
//! ## Licensing and copyright notice
//!
//! See the `LICENSE.md` file in the CloudProxy root directory for
//! information on licensing and copyright.

use crate::error::CloudAuthError;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Op {
    Read,
    Write,
    Create,
    Delete,
    Execute,
    Admin,
}

impl Op {
    pub const ALL: [Op; 6] = [Op::Read, Op::Write, Op::Create, Op::Delete, Op::Execute, Op::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Op::Read => "READ",
            Op::Write => "WRITE",
            Op::Create => "CREATE",
            Op::Delete => "DELETE",
            Op::Execute => "EXECUTE",
            Op::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Op {
    type Err = CloudAuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Op::ALL
            .iter()
            .find(|op| op.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| CloudAuthError::UnknownOp(s.to_string()))
    }
}
