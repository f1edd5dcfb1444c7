//! Principal names
//!
//! A principal name is an ordered path of segments joined with `/`.  The first
//! segment identifies the key that roots the name (`key(<sha256 hex>)`); each
//! hosted program's name is its host's name with one or more subprincipal
//! segments appended.  Names only ever grow: there is no operation that
//! removes or rewrites a segment.
//!
//! ## Authors
//!
//! The CloudProxy Development Team.
//!
//! ## Licensing and copyright notice
//!
//! See the `LICENSE.md` file in the CloudProxy root directory for
//! information on licensing and copyright.

use crate::error::TaoError;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use tao_utils::sha256;

/// Separator between the segments of a principal name.
pub const SEPARATOR: char = '/';

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PrincipalName {
    segments: Vec<String>,
}

impl PrincipalName {
    /// The name of the principal speaking for the key whose
    /// SubjectPublicKeyInfo DER is `public_key_der`.
    pub fn from_key(public_key_der: &[u8]) -> Self {
        PrincipalName {
            segments: vec![format!("key({})", hex::encode(sha256(public_key_der)))],
        }
    }

    /// Parses a `/`-joined name.
    pub fn parse(name: &str) -> Result<Self, TaoError> {
        let segments = split_segments(name)?;
        Ok(PrincipalName { segments })
    }

    /// This name with the segments of `subprin` appended.  `subprin` may
    /// itself hold several `/`-joined segments.
    pub fn extend(&self, subprin: &str) -> Result<Self, TaoError> {
        let mut segments = self.segments.clone();
        segments.extend(split_segments(subprin)?);
        Ok(PrincipalName { segments })
    }

    #[inline]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of segments.
    #[inline]
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// The key principal rooting this name.
    pub fn root(&self) -> PrincipalName {
        PrincipalName {
            segments: self.segments.iter().take(1).cloned().collect(),
        }
    }

    /// The first `depth` segments of this name, or `None` if it is shorter.
    pub fn prefix(&self, depth: usize) -> Option<PrincipalName> {
        if depth == 0 || depth > self.segments.len() {
            return None;
        }
        Some(PrincipalName {
            segments: self.segments[..depth].to_vec(),
        })
    }

    /// True iff `other` is this name or one of its extensions.
    pub fn is_prefix_of(&self, other: &PrincipalName) -> bool {
        other.segments.len() >= self.segments.len()
            && other.segments[..self.segments.len()] == self.segments[..]
    }
}

fn split_segments(name: &str) -> Result<Vec<String>, TaoError> {
    let segments: Vec<String> = name.split(SEPARATOR).map(str::to_string).collect();
    for segment in segments.iter() {
        if segment.is_empty() {
            return Err(TaoError::NameError(format!("empty segment in {:?}", name)));
        }
        if segment.chars().any(char::is_control) {
            return Err(TaoError::NameError(format!("control character in {:?}", name)));
        }
    }
    Ok(segments)
}

impl fmt::Display for PrincipalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

impl FromStr for PrincipalName {
    type Err = TaoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_principal_is_stable() {
        let a = PrincipalName::from_key(b"public key");
        assert_eq!(a, PrincipalName::from_key(b"public key"));
        assert_ne!(a, PrincipalName::from_key(b"other key"));
        assert!(a.to_string().starts_with("key("));
        assert_eq!(a.depth(), 1);
    }

    #[test]
    fn extension_appends() {
        let host = PrincipalName::parse("key(ab)").unwrap();
        let child = host.extend("Program(seal)").unwrap();
        assert_eq!(child.to_string(), "key(ab)/Program(seal)");
        let grandchild = child.extend("Args(1)/Env").unwrap();
        assert_eq!(grandchild.depth(), 4);
        assert!(host.is_prefix_of(&grandchild));
        assert!(child.is_prefix_of(&grandchild));
        assert!(!grandchild.is_prefix_of(&child));
        assert_eq!(grandchild.root(), host);
        assert_eq!(grandchild.prefix(2), Some(child));
        assert_eq!(grandchild.prefix(5), None);
    }

    #[test]
    fn malformed_extensions_are_name_errors() {
        let host = PrincipalName::parse("key(ab)").unwrap();
        for subprin in ["", "/", "a//b", "a/", "/a", "a\nb"] {
            match host.extend(subprin) {
                Err(TaoError::NameError(_)) => (),
                other => panic!("{:?} gave {:?}", subprin, other),
            }
        }
    }

    #[test]
    fn parse_round_trips() {
        let name: PrincipalName = "key(ab)/Program(x)/y".parse().unwrap();
        assert_eq!(PrincipalName::parse(&name.to_string()).unwrap(), name);
        assert!(PrincipalName::parse("").is_err());
    }

    #[test]
    fn sibling_is_not_prefix() {
        let a = PrincipalName::parse("key(ab)/a").unwrap();
        let b = PrincipalName::parse("key(ab)/ab").unwrap();
        assert!(!a.is_prefix_of(&b));
    }
}
