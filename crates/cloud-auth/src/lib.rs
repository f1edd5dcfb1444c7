//! CloudAuth: object-level authorization
//!
//! Once a principal's identity is established (by an attestation, a
//! certificate, or a channel to its host), CloudAuth decides which operations
//! that principal may perform on which named objects.  The authoritative table
//! has the shape
//!
//! ```text
//! subject -> object -> { operation }
//! ```
//!
//! and is **default-deny**: a subject/object pair absent from the table has no
//! permitted operations.  Inserts are idempotent and deletes prune empty
//! entries, so the table never holds an empty operation set.
//!
//! The table is loaded once from an ACL file at startup, mutated only through
//! `insert` and `delete`, and serialized back on demand.  The store is not
//! internally synchronized; a server sharing it between threads wraps it in a
//! `RwLock` (`permitted` only needs the read side).
//!
//! ## Authors
//!
//! The CloudProxy Development Team.
//!
//! ## Licensing and copyright notice
//!
//! See the `LICENSE.md` file in the CloudProxy root directory for
//! information on licensing and copyright.

pub mod error;
pub mod op;

pub use error::CloudAuthError;
pub use op::Op;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::Path,
};

/// The permission table.  Ordered maps give `serialize` a stable iteration
/// order: by subject, then object, then operation.
pub type PermissionTable = BTreeMap<String, BTreeMap<String, BTreeSet<Op>>>;

/// The authorization store.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CloudAuth {
    permissions: PermissionTable,
}

impl CloudAuth {
    /// An empty store, which permits nothing.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a store from the encoding produced by `serialize`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CloudAuthError> {
        let store: CloudAuth = serde_json::from_slice(bytes)?;
        store.validate()?;
        Ok(store)
    }

    /// Loads the ACL file at `path`.  Any failure here is fatal to the caller's
    /// startup.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CloudAuthError> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let store = Self::from_bytes(&bytes)?;
        info!("Loaded {} ACL entries from {:?}.", store.len(), path);
        Ok(store)
    }

    /// Returns `true` iff `op` on `object` has been granted to `subject`.
    pub fn permitted(&self, subject: &str, op: Op, object: &str) -> bool {
        self.permissions
            .get(subject)
            .and_then(|objects| objects.get(object))
            .map(|ops| ops.contains(&op))
            .unwrap_or(false)
    }

    /// Grants `op` on `object` to `subject`, creating intermediate entries as
    /// needed.  Returns whether the grant is new; granting twice is harmless.
    pub fn insert(&mut self, subject: &str, op: Op, object: &str) -> Result<bool, CloudAuthError> {
        check_name("subject", subject)?;
        check_name("object", object)?;

        let added = self
            .permissions
            .entry(subject.to_string())
            .or_insert_with(BTreeMap::new)
            .entry(object.to_string())
            .or_insert_with(BTreeSet::new)
            .insert(op);
        debug!("insert({}, {}, {}) -> {}", subject, op, object, added);
        Ok(added)
    }

    /// Revokes `op` on `object` from `subject`.  Returns `false` if the grant
    /// did not exist.
    pub fn delete(&mut self, subject: &str, op: Op, object: &str) -> bool {
        let objects = match self.permissions.get_mut(subject) {
            Some(objects) => objects,
            None => return false,
        };
        let ops = match objects.get_mut(object) {
            Some(ops) => ops,
            None => return false,
        };
        let removed = ops.remove(&op);

        if ops.is_empty() {
            objects.remove(object);
        }
        if objects.is_empty() {
            self.permissions.remove(subject);
        }
        debug!("delete({}, {}, {}) -> {}", subject, op, object, removed);
        removed
    }

    /// Deterministic encoding of the whole table.
    pub fn serialize(&self) -> Result<Vec<u8>, CloudAuthError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Writes the table to `path` in the format `from_file` reads.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), CloudAuthError> {
        fs::write(path, self.serialize()?)?;
        Ok(())
    }

    /// Number of `(subject, object, op)` grants.
    pub fn len(&self) -> usize {
        self.permissions
            .values()
            .flat_map(|objects| objects.values())
            .map(|ops| ops.len())
            .sum()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }

    /// All grants, in serialization order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, Op, &str)> + '_ {
        self.permissions.iter().flat_map(|(subject, objects)| {
            objects.iter().flat_map(move |(object, ops)| {
                ops.iter().map(move |op| (subject.as_str(), *op, object.as_str()))
            })
        })
    }

    fn validate(&self) -> Result<(), CloudAuthError> {
        for (subject, objects) in self.permissions.iter() {
            check_name("subject", subject)?;
            if objects.is_empty() {
                return Err(CloudAuthError::MalformedAcl(format!(
                    "subject {:?} has no objects",
                    subject
                )));
            }
            for (object, ops) in objects.iter() {
                check_name("object", object)?;
                if ops.is_empty() {
                    return Err(CloudAuthError::MalformedAcl(format!(
                        "{:?} on {:?} has no operations",
                        subject, object
                    )));
                }
            }
        }
        Ok(())
    }
}

fn check_name(what: &'static str, name: &str) -> Result<(), CloudAuthError> {
    if name.is_empty() {
        Err(CloudAuthError::EmptyName(what))
    } else {
        Ok(())
    }
}
