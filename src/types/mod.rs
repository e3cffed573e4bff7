#![forbid(unsafe_code)]

//! Identifiers, property values, checksums and the error taxonomy shared by
//! every layer of the engine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Checksum helpers used by the write-ahead log.
pub mod checksum;
mod error;
mod value;

pub use checksum::{entry_crc32, Checksum, Crc32Fast};
pub use error::{Entity, ErrorKind, GraphError, InternalError, Result};
pub use value::{Properties, Value};
pub(crate) use value::{check_vector, validate_properties};

/// Identifier of a node. Allocated monotonically and never reused.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(pub u64);

/// Identifier of an edge. Allocated monotonically and never reused.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EdgeId(pub u64);

/// Log sequence number of a WAL entry.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Lsn(pub u64);

impl Lsn {
    /// Returns the LSN that follows this one, or `None` when the space is exhausted.
    pub fn next(self) -> Option<Lsn> {
        self.0.checked_add(1).map(Lsn)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for Lsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for NodeId {
    fn from(value: u64) -> Self {
        NodeId(value)
    }
}

impl From<NodeId> for u64 {
    fn from(value: NodeId) -> Self {
        value.0
    }
}

impl From<u64> for EdgeId {
    fn from(value: u64) -> Self {
        EdgeId(value)
    }
}

impl From<EdgeId> for u64 {
    fn from(value: EdgeId) -> Self {
        value.0
    }
}

/// Current wall-clock time as Unix nanoseconds.
pub fn unix_nanos() -> i64 {
    let nanos = time::OffsetDateTime::now_utc().unix_timestamp_nanos();
    i64::try_from(nanos).unwrap_or(i64::MAX)
}
