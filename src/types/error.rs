use std::fmt;
use std::io;
use std::time::Duration;

use thiserror::Error;

use super::{EdgeId, NodeId};

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, GraphError>;

/// The thing a [`GraphError::NotFound`] refers to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Entity {
    /// A node id with no live node.
    Node(NodeId),
    /// An edge id with no live edge.
    Edge(EdgeId),
    /// A property name with no vector index.
    VectorIndex(String),
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Node(id) => write!(f, "node {id}"),
            Entity::Edge(id) => write!(f, "edge {id}"),
            Entity::VectorIndex(prop) => write!(f, "vector index '{prop}'"),
        }
    }
}

/// Errors surfaced by the storage engine.
#[derive(Debug, Error)]
pub enum GraphError {
    /// A node, edge or index does not exist.
    #[error("{0} not found")]
    NotFound(Entity),
    /// A parameter is out of range or malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The target already exists.
    #[error("conflict: {0}")]
    Conflict(String),
    /// A deadline expired or the caller cancelled the operation.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
    /// WAL, storage or codec fault. The cause is kept for logging.
    #[error("internal error: {0}")]
    Internal(#[from] InternalError),
}

/// Root causes behind [`GraphError::Internal`].
#[derive(Debug, Error)]
pub enum InternalError {
    /// Underlying file I/O failed.
    #[error("I/O: {0}")]
    Io(#[from] io::Error),
    /// A WAL payload or snapshot could not be encoded or decoded.
    #[error("codec: {0}")]
    Codec(#[from] serde_json::Error),
    /// Persisted state is inconsistent.
    #[error("corruption: {0}")]
    Corruption(&'static str),
    /// The store has been closed.
    #[error("store is closed")]
    Closed,
    /// An identifier space ran out.
    #[error("{0} space exhausted")]
    Exhausted(&'static str),
}

/// Fieldless classification of a [`GraphError`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`GraphError::NotFound`].
    NotFound,
    /// See [`GraphError::InvalidArgument`].
    InvalidArgument,
    /// See [`GraphError::Conflict`].
    Conflict,
    /// See [`GraphError::Timeout`].
    Timeout,
    /// See [`GraphError::Internal`].
    Internal,
}

impl ErrorKind {
    /// HTTP status an API layer should answer with.
    pub fn http_status(self) -> u16 {
        match self {
            ErrorKind::NotFound => 404,
            ErrorKind::InvalidArgument => 400,
            ErrorKind::Conflict => 409,
            ErrorKind::Timeout => 408,
            ErrorKind::Internal => 500,
        }
    }
}

impl GraphError {
    /// Returns the taxonomy bucket of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            GraphError::NotFound(_) => ErrorKind::NotFound,
            GraphError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            GraphError::Conflict(_) => ErrorKind::Conflict,
            GraphError::Timeout(_) => ErrorKind::Timeout,
            GraphError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Shorthand for `InvalidArgument` with a formatted message.
    pub fn invalid(msg: impl Into<String>) -> Self {
        GraphError::InvalidArgument(msg.into())
    }

    /// Whether this is a `NotFound`.
    pub fn is_not_found(&self) -> bool {
        matches!(self, GraphError::NotFound(_))
    }

    /// Message safe to hand to a remote caller. Internal causes are not exposed.
    pub fn public_message(&self) -> String {
        match self {
            GraphError::Internal(_) => "internal error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<io::Error> for GraphError {
    fn from(err: io::Error) -> Self {
        GraphError::Internal(InternalError::Io(err))
    }
}

impl From<serde_json::Error> for GraphError {
    fn from(err: serde_json::Error) -> Self {
        GraphError::Internal(InternalError::Codec(err))
    }
}
