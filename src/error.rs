// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Error taxonomy for the virtualization layer.
//!
//! Every fallible operation in the crate returns [`Result`]. The entrypoint
//! layer decides which errors are tolerated silently (the host issued a bad id,
//! or called without a current context) and which are diagnostics worth
//! surfacing; see [`Error::is_recoverable`].

use std::fmt::Display;

/// The kind of object an id refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Buffer,
    Texture,
    Program,
    VertexArray,
    Context,
}

impl Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectKind::Buffer => write!(f, "buffer"),
            ObjectKind::Texture => write!(f, "texture"),
            ObjectKind::Program => write!(f, "program"),
            ObjectKind::VertexArray => write!(f, "vertex array"),
            ObjectKind::Context => write!(f, "context"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A table lookup missed.
    #[error("no {kind} with id {id}")]
    InvalidId { kind: ObjectKind, id: u64 },
    #[error("no context is current on the calling thread")]
    NoCurrentContext,
    #[error("buffer {buffer} is already mapped")]
    AlreadyMapped { buffer: u32 },
    #[error("buffer {buffer} is not mapped")]
    NotMapped { buffer: u32 },
    /// A byte or index range fell outside what the object holds.
    #[error("range {offset}+{length} exceeds limit {limit}")]
    OutOfRange {
        offset: usize,
        length: usize,
        limit: usize,
    },
    #[error("unsupported {what}: {value:#x}")]
    UnsupportedFormat { what: &'static str, value: u32 },
    /// Attempted to share with a context that is itself a sharing dependent.
    #[error("context {owner} is a sharing dependent and cannot be shared with")]
    InvalidSharingDepth { owner: u64 },
    #[error("context {context} is current on another thread")]
    ContextInUse { context: u64 },
    /// Map calls are forwarded to the driver in this configuration.
    #[error("buffer mapping is not emulated in this configuration")]
    MappingNotEmulated,
    /// A table was accessed after its last referencing context released it.
    ///
    /// This is bookkeeping corruption, not a host error.
    #[error("{kind} table accessed with no live owning context")]
    OrphanedTable { kind: ObjectKind },
    #[error("png encoding failed: {0}")]
    PngEncode(#[from] png::EncodingError),
    #[error("png decoding failed: {0}")]
    PngDecode(#[from] png::DecodingError),
}

impl Error {
    pub(crate) fn invalid_id(kind: ObjectKind, id: impl Into<u64>) -> Self {
        Error::InvalidId {
            kind,
            id: id.into(),
        }
    }

    /// Whether the host should see a no-op rather than a diagnostic.
    ///
    /// Real drivers tolerate garbage ids and calls with nothing current, so
    /// the host is never crashed for either.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::InvalidId { .. } | Error::NoCurrentContext)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Checks that `offset..offset+length` fits inside `limit` bytes.
pub(crate) fn check_range(offset: usize, length: usize, limit: usize) -> Result<usize> {
    match offset.checked_add(length) {
        Some(end) if end <= limit => Ok(end),
        _ => Err(Error::OutOfRange {
            offset,
            length,
            limit,
        }),
    }
}
