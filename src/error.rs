use thiserror::Error;

use crate::path::VPathBuf;

/// The single error type surfaced across the whole public API.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid virtual path - {0}")]
    InvalidPath(String),

    #[error("no such file or directory - {0}")]
    NotFound(VPathBuf),

    #[error("mount target is not a directory - {0}")]
    NotADirectory(String),

    #[error("cannot mount a directory at a file mount point - {0}")]
    InvalidMount(VPathBuf),

    #[error("path escapes its mounted root - {0}")]
    PathEscape(String),

    #[error("no handler registered for extension {0}")]
    UnknownExtension(String),

    #[error("no canonical extension registered for the requested type")]
    UnknownType,

    #[error("the outermost handler for extension {0} rejected {1}")]
    HandlerRejected(String, VPathBuf),

    #[error("a resource has already been mounted on this mount-point handle")]
    AlreadyMounted,

    #[error("downcast failed: stored type does not match the requested type")]
    TypeMismatch,

    #[error("creating a missing file target on mount is not supported yet")]
    Unsupported,

    #[error("io error - {0}")]
    Io(#[from] std::io::Error),
}
