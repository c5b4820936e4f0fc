use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::codec::CodecError;
use crate::registry::WorkspaceId;

/// Result alias used by every workspace operation.
pub type WorkspaceResult<T> = Result<T, WorkspaceError>;

/// Coarse classification of a [`WorkspaceError`].
/// 錯誤的粗略分類，供呈現層決定訊息樣式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    Forbidden,
    FormatError,
    IoFailure,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::NotFound => "not found",
            ErrorKind::AlreadyExists => "already exists",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::FormatError => "format error",
            ErrorKind::IoFailure => "I/O failure",
        };
        f.write_str(label)
    }
}

/// Errors raised by the workspace store, registry, dataset store and session.
/// 工作區、資料集與工作階段操作可能回傳的錯誤。
///
/// Every variant carries the id, name or path it concerns so callers can
/// compose a message without re-deriving context.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("workspace {0} not found")]
    WorkspaceNotFound(WorkspaceId),
    #[error("workspace metadata missing at {}", .0.display())]
    MetadataMissing(PathBuf),
    #[error("invalid workspace metadata {}: {message}", path.display())]
    InvalidMetadata { path: PathBuf, message: String },
    #[error("dataset '{name}' not found in {}", dir.display())]
    DatasetNotFound { name: String, dir: PathBuf },
    #[error("source file {} does not exist", .0.display())]
    SourceNotFound(PathBuf),
    #[error("'{name}' already exists at {}", path.display())]
    AlreadyExists { name: String, path: PathBuf },
    #[error("dataset '{name}' is reserved and cannot be {action}")]
    Forbidden { name: String, action: &'static str },
    #[error("invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },
    #[error("cannot process {}: {source}", path.display())]
    Format {
        path: PathBuf,
        #[source]
        source: CodecError,
    },
    #[error("failed to {op} {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("no workspace is bound to the session")]
    Unbound,
    #[error("no dataset is loaded in the session")]
    NoDataset,
}

impl WorkspaceError {
    /// Maps the error onto the public taxonomy.
    /// 將錯誤對應到公開的分類。
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkspaceError::WorkspaceNotFound(_)
            | WorkspaceError::MetadataMissing(_)
            | WorkspaceError::DatasetNotFound { .. }
            | WorkspaceError::SourceNotFound(_)
            | WorkspaceError::Unbound
            | WorkspaceError::NoDataset => ErrorKind::NotFound,
            WorkspaceError::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            WorkspaceError::Forbidden { .. } | WorkspaceError::InvalidName { .. } => {
                ErrorKind::Forbidden
            }
            WorkspaceError::InvalidMetadata { .. } | WorkspaceError::Format { .. } => {
                ErrorKind::FormatError
            }
            WorkspaceError::Io { .. } => ErrorKind::IoFailure,
        }
    }

    /// Path the failure refers to, when there is one.
    pub fn path(&self) -> Option<&Path> {
        match self {
            WorkspaceError::MetadataMissing(path)
            | WorkspaceError::SourceNotFound(path)
            | WorkspaceError::InvalidMetadata { path, .. }
            | WorkspaceError::AlreadyExists { path, .. }
            | WorkspaceError::Format { path, .. }
            | WorkspaceError::Io { path, .. } => Some(path),
            WorkspaceError::DatasetNotFound { dir, .. } => Some(dir),
            _ => None,
        }
    }

    /// Builds a mapper turning an [`io::Error`] into [`WorkspaceError::Io`].
    pub(crate) fn io(op: &'static str, path: &Path) -> impl FnOnce(io::Error) -> Self {
        let path = path.to_path_buf();
        move |source| WorkspaceError::Io { op, path, source }
    }

    pub(crate) fn format(path: &Path) -> impl FnOnce(CodecError) -> Self {
        let path = path.to_path_buf();
        move |source| WorkspaceError::Format { path, source }
    }
}
