use std::path::PathBuf;

use crate::transport::{TransportError, TransportErrorKind};
use crate::types::ErrorKind;

/// Failure of a [`RemoteFileClient`](crate::RemoteFileClient) operation.
///
/// Every variant keeps the underlying cause as its `source`.
#[derive(Debug, thiserror::Error)]
pub enum RemoteFileError {
    #[error("failed to connect to {address}")]
    Connection {
        address: String,
        #[source]
        source: TransportError,
    },
    #[error("failed to create remote directory {path}")]
    DirectoryCreation {
        path: String,
        #[source]
        source: TransportError,
    },
    #[error("local source file {} cannot be opened", path.display())]
    SourceNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to upload {path}")]
    Upload {
        path: String,
        #[source]
        source: TransportError,
    },
    #[error("failed to download {path}")]
    Download {
        path: String,
        #[source]
        source: TransportError,
    },
    #[error("failed to write local file {}", path.display())]
    LocalWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to list remote directory {path}")]
    List {
        path: String,
        #[source]
        source: TransportError,
    },
    #[error("remote directory {path} not found")]
    PathNotFound {
        path: String,
        #[source]
        source: TransportError,
    },
    #[error("failed to delete {path}")]
    Delete {
        path: String,
        #[source]
        source: TransportError,
    },
    #[error("failed to rename {from} to {to}")]
    Rename {
        from: String,
        to: String,
        #[source]
        source: TransportError,
    },
    #[error("failed to check whether {path} exists")]
    Check {
        path: String,
        #[source]
        source: TransportError,
    },
}

impl RemoteFileError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RemoteFileError::Connection { .. } => ErrorKind::Connection,
            RemoteFileError::DirectoryCreation { .. } => ErrorKind::DirectoryCreation,
            RemoteFileError::SourceNotFound { .. } => ErrorKind::SourceNotFound,
            RemoteFileError::Upload { .. } => ErrorKind::Upload,
            RemoteFileError::Download { .. } => ErrorKind::Download,
            RemoteFileError::LocalWrite { .. } => ErrorKind::LocalWrite,
            RemoteFileError::List { .. } => ErrorKind::List,
            RemoteFileError::PathNotFound { .. } => ErrorKind::PathNotFound,
            RemoteFileError::Delete { .. } => ErrorKind::Delete,
            RemoteFileError::Rename { .. } => ErrorKind::Rename,
            RemoteFileError::Check { .. } => ErrorKind::Check,
        }
    }

    /// Kind of the transport failure behind this error, when there is one.
    pub fn transport_kind(&self) -> Option<TransportErrorKind> {
        match self {
            RemoteFileError::Connection { source, .. }
            | RemoteFileError::DirectoryCreation { source, .. }
            | RemoteFileError::Upload { source, .. }
            | RemoteFileError::Download { source, .. }
            | RemoteFileError::List { source, .. }
            | RemoteFileError::PathNotFound { source, .. }
            | RemoteFileError::Delete { source, .. }
            | RemoteFileError::Rename { source, .. }
            | RemoteFileError::Check { source, .. } => Some(source.kind()),
            RemoteFileError::SourceNotFound { .. } | RemoteFileError::LocalWrite { .. } => None,
        }
    }
}
