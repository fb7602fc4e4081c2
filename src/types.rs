use bytes::Bytes;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::io::AsyncRead;

use crate::error::RemoteFileError;

/// Serializable tag for each [`RemoteFileError`] variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Connection,
    DirectoryCreation,
    SourceNotFound,
    Upload,
    Download,
    LocalWrite,
    List,
    PathNotFound,
    Delete,
    Rename,
    Check,
}

/// Outcome of a single upload or download
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferResult {
    /// Remote path for uploads, local path for downloads
    pub path: String,
    pub success: bool,
    /// Bytes moved; zero on failure
    pub bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl TransferResult {
    pub fn completed(path: impl Into<String>, bytes: u64) -> Self {
        Self {
            path: path.into(),
            success: true,
            bytes,
            error_kind: None,
        }
    }

    pub fn failed(path: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            path: path.into(),
            success: false,
            bytes: 0,
            error_kind: Some(kind),
        }
    }

    /// Folds an operation outcome into a result record
    pub fn from_outcome(path: &str, outcome: Result<TransferResult, RemoteFileError>) -> Self {
        outcome.unwrap_or_else(|err| Self::failed(path, err.kind()))
    }
}

/// Content to upload
pub enum UploadSource {
    /// A file on the local filesystem
    File(PathBuf),
    /// An in-memory buffer
    Bytes(Bytes),
    /// Any async byte stream
    Stream(Box<dyn AsyncRead + Send + Unpin>),
}

impl fmt::Debug for UploadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadSource::File(path) => f.debug_tuple("File").field(path).finish(),
            UploadSource::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            UploadSource::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl From<PathBuf> for UploadSource {
    fn from(path: PathBuf) -> Self {
        UploadSource::File(path)
    }
}

impl From<&Path> for UploadSource {
    fn from(path: &Path) -> Self {
        UploadSource::File(path.to_path_buf())
    }
}

impl From<Bytes> for UploadSource {
    fn from(bytes: Bytes) -> Self {
        UploadSource::Bytes(bytes)
    }
}

impl From<Vec<u8>> for UploadSource {
    fn from(bytes: Vec<u8>) -> Self {
        UploadSource::Bytes(Bytes::from(bytes))
    }
}
