use async_trait::async_trait;
use std::fmt;
use std::io;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::config::ConnectionConfig;

/// Byte stream read from a remote file.
pub type RemoteReader = Box<dyn AsyncRead + Send + Unpin>;

/// Byte sink writing into a remote file.
pub type RemoteWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// One entry of a remote directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub filename: String,
    pub is_directory: bool,
}

/// Opens authenticated file-transfer channels.
///
/// Implementations must not share a channel between calls: every call to
/// [`Connector::connect`] yields a fresh session and channel.
#[async_trait]
pub trait Connector: Send + Sync {
    type Channel: FileChannel;

    async fn connect(&self, config: &ConnectionConfig) -> Result<Self::Channel, TransportError>;
}

/// The capability set the client needs from a file-transfer channel.
///
/// Relative paths are resolved against the channel's working directory,
/// which only [`FileChannel::change_directory`] moves.
#[async_trait]
pub trait FileChannel: Send {
    /// Current working directory, always absolute.
    fn working_directory(&self) -> &str;

    /// Fails when `path` does not exist or is not a directory.
    async fn change_directory(&mut self, path: &str) -> Result<(), TransportError>;

    /// Creates one directory. The parent must already exist.
    async fn make_directory(&mut self, path: &str) -> Result<(), TransportError>;

    /// Creates or truncates `path` and returns a writer into it.
    async fn put(&mut self, path: &str) -> Result<RemoteWriter, TransportError>;

    /// Opens `path` for reading.
    async fn get(&mut self, path: &str) -> Result<RemoteReader, TransportError>;

    async fn remove(&mut self, path: &str) -> Result<(), TransportError>;

    async fn rename(&mut self, from: &str, to: &str) -> Result<(), TransportError>;

    /// Lists a directory, or yields a single entry when `path` is a file.
    async fn list(&mut self, path: &str) -> Result<Vec<RemoteEntry>, TransportError>;

    /// Tears down the channel and its session.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Classification of a transport failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    NotFound,
    PermissionDenied,
    Authentication,
    Connection,
    Timeout,
    Io,
    Closed,
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransportErrorKind::NotFound => "no such file",
            TransportErrorKind::PermissionDenied => "permission denied",
            TransportErrorKind::Authentication => "authentication failed",
            TransportErrorKind::Connection => "connection failure",
            TransportErrorKind::Timeout => "timed out",
            TransportErrorKind::Io => "i/o failure",
            TransportErrorKind::Closed => "channel closed",
            TransportErrorKind::Other => "failure",
        };
        f.write_str(label)
    }
}

/// Error reported by a [`Connector`] or [`FileChannel`].
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(path: &str) -> Self {
        Self::new(TransportErrorKind::NotFound, path)
    }

    pub fn permission_denied(path: &str) -> Self {
        Self::new(TransportErrorKind::PermissionDenied, path)
    }

    pub fn closed() -> Self {
        Self::new(TransportErrorKind::Closed, "handle already disconnected")
    }

    pub fn timed_out(step: &str, after: std::time::Duration) -> Self {
        Self::new(
            TransportErrorKind::Timeout,
            format!("{step} exceeded {after:?}"),
        )
    }

    /// Classifies a server message that carries no status code.
    ///
    /// Message matching is the last resort; prefer a structured code.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lowered = message.to_lowercase();
        let kind = if lowered.contains("no such file") {
            TransportErrorKind::NotFound
        } else if lowered.contains("permission denied") {
            TransportErrorKind::PermissionDenied
        } else {
            TransportErrorKind::Other
        };
        Self::new(kind, message)
    }

    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == TransportErrorKind::NotFound
    }
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        let kind = match err.kind() {
            io::ErrorKind::NotFound => TransportErrorKind::NotFound,
            io::ErrorKind::PermissionDenied => TransportErrorKind::PermissionDenied,
            io::ErrorKind::TimedOut => TransportErrorKind::Timeout,
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::BrokenPipe => TransportErrorKind::Connection,
            _ => TransportErrorKind::Io,
        };
        Self::new(kind, err.to_string())
    }
}

impl From<russh::Error> for TransportError {
    fn from(err: russh::Error) -> Self {
        let kind = match &err {
            russh::Error::ConnectionTimeout
            | russh::Error::KeepaliveTimeout
            | russh::Error::InactivityTimeout
            | russh::Error::Elapsed(_) => TransportErrorKind::Timeout,
            russh::Error::NotAuthenticated | russh::Error::NoAuthMethod => {
                TransportErrorKind::Authentication
            }
            russh::Error::IO(_) => TransportErrorKind::Io,
            _ => TransportErrorKind::Connection,
        };
        Self::new(kind, err.to_string())
    }
}

impl From<russh_sftp::client::error::Error> for TransportError {
    fn from(err: russh_sftp::client::error::Error) -> Self {
        use russh_sftp::client::error::Error;
        use russh_sftp::protocol::StatusCode;

        match &err {
            Error::Status(status) => {
                let kind = match status.status_code {
                    StatusCode::NoSuchFile => TransportErrorKind::NotFound,
                    StatusCode::PermissionDenied => TransportErrorKind::PermissionDenied,
                    StatusCode::NoConnection | StatusCode::ConnectionLost => {
                        TransportErrorKind::Connection
                    }
                    // Some servers answer a generic failure; the message is all we have.
                    _ => return Self::from_message(status.error_message.clone()),
                };
                Self::new(kind, status.error_message.clone())
            }
            Error::Timeout => Self::new(TransportErrorKind::Timeout, err.to_string()),
            Error::IO(message) => Self::new(TransportErrorKind::Io, message.clone()),
            _ => Self::from_message(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_fallback_detects_absence() {
        assert!(TransportError::from_message("No such file").is_not_found());
        assert!(TransportError::from_message("no such file or directory").is_not_found());
        assert_eq!(
            TransportError::from_message("Permission denied").kind(),
            TransportErrorKind::PermissionDenied
        );
        assert_eq!(
            TransportError::from_message("Failure").kind(),
            TransportErrorKind::Other
        );
    }

    #[test]
    fn io_errors_are_classified() {
        let err = TransportError::from(io::Error::from(io::ErrorKind::NotFound));
        assert!(err.is_not_found());
        let err = TransportError::from(io::Error::from(io::ErrorKind::ConnectionReset));
        assert_eq!(err.kind(), TransportErrorKind::Connection);
        let err = TransportError::from(io::Error::other("disk full"));
        assert_eq!(err.kind(), TransportErrorKind::Io);
    }

    #[test]
    fn sftp_status_codes_take_priority_over_text() {
        use russh_sftp::protocol::{Status, StatusCode};

        let status = Status {
            id: 1,
            status_code: StatusCode::PermissionDenied,
            error_message: "no such file".to_string(),
            language_tag: "en-US".to_string(),
        };
        let err = TransportError::from(russh_sftp::client::error::Error::Status(status));
        assert_eq!(err.kind(), TransportErrorKind::PermissionDenied);
    }

    #[test]
    fn display_includes_kind_and_message() {
        let err = TransportError::not_found("/a/b");
        assert_eq!(err.to_string(), "no such file: /a/b");
    }
}
