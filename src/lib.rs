//! Connection-per-call file transfer helper for SFTP servers.
//!
//! [`RemoteFileClient`] uploads, downloads, lists, deletes and moves files on
//! a remote server. Each operation opens a fresh authenticated session,
//! performs one unit of work and tears the session down again on every exit
//! path. The transport sits behind the [`Connector`] / [`FileChannel`]
//! traits; [`SftpConnector`] speaks SFTP over `russh` and
//! [`MemoryConnector`] keeps everything in memory.

// Module declarations
mod client;
mod config;
mod error;
mod handle;
mod memory;
mod operations;
mod session;
mod transport;
mod types;
mod utils;

// Public API exports
pub use client::RemoteFileClient;
pub use config::{
    ConfigError, ConnectionConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_IO_SIZE,
    DEFAULT_OPERATION_TIMEOUT, DEFAULT_PORT,
};
pub use error::RemoteFileError;
pub use handle::Handle;
pub use memory::{MemoryChannel, MemoryConnector};
pub use session::{SftpChannel, SftpConnector};
pub use transport::{
    Connector, FileChannel, RemoteEntry, RemoteReader, RemoteWriter, TransportError,
    TransportErrorKind,
};
pub use types::{ErrorKind, TransferResult, UploadSource};
pub use utils::{file_name, has_prefix, join_path, normalize_path, parent_directory};

// Re-export commonly used external types for convenience
pub use bytes::Bytes;
