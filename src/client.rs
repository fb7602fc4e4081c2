use bytes::Bytes;
use std::path::Path;
use tracing::{info, warn};

use crate::config::ConnectionConfig;
use crate::error::RemoteFileError;
use crate::handle::Handle;
use crate::operations::{delete, directory, download, exists, list, rename, upload};
use crate::session::SftpConnector;
use crate::transport::{Connector, TransportError};
use crate::types::{TransferResult, UploadSource};
use crate::utils::{join_path, normalize_path};

type NoFilter = fn(&str) -> bool;

/// Client for file operations on a remote server.
///
/// Every operation opens its own session and channel, performs one unit of
/// work and closes the connection again, whatever the outcome. Nothing is
/// shared between calls, so one client can serve concurrent callers.
///
/// All remote paths are normalized with [`normalize_path`] before use.
#[derive(Debug, Clone)]
pub struct RemoteFileClient<C = SftpConnector> {
    config: ConnectionConfig,
    connector: C,
}

impl RemoteFileClient<SftpConnector> {
    /// Creates a client talking SFTP to the configured server
    pub fn new(config: ConnectionConfig) -> Self {
        Self::with_connector(config, SftpConnector)
    }
}

impl<C: Connector> RemoteFileClient<C> {
    /// Creates a client over a custom transport
    pub fn with_connector(config: ConnectionConfig, connector: C) -> Self {
        Self { config, connector }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Opens an authenticated session and file-transfer channel
    ///
    /// Session establishment is bounded by the connect timeout. The caller
    /// owns the returned handle and must pass it to
    /// [`RemoteFileClient::disconnect`] when done.
    ///
    /// # Errors
    ///
    /// Returns `Connection` when the network, the handshake or the
    /// authentication fails; the transport error is kept as the source.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let mut handle = client.connect().await?;
    /// client.ensure_directory(&mut handle, "/incoming/2024").await?;
    /// client.disconnect(&mut handle).await;
    /// ```
    pub async fn connect(&self) -> Result<Handle<C::Channel>, RemoteFileError> {
        let address = self.config.address();
        info!("Connecting to {:?}@{:?}", self.config.username(), address);
        let limit = self.config.connect_timeout();
        let connected = match tokio::time::timeout(limit, self.connector.connect(&self.config)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::timed_out("session establishment", limit)),
        };
        match connected {
            Ok(channel) => Ok(Handle::new(channel, &self.config)),
            Err(source) => {
                warn!("Connection to {} failed: {}", address, source);
                Err(RemoteFileError::Connection { address, source })
            }
        }
    }

    /// Closes a handle. Idempotent; teardown errors are logged and dropped.
    pub async fn disconnect(&self, handle: &mut Handle<C::Channel>) {
        handle.disconnect().await;
    }

    /// Creates `path` and any missing ancestors on an open handle, leaving
    /// the handle's working directory at `path`.
    ///
    /// Calling it for a directory that already exists succeeds without
    /// changes.
    pub async fn ensure_directory(
        &self,
        handle: &mut Handle<C::Channel>,
        path: &str,
    ) -> Result<(), RemoteFileError> {
        directory::ensure_directory(handle, &normalize_path(path)).await
    }

    /// Same as [`RemoteFileClient::ensure_directory`] on a connection of its own
    pub async fn create_directory(&self, path: &str) -> Result<(), RemoteFileError> {
        let path = normalize_path(path);
        let mut handle = self.connect().await?;
        let outcome = directory::ensure_directory(&mut handle, &path).await;
        handle.disconnect().await;
        outcome
    }

    /// Uploads a local file or an in-memory buffer to the remote server
    ///
    /// # Arguments
    ///
    /// * `source` - Local file path, bytes, or any async byte stream
    /// * `destination` - Full remote path of the file to write
    ///
    /// # Returns
    ///
    /// Returns a `TransferResult` with the remote path and bytes written
    ///
    /// # Errors
    ///
    /// - `SourceNotFound` if a local file cannot be opened; no connection is made
    /// - `Connection`, `DirectoryCreation` or `Upload` for remote failures
    ///
    /// # Example
    ///
    /// ```ignore
    /// let result = client.upload(PathBuf::from("/tmp/report.csv"), "/incoming/report.csv").await?;
    /// let result = client.upload(b"hello".to_vec(), "/a/b/c/file.txt").await?;
    /// ```
    pub async fn upload(
        &self,
        source: impl Into<UploadSource>,
        destination: &str,
    ) -> Result<TransferResult, RemoteFileError> {
        let destination = normalize_path(destination);
        let reader = upload::open_source(source.into()).await?;

        let mut handle = self.connect().await?;
        let outcome = upload::put(&mut handle, reader, &destination).await;
        handle.disconnect().await;

        let bytes = outcome?;
        Ok(TransferResult::completed(destination, bytes))
    }

    /// Uploads a local file into `remote_directory`, keeping its file name
    ///
    /// # Returns
    ///
    /// Returns a `TransferResult` whose path is `remote_directory/<file name>`
    pub async fn upload_to_directory(
        &self,
        local_file: impl AsRef<Path>,
        remote_directory: &str,
    ) -> Result<TransferResult, RemoteFileError> {
        let local_file = local_file.as_ref();
        let name = local_file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| RemoteFileError::SourceNotFound {
                path: local_file.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "path does not name a file",
                ),
            })?;
        let destination = join_path(&normalize_path(remote_directory), &name);
        self.upload(local_file.to_path_buf(), &destination).await
    }

    /// Uploads each item on its own connection
    ///
    /// Never stops early: every item gets a `TransferResult`, failed ones
    /// carrying the kind of error that stopped them.
    pub async fn upload_many<I, S>(&self, items: I) -> Vec<TransferResult>
    where
        I: IntoIterator<Item = (S, String)>,
        S: Into<UploadSource>,
    {
        let mut results = Vec::new();
        for (source, destination) in items {
            let outcome = self.upload(source, &destination).await;
            if let Err(e) = &outcome {
                warn!("Upload to {:?} failed: {}", destination, e);
            }
            results.push(TransferResult::from_outcome(
                &normalize_path(&destination),
                outcome,
            ));
        }
        results
    }

    /// Downloads a file from the remote server into a local directory
    ///
    /// # Arguments
    ///
    /// * `remote_path` - Path to the remote file
    /// * `local_directory` - Directory to write into; created if absent
    ///
    /// # Returns
    ///
    /// Returns a `TransferResult` with the local file path and bytes copied.
    /// The local file is named after the remote file and is only ever
    /// complete: a failed transfer leaves nothing behind.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let result = client.download("/outgoing/config.json", "/var/lib/app/in").await?;
    /// ```
    pub async fn download(
        &self,
        remote_path: &str,
        local_directory: impl AsRef<Path>,
    ) -> Result<TransferResult, RemoteFileError> {
        let remote_path = normalize_path(remote_path);
        let mut handle = self.connect().await?;
        let outcome = download::get(&mut handle, &remote_path, local_directory.as_ref()).await;
        handle.disconnect().await;

        let (local_path, bytes) = outcome?;
        Ok(TransferResult::completed(
            local_path.to_string_lossy(),
            bytes,
        ))
    }

    /// Reads a remote file into memory
    pub async fn read_to_bytes(&self, remote_path: &str) -> Result<Bytes, RemoteFileError> {
        let remote_path = normalize_path(remote_path);
        let mut handle = self.connect().await?;
        let outcome = download::read_to_bytes(&mut handle, &remote_path).await;
        handle.disconnect().await;
        outcome
    }

    /// Lists the names of the files in a remote directory that satisfy
    /// `predicate`
    ///
    /// A directory that does not exist is created and reported as empty.
    /// Sub-directories are never included. Order is whatever the server
    /// returns.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let batches = client.list("/sync/in", has_prefix("sendnumber_202")).await?;
    /// ```
    pub async fn list<P>(&self, directory: &str, predicate: P) -> Result<Vec<String>, RemoteFileError>
    where
        P: Fn(&str) -> bool,
    {
        let directory = normalize_path(directory);
        let mut handle = self.connect().await?;
        let outcome = list::ls(&mut handle, &directory, Some(predicate)).await;
        handle.disconnect().await;
        outcome
    }

    /// Lists every file name in a remote directory
    pub async fn list_files(&self, directory: &str) -> Result<Vec<String>, RemoteFileError> {
        let directory = normalize_path(directory);
        let mut handle = self.connect().await?;
        let outcome = list::ls(&mut handle, &directory, None::<NoFilter>).await;
        handle.disconnect().await;
        outcome
    }

    /// Deletes a remote file
    ///
    /// # Errors
    ///
    /// - `PathNotFound` if the parent directory does not exist
    /// - `Delete` if the file is missing or cannot be removed
    pub async fn delete(&self, remote_path: &str) -> Result<(), RemoteFileError> {
        let remote_path = normalize_path(remote_path);
        let mut handle = self.connect().await?;
        let outcome = delete::rm(&mut handle, &remote_path).await;
        handle.disconnect().await;
        outcome
    }

    /// Moves a remote file, creating the destination directory if needed
    pub async fn rename(&self, from: &str, to: &str) -> Result<(), RemoteFileError> {
        let (from, to) = (normalize_path(from), normalize_path(to));
        let mut handle = self.connect().await?;
        let outcome = rename::mv(&mut handle, &from, &to).await;
        handle.disconnect().await;
        outcome
    }

    /// Checks whether a remote file or directory exists
    ///
    /// `Ok(false)` means the server said "no such file". Anything else that
    /// goes wrong is an error, never a silent `false`.
    pub async fn exists(&self, remote_path: &str) -> Result<bool, RemoteFileError> {
        let remote_path = normalize_path(remote_path);
        let mut handle = self.connect().await?;
        let outcome = exists::exists(&mut handle, &remote_path).await;
        handle.disconnect().await;
        outcome
    }
}
