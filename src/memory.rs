//! In-memory transport.
//!
//! [`MemoryConnector`] serves a file tree held in memory, with hooks to inject
//! failures. Every connector clone shares the same tree, so a test can keep
//! one clone to inspect what the client did through another.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::config::ConnectionConfig;
use crate::transport::{
    Connector, FileChannel, RemoteEntry, RemoteReader, RemoteWriter, TransportError,
    TransportErrorKind,
};
use crate::utils::{file_name, parent_directory, resolve_path};

#[derive(Debug)]
struct MemoryState {
    directories: BTreeSet<String>,
    files: BTreeMap<String, Vec<u8>>,
    denied: BTreeSet<String>,
    broken_reads: BTreeSet<String>,
    refuse_connections: bool,
    latency: Option<Duration>,
    connections: usize,
    open_channels: usize,
}

impl Default for MemoryState {
    fn default() -> Self {
        Self {
            directories: BTreeSet::from(["/".to_string()]),
            files: BTreeMap::new(),
            denied: BTreeSet::new(),
            broken_reads: BTreeSet::new(),
            refuse_connections: false,
            latency: None,
            connections: 0,
            open_channels: 0,
        }
    }
}

impl MemoryState {
    fn check_access(&self, path: &str) -> Result<(), TransportError> {
        let denied = self
            .denied
            .iter()
            .any(|d| path == d || path.starts_with(&format!("{}/", d.trim_end_matches('/'))));
        if denied {
            Err(TransportError::permission_denied(path))
        } else {
            Ok(())
        }
    }

    fn exists(&self, path: &str) -> bool {
        self.directories.contains(path) || self.files.contains_key(path)
    }

    fn require_parent(&self, path: &str) -> Result<(), TransportError> {
        let parent = parent_directory(path);
        if self.directories.contains(parent) {
            Ok(())
        } else {
            Err(TransportError::not_found(parent))
        }
    }

    fn children(&self, directory: &str) -> Vec<RemoteEntry> {
        let is_child = |path: &str| path != directory && parent_directory(path) == directory;
        let mut entries: Vec<RemoteEntry> = self
            .directories
            .iter()
            .filter(|path| is_child(path))
            .map(|path| RemoteEntry {
                filename: file_name(path).to_string(),
                is_directory: true,
            })
            .chain(self.files.keys().filter(|path| is_child(path)).map(|path| RemoteEntry {
                filename: file_name(path).to_string(),
                is_directory: false,
            }))
            .collect();
        entries.sort_by(|a, b| a.filename.cmp(&b.filename));
        entries
    }
}

/// Connector over a shared in-memory file tree.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryConnector {
    /// An empty tree containing only `/`
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a directory and all of its ancestors
    pub fn with_directory(self, path: &str) -> Self {
        {
            let mut state = self.state();
            let mut current = String::new();
            for component in path.split('/').filter(|c| !c.is_empty()) {
                current.push('/');
                current.push_str(component);
                state.directories.insert(current.clone());
            }
        }
        self
    }

    /// Adds a file, creating its ancestors
    pub fn with_file(self, path: &str, contents: impl Into<Vec<u8>>) -> Self {
        let connector = self.with_directory(parent_directory(path));
        connector
            .state()
            .files
            .insert(path.to_string(), contents.into());
        connector
    }

    /// Makes every operation on `path` or below it fail with `PermissionDenied`
    pub fn deny(&self, path: &str) {
        self.state().denied.insert(path.to_string());
    }

    /// Makes reads of `path` fail after the first chunk
    pub fn break_reads(&self, path: &str) {
        self.state().broken_reads.insert(path.to_string());
    }

    /// Makes [`Connector::connect`] fail with an authentication error
    pub fn refuse_connections(&self, refuse: bool) {
        self.state().refuse_connections = refuse;
    }

    /// Delays every connect and channel call by `latency`
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.state().latency = latency;
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.state().files.get(path).cloned()
    }

    pub fn is_directory(&self, path: &str) -> bool {
        self.state().directories.contains(path)
    }

    pub fn is_file(&self, path: &str) -> bool {
        self.state().files.contains_key(path)
    }

    /// Number of successful connects so far
    pub fn connections(&self) -> usize {
        self.state().connections
    }

    /// Number of channels opened and not yet closed
    pub fn open_channels(&self) -> usize {
        self.state().open_channels
    }

    async fn pause(&self) {
        let latency = self.state().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    type Channel = MemoryChannel;

    async fn connect(&self, config: &ConnectionConfig) -> Result<MemoryChannel, TransportError> {
        self.pause().await;
        let mut state = self.state();
        if state.refuse_connections {
            return Err(TransportError::new(
                TransportErrorKind::Authentication,
                format!("{}@{} rejected", config.username(), config.address()),
            ));
        }
        state.connections += 1;
        state.open_channels += 1;
        Ok(MemoryChannel {
            connector: self.clone(),
            cwd: "/".to_string(),
            closed: false,
        })
    }
}

/// Channel handed out by [`MemoryConnector`]
#[derive(Debug)]
pub struct MemoryChannel {
    connector: MemoryConnector,
    cwd: String,
    closed: bool,
}

impl MemoryChannel {
    async fn enter(&self, path: &str) -> Result<String, TransportError> {
        if self.closed {
            return Err(TransportError::closed());
        }
        self.connector.pause().await;
        Ok(resolve_path(&self.cwd, path))
    }
}

#[async_trait]
impl FileChannel for MemoryChannel {
    fn working_directory(&self) -> &str {
        &self.cwd
    }

    async fn change_directory(&mut self, path: &str) -> Result<(), TransportError> {
        let target = self.enter(path).await?;
        {
            let state = self.connector.state();
            state.check_access(&target)?;
            if state.files.contains_key(&target) {
                return Err(TransportError::new(
                    TransportErrorKind::Other,
                    format!("{target} is not a directory"),
                ));
            }
            if !state.directories.contains(&target) {
                return Err(TransportError::not_found(&target));
            }
        }
        self.cwd = target;
        Ok(())
    }

    async fn make_directory(&mut self, path: &str) -> Result<(), TransportError> {
        let target = self.enter(path).await?;
        let mut state = self.connector.state();
        state.check_access(&target)?;
        if state.exists(&target) {
            return Err(TransportError::new(
                TransportErrorKind::Other,
                format!("{target} already exists"),
            ));
        }
        state.require_parent(&target)?;
        state.directories.insert(target);
        Ok(())
    }

    async fn put(&mut self, path: &str) -> Result<RemoteWriter, TransportError> {
        let target = self.enter(path).await?;
        let mut state = self.connector.state();
        state.check_access(&target)?;
        state.require_parent(&target)?;
        if state.directories.contains(&target) {
            return Err(TransportError::new(
                TransportErrorKind::Other,
                format!("{target} is a directory"),
            ));
        }
        state.files.insert(target.clone(), Vec::new());
        Ok(Box::new(MemoryWriter {
            connector: self.connector.clone(),
            path: target,
        }))
    }

    async fn get(&mut self, path: &str) -> Result<RemoteReader, TransportError> {
        let target = self.enter(path).await?;
        let state = self.connector.state();
        state.check_access(&target)?;
        let contents = state
            .files
            .get(&target)
            .cloned()
            .ok_or_else(|| TransportError::not_found(&target))?;
        if state.broken_reads.contains(&target) {
            return Ok(Box::new(BrokenReader {
                first_chunk: Some(contents),
            }));
        }
        Ok(Box::new(io::Cursor::new(contents)))
    }

    async fn remove(&mut self, path: &str) -> Result<(), TransportError> {
        let target = self.enter(path).await?;
        let mut state = self.connector.state();
        state.check_access(&target)?;
        state
            .files
            .remove(&target)
            .map(|_| ())
            .ok_or_else(|| TransportError::not_found(&target))
    }

    async fn rename(&mut self, from: &str, to: &str) -> Result<(), TransportError> {
        let source = self.enter(from).await?;
        let target = resolve_path(&self.cwd, to);
        let mut state = self.connector.state();
        state.check_access(&source)?;
        state.check_access(&target)?;
        if !state.exists(&source) {
            return Err(TransportError::not_found(&source));
        }
        state.require_parent(&target)?;
        if state.exists(&target) {
            return Err(TransportError::new(
                TransportErrorKind::Other,
                format!("{target} already exists"),
            ));
        }

        if let Some(contents) = state.files.remove(&source) {
            state.files.insert(target, contents);
            return Ok(());
        }

        // Directory move: carry every descendant along.
        let prefix = format!("{source}/");
        let moved_dirs: Vec<String> = state
            .directories
            .iter()
            .filter(|p| **p == source || p.starts_with(&prefix))
            .cloned()
            .collect();
        for dir in moved_dirs {
            state.directories.remove(&dir);
            state.directories.insert(format!("{target}{}", &dir[source.len()..]));
        }
        let moved_files: Vec<String> = state
            .files
            .keys()
            .filter(|p| p.starts_with(&prefix))
            .cloned()
            .collect();
        for file in moved_files {
            if let Some(contents) = state.files.remove(&file) {
                state.files.insert(format!("{target}{}", &file[source.len()..]), contents);
            }
        }
        Ok(())
    }

    async fn list(&mut self, path: &str) -> Result<Vec<RemoteEntry>, TransportError> {
        let target = self.enter(path).await?;
        let state = self.connector.state();
        state.check_access(&target)?;
        if state.directories.contains(&target) {
            return Ok(state.children(&target));
        }
        if state.files.contains_key(&target) {
            return Ok(vec![RemoteEntry {
                filename: file_name(&target).to_string(),
                is_directory: false,
            }]);
        }
        Err(TransportError::not_found(&target))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if !self.closed {
            self.closed = true;
            self.connector.state().open_channels -= 1;
        }
        Ok(())
    }
}

/// Appends straight into the shared tree so a failed transfer leaves
/// exactly the bytes that made it across.
struct MemoryWriter {
    connector: MemoryConnector,
    path: String,
}

impl AsyncWrite for MemoryWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let mut state = self.connector.state();
        if let Err(e) = state.check_access(&self.path) {
            return Poll::Ready(Err(io::Error::new(io::ErrorKind::PermissionDenied, e)));
        }
        state
            .files
            .entry(self.path.clone())
            .or_default()
            .extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Yields one chunk, then fails as if the connection dropped
struct BrokenReader {
    first_chunk: Option<Vec<u8>>,
}

impl AsyncRead for BrokenReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.first_chunk.take() {
            Some(chunk) => {
                let len = chunk.len().min(buf.remaining());
                buf.put_slice(&chunk[..len]);
                Poll::Ready(Ok(()))
            }
            None => Poll::Ready(Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection lost mid-transfer",
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn config() -> ConnectionConfig {
        ConnectionConfig::new("memory", 22, "tester", "secret")
    }

    #[tokio::test]
    async fn connect_counts_and_close_releases() {
        let connector = MemoryConnector::new();
        let mut channel = connector.connect(&config()).await.unwrap();
        assert_eq!(connector.open_channels(), 1);
        channel.close().await.unwrap();
        channel.close().await.unwrap();
        assert_eq!(connector.open_channels(), 0);
        assert_eq!(connector.connections(), 1);
    }

    #[tokio::test]
    async fn refused_connection_is_an_authentication_error() {
        let connector = MemoryConnector::new();
        connector.refuse_connections(true);
        let err = connector.connect(&config()).await.unwrap_err();
        assert_eq!(err.kind(), TransportErrorKind::Authentication);
        assert_eq!(connector.open_channels(), 0);
    }

    #[tokio::test]
    async fn cd_resolves_relative_paths() {
        let connector = MemoryConnector::new().with_directory("/srv/data");
        let mut channel = connector.connect(&config()).await.unwrap();
        channel.change_directory("srv").await.unwrap();
        channel.change_directory("data").await.unwrap();
        assert_eq!(channel.working_directory(), "/srv/data");
        channel.change_directory("..").await.unwrap();
        assert_eq!(channel.working_directory(), "/srv");
        let err = channel.change_directory("missing").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(channel.working_directory(), "/srv");
    }

    #[tokio::test]
    async fn mkdir_requires_parent_and_rejects_existing() {
        let connector = MemoryConnector::new();
        let mut channel = connector.connect(&config()).await.unwrap();
        assert!(channel.make_directory("/a/b").await.unwrap_err().is_not_found());
        channel.make_directory("/a").await.unwrap();
        let err = channel.make_directory("/a").await.unwrap_err();
        assert_eq!(err.kind(), TransportErrorKind::Other);
    }

    #[tokio::test]
    async fn put_then_get_streams_bytes() {
        let connector = MemoryConnector::new().with_directory("/in");
        let mut channel = connector.connect(&config()).await.unwrap();
        let mut writer = channel.put("/in/a.txt").await.unwrap();
        writer.write_all(b"hello ").await.unwrap();
        writer.write_all(b"world").await.unwrap();
        writer.shutdown().await.unwrap();

        let mut reader = channel.get("/in/a.txt").await.unwrap();
        let mut contents = String::new();
        reader.read_to_string(&mut contents).await.unwrap();
        assert_eq!(contents, "hello world");
    }

    #[tokio::test]
    async fn denied_paths_report_permission_denied() {
        let connector = MemoryConnector::new().with_file("/secret/key", "x");
        connector.deny("/secret");
        let mut channel = connector.connect(&config()).await.unwrap();
        let err = channel.list("/secret/key").await.unwrap_err();
        assert_eq!(err.kind(), TransportErrorKind::PermissionDenied);
        let err = channel.list("/secret").await.unwrap_err();
        assert_eq!(err.kind(), TransportErrorKind::PermissionDenied);
    }

    #[tokio::test]
    async fn list_returns_sorted_children_and_single_files() {
        let connector = MemoryConnector::new()
            .with_file("/d/b.txt", "b")
            .with_file("/d/a.txt", "a")
            .with_directory("/d/sub")
            .with_file("/d/sub/deep.txt", "deep");
        let mut channel = connector.connect(&config()).await.unwrap();
        let names: Vec<String> = channel
            .list("/d")
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.filename)
            .collect();
        assert_eq!(names, vec!["a.txt", "b.txt", "sub"]);

        let single = channel.list("/d/a.txt").await.unwrap();
        assert_eq!(single.len(), 1);
        assert!(!single[0].is_directory);
    }

    #[tokio::test]
    async fn rename_moves_directories_with_children() {
        let connector = MemoryConnector::new().with_file("/old/x/y.txt", "y");
        let mut channel = connector.connect(&config()).await.unwrap();
        channel.rename("/old", "/new").await.unwrap();
        assert!(connector.is_directory("/new/x"));
        assert_eq!(connector.file("/new/x/y.txt").as_deref(), Some(&b"y"[..]));
        assert!(!connector.is_directory("/old"));
    }

    #[tokio::test]
    async fn broken_reads_fail_after_first_chunk() {
        let connector = MemoryConnector::new().with_file("/f", "partial");
        connector.break_reads("/f");
        let mut channel = connector.connect(&config()).await.unwrap();
        let mut reader = channel.get("/f").await.unwrap();
        let mut buffer = Vec::new();
        let err = reader.read_to_end(&mut buffer).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
    }

    #[tokio::test]
    async fn closed_channel_rejects_calls() {
        let connector = MemoryConnector::new();
        let mut channel = connector.connect(&config()).await.unwrap();
        channel.close().await.unwrap();
        let err = channel.list("/").await.unwrap_err();
        assert_eq!(err.kind(), TransportErrorKind::Closed);
    }
}
