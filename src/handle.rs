use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::ConnectionConfig;
use crate::transport::{FileChannel, RemoteEntry, RemoteReader, RemoteWriter, TransportError};

/// A live session + channel pair, valid for one logical operation.
///
/// Every call made through the handle is bounded by the configured
/// operation timeout. Once [`Handle::disconnect`] has run, calls fail with a
/// `Closed` transport error.
pub struct Handle<Ch: FileChannel> {
    channel: Option<Ch>,
    operation_timeout: Duration,
    io_size: usize,
    address: String,
}

impl<Ch: FileChannel> std::fmt::Debug for Handle<Ch> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle")
            .field("address", &self.address)
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}

impl<Ch: FileChannel> Handle<Ch> {
    pub(crate) fn new(channel: Ch, config: &ConnectionConfig) -> Self {
        Self {
            channel: Some(channel),
            operation_timeout: config.operation_timeout(),
            io_size: config.io_size(),
            address: config.address(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.channel.is_some()
    }

    /// Chunk size for streaming transfers
    pub fn io_size(&self) -> usize {
        self.io_size
    }

    pub fn working_directory(&self) -> Option<&str> {
        self.channel.as_ref().map(|channel| channel.working_directory())
    }

    /// Closes the channel and its session.
    ///
    /// Safe to call any number of times. A teardown failure is logged and
    /// dropped so it never masks the outcome of the operation itself.
    pub async fn disconnect(&mut self) {
        let Some(mut channel) = self.channel.take() else {
            return;
        };
        match timed(self.operation_timeout, "disconnect", channel.close()).await {
            Ok(()) => debug!("Disconnected from {}", self.address),
            Err(e) => warn!("Ignoring error while disconnecting from {}: {}", self.address, e),
        }
    }

    /// Limit applied to each channel step
    pub fn operation_timeout(&self) -> Duration {
        self.operation_timeout
    }

    fn channel(&mut self) -> Result<(&mut Ch, Duration), TransportError> {
        let timeout = self.operation_timeout;
        let channel = self.channel.as_mut().ok_or_else(TransportError::closed)?;
        Ok((channel, timeout))
    }

    pub async fn change_directory(&mut self, path: &str) -> Result<(), TransportError> {
        let (channel, timeout) = self.channel()?;
        timed(timeout, "cd", channel.change_directory(path)).await
    }

    pub async fn make_directory(&mut self, path: &str) -> Result<(), TransportError> {
        let (channel, timeout) = self.channel()?;
        timed(timeout, "mkdir", channel.make_directory(path)).await
    }

    pub async fn put(&mut self, path: &str) -> Result<RemoteWriter, TransportError> {
        let (channel, timeout) = self.channel()?;
        timed(timeout, "put", channel.put(path)).await
    }

    pub async fn get(&mut self, path: &str) -> Result<RemoteReader, TransportError> {
        let (channel, timeout) = self.channel()?;
        timed(timeout, "get", channel.get(path)).await
    }

    pub async fn remove(&mut self, path: &str) -> Result<(), TransportError> {
        let (channel, timeout) = self.channel()?;
        timed(timeout, "rm", channel.remove(path)).await
    }

    pub async fn rename(&mut self, from: &str, to: &str) -> Result<(), TransportError> {
        let (channel, timeout) = self.channel()?;
        timed(timeout, "rename", channel.rename(from, to)).await
    }

    pub async fn list(&mut self, path: &str) -> Result<Vec<RemoteEntry>, TransportError> {
        let (channel, timeout) = self.channel()?;
        timed(timeout, "ls", channel.list(path)).await
    }
}

impl<Ch: FileChannel> Drop for Handle<Ch> {
    fn drop(&mut self) {
        if self.channel.is_some() {
            warn!("Handle to {} dropped without disconnect", self.address);
        }
    }
}

/// Runs `fut`, failing with a `Timeout` transport error after `timeout`
pub(crate) async fn timed<T, E>(
    timeout: Duration,
    step: &str,
    fut: impl Future<Output = Result<T, E>>,
) -> Result<T, TransportError>
where
    E: Into<TransportError>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => Err(TransportError::timed_out(step, timeout)),
    }
}
