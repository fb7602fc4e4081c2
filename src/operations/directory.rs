use tracing::debug;

use crate::error::RemoteFileError;
use crate::handle::Handle;
use crate::transport::FileChannel;
use crate::utils::join_path;

/// Makes sure `path` exists as a remote directory, creating missing levels.
///
/// Tries to `cd` into the full path first. On failure it walks the path from
/// the root one component at a time: each prefix is entered if it exists and
/// created then entered otherwise. A prefix that already exists is never an
/// error, so running this twice leaves the same tree and working directory.
///
/// Relative paths are anchored at the channel's working directory.
pub(crate) async fn ensure_directory<Ch: FileChannel>(
    handle: &mut Handle<Ch>,
    path: &str,
) -> Result<(), RemoteFileError> {
    let absolute = if path.starts_with('/') {
        path.to_string()
    } else {
        join_path(handle.working_directory().unwrap_or("/"), path)
    };

    if handle.change_directory(&absolute).await.is_ok() {
        return Ok(());
    }

    let mut prefix = String::new();
    for component in absolute.split('/').filter(|c| !c.is_empty()) {
        prefix.push('/');
        prefix.push_str(component);

        if handle.change_directory(&prefix).await.is_ok() {
            continue;
        }
        debug!("Creating remote directory {:?}", prefix);
        let created = match handle.make_directory(&prefix).await {
            Ok(()) => handle.change_directory(&prefix).await,
            // another caller may have created it since the cd above
            Err(e) => match handle.change_directory(&prefix).await {
                Ok(()) => {
                    debug!("Remote directory {:?} appeared concurrently", prefix);
                    Ok(())
                }
                Err(_) => Err(e),
            },
        };
        created.map_err(|source| RemoteFileError::DirectoryCreation {
            path: prefix.clone(),
            source,
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectionConfig;
    use crate::memory::MemoryConnector;
    use crate::transport::Connector;

    async fn open(connector: &MemoryConnector) -> Handle<crate::memory::MemoryChannel> {
        let config = ConnectionConfig::new("memory", 22, "tester", "secret");
        let channel = connector.connect(&config).await.unwrap();
        Handle::new(channel, &config)
    }

    #[tokio::test]
    async fn creates_every_missing_level() {
        let connector = MemoryConnector::new().with_directory("/a");
        let mut handle = open(&connector).await;
        ensure_directory(&mut handle, "/a/b/c").await.unwrap();
        assert!(connector.is_directory("/a/b"));
        assert!(connector.is_directory("/a/b/c"));
        assert_eq!(handle.working_directory(), Some("/a/b/c"));
        handle.disconnect().await;
    }

    #[tokio::test]
    async fn second_call_is_a_no_op() {
        let connector = MemoryConnector::new();
        let mut handle = open(&connector).await;
        ensure_directory(&mut handle, "/x/y").await.unwrap();
        let first = handle.working_directory().map(str::to_string);
        ensure_directory(&mut handle, "/x/y").await.unwrap();
        assert_eq!(handle.working_directory().map(str::to_string), first);
        handle.disconnect().await;
    }

    #[tokio::test]
    async fn relative_paths_hang_off_the_working_directory() {
        let connector = MemoryConnector::new().with_directory("/home/app");
        let mut handle = open(&connector).await;
        handle.change_directory("/home/app").await.unwrap();
        ensure_directory(&mut handle, "out/today").await.unwrap();
        assert!(connector.is_directory("/home/app/out/today"));
        handle.disconnect().await;
    }

    #[tokio::test(start_paused = true)]
    async fn racing_callers_both_end_up_in_the_directory() {
        let connector = MemoryConnector::new();
        connector.set_latency(Some(std::time::Duration::from_millis(5)));
        let mut first = open(&connector).await;
        let mut second = open(&connector).await;

        let (a, b) = tokio::join!(
            ensure_directory(&mut first, "/shared/new"),
            ensure_directory(&mut second, "/shared/new"),
        );
        a.unwrap();
        b.unwrap();

        assert!(connector.is_directory("/shared/new"));
        assert_eq!(first.working_directory(), Some("/shared/new"));
        assert_eq!(second.working_directory(), Some("/shared/new"));
        first.disconnect().await;
        second.disconnect().await;
    }

    #[tokio::test]
    async fn denied_level_fails_with_directory_creation() {
        let connector = MemoryConnector::new().with_directory("/locked");
        connector.deny("/locked");
        let mut handle = open(&connector).await;
        let err = ensure_directory(&mut handle, "/locked/inner").await.unwrap_err();
        assert!(matches!(err, RemoteFileError::DirectoryCreation { ref path, .. } if path == "/locked"));
        handle.disconnect().await;
    }
}
