use bytes::{Bytes, BytesMut};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{error, info, warn};

use crate::error::RemoteFileError;
use crate::handle::{Handle, timed};
use crate::transport::{FileChannel, RemoteReader, TransportError, TransportErrorKind};
use crate::utils::file_name;

/// Where a chunked copy broke
enum CopyError {
    Remote(TransportError),
    Local(std::io::Error),
}

/// Downloads `remote_path` into `local_directory/<basename>`.
///
/// This function:
/// 1. Creates the local directory (and its parents) when missing
/// 2. Streams the remote file into a hidden `.<name>.<random>.part` sibling,
///    unique per call so parallel downloads of one file never share it
/// 3. Renames the part file onto the final name once every byte is flushed
///
/// On any failure the part file is removed, so a file under the final name
/// is always complete.
///
/// # Returns
///
/// The local path written and the number of bytes copied.
///
/// # Errors
///
/// - `Download` if the remote file cannot be opened or read
/// - `LocalWrite` if the local directory or file cannot be created or written
pub(crate) async fn get<Ch: FileChannel>(
    handle: &mut Handle<Ch>,
    remote_path: &str,
    local_directory: &Path,
) -> Result<(PathBuf, u64), RemoteFileError> {
    let download_time = Instant::now();
    let download_error = |source: TransportError| RemoteFileError::Download {
        path: remote_path.to_string(),
        source,
    };

    let name = file_name(remote_path);
    if name.is_empty() || name == "." || name == ".." {
        return Err(download_error(TransportError::new(
            TransportErrorKind::Other,
            format!("{remote_path} does not name a file"),
        )));
    }

    fs::create_dir_all(local_directory)
        .await
        .map_err(|source| RemoteFileError::LocalWrite {
            path: local_directory.to_path_buf(),
            source,
        })?;
    let local_path = local_directory.join(name);

    let mut remote_file = handle.get(remote_path).await.map_err(download_error)?;
    info!("Remote file opened: {:?}", remote_path);

    let part = tempfile::Builder::new()
        .prefix(&format!(".{name}."))
        .suffix(".part")
        .tempfile_in(local_directory)
        .map_err(|source| RemoteFileError::LocalWrite {
            path: local_directory.to_path_buf(),
            source,
        })?;
    let (part_file, part_path) = part.into_parts();
    let mut local_file = fs::File::from_std(part_file);

    let copied = copy_chunks(
        &mut remote_file,
        &mut local_file,
        handle.io_size(),
        handle.operation_timeout(),
    )
    .await;
    drop(local_file);

    let outcome = copied.map_err(|e| match e {
        CopyError::Remote(source) => download_error(source),
        CopyError::Local(source) => RemoteFileError::LocalWrite {
            path: part_path.to_path_buf(),
            source,
        },
    });

    match outcome {
        Ok(bytes) => {
            part_path
                .persist(&local_path)
                .map_err(|e| RemoteFileError::LocalWrite {
                    path: local_path.clone(),
                    source: e.error,
                })?;
            info!(
                "File {:?} downloaded to {:?}. Time taken {:?}",
                remote_path,
                local_path,
                download_time.elapsed()
            );
            Ok((local_path, bytes))
        }
        Err(e) => {
            error!("Download of {:?} failed: {}", remote_path, e);
            let leftover = part_path.to_path_buf();
            if let Err(cleanup) = part_path.close() {
                warn!("Could not remove partial file {:?}: {}", leftover, cleanup);
            }
            Err(e)
        }
    }
}

/// Reads all of `remote_path` into memory
pub(crate) async fn read_to_bytes<Ch: FileChannel>(
    handle: &mut Handle<Ch>,
    remote_path: &str,
) -> Result<Bytes, RemoteFileError> {
    let download_error = |source: TransportError| RemoteFileError::Download {
        path: remote_path.to_string(),
        source,
    };
    let mut remote_file = handle.get(remote_path).await.map_err(download_error)?;
    let timeout = handle.operation_timeout();
    let mut contents = BytesMut::new();
    let mut chunk = vec![0u8; handle.io_size()];
    loop {
        let bytes_read = timed(timeout, "read", remote_file.read(&mut chunk))
            .await
            .map_err(download_error)?;
        if bytes_read == 0 {
            break;
        }
        contents.extend_from_slice(&chunk[..bytes_read]);
    }
    Ok(contents.freeze())
}

async fn copy_chunks(
    remote_file: &mut RemoteReader,
    local_file: &mut fs::File,
    io_size: usize,
    timeout: Duration,
) -> Result<u64, CopyError> {
    let mut buffer = vec![0u8; io_size];
    let mut copied: u64 = 0;
    loop {
        let bytes_read = timed(timeout, "read", remote_file.read(&mut buffer))
            .await
            .map_err(CopyError::Remote)?;
        if bytes_read == 0 {
            break;
        }
        local_file
            .write_all(&buffer[..bytes_read])
            .await
            .map_err(CopyError::Local)?;
        copied += bytes_read as u64;
    }
    local_file.flush().await.map_err(CopyError::Local)?;
    local_file.sync_all().await.map_err(CopyError::Local)?;
    Ok(copied)
}
