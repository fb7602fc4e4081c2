use std::path::Path;
use std::time::{Duration, Instant};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::error::RemoteFileError;
use crate::handle::{Handle, timed};
use crate::operations::directory::ensure_directory;
use crate::transport::{FileChannel, RemoteWriter, TransportError};
use crate::types::UploadSource;
use crate::utils::parent_directory;

/// Upload source opened and ready to stream
pub(crate) type SourceReader = Box<dyn AsyncRead + Send + Unpin>;

/// Opens the upload source.
///
/// Runs before any connection is made so a missing local file never costs a
/// session.
pub(crate) async fn open_source(source: UploadSource) -> Result<SourceReader, RemoteFileError> {
    match source {
        UploadSource::File(path) => match open_regular_file(&path).await {
            Ok(file) => {
                info!("Local file opened: {:?}", path);
                Ok(Box::new(file))
            }
            Err(source) => Err(RemoteFileError::SourceNotFound { path, source }),
        },
        UploadSource::Bytes(bytes) => Ok(Box::new(std::io::Cursor::new(bytes))),
        UploadSource::Stream(stream) => Ok(stream),
    }
}

async fn open_regular_file(path: &Path) -> std::io::Result<fs::File> {
    let file = fs::File::open(path).await?;
    if !file.metadata().await?.is_file() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "not a regular file",
        ));
    }
    Ok(file)
}

/// Writes `source` to `remote_path`, creating the remote directory first.
///
/// The destination directory is everything before the last `/` of
/// `remote_path`. Data is streamed in `io_size` chunks; each remote write is
/// bounded by the operation timeout. When the transfer breaks after the
/// remote file was created, the partial file is removed on a best-effort
/// basis.
///
/// # Returns
///
/// The number of bytes written.
///
/// # Errors
///
/// - `DirectoryCreation` if the destination directory cannot be created
/// - `Upload` if the remote file cannot be created or written, or the source
///   stream fails mid-way
pub(crate) async fn put<Ch: FileChannel>(
    handle: &mut Handle<Ch>,
    mut source: SourceReader,
    remote_path: &str,
) -> Result<u64, RemoteFileError> {
    let upload_time = Instant::now();
    let remote_directory = parent_directory(remote_path);
    debug!("Remote directory {:?}", remote_directory);
    ensure_directory(handle, remote_directory).await?;

    let upload_error = |source: TransportError| RemoteFileError::Upload {
        path: remote_path.to_string(),
        source,
    };

    let mut remote_file = handle.put(remote_path).await.map_err(upload_error)?;
    info!("Remote file created path: {:?}", remote_path);

    let outcome = stream_to_remote(
        &mut source,
        &mut remote_file,
        handle.io_size(),
        handle.operation_timeout(),
    )
    .await;

    let transferred = match outcome {
        Ok(transferred) => transferred,
        Err(e) => {
            drop(remote_file);
            if let Err(cleanup) = handle.remove(remote_path).await {
                warn!("Could not remove partial upload {:?}: {}", remote_path, cleanup);
            }
            return Err(upload_error(e));
        }
    };

    info!(
        "File {:?} uploaded ({} bytes). Time taken {:?}",
        remote_path,
        transferred,
        upload_time.elapsed()
    );
    Ok(transferred)
}

async fn stream_to_remote(
    source: &mut SourceReader,
    remote_file: &mut RemoteWriter,
    io_size: usize,
    timeout: Duration,
) -> Result<u64, TransportError> {
    let mut buffer = vec![0u8; io_size];
    let mut transferred: u64 = 0;
    loop {
        let bytes_read = source.read(&mut buffer).await?;
        if bytes_read == 0 {
            break;
        }
        timed(timeout, "write", remote_file.write_all(&buffer[..bytes_read])).await?;
        transferred += bytes_read as u64;
    }
    timed(timeout, "close remote file", remote_file.shutdown()).await?;
    Ok(transferred)
}
