use tracing::info;

use crate::error::RemoteFileError;
use crate::handle::Handle;
use crate::transport::FileChannel;
use crate::utils::parent_directory;

/// Removes one remote file.
///
/// Enters the parent directory first so a missing directory is reported
/// separately from a missing file.
pub(crate) async fn rm<Ch: FileChannel>(
    handle: &mut Handle<Ch>,
    remote_path: &str,
) -> Result<(), RemoteFileError> {
    let directory = parent_directory(remote_path);
    handle
        .change_directory(directory)
        .await
        .map_err(|source| RemoteFileError::PathNotFound {
            path: directory.to_string(),
            source,
        })?;

    handle
        .remove(remote_path)
        .await
        .map_err(|source| RemoteFileError::Delete {
            path: remote_path.to_string(),
            source,
        })?;
    info!("Remote file deleted: {:?}", remote_path);
    Ok(())
}
