use tracing::info;

use crate::error::RemoteFileError;
use crate::handle::Handle;
use crate::operations::directory::ensure_directory;
use crate::transport::FileChannel;

/// Lists the file names in a remote directory
///
/// A directory that cannot be entered is treated as missing: it is created
/// and an empty list is returned. Directories are left out of the result and
/// `predicate`, when given, filters the remaining names.
///
/// Names come back in whatever order the server sends them.
///
/// # Errors
///
/// - `DirectoryCreation` when the missing directory cannot be created
/// - `List` when the directory exists but cannot be listed
pub(crate) async fn ls<Ch, P>(
    handle: &mut Handle<Ch>,
    remote_dir: &str,
    predicate: Option<P>,
) -> Result<Vec<String>, RemoteFileError>
where
    Ch: FileChannel,
    P: Fn(&str) -> bool,
{
    if handle.change_directory(remote_dir).await.is_err() {
        info!("Remote directory {:?} missing, creating it", remote_dir);
        ensure_directory(handle, remote_dir).await?;
        return Ok(Vec::new());
    }

    let entries = handle
        .list(remote_dir)
        .await
        .map_err(|source| RemoteFileError::List {
            path: remote_dir.to_string(),
            source,
        })?;

    let file_list: Vec<String> = entries
        .into_iter()
        .filter(|entry| !entry.is_directory)
        .map(|entry| entry.filename)
        .filter(|name| predicate.as_ref().is_none_or(|matches| matches(name.as_str())))
        .collect();
    info!("Found {} files in {:?}", file_list.len(), remote_dir);
    Ok(file_list)
}
