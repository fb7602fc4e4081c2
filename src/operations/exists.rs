use crate::error::RemoteFileError;
use crate::handle::Handle;
use crate::transport::FileChannel;

/// Reports whether `remote_path` exists.
///
/// Only an explicit "not found" from the server means `false`. Any other
/// failure, such as a permission error or a timeout, is returned as `Check`
/// instead of being read as absence.
pub(crate) async fn exists<Ch: FileChannel>(
    handle: &mut Handle<Ch>,
    remote_path: &str,
) -> Result<bool, RemoteFileError> {
    match handle.list(remote_path).await {
        Ok(_) => Ok(true),
        Err(e) if e.is_not_found() => Ok(false),
        Err(source) => Err(RemoteFileError::Check {
            path: remote_path.to_string(),
            source,
        }),
    }
}
