use tracing::info;

use crate::error::RemoteFileError;
use crate::handle::Handle;
use crate::operations::directory::ensure_directory;
use crate::transport::FileChannel;
use crate::utils::parent_directory;

/// Moves `from` to `to`, creating the destination directory when needed.
///
/// The move itself is a single server-side rename, so a failure leaves the
/// source untouched.
pub(crate) async fn mv<Ch: FileChannel>(
    handle: &mut Handle<Ch>,
    from: &str,
    to: &str,
) -> Result<(), RemoteFileError> {
    ensure_directory(handle, parent_directory(to)).await?;
    handle
        .rename(from, to)
        .await
        .map_err(|source| RemoteFileError::Rename {
            from: from.to_string(),
            to: to.to_string(),
            source,
        })?;
    info!("Remote file moved: {:?} -> {:?}", from, to);
    Ok(())
}
