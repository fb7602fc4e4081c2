/// Module for deleting remote files
pub(crate) mod delete;

/// Module for creating remote directory trees
pub(crate) mod directory;

/// Module for downloading files from remote server
pub(crate) mod download;

/// Module for existence checks
pub(crate) mod exists;

/// Module for listing remote directory contents
pub(crate) mod list;

/// Module for moving remote files
pub(crate) mod rename;

/// Module for uploading files to remote server
pub(crate) mod upload;
