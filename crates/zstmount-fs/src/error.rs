use thiserror::Error;

/// Errors surfaced by the virtual file view.
#[derive(Debug, Error)]
pub enum FsError {
    /// The name does not exist in the mount.
    #[error("no such entry: {0}")]
    NotFound(String),

    /// A directory operation was applied to the file.
    #[error("not a directory")]
    NotDirectory,

    /// A file operation was applied to the root directory.
    #[error("is a directory")]
    IsDirectory,

    /// The operation would modify the read-only mount.
    #[error("read-only filesystem: {0} rejected")]
    ReadOnly(&'static str),

    /// The operation is not implemented by this filesystem.
    #[error("operation not supported: {0}")]
    NotSupported(&'static str),

    /// The mount configuration cannot be used.
    #[error("invalid mount configuration: {0}")]
    InvalidConfig(String),

    /// Probing or decoding the compressed source failed.
    #[error(transparent)]
    Decode(#[from] zstmount_decode::Error),
}

impl FsError {
    /// The errno reported to the kernel for this error.
    ///
    /// Decode failures become `EIO` so a failed read is never mistaken for
    /// end-of-file.
    pub fn errno(&self) -> i32 {
        match self {
            FsError::NotFound(_) => libc::ENOENT,
            FsError::NotDirectory => libc::ENOTDIR,
            FsError::IsDirectory => libc::EISDIR,
            FsError::ReadOnly(_) => libc::EROFS,
            FsError::NotSupported(_) => libc::ENOSYS,
            FsError::InvalidConfig(_) => libc::EINVAL,
            FsError::Decode(zstmount_decode::Error::OutOfRange { .. }) => libc::EINVAL,
            FsError::Decode(_) => libc::EIO,
        }
    }
}

/// Result type for view operations.
pub type Result<T> = std::result::Result<T, FsError>;
