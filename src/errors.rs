use thiserror_no_std::Error;

#[cfg(feature = "std")]
use crate::format::Format;
#[cfg(feature = "std")]
use std::{io::Error as IoError, path::PathBuf};

/// Errors raised while interpreting an in-memory boot image.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("No supported boot image magic found.")]
    UnknownContainer,
    #[error("Image truncated: needed {needed} bytes, only {available} available.")]
    Truncated { needed: usize, available: usize },
    #[error("No Page Size specified.")]
    NoPageSize,
}

/// Errors raised by the file level operations (unpack, repack, split).
#[cfg(feature = "std")]
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error on '{}'.", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: IoError,
    },
    #[error("Bad boot image.")]
    Parse(#[from] ParseError),
    #[error("Failed to process {format} data.")]
    Codec {
        format: Format,
        #[source]
        source: IoError,
    },
    #[error("No codec available for {0} data.")]
    UnsupportedCodec(Format),
}

#[cfg(feature = "std")]
impl Error {
    pub(crate) fn io<P: Into<PathBuf>>(path: P) -> impl FnOnce(IoError) -> Self {
        let path = path.into();
        move |source| Error::Io { path, source }
    }
}

#[cfg(feature = "std")]
pub type Result<T, E = Error> = core::result::Result<T, E>;
