use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// The status of a failed trajectory operation, without its payload.
///
/// Useful when only the kind of failure matters, for instance when mapping errors onto the numeric
/// status codes other tools expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    AtomNumberMismatch,
    BadFormat,
    BadRead,
    BadSeek,
    BadWrite,
    FileAccessFailure,
    InvalidDataObject,
    InvalidFrameIndex,
    OpenFailed,
    OutOfMemory,
}

/// Errors that can occur while reading or writing a DCD trajectory.
#[derive(Error, Debug)]
pub enum DcdError {
    /// The number of atoms in a [`Frame`](crate::Frame) does not match the trajectory.
    #[error("atom count mismatch: trajectory has {expected} atoms, frame has {found}")]
    AtomNumberMismatch { expected: usize, found: usize },

    /// The bytes do not describe a valid DCD file.
    #[error("bad format: {0}")]
    BadFormat(String),

    /// A read came up short or failed.
    #[error("bad read: {0}")]
    BadRead(#[source] io::Error),

    /// Repositioning the stream failed.
    #[error("bad seek: {0}")]
    BadSeek(#[source] io::Error),

    /// A write failed. The file should be considered corrupt from here on.
    #[error("bad write: {0}")]
    BadWrite(#[source] io::Error),

    /// The file could not be inspected (e.g., its size could not be determined).
    #[error("file access failure: {0}")]
    FileAccessFailure(#[source] io::Error),

    /// A frame lacks data the trajectory requires, or carries invalid data.
    #[error("invalid data object: {0}")]
    InvalidDataObject(String),

    /// A frame index lies outside of the trajectory.
    #[error("invalid frame index {index} for a trajectory of {n_frames} frames")]
    InvalidFrameIndex { index: usize, n_frames: usize },

    /// The file could not be opened.
    #[error("could not open '{}': {source}", path.display())]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A scratch buffer could not be allocated.
    #[error("out of memory while allocating {bytes} bytes")]
    OutOfMemory { bytes: usize },
}

impl DcdError {
    /// Returns the [`Status`] of this error.
    pub fn kind(&self) -> Status {
        match self {
            DcdError::AtomNumberMismatch { .. } => Status::AtomNumberMismatch,
            DcdError::BadFormat(_) => Status::BadFormat,
            DcdError::BadRead(_) => Status::BadRead,
            DcdError::BadSeek(_) => Status::BadSeek,
            DcdError::BadWrite(_) => Status::BadWrite,
            DcdError::FileAccessFailure(_) => Status::FileAccessFailure,
            DcdError::InvalidDataObject(_) => Status::InvalidDataObject,
            DcdError::InvalidFrameIndex { .. } => Status::InvalidFrameIndex,
            DcdError::OpenFailed { .. } => Status::OpenFailed,
            DcdError::OutOfMemory { .. } => Status::OutOfMemory,
        }
    }

    pub(crate) fn bad_format(msg: impl Into<String>) -> Self {
        DcdError::BadFormat(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, DcdError>;

/// Allocate a zeroed byte buffer of `len` bytes, reporting allocation failure as an error.
pub(crate) fn zeroed(len: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| DcdError::OutOfMemory { bytes: len })?;
    buf.resize(len, 0);
    Ok(buf)
}
