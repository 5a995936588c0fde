use std::error;
use std::fmt;
use std::io;

/// Errors that can be returned from disk image operations.  These are
/// generally converted into `io::Error`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiskError {
    /// Unknown error
    Unknown,
    /// Block number outside of the image
    BlockOutOfRange,
    /// Offset out of bounds
    InvalidOffset,
    /// Image size does not describe whole blocks
    InvalidLayout,
    /// Invalid 2IMG header
    InvalidImageHeader,
    /// Invalid volume directory header
    InvalidVolumeHeader,
    /// Invalid directory header
    InvalidDirectoryHeader,
    /// Directory block chain loops back on itself
    DirectoryLoop,
    /// Unknown storage type
    UnknownStorageType,
    /// Read underrun
    ReadUnderrun,
    /// File not found
    NotFound,
    /// Attempt to open a directory as a file, or the reverse
    NotADirectory,
}

impl error::Error for DiskError {}

impl fmt::Display for DiskError {
    /// Provide human-readable descriptions of the errors
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", &self.message())
    }
}

impl From<DiskError> for io::Error {
    fn from(error: DiskError) -> io::Error {
        use self::DiskError::*;
        use std::io::ErrorKind::*;
        let kind = match error {
            Unknown => Other,
            BlockOutOfRange => io::ErrorKind::NotFound,
            InvalidOffset => InvalidInput,
            InvalidLayout => InvalidData,
            InvalidImageHeader => InvalidData,
            InvalidVolumeHeader => InvalidData,
            InvalidDirectoryHeader => InvalidData,
            DirectoryLoop => InvalidData,
            UnknownStorageType => InvalidData,
            ReadUnderrun => UnexpectedEof,
            self::DiskError::NotFound => io::ErrorKind::NotFound,
            self::DiskError::NotADirectory => InvalidInput,
        };
        io::Error::new(kind, error)
    }
}

impl DiskError {
    /// If the provided `io::Error` contains a `DiskError`, return the
    /// underlying `DiskError`.  If not, return None.
    pub fn from_io_error(error: &io::Error) -> Option<DiskError> {
        error
            .get_ref()
            .and_then(|e| e.downcast_ref::<DiskError>())
            .cloned()
    }

    /// This is sometimes useful instead of .into() when the compiler doesn't
    /// have enough information to perform type inference.
    pub fn to_io_error(&self) -> io::Error {
        self.clone().into()
    }

    /// Provide terse descriptions of the errors.
    fn message(&self) -> &str {
        use self::DiskError::*;
        match *self {
            Unknown => "unknown error",
            BlockOutOfRange => "block number out of range",
            InvalidOffset => "offset out of bounds",
            InvalidLayout => "invalid layout",
            InvalidImageHeader => "invalid 2IMG header",
            InvalidVolumeHeader => "invalid volume directory header",
            InvalidDirectoryHeader => "invalid directory header",
            DirectoryLoop => "directory block chain loop detected",
            UnknownStorageType => "unknown storage type",
            ReadUnderrun => "read underrun",
            NotFound => "file not found",
            NotADirectory => "not a directory",
        }
    }
}

impl PartialEq<io::Error> for DiskError {
    fn eq(&self, other: &io::Error) -> bool {
        matches!(DiskError::from_io_error(other), Some(ref e) if e == self)
    }
}

impl PartialEq<DiskError> for io::Error {
    fn eq(&self, other: &DiskError) -> bool {
        matches!(DiskError::from_io_error(self), Some(ref e) if e == other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_round_trip() {
        let error: io::Error = DiskError::BlockOutOfRange.into();
        assert_eq!(error.kind(), io::ErrorKind::NotFound);
        assert_eq!(DiskError::from_io_error(&error), Some(DiskError::BlockOutOfRange));
        assert!(error == DiskError::BlockOutOfRange);
        assert!(DiskError::DirectoryLoop != error);

        let error: io::Error = DiskError::NotADirectory.into();
        assert_eq!(error.kind(), io::ErrorKind::InvalidInput);
        assert!(error == DiskError::NotADirectory);

        let other = io::Error::new(io::ErrorKind::Other, "boom");
        assert_eq!(DiskError::from_io_error(&other), None);
    }
}
