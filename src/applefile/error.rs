use std::error;
use std::fmt;
use std::io;

/// Errors raised by file format decoders.  Like `DiskError`, these are
/// generally carried inside an `io::Error`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FormatError {
    /// Buffer ends before the format says it should
    Truncated,
    /// Signature bytes do not match
    InvalidSignature,
    /// A recognized format in a variant that is not decoded
    UnsupportedVariant,
    /// A length or offset field points outside the buffer
    InvalidOffset,
    /// Double hi-res halves of different sizes
    MismatchedHalves,
    /// Body of a recognized format could not be decoded
    CorruptData,
}

impl error::Error for FormatError {}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", &self.message())
    }
}

impl From<FormatError> for io::Error {
    fn from(error: FormatError) -> io::Error {
        use self::FormatError::*;
        let kind = match error {
            Truncated => io::ErrorKind::UnexpectedEof,
            InvalidSignature => io::ErrorKind::InvalidData,
            UnsupportedVariant => io::ErrorKind::Unsupported,
            InvalidOffset => io::ErrorKind::InvalidData,
            MismatchedHalves => io::ErrorKind::InvalidData,
            CorruptData => io::ErrorKind::InvalidData,
        };
        io::Error::new(kind, error)
    }
}

impl FormatError {
    /// If the provided `io::Error` contains a `FormatError`, return it.
    pub fn from_io_error(error: &io::Error) -> Option<FormatError> {
        error
            .get_ref()
            .and_then(|e| e.downcast_ref::<FormatError>())
            .cloned()
    }

    pub fn to_io_error(&self) -> io::Error {
        self.clone().into()
    }

    fn message(&self) -> &str {
        use self::FormatError::*;
        match *self {
            Truncated => "buffer truncated",
            InvalidSignature => "invalid signature",
            UnsupportedVariant => "unsupported format variant",
            InvalidOffset => "offset out of bounds",
            MismatchedHalves => "double hi-res halves differ in size",
            CorruptData => "corrupt data",
        }
    }
}

impl PartialEq<io::Error> for FormatError {
    fn eq(&self, other: &io::Error) -> bool {
        matches!(FormatError::from_io_error(other), Some(ref e) if e == self)
    }
}

impl PartialEq<FormatError> for io::Error {
    fn eq(&self, other: &FormatError) -> bool {
        matches!(FormatError::from_io_error(self), Some(ref e) if e == other)
    }
}
