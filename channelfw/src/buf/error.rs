use std::{fmt, io};

/// Error returned when a scatter-write does not fit its buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferError {
    /// The buffers cannot take `needed` bytes. `available` is whichever of
    /// the aggregate capacity or aggregate remaining space came up short.
    InsufficientCapacity {
        /// Bytes the caller tried to write.
        needed: usize,
        /// Bytes the buffers could hold.
        available: usize,
    },
}

impl fmt::Display for BufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferError::InsufficientCapacity { needed, available } => write!(
                f,
                "buffers can hold {available} bytes but {needed} were written"
            ),
        }
    }
}

impl std::error::Error for BufferError {}

impl From<BufferError> for io::Error {
    fn from(e: BufferError) -> Self {
        io::Error::new(io::ErrorKind::InvalidInput, e)
    }
}

/// Error returned by the hand-rolled integer parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberFormatError {
    /// A byte that is neither a digit nor the single leading `-`.
    InvalidDigit {
        /// The offending byte.
        byte: u8,
        /// Offset of the byte inside the trimmed content.
        index: usize,
    },
    /// The numeric run ended on whitespace but content follows it.
    TrailingContent {
        /// Number of bytes left unconsumed.
        remaining: usize,
    },
    /// The value does not fit in an `i32`.
    Overflow,
}

impl fmt::Display for NumberFormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumberFormatError::InvalidDigit { byte, index } => {
                write!(f, "invalid digit 0x{byte:02x} at offset {index}")
            }
            NumberFormatError::TrailingContent { remaining } => {
                write!(f, "{remaining} unconsumed bytes after number")
            }
            NumberFormatError::Overflow => f.write_str("number too large for i32"),
        }
    }
}

impl std::error::Error for NumberFormatError {}

impl From<NumberFormatError> for io::Error {
    fn from(e: NumberFormatError) -> Self {
        io::Error::new(io::ErrorKind::InvalidData, e)
    }
}
