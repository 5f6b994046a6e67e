use ion_tree_buffers::BufferError;
use thiserror::Error;

/// Malformed or truncated binary input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unexpected end of input")]
    EndOfInput,
    #[error("invalid Ion Binary Version Marker")]
    InvalidBvm,
    #[error("unknown symbol ID: {0}")]
    UnknownSymbol(u32),
    #[error("invalid UTF-8")]
    InvalidUtf8,
    #[error("unsupported float length: {0}")]
    UnsupportedFloatLen(u8),
    #[error("negative zero integer is illegal")]
    NegativeZero,
    #[error("invalid bool length: {0}")]
    InvalidBoolLen(u8),
    #[error("invalid type descriptor: 0x{0:02x}")]
    InvalidTypeDescriptor(u8),
    #[error("annotation wrapper must have at least 3 bytes")]
    AnnotationTooShort(u8),
    #[error("annotation wrapper cannot wrap another annotation")]
    NestedAnnotation,
    #[error("value at offset {offset} overruns its enclosing region")]
    LengthMismatch { offset: usize },
    #[error("integer does not fit in 64 bits")]
    IntegerOverflow,
    #[error("system value at offset {0} after user data is not supported")]
    UnsupportedSystemValue(usize),
    #[error("invalid local symbol table: {0}")]
    InvalidSymbolTable(&'static str),
}

impl From<BufferError> for DecodeError {
    fn from(err: BufferError) -> Self {
        match err {
            BufferError::InvalidUtf8 => DecodeError::InvalidUtf8,
            BufferError::Overflow => DecodeError::IntegerOverflow,
            BufferError::EndOfBuffer | BufferError::OutOfBounds { .. } => DecodeError::EndOfInput,
        }
    }
}

/// Errors raised by container operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IonError {
    #[error("value is already contained in a container")]
    AlreadyContained,
    #[error("value is read-only")]
    ReadOnly,
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("child handle does not refer to a live value")]
    NullChild,
    #[error("cannot access the contents of a null container")]
    NullValueAccess,
    #[error("current element of the cursor was removed from its container")]
    ConcurrentModification,
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("buffer write failed: {0}")]
    Buffer(#[from] BufferError),
    #[error("buffer was left inconsistent by a failed flush")]
    BufferPoisoned,
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

pub type Result<T> = std::result::Result<T, IonError>;
