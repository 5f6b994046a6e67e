//! Binary buffer utilities for ion-tree.
//!
//! # Overview
//!
//! - [`Reader`] - Bounds-checked reads from a region of a byte slice
//! - [`Writer`] - In-place patching of an owned buffer (insert / remove /
//!   overwrite at a cursor)
//!
//! # Example
//!
//! ```
//! use ion_tree_buffers::{Reader, Writer};
//!
//! let mut writer = Writer::from_vec(vec![0x21, 0x05]);
//! writer.set_position(2).unwrap();
//! writer.insert_buf(&[0x21, 0x06]).unwrap();
//! let data = writer.into_inner();
//!
//! let mut reader = Reader::new(&data);
//! reader.set_position(2).unwrap();
//! assert_eq!(reader.try_u8(), Ok(0x21));
//! assert_eq!(reader.try_u8(), Ok(0x06));
//! ```

mod reader;
mod writer;

pub use reader::Reader;
pub use writer::Writer;

/// Error type for buffer operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    /// Attempted to read past the end of the buffer.
    EndOfBuffer,
    /// Invalid UTF-8 sequence.
    InvalidUtf8,
    /// A cursor or region falls outside the buffer.
    OutOfBounds { position: usize, len: usize },
    /// Arithmetic overflow while sizing a read or write.
    Overflow,
}

impl std::fmt::Display for BufferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BufferError::EndOfBuffer => write!(f, "end of buffer"),
            BufferError::InvalidUtf8 => write!(f, "invalid UTF-8 sequence"),
            BufferError::OutOfBounds { position, len } => {
                write!(
                    f,
                    "offset {position} out of bounds for buffer of {len} bytes"
                )
            }
            BufferError::Overflow => write!(f, "buffer overflow"),
        }
    }
}

impl std::error::Error for BufferError {}
