//! In-place patching writer over an owned byte buffer.

use crate::BufferError;

/// A cursor-based writer that edits an existing buffer in place.
///
/// Unlike an append-only encoder, this writer is used to patch an already
/// encoded buffer: it can open a gap at the cursor ([`Writer::insert`]),
/// close one ([`Writer::remove`]) and overwrite bytes ([`Writer::buf`]).
/// Offsets are always plain integers; after an insert or remove every offset
/// at or beyond the cursor has moved and must be recomputed by the caller.
///
/// # Example
///
/// ```
/// use ion_tree_buffers::Writer;
///
/// let mut writer = Writer::from_vec(vec![0x01, 0x04]);
/// writer.set_position(1).unwrap();
/// writer.insert(2).unwrap();
/// writer.buf(&[0x02, 0x03]).unwrap();
/// assert_eq!(writer.into_inner(), [0x01, 0x02, 0x03, 0x04]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Writer {
    /// The underlying byte buffer.
    pub uint8: Vec<u8>,
    /// Current cursor position.
    pub x: usize,
}

impl Writer {
    /// Creates a writer over an existing buffer, cursor at 0.
    pub fn from_vec(uint8: Vec<u8>) -> Self {
        Self { uint8, x: 0 }
    }

    /// Current cursor position.
    pub fn position(&self) -> usize {
        self.x
    }

    /// Moves the cursor to an absolute offset within `[0, len]`.
    pub fn set_position(&mut self, x: usize) -> Result<(), BufferError> {
        if x > self.uint8.len() {
            return Err(BufferError::OutOfBounds {
                position: x,
                len: self.uint8.len(),
            });
        }
        self.x = x;
        Ok(())
    }

    /// Opens a zero-filled gap of `n` bytes at the cursor, shifting everything
    /// after it to the right. The cursor does not move.
    pub fn insert(&mut self, n: usize) -> Result<(), BufferError> {
        if self.x > self.uint8.len() {
            return Err(BufferError::OutOfBounds {
                position: self.x,
                len: self.uint8.len(),
            });
        }
        if n == 0 {
            return Ok(());
        }
        let new_len = self.uint8.len().checked_add(n).ok_or(BufferError::Overflow)?;
        self.uint8.splice(self.x..self.x, std::iter::repeat(0u8).take(n));
        debug_assert_eq!(self.uint8.len(), new_len);
        Ok(())
    }

    /// Deletes `n` bytes at the cursor, shifting everything after them to the
    /// left. The cursor does not move.
    pub fn remove(&mut self, n: usize) -> Result<(), BufferError> {
        let stop = self.x.checked_add(n).ok_or(BufferError::Overflow)?;
        if stop > self.uint8.len() {
            return Err(BufferError::OutOfBounds {
                position: stop,
                len: self.uint8.len(),
            });
        }
        self.uint8.drain(self.x..stop);
        Ok(())
    }

    /// Overwrites `buf.len()` bytes at the cursor and advances past them.
    ///
    /// The bytes must already exist (see [`Writer::insert`]); writing never
    /// grows the buffer implicitly.
    pub fn buf(&mut self, buf: &[u8]) -> Result<(), BufferError> {
        let stop = self.x.checked_add(buf.len()).ok_or(BufferError::Overflow)?;
        if stop > self.uint8.len() {
            return Err(BufferError::OutOfBounds {
                position: stop,
                len: self.uint8.len(),
            });
        }
        self.uint8[self.x..stop].copy_from_slice(buf);
        self.x = stop;
        Ok(())
    }

    /// Inserts `buf` at the cursor and advances past it.
    pub fn insert_buf(&mut self, buf: &[u8]) -> Result<(), BufferError> {
        self.insert(buf.len())?;
        self.buf(buf)
    }

    /// Consumes the writer, returning the buffer.
    pub fn into_inner(self) -> Vec<u8> {
        self.uint8
    }
}
