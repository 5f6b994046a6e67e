//! Bounds-checked binary reader with cursor tracking.

use std::str;

use crate::BufferError;

/// A binary reader over a byte slice.
///
/// The reader keeps a cursor (`x`) and an exclusive end (`end`), so it can be
/// confined to one region of a larger shared buffer, e.g. the payload of a
/// single container. Every read is bounds-checked against `end` and leaves
/// the cursor untouched on failure.
///
/// # Example
///
/// ```
/// use ion_tree_buffers::Reader;
///
/// let data = [0x01, 0x02, 0x03, 0x04];
/// let mut reader = Reader::new(&data);
///
/// assert_eq!(reader.try_u8(), Ok(0x01));
/// assert_eq!(reader.try_uint(2), Ok(0x0203));
/// assert!(reader.has_remaining());
/// ```
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    /// The underlying byte slice.
    pub uint8: &'a [u8],
    /// Current cursor position.
    pub x: usize,
    /// End position (exclusive).
    pub end: usize,
}

impl<'a> Reader<'a> {
    /// Creates a new reader for the given byte slice.
    pub fn new(uint8: &'a [u8]) -> Self {
        let end = uint8.len();
        Self { uint8, x: 0, end }
    }

    /// Creates a reader confined to `[x, end)` of `uint8`.
    ///
    /// `end` is clamped to the slice length.
    pub fn from_slice(uint8: &'a [u8], x: usize, end: usize) -> Self {
        let end = end.min(uint8.len());
        Self { uint8, x, end }
    }

    /// Current cursor position.
    pub fn position(&self) -> usize {
        self.x
    }

    /// Moves the cursor to an absolute offset within `[0, end]`.
    pub fn set_position(&mut self, x: usize) -> Result<(), BufferError> {
        if x > self.end {
            return Err(BufferError::OutOfBounds {
                position: x,
                len: self.end,
            });
        }
        self.x = x;
        Ok(())
    }

    /// Returns `true` while there are bytes left before `end`.
    pub fn has_remaining(&self) -> bool {
        self.x < self.end
    }

    #[inline]
    fn check(&self, n: usize) -> Result<(), BufferError> {
        match self.x.checked_add(n) {
            Some(stop) if stop <= self.end => Ok(()),
            _ => Err(BufferError::EndOfBuffer),
        }
    }

    /// Reads one byte.
    #[inline]
    pub fn try_u8(&mut self) -> Result<u8, BufferError> {
        self.check(1)?;
        let val = self.uint8[self.x];
        self.x += 1;
        Ok(val)
    }

    /// Reads a big-endian unsigned integer of `len` bytes (at most 8).
    pub fn try_uint(&mut self, len: usize) -> Result<u64, BufferError> {
        if len > 8 {
            return Err(BufferError::Overflow);
        }
        self.check(len)?;
        let mut value: u64 = 0;
        for b in &self.uint8[self.x..self.x + len] {
            value = (value << 8) | *b as u64;
        }
        self.x += len;
        Ok(value)
    }

    /// Returns the next `size` bytes and advances the cursor.
    pub fn try_buf(&mut self, size: usize) -> Result<&'a [u8], BufferError> {
        self.check(size)?;
        let start = self.x;
        self.x += size;
        Ok(&self.uint8[start..self.x])
    }

    /// Reads `size` bytes as UTF-8.
    pub fn try_utf8(&mut self, size: usize) -> Result<&'a str, BufferError> {
        self.check(size)?;
        let bytes = &self.uint8[self.x..self.x + size];
        let text = str::from_utf8(bytes).map_err(|_| BufferError::InvalidUtf8)?;
        self.x += size;
        Ok(text)
    }
}
