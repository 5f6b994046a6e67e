//! Byte-offset metadata of a value inside its shared buffer.

/// Where a value's encoding lives in its buffer.
///
/// ```text
/// entry_start   type_desc_start    value_start          next_value_offset
///     |  field id, annotations |  td + length |  payload  |
/// ```
///
/// For a stream, `[entry_start, value_start)` is the version marker plus the
/// local symbol table, and `type_desc_start == entry_start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub entry_start: usize,
    pub type_desc_start: usize,
    pub value_start: usize,
    pub next_value_offset: usize,
    /// The value's own type descriptor byte.
    pub type_desc: u8,
}

impl Position {
    /// Bytes before the payload (field id, annotations, td and length).
    pub fn header_len(&self) -> usize {
        self.value_start - self.entry_start
    }

    pub fn payload_len(&self) -> usize {
        self.next_value_offset - self.value_start
    }

    /// Full encoded size of the entry.
    pub fn entry_len(&self) -> usize {
        self.next_value_offset - self.entry_start
    }

    /// `true` when the type descriptor marks a typed null.
    pub fn is_null(&self) -> bool {
        self.type_desc & 0x0f == crate::binary::constants::LEN_NULL
    }

    pub fn is_ordered(&self) -> bool {
        self.entry_start <= self.type_desc_start
            && self.type_desc_start <= self.value_start
            && self.value_start <= self.next_value_offset
    }

    /// Moves every offset by `delta`.
    pub(crate) fn shift(&mut self, delta: isize) {
        self.entry_start = offset_by(self.entry_start, delta);
        self.type_desc_start = offset_by(self.type_desc_start, delta);
        self.value_start = offset_by(self.value_start, delta);
        self.next_value_offset = offset_by(self.next_value_offset, delta);
    }
}

pub(crate) fn offset_by(x: usize, delta: isize) -> usize {
    x.wrapping_add_signed(delta)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shift_moves_all_offsets() {
        let mut pos = Position {
            entry_start: 10,
            type_desc_start: 11,
            value_start: 12,
            next_value_offset: 20,
            type_desc: 0xb8,
        };
        pos.shift(3);
        assert_eq!(
            (pos.entry_start, pos.value_start, pos.next_value_offset),
            (13, 15, 23)
        );
        pos.shift(-13);
        assert_eq!(pos.entry_start, 0);
        assert_eq!(pos.header_len(), 2);
        assert_eq!(pos.payload_len(), 8);
        assert!(pos.is_ordered());
        assert!(!pos.is_null());
    }
}
