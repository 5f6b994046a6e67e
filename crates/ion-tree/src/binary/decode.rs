//! Header and scalar decoding over a shared buffer.
//!
//! Decoding is positional: every function takes the whole buffer plus the
//! offsets it may read, so that the resulting offsets can be stored as
//! [`Position`] metadata on the value nodes.

use ion_tree_buffers::Reader;

use super::constants::{
    Type, ION_BVM, LEN_NULL, LEN_SORTED_STRUCT, LEN_VARUINT, SID_IMPORTS, SID_ION_SYMBOL_TABLE,
    SID_SYMBOLS,
};
use crate::error::DecodeError;
use crate::position::Position;
use crate::symbols::SymbolTable;
use crate::value::{IonType, Scalar};

/// Decoded header of one entry (field id, annotations, type descriptor).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub position: Position,
    pub field_sid: Option<u32>,
    pub annotation_sids: Vec<u32>,
}

impl Header {
    pub fn type_code(&self) -> u8 {
        self.position.type_desc >> 4
    }

    pub fn ion_type(&self) -> Option<IonType> {
        IonType::from_type_code(self.type_code())
    }

    pub fn is_null(&self) -> bool {
        self.position.is_null()
    }

    /// `true` for a `$ion_symbol_table::{...}` struct.
    pub fn is_local_symbol_table(&self) -> bool {
        self.type_code() == Type::STRU
            && self.annotation_sids.first() == Some(&SID_ION_SYMBOL_TABLE)
    }
}

/// One step of a parse loop: a value, or NOP padding to skip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Value(Header),
    Pad { next_value_offset: usize },
}

/// Reads an Ion VarUInt (at most 5 bytes).
///
/// Each byte carries 7 data bits; the high bit marks the last byte.
pub fn read_vuint(reader: &mut Reader<'_>) -> Result<usize, DecodeError> {
    let mut result: usize = 0;
    for _ in 0..5 {
        let b = reader.try_u8()? as usize;
        result = (result << 7) | (b & 0x7f);
        if b & 0x80 != 0 {
            return Ok(result);
        }
    }
    Err(DecodeError::IntegerOverflow)
}

fn read_sid(reader: &mut Reader<'_>) -> Result<u32, DecodeError> {
    let sid = read_vuint(reader)?;
    u32::try_from(sid).map_err(|_| DecodeError::IntegerOverflow)
}

/// Reads the length that follows a type descriptor and returns the payload
/// length in bytes.
fn read_body_len(reader: &mut Reader<'_>, type_desc: u8) -> Result<usize, DecodeError> {
    let code = type_desc >> 4;
    let len = type_desc & 0x0f;
    match code {
        Type::NULL if len == LEN_NULL => Ok(0),
        Type::BOOL => match len {
            0 | 1 | LEN_NULL => Ok(0),
            _ => Err(DecodeError::InvalidBoolLen(len)),
        },
        Type::FLOT => match len {
            0 | 4 | 8 => Ok(len as usize),
            LEN_NULL => Ok(0),
            _ => Err(DecodeError::UnsupportedFloatLen(len)),
        },
        Type::STRU if len == LEN_SORTED_STRUCT => read_vuint(reader),
        Type::RESV => Err(DecodeError::InvalidTypeDescriptor(type_desc)),
        _ => match len {
            LEN_VARUINT => read_vuint(reader),
            LEN_NULL => Ok(0),
            n => Ok(n as usize),
        },
    }
}

fn region_end(reader: &Reader<'_>, len: usize, entry_start: usize) -> Result<usize, DecodeError> {
    match reader.position().checked_add(len) {
        Some(stop) if stop <= reader.end => Ok(stop),
        _ => Err(DecodeError::LengthMismatch {
            offset: entry_start,
        }),
    }
}

/// Decodes the header of the entry at `at`, which must end no later than
/// `end`. Struct members (`in_struct`) start with a field symbol id.
pub fn read_entry(
    bytes: &[u8],
    at: usize,
    end: usize,
    in_struct: bool,
) -> Result<Entry, DecodeError> {
    let mut reader = Reader::from_slice(bytes, at, end);
    let entry_start = at;
    let field_sid = if in_struct {
        Some(read_sid(&mut reader)?)
    } else {
        None
    };

    let mut type_desc_start = reader.position();
    let mut type_desc = reader.try_u8()?;
    let mut annotation_sids = Vec::new();
    let mut wrapper_end = None;

    if type_desc >> 4 == Type::ANNO {
        let len = type_desc & 0x0f;
        if len == LEN_NULL {
            return Err(DecodeError::InvalidTypeDescriptor(type_desc));
        }
        if len < 3 {
            return Err(DecodeError::AnnotationTooShort(len));
        }
        let wrapper_len = if len == LEN_VARUINT {
            read_vuint(&mut reader)?
        } else {
            len as usize
        };
        wrapper_end = Some(region_end(&reader, wrapper_len, entry_start)?);

        let annot_len = read_vuint(&mut reader)?;
        let annot_end = region_end(&reader, annot_len, entry_start)?;
        while reader.position() < annot_end {
            annotation_sids.push(read_sid(&mut reader)?);
        }
        if reader.position() != annot_end || annotation_sids.is_empty() {
            return Err(DecodeError::LengthMismatch {
                offset: entry_start,
            });
        }

        type_desc_start = reader.position();
        type_desc = reader.try_u8()?;
        if type_desc >> 4 == Type::ANNO {
            return Err(DecodeError::NestedAnnotation);
        }
    }

    if type_desc >> 4 == Type::NULL && type_desc & 0x0f != LEN_NULL {
        if wrapper_end.is_some() {
            return Err(DecodeError::InvalidTypeDescriptor(type_desc));
        }
        let pad = if type_desc & 0x0f == LEN_VARUINT {
            read_vuint(&mut reader)?
        } else {
            (type_desc & 0x0f) as usize
        };
        let next_value_offset = region_end(&reader, pad, entry_start)?;
        return Ok(Entry::Pad { next_value_offset });
    }

    let body_len = read_body_len(&mut reader, type_desc)?;
    let value_start = reader.position();
    let next_value_offset = region_end(&reader, body_len, entry_start)?;
    if let Some(stop) = wrapper_end {
        if stop != next_value_offset {
            return Err(DecodeError::LengthMismatch {
                offset: entry_start,
            });
        }
    }

    Ok(Entry::Value(Header {
        position: Position {
            entry_start,
            type_desc_start,
            value_start,
            next_value_offset,
            type_desc,
        },
        field_sid,
        annotation_sids,
    }))
}

/// Decodes the scalar payload described by `position`.
pub fn decode_scalar(
    bytes: &[u8],
    position: &Position,
    symbols: &SymbolTable,
) -> Result<Scalar, DecodeError> {
    let code = position.type_desc >> 4;
    let len_nibble = position.type_desc & 0x0f;
    let ty = IonType::from_type_code(code)
        .ok_or(DecodeError::InvalidTypeDescriptor(position.type_desc))?;
    if ty.is_container() {
        return Err(DecodeError::InvalidTypeDescriptor(position.type_desc));
    }
    if len_nibble == LEN_NULL {
        return Ok(Scalar::Null(ty));
    }

    let mut reader = Reader::from_slice(bytes, position.value_start, position.next_value_offset);
    let len = position.payload_len();
    let scalar = match code {
        Type::BOOL => Scalar::Bool(len_nibble == 1),
        Type::UINT => {
            let magnitude = read_magnitude(&mut reader, len)?;
            let n = i64::try_from(magnitude).map_err(|_| DecodeError::IntegerOverflow)?;
            Scalar::Int(n)
        }
        Type::NINT => {
            let magnitude = read_magnitude(&mut reader, len)?;
            if magnitude == 0 {
                return Err(DecodeError::NegativeZero);
            }
            if magnitude > i64::MIN.unsigned_abs() {
                return Err(DecodeError::IntegerOverflow);
            }
            Scalar::Int((magnitude as i64).wrapping_neg())
        }
        Type::FLOT => match len {
            0 => Scalar::Float(0.0),
            4 => {
                let raw = reader.try_uint(4)? as u32;
                Scalar::Float(f32::from_bits(raw) as f64)
            }
            8 => Scalar::Float(f64::from_bits(reader.try_uint(8)?)),
            _ => return Err(DecodeError::UnsupportedFloatLen(len as u8)),
        },
        Type::SYMB => {
            let sid = read_magnitude(&mut reader, len)?;
            let sid = u32::try_from(sid).map_err(|_| DecodeError::IntegerOverflow)?;
            let text = symbols
                .get_text(sid)
                .ok_or(DecodeError::UnknownSymbol(sid))?;
            Scalar::Symbol(text.to_owned())
        }
        Type::STRI => Scalar::String(reader.try_utf8(len)?.to_owned()),
        Type::BINA => Scalar::Blob(reader.try_buf(len)?.to_vec()),
        _ => Scalar::Opaque {
            ty,
            bytes: reader.try_buf(len)?.to_vec(),
        },
    };
    Ok(scalar)
}

fn read_magnitude(reader: &mut Reader<'_>, len: usize) -> Result<u64, DecodeError> {
    if len > 8 {
        return Err(DecodeError::IntegerOverflow);
    }
    Ok(reader.try_uint(len)?)
}

/// Returns `true` when an Ion version marker starts at `at`.
pub fn is_version_marker(bytes: &[u8], at: usize) -> bool {
    bytes.get(at..at + ION_BVM.len()) == Some(&ION_BVM[..])
}

/// Decodes the prefix of a stream: the version marker and an optional local
/// symbol table. Returns the offset where user values begin and the table.
pub fn read_stream_prefix(bytes: &[u8]) -> Result<(usize, SymbolTable), DecodeError> {
    if bytes.len() < ION_BVM.len() {
        return Err(DecodeError::EndOfInput);
    }
    if !is_version_marker(bytes, 0) {
        return Err(DecodeError::InvalidBvm);
    }
    let mut at = ION_BVM.len();
    let mut symbols = SymbolTable::new();

    loop {
        if at >= bytes.len() {
            return Ok((at, symbols));
        }
        match read_entry(bytes, at, bytes.len(), false)? {
            Entry::Pad { next_value_offset } => at = next_value_offset,
            Entry::Value(header) if header.is_local_symbol_table() => {
                symbols = read_local_symbol_table(bytes, &header)?;
                return Ok((header.position.next_value_offset, symbols));
            }
            Entry::Value(_) => return Ok((at, symbols)),
        }
    }
}

fn read_local_symbol_table(bytes: &[u8], header: &Header) -> Result<SymbolTable, DecodeError> {
    let system = SymbolTable::new();
    let mut texts = Vec::new();
    if header.is_null() {
        return Ok(system);
    }
    let mut at = header.position.value_start;
    let end = header.position.next_value_offset;
    while at < end {
        let field = match read_entry(bytes, at, end, true)? {
            Entry::Pad { next_value_offset } => {
                at = next_value_offset;
                continue;
            }
            Entry::Value(field) => field,
        };
        at = field.position.next_value_offset;
        match field.field_sid {
            Some(SID_SYMBOLS) if field.type_code() == Type::LIST && !field.is_null() => {
                texts = read_symbol_list(bytes, &field.position, &system)?;
            }
            Some(SID_IMPORTS) => {
                let appends = field.type_code() == Type::SYMB
                    && matches!(
                        decode_scalar(bytes, &field.position, &system)?,
                        Scalar::Symbol(ref s) if s == "$ion_symbol_table"
                    );
                if !appends && !field.is_null() {
                    return Err(DecodeError::InvalidSymbolTable(
                        "shared symbol table imports are not supported",
                    ));
                }
            }
            _ => {}
        }
    }
    Ok(SymbolTable::with_symbols(texts))
}

fn read_symbol_list(
    bytes: &[u8],
    list: &Position,
    system: &SymbolTable,
) -> Result<Vec<String>, DecodeError> {
    let mut texts = Vec::new();
    let mut at = list.value_start;
    while at < list.next_value_offset {
        match read_entry(bytes, at, list.next_value_offset, false)? {
            Entry::Pad { next_value_offset } => at = next_value_offset,
            Entry::Value(item) => {
                at = item.position.next_value_offset;
                match decode_scalar(bytes, &item.position, system)? {
                    Scalar::String(text) => texts.push(text),
                    _ => {
                        return Err(DecodeError::InvalidSymbolTable(
                            "symbols list must contain strings",
                        ))
                    }
                }
            }
        }
    }
    Ok(texts)
}
