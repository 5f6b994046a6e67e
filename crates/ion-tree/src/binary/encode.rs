//! Header and scalar encoding.
//!
//! Encoders here only produce byte strings; placing them into the shared
//! buffer is the re-encoder's job.

use super::constants::{
    Type, TypeOverlay, ION_BVM, LEN_NULL, LEN_SORTED_STRUCT, LEN_VARUINT, SID_ION_SYMBOL_TABLE,
    SID_SYMBOLS,
};
use crate::error::{IonError, Result};
use crate::symbols::SymbolTable;
use crate::value::{IonType, Scalar};

/// Calculates the number of bytes needed for a VarUInt encoding.
pub fn vuint_len(n: usize) -> usize {
    let mut len = 1;
    let mut rest = n >> 7;
    while rest != 0 {
        len += 1;
        rest >>= 7;
    }
    len
}

/// Writes a VarUInt: 7 data bits per byte, high bit set on the last byte.
pub fn write_vuint_to(out: &mut Vec<u8>, n: usize) {
    let len = vuint_len(n);
    for i in (0..len).rev() {
        let chunk = ((n >> (i * 7)) & 0x7f) as u8;
        out.push(if i == 0 { chunk | 0x80 } else { chunk });
    }
}

/// Number of significant big-endian bytes of `n` (0 for zero).
pub fn uint_byte_len(n: u64) -> usize {
    ((64 - n.leading_zeros() as usize) + 7) / 8
}

fn write_uint_to(out: &mut Vec<u8>, n: u64) {
    let len = uint_byte_len(n);
    out.extend_from_slice(&n.to_be_bytes()[8 - len..]);
}

/// Type descriptor byte and optional VarUInt length for a body of `len`
/// payload bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeDesc {
    pub byte: u8,
    pub length_field: Option<usize>,
}

impl TypeDesc {
    pub fn for_length(code: u8, len: usize) -> Self {
        // L=1 on a struct means "sorted, VarUInt length follows".
        let sorted_marker = code == Type::STRU && len == LEN_SORTED_STRUCT as usize;
        let short = len < LEN_VARUINT as usize && !sorted_marker;
        if short {
            Self {
                byte: (code << 4) | len as u8,
                length_field: None,
            }
        } else {
            Self {
                byte: (code << 4) | LEN_VARUINT,
                length_field: Some(len),
            }
        }
    }

    pub fn null(code: u8) -> Self {
        Self {
            byte: (code << 4) | LEN_NULL,
            length_field: None,
        }
    }

    /// Bytes taken by the descriptor and its length field.
    pub fn encoded_len(&self) -> usize {
        1 + self.length_field.map(vuint_len).unwrap_or(0)
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        out.push(self.byte);
        if let Some(len) = self.length_field {
            write_vuint_to(out, len);
        }
    }
}

/// Encoded header of an entry plus where its type descriptor sits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedHeader {
    pub bytes: Vec<u8>,
    /// Offset of the value's own type descriptor within `bytes`.
    pub type_desc_offset: usize,
    pub type_desc: u8,
}

/// Encodes the field id, annotation wrapper, type descriptor and length of an
/// entry whose payload is `payload_len` bytes.
pub fn encode_header(
    field_sid: Option<u32>,
    annotation_sids: &[u32],
    desc: TypeDesc,
    payload_len: usize,
) -> EncodedHeader {
    let mut bytes = Vec::with_capacity(8);
    if let Some(sid) = field_sid {
        write_vuint_to(&mut bytes, sid as usize);
    }
    if !annotation_sids.is_empty() {
        let annot_len: usize = annotation_sids.iter().map(|s| vuint_len(*s as usize)).sum();
        let wrapper_len = vuint_len(annot_len) + annot_len + desc.encoded_len() + payload_len;
        TypeDesc::for_length(Type::ANNO, wrapper_len).write_to(&mut bytes);
        write_vuint_to(&mut bytes, annot_len);
        for sid in annotation_sids {
            write_vuint_to(&mut bytes, *sid as usize);
        }
    }
    let type_desc_offset = bytes.len();
    desc.write_to(&mut bytes);
    EncodedHeader {
        bytes,
        type_desc_offset,
        type_desc: desc.byte,
    }
}

/// Encoded scalar body: type descriptor plus payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalarBody {
    pub desc: TypeDesc,
    pub payload: Vec<u8>,
}

/// Encodes a scalar's type descriptor and payload. Symbol values must already
/// be interned in `symbols`.
pub fn encode_scalar(scalar: &Scalar, symbols: &SymbolTable) -> Result<ScalarBody> {
    let mut payload = Vec::new();
    let desc = match scalar {
        Scalar::Null(ty) => TypeDesc::null(ty.type_code()),
        Scalar::Bool(b) => TypeDesc {
            byte: TypeOverlay::BOOL | u8::from(*b),
            length_field: None,
        },
        Scalar::Int(n) => {
            let code = if *n < 0 { Type::NINT } else { Type::UINT };
            write_uint_to(&mut payload, n.unsigned_abs());
            TypeDesc::for_length(code, payload.len())
        }
        Scalar::Float(f) => {
            // Positive zero has a zero-length encoding; -0.0 keeps its sign bit.
            if f.to_bits() != 0 {
                payload.extend_from_slice(&f.to_bits().to_be_bytes());
            }
            TypeDesc::for_length(Type::FLOT, payload.len())
        }
        Scalar::Symbol(text) => {
            let sid = symbols.get_id(text).ok_or_else(|| {
                IonError::InvariantViolation(format!("symbol {text:?} was not interned"))
            })?;
            write_uint_to(&mut payload, sid as u64);
            TypeDesc::for_length(Type::SYMB, payload.len())
        }
        Scalar::String(s) => {
            payload.extend_from_slice(s.as_bytes());
            TypeDesc::for_length(Type::STRI, payload.len())
        }
        Scalar::Blob(b) => {
            payload.extend_from_slice(b);
            TypeDesc::for_length(Type::BINA, payload.len())
        }
        Scalar::Opaque { ty, bytes } => {
            payload.extend_from_slice(bytes);
            TypeDesc::for_length(ty.type_code(), payload.len())
        }
    };
    Ok(ScalarBody { desc, payload })
}

/// Checks that a scalar can be encoded as the type it claims.
pub fn validate_scalar(scalar: &Scalar) -> Result<()> {
    match scalar {
        Scalar::Null(ty) if ty.is_container() => Err(IonError::InvalidArgument(format!(
            "null.{} is a container, not a scalar",
            ty.name()
        ))),
        Scalar::Opaque { ty, .. }
            if !matches!(ty, IonType::Decimal | IonType::Timestamp | IonType::Clob) =>
        {
            Err(IonError::InvalidArgument(format!(
                "opaque payloads are only kept for decimal, timestamp and clob, not {}",
                ty.name()
            )))
        }
        _ => Ok(()),
    }
}

/// Encodes the prefix of a stream: the version marker followed, when the
/// table defines user symbols, by `$ion_symbol_table::{symbols:[...]}`.
pub fn encode_stream_prefix(symbols: &SymbolTable, write_symbol_table: bool) -> Vec<u8> {
    let mut out = ION_BVM.to_vec();
    if !write_symbol_table || !symbols.has_user_symbols() {
        return out;
    }

    let mut list_content = Vec::new();
    for text in symbols.user_symbols() {
        let desc = TypeDesc::for_length(Type::STRI, text.len());
        desc.write_to(&mut list_content);
        list_content.extend_from_slice(text.as_bytes());
    }

    let list_desc = TypeDesc::for_length(Type::LIST, list_content.len());
    let field_len = vuint_len(SID_SYMBOLS as usize) + list_desc.encoded_len() + list_content.len();
    let struct_desc = TypeDesc::for_length(Type::STRU, field_len);

    let header = encode_header(None, &[SID_ION_SYMBOL_TABLE], struct_desc, field_len);
    out.extend_from_slice(&header.bytes);
    write_vuint_to(&mut out, SID_SYMBOLS as usize);
    list_desc.write_to(&mut out);
    out.extend_from_slice(&list_content);
    out
}
