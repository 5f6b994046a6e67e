//! Ion binary format constants.
#![allow(non_snake_case)]

/// Ion binary type identifiers (high 4 bits of type descriptor byte).
pub mod Type {
    pub const NULL: u8 = 0x0;
    pub const BOOL: u8 = 0x1;
    pub const UINT: u8 = 0x2;
    pub const NINT: u8 = 0x3;
    pub const FLOT: u8 = 0x4;
    pub const DECI: u8 = 0x5;
    pub const TIME: u8 = 0x6;
    pub const SYMB: u8 = 0x7;
    pub const STRI: u8 = 0x8;
    pub const CLOB: u8 = 0x9;
    pub const BINA: u8 = 0xa;
    pub const LIST: u8 = 0xb;
    pub const SEXP: u8 = 0xc;
    pub const STRU: u8 = 0xd;
    pub const ANNO: u8 = 0xe;
    pub const RESV: u8 = 0xf;
}

/// Each type shifted into the high 4 bits of a type descriptor byte.
pub mod TypeOverlay {
    pub const NULL: u8 = super::Type::NULL << 4;
    pub const BOOL: u8 = super::Type::BOOL << 4;
    pub const UINT: u8 = super::Type::UINT << 4;
    pub const NINT: u8 = super::Type::NINT << 4;
    pub const FLOT: u8 = super::Type::FLOT << 4;
    pub const SYMB: u8 = super::Type::SYMB << 4;
    pub const STRI: u8 = super::Type::STRI << 4;
    pub const BINA: u8 = super::Type::BINA << 4;
    pub const LIST: u8 = super::Type::LIST << 4;
    pub const SEXP: u8 = super::Type::SEXP << 4;
    pub const STRU: u8 = super::Type::STRU << 4;
    pub const ANNO: u8 = super::Type::ANNO << 4;
}

/// Length nibble meaning "a VarUInt length follows".
pub const LEN_VARUINT: u8 = 14;
/// Length nibble meaning "typed null".
pub const LEN_NULL: u8 = 15;
/// Struct length nibble marking a sorted struct; a VarUInt length follows.
pub const LEN_SORTED_STRUCT: u8 = 1;

/// Ion Binary Version Marker (IVM): 4 bytes 0xe0 0x01 0x00 0xea.
pub const ION_BVM: [u8; 4] = [0xe0, 0x01, 0x00, 0xea];

/// System symbol table (1-indexed; index 0 unused).
pub const SYSTEM_SYMBOLS: &[&str] = &[
    "",                         // 0: unused
    "$ion",                     // 1
    "$ion_1_0",                 // 2
    "$ion_symbol_table",        // 3
    "name",                     // 4
    "version",                  // 5
    "imports",                  // 6
    "symbols",                  // 7
    "max_id",                   // 8
    "$ion_shared_symbol_table", // 9
];

/// System symbol ID for '$ion_symbol_table'.
pub const SID_ION_SYMBOL_TABLE: u32 = 3;
/// System symbol ID for 'imports'.
pub const SID_IMPORTS: u32 = 6;
/// System symbol ID for 'symbols'.
pub const SID_SYMBOLS: u32 = 7;
