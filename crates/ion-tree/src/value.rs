//! Value handles and the value model shared by every node.

use std::fmt;

use crate::binary::constants::Type;

/// Handle to a value node owned by a [`Dom`](crate::Dom).
///
/// Handles are cheap to copy and compare by identity. A handle whose slot was
/// released carries a stale generation and is rejected by every operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValueId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// Ion data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IonType {
    Null,
    Bool,
    Int,
    Float,
    Decimal,
    Timestamp,
    Symbol,
    String,
    Clob,
    Blob,
    List,
    Sexp,
    Struct,
    Datagram,
}

impl IonType {
    /// Maps a binary type code (high nibble of a type descriptor) to a type.
    ///
    /// Annotation wrappers and the reserved code have no value type.
    pub fn from_type_code(code: u8) -> Option<Self> {
        Some(match code {
            Type::NULL => IonType::Null,
            Type::BOOL => IonType::Bool,
            Type::UINT | Type::NINT => IonType::Int,
            Type::FLOT => IonType::Float,
            Type::DECI => IonType::Decimal,
            Type::TIME => IonType::Timestamp,
            Type::SYMB => IonType::Symbol,
            Type::STRI => IonType::String,
            Type::CLOB => IonType::Clob,
            Type::BINA => IonType::Blob,
            Type::LIST => IonType::List,
            Type::SEXP => IonType::Sexp,
            Type::STRU => IonType::Struct,
            _ => return None,
        })
    }

    /// Binary type code used when writing a value of this type.
    ///
    /// Integers report the positive code; the sign picks 0x2 or 0x3.
    pub fn type_code(self) -> u8 {
        match self {
            IonType::Null => Type::NULL,
            IonType::Bool => Type::BOOL,
            IonType::Int => Type::UINT,
            IonType::Float => Type::FLOT,
            IonType::Decimal => Type::DECI,
            IonType::Timestamp => Type::TIME,
            IonType::Symbol => Type::SYMB,
            IonType::String => Type::STRI,
            IonType::Clob => Type::CLOB,
            IonType::Blob => Type::BINA,
            IonType::List => Type::LIST,
            IonType::Sexp => Type::SEXP,
            IonType::Struct => Type::STRU,
            IonType::Datagram => Type::NULL,
        }
    }

    pub fn is_container(self) -> bool {
        matches!(
            self,
            IonType::List | IonType::Sexp | IonType::Struct | IonType::Datagram
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            IonType::Null => "null",
            IonType::Bool => "bool",
            IonType::Int => "int",
            IonType::Float => "float",
            IonType::Decimal => "decimal",
            IonType::Timestamp => "timestamp",
            IonType::Symbol => "symbol",
            IonType::String => "string",
            IonType::Clob => "clob",
            IonType::Blob => "blob",
            IonType::List => "list",
            IonType::Sexp => "sexp",
            IonType::Struct => "struct",
            IonType::Datagram => "datagram",
        }
    }
}

/// Capability tag shared by every container.
///
/// One engine serves all four kinds; the tag drives the growth policy of the
/// child store and whether a stream prefix is written at depth zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    List,
    Sexp,
    Struct,
    /// Top-level stream of values (datagram).
    Stream,
}

impl ContainerKind {
    pub fn ion_type(self) -> IonType {
        match self {
            ContainerKind::List => IonType::List,
            ContainerKind::Sexp => IonType::Sexp,
            ContainerKind::Struct => IonType::Struct,
            ContainerKind::Stream => IonType::Datagram,
        }
    }

    pub(crate) fn from_ion_type(ty: IonType) -> Option<Self> {
        match ty {
            IonType::List => Some(ContainerKind::List),
            IonType::Sexp => Some(ContainerKind::Sexp),
            IonType::Struct => Some(ContainerKind::Struct),
            IonType::Datagram => Some(ContainerKind::Stream),
            _ => None,
        }
    }
}

/// Scalar payload of a non-container value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// Typed null of a scalar type, e.g. `null.int`.
    Null(IonType),
    Bool(bool),
    Int(i64),
    Float(f64),
    Symbol(String),
    String(String),
    Blob(Vec<u8>),
    /// Decimal, timestamp or clob payload kept verbatim.
    Opaque { ty: IonType, bytes: Vec<u8> },
}

impl Scalar {
    pub fn ion_type(&self) -> IonType {
        match self {
            Scalar::Null(ty) => *ty,
            Scalar::Bool(_) => IonType::Bool,
            Scalar::Int(_) => IonType::Int,
            Scalar::Float(_) => IonType::Float,
            Scalar::Symbol(_) => IonType::Symbol,
            Scalar::String(_) => IonType::String,
            Scalar::Blob(_) => IonType::Blob,
            Scalar::Opaque { ty, .. } => *ty,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null(_))
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Float(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::String(v.to_owned())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::String(v)
    }
}

impl From<Vec<u8>> for Scalar {
    fn from(v: Vec<u8>) -> Self {
        Scalar::Blob(v)
    }
}
