//! Lazy, mutable Ion containers over a shared binary buffer.
//!
//! A [`Dom`] owns every value. Streams loaded from Ion 1.0 binary keep their
//! encoded bytes and are parsed one container at a time, on first structural
//! access. Mutations mark values dirty; [`Dom::flush`] then patches the
//! stream's buffer in place, re-encoding only the values that changed and
//! shifting the offsets of everything after them.
//!
//! # Example
//!
//! ```
//! use ion_tree::Dom;
//!
//! let mut dom = Dom::new();
//! // IVM, then the list [1]
//! let stream = dom.load(vec![0xe0, 0x01, 0x00, 0xea, 0xb2, 0x21, 0x01]).unwrap();
//! let list = dom.get(stream, 0).unwrap();
//! let two = dom.new_scalar(2i64).unwrap();
//! dom.add(list, two).unwrap();
//!
//! let bytes = dom.flush(stream).unwrap();
//! assert_eq!(bytes, [0xe0, 0x01, 0x00, 0xea, 0xb4, 0x21, 0x01, 0x21, 0x02]);
//! ```

pub mod binary;
mod config;
mod dom;
mod error;
mod position;
mod symbols;
mod value;

pub use config::Config;
pub use dom::store::next_size;
pub use dom::{ChildStore, Cursor, Dom};
pub use error::{DecodeError, IonError, Result};
pub use position::Position;
pub use symbols::SymbolTable;
pub use value::{ContainerKind, IonType, Scalar, ValueId};
