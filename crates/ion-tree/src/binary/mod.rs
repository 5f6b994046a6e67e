//! Ion 1.0 binary codec for value headers and scalar payloads.

pub mod constants;
pub mod decode;
pub mod encode;

pub use decode::{decode_scalar, read_entry, read_stream_prefix, Entry, Header};
pub use encode::{encode_header, encode_scalar, encode_stream_prefix, EncodedHeader, TypeDesc};
