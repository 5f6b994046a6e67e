//! Buffer-to-tree promotion.

use tracing::debug;

use super::{Body, Buffer, BufferId, ChildStore, Dom, Node};
use crate::binary::constants::ION_BVM;
use crate::binary::decode::{self, Entry, Header};
use crate::error::{DecodeError, IonError, Result};
use crate::position::Position;
use crate::symbols::SymbolTable;
use crate::value::{ContainerKind, IonType, ValueId};

/// A child header with its symbols already resolved to text.
struct ParsedChild {
    header: Header,
    ion_type: IonType,
    field_name: Option<String>,
    annotations: Vec<String>,
}

impl Dom {
    /// Binds a new stream to `bytes`. Only the stream prefix is read; the
    /// values are parsed on first access unless the config asks for eager
    /// loading.
    pub fn load(&mut self, bytes: impl Into<Vec<u8>>) -> Result<ValueId> {
        let bytes = bytes.into();
        let (value_start, symbols) = decode::read_stream_prefix(&bytes)?;
        let len = bytes.len();
        let buffer = self.push_buffer(Buffer {
            bytes,
            symbols,
            poisoned: false,
        });

        let stream = self.alloc(Node {
            ion_type: IonType::Datagram,
            container: None,
            element_id: 0,
            field_name: None,
            annotations: Vec::new(),
            has_native_value: false,
            dirty: false,
            locked: false,
            buffer: Some(buffer),
            position: Some(Position {
                entry_start: 0,
                type_desc_start: 0,
                value_start,
                next_value_offset: len,
                type_desc: ION_BVM[0],
            }),
            body: Body::Container {
                kind: ContainerKind::Stream,
                children: None,
            },
        });
        debug!(target: "ion_tree", %stream, len, value_start, "loaded stream");

        if self.config.materialize_on_load {
            if let Err(err) = self.deep_materialize(stream) {
                self.release(stream)?;
                return Err(err);
            }
        }
        Ok(stream)
    }

    /// Promotes a buffer-backed value to its native form. No-op when the
    /// value is already native.
    ///
    /// For containers this runs the parse loop over the payload, creating
    /// one unparsed child per header. On a decode error the children read
    /// so far stay in place and the container is left native and dirty.
    /// Nothing is decoded from a buffer whose last flush failed.
    pub fn materialize(&mut self, id: ValueId) -> Result<()> {
        let node = self.node(id)?;
        if node.has_native_value {
            return Ok(());
        }
        let (Some(buffer), Some(position)) = (node.buffer, node.position) else {
            return Err(IonError::InvariantViolation(format!(
                "{id} has no native value and no buffer"
            )));
        };
        if self.buffer(buffer)?.poisoned {
            return Err(IonError::BufferPoisoned);
        }
        match node.kind() {
            Some(kind) => self.materialize_container(id, kind, buffer, position),
            None => self.materialize_scalar(id, buffer, position),
        }
    }

    fn materialize_scalar(
        &mut self,
        id: ValueId,
        buffer: BufferId,
        position: Position,
    ) -> Result<()> {
        let buf = self.buffer(buffer)?;
        let value = decode::decode_scalar(&buf.bytes, &position, &buf.symbols)?;
        let node = self.node_mut(id)?;
        node.body = Body::Scalar(Some(value));
        node.has_native_value = true;
        Ok(())
    }

    fn materialize_container(
        &mut self,
        id: ValueId,
        kind: ContainerKind,
        buffer: BufferId,
        position: Position,
    ) -> Result<()> {
        if kind != ContainerKind::Stream && position.is_null() {
            let node = self.node_mut(id)?;
            node.body = Body::Container {
                kind,
                children: None,
            };
            node.has_native_value = true;
            return Ok(());
        }

        let (parsed, failure) = {
            let buf = self.buffer(buffer)?;
            scan_children(&buf.bytes, &buf.symbols, kind, &position)
        };

        {
            let node = self.node_mut(id)?;
            node.body = Body::Container {
                kind,
                children: Some(ChildStore::new(kind)),
            };
            node.has_native_value = true;
        }

        for child in parsed {
            let child_id = self.alloc(Node {
                ion_type: child.ion_type,
                container: Some(id),
                element_id: 0,
                field_name: child.field_name,
                annotations: child.annotations,
                has_native_value: false,
                dirty: false,
                locked: false,
                buffer: Some(buffer),
                position: Some(child.header.position),
                body: match ContainerKind::from_ion_type(child.ion_type) {
                    Some(kind) => Body::Container {
                        kind,
                        children: None,
                    },
                    None => Body::Scalar(None),
                },
            });
            let node = self.node_mut(id)?;
            let store = node.store_mut().ok_or_else(|| {
                IonError::InvariantViolation(format!("{id} lost its children"))
            })?;
            let index = store.count();
            store.insert_at(index, child_id);
            self.node_mut(child_id)?.element_id = index;
        }

        if let Some(err) = failure {
            self.node_mut(id)?.dirty = true;
            debug!(target: "ion_tree", %id, error = %err, "materialize failed");
            return Err(err.into());
        }

        let count = self.node(id)?.store().map_or(0, ChildStore::count);
        debug!(target: "ion_tree", %id, ?kind, count, "materialized container");
        Ok(())
    }

    /// Materializes `id` and every value below it.
    pub fn deep_materialize(&mut self, id: ValueId) -> Result<()> {
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            self.materialize(next)?;
            let children = self.node(next)?.child_ids();
            stack.extend(children.into_iter().rev());
        }
        Ok(())
    }
}

/// Reads the child headers of a container payload. Returns the children read
/// before the first error along with that error.
fn scan_children(
    bytes: &[u8],
    symbols: &SymbolTable,
    kind: ContainerKind,
    position: &Position,
) -> (Vec<ParsedChild>, Option<DecodeError>) {
    let mut parsed = Vec::new();
    let mut at = position.value_start;
    let end = position.next_value_offset;
    while at < end {
        match scan_one(bytes, symbols, kind, at, end) {
            Ok((next, child)) => {
                at = next;
                parsed.extend(child);
            }
            Err(err) => return (parsed, Some(err)),
        }
    }
    (parsed, None)
}

fn scan_one(
    bytes: &[u8],
    symbols: &SymbolTable,
    kind: ContainerKind,
    at: usize,
    end: usize,
) -> std::result::Result<(usize, Option<ParsedChild>), DecodeError> {
    let in_stream = kind == ContainerKind::Stream;
    if in_stream && decode::is_version_marker(bytes, at) {
        return Err(DecodeError::UnsupportedSystemValue(at));
    }
    let header = match decode::read_entry(bytes, at, end, kind == ContainerKind::Struct)? {
        Entry::Pad { next_value_offset } => return Ok((next_value_offset, None)),
        Entry::Value(header) => header,
    };
    if in_stream && header.is_local_symbol_table() {
        return Err(DecodeError::UnsupportedSystemValue(at));
    }
    let type_desc = header.position.type_desc;
    let ion_type = header
        .ion_type()
        .ok_or(DecodeError::InvalidTypeDescriptor(type_desc))?;
    let field_name = header
        .field_sid
        .map(|sid| resolve(symbols, sid))
        .transpose()?;
    let annotations = header
        .annotation_sids
        .iter()
        .map(|&sid| resolve(symbols, sid))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let next = header.position.next_value_offset;
    Ok((
        next,
        Some(ParsedChild {
            header,
            ion_type,
            field_name,
            annotations,
        }),
    ))
}

fn resolve(symbols: &SymbolTable, sid: u32) -> std::result::Result<String, DecodeError> {
    symbols
        .get_text(sid)
        .map(str::to_owned)
        .ok_or(DecodeError::UnknownSymbol(sid))
}
