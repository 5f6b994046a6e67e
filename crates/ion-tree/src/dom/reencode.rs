//! Incremental re-encoder.
//!
//! Flushing a stream patches its buffer in place. A first pass interns the
//! symbols of the materialized values, marks the ancestors of changed values
//! dirty and computes the encoded size of each changed value. A second,
//! pre-order pass walks the tree with a write cursor and a cumulative byte
//! delta:
//!
//! * a clean value that already has a position only has its offsets (and
//!   those of its materialized descendants) shifted by the delta;
//! * a new value inserts its encoding at the cursor;
//! * a dirty value that had a position gets its header rewritten in place,
//!   growing or shrinking the buffer by the difference, then writes its
//!   children and drops any stale bytes left before its old end.
//!
//! The delta always maps an offset of the old layout at or past the cursor
//! to its offset in the new layout.

use std::collections::HashMap;
use std::mem;

use ion_tree_buffers::Writer;
use tracing::{debug, trace};

use super::{Body, Buffer, BufferId, Dom};
use crate::binary::constants::ION_BVM;
use crate::binary::encode::{
    encode_header, encode_scalar, encode_stream_prefix, EncodedHeader, TypeDesc,
};
use crate::error::{IonError, Result};
use crate::position::{offset_by, Position};
use crate::symbols::SymbolTable;
use crate::value::{ContainerKind, Scalar, ValueId};

/// Encoding decided for a value that has to be (re)written.
#[derive(Debug)]
struct Planned {
    header: EncodedHeader,
    payload_len: usize,
    /// Scalar payload; containers write their children instead.
    payload: Option<Vec<u8>>,
}

impl Planned {
    fn entry_len(&self) -> usize {
        self.header.bytes.len() + self.payload_len
    }
}

type Plan = HashMap<ValueId, Planned>;

impl Dom {
    /// Brings the buffer of `stream` up to date with its tree and returns the
    /// encoded bytes. A stream that was never loaded gets a buffer on its
    /// first flush.
    ///
    /// If writing fails half way the buffer is poisoned and every later flush
    /// fails with [`IonError::BufferPoisoned`].
    pub fn flush(&mut self, stream: ValueId) -> Result<&[u8]> {
        let node = self.container_node(stream)?;
        if node.kind() != Some(ContainerKind::Stream) {
            return Err(IonError::InvalidArgument(format!(
                "{stream} is not a stream"
            )));
        }
        let existing = node.buffer;
        let mut symbols = match existing {
            Some(b) => {
                let buffer = self.buffer(b)?;
                if buffer.poisoned {
                    return Err(IonError::BufferPoisoned);
                }
                buffer.symbols.clone()
            }
            None => SymbolTable::new(),
        };

        let mut plan = Plan::new();
        if !self.plan_value(stream, false, &mut symbols, &mut plan)? {
            return self.flushed_bytes(stream);
        }
        if symbols.has_user_symbols() && !self.config.write_symbol_table {
            return Err(IonError::InvalidArgument(
                "stream needs a local symbol table but writing one is disabled".to_owned(),
            ));
        }

        let payload_len = plan.get(&stream).map_or(0, |p| p.payload_len);
        let prefix = encode_stream_prefix(&symbols, self.config.write_symbol_table);
        plan.insert(
            stream,
            Planned {
                header: EncodedHeader {
                    bytes: prefix,
                    type_desc_offset: 0,
                    type_desc: ION_BVM[0],
                },
                payload_len,
                payload: None,
            },
        );

        let buffer_id = match existing {
            Some(b) => b,
            None => self.push_buffer(Buffer::default()),
        };
        self.node_mut(stream)?.buffer = Some(buffer_id);
        let Some(buffer) = self.buffers[buffer_id.0].as_mut() else {
            return Err(IonError::InvariantViolation(
                "stream buffer is gone".to_owned(),
            ));
        };
        let bytes = mem::take(&mut buffer.bytes);
        let before = bytes.len();
        let mut writer = Writer::from_vec(bytes);
        debug!(target: "ion_tree", %stream, len = before, changed = plan.len(), "flush started");

        let result = self.write_value(&mut writer, buffer_id, &plan, stream, 0);
        let buffer = self.buffers[buffer_id.0].get_or_insert_with(Buffer::default);
        buffer.bytes = writer.into_inner();
        if let Err(err) = result {
            buffer.poisoned = true;
            debug!(target: "ion_tree", %stream, error = %err, "flush failed, buffer poisoned");
            return Err(err);
        }
        buffer.symbols = symbols;
        debug!(target: "ion_tree", %stream, before, after = buffer.bytes.len(), "flush finished");

        if self.config.verify_after_flush {
            self.verify_positions(stream)?;
        }
        self.flushed_bytes(stream)
    }

    fn flushed_bytes(&self, stream: ValueId) -> Result<&[u8]> {
        self.bytes(stream)?.ok_or_else(|| {
            IonError::InvariantViolation(format!("{stream} has no buffer after flush"))
        })
    }

    // ----------------------------------------------------------------
    // Planning

    /// Plans the encoding of `id` and its subtree. Returns `true` when
    /// anything in the subtree has to be written, in which case `id` is
    /// marked dirty too.
    ///
    /// Values bound to this buffer already have their symbols in the table,
    /// so interning them again only looks their ids up.
    fn plan_value(
        &mut self,
        id: ValueId,
        in_struct: bool,
        symbols: &mut SymbolTable,
        plan: &mut Plan,
    ) -> Result<bool> {
        let node = self.node(id)?;
        if !node.has_native_value {
            if node.position.is_none() {
                return Err(IonError::InvariantViolation(format!(
                    "{id} is neither native nor positioned"
                )));
            }
            return Ok(false);
        }

        let field_sid = match (in_struct, node.field_name.as_deref()) {
            (true, Some(name)) => Some(symbols.intern(name)),
            (true, None) => {
                return Err(IonError::InvariantViolation(format!(
                    "struct member {id} has no field name"
                )))
            }
            (false, _) => None,
        };
        let mut annotation_sids = Vec::with_capacity(node.annotations.len());
        for annotation in &node.annotations {
            annotation_sids.push(symbols.intern(annotation));
        }
        if let Body::Scalar(Some(Scalar::Symbol(text))) = &node.body {
            symbols.intern(text);
        }

        let kind = node.kind();
        let children = node.child_ids();
        let mut needs_write = node.dirty || node.position.is_none();
        for &child in &children {
            let in_struct = kind == Some(ContainerKind::Struct);
            needs_write |= self.plan_value(child, in_struct, symbols, plan)?;
        }
        if !needs_write {
            return Ok(false);
        }

        let children_len = self.children_len(&children, plan)?;
        self.node_mut(id)?.dirty = true;
        let planned = match (&self.node(id)?.body, kind) {
            (_, Some(ContainerKind::Stream)) => Planned {
                header: EncodedHeader {
                    bytes: Vec::new(),
                    type_desc_offset: 0,
                    type_desc: ION_BVM[0],
                },
                payload_len: children_len,
                payload: None,
            },
            (Body::Container { children: None, .. }, Some(kind)) => {
                let desc = TypeDesc::null(kind.ion_type().type_code());
                Planned {
                    header: encode_header(field_sid, &annotation_sids, desc, 0),
                    payload_len: 0,
                    payload: None,
                }
            }
            (Body::Container { .. }, Some(kind)) => {
                let desc = TypeDesc::for_length(kind.ion_type().type_code(), children_len);
                Planned {
                    header: encode_header(field_sid, &annotation_sids, desc, children_len),
                    payload_len: children_len,
                    payload: None,
                }
            }
            (Body::Scalar(Some(value)), _) => {
                let body = encode_scalar(value, symbols)?;
                let len = body.payload.len();
                Planned {
                    header: encode_header(field_sid, &annotation_sids, body.desc, len),
                    payload_len: len,
                    payload: Some(body.payload),
                }
            }
            _ => {
                return Err(IonError::InvariantViolation(format!(
                    "{id} is native but has no value"
                )))
            }
        };
        plan.insert(id, planned);
        Ok(true)
    }

    fn children_len(&self, children: &[ValueId], plan: &Plan) -> Result<usize> {
        let mut len = 0;
        for child in children {
            len += match plan.get(child) {
                Some(planned) => planned.entry_len(),
                None => self
                    .node(*child)?
                    .position
                    .map(|p| p.entry_len())
                    .ok_or_else(|| {
                        IonError::InvariantViolation(format!("{child} was not planned"))
                    })?,
            };
        }
        Ok(len)
    }

    // ----------------------------------------------------------------
    // Writing

    /// Writes `id` at the cursor and returns the updated delta.
    fn write_value(
        &mut self,
        w: &mut Writer,
        buffer: BufferId,
        plan: &Plan,
        id: ValueId,
        delta: isize,
    ) -> Result<isize> {
        let old = self.node(id)?.position;
        match (old, plan.get(&id)) {
            (Some(old), None) => {
                self.shift_subtree(id, delta)?;
                w.set_position(offset_by(old.next_value_offset, delta))?;
                trace!(target: "ion_tree", %id, delta, "shifted");
                Ok(delta)
            }
            (None, Some(planned)) => self.write_new(w, buffer, plan, id, planned, delta),
            (Some(old), Some(planned)) => {
                self.rewrite_old(w, buffer, plan, id, old, planned, delta)
            }
            (None, None) => Err(IonError::InvariantViolation(format!(
                "{id} has no position and was not planned"
            ))),
        }
    }

    fn write_new(
        &mut self,
        w: &mut Writer,
        buffer: BufferId,
        plan: &Plan,
        id: ValueId,
        planned: &Planned,
        mut delta: isize,
    ) -> Result<isize> {
        let start = w.position();
        w.insert_buf(&planned.header.bytes)?;
        delta += planned.header.bytes.len() as isize;
        let value_start = w.position();
        match &planned.payload {
            Some(payload) => {
                w.insert_buf(payload)?;
                delta += payload.len() as isize;
            }
            None => {
                let children = self.node(id)?.child_ids();
                for child in children {
                    delta = self.write_value(w, buffer, plan, child, delta)?;
                }
            }
        }
        trace!(target: "ion_tree", %id, start, len = w.position() - start, "inserted");
        self.finish(w, buffer, id, planned, start, value_start)?;
        Ok(delta)
    }

    #[allow(clippy::too_many_arguments)]
    fn rewrite_old(
        &mut self,
        w: &mut Writer,
        buffer: BufferId,
        plan: &Plan,
        id: ValueId,
        old: Position,
        planned: &Planned,
        mut delta: isize,
    ) -> Result<isize> {
        let start = offset_by(old.entry_start, delta);
        if start != w.position() {
            return Err(IonError::InvariantViolation(format!(
                "{id} starts at {start} but the cursor is at {}",
                w.position()
            )));
        }

        if let Some(payload) = &planned.payload {
            let (old_len, new_len) = (old.entry_len(), planned.entry_len());
            delta += resize_at_cursor(w, old_len, new_len)?;
            w.buf(&planned.header.bytes)?;
            let value_start = w.position();
            w.buf(payload)?;
            trace!(target: "ion_tree", %id, start, old_len, new_len, "rewrote scalar");
            self.finish(w, buffer, id, planned, start, value_start)?;
            return Ok(delta);
        }

        let overlap = resize_at_cursor(w, old.header_len(), planned.header.bytes.len())?;
        delta += overlap;
        w.buf(&planned.header.bytes)?;
        let value_start = w.position();
        if overlap != 0 {
            trace!(target: "ion_tree", %id, overlap, "header resized");
        }

        let children = self.node(id)?.child_ids();
        for child in children {
            if let Some(child_old) = self.node(child)?.position {
                let child_start = offset_by(child_old.entry_start, delta);
                delta -= drop_stale(w, child_start, id)? as isize;
            }
            delta = self.write_value(w, buffer, plan, child, delta)?;
        }
        delta -= drop_stale(w, offset_by(old.next_value_offset, delta), id)? as isize;

        trace!(target: "ion_tree", %id, start, delta, "rewrote container");
        self.finish(w, buffer, id, planned, start, value_start)?;
        Ok(delta)
    }

    /// Records the new position of a written value and marks it clean.
    fn finish(
        &mut self,
        w: &Writer,
        buffer: BufferId,
        id: ValueId,
        planned: &Planned,
        start: usize,
        value_start: usize,
    ) -> Result<()> {
        let next_value_offset = w.position();
        if next_value_offset - value_start != planned.payload_len {
            return Err(IonError::InvariantViolation(format!(
                "{id} wrote {} payload bytes, planned {}",
                next_value_offset - value_start,
                planned.payload_len
            )));
        }
        let node = self.node_mut(id)?;
        node.position = Some(Position {
            entry_start: start,
            type_desc_start: start + planned.header.type_desc_offset,
            value_start,
            next_value_offset,
            type_desc: planned.header.type_desc,
        });
        node.buffer = Some(buffer);
        node.dirty = false;
        Ok(())
    }

    /// Moves the offsets of a clean subtree by `delta`.
    fn shift_subtree(&mut self, id: ValueId, delta: isize) -> Result<()> {
        if delta == 0 {
            return Ok(());
        }
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            let node = self.node_mut(next)?;
            if let Some(position) = node.position.as_mut() {
                position.shift(delta);
            }
            stack.extend(node.child_ids());
        }
        Ok(())
    }

    // ----------------------------------------------------------------
    // Verification

    /// Checks the position metadata of the materialized tree under `id`
    /// against its buffer.
    pub(crate) fn verify_positions(&self, id: ValueId) -> Result<()> {
        let violation = |msg: String| Err(IonError::InvariantViolation(msg));
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            let node = self.node(next)?;
            let Some(pos) = node.position else {
                return violation(format!("{next} has no position after flush"));
            };
            if node.dirty {
                return violation(format!("{next} is still dirty after flush"));
            }
            if !pos.is_ordered() {
                return violation(format!("{next} has unordered offsets {pos:?}"));
            }
            if node.kind() != Some(ContainerKind::Stream) {
                let bytes = match node.buffer {
                    Some(b) => &self.buffer(b)?.bytes,
                    None => return violation(format!("{next} has no buffer")),
                };
                if bytes.get(pos.type_desc_start) != Some(&pos.type_desc) {
                    return violation(format!("{next} type descriptor moved"));
                }
            }
            let mut cursor = pos.value_start;
            for (i, child) in node.child_ids().into_iter().enumerate() {
                let child_node = self.node(child)?;
                if child_node.element_id != i || child_node.container != Some(next) {
                    return violation(format!("{child} is not child {i} of {next}"));
                }
                let Some(child_pos) = child_node.position else {
                    return violation(format!("{child} has no position after flush"));
                };
                if child_pos.entry_start < cursor
                    || child_pos.next_value_offset > pos.next_value_offset
                {
                    return violation(format!("{child} lies outside its slot in {next}"));
                }
                cursor = child_pos.next_value_offset;
                stack.push(child);
            }
        }
        Ok(())
    }
}

/// Grows or shrinks the region at the cursor from `old_len` to `new_len`
/// bytes and returns the change.
fn resize_at_cursor(w: &mut Writer, old_len: usize, new_len: usize) -> Result<isize> {
    if new_len > old_len {
        w.insert(new_len - old_len)?;
    } else if old_len > new_len {
        w.remove(old_len - new_len)?;
    }
    Ok(new_len as isize - old_len as isize)
}

/// Removes the bytes between the cursor and `until`, left behind by removed
/// children or padding. Returns how many were removed.
fn drop_stale(w: &mut Writer, until: usize, container: ValueId) -> Result<usize> {
    let at = w.position();
    if until < at {
        return Err(IonError::InvariantViolation(format!(
            "{container} overran its old encoding: cursor {at}, old end {until}"
        )));
    }
    let stale = until - at;
    if stale > 0 {
        w.remove(stale)?;
        trace!(target: "ion_tree", %container, at, stale, "dropped stale bytes");
    }
    Ok(stale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::IonType;

    fn stream(values: &[u8]) -> Vec<u8> {
        let mut bytes = ION_BVM.to_vec();
        bytes.extend_from_slice(values);
        bytes
    }

    #[test]
    fn fresh_stream_flushes_from_scratch() {
        let mut dom = Dom::new();
        let s = dom.new_stream();
        let list = dom.new_list();
        let one = dom.new_scalar(1i64).unwrap();
        dom.add(list, one).unwrap();
        dom.add(s, list).unwrap();
        let bytes = dom.flush(s).unwrap().to_vec();
        assert_eq!(bytes, stream(&[0xb2, 0x21, 0x01]));
        assert!(!dom.is_dirty(list).unwrap());
        assert_eq!(dom.position(one).unwrap().map(|p| p.value_start), Some(7));
    }

    #[test]
    fn untouched_stream_round_trips() {
        let input = stream(&[0x21, 0x01, 0xb3, 0x21, 0x02, 0x10, 0x02, 0x00, 0x00]);
        let mut dom = Dom::new();
        let s = dom.load(input.clone()).unwrap();
        dom.deep_materialize(s).unwrap();
        assert_eq!(dom.flush(s).unwrap(), input.as_slice());
    }

    #[test]
    fn removal_drops_bytes_and_pads() {
        let mut dom = Dom::new();
        let s = dom.load(stream(&[0xb6, 0x21, 0x01, 0x01, 0x00, 0x21, 0x02])).unwrap();
        let list = dom.get(s, 0).unwrap();
        let first = dom.get(list, 0).unwrap();
        dom.remove(list, first).unwrap();
        assert_eq!(
            dom.flush(s).unwrap(),
            stream(&[0xb2, 0x21, 0x02]).as_slice()
        );
    }

    #[test]
    fn header_grows_into_varuint_length() {
        let mut dom = Dom::new();
        let mut values = vec![0xbd, 0x8b];
        values.extend_from_slice(b"abcdefghijk");
        values.push(0x20);
        let s = dom.load(stream(&values)).unwrap();
        let list = dom.get(s, 0).unwrap();
        let one = dom.new_scalar(1i64).unwrap();
        dom.add(list, one).unwrap();
        let bytes = dom.flush(s).unwrap().to_vec();
        assert_eq!(&bytes[4..6], &[0xbe, 0x8f]);
        assert_eq!(bytes.len(), 4 + 2 + 15);
        let string = dom.get(list, 0).unwrap();
        assert_eq!(
            dom.position(string).unwrap().map(|p| p.entry_start),
            Some(6)
        );
    }

    #[test]
    fn symbols_grow_the_prefix() {
        let mut dom = Dom::new();
        let s = dom.load(stream(&[0x20])).unwrap();
        let st = dom.new_struct();
        let v = dom.new_symbol("hello");
        dom.add_field(st, "greeting", v).unwrap();
        dom.add(s, st).unwrap();
        let bytes = dom.flush(s).unwrap().to_vec();

        let mut reloaded = Dom::new();
        let again = reloaded.load(bytes).unwrap();
        let st = reloaded.get(again, 1).unwrap();
        let v = reloaded.get_field(st, "greeting").unwrap().unwrap();
        assert_eq!(reloaded.scalar(v).unwrap(), &Scalar::Symbol("hello".into()));
    }

    #[test]
    fn disabled_symbol_table_is_reported() {
        let mut dom = Dom::with_config(crate::Config {
            write_symbol_table: false,
            ..Default::default()
        });
        let s = dom.new_stream();
        let v = dom.new_symbol("unknown");
        dom.add(s, v).unwrap();
        assert!(matches!(dom.flush(s), Err(IonError::InvalidArgument(_))));
        assert_eq!(dom.bytes(s).unwrap(), None);
    }

    #[test]
    fn verify_after_flush_accepts_a_consistent_tree() {
        let mut dom = Dom::with_config(crate::Config {
            verify_after_flush: true,
            ..Default::default()
        });
        let s = dom.load(stream(&[0xb4, 0x21, 0x01, 0x21, 0x02, 0x20])).unwrap();
        let list = dom.get(s, 0).unwrap();
        let null = dom.new_scalar(Scalar::Null(IonType::String)).unwrap();
        dom.insert(list, 0, null).unwrap();
        dom.flush(s).unwrap();
        dom.verify_positions(s).unwrap();
    }

    #[test]
    fn failed_write_poisons_the_buffer() {
        let mut dom = Dom::new();
        let s = dom.load(stream(&[0xb2, 0x21, 0x01, 0x21, 0x05])).unwrap();
        let list = dom.get(s, 0).unwrap();
        let five = dom.get(s, 1).unwrap();
        let one = dom.get(list, 0).unwrap();
        dom.node_mut(list).unwrap().dirty = true;
        if let Some(p) = dom.node_mut(one).unwrap().position.as_mut() {
            p.entry_start = 0;
        }
        assert!(matches!(dom.flush(s), Err(IonError::InvariantViolation(_))));
        assert_eq!(dom.flush(s), Err(IonError::BufferPoisoned));
        assert_eq!(dom.scalar(five), Err(IonError::BufferPoisoned));
    }

    #[test]
    fn flushing_a_list_is_rejected() {
        let mut dom = Dom::new();
        let list = dom.new_list();
        assert!(matches!(dom.flush(list), Err(IonError::InvalidArgument(_))));
    }
}
