//! Bidirectional cursor that survives structural changes.

use super::{ChildStore, Dom};
use crate::error::{IonError, Result};
use crate::value::ValueId;

/// A list-iterator style cursor over the children of a container.
///
/// The cursor does not borrow the [`Dom`], so the container may be mutated
/// between calls. Before every operation the cursor resynchronizes its
/// `position` against the slot that holds the last element it returned:
/// forward first (something was inserted before it), then backward
/// (something before it was removed). If that element is gone the cursor
/// fails with [`IonError::ConcurrentModification`]; a read-only cursor fails
/// with [`IonError::ReadOnly`] on any discrepancy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    container: ValueId,
    /// Gap index: 0 is before the first child.
    position: usize,
    current: Option<ValueId>,
    last_move_was_previous: bool,
    read_only: bool,
}

impl Dom {
    /// Opens a cursor before the first child of `container`. The cursor is
    /// read-only when the container is locked.
    pub fn cursor(&mut self, container: ValueId) -> Result<Cursor> {
        self.cursor_at(container, 0)
    }

    /// Opens a cursor before the child at `index`; `index` may equal the
    /// child count.
    pub fn cursor_at(&mut self, container: ValueId, index: usize) -> Result<Cursor> {
        self.container_node(container)?;
        self.materialize(container)?;
        let node = self.node(container)?;
        let count = node.store().map_or(0, ChildStore::count);
        if index > count {
            return Err(IonError::InvalidArgument(format!(
                "cursor index {index} out of range for {count} children"
            )));
        }
        Ok(Cursor {
            container,
            position: index,
            current: None,
            last_move_was_previous: false,
            read_only: node.locked,
        })
    }
}

impl Cursor {
    pub fn container(&self) -> ValueId {
        self.container
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn store<'a>(&self, dom: &'a Dom) -> Result<Option<&'a ChildStore>> {
        Ok(dom.container_node(self.container)?.store())
    }

    fn resync(&mut self, dom: &Dom) -> Result<()> {
        let store = self.store(dom)?;
        let count = store.map_or(0, ChildStore::count);
        let slot = |i: usize| store.and_then(|s| s.get(i));

        let Some(current) = self.current else {
            if self.position > count {
                if self.read_only {
                    return Err(IonError::ReadOnly);
                }
                self.position = count;
            }
            return Ok(());
        };

        let expected = if self.last_move_was_previous {
            Some(self.position)
        } else {
            self.position.checked_sub(1)
        };
        if expected.and_then(slot) == Some(current) {
            return Ok(());
        }
        if self.read_only {
            return Err(IonError::ReadOnly);
        }

        let is_current = |i: &usize| slot(*i) == Some(current);
        let found = (self.position..count)
            .find(is_current)
            .or_else(|| (0..self.position.min(count)).rev().find(is_current));
        match found {
            Some(i) if self.last_move_was_previous => self.position = i,
            Some(i) => self.position = i + 1,
            None => return Err(IonError::ConcurrentModification),
        }
        Ok(())
    }

    pub fn has_next(&mut self, dom: &Dom) -> Result<bool> {
        self.resync(dom)?;
        let count = self.store(dom)?.map_or(0, ChildStore::count);
        Ok(self.position < count)
    }

    pub fn has_previous(&mut self, dom: &Dom) -> Result<bool> {
        self.resync(dom)?;
        Ok(self.position > 0)
    }

    /// Index of the element a call to [`Cursor::next`] would return.
    pub fn next_index(&mut self, dom: &Dom) -> Result<usize> {
        self.resync(dom)?;
        Ok(self.position)
    }

    /// Index of the element a call to [`Cursor::previous`] would return.
    pub fn previous_index(&mut self, dom: &Dom) -> Result<Option<usize>> {
        self.resync(dom)?;
        Ok(self.position.checked_sub(1))
    }

    /// Moves forward, returning `None` past the last child.
    pub fn next(&mut self, dom: &Dom) -> Result<Option<ValueId>> {
        self.resync(dom)?;
        let Some(item) = self.store(dom)?.and_then(|s| s.get(self.position)) else {
            return Ok(None);
        };
        self.current = Some(item);
        self.position += 1;
        self.last_move_was_previous = false;
        Ok(Some(item))
    }

    /// Moves backward, returning `None` before the first child.
    pub fn previous(&mut self, dom: &Dom) -> Result<Option<ValueId>> {
        self.resync(dom)?;
        if self.position == 0 {
            return Ok(None);
        }
        let Some(item) = self.store(dom)?.and_then(|s| s.get(self.position - 1)) else {
            return Ok(None);
        };
        self.position -= 1;
        self.current = Some(item);
        self.last_move_was_previous = true;
        Ok(Some(item))
    }

    /// Removes the element last returned by `next` or `previous`.
    pub fn remove(&mut self, dom: &mut Dom) -> Result<()> {
        if self.read_only || dom.node(self.container)?.locked {
            return Err(IonError::ReadOnly);
        }
        self.resync(dom)?;
        let Some(current) = self.current else {
            return Err(IonError::InvalidArgument(
                "cursor has no current element".to_owned(),
            ));
        };
        let index = if self.last_move_was_previous {
            self.position
        } else {
            self.position - 1
        };
        let element_id = dom.node(current)?.element_id;
        if element_id != index {
            return Err(IonError::InvariantViolation(format!(
                "{current} sits at {index} but claims element id {element_id}"
            )));
        }
        dom.remove_child_at(self.container, index, current)?;
        if !self.last_move_was_previous {
            self.position -= 1;
        }
        self.current = None;
        Ok(())
    }
}
