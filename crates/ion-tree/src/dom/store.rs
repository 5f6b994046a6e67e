//! Order-preserving child array with per-kind growth.

use crate::value::{ContainerKind, ValueId};

/// Growable array of child handles.
///
/// The backing array is over-allocated according to the container kind;
/// `slots.len()` is the capacity and every slot at or past `count` is `None`.
/// Element ids are not touched here; callers renumber after
/// [`ChildStore::insert_at`] and [`ChildStore::remove_at`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildStore {
    kind: ContainerKind,
    slots: Vec<Option<ValueId>>,
    count: usize,
}

impl ChildStore {
    /// Empty store with zero capacity; the first insert allocates.
    pub fn new(kind: ContainerKind) -> Self {
        Self {
            kind,
            slots: Vec::new(),
            count: 0,
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn get(&self, i: usize) -> Option<ValueId> {
        if i < self.count {
            self.slots[i]
        } else {
            None
        }
    }

    /// Replaces the live entry at `i`, returning the previous handle.
    pub fn set(&mut self, i: usize, v: ValueId) -> Option<ValueId> {
        if i >= self.count {
            return None;
        }
        self.slots[i].replace(v)
    }

    /// Inserts `v` at `i` (`i <= count`), shifting `[i, count)` right.
    /// Returns `false` when `i` is out of range.
    pub fn insert_at(&mut self, i: usize, v: ValueId) -> bool {
        if i > self.count {
            return false;
        }
        if self.count >= self.slots.len() {
            let new_len = next_size(self.kind, self.slots.len());
            self.slots.resize(new_len, None);
        }
        self.slots[i..=self.count].rotate_right(1);
        self.slots[i] = Some(v);
        self.count += 1;
        true
    }

    /// Removes the entry at `i`, shifting `[i + 1, count)` left. The vacated
    /// tail slot is cleared.
    pub fn remove_at(&mut self, i: usize) -> Option<ValueId> {
        if i >= self.count {
            return None;
        }
        let removed = self.slots[i].take();
        self.slots[i..self.count].rotate_left(1);
        self.count -= 1;
        self.slots[self.count] = None;
        removed
    }

    /// Drops every entry but keeps the allocation.
    pub fn clear(&mut self) {
        for slot in &mut self.slots[..self.count] {
            *slot = None;
        }
        self.count = 0;
    }

    /// Index of `v`, compared by identity.
    pub fn index_of(&self, v: ValueId) -> Option<usize> {
        self.iter().position(|id| id == v)
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = ValueId> + '_ {
        self.slots[..self.count].iter().flatten().copied()
    }
}

fn initial_size(kind: ContainerKind) -> usize {
    match kind {
        ContainerKind::List => 1,
        ContainerKind::Sexp => 4,
        ContainerKind::Struct => 5,
        ContainerKind::Stream => 3,
    }
}

/// Capacity after the next growth step from `current`.
pub fn next_size(kind: ContainerKind, current: usize) -> usize {
    if current == 0 {
        return initial_size(kind);
    }
    match kind {
        ContainerKind::List | ContainerKind::Struct if current < 8 => current + 1,
        ContainerKind::Stream if current < 4 => 8,
        _ => current * 2,
    }
}
