//! Structural and value mutations.
//!
//! Every mutator checks the lock first and validates its arguments before
//! touching the tree, so a failed call leaves the container unchanged.
//! Mutations mark only the mutated node dirty; ancestors are marked when the
//! stream is flushed.

use super::{Body, ChildStore, Dom};
use crate::binary::encode::validate_scalar;
use crate::error::{IonError, Result};
use crate::value::{ContainerKind, Scalar, ValueId};

impl Dom {
    fn check_for_lock(&self, id: ValueId) -> Result<()> {
        if self.node(id)?.locked {
            return Err(IonError::ReadOnly);
        }
        Ok(())
    }

    /// Checks that `child` may be inserted into `container`.
    pub(crate) fn validate_new_child(&self, container: ValueId, child: ValueId) -> Result<()> {
        let node = self.try_node(child).ok_or(IonError::NullChild)?;
        if node.container.is_some() {
            return Err(IonError::AlreadyContained);
        }
        if node.locked {
            return Err(IonError::ReadOnly);
        }
        if node.kind() == Some(ContainerKind::Stream) {
            return Err(IonError::InvalidArgument(
                "a stream cannot be inserted into another container".to_owned(),
            ));
        }
        let mut cursor = Some(container);
        while let Some(ancestor) = cursor {
            if ancestor == child {
                return Err(IonError::InvalidArgument(
                    "a value cannot be inserted into itself or its descendants".to_owned(),
                ));
            }
            cursor = self.node(ancestor)?.container;
        }
        Ok(())
    }

    /// Appends `child` to a list, sexp or stream.
    pub fn add(&mut self, container: ValueId, child: ValueId) -> Result<()> {
        self.check_insert(container, child, None)?;
        self.materialize(container)?;
        let index = self.node(container)?.store().map_or(0, ChildStore::count);
        self.insert_child(container, index, child)
    }

    /// Inserts `child` at `index`, shifting later children right.
    pub fn insert(&mut self, container: ValueId, index: usize, child: ValueId) -> Result<()> {
        self.check_insert(container, child, None)?;
        self.materialize(container)?;
        let count = self.node(container)?.store().map_or(0, ChildStore::count);
        if index > count {
            return Err(IonError::InvalidArgument(format!(
                "index {index} out of range for {count} children"
            )));
        }
        self.insert_child(container, index, child)
    }

    /// Appends `child` to a struct under `name`.
    pub fn add_field(&mut self, container: ValueId, name: &str, child: ValueId) -> Result<()> {
        self.check_insert(container, child, Some(name))?;
        self.materialize(container)?;
        let index = self.node(container)?.store().map_or(0, ChildStore::count);
        self.insert_child(container, index, child)?;
        self.node_mut(child)?.field_name = Some(name.to_owned());
        Ok(())
    }

    /// First member of a struct named `name`.
    pub fn get_field(&mut self, container: ValueId, name: &str) -> Result<Option<ValueId>> {
        if self.container_node(container)?.kind() != Some(ContainerKind::Struct) {
            return Err(IonError::InvalidArgument(format!(
                "{container} is not a struct"
            )));
        }
        self.materialize(container)?;
        let node = self.node(container)?;
        let Some(store) = node.store() else {
            return Ok(None);
        };
        for child in store.iter() {
            if self.node(child)?.field_name.as_deref() == Some(name) {
                return Ok(Some(child));
            }
        }
        Ok(None)
    }

    fn check_insert(&self, container: ValueId, child: ValueId, field: Option<&str>) -> Result<()> {
        let kind = self.container_node(container)?.kind();
        self.check_for_lock(container)?;
        self.validate_new_child(container, child)?;
        match (kind, field) {
            (Some(ContainerKind::Struct), None) => Err(IonError::InvalidArgument(
                "struct members need a field name".to_owned(),
            )),
            (Some(ContainerKind::Struct), Some(_)) => Ok(()),
            (_, Some(_)) => Err(IonError::InvalidArgument(format!(
                "{container} is not a struct"
            ))),
            (_, None) => Ok(()),
        }
    }

    /// Grafts an already validated child. The child is first cut loose from
    /// any buffer so that it is owned afresh by `container`.
    fn insert_child(&mut self, container: ValueId, index: usize, child: ValueId) -> Result<()> {
        self.detach_from_buffer(child)?;

        let node = self.node_mut(container)?;
        if let Body::Container {
            kind,
            children: children @ None,
        } = &mut node.body
        {
            *children = Some(ChildStore::new(*kind));
        }
        let inserted = node
            .store_mut()
            .map(|store| store.insert_at(index, child))
            .unwrap_or(false);
        if !inserted {
            return Err(IonError::InvariantViolation(format!(
                "cannot insert at {index} in {container}"
            )));
        }
        node.has_native_value = true;
        node.dirty = true;

        let child_node = self.node_mut(child)?;
        child_node.container = Some(container);
        child_node.element_id = index;
        self.update_element_ids(container, index + 1)
    }

    /// Removes `child` from `container`. Returns `false` when `child` is not
    /// one of its children.
    pub fn remove(&mut self, container: ValueId, child: ValueId) -> Result<bool> {
        self.container_node(container)?;
        self.check_for_lock(container)?;
        let node = self.try_node(child).ok_or(IonError::NullChild)?;
        if node.container != Some(container) {
            return Ok(false);
        }
        let index = node.element_id;
        self.remove_child_at(container, index, child)?;
        Ok(true)
    }

    /// Removes the child at `index`, which must be `child`.
    pub(crate) fn remove_child_at(
        &mut self,
        container: ValueId,
        index: usize,
        child: ValueId,
    ) -> Result<()> {
        let found = self.node(container)?.store().and_then(|s| s.get(index));
        if found != Some(child) {
            return Err(IonError::InvariantViolation(format!(
                "{child} claims element id {index} in {container} but {found:?} is there"
            )));
        }
        self.detach_from_buffer(child)?;

        let node = self.node_mut(container)?;
        if let Some(store) = node.store_mut() {
            store.remove_at(index);
        }
        node.dirty = true;
        self.detach_from_container(child)?;
        self.update_element_ids(container, index)
    }

    /// Empties a container, turning a null container into an empty one.
    pub fn clear(&mut self, container: ValueId) -> Result<()> {
        self.container_node(container)?;
        self.check_for_lock(container)?;
        if !self.discard_unparsed(container)? {
            self.detach_all_children(container)?;
        }

        let node = self.node_mut(container)?;
        if let Body::Container { kind, children } = &mut node.body {
            match children {
                Some(store) => store.clear(),
                None => *children = Some(ChildStore::new(*kind)),
            }
        }
        node.dirty = true;
        Ok(())
    }

    /// Turns a container into a null container, detaching every child.
    pub fn make_null(&mut self, container: ValueId) -> Result<()> {
        let kind = self.container_node(container)?.kind();
        self.check_for_lock(container)?;
        if kind == Some(ContainerKind::Stream) {
            return Err(IonError::InvalidArgument(
                "a stream cannot be null".to_owned(),
            ));
        }
        if self.is_null(container)? {
            return Ok(());
        }
        if !self.discard_unparsed(container)? {
            self.detach_all_children(container)?;
        }

        let node = self.node_mut(container)?;
        if let Body::Container { children, .. } = &mut node.body {
            *children = None;
        }
        node.has_native_value = true;
        node.dirty = true;
        Ok(())
    }

    /// Locks `id` and everything below it. Locked values never change again.
    pub fn make_read_only(&mut self, id: ValueId) -> Result<()> {
        if self.node(id)?.locked {
            return Ok(());
        }
        self.deep_materialize(id)?;
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            let node = self.node_mut(next)?;
            node.locked = true;
            stack.extend(node.child_ids());
        }
        Ok(())
    }

    /// Replaces the value of a scalar. The type may change.
    pub fn set_scalar(&mut self, id: ValueId, value: impl Into<Scalar>) -> Result<()> {
        let value = value.into();
        let node = self.node(id)?;
        if node.kind().is_some() {
            return Err(IonError::InvalidArgument(format!("{id} is a container")));
        }
        self.check_for_lock(id)?;
        validate_scalar(&value)?;

        let node = self.node_mut(id)?;
        node.ion_type = value.ion_type();
        node.body = Body::Scalar(Some(value));
        node.has_native_value = true;
        node.dirty = true;
        Ok(())
    }

    pub fn add_annotation(&mut self, id: ValueId, text: &str) -> Result<()> {
        self.check_annotatable(id)?;
        self.materialize(id)?;
        let node = self.node_mut(id)?;
        node.annotations.push(text.to_owned());
        node.dirty = true;
        Ok(())
    }

    pub fn clear_annotations(&mut self, id: ValueId) -> Result<()> {
        self.check_annotatable(id)?;
        if self.node(id)?.annotations.is_empty() {
            return Ok(());
        }
        self.materialize(id)?;
        let node = self.node_mut(id)?;
        node.annotations.clear();
        node.dirty = true;
        Ok(())
    }

    fn check_annotatable(&self, id: ValueId) -> Result<()> {
        if self.node(id)?.kind() == Some(ContainerKind::Stream) {
            return Err(IonError::InvalidArgument(
                "a stream cannot carry annotations".to_owned(),
            ));
        }
        self.check_for_lock(id)
    }

    // ----------------------------------------------------------------
    // Detaching

    /// Takes ownership of a container's payload without parsing it. Returns
    /// `false` when the container is already native. Nobody can hold a handle
    /// to the children of an unparsed container, so their bytes are left for
    /// the next flush to drop.
    fn discard_unparsed(&mut self, container: ValueId) -> Result<bool> {
        let node = self.node_mut(container)?;
        if node.has_native_value {
            return Ok(false);
        }
        node.has_native_value = true;
        Ok(true)
    }

    /// Deep-materializes every child, then detaches all of them. Nothing is
    /// detached if a child fails to materialize.
    fn detach_all_children(&mut self, container: ValueId) -> Result<()> {
        let children = self.node(container)?.child_ids();
        for &child in &children {
            self.detach_from_buffer(child)?;
        }
        for child in children {
            self.detach_from_container(child)?;
        }
        Ok(())
    }

    fn detach_from_container(&mut self, child: ValueId) -> Result<()> {
        let node = self.node_mut(child)?;
        node.container = None;
        node.element_id = 0;
        node.field_name = None;
        Ok(())
    }

    /// Turns a subtree into a pure in-memory tree: everything is decoded,
    /// then buffer bindings and positions are dropped.
    pub(crate) fn detach_from_buffer(&mut self, id: ValueId) -> Result<()> {
        if self.node(id)?.buffer.is_none() {
            return Ok(());
        }
        self.deep_materialize(id)?;
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            let node = self.node_mut(next)?;
            node.buffer = None;
            node.position = None;
            node.dirty = true;
            stack.extend(node.child_ids());
        }
        Ok(())
    }
}
