//! Arena of value nodes and the container engine that operates on it.
//!
//! Every value lives in a slot of the [`Dom`] arena and is addressed by a
//! [`ValueId`]. A container owns its children through its [`ChildStore`]; a
//! child only keeps a non-owning `container` handle back to its parent.
//! Values loaded from binary Ion share the encoded bytes of their stream and
//! are parsed lazily.

mod cursor;
mod materialize;
mod mutate;
mod reencode;
pub mod store;
mod view;

pub use cursor::Cursor;
pub use store::ChildStore;

use crate::config::Config;
use crate::error::{IonError, Result};
use crate::position::Position;
use crate::symbols::SymbolTable;
use crate::value::{ContainerKind, IonType, Scalar, ValueId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct BufferId(usize);

/// Encoded bytes of one stream plus the symbol table they are written with.
#[derive(Debug, Default)]
pub(crate) struct Buffer {
    pub(crate) bytes: Vec<u8>,
    pub(crate) symbols: SymbolTable,
    /// Set when a flush failed half way; the bytes can no longer be trusted.
    pub(crate) poisoned: bool,
}

#[derive(Debug, Clone)]
pub(crate) enum Body {
    /// `children == None` is a null container once materialized.
    Container {
        kind: ContainerKind,
        children: Option<ChildStore>,
    },
    /// `None` until a buffer-backed scalar is decoded.
    Scalar(Option<Scalar>),
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) ion_type: IonType,
    pub(crate) container: Option<ValueId>,
    pub(crate) element_id: usize,
    pub(crate) field_name: Option<String>,
    pub(crate) annotations: Vec<String>,
    pub(crate) has_native_value: bool,
    pub(crate) dirty: bool,
    pub(crate) locked: bool,
    pub(crate) buffer: Option<BufferId>,
    pub(crate) position: Option<Position>,
    pub(crate) body: Body,
}

impl Node {
    fn fresh(ion_type: IonType, body: Body) -> Self {
        Self {
            ion_type,
            container: None,
            element_id: 0,
            field_name: None,
            annotations: Vec::new(),
            has_native_value: true,
            dirty: true,
            locked: false,
            buffer: None,
            position: None,
            body,
        }
    }

    pub(crate) fn kind(&self) -> Option<ContainerKind> {
        match self.body {
            Body::Container { kind, .. } => Some(kind),
            Body::Scalar(_) => None,
        }
    }

    pub(crate) fn store(&self) -> Option<&ChildStore> {
        match &self.body {
            Body::Container { children, .. } => children.as_ref(),
            Body::Scalar(_) => None,
        }
    }

    pub(crate) fn store_mut(&mut self) -> Option<&mut ChildStore> {
        match &mut self.body {
            Body::Container { children, .. } => children.as_mut(),
            Body::Scalar(_) => None,
        }
    }

    /// Child handles of a materialized container, in order.
    pub(crate) fn child_ids(&self) -> Vec<ValueId> {
        self.store().map_or_else(Vec::new, |s| s.iter().collect())
    }

    fn is_null(&self) -> bool {
        if !self.has_native_value {
            return self.position.is_some_and(|p| p.is_null());
        }
        match &self.body {
            Body::Container { kind, children } => {
                children.is_none() && *kind != ContainerKind::Stream
            }
            Body::Scalar(scalar) => scalar.as_ref().is_some_and(Scalar::is_null),
        }
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Owner of every value node and of the encoded buffers they are bound to.
#[derive(Debug, Default)]
pub struct Dom {
    slots: Vec<Slot>,
    free: Vec<u32>,
    buffers: Vec<Option<Buffer>>,
    config: Config,
}

impl Dom {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // ----------------------------------------------------------------
    // Arena

    pub(crate) fn alloc(&mut self, node: Node) -> ValueId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            return ValueId {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        ValueId {
            index,
            generation: 0,
        }
    }

    pub(crate) fn try_node(&self, id: ValueId) -> Option<&Node> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    pub(crate) fn node(&self, id: ValueId) -> Result<&Node> {
        self.try_node(id).ok_or_else(|| stale_handle(id))
    }

    pub(crate) fn node_mut(&mut self, id: ValueId) -> Result<&mut Node> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
            .ok_or_else(|| stale_handle(id))
    }

    /// Looks up a container node, failing for scalars.
    pub(crate) fn container_node(&self, id: ValueId) -> Result<&Node> {
        let node = self.node(id)?;
        if node.kind().is_none() {
            return Err(IonError::InvalidArgument(format!(
                "{id} is a {}, not a container",
                node.ion_type.name()
            )));
        }
        Ok(node)
    }

    pub(crate) fn buffer(&self, id: BufferId) -> Result<&Buffer> {
        self.buffers
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or_else(|| {
                IonError::InvariantViolation(format!("buffer {} is gone", id.0))
            })
    }

    pub(crate) fn push_buffer(&mut self, buffer: Buffer) -> BufferId {
        self.buffers.push(Some(buffer));
        BufferId(self.buffers.len() - 1)
    }

    /// Frees a detached value and its materialized subtree. Any handle to a
    /// freed value becomes stale.
    pub fn release(&mut self, id: ValueId) -> Result<()> {
        let node = self.node(id)?;
        if node.container.is_some() {
            return Err(IonError::AlreadyContained);
        }
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            let slot = &mut self.slots[next.index as usize];
            let Some(node) = slot.node.take() else {
                continue;
            };
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(next.index);
            if node.kind() == Some(ContainerKind::Stream) {
                if let Some(BufferId(b)) = node.buffer {
                    self.buffers[b] = None;
                }
            }
            stack.extend(node.child_ids());
        }
        Ok(())
    }

    /// Renumbers the element ids of `container`'s children from `from` on.
    pub(crate) fn update_element_ids(&mut self, container: ValueId, from: usize) -> Result<()> {
        let ids = self.node(container)?.child_ids();
        for (i, child) in ids.into_iter().enumerate().skip(from) {
            self.node_mut(child)?.element_id = i;
        }
        Ok(())
    }

    // ----------------------------------------------------------------
    // Constructors

    /// Creates an empty, detached container.
    pub fn new_container(&mut self, kind: ContainerKind) -> ValueId {
        self.alloc(Node::fresh(
            kind.ion_type(),
            Body::Container {
                kind,
                children: Some(ChildStore::new(kind)),
            },
        ))
    }

    pub fn new_list(&mut self) -> ValueId {
        self.new_container(ContainerKind::List)
    }

    pub fn new_sexp(&mut self) -> ValueId {
        self.new_container(ContainerKind::Sexp)
    }

    pub fn new_struct(&mut self) -> ValueId {
        self.new_container(ContainerKind::Struct)
    }

    pub fn new_stream(&mut self) -> ValueId {
        self.new_container(ContainerKind::Stream)
    }

    /// Creates a null container such as `null.list`.
    pub fn new_null_container(&mut self, kind: ContainerKind) -> Result<ValueId> {
        if kind == ContainerKind::Stream {
            return Err(IonError::InvalidArgument(
                "a stream cannot be null".to_owned(),
            ));
        }
        Ok(self.alloc(Node::fresh(
            kind.ion_type(),
            Body::Container {
                kind,
                children: None,
            },
        )))
    }

    /// Creates a detached scalar.
    pub fn new_scalar(&mut self, value: impl Into<Scalar>) -> Result<ValueId> {
        let value = value.into();
        crate::binary::encode::validate_scalar(&value)?;
        let node = Node::fresh(value.ion_type(), Body::Scalar(Some(value)));
        Ok(self.alloc(node))
    }

    pub fn new_symbol(&mut self, text: impl Into<String>) -> ValueId {
        let value = Scalar::Symbol(text.into());
        self.alloc(Node::fresh(IonType::Symbol, Body::Scalar(Some(value))))
    }

    // ----------------------------------------------------------------
    // Reads

    pub fn ion_type(&self, id: ValueId) -> Result<IonType> {
        Ok(self.node(id)?.ion_type)
    }

    /// Container kind, or `None` for scalars.
    pub fn kind(&self, id: ValueId) -> Result<Option<ContainerKind>> {
        Ok(self.node(id)?.kind())
    }

    /// Null-ness is known from the type descriptor, so this never
    /// materializes.
    pub fn is_null(&self, id: ValueId) -> Result<bool> {
        Ok(self.node(id)?.is_null())
    }

    pub fn container_of(&self, id: ValueId) -> Result<Option<ValueId>> {
        Ok(self.node(id)?.container)
    }

    pub fn element_id(&self, id: ValueId) -> Result<usize> {
        Ok(self.node(id)?.element_id)
    }

    pub fn field_name(&self, id: ValueId) -> Result<Option<&str>> {
        Ok(self.node(id)?.field_name.as_deref())
    }

    pub fn annotations(&self, id: ValueId) -> Result<&[String]> {
        Ok(&self.node(id)?.annotations)
    }

    pub fn is_dirty(&self, id: ValueId) -> Result<bool> {
        Ok(self.node(id)?.dirty)
    }

    pub fn is_read_only(&self, id: ValueId) -> Result<bool> {
        Ok(self.node(id)?.locked)
    }

    pub fn has_native_value(&self, id: ValueId) -> Result<bool> {
        Ok(self.node(id)?.has_native_value)
    }

    /// Byte offsets of the value in its buffer, if it is bound to one.
    pub fn position(&self, id: ValueId) -> Result<Option<Position>> {
        Ok(self.node(id)?.position)
    }

    /// Allocated child slots; `None` for scalars and null or unparsed
    /// containers.
    pub fn capacity(&self, id: ValueId) -> Result<Option<usize>> {
        Ok(self.node(id)?.store().map(ChildStore::capacity))
    }

    /// Number of children. Materializes the container.
    pub fn size(&mut self, id: ValueId) -> Result<usize> {
        self.container_node(id)?;
        self.materialize(id)?;
        self.node(id)?
            .store()
            .map(ChildStore::count)
            .ok_or(IonError::NullValueAccess)
    }

    pub fn is_empty(&mut self, id: ValueId) -> Result<bool> {
        Ok(self.size(id)? == 0)
    }

    /// Child at `index`. Materializes the container.
    pub fn get(&mut self, id: ValueId, index: usize) -> Result<ValueId> {
        let count = self.size(id)?;
        self.node(id)?
            .store()
            .and_then(|s| s.get(index))
            .ok_or_else(|| {
                IonError::InvalidArgument(format!(
                    "index {index} out of range for {count} children"
                ))
            })
    }

    /// Iterates the children of a container in order. Null containers have
    /// none.
    pub fn children(&mut self, id: ValueId) -> Result<impl Iterator<Item = ValueId> + '_> {
        self.container_node(id)?;
        self.materialize(id)?;
        let node = self.node(id)?;
        Ok(node.store().into_iter().flat_map(|s| s.iter()))
    }

    /// Scalar value of `id`, decoding it from the buffer on first access.
    pub fn scalar(&mut self, id: ValueId) -> Result<&Scalar> {
        self.materialize(id)?;
        match &self.node(id)?.body {
            Body::Scalar(Some(value)) => Ok(value),
            Body::Scalar(None) => Err(IonError::InvariantViolation(format!(
                "{id} is native but has no scalar"
            ))),
            Body::Container { .. } => Err(IonError::InvalidArgument(format!(
                "{id} is a container, not a scalar"
            ))),
        }
    }

    /// Current encoded bytes of a stream, if it has been loaded or flushed.
    pub fn bytes(&self, stream: ValueId) -> Result<Option<&[u8]>> {
        match self.node(stream)?.buffer {
            Some(b) => Ok(Some(self.buffer(b)?.bytes.as_slice())),
            None => Ok(None),
        }
    }

    /// Symbol table of the buffer a value is bound to.
    pub fn symbols(&self, id: ValueId) -> Result<Option<&SymbolTable>> {
        match self.node(id)?.buffer {
            Some(b) => Ok(Some(&self.buffer(b)?.symbols)),
            None => Ok(None),
        }
    }
}

fn stale_handle(id: ValueId) -> IonError {
    IonError::InvalidArgument(format!("stale value handle {id}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn released_handles_go_stale() {
        let mut dom = Dom::new();
        let list = dom.new_list();
        let one = dom.new_scalar(1i64).unwrap();
        dom.add(list, one).unwrap();
        assert_eq!(dom.release(one), Err(IonError::AlreadyContained));

        dom.release(list).unwrap();
        assert!(dom.ion_type(list).is_err());
        assert!(dom.ion_type(one).is_err());

        let reused = dom.new_sexp();
        assert_ne!(reused, list);
        assert_ne!(reused, one);
        assert_eq!(dom.ion_type(reused).unwrap(), IonType::Sexp);
    }

    #[test]
    fn fresh_values_are_native_and_dirty() {
        let mut dom = Dom::new();
        let list = dom.new_list();
        assert!(dom.has_native_value(list).unwrap());
        assert!(dom.is_dirty(list).unwrap());
        assert_eq!(dom.position(list).unwrap(), None);
        assert_eq!(dom.capacity(list).unwrap(), Some(0));
        assert_eq!(dom.size(list).unwrap(), 0);
        assert!(!dom.is_null(list).unwrap());
    }

    #[test]
    fn null_container_reads() {
        let mut dom = Dom::new();
        let list = dom.new_null_container(ContainerKind::List).unwrap();
        assert!(dom.is_null(list).unwrap());
        assert_eq!(dom.size(list), Err(IonError::NullValueAccess));
        assert_eq!(dom.get(list, 0), Err(IonError::NullValueAccess));
        assert_eq!(dom.children(list).unwrap().count(), 0);
        assert!(dom.new_null_container(ContainerKind::Stream).is_err());
    }

    #[test]
    fn scalar_constructors_validate() {
        let mut dom = Dom::new();
        assert!(dom.new_scalar(Scalar::Null(IonType::List)).is_err());
        let s = dom.new_scalar("text").unwrap();
        assert_eq!(dom.scalar(s).unwrap(), &Scalar::String("text".into()));
        let list = dom.new_list();
        assert!(matches!(
            dom.scalar(list),
            Err(IonError::InvalidArgument(_))
        ));
    }
}
