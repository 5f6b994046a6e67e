//! JSON rendering of a value tree, for debugging and tests.

use serde_json::{json, Map, Number, Value};

use super::Dom;
use crate::error::Result;
use crate::value::{ContainerKind, Scalar, ValueId};

impl Dom {
    /// Renders `id` as JSON, materializing whatever it needs to read.
    ///
    /// Structs become objects in field order (the first member wins on
    /// duplicate names); lists, sexps and streams become arrays. Annotations
    /// are not rendered. Decimal, timestamp and clob payloads render as
    /// `{"$type": .., "$bytes": [..]}`.
    pub fn to_json(&mut self, id: ValueId) -> Result<Value> {
        let Some(kind) = self.node(id)?.kind() else {
            return Ok(scalar_json(self.scalar(id)?));
        };
        self.materialize(id)?;
        let node = self.node(id)?;
        if node.store().is_none() {
            return Ok(Value::Null);
        }
        let children = node.child_ids();
        if kind == ContainerKind::Struct {
            let mut map = Map::new();
            for child in children {
                let name = self.node(child)?.field_name.clone().unwrap_or_default();
                let value = self.to_json(child)?;
                map.entry(name).or_insert(value);
            }
            return Ok(Value::Object(map));
        }
        let mut items = Vec::with_capacity(children.len());
        for child in children {
            items.push(self.to_json(child)?);
        }
        Ok(Value::Array(items))
    }
}

fn scalar_json(scalar: &Scalar) -> Value {
    match scalar {
        Scalar::Null(_) => Value::Null,
        Scalar::Bool(b) => Value::Bool(*b),
        Scalar::Int(n) => Value::from(*n),
        Scalar::Float(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
        Scalar::Symbol(s) | Scalar::String(s) => Value::String(s.clone()),
        Scalar::Blob(b) => Value::from(b.clone()),
        Scalar::Opaque { ty, bytes } => json!({ "$type": ty.name(), "$bytes": bytes }),
    }
}
