use serde::{Deserialize, Serialize};

/// Behaviour switches for a [`Dom`](crate::Dom).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Deep-materialize streams as soon as they are loaded.
    pub materialize_on_load: bool,
    /// Re-check position metadata of the whole tree after every flush.
    pub verify_after_flush: bool,
    /// Emit a local symbol table in the stream prefix when user symbols
    /// exist. When disabled, flushing a stream that needs one fails.
    pub write_symbol_table: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            materialize_on_load: false,
            verify_after_flush: false,
            write_symbol_table: true,
        }
    }
}

impl Config {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
