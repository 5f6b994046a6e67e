//! Symbol tables resolving field names, annotations and symbol values.

use std::collections::HashMap;

use crate::binary::constants::SYSTEM_SYMBOLS;

/// One layer of a symbol table: a contiguous run of symbol IDs starting at
/// `offset`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SymbolLayer {
    offset: u32,
    symbols: Vec<String>,
    lookup: HashMap<String, u32>,
}

impl SymbolLayer {
    fn system() -> Self {
        let mut layer = Self::starting_at(1);
        for sym in SYSTEM_SYMBOLS.iter().skip(1) {
            layer.add(sym);
        }
        layer
    }

    fn starting_at(offset: u32) -> Self {
        Self {
            offset,
            symbols: Vec::new(),
            lookup: HashMap::new(),
        }
    }

    fn get_id(&self, text: &str) -> Option<u32> {
        self.lookup.get(text).copied()
    }

    fn get_text(&self, id: u32) -> Option<&str> {
        if id < self.offset {
            return None;
        }
        self.symbols
            .get((id - self.offset) as usize)
            .map(String::as_str)
    }

    /// ID one past the last symbol of this layer.
    fn next_id(&self) -> u32 {
        self.offset + self.symbols.len() as u32
    }

    fn add(&mut self, text: &str) -> u32 {
        if let Some(&id) = self.lookup.get(text) {
            return id;
        }
        let id = self.next_id();
        self.symbols.push(text.to_owned());
        self.lookup.insert(text.to_owned(), id);
        id
    }
}

/// Local symbol table of a stream: the Ion 1.0 system symbols (IDs 1..=9)
/// followed by user symbols starting at ID 10.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolTable {
    system: SymbolLayer,
    user: SymbolLayer,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    /// Creates a table holding only the system symbols.
    pub fn new() -> Self {
        let system = SymbolLayer::system();
        let user = SymbolLayer::starting_at(system.next_id());
        Self { system, user }
    }

    /// Creates a table with the given user symbols appended in order.
    pub fn with_symbols<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut table = Self::new();
        for s in symbols {
            table.user.symbols.push(s.as_ref().to_owned());
            let id = table.user.next_id() - 1;
            // Duplicate texts keep their first ID for lookups.
            table.user.lookup.entry(s.as_ref().to_owned()).or_insert(id);
        }
        table
    }

    pub fn get_id(&self, text: &str) -> Option<u32> {
        self.system.get_id(text).or_else(|| self.user.get_id(text))
    }

    pub fn get_text(&self, id: u32) -> Option<&str> {
        self.system.get_text(id).or_else(|| self.user.get_text(id))
    }

    /// Interns `text`, returning its existing ID when already present.
    pub fn intern(&mut self, text: &str) -> u32 {
        if let Some(id) = self.system.get_id(text) {
            return id;
        }
        self.user.add(text)
    }

    pub fn has_user_symbols(&self) -> bool {
        !self.user.symbols.is_empty()
    }

    /// User symbols in ID order.
    pub fn user_symbols(&self) -> &[String] {
        &self.user.symbols
    }
}
