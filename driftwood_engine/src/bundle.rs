//! Read-only property bundle backing a loaded game.
//!
//! The runtime never parses TAF files itself; it consumes a property tree
//! produced by an external decompiler. Lookups are keyed by paths that
//! alternate string tags and list indices, e.g. `Objects/3/Short`, and each
//! read names the type it expects. A missing path yields the type's default
//! value; a present path of the wrong type means the game data is corrupt
//! and aborts the interpreter.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use log::warn;
use thiserror::Error;

/// One node of the property tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Prop {
    Integer(i64),
    Boolean(bool),
    String(String),
    List(Vec<Prop>),
    Map(BTreeMap<String, Prop>),
}

/// One step of a property path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seg<'a> {
    Tag(&'a str),
    At(usize),
}

impl<'a> From<&'a str> for Seg<'a> {
    fn from(tag: &'a str) -> Self {
        Seg::Tag(tag)
    }
}

impl From<usize> for Seg<'_> {
    fn from(index: usize) -> Self {
        Seg::At(index)
    }
}

/// Errors raised while loading a bundle from its on-disk form.
#[derive(Debug, Error)]
pub enum BundleError {
    #[error("reading bundle file: {0}")]
    Io(#[from] std::io::Error),
    #[error("parsing bundle data: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("bundle root is not a table")]
    BadRoot,
}

/// The property tree for one game, shared read-only across the session.
#[derive(Debug, Clone, PartialEq)]
pub struct Bundle {
    root: Prop,
}

impl Bundle {
    /// Build a bundle around an already-constructed property tree.
    pub fn new(root: Prop) -> Bundle {
        Bundle { root }
    }

    /// An empty bundle; every read returns its type default.
    pub fn empty() -> Bundle {
        Bundle {
            root: Prop::Map(BTreeMap::new()),
        }
    }

    /// Load a bundle from compiled game data in TOML form.
    pub fn from_toml_str(text: &str) -> Result<Bundle, BundleError> {
        let value: toml::Value = text.parse()?;
        if !value.is_table() {
            return Err(BundleError::BadRoot);
        }
        Ok(Bundle {
            root: prop_from_toml(value),
        })
    }

    /// Load a bundle from a compiled game data file.
    pub fn from_toml_path(path: &Path) -> Result<Bundle, BundleError> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Walk a path and return the node it names, if present.
    pub fn get(&self, path: &[Seg]) -> Option<&Prop> {
        let mut node = &self.root;
        for seg in path {
            node = match (node, seg) {
                (Prop::Map(map), Seg::Tag(tag)) => map.get(*tag)?,
                (Prop::List(list), Seg::At(index)) => list.get(*index)?,
                _ => return None,
            };
        }
        Some(node)
    }

    /// Integer read; 0 when the path is absent.
    pub fn integer(&self, path: &[Seg]) -> i64 {
        self.integer_or(path, 0)
    }

    /// Integer read with an explicit default for absent paths.
    pub fn integer_or(&self, path: &[Seg], default: i64) -> i64 {
        match self.get(path) {
            Some(Prop::Integer(value)) => *value,
            Some(Prop::Boolean(value)) => i64::from(*value),
            Some(other) => panic!("bundle: integer read of non-integer at {path:?} ({other:?})"),
            None => default,
        }
    }

    /// Boolean read; false when the path is absent.
    pub fn boolean(&self, path: &[Seg]) -> bool {
        match self.get(path) {
            Some(Prop::Boolean(value)) => *value,
            Some(Prop::Integer(value)) => *value != 0,
            Some(other) => panic!("bundle: boolean read of non-boolean at {path:?} ({other:?})"),
            None => false,
        }
    }

    /// String read; empty when the path is absent.
    pub fn string(&self, path: &[Seg]) -> &str {
        match self.get(path) {
            Some(Prop::String(value)) => value.as_str(),
            Some(other) => panic!("bundle: string read of non-string at {path:?} ({other:?})"),
            None => "",
        }
    }

    /// Length of the list at a path; 0 when absent or not a list.
    pub fn count(&self, path: &[Seg]) -> usize {
        match self.get(path) {
            Some(Prop::List(list)) => list.len(),
            _ => 0,
        }
    }

    /// Integer property of the `index`'th entry in a top-level group.
    pub fn entity_integer(&self, group: &str, index: usize, prop: &str) -> i64 {
        self.integer(&[group.into(), index.into(), prop.into()])
    }

    /// Boolean property of the `index`'th entry in a top-level group.
    pub fn entity_boolean(&self, group: &str, index: usize, prop: &str) -> bool {
        self.boolean(&[group.into(), index.into(), prop.into()])
    }

    /// String property of the `index`'th entry in a top-level group.
    pub fn entity_string(&self, group: &str, index: usize, prop: &str) -> &str {
        self.string(&[group.into(), index.into(), prop.into()])
    }

    /// Count of entries in a top-level group (Rooms, Objects, Tasks...).
    pub fn entity_count(&self, group: &str) -> usize {
        self.count(&[group.into()])
    }

    /// Integer read from the `Globals` table.
    pub fn global_integer(&self, prop: &str) -> i64 {
        self.integer(&["Globals".into(), prop.into()])
    }

    /// Boolean read from the `Globals` table.
    pub fn global_boolean(&self, prop: &str) -> bool {
        self.boolean(&["Globals".into(), prop.into()])
    }

    /// String read from the `Globals` table.
    pub fn global_string(&self, prop: &str) -> &str {
        self.string(&["Globals".into(), prop.into()])
    }
}

/// Convert parsed TOML into the property tree form.
fn prop_from_toml(value: toml::Value) -> Prop {
    match value {
        toml::Value::Integer(n) => Prop::Integer(n),
        toml::Value::Boolean(b) => Prop::Boolean(b),
        toml::Value::String(s) => Prop::String(s),
        toml::Value::Array(items) => Prop::List(items.into_iter().map(prop_from_toml).collect()),
        toml::Value::Table(table) => Prop::Map(
            table
                .into_iter()
                .map(|(key, val)| (key, prop_from_toml(val)))
                .collect(),
        ),
        toml::Value::Float(f) => {
            warn!("bundle: float property truncated to integer ({f})");
            Prop::Integer(f as i64)
        }
        toml::Value::Datetime(dt) => Prop::String(dt.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> Bundle {
        Bundle::from_toml_str(
            r#"
            [Globals]
            GameName = "Test Game"
            MaxScore = 100
            EightPointCompass = false

            [[Objects]]
            Short = "brass key"
            Static = false
            SizeWeight = 11

            [[Objects]]
            Short = "oak table"
            Static = true
            Surface = true
            "#,
        )
        .expect("fixture bundle should parse")
    }

    #[test]
    fn global_reads_work() {
        let bundle = fixture();
        assert_eq!(bundle.global_string("GameName"), "Test Game");
        assert_eq!(bundle.global_integer("MaxScore"), 100);
        assert!(!bundle.global_boolean("EightPointCompass"));
    }

    #[test]
    fn absent_paths_yield_defaults() {
        let bundle = fixture();
        assert_eq!(bundle.global_integer("NoSuchThing"), 0);
        assert_eq!(bundle.global_string("NoSuchThing"), "");
        assert!(!bundle.global_boolean("NoSuchThing"));
        assert_eq!(bundle.integer_or(&["Objects".into(), 0.into(), "Key".into()], -1), -1);
    }

    #[test]
    fn entity_reads_work() {
        let bundle = fixture();
        assert_eq!(bundle.entity_count("Objects"), 2);
        assert_eq!(bundle.entity_string("Objects", 0, "Short"), "brass key");
        assert!(bundle.entity_boolean("Objects", 1, "Static"));
        assert_eq!(bundle.entity_integer("Objects", 0, "SizeWeight"), 11);
    }

    #[test]
    fn count_of_scalar_is_zero() {
        let bundle = fixture();
        assert_eq!(bundle.count(&["Globals".into(), "MaxScore".into()]), 0);
        assert_eq!(bundle.entity_count("Tasks"), 0);
    }

    #[test]
    #[should_panic(expected = "integer read of non-integer")]
    fn type_mismatch_is_fatal() {
        let bundle = fixture();
        let _ = bundle.global_integer("GameName");
    }

    #[test]
    fn integer_accepts_boolean_storage() {
        let bundle = fixture();
        assert_eq!(bundle.entity_integer("Objects", 1, "Surface"), 1);
    }
}
