// SPDX-License-Identifier: AGPL-3.0-or-later
//! Parser and Converter traits, and the state they share with a document

use crate::ast::{Element, Value};
use crate::extension::Extension;
use crate::options::Options;
use std::collections::BTreeMap;
use std::ops::Deref;

/// Error type for parsing and converting
///
/// Only unrecoverable failures end up here; anything a parser or converter
/// can work around is pushed to [`Warnings`] instead.
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("Parse error at line {line}, column {column}: {message}")]
    ParseError {
        line: u32,
        column: u32,
        message: String,
    },

    #[error("No converter registered for format `{0}`")]
    UnknownFormat(String),

    #[error("Rendering to {format} failed: {message}")]
    RenderError { format: String, message: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid options: {0}")]
    InvalidOptions(String),
}

impl From<serde_json::Error> for ConversionError {
    fn from(err: serde_json::Error) -> Self {
        ConversionError::SerializationError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ConversionError>;

/// Ordered, append-only log of recoverable issues
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Warnings(Vec<String>);

impl Warnings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(warning = %message, "recoverable issue");
        self.0.push(message);
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl Deref for Warnings {
    type Target = [String];

    fn deref(&self) -> &[String] {
        &self.0
    }
}

impl Extend<String> for Warnings {
    fn extend<I: IntoIterator<Item = String>>(&mut self, iter: I) {
        for message in iter {
            self.push(message);
        }
    }
}

/// Auxiliary state keyed by name: link targets, footnote bodies and
/// anything else a construct needs from elsewhere in the source
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseInfos {
    entries: BTreeMap<String, Value>,
}

impl ParseInfos {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.entries.get_mut(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Named sub-table, if present and a map
    pub fn table(&self, key: &str) -> Option<&BTreeMap<String, Value>> {
        self.get(key).and_then(Value::as_map)
    }

    /// Named sub-table, created (or reset if it held a non-map) on first use
    pub fn table_mut(&mut self, key: &str) -> &mut BTreeMap<String, Value> {
        let slot = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Value::Map(BTreeMap::new()));
        if !matches!(slot, Value::Map(_)) {
            *slot = Value::Map(BTreeMap::new());
        }
        match slot {
            Value::Map(map) => map,
            _ => unreachable!("parse info slot was just normalised to a map"),
        }
    }

    /// Entry `name` of sub-table `key`
    pub fn lookup(&self, key: &str, name: &str) -> Option<&Value> {
        self.table(key).and_then(|table| table.get(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Document state handed to a [`Parser`]
pub struct ParseContext<'a> {
    pub options: &'a Options,
    pub extension: &'a dyn Extension,
    pub warnings: &'a mut Warnings,
    pub parse_infos: &'a mut ParseInfos,
}

impl ParseContext<'_> {
    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message);
    }
}

/// Document state handed to a [`Converter`]
///
/// The tree itself is passed separately as a shared borrow, so a converter
/// can inspect it but never restructure it.
pub struct ConvertContext<'a> {
    pub options: &'a Options,
    pub warnings: &'a mut Warnings,
    pub parse_infos: &'a mut ParseInfos,
}

impl ConvertContext<'_> {
    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message);
    }
}

/// Parser trait: turn source text into a single rooted tree
pub trait Parser: Send + Sync {
    /// Grammar name, for diagnostics
    fn name(&self) -> &'static str;

    /// Parse `source`; invoked exactly once per document
    ///
    /// Recoverable irregularities go to `ctx.warnings`. An error means no
    /// tree could be produced at all.
    fn parse(&self, source: &str, ctx: &mut ParseContext<'_>) -> Result<Element>;
}

/// Converter trait: render a tree into one output format
pub trait Converter: Send + Sync {
    /// Format name this converter is registered under
    fn format(&self) -> &'static str;

    /// Render `tree`; must be deterministic for identical inputs
    fn convert(&self, tree: &Element, ctx: &mut ConvertContext<'_>) -> Result<String>;
}

/// Registry of converters keyed by format name
pub struct ConverterRegistry {
    converters: BTreeMap<&'static str, Box<dyn Converter>>,
}

impl ConverterRegistry {
    pub fn new() -> Self {
        Self {
            converters: BTreeMap::new(),
        }
    }

    /// Registry holding every converter compiled into this crate
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::formats::register_builtins(&mut registry);
        registry
    }

    /// Register a converter, replacing any previous one for its format
    pub fn register(&mut self, converter: Box<dyn Converter>) {
        let format = converter.format();
        self.converters.insert(format, converter);
    }

    pub fn get(&self, format: &str) -> Option<&dyn Converter> {
        self.converters.get(format).map(|c| c.as_ref())
    }

    pub fn formats(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.converters.keys().copied()
    }
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::new()
    }
}
