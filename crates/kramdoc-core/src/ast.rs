// SPDX-License-Identifier: AGPL-3.0-or-later
//! Generic element tree shared by every parser and converter
//!
//! There is exactly one node shape. A node's `kind` names the construct
//! (`"p"`, `"header"`, `"em"`, ...) and the vocabulary belongs to whichever
//! grammar produced the tree, so converters can walk trees from grammars
//! they have never seen.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Reserved key in [`Element::options`] holding the output attributes.
pub const ATTR_KEY: &str = "attr";

/// Dynamically typed payload for element values, element options,
/// document options and parse infos
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    String(String),
    Bool(bool),
    Integer(i64),
    Float(f64),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    /// Detached tree fragment, e.g. a footnote body stored in parse infos
    #[serde(skip_deserializing)]
    Element(Box<Element>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut BTreeMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Value::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Value::Element(el) => Some(el),
            _ => None,
        }
    }

    /// Short name of the variant, used in diagnostics
    pub const fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Bool(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Element(_) => "element",
        }
    }
}

/// Renders the value the way it appears in an attribute: lists are
/// space-separated, maps are JSON, elements contribute their text.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => f.write_str(s),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
            Value::Map(map) => {
                let json = serde_json::to_string(map).map_err(|_| fmt::Error)?;
                f.write_str(&json)
            }
            Value::Element(el) => f.write_str(&el.text_content()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i64::from(i))
    }
}

impl From<u8> for Value {
    fn from(i: u8) -> Self {
        Value::Integer(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Map(map)
    }
}

impl From<Element> for Value {
    fn from(el: Element) -> Self {
        Value::Element(Box::new(el))
    }
}

/// One node of a parsed document
///
/// Children are owned by value, so a node always has exactly one parent and
/// the tree cannot contain cycles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    /// Construct tag; the vocabulary is defined by the grammar
    pub kind: String,
    /// Type-dependent payload (text, raw markup, a header level, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Arbitrary per-node options; attributes live under [`ATTR_KEY`]
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Element>,
}

impl Element {
    /// Create a childless node with no value and no options
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: None,
            options: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    pub fn with_value(kind: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::new(kind)
        }
    }

    pub fn with_options(
        kind: impl Into<String>,
        value: Option<Value>,
        options: BTreeMap<String, Value>,
    ) -> Self {
        Self {
            value,
            options,
            ..Self::new(kind)
        }
    }

    /// Append a child, builder style
    pub fn child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn is(&self, kind: &str) -> bool {
        self.kind == kind
    }

    pub fn value_str(&self) -> Option<&str> {
        self.value.as_ref().and_then(Value::as_str)
    }

    pub fn option(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }

    /// True when the option is present and set to `true`
    pub fn flag(&self, key: &str) -> bool {
        self.option(key).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Output attributes, if any were set
    pub fn attr(&self) -> Option<&BTreeMap<String, Value>> {
        self.options.get(ATTR_KEY).and_then(Value::as_map)
    }

    pub fn attr_value(&self, key: &str) -> Option<&Value> {
        self.attr().and_then(|attr| attr.get(key))
    }

    /// Mutable attribute map, created on first use
    pub fn attr_mut(&mut self) -> &mut BTreeMap<String, Value> {
        let slot = self
            .options
            .entry(ATTR_KEY.to_string())
            .or_insert_with(|| Value::Map(BTreeMap::new()));
        if !matches!(slot, Value::Map(_)) {
            *slot = Value::Map(BTreeMap::new());
        }
        match slot {
            Value::Map(map) => map,
            _ => unreachable!("attribute slot was just normalised to a map"),
        }
    }

    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.attr_mut().insert(key.into(), value.into());
    }

    /// Concatenated payloads of the `text` and `codespan` nodes in this subtree
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        for el in self.walk() {
            if el.is("text") || el.is("codespan") {
                if let Some(text) = el.value_str() {
                    out.push_str(text);
                }
            }
        }
        out
    }

    /// Number of nodes in this subtree, including `self`
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(Element::count).sum::<usize>()
    }

    /// Depth-first, pre-order traversal in document order
    pub fn walk(&self) -> Walk<'_> {
        Walk { stack: vec![self] }
    }
}

/// Iterator returned by [`Element::walk`]
pub struct Walk<'a> {
    stack: Vec<&'a Element>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<Self::Item> {
        let el = self.stack.pop()?;
        self.stack.extend(el.children.iter().rev());
        Some(el)
    }
}
