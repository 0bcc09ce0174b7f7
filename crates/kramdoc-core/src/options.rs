// SPDX-License-Identifier: AGPL-3.0-or-later
//! Document options: documented defaults merged with caller overrides

use crate::ast::Value;
use crate::traits::{ConversionError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Starting number for the first rendered footnote (used by converters)
pub const FOOTNOTE_NR: &str = "footnote_nr";
/// HTML tag names filtered from rendered output (used by converters)
pub const FILTER_HTML: &str = "filter_html";
/// Generate header ids automatically (used by the parser)
pub const AUTO_IDS: &str = "auto_ids";

const DEFAULT_FOOTNOTE_NR: i64 = 1;
const DEFAULT_AUTO_IDS: bool = false;

/// Ordered option map
///
/// The same type holds both a partial override set and the resolved result;
/// keys nobody recognises are kept as-is so custom parsers, converters and
/// extensions can read them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Options {
    values: BTreeMap<String, Value>,
}

impl Options {
    /// Empty override set
    pub fn new() -> Self {
        Self::default()
    }

    /// The documented defaults
    pub fn defaults() -> Self {
        Self::new()
            .with(FOOTNOTE_NR, DEFAULT_FOOTNOTE_NR)
            .with(FILTER_HTML, Value::List(Vec::new()))
            .with(AUTO_IDS, DEFAULT_AUTO_IDS)
    }

    /// Defaults with `overrides` applied on top; the override wins per key
    pub fn resolve(overrides: Options) -> Self {
        Self::defaults().merged(overrides)
    }

    pub fn merged(mut self, overrides: Options) -> Self {
        self.values.extend(overrides.values);
        self
    }

    /// Read overrides from a JSON object
    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        if !value.is_object() {
            return Err(ConversionError::InvalidOptions(format!(
                "expected a JSON object, found {}",
                json_type_name(&value)
            )));
        }
        Ok(serde_json::from_value(value)?)
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn footnote_nr(&self) -> i64 {
        self.get(FOOTNOTE_NR)
            .and_then(Value::as_integer)
            .unwrap_or(DEFAULT_FOOTNOTE_NR)
    }

    /// Tag names to drop from rendered output, compared case-insensitively
    pub fn filter_html(&self) -> BTreeSet<String> {
        self.get(FILTER_HTML)
            .and_then(Value::as_list)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_ascii_lowercase)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn auto_ids(&self) -> bool {
        self.get(AUTO_IDS)
            .and_then(Value::as_bool)
            .unwrap_or(DEFAULT_AUTO_IDS)
    }

    /// Describe every recognised key whose value has the wrong type
    ///
    /// The typed accessors fall back to the default for such keys.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if let Some(v) = self.get(FOOTNOTE_NR) {
            if v.as_integer().is_none() {
                problems.push(type_mismatch(FOOTNOTE_NR, "an integer", v));
            }
        }
        if let Some(v) = self.get(FILTER_HTML) {
            match v.as_list() {
                Some(items) if items.iter().all(|item| item.as_str().is_some()) => {}
                Some(_) => problems.push(format!(
                    "option `{FILTER_HTML}` contains non-string entries, ignoring them"
                )),
                None => problems.push(type_mismatch(FILTER_HTML, "a list of strings", v)),
            }
        }
        if let Some(v) = self.get(AUTO_IDS) {
            if v.as_bool().is_none() {
                problems.push(type_mismatch(AUTO_IDS, "a boolean", v));
            }
        }
        problems
    }
}

fn type_mismatch(key: &str, expected: &str, found: &Value) -> String {
    format!(
        "option `{key}` expects {expected}, found {}, using the default",
        found.type_name()
    )
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
