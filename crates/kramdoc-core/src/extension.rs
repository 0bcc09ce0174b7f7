// SPDX-License-Identifier: AGPL-3.0-or-later
//! Parse-time customization hook
//!
//! A parser calls into the document's [`Extension`] whenever it meets an
//! extension directive. Each callback either hands back a replacement
//! fragment or asks for the built-in handling.

use crate::ast::Element;
use std::collections::BTreeMap;

/// A directive recognised in the source, e.g. `{::comment}...{:/comment}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub name: String,
    /// Raw `key="value"` arguments from the opening tag
    pub args: BTreeMap<String, String>,
    /// Text between the opening and closing tags; `None` for `{::name /}`
    pub body: Option<String>,
    /// 1-based source line of the opening tag
    pub line: usize,
}

impl Directive {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: BTreeMap::new(),
            body: None,
            line: 0,
        }
    }

    pub fn body_str(&self) -> &str {
        self.body.as_deref().unwrap_or("")
    }
}

/// Outcome of an extension callback
#[derive(Debug, Clone, PartialEq)]
pub enum Handling {
    /// Use these elements in place of the directive (may be empty)
    Replace(Vec<Element>),
    /// Fall back to the parser's built-in handling
    Default,
}

/// Customization callbacks bound to one document
pub trait Extension: Send + Sync {
    /// `{::comment}`: built-in handling keeps the body as a `comment` node
    fn comment(&self, _directive: &Directive) -> Handling {
        Handling::Default
    }

    /// `{::nomarkdown}`: built-in handling passes the body through as `raw`
    fn nomarkdown(&self, _directive: &Directive) -> Handling {
        Handling::Default
    }

    /// Any directive name the grammar does not know; built-in handling warns
    /// and drops it
    fn custom(&self, _directive: &Directive) -> Handling {
        Handling::Default
    }
}

/// Baseline extension: always defers to built-in handling
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultExtension;

impl Extension for DefaultExtension {}
