// SPDX-License-Identifier: AGPL-3.0-or-later
//! Kramdoc Core - Document model for a kramdown-style markup pipeline
//!
//! This crate provides:
//! - A generic element tree that every parser produces and every converter reads
//! - Document options with defaults, merging and validation
//! - Parser, Converter and Extension traits for plugging in grammars and outputs
//! - A `Document` that parses once and converts to any registered format
//! - Built-in kramdown parser plus HTML, plain text and JSON converters

pub mod ast;
pub mod document;
pub mod extension;
pub mod formats;
pub mod options;
pub mod traits;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use ast::{Element, Value, ATTR_KEY};
pub use document::{Document, DocumentBuilder};
pub use extension::{DefaultExtension, Directive, Extension, Handling};
pub use formats::KramdownParser;
#[cfg(feature = "html")]
pub use formats::HtmlConverter;
#[cfg(feature = "json")]
pub use formats::JsonConverter;
#[cfg(feature = "text")]
pub use formats::TextConverter;
pub use options::Options;
pub use traits::{
    ConversionError, ConvertContext, Converter, ConverterRegistry, ParseContext, ParseInfos,
    Parser, Result, Warnings,
};
