// SPDX-License-Identifier: AGPL-3.0-or-later
//! Built-in grammar and converters

pub mod kramdown;

#[cfg(feature = "html")]
pub mod html;
#[cfg(feature = "json")]
pub mod json;
#[cfg(feature = "text")]
pub mod text;

pub use kramdown::KramdownParser;

#[cfg(feature = "html")]
pub use html::HtmlConverter;
#[cfg(feature = "json")]
pub use json::JsonConverter;
#[cfg(feature = "text")]
pub use text::TextConverter;

use crate::traits::ConverterRegistry;

/// Parse info table of link definitions: id -> `{url, title?}`
pub const LINK_DEFS: &str = "link_defs";
/// Parse info table of footnote bodies: name -> `footnote_def` element
pub const FOOTNOTES: &str = "footnotes";
/// Parse info table of attribute list definitions: name -> attributes
pub const ALDS: &str = "alds";

pub(crate) fn register_builtins(registry: &mut ConverterRegistry) {
    #[cfg(feature = "html")]
    registry.register(Box::new(HtmlConverter::new()));
    #[cfg(feature = "json")]
    registry.register(Box::new(JsonConverter::new()));
    #[cfg(feature = "text")]
    registry.register(Box::new(TextConverter::new()));
}
