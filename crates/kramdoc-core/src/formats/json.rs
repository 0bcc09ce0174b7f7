// SPDX-License-Identifier: AGPL-3.0-or-later
//! JSON tree dump

use crate::ast::Element;
use crate::traits::{ConvertContext, Converter, Result};

/// Serializes the tree as pretty-printed JSON
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonConverter;

impl JsonConverter {
    pub fn new() -> Self {
        Self
    }
}

impl Converter for JsonConverter {
    fn format(&self) -> &'static str {
        "json"
    }

    fn convert(&self, tree: &Element, _ctx: &mut ConvertContext<'_>) -> Result<String> {
        let mut output = serde_json::to_string_pretty(tree)?;
        output.push('\n');
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{Element, Value};
    use crate::document::Document;
    use crate::options::Options;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_tree_dump_reads_back() {
        let mut doc = Document::new("# Hi {#top}\n\nSome *text*", Options::new()).unwrap();
        let json = doc.to_json().unwrap();
        let back: Element = serde_json::from_str(&json).unwrap();
        assert_eq!(&back, doc.tree());
        assert!(doc.warnings().is_empty());
    }

    #[test]
    fn test_dump_shape() {
        let mut doc = Document::new("plain", Options::new()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&doc.to_json().unwrap()).unwrap();
        assert_eq!(json["kind"], "root");
        assert_eq!(json["children"][0]["kind"], "p");
        assert_eq!(json["children"][0]["children"][0]["value"], "plain");
        assert_eq!(
            doc.tree().children[0].children[0].value,
            Some(Value::from("plain"))
        );
    }
}
