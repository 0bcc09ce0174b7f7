// SPDX-License-Identifier: AGPL-3.0-or-later
//! Plain text converter

use super::FOOTNOTES;
use crate::ast::{Element, Value};
use crate::traits::{ConvertContext, Converter, ParseInfos, Result, Warnings};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

static TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<!--(?s:.*?)-->|</?[A-Za-z][^<>]*>").expect("tag regex"));

/// Renders a tree as plain text
///
/// Ordered lists are numbered from 1 whatever numbers the source used.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextConverter;

impl TextConverter {
    pub fn new() -> Self {
        Self
    }
}

impl Converter for TextConverter {
    fn format(&self) -> &'static str {
        "text"
    }

    fn convert(&self, tree: &Element, ctx: &mut ConvertContext<'_>) -> Result<String> {
        let mut renderer = TextRenderer {
            infos: &*ctx.parse_infos,
            warnings: &mut *ctx.warnings,
            first_footnote: ctx.options.footnote_nr(),
            footnote_numbers: BTreeMap::new(),
            footnote_order: Vec::new(),
        };

        let mut output = renderer.render_block(tree);

        let infos = renderer.infos;
        let mut notes = Vec::new();
        let mut idx = 0;
        while idx < renderer.footnote_order.len() {
            let name = renderer.footnote_order[idx].clone();
            let number = renderer.first_footnote.saturating_add(idx as i64);
            let body = infos
                .lookup(FOOTNOTES, &name)
                .and_then(Value::as_element)
                .map(|body| renderer.render_blocks(&body.children, "\n"))
                .unwrap_or_default();
            notes.push(format!("[{number}] {body}"));
            idx += 1;
        }
        if !notes.is_empty() {
            if !output.is_empty() {
                output.push_str("\n\n");
            }
            output.push_str(&notes.join("\n"));
        }

        if !output.is_empty() {
            output.push('\n');
        }
        Ok(output)
    }
}

struct TextRenderer<'r> {
    infos: &'r ParseInfos,
    warnings: &'r mut Warnings,
    first_footnote: i64,
    footnote_numbers: BTreeMap<String, i64>,
    footnote_order: Vec<String>,
}

impl TextRenderer<'_> {
    fn render_block(&mut self, el: &Element) -> String {
        match el.kind.as_str() {
            "root" => self.render_blocks(&el.children, "\n\n"),
            "p" | "header" => self.render_inlines(el),
            "codeblock" => el.value_str().unwrap_or("").trim_end_matches('\n').to_string(),
            "hr" => "----".to_string(),
            "blockquote" => prefix_lines(&self.render_blocks(&el.children, "\n\n"), "> ", "> "),
            "ul" | "ol" => {
                let ordered = el.is("ol");
                let items: Vec<String> = el
                    .children
                    .iter()
                    .enumerate()
                    .map(|(n, item)| {
                        let marker = if ordered {
                            format!("{}. ", n + 1)
                        } else {
                            "- ".to_string()
                        };
                        let indent = " ".repeat(marker.len());
                        prefix_lines(&self.render_block(item), &marker, &indent)
                    })
                    .collect();
                items.join("\n")
            }
            "li" => self.render_blocks(&el.children, "\n"),
            "html_element" => self.render_blocks(&el.children, "\n\n"),
            "raw" | "html_raw" => strip_tags(el.value_str().unwrap_or("")).trim().to_string(),
            "comment" => String::new(),
            "text" | "em" | "strong" | "codespan" | "br" | "a" | "img" | "html_tag"
            | "footnote" => {
                let mut output = String::new();
                self.render_inline(&mut output, el);
                output
            }
            other => {
                self.warnings.push(format!(
                    "text converter has no rule for element kind `{other}`, rendering its children"
                ));
                self.render_blocks(&el.children, "\n\n")
            }
        }
    }

    /// Render block children, skipping any that come out empty
    fn render_blocks(&mut self, children: &[Element], separator: &str) -> String {
        children
            .iter()
            .map(|child| self.render_block(child))
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join(separator)
    }

    fn render_inlines(&mut self, el: &Element) -> String {
        let mut output = String::new();
        for child in &el.children {
            self.render_inline(&mut output, child);
        }
        output
    }

    fn render_inline(&mut self, output: &mut String, el: &Element) {
        match el.kind.as_str() {
            "text" | "codespan" => output.push_str(el.value_str().unwrap_or("")),
            "br" => output.push('\n'),
            "img" => {
                if let Some(alt) = el.attr_value("alt") {
                    output.push_str(&alt.to_string());
                }
            }
            "html_tag" => {}
            "footnote" => {
                let name = el.value_str().unwrap_or("");
                if self.infos.lookup(FOOTNOTES, name).is_none() {
                    self.warnings.push(format!(
                        "footnote `{name}` has no definition, rendering it as text"
                    ));
                    output.push_str(&format!("[^{name}]"));
                    return;
                }
                let number = match self.footnote_numbers.get(name) {
                    Some(number) => *number,
                    None => {
                        let number = self
                            .first_footnote
                            .saturating_add(self.footnote_order.len() as i64);
                        self.footnote_numbers.insert(name.to_string(), number);
                        self.footnote_order.push(name.to_string());
                        number
                    }
                };
                output.push_str(&format!("[{number}]"));
            }
            _ => {
                for child in &el.children {
                    self.render_inline(output, child);
                }
            }
        }
    }
}

fn prefix_lines(text: &str, first: &str, rest: &str) -> String {
    text.lines()
        .enumerate()
        .map(|(n, line)| {
            let prefix = if n == 0 { first } else { rest };
            if line.is_empty() {
                prefix.trim_end().to_string()
            } else {
                format!("{prefix}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn strip_tags(html: &str) -> String {
    let stripped = TAG.replace_all(html, "");
    html_escape::decode_html_entities(&stripped).into_owned()
}
