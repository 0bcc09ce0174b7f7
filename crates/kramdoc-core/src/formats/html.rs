// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTML converter

use super::FOOTNOTES;
use crate::ast::{Element, Value};
use crate::traits::{ConvertContext, Converter, ParseInfos, Result, Warnings};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::{BTreeMap, BTreeSet};

static RAW_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"</?([A-Za-z][A-Za-z0-9]*)(?:\s[^<>]*)?/?>").expect("raw tag regex")
});

/// Renders a tree as an HTML fragment
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlConverter;

impl HtmlConverter {
    pub fn new() -> Self {
        Self
    }
}

impl Converter for HtmlConverter {
    fn format(&self) -> &'static str {
        "html"
    }

    fn convert(&self, tree: &Element, ctx: &mut ConvertContext<'_>) -> Result<String> {
        let mut renderer = HtmlRenderer {
            infos: &*ctx.parse_infos,
            warnings: &mut *ctx.warnings,
            filter: ctx.options.filter_html(),
            first_footnote: ctx.options.footnote_nr(),
            footnote_numbers: BTreeMap::new(),
            footnote_order: Vec::new(),
        };

        let mut output = String::new();
        renderer.render(&mut output, tree);
        if !output.is_empty() && !output.ends_with('\n') {
            output.push('\n');
        }
        renderer.render_footnotes(&mut output);
        Ok(output)
    }
}

struct HtmlRenderer<'r> {
    infos: &'r ParseInfos,
    warnings: &'r mut Warnings,
    filter: BTreeSet<String>,
    first_footnote: i64,
    footnote_numbers: BTreeMap<String, i64>,
    footnote_order: Vec<String>,
}

impl<'r> HtmlRenderer<'r> {
    fn render(&mut self, output: &mut String, el: &Element) {
        match el.kind.as_str() {
            "root" => self.render_blocks(output, &el.children),
            "p" => {
                if el.flag("transparent") {
                    self.render_children(output, el);
                } else {
                    self.wrap(output, el, "p");
                }
            }
            "header" => {
                let level = match el.value.as_ref().and_then(Value::as_integer) {
                    Some(level) => level.clamp(1, 6),
                    None => {
                        self.warnings
                            .push("header without a numeric level, rendering it as <h1>");
                        1
                    }
                };
                self.wrap(output, el, &format!("h{level}"));
            }
            "hr" => {
                output.push_str(&format!("<hr{} />", attrs(el)));
            }
            "codeblock" => {
                output.push_str(&format!("<pre{}><code>", attrs(el)));
                output.push_str(&escape(el.value_str().unwrap_or("")));
                output.push_str("</code></pre>");
            }
            "blockquote" | "ul" | "ol" => {
                output.push_str(&format!("<{}{}>\n", el.kind, attrs(el)));
                self.render_blocks(output, &el.children);
                output.push_str(&format!("</{}>", el.kind));
            }
            "li" => {
                output.push_str(&format!("<li{}>", attrs(el)));
                self.render_list_item(output, el);
                output.push_str("</li>");
            }
            "html_element" => {
                let tag = el.value_str().unwrap_or("div").to_ascii_lowercase();
                if self.filter.contains(&tag) {
                    self.render_children(output, el);
                } else {
                    self.wrap(output, el, &tag);
                }
            }
            "html_raw" | "raw" => {
                let html = self.strip_filtered(el.value_str().unwrap_or(""));
                output.push_str(&html);
            }
            "comment" => {
                output.push_str(&format!("<!-- {} -->", el.value_str().unwrap_or("")));
            }
            "text" => output.push_str(&escape(el.value_str().unwrap_or(""))),
            "em" | "strong" => self.wrap(output, el, &el.kind),
            "codespan" => {
                output.push_str(&format!("<code{}>", attrs(el)));
                output.push_str(&escape(el.value_str().unwrap_or("")));
                output.push_str("</code>");
            }
            "br" => output.push_str("<br />"),
            "a" => self.wrap(output, el, "a"),
            "img" => output.push_str(&format!("<img{} />", attrs(el))),
            "html_tag" => {
                let tag = el
                    .option("tag")
                    .and_then(Value::as_str)
                    .map(str::to_ascii_lowercase)
                    .unwrap_or_default();
                if !self.filter.contains(&tag) {
                    output.push_str(el.value_str().unwrap_or(""));
                }
            }
            "footnote" => self.render_footnote_ref(output, el),
            other => {
                self.warnings.push(format!(
                    "html converter has no rule for element kind `{other}`, rendering its children"
                ));
                self.render_children(output, el);
            }
        }
    }

    fn wrap(&mut self, output: &mut String, el: &Element, tag: &str) {
        output.push_str(&format!("<{tag}{}>", attrs(el)));
        self.render_children(output, el);
        output.push_str(&format!("</{tag}>"));
    }

    fn render_children(&mut self, output: &mut String, el: &Element) {
        for child in &el.children {
            self.render(output, child);
        }
    }

    /// Block-level children, each finished with a newline
    fn render_blocks(&mut self, output: &mut String, children: &[Element]) {
        for child in children {
            let before = output.len();
            self.render(output, child);
            if output.len() > before && !output.ends_with('\n') {
                output.push('\n');
            }
        }
    }

    fn render_list_item(&mut self, output: &mut String, el: &Element) {
        let last = el.children.len().saturating_sub(1);
        for (idx, child) in el.children.iter().enumerate() {
            if child.is("p") && child.flag("transparent") {
                self.render_children(output, child);
                if idx < last {
                    output.push('\n');
                }
            } else {
                if !output.ends_with('\n') {
                    output.push('\n');
                }
                self.render_blocks(output, std::slice::from_ref(child));
            }
        }
    }

    /// Raw HTML with every tag named in `filter_html` removed; the text
    /// between such tags is kept
    fn strip_filtered(&self, html: &str) -> String {
        if self.filter.is_empty() {
            return html.to_string();
        }
        let mut removed = false;
        let kept = RAW_TAG.replace_all(html, |caps: &Captures<'_>| {
            if self.filter.contains(&caps[1].to_ascii_lowercase()) {
                removed = true;
                String::new()
            } else {
                caps[0].to_string()
            }
        });
        if removed {
            kept.trim_matches('\n').to_string()
        } else {
            kept.into_owned()
        }
    }

    fn render_footnote_ref(&mut self, output: &mut String, el: &Element) {
        let name = el.value_str().unwrap_or("");
        if footnote_body(self.infos, name).is_none() {
            self.warnings.push(format!(
                "footnote `{name}` has no definition, rendering it as text"
            ));
            output.push_str(&escape(&format!("[^{name}]")));
            return;
        }

        let name_attr = escape_attr(name);
        match self.footnote_numbers.get(name) {
            Some(number) => output.push_str(&format!(
                "<sup><a href=\"#fn:{name_attr}\" class=\"footnote\">{number}</a></sup>"
            )),
            None => {
                let number = self
                    .first_footnote
                    .saturating_add(self.footnote_order.len() as i64);
                self.footnote_numbers.insert(name.to_string(), number);
                self.footnote_order.push(name.to_string());
                output.push_str(&format!(
                    "<sup id=\"fnref:{name_attr}\"><a href=\"#fn:{name_attr}\" class=\"footnote\">{number}</a></sup>"
                ));
            }
        }
    }

    /// Footnote section in order of first reference; bodies may reference
    /// further footnotes, which are appended as they are met
    fn render_footnotes(&mut self, output: &mut String) {
        if self.footnote_order.is_empty() {
            return;
        }
        let infos: &'r ParseInfos = self.infos;
        output.push_str("<div class=\"footnotes\">\n");
        output.push_str(&format!("<ol start=\"{}\">\n", self.first_footnote));
        let mut idx = 0;
        while idx < self.footnote_order.len() {
            let name = self.footnote_order[idx].clone();
            let name_attr = escape_attr(&name);
            output.push_str(&format!("<li id=\"fn:{name_attr}\">\n"));
            if let Some(body) = footnote_body(infos, &name) {
                self.render_blocks(output, &body.children);
            }
            output.push_str(&format!(
                "<a href=\"#fnref:{name_attr}\" class=\"reversefootnote\">&#8617;</a>\n</li>\n"
            ));
            idx += 1;
        }
        output.push_str("</ol>\n</div>\n");
    }
}

fn footnote_body<'i>(infos: &'i ParseInfos, name: &str) -> Option<&'i Element> {
    infos.lookup(FOOTNOTES, name).and_then(Value::as_element)
}

fn attrs(el: &Element) -> String {
    let Some(attr) = el.attr() else {
        return String::new();
    };
    attr.iter()
        .map(|(key, value)| format!(" {key}=\"{}\"", escape_attr(&value.to_string())))
        .collect()
}

fn escape(text: &str) -> String {
    html_escape::encode_text(text).into_owned()
}

fn escape_attr(text: &str) -> String {
    html_escape::encode_double_quoted_attribute(text).into_owned()
}
