// SPDX-License-Identifier: AGPL-3.0-or-later
//! Kramdown-style grammar
//!
//! Parsing runs in two passes. The block pass splits the source into block
//! elements and files every definition (link targets, footnote bodies,
//! attribute list definitions) under the document's parse infos. The span
//! pass then parses inline text everywhere, so a reference resolves the same
//! way whether its definition comes before or after it.

use super::{ALDS, FOOTNOTES, LINK_DEFS};
use crate::ast::{Element, Value};
use crate::extension::{Directive, Handling};
use crate::traits::{ParseContext, ParseInfos, Parser, Result, Warnings};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use unicode_segmentation::UnicodeSegmentation;

/// Placeholder child holding span text until the span pass runs
const INLINE_SOURCE: &str = "inline_source";
/// Attribute list definition names referenced by a block, resolved late
const IAL_REFS: &str = "ial_refs";
const LINE: &str = "line";

/// Container depth (blockquotes, list items, footnotes) beyond which
/// content is kept as plain text
const MAX_NESTING: usize = 32;
const MAX_SPAN_NESTING: usize = 16;

const ESCAPABLE: &str = "\\`*_{}[]()#+-.!<>:|\"'$=";
const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

static DIRECTIVE_OPEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^ {0,3}\{::([A-Za-z][\w-]*)(.*?)(/)?\}[ \t]*$").expect("directive regex")
});
static DIRECTIVE_CLOSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ {0,3}\{:/([A-Za-z][\w-]*)?\}[ \t]*$").expect("directive end regex"));
static ALD_DEF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ {0,3}\{:([A-Za-z][\w-]*):(.*)\}[ \t]*$").expect("ald regex"));
static IAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ {0,3}\{:([^:/].*)?\}[ \t]*$").expect("ial regex"));
static ATTR_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"#([\w-]+)|\.([\w-]+)|([\w-]+)=(?:"([^"]*)"|'([^']*)')|([\w-]+)"#)
        .expect("attribute token regex")
});
static LINK_DEF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"^ {0,3}\[([^\]^][^\]]*)\]:[ \t]*<?([^\s>]+)>?(?:[ \t]+(?:"([^"]*)"|'([^']*)'|\(([^)]*)\)))?[ \t]*$"#,
    )
    .expect("link definition regex")
});
static FOOTNOTE_DEF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ {0,3}\[\^([\w-]+)\]:[ \t]?(.*)$").expect("footnote regex"));
static FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^~{3,}[ \t]*([\w-]*)[ \t]*$").expect("fence regex"));
static ATX_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(#{1,6})[ \t]*(.*?)(?:[ \t]+#+)?[ \t]*$").expect("header regex")
});
static HEADER_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*?)[ \t]*\{#([\w-]+)\}$").expect("header id regex"));
static BLOCKQUOTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ {0,3}> ?(.*)$").expect("blockquote regex"));
static UL_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ {0,3}[*+-][ \t]+(\S.*)$").expect("bullet regex"));
static OL_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ {0,3}\d{1,9}\.[ \t]+(\S.*)$").expect("ordinal regex"));
static HTML_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^<([A-Za-z][A-Za-z0-9]*)(?:\s|/?>|$)").expect("html start regex"));
static HTML_ELEMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^<([A-Za-z][A-Za-z0-9]*)((?:\s[^>]*?)?)>(.*)</([A-Za-z][A-Za-z0-9]*)\s*>\s*$")
        .expect("html element regex")
});
static HTML_ATTR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([A-Za-z_:][-A-Za-z0-9_:.]*)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+)))?"#)
        .expect("html attribute regex")
});
static FOOTNOTE_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[\^([\w-]+)\]").expect("footnote reference regex"));
static INLINE_TARGET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\(\s*<?([^\s>)]*)>?(?:\s+(?:"([^"]*)"|'([^']*)'))?\s*\)"#)
        .expect("inline target regex")
});
static AUTOLINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^<((?:https?|ftp|mailto):[^>\s]+)>").expect("autolink regex")
});
static INLINE_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^</?([A-Za-z][A-Za-z0-9]*)(?:\s[^<>]*)?/?>").expect("inline tag regex")
});

/// Parser for the kramdown-style block and span grammar
#[derive(Debug, Clone, Copy, Default)]
pub struct KramdownParser;

impl KramdownParser {
    pub fn new() -> Self {
        Self
    }
}

impl Parser for KramdownParser {
    fn name(&self) -> &'static str {
        "kramdown"
    }

    fn parse(&self, source: &str, ctx: &mut ParseContext<'_>) -> Result<Element> {
        let lines: Vec<Line> = source
            .lines()
            .enumerate()
            .map(|(n, text)| Line {
                text: text.to_string(),
                no: n + 1,
            })
            .collect();

        let mut root = Element::new("root");
        root.children = BlockParser { ctx: &mut *ctx }.blocks(&lines, 0);

        // Footnote bodies are parsed outside the tree, so they are taken out
        // while the span pass reads the remaining definitions.
        let mut footnotes = ctx
            .parse_infos
            .get_mut(FOOTNOTES)
            .and_then(Value::as_map_mut)
            .map(std::mem::take)
            .unwrap_or_default();
        let names: BTreeSet<String> = footnotes.keys().cloned().collect();
        {
            let mut spans = SpanParser {
                infos: &*ctx.parse_infos,
                footnotes: &names,
                warnings: &mut *ctx.warnings,
            };
            spans.resolve(&mut root);
            for body in footnotes.values_mut().filter_map(Value::as_element_mut) {
                spans.resolve(body);
            }
        }
        if !footnotes.is_empty() {
            *ctx.parse_infos.table_mut(FOOTNOTES) = footnotes;
        }

        if ctx.options.auto_ids() {
            let mut used = BTreeSet::new();
            collect_header_ids(&root, &mut used);
            assign_header_ids(&mut root, &mut used);
        }

        Ok(root)
    }
}

#[derive(Debug, Clone)]
struct Line {
    text: String,
    no: usize,
}

impl Line {
    fn new(text: impl Into<String>, no: usize) -> Self {
        Self {
            text: text.into(),
            no,
        }
    }

    fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

struct BlockParser<'c, 'a> {
    ctx: &'c mut ParseContext<'a>,
}

impl BlockParser<'_, '_> {
    fn blocks(&mut self, lines: &[Line], depth: usize) -> Vec<Element> {
        if depth > MAX_NESTING {
            let line = lines.first().map_or(0, |l| l.no);
            self.ctx.warn(format!(
                "content at line {line} is nested deeper than {MAX_NESTING} levels, keeping it as plain text"
            ));
            let text = lines.iter().map(|l| l.text.trim()).collect::<Vec<_>>().join("\n");
            return vec![Element::new("p").child(Element::with_value("text", text))];
        }

        let mut out: Vec<Element> = Vec::new();
        // An attribute list may only attach to a block it directly follows
        let mut attachable = false;
        let mut i = 0;

        while i < lines.len() {
            let line = &lines[i];
            let text = line.text.as_str();

            if line.is_blank() {
                attachable = false;
                i += 1;
                continue;
            }

            if let Some(caps) = DIRECTIVE_OPEN.captures(text) {
                let name = caps[1].to_string();
                let args = caps.get(2).map_or("", |m| m.as_str());
                let self_closing = caps.get(3).is_some();
                match self.directive(lines, i, &name, args, self_closing) {
                    Some((elements, next)) => {
                        attachable = !elements.is_empty();
                        out.extend(elements);
                        i = next;
                    }
                    None => {
                        out.push(paragraph(&lines[i..=i]));
                        attachable = true;
                        i += 1;
                    }
                }
                continue;
            }

            if let Some(caps) = ALD_DEF.captures(text) {
                let (attrs, _) = parse_attr_list(&caps[2]);
                let map = attrs
                    .into_iter()
                    .map(|(k, v)| (k, Value::String(v)))
                    .collect::<BTreeMap<_, _>>();
                self.ctx
                    .parse_infos
                    .table_mut(ALDS)
                    .insert(caps[1].to_string(), Value::Map(map));
                attachable = false;
                i += 1;
                continue;
            }

            if let Some(caps) = IAL.captures(text) {
                let attr_list = caps.get(1).map_or("", |m| m.as_str());
                match out.last_mut() {
                    Some(prev) if attachable => apply_ial(prev, attr_list),
                    _ => self.ctx.warn(format!(
                        "attribute list at line {} does not follow a block, ignoring it",
                        line.no
                    )),
                }
                i += 1;
                continue;
            }

            if let Some(caps) = LINK_DEF.captures(text) {
                let id = normalize_id(&caps[1]);
                let mut def = BTreeMap::new();
                def.insert("url".to_string(), Value::from(&caps[2]));
                if let Some(title) = caps.get(3).or(caps.get(4)).or(caps.get(5)) {
                    def.insert("title".to_string(), Value::from(title.as_str()));
                }
                if self.ctx.parse_infos.lookup(LINK_DEFS, &id).is_some() {
                    self.ctx.warn(format!(
                        "duplicate link definition `{id}` at line {}, keeping the first",
                        line.no
                    ));
                } else {
                    self.ctx
                        .parse_infos
                        .table_mut(LINK_DEFS)
                        .insert(id, Value::Map(def));
                }
                attachable = false;
                i += 1;
                continue;
            }

            if let Some(caps) = FOOTNOTE_DEF.captures(text) {
                let name = caps[1].to_string();
                let first = caps[2].to_string();
                i = self.footnote_def(lines, i, name, first, depth);
                attachable = false;
                continue;
            }

            if let Some(caps) = FENCE.captures(text) {
                let (el, next) = self.fenced_code(lines, i, &caps[1]);
                out.push(el);
                attachable = true;
                i = next;
                continue;
            }

            if indent_width(text) >= 4 {
                let (el, next) = indented_code(lines, i);
                out.push(el);
                attachable = true;
                i = next;
                continue;
            }

            if is_hr(text) {
                out.push(Element::new("hr"));
                attachable = true;
                i += 1;
                continue;
            }

            if let Some(caps) = ATX_HEADER.captures(text) {
                out.push(header(caps[1].len(), &caps[2], line.no));
                attachable = true;
                i += 1;
                continue;
            }

            if BLOCKQUOTE.is_match(text) {
                let mut quoted = Vec::new();
                while i < lines.len() {
                    match BLOCKQUOTE.captures(&lines[i].text) {
                        Some(caps) => quoted.push(Line::new(&caps[1], lines[i].no)),
                        None => break,
                    }
                    i += 1;
                }
                let mut quote = Element::new("blockquote");
                quote.children = self.blocks(&quoted, depth + 1);
                out.push(quote);
                attachable = true;
                continue;
            }

            if let Some((kind, _)) = list_marker(text) {
                let (list, next) = self.list(lines, i, kind, depth);
                out.push(list);
                attachable = true;
                i = next;
                continue;
            }

            if let Some(caps) = HTML_START.captures(text) {
                let tag = caps[1].to_ascii_lowercase();
                let (el, next) = self.html_block(lines, i, &tag);
                out.push(el);
                attachable = true;
                i = next;
                continue;
            }

            let mut end = i + 1;
            while end < lines.len() && !interrupts_paragraph(&lines[end]) {
                end += 1;
            }
            out.push(paragraph(&lines[i..end]));
            attachable = true;
            i = end;
        }

        out
    }

    /// Handle `{::name ...}`; `None` means the directive is not closed and the
    /// opening line should be read as text
    fn directive(
        &mut self,
        lines: &[Line],
        start: usize,
        name: &str,
        args: &str,
        self_closing: bool,
    ) -> Option<(Vec<Element>, usize)> {
        let line_no = lines[start].no;
        let (body, next) = if self_closing {
            (None, start + 1)
        } else {
            let close = lines[start + 1..].iter().position(|l| {
                DIRECTIVE_CLOSE
                    .captures(&l.text)
                    .is_some_and(|caps| caps.get(1).map_or(true, |m| m.as_str() == name))
            });
            match close {
                Some(offset) => {
                    let end = start + 1 + offset;
                    let body = lines[start + 1..end]
                        .iter()
                        .map(|l| l.text.as_str())
                        .collect::<Vec<_>>()
                        .join("\n");
                    (Some(body), end + 1)
                }
                None => {
                    self.ctx.warn(format!(
                        "extension `{name}` opened at line {line_no} is never closed, treating it as text"
                    ));
                    return None;
                }
            }
        };

        let (attrs, _) = parse_attr_list(args);
        let directive = Directive {
            name: name.to_string(),
            args: attrs,
            body,
            line: line_no,
        };

        let extension = self.ctx.extension;
        let handling = match name {
            "comment" => extension.comment(&directive),
            "nomarkdown" => extension.nomarkdown(&directive),
            _ => extension.custom(&directive),
        };

        let elements = match handling {
            Handling::Replace(elements) => elements,
            Handling::Default => match name {
                "comment" => vec![Element::with_value("comment", directive.body_str())],
                "nomarkdown" => vec![Element::with_value("raw", directive.body_str())],
                _ => {
                    self.ctx.warn(format!(
                        "unknown extension `{name}` at line {line_no}, ignoring it"
                    ));
                    Vec::new()
                }
            },
        };
        Some((elements, next))
    }

    fn footnote_def(
        &mut self,
        lines: &[Line],
        start: usize,
        name: String,
        first: String,
        depth: usize,
    ) -> usize {
        let mut body = vec![Line::new(first, lines[start].no)];
        let mut i = start + 1;
        while i < lines.len() {
            let line = &lines[i];
            if line.is_blank() {
                match next_non_blank(lines, i) {
                    Some(k) if indent_width(&lines[k].text) >= 4 => {
                        body.extend(lines[i..k].iter().map(|l| Line::new("", l.no)));
                        i = k;
                    }
                    _ => break,
                }
            } else if indent_width(&line.text) >= 4 {
                body.push(Line::new(strip_indent(&line.text, 4), line.no));
                i += 1;
            } else if !interrupts_paragraph(line) {
                body.push(Line::new(line.text.trim_start(), line.no));
                i += 1;
            } else {
                break;
            }
        }

        let mut def = Element::with_value("footnote_def", name.as_str());
        def.children = self.blocks(&body, depth + 1);

        if self.ctx.parse_infos.lookup(FOOTNOTES, &name).is_some() {
            self.ctx.warn(format!(
                "duplicate footnote definition `{name}` at line {}, keeping the first",
                lines[start].no
            ));
        } else {
            self.ctx
                .parse_infos
                .table_mut(FOOTNOTES)
                .insert(name, Value::from(def));
        }
        i
    }

    fn fenced_code(&mut self, lines: &[Line], start: usize, lang: &str) -> (Element, usize) {
        let close = lines[start + 1..]
            .iter()
            .position(|l| FENCE.captures(&l.text).is_some_and(|c| c[1].is_empty()));
        let end = match close {
            Some(offset) => start + 1 + offset,
            None => {
                self.ctx.warn(format!(
                    "code fence opened at line {} is never closed, running it to the end",
                    lines[start].no
                ));
                lines.len()
            }
        };

        let mut code = lines[start + 1..end]
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        if !code.is_empty() {
            code.push('\n');
        }
        let mut el = Element::with_value("codeblock", code);
        if !lang.is_empty() {
            el.set_attr("class", format!("language-{lang}"));
        }
        (el, (end + 1).min(lines.len()))
    }

    fn list(&mut self, lines: &[Line], start: usize, kind: &'static str, depth: usize) -> (Element, usize) {
        let mut list = Element::new(kind);
        let mut i = start;
        // A blank line between two items makes both of them loose
        let mut after_blank = false;

        'items: while i < lines.len() {
            let Some((item_kind, indent)) = list_marker(&lines[i].text) else {
                break;
            };
            if item_kind != kind {
                break;
            }

            let mut body = vec![Line::new(&lines[i].text[indent..], lines[i].no)];
            let mut loose = after_blank;
            let mut list_done = false;
            after_blank = false;
            i += 1;

            while i < lines.len() {
                let line = &lines[i];
                if line.is_blank() {
                    match next_non_blank(lines, i) {
                        Some(k) if indent_width(&lines[k].text) >= indent => {
                            body.extend(lines[i..k].iter().map(|l| Line::new("", l.no)));
                            loose = true;
                            i = k;
                        }
                        Some(k) if list_marker(&lines[k].text).map(|m| m.0) == Some(kind) => {
                            loose = true;
                            after_blank = true;
                            i = k;
                            break;
                        }
                        _ => {
                            list_done = true;
                            break;
                        }
                    }
                } else if indent_width(&line.text) >= indent {
                    body.push(Line::new(strip_indent(&line.text, indent), line.no));
                    i += 1;
                } else if interrupts_paragraph(line) {
                    break;
                } else {
                    body.push(Line::new(line.text.trim_start(), line.no));
                    i += 1;
                }
            }

            let mut item = Element::new("li");
            item.children = self.blocks(&body, depth + 1);
            if !loose {
                for child in item.children.iter_mut().filter(|c| c.is("p")) {
                    child.options.insert("transparent".to_string(), Value::Bool(true));
                }
            }
            list.children.push(item);

            if list_done {
                break 'items;
            }
        }

        (list, i)
    }

    fn html_block(&mut self, lines: &[Line], start: usize, tag: &str) -> (Element, usize) {
        let mut end = start;
        while end < lines.len() && !lines[end].is_blank() {
            end += 1;
        }
        let raw = lines[start..end]
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        if let Some(caps) = HTML_ELEMENT.captures(&raw) {
            if caps[1].eq_ignore_ascii_case(&caps[4]) {
                let mut el = Element::with_value("html_element", tag);
                for attr in HTML_ATTR.captures_iter(&caps[2]) {
                    let value = attr
                        .get(2)
                        .or(attr.get(3))
                        .or(attr.get(4))
                        .map_or("", |m| m.as_str());
                    el.set_attr(&attr[1], value);
                }
                el.children
                    .push(Element::with_value("raw", caps[3].trim_matches('\n')));
                return (el, end);
            }
        }

        let trimmed = raw.trim_end();
        if !trimmed.ends_with("/>") && !VOID_TAGS.contains(&tag) && !raw.contains("</") {
            self.ctx.warn(format!(
                "HTML block <{tag}> at line {} has no end tag, passing it through unchanged",
                lines[start].no
            ));
        }
        (Element::with_value("html_raw", raw), end)
    }
}

fn paragraph(lines: &[Line]) -> Element {
    let text = lines
        .iter()
        .map(|l| l.text.trim_start())
        .collect::<Vec<_>>()
        .join("\n");
    let line = lines.first().map_or(0, |l| l.no);
    Element::new("p").child(inline_source(text.trim_end(), line))
}

fn header(level: usize, text: &str, line: usize) -> Element {
    let mut el = Element::with_value("header", level as i64);
    let text = match HEADER_ID.captures(text) {
        Some(caps) => {
            el.set_attr("id", &caps[2]);
            caps.get(1).map_or("", |m| m.as_str())
        }
        None => text,
    };
    el.children.push(inline_source(strip_closing_hashes(text), line));
    el
}

/// Drop a trailing run of `#` that is separated from the text by whitespace
fn strip_closing_hashes(text: &str) -> &str {
    let trimmed = text.trim_end();
    let body = trimmed.trim_end_matches('#');
    if body.len() < trimmed.len() && (body.is_empty() || body.ends_with([' ', '\t'])) {
        body.trim_end()
    } else {
        trimmed
    }
}

fn indented_code(lines: &[Line], start: usize) -> (Element, usize) {
    let mut end = start;
    while end < lines.len() && (lines[end].is_blank() || indent_width(&lines[end].text) >= 4) {
        end += 1;
    }
    while end > start && lines[end - 1].is_blank() {
        end -= 1;
    }
    let mut code = lines[start..end]
        .iter()
        .map(|l| strip_indent(&l.text, 4))
        .collect::<Vec<_>>()
        .join("\n");
    code.push('\n');
    (Element::with_value("codeblock", code), end)
}

fn inline_source(text: &str, line: usize) -> Element {
    let mut el = Element::with_value(INLINE_SOURCE, text);
    el.options.insert(LINE.to_string(), Value::Integer(line as i64));
    el
}

fn interrupts_paragraph(line: &Line) -> bool {
    let text = line.text.as_str();
    line.is_blank()
        || DIRECTIVE_OPEN.is_match(text)
        || ALD_DEF.is_match(text)
        || IAL.is_match(text)
        || LINK_DEF.is_match(text)
        || FOOTNOTE_DEF.is_match(text)
        || FENCE.is_match(text)
        || ATX_HEADER.is_match(text)
        || BLOCKQUOTE.is_match(text)
        || is_hr(text)
        || list_marker(text).is_some()
}

fn is_hr(text: &str) -> bool {
    if indent_width(text) > 3 {
        return false;
    }
    let marks: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
    marks.len() >= 3
        && matches!(marks[0], '*' | '-' | '_')
        && marks.iter().all(|&c| c == marks[0])
}

/// List kind and the column where item content starts
fn list_marker(text: &str) -> Option<(&'static str, usize)> {
    if is_hr(text) {
        return None;
    }
    if let Some(caps) = UL_MARKER.captures(text) {
        return caps.get(1).map(|m| ("ul", m.start()));
    }
    OL_MARKER
        .captures(text)
        .and_then(|caps| caps.get(1).map(|m| ("ol", m.start())))
}

fn next_non_blank(lines: &[Line], from: usize) -> Option<usize> {
    (from..lines.len()).find(|&k| !lines[k].is_blank())
}

/// Leading whitespace width, tabs advancing to the next multiple of four
fn indent_width(text: &str) -> usize {
    let mut width = 0;
    for c in text.chars() {
        match c {
            ' ' => width += 1,
            '\t' => width += 4 - width % 4,
            _ => break,
        }
    }
    width
}

fn strip_indent(text: &str, columns: usize) -> String {
    let mut width = 0;
    for (idx, c) in text.char_indices() {
        if width >= columns {
            return text[idx..].to_string();
        }
        match c {
            ' ' => width += 1,
            '\t' => {
                let next = width + 4 - width % 4;
                if next > columns {
                    let pad = " ".repeat(next - columns);
                    return format!("{pad}{}", &text[idx + 1..]);
                }
                width = next;
            }
            _ => return text[idx..].to_string(),
        }
    }
    String::new()
}

fn normalize_id(id: &str) -> String {
    id.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Split `#id .class key="value" name` into attributes and bare names
fn parse_attr_list(list: &str) -> (BTreeMap<String, String>, Vec<String>) {
    let mut attrs = BTreeMap::new();
    let mut classes = Vec::new();
    let mut refs = Vec::new();
    for caps in ATTR_TOKEN.captures_iter(list) {
        if let Some(id) = caps.get(1) {
            attrs.insert("id".to_string(), id.as_str().to_string());
        } else if let Some(class) = caps.get(2) {
            classes.push(class.as_str().to_string());
        } else if let Some(key) = caps.get(3) {
            let value = caps.get(4).or(caps.get(5)).map_or("", |m| m.as_str());
            attrs.insert(key.as_str().to_string(), value.to_string());
        } else if let Some(name) = caps.get(6) {
            refs.push(name.as_str().to_string());
        }
    }
    if !classes.is_empty() {
        attrs.insert("class".to_string(), classes.join(" "));
    }
    (attrs, refs)
}

fn merge_attr(target: &mut BTreeMap<String, String>, key: String, value: String) {
    match target.get_mut(&key) {
        Some(existing) if key == "class" && !existing.is_empty() => {
            existing.push(' ');
            existing.push_str(&value);
        }
        _ => {
            target.insert(key, value);
        }
    }
}

fn apply_ial(el: &mut Element, list: &str) {
    let (attrs, refs) = parse_attr_list(list);
    let mut current: BTreeMap<String, String> = el
        .attr()
        .map(|a| a.iter().map(|(k, v)| (k.clone(), v.to_string())).collect())
        .unwrap_or_default();
    for (key, value) in attrs {
        merge_attr(&mut current, key, value);
    }
    for (key, value) in current {
        el.set_attr(key, value);
    }
    if !refs.is_empty() {
        let slot = el
            .options
            .entry(IAL_REFS.to_string())
            .or_insert_with(|| Value::List(Vec::new()));
        if let Value::List(list) = slot {
            list.extend(refs.into_iter().map(Value::String));
        }
    }
}

fn collect_header_ids(el: &Element, used: &mut BTreeSet<String>) {
    for node in el.walk() {
        if node.is("header") {
            if let Some(id) = node.attr_value("id") {
                used.insert(id.to_string());
            }
        }
    }
}

fn assign_header_ids(el: &mut Element, used: &mut BTreeSet<String>) {
    if el.is("header") && el.attr_value("id").is_none() {
        let base = header_slug(&el.text_content());
        let mut id = base.clone();
        let mut n = 1;
        while used.contains(&id) {
            id = format!("{base}-{n}");
            n += 1;
        }
        used.insert(id.clone());
        el.set_attr("id", id);
    }
    for child in &mut el.children {
        assign_header_ids(child, used);
    }
}

/// Lowercased words joined by `-`, starting with a letter
fn header_slug(text: &str) -> String {
    let words: Vec<String> = text
        .unicode_words()
        .map(|w| {
            w.chars()
                .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
                .flat_map(char::to_lowercase)
                .collect::<String>()
        })
        .filter(|w| !w.is_empty())
        .collect();
    let joined = words.join("-");
    let slug = joined.trim_start_matches(|c: char| !c.is_alphabetic());
    if slug.is_empty() {
        "section".to_string()
    } else {
        slug.to_string()
    }
}

enum Scan {
    /// Parsed element and the number of bytes it consumed
    Node(Element, usize),
    /// Bytes to copy through verbatim
    Literal(usize),
}

struct SpanParser<'p> {
    infos: &'p ParseInfos,
    footnotes: &'p BTreeSet<String>,
    warnings: &'p mut Warnings,
}

impl SpanParser<'_> {
    /// Replace span placeholders in the subtree and resolve attribute
    /// list references
    fn resolve(&mut self, el: &mut Element) {
        if let Some(Value::List(refs)) = el.options.remove(IAL_REFS) {
            self.resolve_ald_refs(el, &refs);
        }
        let children = std::mem::take(&mut el.children);
        for mut child in children {
            if child.is(INLINE_SOURCE) {
                let line = child.option(LINE).and_then(Value::as_integer).unwrap_or(0) as usize;
                let text = child.value_str().unwrap_or("");
                el.children.extend(self.spans(text, line, 0));
            } else {
                self.resolve(&mut child);
                el.children.push(child);
            }
        }
    }

    fn resolve_ald_refs(&mut self, el: &mut Element, refs: &[Value]) {
        let mut merged = BTreeMap::new();
        for name in refs.iter().filter_map(Value::as_str) {
            match self.infos.lookup(ALDS, name).and_then(Value::as_map) {
                Some(def) => {
                    for (k, v) in def {
                        merge_attr(&mut merged, k.clone(), v.to_string());
                    }
                }
                None => self.warnings.push(format!(
                    "attribute list references undefined name `{name}`, ignoring it"
                )),
            }
        }
        if let Some(own) = el.attr() {
            for (k, v) in own {
                merge_attr(&mut merged, k.clone(), v.to_string());
            }
        }
        for (k, v) in merged {
            el.set_attr(k, v);
        }
    }

    fn spans(&mut self, text: &str, line: usize, depth: usize) -> Vec<Element> {
        let mut out = Vec::new();
        let mut buf = String::new();
        let bytes = text.as_bytes();
        let mut i = 0;

        while i < text.len() {
            let rest = &text[i..];
            let scan = match bytes[i] {
                b'\\' => match rest[1..].chars().next() {
                    Some(next) if ESCAPABLE.contains(next) => {
                        buf.push(next);
                        i += 1 + next.len_utf8();
                        continue;
                    }
                    _ => None,
                },
                b'`' => Some(code_span(rest)),
                b'*' | b'_' if depth < MAX_SPAN_NESTING => {
                    let prev = text[..i].chars().next_back();
                    self.emphasis(rest, prev, line, depth)
                }
                b'!' if rest.starts_with("![") => self.image(rest, line),
                b'[' => self.bracket(rest, line, depth),
                b'<' => inline_html(rest),
                b' ' => hard_break(rest).map(|len| Scan::Node(Element::new("br"), len)),
                _ => None,
            };

            match scan {
                Some(Scan::Node(el, len)) => {
                    flush_text(&mut buf, &mut out);
                    out.push(el);
                    i += len;
                }
                Some(Scan::Literal(len)) => {
                    buf.push_str(&rest[..len]);
                    i += len;
                }
                None => {
                    let c = rest.chars().next().unwrap_or_default();
                    buf.push(c);
                    i += c.len_utf8().max(1);
                }
            }
        }
        flush_text(&mut buf, &mut out);
        out
    }

    fn emphasis(&mut self, rest: &str, prev: Option<char>, line: usize, depth: usize) -> Option<Scan> {
        let delim = rest.as_bytes()[0];
        let run = rest.bytes().take_while(|&b| b == delim).count();
        if delim == b'_' && prev.is_some_and(char::is_alphanumeric) {
            return Some(Scan::Literal(run));
        }
        let width = if run >= 2 { 2 } else { 1 };
        let opens = rest[width..]
            .chars()
            .next()
            .is_some_and(|c| !c.is_whitespace());
        if !opens {
            return Some(Scan::Literal(run));
        }
        let Some(close) = find_closing(rest, width, delim) else {
            return Some(Scan::Literal(run));
        };
        let kind = if width == 2 { "strong" } else { "em" };
        let mut el = Element::new(kind);
        el.children = self.spans(&rest[width..close], line, depth + 1);
        Some(Scan::Node(el, close + width))
    }

    fn image(&mut self, rest: &str, line: usize) -> Option<Scan> {
        let close = matching_bracket(&rest[1..])? + 1;
        let alt = &rest[2..close];
        let after = &rest[close + 1..];

        let (url, title, len) = if let Some(caps) = INLINE_TARGET.captures(after) {
            let title = caps.get(2).or(caps.get(3)).map(|m| m.as_str().to_string());
            (caps[1].to_string(), title, caps[0].len())
        } else if after.starts_with('[') {
            let end = after.find(']')?;
            let id = match &after[1..end] {
                "" => alt,
                id => id,
            };
            let consumed = close + 1 + end + 1;
            match self.link_def(id) {
                Some((url, title)) => (url, title, end + 1),
                None => {
                    self.warn_undefined_link(id, line);
                    return Some(Scan::Literal(consumed));
                }
            }
        } else {
            return None;
        };

        let mut img = Element::new("img");
        img.set_attr("src", url);
        img.set_attr("alt", alt);
        if let Some(title) = title {
            img.set_attr("title", title);
        }
        Some(Scan::Node(img, close + 1 + len))
    }

    fn bracket(&mut self, rest: &str, line: usize, depth: usize) -> Option<Scan> {
        if rest.starts_with("[^") {
            let caps = FOOTNOTE_REF.captures(rest)?;
            let name = &caps[1];
            let len = caps[0].len();
            if self.footnotes.contains(name) {
                return Some(Scan::Node(Element::with_value("footnote", name), len));
            }
            self.warnings.push(format!(
                "footnote `{name}` referenced at line {line} has no definition"
            ));
            return Some(Scan::Literal(len));
        }

        let close = matching_bracket(rest)?;
        let label = &rest[1..close];
        let after = &rest[close + 1..];

        if let Some(caps) = INLINE_TARGET.captures(after) {
            let title = caps.get(2).or(caps.get(3)).map(|m| m.as_str().to_string());
            let link = self.link(label, caps[1].to_string(), title, line, depth);
            return Some(Scan::Node(link, close + 1 + caps[0].len()));
        }

        if after.starts_with('[') {
            let end = after.find(']')?;
            let id = match &after[1..end] {
                "" => label,
                id => id,
            };
            let consumed = close + 1 + end + 1;
            return match self.link_def(id) {
                Some((url, title)) => Some(Scan::Node(
                    self.link(label, url, title, line, depth),
                    consumed,
                )),
                None => {
                    self.warn_undefined_link(id, line);
                    Some(Scan::Literal(consumed))
                }
            };
        }

        let (url, title) = self.link_def(label)?;
        Some(Scan::Node(
            self.link(label, url, title, line, depth),
            close + 1,
        ))
    }

    fn link(&mut self, label: &str, url: String, title: Option<String>, line: usize, depth: usize) -> Element {
        let mut a = Element::new("a");
        a.set_attr("href", url);
        if let Some(title) = title {
            a.set_attr("title", title);
        }
        a.children = if depth < MAX_SPAN_NESTING {
            self.spans(label, line, depth + 1)
        } else {
            vec![Element::with_value("text", label)]
        };
        a
    }

    fn link_def(&self, id: &str) -> Option<(String, Option<String>)> {
        let def = self.infos.lookup(LINK_DEFS, &normalize_id(id))?.as_map()?;
        let url = def.get("url").and_then(Value::as_str)?.to_string();
        let title = def.get("title").and_then(Value::as_str).map(str::to_string);
        Some((url, title))
    }

    fn warn_undefined_link(&mut self, id: &str, line: usize) {
        self.warnings.push(format!(
            "no link definition for link ID `{}` found (line {line})",
            normalize_id(id)
        ));
    }
}

fn flush_text(buf: &mut String, out: &mut Vec<Element>) {
    if !buf.is_empty() {
        out.push(Element::with_value("text", std::mem::take(buf)));
    }
}

fn code_span(rest: &str) -> Scan {
    let run = rest.bytes().take_while(|&b| b == b'`').count();
    let fence = &rest[..run];
    let mut from = run;
    while let Some(pos) = rest[from..].find(fence) {
        let start = from + pos;
        let len = rest[start..].bytes().take_while(|&b| b == b'`').count();
        if len == run {
            let code = rest[run..start].trim();
            return Scan::Node(Element::with_value("codespan", code), start + run);
        }
        from = start + len;
    }
    Scan::Literal(run)
}

/// Position of the closing delimiter run for an emphasis of `width`
fn find_closing(rest: &str, width: usize, delim: u8) -> Option<usize> {
    let bytes = rest.as_bytes();
    let mut j = width;
    while j < bytes.len() {
        match bytes[j] {
            b'\\' => j += 2,
            b'`' => match code_span(&rest[j..]) {
                Scan::Node(_, len) | Scan::Literal(len) => j += len,
            },
            b if b == delim => {
                let run = bytes[j..].iter().take_while(|&&b| b == delim).count();
                let prev_ws = rest[..j].chars().next_back().is_some_and(char::is_whitespace);
                let next_alnum = delim == b'_'
                    && rest[j + run..].chars().next().is_some_and(char::is_alphanumeric);
                if j > width && !prev_ws && !next_alnum && run >= width {
                    if width == 1 && run != 1 {
                        j += run;
                        continue;
                    }
                    return Some(j);
                }
                j += run;
            }
            _ => j += 1,
        }
    }
    None
}

/// Index of the `]` matching the `[` at the start of `text`
fn matching_bracket(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut j = 0;
    while j < bytes.len() {
        match bytes[j] {
            b'\\' => j += 1,
            b'[' => depth += 1,
            b']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(j);
                }
            }
            _ => {}
        }
        j += 1;
    }
    None
}

fn inline_html(rest: &str) -> Option<Scan> {
    if let Some(caps) = AUTOLINK.captures(rest) {
        let url = &caps[1];
        let mut a = Element::new("a");
        a.set_attr("href", url);
        a.children.push(Element::with_value("text", url));
        return Some(Scan::Node(a, caps[0].len()));
    }
    let caps = INLINE_TAG.captures(rest)?;
    let mut tag = Element::with_value("html_tag", &caps[0]);
    tag.options
        .insert("tag".to_string(), Value::from(caps[1].to_ascii_lowercase()));
    Some(Scan::Node(tag, caps[0].len()))
}

/// Two or more spaces before a newline
fn hard_break(rest: &str) -> Option<usize> {
    let spaces = rest.bytes().take_while(|&b| b == b' ').count();
    (spaces >= 2 && rest.as_bytes().get(spaces) == Some(&b'\n')).then_some(spaces + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extension::{DefaultExtension, Extension};
    use crate::options::{Options, AUTO_IDS};
    use pretty_assertions::assert_eq;

    fn parse_with(source: &str, options: Options, ext: &dyn Extension) -> (Element, Warnings, ParseInfos) {
        let options = Options::resolve(options);
        let mut warnings = Warnings::new();
        let mut parse_infos = ParseInfos::new();
        let mut ctx = ParseContext {
            options: &options,
            extension: ext,
            warnings: &mut warnings,
            parse_infos: &mut parse_infos,
        };
        let tree = KramdownParser::new().parse(source, &mut ctx).unwrap();
        (tree, warnings, parse_infos)
    }

    fn parse(source: &str) -> (Element, Warnings, ParseInfos) {
        parse_with(source, Options::new(), &DefaultExtension)
    }

    fn kinds(el: &Element) -> Vec<&str> {
        el.children.iter().map(|c| c.kind.as_str()).collect()
    }

    #[test]
    fn test_blocks() {
        let (tree, warnings, _) = parse(
            "# Title\n\nSome text\nmore text\n\n***\n\n    code\n\n> quoted\n\n* a\n* b\n\n1. one\n",
        );
        assert!(warnings.is_empty());
        assert_eq!(tree.kind, "root");
        assert_eq!(kinds(&tree), vec!["header", "p", "hr", "codeblock", "blockquote", "ul", "ol"]);
        assert_eq!(tree.children[0].value, Some(Value::Integer(1)));
        assert_eq!(tree.children[1].text_content(), "Some text\nmore text");
        assert_eq!(tree.children[3].value_str(), Some("code\n"));
        assert_eq!(tree.children[5].children.len(), 2);
    }

    #[test]
    fn test_no_placeholders_survive() {
        let (tree, _, infos) = parse("a *b*\n\n[^n]\n\n[^n]: note *here*");
        assert!(tree.walk().all(|el| !el.is(INLINE_SOURCE)));
        let body = infos.lookup(FOOTNOTES, "n").and_then(Value::as_element).unwrap();
        assert!(body.walk().all(|el| !el.is(INLINE_SOURCE)));
        assert!(body.walk().any(|el| el.is("em")));
    }

    #[test]
    fn test_header_explicit_id_and_closing_hashes() {
        let (tree, _, _) = parse("## Setup ## {#setup}\n### Plain ###");
        assert_eq!(tree.children[0].attr_value("id"), Some(&Value::from("setup")));
        assert_eq!(tree.children[0].text_content(), "Setup");
        assert_eq!(tree.children[1].text_content(), "Plain");
        assert!(tree.children[1].attr().is_none());
    }

    #[test]
    fn test_auto_ids() {
        let (tree, _, _) = parse_with(
            "# Hello, World!\n# Hello World\n# 2. Intro\n# !!!\n# Custom {#hello-world-1}",
            Options::new().with(AUTO_IDS, true),
            &DefaultExtension,
        );
        let ids: Vec<String> = tree
            .children
            .iter()
            .map(|h| h.attr_value("id").unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["hello-world", "hello-world-2", "intro", "section", "hello-world-1"]);
    }

    #[test]
    fn test_auto_ids_off_by_default() {
        let (tree, _, _) = parse("# Hello");
        assert!(tree.children[0].attr_value("id").is_none());
    }

    #[test]
    fn test_spans() {
        let (tree, _, _) = parse("a *em* **strong** `code` snake_case_word \\*lit\\*");
        let p = &tree.children[0];
        assert_eq!(kinds(p), vec!["text", "em", "text", "strong", "text", "codespan", "text"]);
        assert_eq!(p.children[6].value_str(), Some(" snake_case_word *lit*"));
    }

    #[test]
    fn test_unclosed_emphasis_is_literal() {
        let (tree, warnings, _) = parse("a * b and *c");
        assert_eq!(kinds(&tree.children[0]), vec!["text"]);
        assert_eq!(tree.children[0].text_content(), "a * b and *c");
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_inline_and_reference_links() {
        let (tree, warnings, _) = parse(
            "[inline](http://a.example \"A\") [ref][Site] [Site] [site][] ![pic](/p.png)\n\n[site]: http://s.example 'S'",
        );
        assert!(warnings.is_empty());
        let links: Vec<&Element> = tree.walk().filter(|el| el.is("a")).collect();
        assert_eq!(links.len(), 4);
        assert_eq!(links[0].attr_value("title"), Some(&Value::from("A")));
        for link in &links[1..] {
            assert_eq!(link.attr_value("href"), Some(&Value::from("http://s.example")));
            assert_eq!(link.attr_value("title"), Some(&Value::from("S")));
        }
        let img = tree.walk().find(|el| el.is("img")).unwrap();
        assert_eq!(img.attr_value("alt"), Some(&Value::from("pic")));
    }

    #[test]
    fn test_undefined_reference_warns_and_stays_literal() {
        let (tree, warnings, _) = parse("see [this][nowhere] and [plain brackets]");
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("nowhere"));
        assert_eq!(
            tree.children[0].text_content(),
            "see [this][nowhere] and [plain brackets]"
        );
    }

    #[test]
    fn test_duplicate_link_definition_keeps_first() {
        let (_, warnings, infos) = parse("[a]: /one\n[A]: /two");
        assert_eq!(warnings.len(), 1);
        let def = infos.lookup(LINK_DEFS, "a").and_then(Value::as_map).unwrap();
        assert_eq!(def.get("url"), Some(&Value::from("/one")));
    }

    #[test]
    fn test_forward_reference_matches_backward() {
        let forward = parse("Go [home][h] now[^1].\n\n[h]: /index\n[^1]: Later.");
        let backward = parse("[h]: /index\n[^1]: Later.\n\nGo [home][h] now[^1].");
        assert_eq!(forward.0, backward.0);
        assert_eq!(forward.2, backward.2);
        assert!(forward.1.is_empty());
    }

    #[test]
    fn test_undefined_footnote() {
        let (tree, warnings, _) = parse("text[^missing]");
        assert_eq!(warnings.len(), 1);
        assert_eq!(tree.children[0].text_content(), "text[^missing]");
    }

    #[test]
    fn test_footnote_continuation() {
        let (_, _, infos) = parse("[^a]: First line\ncontinued\n\n    Second para\n\nOutside");
        let body = infos.lookup(FOOTNOTES, "a").and_then(Value::as_element).unwrap();
        assert_eq!(kinds(body), vec!["p", "p"]);
        assert_eq!(body.children[0].text_content(), "First line\ncontinued");
    }

    #[test]
    fn test_ial_and_ald() {
        let (tree, warnings, _) =
            parse("Para\n{: #p1 .lead data-x=\"1\" shared}\n\n{:shared: .wide title=\"T\"}");
        assert!(warnings.is_empty());
        let p = &tree.children[0];
        assert_eq!(p.attr_value("id"), Some(&Value::from("p1")));
        assert_eq!(p.attr_value("class"), Some(&Value::from("wide lead")));
        assert_eq!(p.attr_value("data-x"), Some(&Value::from("1")));
        assert_eq!(p.attr_value("title"), Some(&Value::from("T")));
        assert!(p.option(IAL_REFS).is_none());
    }

    #[test]
    fn test_ial_without_block_warns() {
        let (tree, warnings, _) = parse("{: .orphan}\n\nText");
        assert_eq!(warnings.len(), 1);
        assert_eq!(kinds(&tree), vec!["p"]);
        assert!(tree.children[0].attr().is_none());
    }

    #[test]
    fn test_undefined_ald_warns() {
        let (_, warnings, _) = parse("Text\n{: ghost}");
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("ghost"));
    }

    #[test]
    fn test_fenced_code() {
        let (tree, warnings, _) = parse("~~~ rust\nfn main() {}\n~~~\n\nafter");
        assert!(warnings.is_empty());
        assert_eq!(tree.children[0].value_str(), Some("fn main() {}\n"));
        assert_eq!(
            tree.children[0].attr_value("class"),
            Some(&Value::from("language-rust"))
        );
        assert_eq!(kinds(&tree), vec!["codeblock", "p"]);
    }

    #[test]
    fn test_unclosed_fence_warns() {
        let (tree, warnings, _) = parse("~~~\nstill code\n# not a header");
        assert_eq!(warnings.len(), 1);
        assert_eq!(kinds(&tree), vec!["codeblock"]);
        assert_eq!(tree.children[0].value_str(), Some("still code\n# not a header\n"));
    }

    #[test]
    fn test_tight_and_loose_lists() {
        let (tree, _, _) = parse("* a\n* b\n  * nested\n\ntext\n\n- c\n\n- d");
        assert_eq!(kinds(&tree), vec!["ul", "p", "ul"]);
        let tight = &tree.children[0];
        assert!(tight.children[0].children[0].flag("transparent"));
        assert_eq!(kinds(&tight.children[1]), vec!["p", "ul"]);
        let loose = &tree.children[2];
        assert_eq!(loose.children.len(), 2);
        assert!(loose.children.iter().all(|li| !li.children[0].flag("transparent")));
    }

    #[test]
    fn test_html_block() {
        let (tree, warnings, _) =
            parse("<div class=\"note\" hidden>\n*raw*\n</div>\n\n<section>\nopen");
        assert_eq!(kinds(&tree), vec!["html_element", "html_raw"]);
        let div = &tree.children[0];
        assert_eq!(div.value_str(), Some("div"));
        assert_eq!(div.attr_value("class"), Some(&Value::from("note")));
        assert_eq!(div.attr_value("hidden"), Some(&Value::from("")));
        assert_eq!(div.children[0].value_str(), Some("*raw*"));
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_inline_html_and_autolink() {
        let (tree, _, _) = parse("x <span class=\"a\">y</span> <https://e.example>");
        let p = &tree.children[0];
        assert_eq!(kinds(p), vec!["text", "html_tag", "text", "html_tag", "text", "a"]);
        assert_eq!(p.children[1].option("tag"), Some(&Value::from("span")));
    }

    #[test]
    fn test_hard_break() {
        let (tree, _, _) = parse("one  \ntwo");
        assert_eq!(kinds(&tree.children[0]), vec!["text", "br", "text"]);
    }

    #[test]
    fn test_directives_default_handling() {
        let (tree, warnings, _) = parse(
            "{::comment}\nhidden\n{:/comment}\n\n{::nomarkdown}\n<b>x</b>\n{:/}\n\n{::toc /}",
        );
        assert_eq!(kinds(&tree), vec!["comment", "raw"]);
        assert_eq!(tree.children[0].value_str(), Some("hidden"));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("toc"));
    }

    #[test]
    fn test_unclosed_directive_is_text() {
        let (tree, warnings, _) = parse("{::comment}\nnever closed");
        assert_eq!(warnings.len(), 1);
        assert_eq!(kinds(&tree), vec!["p", "p"]);
    }

    struct Toc;

    impl Extension for Toc {
        fn custom(&self, directive: &Directive) -> Handling {
            if directive.name != "toc" {
                return Handling::Default;
            }
            let depth = directive.args.get("depth").cloned().unwrap_or_default();
            Handling::Replace(vec![Element::with_value("toc", depth)])
        }
    }

    #[test]
    fn test_custom_extension_replaces_directive() {
        let (tree, warnings, _) = parse_with("{::toc depth=\"2\" /}", Options::new(), &Toc);
        assert!(warnings.is_empty());
        assert_eq!(tree.children[0].kind, "toc");
        assert_eq!(tree.children[0].value_str(), Some("2"));
    }

    #[test]
    fn test_deep_nesting_degrades_to_text() {
        let source = ">".repeat(MAX_NESTING + 5) + " deep";
        let (tree, warnings, _) = parse(&source);
        assert_eq!(warnings.len(), 1);
        assert!(tree.text_content().ends_with("deep"));
    }

    #[test]
    fn test_helpers() {
        assert_eq!(indent_width("\t x"), 5);
        assert_eq!(strip_indent("      x", 4), "  x");
        assert_eq!(strip_indent("\tx", 2), "  x");
        assert!(is_hr("* * *"));
        assert!(!is_hr("* a"));
        assert_eq!(list_marker("10. x"), Some(("ol", 4)));
        assert_eq!(header_slug("Ünïcode Title"), "ünïcode-title");
        assert_eq!(strip_closing_hashes("Setup ## "), "Setup");
        assert_eq!(strip_closing_hashes("C#"), "C#");
        assert_eq!(strip_closing_hashes("###"), "");
    }
}
