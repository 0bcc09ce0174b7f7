// SPDX-License-Identifier: AGPL-3.0-or-later
//! End-to-end behaviour of `Document`: construction, options, conversion

use kramdoc_core::{
    ConversionError, Directive, Document, Element, Extension, Handling, Options, ParseContext,
    Parser, Value,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn markup() -> impl Strategy<Value = String> {
    let fragment = prop_oneof![
        Just("# Heading\n".to_string()),
        Just("## Sub {#sub}\n".to_string()),
        Just("plain words ".to_string()),
        Just("*em* ".to_string()),
        Just("**strong** ".to_string()),
        Just("`code` ".to_string()),
        Just("[link][ref] ".to_string()),
        Just("[ref]: /target \"T\"\n".to_string()),
        Just("note[^n] ".to_string()),
        Just("[^n]: Footnote *body*\n".to_string()),
        Just("\n\n".to_string()),
        Just("> quoted\n".to_string()),
        Just("* item\n".to_string()),
        Just("1. first\n".to_string()),
        Just("    indented\n".to_string()),
        Just("~~~\nfenced\n~~~\n".to_string()),
        Just("<div>\nhtml\n</div>\n".to_string()),
        Just("{:.cls}\n".to_string()),
        Just("{::comment}\nc\n{:/comment}\n".to_string()),
        "[a-z *_`\\[\\]<>#{}:^-]{0,16}",
    ];
    prop::collection::vec(fragment, 0..16).prop_map(|parts| parts.concat())
}

fn options() -> impl Strategy<Value = Options> {
    (
        proptest::option::of(-3i64..50),
        proptest::option::of(prop::collection::vec("[a-z]{1,6}", 0..3)),
        proptest::option::of(any::<bool>()),
        proptest::option::of("[a-z]{1,8}"),
    )
        .prop_map(|(nr, filter, auto_ids, custom)| {
            let mut options = Options::new();
            if let Some(nr) = nr {
                options.set("footnote_nr", nr);
            }
            if let Some(filter) = filter {
                options.set("filter_html", filter);
            }
            if let Some(auto_ids) = auto_ids {
                options.set("auto_ids", auto_ids);
            }
            if let Some(custom) = custom {
                options.set("x_custom", custom);
            }
            options
        })
}

struct RawAsCode;

impl Extension for RawAsCode {
    fn nomarkdown(&self, directive: &Directive) -> Handling {
        Handling::Replace(vec![Element::with_value("codeblock", directive.body_str())])
    }
}

struct Rejecting;

impl Parser for Rejecting {
    fn name(&self) -> &'static str {
        "rejecting"
    }

    fn parse(&self, source: &str, _ctx: &mut ParseContext<'_>) -> kramdoc_core::Result<Element> {
        if source.contains("bad") {
            return Err(ConversionError::ParseError {
                line: 1,
                column: 1,
                message: "bad input".to_string(),
            });
        }
        Ok(Element::new("root"))
    }
}

#[test]
fn test_empty_overrides_yield_defaults() {
    let doc = Document::new("", Options::new()).unwrap();
    assert_eq!(doc.options().footnote_nr(), 1);
    assert!(doc.options().filter_html().is_empty());
    assert!(!doc.options().auto_ids());
    assert_eq!(doc.options().get("footnote_nr"), Some(&Value::Integer(1)));
    assert_eq!(doc.options().get("filter_html"), Some(&Value::List(Vec::new())));
    assert_eq!(doc.options().get("auto_ids"), Some(&Value::Bool(false)));
    assert_eq!(doc.options().len(), 3);
    assert!(doc.warnings().is_empty());
}

#[test]
fn test_supplied_keys_override_defaults() {
    let doc = Document::new(
        "",
        Options::from_json_str(r#"{"footnote_nr": 7, "auto_ids": true, "theme": {"dark": true}}"#)
            .unwrap(),
    )
    .unwrap();
    assert_eq!(doc.options().footnote_nr(), 7);
    assert!(doc.options().auto_ids());
    assert!(doc.options().filter_html().is_empty());

    let mut theme = std::collections::BTreeMap::new();
    theme.insert("dark".to_string(), Value::Bool(true));
    assert_eq!(doc.options().get("theme"), Some(&Value::Map(theme)));
}

#[test]
fn test_fatal_parse_yields_no_document() {
    let err = Document::builder("bad").parser(Rejecting).build().unwrap_err();
    assert!(matches!(err, ConversionError::ParseError { line: 1, .. }));

    let doc = Document::builder("good").parser(Rejecting).build().unwrap();
    assert_eq!(doc.tree().kind, "root");
}

#[test]
#[cfg(all(feature = "html", feature = "text"))]
fn test_forward_references_match_backward() {
    let forward = "See [the docs][docs] and [^why].\n\n[docs]: https://example.org/docs \"Docs\"\n[^why]: Because *reasons*.";
    let backward = "[docs]: https://example.org/docs \"Docs\"\n[^why]: Because *reasons*.\n\nSee [the docs][docs] and [^why].";

    let mut a = Document::new(forward, Options::new()).unwrap();
    let mut b = Document::new(backward, Options::new()).unwrap();

    assert_eq!(a.tree(), b.tree());
    assert_eq!(a.to_html().unwrap(), b.to_html().unwrap());
    assert_eq!(a.to_text().unwrap(), b.to_text().unwrap());
    assert!(a.warnings().is_empty());
    assert!(b.warnings().is_empty());
}

#[test]
#[cfg(all(feature = "html", feature = "text", feature = "json"))]
fn test_one_parse_many_formats() {
    let mut doc = Document::new("Hello *world*", Options::new()).unwrap();
    assert_eq!(doc.formats().collect::<Vec<_>>(), vec!["html", "json", "text"]);
    assert_eq!(doc.to_html().unwrap(), "<p>Hello <em>world</em></p>\n");
    assert_eq!(doc.to_text().unwrap(), "Hello world\n");
    assert!(doc.to_json().unwrap().contains("\"em\""));
}

#[test]
#[cfg(feature = "html")]
fn test_extension_changes_only_its_directive() {
    let with_directive = "Before\n\n{::nomarkdown}\n<b>x</b>\n{:/}\n\nAfter";
    let mut baseline = Document::new(with_directive, Options::new()).unwrap();
    let mut custom = Document::builder(with_directive).extension(RawAsCode).build().unwrap();

    assert_eq!(baseline.to_html().unwrap(), "<p>Before</p>\n<b>x</b>\n<p>After</p>\n");
    assert_eq!(
        custom.to_html().unwrap(),
        "<p>Before</p>\n<pre><code>&lt;b&gt;x&lt;/b&gt;</code></pre>\n<p>After</p>\n"
    );
}

#[test]
#[cfg(feature = "html")]
fn test_warnings_accumulate_in_order() {
    let mut doc = Document::new(
        "[x][nope]\n\n{:.orphan}\n\ntext",
        Options::new().with("auto_ids", "yes"),
    )
    .unwrap();
    assert_eq!(doc.warnings().len(), 3);
    assert!(doc.warnings()[0].contains("auto_ids"));
    assert!(doc.warnings()[1].contains("attribute list"));
    assert!(doc.warnings()[2].contains("nope"));

    doc.to_html().unwrap();
    assert_eq!(doc.warnings().len(), 3);
}

proptest! {
    #[test]
    fn prop_construction_yields_rooted_tree(source in markup(), options in options()) {
        let doc = Document::new(source, options).unwrap();
        prop_assert_eq!(doc.tree().kind.as_str(), "root");
        prop_assert!(doc.tree().walk().all(|el| el.kind != "inline_source"));
    }

    #[test]
    #[cfg(all(feature = "html", feature = "text", feature = "json"))]
    fn prop_conversion_is_deterministic(source in markup(), options in options()) {
        let mut doc = Document::new(source, options).unwrap();
        for format in ["html", "text", "json"] {
            let first = doc.convert(format).unwrap();
            let second = doc.convert(format).unwrap();
            prop_assert_eq!(first, second);
        }
    }

    #[test]
    #[cfg(all(feature = "html", feature = "text", feature = "json"))]
    fn prop_conversion_leaves_tree_untouched(source in markup(), options in options()) {
        let mut doc = Document::new(source, options).unwrap();
        let snapshot = doc.tree().clone();
        let infos = doc.parse_infos().clone();
        doc.to_html().unwrap();
        doc.to_text().unwrap();
        doc.to_json().unwrap();
        prop_assert_eq!(doc.tree(), &snapshot);
        prop_assert_eq!(doc.tree().count(), snapshot.count());
        prop_assert_eq!(doc.parse_infos(), &infos);
    }

    #[test]
    #[cfg(feature = "html")]
    fn prop_unrelated_input_ignores_extension(source in markup()) {
        prop_assume!(!source.contains("nomarkdown"));
        let mut baseline = Document::new(source.clone(), Options::new()).unwrap();
        let mut custom = Document::builder(source).extension(RawAsCode).build().unwrap();
        prop_assert_eq!(baseline.tree(), custom.tree());
        prop_assert_eq!(baseline.to_html().unwrap(), custom.to_html().unwrap());
    }

    #[test]
    fn prop_unknown_option_is_preserved(
        key in "[a-z]{3,10}_opt",
        value in prop_oneof![
            "[a-z]{0,8}".prop_map(Value::from),
            any::<i64>().prop_map(Value::from),
            any::<bool>().prop_map(Value::from),
        ],
    ) {
        let doc = Document::new("text", Options::new().with(key.clone(), value.clone())).unwrap();
        prop_assert_eq!(doc.options().get(&key), Some(&value));
        prop_assert!(doc.warnings().is_empty());
    }
}
