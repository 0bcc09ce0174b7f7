// SPDX-License-Identifier: AGPL-3.0-or-later
//! Document: one parse of one source, converted any number of times
//!
//! ```
//! use kramdoc_core::{Document, Options};
//!
//! # if cfg!(feature = "html") {
//! let mut doc = Document::new("This *is* some text", Options::new()).unwrap();
//! assert_eq!(doc.to_html().unwrap(), "<p>This <em>is</em> some text</p>\n");
//! # }
//! ```

use crate::ast::Element;
use crate::extension::{DefaultExtension, Extension};
use crate::formats::KramdownParser;
use crate::options::Options;
use crate::traits::{
    ConversionError, ConvertContext, Converter, ConverterRegistry, ParseContext, ParseInfos,
    Parser, Result, Warnings,
};

/// A parsed source together with everything needed to render it
///
/// The tree is built once, during construction. A failed parse yields an
/// error instead of a document, so a `Document` always has a tree.
pub struct Document {
    source: String,
    options: Options,
    warnings: Warnings,
    parse_infos: ParseInfos,
    extension: Box<dyn Extension>,
    converters: ConverterRegistry,
    tree: Element,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("options", &self.options)
            .field("warnings", &self.warnings)
            .field("parse_infos", &self.parse_infos)
            .field("formats", &self.formats().collect::<Vec<_>>())
            .field("tree", &self.tree)
            .finish_non_exhaustive()
    }
}

impl Document {
    /// Parse `source` with the default grammar, extension and converters
    pub fn new(source: impl Into<String>, options: Options) -> Result<Self> {
        Self::builder(source).options(options).build()
    }

    pub fn builder(source: impl Into<String>) -> DocumentBuilder {
        DocumentBuilder::new(source)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Resolved options (defaults merged with the overrides)
    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn parse_infos(&self) -> &ParseInfos {
        &self.parse_infos
    }

    pub fn extension(&self) -> &dyn Extension {
        self.extension.as_ref()
    }

    pub fn tree(&self) -> &Element {
        &self.tree
    }

    /// Formats that [`Document::convert`] accepts
    pub fn formats(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.converters.formats()
    }

    /// Render the tree with the converter registered for `format`
    ///
    /// Converters may append warnings, so this borrows mutably; the tree
    /// itself is only ever lent out immutably.
    pub fn convert(&mut self, format: &str) -> Result<String> {
        let converter = self
            .converters
            .get(format)
            .ok_or_else(|| ConversionError::UnknownFormat(format.to_string()))?;

        let mut ctx = ConvertContext {
            options: &self.options,
            warnings: &mut self.warnings,
            parse_infos: &mut self.parse_infos,
        };
        let output = converter.convert(&self.tree, &mut ctx)?;
        tracing::debug!(format, bytes = output.len(), "converted document");
        Ok(output)
    }

    pub fn to_html(&mut self) -> Result<String> {
        self.convert("html")
    }

    pub fn to_text(&mut self) -> Result<String> {
        self.convert("text")
    }

    pub fn to_json(&mut self) -> Result<String> {
        self.convert("json")
    }
}

/// Configures and builds a [`Document`]
pub struct DocumentBuilder {
    source: String,
    options: Options,
    extension: Option<Box<dyn Extension>>,
    parser: Option<Box<dyn Parser>>,
    converters: ConverterRegistry,
}

impl DocumentBuilder {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            options: Options::new(),
            extension: None,
            parser: None,
            converters: ConverterRegistry::with_builtins(),
        }
    }

    /// Option overrides, merged over the defaults at build time
    pub fn options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn extension(mut self, extension: impl Extension + 'static) -> Self {
        self.extension = Some(Box::new(extension));
        self
    }

    pub fn parser(mut self, parser: impl Parser + 'static) -> Self {
        self.parser = Some(Box::new(parser));
        self
    }

    /// Register an additional converter (replaces a built-in of the same format)
    pub fn converter(mut self, converter: impl Converter + 'static) -> Self {
        self.converters.register(Box::new(converter));
        self
    }

    /// Resolve options, bind the extension and run the parser once
    pub fn build(self) -> Result<Document> {
        let options = Options::resolve(self.options);
        let extension = self
            .extension
            .unwrap_or_else(|| Box::new(DefaultExtension));
        let parser = self
            .parser
            .unwrap_or_else(|| Box::new(KramdownParser::new()));

        let span = tracing::debug_span!("document.parse", parser = parser.name());
        let _guard = span.enter();

        let mut warnings = Warnings::new();
        warnings.extend(options.validate());
        let mut parse_infos = ParseInfos::new();

        let tree = {
            let mut ctx = ParseContext {
                options: &options,
                extension: extension.as_ref(),
                warnings: &mut warnings,
                parse_infos: &mut parse_infos,
            };
            parser.parse(&self.source, &mut ctx)?
        };
        tracing::debug!(
            nodes = tree.count(),
            warnings = warnings.len(),
            "parsed document"
        );

        Ok(Document {
            source: self.source,
            options,
            warnings,
            parse_infos,
            extension,
            converters: self.converters,
            tree,
        })
    }
}
