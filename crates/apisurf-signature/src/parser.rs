//! Signature file parser and layered loading.
//!
//! A file is a header followed by package blocks:
//!
//! ```text
//! // Signature format: 4.0
//! package com.example {
//!
//!   public class Foo extends com.example.Base {
//!     ctor public Foo();
//!     method public int size();
//!   }
//!
//! }
//! ```
//!
//! Several files can be read into one codebase with
//! [`SignatureParser::parse_layers`]. Files marked current describe the
//! surface being produced; base files only supply context. A declaration in
//! a current file replaces an earlier one with the same signature key, while
//! a base file never overrides what is already loaded.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use apisurf_types::{
    Annotation, CallableData, ClassData, ClassKind, Codebase, DefaultValue, FieldData, ItemCommon,
    ItemId, ItemKind, ItemKindTag, Modifier, Modifiers, Nullability, Parameter, PropertyData,
    TypeRef, Visibility, member_key,
};
use tracing::{debug, info, warn};

use crate::error::{SignatureError, SignatureResult};
use crate::format::{
    FileFormat, FileFormatBuilder, FormatVersion, NullnessStyle, HEADER_PREFIX, PROPERTY_PREFIX,
};
use crate::tokenizer::{Token, TokenKind, Tokenizer};

/// One signature file to load.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignatureInput {
    /// Name used in diagnostics, usually the path.
    pub name: String,
    pub text: String,
    /// Part of the surface being produced, as opposed to a base layer.
    pub current: bool,
}

impl SignatureInput {
    pub fn current(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            current: true,
        }
    }

    pub fn base(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            current: false,
        }
    }

    /// Read a file from disk.
    pub fn from_path(path: &Path, current: bool) -> SignatureResult<Self> {
        let text = fs::read_to_string(path)?;
        Ok(Self {
            name: path.display().to_string(),
            text,
            current,
        })
    }
}

/// Reads signature files into a [`Codebase`].
#[derive(Clone, Debug, Default)]
pub struct SignatureParser {
    fallback: Option<FileFormat>,
}

struct Header<'t> {
    format: FileFormat,
    body: &'t str,
    first_line: usize,
}

impl SignatureParser {
    /// A parser that requires every non-empty file to carry a header.
    pub fn new() -> Self {
        Self::default()
    }

    /// A parser that reads headerless files with `format`.
    pub fn with_fallback(format: FileFormat) -> Self {
        Self {
            fallback: Some(format),
        }
    }

    /// The format a file declares, without parsing its body.
    pub fn read_format(&self, name: &str, text: &str) -> SignatureResult<FileFormat> {
        Ok(self.read_header(name, text)?.format)
    }

    /// Parse a single file as the current layer.
    pub fn parse(&self, name: &str, text: &str) -> SignatureResult<Codebase> {
        self.parse_layers(&[SignatureInput::current(name, text)])
    }

    /// Parse files in order into one codebase.
    pub fn parse_layers(&self, inputs: &[SignatureInput]) -> SignatureResult<Codebase> {
        let description = inputs
            .iter()
            .map(|i| i.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let mut codebase = Codebase::with_description(description);
        let mut order = FileFormat::default().overloaded_method_order();

        for input in inputs {
            let header = self.read_header(&input.name, &input.text)?;
            debug!(
                file = %input.name,
                format = %header.format,
                current = input.current,
                "parsing signature file"
            );
            order = header.format.overloaded_method_order();
            let mut file = FileParser {
                file: &input.name,
                format: header.format,
                tokens: Tokenizer::new(&input.name, header.body, header.first_line),
                codebase: &mut codebase,
                current: input.current,
                defined: HashSet::new(),
            };
            file.parse()?;
        }

        codebase.sort_canonical(order);
        info!(
            files = inputs.len(),
            items = codebase.len(),
            packages = codebase.package_ids().len(),
            "loaded signature files"
        );
        Ok(codebase)
    }

    fn read_header<'t>(&self, name: &str, text: &'t str) -> SignatureResult<Header<'t>> {
        let mut lines = text.split_inclusive('\n');
        let first = lines.next().unwrap_or("");
        let Some(version_text) = first.trim_end().strip_prefix(HEADER_PREFIX.trim_end()) else {
            return match self.fallback {
                Some(format) => Ok(Header {
                    format,
                    body: text,
                    first_line: 1,
                }),
                None if text.trim().is_empty() => Ok(Header {
                    format: FileFormat::default(),
                    body: text,
                    first_line: 1,
                }),
                None => Err(SignatureError::MissingHeader {
                    file: name.to_string(),
                }),
            };
        };

        let version_text = version_text.trim();
        let version: FormatVersion =
            version_text
                .parse()
                .map_err(|_| SignatureError::UnknownVersion {
                    file: name.to_string(),
                    version: version_text.to_string(),
                })?;

        let mut builder = FileFormatBuilder::new(version);
        let mut offset = first.len();
        let mut line = 2;
        for next in lines {
            let Some(property) = next.trim_end().strip_prefix(PROPERTY_PREFIX) else {
                break;
            };
            if version != FormatVersion::V5 {
                return Err(SignatureError::PropertyNotSupported {
                    file: name.to_string(),
                    version: version.to_string(),
                });
            }
            let Some((key, value)) = property.split_once('=') else {
                return Err(SignatureError::Syntax {
                    file: name.to_string(),
                    line,
                    column: PROPERTY_PREFIX.len() + 1,
                    message: format!("expected key=value, found {property:?}"),
                });
            };
            builder = builder.set(key.trim(), value.trim())?;
            offset += next.len();
            line += 1;
        }

        Ok(Header {
            format: builder.build()?,
            body: &text[offset..],
            first_line: line,
        })
    }
}

/// Leading annotations, visibility, and modifiers of a declaration.
#[derive(Default)]
struct Prelude {
    annotations: Vec<Annotation>,
    visibility: Option<Visibility>,
    modifiers: Modifiers,
}

fn is_nullness(annotation: &Annotation) -> bool {
    annotation.is_nullable() || annotation.is_non_null()
}

struct FileParser<'a, 'c> {
    file: &'a str,
    format: FileFormat,
    tokens: Tokenizer<'a>,
    codebase: &'c mut Codebase,
    current: bool,
    /// Items declared by this file, for duplicate detection.
    defined: HashSet<ItemId>,
}

impl<'a> FileParser<'a, '_> {
    fn parse(&mut self) -> SignatureResult<()> {
        while let Some(token) = self.tokens.next_token()? {
            if !token.is_word("package") {
                return Err(self
                    .tokens
                    .error_at(&token, format!("expected 'package', found {:?}", token.text)));
            }
            self.package()?;
        }
        Ok(())
    }

    fn annotation(&self, token: &Token<'a>) -> SignatureResult<Annotation> {
        Annotation::parse(token.text).map_err(|e| self.tokens.error_at(token, e.to_string()))
    }

    fn package(&mut self) -> SignatureResult<()> {
        let mut annotations = Vec::new();
        let name = loop {
            let token = self.tokens.require("package name")?;
            match token.kind {
                TokenKind::Annotation => annotations.push(self.annotation(&token)?),
                TokenKind::Word => break token,
                _ => {
                    return Err(self
                        .tokens
                        .error_at(&token, format!("expected package name, found {:?}", token.text)))
                }
            }
        };
        self.tokens.expect_punct('{')?;

        let prelude = Prelude {
            annotations,
            visibility: Some(Visibility::Public),
            ..Prelude::default()
        };
        let common = self.common(name.text, prelude);
        let package = match self.codebase.find_package(name.text) {
            Some(id) => {
                self.redefine(id, &name, common)?;
                id
            }
            None => {
                let id = self
                    .codebase
                    .add_package(common)
                    .map_err(|e| self.tokens.error_at(&name, e.to_string()))?;
                self.defined.insert(id);
                id
            }
        };

        loop {
            let token = self.tokens.require("class or '}'")?;
            if token.is_punct('}') {
                return Ok(());
            }
            self.class(package, name.text, token)?;
        }
    }

    fn prelude(&mut self, first: Option<Token<'a>>) -> SignatureResult<(Prelude, Token<'a>)> {
        let mut prelude = Prelude::default();
        let mut next = first;
        loop {
            let token = match next.take() {
                Some(t) => t,
                None => self.tokens.require("declaration")?,
            };
            match token.kind {
                TokenKind::Annotation if ClassKind::from_keyword(token.text).is_none() => {
                    prelude.annotations.push(self.annotation(&token)?);
                }
                TokenKind::Word => {
                    if let Some(visibility) = Visibility::from_keyword(token.text) {
                        prelude.visibility = Some(visibility);
                    } else if let Some(modifier) = Modifier::from_keyword(token.text) {
                        prelude.modifiers = prelude.modifiers.with(modifier);
                    } else {
                        return Ok((prelude, token));
                    }
                }
                _ => return Ok((prelude, token)),
            }
        }
    }

    /// Shared fields of a declaration. `@Deprecated` becomes the modifier;
    /// nullness annotations are dropped (they belong to the declared type).
    fn common(&self, name: &str, prelude: Prelude) -> ItemCommon {
        let mut common = ItemCommon::new(name, prelude.visibility.unwrap_or(Visibility::PackagePrivate));
        common.modifiers = prelude.modifiers;
        if prelude.annotations.iter().any(Annotation::is_deprecated) {
            common.modifiers = common.modifiers.with(Modifier::Deprecated);
        }
        common.annotations = prelude
            .annotations
            .into_iter()
            .filter(|a| !a.is_deprecated() && !is_nullness(a))
            .collect();
        common.emit = self.current;
        common
    }

    fn type_ref(&self, token: &Token<'a>, annotations: &[Annotation]) -> SignatureResult<TypeRef> {
        if token.kind != TokenKind::Word {
            return Err(self
                .tokens
                .error_at(token, format!("expected a type, found {:?}", token.text)));
        }
        let text = token.text;
        let ty = match self.format.nullness_style() {
            NullnessStyle::KotlinSuffix => {
                if let Some(base) = text.strip_suffix('?') {
                    TypeRef::nullable(base)
                } else if let Some(base) = text.strip_suffix('!') {
                    TypeRef::new(base).with_nullability(Nullability::Platform)
                } else {
                    TypeRef::non_null(text)
                }
            }
            NullnessStyle::Annotations => {
                let ty = TypeRef::new(text);
                if annotations.iter().any(Annotation::is_nullable) {
                    ty.with_nullability(Nullability::Nullable)
                } else if annotations.iter().any(Annotation::is_non_null) {
                    ty.with_nullability(Nullability::NonNull)
                } else {
                    ty
                }
            }
            NullnessStyle::None => TypeRef::new(text),
        };
        Ok(ty)
    }

    fn type_list(&mut self, what: &str) -> SignatureResult<Vec<TypeRef>> {
        let mut types = Vec::new();
        while let Some(token) = self.tokens.peek()? {
            if token.kind != TokenKind::Word || token.is_word("implements") {
                break;
            }
            self.tokens.next_token()?;
            types.push(TypeRef::new(token.text));
            self.tokens.eat_punct(',')?;
        }
        if types.is_empty() {
            return Err(self.tokens.error_here(format!("expected {what}")));
        }
        Ok(types)
    }

    fn class(&mut self, package: ItemId, package_name: &str, first: Token<'a>) -> SignatureResult<()> {
        let (prelude, kind_token) = self.prelude(Some(first))?;
        let kind = match kind_token.kind {
            TokenKind::Word | TokenKind::Annotation => ClassKind::from_keyword(kind_token.text),
            _ => None,
        }
        .ok_or_else(|| {
            self.tokens
                .error_at(&kind_token, format!("expected class kind, found {:?}", kind_token.text))
        })?;

        let name_token = self.tokens.expect_word("class name")?;
        let (name, type_parameters) = match name_token.text.find('<') {
            Some(open) => (&name_token.text[..open], Some(name_token.text[open..].to_string())),
            None => (name_token.text, None),
        };
        let mut data = ClassData::new(kind, format!("{package_name}.{name}"));
        data.type_parameters = type_parameters;

        if self.tokens.eat_word("extends")? {
            let types = self.type_list("supertype")?;
            if kind.is_interface_like() {
                data.interfaces.extend(types);
            } else {
                let mut types = types.into_iter();
                data.super_class = types.next();
                data.interfaces.extend(types);
            }
        }
        if self.tokens.eat_word("implements")? {
            let types = self.type_list("interface")?;
            data.interfaces.extend(types);
        }
        self.tokens.expect_punct('{')?;

        let parent = name
            .rfind('.')
            .and_then(|dot| self.codebase.find_class(&format!("{package_name}.{}", &name[..dot])))
            .unwrap_or(package);
        let simple = name.rsplit('.').next().unwrap_or(name);
        let common = self.common(simple, prelude);

        let class = match self.codebase.find_class(&data.qualified_name) {
            Some(id) => {
                self.redefine_with(id, &name_token, common, ItemKind::Class(data))?;
                id
            }
            None => {
                let id = self
                    .codebase
                    .add_class(parent, common, data)
                    .map_err(|e| self.tokens.error_at(&name_token, e.to_string()))?;
                self.defined.insert(id);
                id
            }
        };

        loop {
            let token = self.tokens.require("member or '}'")?;
            if token.is_punct('}') {
                return Ok(());
            }
            self.member(class, token)?;
        }
    }

    fn member(&mut self, class: ItemId, keyword: Token<'a>) -> SignatureResult<()> {
        let tag = match keyword.text {
            "ctor" => ItemKindTag::Constructor,
            "method" => ItemKindTag::Method,
            "field" => ItemKindTag::Field,
            "enum_constant" => ItemKindTag::EnumConstant,
            "property" => ItemKindTag::Property,
            _ => {
                return Err(self
                    .tokens
                    .error_at(&keyword, format!("expected a member, found {:?}", keyword.text)))
            }
        };
        let (prelude, token) = self.prelude(None)?;
        let name_order = self.format.kotlin_name_type_order();

        let (name, kind) = match tag {
            ItemKindTag::Constructor => {
                let (type_parameters, name) = self.type_parameters(token)?;
                let data = self.callable_rest(type_parameters, None)?;
                (name, ItemKind::Constructor(data))
            }
            ItemKindTag::Method if name_order => {
                let (type_parameters, name) = self.type_parameters(token)?;
                let parameters = self.parameters()?;
                self.tokens.expect_punct(':')?;
                let ty_token = self.tokens.require("return type")?;
                let return_type = self.type_ref(&ty_token, &prelude.annotations)?;
                let mut data = self.callable_tail(parameters)?;
                data.type_parameters = type_parameters;
                data.return_type = Some(return_type);
                (name, ItemKind::Method(data))
            }
            ItemKindTag::Method => {
                let (type_parameters, ty_token) = self.type_parameters(token)?;
                let return_type = self.type_ref(&ty_token, &prelude.annotations)?;
                let name = self.tokens.expect_word("method name")?;
                let data = self.callable_rest(type_parameters, Some(return_type))?;
                (name, ItemKind::Method(data))
            }
            _ => {
                let (name, ty_token) = if name_order {
                    self.tokens.expect_punct(':')?;
                    (token, self.tokens.require("type")?)
                } else {
                    (self.tokens.expect_word("name")?, token)
                };
                let ty = self.type_ref(&ty_token, &prelude.annotations)?;
                let value = if self.tokens.eat_punct('=')? {
                    Some(self.tokens.raw_until(&[';'])?.0.to_string())
                } else {
                    None
                };
                self.tokens.expect_punct(';')?;
                let kind = match tag {
                    ItemKindTag::Field => ItemKind::Field(FieldData { ty, value }),
                    ItemKindTag::EnumConstant => ItemKind::EnumConstant(FieldData { ty, value }),
                    _ if value.is_some() => {
                        return Err(self.tokens.error_at(&name, "properties cannot have a value"))
                    }
                    _ => ItemKind::Property(PropertyData { ty }),
                };
                (name, kind)
            }
        };
        if name.kind != TokenKind::Word {
            return Err(self
                .tokens
                .error_at(&name, format!("expected a name, found {:?}", name.text)));
        }
        self.finish_member(class, &name, prelude, kind)
    }

    fn type_parameters(&mut self, token: Token<'a>) -> SignatureResult<(Option<String>, Token<'a>)> {
        if token.kind == TokenKind::TypeParameters {
            Ok((Some(token.text.to_string()), self.tokens.require("name")?))
        } else {
            Ok((None, token))
        }
    }

    /// Parameters, throws, annotation default, and the closing `;`.
    fn callable_rest(
        &mut self,
        type_parameters: Option<String>,
        return_type: Option<TypeRef>,
    ) -> SignatureResult<CallableData> {
        let parameters = self.parameters()?;
        let mut data = self.callable_tail(parameters)?;
        data.type_parameters = type_parameters;
        data.return_type = return_type;
        Ok(data)
    }

    fn callable_tail(&mut self, parameters: Vec<Parameter>) -> SignatureResult<CallableData> {
        let mut throws = Vec::new();
        if self.tokens.eat_word("throws")? {
            loop {
                throws.push(self.tokens.expect_word("exception type")?.text.to_string());
                if !self.tokens.eat_punct(',')? {
                    break;
                }
            }
        }
        let annotation_default = if self.tokens.eat_word("default")? {
            Some(self.tokens.raw_until(&[';'])?.0.to_string())
        } else {
            None
        };
        self.tokens.expect_punct(';')?;
        Ok(CallableData {
            parameters,
            throws,
            annotation_default,
            ..CallableData::default()
        })
    }

    fn parameters(&mut self) -> SignatureResult<Vec<Parameter>> {
        self.tokens.expect_punct('(')?;
        let mut parameters = Vec::new();
        if self.tokens.eat_punct(')')? {
            return Ok(parameters);
        }
        loop {
            parameters.push(self.parameter()?);
            if self.tokens.eat_punct(',')? {
                continue;
            }
            self.tokens.expect_punct(')')?;
            return Ok(parameters);
        }
    }

    fn parameter(&mut self) -> SignatureResult<Parameter> {
        let mut optional = false;
        let mut annotations = Vec::new();
        let first = loop {
            let token = self.tokens.require("parameter")?;
            match token.kind {
                TokenKind::Word if token.text == "optional" && !optional && annotations.is_empty() => {
                    optional = true;
                }
                TokenKind::Annotation => annotations.push(self.annotation(&token)?),
                _ => break token,
            }
        };

        let (name, ty_token) = if self.format.kotlin_name_type_order() {
            if self.tokens.eat_punct(':')? {
                (Some(first.text.to_string()), self.tokens.require("parameter type")?)
            } else {
                (None, first)
            }
        } else {
            let name = match self.tokens.peek()? {
                Some(t) if t.kind == TokenKind::Word => {
                    self.tokens.next_token()?;
                    Some(t.text.to_string())
                }
                _ => None,
            };
            (name, first)
        };
        let ty = self.type_ref(&ty_token, &annotations)?;

        let default = if self.tokens.eat_punct('=')? {
            DefaultValue::expression(self.tokens.raw_until(&[',', ')'])?.0)
        } else if optional {
            DefaultValue::Unknown
        } else {
            DefaultValue::Absent
        };

        Ok(Parameter {
            name,
            ty,
            annotations: annotations
                .into_iter()
                .filter(|a| !a.is_deprecated() && !is_nullness(a))
                .collect(),
            default,
        })
    }

    fn finish_member(
        &mut self,
        class: ItemId,
        name: &Token<'a>,
        prelude: Prelude,
        kind: ItemKind,
    ) -> SignatureResult<()> {
        let common = self.common(name.text, prelude);
        let owner = self.codebase.view(class).qualified_name();
        let key = member_key(&owner, &common.name, &kind);
        match self.codebase.find_member(class, kind.tag().member_group(), &key) {
            Some(id) => self.redefine_with(id, name, common, kind),
            None => {
                let id = self
                    .codebase
                    .add_member(class, common, kind)
                    .map_err(|e| self.tokens.error_at(name, e.to_string()))?;
                self.defined.insert(id);
                Ok(())
            }
        }
    }

    /// A package declared again: only its shared fields can change.
    fn redefine(&mut self, id: ItemId, token: &Token<'a>, common: ItemCommon) -> SignatureResult<()> {
        if !self.defined.insert(id) {
            return Err(self
                .tokens
                .error_at(token, format!("duplicate {}", self.codebase.view(id).describe())));
        }
        if self.current {
            let kind = self.codebase[id].kind.clone();
            self.codebase
                .replace(id, common, kind)
                .map_err(|e| self.tokens.error_at(token, e.to_string()))?;
        }
        Ok(())
    }

    /// Apply layering to a class or member declared by an earlier file.
    fn redefine_with(
        &mut self,
        id: ItemId,
        token: &Token<'a>,
        common: ItemCommon,
        kind: ItemKind,
    ) -> SignatureResult<()> {
        if !self.defined.insert(id) {
            return Err(self
                .tokens
                .error_at(token, format!("duplicate {}", self.codebase.view(id).describe())));
        }
        if !self.current {
            return Ok(());
        }
        if self.codebase[id].common.emit {
            warn!(
                file = self.file,
                item = %self.codebase.view(id).describe(),
                "declaration redefined by a later current file"
            );
        }
        self.codebase
            .replace(id, common, kind)
            .map_err(|e| self.tokens.error_at(token, e.to_string()))
    }
}
