//! Annotation occurrences attached to items and parameters.
//!
//! Annotations are kept in their source form: a qualified name plus an
//! ordered list of attributes. The conventional single-value form
//! `@Foo(BAR)` is stored as the attribute `value=BAR`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Value of a single annotation attribute.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeValue {
    /// `name=X`
    Single(String),
    /// `name={X, Y}`
    Array(Vec<String>),
}

impl AttributeValue {
    /// The individual values, one for `Single`.
    pub fn values(&self) -> Vec<&str> {
        match self {
            Self::Single(v) => vec![v.as_str()],
            Self::Array(vs) => vs.iter().map(String::as_str).collect(),
        }
    }

    fn render(&self) -> String {
        match self {
            Self::Single(v) => v.clone(),
            Self::Array(vs) => format!("{{{}}}", vs.join(", ")),
        }
    }

    fn parse(text: &str) -> Self {
        let text = text.trim();
        match text.strip_prefix('{').and_then(|t| t.strip_suffix('}')) {
            Some(inner) => Self::Array(
                split_top_level(inner, ',')
                    .into_iter()
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
                    .collect(),
            ),
            None => Self::Single(text.to_string()),
        }
    }
}

/// A named attribute of an annotation occurrence.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnnotationAttribute {
    pub name: String,
    pub value: AttributeValue,
}

/// An annotation occurrence.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Annotation {
    pub qualified_name: String,
    pub attributes: Vec<AnnotationAttribute>,
}

impl Annotation {
    /// An annotation without attributes.
    pub fn new(qualified_name: impl Into<String>) -> Self {
        Self {
            qualified_name: qualified_name.into(),
            attributes: Vec::new(),
        }
    }

    /// Add an attribute (builder style).
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: AttributeValue) -> Self {
        self.attributes.push(AnnotationAttribute {
            name: name.into(),
            value,
        });
        self
    }

    /// Add the conventional `value` attribute with a single value.
    #[must_use]
    pub fn with_value(self, value: impl Into<String>) -> Self {
        self.with_attribute("value", AttributeValue::Single(value.into()))
    }

    /// The last segment of the qualified name.
    pub fn simple_name(&self) -> &str {
        self.qualified_name
            .rsplit('.')
            .next()
            .unwrap_or(&self.qualified_name)
    }

    /// Look up an attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| &a.value)
    }

    /// `@Nullable` from any package.
    pub fn is_nullable(&self) -> bool {
        self.simple_name() == "Nullable"
    }

    /// `@NonNull` from any package.
    pub fn is_non_null(&self) -> bool {
        self.simple_name() == "NonNull"
    }

    /// `@Deprecated` / `@java.lang.Deprecated`.
    pub fn is_deprecated(&self) -> bool {
        self.qualified_name == "Deprecated" || self.qualified_name == "java.lang.Deprecated"
    }

    /// Parse the source form, with or without the leading `@`:
    /// `pkg.Foo`, `@pkg.Foo(BAR)`, `pkg.Foo(a=1, b={x, y})`.
    pub fn parse(text: &str) -> ModelResult<Self> {
        let trimmed = text.trim();
        let body = trimmed.strip_prefix('@').unwrap_or(trimmed);
        let (name, args) = match body.find('(') {
            Some(open) => {
                let inner = body[open + 1..].strip_suffix(')').ok_or_else(|| {
                    ModelError::InvalidAnnotation {
                        text: text.to_string(),
                        reason: "unterminated attribute list".into(),
                    }
                })?;
                (body[..open].trim(), Some(inner))
            }
            None => (body, None),
        };

        if !is_qualified_name(name) {
            return Err(ModelError::InvalidAnnotation {
                text: text.to_string(),
                reason: format!("{name:?} is not a qualified name"),
            });
        }

        let attributes = match args {
            Some(inner) => parse_attribute_list(inner).map_err(|reason| {
                ModelError::InvalidAnnotation {
                    text: text.to_string(),
                    reason,
                }
            })?,
            None => Vec::new(),
        };

        Ok(Self {
            qualified_name: name.to_string(),
            attributes,
        })
    }

    /// Render the source form, always with the leading `@`.
    pub fn to_source(&self) -> String {
        let mut out = format!("@{}", self.qualified_name);
        match self.attributes.as_slice() {
            [] => {}
            [only] if only.name == "value" => {
                out.push('(');
                out.push_str(&only.value.render());
                out.push(')');
            }
            attrs => {
                let rendered: Vec<String> = attrs
                    .iter()
                    .map(|a| format!("{}={}", a.name, a.value.render()))
                    .collect();
                out.push('(');
                out.push_str(&rendered.join(", "));
                out.push(')');
            }
        }
        out
    }
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_source())
    }
}

/// Parse the text between the parentheses of an annotation occurrence.
///
/// Returns a human-readable reason on failure.
pub fn parse_attribute_list(inner: &str) -> Result<Vec<AnnotationAttribute>, String> {
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }
    let mut attributes = Vec::new();
    for piece in split_top_level(inner, ',') {
        let piece = piece.trim();
        if piece.is_empty() {
            return Err("empty attribute".into());
        }
        let (name, value) = match split_top_level(piece, '=').as_slice() {
            [value] => ("value", *value),
            [name, value] if is_identifier(name.trim()) => (name.trim(), *value),
            _ => return Err(format!("malformed attribute {piece:?}")),
        };
        if value.trim().is_empty() {
            return Err(format!("attribute {name:?} has no value"));
        }
        attributes.push(AnnotationAttribute {
            name: name.to_string(),
            value: AttributeValue::parse(value),
        });
    }
    Ok(attributes)
}

/// Split `text` on `sep`, ignoring separators nested in brackets or quotes.
pub fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' | '{' | '[' | '<' => depth += 1,
            ')' | '}' | ']' | '>' => depth -= 1,
            _ if c == sep && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Returns `true` for a Java identifier.
pub fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

/// Returns `true` for a dotted sequence of identifiers.
pub fn is_qualified_name(text: &str) -> bool {
    !text.is_empty() && text.split('.').all(is_identifier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bare_name() {
        let a = Annotation::parse("androidx.annotation.RestrictTo").unwrap();
        assert_eq!(a.qualified_name, "androidx.annotation.RestrictTo");
        assert!(a.attributes.is_empty());
        assert_eq!(a.simple_name(), "RestrictTo");
    }

    #[test]
    fn single_value_is_value_attribute() {
        let a = Annotation::parse("@androidx.annotation.RestrictTo(Scope.LIBRARY)").unwrap();
        assert_eq!(
            a.attribute("value"),
            Some(&AttributeValue::Single("Scope.LIBRARY".into()))
        );
        assert_eq!(a.to_source(), "@androidx.annotation.RestrictTo(Scope.LIBRARY)");
    }

    #[test]
    fn named_and_array_attributes() {
        let a = Annotation::parse("@Foo(from=0, to=10, flags={A, B})").unwrap();
        assert_eq!(a.attributes.len(), 3);
        assert_eq!(a.attribute("to"), Some(&AttributeValue::Single("10".into())));
        assert_eq!(
            a.attribute("flags"),
            Some(&AttributeValue::Array(vec!["A".into(), "B".into()]))
        );
        assert_eq!(a.to_source(), "@Foo(from=0, to=10, flags={A, B})");
    }

    #[test]
    fn quoted_separators_are_ignored() {
        let a = Annotation::parse(r#"@Foo(message="a, b=c")"#).unwrap();
        assert_eq!(a.attributes.len(), 1);
        assert_eq!(
            a.attribute("message"),
            Some(&AttributeValue::Single(r#""a, b=c""#.into()))
        );
    }

    #[test]
    fn explicit_value_renders_short_form() {
        let a = Annotation::parse("@Foo(value=X)").unwrap();
        assert_eq!(a.to_source(), "@Foo(X)");
    }

    #[test]
    fn rejects_malformed_text() {
        assert!(Annotation::parse("@Foo(").is_err());
        assert!(Annotation::parse("@Foo(a=)").is_err());
        assert!(Annotation::parse("@1Foo").is_err());
        assert!(Annotation::parse("@").is_err());
    }

    #[test]
    fn nullness_and_deprecation_helpers() {
        assert!(Annotation::new("androidx.annotation.Nullable").is_nullable());
        assert!(Annotation::new("NonNull").is_non_null());
        assert!(Annotation::new("java.lang.Deprecated").is_deprecated());
        assert!(!Annotation::new("pkg.Deprecated").is_deprecated());
    }

    #[test]
    fn split_respects_nesting() {
        assert_eq!(split_top_level("a, {b, c}, d(e, f)", ','), vec!["a", " {b, c}", " d(e, f)"]);
    }
}
