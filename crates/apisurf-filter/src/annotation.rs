//! Annotation filters.
//!
//! A filter is built from patterns such as `androidx.annotation.RestrictTo`
//! or `!androidx.annotation.RestrictTo(Scope.TESTS)` and answers whether an
//! annotation occurrence is selected. Entries are grouped by qualified name;
//! within a group excludes are consulted before includes and the first
//! entry whose attributes all appear on the occurrence decides.

use std::collections::BTreeMap;

use apisurf_types::{Annotation, AnnotationAttribute};
use tracing::debug;

use crate::error::{FilterError, FilterResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Polarity {
    Include,
    Exclude,
}

/// One parsed pattern.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnnotationFilterEntry {
    pub qualified_name: String,
    /// Attributes the occurrence must carry with equal values.
    pub attributes: Vec<AnnotationAttribute>,
    pub polarity: Polarity,
}

impl AnnotationFilterEntry {
    /// Parse `[!]qualified.Name[(attr=value, ...)]`.
    pub fn parse(pattern: &str) -> FilterResult<Self> {
        let trimmed = pattern.trim();
        let (polarity, body) = match trimmed.strip_prefix('!') {
            Some(rest) => (Polarity::Exclude, rest),
            None => (Polarity::Include, trimmed),
        };
        if body.starts_with('@') {
            return Err(FilterError::pattern(pattern, "patterns are written without '@'"));
        }
        let parsed =
            Annotation::parse(body).map_err(|e| FilterError::pattern(pattern, e.to_string()))?;
        Ok(Self {
            qualified_name: parsed.qualified_name,
            attributes: parsed.attributes,
            polarity,
        })
    }

    /// Every attribute of this entry is present on `annotation` with an equal
    /// value. A single value equals a one-element array, so `@Foo(BAR)` and
    /// `@Foo({BAR})` are interchangeable.
    pub fn matches(&self, annotation: &Annotation) -> bool {
        self.qualified_name == annotation.qualified_name
            && self.attributes.iter().all(|wanted| {
                annotation
                    .attribute(&wanted.name)
                    .is_some_and(|actual| actual.values() == wanted.value.values())
            })
    }
}

/// Collects patterns and validates them into an [`AnnotationFilter`].
#[derive(Clone, Debug, Default)]
pub struct AnnotationFilterBuilder {
    entries: Vec<AnnotationFilterEntry>,
}

impl AnnotationFilterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and add a pattern.
    pub fn add(&mut self, pattern: &str) -> FilterResult<&mut Self> {
        self.entries.push(AnnotationFilterEntry::parse(pattern)?);
        Ok(self)
    }

    /// Parse and add every pattern.
    pub fn extend<'a>(&mut self, patterns: impl IntoIterator<Item = &'a str>) -> FilterResult<&mut Self> {
        for pattern in patterns {
            self.add(pattern)?;
        }
        Ok(self)
    }

    /// Validate and build.
    ///
    /// Fails when an exclude has no attributes or when a name has excludes
    /// but no include.
    pub fn build(self) -> FilterResult<AnnotationFilter> {
        let mut by_name: BTreeMap<String, Vec<AnnotationFilterEntry>> = BTreeMap::new();
        for entry in self.entries {
            if entry.polarity == Polarity::Exclude && entry.attributes.is_empty() {
                return Err(FilterError::ExcludeWithoutAttributes {
                    name: entry.qualified_name,
                });
            }
            by_name
                .entry(entry.qualified_name.clone())
                .or_default()
                .push(entry);
        }

        for (name, entries) in &mut by_name {
            let has_exclude = entries.iter().any(|e| e.polarity == Polarity::Exclude);
            let has_include = entries.iter().any(|e| e.polarity == Polarity::Include);
            if has_exclude && !has_include {
                return Err(FilterError::ExcludeWithoutInclude { name: name.clone() });
            }
            // Stable: configuration order is kept within each polarity.
            entries.sort_by_key(|e| e.polarity != Polarity::Exclude);
        }

        debug!(names = by_name.len(), "built annotation filter");
        Ok(AnnotationFilter { by_name })
    }
}

/// A validated set of annotation patterns.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AnnotationFilter {
    by_name: BTreeMap<String, Vec<AnnotationFilterEntry>>,
}

impl AnnotationFilter {
    /// Build from patterns in one step.
    pub fn from_patterns<'a>(patterns: impl IntoIterator<Item = &'a str>) -> FilterResult<Self> {
        let mut builder = AnnotationFilterBuilder::new();
        builder.extend(patterns)?;
        builder.build()
    }

    /// Returns the polarity of the first matching entry, `false` when no
    /// entry matches.
    pub fn matches(&self, annotation: &Annotation) -> bool {
        self.by_name
            .get(&annotation.qualified_name)
            .and_then(|entries| entries.iter().find(|e| e.matches(annotation)))
            .is_some_and(|e| e.polarity == Polarity::Include)
    }

    /// Any of `annotations` is matched.
    pub fn matches_any(&self, annotations: &[Annotation]) -> bool {
        !self.is_empty() && annotations.iter().any(|a| self.matches(a))
    }

    /// The filter has entries for this qualified name, regardless of
    /// attributes.
    pub fn matches_annotation_name(&self, qualified_name: &str) -> bool {
        self.by_name.contains_key(qualified_name)
    }

    /// Some configured name ends with `suffix`.
    pub fn matches_suffix(&self, suffix: &str) -> bool {
        self.by_name.keys().any(|name| name.ends_with(suffix))
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    pub fn qualified_names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESTRICT_TO: &str = "androidx.annotation.RestrictTo";

    fn restrict(scope: &str) -> Annotation {
        Annotation::new(RESTRICT_TO).with_value(scope)
    }

    #[test]
    fn bare_include_matches_any_attributes() {
        let filter = AnnotationFilter::from_patterns([RESTRICT_TO]).unwrap();
        assert!(filter.matches(&Annotation::new(RESTRICT_TO)));
        assert!(filter.matches(&restrict("Scope.LIBRARY")));
        assert!(!filter.matches(&Annotation::new("androidx.annotation.Keep")));
    }

    #[test]
    fn excludes_are_consulted_first() {
        let filter = AnnotationFilter::from_patterns([
            RESTRICT_TO,
            "!androidx.annotation.RestrictTo(androidx.annotation.RestrictTo.Scope.TESTS)",
        ])
        .unwrap();
        assert!(filter.matches(&restrict("androidx.annotation.RestrictTo.Scope.LIBRARY")));
        assert!(!filter.matches(&restrict("androidx.annotation.RestrictTo.Scope.TESTS")));
    }

    #[test]
    fn attribute_patterns_need_matching_values() {
        let filter =
            AnnotationFilter::from_patterns(["androidx.annotation.RestrictTo(Scope.LIBRARY)"]).unwrap();
        assert!(filter.matches(&restrict("Scope.LIBRARY")));
        assert!(!filter.matches(&restrict("Scope.TESTS")));
        // Attribute missing on the occurrence.
        assert!(!filter.matches(&Annotation::new(RESTRICT_TO)));
    }

    #[test]
    fn single_value_equals_one_element_array() {
        let filter = AnnotationFilter::from_patterns(["pkg.Foo(BAR)"]).unwrap();
        let array = Annotation::parse("@pkg.Foo({BAR})").unwrap();
        assert!(filter.matches(&array));

        let filter = AnnotationFilter::from_patterns(["pkg.Foo({BAR})"]).unwrap();
        assert!(filter.matches(&Annotation::parse("@pkg.Foo(BAR)").unwrap()));
    }

    #[test]
    fn extra_occurrence_attributes_are_ignored() {
        let filter = AnnotationFilter::from_patterns(["pkg.Range(from=0)"]).unwrap();
        assert!(filter.matches(&Annotation::parse("@pkg.Range(from=0, to=10)").unwrap()));
    }

    #[test]
    fn bare_exclude_is_rejected() {
        let err = AnnotationFilter::from_patterns([RESTRICT_TO, "!androidx.annotation.RestrictTo"])
            .unwrap_err();
        assert!(matches!(err, FilterError::ExcludeWithoutAttributes { .. }));
    }

    #[test]
    fn exclude_without_include_is_rejected() {
        let err = AnnotationFilter::from_patterns(["!pkg.Foo(a=1)"]).unwrap_err();
        assert_eq!(err, FilterError::ExcludeWithoutInclude { name: "pkg.Foo".into() });
    }

    #[test]
    fn malformed_patterns_are_rejected() {
        for bad in ["", "!", "pkg.Foo(", "@pkg.Foo", "pkg..Foo", "pkg.Foo(a=)"] {
            let err = AnnotationFilter::from_patterns([bad]).unwrap_err();
            assert!(matches!(err, FilterError::InvalidPattern { .. }), "{bad:?}");
        }
    }

    #[test]
    fn name_queries() {
        let filter = AnnotationFilter::from_patterns([RESTRICT_TO, "android.annotation.SystemApi"]).unwrap();
        assert!(filter.matches_annotation_name("android.annotation.SystemApi"));
        assert!(!filter.matches_annotation_name("SystemApi"));
        assert!(filter.matches_suffix(".SystemApi"));
        assert!(!filter.is_empty());
        assert_eq!(filter.qualified_names().count(), 2);
        assert!(AnnotationFilter::default().is_empty());
    }
}
