//! Signature file format versions and their properties.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use apisurf_types::{
    Codebase, DefaultValue, ItemCommon, ItemKind, Modifier, Nullability, Parameter, TypeRef,
    MethodOrder,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{FormatError, FormatResult};

/// Prefix of the first line of every versioned signature file.
pub const HEADER_PREFIX: &str = "// Signature format: ";
/// Prefix of a property override line in a 5.0 header.
pub const PROPERTY_PREFIX: &str = "// - ";

pub const KOTLIN_STYLE_NULLS: &str = "kotlin-style-nulls";
pub const INCLUDE_DEFAULT_VALUES: &str = "include-default-values";
pub const CONCISE_DEFAULT_VALUES: &str = "concise-default-values";
pub const KOTLIN_NAME_TYPE_ORDER: &str = "kotlin-name-type-order";
pub const OVERLOADED_METHOD_ORDER: &str = "overloaded-method-order";
pub const SORT_WHOLE_EXTENDS_LIST: &str = "sort-whole-extends-list";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FormatVersion {
    /// Legacy files without a header.
    #[serde(rename = "1.0")]
    V1,
    #[serde(rename = "2.0")]
    V2,
    #[serde(rename = "3.0")]
    V3,
    #[default]
    #[serde(rename = "4.0")]
    V4,
    #[serde(rename = "5.0")]
    V5,
}

impl FormatVersion {
    pub const ALL: [FormatVersion; 5] = [Self::V1, Self::V2, Self::V3, Self::V4, Self::V5];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::V1 => "1.0",
            Self::V2 => "2.0",
            Self::V3 => "3.0",
            Self::V4 => "4.0",
            Self::V5 => "5.0",
        }
    }

    /// The version written in the header, `None` for V1.
    pub fn header_version(self) -> Option<&'static str> {
        match self {
            Self::V1 => None,
            other => Some(other.as_str()),
        }
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormatVersion {
    type Err = FormatError;

    /// Accepts `4.0`, `4`, and `v4`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let number = trimmed.strip_prefix(&['v', 'V'][..]).unwrap_or(trimmed);
        let number = number.strip_suffix(".0").unwrap_or(number);
        match number {
            "1" => Ok(Self::V1),
            "2" => Ok(Self::V2),
            "3" => Ok(Self::V3),
            "4" => Ok(Self::V4),
            "5" => Ok(Self::V5),
            _ => Err(FormatError::UnknownVersion(s.to_string())),
        }
    }
}

/// How nullness is written.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NullnessStyle {
    /// Not recorded (V1).
    None,
    /// `@Nullable` / `@NonNull` annotations.
    Annotations,
    /// `?` and `!` type suffixes.
    KotlinSuffix,
}

/// The properties one signature file is read or written with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct FileFormat {
    version: FormatVersion,
    kotlin_style_nulls: bool,
    include_default_values: bool,
    concise_default_values: bool,
    kotlin_name_type_order: bool,
    overloaded_method_order: MethodOrder,
    sort_whole_extends_list: bool,
}

impl FileFormat {
    pub const V1: FileFormat = FileFormat::defaults(FormatVersion::V1);
    pub const V2: FileFormat = FileFormat::defaults(FormatVersion::V2);
    pub const V3: FileFormat = FileFormat::defaults(FormatVersion::V3);
    pub const V4: FileFormat = FileFormat::defaults(FormatVersion::V4);
    pub const V5: FileFormat = FileFormat::defaults(FormatVersion::V5);

    /// The properties a version has when nothing is overridden.
    pub const fn defaults(version: FormatVersion) -> Self {
        let kotlin = matches!(version, FormatVersion::V3 | FormatVersion::V4 | FormatVersion::V5);
        let concise = matches!(version, FormatVersion::V4 | FormatVersion::V5);
        Self {
            version,
            kotlin_style_nulls: kotlin,
            include_default_values: kotlin,
            concise_default_values: concise,
            kotlin_name_type_order: false,
            overloaded_method_order: MethodOrder::Signature,
            sort_whole_extends_list: false,
        }
    }

    pub fn version(&self) -> FormatVersion {
        self.version
    }

    pub fn kotlin_style_nulls(&self) -> bool {
        self.kotlin_style_nulls
    }

    pub fn include_default_values(&self) -> bool {
        self.include_default_values
    }

    pub fn concise_default_values(&self) -> bool {
        self.concise_default_values
    }

    pub fn kotlin_name_type_order(&self) -> bool {
        self.kotlin_name_type_order
    }

    pub fn overloaded_method_order(&self) -> MethodOrder {
        self.overloaded_method_order
    }

    pub fn sort_whole_extends_list(&self) -> bool {
        self.sort_whole_extends_list
    }

    pub fn nullness_style(&self) -> NullnessStyle {
        if self.kotlin_style_nulls {
            NullnessStyle::KotlinSuffix
        } else if self.version == FormatVersion::V1 {
            NullnessStyle::None
        } else {
            NullnessStyle::Annotations
        }
    }

    /// V1 writes `deprecated` as a modifier keyword, later versions as an
    /// annotation.
    pub fn deprecated_as_annotation(&self) -> bool {
        self.version != FormatVersion::V1
    }

    /// Every property as `(key, value)` in header order.
    pub fn properties(&self) -> Vec<(&'static str, String)> {
        let yes_no = |b: bool| if b { "yes" } else { "no" }.to_string();
        vec![
            (KOTLIN_STYLE_NULLS, yes_no(self.kotlin_style_nulls)),
            (INCLUDE_DEFAULT_VALUES, yes_no(self.include_default_values)),
            (CONCISE_DEFAULT_VALUES, yes_no(self.concise_default_values)),
            (KOTLIN_NAME_TYPE_ORDER, yes_no(self.kotlin_name_type_order)),
            (OVERLOADED_METHOD_ORDER, self.overloaded_method_order.as_str().to_string()),
            (SORT_WHOLE_EXTENDS_LIST, yes_no(self.sort_whole_extends_list)),
        ]
    }

    /// Properties that differ from the version defaults.
    pub fn overrides(&self) -> Vec<(&'static str, String)> {
        let defaults = Self::defaults(self.version).properties();
        self.properties()
            .into_iter()
            .zip(defaults)
            .filter(|(mine, default)| mine != default)
            .map(|(mine, _)| mine)
            .collect()
    }

    /// Header lines, each terminated by a newline. Empty for V1.
    pub fn header(&self) -> String {
        let Some(version) = self.version.header_version() else {
            return String::new();
        };
        let mut out = format!("{HEADER_PREFIX}{version}\n");
        for (key, value) in self.overrides() {
            out.push_str(&format!("{PROPERTY_PREFIX}{key}={value}\n"));
        }
        out
    }

    /// Rewrite `codebase` into the image this format can represent: what a
    /// write followed by a parse yields.
    pub fn normalize(&self, codebase: &mut Codebase) {
        let ids: Vec<_> = codebase.items().map(|v| v.id()).collect();
        for id in &ids {
            let item = &codebase[*id];
            let common = self.normalize_common(&item.common);
            let kind = self.normalize_kind(&item.kind);
            if common != item.common || kind != item.kind {
                // Nullness, defaults and annotations never take part in keys.
                if let Err(err) = codebase.replace(*id, common, kind) {
                    debug!(%err, "normalization left item unchanged");
                }
            }
        }
        codebase.sort_canonical(self.overloaded_method_order);
    }

    fn normalize_common(&self, common: &ItemCommon) -> ItemCommon {
        let mut next = common.clone();
        if next.annotations.iter().any(|a| a.is_deprecated()) {
            next.modifiers = next.modifiers.with(Modifier::Deprecated);
        }
        next.annotations
            .retain(|a| !a.is_deprecated() && !a.is_nullable() && !a.is_non_null());
        next
    }

    fn normalize_type(&self, ty: &TypeRef) -> TypeRef {
        match self.nullness_style() {
            NullnessStyle::None => ty.clone().with_nullability(Nullability::Platform),
            NullnessStyle::Annotations | NullnessStyle::KotlinSuffix => ty.clone(),
        }
    }

    fn normalize_parameter(&self, p: &Parameter) -> Parameter {
        let mut next = p.clone();
        next.ty = self.normalize_type(&p.ty);
        next.annotations
            .retain(|a| !a.is_deprecated() && !a.is_nullable() && !a.is_non_null());
        next.default = match &p.default {
            _ if !self.include_default_values => DefaultValue::Absent,
            DefaultValue::Expression(_) if self.concise_default_values => DefaultValue::Unknown,
            other => other.clone(),
        };
        next
    }

    fn normalize_kind(&self, kind: &ItemKind) -> ItemKind {
        match kind {
            ItemKind::Package(p) => ItemKind::Package(p.clone()),
            ItemKind::Class(c) => {
                let mut c = c.clone();
                c.super_class = c.super_class.map(|t| t.with_nullability(Nullability::Platform));
                c.interfaces = c
                    .interfaces
                    .into_iter()
                    .map(|t| t.with_nullability(Nullability::Platform))
                    .collect();
                if self.sort_whole_extends_list {
                    c.interfaces.sort_by(|a, b| a.text().cmp(b.text()));
                }
                ItemKind::Class(c)
            }
            ItemKind::Constructor(c) | ItemKind::Method(c) => {
                let mut c = c.clone();
                c.return_type = c.return_type.as_ref().map(|t| self.normalize_type(t));
                c.parameters = c.parameters.iter().map(|p| self.normalize_parameter(p)).collect();
                if matches!(kind, ItemKind::Constructor(_)) {
                    ItemKind::Constructor(c)
                } else {
                    ItemKind::Method(c)
                }
            }
            ItemKind::Field(f) => {
                let mut f = f.clone();
                f.ty = self.normalize_type(&f.ty);
                ItemKind::Field(f)
            }
            ItemKind::EnumConstant(f) => {
                let mut f = f.clone();
                f.ty = self.normalize_type(&f.ty);
                ItemKind::EnumConstant(f)
            }
            ItemKind::Property(p) => {
                let mut p = p.clone();
                p.ty = self.normalize_type(&p.ty);
                ItemKind::Property(p)
            }
        }
    }
}

impl Default for FileFormat {
    fn default() -> Self {
        Self::defaults(FormatVersion::default())
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.version.as_str())?;
        for (key, value) in self.overrides() {
            write!(f, " {key}={value}")?;
        }
        Ok(())
    }
}

/// Applies property overrides to a version's defaults.
#[derive(Clone, Debug)]
pub struct FileFormatBuilder {
    format: FileFormat,
}

impl FileFormatBuilder {
    pub fn new(version: FormatVersion) -> Self {
        Self {
            format: FileFormat::defaults(version),
        }
    }

    /// Override one property. Booleans accept `yes`/`no` and `true`/`false`.
    pub fn set(mut self, key: &str, value: &str) -> FormatResult<Self> {
        let invalid = || FormatError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        let flag = || match value.trim() {
            "yes" | "true" => Ok(true),
            "no" | "false" => Ok(false),
            _ => Err(invalid()),
        };
        let f = &mut self.format;
        match key.trim() {
            KOTLIN_STYLE_NULLS => f.kotlin_style_nulls = flag()?,
            INCLUDE_DEFAULT_VALUES => f.include_default_values = flag()?,
            CONCISE_DEFAULT_VALUES => f.concise_default_values = flag()?,
            KOTLIN_NAME_TYPE_ORDER => f.kotlin_name_type_order = flag()?,
            SORT_WHOLE_EXTENDS_LIST => f.sort_whole_extends_list = flag()?,
            OVERLOADED_METHOD_ORDER => {
                f.overloaded_method_order = MethodOrder::parse(value.trim()).ok_or_else(invalid)?
            }
            other => return Err(FormatError::UnknownProperty(other.to_string())),
        }
        Ok(self)
    }

    pub fn build(self) -> FormatResult<FileFormat> {
        let f = self.format;
        if f.concise_default_values && !f.include_default_values {
            return Err(FormatError::Conflict {
                property: CONCISE_DEFAULT_VALUES,
                requires: INCLUDE_DEFAULT_VALUES,
            });
        }
        if f.kotlin_name_type_order && !f.kotlin_style_nulls {
            return Err(FormatError::Conflict {
                property: KOTLIN_NAME_TYPE_ORDER,
                requires: KOTLIN_STYLE_NULLS,
            });
        }
        if f.version != FormatVersion::V5 && !f.overrides().is_empty() {
            return Err(FormatError::OverridesNotSupported {
                version: f.version.to_string(),
            });
        }
        Ok(f)
    }
}

/// Serializable format selection: a version plus property overrides.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatSettings {
    pub version: FormatVersion,
    pub properties: BTreeMap<String, String>,
}

impl FormatSettings {
    pub fn resolve(&self) -> FormatResult<FileFormat> {
        self.properties
            .iter()
            .try_fold(FileFormatBuilder::new(self.version), |b, (k, v)| b.set(k, v))?
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_defaults_follow_the_table() {
        assert!(!FileFormat::V2.kotlin_style_nulls());
        assert!(!FileFormat::V2.include_default_values());
        assert!(FileFormat::V3.kotlin_style_nulls());
        assert!(FileFormat::V3.include_default_values());
        assert!(!FileFormat::V3.concise_default_values());
        assert!(FileFormat::V4.concise_default_values());
        assert!(!FileFormat::V5.kotlin_name_type_order());
        assert_eq!(FileFormat::V1.nullness_style(), NullnessStyle::None);
        assert_eq!(FileFormat::V2.nullness_style(), NullnessStyle::Annotations);
        assert!(!FileFormat::V1.deprecated_as_annotation());
    }

    #[test]
    fn version_parsing() {
        assert_eq!("4.0".parse::<FormatVersion>().unwrap(), FormatVersion::V4);
        assert_eq!("v2".parse::<FormatVersion>().unwrap(), FormatVersion::V2);
        assert_eq!("5".parse::<FormatVersion>().unwrap(), FormatVersion::V5);
        assert!("6.0".parse::<FormatVersion>().is_err());
    }

    #[test]
    fn headers() {
        assert_eq!(FileFormat::V1.header(), "");
        assert_eq!(FileFormat::V3.header(), "// Signature format: 3.0\n");
        let custom = FileFormatBuilder::new(FormatVersion::V5)
            .set(KOTLIN_NAME_TYPE_ORDER, "yes")
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(
            custom.header(),
            "// Signature format: 5.0\n// - kotlin-name-type-order=yes\n"
        );
    }

    #[test]
    fn conflicting_properties_are_rejected() {
        let err = FileFormatBuilder::new(FormatVersion::V5)
            .set(INCLUDE_DEFAULT_VALUES, "no")
            .unwrap()
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            FormatError::Conflict {
                property: CONCISE_DEFAULT_VALUES,
                requires: INCLUDE_DEFAULT_VALUES
            }
        );

        let err = FileFormatBuilder::new(FormatVersion::V5)
            .set(KOTLIN_STYLE_NULLS, "no")
            .unwrap()
            .set(KOTLIN_NAME_TYPE_ORDER, "yes")
            .unwrap()
            .build()
            .unwrap_err();
        assert!(matches!(err, FormatError::Conflict { property: KOTLIN_NAME_TYPE_ORDER, .. }));
    }

    #[test]
    fn unknown_keys_and_values_are_rejected() {
        assert!(matches!(
            FileFormatBuilder::new(FormatVersion::V5).set("add-additional-overrides", "yes"),
            Err(FormatError::UnknownProperty(_))
        ));
        assert!(matches!(
            FileFormatBuilder::new(FormatVersion::V5).set(KOTLIN_STYLE_NULLS, "maybe"),
            Err(FormatError::InvalidValue { .. })
        ));
        assert!(matches!(
            FileFormatBuilder::new(FormatVersion::V5).set(OVERLOADED_METHOD_ORDER, "random"),
            Err(FormatError::InvalidValue { .. })
        ));
    }

    #[test]
    fn overrides_need_version_five() {
        let err = FileFormatBuilder::new(FormatVersion::V4)
            .set(OVERLOADED_METHOD_ORDER, "source")
            .unwrap()
            .build()
            .unwrap_err();
        assert!(matches!(err, FormatError::OverridesNotSupported { .. }));
        // Setting a default value is not an override.
        assert!(FileFormatBuilder::new(FormatVersion::V4)
            .set(KOTLIN_STYLE_NULLS, "yes")
            .unwrap()
            .build()
            .is_ok());
    }

    #[test]
    fn settings_resolve_from_toml() {
        let settings: FormatSettings = toml::from_str(
            r#"
            version = "5.0"
            [properties]
            overloaded-method-order = "source"
            "#,
        )
        .unwrap();
        let format = settings.resolve().unwrap();
        assert_eq!(format.version(), FormatVersion::V5);
        assert_eq!(format.overloaded_method_order(), MethodOrder::Source);
        assert_eq!(format.to_string(), "5.0 overloaded-method-order=source");
    }

    #[test]
    fn normalize_strips_what_the_format_drops() {
        use apisurf_types::{Annotation, CallableData, ClassData, ClassKind};

        let mut cb = Codebase::new();
        let pkg = cb.ensure_package("p").unwrap();
        let c = cb
            .add_class(pkg, ItemCommon::public("C"), ClassData::new(ClassKind::Class, "p.C"))
            .unwrap();
        let params = vec![
            Parameter::new(TypeRef::nullable("java.lang.String"))
                .named("s")
                .with_default(DefaultValue::expression("\"x\"")),
        ];
        let m = cb
            .add_member(
                c,
                ItemCommon::public("m").with_annotation(Annotation::new("java.lang.Deprecated")),
                ItemKind::Method(CallableData::method(TypeRef::non_null("java.lang.Object"), params)),
            )
            .unwrap();

        let mut v4 = cb.clone();
        FileFormat::V4.normalize(&mut v4);
        let item = &v4[m];
        assert!(item.common.modifiers.is_deprecated());
        assert!(item.common.annotations.is_empty());
        let data = item.kind.as_callable().unwrap();
        assert_eq!(data.parameters[0].default, DefaultValue::Unknown);
        assert_eq!(data.parameters[0].ty.nullability(), Nullability::Nullable);

        let mut v1 = cb.clone();
        FileFormat::V1.normalize(&mut v1);
        let data = v1[m].kind.as_callable().unwrap();
        assert_eq!(data.parameters[0].default, DefaultValue::Absent);
        assert_eq!(data.parameters[0].ty.nullability(), Nullability::Platform);
        assert_eq!(data.return_type.as_ref().unwrap().nullability(), Nullability::Platform);
    }
}
