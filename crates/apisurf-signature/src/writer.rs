//! Signature file writer.

use apisurf_filter::{ApiTraversal, ApiVisitor, SurfacePredicates};
use apisurf_types::{
    Annotation, CallableData, Codebase, DefaultValue, ItemCommon, ItemKind, ItemView, Modifier,
    Nullability, Parameter, TypeRef,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::format::{FileFormat, NullnessStyle};

/// When the header is written.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderMode {
    #[default]
    Always,
    /// Only when at least one package is written.
    IfNonEmpty,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterOptions {
    pub header: HeaderMode,
    /// Write the constructor overloads implied by defaulted parameters.
    pub expand_constructor_overloads: bool,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            header: HeaderMode::Always,
            expand_constructor_overloads: true,
        }
    }
}

/// Serializes the emitted part of a codebase.
#[derive(Clone, Debug)]
pub struct SignatureWriter {
    format: FileFormat,
    options: WriterOptions,
}

impl SignatureWriter {
    pub fn new(format: FileFormat, options: WriterOptions) -> Self {
        Self { format, options }
    }

    pub fn format(&self) -> &FileFormat {
        &self.format
    }

    /// Render every item `predicates` emits. Output is deterministic for a
    /// given tree, format and options.
    pub fn write(&self, codebase: &Codebase, predicates: &SurfacePredicates) -> String {
        let expanded;
        let codebase = if self.options.expand_constructor_overloads {
            let mut copy = codebase.clone();
            copy.expand_constructor_overloads();
            expanded = copy;
            &expanded
        } else {
            codebase
        };

        let traversal =
            ApiTraversal::with_filter(predicates.emit_filter(), self.format.overloaded_method_order())
                .include_empty_outer_classes(predicates.include_empty_outer_classes);
        let mut emitter = Emitter {
            format: &self.format,
            out: String::new(),
            package: String::new(),
            members: 0,
        };
        traversal.walk(codebase, &mut emitter);
        debug!(members = emitter.members, format = %self.format, "wrote signature file");

        let body = emitter.out;
        let mut out = String::with_capacity(body.len() + 64);
        if self.options.header == HeaderMode::Always || !body.is_empty() {
            out.push_str(&self.format.header());
        }
        out.push_str(&body);
        out
    }
}

struct Emitter<'f> {
    format: &'f FileFormat,
    out: String,
    /// Qualified name of the open package.
    package: String,
    members: usize,
}

impl Emitter<'_> {
    fn type_text(&self, ty: &TypeRef) -> String {
        match self.format.nullness_style() {
            NullnessStyle::KotlinSuffix => ty.to_string(),
            NullnessStyle::None | NullnessStyle::Annotations => ty.text().to_string(),
        }
    }

    fn nullness_annotation(&self, ty: Option<&TypeRef>) -> Option<&'static str> {
        if self.format.nullness_style() != NullnessStyle::Annotations {
            return None;
        }
        let ty = ty?;
        if ty.is_primitive() {
            return None;
        }
        match ty.nullability() {
            Nullability::Nullable => Some("@Nullable"),
            Nullability::NonNull => Some("@NonNull"),
            Nullability::Platform => None,
        }
    }

    /// Annotations as written: deprecation, nullness, then the item's own.
    fn annotations(&self, annotations: &[Annotation], deprecated: bool, ty: Option<&TypeRef>) -> Vec<String> {
        let mut out = Vec::new();
        if deprecated && self.format.deprecated_as_annotation() {
            out.push("@Deprecated".to_string());
        }
        out.extend(self.nullness_annotation(ty).map(str::to_string));
        out.extend(
            annotations
                .iter()
                .filter(|a| !a.is_deprecated() && !a.is_nullable() && !a.is_non_null())
                .map(Annotation::to_source),
        );
        out
    }

    /// Annotations and modifiers of a declaration.
    fn prefix(&self, common: &ItemCommon, ty: Option<&TypeRef>) -> Vec<String> {
        let mut parts = self.annotations(&common.annotations, common.modifiers.is_deprecated(), ty);
        parts.extend(common.visibility.keyword().map(str::to_string));
        if common.modifiers.is_deprecated() && !self.format.deprecated_as_annotation() {
            parts.push(Modifier::Deprecated.keyword().to_string());
        }
        parts.extend(
            common
                .modifiers
                .iter()
                .filter(|m| *m != Modifier::Deprecated)
                .map(|m| m.keyword().to_string()),
        );
        parts
    }

    fn parameter(&self, p: &Parameter) -> String {
        let mut parts = Vec::new();
        let with_default = self.format.include_default_values() && p.default.is_present();
        if with_default {
            parts.push("optional".to_string());
        }
        parts.extend(self.annotations(&p.annotations, false, Some(&p.ty)));
        let ty = self.type_text(&p.ty);
        match (&p.name, self.format.kotlin_name_type_order()) {
            (Some(name), true) => parts.push(format!("{name}: {ty}")),
            (Some(name), false) => {
                parts.push(ty);
                parts.push(name.clone());
            }
            (None, _) => parts.push(ty),
        }
        let mut out = parts.join(" ");
        if with_default && !self.format.concise_default_values() {
            match &p.default {
                DefaultValue::Expression(expr) => {
                    out.push_str(" = ");
                    out.push_str(expr);
                }
                DefaultValue::Unknown => out.push_str(" = null"),
                DefaultValue::Absent => {}
            }
        }
        out
    }

    fn parameters(&self, data: &CallableData) -> String {
        let params: Vec<String> = data.parameters.iter().map(|p| self.parameter(p)).collect();
        format!("({})", params.join(", "))
    }

    fn line(&mut self, parts: Vec<String>) {
        self.out.push_str("    ");
        self.out.push_str(&parts.join(" "));
        self.out.push_str(";\n");
        self.members += 1;
    }

    fn callable(&mut self, keyword: &str, item: ItemView<'_>, data: &CallableData) {
        let ret = data.return_type.as_ref();
        let mut parts = vec![keyword.to_string()];
        parts.extend(self.prefix(item.common(), ret));
        parts.extend(data.type_parameters.clone());
        let params = self.parameters(data);
        match (ret, self.format.kotlin_name_type_order()) {
            (Some(ret), true) => {
                parts.push(format!("{}{params}: {}", item.name(), self.type_text(ret)))
            }
            (Some(ret), false) => {
                parts.push(self.type_text(ret));
                parts.push(format!("{}{params}", item.name()));
            }
            (None, _) => parts.push(format!("{}{params}", item.name())),
        }
        if !data.throws.is_empty() {
            parts.push(format!("throws {}", data.throws.join(", ")));
        }
        if let Some(default) = &data.annotation_default {
            parts.push(format!("default {default}"));
        }
        self.line(parts);
    }

    fn typed(&mut self, keyword: &str, item: ItemView<'_>, ty: &TypeRef, value: Option<&String>) {
        let mut parts = vec![keyword.to_string()];
        parts.extend(self.prefix(item.common(), Some(ty)));
        let ty = self.type_text(ty);
        if self.format.kotlin_name_type_order() {
            parts.push(format!("{}: {ty}", item.name()));
        } else {
            parts.push(ty);
            parts.push(item.name().to_string());
        }
        if let Some(value) = value {
            parts.push(format!("= {value}"));
        }
        self.line(parts);
    }
}

impl ApiVisitor for Emitter<'_> {
    fn visit_package_start(&mut self, package: ItemView<'_>) {
        self.package = package.qualified_name();
        let mut parts = vec!["package".to_string()];
        parts.extend(self.annotations(&package.common().annotations, false, None));
        parts.push(self.package.clone());
        self.out.push_str(&parts.join(" "));
        self.out.push_str(" {\n\n");
    }

    fn visit_package_end(&mut self, _package: ItemView<'_>) {
        self.out.push_str("}\n\n");
    }

    fn visit_class_start(&mut self, class: ItemView<'_>) {
        let Some(data) = class.as_class() else {
            return;
        };
        let mut parts = self.prefix(class.common(), None);
        parts.push(data.kind.keyword().to_string());

        let prefix = format!("{}.", self.package);
        let name = data
            .qualified_name
            .strip_prefix(&prefix)
            .unwrap_or(&data.qualified_name);
        parts.push(format!("{name}{}", data.type_parameters.as_deref().unwrap_or("")));

        let mut interfaces: Vec<&str> = data.interfaces.iter().map(TypeRef::text).collect();
        if self.format.sort_whole_extends_list() {
            interfaces.sort_unstable();
        }
        if data.kind.is_interface_like() {
            if !interfaces.is_empty() {
                parts.push("extends".to_string());
                parts.extend(interfaces.iter().map(|i| i.to_string()));
            }
        } else {
            if let Some(superclass) = &data.super_class {
                parts.push("extends".to_string());
                parts.push(superclass.text().to_string());
            }
            if !interfaces.is_empty() {
                parts.push("implements".to_string());
                parts.extend(interfaces.iter().map(|i| i.to_string()));
            }
        }

        self.out.push_str("  ");
        self.out.push_str(&parts.join(" "));
        self.out.push_str(" {\n");
    }

    fn visit_class_end(&mut self, _class: ItemView<'_>) {
        self.out.push_str("  }\n\n");
    }

    fn visit_constructor(&mut self, constructor: ItemView<'_>) {
        if let ItemKind::Constructor(data) = constructor.kind() {
            self.callable("ctor", constructor, data);
        }
    }

    fn visit_method(&mut self, method: ItemView<'_>) {
        if let ItemKind::Method(data) = method.kind() {
            self.callable("method", method, data);
        }
    }

    fn visit_field(&mut self, field: ItemView<'_>) {
        if let ItemKind::Field(data) = field.kind() {
            self.typed("field", field, &data.ty, data.value.as_ref());
        }
    }

    fn visit_enum_constant(&mut self, constant: ItemView<'_>) {
        if let ItemKind::EnumConstant(data) = constant.kind() {
            self.typed("enum_constant", constant, &data.ty, data.value.as_ref());
        }
    }

    fn visit_property(&mut self, property: ItemView<'_>) {
        if let ItemKind::Property(data) = property.kind() {
            self.typed("property", property, &data.ty, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{FileFormatBuilder, FormatVersion, KOTLIN_NAME_TYPE_ORDER};
    use apisurf_types::{ClassData, ClassKind, FieldData, ItemId, Modifiers};

    fn sample() -> (Codebase, ItemId) {
        let mut cb = Codebase::new();
        let pkg = cb.ensure_package("pkg").unwrap();
        let mut data = ClassData::new(ClassKind::Class, "pkg.Foo");
        data.super_class = Some(TypeRef::new("pkg.Base"));
        data.interfaces = vec![TypeRef::new("pkg.A"), TypeRef::new("pkg.B")];
        let foo = cb.add_class(pkg, ItemCommon::public("Foo"), data).unwrap();
        cb.add_member(foo, ItemCommon::public("Foo"), ItemKind::Constructor(CallableData::constructor(vec![])))
            .unwrap();
        cb.add_member(
            foo,
            ItemCommon::public("bar"),
            ItemKind::Method(CallableData::method(TypeRef::new("void"), vec![])),
        )
        .unwrap();
        cb.add_member(
            foo,
            ItemCommon::public("X").with_modifiers(
                Modifiers::empty().with(Modifier::Static).with(Modifier::Final),
            ),
            ItemKind::Field(FieldData {
                ty: TypeRef::new("int"),
                value: Some("42".into()),
            }),
        )
        .unwrap();
        (cb, foo)
    }

    fn write(cb: &Codebase, format: FileFormat) -> String {
        SignatureWriter::new(format, WriterOptions::default()).write(cb, &SurfacePredicates::everything())
    }

    #[test]
    fn writes_the_canonical_layout() {
        let (cb, _) = sample();
        assert_eq!(
            write(&cb, FileFormat::V4),
            "// Signature format: 4.0\n\
             package pkg {\n\
             \n\
             \x20 public class Foo extends pkg.Base implements pkg.A pkg.B {\n\
             \x20   ctor public Foo();\n\
             \x20   method public void bar();\n\
             \x20   field public static final int X = 42;\n\
             \x20 }\n\
             \n\
             }\n\
             \n"
        );
    }

    #[test]
    fn header_modes() {
        let empty = Codebase::new();
        let preds = SurfacePredicates::everything();
        let always = SignatureWriter::new(FileFormat::V2, WriterOptions::default());
        assert_eq!(always.write(&empty, &preds), "// Signature format: 2.0\n");
        let lazy = SignatureWriter::new(
            FileFormat::V2,
            WriterOptions {
                header: HeaderMode::IfNonEmpty,
                ..WriterOptions::default()
            },
        );
        assert_eq!(lazy.write(&empty, &preds), "");
        assert_eq!(write(&empty, FileFormat::V1), "");
    }

    fn method_with(cb: &mut Codebase, class: ItemId, ret: TypeRef, params: Vec<Parameter>) {
        cb.add_member(class, ItemCommon::public("m"), ItemKind::Method(CallableData::method(ret, params)))
            .unwrap();
    }

    fn only_member_line(text: &str) -> &str {
        text.lines().find(|l| l.starts_with("    ")).unwrap().trim()
    }

    #[test]
    fn nullness_styles() {
        let mut cb = Codebase::new();
        let pkg = cb.ensure_package("p").unwrap();
        let c = cb
            .add_class(pkg, ItemCommon::public("C"), ClassData::new(ClassKind::Class, "p.C"))
            .unwrap();
        method_with(
            &mut cb,
            c,
            TypeRef::nullable("java.lang.String"),
            vec![
                Parameter::new(TypeRef::non_null("java.lang.Object")).named("o"),
                Parameter::new(TypeRef::new("java.lang.Object")).named("p"),
            ],
        );

        assert_eq!(
            only_member_line(&write(&cb, FileFormat::V2)),
            "method @Nullable public java.lang.String m(@NonNull java.lang.Object o, java.lang.Object p);"
        );
        assert_eq!(
            only_member_line(&write(&cb, FileFormat::V3)),
            "method public java.lang.String? m(java.lang.Object o, java.lang.Object! p);"
        );
        assert_eq!(
            only_member_line(&write(&cb, FileFormat::V1)),
            "method public java.lang.String m(java.lang.Object o, java.lang.Object p);"
        );
    }

    #[test]
    fn default_values_per_format() {
        let mut cb = Codebase::new();
        let pkg = cb.ensure_package("p").unwrap();
        let c = cb
            .add_class(pkg, ItemCommon::public("C"), ClassData::new(ClassKind::Class, "p.C"))
            .unwrap();
        method_with(
            &mut cb,
            c,
            TypeRef::new("void"),
            vec![
                Parameter::new(TypeRef::new("int")).named("x").with_default(DefaultValue::expression("1")),
                Parameter::new(TypeRef::nullable("java.lang.String"))
                    .named("s")
                    .with_default(DefaultValue::Unknown),
            ],
        );

        assert_eq!(
            only_member_line(&write(&cb, FileFormat::V4)),
            "method public void m(optional int x, optional java.lang.String? s);"
        );
        assert_eq!(
            only_member_line(&write(&cb, FileFormat::V3)),
            "method public void m(optional int x = 1, optional java.lang.String? s = null);"
        );
        assert_eq!(
            only_member_line(&write(&cb, FileFormat::V2)),
            "method public void m(int x, @Nullable java.lang.String s);"
        );
    }

    #[test]
    fn deprecation_style_depends_on_version() {
        let mut cb = Codebase::new();
        let pkg = cb.ensure_package("p").unwrap();
        let common = ItemCommon::public("C").with_modifiers(Modifiers::empty().with(Modifier::Deprecated));
        cb.add_class(pkg, common, ClassData::new(ClassKind::Interface, "p.C")).unwrap();
        assert!(write(&cb, FileFormat::V1).contains("  public deprecated interface C {"));
        assert!(write(&cb, FileFormat::V2).contains("  @Deprecated public interface C {"));
    }

    #[test]
    fn kotlin_name_type_order() {
        let (mut cb, foo) = sample();
        method_with(
            &mut cb,
            foo,
            TypeRef::nullable("java.lang.String"),
            vec![Parameter::new(TypeRef::new("int")).named("x")],
        );
        let format = FileFormatBuilder::new(FormatVersion::V5)
            .set(KOTLIN_NAME_TYPE_ORDER, "yes")
            .unwrap()
            .build()
            .unwrap();
        let text = write(&cb, format);
        assert!(text.contains("    method public m(x: int): java.lang.String?;\n"));
        assert!(text.contains("    field public static final X: int = 42;\n"));
    }

    #[test]
    fn constructor_overloads_follow_declared_ones() {
        let mut cb = Codebase::new();
        let pkg = cb.ensure_package("p").unwrap();
        let c = cb
            .add_class(pkg, ItemCommon::public("C"), ClassData::new(ClassKind::Class, "p.C"))
            .unwrap();
        cb.add_member(
            c,
            ItemCommon::public("C"),
            ItemKind::Constructor(CallableData::constructor(vec![
                Parameter::new(TypeRef::new("int")).named("a"),
                Parameter::new(TypeRef::new("int")).named("b").with_default(DefaultValue::Unknown),
            ])),
        )
        .unwrap();

        let text = write(&cb, FileFormat::V4);
        let ctors: Vec<&str> = text.lines().filter(|l| l.contains("ctor")).map(str::trim).collect();
        assert_eq!(ctors, vec!["ctor public C(int a);", "ctor public C(int a, optional int b);"]);

        let plain = SignatureWriter::new(
            FileFormat::V4,
            WriterOptions {
                expand_constructor_overloads: false,
                ..WriterOptions::default()
            },
        )
        .write(&cb, &SurfacePredicates::everything());
        assert_eq!(plain.matches("ctor ").count(), 1);
    }
}
