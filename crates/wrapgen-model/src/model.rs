//! The frozen interface model handed to generators.

use indexmap::IndexMap;
use serde::Serialize;
use smol_str::SmolStr;
use wrapgen_common::SourceLocation;
use wrapgen_decl::Access;

use crate::defaults::{CallForms, DefaultValue};
use crate::exceptions::{ExceptionKind, ThrowSite};
use crate::operators::OperatorKind;
use crate::overload::{OverloadGroup, OverloadGroupId, Signature};
use crate::scope::simple_name;
use crate::types::{Ownership, TypeRef};

/// Index of a class in [`InterfaceModel::classes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ClassId(pub u32);

/// Whether a class was declared with `class` or `struct`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Class,
    Struct,
}

/// Facilities of the standard library the model depends on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StdFeatures {
    pub string: bool,
    pub vector: bool,
    pub exceptions: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct InterfaceModel {
    /// Keyed by qualified name, in declaration order.
    pub classes: IndexMap<SmolStr, ClassDecl>,
    /// Free and nested enums, keyed by qualified name.
    pub enums: IndexMap<SmolStr, EnumDecl>,
    pub functions: Vec<FunctionDecl>,
    /// Overload groups of free functions.
    pub function_groups: Vec<OverloadGroup>,
    pub structs: Vec<StructDecl>,
    pub std_features: StdFeatures,
}

impl InterfaceModel {
    /// Look up a class by qualified name, or by unqualified name when that
    /// is unambiguous.
    pub fn class(&self, name: &str) -> Option<&ClassDecl> {
        if let Some(class) = self.classes.get(name) {
            return Some(class);
        }
        unique_by_simple_name(self.classes.values(), name, |c| &c.name)
    }

    pub fn class_by_id(&self, id: ClassId) -> Option<&ClassDecl> {
        self.classes.get_index(id.0 as usize).map(|(_, c)| c)
    }

    pub fn enum_decl(&self, name: &str) -> Option<&EnumDecl> {
        if let Some(decl) = self.enums.get(name) {
            return Some(decl);
        }
        unique_by_simple_name(self.enums.values(), name, |e| &e.name)
    }

    pub fn structure(&self, name: &str) -> Option<&StructDecl> {
        self.structs
            .iter()
            .find(|s| s.name == name)
            .or_else(|| unique_by_simple_name(self.structs.iter(), name, |s| &s.name))
    }

    /// All free functions named `name`, in declaration order.
    pub fn functions_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a FunctionDecl> + 'a {
        self.functions
            .iter()
            .filter(move |f| f.name == name || simple_name(&f.name) == name)
    }

    pub fn function<'a>(&'a self, name: &'a str) -> Option<&'a FunctionDecl> {
        self.functions_named(name).next()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn unique_by_simple_name<'a, T>(
    items: impl Iterator<Item = &'a T>,
    name: &str,
    key: impl Fn(&T) -> &SmolStr,
) -> Option<&'a T> {
    let mut found = None;
    for item in items {
        if simple_name(key(item)) == name {
            if found.is_some() {
                return None;
            }
            found = Some(item);
        }
    }
    found
}

/// A direct base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BaseRef {
    pub name: SmolStr,
    pub id: ClassId,
    pub access: Access,
    pub is_virtual: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassDecl {
    pub id: ClassId,
    /// Qualified name.
    pub name: SmolStr,
    pub kind: RecordKind,
    pub location: SourceLocation,
    /// Direct bases in declaration order.
    pub bases: Vec<BaseRef>,
    /// Standard library bases (e.g. `std::runtime_error`), outside the graph.
    pub external_bases: Vec<SmolStr>,
    /// Self first, then ancestors depth-first in base-list order, each once.
    pub linearization: Vec<SmolStr>,
    pub fields: Vec<FieldDecl>,
    pub static_fields: Vec<FieldDecl>,
    pub constructors: Vec<ConstructorDecl>,
    pub destructor: Option<DestructorDecl>,
    pub methods: Vec<MethodDecl>,
    pub operators: Vec<OperatorDecl>,
    /// Qualified names of enums declared inside this class.
    pub enums: Vec<SmolStr>,
    pub overload_groups: Vec<OverloadGroup>,
    /// Effective implementation of every callable method, own and inherited.
    pub overrides: Vec<EffectiveMethod>,
    pub is_abstract: bool,
    pub has_virtual_destructor: bool,
}

impl ClassDecl {
    pub fn simple_name(&self) -> &str {
        simple_name(&self.name)
    }

    pub fn is_instantiable(&self) -> bool {
        !self.is_abstract
    }

    pub fn method(&self, name: &str) -> Option<&MethodDecl> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDecl> {
        self.fields
            .iter()
            .chain(&self.static_fields)
            .find(|f| f.name == name)
    }

    pub fn operator(&self, kind: OperatorKind) -> Option<&OperatorDecl> {
        self.operators.iter().find(|o| o.kind == kind)
    }

    pub fn overload_group(&self, id: OverloadGroupId) -> Option<&OverloadGroup> {
        self.overload_groups.iter().find(|g| g.id == id)
    }

    /// The effective implementation of `name`, if there is exactly one
    /// signature with that name.
    pub fn resolve_method(&self, name: &str) -> Option<&EffectiveMethod> {
        let mut matches = self.overrides.iter().filter(|m| m.name == name);
        let first = matches.next()?;
        match matches.next() {
            Some(_) => None,
            None => Some(first),
        }
    }

    pub fn resolve(&self, name: &str, signature: &Signature) -> Option<&EffectiveMethod> {
        self.overrides
            .iter()
            .find(|m| m.name == name && &m.signature == signature)
    }
}

/// Ownership classification of a field, with the evidence behind it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OwnershipInfo {
    pub ownership: Ownership,
    pub evidence: OwnershipEvidence,
    /// Methods that allocate a fresh buffer for this field on every call.
    pub copy_in_setters: Vec<SmolStr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "evidence", rename_all = "snake_case")]
pub enum OwnershipEvidence {
    /// Storage is part of the object (fixed-size array).
    InlineStorage,
    /// The destructor releases it.
    ReleasedInDestructor,
    /// A setter always copies into a fresh allocation.
    CopyInSetter,
    /// A constructor stores this parameter without copying.
    StoredParameter { constructor_param: SmolStr },
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldDecl {
    pub name: SmolStr,
    pub ty: TypeRef,
    pub access: Access,
    /// `None` for value fields, and for pointer fields left unclassified.
    pub ownership: Option<OwnershipInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParamDecl {
    pub name: SmolStr,
    pub ty: TypeRef,
    pub default: Option<DefaultValue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MethodDecl {
    pub name: SmolStr,
    pub params: Vec<ParamDecl>,
    pub returns: TypeRef,
    pub access: Access,
    pub is_static: bool,
    pub is_const: bool,
    pub is_virtual: bool,
    /// Overrides a virtual method of some base.
    pub is_override: bool,
    pub is_pure_virtual: bool,
    pub overload_group: OverloadGroupId,
    pub signature: Signature,
    pub call_forms: CallForms,
    pub throws: Vec<ThrowSite>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstructorKind {
    Default,
    Copy,
    Other,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConstructorDecl {
    pub kind: ConstructorKind,
    pub params: Vec<ParamDecl>,
    pub access: Access,
    pub overload_group: OverloadGroupId,
    pub signature: Signature,
    pub call_forms: CallForms,
    pub throws: Vec<ThrowSite>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Serialize)]
pub struct DestructorDecl {
    pub is_virtual: bool,
    pub access: Access,
    /// Fields released in the body.
    pub releases: Vec<SmolStr>,
    pub throws: Vec<ThrowSite>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OperatorDecl {
    pub kind: OperatorKind,
    /// Canonical callable name, e.g. `addAssign`.
    pub name: SmolStr,
    /// Explicit operand types (the receiver is implicit).
    pub operands: Vec<ParamDecl>,
    pub returns: TypeRef,
    pub mutates_self: bool,
    pub is_const: bool,
    pub access: Access,
    pub overload_group: OverloadGroupId,
    pub signature: Signature,
    /// Call arities for trailing default operands, e.g. `operator()`.
    pub call_forms: CallForms,
    pub throws: Vec<ThrowSite>,
}

/// The implementation a call on some class dispatches to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectiveMethod {
    pub name: SmolStr,
    pub signature: Signature,
    /// Class that provides the implementation.
    pub defined_in: SmolStr,
    pub returns: TypeRef,
    pub is_virtual: bool,
    pub is_pure_virtual: bool,
    /// Ancestors whose declaration this one hides, most derived first.
    pub overrides: Vec<SmolStr>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionDecl {
    /// Qualified name.
    pub name: SmolStr,
    pub params: Vec<ParamDecl>,
    pub returns: TypeRef,
    pub overload_group: OverloadGroupId,
    pub signature: Signature,
    pub call_forms: CallForms,
    pub throws: Vec<ThrowSite>,
    pub location: SourceLocation,
}

impl FunctionDecl {
    pub fn throw_kinds(&self) -> Vec<ExceptionKind> {
        self.throws.iter().map(|t| t.kind).collect()
    }
}

/// A plain data struct: fields only.
#[derive(Debug, Clone, Serialize)]
pub struct StructDecl {
    pub name: SmolStr,
    pub fields: Vec<FieldDecl>,
    pub location: SourceLocation,
}

impl StructDecl {
    pub fn field(&self, name: &str) -> Option<&FieldDecl> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum EnumScope {
    Free,
    Nested { class: SmolStr },
}

/// A function that renders an enum value as a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionRef {
    /// Owning class for a static method, `None` for a free function.
    pub owner: Option<SmolStr>,
    pub name: SmolStr,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnumDecl {
    /// Qualified name.
    pub name: SmolStr,
    /// `(variant, ordinal)` in declaration order.
    pub variants: Vec<(SmolStr, i64)>,
    pub scope: EnumScope,
    pub stringifier: Option<FunctionRef>,
    pub location: SourceLocation,
}

impl EnumDecl {
    pub fn ordinal(&self, variant: &str) -> Option<i64> {
        self.variants
            .iter()
            .find(|(name, _)| name == variant)
            .map(|(_, ordinal)| *ordinal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_model() -> InterfaceModel {
        InterfaceModel {
            classes: IndexMap::new(),
            enums: IndexMap::new(),
            functions: Vec::new(),
            function_groups: Vec::new(),
            structs: Vec::new(),
            std_features: StdFeatures::default(),
        }
    }

    fn enum_decl(name: &str) -> EnumDecl {
        EnumDecl {
            name: SmolStr::new(name),
            variants: vec![("FIRST".into(), 0), ("SECOND".into(), 4)],
            scope: EnumScope::Free,
            stringifier: None,
            location: SourceLocation::default(),
        }
    }

    #[test]
    fn test_lookup_by_simple_name_requires_uniqueness() {
        let mut model = empty_model();
        model.enums.insert("a::Color".into(), enum_decl("a::Color"));
        assert!(model.enum_decl("Color").is_some());
        assert!(model.enum_decl("a::Color").is_some());

        model.enums.insert("b::Color".into(), enum_decl("b::Color"));
        assert!(model.enum_decl("Color").is_none());
        assert!(model.enum_decl("b::Color").is_some());
    }

    #[test]
    fn test_enum_ordinal() {
        let decl = enum_decl("Color");
        assert_eq!(decl.ordinal("SECOND"), Some(4));
        assert_eq!(decl.ordinal("THIRD"), None);
    }

    #[test]
    fn test_empty_model_serializes() {
        let json = empty_model().to_json().unwrap();
        assert!(json.contains("\"std_features\""));
    }
}
