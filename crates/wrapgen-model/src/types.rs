//! Canonical type descriptors and the type resolver.

use crate::error::ModelError;
use crate::scope::{SymbolKind, SymbolTable};
use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use serde::Serialize;
use smol_str::SmolStr;
use std::fmt;
use wrapgen_decl::{ArrayBound, RawType, TypeExpr};

/// C++ builtin scalar types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Primitive {
    Void,
    Bool,
    Char,
    SChar,
    UChar,
    WChar,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    LongLong,
    ULongLong,
    Float,
    Double,
    LongDouble,
    SizeT,
    PtrDiffT,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
}

impl Primitive {
    /// Map a builtin spelling (already stripped of `std::`) to a primitive.
    pub fn from_spelling(name: &str) -> Option<Self> {
        let p = match name {
            "void" => Primitive::Void,
            "bool" => Primitive::Bool,
            "char" => Primitive::Char,
            "signed char" => Primitive::SChar,
            "unsigned char" => Primitive::UChar,
            "wchar_t" => Primitive::WChar,
            "short" | "short int" | "signed short" | "signed short int" => Primitive::Short,
            "unsigned short" | "unsigned short int" => Primitive::UShort,
            "int" | "signed" | "signed int" => Primitive::Int,
            "unsigned" | "unsigned int" => Primitive::UInt,
            "long" | "long int" | "signed long" | "signed long int" => Primitive::Long,
            "unsigned long" | "unsigned long int" => Primitive::ULong,
            "long long" | "long long int" | "signed long long" => Primitive::LongLong,
            "unsigned long long" | "unsigned long long int" => Primitive::ULongLong,
            "float" => Primitive::Float,
            "double" => Primitive::Double,
            "long double" => Primitive::LongDouble,
            "size_t" => Primitive::SizeT,
            "ptrdiff_t" => Primitive::PtrDiffT,
            "int8_t" => Primitive::I8,
            "int16_t" => Primitive::I16,
            "int32_t" => Primitive::I32,
            "int64_t" => Primitive::I64,
            "uint8_t" => Primitive::U8,
            "uint16_t" => Primitive::U16,
            "uint32_t" => Primitive::U32,
            "uint64_t" => Primitive::U64,
            _ => return None,
        };
        Some(p)
    }

    pub fn spelling(self) -> &'static str {
        match self {
            Primitive::Void => "void",
            Primitive::Bool => "bool",
            Primitive::Char => "char",
            Primitive::SChar => "signed char",
            Primitive::UChar => "unsigned char",
            Primitive::WChar => "wchar_t",
            Primitive::Short => "short",
            Primitive::UShort => "unsigned short",
            Primitive::Int => "int",
            Primitive::UInt => "unsigned int",
            Primitive::Long => "long",
            Primitive::ULong => "unsigned long",
            Primitive::LongLong => "long long",
            Primitive::ULongLong => "unsigned long long",
            Primitive::Float => "float",
            Primitive::Double => "double",
            Primitive::LongDouble => "long double",
            Primitive::SizeT => "size_t",
            Primitive::PtrDiffT => "ptrdiff_t",
            Primitive::I8 => "int8_t",
            Primitive::I16 => "int16_t",
            Primitive::I32 => "int32_t",
            Primitive::I64 => "int64_t",
            Primitive::U8 => "uint8_t",
            Primitive::U16 => "uint16_t",
            Primitive::U32 => "uint32_t",
            Primitive::U64 => "uint64_t",
        }
    }

    pub fn is_floating(self) -> bool {
        matches!(
            self,
            Primitive::Float | Primitive::Double | Primitive::LongDouble
        )
    }

    pub fn is_integral(self) -> bool {
        !self.is_floating() && !matches!(self, Primitive::Void | Primitive::Bool)
    }
}

/// Who is responsible for releasing a referenced value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Ownership {
    /// The holder releases it.
    Owned,
    /// Ownership passes to the caller of a factory.
    OwnedTransferred,
    /// Lifetime is the caller's responsibility.
    Borrowed,
    /// Reference counted. Reserved; no heuristic produces it yet.
    Shared,
}

/// The shape of a resolved type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeKind {
    Primitive { primitive: Primitive },
    String,
    Sequence { element: Box<TypeRef> },
    FixedArray { element: Box<TypeRef>, len: u64 },
    Struct { name: SmolStr },
    Class { name: SmolStr },
    Enum { name: SmolStr },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Qualifiers {
    pub is_const: bool,
    pub is_reference: bool,
    pub is_pointer: bool,
}

/// A canonical type descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TypeRef {
    pub kind: TypeKind,
    pub qualifiers: Qualifiers,
    /// Unset until the ownership annotator runs.
    pub ownership: Option<Ownership>,
}

impl TypeRef {
    pub fn new(kind: TypeKind) -> Self {
        Self {
            kind,
            qualifiers: Qualifiers::default(),
            ownership: None,
        }
    }

    pub fn primitive(primitive: Primitive) -> Self {
        Self::new(TypeKind::Primitive { primitive })
    }

    pub fn void() -> Self {
        Self::primitive(Primitive::Void)
    }

    pub fn string() -> Self {
        Self::new(TypeKind::String)
    }

    pub fn sequence(element: TypeRef) -> Self {
        Self::new(TypeKind::Sequence {
            element: Box::new(element),
        })
    }

    pub fn class(name: &str) -> Self {
        Self::new(TypeKind::Class {
            name: SmolStr::new(name),
        })
    }

    pub fn as_primitive(&self) -> Option<Primitive> {
        match self.kind {
            TypeKind::Primitive { primitive } => Some(primitive),
            _ => None,
        }
    }

    pub fn is_void(&self) -> bool {
        self.as_primitive() == Some(Primitive::Void) && !self.is_indirect()
    }

    /// Pointer or reference.
    pub fn is_indirect(&self) -> bool {
        self.qualifiers.is_pointer || self.qualifiers.is_reference
    }

    pub fn is_fixed_array(&self) -> bool {
        matches!(self.kind, TypeKind::FixedArray { .. })
    }

    /// The class or struct named by this type, looking through qualifiers.
    pub fn record_name(&self) -> Option<&SmolStr> {
        match &self.kind {
            TypeKind::Class { name } | TypeKind::Struct { name } => Some(name),
            _ => None,
        }
    }

    pub fn enum_name(&self) -> Option<&SmolStr> {
        match &self.kind {
            TypeKind::Enum { name } => Some(name),
            _ => None,
        }
    }

    /// Whether this uses `std::string` anywhere.
    pub fn mentions_string(&self) -> bool {
        match &self.kind {
            TypeKind::String => true,
            TypeKind::Sequence { element } | TypeKind::FixedArray { element, .. } => {
                element.mentions_string()
            }
            _ => false,
        }
    }

    /// Whether this uses `std::vector` anywhere.
    pub fn mentions_sequence(&self) -> bool {
        match &self.kind {
            TypeKind::Sequence { .. } => true,
            TypeKind::FixedArray { element, .. } => element.mentions_sequence(),
            _ => false,
        }
    }

    /// Records held by value: directly, or as elements of a sequence or a
    /// fixed array. Indirect types hold nothing by value.
    pub fn contained_records(&self) -> Vec<SmolStr> {
        if self.is_indirect() {
            return Vec::new();
        }
        match &self.kind {
            TypeKind::Class { name } | TypeKind::Struct { name } => vec![name.clone()],
            TypeKind::Sequence { element } | TypeKind::FixedArray { element, .. } => {
                element.contained_records()
            }
            _ => Vec::new(),
        }
    }

    /// Canonical spelling, ignoring the ownership hint. Used as the
    /// identity of a parameter type in signatures.
    pub fn canonical(&self) -> SmolStr {
        SmolStr::new(self.to_string())
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeKind::Primitive { primitive } => f.write_str(primitive.spelling()),
            TypeKind::String => f.write_str("std::string"),
            TypeKind::Sequence { element } => write!(f, "std::vector<{}>", element),
            TypeKind::FixedArray { element, len } => write!(f, "{}[{}]", element, len),
            TypeKind::Struct { name } | TypeKind::Class { name } | TypeKind::Enum { name } => {
                f.write_str(name)
            }
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.qualifiers.is_const {
            f.write_str("const ")?;
        }
        write!(f, "{}", self.kind)?;
        if self.qualifiers.is_pointer {
            f.write_str("*")?;
        }
        if self.qualifiers.is_reference {
            f.write_str("&")?;
        }
        Ok(())
    }
}

/// Cycles of by-value containment between records. `edges` maps each
/// record to the records its fields contain by value. Each cycle is
/// reported once, closed (`[A, B, A]`).
pub fn find_value_cycles(edges: &IndexMap<SmolStr, Vec<SmolStr>>) -> Vec<Vec<SmolStr>> {
    fn visit(
        name: &SmolStr,
        edges: &IndexMap<SmolStr, Vec<SmolStr>>,
        stack: &mut Vec<SmolStr>,
        done: &mut FxHashSet<SmolStr>,
        reported: &mut FxHashSet<Vec<SmolStr>>,
        cycles: &mut Vec<Vec<SmolStr>>,
    ) {
        stack.push(name.clone());
        for next in edges.get(name).map(Vec::as_slice).unwrap_or_default() {
            if let Some(start) = stack.iter().position(|s| s == next) {
                let mut cycle = stack[start..].to_vec();
                let mut members = cycle.clone();
                members.sort();
                cycle.push(next.clone());
                if reported.insert(members) {
                    cycles.push(cycle);
                }
            } else if !done.contains(next) {
                visit(next, edges, stack, done, reported, cycles);
            }
        }
        stack.pop();
        done.insert(name.clone());
    }

    let mut stack = Vec::new();
    let mut done = FxHashSet::default();
    let mut reported = FxHashSet::default();
    let mut cycles = Vec::new();
    for name in edges.keys() {
        if !done.contains(name) {
            visit(name, edges, &mut stack, &mut done, &mut reported, &mut cycles);
        }
    }
    cycles
}

/// Resolves raw type tokens against the declared names.
pub struct TypeResolver<'a> {
    table: &'a SymbolTable,
}

impl<'a> TypeResolver<'a> {
    pub fn new(table: &'a SymbolTable) -> Self {
        Self { table }
    }

    /// Resolve a raw type as seen from `scope`.
    ///
    /// `context` names the declaration being resolved and only appears in
    /// error messages.
    pub fn resolve(
        &self,
        raw: &RawType,
        scope: &[String],
        context: &str,
    ) -> Result<TypeRef, ModelError> {
        let expr = raw.to_expr().map_err(|e| ModelError::UnresolvedType {
            symbol: e.spelling,
            context: context.to_string(),
        })?;
        let mut aliases = FxHashSet::default();
        self.resolve_expr(&expr, scope, context, &mut aliases)
    }

    fn resolve_expr(
        &self,
        expr: &TypeExpr,
        scope: &[String],
        context: &str,
        aliases: &mut FxHashSet<SmolStr>,
    ) -> Result<TypeRef, ModelError> {
        match expr {
            TypeExpr::Const { inner } => {
                let mut ty = self.resolve_expr(inner, scope, context, aliases)?;
                // A top-level const on a pointer does not change how the
                // pointee may be used, so only const-of-value is recorded.
                if !ty.qualifiers.is_pointer {
                    ty.qualifiers.is_const = true;
                }
                Ok(ty)
            }
            TypeExpr::Pointer { pointee } => {
                let mut ty = self.resolve_expr(pointee, scope, context, aliases)?;
                if ty.is_indirect() {
                    return Err(self.unresolved(expr, context));
                }
                ty.qualifiers.is_pointer = true;
                Ok(ty)
            }
            TypeExpr::Reference { referent, .. } => {
                let mut ty = self.resolve_expr(referent, scope, context, aliases)?;
                if ty.is_indirect() {
                    return Err(self.unresolved(expr, context));
                }
                ty.qualifiers.is_reference = true;
                Ok(ty)
            }
            TypeExpr::Array { element, bound } => {
                let len = match bound {
                    ArrayBound::Literal(n) if *n > 0 => *n,
                    ArrayBound::Literal(n) => {
                        return Err(ModelError::UnsupportedArrayBound {
                            bound: n.to_string(),
                            context: context.to_string(),
                        })
                    }
                    ArrayBound::Symbolic(s) => {
                        return Err(ModelError::UnsupportedArrayBound {
                            bound: s.clone(),
                            context: context.to_string(),
                        })
                    }
                    ArrayBound::Unsized => {
                        return Err(ModelError::UnsupportedArrayBound {
                            bound: String::new(),
                            context: context.to_string(),
                        })
                    }
                };
                let element = self.resolve_expr(element, scope, context, aliases)?;
                Ok(TypeRef::new(TypeKind::FixedArray {
                    element: Box::new(element),
                    len,
                }))
            }
            TypeExpr::Named { path, args } => {
                self.resolve_named(expr, path, args, scope, context, aliases)
            }
        }
    }

    fn resolve_named(
        &self,
        expr: &TypeExpr,
        path: &[String],
        args: &[TypeExpr],
        scope: &[String],
        context: &str,
        aliases: &mut FxHashSet<SmolStr>,
    ) -> Result<TypeRef, ModelError> {
        // Declared names shadow the standard subset unless spelled with `std::`.
        let declared = if path.first().map(String::as_str) == Some("std") {
            None
        } else {
            self.table.lookup(path, scope)
        };

        if let Some((qualified, kind)) = declared {
            if !args.is_empty() {
                // Template instantiation is not modeled.
                return Err(self.unresolved(expr, context));
            }
            return match kind {
                SymbolKind::Class => Ok(TypeRef::new(TypeKind::Class { name: qualified })),
                SymbolKind::Struct => Ok(TypeRef::new(TypeKind::Struct { name: qualified })),
                SymbolKind::Enum => Ok(TypeRef::new(TypeKind::Enum { name: qualified })),
                SymbolKind::Typedef {
                    underlying,
                    scope: alias_scope,
                } => {
                    if !aliases.insert(qualified.clone()) {
                        let mut cycle: Vec<SmolStr> = aliases.iter().cloned().collect();
                        cycle.sort();
                        cycle.push(qualified);
                        return Err(ModelError::CyclicType { cycle });
                    }
                    let target = underlying.to_expr().map_err(|e| ModelError::UnresolvedType {
                        symbol: e.spelling,
                        context: format!("typedef `{}`", qualified),
                    })?;
                    let resolved = self.resolve_expr(&target, alias_scope, context, aliases);
                    aliases.remove(&qualified);
                    resolved
                }
            };
        }

        let std_path: Vec<&str> = match path.first().map(String::as_str) {
            Some("std") => path[1..].iter().map(String::as_str).collect(),
            _ => path.iter().map(String::as_str).collect(),
        };

        match (std_path.as_slice(), args) {
            ([name], []) => {
                if let Some(p) = Primitive::from_spelling(name) {
                    return Ok(TypeRef::primitive(p));
                }
                if *name == "string" {
                    return Ok(TypeRef::string());
                }
                Err(self.unresolved(expr, context))
            }
            // The optional second argument is the allocator.
            (["vector"], [element]) | (["vector"], [element, _]) => {
                let element = self.resolve_expr(element, scope, context, aliases)?;
                Ok(TypeRef::sequence(element))
            }
            _ => Err(self.unresolved(expr, context)),
        }
    }

    fn unresolved(&self, expr: &TypeExpr, context: &str) -> ModelError {
        ModelError::UnresolvedType {
            symbol: expr.to_string(),
            context: context.to_string(),
        }
    }
}
