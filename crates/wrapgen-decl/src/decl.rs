//! Raw declaration nodes.

use crate::body::{Expr, Stmt};
use crate::types::{TypeExpr, TypeSyntaxError};
use serde::{Deserialize, Serialize};
use wrapgen_common::SourceLocation;

/// An ordered sequence of raw declarations from one or more headers.
///
/// Source order is significant: an unnamed struct is named by the typedef
/// that immediately follows it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeclUnit {
    pub decls: Vec<RawDecl>,
}

impl DeclUnit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, decl: RawDecl) {
        self.decls.push(decl);
    }

    pub fn with(mut self, decl: RawDecl) -> Self {
        self.decls.push(decl);
        self
    }

    /// Load a unit serialized by an out-of-process front-end.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// A type reference as supplied by the front-end.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawType {
    /// Spelling as printed by the front-end, e.g. `const A &`.
    Spelling(String),
    /// Already tokenized.
    Expr(TypeExpr),
}

impl RawType {
    pub fn to_expr(&self) -> Result<TypeExpr, TypeSyntaxError> {
        match self {
            RawType::Spelling(s) => TypeExpr::parse(s),
            RawType::Expr(e) => Ok(e.clone()),
        }
    }

    pub fn spelling(&self) -> String {
        match self {
            RawType::Spelling(s) => s.trim().to_string(),
            RawType::Expr(e) => e.to_string(),
        }
    }
}

impl From<&str> for RawType {
    fn from(s: &str) -> Self {
        RawType::Spelling(s.to_string())
    }
}

impl From<String> for RawType {
    fn from(s: String) -> Self {
        RawType::Spelling(s)
    }
}

impl From<TypeExpr> for RawType {
    fn from(e: TypeExpr) -> Self {
        RawType::Expr(e)
    }
}

/// C++ access specifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    #[default]
    Public,
    Protected,
    Private,
}

/// A top-level declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDecl {
    /// Fully qualified name, e.g. `test::A`. Empty for an unnamed struct.
    pub name: String,
    #[serde(flatten)]
    pub kind: RawDeclKind,
    #[serde(default)]
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RawDeclKind {
    Class(RawRecord),
    Struct(RawRecord),
    Enum(RawEnum),
    Function(RawFunction),
    Typedef(RawTypedef),
}

impl RawDecl {
    pub fn class(name: &str, record: RawRecord) -> Self {
        Self::new(name, RawDeclKind::Class(record))
    }

    pub fn structure(name: &str, record: RawRecord) -> Self {
        Self::new(name, RawDeclKind::Struct(record))
    }

    pub fn enumeration(name: &str, constants: &[&str]) -> Self {
        Self::new(name, RawDeclKind::Enum(RawEnum::of(constants)))
    }

    pub fn function(name: &str, function: RawFunction) -> Self {
        Self::new(name, RawDeclKind::Function(function))
    }

    pub fn typedef(name: &str, underlying: impl Into<RawType>) -> Self {
        Self::new(
            name,
            RawDeclKind::Typedef(RawTypedef {
                underlying: underlying.into(),
            }),
        )
    }

    fn new(name: &str, kind: RawDeclKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            location: SourceLocation::default(),
        }
    }

    pub fn at(mut self, location: SourceLocation) -> Self {
        self.location = location;
        self
    }
}

/// Body of a class or struct declaration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Direct bases in declaration order.
    #[serde(default)]
    pub bases: Vec<RawBase>,
    /// Members in declaration order.
    #[serde(default)]
    pub members: Vec<RawMember>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base(mut self, name: &str) -> Self {
        self.bases.push(RawBase {
            name: name.to_string(),
            access: Access::Public,
            is_virtual: false,
        });
        self
    }

    pub fn member(mut self, member: RawMember) -> Self {
        self.members.push(member);
        self
    }

    pub fn field(self, name: &str, ty: impl Into<RawType>) -> Self {
        self.member(RawMember::field(name, ty))
    }

    pub fn method(self, name: &str, function: RawFunction) -> Self {
        self.member(RawMember::function(name, function))
    }
}

/// A C++ base-class specifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawBase {
    pub name: String,
    #[serde(default)]
    pub access: Access,
    #[serde(default)]
    pub is_virtual: bool,
}

/// A class member, not yet classified.
///
/// Constructors and destructors arrive as plain functions; the model
/// builder tells them apart by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMember {
    pub name: String,
    #[serde(default)]
    pub access: Access,
    #[serde(flatten)]
    pub kind: RawMemberKind,
    #[serde(default)]
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "member", rename_all = "snake_case")]
pub enum RawMemberKind {
    Field {
        ty: RawType,
        #[serde(default)]
        is_static: bool,
    },
    Function(RawFunction),
    Enum(RawEnum),
    Typedef(RawTypedef),
}

impl RawMember {
    pub fn field(name: &str, ty: impl Into<RawType>) -> Self {
        Self::new(
            name,
            RawMemberKind::Field {
                ty: ty.into(),
                is_static: false,
            },
        )
    }

    pub fn function(name: &str, function: RawFunction) -> Self {
        Self::new(name, RawMemberKind::Function(function))
    }

    pub fn enumeration(name: &str, constants: &[&str]) -> Self {
        Self::new(name, RawMemberKind::Enum(RawEnum::of(constants)))
    }

    fn new(name: &str, kind: RawMemberKind) -> Self {
        Self {
            name: name.to_string(),
            access: Access::Public,
            kind,
            location: SourceLocation::default(),
        }
    }

    pub fn with_access(mut self, access: Access) -> Self {
        self.access = access;
        self
    }
}

/// A function, method, constructor or destructor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawFunction {
    /// `None` for constructors and destructors.
    #[serde(default)]
    pub return_type: Option<RawType>,
    #[serde(default)]
    pub params: Vec<RawParam>,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub is_virtual: bool,
    #[serde(default)]
    pub is_pure_virtual: bool,
    #[serde(default)]
    pub is_override: bool,
    #[serde(default)]
    pub is_const: bool,
    /// Constructor member initializer list.
    #[serde(default)]
    pub member_inits: Vec<MemberInit>,
    /// `None` for a declaration without a definition.
    #[serde(default)]
    pub body: Option<Vec<Stmt>>,
}

impl RawFunction {
    /// A function returning `return_type`.
    pub fn returning(return_type: impl Into<RawType>) -> Self {
        Self {
            return_type: Some(return_type.into()),
            ..Self::default()
        }
    }

    /// A constructor or destructor (no return type).
    pub fn special() -> Self {
        Self::default()
    }

    pub fn param(mut self, name: &str, ty: impl Into<RawType>) -> Self {
        self.params.push(RawParam {
            name: name.to_string(),
            ty: ty.into(),
            default: None,
        });
        self
    }

    pub fn param_default(mut self, name: &str, ty: impl Into<RawType>, default: &str) -> Self {
        self.params.push(RawParam {
            name: name.to_string(),
            ty: ty.into(),
            default: Some(default.to_string()),
        });
        self
    }

    pub fn virtual_(mut self) -> Self {
        self.is_virtual = true;
        self
    }

    pub fn pure_virtual(mut self) -> Self {
        self.is_virtual = true;
        self.is_pure_virtual = true;
        self
    }

    pub fn static_(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn const_(mut self) -> Self {
        self.is_const = true;
        self
    }

    pub fn init(mut self, member: &str, value: Expr) -> Self {
        self.member_inits.push(MemberInit {
            member: member.to_string(),
            value,
        });
        self
    }

    pub fn body(mut self, stmts: Vec<Stmt>) -> Self {
        self.body = Some(stmts);
        self
    }

    /// Mark as defined with an empty body, e.g. `virtual ~A() {}`.
    pub fn defined(self) -> Self {
        self.body(Vec::new())
    }
}

/// A function parameter. The default argument is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawParam {
    pub name: String,
    pub ty: RawType,
    #[serde(default)]
    pub default: Option<String>,
}

/// One entry of a constructor's member initializer list: `member(value)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberInit {
    pub member: String,
    pub value: Expr,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEnum {
    #[serde(default)]
    pub constants: Vec<RawEnumConstant>,
}

impl RawEnum {
    pub fn of(constants: &[&str]) -> Self {
        Self {
            constants: constants
                .iter()
                .map(|name| RawEnumConstant {
                    name: name.to_string(),
                    value: None,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEnumConstant {
    pub name: String,
    /// Explicit initializer, if any.
    #[serde(default)]
    pub value: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTypedef {
    pub underlying: RawType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders_produce_expected_shape() {
        let decl = RawDecl::class(
            "test::B",
            RawRecord::new()
                .base("A")
                .field("size", "unsigned")
                .method("B", RawFunction::special().param("size", "unsigned").defined()),
        );

        let RawDeclKind::Class(record) = &decl.kind else {
            panic!("expected a class");
        };
        assert_eq!(record.bases[0].name, "A");
        assert_eq!(record.members.len(), 2);
        assert!(matches!(
            &record.members[1].kind,
            RawMemberKind::Function(f) if f.return_type.is_none() && f.body.is_some()
        ));
    }

    #[test]
    fn test_json_round_trip_of_typed_params() {
        let json = r#"{
            "decls": [
                {
                    "name": "print_mystruct_a",
                    "kind": "function",
                    "return_type": "std::string",
                    "params": [
                        {"name": "a", "ty": {"form": "reference", "referent": {"form": "const", "inner": {"form": "named", "path": ["A"]}}}}
                    ]
                },
                {"name": "MyEnum", "kind": "enum", "constants": [{"name": "FIRSTOPTION"}, {"name": "SECONDOPTION", "value": 4}]}
            ]
        }"#;

        let unit = DeclUnit::from_json(json).unwrap();
        assert_eq!(unit.decls.len(), 2);

        let RawDeclKind::Function(f) = &unit.decls[0].kind else {
            panic!("expected a function");
        };
        assert_eq!(f.params[0].ty.spelling(), "const A&");
        assert_eq!(f.return_type, Some(RawType::from("std::string")));

        let RawDeclKind::Enum(e) = &unit.decls[1].kind else {
            panic!("expected an enum");
        };
        assert_eq!(e.constants[1].value, Some(4));
    }
}
