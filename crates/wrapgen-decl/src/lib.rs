//! Declaration intake contract for the wrapgen model builder.
//!
//! A C++ front-end (libclang, tree-sitter, or hand-written JSON) hands the
//! builder an ordered [`DeclUnit`]: classes, structs, enums, free functions
//! and typedefs with fully qualified names. Member bodies are reduced to the
//! small statement IR in [`body`], which is all the ownership and exception
//! analyses need.
//!
//! # Architecture
//!
//! ```text
//! Front-end → DeclUnit (this crate) → ModelBuilder → InterfaceModel
//! ```

mod decl;
pub mod body;
mod types;

pub use body::{Expr, Stmt};
pub use decl::{
    Access, DeclUnit, MemberInit, RawBase, RawDecl, RawDeclKind, RawEnum, RawEnumConstant,
    RawFunction, RawMember, RawMemberKind, RawParam, RawRecord, RawType, RawTypedef,
};
pub use types::{ArrayBound, TypeExpr, TypeSyntaxError};
