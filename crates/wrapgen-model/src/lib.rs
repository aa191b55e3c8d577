//! Interface semantic model builder for C++ binding generators.
//!
//! Takes already parsed C++ declarations ([`wrapgen_decl::DeclUnit`]) and
//! produces a frozen, language-agnostic [`InterfaceModel`]: every class,
//! struct, enum and free function, with types resolved, inheritance
//! linearized, operators normalized, default arguments expanded, ownership
//! classified and throw sites mapped to a closed error taxonomy.
//!
//! # Architecture
//!
//! ```text
//! DeclUnit → collect → inheritance graph → classify members
//!          → override table → ownership → enums → InterfaceModel
//! ```
//!
//! Every stage reports into one error collector, so a failed build lists
//! all independently detectable errors at once.
//!
//! # Example
//!
//! ```
//! use wrapgen_decl::{DeclUnit, RawDecl, RawFunction, RawRecord};
//! use wrapgen_model::ModelBuilder;
//!
//! let unit = DeclUnit::new().with(RawDecl::class(
//!     "Counter",
//!     RawRecord::new()
//!         .field("count", "int")
//!         .method("add", RawFunction::returning("void").param_default("n", "int", "1")),
//! ));
//!
//! let output = ModelBuilder::new().build(&unit).unwrap();
//! let add = output.model.class("Counter").unwrap().method("add").unwrap();
//! assert!(add.call_forms.accepts(0));
//! ```

mod builder;
mod classify;
mod collect;
mod defaults;
mod error;
mod exceptions;
mod inherit;
mod model;
mod operators;
mod overload;
mod ownership;
mod scope;
mod types;

pub use builder::{BuildOutput, ModelBuilder};
pub use defaults::{CallForm, CallForms, Coercion, DefaultValue, LiteralKind};
pub use error::{BuildFailure, ModelError, Warning};
pub use exceptions::{ExceptionKind, ThrowSite};
pub use model::{
    BaseRef, ClassDecl, ClassId, ConstructorDecl, ConstructorKind, DestructorDecl,
    EffectiveMethod, EnumDecl, EnumScope, FieldDecl, FunctionDecl, FunctionRef, InterfaceModel,
    MethodDecl, OperatorDecl, OwnershipEvidence, OwnershipInfo, ParamDecl, RecordKind,
    StdFeatures, StructDecl,
};
pub use operators::{OperatorCategory, OperatorKind};
pub use overload::{OverloadGroup, OverloadGroupId, Signature};
pub use types::{Ownership, Primitive, Qualifiers, TypeKind, TypeRef};

pub use wrapgen_config::{DefaultArgStrategy, ModelConfig, UnclassifiablePolicy};

/// Build a model with the given configuration.
pub fn build_model(unit: &wrapgen_decl::DeclUnit, config: &ModelConfig) -> Result<BuildOutput, BuildFailure> {
    ModelBuilder::with_config(config.clone()).build(unit)
}
