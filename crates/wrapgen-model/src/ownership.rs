//! Ownership annotation.
//!
//! Pointer, reference and fixed-array fields are classified from what the
//! record's own member bodies do with them:
//!
//! 1. a fixed-size array is inline storage, owned by the object;
//! 2. a field the destructor deletes is owned;
//! 3. a field a method unconditionally assigns a fresh allocation to is
//!    owned, with copy-in-setter semantics;
//! 4. a field a constructor initializes from a pointer or reference
//!    parameter is borrowed.
//!
//! Anything else is reported according to the unclassifiable policy.
//! Methods and free functions returning a pointer to an object they
//! allocate are factories, and their result is owned by the caller.

use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use smol_str::SmolStr;
use wrapgen_config::UnclassifiablePolicy;
use wrapgen_decl::{Expr, RawFunction, RawMemberKind, RawRecord, RawType, Stmt, TypeExpr};

use crate::collect::{FunctionSource, RecordSource};
use crate::error::{ModelError, Sink, Warning};
use crate::model::{ClassDecl, FieldDecl, FunctionDecl, OwnershipEvidence, OwnershipInfo, ParamDecl, StructDecl};
use crate::overload::Signature;
use crate::scope::{enclosing_scope, simple_name, split_qualified, SymbolTable};
use crate::types::{Ownership, TypeRef, TypeResolver};

pub(crate) struct OwnershipAnnotator<'a> {
    resolver: TypeResolver<'a>,
    policy: UnclassifiablePolicy,
}

/// Result of analysing one class, applied after all classes are analysed.
struct ClassFindings {
    fields: Vec<(usize, Option<OwnershipInfo>)>,
    releases: Vec<SmolStr>,
    /// Indices of factory methods.
    factories: Vec<usize>,
}

impl<'a> OwnershipAnnotator<'a> {
    pub fn new(table: &'a SymbolTable, policy: UnclassifiablePolicy) -> Self {
        Self {
            resolver: TypeResolver::new(table),
            policy,
        }
    }

    pub fn annotate_classes(
        &self,
        classes: &mut IndexMap<SmolStr, ClassDecl>,
        records: &IndexMap<SmolStr, RecordSource<'_>>,
        sink: &mut Sink,
    ) {
        let mut findings = Vec::new();
        for (name, class) in classes.iter() {
            let Some(source) = records.get(name) else {
                continue;
            };
            let record = source.record;
            let evidence = BodyEvidence::gather(name, record, &class.fields);

            let mut fields = Vec::new();
            for (i, field) in class.fields.iter().enumerate() {
                if let Some(info) = self.classify_field(name, field, &evidence, sink) {
                    fields.push((i, info));
                }
            }

            let scope = split_qualified(name);
            let mut factories = Vec::new();
            for (i, method) in class.methods.iter().enumerate() {
                let factory = format!("{}::{}", name, method.name);
                let raw = record.members.iter().find_map(|m| match &m.kind {
                    RawMemberKind::Function(f)
                        if m.name == method.name.as_str()
                            && self.signature_of(f, f.is_const, &scope, &factory).as_ref()
                                == Some(&method.signature) =>
                    {
                        Some(f)
                    }
                    _ => None,
                });
                let Some(raw) = raw else {
                    continue;
                };
                if self.check_factory(&factory, &method.returns, raw, &scope, classes, sink) {
                    factories.push(i);
                }
            }

            findings.push((
                name.clone(),
                ClassFindings {
                    fields,
                    releases: evidence.released.iter().cloned().collect(),
                    factories,
                },
            ));
        }

        let mut annotated = 0usize;
        for (name, found) in findings {
            let Some(class) = classes.get_mut(&name) else {
                continue;
            };
            for (i, info) in found.fields {
                let field = &mut class.fields[i];
                if let Some(info) = info {
                    field.ty.ownership = Some(info.ownership);
                    field.ownership = Some(info);
                    annotated += 1;
                }
            }
            if let Some(dtor) = class.destructor.as_mut() {
                let mut releases = found.releases;
                releases.sort_by_key(|f| class.fields.iter().position(|d| &d.name == f));
                dtor.releases = releases;
            }
            for i in found.factories {
                class.methods[i].returns.ownership = Some(Ownership::OwnedTransferred);
            }
            for method in &mut class.methods {
                mark_borrowed_params(&mut method.params);
            }
            for ctor in &mut class.constructors {
                mark_borrowed_params(&mut ctor.params);
            }
            for op in &mut class.operators {
                mark_borrowed_params(&mut op.operands);
            }
        }
        sync_effective_returns(classes);
        tracing::debug!(fields = annotated, "annotated class field ownership");
    }

    pub fn annotate_structs(&self, structs: &mut [StructDecl], sink: &mut Sink) {
        let evidence = BodyEvidence::default();
        for decl in structs.iter_mut() {
            let mut infos = Vec::new();
            for field in &decl.fields {
                infos.push(self.classify_field(&decl.name, field, &evidence, sink));
            }
            for (field, info) in decl.fields.iter_mut().zip(infos) {
                if let Some(Some(info)) = info {
                    field.ty.ownership = Some(info.ownership);
                    field.ownership = Some(info);
                }
            }
        }
    }

    pub fn annotate_functions(
        &self,
        functions: &mut [FunctionDecl],
        sources: &[FunctionSource<'_>],
        classes: &IndexMap<SmolStr, ClassDecl>,
        sink: &mut Sink,
    ) {
        for function in functions.iter_mut() {
            let scope = enclosing_scope(&function.name);
            let raw = sources
                .iter()
                .find(|s| {
                    s.name == function.name
                        && self.signature_of(s.function, false, &scope, &s.name).as_ref()
                            == Some(&function.signature)
                })
                .map(|s| s.function);
            if let Some(raw) = raw {
                if self.check_factory(&function.name, &function.returns, raw, &scope, classes, sink) {
                    function.returns.ownership = Some(Ownership::OwnedTransferred);
                }
            }
            mark_borrowed_params(&mut function.params);
        }
    }

    /// Resolved signature of a raw declaration, `None` if a parameter type
    /// does not resolve.
    fn signature_of(
        &self,
        raw: &RawFunction,
        is_const: bool,
        scope: &[String],
        owner: &str,
    ) -> Option<Signature> {
        let params = raw
            .params
            .iter()
            .map(|p| self.resolver.resolve(&p.ty, scope, owner).ok())
            .collect::<Option<Vec<_>>>()?;
        Some(Signature::of(&params, is_const))
    }

    /// `None` for fields that need no classification; `Some(None)` for a
    /// field that could not be classified.
    fn classify_field(
        &self,
        class: &SmolStr,
        field: &FieldDecl,
        evidence: &BodyEvidence,
        sink: &mut Sink,
    ) -> Option<Option<OwnershipInfo>> {
        if field.ty.is_fixed_array() {
            return Some(Some(OwnershipInfo {
                ownership: Ownership::Owned,
                evidence: OwnershipEvidence::InlineStorage,
                copy_in_setters: Vec::new(),
            }));
        }
        if !field.ty.is_indirect() {
            return None;
        }

        let copy_in_setters: Vec<SmolStr> = evidence
            .copy_in
            .iter()
            .filter(|(f, _)| *f == field.name)
            .map(|(_, setter)| setter.clone())
            .collect();
        if evidence.released.contains(&field.name) {
            return Some(Some(OwnershipInfo {
                ownership: Ownership::Owned,
                evidence: OwnershipEvidence::ReleasedInDestructor,
                copy_in_setters,
            }));
        }
        if !copy_in_setters.is_empty() {
            return Some(Some(OwnershipInfo {
                ownership: Ownership::Owned,
                evidence: OwnershipEvidence::CopyInSetter,
                copy_in_setters,
            }));
        }
        if let Some((_, param)) = evidence.stored.iter().find(|(f, _)| *f == field.name) {
            return Some(Some(OwnershipInfo {
                ownership: Ownership::Borrowed,
                evidence: OwnershipEvidence::StoredParameter {
                    constructor_param: param.clone(),
                },
                copy_in_setters: Vec::new(),
            }));
        }

        match self.policy {
            UnclassifiablePolicy::Error => sink.error(ModelError::UnclassifiableOwnership {
                class: class.clone(),
                field: field.name.clone(),
            }),
            UnclassifiablePolicy::Warn => sink.warn(Warning::UnclassifiedOwnership {
                class: class.clone(),
                field: field.name.clone(),
            }),
        }
        Some(None)
    }

    /// Whether `raw` is a factory: it returns a pointer and its body
    /// returns a fresh allocation. Warns when a derived object is handed
    /// out through a base without a virtual destructor.
    fn check_factory(
        &self,
        factory: &str,
        returns: &TypeRef,
        raw: &RawFunction,
        scope: &[String],
        classes: &IndexMap<SmolStr, ClassDecl>,
        sink: &mut Sink,
    ) -> bool {
        if !returns.qualifiers.is_pointer {
            return false;
        }
        let Some(body) = &raw.body else {
            return false;
        };
        let Some(allocated) = returned_allocation(body) else {
            return false;
        };

        if let (Some(base), Expr::New { ty, array_len: None, .. }) = (returns.record_name(), allocated) {
            let derived = self
                .resolver
                .resolve(ty, scope, factory)
                .ok()
                .and_then(|t| t.record_name().cloned());
            if let Some(derived) = derived {
                let base_is_safe = classes
                    .get(base)
                    .map(|c| c.has_virtual_destructor)
                    .unwrap_or(false);
                if &derived != base && !base_is_safe {
                    sink.warn(Warning::UnsafeDestruction {
                        factory: factory.to_string(),
                        base: base.clone(),
                        derived,
                    });
                }
            }
        }
        true
    }
}

/// What the member bodies of one record do with its fields.
#[derive(Debug, Default)]
struct BodyEvidence {
    /// Fields deleted by the destructor.
    released: FxHashSet<SmolStr>,
    /// (field, method) pairs of unconditional fresh allocations.
    copy_in: Vec<(SmolStr, SmolStr)>,
    /// (field, parameter) pairs a constructor stores directly.
    stored: Vec<(SmolStr, SmolStr)>,
}

impl BodyEvidence {
    fn gather(class: &str, record: &RawRecord, fields: &[FieldDecl]) -> Self {
        let field_names: FxHashSet<&str> = fields.iter().map(|f| f.name.as_str()).collect();
        let mut evidence = BodyEvidence::default();

        for member in &record.members {
            let RawMemberKind::Function(function) = &member.kind else {
                continue;
            };
            let params: FxHashSet<&str> = function.params.iter().map(|p| p.name.as_str()).collect();
            let refs = MemberRefs {
                fields: &field_names,
                params: &params,
            };
            let body = function.body.as_deref().unwrap_or_default();

            if member.name.starts_with('~') {
                for stmt in body {
                    stmt.walk(&mut |stmt| {
                        if let Stmt::Delete { target, .. } = stmt {
                            if let Some(field) = refs.field(target) {
                                evidence.released.insert(SmolStr::new(field));
                            }
                        }
                    });
                }
            } else if member.name == simple_name(class) && function.return_type.is_none() {
                // Constructor.
                let indirect: FxHashSet<&str> = function
                    .params
                    .iter()
                    .filter(|p| is_indirect_syntax(&p.ty))
                    .map(|p| p.name.as_str())
                    .collect();
                let stored_param = |value: &Expr| match value {
                    Expr::Ident { name } if indirect.contains(name.as_str()) => Some(SmolStr::new(name)),
                    _ => None,
                };
                for init in &function.member_inits {
                    if field_names.contains(init.member.as_str()) {
                        if let Some(param) = stored_param(&init.value) {
                            evidence.stored.push((SmolStr::new(&init.member), param));
                        }
                    }
                }
                for (target, value) in unconditional_assignments(body) {
                    if let (Some(field), Some(param)) = (refs.field(target), stored_param(value)) {
                        evidence.stored.push((SmolStr::new(field), param));
                    }
                }
            } else {
                for (target, value) in unconditional_assignments(body) {
                    if let (Some(field), Expr::New { .. }) = (refs.field(target), value) {
                        let entry = (SmolStr::new(field), SmolStr::new(&member.name));
                        if !evidence.copy_in.contains(&entry) {
                            evidence.copy_in.push(entry);
                        }
                    }
                }
            }
        }
        evidence
    }
}

struct MemberRefs<'r> {
    fields: &'r FxHashSet<&'r str>,
    params: &'r FxHashSet<&'r str>,
}

impl MemberRefs<'_> {
    /// The field an expression names: `this->f`, or a bare `f` not
    /// shadowed by a parameter.
    fn field<'e>(&self, expr: &'e Expr) -> Option<&'e str> {
        match expr {
            Expr::Member { base, name } if matches!(**base, Expr::This) => {
                self.fields.contains(name.as_str()).then_some(name.as_str())
            }
            Expr::Ident { name }
                if !self.params.contains(name.as_str()) && self.fields.contains(name.as_str()) =>
            {
                Some(name.as_str())
            }
            _ => None,
        }
    }
}

/// Assignments executed on every call: top level, or inside plain blocks.
fn unconditional_assignments(body: &[Stmt]) -> Vec<(&Expr, &Expr)> {
    let mut out = Vec::new();
    for stmt in body {
        match stmt {
            Stmt::Expr {
                expr: Expr::Assign { target, value },
            } => out.push((target.as_ref(), value.as_ref())),
            Stmt::Block { stmts } => out.extend(unconditional_assignments(stmts)),
            _ => {}
        }
    }
    out
}

/// The first `return new ...` expression anywhere in the body.
fn returned_allocation(body: &[Stmt]) -> Option<&Expr> {
    let mut found = None;
    for stmt in body {
        stmt.walk(&mut |stmt| {
            if let Stmt::Return {
                value: Some(value @ Expr::New { .. }),
            } = stmt
            {
                found.get_or_insert(value);
            }
        });
    }
    found
}

fn is_indirect_syntax(ty: &RawType) -> bool {
    let mut expr = match ty.to_expr() {
        Ok(expr) => expr,
        Err(_) => return false,
    };
    while let TypeExpr::Const { inner } = expr {
        expr = *inner;
    }
    matches!(expr, TypeExpr::Pointer { .. } | TypeExpr::Reference { .. })
}

fn mark_borrowed_params(params: &mut [ParamDecl]) {
    for param in params {
        if param.ty.is_indirect() && param.ty.ownership.is_none() {
            param.ty.ownership = Some(Ownership::Borrowed);
        }
    }
}

/// Copy annotated return types into the override tables that were
/// computed before annotation.
fn sync_effective_returns(classes: &mut IndexMap<SmolStr, ClassDecl>) {
    let mut updates = Vec::new();
    for (ci, class) in classes.values().enumerate() {
        for (ei, effective) in class.overrides.iter().enumerate() {
            let source = classes.get(&effective.defined_in).and_then(|owner| {
                owner
                    .methods
                    .iter()
                    .find(|m| m.name == effective.name && m.signature == effective.signature)
            });
            if let Some(method) = source {
                if method.returns != effective.returns {
                    updates.push((ci, ei, method.returns.clone()));
                }
            }
        }
    }
    for (ci, ei, returns) in updates {
        if let Some((_, class)) = classes.get_index_mut(ci) {
            class.overrides[ei].returns = returns;
        }
    }
}
