//! Member classification.
//!
//! Sorts the raw members of each record into fields, constructors, the
//! destructor, methods and operators, resolving every type on the way and
//! registering each callable in its owner's overload table.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use wrapgen_config::ModelConfig;
use wrapgen_decl::{RawFunction, RawMember, RawMemberKind, RawParam, RawType};

use crate::collect::{EnumSource, FunctionSource, RecordSource};
use crate::defaults::{CallForms, DefaultValue};
use crate::error::{Sink, Warning};
use crate::exceptions::{throw_sites, ExceptionKind, ThrowSite};
use crate::inherit::InheritanceGraph;
use crate::model::{
    BaseRef, ClassDecl, ClassId, ConstructorDecl, ConstructorKind, DestructorDecl, EnumDecl,
    EnumScope, FieldDecl, FunctionDecl, FunctionRef, MethodDecl, OperatorDecl, ParamDecl,
    StructDecl,
};
use crate::operators::{operator_token, OperatorKind};
use crate::overload::{OverloadGroup, OverloadGroupId, OverloadTable, Signature};
use crate::scope::{enclosing_scope, simple_name, split_qualified, SymbolKind, SymbolTable};
use crate::types::{TypeKind, TypeRef, TypeResolver};

pub(crate) struct Classifier<'a> {
    table: &'a SymbolTable,
    graph: &'a InheritanceGraph,
    config: &'a ModelConfig,
    resolver: TypeResolver<'a>,
}

impl<'a> Classifier<'a> {
    pub fn new(table: &'a SymbolTable, graph: &'a InheritanceGraph, config: &'a ModelConfig) -> Self {
        Self {
            table,
            graph,
            config,
            resolver: TypeResolver::new(table),
        }
    }

    pub fn class(
        &self,
        id: ClassId,
        name: &SmolStr,
        source: &RecordSource<'_>,
        ids: &FxHashMap<SmolStr, ClassId>,
        sink: &mut Sink,
    ) -> ClassDecl {
        let scope = split_qualified(name);
        let node = self.graph.node(name);

        let mut bases = Vec::new();
        for edge in node.map(|n| n.bases.as_slice()).unwrap_or_default() {
            if let Some(&base_id) = ids.get(&edge.name) {
                bases.push(BaseRef {
                    name: edge.name.clone(),
                    id: base_id,
                    access: edge.access,
                    is_virtual: edge.is_virtual,
                });
            }
        }

        let mut decl = ClassDecl {
            id,
            name: name.clone(),
            kind: source.declared_as,
            location: source.location.clone(),
            bases,
            external_bases: node.map(|n| n.external_bases.clone()).unwrap_or_default(),
            linearization: self
                .graph
                .linearization(name)
                .map(<[SmolStr]>::to_vec)
                .unwrap_or_else(|| vec![name.clone()]),
            fields: Vec::new(),
            static_fields: Vec::new(),
            constructors: Vec::new(),
            destructor: None,
            methods: Vec::new(),
            operators: Vec::new(),
            enums: Vec::new(),
            overload_groups: Vec::new(),
            overrides: Vec::new(),
            is_abstract: false,
            has_virtual_destructor: false,
        };

        let mut overloads = OverloadTable::new();
        for member in &source.record.members {
            match &member.kind {
                RawMemberKind::Field { ty, is_static } => {
                    let context = format!("field `{}::{}`", name, member.name);
                    if let Some(ty) = self.resolve(ty, &scope, &context, sink) {
                        let field = FieldDecl {
                            name: SmolStr::new(&member.name),
                            ty,
                            access: member.access,
                            ownership: None,
                        };
                        if *is_static {
                            decl.static_fields.push(field);
                        } else {
                            decl.fields.push(field);
                        }
                    }
                }
                RawMemberKind::Enum(_) => decl
                    .enums
                    .push(SmolStr::new(format!("{}::{}", name, member.name))),
                RawMemberKind::Typedef(_) => {}
                RawMemberKind::Function(function) => {
                    self.member_function(&mut decl, &mut overloads, member, function, &scope, sink)
                }
            }
        }

        // Default expansion needs every declared signature of the class.
        let strategy = self.config.defaults.strategy;
        for ctor in &mut decl.constructors {
            ctor.call_forms = expand_defaults(
                name,
                simple_name(name),
                &ctor.params,
                &ctor.signature,
                &mut overloads,
                strategy,
                sink,
            );
        }
        for method in &mut decl.methods {
            method.call_forms = expand_defaults(
                name,
                &method.name,
                &method.params,
                &method.signature,
                &mut overloads,
                strategy,
                sink,
            );
        }
        for op in &mut decl.operators {
            op.call_forms = expand_defaults(
                name,
                &op.name,
                &op.operands,
                &op.signature,
                &mut overloads,
                strategy,
                sink,
            );
        }
        decl.overload_groups = overloads.into_groups();
        decl
    }

    fn member_function(
        &self,
        decl: &mut ClassDecl,
        overloads: &mut OverloadTable,
        member: &RawMember,
        function: &RawFunction,
        scope: &[String],
        sink: &mut Sink,
    ) {
        let class = decl.name.clone();
        let name = member.name.as_str();
        if self.config.is_method_ignored(&class, name) {
            tracing::debug!(class = %class, method = name, "ignored by configuration");
            return;
        }
        let throws = self.throws(function, scope);

        if name.starts_with('~') {
            if decl.destructor.is_some() {
                sink.warn(Warning::DuplicateDestructor { class });
                return;
            }
            decl.destructor = Some(DestructorDecl {
                is_virtual: function.is_virtual,
                access: member.access,
                releases: Vec::new(),
                throws,
            });
            return;
        }

        let owner = format!("{}::{}", class, name);
        let Some(params) = self.params(&function.params, scope, &owner, sink) else {
            return;
        };
        let signature = Signature::of(params.iter().map(|p| &p.ty), function.is_const);
        let strategy = self.config.defaults.strategy;

        if name == simple_name(&class) && function.return_type.is_none() {
            let Some(group) = register(overloads, &class, name, &signature, sink) else {
                return;
            };
            let kind = match params.as_slice() {
                [] => ConstructorKind::Default,
                [only] if only.ty.qualifiers.is_reference
                    && only.ty.record_name() == Some(&class) =>
                {
                    ConstructorKind::Copy
                }
                _ => ConstructorKind::Other,
            };
            decl.constructors.push(ConstructorDecl {
                kind,
                call_forms: CallForms::expand(&params, strategy, |_| false).0,
                params,
                access: member.access,
                overload_group: group,
                signature,
                throws,
                location: member.location.clone(),
            });
            return;
        }

        let returns = match &function.return_type {
            Some(raw) => {
                let context = format!("return type of `{}`", owner);
                match self.resolve(raw, scope, &context, sink) {
                    Some(ty) => ty,
                    None => return,
                }
            }
            None => TypeRef::void(),
        };

        if let Some(token) = operator_token(name) {
            let Some(kind) = OperatorKind::from_token(token, params.len()) else {
                sink.warn(Warning::UnsupportedOperator {
                    class,
                    token: token.to_string(),
                });
                return;
            };
            let Some(group) = register(overloads, &class, kind.canonical_name(), &signature, sink)
            else {
                return;
            };
            decl.operators.push(OperatorDecl {
                kind,
                name: SmolStr::new(kind.canonical_name()),
                call_forms: CallForms::expand(&params, strategy, |_| false).0,
                operands: params,
                returns,
                mutates_self: kind.mutates_self(),
                is_const: function.is_const,
                access: member.access,
                overload_group: group,
                signature,
                throws,
            });
            return;
        }

        let Some(group) = register(overloads, &class, name, &signature, sink) else {
            return;
        };
        decl.methods.push(MethodDecl {
            name: SmolStr::new(name),
            call_forms: CallForms::expand(&params, strategy, |_| false).0,
            params,
            returns,
            access: member.access,
            is_static: function.is_static,
            is_const: function.is_const,
            is_virtual: function.is_virtual || function.is_pure_virtual,
            is_override: function.is_override,
            is_pure_virtual: function.is_pure_virtual,
            overload_group: group,
            signature,
            throws,
            location: member.location.clone(),
        });
    }

    /// A record with no member functions.
    pub fn structure(&self, name: &SmolStr, source: &RecordSource<'_>, sink: &mut Sink) -> StructDecl {
        let scope = split_qualified(name);
        let mut fields = Vec::new();
        for member in &source.record.members {
            if let RawMemberKind::Field {
                ty,
                is_static: false,
            } = &member.kind
            {
                let context = format!("field `{}::{}`", name, member.name);
                if let Some(ty) = self.resolve(ty, &scope, &context, sink) {
                    fields.push(FieldDecl {
                        name: SmolStr::new(&member.name),
                        ty,
                        access: member.access,
                        ownership: None,
                    });
                }
            }
        }
        StructDecl {
            name: name.clone(),
            fields,
            location: source.location.clone(),
        }
    }

    pub fn functions(
        &self,
        sources: &[FunctionSource<'_>],
        sink: &mut Sink,
    ) -> (Vec<FunctionDecl>, Vec<OverloadGroup>) {
        let mut overloads = OverloadTable::new();
        let mut functions = Vec::new();
        let owner = SmolStr::new("<global>");
        for source in sources {
            let scope = enclosing_scope(&source.name);
            let function = source.function;
            let Some(params) = self.params(&function.params, &scope, &source.name, sink) else {
                continue;
            };
            let returns = match &function.return_type {
                Some(raw) => {
                    let context = format!("return type of `{}`", source.name);
                    match self.resolve(raw, &scope, &context, sink) {
                        Some(ty) => ty,
                        None => continue,
                    }
                }
                None => TypeRef::void(),
            };
            let signature = Signature::of(params.iter().map(|p| &p.ty), false);
            let Some(group) = register(&mut overloads, &owner, &source.name, &signature, sink) else {
                continue;
            };
            functions.push(FunctionDecl {
                name: source.name.clone(),
                call_forms: CallForms::expand(&params, self.config.defaults.strategy, |_| false).0,
                params,
                returns,
                overload_group: group,
                signature,
                throws: self.throws(function, &scope),
                location: source.location.clone(),
            });
        }
        for function in &mut functions {
            function.call_forms = expand_defaults(
                &owner,
                &function.name,
                &function.params,
                &function.signature,
                &mut overloads,
                self.config.defaults.strategy,
                sink,
            );
        }
        (functions, overloads.into_groups())
    }

    /// Build enum declarations and attach stringifiers.
    pub fn enums(
        &self,
        sources: &[EnumSource<'_>],
        classes: &IndexMap<SmolStr, ClassDecl>,
        functions: &[FunctionDecl],
    ) -> IndexMap<SmolStr, EnumDecl> {
        let mut enums = IndexMap::new();
        for source in sources {
            let mut next = 0i64;
            let variants = source
                .raw
                .constants
                .iter()
                .map(|c| {
                    let ordinal = c.value.unwrap_or(next);
                    next = ordinal.wrapping_add(1);
                    (SmolStr::new(&c.name), ordinal)
                })
                .collect();

            let stringifier = match &source.scope {
                EnumScope::Free => functions
                    .iter()
                    .find(|f| is_stringifier(&f.params, &f.returns, &source.name))
                    .map(|f| FunctionRef {
                        owner: None,
                        name: f.name.clone(),
                    }),
                EnumScope::Nested { class } => classes.get(class).and_then(|decl| {
                    decl.methods
                        .iter()
                        .find(|m| m.is_static && is_stringifier(&m.params, &m.returns, &source.name))
                        .map(|m| FunctionRef {
                            owner: Some(class.clone()),
                            name: m.name.clone(),
                        })
                }),
            };

            enums.insert(
                source.name.clone(),
                EnumDecl {
                    name: source.name.clone(),
                    variants,
                    scope: source.scope.clone(),
                    stringifier,
                    location: source.location.clone(),
                },
            );
        }
        enums
    }

    fn resolve(&self, raw: &RawType, scope: &[String], context: &str, sink: &mut Sink) -> Option<TypeRef> {
        match self.resolver.resolve(raw, scope, context) {
            Ok(ty) => Some(ty),
            Err(err) => {
                sink.error(err);
                None
            }
        }
    }

    /// Resolve every parameter, reporting each failure. `None` if any failed.
    fn params(
        &self,
        raw: &[RawParam],
        scope: &[String],
        owner: &str,
        sink: &mut Sink,
    ) -> Option<Vec<ParamDecl>> {
        let mut params = Vec::with_capacity(raw.len());
        let mut complete = true;
        for param in raw {
            let context = format!("parameter `{}` of `{}`", param.name, owner);
            match self.resolve(&param.ty, scope, &context, sink) {
                Some(ty) => params.push(ParamDecl {
                    name: SmolStr::new(&param.name),
                    default: param.default.as_deref().map(|d| DefaultValue::new(d, &ty)),
                    ty,
                }),
                None => complete = false,
            }
        }
        complete.then_some(params)
    }

    fn throws(&self, function: &RawFunction, scope: &[String]) -> Vec<ThrowSite> {
        match &function.body {
            Some(body) => throw_sites(body, |name| self.custom_exception(name, scope)),
            None => Vec::new(),
        }
    }

    /// Kind of a thrown model class that derives from a standard exception.
    fn custom_exception(&self, name: &str, scope: &[String]) -> Option<ExceptionKind> {
        match self.table.lookup_name(name, scope)? {
            (qualified, SymbolKind::Class) => self.graph.std_exception_kind(&qualified),
            _ => None,
        }
    }
}

fn is_stringifier(params: &[ParamDecl], returns: &TypeRef, enum_name: &str) -> bool {
    matches!(params, [only] if only.ty.enum_name().map(SmolStr::as_str) == Some(enum_name))
        && returns.kind == TypeKind::String
        && !returns.qualifiers.is_pointer
}

fn register(
    overloads: &mut OverloadTable,
    owner: &SmolStr,
    name: &str,
    signature: &Signature,
    sink: &mut Sink,
) -> Option<OverloadGroupId> {
    let group = overloads.register(name, signature.clone());
    if group.is_none() {
        sink.warn(Warning::DuplicateOverload {
            owner: owner.clone(),
            name: SmolStr::new(name),
            signature: signature.to_string(),
        });
    }
    group
}

fn expand_defaults(
    owner: &SmolStr,
    name: &str,
    params: &[ParamDecl],
    signature: &Signature,
    overloads: &mut OverloadTable,
    strategy: wrapgen_config::DefaultArgStrategy,
    sink: &mut Sink,
) -> CallForms {
    let (forms, pruned) = CallForms::expand(params, strategy, |arity| {
        !overloads.claim_form(name, signature.prefix(arity))
    });
    for arity in pruned {
        sink.warn(Warning::DuplicateOverload {
            owner: owner.clone(),
            name: SmolStr::new(name),
            signature: signature.prefix(arity).to_string(),
        });
    }
    forms
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::collect;
    use wrapgen_decl::{DeclUnit, RawDecl, RawRecord};

    struct Classified {
        classes: IndexMap<SmolStr, ClassDecl>,
        functions: Vec<FunctionDecl>,
        enums: IndexMap<SmolStr, EnumDecl>,
        sink: Sink,
    }

    fn classify(unit: &DeclUnit, config: &ModelConfig) -> Classified {
        let collected = collect(unit, config);
        let mut sink = Sink::default();
        let graph = InheritanceGraph::build(
            collected.classes().map(|(name, source)| (name, source.record)),
            &collected.table,
            &mut sink,
        );
        let classifier = Classifier::new(&collected.table, &graph, config);
        let ids: FxHashMap<SmolStr, ClassId> = collected
            .classes()
            .enumerate()
            .map(|(i, (name, _))| (name.clone(), ClassId(i as u32)))
            .collect();
        let mut classes = IndexMap::new();
        for (name, source) in collected.classes() {
            let decl = classifier.class(ids[name], name, source, &ids, &mut sink);
            classes.insert(name.clone(), decl);
        }
        let (functions, _) = classifier.functions(&collected.functions, &mut sink);
        let enums = classifier.enums(&collected.enums, &classes, &functions);
        Classified {
            classes,
            functions,
            enums,
            sink,
        }
    }

    fn static_field(name: &str, ty: &str) -> RawMember {
        let mut member = RawMember::field(name, ty);
        if let RawMemberKind::Field { is_static, .. } = &mut member.kind {
            *is_static = true;
        }
        member
    }

    #[test]
    fn test_constructor_kinds() {
        let unit = DeclUnit::new().with(RawDecl::class(
            "Widget",
            RawRecord::new()
                .member(RawMember::function("Widget", RawFunction::special()))
                .member(RawMember::function(
                    "Widget",
                    RawFunction::special().param("other", "const Widget&"),
                ))
                .member(RawMember::function(
                    "Widget",
                    RawFunction::special().param("size", "int"),
                ))
                .member(RawMember::function(
                    "Widget",
                    RawFunction::special()
                        .param("a", "const Widget&")
                        .param("b", "const Widget&"),
                )),
        ));

        let out = classify(&unit, &ModelConfig::default());
        let widget = &out.classes["Widget"];
        let kinds: Vec<_> = widget.constructors.iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ConstructorKind::Default,
                ConstructorKind::Copy,
                ConstructorKind::Other,
                ConstructorKind::Other,
            ]
        );
        assert!(widget.methods.is_empty());
        let group = widget.constructors[0].overload_group;
        assert!(widget.constructors.iter().all(|c| c.overload_group == group));
    }

    #[test]
    fn test_method_without_return_type_named_differently_is_not_a_constructor() {
        let unit = DeclUnit::new().with(RawDecl::class(
            "Widget",
            RawRecord::new().member(RawMember::function(
                "reset",
                RawFunction::special().param("size", "int"),
            )),
        ));

        let out = classify(&unit, &ModelConfig::default());
        let widget = &out.classes["Widget"];
        assert!(widget.constructors.is_empty());
        let reset = widget.method("reset").unwrap();
        assert!(reset.returns.is_void());
    }

    #[test]
    fn test_static_fields_are_kept_apart() {
        let unit = DeclUnit::new().with(RawDecl::class(
            "Counter",
            RawRecord::new()
                .field("value", "int")
                .member(static_field("instances", "unsigned int"))
                .method("get", RawFunction::returning("int").const_()),
        ));

        let out = classify(&unit, &ModelConfig::default());
        let counter = &out.classes["Counter"];
        let fields: Vec<_> = counter.fields.iter().map(|f| f.name.as_str()).collect();
        let statics: Vec<_> = counter.static_fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(fields, vec!["value"]);
        assert_eq!(statics, vec!["instances"]);
        assert!(counter.field("instances").is_some());
    }

    #[test]
    fn test_duplicate_destructor_keeps_first() {
        let unit = DeclUnit::new().with(RawDecl::class(
            "Handle",
            RawRecord::new()
                .member(RawMember::function("~Handle", RawFunction::special().virtual_().defined()))
                .member(RawMember::function("~Handle", RawFunction::special().defined())),
        ));

        let out = classify(&unit, &ModelConfig::default());
        let dtor = out.classes["Handle"].destructor.as_ref().unwrap();
        assert!(dtor.is_virtual);
        assert_eq!(
            out.sink.warnings,
            vec![Warning::DuplicateDestructor {
                class: "Handle".into()
            }]
        );
    }

    #[test]
    fn test_unsupported_operator_is_dropped_with_warning() {
        let unit = DeclUnit::new().with(RawDecl::class(
            "Vec2",
            RawRecord::new()
                .method("operator<<", RawFunction::returning("Vec2&").param("n", "int"))
                .method("operator+", RawFunction::returning("Vec2").param("o", "const Vec2&")),
        ));

        let out = classify(&unit, &ModelConfig::default());
        let vec2 = &out.classes["Vec2"];
        assert_eq!(vec2.operators.len(), 1);
        assert_eq!(vec2.operators[0].kind, OperatorKind::Add);
        assert!(vec2.methods.is_empty());
        assert_eq!(
            out.sink.warnings,
            vec![Warning::UnsupportedOperator {
                class: "Vec2".into(),
                token: "<<".to_string(),
            }]
        );
    }

    #[test]
    fn test_call_operator_expands_trailing_defaults() {
        let unit = DeclUnit::new().with(RawDecl::class(
            "Poly",
            RawRecord::new().method(
                "operator()",
                RawFunction::returning("double")
                    .param("x", "double")
                    .param_default("scale", "double", "1.0")
                    .const_(),
            ),
        ));

        let out = classify(&unit, &ModelConfig::default());
        let call = out.classes["Poly"].operator(OperatorKind::Call).unwrap();
        assert!(!call.call_forms.accepts(0));
        assert!(call.call_forms.accepts(1));
        assert!(call.call_forms.accepts(2));
        assert_eq!(call.call_forms.min_arity, 1);
        assert!(out.sink.warnings.is_empty());
    }

    #[test]
    fn test_ignored_method_is_skipped() {
        let unit = DeclUnit::new().with(RawDecl::class(
            "Solver",
            RawRecord::new()
                .method("step", RawFunction::returning("void"))
                .method("debugDump", RawFunction::returning("void")),
        ));
        let config = ModelConfig::default().with_ignored_method("Solver", "debugDump");

        let out = classify(&unit, &config);
        let solver = &out.classes["Solver"];
        assert!(solver.method("step").is_some());
        assert!(solver.method("debugDump").is_none());
        assert!(solver.overload_groups.iter().all(|g| g.name != "debugDump"));
    }

    #[test]
    fn test_stringifier_shape() {
        let unit = DeclUnit::new()
            .with(RawDecl::enumeration("Color", &["Red", "Green"]))
            .with(RawDecl::function(
                "colorCode",
                RawFunction::returning("int").param("c", "Color"),
            ))
            .with(RawDecl::function(
                "describe",
                RawFunction::returning("std::string")
                    .param("c", "Color")
                    .param("verbose", "bool"),
            ))
            .with(RawDecl::function(
                "colorName",
                RawFunction::returning("std::string").param("c", "Color"),
            ));

        let out = classify(&unit, &ModelConfig::default());
        assert_eq!(out.functions.len(), 3);
        let stringifier = out.enums["Color"].stringifier.as_ref().unwrap();
        assert_eq!(stringifier.name, "colorName");
        assert!(stringifier.owner.is_none());

        let describe = &out.functions[1];
        assert!(!is_stringifier(&describe.params, &describe.returns, "Color"));
        let code = &out.functions[0];
        assert!(!is_stringifier(&code.params, &code.returns, "Color"));
    }

    #[test]
    fn test_const_overload_of_same_params_is_rejected() {
        let unit = DeclUnit::new().with(RawDecl::class(
            "Table",
            RawRecord::new()
                .method("get", RawFunction::returning("int").param("i", "int"))
                .method("get", RawFunction::returning("int").param("i", "int").const_()),
        ));

        let out = classify(&unit, &ModelConfig::default());
        let table = &out.classes["Table"];
        assert_eq!(table.methods.len(), 1);
        assert!(!table.methods[0].is_const);
        assert!(matches!(
            out.sink.warnings.as_slice(),
            [Warning::DuplicateOverload { name, signature, .. }]
                if name == "get" && signature == "(int) const"
        ));
        assert_eq!(table.methods[0].call_forms.forms.len(), 1);
    }
}
