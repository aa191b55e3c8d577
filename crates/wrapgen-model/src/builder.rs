//! The model construction pipeline.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use std::sync::Arc;
use wrapgen_common::Diagnostic;
use wrapgen_config::ModelConfig;
use wrapgen_decl::DeclUnit;

use crate::classify::Classifier;
use crate::collect::collect;
use crate::error::{to_diagnostic_warning, BuildFailure, ModelError, Sink, Warning};
use crate::inherit::{resolve_overrides, InheritanceGraph};
use crate::model::{ClassDecl, ClassId, FunctionDecl, InterfaceModel, StdFeatures, StructDecl};
use crate::ownership::OwnershipAnnotator;
use crate::types::{find_value_cycles, TypeRef};

/// A successfully built model and the warnings raised on the way.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    /// Frozen; share it freely between generator backends.
    pub model: Arc<InterfaceModel>,
    pub warnings: Vec<Warning>,
}

impl BuildOutput {
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.warnings.iter().map(to_diagnostic_warning).collect()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Builds an [`InterfaceModel`] from raw declarations.
#[derive(Debug, Clone, Default)]
pub struct ModelBuilder {
    config: ModelConfig,
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ModelConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Run every stage over `unit`.
    ///
    /// Stages keep going after an error so that one failed build reports
    /// every independently detectable problem. No model is returned if any
    /// error was found.
    pub fn build(&self, unit: &DeclUnit) -> Result<BuildOutput, BuildFailure> {
        let span = tracing::info_span!("build_model", decls = unit.decls.len());
        let _guard = span.enter();
        let mut sink = Sink::default();

        let collected = collect(unit, &self.config);
        tracing::debug!(
            records = collected.records.len(),
            enums = collected.enums.len(),
            functions = collected.functions.len(),
            "collected declarations"
        );

        let graph = InheritanceGraph::build(
            collected.classes().map(|(name, source)| (name, source.record)),
            &collected.table,
            &mut sink,
        );
        tracing::debug!(
            classes = collected.classes().count(),
            on_cycles = collected.classes().filter(|(name, _)| graph.is_poisoned(name)).count(),
            "resolved inheritance graph"
        );

        let classifier = Classifier::new(&collected.table, &graph, &self.config);
        let ids: FxHashMap<SmolStr, ClassId> = collected
            .classes()
            .enumerate()
            .map(|(i, (name, _))| (name.clone(), ClassId(i as u32)))
            .collect();
        let mut classes: IndexMap<SmolStr, ClassDecl> = IndexMap::new();
        for (i, (name, source)) in collected.classes().enumerate() {
            let decl = classifier.class(ClassId(i as u32), name, source, &ids, &mut sink);
            classes.insert(name.clone(), decl);
        }
        let mut structs: Vec<StructDecl> = Vec::new();
        for (name, source) in collected.structs() {
            structs.push(classifier.structure(name, source, &mut sink));
        }
        let (mut functions, function_groups) = classifier.functions(&collected.functions, &mut sink);
        tracing::debug!(
            methods = classes.values().map(|c| c.methods.len()).sum::<usize>(),
            operators = classes.values().map(|c| c.operators.len()).sum::<usize>(),
            functions = functions.len(),
            "classified members"
        );

        for cycle in find_value_cycles(&value_edges(&classes, &structs)) {
            sink.error(ModelError::CyclicType { cycle });
        }

        resolve_overrides(&mut classes, &graph, &mut sink);
        tracing::debug!(
            abstract_classes = classes.values().filter(|c| c.is_abstract).count(),
            "resolved overrides"
        );

        let annotator = OwnershipAnnotator::new(&collected.table, self.config.ownership.unclassifiable);
        annotator.annotate_classes(&mut classes, &collected.records, &mut sink);
        annotator.annotate_structs(&mut structs, &mut sink);
        annotator.annotate_functions(&mut functions, &collected.functions, &classes, &mut sink);

        let enums = classifier.enums(&collected.enums, &classes, &functions);
        let std_features = std_features(&classes, &structs, &functions);

        if sink.has_errors() {
            for err in &sink.errors {
                tracing::error!("{}", err);
            }
            return Err(BuildFailure {
                errors: sink.errors,
                warnings: sink.warnings,
            });
        }

        tracing::info!(
            classes = classes.len(),
            structs = structs.len(),
            enums = enums.len(),
            functions = functions.len(),
            warnings = sink.warnings.len(),
            "interface model built"
        );
        Ok(BuildOutput {
            model: Arc::new(InterfaceModel {
                classes,
                enums,
                functions,
                function_groups,
                structs,
                std_features,
            }),
            warnings: sink.warnings,
        })
    }
}

/// Records each record's fields contain by value.
fn value_edges(classes: &IndexMap<SmolStr, ClassDecl>, structs: &[StructDecl]) -> IndexMap<SmolStr, Vec<SmolStr>> {
    let mut edges = IndexMap::new();
    for class in classes.values() {
        let targets = class.fields.iter().flat_map(|f| f.ty.contained_records()).collect();
        edges.insert(class.name.clone(), targets);
    }
    for decl in structs {
        let targets = decl.fields.iter().flat_map(|f| f.ty.contained_records()).collect();
        edges.insert(decl.name.clone(), targets);
    }
    edges
}

fn std_features(
    classes: &IndexMap<SmolStr, ClassDecl>,
    structs: &[StructDecl],
    functions: &[FunctionDecl],
) -> StdFeatures {
    let mut types: Vec<&TypeRef> = Vec::new();
    let mut throws = false;
    for class in classes.values() {
        types.extend(class.fields.iter().chain(&class.static_fields).map(|f| &f.ty));
        for method in &class.methods {
            types.push(&method.returns);
            types.extend(method.params.iter().map(|p| &p.ty));
            throws |= !method.throws.is_empty();
        }
        for ctor in &class.constructors {
            types.extend(ctor.params.iter().map(|p| &p.ty));
            throws |= !ctor.throws.is_empty();
        }
        for op in &class.operators {
            types.push(&op.returns);
            types.extend(op.operands.iter().map(|p| &p.ty));
            throws |= !op.throws.is_empty();
        }
        if let Some(dtor) = &class.destructor {
            throws |= !dtor.throws.is_empty();
        }
        throws |= !class.external_bases.is_empty();
    }
    for decl in structs {
        types.extend(decl.fields.iter().map(|f| &f.ty));
    }
    for function in functions {
        types.push(&function.returns);
        types.extend(function.params.iter().map(|p| &p.ty));
        throws |= !function.throws.is_empty();
    }

    StdFeatures {
        string: types.iter().any(|t| t.mentions_string()),
        vector: types.iter().any(|t| t.mentions_sequence()),
        exceptions: throws,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wrapgen_decl::{RawDecl, RawFunction, RawRecord};

    #[test]
    fn test_empty_unit_builds_empty_model() {
        let output = ModelBuilder::new().build(&DeclUnit::new()).unwrap();
        assert!(output.model.classes.is_empty());
        assert!(!output.has_warnings());
        assert_eq!(output.model.std_features, StdFeatures::default());
    }

    #[test]
    fn test_errors_are_aggregated() {
        let unit = DeclUnit::new()
            .with(RawDecl::class("X", RawRecord::new().base("Y")))
            .with(RawDecl::class("Y", RawRecord::new().base("X")))
            .with(RawDecl::function(
                "solve",
                RawFunction::returning("void").param("m", "Matrix"),
            ))
            .with(RawDecl::structure("S", RawRecord::new().field("inner", "S")));

        let failure = ModelBuilder::new().build(&unit).unwrap_err();
        assert!(failure
            .errors
            .iter()
            .any(|e| matches!(e, ModelError::CyclicInheritance { .. })));
        assert!(failure
            .errors
            .iter()
            .any(|e| matches!(e, ModelError::UnresolvedType { symbol, .. } if symbol == "Matrix")));
        assert!(failure
            .errors
            .iter()
            .any(|e| matches!(e, ModelError::CyclicType { .. })));
        assert!(failure.diagnostics().len() >= failure.errors.len());
    }

    #[test]
    fn test_std_features() {
        let unit = DeclUnit::new().with(RawDecl::function(
            "concat",
            RawFunction::returning("std::string").param("v", "const std::vector<std::string>&"),
        ));
        let output = ModelBuilder::new().build(&unit).unwrap();
        let features = output.model.std_features;
        assert!(features.string);
        assert!(features.vector);
        assert!(!features.exceptions);
    }
}
