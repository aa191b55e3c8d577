//! Fatal errors and non-fatal warnings of a model build.
//!
//! Every stage pushes into a shared [`Sink`] instead of returning on the
//! first problem, so one failed build reports all independently detectable
//! errors together.

use miette::Diagnostic as MietteDiagnostic;
use smol_str::SmolStr;
use thiserror::Error;
use wrapgen_common::Diagnostic;

/// A fatal model construction error.
#[derive(Debug, Clone, PartialEq, Eq, Error, MietteDiagnostic)]
pub enum ModelError {
    #[error("unresolved type `{symbol}` in {context}")]
    #[diagnostic(
        code(wrapgen::unresolved_type),
        help("declare the type before use, or add an alias under [types.aliases]")
    )]
    UnresolvedType { symbol: String, context: String },

    #[error("array bound `{bound}` in {context} is not a positive integer literal")]
    #[diagnostic(code(wrapgen::unsupported_array_bound))]
    UnsupportedArrayBound { bound: String, context: String },

    #[error("cyclic type definition: {}", .cycle.join(" -> "))]
    #[diagnostic(code(wrapgen::cyclic_type))]
    CyclicType { cycle: Vec<SmolStr> },

    #[error("cyclic inheritance: {}", .cycle.join(" -> "))]
    #[diagnostic(code(wrapgen::cyclic_inheritance))]
    CyclicInheritance { cycle: Vec<SmolStr> },

    #[error(
        "ambiguous override of `{method}{signature}` in `{class}`: {} disagree on the return type",
        .candidates.join(", ")
    )]
    #[diagnostic(
        code(wrapgen::ambiguous_override),
        help("re-declare the method in the derived class to pick one implementation")
    )]
    AmbiguousOverride {
        class: SmolStr,
        method: SmolStr,
        signature: String,
        candidates: Vec<SmolStr>,
    },

    #[error("cannot classify ownership of field `{class}::{field}`")]
    #[diagnostic(
        code(wrapgen::unclassifiable_ownership),
        help("set ownership.unclassifiable = \"warn\" to build with the field unannotated")
    )]
    UnclassifiableOwnership { class: SmolStr, field: SmolStr },
}

/// A non-fatal finding. The model still builds.
#[derive(Debug, Clone, PartialEq, Eq, Error, MietteDiagnostic)]
pub enum Warning {
    #[error(
        "`{factory}` returns a heap-allocated `{derived}` through `{base}*`, but `{base}` has no virtual destructor"
    )]
    #[diagnostic(
        code(wrapgen::unsafe_destruction),
        severity(Warning),
        help("releasing the result through the base type is undefined behavior")
    )]
    UnsafeDestruction {
        factory: String,
        base: SmolStr,
        derived: SmolStr,
    },

    #[error("operator `{token}` of `{class}` has no canonical form and was skipped")]
    #[diagnostic(code(wrapgen::unsupported_operator), severity(Warning))]
    UnsupportedOperator { class: SmolStr, token: String },

    #[error("`{owner}` declares `{name}{signature}` more than once")]
    #[diagnostic(code(wrapgen::duplicate_overload), severity(Warning))]
    DuplicateOverload {
        owner: SmolStr,
        name: SmolStr,
        signature: String,
    },

    #[error("`{class}` declares more than one destructor; only the first is kept")]
    #[diagnostic(code(wrapgen::duplicate_destructor), severity(Warning))]
    DuplicateDestructor { class: SmolStr },

    #[error("ownership of field `{class}::{field}` could not be classified; left unannotated")]
    #[diagnostic(code(wrapgen::unclassifiable_ownership), severity(Warning))]
    UnclassifiedOwnership { class: SmolStr, field: SmolStr },
}

/// All fatal errors of a failed build, plus the warnings gathered before
/// the build was abandoned.
#[derive(Debug, Error, MietteDiagnostic)]
#[error("interface model construction failed with {} error(s)", .errors.len())]
#[diagnostic(code(wrapgen::build_failed))]
pub struct BuildFailure {
    #[related]
    pub errors: Vec<ModelError>,
    pub warnings: Vec<Warning>,
}

impl BuildFailure {
    /// Errors and warnings flattened into display records, errors first.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        let mut out: Vec<Diagnostic> = self.errors.iter().map(to_diagnostic_error).collect();
        out.extend(self.warnings.iter().map(to_diagnostic_warning));
        out
    }
}

pub(crate) fn to_diagnostic_error(err: &ModelError) -> Diagnostic {
    let mut diag = Diagnostic::error(err.to_string());
    if let Some(code) = err.code() {
        diag = diag.with_code(code.to_string());
    }
    if let Some(help) = err.help() {
        diag = diag.with_help(help.to_string());
    }
    diag
}

pub(crate) fn to_diagnostic_warning(warning: &Warning) -> Diagnostic {
    let mut diag = Diagnostic::warning(warning.to_string());
    if let Some(code) = warning.code() {
        diag = diag.with_code(code.to_string());
    }
    if let Some(help) = warning.help() {
        diag = diag.with_help(help.to_string());
    }
    diag
}

/// Collector shared by all stages of one build.
#[derive(Debug, Default)]
pub(crate) struct Sink {
    pub errors: Vec<ModelError>,
    pub warnings: Vec<Warning>,
}

impl Sink {
    pub fn error(&mut self, err: ModelError) {
        // Independent stages can rediscover the same broken reference.
        if !self.errors.contains(&err) {
            self.errors.push(err);
        }
    }

    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!("{}", warning);
        if !self.warnings.contains(&warning) {
            self.warnings.push(warning);
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ModelError::CyclicInheritance {
            cycle: vec!["A".into(), "B".into(), "A".into()],
        };
        assert_eq!(err.to_string(), "cyclic inheritance: A -> B -> A");

        let err = ModelError::UnresolvedType {
            symbol: "Matrix".to_string(),
            context: "parameter `m` of `solve`".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "unresolved type `Matrix` in parameter `m` of `solve`"
        );
    }

    #[test]
    fn test_sink_deduplicates() {
        let mut sink = Sink::default();
        let err = ModelError::CyclicType {
            cycle: vec!["S".into(), "S".into()],
        };
        sink.error(err.clone());
        sink.error(err);
        assert_eq!(sink.errors.len(), 1);
        assert!(sink.has_errors());
    }

    #[test]
    fn test_failure_diagnostics_carry_codes() {
        let failure = BuildFailure {
            errors: vec![ModelError::UnclassifiableOwnership {
                class: "Holder".into(),
                field: "data".into(),
            }],
            warnings: vec![Warning::DuplicateDestructor {
                class: "Holder".into(),
            }],
        };

        let diags = failure.diagnostics();
        assert_eq!(diags.len(), 2);
        assert!(diags[0].is_error());
        assert_eq!(diags[0].code.as_deref(), Some("wrapgen::unclassifiable_ownership"));
        assert!(diags[0].help.is_some());
        assert!(!diags[1].is_error());
        assert_eq!(
            failure.to_string(),
            "interface model construction failed with 1 error(s)"
        );
    }
}
