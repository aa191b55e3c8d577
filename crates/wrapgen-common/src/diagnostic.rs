//! Uniform diagnostic records.
//!
//! Fatal model errors and non-fatal warnings are distinct types in the
//! model crate; both can be flattened into this record for display or for
//! handing to a generator that does not want to match on either enum.

use crate::location::SourceLocation;
use miette::Diagnostic as MietteDiagnostic;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    Error,
    Warning,
    Info,
    Hint,
}

#[derive(Debug, Clone, Error, MietteDiagnostic, Serialize)]
#[error("{message}")]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    /// Stable machine-readable code, e.g. `wrapgen::cyclic_inheritance`.
    pub code: Option<String>,
    pub message: String,
    pub location: Option<SourceLocation>,
    #[help]
    pub help: Option<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Error,
            code: None,
            message: message.into(),
            location: None,
            help: None,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Warning,
            code: None,
            message: message.into(),
            location: None,
            help: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_location(mut self, location: SourceLocation) -> Self {
        if location.is_known() {
            self.location = Some(location);
        }
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.level == DiagnosticLevel::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_methods() {
        let diag = Diagnostic::warning("unsafe destruction")
            .with_code("wrapgen::unsafe_destruction")
            .with_location(SourceLocation::new("test2.hpp", 16, 5))
            .with_help("declare the base destructor virtual");

        assert_eq!(diag.level, DiagnosticLevel::Warning);
        assert!(!diag.is_error());
        assert_eq!(diag.code.as_deref(), Some("wrapgen::unsafe_destruction"));
        assert_eq!(diag.to_string(), "unsafe destruction");
        assert!(diag.location.is_some());
    }

    #[test]
    fn test_unknown_location_is_dropped() {
        let diag = Diagnostic::error("boom").with_location(SourceLocation::default());
        assert!(diag.location.is_none());
        assert!(diag.is_error());
    }
}
