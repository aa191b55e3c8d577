//! Exception taxonomy mapping.

use serde::Serialize;
use smol_str::SmolStr;
use wrapgen_decl::{Expr, RawType, Stmt};

/// The closed set of recoverable error kinds exposed to generators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionKind {
    AllocationFailure,
    TypeCastFailure,
    DomainError,
    InvalidArgument,
    IoFailure,
    OutOfRange,
    Overflow,
    RangeError,
    Underflow,
    Unclassified,
}

impl ExceptionKind {
    /// Map a standard exception type name. Accepts `std::`-qualified and
    /// bare spellings.
    pub fn from_std_name(name: &str) -> Option<Self> {
        let name = name.trim().trim_start_matches("::");
        let name = name.strip_prefix("std::").unwrap_or(name);
        let kind = match name {
            "bad_alloc" | "bad_array_new_length" => ExceptionKind::AllocationFailure,
            "bad_cast" => ExceptionKind::TypeCastFailure,
            "domain_error" => ExceptionKind::DomainError,
            "invalid_argument" => ExceptionKind::InvalidArgument,
            "ios_base::failure" | "ios::failure" => ExceptionKind::IoFailure,
            "out_of_range" => ExceptionKind::OutOfRange,
            "overflow_error" => ExceptionKind::Overflow,
            "range_error" => ExceptionKind::RangeError,
            "underflow_error" => ExceptionKind::Underflow,
            _ => return None,
        };
        Some(kind)
    }

    /// The canonical standard type of this kind, or `None` for `Unclassified`.
    pub fn std_name(self) -> Option<&'static str> {
        match self {
            ExceptionKind::AllocationFailure => Some("std::bad_alloc"),
            ExceptionKind::TypeCastFailure => Some("std::bad_cast"),
            ExceptionKind::DomainError => Some("std::domain_error"),
            ExceptionKind::InvalidArgument => Some("std::invalid_argument"),
            ExceptionKind::IoFailure => Some("std::ios_base::failure"),
            ExceptionKind::OutOfRange => Some("std::out_of_range"),
            ExceptionKind::Overflow => Some("std::overflow_error"),
            ExceptionKind::RangeError => Some("std::range_error"),
            ExceptionKind::Underflow => Some("std::underflow_error"),
            ExceptionKind::Unclassified => None,
        }
    }
}

/// One `throw` statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThrowSite {
    pub kind: ExceptionKind,
    /// The thrown type as written, kept for diagnostics.
    pub type_name: SmolStr,
    /// First string literal passed to the exception's constructor.
    pub message: Option<String>,
}

pub const RETHROW: &str = "<rethrow>";

/// Collect the throw sites of a body, including nested blocks.
///
/// `classify_custom(name)` maps a thrown type that is not a standard
/// exception (typically a model class deriving from one) to a kind.
pub fn throw_sites(
    body: &[Stmt],
    mut classify_custom: impl FnMut(&str) -> Option<ExceptionKind>,
) -> Vec<ThrowSite> {
    let mut sites = Vec::new();
    for stmt in body {
        stmt.walk(&mut |stmt| {
            if let Stmt::Throw { exception } = stmt {
                let site = match exception {
                    None => ThrowSite {
                        kind: ExceptionKind::Unclassified,
                        type_name: SmolStr::new(RETHROW),
                        message: None,
                    },
                    Some(expr) => site_for(expr, &mut classify_custom),
                };
                sites.push(site);
            }
        });
    }
    sites
}

fn site_for(expr: &Expr, classify_custom: &mut impl FnMut(&str) -> Option<ExceptionKind>) -> ThrowSite {
    let (type_name, args) = match expr {
        Expr::Construct { ty, args } | Expr::New { ty, args, .. } => (type_spelling(ty), args.as_slice()),
        Expr::Call { callee, args } => (callee.clone(), args.as_slice()),
        Expr::Ident { name } => (name.clone(), &[][..]),
        Expr::Opaque { text } => (text.clone(), &[][..]),
        other => (format!("{:?}", other), &[][..]),
    };
    let kind = ExceptionKind::from_std_name(&type_name)
        .or_else(|| classify_custom(&type_name))
        .unwrap_or(ExceptionKind::Unclassified);
    let message = args
        .iter()
        .find_map(Expr::string_literal)
        .map(str::to_string);
    ThrowSite {
        kind,
        type_name: SmolStr::new(type_name),
        message,
    }
}

fn type_spelling(ty: &RawType) -> String {
    match ty.to_expr() {
        Ok(expr) => expr.to_string(),
        Err(_) => ty.spelling(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_std_exception_maps_to_a_distinct_kind() {
        let names = [
            "std::bad_alloc",
            "std::bad_cast",
            "std::domain_error",
            "std::invalid_argument",
            "std::ios_base::failure",
            "std::out_of_range",
            "std::overflow_error",
            "std::range_error",
            "std::underflow_error",
        ];
        let kinds: Vec<_> = names
            .iter()
            .map(|n| ExceptionKind::from_std_name(n).unwrap())
            .collect();
        for (i, kind) in kinds.iter().enumerate() {
            assert_ne!(*kind, ExceptionKind::Unclassified);
            assert!(!kinds[i + 1..].contains(kind), "{:?} is not distinct", kind);
            assert_eq!(kind.std_name(), Some(names[i]));
        }
        assert_eq!(ExceptionKind::from_std_name("bad_alloc"), Some(ExceptionKind::AllocationFailure));
    }

    #[test]
    fn test_throw_sites_keep_message_and_unknown_type() {
        let body = vec![
            Stmt::if_then(
                Expr::ident("outOfBounds"),
                vec![Stmt::throw(Expr::construct(
                    "std::invalid_argument",
                    vec![Expr::literal("\"Out of bounds\"")],
                ))],
            ),
            Stmt::throw(Expr::construct(
                "std::runtime_error",
                vec![Expr::literal("\"other\"")],
            )),
            Stmt::Throw { exception: None },
        ];

        let sites = throw_sites(&body, |_| None);
        assert_eq!(sites.len(), 3);
        assert_eq!(sites[0].kind, ExceptionKind::InvalidArgument);
        assert_eq!(sites[0].message.as_deref(), Some("Out of bounds"));
        assert_eq!(sites[1].kind, ExceptionKind::Unclassified);
        assert_eq!(sites[1].type_name, "std::runtime_error");
        assert_eq!(sites[2].type_name, RETHROW);
    }

    #[test]
    fn test_custom_exception_uses_callback() {
        let body = vec![Stmt::throw(Expr::construct("MyError", vec![]))];
        let sites = throw_sites(&body, |name| {
            (name == "MyError").then_some(ExceptionKind::OutOfRange)
        });
        assert_eq!(sites[0].kind, ExceptionKind::OutOfRange);
        assert_eq!(sites[0].message, None);
    }
}
