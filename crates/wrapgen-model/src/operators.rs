//! Operator normalization.
//!
//! Each supported C++ operator maps to a kind with a canonical callable
//! name, so targets without operator syntax can expose it as a method.
//! [`OperatorKind::from_canonical_name`] is the reverse map a generator
//! uses to re-sugar.

use serde::Serialize;

/// The closed set of operators the model understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorKind {
    Call,
    Index,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    /// Unary `-`
    Neg,
    /// Unary `+`
    Plus,
    LogicalAnd,
    LogicalOr,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    RemAssign,
    AndAssign,
    OrAssign,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorCategory {
    Call,
    Index,
    Arithmetic,
    Logical,
    CompoundAssign,
}

impl OperatorKind {
    pub const ALL: [OperatorKind; 18] = [
        OperatorKind::Call,
        OperatorKind::Index,
        OperatorKind::Add,
        OperatorKind::Sub,
        OperatorKind::Mul,
        OperatorKind::Div,
        OperatorKind::Rem,
        OperatorKind::Neg,
        OperatorKind::Plus,
        OperatorKind::LogicalAnd,
        OperatorKind::LogicalOr,
        OperatorKind::AddAssign,
        OperatorKind::SubAssign,
        OperatorKind::MulAssign,
        OperatorKind::DivAssign,
        OperatorKind::RemAssign,
        OperatorKind::AndAssign,
        OperatorKind::OrAssign,
    ];

    /// Classify an operator token. `arity` is the number of explicit
    /// parameters of the member function; it tells unary `-`/`+` apart
    /// from the binary forms.
    pub fn from_token(token: &str, arity: usize) -> Option<Self> {
        let kind = match (token, arity) {
            ("()", _) => OperatorKind::Call,
            ("[]", _) => OperatorKind::Index,
            ("+", 0) => OperatorKind::Plus,
            ("-", 0) => OperatorKind::Neg,
            ("+", _) => OperatorKind::Add,
            ("-", _) => OperatorKind::Sub,
            ("*", 1) => OperatorKind::Mul,
            ("/", _) => OperatorKind::Div,
            ("%", _) => OperatorKind::Rem,
            ("&&", _) => OperatorKind::LogicalAnd,
            ("||", _) => OperatorKind::LogicalOr,
            ("+=", _) => OperatorKind::AddAssign,
            ("-=", _) => OperatorKind::SubAssign,
            ("*=", _) => OperatorKind::MulAssign,
            ("/=", _) => OperatorKind::DivAssign,
            ("%=", _) => OperatorKind::RemAssign,
            ("&=", _) => OperatorKind::AndAssign,
            ("|=", _) => OperatorKind::OrAssign,
            // Unary `*` is dereference, not multiplication.
            _ => return None,
        };
        Some(kind)
    }

    pub fn token(self) -> &'static str {
        match self {
            OperatorKind::Call => "()",
            OperatorKind::Index => "[]",
            OperatorKind::Add | OperatorKind::Plus => "+",
            OperatorKind::Sub | OperatorKind::Neg => "-",
            OperatorKind::Mul => "*",
            OperatorKind::Div => "/",
            OperatorKind::Rem => "%",
            OperatorKind::LogicalAnd => "&&",
            OperatorKind::LogicalOr => "||",
            OperatorKind::AddAssign => "+=",
            OperatorKind::SubAssign => "-=",
            OperatorKind::MulAssign => "*=",
            OperatorKind::DivAssign => "/=",
            OperatorKind::RemAssign => "%=",
            OperatorKind::AndAssign => "&=",
            OperatorKind::OrAssign => "|=",
        }
    }

    /// Number of explicit operands a member form of this operator takes,
    /// or `None` when it is variadic (`operator()`).
    pub fn operand_count(self) -> Option<usize> {
        match self {
            OperatorKind::Call => None,
            OperatorKind::Neg | OperatorKind::Plus => Some(0),
            _ => Some(1),
        }
    }

    pub fn canonical_name(self) -> &'static str {
        match self {
            OperatorKind::Call => "call",
            OperatorKind::Index => "index",
            OperatorKind::Add => "add",
            OperatorKind::Sub => "sub",
            OperatorKind::Mul => "mul",
            OperatorKind::Div => "div",
            OperatorKind::Rem => "mod",
            OperatorKind::Neg => "neg",
            OperatorKind::Plus => "pos",
            OperatorKind::LogicalAnd => "and",
            OperatorKind::LogicalOr => "or",
            OperatorKind::AddAssign => "addAssign",
            OperatorKind::SubAssign => "subAssign",
            OperatorKind::MulAssign => "mulAssign",
            OperatorKind::DivAssign => "divAssign",
            OperatorKind::RemAssign => "modAssign",
            OperatorKind::AndAssign => "andAssign",
            OperatorKind::OrAssign => "orAssign",
        }
    }

    pub fn from_canonical_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.canonical_name() == name)
    }

    /// Compound assignments modify the receiver and return a self-reference.
    pub fn mutates_self(self) -> bool {
        self.category() == OperatorCategory::CompoundAssign
    }

    pub fn category(self) -> OperatorCategory {
        match self {
            OperatorKind::Call => OperatorCategory::Call,
            OperatorKind::Index => OperatorCategory::Index,
            OperatorKind::Add
            | OperatorKind::Sub
            | OperatorKind::Mul
            | OperatorKind::Div
            | OperatorKind::Rem
            | OperatorKind::Neg
            | OperatorKind::Plus => OperatorCategory::Arithmetic,
            OperatorKind::LogicalAnd | OperatorKind::LogicalOr => OperatorCategory::Logical,
            OperatorKind::AddAssign
            | OperatorKind::SubAssign
            | OperatorKind::MulAssign
            | OperatorKind::DivAssign
            | OperatorKind::RemAssign
            | OperatorKind::AndAssign
            | OperatorKind::OrAssign => OperatorCategory::CompoundAssign,
        }
    }
}

/// The operator token of a member named `operator<token>`, if any.
///
/// `operatorFoo` is an ordinary identifier and yields `None`, while
/// conversion operators (`operator bool`) yield their spelled type.
pub fn operator_token(member_name: &str) -> Option<&str> {
    let rest = member_name.strip_prefix("operator")?;
    let first = rest.chars().next()?;
    if first.is_ascii_alphanumeric() || first == '_' {
        return None;
    }
    let token = rest.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_names() {
        assert_eq!(OperatorKind::from_token("+", 1).unwrap().canonical_name(), "add");
        assert_eq!(
            OperatorKind::from_token("+=", 1).unwrap().canonical_name(),
            "addAssign"
        );
        assert_eq!(OperatorKind::from_token("()", 2).unwrap().canonical_name(), "call");
        assert_eq!(OperatorKind::from_token("%", 1).unwrap().canonical_name(), "mod");
    }

    #[test]
    fn test_unary_forms_depend_on_arity() {
        assert_eq!(OperatorKind::from_token("-", 0), Some(OperatorKind::Neg));
        assert_eq!(OperatorKind::from_token("-", 1), Some(OperatorKind::Sub));
        assert_eq!(OperatorKind::from_token("*", 0), None);
    }

    #[test]
    fn test_every_kind_re_sugars_to_its_token() {
        for kind in OperatorKind::ALL {
            let name = kind.canonical_name();
            let back = OperatorKind::from_canonical_name(name).unwrap();
            assert_eq!(back, kind);
            let arity = kind.operand_count().unwrap_or(1);
            assert_eq!(OperatorKind::from_token(back.token(), arity), Some(kind));
        }
    }

    #[test]
    fn test_only_compound_assignment_mutates_self() {
        let mutating: Vec<_> = OperatorKind::ALL
            .into_iter()
            .filter(|k| k.mutates_self())
            .map(OperatorKind::token)
            .collect();
        assert_eq!(mutating, vec!["+=", "-=", "*=", "/=", "%=", "&=", "|="]);
    }

    #[test]
    fn test_operator_token_extraction() {
        assert_eq!(operator_token("operator+="), Some("+="));
        assert_eq!(operator_token("operator()"), Some("()"));
        assert_eq!(operator_token("operator []"), Some("[]"));
        assert_eq!(operator_token("operatorName"), None);
        assert_eq!(operator_token("add"), None);
        assert_eq!(operator_token("operator<<"), Some("<<"));
    }
}
