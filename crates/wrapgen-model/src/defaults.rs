//! Default-argument expansion.

use serde::Serialize;
use smol_str::SmolStr;
use wrapgen_config::DefaultArgStrategy;

use crate::model::ParamDecl;
use crate::types::{Primitive, TypeKind, TypeRef};

/// Lexical category of a default argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LiteralKind {
    Integer,
    Floating,
    Boolean,
    String,
    Character,
    Null,
    /// Anything that is not a single literal, e.g. `A()` or `N * 2`.
    Expression,
}

impl LiteralKind {
    pub fn classify(spelling: &str) -> Self {
        let s = spelling.trim();
        match s {
            "true" | "false" => return LiteralKind::Boolean,
            "nullptr" | "NULL" => return LiteralKind::Null,
            _ => {}
        }
        if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
            return LiteralKind::String;
        }
        if s.len() >= 3 && s.starts_with('\'') && s.ends_with('\'') {
            return LiteralKind::Character;
        }
        classify_number(s).unwrap_or(LiteralKind::Expression)
    }
}

fn classify_number(s: &str) -> Option<LiteralKind> {
    let digits = s.strip_prefix(['-', '+']).unwrap_or(s);
    if !digits.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
        return None;
    }
    if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        let body = hex.trim_end_matches(['u', 'U', 'l', 'L']);
        return (!body.is_empty() && body.chars().all(|c| c.is_ascii_hexdigit()))
            .then_some(LiteralKind::Integer);
    }
    let is_float = digits.contains(['.', 'e', 'E']);
    let body = if is_float {
        digits.trim_end_matches(['f', 'F', 'l', 'L'])
    } else {
        digits.trim_end_matches(['u', 'U', 'l', 'L'])
    };
    let valid = body.chars().enumerate().all(|(i, c)| {
        c.is_ascii_digit()
            || c == '.'
            || c == 'e'
            || c == 'E'
            || ((c == '-' || c == '+') && i > 0 && matches!(body.as_bytes()[i - 1], b'e' | b'E'))
    });
    if !valid || body.is_empty() || body == "." {
        return None;
    }
    Some(if is_float {
        LiteralKind::Floating
    } else {
        LiteralKind::Integer
    })
}

/// An implicit conversion the default value undergoes when bound to its
/// parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Coercion {
    pub from: SmolStr,
    pub to: SmolStr,
}

/// A default argument, kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DefaultValue {
    pub spelling: String,
    pub kind: LiteralKind,
    pub coercion: Option<Coercion>,
}

impl DefaultValue {
    pub fn new(spelling: &str, param_ty: &TypeRef) -> Self {
        let kind = LiteralKind::classify(spelling);
        let coercion = coercion_for(spelling.trim(), kind, param_ty);
        Self {
            spelling: spelling.trim().to_string(),
            kind,
            coercion,
        }
    }
}

fn coercion_for(spelling: &str, kind: LiteralKind, ty: &TypeRef) -> Option<Coercion> {
    if ty.qualifiers.is_pointer {
        return None;
    }
    let from = match (kind, &ty.kind) {
        (LiteralKind::Floating, TypeKind::Primitive { primitive })
            if !primitive.is_floating() =>
        {
            floating_literal_type(spelling)
        }
        (LiteralKind::Integer, TypeKind::Primitive { primitive })
            if primitive.is_floating() || *primitive == Primitive::Bool =>
        {
            "int"
        }
        (LiteralKind::Integer, TypeKind::Enum { .. }) => "int",
        (LiteralKind::Boolean, TypeKind::Primitive { primitive }) if *primitive != Primitive::Bool => {
            "bool"
        }
        (LiteralKind::String, TypeKind::String) => "const char*",
        _ => return None,
    };
    let mut target = ty.clone();
    target.qualifiers = Default::default();
    Some(Coercion {
        from: SmolStr::new(from),
        to: target.canonical(),
    })
}

fn floating_literal_type(spelling: &str) -> &'static str {
    if spelling.ends_with(['f', 'F']) {
        "float"
    } else if spelling.ends_with(['l', 'L']) {
        "long double"
    } else {
        "double"
    }
}

/// One explicit way of calling a callable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallForm {
    /// Number of explicit arguments.
    pub arity: usize,
    /// Indices of parameters filled from their defaults (or, under the
    /// optional-parameter strategy, that the caller may omit).
    pub defaulted: Vec<usize>,
}

/// The accepted call shapes of a callable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallForms {
    pub min_arity: usize,
    pub max_arity: usize,
    pub strategy: DefaultArgStrategy,
    pub forms: Vec<CallForm>,
}

impl CallForms {
    /// Expand trailing defaults of `params`.
    ///
    /// `collides(arity)` reports whether calling with that many explicit
    /// arguments would be indistinguishable from another overload; such
    /// arities are dropped and returned alongside the forms.
    pub fn expand(
        params: &[ParamDecl],
        strategy: DefaultArgStrategy,
        mut collides: impl FnMut(usize) -> bool,
    ) -> (Self, Vec<usize>) {
        let max_arity = params.len();
        let trailing = params
            .iter()
            .rev()
            .take_while(|p| p.default.is_some())
            .count();
        let mut min_arity = max_arity - trailing;

        let mut pruned = Vec::new();
        let mut arities = vec![max_arity];
        for arity in (min_arity..max_arity).rev() {
            if collides(arity) {
                pruned.push(arity);
            } else {
                arities.push(arity);
            }
        }

        let forms = match strategy {
            DefaultArgStrategy::OverloadSet => arities
                .iter()
                .map(|&arity| CallForm {
                    arity,
                    defaulted: (arity..max_arity).collect(),
                })
                .collect(),
            DefaultArgStrategy::OptionalParameters => {
                // A single entry can only omit a contiguous tail, so a
                // pruned arity also cuts off everything below it.
                if let Some(&highest_pruned) = pruned.first() {
                    min_arity = highest_pruned + 1;
                }
                vec![CallForm {
                    arity: max_arity,
                    defaulted: (min_arity..max_arity).collect(),
                }]
            }
        };
        if strategy == DefaultArgStrategy::OverloadSet {
            min_arity = arities.iter().copied().min().unwrap_or(max_arity);
        }

        (
            Self {
                min_arity,
                max_arity,
                strategy,
                forms,
            },
            pruned,
        )
    }

    /// Whether a call with `n` explicit arguments is valid.
    pub fn accepts(&self, n: usize) -> bool {
        match self.strategy {
            DefaultArgStrategy::OverloadSet => self.forms.iter().any(|f| f.arity == n),
            DefaultArgStrategy::OptionalParameters => (self.min_arity..=self.max_arity).contains(&n),
        }
    }

    pub fn has_defaults(&self) -> bool {
        self.min_arity < self.max_arity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(name: &str, ty: TypeRef, default: Option<&str>) -> ParamDecl {
        ParamDecl {
            name: SmolStr::new(name),
            default: default.map(|d| DefaultValue::new(d, &ty)),
            ty,
        }
    }

    fn int() -> TypeRef {
        TypeRef::primitive(Primitive::Int)
    }

    #[test]
    fn test_literal_kinds() {
        assert_eq!(LiteralKind::classify("5"), LiteralKind::Integer);
        assert_eq!(LiteralKind::classify("-12L"), LiteralKind::Integer);
        assert_eq!(LiteralKind::classify("0x1F"), LiteralKind::Integer);
        assert_eq!(LiteralKind::classify("7.0"), LiteralKind::Floating);
        assert_eq!(LiteralKind::classify("1e-3f"), LiteralKind::Floating);
        assert_eq!(LiteralKind::classify("false"), LiteralKind::Boolean);
        assert_eq!(LiteralKind::classify("\"abc\""), LiteralKind::String);
        assert_eq!(LiteralKind::classify("'x'"), LiteralKind::Character);
        assert_eq!(LiteralKind::classify("nullptr"), LiteralKind::Null);
        assert_eq!(LiteralKind::classify("A()"), LiteralKind::Expression);
        assert_eq!(LiteralKind::classify("N"), LiteralKind::Expression);
    }

    #[test]
    fn test_floating_default_on_integral_param_records_coercion() {
        let value = DefaultValue::new("7.0", &int());
        assert_eq!(value.spelling, "7.0");
        assert_eq!(
            value.coercion,
            Some(Coercion {
                from: "double".into(),
                to: "int".into()
            })
        );

        let exact = DefaultValue::new("7.0", &TypeRef::primitive(Primitive::Double));
        assert_eq!(exact.coercion, None);
        assert_eq!(DefaultValue::new("6", &int()).coercion, None);
    }

    #[test]
    fn test_string_default_records_conversion() {
        let mut ty = TypeRef::string();
        ty.qualifiers.is_const = true;
        ty.qualifiers.is_reference = true;
        let value = DefaultValue::new("\"abc\"", &ty);
        assert_eq!(value.kind, LiteralKind::String);
        assert_eq!(value.coercion.unwrap().to, "std::string");
    }

    #[test]
    fn test_two_params_one_trailing_default() {
        let params = vec![param("a", int(), None), param("b", int(), Some("6"))];
        let (forms, pruned) = CallForms::expand(&params, DefaultArgStrategy::OverloadSet, |_| false);

        assert!(pruned.is_empty());
        assert_eq!(forms.forms.len(), 2);
        assert_eq!(forms.forms[0], CallForm { arity: 2, defaulted: vec![] });
        assert_eq!(forms.forms[1], CallForm { arity: 1, defaulted: vec![1] });
        assert!(forms.accepts(1));
        assert!(forms.accepts(2));
        assert!(!forms.accepts(0));
    }

    #[test]
    fn test_expansion_stops_at_first_required_param_from_the_end() {
        let params = vec![
            param("a", int(), Some("1")),
            param("b", int(), None),
            param("c", int(), Some("3")),
        ];
        let (forms, _) = CallForms::expand(&params, DefaultArgStrategy::OverloadSet, |_| false);
        assert_eq!(forms.min_arity, 2);
        let arities: Vec<_> = forms.forms.iter().map(|f| f.arity).collect();
        assert_eq!(arities, vec![3, 2]);
    }

    #[test]
    fn test_optional_parameter_strategy_is_a_single_form() {
        let params = vec![
            param("i", int(), Some("5")),
            param("j", int(), Some("6")),
        ];
        let (forms, _) =
            CallForms::expand(&params, DefaultArgStrategy::OptionalParameters, |_| false);
        assert_eq!(forms.forms, vec![CallForm { arity: 2, defaulted: vec![0, 1] }]);
        assert!(forms.accepts(0));
        assert!(forms.has_defaults());
    }

    #[test]
    fn test_colliding_arity_is_pruned() {
        let params = vec![param("j", int(), Some("6"))];
        let (forms, pruned) = CallForms::expand(&params, DefaultArgStrategy::OverloadSet, |n| n == 0);
        assert_eq!(pruned, vec![0]);
        assert!(!forms.accepts(0));
        assert_eq!(forms.min_arity, 1);

        let (forms, _) =
            CallForms::expand(&params, DefaultArgStrategy::OptionalParameters, |n| n == 0);
        assert!(!forms.accepts(0));
        assert!(!forms.has_defaults());
    }
}
