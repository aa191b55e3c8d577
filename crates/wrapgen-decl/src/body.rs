//! Member body statement IR.
//!
//! This is deliberately much smaller than a full C++ statement tree: it
//! keeps the constructs that decide ownership (allocation, release,
//! assignment, return) and exception behavior (throw), and collapses
//! everything else into [`Expr::Opaque`].

use crate::decl::RawType;
use serde::{Deserialize, Serialize};

/// A statement in a member or function body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stmt", rename_all = "snake_case")]
pub enum Stmt {
    /// Expression statement: `expr;`
    Expr { expr: Expr },
    /// `delete p;` or `delete[] p;`
    Delete {
        target: Expr,
        #[serde(default)]
        is_array: bool,
    },
    /// `return;` or `return expr;`
    Return {
        #[serde(default)]
        value: Option<Expr>,
    },
    /// `throw expr;` or a bare rethrow `throw;`
    Throw {
        #[serde(default)]
        exception: Option<Expr>,
    },
    /// `if (cond) { .. } else { .. }`
    If {
        cond: Expr,
        #[serde(default)]
        then_branch: Vec<Stmt>,
        #[serde(default)]
        else_branch: Vec<Stmt>,
    },
    /// Any loop form; the condition is irrelevant to the analyses.
    Loop {
        #[serde(default)]
        body: Vec<Stmt>,
    },
    /// `{ .. }`, `switch` bodies, `try` blocks.
    Block { stmts: Vec<Stmt> },
}

/// An expression in a member or function body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "expr", rename_all = "snake_case")]
pub enum Expr {
    /// Literal as spelled in the source: `5`, `7.0`, `"message"`, `false`.
    Literal { spelling: String },
    /// Unqualified name: parameter, local, or implicit member access.
    Ident { name: String },
    /// `this`
    This,
    /// `base.name` or `base->name`
    Member { base: Box<Expr>, name: String },
    /// `target = value` (compound assignments included)
    Assign { target: Box<Expr>, value: Box<Expr> },
    /// `new T(args)` or `new T[len]`
    New {
        ty: RawType,
        #[serde(default)]
        array_len: Option<Box<Expr>>,
        #[serde(default)]
        args: Vec<Expr>,
    },
    /// Temporary construction: `std::invalid_argument("message")`
    Construct {
        ty: RawType,
        #[serde(default)]
        args: Vec<Expr>,
    },
    /// Function or method call.
    Call {
        callee: String,
        #[serde(default)]
        args: Vec<Expr>,
    },
    /// `base[index]`
    Index { base: Box<Expr>, index: Box<Expr> },
    /// `*operand`
    Deref { operand: Box<Expr> },
    /// Anything else, kept as text for diagnostics.
    Opaque { text: String },
}

impl Stmt {
    pub fn expr(expr: Expr) -> Self {
        Stmt::Expr { expr }
    }

    pub fn assign(target: Expr, value: Expr) -> Self {
        Stmt::Expr {
            expr: Expr::assign(target, value),
        }
    }

    pub fn delete(target: Expr) -> Self {
        Stmt::Delete {
            target,
            is_array: false,
        }
    }

    pub fn delete_array(target: Expr) -> Self {
        Stmt::Delete {
            target,
            is_array: true,
        }
    }

    pub fn ret(value: Expr) -> Self {
        Stmt::Return { value: Some(value) }
    }

    pub fn throw(exception: Expr) -> Self {
        Stmt::Throw {
            exception: Some(exception),
        }
    }

    pub fn if_then(cond: Expr, then_branch: Vec<Stmt>) -> Self {
        Stmt::If {
            cond,
            then_branch,
            else_branch: Vec::new(),
        }
    }

    /// Visit this statement and every nested statement, pre-order.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Stmt)) {
        f(self);
        match self {
            Stmt::If {
                then_branch,
                else_branch,
                ..
            } => {
                for stmt in then_branch.iter().chain(else_branch) {
                    stmt.walk(f);
                }
            }
            Stmt::Loop { body } | Stmt::Block { stmts: body } => {
                for stmt in body {
                    stmt.walk(f);
                }
            }
            Stmt::Expr { .. } | Stmt::Delete { .. } | Stmt::Return { .. } | Stmt::Throw { .. } => {}
        }
    }
}

impl Expr {
    pub fn literal(spelling: impl Into<String>) -> Self {
        Expr::Literal {
            spelling: spelling.into(),
        }
    }

    pub fn ident(name: impl Into<String>) -> Self {
        Expr::Ident { name: name.into() }
    }

    /// `this->name`
    pub fn this_member(name: impl Into<String>) -> Self {
        Expr::Member {
            base: Box::new(Expr::This),
            name: name.into(),
        }
    }

    pub fn assign(target: Expr, value: Expr) -> Self {
        Expr::Assign {
            target: Box::new(target),
            value: Box::new(value),
        }
    }

    pub fn new_object(ty: impl Into<RawType>, args: Vec<Expr>) -> Self {
        Expr::New {
            ty: ty.into(),
            array_len: None,
            args,
        }
    }

    pub fn new_array(ty: impl Into<RawType>, len: Expr) -> Self {
        Expr::New {
            ty: ty.into(),
            array_len: Some(Box::new(len)),
            args: Vec::new(),
        }
    }

    pub fn construct(ty: impl Into<RawType>, args: Vec<Expr>) -> Self {
        Expr::Construct {
            ty: ty.into(),
            args,
        }
    }

    pub fn call(callee: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Call {
            callee: callee.into(),
            args,
        }
    }

    pub fn index(base: Expr, index: Expr) -> Self {
        Expr::Index {
            base: Box::new(base),
            index: Box::new(index),
        }
    }

    /// The string payload of a string literal, without quotes.
    pub fn string_literal(&self) -> Option<&str> {
        match self {
            Expr::Literal { spelling } => spelling
                .strip_prefix('"')
                .and_then(|s| s.strip_suffix('"')),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walk_visits_nested_statements() {
        let body = Stmt::Block {
            stmts: vec![
                Stmt::if_then(
                    Expr::this_member("vec"),
                    vec![Stmt::delete_array(Expr::this_member("vec"))],
                ),
                Stmt::Loop {
                    body: vec![Stmt::throw(Expr::construct("std::bad_alloc", vec![]))],
                },
            ],
        };

        let mut deletes = 0;
        let mut throws = 0;
        body.walk(&mut |stmt| match stmt {
            Stmt::Delete { .. } => deletes += 1,
            Stmt::Throw { .. } => throws += 1,
            _ => {}
        });
        assert_eq!(deletes, 1);
        assert_eq!(throws, 1);
    }

    #[test]
    fn test_string_literal_payload() {
        assert_eq!(Expr::literal("\"message\"").string_literal(), Some("message"));
        assert_eq!(Expr::literal("5").string_literal(), None);
    }

    #[test]
    fn test_stmt_json_shape() {
        let json = r#"{"stmt": "delete", "target": {"expr": "ident", "name": "q"}, "is_array": true}"#;
        let stmt: Stmt = serde_json::from_str(json).unwrap();
        assert_eq!(stmt, Stmt::delete_array(Expr::ident("q")));
    }
}
