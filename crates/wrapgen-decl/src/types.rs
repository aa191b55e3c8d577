//! C++ type token grammar.
//!
//! Front-ends may hand over type references either as the spelling clang
//! prints (`const std::vector<std::string> &`) or already tokenized as a
//! [`TypeExpr`]. Spellings are parsed here into the same tree.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A syntactic C++ type expression. Nothing is resolved yet: names are
/// plain paths and template arguments are nested expressions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "form", rename_all = "snake_case")]
pub enum TypeExpr {
    /// A (possibly qualified, possibly templated) name: `std::vector<int>`.
    /// Multi-word builtins are a single segment: `unsigned long`.
    Named {
        path: Vec<String>,
        #[serde(default)]
        args: Vec<TypeExpr>,
    },
    /// `const T`
    Const { inner: Box<TypeExpr> },
    /// `T*`
    Pointer { pointee: Box<TypeExpr> },
    /// `T&` or `T&&`
    Reference {
        referent: Box<TypeExpr>,
        #[serde(default)]
        is_rvalue: bool,
    },
    /// `T[N]`
    Array {
        element: Box<TypeExpr>,
        bound: ArrayBound,
    },
}

/// The bound of a C-style array declarator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrayBound {
    Literal(u64),
    /// A named constant or expression; not a compile-time literal.
    Symbolic(String),
    Unsized,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot parse type `{spelling}`: {reason}")]
pub struct TypeSyntaxError {
    pub spelling: String,
    pub reason: String,
}

const BUILTIN_WORDS: &[&str] = &[
    "unsigned", "signed", "short", "long", "int", "char", "double", "float", "bool", "void",
    "wchar_t",
];

const IGNORED_KEYWORDS: &[&str] = &["struct", "class", "enum", "typename", "volatile"];

impl TypeExpr {
    pub fn named(name: &str) -> Self {
        TypeExpr::Named {
            path: name.split("::").map(String::from).collect(),
            args: Vec::new(),
        }
    }

    pub fn templated(name: &str, args: Vec<TypeExpr>) -> Self {
        TypeExpr::Named {
            path: name.split("::").map(String::from).collect(),
            args,
        }
    }

    pub fn constant(self) -> Self {
        TypeExpr::Const {
            inner: Box::new(self),
        }
    }

    pub fn pointer(self) -> Self {
        TypeExpr::Pointer {
            pointee: Box::new(self),
        }
    }

    pub fn reference(self) -> Self {
        TypeExpr::Reference {
            referent: Box::new(self),
            is_rvalue: false,
        }
    }

    pub fn array(self, bound: ArrayBound) -> Self {
        TypeExpr::Array {
            element: Box::new(self),
            bound,
        }
    }

    /// Parse a type spelling.
    ///
    /// # Example
    /// ```
    /// use wrapgen_decl::TypeExpr;
    /// let ty = TypeExpr::parse("const std::vector<std::string>&").unwrap();
    /// assert_eq!(ty.to_string(), "const std::vector<std::string>&");
    /// ```
    pub fn parse(spelling: &str) -> Result<Self, TypeSyntaxError> {
        let tokens = tokenize(spelling).map_err(|reason| TypeSyntaxError {
            spelling: spelling.to_string(),
            reason,
        })?;
        let mut parser = TypeParser { tokens, pos: 0 };
        let ty = parser.parse_type().map_err(|reason| TypeSyntaxError {
            spelling: spelling.to_string(),
            reason,
        })?;
        if let Some(tok) = parser.peek() {
            return Err(TypeSyntaxError {
                spelling: spelling.to_string(),
                reason: format!("unexpected trailing token `{}`", tok),
            });
        }
        Ok(ty)
    }

    /// The unqualified last path segment of a named type, looking through
    /// const/pointer/reference/array wrappers.
    pub fn base_name(&self) -> Option<&str> {
        match self {
            TypeExpr::Named { path, .. } => path.last().map(String::as_str),
            TypeExpr::Const { inner } => inner.base_name(),
            TypeExpr::Pointer { pointee } => pointee.base_name(),
            TypeExpr::Reference { referent, .. } => referent.base_name(),
            TypeExpr::Array { element, .. } => element.base_name(),
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Named { path, args } => {
                write!(f, "{}", path.join("::"))?;
                if !args.is_empty() {
                    f.write_str("<")?;
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{}", arg)?;
                    }
                    f.write_str(">")?;
                }
                Ok(())
            }
            TypeExpr::Const { inner } => match inner.as_ref() {
                TypeExpr::Pointer { .. } => write!(f, "{} const", inner),
                _ => write!(f, "const {}", inner),
            },
            TypeExpr::Pointer { pointee } => write!(f, "{}*", pointee),
            TypeExpr::Reference {
                referent,
                is_rvalue,
            } => write!(f, "{}{}", referent, if *is_rvalue { "&&" } else { "&" }),
            TypeExpr::Array { element, bound } => match bound {
                ArrayBound::Literal(n) => write!(f, "{}[{}]", element, n),
                ArrayBound::Symbolic(s) => write!(f, "{}[{}]", element, s),
                ArrayBound::Unsized => write!(f, "{}[]", element),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Number(u64),
    PathSep,
    Lt,
    Gt,
    Comma,
    Star,
    Amp,
    AmpAmp,
    LBracket,
    RBracket,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(s) => f.write_str(s),
            Token::Number(n) => write!(f, "{}", n),
            Token::PathSep => f.write_str("::"),
            Token::Lt => f.write_str("<"),
            Token::Gt => f.write_str(">"),
            Token::Comma => f.write_str(","),
            Token::Star => f.write_str("*"),
            Token::Amp => f.write_str("&"),
            Token::AmpAmp => f.write_str("&&"),
            Token::LBracket => f.write_str("["),
            Token::RBracket => f.write_str("]"),
        }
    }
}

fn tokenize(spelling: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = spelling.chars().peekable();

    while let Some(&ch) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        ident.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident));
            }
            c if c.is_ascii_digit() => {
                let mut digits = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_digit() {
                        digits.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                // Integer suffixes (5u, 5UL) are part of the literal.
                while matches!(chars.peek(), Some('u' | 'U' | 'l' | 'L')) {
                    chars.next();
                }
                let value = digits
                    .parse::<u64>()
                    .map_err(|e| format!("bad array bound `{}`: {}", digits, e))?;
                tokens.push(Token::Number(value));
            }
            ':' => {
                chars.next();
                if chars.next() != Some(':') {
                    return Err("single `:` in type".to_string());
                }
                tokens.push(Token::PathSep);
            }
            '&' => {
                chars.next();
                if chars.peek() == Some(&'&') {
                    chars.next();
                    tokens.push(Token::AmpAmp);
                } else {
                    tokens.push(Token::Amp);
                }
            }
            '<' => {
                chars.next();
                tokens.push(Token::Lt);
            }
            '>' => {
                chars.next();
                tokens.push(Token::Gt);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '*' => {
                chars.next();
                tokens.push(Token::Star);
            }
            '[' => {
                chars.next();
                tokens.push(Token::LBracket);
            }
            ']' => {
                chars.next();
                tokens.push(Token::RBracket);
            }
            other => return Err(format!("unexpected character `{}`", other)),
        }
    }

    Ok(tokens)
}

struct TypeParser {
    tokens: Vec<Token>,
    pos: usize,
}

impl TypeParser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat_ident(&mut self, word: &str) -> bool {
        if matches!(self.peek(), Some(Token::Ident(w)) if w == word) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn skip_ignored_keywords(&mut self) {
        while let Some(Token::Ident(w)) = self.peek() {
            if IGNORED_KEYWORDS.contains(&w.as_str()) {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn parse_type(&mut self) -> Result<TypeExpr, String> {
        let mut is_const = false;
        loop {
            self.skip_ignored_keywords();
            if self.eat_ident("const") {
                is_const = true;
            } else {
                break;
            }
        }

        let mut ty = self.parse_base()?;

        // East const: `A const&`
        loop {
            if self.eat_ident("const") {
                is_const = true;
            } else if !self.eat_ident("volatile") {
                break;
            }
        }
        if is_const {
            ty = ty.constant();
        }

        let mut bounds = Vec::new();
        while let Some(tok) = self.peek().cloned() {
            match tok {
                Token::Star => {
                    self.pos += 1;
                    ty = ty.pointer();
                    if self.eat_ident("const") {
                        ty = ty.constant();
                    }
                }
                Token::Amp => {
                    self.pos += 1;
                    ty = ty.reference();
                }
                Token::AmpAmp => {
                    self.pos += 1;
                    ty = TypeExpr::Reference {
                        referent: Box::new(ty),
                        is_rvalue: true,
                    };
                }
                Token::LBracket => {
                    self.pos += 1;
                    bounds.push(self.parse_bound()?);
                }
                _ => break,
            }
        }

        // `T[2][3]` is an array of two arrays of three: wrap innermost first.
        for bound in bounds.into_iter().rev() {
            ty = ty.array(bound);
        }

        Ok(ty)
    }

    fn parse_bound(&mut self) -> Result<ArrayBound, String> {
        let mut words = Vec::new();
        let mut literal = None;
        loop {
            match self.next() {
                Some(Token::RBracket) => break,
                Some(Token::Number(n)) if words.is_empty() && literal.is_none() => {
                    literal = Some(n)
                }
                Some(tok) => {
                    if let Some(n) = literal.take() {
                        words.push(n.to_string());
                    }
                    words.push(tok.to_string());
                }
                None => return Err("unterminated array bound".to_string()),
            }
        }
        Ok(match (literal, words.is_empty()) {
            (Some(n), true) => ArrayBound::Literal(n),
            (None, true) => ArrayBound::Unsized,
            _ => ArrayBound::Symbolic(words.join("")),
        })
    }

    fn parse_base(&mut self) -> Result<TypeExpr, String> {
        // Multi-word builtins: `unsigned long long int`.
        let mut words = Vec::new();
        while let Some(Token::Ident(w)) = self.peek() {
            if BUILTIN_WORDS.contains(&w.as_str()) {
                words.push(w.clone());
                self.pos += 1;
            } else {
                break;
            }
        }
        if !words.is_empty() {
            return Ok(TypeExpr::Named {
                path: vec![words.join(" ")],
                args: Vec::new(),
            });
        }

        let mut path = Vec::new();
        if self.peek() == Some(&Token::PathSep) {
            // Leading `::` names the global scope.
            self.pos += 1;
        }
        loop {
            match self.next() {
                Some(Token::Ident(name)) => path.push(name),
                Some(tok) => return Err(format!("expected a name, found `{}`", tok)),
                None => return Err("expected a name".to_string()),
            }
            if self.peek() == Some(&Token::PathSep) {
                self.pos += 1;
            } else {
                break;
            }
        }

        let mut args = Vec::new();
        if self.peek() == Some(&Token::Lt) {
            self.pos += 1;
            loop {
                args.push(self.parse_type()?);
                match self.next() {
                    Some(Token::Comma) => continue,
                    Some(Token::Gt) => break,
                    Some(tok) => return Err(format!("expected `,` or `>`, found `{}`", tok)),
                    None => return Err("unterminated template argument list".to_string()),
                }
            }
            // Nested name after a template: `std::ios_base::failure` never
            // takes this path, but `outer<T>::inner` does.
            if self.peek() == Some(&Token::PathSep) {
                return Err("member types of template specializations are not supported".to_string());
            }
        }

        Ok(TypeExpr::Named { path, args })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_builtin_words() {
        let ty = TypeExpr::parse("unsigned long long int").unwrap();
        assert_eq!(ty, TypeExpr::named("unsigned long long int"));
        assert_eq!(TypeExpr::parse("double").unwrap(), TypeExpr::named("double"));
    }

    #[test]
    fn test_parse_const_reference_to_template() {
        let ty = TypeExpr::parse("const std::vector<std::string> &").unwrap();
        let expected = TypeExpr::templated("std::vector", vec![TypeExpr::named("std::string")])
            .constant()
            .reference();
        assert_eq!(ty, expected);
    }

    #[test]
    fn test_parse_east_const_matches_west_const() {
        let west = TypeExpr::parse("const A&").unwrap();
        let east = TypeExpr::parse("A const &").unwrap();
        assert_eq!(west, east);
    }

    #[test]
    fn test_parse_pointer_and_const_pointer() {
        assert_eq!(
            TypeExpr::parse("double*").unwrap(),
            TypeExpr::named("double").pointer()
        );
        assert_eq!(
            TypeExpr::parse("const char *").unwrap(),
            TypeExpr::named("char").constant().pointer()
        );
        assert_eq!(
            TypeExpr::parse("A * const").unwrap(),
            TypeExpr::named("A").pointer().constant()
        );
    }

    #[test]
    fn test_parse_array_bounds() {
        assert_eq!(
            TypeExpr::parse("double[5]").unwrap(),
            TypeExpr::named("double").array(ArrayBound::Literal(5))
        );
        assert_eq!(
            TypeExpr::parse("int[N]").unwrap(),
            TypeExpr::named("int").array(ArrayBound::Symbolic("N".to_string()))
        );
        assert_eq!(
            TypeExpr::parse("int[]").unwrap(),
            TypeExpr::named("int").array(ArrayBound::Unsized)
        );
        assert_eq!(
            TypeExpr::parse("int[2][3]").unwrap(),
            TypeExpr::named("int")
                .array(ArrayBound::Literal(3))
                .array(ArrayBound::Literal(2))
        );
    }

    #[test]
    fn test_parse_nested_templates_with_double_close() {
        let ty = TypeExpr::parse("std::vector<std::vector<int>>").unwrap();
        assert_eq!(ty.to_string(), "std::vector<std::vector<int>>");
    }

    #[test]
    fn test_elaborated_keywords_are_skipped() {
        assert_eq!(TypeExpr::parse("struct B").unwrap(), TypeExpr::named("B"));
        assert_eq!(
            TypeExpr::parse("std::ios_base::failure").unwrap().base_name(),
            Some("failure")
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(TypeExpr::parse("std::vector<int").is_err());
        assert!(TypeExpr::parse("int$").is_err());
        assert!(TypeExpr::parse("A B").is_err());
        assert!(TypeExpr::parse("").is_err());
    }
}
