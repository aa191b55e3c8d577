use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a declaration came from in the original header.
///
/// Locations are optional throughout: a front-end that cannot supply them
/// leaves the default (no file, line 0).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub column: u32,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file: Some(file.into()),
            line,
            column,
        }
    }

    pub fn is_known(&self) -> bool {
        self.file.is_some() || self.line != 0
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{}:{}:{}", file, self.line, self.column),
            None if self.line != 0 => write!(f, "<unknown>:{}:{}", self.line, self.column),
            None => f.write_str("<unknown>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_known_and_unknown() {
        let loc = SourceLocation::new("test1.hpp", 12, 5);
        assert_eq!(loc.to_string(), "test1.hpp:12:5");
        assert!(loc.is_known());

        let unknown = SourceLocation::default();
        assert_eq!(unknown.to_string(), "<unknown>");
        assert!(!unknown.is_known());
    }
}
