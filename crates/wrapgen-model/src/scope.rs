//! Declared names and scoped lookup.
//!
//! Lookup follows C++ unqualified lookup for the subset the model needs:
//! search the current scope, then each enclosing scope up to the global
//! one. A qualified reference (`test::A`) is tried relative to each of
//! those scopes as well.

use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use wrapgen_decl::RawType;

/// What a declared name stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolKind {
    /// A class, or a struct with member functions.
    Class,
    /// A plain data struct.
    Struct,
    Enum,
    /// An alias; `scope` is where its underlying type is looked up.
    Typedef { underlying: RawType, scope: Vec<String> },
}

#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: FxHashMap<SmolStr, SymbolKind>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, qualified: &str, kind: SymbolKind) {
        self.symbols.insert(SmolStr::new(qualified), kind);
    }

    pub fn get(&self, qualified: &str) -> Option<&SymbolKind> {
        self.symbols.get(qualified)
    }

    pub fn contains(&self, qualified: &str) -> bool {
        self.symbols.contains_key(qualified)
    }

    /// Resolve `path` as seen from `scope` to its qualified name.
    ///
    /// # Returns
    /// The qualified name and its kind, e.g. `("test::A", Class)` for
    /// path `["A"]` looked up from scope `["test", "B"]`.
    pub fn lookup(&self, path: &[String], scope: &[String]) -> Option<(SmolStr, &SymbolKind)> {
        let mut search_scope = scope.to_vec();
        loop {
            let mut candidate = search_scope.clone();
            candidate.extend(path.iter().cloned());
            let qualified = candidate.join("::");
            if let Some((key, kind)) = self.symbols.get_key_value(qualified.as_str()) {
                return Some((key.clone(), kind));
            }
            if search_scope.pop().is_none() {
                return None;
            }
        }
    }

    /// Convenience wrapper over [`lookup`](Self::lookup) for `a::b` spellings.
    pub fn lookup_name(&self, name: &str, scope: &[String]) -> Option<(SmolStr, &SymbolKind)> {
        let path: Vec<String> = name
            .trim_start_matches("::")
            .split("::")
            .map(String::from)
            .collect();
        self.lookup(&path, scope)
    }
}

/// Split a qualified name into its path segments.
pub fn split_qualified(name: &str) -> Vec<String> {
    if name.is_empty() {
        return Vec::new();
    }
    name.split("::").map(String::from).collect()
}

/// The enclosing scope of a qualified name: `a::b::C` → `["a", "b"]`.
pub fn enclosing_scope(name: &str) -> Vec<String> {
    let mut path = split_qualified(name);
    path.pop();
    path
}

/// The last segment of a qualified name.
pub fn simple_name(name: &str) -> &str {
    name.rsplit("::").next().unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> SymbolTable {
        let mut table = SymbolTable::new();
        table.insert("test::A", SymbolKind::Class);
        table.insert("A", SymbolKind::Struct);
        table.insert("MyEnumClass::MyEnum", SymbolKind::Enum);
        table
    }

    #[test]
    fn test_lookup_prefers_innermost_scope() {
        let table = table();
        let scope = vec!["test".to_string(), "B".to_string()];
        let (name, kind) = table.lookup_name("A", &scope).unwrap();
        assert_eq!(name, "test::A");
        assert_eq!(kind, &SymbolKind::Class);

        let (name, _) = table.lookup_name("A", &[]).unwrap();
        assert_eq!(name, "A");
    }

    #[test]
    fn test_lookup_nested_enum_from_class_scope() {
        let table = table();
        let scope = vec!["MyEnumClass".to_string()];
        let (name, _) = table.lookup_name("MyEnum", &scope).unwrap();
        assert_eq!(name, "MyEnumClass::MyEnum");
        assert!(table.lookup_name("MyEnum", &[]).is_none());
        assert!(table.lookup_name("MyEnumClass::MyEnum", &[]).is_some());
    }

    #[test]
    fn test_name_helpers() {
        assert_eq!(enclosing_scope("a::b::C"), vec!["a", "b"]);
        assert!(enclosing_scope("C").is_empty());
        assert_eq!(simple_name("test::Factory"), "Factory");
        assert!(split_qualified("").is_empty());
    }
}
