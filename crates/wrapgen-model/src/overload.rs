//! Overload grouping.
//!
//! Every callable name (constructors included) gets one group per owner.
//! Groups record the full parameter-type signature of each member so a
//! generator can choose native overloading, type-tagged suffixes, or a
//! single dispatching entry point.

use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use serde::Serialize;
use smol_str::SmolStr;
use std::fmt;

use crate::types::TypeRef;

/// Identity of a callable within an overload group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Signature {
    /// Canonical parameter type spellings.
    pub params: Vec<SmolStr>,
    pub is_const: bool,
}

impl Signature {
    pub fn new(params: Vec<SmolStr>, is_const: bool) -> Self {
        Self { params, is_const }
    }

    pub fn of<'a>(params: impl IntoIterator<Item = &'a TypeRef>, is_const: bool) -> Self {
        Self {
            params: params.into_iter().map(TypeRef::canonical).collect(),
            is_const,
        }
    }

    /// The signature with only the first `n` parameters.
    pub fn prefix(&self, n: usize) -> Self {
        Self {
            params: self.params[..n.min(self.params.len())].to_vec(),
            is_const: self.is_const,
        }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// A suffix usable to disambiguate overloads in targets without
    /// overloading, e.g. `_int_double` or `_void`.
    pub fn tag_suffix(&self) -> String {
        if self.params.is_empty() {
            return "_void".to_string();
        }
        let mut out = String::new();
        for param in &self.params {
            out.push('_');
            let mut last_sep = false;
            for c in param.chars() {
                if c.is_ascii_alphanumeric() {
                    out.push(c);
                    last_sep = false;
                } else if c == '*' {
                    out.push_str("ptr");
                    last_sep = false;
                } else if c == '&' {
                    out.push_str("ref");
                    last_sep = false;
                } else if !last_sep && !out.ends_with('_') {
                    out.push('_');
                    last_sep = true;
                }
            }
            while out.ends_with('_') {
                out.pop();
            }
        }
        out
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.params.join(", "))?;
        if self.is_const {
            f.write_str(" const")?;
        }
        Ok(())
    }
}

/// Index of an overload group in its owner's group table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct OverloadGroupId(pub u32);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverloadGroup {
    pub id: OverloadGroupId,
    pub name: SmolStr,
    /// Member signatures in declaration order. No two share a parameter
    /// type sequence.
    pub signatures: Vec<Signature>,
}

impl OverloadGroup {
    pub fn is_overloaded(&self) -> bool {
        self.signatures.len() > 1
    }

    pub fn contains(&self, signature: &Signature) -> bool {
        self.signatures.contains(signature)
    }

    /// Whether a member already takes exactly these parameter types,
    /// regardless of `const`.
    pub fn takes(&self, params: &[SmolStr]) -> bool {
        self.signatures.iter().any(|s| s.params == params)
    }
}

/// The overload groups of one owner (a class, or the free-function scope).
#[derive(Debug, Default)]
pub(crate) struct OverloadTable {
    groups: IndexMap<SmolStr, OverloadGroup>,
    /// Every call shape already taken, declared or produced by default
    /// expansion.
    claimed: FxHashSet<(SmolStr, Vec<SmolStr>)>,
}

impl OverloadTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `signature` under `name`. Returns the group id, or `None` if the
    /// group already has a member with the same parameter types; a `const`
    /// qualifier alone does not distinguish two members.
    pub fn register(&mut self, name: &str, signature: Signature) -> Option<OverloadGroupId> {
        let next_id = OverloadGroupId(self.groups.len() as u32);
        let group = self
            .groups
            .entry(SmolStr::new(name))
            .or_insert_with(|| OverloadGroup {
                id: next_id,
                name: SmolStr::new(name),
                signatures: Vec::new(),
            });
        if group.takes(&signature.params) {
            return None;
        }
        self.claimed.insert((group.name.clone(), signature.params.clone()));
        group.signatures.push(signature);
        Some(group.id)
    }

    pub fn group(&self, name: &str) -> Option<&OverloadGroup> {
        self.groups.get(name)
    }

    /// Claim the call shape `signature` of `name` for a default-expanded
    /// form. Fails if a declaration or an earlier expansion already has it.
    pub fn claim_form(&mut self, name: &str, signature: Signature) -> bool {
        self.claimed.insert((SmolStr::new(name), signature.params))
    }

    pub fn into_groups(self) -> Vec<OverloadGroup> {
        self.groups.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Primitive;

    fn sig(params: &[&str]) -> Signature {
        Signature::new(params.iter().map(|p| SmolStr::new(*p)).collect(), false)
    }

    #[test]
    fn test_signature_display() {
        let sig = Signature::of(
            &[
                TypeRef::primitive(Primitive::Int),
                TypeRef::primitive(Primitive::Double),
            ],
            true,
        );
        assert_eq!(sig.to_string(), "(int, double) const");
        assert_eq!(sig.prefix(1).to_string(), "(int) const");
    }

    #[test]
    fn test_tag_suffix() {
        assert_eq!(sig(&[]).tag_suffix(), "_void");
        assert_eq!(sig(&["int", "double"]).tag_suffix(), "_int_double");
        assert_eq!(
            sig(&["const std::vector<std::string>&"]).tag_suffix(),
            "_const_std_vector_std_string_ref"
        );
        assert_eq!(sig(&["unsigned int", "A*"]).tag_suffix(), "_unsigned_int_Aptr");
    }

    #[test]
    fn test_register_groups_by_name_and_rejects_duplicates() {
        let mut table = OverloadTable::new();
        let a = table.register("operator+", sig(&["int"])).unwrap();
        let b = table.register("operator+", sig(&["double"])).unwrap();
        let c = table.register("size", sig(&[])).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(table.register("operator+", sig(&["int"])).is_none());

        let group = table.group("operator+").unwrap();
        assert!(group.is_overloaded());
        assert!(!table.group("size").unwrap().is_overloaded());
    }

    #[test]
    fn test_claim_form_rejects_declared_and_earlier_forms() {
        let mut table = OverloadTable::new();
        table.register("mult", sig(&["int"]));
        table.register("mult", sig(&[]));
        table.register("half", sig(&["bool"]));

        assert!(!table.claim_form("mult", sig(&[])));
        assert!(table.claim_form("half", sig(&[])));
        assert!(!table.claim_form("half", sig(&[])));
        assert!(table.claim_form("other", sig(&[])));
    }

    #[test]
    fn test_const_qualifier_does_not_split_overloads() {
        let mut table = OverloadTable::new();
        let mutable = table.register("get", sig(&["int"])).unwrap();
        assert!(table
            .register("get", Signature::new(vec![SmolStr::new("int")], true))
            .is_none());
        assert!(table
            .register("get", Signature::new(vec![SmolStr::new("double")], true))
            .is_some_and(|id| id == mutable));

        let group = table.group("get").unwrap();
        assert_eq!(group.signatures.len(), 2);
        assert!(!group.signatures[0].is_const);
        assert!(!table.claim_form("get", Signature::new(vec![SmolStr::new("double")], false)));
    }
}
