//! Inheritance resolution.
//!
//! Runs in two phases. [`InheritanceGraph::build`] resolves base
//! specifiers, rejects cycles and linearizes every class before members
//! are classified. [`resolve_overrides`] runs after classification and
//! computes the effective implementation of every method per class.

use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;
use wrapgen_decl::{Access, RawRecord};

use crate::error::{ModelError, Sink};
use crate::exceptions::ExceptionKind;
use crate::model::{ClassDecl, EffectiveMethod, MethodDecl};
use crate::overload::Signature;
use crate::scope::{enclosing_scope, SymbolTable};
use crate::types::{TypeKind, TypeResolver};

/// A resolved direct base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseEdge {
    pub name: SmolStr,
    pub access: Access,
    pub is_virtual: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ClassNode {
    pub bases: Vec<BaseEdge>,
    pub external_bases: Vec<SmolStr>,
}

/// Standard library classes that may appear as bases without being
/// declared. Anything else spelled `std::...` is accepted as well.
const STD_BASES: &[&str] = &["exception", "runtime_error", "logic_error"];

#[derive(Debug, Default)]
pub struct InheritanceGraph {
    nodes: IndexMap<SmolStr, ClassNode>,
    linearizations: FxHashMap<SmolStr, Vec<SmolStr>>,
    /// Classes on, or deriving from, an inheritance cycle.
    poisoned: FxHashSet<SmolStr>,
}

impl InheritanceGraph {
    /// Resolve the bases of `classes` (qualified name to record) and
    /// linearize each class.
    pub(crate) fn build<'a>(
        classes: impl IntoIterator<Item = (&'a SmolStr, &'a RawRecord)>,
        table: &SymbolTable,
        sink: &mut Sink,
    ) -> Self {
        let resolver = TypeResolver::new(table);
        let mut graph = InheritanceGraph::default();

        for (name, record) in classes {
            let scope = enclosing_scope(name);
            let mut node = ClassNode::default();
            for base in &record.bases {
                let spelled = base.name.trim().trim_start_matches("::");
                if is_external_base(spelled, table, &scope) {
                    node.external_bases.push(SmolStr::new(spelled));
                    continue;
                }
                let context = format!("base list of `{}`", name);
                match resolver.resolve(&spelled.into(), &scope, &context) {
                    Ok(ty) if !ty.is_indirect() => match ty.kind {
                        TypeKind::Class { name: base_name } | TypeKind::Struct { name: base_name } => {
                            node.bases.push(BaseEdge {
                                name: base_name,
                                access: base.access,
                                is_virtual: base.is_virtual,
                            })
                        }
                        _ => sink.error(ModelError::UnresolvedType {
                            symbol: spelled.to_string(),
                            context,
                        }),
                    },
                    Ok(_) => sink.error(ModelError::UnresolvedType {
                        symbol: spelled.to_string(),
                        context,
                    }),
                    Err(err) => sink.error(err),
                }
            }
            graph.nodes.insert(name.clone(), node);
        }

        // A base that resolved to a record outside the graph (e.g. an
        // ignored class reached through a typedef) is not a usable base.
        let known: FxHashSet<SmolStr> = graph.nodes.keys().cloned().collect();
        for (name, node) in graph.nodes.iter_mut() {
            node.bases.retain(|edge| {
                if known.contains(&edge.name) {
                    true
                } else {
                    sink.error(ModelError::UnresolvedType {
                        symbol: edge.name.to_string(),
                        context: format!("base list of `{}`", name),
                    });
                    false
                }
            });
        }

        for cycle in graph.find_cycles() {
            graph.poisoned.extend(cycle.iter().cloned());
            sink.error(ModelError::CyclicInheritance { cycle });
        }
        graph.propagate_poison();

        let names: Vec<SmolStr> = graph.nodes.keys().cloned().collect();
        for name in names {
            if graph.poisoned.contains(&name) {
                continue;
            }
            let mut order = Vec::new();
            let mut seen = FxHashSet::default();
            graph.linearize_into(&name, &mut order, &mut seen);
            graph.linearizations.insert(name, order);
        }
        graph
    }

    pub fn node(&self, name: &str) -> Option<&ClassNode> {
        self.nodes.get(name)
    }

    pub fn is_poisoned(&self, name: &str) -> bool {
        self.poisoned.contains(name)
    }

    /// Self first, then ancestors depth-first in base-list order; a shared
    /// ancestor appears once. `None` for classes on an inheritance cycle.
    pub fn linearization(&self, name: &str) -> Option<&[SmolStr]> {
        self.linearizations.get(name).map(Vec::as_slice)
    }

    /// Whether `base` is a strict ancestor of `derived`.
    pub fn is_derived_from(&self, derived: &str, base: &str) -> bool {
        self.linearization(derived)
            .map(|lin| lin.iter().skip(1).any(|c| c == base))
            .unwrap_or(false)
    }

    /// The exception kind of a class deriving from a standard exception.
    pub fn std_exception_kind(&self, name: &str) -> Option<ExceptionKind> {
        let lin = self.linearization(name)?;
        let mut has_std_base = false;
        for class in lin {
            if let Some(node) = self.nodes.get(class) {
                for base in &node.external_bases {
                    has_std_base = true;
                    if let Some(kind) = ExceptionKind::from_std_name(base) {
                        return Some(kind);
                    }
                }
            }
        }
        has_std_base.then_some(ExceptionKind::Unclassified)
    }

    fn linearize_into(&self, name: &SmolStr, order: &mut Vec<SmolStr>, seen: &mut FxHashSet<SmolStr>) {
        if !seen.insert(name.clone()) {
            return;
        }
        order.push(name.clone());
        if let Some(node) = self.nodes.get(name) {
            for base in &node.bases {
                self.linearize_into(&base.name, order, seen);
            }
        }
    }

    fn find_cycles(&self) -> Vec<Vec<SmolStr>> {
        let mut state = CycleSearch::default();
        for name in self.nodes.keys() {
            if !state.done.contains(name) {
                self.visit(name, &mut state);
            }
        }
        state.cycles
    }

    fn visit(&self, name: &SmolStr, state: &mut CycleSearch) {
        state.stack.push(name.clone());
        state.on_stack.insert(name.clone());
        if let Some(node) = self.nodes.get(name) {
            for base in &node.bases {
                if state.on_stack.contains(&base.name) {
                    let start = state
                        .stack
                        .iter()
                        .position(|c| c == &base.name)
                        .unwrap_or(0);
                    let mut cycle = state.stack[start..].to_vec();
                    cycle.push(base.name.clone());
                    let mut members: Vec<SmolStr> = cycle[..cycle.len() - 1].to_vec();
                    members.sort();
                    if state.reported.insert(members) {
                        state.cycles.push(cycle);
                    }
                } else if !state.done.contains(&base.name) {
                    self.visit(&base.name, state);
                }
            }
        }
        state.stack.pop();
        state.on_stack.remove(name);
        state.done.insert(name.clone());
    }

    fn propagate_poison(&mut self) {
        loop {
            let newly: Vec<SmolStr> = self
                .nodes
                .iter()
                .filter(|(name, node)| {
                    !self.poisoned.contains(*name)
                        && node.bases.iter().any(|b| self.poisoned.contains(&b.name))
                })
                .map(|(name, _)| name.clone())
                .collect();
            if newly.is_empty() {
                break;
            }
            self.poisoned.extend(newly);
        }
    }
}

#[derive(Default)]
struct CycleSearch {
    stack: Vec<SmolStr>,
    on_stack: FxHashSet<SmolStr>,
    done: FxHashSet<SmolStr>,
    reported: FxHashSet<Vec<SmolStr>>,
    cycles: Vec<Vec<SmolStr>>,
}

fn is_external_base(spelled: &str, table: &SymbolTable, scope: &[String]) -> bool {
    if let Some(rest) = spelled.strip_prefix("std::") {
        return !rest.is_empty();
    }
    table.lookup_name(spelled, scope).is_none()
        && (STD_BASES.contains(&spelled) || ExceptionKind::from_std_name(spelled).is_some())
}

/// Compute the override table, abstractness and destructor virtuality of
/// every class, and mark own methods that override or hide an ancestor's.
pub(crate) fn resolve_overrides(
    classes: &mut IndexMap<SmolStr, ClassDecl>,
    graph: &InheritanceGraph,
    sink: &mut Sink,
) {
    struct Resolution {
        overrides: Vec<EffectiveMethod>,
        /// (method index, is_override, is_virtual)
        own_flags: Vec<(usize, bool, bool)>,
        has_virtual_destructor: bool,
    }

    let mut resolutions: Vec<(SmolStr, Resolution)> = Vec::new();
    for (name, class) in classes.iter() {
        let Some(lin) = graph.linearization(name) else {
            continue;
        };

        // Candidates per (name, signature), in linearization order.
        let mut candidates: IndexMap<(SmolStr, Signature), Vec<(&SmolStr, &MethodDecl)>> =
            IndexMap::new();
        for ancestor in lin {
            let Some(decl) = classes.get(ancestor) else {
                continue;
            };
            for method in decl.methods.iter().filter(|m| !m.is_static) {
                candidates
                    .entry((method.name.clone(), method.signature.clone()))
                    .or_default()
                    .push((&decl.name, method));
            }
        }

        let mut overrides = Vec::new();
        for ((method, signature), found) in &candidates {
            // Drop every candidate hidden by a more derived one.
            let winners: Vec<&(&SmolStr, &MethodDecl)> = found
                .iter()
                .filter(|(owner, _)| {
                    !found
                        .iter()
                        .any(|(other, _)| graph.is_derived_from(other, owner))
                })
                .collect();
            let Some(&&(defined_in, winner)) = winners.first() else {
                continue;
            };
            if winners.iter().any(|(_, m)| m.returns != winner.returns) {
                sink.error(ModelError::AmbiguousOverride {
                    class: name.clone(),
                    method: method.clone(),
                    signature: signature.to_string(),
                    candidates: winners.iter().map(|(owner, _)| (*owner).clone()).collect(),
                });
                continue;
            }
            overrides.push(EffectiveMethod {
                name: method.clone(),
                signature: signature.clone(),
                defined_in: defined_in.clone(),
                returns: winner.returns.clone(),
                is_virtual: found.iter().any(|(_, m)| m.is_virtual),
                is_pure_virtual: winner.is_pure_virtual,
                overrides: found
                    .iter()
                    .filter(|(owner, _)| *owner != defined_in)
                    .map(|(owner, _)| (*owner).clone())
                    .collect(),
            });
        }

        let own_flags = class
            .methods
            .iter()
            .enumerate()
            .filter(|(_, m)| !m.is_static)
            .map(|(i, m)| {
                let inherited = candidates
                    .get(&(m.name.clone(), m.signature.clone()))
                    .map(|found| {
                        found
                            .iter()
                            .filter(|(owner, _)| *owner != name)
                            .map(|(_, m)| m.is_virtual)
                            .collect::<Vec<_>>()
                    })
                    .unwrap_or_default();
                let is_override = m.is_override || !inherited.is_empty();
                let is_virtual = m.is_virtual || inherited.iter().any(|v| *v);
                (i, is_override, is_virtual)
            })
            .collect();

        let has_virtual_destructor = lin.iter().any(|ancestor| {
            classes
                .get(ancestor)
                .and_then(|c| c.destructor.as_ref())
                .map(|d| d.is_virtual)
                .unwrap_or(false)
        });

        resolutions.push((
            name.clone(),
            Resolution {
                overrides,
                own_flags,
                has_virtual_destructor,
            },
        ));
    }

    for (name, resolution) in resolutions {
        let Some(class) = classes.get_mut(&name) else {
            continue;
        };
        for (i, is_override, is_virtual) in resolution.own_flags {
            class.methods[i].is_override = is_override;
            class.methods[i].is_virtual = is_virtual;
        }
        class.is_abstract = resolution.overrides.iter().any(|m| m.is_pure_virtual);
        class.overrides = resolution.overrides;
        class.has_virtual_destructor = resolution.has_virtual_destructor;
        if let Some(dtor) = class.destructor.as_mut() {
            dtor.is_virtual |= resolution.has_virtual_destructor;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::SymbolKind;
    use wrapgen_decl::RawRecord;

    fn graph_of(classes: &[(&str, RawRecord)]) -> (InheritanceGraph, Sink) {
        let mut table = SymbolTable::new();
        for (name, _) in classes {
            table.insert(name, SymbolKind::Class);
        }
        let names: Vec<SmolStr> = classes.iter().map(|(n, _)| SmolStr::new(*n)).collect();
        let mut sink = Sink::default();
        let graph = InheritanceGraph::build(
            names.iter().zip(classes.iter().map(|(_, r)| r)),
            &table,
            &mut sink,
        );
        (graph, sink)
    }

    #[test]
    fn test_single_chain_linearization() {
        let (graph, sink) = graph_of(&[
            ("Base1", RawRecord::new()),
            ("Base2", RawRecord::new().base("Base1")),
            ("A", RawRecord::new().base("Base2")),
        ]);
        assert!(!sink.has_errors());
        assert_eq!(graph.linearization("A").unwrap(), &["A", "Base2", "Base1"]);
        assert!(graph.is_derived_from("A", "Base1"));
        assert!(!graph.is_derived_from("Base1", "A"));
        assert!(!graph.is_derived_from("A", "A"));
    }

    #[test]
    fn test_diamond_visits_shared_ancestor_once() {
        let (graph, _) = graph_of(&[
            ("Root", RawRecord::new()),
            ("Left", RawRecord::new().base("Root")),
            ("Right", RawRecord::new().base("Root")),
            ("Bottom", RawRecord::new().base("Left").base("Right")),
        ]);
        assert_eq!(
            graph.linearization("Bottom").unwrap(),
            &["Bottom", "Left", "Root", "Right"]
        );
    }

    #[test]
    fn test_cycle_is_reported_once_and_poisons_descendants() {
        let (graph, sink) = graph_of(&[
            ("X", RawRecord::new().base("Y")),
            ("Y", RawRecord::new().base("X")),
            ("Z", RawRecord::new().base("X")),
            ("Ok", RawRecord::new()),
        ]);
        let cycles: Vec<_> = sink
            .errors
            .iter()
            .filter(|e| matches!(e, ModelError::CyclicInheritance { .. }))
            .collect();
        assert_eq!(cycles.len(), 1);
        assert!(graph.linearization("X").is_none());
        assert!(graph.is_poisoned("Z"));
        assert!(graph.linearization("Ok").is_some());
    }

    #[test]
    fn test_unknown_base_and_std_base() {
        let (graph, sink) = graph_of(&[
            ("Err", RawRecord::new().base("std::out_of_range")),
            ("Sub", RawRecord::new().base("Err")),
            ("Orphan", RawRecord::new().base("Missing")),
        ]);
        assert_eq!(graph.node("Err").unwrap().external_bases, vec!["std::out_of_range"]);
        assert_eq!(graph.std_exception_kind("Sub"), Some(ExceptionKind::OutOfRange));
        assert_eq!(graph.std_exception_kind("Orphan"), None);
        assert!(matches!(
            &sink.errors[..],
            [ModelError::UnresolvedType { symbol, .. }] if symbol == "Missing"
        ));
    }
}
