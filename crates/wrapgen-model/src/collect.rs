//! Declaration collection: builds the symbol table and sorts raw
//! declarations into records, enums and free functions before any type is
//! resolved.

use indexmap::IndexMap;
use smol_str::SmolStr;
use wrapgen_common::SourceLocation;
use wrapgen_config::ModelConfig;
use wrapgen_decl::{DeclUnit, RawDeclKind, RawEnum, RawFunction, RawMemberKind, RawRecord, RawType};

use crate::model::{EnumScope, RecordKind};
use crate::scope::{enclosing_scope, split_qualified, SymbolKind, SymbolTable};

pub(crate) struct RecordSource<'a> {
    pub record: &'a RawRecord,
    pub declared_as: RecordKind,
    /// Modeled as a class (it has member functions or takes part in
    /// inheritance) rather than a plain struct.
    pub is_class: bool,
    pub location: &'a SourceLocation,
}

pub(crate) struct EnumSource<'a> {
    pub name: SmolStr,
    pub raw: &'a RawEnum,
    pub scope: EnumScope,
    pub location: &'a SourceLocation,
}

pub(crate) struct FunctionSource<'a> {
    pub name: SmolStr,
    pub function: &'a RawFunction,
    pub location: &'a SourceLocation,
}

pub(crate) struct Collected<'a> {
    pub table: SymbolTable,
    pub records: IndexMap<SmolStr, RecordSource<'a>>,
    pub enums: Vec<EnumSource<'a>>,
    pub functions: Vec<FunctionSource<'a>>,
}

impl<'a> Collected<'a> {
    pub fn classes(&self) -> impl Iterator<Item = (&SmolStr, &RecordSource<'a>)> {
        self.records.iter().filter(|(_, r)| r.is_class)
    }

    pub fn structs(&self) -> impl Iterator<Item = (&SmolStr, &RecordSource<'a>)> {
        self.records.iter().filter(|(_, r)| !r.is_class)
    }
}

pub(crate) fn collect<'a>(unit: &'a DeclUnit, config: &ModelConfig) -> Collected<'a> {
    let mut collected = Collected {
        table: SymbolTable::new(),
        records: IndexMap::new(),
        enums: Vec::new(),
        functions: Vec::new(),
    };

    for (alias, target) in &config.types.aliases {
        collected.table.insert(
            alias.trim(),
            SymbolKind::Typedef {
                underlying: RawType::from(target.as_str()),
                scope: Vec::new(),
            },
        );
    }

    let mut decls = unit.decls.iter().peekable();
    while let Some(decl) = decls.next() {
        match &decl.kind {
            RawDeclKind::Class(record) | RawDeclKind::Struct(record) => {
                let declared_as = match decl.kind {
                    RawDeclKind::Class(_) => RecordKind::Class,
                    _ => RecordKind::Struct,
                };
                let name = if decl.name.is_empty() {
                    // `typedef struct { .. } B;` arrives as an unnamed
                    // record followed by the typedef that names it.
                    let typedef_name = decls.peek().and_then(|next| match next.kind {
                        RawDeclKind::Typedef(_) if !next.name.is_empty() => Some(next.name.clone()),
                        _ => None,
                    });
                    match typedef_name {
                        Some(alias) => {
                            decls.next();
                            alias
                        }
                        None => {
                            tracing::debug!(location = %decl.location, "skipping unnamed record");
                            continue;
                        }
                    }
                } else {
                    decl.name.clone()
                };
                collect_record(&mut collected, config, &name, record, declared_as, &decl.location);
            }
            RawDeclKind::Enum(raw) => {
                collected.table.insert(&decl.name, SymbolKind::Enum);
                collected.enums.push(EnumSource {
                    name: SmolStr::new(&decl.name),
                    raw,
                    scope: EnumScope::Free,
                    location: &decl.location,
                });
            }
            RawDeclKind::Function(function) => collected.functions.push(FunctionSource {
                name: SmolStr::new(&decl.name),
                function,
                location: &decl.location,
            }),
            RawDeclKind::Typedef(typedef) => {
                // A source typedef never overrides a configured alias.
                if !collected.table.contains(&decl.name) {
                    collected.table.insert(
                        &decl.name,
                        SymbolKind::Typedef {
                            underlying: typedef.underlying.clone(),
                            scope: enclosing_scope(&decl.name),
                        },
                    );
                }
            }
        }
    }

    promote_base_structs(&mut collected);
    collected
}

fn collect_record<'a>(
    collected: &mut Collected<'a>,
    config: &ModelConfig,
    name: &str,
    record: &'a RawRecord,
    declared_as: RecordKind,
    location: &'a SourceLocation,
) {
    if config.is_class_ignored(name) {
        tracing::debug!(class = name, "ignored by configuration");
        return;
    }
    if collected.records.contains_key(name) {
        tracing::debug!(class = name, "duplicate definition; keeping the first");
        return;
    }

    let has_functions = record
        .members
        .iter()
        .any(|m| matches!(m.kind, RawMemberKind::Function(_)));
    let is_class =
        declared_as == RecordKind::Class || has_functions || !record.bases.is_empty();

    collected.table.insert(
        name,
        if is_class {
            SymbolKind::Class
        } else {
            SymbolKind::Struct
        },
    );

    let class_scope = split_qualified(name);
    for member in &record.members {
        let qualified = format!("{}::{}", name, member.name);
        match &member.kind {
            RawMemberKind::Enum(raw) => {
                collected.table.insert(&qualified, SymbolKind::Enum);
                collected.enums.push(EnumSource {
                    name: SmolStr::new(&qualified),
                    raw,
                    scope: EnumScope::Nested {
                        class: SmolStr::new(name),
                    },
                    location: &member.location,
                });
            }
            RawMemberKind::Typedef(typedef) => collected.table.insert(
                &qualified,
                SymbolKind::Typedef {
                    underlying: typedef.underlying.clone(),
                    scope: class_scope.clone(),
                },
            ),
            RawMemberKind::Field { .. } | RawMemberKind::Function(_) => {}
        }
    }

    collected.records.insert(
        SmolStr::new(name),
        RecordSource {
            record,
            declared_as,
            is_class,
            location,
        },
    );
}

/// A plain struct named as a base of another record takes part in the
/// inheritance graph, so it is modeled as a class.
fn promote_base_structs(collected: &mut Collected<'_>) {
    let mut promote = Vec::new();
    for (name, source) in &collected.records {
        let scope = enclosing_scope(name);
        for base in &source.record.bases {
            if let Some((qualified, SymbolKind::Struct)) = collected.table.lookup_name(&base.name, &scope) {
                promote.push(qualified);
            }
        }
    }
    for name in promote {
        collected.table.insert(&name, SymbolKind::Class);
        if let Some(source) = collected.records.get_mut(&name) {
            source.is_class = true;
        }
    }
}
