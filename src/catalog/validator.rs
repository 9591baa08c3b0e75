//! Catalog validation: referential integrity and route consistency.

use crate::catalog::{CatalogDef, FieldKind};
use crate::error::CatalogError;
use regex::Regex;
use std::collections::HashSet;

/// Columns every table gets; declarations must not redeclare them.
pub const RESERVED_COLUMNS: &[&str] = &["id", "status", "created_at", "updated_at"];

pub fn validate(def: &CatalogDef) -> Result<(), CatalogError> {
    let mut set_names = HashSet::new();
    for set in &def.status_sets {
        if !set_names.insert(set.name.as_str()) {
            return Err(CatalogError::Validation(format!("duplicate status set '{}'", set.name)));
        }
        if set.values.is_empty() {
            return Err(CatalogError::Validation(format!("status set '{}' has no values", set.name)));
        }
        if !set.contains(&set.default) {
            return Err(CatalogError::Validation(format!(
                "status set '{}': default '{}' is not one of its values",
                set.name, set.default
            )));
        }
    }

    let mut segments: HashSet<&str> = HashSet::new();
    let mut tables: HashSet<&str> = HashSet::new();
    for e in &def.entities {
        if !segments.insert(e.segment.as_str()) {
            return Err(CatalogError::DuplicateSegment(e.segment.clone()));
        }
        if !tables.insert(e.table.as_str()) {
            return Err(CatalogError::Validation(format!("duplicate table '{}'", e.table)));
        }
        if let Some(set) = &e.status {
            if !set_names.contains(set.as_str()) {
                return Err(CatalogError::MissingReference {
                    kind: "status set",
                    id: set.clone(),
                });
            }
        }

        let field_names: HashSet<&str> = e.fields.iter().map(|f| f.name.as_str()).collect();
        if field_names.len() != e.fields.len() {
            return Err(CatalogError::Validation(format!("{}: duplicate field name", e.segment)));
        }
        if e.label != "id" && !field_names.contains(e.label.as_str()) {
            return Err(CatalogError::MissingReference {
                kind: "label column",
                id: format!("{}.{}", e.segment, e.label),
            });
        }

        for f in &e.fields {
            if RESERVED_COLUMNS.contains(&f.name.as_str()) {
                return Err(CatalogError::ReservedColumn {
                    entity: e.segment.clone(),
                    column: f.name.clone(),
                });
            }
            if let Some(src) = &f.slug_from {
                if !field_names.contains(src.as_str()) {
                    return Err(CatalogError::MissingReference {
                        kind: "slug source",
                        id: format!("{}.{}", e.segment, src),
                    });
                }
            }
            if f.image.is_some() && f.kind != FieldKind::Text {
                return Err(CatalogError::Validation(format!(
                    "{}.{}: image fields must be text (they hold the stored path)",
                    e.segment, f.name
                )));
            }
            if let Some(p) = &f.rule.pattern {
                Regex::new(p).map_err(|err| {
                    CatalogError::Validation(format!("{}.{}: invalid pattern: {}", e.segment, f.name, err))
                })?;
            }
            if let Some(r) = &f.references {
                // Parents must be declared first so tables exist before their foreign keys.
                if !segments.contains(r.entity.as_str()) {
                    return Err(CatalogError::MissingReference {
                        kind: "entity",
                        id: r.entity.clone(),
                    });
                }
            }
        }

        if let Some(m) = &e.morph {
            for col in [&m.type_column, &m.id_column] {
                if !field_names.contains(col.as_str()) {
                    return Err(CatalogError::MissingReference {
                        kind: "morph column",
                        id: format!("{}.{}", e.segment, col),
                    });
                }
            }
        }
    }

    for e in &def.entities {
        if let Some(m) = &e.morph {
            for (_, target) in &m.targets {
                if !segments.contains(target.as_str()) {
                    return Err(CatalogError::MissingReference {
                        kind: "morph target",
                        id: target.clone(),
                    });
                }
            }
        }
    }

    Ok(())
}
