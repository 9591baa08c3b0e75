//! Build the runtime catalog from entity declarations.

use crate::catalog::resolved::*;
use crate::catalog::types::*;
use crate::catalog::validate;
use crate::error::CatalogError;
use crate::sql::quote_ident;
use regex::Regex;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Validate declarations and build the resolved catalog for `schema`.
pub fn resolve(def: &CatalogDef, schema: &str) -> Result<Catalog, CatalogError> {
    validate(def)?;

    let sets_by_name: HashMap<&str, &StatusSet> = def.status_sets.iter().map(|s| (s.name.as_str(), s)).collect();
    let table_by_segment: HashMap<&str, &str> = def
        .entities
        .iter()
        .map(|e| (e.segment.as_str(), e.table.as_str()))
        .collect();

    let mut entities = Vec::with_capacity(def.entities.len());
    let mut entity_by_segment = HashMap::new();

    for e in &def.entities {
        let status = match &e.status {
            Some(name) => Some(
                sets_by_name
                    .get(name.as_str())
                    .map(|s| (*s).clone())
                    .ok_or_else(|| CatalogError::MissingReference {
                        kind: "status set",
                        id: name.clone(),
                    })?,
            ),
            None => None,
        };

        let mut columns = vec![ColumnInfo {
            name: "id".into(),
            kind: None,
            is_pk: true,
            nullable: false,
            default: None,
            pg_type: "bigint".into(),
            ddl_type: "BIGSERIAL".into(),
            unique: false,
            indexed: false,
            sensitive: false,
            foreign_key: None,
        }];
        let mut fillable = Vec::new();
        let mut searchable = Vec::new();
        let mut sortable: HashSet<String> = ["id", "created_at", "updated_at"].iter().map(|s| s.to_string()).collect();
        let mut exportable = vec!["id".to_string()];
        let mut unique_columns = Vec::new();
        let mut phone_columns = Vec::new();
        let mut rules = BTreeMap::new();
        let mut images = BTreeMap::new();
        let mut patterns = HashMap::new();
        let mut slug = None;

        for f in &e.fields {
            let foreign_key = match &f.references {
                Some(r) => Some(ForeignKey {
                    table: table_by_segment
                        .get(r.entity.as_str())
                        .map(|t| t.to_string())
                        .ok_or_else(|| CatalogError::MissingReference {
                            kind: "entity",
                            id: r.entity.clone(),
                        })?,
                    on_delete: r.on_delete,
                }),
                None => None,
            };
            columns.push(ColumnInfo {
                name: f.name.clone(),
                kind: Some(f.kind),
                is_pk: false,
                nullable: f.nullable,
                default: f.default.clone(),
                pg_type: cast_type(f.kind).into(),
                ddl_type: ddl_type(f),
                unique: f.rule.unique,
                indexed: f.indexed,
                sensitive: f.sensitive,
                foreign_key,
            });
            if f.fillable {
                fillable.push(f.name.clone());
            }
            if f.searchable {
                searchable.push(f.name.clone());
            }
            if f.sortable {
                sortable.insert(f.name.clone());
            }
            if f.exportable && !f.sensitive {
                exportable.push(f.name.clone());
            }
            if f.rule.unique {
                unique_columns.push(f.name.clone());
            }
            if f.rule.format.as_deref() == Some("phone") {
                phone_columns.push(f.name.clone());
            }
            if f.rule != ValidationRule::default() {
                rules.insert(f.name.clone(), f.rule.clone());
            }
            if let Some(pattern) = &f.rule.pattern {
                let re = Regex::new(pattern).map_err(|err| {
                    CatalogError::Validation(format!("{}.{}: invalid pattern: {}", e.segment, f.name, err))
                })?;
                patterns.insert(f.name.clone(), re);
            }
            if let Some(img) = &f.image {
                images.insert(f.name.clone(), img.clone());
            }
            if let Some(src) = &f.slug_from {
                slug = Some(SlugSpec {
                    column: f.name.clone(),
                    source: src.clone(),
                });
            }
        }

        if let Some(set) = &status {
            columns.push(ColumnInfo {
                name: "status".into(),
                kind: None,
                is_pk: false,
                nullable: false,
                default: Some(format!("'{}'", set.default.replace('\'', "''"))),
                pg_type: format!("{}.{}", schema, set.name),
                ddl_type: format!("{}.{}", quote_ident(schema), quote_ident(&set.name)),
                unique: false,
                indexed: true,
                sensitive: false,
                foreign_key: None,
            });
            fillable.push("status".into());
            sortable.insert("status".into());
            exportable.push("status".into());
            rules.insert(
                "status".into(),
                ValidationRule {
                    allowed: Some(set.values.iter().map(|v| serde_json::Value::String(v.clone())).collect()),
                    ..ValidationRule::default()
                },
            );
        }

        for name in ["created_at", "updated_at"] {
            columns.push(ColumnInfo {
                name: name.into(),
                kind: Some(FieldKind::Timestamp),
                is_pk: false,
                nullable: false,
                default: Some("NOW()".into()),
                pg_type: "timestamptz".into(),
                ddl_type: "TIMESTAMPTZ".into(),
                unique: false,
                indexed: false,
                sensitive: false,
                foreign_key: None,
            });
            exportable.push(name.into());
        }

        let includes = build_includes(e, &def.entities);
        let morph = e.morph.as_ref().map(|m| MorphSpec {
            name: m.name.clone(),
            type_column: m.type_column.clone(),
            id_column: m.id_column.clone(),
            targets: m.targets.iter().cloned().collect(),
        });

        let entity = ResolvedEntity {
            segment: e.segment.clone(),
            schema_name: schema.to_string(),
            table_name: e.table.clone(),
            pk_column: "id".into(),
            label_column: e.label.clone(),
            columns,
            fillable,
            searchable,
            sortable,
            exportable,
            unique_columns,
            phone_columns,
            rules,
            patterns,
            images,
            slug,
            status,
            includes,
            morph,
            operations: e.operations.clone(),
        };
        entity_by_segment.insert(e.segment.clone(), entities.len());
        entities.push(entity);
    }

    Ok(Catalog {
        schema: schema.to_string(),
        status_sets: def.status_sets.clone(),
        entities,
        entity_by_segment,
    })
}

/// to_one for each of our references; to_many for each entity referencing us.
fn build_includes(ours: &EntityDef, all: &[EntityDef]) -> Vec<IncludeSpec> {
    let mut includes = Vec::new();
    for f in &ours.fields {
        if let Some(r) = &f.references {
            includes.push(IncludeSpec {
                name: r.name.clone(),
                direction: IncludeDirection::ToOne,
                related_segment: r.entity.clone(),
                our_key_column: f.name.clone(),
                their_key_column: "id".into(),
            });
        }
    }
    for other in all {
        for f in &other.fields {
            let Some(r) = &f.references else { continue };
            if r.entity == ours.segment {
                includes.push(IncludeSpec {
                    name: other.segment.clone(),
                    direction: IncludeDirection::ToMany,
                    related_segment: other.segment.clone(),
                    our_key_column: "id".into(),
                    their_key_column: f.name.clone(),
                });
            }
        }
    }
    includes
}

/// Type used in `$n::<type>` so text and JSON parameters land in the right column type.
fn cast_type(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::Text | FieldKind::LongText => "text",
        FieldKind::Integer => "integer",
        FieldKind::BigInt => "bigint",
        FieldKind::Decimal => "numeric",
        FieldKind::Boolean => "boolean",
        FieldKind::Timestamp => "timestamptz",
        FieldKind::Date => "date",
        FieldKind::Json => "jsonb",
    }
}

fn ddl_type(f: &FieldDef) -> String {
    match f.kind {
        FieldKind::Text => format!("VARCHAR({})", f.rule.max_length.unwrap_or(255)),
        FieldKind::LongText => "TEXT".into(),
        FieldKind::Integer => "INTEGER".into(),
        FieldKind::BigInt => "BIGINT".into(),
        FieldKind::Decimal => "NUMERIC(12, 2)".into(),
        FieldKind::Boolean => "BOOLEAN".into(),
        FieldKind::Timestamp => "TIMESTAMPTZ".into(),
        FieldKind::Date => "DATE".into(),
        FieldKind::Json => "JSONB".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::cms_catalog;

    fn catalog() -> Catalog {
        resolve(&cms_catalog(), "cms").expect("catalog resolves")
    }

    #[test]
    fn every_entity_has_id_and_timestamps() {
        let c = catalog();
        for e in &c.entities {
            assert!(e.column("id").map(|c| c.is_pk).unwrap_or(false), "{}", e.segment);
            assert!(e.column("created_at").is_some());
            assert!(e.column("updated_at").is_some());
        }
    }

    #[test]
    fn status_column_uses_schema_qualified_enum() {
        let c = catalog();
        let posts = c.entity("posts").expect("posts");
        let status = posts.column("status").expect("status column");
        assert_eq!(status.pg_type, "cms.publish_status");
        assert_eq!(status.default.as_deref(), Some("'draft'"));
        assert!(posts.soft_deletes());
        assert!(!c.entity("seminars").expect("seminars").soft_deletes());
    }

    #[test]
    fn guarded_fields_are_not_fillable() {
        let c = catalog();
        let posts = c.entity("posts").expect("posts");
        assert!(posts.is_fillable("title"));
        assert!(posts.is_fillable("status"));
        assert!(!posts.is_fillable("views"));
        assert!(!posts.is_fillable("id"));
        assert!(!posts.is_fillable("created_at"));
    }

    #[test]
    fn sensitive_columns_are_hidden_and_not_exported() {
        let c = catalog();
        let users = c.entity("users").expect("users");
        assert!(users.visible_columns().all(|c| c.name != "password_hash"));
        assert!(!users.exportable.iter().any(|c| c == "password_hash"));
    }

    #[test]
    fn includes_cover_both_directions() {
        let c = catalog();
        let posts = c.entity("posts").expect("posts");
        let author = posts.include("author").expect("author include");
        assert_eq!(author.direction, IncludeDirection::ToOne);
        assert_eq!(author.related_segment, "users");
        assert_eq!(author.our_key_column, "author_id");
        let comments = posts.include("comments").expect("comments include");
        assert_eq!(comments.direction, IncludeDirection::ToMany);
        assert_eq!(comments.their_key_column, "post_id");
    }

    #[test]
    fn slug_and_phone_columns_are_resolved() {
        let c = catalog();
        let pages = c.entity("business-pages").expect("business pages");
        let slug = pages.slug.as_ref().expect("slug spec");
        assert_eq!(slug.column, "custom_url");
        assert_eq!(slug.source, "name");
        assert!(pages.unique_columns.contains(&"custom_url".to_string()));
        assert_eq!(pages.phone_columns, vec!["phone".to_string()]);
    }

    #[test]
    fn pattern_rules_are_compiled_once() {
        let c = catalog();
        let subs = c.entity("subscriptions").expect("subscriptions");
        let currency = subs.patterns.get("currency").expect("currency pattern");
        assert!(currency.is_match("USD"));
        assert!(!currency.is_match("usd"));
        assert!(c.entity("posts").expect("posts").patterns.is_empty());
    }

    #[test]
    fn read_only_entities_expose_index_show_export() {
        let c = catalog();
        let views = c.entity("page-views").expect("page views");
        assert!(views.allows(Operation::Index));
        assert!(views.allows(Operation::Export));
        assert!(!views.allows(Operation::Store));
        assert!(!views.allows(Operation::Destroy));
    }
}
