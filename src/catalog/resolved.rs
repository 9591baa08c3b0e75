//! Resolved catalog: declarations validated and flattened for runtime use.

use crate::catalog::{FieldKind, ImageRule, Operation, OnDelete, StatusSet, ValidationRule};
use regex::Regex;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Direction of a related-include: to_one (we have FK to them) or to_many (they have FK to us).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IncludeDirection {
    ToOne,
    ToMany,
}

/// Spec for including a related entity in list/read responses.
#[derive(Clone, Debug)]
pub struct IncludeSpec {
    /// API name for the include: the reference name for to_one, the related segment for to_many.
    pub name: String,
    pub direction: IncludeDirection,
    pub related_segment: String,
    /// Our column used in the join (our FK for to_one; our PK for to_many).
    pub our_key_column: String,
    /// Their column used in the join (their PK for to_one; their FK for to_many).
    pub their_key_column: String,
}

#[derive(Clone, Debug)]
pub struct ForeignKey {
    pub table: String,
    pub on_delete: OnDelete,
}

#[derive(Clone, Debug)]
pub struct ColumnInfo {
    pub name: String,
    /// None for the primary key and the status column.
    pub kind: Option<FieldKind>,
    pub is_pk: bool,
    pub nullable: bool,
    /// SQL default expression.
    pub default: Option<String>,
    /// Type used in `$n::<type>` casts when binding values.
    pub pg_type: String,
    /// Column DDL type.
    pub ddl_type: String,
    pub unique: bool,
    pub indexed: bool,
    pub sensitive: bool,
    pub foreign_key: Option<ForeignKey>,
}

impl ColumnInfo {
    pub fn has_default(&self) -> bool {
        self.default.is_some() || self.is_pk
    }

    pub fn is_integer(&self) -> bool {
        self.is_pk || matches!(self.kind, Some(FieldKind::Integer) | Some(FieldKind::BigInt))
    }

    pub fn is_bool(&self) -> bool {
        matches!(self.kind, Some(FieldKind::Boolean))
    }
}

#[derive(Clone, Debug)]
pub struct SlugSpec {
    pub column: String,
    pub source: String,
}

#[derive(Clone, Debug)]
pub struct MorphSpec {
    pub name: String,
    pub type_column: String,
    pub id_column: String,
    /// type value -> entity segment
    pub targets: BTreeMap<String, String>,
}

#[derive(Clone, Debug)]
pub struct ResolvedEntity {
    pub segment: String,
    pub schema_name: String,
    pub table_name: String,
    pub pk_column: String,
    pub label_column: String,
    pub columns: Vec<ColumnInfo>,
    /// Mass-assignment allow-list.
    pub fillable: Vec<String>,
    pub searchable: Vec<String>,
    pub sortable: HashSet<String>,
    pub exportable: Vec<String>,
    pub unique_columns: Vec<String>,
    pub phone_columns: Vec<String>,
    pub rules: BTreeMap<String, ValidationRule>,
    /// `pattern` rules compiled once at resolve time.
    pub patterns: HashMap<String, Regex>,
    pub images: BTreeMap<String, ImageRule>,
    pub slug: Option<SlugSpec>,
    pub status: Option<StatusSet>,
    pub includes: Vec<IncludeSpec>,
    pub morph: Option<MorphSpec>,
    pub operations: Vec<Operation>,
}

impl ResolvedEntity {
    pub fn allows(&self, op: Operation) -> bool {
        self.operations.contains(&op)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Columns that are ever selected or returned.
    pub fn visible_columns(&self) -> impl Iterator<Item = &ColumnInfo> {
        self.columns.iter().filter(|c| !c.sensitive)
    }

    pub fn is_fillable(&self, name: &str) -> bool {
        self.fillable.iter().any(|f| f == name)
    }

    /// Destroy moves the row to `deleted` instead of removing it.
    pub fn soft_deletes(&self) -> bool {
        self.status.as_ref().map(|s| s.contains("deleted")).unwrap_or(false)
    }

    pub fn include(&self, name: &str) -> Option<&IncludeSpec> {
        self.includes.iter().find(|i| i.name == name)
    }

    pub fn route_name(&self, op: Operation) -> String {
        format!("{}.{}", self.segment, op.as_str())
    }
}

#[derive(Clone, Debug)]
pub struct Catalog {
    pub schema: String,
    pub status_sets: Vec<StatusSet>,
    pub entities: Vec<ResolvedEntity>,
    pub entity_by_segment: HashMap<String, usize>,
}

impl Catalog {
    /// Declaration order: parents before children.
    pub fn entities(&self) -> &[ResolvedEntity] {
        &self.entities
    }

    pub fn entity(&self, segment: &str) -> Option<&ResolvedEntity> {
        self.entity_by_segment.get(segment).map(|&i| &self.entities[i])
    }

    pub fn entity_by_table(&self, table: &str) -> Option<&ResolvedEntity> {
        self.entities.iter().find(|e| e.table_name == table)
    }
}
