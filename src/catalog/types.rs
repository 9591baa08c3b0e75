//! Entity declaration types: the model layer. Each entity lists its fields, the
//! fillable allow-list, validation rules and belongs-to relationships.

use serde::{Deserialize, Serialize};

/// Storage kind of a field. Drives the column DDL and the SQL cast used when binding values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    LongText,
    Integer,
    BigInt,
    Decimal,
    Boolean,
    Timestamp,
    Date,
    Json,
}

/// A named status enumeration, stored as a PostgreSQL enum type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSet {
    pub name: String,
    pub values: Vec<String>,
    pub default: String,
}

impl StatusSet {
    pub fn new(name: &str, values: &[&str], default: &str) -> Self {
        StatusSet {
            name: name.to_string(),
            values: values.iter().map(|v| v.to_string()).collect(),
            default: default.to_string(),
        }
    }

    pub fn contains(&self, value: &str) -> bool {
        self.values.iter().any(|v| v == value)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub unique: bool,
}

/// Pixel constraint for an image field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Dimensions {
    Exact { width: u32, height: u32 },
    AtLeast { min_width: u32, min_height: u32 },
    Square { min_side: u32 },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRule {
    /// Accepted formats by extension name: jpeg, png, webp, gif.
    pub formats: Vec<String>,
    pub max_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Dimensions>,
}

impl ImageRule {
    pub fn photo(max_bytes: u64) -> Self {
        ImageRule {
            formats: vec!["jpeg".into(), "png".into(), "webp".into()],
            max_bytes,
            dimensions: None,
        }
    }

    pub fn exact(mut self, width: u32, height: u32) -> Self {
        self.dimensions = Some(Dimensions::Exact { width, height });
        self
    }

    pub fn at_least(mut self, min_width: u32, min_height: u32) -> Self {
        self.dimensions = Some(Dimensions::AtLeast { min_width, min_height });
        self
    }

    pub fn square(mut self, min_side: u32) -> Self {
        self.dimensions = Some(Dimensions::Square { min_side });
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnDelete {
    Cascade,
    SetNull,
    Restrict,
}

impl OnDelete {
    pub fn as_sql(&self) -> &'static str {
        match self {
            OnDelete::Cascade => "CASCADE",
            OnDelete::SetNull => "SET NULL",
            OnDelete::Restrict => "RESTRICT",
        }
    }
}

/// Belongs-to: this field holds the id of a row in `entity` (route segment).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub entity: String,
    /// Include name for ?include= (e.g. "author" for author_id).
    pub name: String,
    pub on_delete: OnDelete,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub nullable: bool,
    /// SQL default expression, e.g. `0` or `NOW()`.
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub fillable: bool,
    #[serde(default)]
    pub searchable: bool,
    #[serde(default)]
    pub sortable: bool,
    #[serde(default)]
    pub exportable: bool,
    /// Never selected or returned (e.g. password hashes).
    #[serde(default)]
    pub sensitive: bool,
    #[serde(default)]
    pub indexed: bool,
    #[serde(default)]
    pub rule: ValidationRule,
    #[serde(default)]
    pub image: Option<ImageRule>,
    /// Custom URL: generate this field from the named source field when empty.
    #[serde(default)]
    pub slug_from: Option<String>,
    #[serde(default)]
    pub references: Option<Reference>,
}

impl FieldDef {
    /// Nullable, fillable, exportable field with no rules.
    pub fn new(name: &str, kind: FieldKind) -> Self {
        FieldDef {
            name: name.to_string(),
            kind,
            nullable: true,
            default: None,
            fillable: true,
            searchable: false,
            sortable: false,
            exportable: true,
            sensitive: false,
            indexed: false,
            rule: ValidationRule::default(),
            image: None,
            slug_from: None,
            references: None,
        }
    }

    pub fn text(name: &str, max: u32) -> Self {
        Self::new(name, FieldKind::Text).max_length(max)
    }

    pub fn required(mut self) -> Self {
        self.nullable = false;
        self.rule.required = Some(true);
        self
    }

    /// NOT NULL column without a request-level rule (server-managed values).
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn max_length(mut self, n: u32) -> Self {
        self.rule.max_length = Some(n);
        self
    }

    pub fn min_length(mut self, n: u32) -> Self {
        self.rule.min_length = Some(n);
        self
    }

    pub fn format(mut self, f: &str) -> Self {
        self.rule.format = Some(f.to_string());
        self
    }

    pub fn pattern(mut self, p: &str) -> Self {
        self.rule.pattern = Some(p.to_string());
        self
    }

    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.rule.minimum = Some(min);
        self.rule.maximum = Some(max);
        self
    }

    pub fn allowed(mut self, values: &[&str]) -> Self {
        self.rule.allowed = Some(values.iter().map(|v| serde_json::Value::String(v.to_string())).collect());
        self
    }

    pub fn unique(mut self) -> Self {
        self.rule.unique = true;
        self
    }

    pub fn default_sql(mut self, expr: &str) -> Self {
        self.default = Some(expr.to_string());
        self
    }

    /// Server-managed: never mass assignable.
    pub fn guarded(mut self) -> Self {
        self.fillable = false;
        self
    }

    pub fn searchable(mut self) -> Self {
        self.searchable = true;
        self.sortable = true;
        self
    }

    pub fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self.exportable = false;
        self
    }

    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    pub fn not_exported(mut self) -> Self {
        self.exportable = false;
        self
    }

    pub fn image(mut self, rule: ImageRule) -> Self {
        self.image = Some(rule);
        self
    }

    pub fn slug_from(mut self, source: &str) -> Self {
        self.slug_from = Some(source.to_string());
        self.rule.unique = true;
        self.rule.format = Some("slug".into());
        self
    }

    pub fn belongs_to(mut self, entity: &str, name: &str, on_delete: OnDelete) -> Self {
        self.references = Some(Reference {
            entity: entity.to_string(),
            name: name.to_string(),
            on_delete,
        });
        self.indexed = true;
        self
    }
}

/// Route actions an entity exposes. Route names are `<segment>.<action>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    Index,
    Store,
    Show,
    Update,
    Destroy,
    Status,
    Export,
    Check,
    FormProps,
    Upload,
}

impl Operation {
    pub const ALL: [Operation; 10] = [
        Operation::Index,
        Operation::Store,
        Operation::Show,
        Operation::Update,
        Operation::Destroy,
        Operation::Status,
        Operation::Export,
        Operation::Check,
        Operation::FormProps,
        Operation::Upload,
    ];

    pub const READ_ONLY: [Operation; 3] = [Operation::Index, Operation::Show, Operation::Export];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Index => "index",
            Operation::Store => "store",
            Operation::Show => "show",
            Operation::Update => "update",
            Operation::Destroy => "destroy",
            Operation::Status => "status",
            Operation::Export => "export",
            Operation::Check => "check",
            Operation::FormProps => "form-props",
            Operation::Upload => "upload",
        }
    }
}

/// Polymorphic pointer: `type_column` names a target kind, `id_column` its row id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MorphDef {
    /// Include name for the resolved row (e.g. "target").
    pub name: String,
    pub type_column: String,
    pub id_column: String,
    /// (type value, entity segment) pairs.
    pub targets: Vec<(String, String)>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntityDef {
    /// Route segment, e.g. "business-pages".
    pub segment: String,
    pub table: String,
    /// Column shown as the option label in related selects.
    pub label: String,
    /// Status set name; adds a `status` column when present.
    #[serde(default)]
    pub status: Option<String>,
    pub fields: Vec<FieldDef>,
    pub operations: Vec<Operation>,
    #[serde(default)]
    pub morph: Option<MorphDef>,
}

impl EntityDef {
    pub fn new(segment: &str, table: &str, label: &str) -> Self {
        EntityDef {
            segment: segment.to_string(),
            table: table.to_string(),
            label: label.to_string(),
            status: None,
            fields: Vec::new(),
            operations: Operation::ALL.to_vec(),
            morph: None,
        }
    }

    pub fn status(mut self, set: &str) -> Self {
        self.status = Some(set.to_string());
        self
    }

    pub fn field(mut self, f: FieldDef) -> Self {
        self.fields.push(f);
        self
    }

    pub fn read_only(mut self) -> Self {
        self.operations = Operation::READ_ONLY.to_vec();
        self
    }

    pub fn morph(mut self, name: &str, type_column: &str, id_column: &str, targets: &[(&str, &str)]) -> Self {
        self.morph = Some(MorphDef {
            name: name.to_string(),
            type_column: type_column.to_string(),
            id_column: id_column.to_string(),
            targets: targets.iter().map(|(t, s)| (t.to_string(), s.to_string())).collect(),
        });
        self
    }
}

/// Every declaration in one struct.
#[derive(Clone, Debug, Default)]
pub struct CatalogDef {
    pub status_sets: Vec<StatusSet>,
    /// Parents before children: migrations create tables in this order.
    pub entities: Vec<EntityDef>,
}
