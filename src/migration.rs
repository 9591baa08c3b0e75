//! Apply the catalog to the database: schema, enum types, tables, columns, indexes and foreign keys.
//! Every statement is idempotent; the ledger skips the whole plan when the catalog is unchanged.

use crate::catalog::{Catalog, ColumnInfo, ResolvedEntity, StatusSet};
use crate::error::AppError;
use crate::sql::{qualified_table, quote_ident};
use crate::store::{ensure_ledger, latest_fingerprint, record_fingerprint};
use sha2::{Digest, Sha256};
use sqlx::PgPool;

fn literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

pub fn schema_ddl(schema: &str) -> String {
    format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(schema))
}

/// CREATE TYPE guarded against duplicates, then ADD VALUE for members added later.
pub fn enum_ddl(schema: &str, set: &StatusSet) -> Vec<String> {
    let ty = format!("{}.{}", quote_ident(schema), quote_ident(&set.name));
    let values: Vec<String> = set.values.iter().map(|v| literal(v)).collect();
    let mut out = vec![format!(
        "DO $$ BEGIN CREATE TYPE {} AS ENUM ({}); EXCEPTION WHEN duplicate_object THEN NULL; END $$",
        ty,
        values.join(", ")
    )];
    for v in &set.values {
        out.push(format!("ALTER TYPE {} ADD VALUE IF NOT EXISTS {}", ty, literal(v)));
    }
    out
}

fn column_def(c: &ColumnInfo) -> String {
    if c.is_pk {
        return format!("{} {} PRIMARY KEY", quote_ident(&c.name), c.ddl_type);
    }
    let mut def = format!("{} {}", quote_ident(&c.name), c.ddl_type);
    if !c.nullable {
        def.push_str(" NOT NULL");
    }
    if let Some(d) = &c.default {
        def.push_str(" DEFAULT ");
        def.push_str(d);
    }
    def
}

/// CREATE TABLE with every column; constraints beyond the primary key are added separately.
pub fn table_ddl(entity: &ResolvedEntity) -> String {
    let cols: Vec<String> = entity.columns.iter().map(column_def).collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
        qualified_table(&entity.schema_name, &entity.table_name),
        cols.join(",\n  ")
    )
}

/// ADD COLUMN IF NOT EXISTS for every non-key column, so new fields reach existing tables.
pub fn add_columns_ddl(entity: &ResolvedEntity) -> Vec<String> {
    let table = qualified_table(&entity.schema_name, &entity.table_name);
    entity
        .columns
        .iter()
        .filter(|c| !c.is_pk)
        .map(|c| format!("ALTER TABLE {} ADD COLUMN IF NOT EXISTS {}", table, column_def(c)))
        .collect()
}

pub fn index_ddl(entity: &ResolvedEntity) -> Vec<String> {
    let table = qualified_table(&entity.schema_name, &entity.table_name);
    let mut out = Vec::new();
    for c in &entity.columns {
        if c.unique {
            out.push(format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS {} ON {} ({})",
                quote_ident(&format!("{}_{}_unique", entity.table_name, c.name)),
                table,
                quote_ident(&c.name)
            ));
        } else if c.indexed {
            out.push(format!(
                "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
                quote_ident(&format!("{}_{}_index", entity.table_name, c.name)),
                table,
                quote_ident(&c.name)
            ));
        }
    }
    out
}

/// One guarded ADD CONSTRAINT per belongs-to column.
pub fn foreign_key_ddl(entity: &ResolvedEntity) -> Vec<String> {
    let table = qualified_table(&entity.schema_name, &entity.table_name);
    entity
        .columns
        .iter()
        .filter_map(|c| c.foreign_key.as_ref().map(|fk| (c, fk)))
        .map(|(c, fk)| {
            let name = format!("{}_{}_foreign", entity.table_name, c.name);
            format!(
                "DO $$ BEGIN IF NOT EXISTS (SELECT 1 FROM pg_constraint WHERE conname = {} AND connamespace = {}::regnamespace) THEN \
                 ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} (\"id\") ON DELETE {}; END IF; END $$",
                literal(&name),
                literal(&entity.schema_name),
                table,
                quote_ident(&name),
                quote_ident(&c.name),
                qualified_table(&entity.schema_name, &fk.table),
                fk.on_delete.as_sql()
            )
        })
        .collect()
}

/// Full ordered plan: schema, enums, tables (parents first), columns, indexes, foreign keys.
pub fn migration_plan(catalog: &Catalog) -> Vec<String> {
    let mut plan = vec![schema_ddl(&catalog.schema)];
    for set in &catalog.status_sets {
        plan.extend(enum_ddl(&catalog.schema, set));
    }
    for e in catalog.entities() {
        plan.push(table_ddl(e));
    }
    for e in catalog.entities() {
        plan.extend(add_columns_ddl(e));
        plan.extend(index_ddl(e));
    }
    for e in catalog.entities() {
        plan.extend(foreign_key_ddl(e));
    }
    plan
}

/// Hex SHA-256 over the plan; identical catalogs give identical fingerprints.
pub fn fingerprint(plan: &[String]) -> String {
    let mut hasher = Sha256::new();
    for stmt in plan {
        hasher.update(stmt.as_bytes());
        hasher.update(b";\n");
    }
    hex::encode(hasher.finalize())
}

/// Apply the plan unless the ledger already holds its fingerprint. Returns true when statements ran.
pub async fn apply_migrations(pool: &PgPool, catalog: &Catalog) -> Result<bool, AppError> {
    let plan = migration_plan(catalog);
    let print = fingerprint(&plan);
    ensure_ledger(pool, &catalog.schema).await?;
    if latest_fingerprint(pool, &catalog.schema).await?.as_deref() == Some(print.as_str()) {
        tracing::info!(schema = %catalog.schema, "schema up to date");
        return Ok(false);
    }
    for stmt in &plan {
        tracing::debug!(sql = %stmt, "migrate");
        sqlx::query(stmt).execute(pool).await?;
    }
    record_fingerprint(pool, &catalog.schema, &print).await?;
    tracing::info!(schema = %catalog.schema, statements = plan.len(), fingerprint = %print, "migrations applied");
    Ok(true)
}
