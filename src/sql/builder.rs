//! Builds parameterized SELECT, COUNT, INSERT, UPDATE, DELETE from a resolved entity.

use crate::catalog::{ColumnInfo, FieldKind, IncludeDirection, ResolvedEntity};
use serde_json::Value;
use std::collections::HashMap;

const MAIN_ALIAS: &str = "main";

/// Hard cap for any single SELECT (export included).
pub const MAX_ROWS: u32 = 10_000;

/// Describes one include: name, direction, related entity, our key column, their key column.
pub struct IncludeSelect<'a> {
    pub name: &'a str,
    pub direction: IncludeDirection,
    pub related: &'a ResolvedEntity,
    pub our_key: &'a str,
    pub their_key: &'a str,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Table-view query: exact-match filters, free-text search, status, sort, window.
/// Column names are checked against the entity before they reach SQL.
#[derive(Clone, Debug, PartialEq)]
pub struct ListQuery {
    pub filters: Vec<(String, Value)>,
    pub search: Option<String>,
    pub status: Option<String>,
    pub sort: String,
    pub direction: SortDirection,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl Default for ListQuery {
    fn default() -> Self {
        ListQuery {
            filters: Vec::new(),
            search: None,
            status: None,
            sort: "id".into(),
            direction: SortDirection::Desc,
            limit: None,
            offset: None,
        }
    }
}

/// Quote identifier for PostgreSQL (safe: only from the catalog).
pub fn quote_ident(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
pub fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}

fn entity_table(entity: &ResolvedEntity) -> String {
    qualified_table(&entity.schema_name, &entity.table_name)
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: Value) -> u32 {
        let n = self.params.len() as u32 + 1;
        self.params.push(v);
        n
    }

    /// Push a value and return its placeholder cast to the column type.
    fn placeholder(&mut self, col: &ColumnInfo, v: Value) -> String {
        let n = self.push_param(v);
        format!("${}::{}", n, col.pg_type)
    }
}

/// Select expression for one column: enums as text, numerics as float8 so JSON gets numbers.
fn column_expr(c: &ColumnInfo, alias: Option<&str>) -> String {
    let q = match alias {
        Some(a) => format!("{}.{}", a, quote_ident(&c.name)),
        None => quote_ident(&c.name),
    };
    if c.name == "status" && c.pg_type.contains('.') {
        format!("{}::text", q)
    } else if c.kind == Some(FieldKind::Decimal) {
        format!("{}::float8", q)
    } else {
        q
    }
}

/// SELECT list of visible (non-sensitive) columns.
fn select_column_list(entity: &ResolvedEntity, alias: Option<&str>) -> String {
    entity
        .visible_columns()
        .map(|c| {
            let expr = column_expr(c, alias);
            if alias.is_some() || expr != quote_ident(&c.name) {
                format!("{} AS {}", expr, quote_ident(&c.name))
            } else {
                expr
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Escape LIKE wildcards so search terms match literally.
pub fn like_pattern(term: &str) -> String {
    let escaped = term.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("%{}%", escaped)
}

/// WHERE clause shared by list, count and export.
fn where_clause(q: &mut QueryBuf, entity: &ResolvedEntity, list: &ListQuery) -> String {
    let mut parts = Vec::new();
    for (col, val) in &list.filters {
        let Some(c) = entity.visible_columns().find(|c| c.name == *col) else { continue };
        if val.is_null() {
            parts.push(format!("{}.{} IS NULL", MAIN_ALIAS, quote_ident(col)));
            continue;
        }
        let ph = q.placeholder(c, val.clone());
        parts.push(format!("{}.{} = {}", MAIN_ALIAS, quote_ident(col), ph));
    }
    if let (Some(status), Some(c)) = (&list.status, entity.column("status")) {
        let ph = q.placeholder(c, Value::String(status.clone()));
        parts.push(format!("{}.\"status\" = {}", MAIN_ALIAS, ph));
    }
    if let Some(term) = list.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        if !entity.searchable.is_empty() {
            let n = q.push_param(Value::String(like_pattern(term)));
            let ors: Vec<String> = entity
                .searchable
                .iter()
                .map(|col| format!("{}.{}::text ILIKE ${}", MAIN_ALIAS, quote_ident(col), n))
                .collect();
            parts.push(format!("({})", ors.join(" OR ")));
        }
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", parts.join(" AND "))
    }
}

fn order_clause(entity: &ResolvedEntity, list: &ListQuery) -> String {
    let sort = if entity.sortable.contains(&list.sort) {
        list.sort.as_str()
    } else {
        entity.pk_column.as_str()
    };
    let dir = list.direction.as_sql();
    if sort == entity.pk_column {
        format!(" ORDER BY {}.{} {}", MAIN_ALIAS, quote_ident(sort), dir)
    } else {
        format!(
            " ORDER BY {}.{} {} NULLS LAST, {}.{} {}",
            MAIN_ALIAS,
            quote_ident(sort),
            dir,
            MAIN_ALIAS,
            quote_ident(&entity.pk_column),
            dir
        )
    }
}

fn include_subquery(inc: &IncludeSelect<'_>) -> String {
    let rel_table = entity_table(inc.related);
    let rel_cols = select_column_list(inc.related, None);
    let sub_from = format!(
        "{} WHERE {} = {}.{}",
        rel_table,
        quote_ident(inc.their_key),
        MAIN_ALIAS,
        quote_ident(inc.our_key)
    );
    match inc.direction {
        IncludeDirection::ToOne => format!("(SELECT row_to_json(sub) FROM (SELECT {} FROM {}) sub)", rel_cols, sub_from),
        IncludeDirection::ToMany => format!(
            "(SELECT COALESCE(json_agg(row_to_json(sub)), '[]'::json) FROM (SELECT {} FROM {} LIMIT {}) sub)",
            rel_cols, sub_from, MAX_ROWS
        ),
    }
}

fn select_parts(entity: &ResolvedEntity, includes: &[IncludeSelect<'_>]) -> String {
    let mut parts = vec![select_column_list(entity, Some(MAIN_ALIAS))];
    for inc in includes {
        parts.push(format!("{} AS {}", include_subquery(inc), quote_ident(inc.name)));
    }
    parts.join(", ")
}

/// SELECT list with filters/search/sort, optional includes as scalar subqueries
/// (row_to_json for to_one, json_agg for to_many), LIMIT/OFFSET.
pub fn select_list(entity: &ResolvedEntity, list: &ListQuery, includes: &[IncludeSelect<'_>]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(&mut q, entity, list);
    let limit = list.limit.unwrap_or(MAX_ROWS).min(MAX_ROWS);
    let offset_clause = list.offset.filter(|n| *n > 0).map(|n| format!(" OFFSET {}", n)).unwrap_or_default();
    q.sql = format!(
        "SELECT {} FROM {} {}{}{} LIMIT {}{}",
        select_parts(entity, includes),
        entity_table(entity),
        MAIN_ALIAS,
        where_sql,
        order_clause(entity, list),
        limit,
        offset_clause
    );
    q
}

/// COUNT(*) with the same WHERE as `select_list`.
pub fn count(entity: &ResolvedEntity, list: &ListQuery) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(&mut q, entity, list);
    q.sql = format!("SELECT COUNT(*) FROM {} {}{}", entity_table(entity), MAIN_ALIAS, where_sql);
    q
}

/// SELECT one row where `column` = value (id or slug), with optional includes.
pub fn select_one(entity: &ResolvedEntity, column: &str, value: Value, includes: &[IncludeSelect<'_>]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let cast = entity
        .column(column)
        .map(|c| c.pg_type.clone())
        .unwrap_or_else(|| "text".into());
    let n = q.push_param(value);
    q.sql = format!(
        "SELECT {} FROM {} {} WHERE {}.{} = ${}::{}",
        select_parts(entity, includes),
        entity_table(entity),
        MAIN_ALIAS,
        MAIN_ALIAS,
        quote_ident(column),
        n,
        cast
    );
    q
}

/// `SELECT id AS value, <label>::text AS label` for select inputs on related forms.
pub fn select_options(entity: &ResolvedEntity, limit: u32) -> QueryBuf {
    let mut q = QueryBuf::new();
    let label = quote_ident(&entity.label_column);
    let status_filter = match &entity.status {
        Some(set) if set.contains("deleted") => " WHERE \"status\"::text <> 'deleted'".to_string(),
        _ => String::new(),
    };
    q.sql = format!(
        "SELECT {} AS value, {}::text AS label FROM {}{} ORDER BY {} ASC LIMIT {}",
        quote_ident(&entity.pk_column),
        label,
        entity_table(entity),
        status_filter,
        label,
        limit.min(MAX_ROWS)
    );
    q
}

/// `SELECT EXISTS(...)` for `column = value`, optionally ignoring one row id (updates).
pub fn exists(entity: &ResolvedEntity, column: &str, value: Value, ignore_id: Option<i64>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let cast = entity
        .column(column)
        .map(|c| c.pg_type.clone())
        .unwrap_or_else(|| "text".into());
    let n = q.push_param(value);
    let mut sql = format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = ${}::{}",
        entity_table(entity),
        quote_ident(column),
        n,
        cast
    );
    if let Some(id) = ignore_id {
        let m = q.push_param(Value::Number(id.into()));
        sql.push_str(&format!(" AND {} <> ${}::bigint", quote_ident(&entity.pk_column), m));
    }
    sql.push(')');
    q.sql = sql;
    q
}

/// Existing values of `column` equal to `base` or shaped `base-<n>`, for unique slug generation.
pub fn slug_candidates(entity: &ResolvedEntity, column: &str, base: &str, ignore_id: Option<i64>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let exact = q.push_param(Value::String(base.to_string()));
    let prefix = q.push_param(Value::String(format!("{}-%", base.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_"))));
    let mut sql = format!(
        "SELECT {} FROM {} WHERE ({} = ${} OR {} LIKE ${})",
        quote_ident(column),
        entity_table(entity),
        quote_ident(column),
        exact,
        quote_ident(column),
        prefix
    );
    if let Some(id) = ignore_id {
        let m = q.push_param(Value::Number(id.into()));
        sql.push_str(&format!(" AND {} <> ${}::bigint", quote_ident(&entity.pk_column), m));
    }
    q.sql = sql;
    q
}

/// INSERT: one placeholder per body key that is a column; the caller has already applied the
/// fillable allow-list. Columns with a DB default are omitted when absent so the default applies.
pub fn insert(entity: &ResolvedEntity, body: &HashMap<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for c in &entity.columns {
        if c.is_pk {
            continue;
        }
        let Some(val) = body.get(&c.name) else { continue };
        if val.is_null() && c.has_default() && !c.nullable {
            continue;
        }
        placeholders.push(q.placeholder(c, val.clone()));
        cols.push(quote_ident(&c.name));
    }
    let returning = select_column_list(entity, None);
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", entity_table(entity), returning)
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            entity_table(entity),
            cols.join(", "),
            placeholders.join(", "),
            returning
        )
    };
    q
}

/// UPDATE by id: SET only columns present in body, plus updated_at.
pub fn update(entity: &ResolvedEntity, id: i64, body: &HashMap<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut sets = Vec::new();
    // Column order keeps the generated SQL stable regardless of body ordering.
    for c in &entity.columns {
        if c.is_pk || c.name == "created_at" || c.name == "updated_at" {
            continue;
        }
        let Some(v) = body.get(&c.name) else { continue };
        let rhs = q.placeholder(c, v.clone());
        sets.push(format!("{} = {}", quote_ident(&c.name), rhs));
    }
    sets.push(format!("{} = NOW()", quote_ident("updated_at")));
    let id_param = q.push_param(Value::Number(id.into()));
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = ${}::bigint RETURNING {}",
        entity_table(entity),
        sets.join(", "),
        quote_ident(&entity.pk_column),
        id_param,
        select_column_list(entity, None)
    );
    q
}

/// UPDATE status by id.
pub fn set_status(entity: &ResolvedEntity, id: i64, status: &str) -> Option<QueryBuf> {
    let c = entity.column("status")?;
    let mut q = QueryBuf::new();
    let ph = q.placeholder(c, Value::String(status.to_string()));
    let id_param = q.push_param(Value::Number(id.into()));
    q.sql = format!(
        "UPDATE {} SET \"status\" = {}, \"updated_at\" = NOW() WHERE {} = ${}::bigint RETURNING {}",
        entity_table(entity),
        ph,
        quote_ident(&entity.pk_column),
        id_param,
        select_column_list(entity, None)
    );
    Some(q)
}

/// DELETE by id.
pub fn delete(entity: &ResolvedEntity, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(Value::Number(id.into()));
    q.sql = format!(
        "DELETE FROM {} WHERE {} = ${}::bigint RETURNING {}",
        entity_table(entity),
        quote_ident(&entity.pk_column),
        n,
        quote_ident(&entity.pk_column)
    );
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{cms_catalog, resolve, Catalog};
    use serde_json::json;

    fn catalog() -> Catalog {
        resolve(&cms_catalog(), "cms").expect("catalog")
    }

    #[test]
    fn list_applies_filters_status_search_and_window() {
        let c = catalog();
        let tags = c.entity("tags").expect("tags");
        let list = ListQuery {
            filters: vec![("slug".into(), json!("cardio"))],
            search: Some("card".into()),
            status: Some("active".into()),
            sort: "name".into(),
            direction: SortDirection::Asc,
            limit: Some(15),
            offset: Some(30),
        };
        let q = select_list(tags, &list, &[]);
        assert!(q.sql.contains("FROM \"cms\".\"tags\" main WHERE main.\"slug\" = $1::text"));
        assert!(q.sql.contains("main.\"status\" = $2::cms.record_status"));
        assert!(q.sql.contains("(main.\"name\"::text ILIKE $3)"));
        assert!(q.sql.contains("ORDER BY main.\"name\" ASC NULLS LAST, main.\"id\" ASC"));
        assert!(q.sql.ends_with("LIMIT 15 OFFSET 30"));
        assert_eq!(q.params, vec![json!("cardio"), json!("active"), json!("%card%")]);
    }

    #[test]
    fn list_falls_back_to_pk_for_unknown_sort_and_skips_unknown_filters() {
        let c = catalog();
        let tags = c.entity("tags").expect("tags");
        let list = ListQuery {
            filters: vec![("nope".into(), json!(1))],
            sort: "nope".into(),
            ..ListQuery::default()
        };
        let q = select_list(tags, &list, &[]);
        assert!(!q.sql.contains("WHERE"));
        assert!(q.sql.contains("ORDER BY main.\"id\" DESC LIMIT 10000"));
        assert!(q.params.is_empty());
    }

    #[test]
    fn status_and_decimal_columns_are_cast_for_json() {
        let c = catalog();
        let seminars = c.entity("seminars").expect("seminars");
        let q = select_list(seminars, &ListQuery::default(), &[]);
        assert!(q.sql.contains("main.\"status\"::text AS \"status\""));
        assert!(q.sql.contains("main.\"price\"::float8 AS \"price\""));
    }

    #[test]
    fn sensitive_columns_never_selected_or_returned() {
        let c = catalog();
        let users = c.entity("users").expect("users");
        let list = select_list(users, &ListQuery::default(), &[]);
        assert!(!list.sql.contains("password_hash"));
        let mut body = HashMap::new();
        body.insert("name".to_string(), json!("Ada"));
        let ins = insert(users, &body);
        let returning = ins.sql.split("RETURNING").nth(1).expect("returning");
        assert!(!returning.contains("password_hash"));
    }

    #[test]
    fn count_shares_where_with_list() {
        let c = catalog();
        let posts = c.entity("posts").expect("posts");
        let list = ListQuery {
            status: Some("published".into()),
            search: Some("heart".into()),
            ..ListQuery::default()
        };
        let q = count(posts, &list);
        assert!(q.sql.starts_with("SELECT COUNT(*) FROM \"cms\".\"posts\" main WHERE"));
        assert!(q.sql.contains("main.\"title\"::text ILIKE $2 OR main.\"excerpt\"::text ILIKE $2"));
        assert_eq!(q.params.len(), 2);
    }

    #[test]
    fn search_escapes_like_wildcards() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn includes_render_as_scalar_subqueries() {
        let c = catalog();
        let posts = c.entity("posts").expect("posts");
        let users = c.entity("users").expect("users");
        let comments = c.entity("comments").expect("comments");
        let includes = [
            IncludeSelect {
                name: "author",
                direction: IncludeDirection::ToOne,
                related: users,
                our_key: "author_id",
                their_key: "id",
            },
            IncludeSelect {
                name: "comments",
                direction: IncludeDirection::ToMany,
                related: comments,
                our_key: "id",
                their_key: "post_id",
            },
        ];
        let q = select_one(posts, "custom_url", json!("heart-health"), &includes);
        assert!(q.sql.contains("(SELECT row_to_json(sub) FROM (SELECT"));
        assert!(q.sql.contains("FROM \"cms\".\"users\" WHERE \"id\" = main.\"author_id\") sub) AS \"author\""));
        assert!(q.sql.contains("json_agg(row_to_json(sub))"));
        assert!(q.sql.contains("WHERE main.\"custom_url\" = $1::text"));
        assert!(!q.sql.contains("password_hash"));
    }

    #[test]
    fn insert_skips_pk_and_absent_defaults() {
        let c = catalog();
        let posts = c.entity("posts").expect("posts");
        let mut body = HashMap::new();
        body.insert("title".to_string(), json!("Hello"));
        body.insert("content".to_string(), json!("Body"));
        body.insert("tags".to_string(), json!(["a"]));
        let q = insert(posts, &body);
        assert!(q.sql.starts_with("INSERT INTO \"cms\".\"posts\" (\"title\", \"content\", \"tags\") VALUES ($1::text, $2::text, $3::jsonb)"));
        assert_eq!(q.params.len(), 3);
    }

    #[test]
    fn update_sets_columns_in_declaration_order_and_touches_updated_at() {
        let c = catalog();
        let tags = c.entity("tags").expect("tags");
        let mut body = HashMap::new();
        body.insert("slug".to_string(), json!("b"));
        body.insert("name".to_string(), json!("B"));
        let q = update(tags, 7, &body);
        assert!(q.sql.starts_with(
            "UPDATE \"cms\".\"tags\" SET \"name\" = $1::text, \"slug\" = $2::text, \"updated_at\" = NOW() WHERE \"id\" = $3::bigint"
        ));
        assert_eq!(q.params, vec![json!("B"), json!("b"), json!(7)]);
    }

    #[test]
    fn exists_can_ignore_current_row() {
        let c = catalog();
        let tags = c.entity("tags").expect("tags");
        let q = exists(tags, "name", json!("Cardiology"), Some(3));
        assert_eq!(
            q.sql,
            "SELECT EXISTS(SELECT 1 FROM \"cms\".\"tags\" WHERE \"name\" = $1::text AND \"id\" <> $2::bigint)"
        );
    }

    #[test]
    fn set_status_casts_to_enum() {
        let c = catalog();
        let posts = c.entity("posts").expect("posts");
        let q = set_status(posts, 4, "deleted").expect("status query");
        assert!(q.sql.contains("SET \"status\" = $1::cms.publish_status"));
        assert!(set_status(c.entity("page-views").expect("views"), 1, "x").is_none());
    }

    #[test]
    fn options_hide_soft_deleted_rows() {
        let c = catalog();
        let q = select_options(c.entity("business-pages").expect("pages"), 500);
        assert!(q.sql.contains("\"status\"::text <> 'deleted'"));
        assert!(q.sql.contains("\"name\"::text AS label"));
        let q = select_options(c.entity("specialties").expect("specialties"), 500);
        assert!(!q.sql.contains("WHERE"));
    }
}
