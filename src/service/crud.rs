//! Generic CRUD execution against PostgreSQL.

use crate::catalog::{Catalog, ResolvedEntity};
use crate::error::AppError;
use crate::sql::{self, IncludeSelect, ListQuery, PgBindValue, QueryBuf};
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::{Query, QueryScalar};
use sqlx::{PgPool, Postgres};
use std::collections::HashMap;

pub struct CrudService;

impl CrudService {
    /// One page (or export window) of rows; include keys are already set on each row.
    pub async fn list(
        pool: &PgPool,
        entity: &ResolvedEntity,
        list: &ListQuery,
        includes: &[IncludeSelect<'_>],
    ) -> Result<Vec<Value>, AppError> {
        let q = sql::select_list(entity, list, includes);
        Self::fetch_all(pool, &q).await
    }

    /// Total rows matching the list filters, ignoring the window.
    pub async fn count(pool: &PgPool, entity: &ResolvedEntity, list: &ListQuery) -> Result<u64, AppError> {
        let q = sql::count(entity, list);
        let n: i64 = Self::scalar::<i64>(&q).fetch_one(pool).await?;
        Ok(n.max(0) as u64)
    }

    /// Fetch one row where `column` = `value` (primary key or slug).
    pub async fn find(
        pool: &PgPool,
        entity: &ResolvedEntity,
        column: &str,
        value: Value,
        includes: &[IncludeSelect<'_>],
    ) -> Result<Option<Value>, AppError> {
        let q = sql::select_one(entity, column, value, includes);
        Self::fetch_optional(pool, &q).await
    }

    pub async fn find_by_id(pool: &PgPool, entity: &ResolvedEntity, id: i64) -> Result<Option<Value>, AppError> {
        Self::find(pool, entity, &entity.pk_column, Value::Number(id.into()), &[]).await
    }

    /// Insert one row from an already filtered and validated body. Returns the created row.
    pub async fn create(
        pool: &PgPool,
        entity: &ResolvedEntity,
        body: &HashMap<String, Value>,
    ) -> Result<Value, AppError> {
        let q = sql::insert(entity, body);
        Self::fetch_optional(pool, &q)
            .await?
            .ok_or(AppError::Db(sqlx::Error::RowNotFound))
    }

    /// Partial update by id. None when the row does not exist.
    pub async fn update(
        pool: &PgPool,
        entity: &ResolvedEntity,
        id: i64,
        body: &HashMap<String, Value>,
    ) -> Result<Option<Value>, AppError> {
        let q = sql::update(entity, id, body);
        Self::fetch_optional(pool, &q).await
    }

    pub async fn set_status(
        pool: &PgPool,
        entity: &ResolvedEntity,
        id: i64,
        status: &str,
    ) -> Result<Option<Value>, AppError> {
        let q = sql::set_status(entity, id, status)
            .ok_or_else(|| AppError::BadRequest(format!("{} has no status", entity.segment)))?;
        Self::fetch_optional(pool, &q).await
    }

    /// Remove the row. Returns false when nothing was deleted.
    pub async fn delete(pool: &PgPool, entity: &ResolvedEntity, id: i64) -> Result<bool, AppError> {
        let q = sql::delete(entity, id);
        Ok(Self::fetch_optional(pool, &q).await?.is_some())
    }

    pub async fn exists(
        pool: &PgPool,
        entity: &ResolvedEntity,
        column: &str,
        value: Value,
        ignore_id: Option<i64>,
    ) -> Result<bool, AppError> {
        let q = sql::exists(entity, column, value, ignore_id);
        Ok(Self::scalar::<bool>(&q).fetch_one(pool).await?)
    }

    /// Existing slugs equal to `base` or shaped `base-N`.
    pub async fn slug_candidates(
        pool: &PgPool,
        entity: &ResolvedEntity,
        column: &str,
        base: &str,
        ignore_id: Option<i64>,
    ) -> Result<Vec<String>, AppError> {
        let q = sql::slug_candidates(entity, column, base, ignore_id);
        Ok(Self::scalar::<String>(&q).fetch_all(pool).await?)
    }

    /// `[{value, label}]` for a related select input.
    pub async fn options(pool: &PgPool, entity: &ResolvedEntity, limit: u32) -> Result<Vec<Value>, AppError> {
        let q = sql::select_options(entity, limit);
        Self::fetch_all(pool, &q).await
    }

    async fn fetch_all(pool: &PgPool, q: &QueryBuf) -> Result<Vec<Value>, AppError> {
        let rows = Self::query(q).fetch_all(pool).await?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    async fn fetch_optional(pool: &PgPool, q: &QueryBuf) -> Result<Option<Value>, AppError> {
        let row = Self::query(q).fetch_optional(pool).await?;
        Ok(row.map(|r| row_to_json(&r)))
    }

    fn query(q: &QueryBuf) -> Query<'_, Postgres, PgArguments> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        query
    }

    fn scalar<T>(q: &QueryBuf) -> QueryScalar<'_, Postgres, T, PgArguments>
    where
        T: Send + Unpin,
        (T,): for<'r> sqlx::FromRow<'r, PgRow>,
    {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query_scalar::<_, T>(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        query
    }
}

/// Build include selects for `names`, rejecting names the entity does not declare.
pub fn resolve_includes<'a>(
    catalog: &'a Catalog,
    entity: &'a ResolvedEntity,
    names: &[String],
) -> Result<Vec<IncludeSelect<'a>>, AppError> {
    let mut out = Vec::with_capacity(names.len());
    for name in names {
        let spec = entity
            .include(name)
            .ok_or_else(|| AppError::BadRequest(format!("unknown include '{}' for {}", name, entity.segment)))?;
        let related = catalog
            .entity(&spec.related_segment)
            .ok_or_else(|| AppError::NotFound(spec.related_segment.clone()))?;
        out.push(IncludeSelect {
            name: spec.name.as_str(),
            direction: spec.direction.clone(),
            related,
            our_key: spec.our_key_column.as_str(),
            their_key: spec.their_key_column.as_str(),
        });
    }
    Ok(out)
}

fn row_to_json(row: &PgRow) -> Value {
    use sqlx::Column;
    use sqlx::Row;
    let mut map = serde_json::Map::new();
    for col in row.columns() {
        let name = col.name();
        map.insert(name.to_string(), cell_to_value(row, name));
    }
    Value::Object(map)
}

fn cell_to_value(row: &PgRow, name: &str) -> Value {
    use sqlx::Row;
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
        return Value::String(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<Value>, _>(name) {
        return j;
    }
    Value::Null
}
