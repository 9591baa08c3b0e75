//! Database bootstrap and the `_sys_migrations` ledger.

use crate::error::AppError;
use crate::sql::{qualified_table, quote_ident};
use sqlx::ConnectOptions;
use sqlx::PgPool;
use std::str::FromStr;

const LEDGER_TABLE: &str = "_sys_migrations";

/// Create the schema and the ledger table when missing.
pub async fn ensure_ledger(pool: &PgPool, schema: &str) -> Result<(), AppError> {
    sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(schema)))
        .execute(pool)
        .await?;
    let ddl = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            fingerprint TEXT PRIMARY KEY,
            applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
        qualified_table(schema, LEDGER_TABLE)
    );
    sqlx::query(&ddl).execute(pool).await?;
    Ok(())
}

/// Fingerprint of the most recently applied plan.
pub async fn latest_fingerprint(pool: &PgPool, schema: &str) -> Result<Option<String>, AppError> {
    let sql = format!(
        "SELECT fingerprint FROM {} ORDER BY applied_at DESC LIMIT 1",
        qualified_table(schema, LEDGER_TABLE)
    );
    Ok(sqlx::query_scalar::<_, String>(&sql).fetch_optional(pool).await?)
}

/// Record `fingerprint` as applied now; re-recording an older plan moves it to the top.
pub async fn record_fingerprint(pool: &PgPool, schema: &str, fingerprint: &str) -> Result<(), AppError> {
    let sql = format!(
        "INSERT INTO {} (fingerprint) VALUES ($1) ON CONFLICT (fingerprint) DO UPDATE SET applied_at = NOW()",
        qualified_table(schema, LEDGER_TABLE)
    );
    sqlx::query(&sql).bind(fingerprint).execute(pool).await?;
    Ok(())
}

/// Connect to the `postgres` maintenance database and CREATE DATABASE when the target is missing.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), AppError> {
    let (admin_url, db_name) = parse_db_name_from_url(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = sqlx::postgres::PgConnectOptions::from_str(&admin_url)
        .map_err(|e| AppError::BadRequest(format!("invalid DATABASE_URL: {}", e)))?;
    let mut conn: sqlx::PgConnection = opts.connect().await?;
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await?;
    if !exists {
        sqlx::query(&format!("CREATE DATABASE {}", quote_ident(&db_name)))
            .execute(&mut conn)
            .await?;
        tracing::info!(database = %db_name, "created database");
    }
    Ok(())
}

/// Split `postgres://host/db?opts` into (`postgres://host/postgres?opts`, `db`).
fn parse_db_name_from_url(url: &str) -> Result<(String, String), AppError> {
    let path_start = url
        .rfind('/')
        .ok_or_else(|| AppError::BadRequest("DATABASE_URL: no path".into()))?
        + 1;
    let path_and_query = url.get(path_start..).unwrap_or("");
    let mut parts = path_and_query.splitn(2, '?');
    let db_name = parts.next().unwrap_or("").trim().to_string();
    let query = parts.next().map(|q| format!("?{}", q)).unwrap_or_default();
    let base = url.get(..path_start).unwrap_or(url);
    Ok((format!("{}postgres{}", base, query), db_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_url_keeps_query_options() {
        let (admin, db) = parse_db_name_from_url("postgres://u:p@localhost:5432/medcms?sslmode=disable").expect("parse");
        assert_eq!(admin, "postgres://u:p@localhost:5432/postgres?sslmode=disable");
        assert_eq!(db, "medcms");
    }

    #[test]
    fn plain_url() {
        let (admin, db) = parse_db_name_from_url("postgres://localhost/medcms").expect("parse");
        assert_eq!(admin, "postgres://localhost/postgres");
        assert_eq!(db, "medcms");
    }
}
