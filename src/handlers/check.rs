//! Uniqueness check for form inputs (e.g. `tags.check`).

use crate::catalog::Operation;
use crate::error::AppError;
use crate::handlers::entity::entity_for;
use crate::response::success_one_ok;
use crate::service::{slugify, CrudService};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Deserialize)]
pub struct CheckParams {
    pub field: Option<String>,
    pub value: Option<String>,
    pub ignore_id: Option<i64>,
}

pub async fn check(
    State(state): State<AppState>,
    Path(segment): Path<String>,
    Query(params): Query<CheckParams>,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity_for(&state, &segment, Operation::Check)?;
    let field = params
        .field
        .filter(|f| !f.is_empty())
        .ok_or_else(|| AppError::BadRequest("field is required".into()))?;
    if !entity.unique_columns.contains(&field) {
        return Err(AppError::BadRequest(format!("{} is not a unique field of {}", field, entity.segment)));
    }
    let raw = params
        .value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("value is required".into()))?;
    // Slugs are stored normalized, so compare the normalized form.
    let value = match &entity.slug {
        Some(s) if s.column == field => slugify(&raw),
        _ => raw.trim().to_string(),
    };
    let taken = CrudService::exists(&state.pool, entity, &field, Value::String(value.clone()), params.ignore_id).await?;
    Ok(success_one_ok(json!({
        "field": field,
        "value": value,
        "available": !taken,
    })))
}
