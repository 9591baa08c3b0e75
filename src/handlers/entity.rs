//! Entity handlers: table view, create, show, update, status, delete.

use crate::catalog::{Operation, ResolvedEntity};
use crate::error::AppError;
use crate::extractors::{JsonBody, ListParams};
use crate::response::{success_one, success_one_ok, success_page, PageMeta};
use crate::service::{resolve_includes, CrudService, WriteMode, WriteService};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

/// Look up `segment` and make sure it exposes `op`.
pub(crate) fn entity_for<'a>(state: &'a AppState, segment: &str, op: Operation) -> Result<&'a ResolvedEntity, AppError> {
    let entity = state
        .catalog
        .entity(segment)
        .ok_or_else(|| AppError::NotFound(format!("no entity '{}'", segment)))?;
    if !entity.allows(op) {
        return Err(AppError::NotAllowed(entity.route_name(op)));
    }
    Ok(entity)
}

pub(crate) fn body_to_map(value: Value) -> Result<HashMap<String, Value>, AppError> {
    match value {
        Value::Object(m) => Ok(m.into_iter().collect()),
        _ => Err(AppError::BadRequest("body must be a JSON object".into())),
    }
}

fn parse_id(entity: &ResolvedEntity, id_str: &str) -> Result<i64, AppError> {
    id_str
        .parse::<i64>()
        .map_err(|_| AppError::NotFound(format!("{} {}", entity.segment, id_str)))
}

pub async fn index(
    State(state): State<AppState>,
    Path(segment): Path<String>,
    params: ListParams,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity_for(&state, &segment, Operation::Index)?;
    let (query, page, per_page) = params.to_page_query(entity)?;
    let includes = resolve_includes(&state.catalog, entity, &params.include)?;
    let total = CrudService::count(&state.pool, entity, &query).await?;
    let rows = CrudService::list(&state.pool, entity, &query, &includes).await?;
    let meta = PageMeta::new(total, page, per_page, rows.len());
    Ok(success_page(rows, meta))
}

pub async fn store(
    State(state): State<AppState>,
    Path(segment): Path<String>,
    JsonBody(body): JsonBody<Value>,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity_for(&state, &segment, Operation::Store)?;
    let body = body_to_map(body)?;
    let body = WriteService::prepare(&state.pool, &state.catalog, entity, body, WriteMode::Create, None).await?;
    let row = CrudService::create(&state.pool, entity, &body).await?;
    tracing::info!(entity = %entity.segment, id = ?row.get("id"), "created");
    Ok(success_one(row))
}

/// `{id}` may be the numeric key or, for entities with a custom URL, the slug.
pub async fn show(
    State(state): State<AppState>,
    Path((segment, id_str)): Path<(String, String)>,
    params: ListParams,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity_for(&state, &segment, Operation::Show)?;
    let morph_requested = entity
        .morph
        .as_ref()
        .map(|m| params.include.iter().any(|i| *i == m.name))
        .unwrap_or(false);
    let names: Vec<String> = params
        .include
        .iter()
        .filter(|i| entity.morph.as_ref().map(|m| m.name != **i).unwrap_or(true))
        .cloned()
        .collect();
    let includes = resolve_includes(&state.catalog, entity, &names)?;
    // Numeric keys try the primary key first; slugs may be all digits, so a miss falls through.
    let mut found = match id_str.parse::<i64>() {
        Ok(id) => CrudService::find(&state.pool, entity, &entity.pk_column, Value::Number(id.into()), &includes).await?,
        Err(_) => None,
    };
    if found.is_none() {
        if let Some(slug) = &entity.slug {
            found = CrudService::find(&state.pool, entity, &slug.column, Value::String(id_str.clone()), &includes).await?;
        }
    }
    let mut row = found.ok_or_else(|| AppError::NotFound(format!("{} {}", entity.segment, id_str)))?;
    if morph_requested {
        attach_morph_target(&state, entity, &mut row).await?;
    }
    Ok(success_one_ok(row))
}

/// Resolve the polymorphic pointer into `row[<morph name>]` (null when the target is gone).
async fn attach_morph_target(state: &AppState, entity: &ResolvedEntity, row: &mut Value) -> Result<(), AppError> {
    let Some(morph) = &entity.morph else { return Ok(()) };
    let kind = row.get(&morph.type_column).and_then(Value::as_str);
    let id = row.get(&morph.id_column).and_then(Value::as_i64);
    let target = match (kind.and_then(|k| morph.targets.get(k)), id) {
        (Some(segment), Some(id)) => match state.catalog.entity(segment) {
            Some(target) => CrudService::find_by_id(&state.pool, target, id).await?,
            None => None,
        },
        _ => None,
    };
    if let Value::Object(map) = row {
        map.insert(morph.name.clone(), target.unwrap_or(Value::Null));
    }
    Ok(())
}

pub async fn update(
    State(state): State<AppState>,
    Path((segment, id_str)): Path<(String, String)>,
    JsonBody(body): JsonBody<Value>,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity_for(&state, &segment, Operation::Update)?;
    let id = parse_id(entity, &id_str)?;
    let body = body_to_map(body)?;
    let current = CrudService::find_by_id(&state.pool, entity, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} {}", entity.segment, id)))?;
    let body = WriteService::prepare(
        &state.pool,
        &state.catalog,
        entity,
        body,
        WriteMode::Update { id },
        Some(&current),
    )
    .await?;
    let row = CrudService::update(&state.pool, entity, id, &body)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} {}", entity.segment, id)))?;
    tracing::info!(entity = %entity.segment, id, "updated");
    Ok(success_one_ok(row))
}

#[derive(Deserialize)]
pub struct StatusBody {
    pub status: Option<String>,
}

pub async fn status(
    State(state): State<AppState>,
    Path((segment, id_str)): Path<(String, String)>,
    JsonBody(body): JsonBody<StatusBody>,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity_for(&state, &segment, Operation::Status)?;
    let set = entity
        .status
        .as_ref()
        .ok_or_else(|| AppError::BadRequest(format!("{} has no status", entity.segment)))?;
    let id = parse_id(entity, &id_str)?;
    let value = match body.status.as_deref().filter(|s| !s.is_empty()) {
        None => return Err(AppError::field("status", "status is required")),
        Some(v) if !set.contains(v) => {
            return Err(AppError::field(
                "status",
                format!("status must be one of: {}", set.values.join(", ")),
            ))
        }
        Some(v) => v,
    };
    let row = CrudService::set_status(&state.pool, entity, id, value)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} {}", entity.segment, id)))?;
    tracing::info!(entity = %entity.segment, id, status = %value, "status changed");
    Ok(success_one_ok(row))
}

#[derive(Deserialize, Default)]
pub struct DestroyParams {
    #[serde(default)]
    pub force: bool,
}

/// Soft delete (status `deleted`) where the status set has it, unless `?force=true`.
pub async fn destroy(
    State(state): State<AppState>,
    Path((segment, id_str)): Path<(String, String)>,
    Query(params): Query<DestroyParams>,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity_for(&state, &segment, Operation::Destroy)?;
    let id = parse_id(entity, &id_str)?;
    let found = if entity.soft_deletes() && !params.force {
        CrudService::set_status(&state.pool, entity, id, "deleted").await?.is_some()
    } else {
        CrudService::delete(&state.pool, entity, id).await?
    };
    if !found {
        return Err(AppError::NotFound(format!("{} {}", entity.segment, id)));
    }
    tracing::info!(entity = %entity.segment, id, force = params.force, "deleted");
    Ok(StatusCode::NO_CONTENT)
}
