//! Props for create/edit forms: fields with rules, status options, related select options.

use crate::catalog::{IncludeDirection, Operation, ResolvedEntity};
use crate::error::AppError;
use crate::handlers::entity::entity_for;
use crate::response::success_one_ok;
use crate::service::CrudService;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use serde_json::{json, Map, Value};

/// Options per related select.
pub const MAX_OPTIONS: u32 = 500;

/// Fillable fields in column order with kind, rule and image rule.
pub fn field_props(entity: &ResolvedEntity) -> Vec<Value> {
    entity
        .columns
        .iter()
        .filter(|c| entity.is_fillable(&c.name))
        .map(|c| {
            let kind = match c.kind {
                Some(k) => serde_json::to_value(k).unwrap_or(Value::Null),
                None => Value::String(c.name.clone()),
            };
            let rule = entity.rules.get(&c.name);
            json!({
                "name": c.name,
                "kind": kind,
                "nullable": c.nullable,
                "required": rule.and_then(|r| r.required).unwrap_or(false),
                "rule": rule,
                "image": entity.images.get(&c.name),
                "references": c.foreign_key.as_ref().map(|fk| fk.table.clone()),
            })
        })
        .collect()
}

pub async fn form_props(
    State(state): State<AppState>,
    Path(segment): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity_for(&state, &segment, Operation::FormProps)?;
    let mut relations = Map::new();
    for inc in entity.includes.iter().filter(|i| i.direction == IncludeDirection::ToOne) {
        let Some(related) = state.catalog.entity(&inc.related_segment) else { continue };
        let options = CrudService::options(&state.pool, related, MAX_OPTIONS).await?;
        relations.insert(
            inc.our_key_column.clone(),
            json!({ "name": inc.name, "entity": related.segment, "options": options }),
        );
    }
    let morph = entity.morph.as_ref().map(|m| {
        json!({
            "name": m.name,
            "type_column": m.type_column,
            "id_column": m.id_column,
            "types": m.targets,
        })
    });
    Ok(success_one_ok(json!({
        "segment": entity.segment,
        "label_column": entity.label_column,
        "status": entity.status.as_ref().map(|s| json!({ "values": s.values, "default": s.default })),
        "fields": field_props(entity),
        "relations": relations,
        "morph": morph,
    })))
}
