//! Create/update pipeline: fillable filter, coercion, phone and slug normalization,
//! field rules, then uniqueness, reference and campaign-target checks.

use crate::catalog::{Catalog, ResolvedEntity};
use crate::error::{AppError, FieldErrors};
use crate::service::crud::CrudService;
use crate::service::phone::normalize_phone;
use crate::service::slug::{next_free_slug, slugify, truncate_slug};
use crate::service::validation::{RequestValidator, WriteMode};
use serde_json::Value;
use sqlx::PgPool;
use std::collections::HashMap;

/// Room left for a `-N` suffix when a generated slug is truncated.
const SLUG_SUFFIX_ROOM: usize = 6;

pub struct WriteService;

impl WriteService {
    /// Returns the body ready for INSERT/UPDATE, or a validation error with every failing field.
    /// `current` is the stored row on update; it supplies values the partial body omits.
    pub async fn prepare(
        pool: &PgPool,
        catalog: &Catalog,
        entity: &ResolvedEntity,
        raw: HashMap<String, Value>,
        mode: WriteMode,
        current: Option<&Value>,
    ) -> Result<HashMap<String, Value>, AppError> {
        let mut body = fillable_only(entity, raw);
        let mut errors = FieldErrors::new();

        RequestValidator::coerce(entity, &mut body, &mut errors);
        normalize_phones(entity, &mut body, &mut errors);
        normalize_supplied_slug(entity, &mut body);
        RequestValidator::validate(entity, &body, mode, &mut errors);
        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        generate_slug(pool, entity, &mut body, mode, current).await?;
        check_unique(pool, entity, &body, mode, &mut errors).await?;
        check_references(pool, catalog, entity, &body, &mut errors).await?;
        check_morph_target(pool, catalog, entity, &body, current, &mut errors).await?;
        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }
        Ok(body)
    }
}

/// Mass-assignment allow-list: unknown and guarded keys are dropped.
pub fn fillable_only(entity: &ResolvedEntity, raw: HashMap<String, Value>) -> HashMap<String, Value> {
    let (kept, dropped): (HashMap<_, _>, HashMap<_, _>) = raw.into_iter().partition(|(k, _)| entity.is_fillable(k));
    if !dropped.is_empty() {
        let mut keys: Vec<&String> = dropped.keys().collect();
        keys.sort();
        tracing::debug!(entity = %entity.segment, dropped = ?keys, "ignored non-fillable keys");
    }
    kept
}

fn normalize_phones(entity: &ResolvedEntity, body: &mut HashMap<String, Value>, errors: &mut FieldErrors) {
    for col in &entity.phone_columns {
        let Some(Value::String(raw)) = body.get(col) else { continue };
        match normalize_phone(raw) {
            Some(formatted) => {
                body.insert(col.clone(), Value::String(formatted));
            }
            None => {
                errors
                    .entry(col.clone())
                    .or_insert_with(|| format!("{} must be a valid phone number", col));
            }
        }
    }
}

/// Supplied slugs go through the same slugify rule; a value with nothing left becomes null.
fn normalize_supplied_slug(entity: &ResolvedEntity, body: &mut HashMap<String, Value>) {
    let Some(spec) = &entity.slug else { return };
    if let Some(Value::String(s)) = body.get(&spec.column) {
        let slug = slugify(s);
        let v = if slug.is_empty() { Value::Null } else { Value::String(slug) };
        body.insert(spec.column.clone(), v);
    }
}

async fn generate_slug(
    pool: &PgPool,
    entity: &ResolvedEntity,
    body: &mut HashMap<String, Value>,
    mode: WriteMode,
    current: Option<&Value>,
) -> Result<(), AppError> {
    let Some(spec) = &entity.slug else { return Ok(()) };
    let needed = match (mode, body.get(&spec.column)) {
        (WriteMode::Create, None) => true,
        (_, Some(Value::Null)) => true,
        _ => false,
    };
    if !needed {
        return Ok(());
    }
    let source = body
        .get(&spec.source)
        .or_else(|| current.and_then(|row| row.get(&spec.source)))
        .and_then(Value::as_str)
        .unwrap_or_default();
    let max = entity
        .rules
        .get(&spec.column)
        .and_then(|r| r.max_length)
        .map(|m| m as usize)
        .unwrap_or(255);
    let base = truncate_slug(&slugify(source), max.saturating_sub(SLUG_SUFFIX_ROOM).max(1));
    if base.is_empty() {
        // Nothing to derive from; leave the stored value alone on update.
        body.remove(&spec.column);
        return Ok(());
    }
    let taken = CrudService::slug_candidates(pool, entity, &spec.column, &base, mode.ignore_id()).await?;
    let slug = next_free_slug(&base, &taken);
    tracing::debug!(entity = %entity.segment, slug = %slug, "generated slug");
    body.insert(spec.column.clone(), Value::String(slug));
    Ok(())
}

async fn check_unique(
    pool: &PgPool,
    entity: &ResolvedEntity,
    body: &HashMap<String, Value>,
    mode: WriteMode,
    errors: &mut FieldErrors,
) -> Result<(), AppError> {
    for col in &entity.unique_columns {
        let Some(v) = body.get(col).filter(|v| !v.is_null()) else { continue };
        if CrudService::exists(pool, entity, col, v.clone(), mode.ignore_id()).await? {
            errors.insert(col.clone(), format!("{} has already been taken", col));
        }
    }
    Ok(())
}

/// Belongs-to values must point at an existing parent row.
async fn check_references(
    pool: &PgPool,
    catalog: &Catalog,
    entity: &ResolvedEntity,
    body: &HashMap<String, Value>,
    errors: &mut FieldErrors,
) -> Result<(), AppError> {
    for col in &entity.columns {
        let Some(fk) = &col.foreign_key else { continue };
        let Some(v) = body.get(&col.name).filter(|v| !v.is_null()) else { continue };
        let Some(parent) = catalog.entity_by_table(&fk.table) else { continue };
        if !CrudService::exists(pool, parent, &parent.pk_column, v.clone(), None).await? {
            errors.insert(col.name.clone(), format!("selected {} is invalid", col.name));
        }
    }
    Ok(())
}

/// Polymorphic target: the id must exist in the entity named by the type column.
async fn check_morph_target(
    pool: &PgPool,
    catalog: &Catalog,
    entity: &ResolvedEntity,
    body: &HashMap<String, Value>,
    current: Option<&Value>,
    errors: &mut FieldErrors,
) -> Result<(), AppError> {
    let Some(morph) = &entity.morph else { return Ok(()) };
    if !body.contains_key(&morph.type_column) && !body.contains_key(&morph.id_column) {
        return Ok(());
    }
    let pick = |col: &str| -> Option<Value> {
        body.get(col)
            .or_else(|| current.and_then(|row| row.get(col)))
            .filter(|v| !v.is_null())
            .cloned()
    };
    let (Some(kind), Some(id)) = (pick(&morph.type_column), pick(&morph.id_column)) else {
        return Ok(());
    };
    let Some(kind) = kind.as_str() else { return Ok(()) };
    let Some(target) = morph.targets.get(kind).and_then(|segment| catalog.entity(segment)) else {
        errors.insert(
            morph.type_column.clone(),
            format!("{} must be one of: {}", morph.type_column, morph.targets.keys().cloned().collect::<Vec<_>>().join(", ")),
        );
        return Ok(());
    };
    if !CrudService::exists(pool, target, &target.pk_column, id, None).await? {
        errors.insert(
            morph.id_column.clone(),
            format!("{} does not reference an existing {}", morph.id_column, kind),
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{cms_catalog, resolve};
    use serde_json::json;

    #[test]
    fn fillable_filter_drops_guarded_and_unknown_keys() {
        let c = resolve(&cms_catalog(), "cms").expect("catalog");
        let posts = c.entity("posts").expect("posts");
        let raw: HashMap<String, Value> = json!({"title": "T", "views": 99, "id": 5, "created_at": "x", "bogus": 1})
            .as_object()
            .expect("object")
            .clone()
            .into_iter()
            .collect();
        let kept = fillable_only(posts, raw);
        assert_eq!(kept.len(), 1);
        assert!(kept.contains_key("title"));
    }

    #[test]
    fn phones_are_masked_or_rejected() {
        let c = resolve(&cms_catalog(), "cms").expect("catalog");
        let pages = c.entity("business-pages").expect("pages");
        let mut body = HashMap::from([("phone".to_string(), json!("1 (555) 123 4567"))]);
        let mut errors = FieldErrors::new();
        normalize_phones(pages, &mut body, &mut errors);
        assert_eq!(body["phone"], json!("(555) 123-4567"));
        assert!(errors.is_empty());

        body.insert("phone".into(), json!("12345"));
        normalize_phones(pages, &mut body, &mut errors);
        assert_eq!(errors["phone"], "phone must be a valid phone number");
    }

    #[test]
    fn supplied_slug_is_normalized() {
        let c = resolve(&cms_catalog(), "cms").expect("catalog");
        let posts = c.entity("posts").expect("posts");
        let mut body = HashMap::from([("custom_url".to_string(), json!("Heart Health 101"))]);
        normalize_supplied_slug(posts, &mut body);
        assert_eq!(body["custom_url"], json!("heart-health-101"));
        body.insert("custom_url".into(), json!("!!!"));
        normalize_supplied_slug(posts, &mut body);
        assert_eq!(body["custom_url"], Value::Null);
    }
}
