//! Image upload for fields carrying an image rule.

use crate::catalog::Operation;
use crate::error::AppError;
use crate::handlers::entity::entity_for;
use crate::response::success_one;
use crate::service::inspect_image;
use crate::state::AppState;
use axum::extract::{Multipart, Path, State};
use axum::response::IntoResponse;
use bytes::Bytes;
use serde_json::json;

/// Multipart part holding the file.
pub const FILE_PART: &str = "file";

pub async fn upload(
    State(state): State<AppState>,
    Path((segment, field)): Path<(String, String)>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity_for(&state, &segment, Operation::Upload)?;
    let rule = entity
        .images
        .get(&field)
        .ok_or_else(|| AppError::NotFound(format!("{} has no image field '{}'", entity.segment, field)))?;

    let mut file: Option<Bytes> = None;
    while let Some(part) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::rejected(e.status(), e.body_text()))?
    {
        if part.name() == Some(FILE_PART) {
            file = Some(part.bytes().await.map_err(|e| AppError::rejected(e.status(), e.body_text()))?);
            break;
        }
    }
    let bytes = file
        .filter(|b| !b.is_empty())
        .ok_or_else(|| AppError::field(FILE_PART, "file is required"))?;
    let info = inspect_image(&bytes, rule).map_err(|msg| AppError::field(FILE_PART, msg))?;

    let key = format!("{}/{}/{}.{}", entity.segment, field, uuid::Uuid::new_v4(), info.extension());
    state.uploads.put(&key, bytes, info.content_type()).await?;
    let url = format!("{}/{}", state.settings.public_url, key);
    tracing::info!(entity = %entity.segment, field = %field, key = %key, size = info.size, "upload stored");
    Ok(success_one(json!({
        "path": key,
        "url": url,
        "width": info.width,
        "height": info.height,
        "size": info.size,
        "format": info.format,
    })))
}
