//! CSV download of the filtered table.

use crate::catalog::Operation;
use crate::error::AppError;
use crate::extractors::ListParams;
use crate::handlers::entity::entity_for;
use crate::service::{export_filename, rows_to_csv, CrudService};
use crate::sql::MAX_ROWS;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};

pub async fn export(
    State(state): State<AppState>,
    Path(segment): Path<String>,
    params: ListParams,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity_for(&state, &segment, Operation::Export)?;
    let mut query = params.to_query(entity)?;
    query.limit = Some(MAX_ROWS);
    let rows = CrudService::list(&state.pool, entity, &query, &[]).await?;
    if rows.len() as u32 >= MAX_ROWS {
        tracing::warn!(entity = %entity.segment, limit = MAX_ROWS, "export truncated");
    }
    let body = rows_to_csv(&entity.exportable, &rows)?;
    let filename = export_filename(&entity.segment, chrono::Utc::now().date_naive());
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", filename)),
        ],
        body,
    ))
}
