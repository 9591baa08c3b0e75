//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// Field name -> first message for that field. Rendered inline under each form input.
pub type FieldErrors = BTreeMap<String, String>;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("missing reference: {kind} '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("reserved column: entity {entity} column {column}")]
    ReservedColumn { entity: String, column: String },
    #[error("duplicate route segment: {0}")]
    DuplicateSegment(String),
    #[error("catalog: {0}")]
    Validation(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("the given data was invalid")]
    Validation(FieldErrors),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("{0} is not allowed")]
    NotAllowed(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("payload too large: {0}")]
    TooLarge(String),
    #[error("storage: {0}")]
    Storage(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl AppError {
    /// Validation error carrying a single field message.
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.into(), message.into());
        AppError::Validation(errors)
    }

    /// Body extractor failure: 413 stays 413, anything else is a bad request.
    pub fn rejected(status: StatusCode, message: String) -> Self {
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::TooLarge(message)
        } else {
            AppError::BadRequest(message)
        }
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// SQLSTATE of a database error (23505 unique, 23503 foreign key, 23502 not null).
fn constraint_code(e: &sqlx::Error) -> Option<String> {
    match e {
        sqlx::Error::Database(db) => db.code().map(|c| c.into_owned()),
        _ => None,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AppError::Catalog(_) => (StatusCode::INTERNAL_SERVER_ERROR, "catalog_error"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
            AppError::Db(e) => match e {
                sqlx::Error::RowNotFound => (StatusCode::NOT_FOUND, "not_found"),
                _ => match constraint_code(e).as_deref() {
                    Some("23505") | Some("23503") => (StatusCode::CONFLICT, "conflict"),
                    Some("23502") => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
                    _ => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
                },
            },
            AppError::NotAllowed(_) => (StatusCode::METHOD_NOT_ALLOWED, "method_not_allowed"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::TooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large"),
            AppError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let details = match &self {
            AppError::Validation(fields) => serde_json::to_value(fields).ok(),
            _ => None,
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
                details,
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_render_field_details() {
        let res = AppError::field("role", "role is required").into_response();
        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn rejections_keep_payload_too_large() {
        let big = AppError::rejected(StatusCode::PAYLOAD_TOO_LARGE, "length limit exceeded".into());
        assert!(matches!(big, AppError::TooLarge(_)));
        assert_eq!(big.into_response().status(), StatusCode::PAYLOAD_TOO_LARGE);
        let bad = AppError::rejected(StatusCode::UNPROCESSABLE_ENTITY, "missing field".into());
        assert_eq!(bad.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn missing_row_is_not_found() {
        let res = AppError::Db(sqlx::Error::RowNotFound).into_response();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
