//! Standard response envelope helpers.

use axum::{http::StatusCode, Json};
use serde::Serialize;

#[derive(Serialize)]
pub struct SuccessOne<T> {
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

#[derive(Serialize)]
pub struct SuccessMany<T, M = MetaCount> {
    pub data: Vec<T>,
    pub meta: M,
}

#[derive(Serialize)]
pub struct MetaCount {
    pub count: u64,
}

/// Pagination block for table views.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PageMeta {
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
    pub last_page: u32,
    /// 1-based index of the first row on this page; None when the page is empty.
    pub from: Option<u64>,
    pub to: Option<u64>,
}

impl PageMeta {
    pub fn new(total: u64, page: u32, per_page: u32, rows_on_page: usize) -> Self {
        let per = per_page.max(1) as u64;
        let last_page = total.div_ceil(per).max(1) as u32;
        let (from, to) = if rows_on_page == 0 {
            (None, None)
        } else {
            let first = (page.max(1) as u64 - 1) * per + 1;
            (Some(first), Some(first + rows_on_page as u64 - 1))
        };
        PageMeta {
            total,
            page,
            per_page,
            last_page,
            from,
            to,
        }
    }
}

pub fn success_one<T: Serialize>(data: T) -> (StatusCode, Json<SuccessOne<T>>) {
    (StatusCode::CREATED, Json(SuccessOne { data, meta: None }))
}

pub fn success_one_ok<T: Serialize>(data: T) -> (StatusCode, Json<SuccessOne<T>>) {
    (StatusCode::OK, Json(SuccessOne { data, meta: None }))
}

pub fn success_many<T: Serialize>(data: Vec<T>) -> (StatusCode, Json<SuccessMany<T>>) {
    let count = data.len() as u64;
    (
        StatusCode::OK,
        Json(SuccessMany {
            data,
            meta: MetaCount { count },
        }),
    )
}

pub fn success_page<T: Serialize>(data: Vec<T>, meta: PageMeta) -> (StatusCode, Json<SuccessMany<T, PageMeta>>) {
    (StatusCode::OK, Json(SuccessMany { data, meta }))
}
