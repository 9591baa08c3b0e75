//! Table-view query string: paging, sorting, search, status, includes and column filters.

use crate::catalog::{FieldKind, ResolvedEntity};
use crate::error::AppError;
use crate::sql::{ListQuery, SortDirection};
use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Query},
    http::request::Parts,
};
use serde_json::Value;

pub const DEFAULT_PER_PAGE: u32 = 15;
pub const MAX_PER_PAGE: u32 = 100;

const RESERVED: &[&str] = &["page", "per_page", "sort", "direction", "search", "status", "include", "force"];

/// Raw list parameters. Checked against an entity with [`ListParams::to_query`].
#[derive(Clone, Debug, Default)]
pub struct ListParams {
    pub page: Option<String>,
    pub per_page: Option<String>,
    pub sort: Option<String>,
    pub direction: Option<String>,
    pub search: Option<String>,
    pub status: Option<String>,
    pub include: Vec<String>,
    /// Every other key, in query order.
    pub filters: Vec<(String, String)>,
}

impl ListParams {
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut p = ListParams::default();
        for (k, v) in pairs {
            match k.as_str() {
                "page" => p.page = Some(v),
                "per_page" => p.per_page = Some(v),
                "sort" => p.sort = Some(v),
                "direction" => p.direction = Some(v),
                "search" => p.search = Some(v),
                "status" => p.status = Some(v),
                "include" => p.include.extend(
                    v.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string),
                ),
                _ if RESERVED.contains(&k.as_str()) => {}
                _ => p.filters.push((k, v)),
            }
        }
        p
    }

    pub fn page(&self) -> Result<u32, AppError> {
        positive(self.page.as_deref(), "page", 1)
    }

    pub fn per_page(&self) -> Result<u32, AppError> {
        Ok(positive(self.per_page.as_deref(), "per_page", DEFAULT_PER_PAGE)?.min(MAX_PER_PAGE))
    }

    /// Filters, search, status and sort for `entity`; no window.
    pub fn to_query(&self, entity: &ResolvedEntity) -> Result<ListQuery, AppError> {
        let sort = match self.sort.as_deref().filter(|s| !s.is_empty()) {
            None => entity.pk_column.clone(),
            Some(s) if entity.sortable.contains(s) => s.to_string(),
            Some(s) => return Err(AppError::BadRequest(format!("cannot sort {} by '{}'", entity.segment, s))),
        };
        let direction = match self.direction.as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("") | Some("desc") => SortDirection::Desc,
            Some("asc") => SortDirection::Asc,
            Some(other) => return Err(AppError::BadRequest(format!("direction must be asc or desc, got '{}'", other))),
        };
        let status = match self.status.as_deref().filter(|s| !s.is_empty()) {
            None => None,
            Some(s) => match &entity.status {
                Some(set) if set.contains(s) => Some(s.to_string()),
                Some(set) => {
                    return Err(AppError::BadRequest(format!(
                        "status must be one of: {}",
                        set.values.join(", ")
                    )))
                }
                None => return Err(AppError::BadRequest(format!("{} has no status", entity.segment))),
            },
        };
        let mut filters = Vec::new();
        for (k, v) in &self.filters {
            if !entity.visible_columns().any(|c| c.name == *k) {
                tracing::warn!(entity = %entity.segment, key = %k, "ignored unknown list filter");
                continue;
            }
            filters.push((k.clone(), filter_value(entity, k, v)?));
        }
        Ok(ListQuery {
            filters,
            search: self.search.clone().filter(|s| !s.trim().is_empty()),
            status,
            sort,
            direction,
            limit: None,
            offset: None,
        })
    }

    /// `to_query` plus the LIMIT/OFFSET window for the requested page.
    pub fn to_page_query(&self, entity: &ResolvedEntity) -> Result<(ListQuery, u32, u32), AppError> {
        let page = self.page()?;
        let per_page = self.per_page()?;
        let mut q = self.to_query(entity)?;
        q.limit = Some(per_page);
        q.offset = Some((page - 1).saturating_mul(per_page));
        Ok((q, page, per_page))
    }
}

fn positive(raw: Option<&str>, name: &str, default: u32) -> Result<u32, AppError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(default),
        Some(s) => match s.parse::<u32>() {
            Ok(n) if n >= 1 => Ok(n),
            _ => Err(AppError::BadRequest(format!("{} must be a positive integer", name))),
        },
    }
}

/// Typed filter value; the literal `null` matches NULL.
fn filter_value(entity: &ResolvedEntity, col: &str, s: &str) -> Result<Value, AppError> {
    if s == "null" {
        return Ok(Value::Null);
    }
    let Some(info) = entity.column(col) else {
        return Ok(Value::String(s.to_string()));
    };
    let bad = |what: &str| AppError::BadRequest(format!("filter {} must be {}", col, what));
    if info.is_integer() {
        return s.parse::<i64>().map(|n| Value::Number(n.into())).map_err(|_| bad("an integer"));
    }
    if info.is_bool() {
        return match s.to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(Value::Bool(true)),
            "false" | "0" => Ok(Value::Bool(false)),
            _ => Err(bad("true or false")),
        };
    }
    if info.kind == Some(FieldKind::Decimal) {
        return s
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| bad("a number"));
    }
    Ok(Value::String(s.to_string()))
}

#[async_trait]
impl<S> FromRequestParts<S> for ListParams
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(pairs) = Query::<Vec<(String, String)>>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        Ok(ListParams::from_pairs(pairs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{cms_catalog, resolve, Catalog};
    use serde_json::json;

    fn catalog() -> Catalog {
        resolve(&cms_catalog(), "cms").expect("catalog")
    }

    fn params(q: &[(&str, &str)]) -> ListParams {
        ListParams::from_pairs(q.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
    }

    #[test]
    fn defaults() {
        let c = catalog();
        let (q, page, per_page) = params(&[]).to_page_query(c.entity("posts").expect("posts")).expect("query");
        assert_eq!((page, per_page), (1, 15));
        assert_eq!(q.sort, "id");
        assert_eq!(q.direction, SortDirection::Desc);
        assert_eq!((q.limit, q.offset), (Some(15), Some(0)));
    }

    #[test]
    fn window_and_per_page_cap() {
        let c = catalog();
        let p = params(&[("page", "3"), ("per_page", "500")]);
        let (q, page, per_page) = p.to_page_query(c.entity("posts").expect("posts")).expect("query");
        assert_eq!((page, per_page), (3, 100));
        assert_eq!(q.offset, Some(200));
    }

    #[test]
    fn rejects_bad_sort_direction_status_and_page() {
        let c = catalog();
        let posts = c.entity("posts").expect("posts");
        assert!(params(&[("sort", "content")]).to_query(posts).is_err());
        assert!(params(&[("direction", "sideways")]).to_query(posts).is_err());
        assert!(params(&[("status", "live")]).to_query(posts).is_err());
        assert!(params(&[("page", "0")]).page().is_err());
        assert!(params(&[("status", "x")]).to_query(c.entity("page-views").expect("views")).is_err());
    }

    #[test]
    fn include_list_and_typed_filters() {
        let c = catalog();
        let posts = c.entity("posts").expect("posts");
        let p = params(&[
            ("include", "author, specialty"),
            ("author_id", "7"),
            ("custom_url", "null"),
            ("password", "x"),
            ("direction", "ASC"),
        ]);
        assert_eq!(p.include, vec!["author".to_string(), "specialty".to_string()]);
        let q = p.to_query(posts).expect("query");
        assert_eq!(q.filters, vec![("author_id".to_string(), json!(7)), ("custom_url".to_string(), Value::Null)]);
        assert_eq!(q.direction, SortDirection::Asc);
        assert!(params(&[("author_id", "seven")]).to_query(posts).is_err());
    }

    #[test]
    fn force_is_not_a_filter() {
        let p = params(&[("force", "true")]);
        assert!(p.filters.is_empty());
    }
}
