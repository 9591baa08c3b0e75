//! Named route table: `<segment>.<action>` -> method + URI, served at `GET /routes`.

use crate::catalog::{Catalog, Operation, ResolvedEntity};
use crate::response::success_many;
use crate::state::AppState;
use axum::{extract::State, response::IntoResponse};
use serde::Serialize;

pub const API_PREFIX: &str = "/api/v1";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NamedRoute {
    pub name: String,
    pub method: &'static str,
    /// URI template with `{param}` placeholders.
    pub uri: String,
}

#[derive(Clone, Debug, Default)]
pub struct RouteTable {
    routes: Vec<NamedRoute>,
}

fn method_and_path(entity: &ResolvedEntity, op: Operation) -> Option<(&'static str, String)> {
    let base = format!("{}/{}", API_PREFIX, entity.segment);
    Some(match op {
        Operation::Index => ("GET", base),
        Operation::Store => ("POST", base),
        Operation::Show => ("GET", format!("{}/{{id}}", base)),
        Operation::Update => ("PATCH", format!("{}/{{id}}", base)),
        Operation::Destroy => ("DELETE", format!("{}/{{id}}", base)),
        Operation::Status => {
            entity.status.as_ref()?;
            ("PATCH", format!("{}/{{id}}/status", base))
        }
        Operation::Export => ("GET", format!("{}/export", base)),
        Operation::Check => {
            if entity.unique_columns.is_empty() {
                return None;
            }
            ("GET", format!("{}/check", base))
        }
        Operation::FormProps => ("GET", format!("{}/form-props", base)),
        Operation::Upload => {
            if entity.images.is_empty() {
                return None;
            }
            ("POST", format!("{}/uploads/{}/{{field}}", API_PREFIX, entity.segment))
        }
    })
}

impl RouteTable {
    /// One route per allowed operation; operations with nothing to act on (no status,
    /// no unique field, no image field) are left out.
    pub fn from_catalog(catalog: &Catalog) -> Self {
        let mut routes = Vec::new();
        for e in catalog.entities() {
            for op in Operation::ALL {
                if !e.allows(op) {
                    continue;
                }
                if let Some((method, uri)) = method_and_path(e, op) {
                    routes.push(NamedRoute {
                        name: e.route_name(op),
                        method,
                        uri,
                    });
                }
            }
        }
        RouteTable { routes }
    }

    pub fn routes(&self) -> &[NamedRoute] {
        &self.routes
    }

    pub fn get(&self, name: &str) -> Option<&NamedRoute> {
        self.routes.iter().find(|r| r.name == name)
    }

    /// Resolve `name` to a concrete URI. Every `{param}` in the template must be supplied.
    pub fn url(&self, name: &str, params: &[(&str, &str)]) -> Option<String> {
        let mut uri = self.get(name)?.uri.clone();
        for (k, v) in params {
            uri = uri.replace(&format!("{{{}}}", k), v);
        }
        if uri.contains('{') {
            return None;
        }
        Some(uri)
    }
}

pub async fn list_routes(State(state): State<AppState>) -> impl IntoResponse {
    success_many(state.routes.routes().to_vec())
}
