//! Template documentation endpoint.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use shipyard_nginx::override_example;

use crate::error::ApiError;
use crate::handlers::common::render_site_config;
use crate::AppState;

#[derive(Deserialize)]
pub struct ExampleQuery {
    pub site: Option<String>,
}

/// GET /nginx/example[?site=…]
///
/// Returns the annotated example template; with `site`, also the rendered
/// default config that a deploy without `nginx_config` would use.
pub async fn nginx_example(
    State(state): State<AppState>,
    Query(query): Query<ExampleQuery>,
) -> Result<Json<Value>, ApiError> {
    let Some(domain) = query.site else {
        return Ok(Json(json!({ "example": override_example() })));
    };

    let site = state
        .registry
        .site(&domain)
        .ok_or_else(|| ApiError::not_found("site_not_found"))?;

    let rendered = render_site_config(&state, &domain, &site, None)?;
    Ok(Json(json!({
        "example": override_example(),
        "default": rendered,
        "site": domain,
    })))
}
