//! Tail a backend's in-jail application log.

use std::io::{BufRead, BufReader};

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::error::ApiError;
use crate::AppState;

const DEFAULT_LINES: usize = 200;
const MAX_LINES: usize = 5000;

#[derive(Deserialize)]
pub struct LogsQuery {
    pub site: Option<String>,
    pub lines: Option<usize>,
}

/// GET /site/logs?site=…&lines=…
pub async fn site_logs(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<Value>, ApiError> {
    let Some(domain) = query.site else {
        return Err(ApiError::bad_request("missing_site"));
    };
    if state.registry.site(&domain).is_none() {
        return Err(ApiError::not_found("site_not_found"));
    }

    let max_lines = query
        .lines
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_LINES)
        .min(MAX_LINES);

    // pot mounts the jail filesystem under m/.
    let log_file = state
        .containers
        .path(&domain)
        .await
        .join("m/var/log/app.log");

    let lines = match tail_file(&log_file, max_lines) {
        Ok(lines) => lines,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(e) => {
            warn!(%domain, error = %e, "read site log failed");
            return Err(ApiError::internal(
                "log_read_failed",
                "failed to read log file",
            ));
        }
    };

    Ok(Json(json!({
        "status": "ok",
        "site": domain,
        "lines": lines,
    })))
}

/// Last `n` lines of a file.
fn tail_file(path: &std::path::Path, n: usize) -> std::io::Result<Vec<String>> {
    let file = std::fs::File::open(path)?;
    let reader = BufReader::new(file);
    let mut all = Vec::new();
    for line in reader.lines() {
        all.push(line?);
    }
    if all.len() > n {
        all.drain(..all.len() - n);
    }
    Ok(all)
}
