//! WebSocket log streaming.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use tracing::debug;

use shipyard_logfan::LogHub;

use crate::auth::is_admin;
use crate::error::ApiError;
use crate::AppState;

/// Route middleware validating the admin key from the `key` query
/// parameter — browsers cannot attach headers to WebSocket upgrade
/// requests, so the credential travels in the URL here.
pub async fn ws_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let key = request
        .uri()
        .query()
        .and_then(|q| query_param(q, "key"));
    let Some(key) = key else {
        return Err(ApiError::with_detail(
            axum::http::StatusCode::UNAUTHORIZED,
            "missing_auth",
            "key query parameter required",
        ));
    };
    if !is_admin(&state.registry.snapshot(), &key) {
        return Err(ApiError::unauthorized("invalid_key"));
    }
    Ok(next.run(request).await)
}

/// GET /ws/logs?key=…
pub async fn ws_logs(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let hub = state.hub.clone();
    ws.on_upgrade(move |socket| stream_logs(socket, hub))
}

/// Forward hub records to the socket until either side goes away. A
/// subscriber evicted for falling behind sees its stream end.
async fn stream_logs(mut socket: WebSocket, hub: LogHub) {
    let mut subscription = hub.subscribe().await;
    debug!(subscriber = subscription.id, "log stream opened");

    loop {
        tokio::select! {
            record = subscription.rx.recv() => {
                match record {
                    Some(line) => {
                        if socket.send(Message::Text(line.into())).await.is_err() {
                            break;
                        }
                    }
                    // Evicted or hub stopped.
                    None => break,
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(_)) => continue,
                    // Client disconnected.
                    _ => break,
                }
            }
        }
    }

    hub.unsubscribe(subscription.id).await;
    debug!(subscriber = subscription.id, "log stream closed");
}

fn query_param(query: &str, name: &str) -> Option<String> {
    for pair in query.split('&') {
        let mut parts = pair.splitn(2, '=');
        if parts.next() == Some(name) {
            return parts.next().map(str::to_string);
        }
    }
    None
}
