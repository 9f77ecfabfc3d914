//! HTTP surface of the action hub.
//!
//! Embedders register adapters into a [`Hub`](acthub_runtime::Hub), then
//! hand it to [`router`] for testing or [`serve`] for a running process.
//! Execute and form responses are always `200` with a structured body; the
//! success or failure lives inside the JSON, as the caller expects.

#![forbid(unsafe_code)]

pub mod config;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, Redirect};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use acthub_core::{protocol_version_from_user_agent, ExecutionResponse, Form};
use acthub_runtime::{DescriptorView, ExecutionCall, Hub, LookupOptions};

pub use config::{init_tracing, ServerConfig};

const WEBHOOK_ID_HEADER: &str = "x-webhook-id";
const INSTANCE_ID_HEADER: &str = "x-instance-id";
const DELEGATE_OAUTH_HEADER: &str = "x-delegate-oauth";

#[derive(Clone)]
struct AppState {
    hub: Arc<Hub>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Deserialize)]
struct OauthStartQuery {
    state: String,
}

/// Build the hub's router. Exposed separately from [`serve`] so tests can
/// drive it with `tower::ServiceExt::oneshot`.
pub fn router(hub: Arc<Hub>) -> Router {
    Router::new()
        .route("/actions", get(list_actions))
        .route("/actions/{name}/execute", post(execute_action))
        .route("/actions/{name}/form", post(action_form))
        .route("/actions/{name}/oauth", get(oauth_start))
        .route("/actions/{name}/oauth_redirect", get(oauth_redirect))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { hub })
}

/// Run the hub until ctrl-c.
pub async fn serve(hub: Hub, listen: SocketAddr) -> anyhow::Result<()> {
    let app = router(Arc::new(hub));
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .with_context(|| format!("failed to bind {listen}"))?;
    tracing::info!(addr = %listen, "action hub listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server terminated with error")
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to install ctrl-c handler");
    }
    tracing::info!("shutdown requested");
}

fn lookup_options(headers: &HeaderMap) -> LookupOptions {
    LookupOptions {
        protocol_version: header_str(headers, "user-agent")
            .and_then(protocol_version_from_user_agent),
        support_delegate_oauth: header_str(headers, DELEGATE_OAUTH_HEADER)
            .is_some_and(|v| v.eq_ignore_ascii_case("true")),
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn execution_call(
    name: String,
    headers: &HeaderMap,
    body: serde_json::Value,
) -> ExecutionCall {
    ExecutionCall {
        action_name: name,
        user_agent: header_str(headers, "user-agent").map(str::to_owned),
        webhook_id: header_str(headers, WEBHOOK_ID_HEADER).map(str::to_owned),
        instance_id: header_str(headers, INSTANCE_ID_HEADER).map(str::to_owned),
        support_delegate_oauth: header_str(headers, DELEGATE_OAUTH_HEADER)
            .is_some_and(|v| v.eq_ignore_ascii_case("true")),
        body,
    }
}

async fn list_actions(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Json<Vec<DescriptorView>> {
    Json(state.hub.list(&lookup_options(&headers)))
}

async fn execute_action(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Json<ExecutionResponse> {
    Json(state.hub.execute(execution_call(name, &headers, body)).await)
}

async fn action_form(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Json<Form> {
    Json(state.hub.form(execution_call(name, &headers, body)).await)
}

async fn oauth_start(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<OauthStartQuery>,
) -> Result<Redirect, (StatusCode, Json<ErrorBody>)> {
    let url = state
        .hub
        .oauth_url(&name, &query.state)
        .await
        .map_err(map_hub_error)?;
    Ok(Redirect::temporary(url.as_str()))
}

async fn oauth_redirect(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Html<String>, (StatusCode, Json<ErrorBody>)> {
    state
        .hub
        .oauth_redirect(&name, params)
        .await
        .map_err(map_hub_error)?;
    Ok(Html(format!(
        "<html><body><h1>Login successful</h1>\
         <p>{name} is now connected. You can close this window.</p></body></html>"
    )))
}

fn map_hub_error(err: acthub_core::HubError) -> (StatusCode, Json<ErrorBody>) {
    let status = if err.is_validation() {
        StatusCode::BAD_REQUEST
    } else if matches!(err, acthub_core::HubError::NotFound { .. }) {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    tracing::warn!(error = %err, status = %status, "oauth endpoint failed");
    (
        status,
        Json(ErrorBody {
            error: err.to_string(),
        }),
    )
}
