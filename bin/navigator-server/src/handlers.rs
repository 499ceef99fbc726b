//! Request handlers mapping the inventory API onto JSON responses

use crate::router::{route, Route};
use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Bytes};
use hyper::{Request, Response, StatusCode};
use navigator_api::NewCluster;
use navigator_core::CoreError;
use navigator_sync::{Inventory, SyncError, SyncMetrics, SyncOrchestrator};
use serde::Serialize;
use serde_json::json;
use std::convert::Infallible;
use std::fmt::Display;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Shared state handed to every connection
pub struct AppState {
    pub inventory: Inventory,
    pub orchestrator: Arc<SyncOrchestrator>,
    pub metrics: SyncMetrics,
}

pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body,
    B::Error: Display,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().unwrap_or_default().to_string();
    debug!("{} {}", method, path);

    let response = match route(&method, &path) {
        Route::Health => text(StatusCode::OK, "OK\n"),
        Route::Metrics => match state.metrics.gather() {
            Ok(body) => Response::builder()
                .status(StatusCode::OK)
                .header("Content-Type", "text/plain; version=0.0.4")
                .body(Full::new(Bytes::from(body)))
                .unwrap_or_else(|_| internal_error()),
            Err(e) => {
                warn!("Failed to gather metrics: {}", e);
                text(StatusCode::INTERNAL_SERVER_ERROR, "Failed to gather metrics\n")
            }
        },
        Route::Sites => {
            let resolve = !query.split('&').any(|pair| pair == "resolve=false");
            respond(state.inventory.sites(resolve).await, StatusCode::OK)
        }
        Route::SiteNames => respond(state.inventory.site_names().await, StatusCode::OK),
        Route::Statistics => respond(state.inventory.statistics().await, StatusCode::OK),
        Route::SyncStatus => json_response(StatusCode::OK, &state.orchestrator.status().await),
        Route::TriggerSync => {
            info!("Manual VLAN sync requested");
            respond(state.orchestrator.sync_once().await, StatusCode::OK)
        }
        Route::DnsStats => json_response(StatusCode::OK, &state.inventory.dns().stats()),
        Route::ResetDnsStats => {
            state.inventory.dns().reset_stats();
            json_response(StatusCode::OK, &state.inventory.dns().stats())
        }
        Route::ListClusters => respond(state.inventory.list_manual().await, StatusCode::OK),
        Route::CreateCluster => match read_json::<NewCluster, B>(req).await {
            Ok(request) => {
                info!("Creating cluster {} at site {}", request.cluster_name, request.site);
                respond(state.inventory.create_manual(request).await, StatusCode::CREATED)
            }
            Err(response) => response,
        },
        Route::GetCluster(id) => respond(state.inventory.get_cluster(&id).await, StatusCode::OK),
        Route::DeleteCluster(id) => match state.inventory.delete_manual(&id).await {
            Ok(_) => Response::builder()
                .status(StatusCode::NO_CONTENT)
                .body(Full::new(Bytes::new()))
                .unwrap_or_else(|_| internal_error()),
            Err(e) => sync_error(&e),
        },
        Route::MethodNotAllowed => error_body(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed"),
        Route::NotFound => error_body(StatusCode::NOT_FOUND, "Not found"),
    };

    Ok(response)
}

async fn read_json<T, B>(req: Request<B>) -> Result<T, Response<Full<Bytes>>>
where
    T: serde::de::DeserializeOwned,
    B: Body,
    B::Error: Display,
{
    let bytes = req
        .into_body()
        .collect()
        .await
        .map_err(|e| error_body(StatusCode::BAD_REQUEST, &format!("Failed to read body: {}", e)))?
        .to_bytes();
    serde_json::from_slice(&bytes)
        .map_err(|e| error_body(StatusCode::BAD_REQUEST, &format!("Invalid request body: {}", e)))
}

fn respond<T: Serialize>(result: Result<T, SyncError>, status: StatusCode) -> Response<Full<Bytes>> {
    match result {
        Ok(value) => json_response(status, &value),
        Err(e) => sync_error(&e),
    }
}

/// HTTP status for an engine error
pub fn status_for(e: &SyncError) -> StatusCode {
    match e {
        SyncError::Core(core) if core.is_validation() => StatusCode::BAD_REQUEST,
        SyncError::Core(CoreError::ExternalClusterProtected(_)) => StatusCode::BAD_REQUEST,
        SyncError::Core(CoreError::ClusterNotFound(_)) => StatusCode::NOT_FOUND,
        SyncError::Core(CoreError::ClusterAlreadyExists { .. }) => StatusCode::CONFLICT,
        SyncError::SyncInProgress => StatusCode::CONFLICT,
        SyncError::Core(CoreError::NotYetSynchronized)
        | SyncError::Core(CoreError::Cache(_))
        | SyncError::Vlan(_)
        | SyncError::EmptyResponse => StatusCode::SERVICE_UNAVAILABLE,
        SyncError::Core(_) | SyncError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn sync_error(e: &SyncError) -> Response<Full<Bytes>> {
    let status = status_for(e);
    if status.is_server_error() {
        error!("Request failed: {}", e);
    } else {
        debug!("Request rejected: {}", e);
    }
    error_body(status, &e.to_string())
}

fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(value) {
        Ok(body) => Response::builder()
            .status(status)
            .header("Content-Type", "application/json")
            .body(Full::new(Bytes::from(body)))
            .unwrap_or_else(|_| internal_error()),
        Err(e) => {
            error!("Failed to serialize response: {}", e);
            internal_error()
        }
    }
}

fn error_body(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    json_response(status, &json!({ "error": message }))
}

fn text(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .body(Full::new(Bytes::from(body)))
        .unwrap_or_else(|_| internal_error())
}

fn internal_error() -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from("Internal Server Error\n")));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
}
